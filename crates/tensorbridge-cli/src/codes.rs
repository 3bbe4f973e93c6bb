//! Text tables for the native code mappings and the op registry.

use std::fmt::Write;

use tensorbridge_core::type_map::{to_managed_type, to_native_type};
use tensorbridge_core::{AttrDescriptor, AttrKind, DType, InputArg, NativeType, OpRegistry};

/// Native codes known to the bridge, including those without a managed dtype.
const NATIVE_TYPES: [NativeType; 7] = [
    NativeType::FLOAT,
    NativeType::INT32,
    NativeType::UINT8,
    NativeType::STRING,
    NativeType::COMPLEX64,
    NativeType::INT64,
    NativeType::BOOL,
];

/// Managed dtype to native type code, then every native code back.
pub fn type_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:<14} {:>4}", "dtype", "native", "code");
    for dtype in DType::ALL {
        let native = to_native_type(dtype);
        let _ = writeln!(out, "{:<12} {:<14} {:>4}", dtype, native, native.code());
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:>4} {:<14} {:<12}", "code", "native", "dtype");
    for native in NATIVE_TYPES {
        let managed = match to_managed_type(native) {
            Ok(dtype) => dtype.name(),
            Err(_) => "(unsupported)",
        };
        let _ = writeln!(out, "{:>4} {:<14} {:<12}", native.code(), native, managed);
    }
    out
}

/// Attribute kinds with their native descriptor code and list flag.
pub fn attribute_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>4} {:>5}", "kind", "code", "list");
    for kind in AttrKind::ALL {
        let AttrDescriptor { code, is_list } = AttrDescriptor::for_kind(kind);
        let _ = writeln!(out, "{:<12} {:>4} {:>5}", kind, code, is_list);
    }
    out
}

/// One line per registered op: `Name(inputs) attrs`, sorted by name.
pub fn op_listing(registry: &OpRegistry) -> String {
    let mut names: Vec<&str> = registry.op_names().collect();
    names.sort_unstable();

    let mut out = String::new();
    for def in names.into_iter().filter_map(|name| registry.get(name)) {
        let inputs: Vec<String> = def
            .inputs
            .iter()
            .map(|arg| match arg {
                InputArg::Single {
                    name,
                    type_attr: Some(t),
                } => format!("{name}: {t}"),
                InputArg::Single {
                    name,
                    type_attr: None,
                } => name.clone(),
                InputArg::Variadic {
                    name,
                    number_attr,
                    type_attr,
                } => format!("{name}: {number_attr} * {type_attr}"),
                InputArg::TypeList {
                    name,
                    type_list_attr,
                } => format!("{name}: {type_list_attr}"),
            })
            .collect();
        let attrs: Vec<String> = def
            .attrs
            .iter()
            .map(|attr| match &attr.default {
                Some(default) => format!("{}: {} = {:?}", attr.name, attr.kind, default),
                None => format!("{}: {}", attr.name, attr.kind),
            })
            .collect();
        let _ = writeln!(out, "{}({}) [{}]", def.name, inputs.join(", "), attrs.join(", "));
    }
    out
}
