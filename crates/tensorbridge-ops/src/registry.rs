//! Core op-definition registry.
//!
//! Declares the inputs and attributes of every op the typed wrappers call.

use tensorbridge_core::{AttrDef, AttrKind, AttrValue, DType, OpDef, OpRegistry};

const NUMERIC: &[DType] = &[DType::Float32, DType::Int32, DType::Complex64];
const INDEX: &[DType] = &[DType::Int32];

/// Returns an op registry pre-populated with the core op definitions.
///
/// The registry includes:
/// - 4 array ops (Identity, IdentityN, Reshape, ConcatV2)
/// - 5 math ops (Add, Sub, Mul, Equal, Cast)
///
/// Further definitions can be added to the returned registry via
/// `registry.register(def)`.
pub fn core_op_registry() -> OpRegistry {
    let mut registry = OpRegistry::new();

    // Array ops
    registry
        .register(OpDef::new("Identity").input("input", "T").attr(AttrDef::dtype("T")))
        .register(
            OpDef::new("IdentityN")
                .type_list_input("input", "T")
                .attr(AttrDef::new("T", AttrKind::TensorList)),
        )
        .register(
            OpDef::new("Reshape")
                .input("tensor", "T")
                .input("shape", "Tshape")
                .attr(AttrDef::dtype("T"))
                .attr(index_type("Tshape")),
        )
        .register(
            OpDef::new("ConcatV2")
                .variadic_input("values", "N", "T")
                .input("axis", "Tidx")
                .attr(AttrDef::int("N"))
                .attr(AttrDef::dtype("T"))
                .attr(index_type("Tidx")),
        );

    // Math ops
    for name in ["Add", "Sub", "Mul"] {
        registry.register(binary(name).attr(AttrDef::dtype("T").allowed_types(NUMERIC)));
    }
    registry
        .register(binary("Equal").attr(AttrDef::dtype("T")))
        .register(
            OpDef::new("Cast")
                .input("x", "SrcT")
                .attr(AttrDef::dtype("SrcT"))
                .attr(AttrDef::dtype("DstT"))
                .attr(AttrDef::new("Truncate", AttrKind::Bool).with_default(AttrValue::Bool(false))),
        );

    registry
}

fn binary(name: &str) -> OpDef {
    OpDef::new(name).input("x", "T").input("y", "T")
}

fn index_type(name: &str) -> AttrDef {
    AttrDef::dtype(name)
        .allowed_types(INDEX)
        .with_default(AttrValue::Type(DType::Int32))
}
