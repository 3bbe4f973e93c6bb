//! Attribute Encoder.
//!
//! Builds the ordered attribute list for one op call from the op's declared
//! parameters, the dtypes of its inputs and any explicit values the caller
//! supplies. Output order is the op's declaration order; the dispatcher passes
//! the list through untouched.

use crate::attr::{AttrValue, OpAttribute};
use crate::dtype::DType;
use crate::op_def::{AttrDef, InputArg, OpDef};
use crate::registry::OpRegistry;
use crate::{Error, Result};
use std::collections::HashMap;

/// Dtypes of one declared input group.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDtypes {
    Single(DType),
    List(Vec<DType>),
}

impl InputDtypes {
    pub fn dtypes(&self) -> &[DType] {
        match self {
            InputDtypes::Single(dtype) => std::slice::from_ref(dtype),
            InputDtypes::List(dtypes) => dtypes,
        }
    }
}

/// High-level arguments of one op call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpArgs {
    /// One entry per declared input, in declaration order.
    pub inputs: Vec<InputDtypes>,
    /// Explicit attribute values, matched to declarations by name.
    pub attrs: Vec<OpAttribute>,
}

impl OpArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, dtype: DType) -> Self {
        self.inputs.push(InputDtypes::Single(dtype));
        self
    }

    pub fn input_list(mut self, dtypes: impl IntoIterator<Item = DType>) -> Self {
        self.inputs
            .push(InputDtypes::List(dtypes.into_iter().collect()));
        self
    }

    pub fn attr(mut self, attr: OpAttribute) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// Encodes op attributes using the declarations in an [`OpRegistry`].
pub struct AttributeEncoder<'a> {
    registry: &'a OpRegistry,
}

impl<'a> AttributeEncoder<'a> {
    pub fn new(registry: &'a OpRegistry) -> Self {
        Self { registry }
    }

    /// Encode the attributes of `op_name`. Fails with [`Error::UnknownOp`] if
    /// the op is not registered.
    pub fn encode(&self, op_name: &str, args: &OpArgs) -> Result<Vec<OpAttribute>> {
        let def = self
            .registry
            .get(op_name)
            .ok_or_else(|| Error::UnknownOp(op_name.to_string()))?;
        encode(def, args)
    }
}

/// Encode the attributes of one call to `def`.
#[tracing::instrument(skip_all, fields(op = %def.name))]
pub fn encode(def: &OpDef, args: &OpArgs) -> Result<Vec<OpAttribute>> {
    if args.inputs.len() != def.inputs.len() {
        return Err(Error::InputArity {
            op: def.name.clone(),
            expected: def.inputs.len(),
            actual: args.inputs.len(),
        });
    }

    def.check_names(&args.attrs)?;

    let inferred = infer_from_inputs(def, &args.inputs)?;

    let mut encoded = Vec::with_capacity(def.attrs.len());
    for attr_def in &def.attrs {
        let explicit = args.attrs.iter().find(|a| a.name == attr_def.name);
        let value = resolve(def, attr_def, explicit, inferred.get(attr_def.name.as_str()))?;
        check_allowed(def, attr_def, &value)?;
        encoded.push(OpAttribute::new(attr_def.name.clone(), value));
    }

    tracing::trace!(count = encoded.len(), "Encoded attributes");
    Ok(encoded)
}

fn infer_from_inputs<'d>(
    def: &'d OpDef,
    inputs: &[InputDtypes],
) -> Result<HashMap<&'d str, AttrValue>> {
    let mut inferred: HashMap<&str, AttrValue> = HashMap::new();

    for (arg, group) in def.inputs.iter().zip(inputs) {
        match arg {
            InputArg::Single { name, type_attr } => {
                let InputDtypes::Single(dtype) = group else {
                    return Err(Error::InputArity {
                        op: format!("{}:{name}", def.name),
                        expected: 1,
                        actual: group.dtypes().len(),
                    });
                };
                if let Some(type_attr) = type_attr {
                    unify(def, &mut inferred, type_attr.as_str(), *dtype)?;
                }
            }
            InputArg::Variadic {
                number_attr,
                type_attr,
                ..
            } => {
                let dtypes = group.dtypes();
                inferred.insert(number_attr.as_str(), AttrValue::Int(dtypes.len() as i64));
                for &dtype in dtypes {
                    unify(def, &mut inferred, type_attr.as_str(), dtype)?;
                }
            }
            InputArg::TypeList { type_list_attr, .. } => {
                inferred.insert(
                    type_list_attr.as_str(),
                    AttrValue::TensorList(group.dtypes().to_vec()),
                );
            }
        }
    }

    Ok(inferred)
}

/// Record `dtype` for a type attribute, failing if an earlier input disagrees.
fn unify<'d>(
    def: &OpDef,
    inferred: &mut HashMap<&'d str, AttrValue>,
    attr: &'d str,
    dtype: DType,
) -> Result<()> {
    match inferred.get(attr) {
        Some(AttrValue::Type(first)) if *first != dtype => Err(Error::DtypeMismatch {
            op: def.name.clone(),
            first: *first,
            second: dtype,
        }),
        Some(_) => Ok(()),
        None => {
            inferred.insert(attr, AttrValue::Type(dtype));
            Ok(())
        }
    }
}

fn resolve(
    def: &OpDef,
    attr_def: &AttrDef,
    explicit: Option<&OpAttribute>,
    inferred: Option<&AttrValue>,
) -> Result<AttrValue> {
    if let Some(explicit) = explicit {
        if explicit.kind() != attr_def.kind {
            return Err(Error::AttributeMismatch {
                op: def.name.clone(),
                attr: attr_def.name.clone(),
                expected: attr_def.kind,
                actual: explicit.kind(),
            });
        }
    }

    match (explicit, inferred) {
        (Some(explicit), Some(inferred)) => {
            if explicit.value == *inferred {
                return Ok(explicit.value.clone());
            }
            if let (AttrValue::Type(first), AttrValue::Type(second)) = (inferred, &explicit.value)
            {
                return Err(Error::DtypeMismatch {
                    op: def.name.clone(),
                    first: *first,
                    second: *second,
                });
            }
            Err(Error::InvalidAttribute {
                op: def.name.clone(),
                attr: attr_def.name.clone(),
                message: format!(
                    "explicit value {:?} contradicts {:?} taken from the inputs",
                    explicit.value, inferred
                ),
            })
        }
        (Some(explicit), None) => Ok(explicit.value.clone()),
        (None, Some(inferred)) => Ok(inferred.clone()),
        (None, None) => attr_def
            .default
            .clone()
            .ok_or_else(|| Error::MissingAttribute {
                op: def.name.clone(),
                attr: attr_def.name.clone(),
            }),
    }
}

fn check_allowed(def: &OpDef, attr_def: &AttrDef, value: &AttrValue) -> Result<()> {
    let dtypes: &[DType] = match value {
        AttrValue::Type(dtype) => std::slice::from_ref(dtype),
        AttrValue::TensorList(dtypes) => dtypes,
        _ => return Ok(()),
    };
    match dtypes.iter().find(|&&dtype| !attr_def.allows(dtype)) {
        Some(dtype) => Err(Error::UnsupportedType(format!(
            "{dtype} for attribute '{}' of op '{}'",
            attr_def.name, def.name
        ))),
        None => Ok(()),
    }
}
