//! Declared parameters of a native operation.

use crate::attr::{AttrKind, AttrValue, OpAttribute};
use crate::dtype::DType;
use crate::{Error, Result};

/// One declared input of an op.
#[derive(Debug, Clone, PartialEq)]
pub enum InputArg {
    /// A single tensor. `type_attr` names the attribute inferred from its dtype.
    Single {
        name: String,
        type_attr: Option<String>,
    },
    /// A variable-length group of tensors sharing one dtype.
    Variadic {
        name: String,
        number_attr: String,
        type_attr: String,
    },
    /// A variable-length group of tensors with per-tensor dtypes.
    TypeList { name: String, type_list_attr: String },
}

impl InputArg {
    pub fn name(&self) -> &str {
        match self {
            InputArg::Single { name, .. }
            | InputArg::Variadic { name, .. }
            | InputArg::TypeList { name, .. } => name,
        }
    }
}

/// One declared attribute of an op.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    pub name: String,
    pub kind: AttrKind,
    pub default: Option<AttrValue>,
    /// Restricts `Type`/`TensorList` values. Empty means any dtype.
    pub allowed: Vec<DType>,
}

impl AttrDef {
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            allowed: Vec::new(),
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Int)
    }

    pub fn dtype(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Type)
    }

    pub fn with_default(mut self, value: AttrValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allowed_types(mut self, dtypes: &[DType]) -> Self {
        self.allowed = dtypes.to_vec();
        self
    }

    /// Whether `dtype` is acceptable for this attribute.
    pub fn allows(&self, dtype: DType) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&dtype)
    }
}

/// Definition of a native operation: its name, inputs and attributes, in the
/// order the native side declares them.
#[derive(Debug, Clone, PartialEq)]
pub struct OpDef {
    pub name: String,
    pub inputs: Vec<InputArg>,
    pub attrs: Vec<AttrDef>,
}

impl OpDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Add a single-tensor input whose dtype sets `type_attr`.
    pub fn input(mut self, name: impl Into<String>, type_attr: impl Into<String>) -> Self {
        self.inputs.push(InputArg::Single {
            name: name.into(),
            type_attr: Some(type_attr.into()),
        });
        self
    }

    /// Add a single-tensor input that does not feed any attribute.
    pub fn untyped_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputArg::Single {
            name: name.into(),
            type_attr: None,
        });
        self
    }

    pub fn variadic_input(
        mut self,
        name: impl Into<String>,
        number_attr: impl Into<String>,
        type_attr: impl Into<String>,
    ) -> Self {
        self.inputs.push(InputArg::Variadic {
            name: name.into(),
            number_attr: number_attr.into(),
            type_attr: type_attr.into(),
        });
        self
    }

    pub fn type_list_input(
        mut self,
        name: impl Into<String>,
        type_list_attr: impl Into<String>,
    ) -> Self {
        self.inputs.push(InputArg::TypeList {
            name: name.into(),
            type_list_attr: type_list_attr.into(),
        });
        self
    }

    pub fn attr(mut self, attr: AttrDef) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn find_attr(&self, name: &str) -> Option<&AttrDef> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    /// Check attributes built elsewhere against this definition.
    ///
    /// Every attribute must be declared, named once and carry the declared
    /// kind.
    pub fn check_attributes(&self, attrs: &[OpAttribute]) -> Result<()> {
        self.check_names(attrs)?;
        for attr in attrs {
            let Some(def) = self.find_attr(&attr.name) else {
                continue;
            };
            if def.kind != attr.kind() {
                return Err(Error::AttributeMismatch {
                    op: self.name.clone(),
                    attr: attr.name.clone(),
                    expected: def.kind,
                    actual: attr.kind(),
                });
            }
        }
        Ok(())
    }

    /// Reject undeclared names and names given more than once.
    pub(crate) fn check_names(&self, attrs: &[OpAttribute]) -> Result<()> {
        for (i, attr) in attrs.iter().enumerate() {
            let message = if self.find_attr(&attr.name).is_none() {
                "not declared by the op"
            } else if attrs[..i].iter().any(|earlier| earlier.name == attr.name) {
                "given more than once"
            } else {
                continue;
            };
            return Err(Error::InvalidAttribute {
                op: self.name.clone(),
                attr: attr.name.clone(),
                message: message.to_string(),
            });
        }
        Ok(())
    }
}
