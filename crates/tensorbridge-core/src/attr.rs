//! Attribute tagged union passed alongside every op call.

use crate::dtype::DType;
use std::fmt;

/// Kind tag of an op attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    Int,
    Float,
    Bool,
    Type,
    Shape,
    String,
    IntList,
    /// One dtype per tensor of a heterogeneous input list.
    TensorList,
}

impl AttrKind {
    pub const ALL: [AttrKind; 8] = [
        AttrKind::Int,
        AttrKind::Float,
        AttrKind::Bool,
        AttrKind::Type,
        AttrKind::Shape,
        AttrKind::String,
        AttrKind::IntList,
        AttrKind::TensorList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttrKind::Int => "int",
            AttrKind::Float => "float",
            AttrKind::Bool => "bool",
            AttrKind::Type => "type",
            AttrKind::Shape => "shape",
            AttrKind::String => "string",
            AttrKind::IntList => "list(int)",
            AttrKind::TensorList => "list(type)",
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Attribute value. The variant is the kind tag; see [`AttrValue::kind`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Type(DType),
    /// Dimensions; `-1` marks an unknown dimension.
    Shape(Vec<i64>),
    String(String),
    IntList(Vec<i64>),
    TensorList(Vec<DType>),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Type(_) => AttrKind::Type,
            AttrValue::Shape(_) => AttrKind::Shape,
            AttrValue::String(_) => AttrKind::String,
            AttrValue::IntList(_) => AttrKind::IntList,
            AttrValue::TensorList(_) => AttrKind::TensorList,
        }
    }
}

/// A named attribute for one op call. Names are unique within a call.
#[derive(Debug, Clone, PartialEq)]
pub struct OpAttribute {
    pub name: String,
    pub value: AttrValue,
}

impl OpAttribute {
    pub fn new(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, AttrValue::Int(value))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, AttrValue::Float(value))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, AttrValue::Bool(value))
    }

    pub fn dtype(name: impl Into<String>, value: DType) -> Self {
        Self::new(name, AttrValue::Type(value))
    }

    pub fn kind(&self) -> AttrKind {
        self.value.kind()
    }
}
