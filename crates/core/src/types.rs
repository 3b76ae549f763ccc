//! Type descriptors
//!
//! Recursive tagged representation of the types that appear in compiled
//! function signatures. The serde shape matches the compiler output exactly:
//! every node carries a `"tag"` field (`"scalar"`, `"array"`, `"option"`, ...).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Primitive scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Bool,
    String,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Inclusive integer bounds, `None` for non-integer scalars.
    pub(crate) fn int_bounds(&self) -> Option<(i128, i128)> {
        match self {
            Self::U8 => Some((0, u8::MAX as i128)),
            Self::U16 => Some((0, u16::MAX as i128)),
            Self::U32 => Some((0, u32::MAX as i128)),
            Self::U64 => Some((0, u64::MAX as i128)),
            Self::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            _ => None,
        }
    }
}

/// A type in a compiled signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum TypeDescriptor {
    Nil,
    TopType,
    BottomType,
    Scalar {
        name: ScalarType,
    },
    Array {
        #[serde(rename = "type")]
        item: Box<TypeDescriptor>,
    },
    #[serde(rename = "option")]
    Optional {
        #[serde(rename = "type")]
        item: Box<TypeDescriptor>,
    },
    Struct {
        name: String,
        fields: IndexMap<String, TypeDescriptor>,
    },
    LabeledProduct {
        fields: IndexMap<String, TypeDescriptor>,
    },
    UnlabeledProduct {
        items: Vec<TypeDescriptor>,
    },
    Arrow(ArrowType),
}

impl TypeDescriptor {
    pub fn scalar(name: ScalarType) -> Self {
        Self::Scalar { name }
    }

    pub fn string() -> Self {
        Self::scalar(ScalarType::String)
    }

    pub fn bool() -> Self {
        Self::scalar(ScalarType::Bool)
    }

    pub fn array(item: TypeDescriptor) -> Self {
        Self::Array { item: Box::new(item) }
    }

    pub fn option(item: TypeDescriptor) -> Self {
        Self::Optional { item: Box::new(item) }
    }

    /// Build a struct type from `(field, type)` pairs, keeping their order.
    pub fn structure<I, S>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeDescriptor)>,
        S: Into<String>,
    {
        Self::Struct {
            name: name.to_string(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Short human-readable form used in error messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::TopType => "⊤".to_string(),
            Self::BottomType => "⊥".to_string(),
            Self::Scalar { name } => name.name().to_string(),
            Self::Array { item } => format!("[]{}", item.display_name()),
            Self::Optional { item } => format!("?{}", item.display_name()),
            Self::Struct { name, .. } => name.clone(),
            Self::LabeledProduct { fields } => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.display_name()))
                    .collect();
                format!("({})", inner.join(", "))
            }
            Self::UnlabeledProduct { items } => {
                let inner: Vec<String> = items.iter().map(|t| t.display_name()).collect();
                format!("({})", inner.join(", "))
            }
            Self::Arrow(arrow) => format!(
                "{} -> {}",
                arrow.domain.display_name(),
                arrow.codomain.display_name()
            ),
        }
    }
}

/// Function signature: labelled argument product to unlabelled result product.
///
/// Either side may be `nil`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowType {
    pub domain: Box<TypeDescriptor>,
    pub codomain: Box<TypeDescriptor>,
}

impl ArrowType {
    /// Signature builder starting from `nil -> nil`.
    pub fn new() -> Self {
        Self {
            domain: Box::new(TypeDescriptor::Nil),
            codomain: Box::new(TypeDescriptor::Nil),
        }
    }

    /// Append a named argument.
    pub fn arg(mut self, name: &str, ty: TypeDescriptor) -> Self {
        match self.domain.as_mut() {
            TypeDescriptor::LabeledProduct { fields } => {
                fields.insert(name.to_string(), ty);
            }
            _ => {
                let mut fields = IndexMap::new();
                fields.insert(name.to_string(), ty);
                self.domain = Box::new(TypeDescriptor::LabeledProduct { fields });
            }
        }
        self
    }

    /// Set the result items. An empty list keeps the codomain `nil`.
    pub fn returns(mut self, items: Vec<TypeDescriptor>) -> Self {
        self.codomain = Box::new(if items.is_empty() {
            TypeDescriptor::Nil
        } else {
            TypeDescriptor::UnlabeledProduct { items }
        });
        self
    }

    /// Positional argument list.
    pub fn domain_fields(&self) -> Vec<(&str, &TypeDescriptor)> {
        match self.domain.as_ref() {
            TypeDescriptor::LabeledProduct { fields } => {
                fields.iter().map(|(k, v)| (k.as_str(), v)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Result items, empty for a `nil` codomain.
    pub fn codomain_items(&self) -> &[TypeDescriptor] {
        match self.codomain.as_ref() {
            TypeDescriptor::UnlabeledProduct { items } => items,
            _ => &[],
        }
    }
}

impl Default for ArrowType {
    fn default() -> Self {
        Self::new()
    }
}
