mod error;

pub use error::{InternalError, SemanticError};

use super::ast::{ExpressionType, PrimitiveType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    F32(f32),
    I32(i32),
    U32(u32),
    Vec2F32([f32; 2]),
    Vec3F32([f32; 3]),
    Vec4F32([f32; 4]),
    Vec2I32([i32; 2]),
    Vec3I32([i32; 3]),
    Vec4I32([i32; 4]),
}
impl ConstantValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(x) => Some(*x),
            _ => None,
        }
    }

    pub fn ty(&self) -> ExpressionType {
        match self {
            Self::Bool(_) => ExpressionType::bool(),
            Self::F32(_) => ExpressionType::f32(),
            Self::I32(_) => ExpressionType::i32(),
            Self::U32(_) => ExpressionType::u32(),
            Self::Vec2F32(_) => ExpressionType::vec(2, PrimitiveType::Float32),
            Self::Vec3F32(_) => ExpressionType::vec(3, PrimitiveType::Float32),
            Self::Vec4F32(_) => ExpressionType::vec(4, PrimitiveType::Float32),
            Self::Vec2I32(_) => ExpressionType::vec(2, PrimitiveType::Int32),
            Self::Vec3I32(_) => ExpressionType::vec(3, PrimitiveType::Int32),
            Self::Vec4I32(_) => ExpressionType::vec(4, PrimitiveType::Int32),
        }
    }

    /// Scalar components in declaration order; a scalar yields itself.
    pub fn components(&self) -> Vec<ConstantValue> {
        match self {
            Self::Bool(_) | Self::F32(_) | Self::I32(_) | Self::U32(_) => vec![*self],
            Self::Vec2F32(x) => x.iter().map(|c| Self::F32(*c)).collect(),
            Self::Vec3F32(x) => x.iter().map(|c| Self::F32(*c)).collect(),
            Self::Vec4F32(x) => x.iter().map(|c| Self::F32(*c)).collect(),
            Self::Vec2I32(x) => x.iter().map(|c| Self::I32(*c)).collect(),
            Self::Vec3I32(x) => x.iter().map(|c| Self::I32(*c)).collect(),
            Self::Vec4I32(x) => x.iter().map(|c| Self::I32(*c)).collect(),
        }
    }

    /// Literal words of a 32-bit scalar. Booleans and vectors have no
    /// literal encoding.
    pub fn to_words(&self) -> Vec<u32> {
        match self {
            Self::F32(x) => vec![x.to_bits()],
            Self::I32(x) => vec![*x as u32],
            Self::U32(x) => vec![*x],
            _ => vec![],
        }
    }
}

/// Nul-terminated UTF-8 string packed little-endian into words.
pub fn literal_string_words(x: &str) -> Vec<u32> {
    let mut words = vec![];
    let mut bytes = x.as_bytes().iter().copied().collect::<Vec<_>>();
    bytes.push(0);

    for c in bytes.chunks(4) {
        let mut c2 = [0u8; 4];
        c2[0..c.len()].copy_from_slice(c);
        let c = u32::from_le_bytes(c2);
        words.push(c);
    }
    words
}
