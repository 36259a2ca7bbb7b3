//! Interning keys for the type and constant pool, and the std140 layout
//! rules for uniform blocks.
use anyhow::{bail, Result};
use ordered_float::OrderedFloat;

use crate::compiler::ast::{ExpressionType, ImageType, PrimitiveType, StructDescription};
use crate::compiler::common::{ConstantValue, InternalError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpirvType {
    Void,
    Bool,
    Int { signed: bool },
    Float,
    Vector { component: Box<SpirvType>, count: u32 },
    Matrix { column: Box<SpirvType>, count: u32 },
    // `dim` is a `spirv::Dim` value.
    Image { sampled: Box<SpirvType>, dim: u32, arrayed: bool },
    SampledImage(Box<SpirvType>),
    Struct(usize),
    // `storage_class` is a `spirv::StorageClass` value.
    Pointer { storage_class: u32, pointee: Box<SpirvType> },
    Function { return_type: Box<SpirvType>, parameters: Vec<SpirvType> },
}
impl SpirvType {
    pub fn from_primitive(x: PrimitiveType) -> Self {
        match x {
            PrimitiveType::Boolean => Self::Bool,
            PrimitiveType::Float32 => Self::Float,
            PrimitiveType::Int32 => Self::Int { signed: true },
            PrimitiveType::UInt32 => Self::Int { signed: false },
        }
    }
    pub fn vector(component: SpirvType, count: u32) -> Self {
        Self::Vector {
            component: Box::new(component),
            count,
        }
    }
    pub fn pointer(storage_class: spirv::StorageClass, pointee: SpirvType) -> Self {
        Self::Pointer {
            storage_class: storage_class as u32,
            pointee: Box::new(pointee),
        }
    }

    /// Value type of a sanitized expression type. `uniform<T>` lowers to the
    /// type it wraps; the storage class lives on the pointer.
    pub fn from_expression_type(ty: &ExpressionType) -> Result<Self> {
        let out = match ty {
            ExpressionType::NoType => Self::Void,
            ExpressionType::Identifier(name) => {
                bail!(InternalError::UnresolvedIdentifierType(name.clone()));
            }
            ExpressionType::Primitive(x) => Self::from_primitive(*x),
            ExpressionType::Vector(x) => Self::vector(Self::from_primitive(x.ty), x.component_count),
            ExpressionType::Matrix(x) => Self::Matrix {
                column: Box::new(Self::vector(Self::from_primitive(x.ty), x.row_count)),
                count: x.column_count,
            },
            ExpressionType::Sampler(x) => {
                let (dim, arrayed) = match x.dim {
                    ImageType::Dim1D => (spirv::Dim::Dim1D, false),
                    ImageType::Dim1DArray => (spirv::Dim::Dim1D, true),
                    ImageType::Dim2D => (spirv::Dim::Dim2D, false),
                    ImageType::Dim2DArray => (spirv::Dim::Dim2D, true),
                    ImageType::Dim3D => (spirv::Dim::Dim3D, false),
                    ImageType::Cubemap => (spirv::Dim::DimCube, false),
                };
                let image = Self::Image {
                    sampled: Box::new(Self::from_primitive(x.sampled_type)),
                    dim: dim as u32,
                    arrayed,
                };
                Self::SampledImage(Box::new(image))
            }
            ExpressionType::Struct(x) => Self::Struct(x.struct_index),
            ExpressionType::Uniform(inner) => Self::from_expression_type(inner)?,
        };
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpirvConstant {
    Bool(bool),
    F32(OrderedFloat<f32>),
    I32(i32),
    U32(u32),
    Composite { ty: SpirvType, components: Vec<SpirvConstant> },
}
impl SpirvConstant {
    pub fn ty(&self) -> SpirvType {
        match self {
            Self::Bool(_) => SpirvType::Bool,
            Self::F32(_) => SpirvType::Float,
            Self::I32(_) => SpirvType::Int { signed: true },
            Self::U32(_) => SpirvType::Int { signed: false },
            Self::Composite { ty, .. } => ty.clone(),
        }
    }
}
impl From<ConstantValue> for SpirvConstant {
    fn from(x: ConstantValue) -> Self {
        fn composite(components: Vec<SpirvConstant>) -> SpirvConstant {
            let ty = SpirvType::vector(components[0].ty(), components.len() as u32);
            SpirvConstant::Composite { ty, components }
        }
        fn f32s(xs: &[f32]) -> SpirvConstant {
            composite(xs.iter().map(|x| SpirvConstant::F32(OrderedFloat(*x))).collect())
        }
        fn i32s(xs: &[i32]) -> SpirvConstant {
            composite(xs.iter().map(|x| SpirvConstant::I32(*x)).collect())
        }

        match x {
            ConstantValue::Bool(x) => Self::Bool(x),
            ConstantValue::F32(x) => Self::F32(OrderedFloat(x)),
            ConstantValue::I32(x) => Self::I32(x),
            ConstantValue::U32(x) => Self::U32(x),
            ConstantValue::Vec2F32(x) => f32s(&x),
            ConstantValue::Vec3F32(x) => f32s(&x),
            ConstantValue::Vec4F32(x) => f32s(&x),
            ConstantValue::Vec2I32(x) => i32s(&x),
            ConstantValue::Vec3I32(x) => i32s(&x),
            ConstantValue::Vec4I32(x) => i32s(&x),
        }
    }
}

fn round_up(x: u32, align: u32) -> u32 {
    (x + align - 1) / align * align
}

fn struct_desc(structs: &[StructDescription], struct_index: usize) -> Result<&StructDescription> {
    match structs.get(struct_index) {
        Some(x) => Ok(x),
        None => bail!(InternalError::UnregisteredIndex {
            kind: "struct",
            index: struct_index,
        }),
    }
}

/// `(size, alignment)` of a type in a std140 block.
pub fn std140_size_align(ty: &ExpressionType, structs: &[StructDescription]) -> Result<(u32, u32)> {
    let out = match ty {
        ExpressionType::Primitive(_) => (4, 4),
        ExpressionType::Vector(x) => match x.component_count {
            2 => (8, 8),
            n => (4 * n, 16),
        },
        // Columns are laid out like an array of vectors, strided to 16 bytes.
        ExpressionType::Matrix(x) => (16 * x.column_count, 16),
        ExpressionType::Struct(x) => {
            let desc = struct_desc(structs, x.struct_index)?;
            let (_, size, align) = std140_struct_layout(desc, structs)?;
            (size, align)
        }
        ExpressionType::Uniform(inner) => std140_size_align(inner, structs)?,
        other => bail!(InternalError::Unsupported(format!("{} in a std140 block", other))),
    };
    Ok(out)
}

/// Member offsets, size and alignment of a struct in a std140 block.
pub fn std140_struct_layout(desc: &StructDescription, structs: &[StructDescription]) -> Result<(Vec<u32>, u32, u32)> {
    let mut offsets = Vec::with_capacity(desc.members.len());
    let mut cursor = 0;
    let mut max_align = 16;
    for member in desc.members.iter() {
        let (size, align) = std140_size_align(&member.ty, structs)?;
        let offset = round_up(cursor, align);
        offsets.push(offset);
        cursor = offset + size;
        max_align = max_align.max(align);
    }
    let align = round_up(max_align, 16);
    Ok((offsets, round_up(cursor, align), align))
}
