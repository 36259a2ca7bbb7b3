use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Float32,
    Int32,
    UInt32,
}
impl PrimitiveType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean)
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Float32 => "f32",
            Self::Int32 => "i32",
            Self::UInt32 => "ui32",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub component_count: u32,
    pub ty: PrimitiveType,
}

/// Column-major matrix; `row_count` is the size of each column vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixType {
    pub column_count: u32,
    pub row_count: u32,
    pub ty: PrimitiveType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Dim1D,
    Dim1DArray,
    Dim2D,
    Dim2DArray,
    Dim3D,
    Cubemap,
}
impl ImageType {
    /// Number of float components a sampling coordinate has for this
    /// dimension. Array layers count as one extra component.
    pub fn coordinate_count(self) -> u32 {
        match self {
            Self::Dim1D => 1,
            Self::Dim1DArray | Self::Dim2D => 2,
            Self::Dim2DArray | Self::Dim3D | Self::Cubemap => 3,
        }
    }
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Dim1D => "1D",
            Self::Dim1DArray => "1DArray",
            Self::Dim2D => "2D",
            Self::Dim2DArray => "2DArray",
            Self::Dim3D => "3D",
            Self::Cubemap => "Cube",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerType {
    pub dim: ImageType,
    pub sampled_type: PrimitiveType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructType {
    pub struct_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    NoType,
    // Named type as written in source, resolved to `Struct` by the sanitizer.
    Identifier(String),
    Primitive(PrimitiveType),
    Vector(VectorType),
    Matrix(MatrixType),
    Sampler(SamplerType),
    Struct(StructType),
    Uniform(Box<ExpressionType>),
}
impl ExpressionType {
    pub fn bool() -> Self {
        Self::Primitive(PrimitiveType::Boolean)
    }
    pub fn f32() -> Self {
        Self::Primitive(PrimitiveType::Float32)
    }
    pub fn i32() -> Self {
        Self::Primitive(PrimitiveType::Int32)
    }
    pub fn u32() -> Self {
        Self::Primitive(PrimitiveType::UInt32)
    }
    pub fn vec(component_count: u32, ty: PrimitiveType) -> Self {
        Self::Vector(VectorType { component_count, ty })
    }
    pub fn mat(column_count: u32, row_count: u32) -> Self {
        Self::Matrix(MatrixType {
            column_count,
            row_count,
            ty: PrimitiveType::Float32,
        })
    }
    pub fn sampler(dim: ImageType, sampled_type: PrimitiveType) -> Self {
        Self::Sampler(SamplerType { dim, sampled_type })
    }
    pub fn named(name: &str) -> Self {
        Self::Identifier(name.to_string())
    }
    pub fn structure(struct_index: usize) -> Self {
        Self::Struct(StructType { struct_index })
    }
    pub fn uniform(inner: ExpressionType) -> Self {
        Self::Uniform(Box::new(inner))
    }

    pub fn is_no_type(&self) -> bool {
        matches!(self, Self::NoType)
    }

    /// Component count of scalars and vectors.
    pub fn component_count(&self) -> Option<u32> {
        match self {
            Self::Primitive(_) => Some(1),
            Self::Vector(x) => Some(x.component_count),
            _ => None,
        }
    }
    pub fn component_type(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(x) => Some(*x),
            Self::Vector(x) => Some(x.ty),
            Self::Matrix(x) => Some(x.ty),
            _ => None,
        }
    }

    /// `uniform<T>` is a storage wrapper, member accesses see through it.
    pub fn unwrap_uniform(&self) -> &ExpressionType {
        match self {
            Self::Uniform(inner) => inner.unwrap_uniform(),
            _ => self,
        }
    }

    /// First unresolved identifier type found in this type, if any.
    pub fn unresolved_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            Self::Uniform(inner) => inner.unresolved_identifier(),
            _ => None,
        }
    }

    /// Textual spelling of the type; struct names come from `struct_name`.
    pub fn render(&self, struct_name: &mut dyn FnMut(usize) -> Result<String>) -> Result<String> {
        let out = match self {
            Self::NoType => "()".to_string(),
            Self::Identifier(name) => name.clone(),
            Self::Primitive(x) => x.name().to_string(),
            Self::Vector(x) => format!("vec{}<{}>", x.component_count, x.ty.name()),
            Self::Matrix(x) => {
                if x.column_count == x.row_count {
                    format!("mat{}<{}>", x.column_count, x.ty.name())
                } else {
                    format!("mat{}x{}<{}>", x.column_count, x.row_count, x.ty.name())
                }
            }
            Self::Sampler(x) => format!("sampler{}<{}>", x.dim.suffix(), x.sampled_type.name()),
            Self::Struct(x) => struct_name(x.struct_index)?,
            Self::Uniform(inner) => format!("uniform<{}>", inner.render(struct_name)?),
        };
        Ok(out)
    }
}
impl std::fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self
            .render(&mut |i| Ok(format!("struct#{}", i)))
            .map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageType {
    Fragment,
    Vertex,
}
impl ShaderStageType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Fragment => "fragment",
            Self::Vertex => "vertex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEntry {
    VertexPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructLayout {
    Std140,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: ExpressionType,
    pub location_index: Option<u32>,
    pub builtin: Option<BuiltinEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDescription {
    pub name: String,
    pub layout: Option<StructLayout>,
    pub members: Vec<StructMember>,
}
impl StructDescription {
    pub fn find_member(&self, name: &str) -> Option<(usize, &StructMember)> {
        self.members.iter()
            .enumerate()
            .find(|(_, member)| member.name == name)
    }
}
