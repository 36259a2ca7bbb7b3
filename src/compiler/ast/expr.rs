use super::ty::ExpressionType;
use crate::compiler::common::ConstantValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryType {
    Add,
    Subtract,
    Multiply,
    Divide,
    CompEq,
    CompGe,
    CompGt,
    CompLe,
    CompLt,
    CompNe,
}
impl BinaryType {
    pub fn is_comparison(self) -> bool {
        !matches!(self, Self::Add | Self::Subtract | Self::Multiply | Self::Divide)
    }
    // Equality works on booleans, the others need an ordering.
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::CompGe | Self::CompGt | Self::CompLe | Self::CompLt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryType {
    LogicalNot,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignType {
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicType {
    CrossProduct,
    DotProduct,
    Length,
    SampleTexture,
}
impl IntrinsicType {
    pub fn name(self) -> &'static str {
        match self {
            Self::CrossProduct => "cross",
            Self::DotProduct => "dot",
            Self::Length => "length",
            Self::SampleTexture => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwizzleComponent {
    First,
    Second,
    Third,
    Fourth,
}
impl SwizzleComponent {
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::Fourth => 3,
        }
    }
    pub fn letter(self) -> char {
        match self {
            Self::First => 'x',
            Self::Second => 'y',
            Self::Third => 'z',
            Self::Fourth => 'w',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionCategory {
    LValue,
    RValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAccessIdentifier {
    pub expr: Box<Expr>,
    pub identifiers: Vec<String>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprAccessIndex {
    pub expr: Box<Expr>,
    pub member_indices: Vec<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprAssign {
    pub op: AssignType,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprBinary {
    pub op: BinaryType,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprCast {
    pub target_type: ExpressionType,
    pub expressions: Vec<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprConditional {
    pub option_name: String,
    pub option_index: Option<usize>,
    pub true_path: Box<Expr>,
    pub false_path: Box<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprConstant {
    pub value: ConstantValue,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprIdentifier {
    pub name: String,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprIntrinsic {
    pub intrinsic: IntrinsicType,
    pub parameters: Vec<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprSwizzle {
    pub expr: Box<Expr>,
    pub components: Vec<SwizzleComponent>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprUnary {
    pub op: UnaryType,
    pub expr: Box<Expr>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExprVariable {
    pub variable_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    AccessIdentifier(ExprAccessIdentifier),
    AccessIndex(ExprAccessIndex),
    Assign(ExprAssign),
    Binary(ExprBinary),
    Cast(ExprCast),
    Conditional(ExprConditional),
    Constant(ExprConstant),
    Identifier(ExprIdentifier),
    Intrinsic(ExprIntrinsic),
    Swizzle(ExprSwizzle),
    Unary(ExprUnary),
    Variable(ExprVariable),
}

/// An expression node. `ty` is `None` until the sanitizer has typed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<ExpressionType>,
}
impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, ty: None }
    }

    pub fn category(&self) -> ExpressionCategory {
        match &self.kind {
            ExprKind::AccessIdentifier(_)
            | ExprKind::AccessIndex(_)
            | ExprKind::Identifier(_)
            | ExprKind::Variable(_) => ExpressionCategory::LValue,
            _ => ExpressionCategory::RValue,
        }
    }
}

crate::def_into_expr!(
    AccessIdentifier => "member access",
    AccessIndex => "member access",
    Assign => "assignment",
    Binary => "binary expression",
    Cast => "cast expression",
    Conditional => "conditional expression",
    Constant => "constant",
    Identifier => "identifier",
    Intrinsic => "intrinsic call",
    Swizzle => "swizzle",
    Unary => "unary expression",
    Variable => "variable",
);
