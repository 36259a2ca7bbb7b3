use super::expr::Expr;
use super::ty::{ExpressionType, ShaderStageType, StructDescription};

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expr,
    pub statement: Box<Stmt>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtBranch {
    pub cond_statements: Vec<ConditionalBranch>,
    pub else_statement: Option<Box<Stmt>>,
}
/// Statement compiled only when an option is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtConditional {
    pub option_name: String,
    pub option_index: Option<usize>,
    pub statement: Box<Stmt>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalVar {
    pub name: String,
    pub ty: ExpressionType,
    pub binding_index: Option<u32>,
}
/// `var_index` is the index of the first variable, the following ones are
/// numbered consecutively.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDeclareExternal {
    pub external_vars: Vec<ExternalVar>,
    pub var_index: Option<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: ExpressionType,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDeclareFunction {
    pub name: String,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: ExpressionType,
    pub statements: Vec<Stmt>,
    pub entry_stage: Option<ShaderStageType>,
    pub func_index: Option<usize>,
    // Index of the first parameter.
    pub var_index: Option<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDeclareOption {
    pub opt_name: String,
    pub opt_type: ExpressionType,
    pub initial_value: Option<Expr>,
    pub opt_index: Option<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDeclareStruct {
    pub description: StructDescription,
    pub struct_index: Option<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDeclareVariable {
    pub var_name: String,
    pub var_type: ExpressionType,
    pub initial_expression: Option<Expr>,
    pub var_index: Option<usize>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtDiscard;
#[derive(Debug, Clone, PartialEq)]
pub struct StmtExpression {
    pub expr: Expr,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtMulti {
    pub statements: Vec<Stmt>,
}
#[derive(Debug, Clone, PartialEq)]
pub struct StmtNoOp;
#[derive(Debug, Clone, PartialEq)]
pub struct StmtReturn {
    pub return_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Branch(StmtBranch),
    Conditional(StmtConditional),
    DeclareExternal(StmtDeclareExternal),
    DeclareFunction(StmtDeclareFunction),
    DeclareOption(StmtDeclareOption),
    DeclareStruct(StmtDeclareStruct),
    DeclareVariable(StmtDeclareVariable),
    Discard(StmtDiscard),
    Expression(StmtExpression),
    Multi(StmtMulti),
    NoOp(StmtNoOp),
    Return(StmtReturn),
}
impl Stmt {
    pub fn is_no_op(&self) -> bool {
        matches!(self, Stmt::NoOp(_))
    }
}

crate::def_into_stmt!(
    Branch => "branch statement",
    Conditional => "conditional statement",
    DeclareExternal => "external declaration",
    DeclareFunction => "function declaration",
    DeclareOption => "option declaration",
    DeclareStruct => "struct declaration",
    DeclareVariable => "variable declaration",
    Discard => "discard statement",
    Expression => "expression statement",
    Multi => "statement list",
    NoOp => "no-op statement",
    Return => "return statement",
);
