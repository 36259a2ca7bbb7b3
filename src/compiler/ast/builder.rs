//! Terse constructors for raw (unsanitized) nodes.
use super::*;
use crate::compiler::common::ConstantValue;

pub fn constant(value: ConstantValue) -> Expr {
    ExprConstant { value }.into_expr()
}
pub fn identifier(name: &str) -> Expr {
    ExprIdentifier {
        name: name.to_string(),
    }.into_expr()
}
pub fn variable(variable_index: usize) -> Expr {
    ExprVariable { variable_index }.into_expr()
}
pub fn binary(op: BinaryType, left: Expr, right: Expr) -> Expr {
    ExprBinary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }.into_expr()
}
pub fn unary(op: UnaryType, expr: Expr) -> Expr {
    ExprUnary {
        op,
        expr: Box::new(expr),
    }.into_expr()
}
pub fn assign(left: Expr, right: Expr) -> Expr {
    ExprAssign {
        op: AssignType::Simple,
        left: Box::new(left),
        right: Box::new(right),
    }.into_expr()
}
pub fn cast(target_type: ExpressionType, expressions: Vec<Expr>) -> Expr {
    ExprCast {
        target_type,
        expressions,
    }.into_expr()
}
pub fn swizzle(expr: Expr, components: &[SwizzleComponent]) -> Expr {
    ExprSwizzle {
        expr: Box::new(expr),
        components: components.to_vec(),
    }.into_expr()
}
pub fn access_member(expr: Expr, identifiers: &[&str]) -> Expr {
    ExprAccessIdentifier {
        expr: Box::new(expr),
        identifiers: identifiers.iter().map(|x| x.to_string()).collect(),
    }.into_expr()
}
pub fn access_index(expr: Expr, member_indices: Vec<usize>) -> Expr {
    ExprAccessIndex {
        expr: Box::new(expr),
        member_indices,
    }.into_expr()
}
pub fn select_opt(option_name: &str, true_path: Expr, false_path: Expr) -> Expr {
    ExprConditional {
        option_name: option_name.to_string(),
        option_index: None,
        true_path: Box::new(true_path),
        false_path: Box::new(false_path),
    }.into_expr()
}
pub fn intrinsic(intrinsic: IntrinsicType, parameters: Vec<Expr>) -> Expr {
    ExprIntrinsic {
        intrinsic,
        parameters,
    }.into_expr()
}

pub fn member(name: &str, ty: ExpressionType) -> StructMember {
    StructMember {
        name: name.to_string(),
        ty,
        location_index: None,
        builtin: None,
    }
}
pub fn location_member(name: &str, ty: ExpressionType, location_index: u32) -> StructMember {
    StructMember {
        location_index: Some(location_index),
        ..member(name, ty)
    }
}
pub fn builtin_member(name: &str, ty: ExpressionType, builtin: BuiltinEntry) -> StructMember {
    StructMember {
        builtin: Some(builtin),
        ..member(name, ty)
    }
}
pub fn declare_struct(name: &str, layout: Option<StructLayout>, members: Vec<StructMember>) -> Stmt {
    StmtDeclareStruct {
        description: StructDescription {
            name: name.to_string(),
            layout,
            members,
        },
        struct_index: None,
    }.into_stmt()
}

pub fn external_var(name: &str, ty: ExpressionType, binding_index: Option<u32>) -> ExternalVar {
    ExternalVar {
        name: name.to_string(),
        ty,
        binding_index,
    }
}
pub fn declare_external(external_vars: Vec<ExternalVar>) -> Stmt {
    StmtDeclareExternal {
        external_vars,
        var_index: None,
    }.into_stmt()
}

pub fn parameter(name: &str, ty: ExpressionType) -> FunctionParameter {
    FunctionParameter {
        name: name.to_string(),
        ty,
    }
}
pub fn declare_function(
    name: &str,
    parameters: Vec<FunctionParameter>,
    return_type: ExpressionType,
    statements: Vec<Stmt>,
) -> Stmt {
    StmtDeclareFunction {
        name: name.to_string(),
        parameters,
        return_type,
        statements,
        entry_stage: None,
        func_index: None,
        var_index: None,
    }.into_stmt()
}
pub fn entry_function(
    stage: ShaderStageType,
    name: &str,
    parameters: Vec<FunctionParameter>,
    return_type: ExpressionType,
    statements: Vec<Stmt>,
) -> Stmt {
    StmtDeclareFunction {
        name: name.to_string(),
        parameters,
        return_type,
        statements,
        entry_stage: Some(stage),
        func_index: None,
        var_index: None,
    }.into_stmt()
}

pub fn declare_option(opt_name: &str, opt_type: ExpressionType, initial_value: Option<Expr>) -> Stmt {
    StmtDeclareOption {
        opt_name: opt_name.to_string(),
        opt_type,
        initial_value,
        opt_index: None,
    }.into_stmt()
}
pub fn declare_variable(var_name: &str, var_type: ExpressionType, initial_expression: Option<Expr>) -> Stmt {
    StmtDeclareVariable {
        var_name: var_name.to_string(),
        var_type,
        initial_expression,
        var_index: None,
    }.into_stmt()
}

pub fn branch(condition: Expr, statement: Stmt, else_statement: Option<Stmt>) -> Stmt {
    branch_chain(vec![(condition, statement)], else_statement)
}
pub fn branch_chain(cond_statements: Vec<(Expr, Stmt)>, else_statement: Option<Stmt>) -> Stmt {
    StmtBranch {
        cond_statements: cond_statements.into_iter()
            .map(|(condition, statement)| ConditionalBranch {
                condition,
                statement: Box::new(statement),
            })
            .collect(),
        else_statement: else_statement.map(Box::new),
    }.into_stmt()
}
pub fn conditional(option_name: &str, statement: Stmt) -> Stmt {
    StmtConditional {
        option_name: option_name.to_string(),
        option_index: None,
        statement: Box::new(statement),
    }.into_stmt()
}
pub fn discard() -> Stmt {
    StmtDiscard.into_stmt()
}
pub fn expression(expr: Expr) -> Stmt {
    StmtExpression { expr }.into_stmt()
}
pub fn multi(statements: Vec<Stmt>) -> Stmt {
    StmtMulti { statements }.into_stmt()
}
pub fn no_op() -> Stmt {
    StmtNoOp.into_stmt()
}
pub fn return_value(expr: Expr) -> Stmt {
    StmtReturn {
        return_expr: Some(expr),
    }.into_stmt()
}
pub fn return_void() -> Stmt {
    StmtReturn { return_expr: None }.into_stmt()
}
