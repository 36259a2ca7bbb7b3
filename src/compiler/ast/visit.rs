//! Per-kind dispatch over the closed node enums. Implementors get a compile
//! error for every node kind they forget to handle.
use anyhow::Result;

use super::expr::*;
use super::stmt::*;

pub trait ExpressionVisitor {
    type Output;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output> {
        match &expr.kind {
            ExprKind::AccessIdentifier(x) => self.visit_access_identifier(expr, x),
            ExprKind::AccessIndex(x) => self.visit_access_index(expr, x),
            ExprKind::Assign(x) => self.visit_assign(expr, x),
            ExprKind::Binary(x) => self.visit_binary(expr, x),
            ExprKind::Cast(x) => self.visit_cast(expr, x),
            ExprKind::Conditional(x) => self.visit_conditional_expr(expr, x),
            ExprKind::Constant(x) => self.visit_constant(expr, x),
            ExprKind::Identifier(x) => self.visit_identifier(expr, x),
            ExprKind::Intrinsic(x) => self.visit_intrinsic(expr, x),
            ExprKind::Swizzle(x) => self.visit_swizzle(expr, x),
            ExprKind::Unary(x) => self.visit_unary(expr, x),
            ExprKind::Variable(x) => self.visit_variable(expr, x),
        }
    }

    fn visit_access_identifier(&mut self, expr: &Expr, node: &ExprAccessIdentifier) -> Result<Self::Output>;
    fn visit_access_index(&mut self, expr: &Expr, node: &ExprAccessIndex) -> Result<Self::Output>;
    fn visit_assign(&mut self, expr: &Expr, node: &ExprAssign) -> Result<Self::Output>;
    fn visit_binary(&mut self, expr: &Expr, node: &ExprBinary) -> Result<Self::Output>;
    fn visit_cast(&mut self, expr: &Expr, node: &ExprCast) -> Result<Self::Output>;
    fn visit_conditional_expr(&mut self, expr: &Expr, node: &ExprConditional) -> Result<Self::Output>;
    fn visit_constant(&mut self, expr: &Expr, node: &ExprConstant) -> Result<Self::Output>;
    fn visit_identifier(&mut self, expr: &Expr, node: &ExprIdentifier) -> Result<Self::Output>;
    fn visit_intrinsic(&mut self, expr: &Expr, node: &ExprIntrinsic) -> Result<Self::Output>;
    fn visit_swizzle(&mut self, expr: &Expr, node: &ExprSwizzle) -> Result<Self::Output>;
    fn visit_unary(&mut self, expr: &Expr, node: &ExprUnary) -> Result<Self::Output>;
    fn visit_variable(&mut self, expr: &Expr, node: &ExprVariable) -> Result<Self::Output>;
}

pub trait StatementVisitor {
    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Branch(x) => self.visit_branch(x),
            Stmt::Conditional(x) => self.visit_conditional_stmt(x),
            Stmt::DeclareExternal(x) => self.visit_declare_external(x),
            Stmt::DeclareFunction(x) => self.visit_declare_function(x),
            Stmt::DeclareOption(x) => self.visit_declare_option(x),
            Stmt::DeclareStruct(x) => self.visit_declare_struct(x),
            Stmt::DeclareVariable(x) => self.visit_declare_variable(x),
            Stmt::Discard(x) => self.visit_discard(x),
            Stmt::Expression(x) => self.visit_expression_stmt(x),
            Stmt::Multi(x) => self.visit_multi(x),
            Stmt::NoOp(x) => self.visit_no_op(x),
            Stmt::Return(x) => self.visit_return(x),
        }
    }

    fn visit_branch(&mut self, node: &StmtBranch) -> Result<()>;
    fn visit_conditional_stmt(&mut self, node: &StmtConditional) -> Result<()>;
    fn visit_declare_external(&mut self, node: &StmtDeclareExternal) -> Result<()>;
    fn visit_declare_function(&mut self, node: &StmtDeclareFunction) -> Result<()>;
    fn visit_declare_option(&mut self, node: &StmtDeclareOption) -> Result<()>;
    fn visit_declare_struct(&mut self, node: &StmtDeclareStruct) -> Result<()>;
    fn visit_declare_variable(&mut self, node: &StmtDeclareVariable) -> Result<()>;
    fn visit_discard(&mut self, node: &StmtDiscard) -> Result<()>;
    fn visit_expression_stmt(&mut self, node: &StmtExpression) -> Result<()>;
    fn visit_multi(&mut self, node: &StmtMulti) -> Result<()>;
    fn visit_no_op(&mut self, node: &StmtNoOp) -> Result<()>;
    fn visit_return(&mut self, node: &StmtReturn) -> Result<()>;
}
