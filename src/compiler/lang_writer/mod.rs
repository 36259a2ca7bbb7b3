//! Textual Backend
//!
//! Renders a sanitized AST back into the shading language source form.
use std::collections::HashMap;
use anyhow::{bail, Result};

use super::ast::*;
use super::common::InternalError;
use super::sanitize::SanitizedAst;
use super::writer::{
    format_constant, format_type, join_statements, Attribute, Environment,
    StateGuard, StatefulWriter, TextBuffer, Writer,
};

#[cfg(test)]
mod tests;

#[derive(Default)]
pub struct LangWriter {
    state: Option<State>,
}
impl LangWriter {
    pub fn new() -> Self {
        Default::default()
    }
}
impl StatefulWriter for LangWriter {
    type State = State;
    fn state_slot(&mut self) -> &mut Option<State> {
        &mut self.state
    }
}
impl Writer for LangWriter {
    type Output = String;

    fn generate(&mut self, ast: &SanitizedAst, _env: &Environment) -> Result<String> {
        let mut guard = StateGuard::install(self, State::default());
        let state = guard.state()?;
        for option in ast.options.iter() {
            state.register_option(option.index, &option.name)?;
        }
        state.append_header();
        state.visit_stmt(&ast.root)?;

        let out = std::mem::take(&mut state.buf).finish();
        log::debug!("generated {} bytes of shader source", out.len());
        Ok(out)
    }
}

/// Per-call writer state. Names are registered as their declarations are
/// visited.
#[derive(Default)]
pub struct State {
    buf: TextBuffer,
    option_names: HashMap<usize, String>,
    structs: HashMap<usize, StructDescription>,
    variable_names: HashMap<usize, String>,
}
impl State {
    fn append(&mut self, txt: &str) {
        self.buf.append(txt);
    }
    fn append_line(&mut self, txt: &str) {
        self.buf.append_line(txt);
    }
    fn append_type(&mut self, ty: &ExpressionType) -> Result<()> {
        let structs = &self.structs;
        let txt = format_type(ty, |i| structs.get(&i).map(|x| x.name.clone()))?;
        self.buf.append(&txt);
        Ok(())
    }

    fn append_header(&mut self) {
        // The source form has no header yet.
    }

    fn register_option(&mut self, index: usize, name: &str) -> Result<()> {
        if self.option_names.insert(index, name.to_string()).is_some() {
            bail!(InternalError::DuplicateIndex { kind: "option", index });
        }
        Ok(())
    }
    fn register_struct(&mut self, index: usize, desc: &StructDescription) -> Result<()> {
        if self.structs.insert(index, desc.clone()).is_some() {
            bail!(InternalError::DuplicateIndex { kind: "struct", index });
        }
        Ok(())
    }
    fn register_variable(&mut self, index: usize, name: &str) -> Result<()> {
        if self.variable_names.insert(index, name.to_string()).is_some() {
            bail!(InternalError::DuplicateIndex { kind: "variable", index });
        }
        Ok(())
    }

    fn option_name(&self, index: Option<usize>) -> Result<String> {
        let index = index.ok_or(InternalError::UnsanitizedNode("conditional"))?;
        self.option_names.get(&index)
            .cloned()
            .ok_or_else(|| InternalError::UnregisteredIndex { kind: "option", index }.into())
    }
    fn struct_desc(&self, index: usize) -> Result<&StructDescription> {
        self.structs.get(&index)
            .ok_or_else(|| InternalError::UnregisteredIndex { kind: "struct", index }.into())
    }

    /// Visits `expr`, wrapped in parentheses unless it is an lvalue.
    fn visit_enclosed(&mut self, expr: &Expr) -> Result<()> {
        let enclose = expr.category() != ExpressionCategory::LValue;
        if enclose {
            self.append("(");
        }
        self.visit_expr(expr)?;
        if enclose {
            self.append(")");
        }
        Ok(())
    }

    fn visit_separated(&mut self, exprs: &[Expr]) -> Result<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i != 0 {
                self.append(", ");
            }
            self.visit_expr(expr)?;
        }
        Ok(())
    }

    fn append_statement_list(&mut self, statements: &[Stmt]) -> Result<()> {
        join_statements(
            self,
            statements,
            |x| {
                x.append_line("");
                Ok(())
            },
            |x, stmt| x.visit_stmt(stmt),
        )
    }

    fn append_field(&mut self, struct_index: usize, member_indices: &[usize]) -> Result<()> {
        let mut struct_index = struct_index;
        for (i, member_index) in member_indices.iter().enumerate() {
            let desc = self.struct_desc(struct_index)?;
            let member = desc.members.get(*member_index)
                .ok_or(InternalError::UnregisteredIndex { kind: "member", index: *member_index })?;
            let name = member.name.clone();
            let next = match &member.ty {
                ExpressionType::Struct(x) => Some(x.struct_index),
                _ => None,
            };
            self.append(".");
            self.append(&name);

            if i + 1 < member_indices.len() {
                struct_index = match next {
                    Some(x) => x,
                    None => bail!(InternalError::NotAddressable("member of a non-struct value")),
                };
            }
        }
        Ok(())
    }
}

fn typed(expr: &Expr) -> Result<&ExpressionType> {
    expr.ty.as_ref()
        .ok_or_else(|| InternalError::UnsanitizedNode(expr.kind.describe()).into())
}

impl ExpressionVisitor for State {
    type Output = ();

    fn visit_access_identifier(&mut self, expr: &Expr, _: &ExprAccessIdentifier) -> Result<()> {
        bail!(InternalError::UnsanitizedNode(expr.kind.describe()))
    }
    fn visit_access_index(&mut self, _: &Expr, node: &ExprAccessIndex) -> Result<()> {
        self.visit_enclosed(&node.expr)?;
        let struct_index = match typed(&node.expr)?.unwrap_uniform() {
            ExpressionType::Struct(x) => x.struct_index,
            _ => bail!(InternalError::NotAddressable("member of a non-struct value")),
        };
        self.append_field(struct_index, &node.member_indices)
    }
    fn visit_assign(&mut self, _: &Expr, node: &ExprAssign) -> Result<()> {
        self.visit_expr(&node.left)?;
        match node.op {
            AssignType::Simple => self.append(" = "),
        }
        self.visit_expr(&node.right)
    }
    fn visit_binary(&mut self, _: &Expr, node: &ExprBinary) -> Result<()> {
        self.visit_enclosed(&node.left)?;
        let op = match node.op {
            BinaryType::Add => " + ",
            BinaryType::Subtract => " - ",
            BinaryType::Multiply => " * ",
            BinaryType::Divide => " / ",
            BinaryType::CompEq => " == ",
            BinaryType::CompGe => " >= ",
            BinaryType::CompGt => " > ",
            BinaryType::CompLe => " <= ",
            BinaryType::CompLt => " < ",
            BinaryType::CompNe => " != ",
        };
        self.append(op);
        self.visit_enclosed(&node.right)
    }
    fn visit_cast(&mut self, _: &Expr, node: &ExprCast) -> Result<()> {
        self.append_type(&node.target_type)?;
        self.append("(");
        self.visit_separated(&node.expressions)?;
        self.append(")");
        Ok(())
    }
    fn visit_conditional_expr(&mut self, _: &Expr, node: &ExprConditional) -> Result<()> {
        let name = self.option_name(node.option_index)?;
        self.append(&format!("select_opt({}, ", name));
        self.visit_expr(&node.true_path)?;
        self.append(", ");
        self.visit_expr(&node.false_path)?;
        self.append(")");
        Ok(())
    }
    fn visit_constant(&mut self, _: &Expr, node: &ExprConstant) -> Result<()> {
        self.append(&format_constant(&node.value));
        Ok(())
    }
    fn visit_identifier(&mut self, expr: &Expr, _: &ExprIdentifier) -> Result<()> {
        bail!(InternalError::UnsanitizedNode(expr.kind.describe()))
    }
    fn visit_intrinsic(&mut self, _: &Expr, node: &ExprIntrinsic) -> Result<()> {
        self.append(node.intrinsic.name());
        self.append("(");
        self.visit_separated(&node.parameters)?;
        self.append(")");
        Ok(())
    }
    fn visit_swizzle(&mut self, _: &Expr, node: &ExprSwizzle) -> Result<()> {
        self.visit_enclosed(&node.expr)?;
        let components = node.components.iter()
            .map(|x| x.letter())
            .collect::<String>();
        self.append(".");
        self.append(&components);
        Ok(())
    }
    fn visit_unary(&mut self, _: &Expr, node: &ExprUnary) -> Result<()> {
        let op = match node.op {
            UnaryType::LogicalNot => "!",
            UnaryType::Minus => "-",
            UnaryType::Plus => "+",
        };
        self.append(op);
        self.visit_enclosed(&node.expr)
    }
    fn visit_variable(&mut self, _: &Expr, node: &ExprVariable) -> Result<()> {
        let name = self.variable_names.get(&node.variable_index)
            .cloned()
            .ok_or(InternalError::UnregisteredIndex { kind: "variable", index: node.variable_index })?;
        self.append(&name);
        Ok(())
    }
}

impl StatementVisitor for State {
    fn visit_branch(&mut self, node: &StmtBranch) -> Result<()> {
        let count = node.cond_statements.len();
        for (i, branch) in node.cond_statements.iter().enumerate() {
            if i != 0 {
                self.append("else ");
            }
            self.append("if (");
            self.visit_expr(&branch.condition)?;
            self.append_line(")");

            self.buf.enter_scope();
            self.visit_stmt(&branch.statement)?;
            let is_last = i + 1 == count && node.else_statement.is_none();
            self.buf.leave_scope(!is_last)?;
        }

        if let Some(else_statement) = &node.else_statement {
            self.append_line("else");
            self.buf.enter_scope();
            self.visit_stmt(else_statement)?;
            self.buf.leave_scope(false)?;
        }
        Ok(())
    }
    fn visit_conditional_stmt(&mut self, node: &StmtConditional) -> Result<()> {
        let name = self.option_name(node.option_index)?;
        self.append(&format!("[{}]", Attribute::Opt(name)));
        self.visit_stmt(&node.statement)
    }
    fn visit_declare_external(&mut self, node: &StmtDeclareExternal) -> Result<()> {
        let mut var_index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("external declaration"))?;

        self.append_line("external");
        self.buf.enter_scope();
        for (i, var) in node.external_vars.iter().enumerate() {
            if i != 0 {
                self.append_line(",");
            }
            self.buf.append_attributes(false, &[var.binding_index.map(Attribute::Binding)]);
            self.append(&var.name);
            self.append(": ");
            self.append_type(&var.ty)?;

            self.register_variable(var_index, &var.name)?;
            var_index += 1;
        }
        self.buf.leave_scope(false)?;
        Ok(())
    }
    fn visit_declare_function(&mut self, node: &StmtDeclareFunction) -> Result<()> {
        let mut var_index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("function declaration"))?;

        let entry = node.entry_stage.map(|stage| match stage {
            ShaderStageType::Fragment => Attribute::Entry("frag"),
            ShaderStageType::Vertex => Attribute::Entry("vert"),
        });
        self.buf.append_attributes(true, &[entry]);
        self.append(&format!("fn {}(", node.name));
        for (i, param) in node.parameters.iter().enumerate() {
            if i != 0 {
                self.append(", ");
            }
            self.append(&param.name);
            self.append(": ");
            self.append_type(&param.ty)?;

            self.register_variable(var_index, &param.name)?;
            var_index += 1;
        }
        self.append(")");
        if !node.return_type.is_no_type() {
            self.append(" -> ");
            self.append_type(&node.return_type)?;
        }

        self.append_line("");
        self.buf.enter_scope();
        self.append_statement_list(&node.statements)?;
        self.buf.leave_scope(false)?;
        Ok(())
    }
    fn visit_declare_option(&mut self, node: &StmtDeclareOption) -> Result<()> {
        let index = node.opt_index
            .ok_or(InternalError::UnsanitizedNode("option declaration"))?;
        if self.option_names.get(&index) != Some(&node.opt_name) {
            bail!(InternalError::UnregisteredIndex { kind: "option", index });
        }

        self.append(&format!("option {}: ", node.opt_name));
        self.append_type(&node.opt_type)?;
        if let Some(initial_value) = &node.initial_value {
            self.append(" = ");
            self.visit_expr(initial_value)?;
        }
        self.append(";");
        Ok(())
    }
    fn visit_declare_struct(&mut self, node: &StmtDeclareStruct) -> Result<()> {
        let index = node.struct_index
            .ok_or(InternalError::UnsanitizedNode("struct declaration"))?;
        self.register_struct(index, &node.description)?;

        let layout = node.description.layout.map(|layout| match layout {
            StructLayout::Std140 => Attribute::Layout("std140"),
        });
        self.buf.append_attributes(true, &[layout]);
        self.append("struct ");
        self.append_line(&node.description.name);
        self.buf.enter_scope();
        for (i, member) in node.description.members.iter().enumerate() {
            if i != 0 {
                self.append_line(",");
            }
            let builtin = member.builtin.map(|x| match x {
                BuiltinEntry::VertexPosition => Attribute::Builtin,
            });
            self.buf.append_attributes(false, &[member.location_index.map(Attribute::Location), builtin]);
            self.append(&member.name);
            self.append(": ");
            self.append_type(&member.ty)?;
        }
        self.buf.leave_scope(false)?;
        Ok(())
    }
    fn visit_declare_variable(&mut self, node: &StmtDeclareVariable) -> Result<()> {
        let index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("variable declaration"))?;
        self.register_variable(index, &node.var_name)?;

        self.append(&format!("let {}: ", node.var_name));
        self.append_type(&node.var_type)?;
        if let Some(initial_expression) = &node.initial_expression {
            self.append(" = ");
            self.visit_expr(initial_expression)?;
        }
        self.append(";");
        Ok(())
    }
    fn visit_discard(&mut self, _: &StmtDiscard) -> Result<()> {
        self.append("discard;");
        Ok(())
    }
    fn visit_expression_stmt(&mut self, node: &StmtExpression) -> Result<()> {
        self.visit_expr(&node.expr)?;
        self.append(";");
        Ok(())
    }
    fn visit_multi(&mut self, node: &StmtMulti) -> Result<()> {
        self.append_statement_list(&node.statements)
    }
    fn visit_no_op(&mut self, _: &StmtNoOp) -> Result<()> {
        Ok(())
    }
    fn visit_return(&mut self, node: &StmtReturn) -> Result<()> {
        match &node.return_expr {
            Some(expr) => {
                self.append("return ");
                self.visit_expr(expr)?;
                self.append(";");
            }
            None => self.append("return;"),
        }
        Ok(())
    }
}
