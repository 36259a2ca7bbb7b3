//! Semantic Analysis
//!
//! Turns a raw AST into one that is safe to hand to a writer: every
//! identifier is resolved to a dense symbol index, every expression is typed
//! and every declaration is checked against the others. The first violation
//! aborts the pass and no partial tree is returned.
use std::collections::HashMap;
use anyhow::{bail, Result};

use super::ast::*;
use super::common::{ConstantValue, InternalError, SemanticError};

#[cfg(test)]
mod tests;

/// What to do with option-gated code.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConditionalResolution {
    /// Keep conditional statements and expressions, backends decide.
    #[default]
    Deferred,
    /// Fold gates at sanitize time. Options missing from the map fall back
    /// to their constant initializer, then to `false`.
    Resolve(HashMap<String, bool>),
}

#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    pub remove_option_declaration: bool,
    pub conditional_resolution: ConditionalResolution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescription {
    pub index: usize,
    pub name: String,
    pub ty: ExpressionType,
    pub default_value: Option<ConstantValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryPointDescription {
    pub stage: ShaderStageType,
    pub func_index: usize,
    pub name: String,
}

/// Output of the sanitizer. `structs` and `options` are indexed by their
/// symbol index.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedAst {
    pub root: Stmt,
    pub options: Vec<OptionDescription>,
    pub structs: Vec<StructDescription>,
    pub entry_points: Vec<EntryPointDescription>,
}

#[derive(Debug, Clone)]
enum Symbol {
    Variable { index: usize },
    Option { index: usize },
    Struct { index: usize },
    Function,
}
impl Symbol {
    fn kind_name(&self) -> &'static str {
        match self {
            Symbol::Variable { .. } => "variable",
            Symbol::Option { .. } => "option",
            Symbol::Struct { .. } => "struct",
            Symbol::Function => "function",
        }
    }
}

struct FunctionContext {
    return_type: ExpressionType,
}

pub struct Sanitizer<'a> {
    options: &'a SanitizeOptions,
    scopes: Vec<HashMap<String, Symbol>>,
    variable_types: Vec<ExpressionType>,
    option_table: Vec<OptionDescription>,
    structs: Vec<StructDescription>,
    function_count: usize,
    entry_points: Vec<EntryPointDescription>,
    function: Option<FunctionContext>,
}
impl<'a> Sanitizer<'a> {
    fn new(options: &'a SanitizeOptions) -> Self {
        Self {
            options,
            scopes: vec![],
            variable_types: vec![],
            option_table: vec![],
            structs: vec![],
            function_count: 0,
            entry_points: vec![],
            function: None,
        }
    }

    pub fn apply(root: Stmt, options: &SanitizeOptions) -> Result<SanitizedAst> {
        let mut x = Sanitizer::new(options);
        x.push_scope();
        let root = x.sanitize_stmt(root)?;
        x.pop_scope();

        log::debug!(
            "sanitized module: {} variables, {} options, {} structs, {} functions",
            x.variable_types.len(),
            x.option_table.len(),
            x.structs.len(),
            x.function_count,
        );

        Ok(SanitizedAst {
            root,
            options: x.option_table,
            structs: x.structs,
            entry_points: x.entry_points,
        })
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }
    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
    fn is_global_scope(&self) -> bool {
        self.scopes.len() <= 1 && self.function.is_none()
    }

    fn declare(&mut self, name: &str, symbol: Symbol) -> Result<()> {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => bail!(InternalError::Unsupported("declaration outside of any scope".to_string())),
        };
        if scope.contains_key(name) {
            bail!(SemanticError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        scope.insert(name.to_string(), symbol);
        Ok(())
    }
    fn lookup(&self, name: &str) -> Result<&Symbol> {
        for frame in self.scopes.iter().rev() {
            if let Some(x) = frame.get(name) {
                return Ok(x);
            }
        }
        bail!(SemanticError::UndeclaredIdentifier {
            name: name.to_string(),
        })
    }

    fn declare_variable(&mut self, name: &str, ty: ExpressionType) -> Result<usize> {
        let index = self.variable_types.len();
        self.declare(name, Symbol::Variable { index })?;
        self.variable_types.push(ty);
        Ok(index)
    }

    fn lookup_option(&self, name: &str) -> Result<usize> {
        match self.lookup(name)? {
            Symbol::Option { index } => Ok(*index),
            other => bail!(SemanticError::UnexpectedSymbol {
                name: name.to_string(),
                expected: "option",
                found: other.kind_name(),
            }),
        }
    }

    fn resolves_conditionals(&self) -> bool {
        matches!(self.options.conditional_resolution, ConditionalResolution::Resolve(_))
    }
    fn resolve_option(&self, index: usize) -> bool {
        let option = &self.option_table[index];
        let overridden = match &self.options.conditional_resolution {
            ConditionalResolution::Resolve(values) => values.get(&option.name).copied(),
            ConditionalResolution::Deferred => None,
        };
        overridden
            .or_else(|| option.default_value.and_then(|x| x.as_bool()))
            .unwrap_or(false)
    }

    fn struct_desc(&self, struct_index: usize) -> Result<&StructDescription> {
        match self.structs.get(struct_index) {
            Some(x) => Ok(x),
            None => bail!(SemanticError::UndeclaredIdentifier {
                name: format!("struct#{}", struct_index),
            }),
        }
    }

    fn describe(&self, ty: &ExpressionType) -> String {
        let structs = &self.structs;
        ty.render(&mut |i| {
            Ok(structs.get(i).map(|x| x.name.clone()).unwrap_or_else(|| format!("struct#{}", i)))
        }).unwrap_or_else(|_| ty.to_string())
    }

    fn mismatch(&self, node: &'static str, expected: &ExpressionType, found: &ExpressionType) -> anyhow::Error {
        SemanticError::TypeMismatch {
            node,
            expected: self.describe(expected),
            found: self.describe(found),
        }.into()
    }
    fn mismatch_with(&self, node: &'static str, expected: &str, found: &ExpressionType) -> anyhow::Error {
        SemanticError::TypeMismatch {
            node,
            expected: expected.to_string(),
            found: self.describe(found),
        }.into()
    }

    fn require_std140(&self, struct_index: usize) -> Result<()> {
        let desc = self.struct_desc(struct_index)?;
        if desc.layout != Some(StructLayout::Std140) {
            bail!(SemanticError::MissingLayout {
                struct_name: desc.name.clone(),
            });
        }
        Ok(())
    }

    /// Resolves named types to struct indices and checks shape constraints.
    fn resolve_type(&self, ty: ExpressionType) -> Result<ExpressionType> {
        let out = match ty {
            ExpressionType::Identifier(name) => {
                match self.lookup(&name)? {
                    Symbol::Struct { index } => ExpressionType::structure(*index),
                    other => bail!(SemanticError::UnexpectedSymbol {
                        name,
                        expected: "struct",
                        found: other.kind_name(),
                    }),
                }
            }
            ExpressionType::Struct(x) => {
                self.struct_desc(x.struct_index)?;
                ExpressionType::Struct(x)
            }
            ExpressionType::Uniform(inner) => {
                let inner = self.resolve_type(*inner)?;
                match &inner {
                    ExpressionType::Struct(x) => self.require_std140(x.struct_index)?,
                    _ => return Err(self.mismatch_with("uniform type", "a struct", &inner)),
                }
                ExpressionType::uniform(inner)
            }
            ExpressionType::Vector(x) => {
                if !(2..=4).contains(&x.component_count) {
                    bail!(SemanticError::ArityMismatch {
                        node: "vector type",
                        expected: 4,
                        found: x.component_count as usize,
                    });
                }
                ExpressionType::Vector(x)
            }
            ExpressionType::Matrix(x) => {
                if !(2..=4).contains(&x.column_count) || !(2..=4).contains(&x.row_count) {
                    bail!(SemanticError::ArityMismatch {
                        node: "matrix type",
                        expected: 4,
                        found: x.column_count.max(x.row_count) as usize,
                    });
                }
                if x.ty != PrimitiveType::Float32 {
                    return Err(self.mismatch_with("matrix type", "f32 components", &ExpressionType::Primitive(x.ty)));
                }
                ExpressionType::Matrix(x)
            }
            other => other,
        };
        Ok(out)
    }

    fn finish_expr(prior: Option<ExpressionType>, kind: ExprKind, ty: ExpressionType) -> Result<Expr> {
        if let Some(prior) = prior {
            if prior != ty {
                bail!(InternalError::Unsupported(format!(
                    "retyping {} from {} to {}", kind.describe(), prior, ty,
                )));
            }
        }
        Ok(Expr {
            kind,
            ty: Some(ty),
        })
    }

    fn sanitize_exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
        exprs.into_iter()
            .map(|x| self.sanitize_expr(x))
            .collect::<Result<Vec<_>>>()
    }

    pub fn sanitize_expr(&mut self, expr: Expr) -> Result<Expr> {
        let Expr { kind, ty: prior } = expr;
        let (kind, ty) = match kind {
            ExprKind::AccessIdentifier(x) => {
                let inner = self.sanitize_expr(*x.expr)?;
                if x.identifiers.is_empty() {
                    bail!(SemanticError::ArityMismatch {
                        node: "member access",
                        expected: 1,
                        found: 0,
                    });
                }
                let mut ty = expr_type(&inner)?.clone();
                let mut member_indices = Vec::with_capacity(x.identifiers.len());
                for identifier in x.identifiers.iter() {
                    let desc = self.container_struct(&ty)?;
                    let (index, member) = desc.find_member(identifier)
                        .ok_or_else(|| SemanticError::UnknownMember {
                            struct_name: desc.name.clone(),
                            member: identifier.clone(),
                        })?;
                    member_indices.push(index);
                    ty = member.ty.clone();
                }
                let kind = ExprKind::AccessIndex(ExprAccessIndex {
                    expr: Box::new(inner),
                    member_indices,
                });
                (kind, ty)
            }
            ExprKind::AccessIndex(x) => {
                let inner = self.sanitize_expr(*x.expr)?;
                if x.member_indices.is_empty() {
                    bail!(SemanticError::ArityMismatch {
                        node: "member access",
                        expected: 1,
                        found: 0,
                    });
                }
                let mut ty = expr_type(&inner)?.clone();
                for index in x.member_indices.iter() {
                    let desc = self.container_struct(&ty)?;
                    let member = desc.members.get(*index)
                        .ok_or_else(|| SemanticError::MemberIndexOutOfRange {
                            struct_name: desc.name.clone(),
                            index: *index,
                        })?;
                    ty = member.ty.clone();
                }
                let kind = ExprKind::AccessIndex(ExprAccessIndex {
                    expr: Box::new(inner),
                    member_indices: x.member_indices,
                });
                (kind, ty)
            }
            ExprKind::Assign(x) => {
                let left = self.sanitize_expr(*x.left)?;
                if left.category() != ExpressionCategory::LValue {
                    bail!(SemanticError::NotAssignable {
                        node: left.kind.describe(),
                    });
                }
                let right = self.sanitize_expr(*x.right)?;
                let left_ty = expr_type(&left)?;
                let right_ty = expr_type(&right)?;
                if left_ty != right_ty {
                    return Err(self.mismatch("assignment", left_ty, right_ty));
                }
                let ty = left_ty.clone();
                let kind = ExprKind::Assign(ExprAssign {
                    op: x.op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
                (kind, ty)
            }
            ExprKind::Binary(x) => {
                let left = self.sanitize_expr(*x.left)?;
                let right = self.sanitize_expr(*x.right)?;
                let ty = self.binary_type(x.op, expr_type(&left)?, expr_type(&right)?)?;
                let kind = ExprKind::Binary(ExprBinary {
                    op: x.op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
                (kind, ty)
            }
            ExprKind::Cast(x) => {
                let target_type = self.resolve_type(x.target_type)?;
                let expressions = self.sanitize_exprs(x.expressions)?;
                self.check_cast(&target_type, &expressions)?;
                let ty = target_type.clone();
                let kind = ExprKind::Cast(ExprCast {
                    target_type,
                    expressions,
                });
                (kind, ty)
            }
            ExprKind::Conditional(x) => {
                let option_index = self.lookup_option(&x.option_name)?;
                let option_ty = &self.option_table[option_index].ty;
                if *option_ty != ExpressionType::bool() {
                    return Err(self.mismatch("conditional expression", &ExpressionType::bool(), option_ty));
                }

                if self.resolves_conditionals() {
                    let path = if self.resolve_option(option_index) {
                        x.true_path
                    } else {
                        x.false_path
                    };
                    let path = self.sanitize_expr(*path)?;
                    let ty = expr_type(&path)?.clone();
                    return Self::finish_expr(prior, path.kind, ty);
                }

                let true_path = self.sanitize_expr(*x.true_path)?;
                let false_path = self.sanitize_expr(*x.false_path)?;
                let true_ty = expr_type(&true_path)?;
                let false_ty = expr_type(&false_path)?;
                if true_ty != false_ty {
                    return Err(self.mismatch("conditional expression", true_ty, false_ty));
                }
                let ty = true_ty.clone();
                let kind = ExprKind::Conditional(ExprConditional {
                    option_name: x.option_name,
                    option_index: Some(option_index),
                    true_path: Box::new(true_path),
                    false_path: Box::new(false_path),
                });
                (kind, ty)
            }
            ExprKind::Constant(x) => {
                let ty = x.value.ty();
                (ExprKind::Constant(x), ty)
            }
            ExprKind::Identifier(x) => {
                let index = match self.lookup(&x.name)? {
                    Symbol::Variable { index } => *index,
                    other => bail!(SemanticError::UnexpectedSymbol {
                        name: x.name,
                        expected: "variable",
                        found: other.kind_name(),
                    }),
                };
                let ty = self.variable_types[index].clone();
                (ExprKind::Variable(ExprVariable { variable_index: index }), ty)
            }
            ExprKind::Intrinsic(x) => {
                let parameters = self.sanitize_exprs(x.parameters)?;
                let ty = self.intrinsic_type(x.intrinsic, &parameters)?;
                let kind = ExprKind::Intrinsic(ExprIntrinsic {
                    intrinsic: x.intrinsic,
                    parameters,
                });
                (kind, ty)
            }
            ExprKind::Swizzle(x) => {
                let inner = self.sanitize_expr(*x.expr)?;
                let vector = match expr_type(&inner)? {
                    ExpressionType::Vector(v) => *v,
                    other => return Err(self.mismatch_with("swizzle", "a vector", other)),
                };
                let count = x.components.len();
                if !(1..=4).contains(&count) {
                    bail!(SemanticError::InvalidSwizzleCount(count));
                }
                for component in x.components.iter() {
                    if component.index() >= vector.component_count as usize {
                        bail!(SemanticError::SwizzleOutOfRange {
                            component: component.index(),
                            count: vector.component_count,
                        });
                    }
                }
                let ty = if count == 1 {
                    ExpressionType::Primitive(vector.ty)
                } else {
                    ExpressionType::vec(count as u32, vector.ty)
                };
                let kind = ExprKind::Swizzle(ExprSwizzle {
                    expr: Box::new(inner),
                    components: x.components,
                });
                (kind, ty)
            }
            ExprKind::Unary(x) => {
                let inner = self.sanitize_expr(*x.expr)?;
                let ty = expr_type(&inner)?.clone();
                match x.op {
                    UnaryType::LogicalNot => {
                        if ty != ExpressionType::bool() {
                            return Err(self.mismatch("unary expression", &ExpressionType::bool(), &ty));
                        }
                    }
                    UnaryType::Minus | UnaryType::Plus => {
                        let ok = match (&ty, ty.component_type()) {
                            (ExpressionType::Primitive(_) | ExpressionType::Vector(_), Some(p)) => {
                                p.is_numeric() && !(x.op == UnaryType::Minus && p == PrimitiveType::UInt32)
                            }
                            _ => false,
                        };
                        if !ok {
                            return Err(self.mismatch_with("unary expression", "a signed numeric scalar or vector", &ty));
                        }
                    }
                }
                let kind = ExprKind::Unary(ExprUnary {
                    op: x.op,
                    expr: Box::new(inner),
                });
                (kind, ty)
            }
            ExprKind::Variable(x) => {
                let ty = match self.variable_types.get(x.variable_index) {
                    Some(ty) => ty.clone(),
                    None => bail!(SemanticError::UndeclaredIdentifier {
                        name: format!("variable#{}", x.variable_index),
                    }),
                };
                (ExprKind::Variable(x), ty)
            }
        };
        Self::finish_expr(prior, kind, ty)
    }

    fn container_struct(&self, ty: &ExpressionType) -> Result<&StructDescription> {
        match ty.unwrap_uniform() {
            ExpressionType::Struct(x) => self.struct_desc(x.struct_index),
            other => Err(self.mismatch_with("member access", "a struct", other)),
        }
    }

    fn binary_type(&self, op: BinaryType, left: &ExpressionType, right: &ExpressionType) -> Result<ExpressionType> {
        use ExpressionType as T;

        if op.is_comparison() {
            return match (left, right) {
                (T::Primitive(l), T::Primitive(r)) if l == r => {
                    if op.is_ordering() && !l.is_numeric() {
                        return Err(self.mismatch_with("binary expression", "numeric operands", left));
                    }
                    Ok(T::bool())
                }
                (T::Primitive(_), _) => Err(self.mismatch("binary expression", left, right)),
                _ => Err(self.mismatch_with("binary expression", "primitive operands", left)),
            };
        }

        let out = match (op, left, right) {
            (BinaryType::Multiply, T::Matrix(l), T::Matrix(r)) => {
                if l.column_count != r.row_count {
                    return Err(self.mismatch("binary expression", left, right));
                }
                T::Matrix(MatrixType {
                    column_count: r.column_count,
                    row_count: l.row_count,
                    ty: l.ty,
                })
            }
            (BinaryType::Multiply, T::Matrix(l), T::Vector(r)) => {
                if l.column_count != r.component_count || l.ty != r.ty {
                    return Err(self.mismatch("binary expression", left, right));
                }
                T::vec(l.row_count, l.ty)
            }
            (BinaryType::Multiply | BinaryType::Divide, T::Vector(l), T::Primitive(r))
                if l.ty == *r && r.is_numeric() => left.clone(),
            (BinaryType::Multiply, T::Primitive(l), T::Vector(r))
                if *l == r.ty && l.is_numeric() => right.clone(),
            _ if left == right => {
                let ok = match left {
                    T::Primitive(p) => p.is_numeric(),
                    T::Vector(v) => v.ty.is_numeric(),
                    T::Matrix(_) => true,
                    _ => false,
                };
                if !ok {
                    return Err(self.mismatch_with("binary expression", "numeric operands", left));
                }
                left.clone()
            }
            _ => return Err(self.mismatch("binary expression", left, right)),
        };
        Ok(out)
    }

    fn check_cast(&self, target: &ExpressionType, expressions: &[Expr]) -> Result<()> {
        let (target_count, target_component) = match target {
            ExpressionType::Primitive(p) => (1, *p),
            ExpressionType::Vector(v) => (v.component_count, v.ty),
            other => return Err(self.mismatch_with("cast expression", "a primitive or vector target", other)),
        };
        if expressions.is_empty() || expressions.len() > 4 {
            bail!(SemanticError::ArityMismatch {
                node: "cast expression",
                expected: target_count as usize,
                found: expressions.len(),
            });
        }

        let mut found = 0;
        for expr in expressions {
            let ty = expr_type(expr)?;
            let component = match ty {
                ExpressionType::Primitive(_) | ExpressionType::Vector(_) => ty.component_type(),
                _ => None,
            };
            let component = match component {
                Some(x) => x,
                None => return Err(self.mismatch_with("cast expression", "a primitive or vector operand", ty)),
            };
            // Scalar casts convert between numeric types, vector
            // construction keeps the component type.
            let compatible = if target_count == 1 {
                component == target_component || (component.is_numeric() && target_component.is_numeric())
            } else {
                component == target_component
            };
            if !compatible {
                return Err(self.mismatch("cast expression", &ExpressionType::Primitive(target_component), ty));
            }
            found += ty.component_count().unwrap_or(0);
        }

        if found != target_count {
            bail!(SemanticError::ArityMismatch {
                node: "cast expression",
                expected: target_count as usize,
                found: found as usize,
            });
        }
        Ok(())
    }

    fn intrinsic_type(&self, intrinsic: IntrinsicType, parameters: &[Expr]) -> Result<ExpressionType> {
        let node = "intrinsic call";
        let expected_arity = match intrinsic {
            IntrinsicType::CrossProduct | IntrinsicType::DotProduct | IntrinsicType::SampleTexture => 2,
            IntrinsicType::Length => 1,
        };
        if parameters.len() != expected_arity {
            bail!(SemanticError::ArityMismatch {
                node,
                expected: expected_arity,
                found: parameters.len(),
            });
        }
        let types = parameters.iter()
            .map(expr_type)
            .collect::<Result<Vec<_>>>()?;

        let out = match intrinsic {
            IntrinsicType::CrossProduct => {
                let vec3 = ExpressionType::vec(3, PrimitiveType::Float32);
                for ty in types {
                    if *ty != vec3 {
                        return Err(self.mismatch(node, &vec3, ty));
                    }
                }
                vec3
            }
            IntrinsicType::DotProduct => {
                let component = match types[0] {
                    ExpressionType::Vector(v) if v.ty == PrimitiveType::Float32 => v.ty,
                    other => return Err(self.mismatch_with(node, "a float vector", other)),
                };
                if types[0] != types[1] {
                    return Err(self.mismatch(node, types[0], types[1]));
                }
                ExpressionType::Primitive(component)
            }
            IntrinsicType::Length => {
                match types[0] {
                    ExpressionType::Vector(v) if v.ty == PrimitiveType::Float32 => ExpressionType::f32(),
                    other => return Err(self.mismatch_with(node, "a float vector", other)),
                }
            }
            IntrinsicType::SampleTexture => {
                let sampler = match types[0] {
                    ExpressionType::Sampler(x) => *x,
                    other => return Err(self.mismatch_with(node, "a sampler", other)),
                };
                let coordinate_count = sampler.dim.coordinate_count();
                let expected = if coordinate_count == 1 {
                    ExpressionType::f32()
                } else {
                    ExpressionType::vec(coordinate_count, PrimitiveType::Float32)
                };
                if *types[1] != expected {
                    return Err(self.mismatch(node, &expected, types[1]));
                }
                ExpressionType::vec(4, sampler.sampled_type)
            }
        };
        Ok(out)
    }

    fn sanitize_scoped(&mut self, stmt: Stmt) -> Result<Stmt> {
        self.push_scope();
        let out = self.sanitize_stmt(stmt);
        self.pop_scope();
        out
    }

    fn sanitize_stmts(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>> {
        stmts.into_iter()
            .map(|x| self.sanitize_stmt(x))
            .collect::<Result<Vec<_>>>()
    }

    pub fn sanitize_stmt(&mut self, stmt: Stmt) -> Result<Stmt> {
        let out = match stmt {
            Stmt::Branch(x) => {
                if self.function.is_none() {
                    bail!(SemanticError::Misplaced {
                        node: "branch statement",
                        reason: "branches are only valid inside a function",
                    });
                }
                let mut cond_statements = Vec::with_capacity(x.cond_statements.len());
                for branch in x.cond_statements {
                    let condition = self.sanitize_expr(branch.condition)?;
                    let ty = expr_type(&condition)?;
                    if *ty != ExpressionType::bool() {
                        return Err(self.mismatch("branch condition", &ExpressionType::bool(), ty));
                    }
                    let statement = self.sanitize_scoped(*branch.statement)?;
                    cond_statements.push(ConditionalBranch {
                        condition,
                        statement: Box::new(statement),
                    });
                }
                let else_statement = match x.else_statement {
                    Some(stmt) => Some(Box::new(self.sanitize_scoped(*stmt)?)),
                    None => None,
                };
                StmtBranch {
                    cond_statements,
                    else_statement,
                }.into_stmt()
            }
            Stmt::Conditional(x) => {
                let option_index = self.lookup_option(&x.option_name)?;
                let option_ty = &self.option_table[option_index].ty;
                if *option_ty != ExpressionType::bool() {
                    return Err(self.mismatch("conditional statement", &ExpressionType::bool(), option_ty));
                }

                if self.resolves_conditionals() {
                    if self.resolve_option(option_index) {
                        self.sanitize_stmt(*x.statement)?
                    } else {
                        StmtNoOp.into_stmt()
                    }
                } else {
                    let statement = self.sanitize_stmt(*x.statement)?;
                    StmtConditional {
                        option_name: x.option_name,
                        option_index: Some(option_index),
                        statement: Box::new(statement),
                    }.into_stmt()
                }
            }
            Stmt::DeclareExternal(x) => {
                if !self.is_global_scope() {
                    bail!(SemanticError::Misplaced {
                        node: "external declaration",
                        reason: "externals must be declared at global scope",
                    });
                }
                let var_index = self.variable_types.len();
                let mut external_vars = Vec::with_capacity(x.external_vars.len());
                for var in x.external_vars {
                    let ty = self.resolve_type(var.ty)?;
                    if !matches!(ty, ExpressionType::Uniform(_) | ExpressionType::Sampler(_)) {
                        return Err(self.mismatch_with("external declaration", "uniform<struct> or sampler", &ty));
                    }
                    self.declare_variable(&var.name, ty.clone())?;
                    external_vars.push(ExternalVar {
                        name: var.name,
                        ty,
                        binding_index: var.binding_index,
                    });
                }
                StmtDeclareExternal {
                    external_vars,
                    var_index: Some(var_index),
                }.into_stmt()
            }
            Stmt::DeclareFunction(x) => self.sanitize_function(x)?,
            Stmt::DeclareOption(x) => {
                let opt_type = self.resolve_type(x.opt_type)?;
                if !matches!(opt_type, ExpressionType::Primitive(_)) {
                    return Err(self.mismatch_with("option declaration", "a primitive type", &opt_type));
                }
                let initial_value = match x.initial_value {
                    Some(expr) => {
                        let expr = self.sanitize_expr(expr)?;
                        let ty = expr_type(&expr)?;
                        if *ty != opt_type {
                            return Err(self.mismatch("option declaration", &opt_type, ty));
                        }
                        Some(expr)
                    }
                    None => None,
                };
                let default_value = initial_value.as_ref()
                    .and_then(|x| x.as_constant())
                    .map(|x| x.value);

                let opt_index = self.option_table.len();
                self.declare(&x.opt_name, Symbol::Option { index: opt_index })?;
                self.option_table.push(OptionDescription {
                    index: opt_index,
                    name: x.opt_name.clone(),
                    ty: opt_type.clone(),
                    default_value,
                });

                if self.options.remove_option_declaration {
                    StmtNoOp.into_stmt()
                } else {
                    StmtDeclareOption {
                        opt_name: x.opt_name,
                        opt_type,
                        initial_value,
                        opt_index: Some(opt_index),
                    }.into_stmt()
                }
            }
            Stmt::DeclareStruct(x) => {
                if !self.is_global_scope() {
                    bail!(SemanticError::Misplaced {
                        node: "struct declaration",
                        reason: "structs must be declared at global scope",
                    });
                }
                let mut members: Vec<StructMember> = Vec::with_capacity(x.description.members.len());
                for member in x.description.members {
                    if members.iter().any(|m| m.name == member.name) {
                        bail!(SemanticError::DuplicateDeclaration {
                            name: format!("{}.{}", x.description.name, member.name),
                        });
                    }
                    let ty = self.resolve_type(member.ty)?;
                    if matches!(ty, ExpressionType::NoType | ExpressionType::Uniform(_) | ExpressionType::Sampler(_)) {
                        return Err(self.mismatch_with("struct member", "a primitive, vector, matrix or struct", &ty));
                    }
                    // Nested structs of a std140 block need explicit offsets too.
                    if let (Some(StructLayout::Std140), ExpressionType::Struct(inner)) = (&x.description.layout, &ty) {
                        self.require_std140(inner.struct_index)?;
                    }
                    members.push(StructMember { ty, ..member });
                }
                let description = StructDescription {
                    name: x.description.name,
                    layout: x.description.layout,
                    members,
                };

                let struct_index = self.structs.len();
                self.declare(&description.name, Symbol::Struct { index: struct_index })?;
                self.structs.push(description.clone());
                StmtDeclareStruct {
                    description,
                    struct_index: Some(struct_index),
                }.into_stmt()
            }
            Stmt::DeclareVariable(x) => {
                if self.function.is_none() {
                    bail!(SemanticError::Misplaced {
                        node: "variable declaration",
                        reason: "variables must be declared inside a function",
                    });
                }
                // The initializer cannot see the variable it initializes.
                let initial_expression = match x.initial_expression {
                    Some(expr) => Some(self.sanitize_expr(expr)?),
                    None => None,
                };
                let declared = self.resolve_type(x.var_type)?;
                let var_type = match initial_expression.as_ref() {
                    Some(init) => {
                        let init_ty = expr_type(init)?;
                        if !declared.is_no_type() && *init_ty != declared {
                            return Err(self.mismatch("variable declaration", &declared, init_ty));
                        }
                        init_ty.clone()
                    }
                    None => {
                        if declared.is_no_type() {
                            return Err(self.mismatch_with("variable declaration", "an explicit type or an initializer", &declared));
                        }
                        declared
                    }
                };
                if matches!(var_type, ExpressionType::Uniform(_) | ExpressionType::Sampler(_)) {
                    return Err(self.mismatch_with("variable declaration", "a value type", &var_type));
                }
                let var_index = self.declare_variable(&x.var_name, var_type.clone())?;
                StmtDeclareVariable {
                    var_name: x.var_name,
                    var_type,
                    initial_expression,
                    var_index: Some(var_index),
                }.into_stmt()
            }
            Stmt::Discard(x) => {
                if self.function.is_none() {
                    bail!(SemanticError::Misplaced {
                        node: "discard statement",
                        reason: "discard is only valid inside a function",
                    });
                }
                Stmt::Discard(x)
            }
            Stmt::Expression(x) => {
                if self.function.is_none() {
                    bail!(SemanticError::Misplaced {
                        node: "expression statement",
                        reason: "expressions are only valid inside a function",
                    });
                }
                StmtExpression {
                    expr: self.sanitize_expr(x.expr)?,
                }.into_stmt()
            }
            Stmt::Multi(x) => {
                StmtMulti {
                    statements: self.sanitize_stmts(x.statements)?,
                }.into_stmt()
            }
            Stmt::NoOp(x) => Stmt::NoOp(x),
            Stmt::Return(x) => {
                let return_type = match &self.function {
                    Some(function) => function.return_type.clone(),
                    None => bail!(SemanticError::Misplaced {
                        node: "return statement",
                        reason: "return is only valid inside a function",
                    }),
                };
                let return_expr = match x.return_expr {
                    Some(expr) => Some(self.sanitize_expr(expr)?),
                    None => None,
                };
                let found = match &return_expr {
                    Some(expr) => expr_type(expr)?.clone(),
                    None => ExpressionType::NoType,
                };
                if found != return_type {
                    return Err(self.mismatch("return statement", &return_type, &found));
                }
                StmtReturn { return_expr }.into_stmt()
            }
        };
        Ok(out)
    }

    fn sanitize_function(&mut self, x: StmtDeclareFunction) -> Result<Stmt> {
        if !self.is_global_scope() {
            bail!(SemanticError::Misplaced {
                node: "function declaration",
                reason: "functions must be declared at global scope",
            });
        }

        let func_index = self.function_count;
        self.declare(&x.name, Symbol::Function)?;
        self.function_count += 1;

        let mut parameters = Vec::with_capacity(x.parameters.len());
        for param in x.parameters {
            let ty = self.resolve_type(param.ty)?;
            parameters.push(FunctionParameter { name: param.name, ty });
        }
        let return_type = self.resolve_type(x.return_type)?;

        if let Some(stage) = x.entry_stage {
            if self.entry_points.iter().any(|e| e.stage == stage) {
                bail!(SemanticError::DuplicateEntryPoint(stage.name()));
            }
            if parameters.len() > 1 {
                bail!(SemanticError::InvalidEntryPoint {
                    name: x.name,
                    reason: "entry functions take at most one parameter",
                });
            }
            if parameters.iter().any(|p| !matches!(p.ty, ExpressionType::Struct(_))) {
                bail!(SemanticError::InvalidEntryPoint {
                    name: x.name,
                    reason: "entry function inputs must be a struct",
                });
            }
            if !matches!(return_type, ExpressionType::NoType | ExpressionType::Struct(_)) {
                bail!(SemanticError::InvalidEntryPoint {
                    name: x.name,
                    reason: "entry function outputs must be a struct",
                });
            }
            self.entry_points.push(EntryPointDescription {
                stage,
                func_index,
                name: x.name.clone(),
            });
        }

        self.push_scope();
        let var_index = self.variable_types.len();
        for param in parameters.iter() {
            if matches!(param.ty, ExpressionType::NoType | ExpressionType::Uniform(_) | ExpressionType::Sampler(_)) {
                return Err(self.mismatch_with("function parameter", "a value type", &param.ty));
            }
            self.declare_variable(&param.name, param.ty.clone())?;
        }
        self.function = Some(FunctionContext {
            return_type: return_type.clone(),
        });
        let statements = self.sanitize_stmts(x.statements);
        self.function = None;
        self.pop_scope();

        Ok(StmtDeclareFunction {
            name: x.name,
            parameters,
            return_type,
            statements: statements?,
            entry_stage: x.entry_stage,
            func_index: Some(func_index),
            var_index: Some(var_index),
        }.into_stmt())
    }
}

fn expr_type(expr: &Expr) -> Result<&ExpressionType> {
    match &expr.ty {
        Some(ty) => Ok(ty),
        None => bail!(InternalError::UnsanitizedNode(expr.kind.describe())),
    }
}

/// Sanitizes `root`, see [`Sanitizer`].
pub fn sanitize(root: Stmt, options: &SanitizeOptions) -> Result<SanitizedAst> {
    Sanitizer::apply(root, options)
}
