//! Writer Framework
//!
//! Shared plumbing for the backends: the `Writer` contract, the per-call
//! state guard and the text helpers used by the textual backend.
use std::fmt;
use std::ops::{Deref, DerefMut};
use anyhow::{bail, Result};

use super::ast::{ExpressionType, Stmt};
use super::common::{ConstantValue, InternalError};
use super::sanitize::SanitizedAst;


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpirvVersion {
    pub major: u8,
    pub minor: u8,
}
impl SpirvVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
    /// Version word as laid out in a SPIR-V header.
    pub fn to_word(self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8)
    }
}
impl Default for SpirvVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub spirv_version: SpirvVersion,
}

pub trait Writer {
    type Output;

    fn generate(&mut self, ast: &SanitizedAst, env: &Environment) -> Result<Self::Output>;
}

/// Writer keeping its per-call state in an `Option` slot.
pub trait StatefulWriter {
    type State;

    fn state_slot(&mut self) -> &mut Option<Self::State>;

    fn state(&mut self) -> Result<&mut Self::State> {
        match self.state_slot() {
            Some(x) => Ok(x),
            None => bail!(InternalError::NoActiveState),
        }
    }
}

/// Installs a writer's per-call state and clears it again when dropped, on
/// success and error paths alike.
pub struct StateGuard<'a, W: StatefulWriter> {
    writer: &'a mut W,
}
impl<'a, W: StatefulWriter> StateGuard<'a, W> {
    pub fn install(writer: &'a mut W, state: W::State) -> Self {
        *writer.state_slot() = Some(state);
        Self { writer }
    }
}
impl<'a, W: StatefulWriter> Deref for StateGuard<'a, W> {
    type Target = W;
    fn deref(&self) -> &W {
        self.writer
    }
}
impl<'a, W: StatefulWriter> DerefMut for StateGuard<'a, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.writer
    }
}
impl<'a, W: StatefulWriter> Drop for StateGuard<'a, W> {
    fn drop(&mut self) {
        *self.writer.state_slot() = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Binding(u32),
    Builtin,
    Entry(&'static str),
    Layout(&'static str),
    Location(u32),
    Opt(String),
}
impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Binding(x) => write!(f, "binding({})", x),
            Attribute::Builtin => write!(f, "builtin(position)"),
            Attribute::Entry(x) => write!(f, "entry({})", x),
            Attribute::Layout(x) => write!(f, "layout({})", x),
            Attribute::Location(x) => write!(f, "location({})", x),
            Attribute::Opt(x) => write!(f, "opt({})", x),
        }
    }
}

/// Indentation-aware text sink. A line break is always followed by the
/// indentation of the current nesting level.
#[derive(Debug, Default)]
pub struct TextBuffer {
    out: String,
    indent_level: usize,
}
impl TextBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn append(&mut self, txt: &str) {
        self.out.push_str(txt);
    }
    pub fn append_line(&mut self, txt: &str) {
        self.out.push_str(txt);
        self.out.push('\n');
        for _ in 0..self.indent_level {
            self.out.push('\t');
        }
    }

    pub fn enter_scope(&mut self) {
        self.indent_level += 1;
        self.append_line("{");
    }
    pub fn leave_scope(&mut self, skip_line: bool) -> Result<()> {
        if self.indent_level == 0 {
            bail!(InternalError::UnbalancedScope);
        }
        self.indent_level -= 1;
        self.append_line("");
        if skip_line {
            self.append_line("}");
        } else {
            self.append("}");
        }
        Ok(())
    }

    /// Writes `[a(x)b(y)]` for the present attributes, then a line break or
    /// a single space. Writes nothing when no attribute is present.
    pub fn append_attributes(&mut self, append_line: bool, attributes: &[Option<Attribute>]) {
        let mut present = attributes.iter().flatten().peekable();
        if present.peek().is_none() {
            return;
        }
        self.append("[");
        for attribute in present {
            self.append(&attribute.to_string());
        }
        if append_line {
            self.append_line("]");
        } else {
            self.append("] ");
        }
    }

    pub fn indent_level(&self) -> usize {
        self.indent_level
    }
    pub fn as_str(&self) -> &str {
        &self.out
    }
    pub fn finish(self) -> String {
        self.out
    }
}

/// Visits `statements` in order, calling `separate` before every
/// statement that follows an already emitted one. No-ops are visited but
/// never cause a separator.
pub fn join_statements<T, S, V>(ctx: &mut T, statements: &[Stmt], mut separate: S, mut visit: V) -> Result<()>
    where S: FnMut(&mut T) -> Result<()>, V: FnMut(&mut T, &Stmt) -> Result<()>
{
    let mut first = true;
    for stmt in statements {
        if stmt.is_no_op() {
            visit(ctx, stmt)?;
            continue;
        }
        if !first {
            separate(ctx)?;
        }
        visit(ctx, stmt)?;
        first = false;
    }
    Ok(())
}

/// Locale-independent float spelling. Finite values always carry a `.`.
pub fn format_float(x: f32) -> String {
    let mut out = x.to_string();
    if x.is_finite() && !out.contains('.') {
        out.push_str(".0");
    }
    out
}

pub fn format_constant(value: &ConstantValue) -> String {
    fn vector<T: fmt::Display>(ty: &str, xs: &[T]) -> String {
        let components = xs.iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("vec{}<{}>({})", xs.len(), ty, components)
    }
    fn vector_f32(xs: &[f32]) -> String {
        let components = xs.iter()
            .map(|x| format_float(*x))
            .collect::<Vec<_>>()
            .join(", ");
        format!("vec{}<f32>({})", xs.len(), components)
    }

    match value {
        ConstantValue::Bool(x) => x.to_string(),
        ConstantValue::F32(x) => format_float(*x),
        ConstantValue::I32(x) => x.to_string(),
        ConstantValue::U32(x) => x.to_string(),
        ConstantValue::Vec2F32(x) => vector_f32(x),
        ConstantValue::Vec3F32(x) => vector_f32(x),
        ConstantValue::Vec4F32(x) => vector_f32(x),
        ConstantValue::Vec2I32(x) => vector("i32", x),
        ConstantValue::Vec3I32(x) => vector("i32", x),
        ConstantValue::Vec4I32(x) => vector("i32", x),
    }
}

/// Renders a sanitized type. `struct_name` maps a struct index to the name
/// registered for it.
pub fn format_type<F>(ty: &ExpressionType, struct_name: F) -> Result<String>
    where F: Fn(usize) -> Option<String>
{
    if let Some(name) = ty.unresolved_identifier() {
        bail!(InternalError::UnresolvedIdentifierType(name.to_string()));
    }
    ty.render(&mut |struct_index| {
        match struct_name(struct_index) {
            Some(name) => Ok(name),
            None => bail!(InternalError::UnregisteredIndex {
                kind: "struct",
                index: struct_index,
            }),
        }
    })
}
