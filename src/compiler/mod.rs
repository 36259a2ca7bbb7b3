pub mod ast;
pub mod common;
pub mod lang_writer;
pub mod sanitize;
pub mod spirv_writer;
pub mod writer;

use anyhow::Result;

use ast::Stmt;
use lang_writer::LangWriter;
use sanitize::{SanitizeOptions, Sanitizer};
use spirv_writer::SpirvWriter;
pub use spirv_writer::SpirvBinary;
use writer::{Environment, Writer};

pub struct Compiler {
}
impl Compiler {
    /// Sanitizes `root` and renders it in the textual shading language.
    pub fn compile_lang(root: Stmt, options: &SanitizeOptions, env: &Environment) -> Result<String> {
        let ast = Sanitizer::apply(root, options)?;
        LangWriter::new().generate(&ast, env)
    }
    /// Sanitizes `root` and lowers it to a SPIR-V module.
    pub fn compile_spirv(root: Stmt, options: &SanitizeOptions, env: &Environment) -> Result<SpirvBinary> {
        let ast = Sanitizer::apply(root, options)?;
        SpirvWriter::new().generate(&ast, env)
    }
}
