//! Basic blocks and function bodies.
use anyhow::{bail, Result};

use super::instr::{Id, Instr, InstrBuilder};
use crate::compiler::common::InternalError;

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: Id,
    pub instrs: Vec<Instr>,
}
impl BasicBlock {
    pub fn new(label: Id) -> Self {
        Self {
            label,
            instrs: Vec::new(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.instrs.last().map_or(false, Instr::is_terminator)
    }

    /// A block ends with exactly one terminator and has nothing after it.
    pub fn validate(&self) -> Result<()> {
        let count = self.instrs.iter()
            .filter(|x| x.is_terminator())
            .count();
        if count != 1 {
            bail!(InternalError::TerminatorCount {
                label: self.label,
                count,
            });
        }
        if !self.is_terminated() {
            bail!(InternalError::MisplacedTerminator { label: self.label });
        }
        Ok(())
    }

    fn label_instr(&self) -> Instr {
        InstrBuilder::new(spirv::Op::Label)
            .set_result_id(self.label)
            .build()
    }
}

/// Collects a function while its body is lowered. Instructions always go to
/// the current block; function-storage variables are hoisted into the first.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    header: Vec<Instr>,
    variables: Vec<Instr>,
    blocks: Vec<BasicBlock>,
    current: BasicBlock,
}
impl FunctionBuilder {
    /// `header` holds `OpFunction` followed by its `OpFunctionParameter`s.
    pub fn new(header: Vec<Instr>, entry_label: Id) -> Self {
        Self {
            header,
            variables: Vec::new(),
            blocks: Vec::new(),
            current: BasicBlock::new(entry_label),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.current.is_terminated()
    }
    pub fn current_label(&self) -> Id {
        self.current.label
    }
    pub fn push(&mut self, instr: Instr) {
        self.current.instrs.push(instr);
    }
    pub fn start_block(&mut self, label: Id) {
        let prev = std::mem::replace(&mut self.current, BasicBlock::new(label));
        self.blocks.push(prev);
    }
    pub fn declare_variable(&mut self, instr: Instr) {
        self.variables.push(instr);
    }

    pub fn finish(mut self) -> Result<Vec<Instr>> {
        self.blocks.push(self.current);
        let mut out = self.header;
        let mut variables = Some(self.variables);
        for block in self.blocks.iter() {
            block.validate()?;
            out.push(block.label_instr());
            if let Some(variables) = variables.take() {
                out.extend(variables);
            }
            out.extend(block.instrs.iter().cloned());
        }
        out.push(InstrBuilder::new(spirv::Op::FunctionEnd).build());
        Ok(out)
    }
}
