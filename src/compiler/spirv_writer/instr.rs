//! Flat SPIR-V instructions. No nested structure, ID references are
//! concrete numbers.
use crate::compiler::common::literal_string_words;

pub type Id = u32;

/// Per-module result id counter.
#[derive(Debug, Clone)]
pub struct IdContext {
    counter: u32,
}
impl IdContext {
    pub fn new() -> Self {
        Self { counter: 1 }
    }

    pub fn alloc(&mut self) -> Id {
        let id = self.counter;
        self.counter += 1;
        id
    }
    /// Every id handed out so far is less than the bound.
    pub fn bound(&self) -> u32 {
        self.counter
    }
}
impl Default for IdContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub opcode: spirv::Op,
    pub result_type: Option<Id>,
    pub result_id: Option<Id>,
    pub operands: Vec<u32>,
}
impl Instr {
    pub fn is_terminator(&self) -> bool {
        use spirv::Op;
        matches!(
            self.opcode,
            Op::Branch
                | Op::BranchConditional
                | Op::Switch
                | Op::Kill
                | Op::Return
                | Op::ReturnValue
                | Op::Unreachable
        )
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut out = Vec::new();
        out.push(self.opcode as u32);
        if let Some(result_type) = self.result_type {
            out.push(result_type);
        }
        if let Some(result_id) = self.result_id {
            out.push(result_id);
        }
        out.extend(self.operands.iter().cloned());
        let len = out.len() as u32;
        assert!(len <= u16::MAX as u32, "instruction length must be less than u16::MAX (65535)");
        out[0] |= len << 16;
        out
    }
}

pub struct InstrBuilder {
    opcode: spirv::Op,
    result_type: Option<Id>,
    result_id: Option<Id>,
    operands: Vec<u32>,
}
impl InstrBuilder {
    pub fn new(opcode: spirv::Op) -> Self {
        Self {
            opcode,
            result_type: None,
            result_id: None,
            operands: Vec::new(),
        }
    }

    pub fn set_result_type(&mut self, result_type: Id) -> &mut Self {
        self.result_type = Some(result_type);
        self
    }
    pub fn set_result_id(&mut self, result_id: Id) -> &mut Self {
        self.result_id = Some(result_id);
        self
    }
    pub fn set_operands(&mut self, operands: Vec<u32>) -> &mut Self {
        self.operands = operands;
        self
    }
    pub fn push_operand(&mut self, operand: u32) -> &mut Self {
        self.operands.push(operand);
        self
    }
    pub fn push_string(&mut self, x: &str) -> &mut Self {
        self.operands.extend(literal_string_words(x));
        self
    }

    pub fn build(&mut self) -> Instr {
        Instr {
            opcode: self.opcode,
            result_type: self.result_type,
            result_id: self.result_id,
            operands: self.operands.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpirvHeader {
    pub magic: u32,
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}
impl SpirvHeader {
    pub fn new(version: u32, bound: u32) -> Self {
        Self {
            magic: 0x07230203,
            version,
            generator: 0,
            bound,
            schema: 0,
        }
    }

    pub fn to_words(&self) -> Vec<u32> {
        vec![
            self.magic,
            self.version,
            self.generator,
            self.bound,
            self.schema,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpirvBinary {
    pub header: SpirvHeader,
    pub instrs: Vec<Instr>,
}
impl SpirvBinary {
    pub fn to_words(&self) -> Vec<u32> {
        let mut out = Vec::new();
        out.extend(self.header.to_words());
        for instr in self.instrs.iter() {
            out.extend(instr.to_words());
        }
        out
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .into_iter()
            .flat_map(|x| x.to_le_bytes())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn disassemble(&self) -> String {
        use rspirv::binary::Disassemble;
        let words = self.to_words();

        let mut d = rspirv::dr::Loader::new();
        rspirv::binary::parse_words(words, &mut d).unwrap();
        let mut module = d.module();
        module.header = None;
        module.disassemble()
    }
}
