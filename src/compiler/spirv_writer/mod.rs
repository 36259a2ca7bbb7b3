//! SPIR-V Backend
//!
//! Lowers a sanitized AST to a SPIR-V module. Types and constants are
//! interned into a single pool; function bodies are split into basic blocks
//! that each end with exactly one terminator.
use std::collections::{BTreeSet, HashMap, HashSet};
use anyhow::{bail, Result};
use spirv::Op;

use super::ast::*;
use super::common::InternalError;
use super::sanitize::{OptionDescription, SanitizedAst};
use super::writer::{Environment, SpirvVersion, StateGuard, StatefulWriter, Writer};

mod function;
mod instr;
mod types;

pub use function::{BasicBlock, FunctionBuilder};
pub use instr::{Id, IdContext, Instr, InstrBuilder, SpirvBinary, SpirvHeader};
pub use types::{std140_struct_layout, SpirvConstant, SpirvType};


#[derive(Default)]
pub struct SpirvWriter {
    state: Option<State>,
}
impl SpirvWriter {
    pub fn new() -> Self {
        Default::default()
    }
}
impl StatefulWriter for SpirvWriter {
    type State = State;
    fn state_slot(&mut self) -> &mut Option<State> {
        &mut self.state
    }
}
impl Writer for SpirvWriter {
    type Output = SpirvBinary;

    fn generate(&mut self, ast: &SanitizedAst, env: &Environment) -> Result<SpirvBinary> {
        let mut guard = StateGuard::install(self, State::new(ast, env));
        let state = guard.state()?;
        for option in ast.options.iter() {
            state.register_option(option)?;
        }
        state.visit_stmt(&ast.root)?;

        let binary = state.finish()?;
        log::debug!(
            "generated spir-v module: {} instructions, id bound {}",
            binary.instrs.len(),
            binary.header.bound,
        );
        Ok(binary)
    }
}

#[derive(Debug, Clone)]
struct Variable {
    pointer: Id,
    storage_class: spirv::StorageClass,
    ty: ExpressionType,
}

#[derive(Debug, Clone, Copy)]
struct OptionConstant {
    id: Id,
    enabled_by_default: bool,
}

struct EntryPoint {
    model: spirv::ExecutionModel,
    func_id: Id,
    name: String,
    interface: Vec<Id>,
}

struct FunctionState {
    builder: FunctionBuilder,
    return_type: ExpressionType,
    // Output variables of an entry function, one per returned member.
    outputs: Option<Vec<Id>>,
}

/// Logical layout sections that depend on traversal order. Capabilities,
/// the memory model and entry points are produced at the end.
#[derive(Default)]
struct ModuleSections {
    ext_inst_imports: Vec<Instr>,
    debug_names: Vec<Instr>,
    annotations: Vec<Instr>,
    types_globals: Vec<Instr>,
    functions: Vec<Instr>,
}

pub struct State {
    version: SpirvVersion,
    ids: IdContext,
    sections: ModuleSections,
    capabilities: BTreeSet<u32>,
    glsl_ext: Option<Id>,
    types: HashMap<SpirvType, Id>,
    constants: HashMap<SpirvConstant, Id>,
    structs: Vec<StructDescription>,
    block_structs: HashSet<Id>,
    options: HashMap<usize, OptionConstant>,
    variables: HashMap<usize, Variable>,
    globals: Vec<Id>,
    entry_points: Vec<EntryPoint>,
    function: Option<FunctionState>,
}

fn typed(expr: &Expr) -> Result<&ExpressionType> {
    expr.ty.as_ref()
        .ok_or_else(|| InternalError::UnsanitizedNode(expr.kind.describe()).into())
}

fn unsupported<T>(what: String) -> Result<T> {
    bail!(InternalError::Unsupported(what))
}

impl State {
    fn new(ast: &SanitizedAst, env: &Environment) -> Self {
        let mut capabilities = BTreeSet::new();
        capabilities.insert(spirv::Capability::Shader as u32);
        Self {
            version: env.spirv_version,
            ids: IdContext::new(),
            sections: ModuleSections::default(),
            capabilities,
            glsl_ext: None,
            types: HashMap::new(),
            constants: HashMap::new(),
            structs: ast.structs.clone(),
            block_structs: HashSet::new(),
            options: HashMap::new(),
            variables: HashMap::new(),
            globals: Vec::new(),
            entry_points: Vec::new(),
            function: None,
        }
    }

    fn finish(&mut self) -> Result<SpirvBinary> {
        if self.function.is_some() {
            bail!(InternalError::Unsupported("unfinished function body".to_string()));
        }
        let sections = std::mem::take(&mut self.sections);
        let mut instrs = Vec::new();

        for capability in self.capabilities.iter() {
            instrs.push(InstrBuilder::new(Op::Capability)
                .push_operand(*capability)
                .build());
        }
        instrs.extend(sections.ext_inst_imports);
        instrs.push(InstrBuilder::new(Op::MemoryModel)
            .set_operands(vec![
                spirv::AddressingModel::Logical as u32,
                spirv::MemoryModel::GLSL450 as u32,
            ])
            .build());

        // Starting with 1.4 the interface lists every global the entry
        // point may touch, not only inputs and outputs.
        let list_globals = self.version >= SpirvVersion::new(1, 4);
        let mut execution_modes = Vec::new();
        for entry in self.entry_points.iter() {
            let mut builder = InstrBuilder::new(Op::EntryPoint);
            builder.push_operand(entry.model as u32)
                .push_operand(entry.func_id)
                .push_string(&entry.name);
            for id in entry.interface.iter() {
                builder.push_operand(*id);
            }
            if list_globals {
                for id in self.globals.iter() {
                    builder.push_operand(*id);
                }
            }
            instrs.push(builder.build());

            if entry.model == spirv::ExecutionModel::Fragment {
                execution_modes.push(InstrBuilder::new(Op::ExecutionMode)
                    .set_operands(vec![entry.func_id, spirv::ExecutionMode::OriginUpperLeft as u32])
                    .build());
            }
        }
        instrs.extend(execution_modes);
        instrs.extend(sections.debug_names);
        instrs.extend(sections.annotations);
        instrs.extend(sections.types_globals);
        instrs.extend(sections.functions);

        Ok(SpirvBinary {
            header: SpirvHeader::new(self.version.to_word(), self.ids.bound()),
            instrs,
        })
    }

    fn alloc(&mut self) -> Id {
        self.ids.alloc()
    }

    fn name(&mut self, target: Id, name: &str) {
        let instr = InstrBuilder::new(Op::Name)
            .push_operand(target)
            .push_string(name)
            .build();
        self.sections.debug_names.push(instr);
    }
    fn member_name(&mut self, target: Id, member: u32, name: &str) {
        let instr = InstrBuilder::new(Op::MemberName)
            .push_operand(target)
            .push_operand(member)
            .push_string(name)
            .build();
        self.sections.debug_names.push(instr);
    }
    fn decorate(&mut self, target: Id, decoration: spirv::Decoration, params: &[u32]) {
        let mut operands = vec![target, decoration as u32];
        operands.extend_from_slice(params);
        let instr = InstrBuilder::new(Op::Decorate)
            .set_operands(operands)
            .build();
        self.sections.annotations.push(instr);
    }
    fn member_decorate(&mut self, target: Id, member: u32, decoration: spirv::Decoration, params: &[u32]) {
        let mut operands = vec![target, member, decoration as u32];
        operands.extend_from_slice(params);
        let instr = InstrBuilder::new(Op::MemberDecorate)
            .set_operands(operands)
            .build();
        self.sections.annotations.push(instr);
    }

    fn glsl_ext(&mut self) -> Id {
        if let Some(id) = self.glsl_ext {
            return id;
        }
        let id = self.alloc();
        let instr = InstrBuilder::new(Op::ExtInstImport)
            .set_result_id(id)
            .push_string("GLSL.std.450")
            .build();
        self.sections.ext_inst_imports.push(instr);
        self.glsl_ext = Some(id);
        id
    }

    fn type_id(&mut self, ty: &SpirvType) -> Result<Id> {
        if let Some(id) = self.types.get(ty) {
            return Ok(*id);
        }
        let (opcode, operands) = match ty {
            SpirvType::Void => (Op::TypeVoid, vec![]),
            SpirvType::Bool => (Op::TypeBool, vec![]),
            SpirvType::Int { signed } => (Op::TypeInt, vec![32, *signed as u32]),
            SpirvType::Float => (Op::TypeFloat, vec![32]),
            SpirvType::Vector { component, count } => {
                (Op::TypeVector, vec![self.type_id(component)?, *count])
            }
            SpirvType::Matrix { column, count } => {
                (Op::TypeMatrix, vec![self.type_id(column)?, *count])
            }
            SpirvType::Image { sampled, dim, arrayed } => {
                if *dim == spirv::Dim::Dim1D as u32 {
                    self.capabilities.insert(spirv::Capability::Sampled1D as u32);
                }
                let sampled = self.type_id(sampled)?;
                // Not a depth image, single-sampled, used with a sampler.
                (Op::TypeImage, vec![sampled, *dim, 0, *arrayed as u32, 0, 1, spirv::ImageFormat::Unknown as u32])
            }
            SpirvType::SampledImage(image) => (Op::TypeSampledImage, vec![self.type_id(image)?]),
            SpirvType::Struct(struct_index) => {
                let members = self.struct_desc(*struct_index)?.members.clone();
                let mut operands = Vec::with_capacity(members.len());
                for member in members.iter() {
                    operands.push(self.expr_type_id(&member.ty)?);
                }
                (Op::TypeStruct, operands)
            }
            SpirvType::Pointer { storage_class, pointee } => {
                (Op::TypePointer, vec![*storage_class, self.type_id(pointee)?])
            }
            SpirvType::Function { return_type, parameters } => {
                let mut operands = vec![self.type_id(return_type)?];
                for param in parameters.iter() {
                    operands.push(self.type_id(param)?);
                }
                (Op::TypeFunction, operands)
            }
        };

        let id = self.alloc();
        let instr = InstrBuilder::new(opcode)
            .set_result_id(id)
            .set_operands(operands)
            .build();
        self.sections.types_globals.push(instr);
        self.types.insert(ty.clone(), id);

        if let SpirvType::Struct(struct_index) = ty {
            self.describe_struct(*struct_index, id)?;
        }
        Ok(id)
    }
    fn expr_type_id(&mut self, ty: &ExpressionType) -> Result<Id> {
        let ty = SpirvType::from_expression_type(ty)?;
        self.type_id(&ty)
    }
    fn pointer_type_id(&mut self, storage_class: spirv::StorageClass, ty: &ExpressionType) -> Result<Id> {
        let ty = SpirvType::pointer(storage_class, SpirvType::from_expression_type(ty)?);
        self.type_id(&ty)
    }

    fn struct_desc(&self, struct_index: usize) -> Result<&StructDescription> {
        match self.structs.get(struct_index) {
            Some(x) => Ok(x),
            None => bail!(InternalError::UnregisteredIndex {
                kind: "struct",
                index: struct_index,
            }),
        }
    }
    fn struct_of(&self, ty: &ExpressionType) -> Result<StructDescription> {
        match ty.unwrap_uniform() {
            ExpressionType::Struct(x) => Ok(self.struct_desc(x.struct_index)?.clone()),
            other => unsupported(format!("{} where a struct is expected", other)),
        }
    }

    fn describe_struct(&mut self, struct_index: usize, id: Id) -> Result<()> {
        let desc = self.struct_desc(struct_index)?.clone();
        self.name(id, &desc.name);
        for (i, member) in desc.members.iter().enumerate() {
            self.member_name(id, i as u32, &member.name);
        }

        if desc.layout == Some(StructLayout::Std140) {
            let (offsets, _, _) = std140_struct_layout(&desc, &self.structs)?;
            for (i, (member, offset)) in desc.members.iter().zip(offsets).enumerate() {
                let i = i as u32;
                self.member_decorate(id, i, spirv::Decoration::Offset, &[offset]);
                if let ExpressionType::Matrix(_) = member.ty {
                    self.member_decorate(id, i, spirv::Decoration::ColMajor, &[]);
                    self.member_decorate(id, i, spirv::Decoration::MatrixStride, &[16]);
                }
            }
        }
        Ok(())
    }

    fn constant_id(&mut self, constant: &SpirvConstant) -> Result<Id> {
        if let Some(id) = self.constants.get(constant) {
            return Ok(*id);
        }
        let ty = self.type_id(&constant.ty())?;
        let (opcode, operands) = match constant {
            SpirvConstant::Bool(true) => (Op::ConstantTrue, vec![]),
            SpirvConstant::Bool(false) => (Op::ConstantFalse, vec![]),
            SpirvConstant::F32(x) => (Op::Constant, vec![x.0.to_bits()]),
            SpirvConstant::I32(x) => (Op::Constant, vec![*x as u32]),
            SpirvConstant::U32(x) => (Op::Constant, vec![*x]),
            SpirvConstant::Composite { components, .. } => {
                let mut operands = Vec::with_capacity(components.len());
                for component in components.iter() {
                    operands.push(self.constant_id(component)?);
                }
                (Op::ConstantComposite, operands)
            }
        };

        let id = self.alloc();
        let instr = InstrBuilder::new(opcode)
            .set_result_type(ty)
            .set_result_id(id)
            .set_operands(operands)
            .build();
        self.sections.types_globals.push(instr);
        self.constants.insert(constant.clone(), id);
        Ok(id)
    }

    /// Options become specialization constants, `SpecId` is the option
    /// index.
    fn register_option(&mut self, option: &OptionDescription) -> Result<()> {
        let ty = self.expr_type_id(&option.ty)?;
        let enabled_by_default = option.default_value
            .and_then(|x| x.as_bool())
            .unwrap_or(false);
        let (opcode, operands) = match (&option.ty, option.default_value) {
            (ExpressionType::Primitive(PrimitiveType::Boolean), _) => {
                let opcode = if enabled_by_default {
                    Op::SpecConstantTrue
                } else {
                    Op::SpecConstantFalse
                };
                (opcode, vec![])
            }
            (ExpressionType::Primitive(_), Some(value)) => (Op::SpecConstant, value.to_words()),
            (ExpressionType::Primitive(_), None) => (Op::SpecConstant, vec![0]),
            (other, _) => return unsupported(format!("option of type {}", other)),
        };

        let id = self.alloc();
        let instr = InstrBuilder::new(opcode)
            .set_result_type(ty)
            .set_result_id(id)
            .set_operands(operands)
            .build();
        self.sections.types_globals.push(instr);
        self.decorate(id, spirv::Decoration::SpecId, &[option.index as u32]);
        self.name(id, &option.name);

        let constant = OptionConstant { id, enabled_by_default };
        if self.options.insert(option.index, constant).is_some() {
            bail!(InternalError::DuplicateIndex { kind: "option", index: option.index });
        }
        Ok(())
    }
    fn option(&self, index: Option<usize>) -> Result<OptionConstant> {
        let index = index.ok_or(InternalError::UnsanitizedNode("conditional"))?;
        self.options.get(&index)
            .copied()
            .ok_or_else(|| InternalError::UnregisteredIndex { kind: "option", index }.into())
    }

    fn register_variable(&mut self, index: usize, var: Variable) -> Result<()> {
        if self.variables.insert(index, var).is_some() {
            bail!(InternalError::DuplicateIndex { kind: "variable", index });
        }
        Ok(())
    }
    fn variable(&self, index: usize) -> Result<&Variable> {
        self.variables.get(&index)
            .ok_or_else(|| InternalError::UnregisteredIndex { kind: "variable", index }.into())
    }

    fn function_mut(&mut self, what: &'static str) -> Result<&mut FunctionState> {
        match self.function.as_mut() {
            Some(x) => Ok(x),
            None => bail!(InternalError::NoActiveFunction(what)),
        }
    }

    /// Appends to the current block. Code following a terminator is
    /// unreachable and goes to a fresh block.
    fn emit(&mut self, instr: Instr) -> Result<()> {
        let function = match self.function.as_mut() {
            Some(x) => x,
            None => bail!(InternalError::NoActiveFunction("instruction")),
        };
        if function.builder.is_terminated() {
            let label = self.ids.alloc();
            function.builder.start_block(label);
        }
        function.builder.push(instr);
        Ok(())
    }
    fn emit_value(&mut self, opcode: Op, result_type: Id, operands: Vec<u32>) -> Result<Id> {
        let id = self.alloc();
        let instr = InstrBuilder::new(opcode)
            .set_result_type(result_type)
            .set_result_id(id)
            .set_operands(operands)
            .build();
        self.emit(instr)?;
        Ok(id)
    }
    fn emit_void(&mut self, opcode: Op, operands: Vec<u32>) -> Result<()> {
        let instr = InstrBuilder::new(opcode)
            .set_operands(operands)
            .build();
        self.emit(instr)
    }

    fn start_block(&mut self, label: Id) -> Result<()> {
        self.function_mut("block")?.builder.start_block(label);
        Ok(())
    }
    /// Closes the current block with a branch to `target` unless it is
    /// already terminated.
    fn branch_to(&mut self, target: Id) -> Result<()> {
        let function = self.function_mut("branch")?;
        if !function.builder.is_terminated() {
            function.builder.push(InstrBuilder::new(Op::Branch)
                .push_operand(target)
                .build());
        }
        Ok(())
    }

    /// Structured selection on `condition`. Without an else part the false
    /// edge goes straight to the merge block.
    fn lower_selection<T, E>(&mut self, condition: Id, then: T, otherwise: Option<E>) -> Result<()>
        where T: FnOnce(&mut Self) -> Result<()>, E: FnOnce(&mut Self) -> Result<()>
    {
        let merge = self.alloc();
        let then_label = self.alloc();
        let else_label = match otherwise {
            Some(_) => self.alloc(),
            None => merge,
        };

        self.emit_void(Op::SelectionMerge, vec![merge, spirv::SelectionControl::NONE.bits()])?;
        self.emit_void(Op::BranchConditional, vec![condition, then_label, else_label])?;

        self.start_block(then_label)?;
        then(self)?;
        self.branch_to(merge)?;

        if let Some(otherwise) = otherwise {
            self.start_block(else_label)?;
            otherwise(self)?;
            self.branch_to(merge)?;
        }

        self.start_block(merge)
    }

    fn lower_branch(&mut self, branches: &[ConditionalBranch], else_statement: Option<&Stmt>) -> Result<()> {
        let (first, rest) = match branches.split_first() {
            Some(x) => x,
            None => {
                if let Some(stmt) = else_statement {
                    self.visit_stmt(stmt)?;
                }
                return Ok(());
            }
        };

        let condition = self.visit_expr(&first.condition)?;
        let then = |x: &mut Self| x.visit_stmt(&first.statement);
        if rest.is_empty() && else_statement.is_none() {
            self.lower_selection(condition, then, None::<fn(&mut Self) -> Result<()>>)
        } else {
            // Each `else if` nests a selection in the else block.
            self.lower_selection(condition, then, Some(|x: &mut Self| x.lower_branch(rest, else_statement)))
        }
    }

    fn declare_local(&mut self, index: usize, name: &str, ty: &ExpressionType) -> Result<Id> {
        let pointer_ty = self.pointer_type_id(spirv::StorageClass::Function, ty)?;
        let id = self.alloc();
        let instr = InstrBuilder::new(Op::Variable)
            .set_result_type(pointer_ty)
            .set_result_id(id)
            .push_operand(spirv::StorageClass::Function as u32)
            .build();
        self.function_mut("variable declaration")?.builder.declare_variable(instr);
        self.name(id, name);
        self.register_variable(index, Variable {
            pointer: id,
            storage_class: spirv::StorageClass::Function,
            ty: ty.clone(),
        })?;
        Ok(id)
    }

    /// One `Input` or `Output` variable per struct member.
    fn declare_interface(&mut self, ty: &ExpressionType, storage_class: spirv::StorageClass, interface: &mut Vec<Id>) -> Result<Vec<Id>> {
        let desc = self.struct_of(ty)?;
        let mut out = Vec::with_capacity(desc.members.len());
        for member in desc.members.iter() {
            let pointer_ty = self.pointer_type_id(storage_class, &member.ty)?;
            let id = self.alloc();
            let instr = InstrBuilder::new(Op::Variable)
                .set_result_type(pointer_ty)
                .set_result_id(id)
                .push_operand(storage_class as u32)
                .build();
            self.sections.types_globals.push(instr);

            if let Some(location) = member.location_index {
                self.decorate(id, spirv::Decoration::Location, &[location]);
            }
            if let Some(builtin) = member.builtin {
                let builtin = match builtin {
                    BuiltinEntry::VertexPosition => spirv::BuiltIn::Position,
                };
                self.decorate(id, spirv::Decoration::BuiltIn, &[builtin as u32]);
            }
            self.name(id, &format!("{}.{}", desc.name, member.name));
            interface.push(id);
            out.push(id);
        }
        Ok(out)
    }

    fn lower_function_body(&mut self, node: &StmtDeclareFunction, func_id: Id, param_values: Vec<Id>) -> Result<()> {
        let mut var_index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("function declaration"))?;

        match node.entry_stage {
            Some(stage) => {
                let mut interface = Vec::new();
                for param in node.parameters.iter() {
                    let inputs = self.declare_interface(&param.ty, spirv::StorageClass::Input, &mut interface)?;
                    let local = self.declare_local(var_index, &param.name, &param.ty)?;
                    var_index += 1;

                    let desc = self.struct_of(&param.ty)?;
                    let mut members = Vec::with_capacity(inputs.len());
                    for (input, member) in inputs.iter().zip(desc.members.iter()) {
                        let ty = self.expr_type_id(&member.ty)?;
                        members.push(self.emit_value(Op::Load, ty, vec![*input])?);
                    }
                    let struct_ty = self.expr_type_id(&param.ty)?;
                    let value = self.emit_value(Op::CompositeConstruct, struct_ty, members)?;
                    self.emit_void(Op::Store, vec![local, value])?;
                }
                if !node.return_type.is_no_type() {
                    let outputs = self.declare_interface(&node.return_type, spirv::StorageClass::Output, &mut interface)?;
                    self.function_mut("entry function")?.outputs = Some(outputs);
                }

                let model = match stage {
                    ShaderStageType::Fragment => spirv::ExecutionModel::Fragment,
                    ShaderStageType::Vertex => spirv::ExecutionModel::Vertex,
                };
                self.entry_points.push(EntryPoint {
                    model,
                    func_id,
                    name: node.name.clone(),
                    interface,
                });
            }
            None => {
                for (param, value) in node.parameters.iter().zip(param_values) {
                    let local = self.declare_local(var_index, &param.name, &param.ty)?;
                    var_index += 1;
                    self.emit_void(Op::Store, vec![local, value])?;
                }
            }
        }

        for stmt in node.statements.iter() {
            self.visit_stmt(stmt)?;
        }

        let returns_void = node.entry_stage.is_some() || node.return_type.is_no_type();
        let function = self.function_mut("function declaration")?;
        if !function.builder.is_terminated() {
            let opcode = if returns_void { Op::Return } else { Op::Unreachable };
            function.builder.push(InstrBuilder::new(opcode).build());
        }
        Ok(())
    }

    /// Pointer to an addressable expression, or `None` for plain values.
    fn eval_pointer(&mut self, expr: &Expr) -> Result<Option<(Id, spirv::StorageClass)>> {
        match &expr.kind {
            ExprKind::Variable(x) => {
                let var = self.variable(x.variable_index)?;
                Ok(Some((var.pointer, var.storage_class)))
            }
            ExprKind::AccessIndex(x) => {
                let (base, storage_class) = match self.eval_pointer(&x.expr)? {
                    Some(x) => x,
                    None => return Ok(None),
                };
                let pointer_ty = self.pointer_type_id(storage_class, typed(expr)?)?;
                let mut operands = vec![base];
                for index in x.member_indices.iter() {
                    operands.push(self.constant_id(&SpirvConstant::I32(*index as i32))?);
                }
                let pointer = self.emit_value(Op::AccessChain, pointer_ty, operands)?;
                Ok(Some((pointer, storage_class)))
            }
            _ => Ok(None),
        }
    }

    fn splat(&mut self, value: Id, component: PrimitiveType, count: u32) -> Result<Id> {
        let ty = self.type_id(&SpirvType::vector(SpirvType::from_primitive(component), count))?;
        self.emit_value(Op::CompositeConstruct, ty, vec![value; count as usize])
    }
}

fn arithmetic_op(op: BinaryType, component: PrimitiveType) -> Result<Op> {
    use PrimitiveType as P;
    let out = match (op, component) {
        (BinaryType::Add, P::Float32) => Op::FAdd,
        (BinaryType::Subtract, P::Float32) => Op::FSub,
        (BinaryType::Multiply, P::Float32) => Op::FMul,
        (BinaryType::Divide, P::Float32) => Op::FDiv,
        (BinaryType::Add, P::Int32 | P::UInt32) => Op::IAdd,
        (BinaryType::Subtract, P::Int32 | P::UInt32) => Op::ISub,
        (BinaryType::Multiply, P::Int32 | P::UInt32) => Op::IMul,
        (BinaryType::Divide, P::Int32) => Op::SDiv,
        (BinaryType::Divide, P::UInt32) => Op::UDiv,
        _ => return unsupported(format!("{:?} on {}", op, component.name())),
    };
    Ok(out)
}

fn comparison_op(op: BinaryType, component: PrimitiveType) -> Result<Op> {
    use PrimitiveType as P;
    let out = match (op, component) {
        (BinaryType::CompEq, P::Float32) => Op::FOrdEqual,
        (BinaryType::CompNe, P::Float32) => Op::FOrdNotEqual,
        (BinaryType::CompGe, P::Float32) => Op::FOrdGreaterThanEqual,
        (BinaryType::CompGt, P::Float32) => Op::FOrdGreaterThan,
        (BinaryType::CompLe, P::Float32) => Op::FOrdLessThanEqual,
        (BinaryType::CompLt, P::Float32) => Op::FOrdLessThan,
        (BinaryType::CompEq, P::Int32 | P::UInt32) => Op::IEqual,
        (BinaryType::CompNe, P::Int32 | P::UInt32) => Op::INotEqual,
        (BinaryType::CompGe, P::Int32) => Op::SGreaterThanEqual,
        (BinaryType::CompGt, P::Int32) => Op::SGreaterThan,
        (BinaryType::CompLe, P::Int32) => Op::SLessThanEqual,
        (BinaryType::CompLt, P::Int32) => Op::SLessThan,
        (BinaryType::CompGe, P::UInt32) => Op::UGreaterThanEqual,
        (BinaryType::CompGt, P::UInt32) => Op::UGreaterThan,
        (BinaryType::CompLe, P::UInt32) => Op::ULessThanEqual,
        (BinaryType::CompLt, P::UInt32) => Op::ULessThan,
        (BinaryType::CompEq, P::Boolean) => Op::LogicalEqual,
        (BinaryType::CompNe, P::Boolean) => Op::LogicalNotEqual,
        _ => return unsupported(format!("{:?} on {}", op, component.name())),
    };
    Ok(out)
}

impl ExpressionVisitor for State {
    type Output = Id;

    fn visit_access_identifier(&mut self, expr: &Expr, _: &ExprAccessIdentifier) -> Result<Id> {
        bail!(InternalError::UnsanitizedNode(expr.kind.describe()))
    }
    fn visit_access_index(&mut self, expr: &Expr, node: &ExprAccessIndex) -> Result<Id> {
        let result_ty = self.expr_type_id(typed(expr)?)?;
        match self.eval_pointer(expr)? {
            Some((pointer, _)) => self.emit_value(Op::Load, result_ty, vec![pointer]),
            None => {
                let mut operands = vec![self.visit_expr(&node.expr)?];
                operands.extend(node.member_indices.iter().map(|x| *x as u32));
                self.emit_value(Op::CompositeExtract, result_ty, operands)
            }
        }
    }
    fn visit_assign(&mut self, _: &Expr, node: &ExprAssign) -> Result<Id> {
        let (pointer, _) = self.eval_pointer(&node.left)?
            .ok_or(InternalError::NotAddressable(node.left.kind.describe()))?;
        let value = self.visit_expr(&node.right)?;
        match node.op {
            AssignType::Simple => self.emit_void(Op::Store, vec![pointer, value])?,
        }
        Ok(value)
    }
    fn visit_binary(&mut self, expr: &Expr, node: &ExprBinary) -> Result<Id> {
        use ExpressionType as T;

        let left_ty = typed(&node.left)?.clone();
        let right_ty = typed(&node.right)?.clone();
        let result_ty = self.expr_type_id(typed(expr)?)?;
        let mut left = self.visit_expr(&node.left)?;
        let mut right = self.visit_expr(&node.right)?;

        let opcode = match (node.op, &left_ty, &right_ty) {
            (BinaryType::Multiply, T::Matrix(_), T::Matrix(_)) => Op::MatrixTimesMatrix,
            (BinaryType::Multiply, T::Matrix(_), T::Vector(_)) => Op::MatrixTimesVector,
            (BinaryType::Multiply, T::Vector(v), T::Primitive(_)) if v.ty == PrimitiveType::Float32 => {
                Op::VectorTimesScalar
            }
            (BinaryType::Multiply, T::Primitive(_), T::Vector(v)) if v.ty == PrimitiveType::Float32 => {
                std::mem::swap(&mut left, &mut right);
                Op::VectorTimesScalar
            }
            (BinaryType::Multiply | BinaryType::Divide, T::Vector(v), T::Primitive(_)) => {
                right = self.splat(right, v.ty, v.component_count)?;
                arithmetic_op(node.op, v.ty)?
            }
            (BinaryType::Multiply, T::Primitive(_), T::Vector(v)) => {
                left = self.splat(left, v.ty, v.component_count)?;
                arithmetic_op(node.op, v.ty)?
            }
            (_, T::Matrix(m), T::Matrix(_)) => {
                // Component-wise matrix arithmetic goes column by column.
                let opcode = arithmetic_op(node.op, m.ty)?;
                let column_ty = self.type_id(&SpirvType::vector(SpirvType::from_primitive(m.ty), m.row_count))?;
                let mut columns = Vec::with_capacity(m.column_count as usize);
                for i in 0..m.column_count {
                    let l = self.emit_value(Op::CompositeExtract, column_ty, vec![left, i])?;
                    let r = self.emit_value(Op::CompositeExtract, column_ty, vec![right, i])?;
                    columns.push(self.emit_value(opcode, column_ty, vec![l, r])?);
                }
                return self.emit_value(Op::CompositeConstruct, result_ty, columns);
            }
            (_, T::Matrix(_), _) | (_, _, T::Matrix(_)) => {
                return unsupported(format!("{:?} on {} and {}", node.op, left_ty, right_ty));
            }
            _ => {
                let component = match left_ty.component_type() {
                    Some(x) => x,
                    None => return unsupported(format!("{:?} on {}", node.op, left_ty)),
                };
                if node.op.is_comparison() {
                    comparison_op(node.op, component)?
                } else {
                    arithmetic_op(node.op, component)?
                }
            }
        };
        self.emit_value(opcode, result_ty, vec![left, right])
    }
    fn visit_cast(&mut self, expr: &Expr, node: &ExprCast) -> Result<Id> {
        use PrimitiveType as P;

        let result_ty = self.expr_type_id(typed(expr)?)?;
        match &node.target_type {
            ExpressionType::Primitive(to) => {
                let arg = match node.expressions.as_slice() {
                    [arg] => arg,
                    _ => return unsupported("multi-operand scalar cast".to_string()),
                };
                let from = match typed(arg)? {
                    ExpressionType::Primitive(x) => *x,
                    other => return unsupported(format!("cast from {}", other)),
                };
                let value = self.visit_expr(arg)?;
                let opcode = match (from, *to) {
                    (from, to) if from == to => return Ok(value),
                    (P::Float32, P::Int32) => Op::ConvertFToS,
                    (P::Float32, P::UInt32) => Op::ConvertFToU,
                    (P::Int32, P::Float32) => Op::ConvertSToF,
                    (P::UInt32, P::Float32) => Op::ConvertUToF,
                    (P::Int32, P::UInt32) | (P::UInt32, P::Int32) => Op::Bitcast,
                    (from, to) => return unsupported(format!("cast from {} to {}", from.name(), to.name())),
                };
                self.emit_value(opcode, result_ty, vec![value])
            }
            ExpressionType::Vector(_) => {
                if let [arg] = node.expressions.as_slice() {
                    if typed(arg)? == &node.target_type {
                        return self.visit_expr(arg);
                    }
                }
                let mut operands = Vec::with_capacity(node.expressions.len());
                for arg in node.expressions.iter() {
                    operands.push(self.visit_expr(arg)?);
                }
                self.emit_value(Op::CompositeConstruct, result_ty, operands)
            }
            other => unsupported(format!("cast to {}", other)),
        }
    }
    fn visit_conditional_expr(&mut self, expr: &Expr, node: &ExprConditional) -> Result<Id> {
        let option = self.option(node.option_index)?;
        let ty = typed(expr)?.clone();
        let result_ty = self.expr_type_id(&ty)?;

        match &ty {
            ExpressionType::Primitive(_) | ExpressionType::Vector(_) => {
                let true_value = self.visit_expr(&node.true_path)?;
                let false_value = self.visit_expr(&node.false_path)?;
                let mut condition = option.id;
                if let ExpressionType::Vector(v) = &ty {
                    // A scalar condition on vectors needs 1.4.
                    if self.version < SpirvVersion::new(1, 4) {
                        condition = self.splat(option.id, PrimitiveType::Boolean, v.component_count)?;
                    }
                }
                self.emit_value(Op::Select, result_ty, vec![condition, true_value, false_value])
            }
            _ => {
                // Composites other than vectors are selected through a phi.
                let merge = self.alloc();
                let then_label = self.alloc();
                let else_label = self.alloc();
                self.emit_void(Op::SelectionMerge, vec![merge, spirv::SelectionControl::NONE.bits()])?;
                self.emit_void(Op::BranchConditional, vec![option.id, then_label, else_label])?;

                self.start_block(then_label)?;
                let true_value = self.visit_expr(&node.true_path)?;
                let true_block = self.function_mut("conditional expression")?.builder.current_label();
                self.branch_to(merge)?;

                self.start_block(else_label)?;
                let false_value = self.visit_expr(&node.false_path)?;
                let false_block = self.function_mut("conditional expression")?.builder.current_label();
                self.branch_to(merge)?;

                self.start_block(merge)?;
                self.emit_value(Op::Phi, result_ty, vec![true_value, true_block, false_value, false_block])
            }
        }
    }
    fn visit_constant(&mut self, _: &Expr, node: &ExprConstant) -> Result<Id> {
        self.constant_id(&SpirvConstant::from(node.value))
    }
    fn visit_identifier(&mut self, expr: &Expr, _: &ExprIdentifier) -> Result<Id> {
        bail!(InternalError::UnsanitizedNode(expr.kind.describe()))
    }
    fn visit_intrinsic(&mut self, expr: &Expr, node: &ExprIntrinsic) -> Result<Id> {
        let result_ty = self.expr_type_id(typed(expr)?)?;
        let mut args = Vec::with_capacity(node.parameters.len());
        for param in node.parameters.iter() {
            args.push(self.visit_expr(param)?);
        }

        match node.intrinsic {
            IntrinsicType::CrossProduct | IntrinsicType::Length => {
                let inst = match node.intrinsic {
                    IntrinsicType::CrossProduct => spirv::GLOp::Cross,
                    _ => spirv::GLOp::Length,
                };
                let mut operands = vec![self.glsl_ext(), inst as u32];
                operands.extend(args);
                self.emit_value(Op::ExtInst, result_ty, operands)
            }
            IntrinsicType::DotProduct => self.emit_value(Op::Dot, result_ty, args),
            IntrinsicType::SampleTexture => self.emit_value(Op::ImageSampleImplicitLod, result_ty, args),
        }
    }
    fn visit_swizzle(&mut self, expr: &Expr, node: &ExprSwizzle) -> Result<Id> {
        let result_ty = self.expr_type_id(typed(expr)?)?;
        let value = self.visit_expr(&node.expr)?;
        let indices = node.components.iter().map(|x| x.index() as u32);
        match node.components.len() {
            1 => {
                let mut operands = vec![value];
                operands.extend(indices);
                self.emit_value(Op::CompositeExtract, result_ty, operands)
            }
            _ => {
                let mut operands = vec![value, value];
                operands.extend(indices);
                self.emit_value(Op::VectorShuffle, result_ty, operands)
            }
        }
    }
    fn visit_unary(&mut self, expr: &Expr, node: &ExprUnary) -> Result<Id> {
        let ty = typed(expr)?.clone();
        let value = self.visit_expr(&node.expr)?;
        let opcode = match node.op {
            UnaryType::Plus => return Ok(value),
            UnaryType::LogicalNot => Op::LogicalNot,
            UnaryType::Minus => match ty.component_type() {
                Some(PrimitiveType::Float32) => Op::FNegate,
                _ => Op::SNegate,
            },
        };
        let result_ty = self.expr_type_id(&ty)?;
        self.emit_value(opcode, result_ty, vec![value])
    }
    fn visit_variable(&mut self, _: &Expr, node: &ExprVariable) -> Result<Id> {
        let var = self.variable(node.variable_index)?.clone();
        let ty = self.expr_type_id(&var.ty)?;
        self.emit_value(Op::Load, ty, vec![var.pointer])
    }
}

impl StatementVisitor for State {
    fn visit_branch(&mut self, node: &StmtBranch) -> Result<()> {
        self.lower_branch(&node.cond_statements, node.else_statement.as_deref())
    }
    fn visit_conditional_stmt(&mut self, node: &StmtConditional) -> Result<()> {
        let option = self.option(node.option_index)?;
        if self.function.is_some() {
            self.lower_selection(
                option.id,
                |x: &mut Self| x.visit_stmt(&node.statement),
                None::<fn(&mut Self) -> Result<()>>,
            )
        } else if option.enabled_by_default {
            // Declarations cannot be specialized, they follow the default.
            self.visit_stmt(&node.statement)
        } else {
            Ok(())
        }
    }
    fn visit_declare_external(&mut self, node: &StmtDeclareExternal) -> Result<()> {
        let mut var_index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("external declaration"))?;

        for var in node.external_vars.iter() {
            let storage_class = match &var.ty {
                ExpressionType::Uniform(_) => spirv::StorageClass::Uniform,
                ExpressionType::Sampler(_) => spirv::StorageClass::UniformConstant,
                other => return unsupported(format!("external of type {}", other)),
            };
            let pointee = SpirvType::from_expression_type(&var.ty)?;
            let pointee_id = self.type_id(&pointee)?;
            if storage_class == spirv::StorageClass::Uniform && self.block_structs.insert(pointee_id) {
                self.decorate(pointee_id, spirv::Decoration::Block, &[]);
            }
            let pointer_ty = self.type_id(&SpirvType::pointer(storage_class, pointee))?;

            let id = self.alloc();
            let instr = InstrBuilder::new(Op::Variable)
                .set_result_type(pointer_ty)
                .set_result_id(id)
                .push_operand(storage_class as u32)
                .build();
            self.sections.types_globals.push(instr);
            self.decorate(id, spirv::Decoration::DescriptorSet, &[0]);
            if let Some(binding) = var.binding_index {
                self.decorate(id, spirv::Decoration::Binding, &[binding]);
            }
            self.name(id, &var.name);
            self.globals.push(id);

            self.register_variable(var_index, Variable {
                pointer: id,
                storage_class,
                ty: var.ty.clone(),
            })?;
            var_index += 1;
        }
        Ok(())
    }
    fn visit_declare_function(&mut self, node: &StmtDeclareFunction) -> Result<()> {
        if self.function.is_some() {
            return unsupported(format!("nested function `{}`", node.name));
        }

        let func_id = self.alloc();
        let entry_label = self.alloc();
        self.name(func_id, &node.name);

        // Entry functions communicate through interface variables.
        let (return_type, parameters) = match node.entry_stage {
            Some(_) => (SpirvType::Void, vec![]),
            None => {
                let mut parameters = Vec::with_capacity(node.parameters.len());
                for param in node.parameters.iter() {
                    parameters.push(SpirvType::from_expression_type(&param.ty)?);
                }
                (SpirvType::from_expression_type(&node.return_type)?, parameters)
            }
        };
        let return_type_id = self.type_id(&return_type)?;
        let mut param_type_ids = Vec::with_capacity(parameters.len());
        for param in parameters.iter() {
            param_type_ids.push(self.type_id(param)?);
        }
        let func_ty = self.type_id(&SpirvType::Function {
            return_type: Box::new(return_type),
            parameters,
        })?;

        let mut header = vec![
            InstrBuilder::new(Op::Function)
                .set_result_type(return_type_id)
                .set_result_id(func_id)
                .set_operands(vec![spirv::FunctionControl::NONE.bits(), func_ty])
                .build(),
        ];
        let mut param_values = Vec::with_capacity(param_type_ids.len());
        for ty in param_type_ids {
            let id = self.alloc();
            header.push(InstrBuilder::new(Op::FunctionParameter)
                .set_result_type(ty)
                .set_result_id(id)
                .build());
            param_values.push(id);
        }

        self.function = Some(FunctionState {
            builder: FunctionBuilder::new(header, entry_label),
            return_type: node.return_type.clone(),
            outputs: None,
        });
        let result = self.lower_function_body(node, func_id, param_values);
        let function = self.function.take();
        result?;

        let function = function.ok_or(InternalError::NoActiveFunction("function declaration"))?;
        let instrs = function.builder.finish()?;
        self.sections.functions.extend(instrs);
        Ok(())
    }
    fn visit_declare_option(&mut self, node: &StmtDeclareOption) -> Result<()> {
        // Registered up front so that removed declarations still resolve.
        self.option(node.opt_index).map(|_| ())
    }
    fn visit_declare_struct(&mut self, node: &StmtDeclareStruct) -> Result<()> {
        let index = node.struct_index
            .ok_or(InternalError::UnsanitizedNode("struct declaration"))?;
        self.struct_desc(index).map(|_| ())
    }
    fn visit_declare_variable(&mut self, node: &StmtDeclareVariable) -> Result<()> {
        let index = node.var_index
            .ok_or(InternalError::UnsanitizedNode("variable declaration"))?;
        let value = match &node.initial_expression {
            Some(expr) => Some(self.visit_expr(expr)?),
            None => None,
        };
        let pointer = self.declare_local(index, &node.var_name, &node.var_type)?;
        if let Some(value) = value {
            self.emit_void(Op::Store, vec![pointer, value])?;
        }
        Ok(())
    }
    fn visit_discard(&mut self, _: &StmtDiscard) -> Result<()> {
        self.emit_void(Op::Kill, vec![])
    }
    fn visit_expression_stmt(&mut self, node: &StmtExpression) -> Result<()> {
        self.visit_expr(&node.expr).map(|_| ())
    }
    fn visit_multi(&mut self, node: &StmtMulti) -> Result<()> {
        for stmt in node.statements.iter() {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }
    fn visit_no_op(&mut self, _: &StmtNoOp) -> Result<()> {
        Ok(())
    }
    fn visit_return(&mut self, node: &StmtReturn) -> Result<()> {
        let value = match &node.return_expr {
            Some(expr) => Some(self.visit_expr(expr)?),
            None => None,
        };
        let function = self.function_mut("return statement")?;
        let outputs = function.outputs.clone();
        let return_type = function.return_type.clone();

        match (outputs, value) {
            (Some(outputs), Some(value)) => {
                let desc = self.struct_of(&return_type)?;
                for (i, (output, member)) in outputs.iter().zip(desc.members.iter()).enumerate() {
                    let ty = self.expr_type_id(&member.ty)?;
                    let member_value = self.emit_value(Op::CompositeExtract, ty, vec![value, i as u32])?;
                    self.emit_void(Op::Store, vec![*output, member_value])?;
                }
                self.emit_void(Op::Return, vec![])
            }
            (None, Some(value)) => self.emit_void(Op::ReturnValue, vec![value]),
            (_, None) => self.emit_void(Op::Return, vec![]),
        }
    }
}
