//! The two-pass validator: structural checks over index spaces and
//! counts, then a symbolic type-check of every function body.
//!
//! Pass 1 never needs to look inside a function body; it is pure
//! bookkeeping over how many of each thing exist and whether every
//! index used anywhere points at one of them. Pass 2 walks each
//! function's instructions with a value-type stack and a control-frame
//! stack, the same algorithm the Wasm specification's appendix
//! describes: an unreachable control frame makes its stack
//! polymorphic, so popping past the frame's base height yields
//! whatever type the consumer expected instead of failing.

use std::collections::HashSet;

use wasmlift_error::{Error, ErrorKind, ErrorSink, Result};
use wasmlift_format::instr::{self as op, Immediate, Instruction};
use wasmlift_format::module::{Code, ConstExpr, ElementInit, ElementMode, Global, ImportDesc, Module};
use wasmlift_format::tags::ExternalKind;
use wasmlift_format::types::{BlockType, GlobalType, Mutability, ReferenceType, ValueType};
use wasmlift_format::FeatureSet;

/// Run both validation passes, collecting every violation into `sink`
/// rather than stopping at the first one.
pub fn validate(module: &Module, features: FeatureSet, sink: &mut ErrorSink) {
    validate_structure(module, features, sink);
    for (index, code) in module.code.iter().enumerate() {
        let function_index = module.imported_function_count() + index as u32;
        if let Err(err) = validate_function_body(module, features, function_index, code) {
            sink.push(err);
        }
    }
}

fn validate_structure(module: &Module, features: FeatureSet, sink: &mut ErrorSink) {
    if module.table_count() > 1 && !features.reference_types {
        sink.push(Error::new(ErrorKind::MultipleTables));
    }
    if module.memory_count() > 1 && !features.multi_memory {
        sink.push(Error::new(ErrorKind::MultipleMemories));
    }

    for import in &module.imports {
        check_desc_limits(&import.desc, sink);
    }
    for table in &module.tables {
        if !table.table_type.limits.is_well_formed() {
            sink.push(Error::new(ErrorKind::InvalidLimits {
                min: table.table_type.limits.min,
                max: table.table_type.limits.max,
            }));
        }
    }
    for memory in &module.memories {
        if !memory.memory_type.limits.is_well_formed() {
            sink.push(Error::new(ErrorKind::InvalidLimits {
                min: memory.memory_type.limits.min,
                max: memory.memory_type.limits.max,
            }));
        }
    }

    for function in &module.functions {
        if module.types.get(function.type_index as usize).is_none() {
            sink.push(Error::new(ErrorKind::IndexOutOfBounds {
                space: "type",
                index: function.type_index,
                len: module.types.len() as u32,
            }));
        }
    }

    if let Some(start) = module.start {
        match module.function_type(start) {
            None => sink.push(Error::new(ErrorKind::IndexOutOfBounds {
                space: "function",
                index: start,
                len: module.function_count(),
            })),
            Some(ty) if !ty.params.is_empty() || !ty.results.is_empty() => {
                sink.push(Error::new(ErrorKind::TypeMismatch {
                    expected: "start function with no params or results".to_string(),
                    found: format!("{} params, {} results", ty.params.len(), ty.results.len()),
                }));
            }
            Some(_) => {}
        }
    }

    let imported_events = module.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Event(_))).count() as u32;
    let mut export_names = HashSet::new();
    for export in &module.exports {
        if !export_names.insert(export.name.clone()) {
            sink.push(Error::new(ErrorKind::DuplicateExport { name: export.name.clone() }));
        }
        let len = match export.kind {
            ExternalKind::Function => module.function_count(),
            ExternalKind::Table => module.table_count(),
            ExternalKind::Memory => module.memory_count(),
            ExternalKind::Global => module.global_count(),
            ExternalKind::Tag => imported_events + module.events.len() as u32,
        };
        if export.index >= len {
            sink.push(Error::new(ErrorKind::IndexOutOfBounds {
                space: export_space(export.kind),
                index: export.index,
                len,
            }));
        }
    }

    for global in &module.globals {
        validate_global_init(module, global, sink);
    }

    for element in &module.elements {
        if let ElementMode::Active { table_index, offset } = &element.mode {
            if *table_index >= module.table_count() {
                sink.push(Error::new(ErrorKind::IndexOutOfBounds {
                    space: "table",
                    index: *table_index,
                    len: module.table_count(),
                }));
            }
            validate_offset_expr(module, offset, sink);
        }
        if let ElementInit::Exprs { element_type, exprs } = &element.init {
            for expr in exprs {
                validate_const_expr_type(module, expr, *element_type, sink);
            }
        }
    }

    for data in &module.data {
        if let wasmlift_format::module::DataMode::Active { memory_index, offset } = &data.mode {
            if *memory_index >= module.memory_count() {
                sink.push(Error::new(ErrorKind::IndexOutOfBounds {
                    space: "memory",
                    index: *memory_index,
                    len: module.memory_count(),
                }));
            }
            validate_offset_expr(module, offset, sink);
        }
    }
}

/// Determine the static type a restricted constant expression would
/// leave on the stack, or report why it isn't one.
///
/// The grammar accepted here is the MVP constant-expression grammar:
/// a single `i32.const`/`i64.const`/`f32.const`/`f64.const`/
/// `ref.null`/`ref.func`, or a `global.get` of an imported, immutable
/// global. Anything else — arithmetic, a `local.get`, a reference to a
/// module-defined global — is rejected rather than partially evaluated.
fn const_expr_type(module: &Module, expr: &ConstExpr) -> Result<ValueType> {
    let instruction = match expr.as_slice() {
        [instruction] => instruction,
        _ => return Err(Error::new(ErrorKind::NonConstantInitializer)),
    };
    match instruction.opcode {
        op::I32_CONST => Ok(ValueType::I32),
        op::I64_CONST => Ok(ValueType::I64),
        op::F32_CONST => Ok(ValueType::F32),
        op::F64_CONST => Ok(ValueType::F64),
        op::REF_NULL => match &instruction.immediate {
            Immediate::HeapType(heap_type) => {
                Ok(ValueType::Ref(ReferenceType { nullable: true, heap_type: *heap_type }))
            }
            _ => Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer)),
        },
        op::REF_FUNC => match &instruction.immediate {
            Immediate::Index(index) if *index < module.function_count() => Ok(ValueType::funcref()),
            Immediate::Index(index) => Err(Error::at(
                instruction.offset,
                ErrorKind::IndexOutOfBounds { space: "function", index: *index, len: module.function_count() },
            )),
            _ => Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer)),
        },
        op::GLOBAL_GET => {
            let Immediate::Index(index) = &instruction.immediate else {
                return Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer));
            };
            let index = *index;
            if index >= module.imported_global_count() {
                return Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer));
            }
            let global = global_type(module, index)?;
            if global.mutability != Mutability::Const {
                return Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer));
            }
            Ok(global.value_type)
        }
        _ => Err(Error::at(instruction.offset, ErrorKind::NonConstantInitializer)),
    }
}

fn validate_const_expr_type(module: &Module, expr: &ConstExpr, expected: ValueType, sink: &mut ErrorSink) {
    match const_expr_type(module, expr) {
        Ok(found) if found == expected => {}
        Ok(found) => sink.push(Error::new(ErrorKind::TypeMismatch {
            expected: format!("{expected:?}"),
            found: format!("{found:?}"),
        })),
        Err(err) => sink.push(err),
    }
}

fn validate_offset_expr(module: &Module, offset: &ConstExpr, sink: &mut ErrorSink) {
    validate_const_expr_type(module, offset, ValueType::I32, sink);
}

fn validate_global_init(module: &Module, global: &Global, sink: &mut ErrorSink) {
    match const_expr_type(module, &global.init) {
        Ok(found) if found == global.global_type.value_type => {}
        Ok(_) => sink.push(Error::new(ErrorKind::InvalidGlobalInit)),
        Err(err) => sink.push(err),
    }
}

fn check_desc_limits(desc: &ImportDesc, sink: &mut ErrorSink) {
    match desc {
        ImportDesc::Table(table_type) if !table_type.limits.is_well_formed() => {
            sink.push(Error::new(ErrorKind::InvalidLimits {
                min: table_type.limits.min,
                max: table_type.limits.max,
            }));
        }
        ImportDesc::Memory(memory_type) if !memory_type.limits.is_well_formed() => {
            sink.push(Error::new(ErrorKind::InvalidLimits {
                min: memory_type.limits.min,
                max: memory_type.limits.max,
            }));
        }
        _ => {}
    }
}

fn export_space(kind: ExternalKind) -> &'static str {
    match kind {
        ExternalKind::Function => "function",
        ExternalKind::Table => "table",
        ExternalKind::Memory => "memory",
        ExternalKind::Global => "global",
        ExternalKind::Tag => "tag",
    }
}

/// One entry in the value-type stack. `Unknown` stands for "any type",
/// produced once a frame becomes unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackType {
    Known(ValueType),
    Unknown,
}

struct ControlFrame {
    block_type: BlockType,
    height: usize,
    unreachable: bool,
    is_loop: bool,
    /// Set only on the synthetic outer frame representing the function
    /// body itself, whose "block type" is the function's own signature
    /// rather than anything nameable via [`BlockType`].
    override_results: Option<Vec<ValueType>>,
}

impl ControlFrame {
    fn effective_results(&self, module: &Module) -> Vec<ValueType> {
        self.override_results.clone().unwrap_or_else(|| block_results(self.block_type, module))
    }

    fn label_types(&self, module: &Module) -> Vec<ValueType> {
        if self.is_loop {
            block_params(self.block_type, module)
        } else {
            self.effective_results(module)
        }
    }
}

fn block_params(block_type: BlockType, module: &Module) -> Vec<ValueType> {
    match block_type {
        BlockType::FuncType(index) => module.types.get(index as usize).map(|t| t.params.clone()).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn block_results(block_type: BlockType, module: &Module) -> Vec<ValueType> {
    match block_type {
        BlockType::Empty => Vec::new(),
        BlockType::Value(value_type) => vec![value_type],
        BlockType::FuncType(index) => module.types.get(index as usize).map(|t| t.results.clone()).unwrap_or_default(),
    }
}

struct BodyValidator<'a> {
    module: &'a Module,
    locals: Vec<ValueType>,
    stack: Vec<StackType>,
    control: Vec<ControlFrame>,
}

impl<'a> BodyValidator<'a> {
    fn push(&mut self, value_type: ValueType) {
        self.stack.push(StackType::Known(value_type));
    }

    fn push_many(&mut self, types: &[ValueType]) {
        for &t in types {
            self.push(t);
        }
    }

    fn pop(&mut self) -> Result<StackType> {
        let frame = self.control.last().ok_or_else(|| Error::new(ErrorKind::UnbalancedControl))?;
        if self.stack.len() == frame.height {
            return if frame.unreachable {
                Ok(StackType::Unknown)
            } else {
                Err(Error::new(ErrorKind::StackUnderflow))
            };
        }
        self.stack.pop().ok_or_else(|| Error::new(ErrorKind::StackUnderflow))
    }

    fn pop_expect(&mut self, expected: ValueType) -> Result<()> {
        match self.pop()? {
            StackType::Unknown => Ok(()),
            StackType::Known(found) if found == expected => Ok(()),
            StackType::Known(found) => Err(Error::new(ErrorKind::TypeMismatch {
                expected: format!("{expected:?}"),
                found: format!("{found:?}"),
            })),
        }
    }

    fn pop_expect_many(&mut self, expected: &[ValueType]) -> Result<()> {
        for &t in expected.iter().rev() {
            self.pop_expect(t)?;
        }
        Ok(())
    }

    fn set_unreachable(&mut self) -> Result<()> {
        let frame = self.control.last_mut().ok_or_else(|| Error::new(ErrorKind::UnbalancedControl))?;
        let height = frame.height;
        frame.unreachable = true;
        self.stack.truncate(height);
        Ok(())
    }

    fn local_type(&self, index: u32) -> Result<ValueType> {
        self.locals.get(index as usize).copied().ok_or_else(|| {
            Error::new(ErrorKind::IndexOutOfBounds { space: "local", index, len: self.locals.len() as u32 })
        })
    }
}

/// Type-check one function body against its declared signature.
pub fn validate_function_body(
    module: &Module,
    features: FeatureSet,
    function_index: u32,
    code: &Code,
) -> Result<()> {
    let func_type = module
        .function_type(function_index)
        .ok_or_else(|| Error::new(ErrorKind::IndexOutOfBounds {
            space: "function",
            index: function_index,
            len: module.function_count(),
        }))?
        .clone();

    let mut locals = func_type.params.clone();
    for group in &code.locals {
        for _ in 0..group.count {
            locals.push(group.value_type);
        }
    }

    let mut validator = BodyValidator {
        module,
        locals,
        stack: Vec::new(),
        control: vec![ControlFrame {
            block_type: BlockType::Empty,
            height: 0,
            unreachable: false,
            is_loop: false,
            override_results: Some(func_type.results.clone()),
        }],
    };

    for instruction in &code.body {
        step(&mut validator, features, instruction, &func_type.results)?;
    }

    Ok(())
}

fn step(
    validator: &mut BodyValidator<'_>,
    features: FeatureSet,
    instruction: &Instruction,
    function_results: &[ValueType],
) -> Result<()> {
    if validator.control.is_empty() {
        return Err(Error::new(ErrorKind::UnbalancedControl));
    }

    match instruction.opcode {
        op::UNREACHABLE => validator.set_unreachable()?,
        op::NOP => {}

        op::BLOCK | op::LOOP | op::IF => {
            let Immediate::Block(block_type) = &instruction.immediate else {
                return missing_immediate();
            };
            if instruction.opcode == op::IF {
                validator.pop_expect(ValueType::I32)?;
            }
            let params = block_params(*block_type, validator.module);
            validator.pop_expect_many(&params)?;
            let height = validator.stack.len();
            validator.push_many(&params);
            validator.control.push(ControlFrame {
                block_type: *block_type,
                height,
                unreachable: false,
                is_loop: instruction.opcode == op::LOOP,
                override_results: None,
            });
        }

        op::ELSE => {
            let frame = validator.control.pop().ok_or_else(|| Error::new(ErrorKind::UnbalancedControl))?;
            let results = frame.effective_results(validator.module);
            validator.pop_expect_many(&results)?;
            if validator.stack.len() != frame.height {
                return Err(Error::new(ErrorKind::UnbalancedControl));
            }
            let params = block_params(frame.block_type, validator.module);
            validator.push_many(&params);
            validator.control.push(ControlFrame { unreachable: false, ..frame });
        }

        op::END => {
            let module = validator.module;
            let results = {
                let frame = validator.control.last().ok_or_else(|| Error::new(ErrorKind::UnbalancedControl))?;
                frame.effective_results(module)
            };
            validator.pop_expect_many(&results)?;
            let height = validator
                .control
                .last()
                .ok_or_else(|| Error::new(ErrorKind::UnbalancedControl))?
                .height;
            if validator.stack.len() != height {
                return Err(Error::new(ErrorKind::UnbalancedControl));
            }
            validator.control.pop();
            validator.push_many(&results);
        }

        op::BR => {
            let Immediate::Index(label) = &instruction.immediate else {
                return missing_immediate();
            };
            let types = label_types_at(validator, *label)?;
            validator.pop_expect_many(&types)?;
            validator.set_unreachable()?;
        }
        op::BR_IF => {
            let Immediate::Index(label) = &instruction.immediate else {
                return missing_immediate();
            };
            let label = *label;
            validator.pop_expect(ValueType::I32)?;
            let types = label_types_at(validator, label)?;
            validator.pop_expect_many(&types)?;
            validator.push_many(&types);
        }
        op::BR_TABLE => {
            let Immediate::BrTable(table) = &instruction.immediate else {
                return missing_immediate();
            };
            validator.pop_expect(ValueType::I32)?;
            let default_types = label_types_at(validator, table.default)?;
            for &target in &table.targets {
                label_types_at(validator, target)?;
            }
            validator.pop_expect_many(&default_types)?;
            validator.set_unreachable()?;
        }
        op::RETURN => {
            validator.pop_expect_many(function_results)?;
            validator.set_unreachable()?;
        }

        op::CALL => {
            let Immediate::Index(callee) = &instruction.immediate else {
                return missing_immediate();
            };
            let callee = *callee;
            let ty = validator
                .module
                .function_type(callee)
                .ok_or_else(|| Error::new(ErrorKind::IndexOutOfBounds {
                    space: "function",
                    index: callee,
                    len: validator.module.function_count(),
                }))?
                .clone();
            validator.pop_expect_many(&ty.params)?;
            validator.push_many(&ty.results);
        }
        op::CALL_INDIRECT => {
            let Immediate::CallIndirect { type_index, table_index } = &instruction.immediate else {
                return missing_immediate();
            };
            let (type_index, table_index) = (*type_index, *table_index);
            if table_index >= validator.module.table_count() {
                return Err(Error::new(ErrorKind::IndexOutOfBounds {
                    space: "table",
                    index: table_index,
                    len: validator.module.table_count(),
                }));
            }
            validator.pop_expect(ValueType::I32)?;
            let ty = validator
                .module
                .types
                .get(type_index as usize)
                .cloned()
                .ok_or_else(|| Error::new(ErrorKind::IndexOutOfBounds {
                    space: "type",
                    index: type_index,
                    len: validator.module.types.len() as u32,
                }))?;
            validator.pop_expect_many(&ty.params)?;
            validator.push_many(&ty.results);
        }

        op::DROP => {
            validator.pop()?;
        }
        op::SELECT => {
            validator.pop_expect(ValueType::I32)?;
            let b = validator.pop()?;
            let a = validator.pop()?;
            match (a, b) {
                (StackType::Known(a), StackType::Known(b)) if a != b => {
                    return Err(Error::new(ErrorKind::TypeMismatch {
                        expected: format!("{a:?}"),
                        found: format!("{b:?}"),
                    }));
                }
                (StackType::Known(a), _) => validator.push(a),
                (StackType::Unknown, StackType::Known(b)) => validator.push(b),
                (StackType::Unknown, StackType::Unknown) => validator.stack.push(StackType::Unknown),
            }
        }
        op::SELECT_T => {
            let Immediate::Select(types) = &instruction.immediate else {
                return missing_immediate();
            };
            validator.pop_expect(ValueType::I32)?;
            if let [t] = types.as_slice() {
                validator.pop_expect(*t)?;
                validator.pop_expect(*t)?;
                validator.push(*t);
            } else {
                return Err(Error::new(ErrorKind::TypeMismatch {
                    expected: "exactly one type".to_string(),
                    found: format!("{} types", types.len()),
                }));
            }
        }

        op::LOCAL_GET => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let ty = validator.local_type(*index)?;
            validator.push(ty);
        }
        op::LOCAL_SET => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let ty = validator.local_type(*index)?;
            validator.pop_expect(ty)?;
        }
        op::LOCAL_TEE => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let ty = validator.local_type(*index)?;
            validator.pop_expect(ty)?;
            validator.push(ty);
        }
        op::GLOBAL_GET => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let global = global_type(validator.module, *index)?;
            validator.push(global.value_type);
        }
        op::GLOBAL_SET => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let global = global_type(validator.module, *index)?;
            if global.mutability != Mutability::Var {
                return Err(Error::new(ErrorKind::InvalidGlobalInit));
            }
            validator.pop_expect(global.value_type)?;
        }
        op::TABLE_GET => {
            let Immediate::Index(table_index) = &instruction.immediate else {
                return missing_immediate();
            };
            let table_index = *table_index;
            let element = table_element_type(validator.module, table_index).ok_or_else(|| {
                Error::new(ErrorKind::IndexOutOfBounds { space: "table", index: table_index, len: validator.module.table_count() })
            })?;
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::Ref(element));
        }
        op::TABLE_SET => {
            let Immediate::Index(table_index) = &instruction.immediate else {
                return missing_immediate();
            };
            let table_index = *table_index;
            let element = table_element_type(validator.module, table_index).ok_or_else(|| {
                Error::new(ErrorKind::IndexOutOfBounds { space: "table", index: table_index, len: validator.module.table_count() })
            })?;
            validator.pop_expect(ValueType::Ref(element))?;
            validator.pop_expect(ValueType::I32)?;
        }

        op::I32_CONST => validator.push(ValueType::I32),
        op::I64_CONST => validator.push(ValueType::I64),
        op::F32_CONST => validator.push(ValueType::F32),
        op::F64_CONST => validator.push(ValueType::F64),

        op::MEMORY_SIZE => validator.push(ValueType::I32),
        op::MEMORY_GROW => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::I32);
        }

        op::REF_NULL => {
            let Immediate::HeapType(heap_type) = &instruction.immediate else {
                return missing_immediate();
            };
            validator.push(ValueType::Ref(ReferenceType { nullable: true, heap_type: *heap_type }));
        }
        op::REF_IS_NULL => {
            validator.pop()?;
            validator.push(ValueType::I32);
        }
        op::REF_FUNC => {
            let Immediate::Index(index) = &instruction.immediate else {
                return missing_immediate();
            };
            let index = *index;
            if index >= validator.module.function_count() {
                return Err(Error::new(ErrorKind::IndexOutOfBounds {
                    space: "function",
                    index,
                    len: validator.module.function_count(),
                }));
            }
            validator.push(ValueType::funcref());
        }

        0x28..=0x3e => {
            require_memory(validator)?;
            let Immediate::MemArg(mem_arg) = &instruction.immediate else {
                return missing_immediate();
            };
            let max_log2 = natural_alignment_log2(instruction.opcode);
            if mem_arg.align_log2 > max_log2 {
                return Err(Error::new(ErrorKind::InvalidAlignment {
                    align_log2: mem_arg.align_log2,
                    max_log2,
                }));
            }
            apply_memory_op(validator, instruction.opcode)?;
        }

        op::MEMORY_INIT => {
            require_feature(features.bulk_memory)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
        }
        op::MEMORY_COPY | op::MEMORY_FILL => {
            require_feature(features.bulk_memory)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
        }
        op::DATA_DROP => require_feature(features.bulk_memory)?,
        op::TABLE_INIT | op::TABLE_COPY => {
            require_feature(features.bulk_memory)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
        }
        op::ELEM_DROP => require_feature(features.bulk_memory)?,

        _ => {
            // Arithmetic, comparison, and conversion opcodes all
            // pop/push a fixed numeric signature; anything not modeled
            // explicitly above (SIMD, threads, tail calls, table
            // grow/size/fill) is left unchecked rather than chasing the
            // full opcode surface.
            if is_unary_numeric(instruction.opcode) {
                let ty = validator.pop()?;
                push_same(validator, ty);
            } else if is_binary_numeric(instruction.opcode) {
                validator.pop()?;
                let ty = validator.pop()?;
                push_same(validator, ty);
            }
        }
    }

    Ok(())
}

fn missing_immediate() -> Result<()> {
    Err(Error::new(ErrorKind::UnbalancedControl))
}

fn push_same(validator: &mut BodyValidator<'_>, ty: StackType) {
    match ty {
        StackType::Known(t) => validator.push(t),
        StackType::Unknown => validator.stack.push(StackType::Unknown),
    }
}

fn is_unary_numeric(opcode: u32) -> bool {
    matches!(
        opcode,
        0x45 | 0x50 | (0x67..=0x69) | (0x79..=0x7b) | (0x8b..=0x91) | (0x99..=0x9f) | (0xa7..=0xc4)
    )
}

fn is_binary_numeric(opcode: u32) -> bool {
    matches!(
        opcode,
        (0x46..=0x4f) | (0x51..=0x66) | (0x6a..=0x78) | (0x7c..=0x8a) | (0x92..=0x98) | (0xa0..=0xa6)
    )
}

fn require_memory(validator: &BodyValidator<'_>) -> Result<()> {
    if validator.module.memory_count() == 0 {
        return Err(Error::new(ErrorKind::IndexOutOfBounds { space: "memory", index: 0, len: 0 }));
    }
    Ok(())
}

fn require_feature(enabled: bool) -> Result<()> {
    if enabled {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::UnknownFeature { feature: "bulk_memory" }))
    }
}

fn apply_memory_op(validator: &mut BodyValidator<'_>, opcode: u32) -> Result<()> {
    match opcode {
        0x28 | 0x2c | 0x2d | 0x2e | 0x2f => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::I32);
        }
        0x29 | 0x30 | 0x31 | 0x32 | 0x33 | 0x34 | 0x35 => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::I64);
        }
        0x2a => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::F32);
        }
        0x2b => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::F64);
        }
        0x36 | 0x3a | 0x3b => {
            validator.pop_expect(ValueType::I32)?;
            validator.pop_expect(ValueType::I32)?;
        }
        0x37 | 0x3c | 0x3d | 0x3e => {
            validator.pop_expect(ValueType::I64)?;
            validator.pop_expect(ValueType::I32)?;
        }
        0x38 => {
            validator.pop_expect(ValueType::F32)?;
            validator.pop_expect(ValueType::I32)?;
        }
        0x39 => {
            validator.pop_expect(ValueType::F64)?;
            validator.pop_expect(ValueType::I32)?;
        }
        _ => {
            validator.pop_expect(ValueType::I32)?;
            validator.push(ValueType::I32);
        }
    }
    Ok(())
}

fn natural_alignment_log2(opcode: u32) -> u32 {
    match opcode {
        0x28 | 0x36 | 0x2a | 0x38 => 2,
        0x29 | 0x37 | 0x2b | 0x39 => 3,
        0x2c | 0x2d | 0x30 | 0x31 | 0x3a | 0x3c => 0,
        0x2e | 0x2f | 0x32 | 0x33 | 0x3b | 0x3d => 1,
        0x34 | 0x35 | 0x3e => 2,
        _ => 3,
    }
}

fn label_types_at(validator: &BodyValidator<'_>, label: u32) -> Result<Vec<ValueType>> {
    let index = validator
        .control
        .len()
        .checked_sub(1 + label as usize)
        .ok_or_else(|| Error::new(ErrorKind::UndefinedLabel { label }))?;
    Ok(validator.control[index].label_types(validator.module))
}

fn global_type(module: &Module, index: u32) -> Result<GlobalType> {
    let imported = module.imported_global_count();
    if index < imported {
        let mut seen = 0u32;
        for import in &module.imports {
            if let ImportDesc::Global(global_type) = &import.desc {
                if seen == index {
                    return Ok(*global_type);
                }
                seen += 1;
            }
        }
        Err(Error::new(ErrorKind::IndexOutOfBounds { space: "global", index, len: module.global_count() }))
    } else {
        module
            .globals
            .get((index - imported) as usize)
            .map(|g| g.global_type)
            .ok_or_else(|| Error::new(ErrorKind::IndexOutOfBounds { space: "global", index, len: module.global_count() }))
    }
}

fn table_element_type(module: &Module, index: u32) -> Option<ReferenceType> {
    let imported = module.imported_table_count();
    if index < imported {
        let mut seen = 0u32;
        for import in &module.imports {
            if let ImportDesc::Table(table_type) = &import.desc {
                if seen == index {
                    return Some(table_type.element);
                }
                seen += 1;
            }
        }
        None
    } else {
        module.tables.get((index - imported) as usize).map(|t| t.table_type.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmlift_format::module::{Function, LocalGroup};
    use wasmlift_format::types::FuncType;

    fn instr(opcode: u32, immediate: Immediate) -> Instruction {
        Instruction::new(opcode, immediate, 0)
    }

    fn i32_add_function() -> (Module, Code) {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]));
        module.functions.push(Function { type_index: 0 });
        let code = Code {
            locals: Vec::new(),
            body: vec![
                instr(op::LOCAL_GET, Immediate::Index(0)),
                instr(op::LOCAL_GET, Immediate::Index(1)),
                instr(0x6a, Immediate::None), // i32.add
                instr(op::END, Immediate::None),
            ],
        };
        (module, code)
    }

    #[test]
    fn well_typed_function_validates_clean() {
        let (mut module, code) = i32_add_function();
        validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap();
        module.code.push(code);
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn stack_underflow_is_rejected() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![], vec![ValueType::I32]));
        module.functions.push(Function { type_index: 0 });
        let code = Code { locals: Vec::new(), body: vec![instr(op::END, Immediate::None)] };
        let err = validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StackUnderflow));
    }

    #[test]
    fn unreachable_code_is_stack_polymorphic() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![], vec![ValueType::I32]));
        module.functions.push(Function { type_index: 0 });
        let code = Code {
            locals: Vec::new(),
            body: vec![instr(op::UNREACHABLE, Immediate::None), instr(op::END, Immediate::None)],
        };
        validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap();
    }

    #[test]
    fn local_index_out_of_bounds_is_rejected() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![], vec![]));
        module.functions.push(Function { type_index: 0 });
        let code = Code {
            locals: Vec::new(),
            body: vec![instr(op::LOCAL_GET, Immediate::Index(0)), instr(op::END, Immediate::None)],
        };
        let err = validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexOutOfBounds { space: "local", .. }));
    }

    #[test]
    fn if_without_else_requires_matching_param_and_result_types() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![ValueType::I32], vec![]));
        module.functions.push(Function { type_index: 0 });
        let code = Code {
            locals: vec![LocalGroup { count: 0, value_type: ValueType::I32 }],
            body: vec![
                instr(op::LOCAL_GET, Immediate::Index(0)),
                instr(op::IF, Immediate::Block(BlockType::Empty)),
                instr(op::END, Immediate::None),
                instr(op::END, Immediate::None),
            ],
        };
        validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap();
    }

    #[test]
    fn branch_to_undefined_label_is_rejected() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![], vec![]));
        module.functions.push(Function { type_index: 0 });
        let code = Code {
            locals: Vec::new(),
            body: vec![instr(op::BR, Immediate::Index(4)), instr(op::END, Immediate::None)],
        };
        let err = validate_function_body(&module, FeatureSet::wasm_mvp(), 0, &code).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UndefinedLabel { label: 4 }));
    }

    #[test]
    fn non_constant_global_initializer_is_rejected() {
        let mut module = Module::new();
        module.globals.push(Global {
            global_type: GlobalType { value_type: ValueType::I32, mutability: Mutability::Const },
            init: vec![instr(op::LOCAL_GET, Immediate::Index(0))],
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::NonConstantInitializer)));
    }

    #[test]
    fn mismatched_global_initializer_type_is_rejected() {
        let mut module = Module::new();
        module.globals.push(Global {
            global_type: GlobalType { value_type: ValueType::I64, mutability: Mutability::Const },
            init: vec![instr(op::I32_CONST, Immediate::S32(0))],
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::InvalidGlobalInit)));
    }

    #[test]
    fn global_initializer_may_reference_an_imported_const_global() {
        let mut module = Module::new();
        module.imports.push(wasmlift_format::module::Import {
            module: "env".to_string(),
            name: "base".to_string(),
            desc: ImportDesc::Global(GlobalType { value_type: ValueType::I32, mutability: Mutability::Const }),
        });
        module.globals.push(Global {
            global_type: GlobalType { value_type: ValueType::I32, mutability: Mutability::Const },
            init: vec![instr(op::GLOBAL_GET, Immediate::Index(0))],
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn global_initializer_cannot_reference_a_module_defined_global() {
        let mut module = Module::new();
        module.globals.push(Global {
            global_type: GlobalType { value_type: ValueType::I32, mutability: Mutability::Const },
            init: vec![instr(op::I32_CONST, Immediate::S32(1))],
        });
        module.globals.push(Global {
            global_type: GlobalType { value_type: ValueType::I32, mutability: Mutability::Const },
            init: vec![instr(op::GLOBAL_GET, Immediate::Index(0))],
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::NonConstantInitializer)));
    }

    #[test]
    fn non_i32_active_element_offset_is_rejected() {
        let mut module = Module::new();
        module.tables.push(wasmlift_format::module::Table {
            table_type: wasmlift_format::types::TableType {
                element: ReferenceType::funcref(),
                limits: wasmlift_format::types::Limits::new(0),
            },
        });
        module.elements.push(wasmlift_format::module::Element {
            mode: ElementMode::Active { table_index: 0, offset: vec![instr(op::I64_CONST, Immediate::S64(0))] },
            init: ElementInit::FuncIndices(Vec::new()),
            encoding: wasmlift_format::tags::ElementEncoding::ActiveFuncIndices,
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::TypeMismatch { .. })));
    }

    #[test]
    fn non_i32_active_data_offset_is_rejected() {
        let mut module = Module::new();
        module.memories.push(wasmlift_format::module::Memory {
            memory_type: wasmlift_format::types::MemoryType {
                limits: wasmlift_format::types::Limits::new(0),
                index_type: wasmlift_format::types::IndexType::I32,
            },
        });
        module.data.push(wasmlift_format::module::Data {
            mode: wasmlift_format::module::DataMode::Active {
                memory_index: 0,
                offset: vec![instr(op::LOCAL_GET, Immediate::Index(0))],
            },
            init: Vec::new(),
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::NonConstantInitializer)));
    }

    #[test]
    fn duplicate_export_names_are_reported() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![], vec![]));
        module.functions.push(Function { type_index: 0 });
        module.code.push(Code { locals: Vec::new(), body: vec![instr(op::END, Immediate::None)] });
        module.exports.push(wasmlift_format::module::Export {
            name: "run".to_string(),
            kind: ExternalKind::Function,
            index: 0,
        });
        module.exports.push(wasmlift_format::module::Export {
            name: "run".to_string(),
            kind: ExternalKind::Function,
            index: 0,
        });
        let mut sink = ErrorSink::new();
        validate(&module, FeatureSet::wasm_mvp(), &mut sink);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::DuplicateExport { .. })));
    }
}
