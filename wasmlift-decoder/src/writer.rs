//! The deterministic re-encoder: turns a [`Module`] back into Wasm
//! binary bytes.
//!
//! Each known section is built into its own buffer, then emitted as
//! `id | leb128(size) | payload` in the canonical order `reader.rs`
//! enforces on the way in. Custom sections are re-inserted at the
//! [`CustomSection::position`] they were read from, so a binary that
//! round-trips through [`crate::eager::decode_module`] and back through
//! [`write_module`] comes out byte-identical (modulo non-minimal
//! LEB128 encodings in the input, which this writer always normalizes
//! to minimal form).
//!
//! This module only encodes what the reader can produce: a `Module`
//! with locally declared events (the Tag section doesn't exist in this
//! format's section-id space — only imported tags are representable)
//! would have nothing to write them into, and is out of scope here the
//! same way it's out of scope for `eager::decode_module`.

use wasmlift_format::instr::{self as op, BrTable, CopyArg, Immediate, InitArg, Instruction, MemArg};
use wasmlift_format::module::{
    Code, ConstExpr, CustomSection, Data, DataMode, Element, ElementInit, ElementMode, Export,
    Function, Global, Import, ImportDesc, Memory, Module, Table,
};
use wasmlift_format::tags::{self, ElementEncoding, SectionId};
use wasmlift_format::types::{BlockType, FuncType, GlobalType, Limits, MemoryType, Mutability, TableType, ValueType};
use wasmlift_format::{leb128, primitives};

use crate::reader_support::write_value_type;

/// Encode a module to its Wasm binary representation.
#[must_use]
pub fn write_module(module: &Module) -> Vec<u8> {
    let mut out = tags::MAGIC.to_vec();
    out.extend_from_slice(&tags::VERSION.to_le_bytes());

    let mut known: Vec<(SectionId, Vec<u8>)> = Vec::new();
    if !module.types.is_empty() {
        known.push((SectionId::Type, write_vector(&module.types, write_type_entry)));
    }
    if !module.imports.is_empty() {
        known.push((SectionId::Import, write_vector(&module.imports, write_import)));
    }
    if !module.functions.is_empty() {
        known.push((SectionId::Function, write_vector(&module.functions, write_function_entry)));
    }
    if !module.tables.is_empty() {
        known.push((SectionId::Table, write_vector(&module.tables, write_table_entry)));
    }
    if !module.memories.is_empty() {
        known.push((SectionId::Memory, write_vector(&module.memories, write_memory_entry)));
    }
    if !module.globals.is_empty() {
        known.push((SectionId::Global, write_vector(&module.globals, write_global_entry)));
    }
    if !module.exports.is_empty() {
        known.push((SectionId::Export, write_vector(&module.exports, write_export_entry)));
    }
    if let Some(start) = module.start {
        known.push((SectionId::Start, leb128::write_u32(start)));
    }
    if !module.elements.is_empty() {
        known.push((SectionId::Element, write_vector(&module.elements, write_element_entry)));
    }
    if let Some(count) = module.data_count {
        known.push((SectionId::DataCount, leb128::write_u32(count)));
    }
    if !module.code.is_empty() {
        known.push((SectionId::Code, write_vector(&module.code, write_code_entry)));
    }
    if !module.data.is_empty() {
        known.push((SectionId::Data, write_vector(&module.data, write_data_entry)));
    }

    for i in 0..=known.len() {
        for custom in module.custom_sections.iter().filter(|section| section.position == i) {
            push_section(&mut out, SectionId::Custom.encode(), &write_custom_section(custom));
        }
        if let Some((id, payload)) = known.get(i) {
            push_section(&mut out, id.encode(), payload);
        }
    }

    out
}

fn push_section(out: &mut Vec<u8>, id: u8, payload: &[u8]) {
    out.push(id);
    out.extend(leb128::write_u32(payload.len() as u32));
    out.extend_from_slice(payload);
}

fn write_vector<T>(items: &[T], mut encode: impl FnMut(&T) -> Vec<u8>) -> Vec<u8> {
    let mut out = leb128::write_u32(items.len() as u32);
    for item in items {
        out.extend(encode(item));
    }
    out
}

fn write_custom_section(section: &CustomSection) -> Vec<u8> {
    let mut out = primitives::write_string(&section.name);
    out.extend_from_slice(&section.payload);
    out
}

fn write_limits(limits: &Limits) -> Vec<u8> {
    let mut flags = 0u8;
    if limits.max.is_some() {
        flags |= 0x01;
    }
    if limits.shared {
        flags |= 0x02;
    }
    let mut out = vec![flags];
    out.extend(leb128::write_u32(limits.min as u32));
    if let Some(max) = limits.max {
        out.extend(leb128::write_u32(max as u32));
    }
    out
}

fn write_table_type(table_type: &TableType) -> Vec<u8> {
    let mut out = write_value_type(ValueType::Ref(table_type.element));
    out.extend(write_limits(&table_type.limits));
    out
}

fn write_memory_type(memory_type: &MemoryType) -> Vec<u8> {
    write_limits(&memory_type.limits)
}

fn write_global_type(global_type: &GlobalType) -> Vec<u8> {
    let mut out = write_value_type(global_type.value_type);
    out.push(match global_type.mutability {
        Mutability::Const => 0x00,
        Mutability::Var => 0x01,
    });
    out
}

fn write_const_expr(expr: &ConstExpr) -> Vec<u8> {
    let mut out = Vec::new();
    for instr in expr {
        out.extend(write_instruction(instr));
    }
    out.push(op::END as u8);
    out
}

fn write_value_type_vec(types: &[ValueType]) -> Vec<u8> {
    let mut out = leb128::write_u32(types.len() as u32);
    for value_type in types {
        out.extend(write_value_type(*value_type));
    }
    out
}

fn write_type_entry(func_type: &FuncType) -> Vec<u8> {
    let mut out = vec![tags::FUNC_TYPE_FORM];
    out.extend(write_value_type_vec(&func_type.params));
    out.extend(write_value_type_vec(&func_type.results));
    out
}

fn write_import(import: &Import) -> Vec<u8> {
    let mut out = primitives::write_string(&import.module);
    out.extend(primitives::write_string(&import.name));
    out.push(import.desc.kind().encode());
    out.extend(match &import.desc {
        ImportDesc::Function(type_index) => leb128::write_u32(*type_index),
        ImportDesc::Table(table_type) => write_table_type(table_type),
        ImportDesc::Memory(memory_type) => write_memory_type(memory_type),
        ImportDesc::Global(global_type) => write_global_type(global_type),
        ImportDesc::Event(event_type) => {
            let mut desc = vec![event_type.attribute];
            desc.extend(leb128::write_u32(event_type.type_index));
            desc
        }
    });
    out
}

fn write_function_entry(function: &Function) -> Vec<u8> {
    leb128::write_u32(function.type_index)
}

fn write_table_entry(table: &Table) -> Vec<u8> {
    write_table_type(&table.table_type)
}

fn write_memory_entry(memory: &Memory) -> Vec<u8> {
    write_memory_type(&memory.memory_type)
}

fn write_global_entry(global: &Global) -> Vec<u8> {
    let mut out = write_global_type(&global.global_type);
    out.extend(write_const_expr(&global.init));
    out
}

fn write_export_entry(export: &Export) -> Vec<u8> {
    let mut out = primitives::write_string(&export.name);
    out.push(export.kind.encode());
    out.extend(leb128::write_u32(export.index));
    out
}

fn write_func_indices(init: &ElementInit) -> Vec<u8> {
    let ElementInit::FuncIndices(indices) = init else { return leb128::write_u32(0) };
    let mut out = leb128::write_u32(indices.len() as u32);
    for index in indices {
        out.extend(leb128::write_u32(*index));
    }
    out
}

fn write_const_expr_vec(exprs: &[ConstExpr]) -> Vec<u8> {
    let mut out = leb128::write_u32(exprs.len() as u32);
    for expr in exprs {
        out.extend(write_const_expr(expr));
    }
    out
}

/// The element type and expression list, for the `*Exprs` encodings
/// that carry both.
fn element_type_and_exprs(init: &ElementInit) -> (ValueType, &[ConstExpr]) {
    match init {
        ElementInit::Exprs { element_type, exprs } => (*element_type, exprs),
        ElementInit::FuncIndices(_) => (ValueType::funcref(), &[]),
    }
}

fn write_element_entry(element: &Element) -> Vec<u8> {
    let mut out = leb128::write_u32(element.encoding.encode());
    match element.encoding {
        ElementEncoding::ActiveFuncIndices => {
            if let ElementMode::Active { offset, .. } = &element.mode {
                out.extend(write_const_expr(offset));
            }
            out.extend(write_func_indices(&element.init));
        }
        ElementEncoding::PassiveFuncIndices | ElementEncoding::DeclaredFuncIndices => {
            out.push(0x00); // elem kind: funcref
            out.extend(write_func_indices(&element.init));
        }
        ElementEncoding::ActiveFuncIndicesExplicitTable => {
            if let ElementMode::Active { table_index, offset } = &element.mode {
                out.extend(leb128::write_u32(*table_index));
                out.extend(write_const_expr(offset));
            }
            out.push(0x00);
            out.extend(write_func_indices(&element.init));
        }
        ElementEncoding::ActiveExprs => {
            if let ElementMode::Active { offset, .. } = &element.mode {
                out.extend(write_const_expr(offset));
            }
            let (_, exprs) = element_type_and_exprs(&element.init);
            out.extend(write_const_expr_vec(exprs));
        }
        ElementEncoding::PassiveExprs | ElementEncoding::DeclaredExprs => {
            let (element_type, exprs) = element_type_and_exprs(&element.init);
            out.extend(write_value_type(element_type));
            out.extend(write_const_expr_vec(exprs));
        }
        ElementEncoding::ActiveExprsExplicitTable => {
            if let ElementMode::Active { table_index, offset } = &element.mode {
                out.extend(leb128::write_u32(*table_index));
                out.extend(write_const_expr(offset));
            }
            let (element_type, exprs) = element_type_and_exprs(&element.init);
            out.extend(write_value_type(element_type));
            out.extend(write_const_expr_vec(exprs));
        }
    }
    out
}

fn write_data_entry(data: &Data) -> Vec<u8> {
    let mut out = match &data.mode {
        DataMode::Active { memory_index: 0, offset } => {
            let mut out = leb128::write_u32(0);
            out.extend(write_const_expr(offset));
            out
        }
        DataMode::Active { memory_index, offset } => {
            let mut out = leb128::write_u32(2);
            out.extend(leb128::write_u32(*memory_index));
            out.extend(write_const_expr(offset));
            out
        }
        DataMode::Passive => leb128::write_u32(1),
    };
    out.extend(primitives::write_byte_vec(&data.init));
    out
}

fn write_code_entry(code: &Code) -> Vec<u8> {
    let mut body = leb128::write_u32(code.locals.len() as u32);
    for group in &code.locals {
        body.extend(leb128::write_u32(group.count));
        body.extend(write_value_type(group.value_type));
    }
    for instr in &code.body {
        body.extend(write_instruction(instr));
    }
    let mut out = leb128::write_u32(body.len() as u32);
    out.extend(body);
    out
}

fn write_opcode(out: &mut Vec<u8>, opcode: u32) {
    if opcode <= 0xff {
        out.push(opcode as u8);
    } else {
        out.push((opcode >> 8) as u8);
        out.extend(leb128::write_u32(opcode & 0xff));
    }
}

fn write_block_type(block_type: BlockType) -> Vec<u8> {
    match block_type {
        BlockType::Empty => vec![0x40],
        BlockType::Value(value_type) => write_value_type(value_type),
        BlockType::FuncType(index) => leb128::write_i32(index as i32),
    }
}

fn write_mem_arg(mem_arg: MemArg) -> Vec<u8> {
    let mut out = leb128::write_u32(mem_arg.align_log2);
    out.extend(leb128::write_u32(mem_arg.offset as u32));
    out
}

fn write_br_table(table: &BrTable) -> Vec<u8> {
    let mut out = leb128::write_u32(table.targets.len() as u32);
    for target in &table.targets {
        out.extend(leb128::write_u32(*target));
    }
    out.extend(leb128::write_u32(table.default));
    out
}

/// Whether `opcode` discards a reserved index byte on read that
/// [`Immediate::None`] no longer carries, and so must be re-emitted as
/// a literal zero on write.
fn reserved_index_byte_for(opcode: u32) -> Option<Vec<u8>> {
    match opcode {
        op::MEMORY_SIZE | op::MEMORY_GROW => Some(vec![0x00]),
        op::MEMORY_FILL => Some(leb128::write_u32(0)),
        _ if opcode == op::prefixed(op::PREFIX_THREADS, 0x03) => Some(vec![0x00]), // atomic.fence
        _ => None,
    }
}

fn write_immediate(opcode: u32, immediate: &Immediate) -> Vec<u8> {
    match immediate {
        Immediate::None => reserved_index_byte_for(opcode).unwrap_or_default(),
        Immediate::S32(value) => leb128::write_i32(*value),
        Immediate::S64(value) => leb128::write_i64(*value),
        Immediate::F32Bits(bits) => primitives::write_f32(f32::from_bits(*bits)).to_vec(),
        Immediate::F64Bits(bits) => primitives::write_f64(f64::from_bits(*bits)).to_vec(),
        Immediate::V128Bits(bytes) => bytes.to_vec(),
        Immediate::Index(index) => leb128::write_u32(*index),
        Immediate::Block(block_type) => write_block_type(*block_type),
        Immediate::BrTable(table) => write_br_table(table),
        Immediate::CallIndirect { type_index, table_index } => {
            let mut out = leb128::write_u32(*type_index);
            out.extend(leb128::write_u32(*table_index));
            out
        }
        Immediate::Copy(CopyArg { dst, src }) => {
            let mut out = leb128::write_u32(*dst);
            out.extend(leb128::write_u32(*src));
            out
        }
        Immediate::Init(InitArg { segment, dst }) => {
            let mut out = leb128::write_u32(*segment);
            if opcode == op::MEMORY_INIT {
                out.extend(leb128::write_u32(0)); // reserved memidx, always 0 on read
            } else {
                out.extend(leb128::write_u32(*dst));
            }
            out
        }
        Immediate::Let { block_type, locals } => {
            let mut out = write_block_type(*block_type);
            out.extend(leb128::write_u32(locals.len() as u32));
            for local in locals {
                out.extend(write_value_type(*local));
            }
            out
        }
        Immediate::MemArg(mem_arg) => write_mem_arg(*mem_arg),
        Immediate::HeapType(heap_type) => crate::reader_support::write_heap_type(*heap_type),
        Immediate::Select(types) => {
            if opcode == op::SELECT_T {
                let mut out = leb128::write_u32(types.len() as u32);
                for value_type in types {
                    out.extend(write_value_type(*value_type));
                }
                out
            } else {
                Vec::new()
            }
        }
        Immediate::Shuffle(bytes) => bytes.to_vec(),
        Immediate::Lane(lane) => vec![*lane],
    }
}

fn write_instruction(instruction: &Instruction) -> Vec<u8> {
    let mut out = Vec::new();
    write_opcode(&mut out, instruction.opcode);
    out.extend(write_immediate(instruction.opcode, &instruction.immediate));
    out
}
