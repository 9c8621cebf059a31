//! Decodes a single instruction (opcode plus whatever immediate it
//! carries) starting at a given offset within a code body or constant
//! expression.
//!
//! Every recognized-but-extension-gated opcode is checked against the
//! caller's [`FeatureSet`] here, the same policy [`crate::reader_support`]
//! applies to value and heap types: a disabled feature turns a
//! perfectly well-formed encoding into [`ErrorKind::UnknownFeature`]
//! rather than silently decoding it.

use wasmlift_error::{Error, ErrorKind, Result};
use wasmlift_format::instr::{
    self, prefixed, BrTable, CopyArg, Immediate, InitArg, Instruction, MemArg, PREFIX_BULK_REF,
    PREFIX_SIMD, PREFIX_THREADS,
};
use wasmlift_format::types::{BlockType, ValueType};
use wasmlift_format::{leb128, primitives, tags, FeatureSet};

fn read_block_type(data: &[u8], pos: usize) -> Result<(BlockType, usize)> {
    if let Ok((byte, len)) = primitives::read_u8(data, pos) {
        if byte == 0x40 {
            return Ok((BlockType::Empty, len));
        }
        if let Some(value_type) = tags::decode_value_type(byte) {
            return Ok((BlockType::Value(value_type), len));
        }
    }
    let (index, len) = leb128::read_i32(data, pos)?;
    Ok((BlockType::FuncType(index as u32), len))
}

fn read_mem_arg(data: &[u8], pos: usize) -> Result<(MemArg, usize)> {
    let (align_log2, align_len) = leb128::read_u32(data, pos)?;
    let (offset, offset_len) = leb128::read_u32(data, pos + align_len)?;
    Ok((MemArg { align_log2, offset: u64::from(offset), memory_index: 0 }, align_len + offset_len))
}

fn read_br_table(data: &[u8], pos: usize) -> Result<(BrTable, usize)> {
    let (count, mut consumed) = leb128::read_u32(data, pos)?;
    let mut targets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (target, len) = leb128::read_u32(data, pos + consumed)?;
        consumed += len;
        targets.push(target);
    }
    let (default, default_len) = leb128::read_u32(data, pos + consumed)?;
    consumed += default_len;
    Ok((BrTable { targets, default }, consumed))
}

fn read_select_types(data: &[u8], pos: usize) -> Result<(Vec<ValueType>, usize)> {
    let (count, mut consumed) = leb128::read_u32(data, pos)?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (byte, byte_len) = primitives::read_u8(data, pos + consumed)?;
        let value_type = tags::decode_value_type(byte)
            .ok_or_else(|| Error::at(pos + consumed, ErrorKind::UnknownOpcode { opcode: u32::from(byte) }))?;
        consumed += byte_len;
        types.push(value_type);
    }
    Ok((types, consumed))
}

fn read_reserved_index(data: &[u8], pos: usize) -> Result<(u32, usize)> {
    leb128::read_u32(data, pos)
}

/// Decode one instruction's opcode and immediate, returning the
/// instruction and the number of bytes its encoding occupied.
pub fn read_instruction(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Instruction, usize)> {
    let (first, mut consumed) = primitives::read_u8(data, pos)?;

    if instr::is_prefix_byte(first) {
        let (suffix, suffix_len) = leb128::read_u32(data, pos + consumed)?;
        consumed += suffix_len;
        let opcode = prefixed(u32::from(first), suffix);
        let (immediate, imm_len) =
            read_prefixed_immediate(u32::from(first), suffix, data, pos + consumed, features, pos)?;
        return Ok((Instruction::new(opcode, immediate, pos), consumed + imm_len));
    }

    let opcode = u32::from(first);
    let (immediate, imm_len) = match opcode {
        instr::UNREACHABLE | instr::NOP | instr::ELSE | instr::END | instr::RETURN | instr::DROP => {
            (Immediate::None, 0)
        }

        instr::REF_IS_NULL => {
            crate::reader::require_feature(features.reference_types, "reference_types", pos)?;
            (Immediate::None, 0)
        }

        instr::BLOCK | instr::LOOP | instr::IF => {
            let (block_type, len) = read_block_type(data, pos + consumed)?;
            (Immediate::Block(block_type), len)
        }

        instr::BR | instr::BR_IF | instr::CALL | instr::RETURN_CALL | instr::LOCAL_GET
        | instr::LOCAL_SET | instr::LOCAL_TEE | instr::GLOBAL_GET | instr::GLOBAL_SET => {
            let (index, len) = leb128::read_u32(data, pos + consumed)?;
            (Immediate::Index(index), len)
        }

        instr::REF_FUNC | instr::TABLE_GET | instr::TABLE_SET => {
            crate::reader::require_feature(features.reference_types, "reference_types", pos)?;
            let (index, len) = leb128::read_u32(data, pos + consumed)?;
            (Immediate::Index(index), len)
        }

        instr::BR_TABLE => {
            let (table, len) = read_br_table(data, pos + consumed)?;
            (Immediate::BrTable(table), len)
        }

        instr::CALL_INDIRECT | instr::RETURN_CALL_INDIRECT => {
            let (type_index, type_len) = leb128::read_u32(data, pos + consumed)?;
            let (table_index, table_len) = leb128::read_u32(data, pos + consumed + type_len)?;
            (Immediate::CallIndirect { type_index, table_index }, type_len + table_len)
        }

        instr::SELECT => (Immediate::Select(Vec::new()), 0),
        instr::SELECT_T => {
            crate::reader::require_feature(features.reference_types, "reference_types", pos)?;
            let (types, len) = read_select_types(data, pos + consumed)?;
            (Immediate::Select(types), len)
        }

        instr::MEMORY_SIZE | instr::MEMORY_GROW => {
            let (_reserved, len) = read_reserved_index(data, pos + consumed)?;
            (Immediate::None, len)
        }

        instr::I32_CONST => {
            let (value, len) = leb128::read_i32(data, pos + consumed)?;
            (Immediate::S32(value), len)
        }
        instr::I64_CONST => {
            let (value, len) = leb128::read_i64(data, pos + consumed)?;
            (Immediate::S64(value), len)
        }
        instr::F32_CONST => {
            let (value, len) = primitives::read_f32(data, pos + consumed)?;
            (Immediate::F32Bits(value.to_bits()), len)
        }
        instr::F64_CONST => {
            let (value, len) = primitives::read_f64(data, pos + consumed)?;
            (Immediate::F64Bits(value.to_bits()), len)
        }

        instr::REF_NULL => {
            crate::reader::require_feature(features.reference_types, "reference_types", pos)?;
            let (heap_type, len) = crate::reader_support::read_heap_type(data, pos + consumed, features)?;
            (Immediate::HeapType(heap_type), len)
        }

        0x28..=0x3e => {
            let (mem_arg, len) = read_mem_arg(data, pos + consumed)?;
            (Immediate::MemArg(mem_arg), len)
        }

        // i32/i64/f32/f64 comparisons, arithmetic, conversions, and
        // reinterpretations: every one of these takes its operands off
        // the stack and carries no immediate of its own.
        0x45..=0xbf => (Immediate::None, 0),

        // Sign-extension proposal: i32.extend8_s through i64.extend32_s.
        0xc0..=0xc4 => {
            crate::reader::require_feature(features.sign_extension, "sign_extension", pos)?;
            (Immediate::None, 0)
        }

        other => return Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: other })),
    };

    Ok((Instruction::new(opcode, immediate, pos), consumed + imm_len))
}

fn read_prefixed_immediate(
    prefix: u32,
    suffix: u32,
    data: &[u8],
    pos: usize,
    features: FeatureSet,
    opcode_offset: usize,
) -> Result<(Immediate, usize)> {
    match prefix {
        PREFIX_BULK_REF => read_bulk_memory_immediate(suffix, data, pos, features, opcode_offset),
        PREFIX_SIMD => {
            crate::reader::require_feature(features.simd, "simd", opcode_offset)?;
            read_simd_immediate(suffix, data, pos)
        }
        PREFIX_THREADS => {
            crate::reader::require_feature(features.threads, "threads", opcode_offset)?;
            read_threads_immediate(suffix, data, pos)
        }
        other => Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: prefixed(other, suffix) })),
    }
}

fn read_bulk_memory_immediate(
    suffix: u32,
    data: &[u8],
    pos: usize,
    features: FeatureSet,
    opcode_offset: usize,
) -> Result<(Immediate, usize)> {
    match suffix {
        // i32/i64.trunc_sat_f32/f64_s/u: a distinct proposal from the
        // rest of this prefix byte, despite sharing it.
        0x00..=0x07 => {
            crate::reader::require_feature(features.saturating_float_to_int, "saturating_float_to_int", opcode_offset)?;
            Ok((Immediate::None, 0))
        }
        0x08 => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (segment, segment_len) = leb128::read_u32(data, pos)?;
            let (_memidx, memidx_len) = read_reserved_index(data, pos + segment_len)?;
            Ok((Immediate::Init(InitArg { segment, dst: 0 }), segment_len + memidx_len))
        }
        0x09 => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (segment, len) = leb128::read_u32(data, pos)?;
            Ok((Immediate::Index(segment), len))
        }
        0x0a => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (dst, dst_len) = read_reserved_index(data, pos)?;
            let (src, src_len) = read_reserved_index(data, pos + dst_len)?;
            Ok((Immediate::Copy(CopyArg { dst, src }), dst_len + src_len))
        }
        0x0b => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (_memidx, len) = read_reserved_index(data, pos)?;
            Ok((Immediate::None, len))
        }
        0x0c => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (segment, segment_len) = leb128::read_u32(data, pos)?;
            let (table, table_len) = leb128::read_u32(data, pos + segment_len)?;
            Ok((Immediate::Init(InitArg { segment, dst: table }), segment_len + table_len))
        }
        0x0d => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (segment, len) = leb128::read_u32(data, pos)?;
            Ok((Immediate::Index(segment), len))
        }
        0x0e => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", opcode_offset)?;
            let (dst, dst_len) = leb128::read_u32(data, pos)?;
            let (src, src_len) = leb128::read_u32(data, pos + dst_len)?;
            Ok((Immediate::Copy(CopyArg { dst, src }), dst_len + src_len))
        }
        // table.grow / table.size / table.fill: part of reference-types,
        // not bulk-memory, despite sharing this prefix byte.
        0x0f | 0x10 | 0x11 => {
            crate::reader::require_feature(features.reference_types, "reference_types", opcode_offset)?;
            let (table, len) = leb128::read_u32(data, pos)?;
            Ok((Immediate::Index(table), len))
        }
        other => Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: prefixed(PREFIX_BULK_REF, other) })),
    }
}

fn read_simd_immediate(suffix: u32, data: &[u8], pos: usize) -> Result<(Immediate, usize)> {
    match suffix {
        // v128.load / v128.loadNxM_s/u / v128.load32_zero etc.
        0x00..=0x0b => {
            let (mem_arg, len) = read_mem_arg(data, pos)?;
            Ok((Immediate::MemArg(mem_arg), len))
        }
        // v128.const: 16 raw bytes.
        0x0c => {
            let (bytes, len) = primitives::read_bytes(data, pos, 16)?;
            let mut lanes = [0u8; 16];
            lanes.copy_from_slice(bytes);
            Ok((Immediate::V128Bits(lanes), len))
        }
        // i8x16.shuffle: 16 lane-selector bytes.
        0x0d => {
            let (bytes, len) = primitives::read_bytes(data, pos, 16)?;
            let mut lanes = [0u8; 16];
            lanes.copy_from_slice(bytes);
            Ok((Immediate::Shuffle(lanes), len))
        }
        // *.replace_lane / *.extract_lane family and the v128.loadN_lane
        // variants: a single lane-index byte.
        0x15..=0x22 | 0x54..=0x5d => {
            let (lane, len) = primitives::read_u8(data, pos)?;
            Ok((Immediate::Lane(lane), len))
        }
        // Every other SIMD opcode (arithmetic, comparison, bitwise,
        // conversion) carries no immediate beyond its opcode.
        _ => Ok((Immediate::None, 0)),
    }
}

fn read_threads_immediate(suffix: u32, data: &[u8], pos: usize) -> Result<(Immediate, usize)> {
    match suffix {
        // atomic.fence: a single reserved byte.
        0x03 => {
            let (_reserved, len) = read_reserved_index(data, pos)?;
            Ok((Immediate::None, len))
        }
        // memory.atomic.notify / wait32 / wait64, and every atomic
        // load/store/rmw/cmpxchg: a memarg.
        0x00..=0x4e => {
            let (mem_arg, len) = read_mem_arg(data, pos)?;
            Ok((Immediate::MemArg(mem_arg), len))
        }
        other => Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: prefixed(PREFIX_THREADS, other) })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_i32_const() {
        let bytes = [instr::I32_CONST as u8, 0x7f];
        let (instruction, len) = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap();
        assert_eq!(instruction.opcode, instr::I32_CONST);
        assert_eq!(instruction.immediate, Immediate::S32(-1));
        assert_eq!(len, 2);
    }

    #[test]
    fn decodes_end() {
        let bytes = [0x0b];
        let (instruction, len) = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap();
        assert!(instruction.is_end());
        assert_eq!(len, 1);
    }

    #[test]
    fn decodes_memory_load_with_memarg() {
        let bytes = [instr::I32_LOAD as u8, 0x02, 0x00];
        let (instruction, len) = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap();
        assert_eq!(
            instruction.immediate,
            Immediate::MemArg(MemArg { align_log2: 2, offset: 0, memory_index: 0 })
        );
        assert_eq!(len, 3);
    }

    #[test]
    fn decodes_bulk_memory_copy() {
        let bytes = [0xfc, 0x0a, 0x00, 0x00];
        let features = FeatureSet { bulk_memory: true, ..FeatureSet::wasm_mvp() };
        let (instruction, len) = read_instruction(&bytes, 0, features).unwrap();
        assert_eq!(instruction.opcode, instr::MEMORY_COPY);
        assert_eq!(instruction.immediate, Immediate::Copy(CopyArg { dst: 0, src: 0 }));
        assert_eq!(len, 4);
    }

    #[test]
    fn bulk_memory_copy_is_rejected_under_mvp() {
        let bytes = [0xfc, 0x0a, 0x00, 0x00];
        let err = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "bulk_memory" }));
    }

    #[test]
    fn sign_extension_opcode_is_rejected_under_mvp() {
        let bytes = [0xc0];
        let err = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "sign_extension" }));
    }

    #[test]
    fn sign_extension_opcode_is_accepted_when_enabled() {
        let bytes = [0xc0];
        let features = FeatureSet { sign_extension: true, ..FeatureSet::wasm_mvp() };
        let (instruction, len) = read_instruction(&bytes, 0, features).unwrap();
        assert_eq!(instruction.opcode, 0xc0);
        assert_eq!(len, 1);
    }

    #[test]
    fn ref_func_needs_reference_types() {
        let bytes = [instr::REF_FUNC as u8, 0x00];
        let err = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "reference_types" }));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let bytes = [0xff];
        let err = read_instruction(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownOpcode { .. }));
    }
}
