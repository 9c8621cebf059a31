//! The lazy, streaming reader: section framing plus a pull iterator per
//! known section that yields entities on demand without materializing
//! the whole module.
//!
//! Every entity parser takes a [`FeatureSet`] by value and rejects a
//! recognized-but-disabled encoding with [`ErrorKind::UnknownFeature`]
//! through [`require_feature`], the same policy the validator applies
//! to instruction-level constructs.

use log::trace;

use wasmlift_error::{Error, ErrorKind, Result};
use wasmlift_format::instr::Instruction;
use wasmlift_format::module::{
    ConstExpr, Data, DataMode, Element, ElementInit, ElementMode, Export, Function, Global,
    Import, ImportDesc, LocalGroup, Memory, Table,
};
use wasmlift_format::tags::{self, ElementEncoding, ExternalKind, SectionId};
use wasmlift_format::types::{
    EventType, FuncType, GlobalType, IndexType, Limits, MemoryType, Mutability, TableType, ValueType,
};
use wasmlift_format::{leb128, primitives, FeatureSet};

use crate::instr_reader::read_instruction;
use crate::reader_support::read_value_type;

/// A single framed section, before its payload has been interpreted.
#[derive(Debug, Clone)]
pub enum Payload<'a> {
    /// A known section, with its raw payload bytes and the byte offset
    /// those bytes start at.
    Known { id: SectionId, bytes: &'a [u8], offset: usize },
    /// A custom (id-0) section, already split into its name and
    /// payload.
    Custom { name: String, payload: &'a [u8], offset: usize, position: usize },
}

/// Iterates the top-level sections of a Wasm binary, after verifying the
/// `\0asm` header.
pub struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    last_known_rank: Option<u8>,
    known_sections_seen: usize,
}

impl<'a> Parser<'a> {
    /// Verify the header and build a parser positioned at the first
    /// section.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        if input.len() < 8 {
            return Err(Error::at(
                0,
                ErrorKind::UnexpectedEof { needed: 8, available: input.len() },
            ));
        }
        if input[0..4] != tags::MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(&input[0..4]);
            return Err(Error::at(0, ErrorKind::BadMagic { found }));
        }
        let version = u32::from_le_bytes([input[4], input[5], input[6], input[7]]);
        if version != tags::VERSION {
            return Err(Error::at(4, ErrorKind::BadVersion { found: version }));
        }
        Ok(Self { input, pos: 8, last_known_rank: None, known_sections_seen: 0 })
    }

    /// The byte offset the next call to `next` would start reading at.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Payload<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.input.len() {
            return None;
        }
        let section_start = self.pos;
        let id_byte = self.input[self.pos];
        self.pos += 1;

        let (size, size_len) = match leb128::read_u32(self.input, self.pos) {
            Ok(ok) => ok,
            Err(err) => return Some(Err(err)),
        };
        self.pos += size_len;

        let end = self.pos + size as usize;
        if end > self.input.len() {
            return Some(Err(Error::at(
                section_start,
                ErrorKind::SectionSizeMismatch {
                    declared: size,
                    available: self.input.len() - self.pos,
                },
            )));
        }
        let bytes = &self.input[self.pos..end];
        let offset = self.pos;
        self.pos = end;

        if id_byte == SectionId::Custom.encode() {
            let result = (|| -> Result<Payload<'a>> {
                let (name, name_len) = primitives::read_string(bytes, 0)?;
                Ok(Payload::Custom {
                    name,
                    payload: &bytes[name_len..],
                    offset: offset + name_len,
                    position: self.known_sections_seen,
                })
            })();
            return Some(result);
        }

        let Some(id) = SectionId::decode(id_byte) else {
            return Some(Err(Error::at(section_start, ErrorKind::UnknownSectionId { id: id_byte })));
        };
        let rank = id.canonical_rank().unwrap_or(0);
        if let Some(last) = self.last_known_rank {
            // Strictly decreasing rank is always an ordering violation.
            // A *repeated* rank (the same section id twice in a row) is
            // framed fine here and left for the eager reader to flag as
            // a duplicate, since only it has the context to say so.
            if rank < last {
                trace!("section {id:?} out of canonical order at offset {section_start}");
                return Some(Err(Error::at(section_start, ErrorKind::OrderViolation { section_id: id_byte })));
            }
        }
        self.last_known_rank = Some(rank);
        self.known_sections_seen += 1;
        Some(Ok(Payload::Known { id, bytes, offset }))
    }
}

/// A pull iterator over a length-prefixed vector of entities, parsed
/// lazily by `parse`. Stops and records no further items after the
/// first parse failure, per the "abort this iterator, not the whole
/// read" policy.
pub struct Vector<'a, T, F>
where
    F: FnMut(&'a [u8], usize, FeatureSet) -> Result<(T, usize)>,
{
    data: &'a [u8],
    base_offset: usize,
    pos: usize,
    remaining: u32,
    failed: bool,
    features: FeatureSet,
    parse: F,
}

impl<'a, T, F> Vector<'a, T, F>
where
    F: FnMut(&'a [u8], usize, FeatureSet) -> Result<(T, usize)>,
{
    /// Build a vector reader over `data`, whose first bytes are a
    /// LEB128 `u32` element count. `base_offset` is `data`'s absolute
    /// offset in the original input, for error anchoring.
    pub fn new(data: &'a [u8], base_offset: usize, features: FeatureSet, parse: F) -> Result<Self> {
        let (count, len) = leb128::read_u32(data, 0)?;
        Ok(Self { data, base_offset, pos: len, remaining: count, failed: false, features, parse })
    }

    /// Declared element count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.remaining
    }
}

impl<'a, T, F> Iterator for Vector<'a, T, F>
where
    F: FnMut(&'a [u8], usize, FeatureSet) -> Result<(T, usize)>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        match (self.parse)(self.data, self.pos, self.features) {
            Ok((value, consumed)) => {
                self.pos += consumed;
                self.remaining -= 1;
                Some(Ok(value))
            }
            Err(err) => {
                self.failed = true;
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}

fn read_limits(data: &[u8], pos: usize) -> Result<(Limits, usize)> {
    let (flags, mut consumed) = primitives::read_u8(data, pos)?;
    let has_max = flags & 0x01 != 0;
    let shared = flags & 0x02 != 0;
    let (min, min_len) = leb128::read_u32(data, pos + consumed)?;
    consumed += min_len;
    let max = if has_max {
        let (max, max_len) = leb128::read_u32(data, pos + consumed)?;
        consumed += max_len;
        Some(u64::from(max))
    } else {
        None
    };
    Ok((Limits { min: u64::from(min), max, shared }, consumed))
}

fn read_table_type(data: &[u8], pos: usize, features: FeatureSet) -> Result<(TableType, usize)> {
    let (element, element_len) = read_value_type(data, pos, features)?;
    let reference = match element {
        ValueType::Ref(r) => r,
        _ => return Err(Error::at(pos, ErrorKind::NonFunctionRefInTable)),
    };
    let (limits, limits_len) = read_limits(data, pos + element_len)?;
    Ok((TableType { element: reference, limits }, element_len + limits_len))
}

fn read_memory_type(data: &[u8], pos: usize) -> Result<(MemoryType, usize)> {
    let (limits, consumed) = read_limits(data, pos)?;
    Ok((MemoryType { limits, index_type: IndexType::I32 }, consumed))
}

fn read_global_type(data: &[u8], pos: usize, features: FeatureSet) -> Result<(GlobalType, usize)> {
    let (value_type, value_len) = read_value_type(data, pos, features)?;
    let (mutability_byte, mutability_len) = primitives::read_u8(data, pos + value_len)?;
    let mutability = match mutability_byte {
        0x00 => Mutability::Const,
        0x01 => Mutability::Var,
        other => return Err(Error::at(pos + value_len, ErrorKind::UnknownOpcode { opcode: u32::from(other) })),
    };
    Ok((GlobalType { value_type, mutability }, value_len + mutability_len))
}

/// Read a constant-expression: a restricted instruction sequence
/// terminated by `end`, not including that `end` opcode.
fn read_const_expr(data: &[u8], pos: usize, features: FeatureSet) -> Result<(ConstExpr, usize)> {
    let mut instrs = Vec::new();
    let mut offset = pos;
    loop {
        let instr = read_instruction(data, offset, features)?;
        offset += instr.1;
        if instr.0.is_end() {
            return Ok((instrs, offset - pos));
        }
        instrs.push(instr.0);
    }
}

fn read_type_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(FuncType, usize)> {
    let (form, mut consumed) = primitives::read_u8(data, pos)?;
    if form != tags::FUNC_TYPE_FORM {
        return Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: u32::from(form) }));
    }
    let (params, params_len) = read_value_type_vec(data, pos + consumed, features)?;
    consumed += params_len;
    let (results, results_len) = read_value_type_vec(data, pos + consumed, features)?;
    consumed += results_len;
    Ok((FuncType { params, results }, consumed))
}

fn read_value_type_vec(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Vec<ValueType>, usize)> {
    let (count, mut consumed) = leb128::read_u32(data, pos)?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value_type, len) = read_value_type(data, pos + consumed, features)?;
        consumed += len;
        values.push(value_type);
    }
    Ok((values, consumed))
}

fn read_import(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Import, usize)> {
    let (module, module_len) = primitives::read_string(data, pos)?;
    let (name, name_len) = primitives::read_string(data, pos + module_len)?;
    let (kind_byte, kind_len) = primitives::read_u8(data, pos + module_len + name_len)?;
    let kind = ExternalKind::decode(kind_byte)
        .ok_or_else(|| Error::at(pos, ErrorKind::UnknownOpcode { opcode: u32::from(kind_byte) }))?;
    let desc_offset = pos + module_len + name_len + kind_len;
    let (desc, desc_len) = match kind {
        ExternalKind::Function => {
            let (idx, len) = leb128::read_u32(data, desc_offset)?;
            (ImportDesc::Function(idx), len)
        }
        ExternalKind::Table => {
            let (table_type, len) = read_table_type(data, desc_offset, features)?;
            (ImportDesc::Table(table_type), len)
        }
        ExternalKind::Memory => {
            let (memory_type, len) = read_memory_type(data, desc_offset)?;
            (ImportDesc::Memory(memory_type), len)
        }
        ExternalKind::Global => {
            let (global_type, len) = read_global_type(data, desc_offset, features)?;
            (ImportDesc::Global(global_type), len)
        }
        ExternalKind::Tag => {
            let (attribute, attr_len) = primitives::read_u8(data, desc_offset)?;
            let (type_index, idx_len) = leb128::read_u32(data, desc_offset + attr_len)?;
            (ImportDesc::Event(EventType { attribute, type_index }), attr_len + idx_len)
        }
    };
    Ok((Import { module, name, desc }, module_len + name_len + kind_len + desc_len))
}

fn read_function_entry(data: &[u8], pos: usize, _features: FeatureSet) -> Result<(Function, usize)> {
    let (type_index, len) = leb128::read_u32(data, pos)?;
    Ok((Function { type_index }, len))
}

fn read_table_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Table, usize)> {
    let (table_type, len) = read_table_type(data, pos, features)?;
    Ok((Table { table_type }, len))
}

fn read_memory_entry(data: &[u8], pos: usize, _features: FeatureSet) -> Result<(Memory, usize)> {
    let (memory_type, len) = read_memory_type(data, pos)?;
    Ok((Memory { memory_type }, len))
}

fn read_global_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Global, usize)> {
    let (global_type, type_len) = read_global_type(data, pos, features)?;
    let (init, init_len) = read_const_expr(data, pos + type_len, features)?;
    Ok((Global { global_type, init }, type_len + init_len))
}

fn read_export_entry(data: &[u8], pos: usize, _features: FeatureSet) -> Result<(Export, usize)> {
    let (name, name_len) = primitives::read_string(data, pos)?;
    let (kind_byte, kind_len) = primitives::read_u8(data, pos + name_len)?;
    let kind = ExternalKind::decode(kind_byte)
        .ok_or_else(|| Error::at(pos, ErrorKind::UnknownOpcode { opcode: u32::from(kind_byte) }))?;
    let (index, index_len) = leb128::read_u32(data, pos + name_len + kind_len)?;
    Ok((Export { name, kind, index }, name_len + kind_len + index_len))
}

fn read_element_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Element, usize)> {
    let (flags, mut consumed) = leb128::read_u32(data, pos)?;
    let encoding = ElementEncoding::decode(flags)
        .ok_or_else(|| Error::at(pos, ErrorKind::UnknownOpcode { opcode: flags }))?;
    if !matches!(encoding, ElementEncoding::ActiveFuncIndices) {
        crate::reader::require_feature(features.bulk_memory || features.reference_types, "bulk_memory", pos)?;
    }

    let (mode, init) = match encoding {
        ElementEncoding::ActiveFuncIndices => {
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            let (indices, indices_len) = read_u32_vec(data, pos + consumed)?;
            consumed += indices_len;
            (ElementMode::Active { table_index: 0, offset }, ElementInit::FuncIndices(indices))
        }
        ElementEncoding::PassiveFuncIndices | ElementEncoding::DeclaredFuncIndices => {
            let (_elem_kind, kind_len) = primitives::read_u8(data, pos + consumed)?;
            consumed += kind_len;
            let (indices, indices_len) = read_u32_vec(data, pos + consumed)?;
            consumed += indices_len;
            let mode = if matches!(encoding, ElementEncoding::PassiveFuncIndices) {
                ElementMode::Passive
            } else {
                ElementMode::Declared
            };
            (mode, ElementInit::FuncIndices(indices))
        }
        ElementEncoding::ActiveFuncIndicesExplicitTable => {
            let (table_index, table_len) = leb128::read_u32(data, pos + consumed)?;
            consumed += table_len;
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            let (_elem_kind, kind_len) = primitives::read_u8(data, pos + consumed)?;
            consumed += kind_len;
            let (indices, indices_len) = read_u32_vec(data, pos + consumed)?;
            consumed += indices_len;
            (ElementMode::Active { table_index, offset }, ElementInit::FuncIndices(indices))
        }
        ElementEncoding::ActiveExprs => {
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            let (exprs, exprs_len) = read_const_expr_vec(data, pos + consumed, features)?;
            consumed += exprs_len;
            (
                ElementMode::Active { table_index: 0, offset },
                ElementInit::Exprs { element_type: ValueType::funcref(), exprs },
            )
        }
        ElementEncoding::PassiveExprs | ElementEncoding::DeclaredExprs => {
            let (element_type, type_len) = read_value_type(data, pos + consumed, features)?;
            consumed += type_len;
            let (exprs, exprs_len) = read_const_expr_vec(data, pos + consumed, features)?;
            consumed += exprs_len;
            let mode =
                if matches!(encoding, ElementEncoding::PassiveExprs) { ElementMode::Passive } else { ElementMode::Declared };
            (mode, ElementInit::Exprs { element_type, exprs })
        }
        ElementEncoding::ActiveExprsExplicitTable => {
            let (table_index, table_len) = leb128::read_u32(data, pos + consumed)?;
            consumed += table_len;
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            let (element_type, type_len) = read_value_type(data, pos + consumed, features)?;
            consumed += type_len;
            let (exprs, exprs_len) = read_const_expr_vec(data, pos + consumed, features)?;
            consumed += exprs_len;
            (ElementMode::Active { table_index, offset }, ElementInit::Exprs { element_type, exprs })
        }
    };

    Ok((Element { mode, init, encoding }, consumed))
}

fn read_u32_vec(data: &[u8], pos: usize) -> Result<(Vec<u32>, usize)> {
    let (count, mut consumed) = leb128::read_u32(data, pos)?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, len) = leb128::read_u32(data, pos + consumed)?;
        consumed += len;
        values.push(value);
    }
    Ok((values, consumed))
}

fn read_const_expr_vec(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Vec<ConstExpr>, usize)> {
    let (count, mut consumed) = leb128::read_u32(data, pos)?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (expr, len) = read_const_expr(data, pos + consumed, features)?;
        consumed += len;
        values.push(expr);
    }
    Ok((values, consumed))
}

fn read_data_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(Data, usize)> {
    let (flag, mut consumed) = leb128::read_u32(data, pos)?;
    let mode = match flag {
        0 => {
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            DataMode::Active { memory_index: 0, offset }
        }
        1 => DataMode::Passive,
        2 => {
            crate::reader::require_feature(features.multi_memory, "multi_memory", pos)?;
            let (memory_index, idx_len) = leb128::read_u32(data, pos + consumed)?;
            consumed += idx_len;
            let (offset, offset_len) = read_const_expr(data, pos + consumed, features)?;
            consumed += offset_len;
            DataMode::Active { memory_index, offset }
        }
        other => return Err(Error::at(pos, ErrorKind::UnknownOpcode { opcode: other })),
    };
    if flag != 0 {
        crate::reader::require_feature(features.bulk_memory, "bulk_memory", pos)?;
    }
    let (init, init_len) = primitives::read_byte_vec(data, pos + consumed)?;
    consumed += init_len;
    Ok((Data { mode, init: init.to_vec() }, consumed))
}

fn read_code_entry(data: &[u8], pos: usize, features: FeatureSet) -> Result<(wasmlift_format::module::Code, usize)> {
    let (body_size, size_len) = leb128::read_u32(data, pos)?;
    let body_start = pos + size_len;
    let body_size = body_size as usize;
    if body_start > data.len() || body_size > data.len() - body_start {
        return Err(Error::at(
            body_start,
            ErrorKind::SectionSizeMismatch {
                declared: body_size as u32,
                available: data.len().saturating_sub(body_start),
            },
        ));
    }
    let body_bytes = &data[body_start..body_start + body_size];

    let (local_group_count, mut body_pos) = leb128::read_u32(body_bytes, 0)?;
    let mut locals = Vec::with_capacity(local_group_count as usize);
    for _ in 0..local_group_count {
        let (count, count_len) = leb128::read_u32(body_bytes, body_pos)?;
        body_pos += count_len;
        let (value_type, type_len) = read_value_type(body_bytes, body_pos, features)?;
        body_pos += type_len;
        locals.push(LocalGroup { count, value_type });
    }

    let mut instructions = Vec::new();
    loop {
        let (instr, len) = read_instruction(body_bytes, body_pos, features)?;
        body_pos += len;
        let is_end = instr.is_end();
        instructions.push(instr);
        if is_end && body_pos == body_bytes.len() {
            break;
        }
    }

    Ok((wasmlift_format::module::Code { locals, body: instructions }, size_len + body_size))
}

/// A lazily-iterated view of one known section's entities.
pub enum KnownSection<'a> {
    Type(Vector<'a, FuncType, fn(&'a [u8], usize, FeatureSet) -> Result<(FuncType, usize)>>),
    Import(Vector<'a, Import, fn(&'a [u8], usize, FeatureSet) -> Result<(Import, usize)>>),
    Function(Vector<'a, Function, fn(&'a [u8], usize, FeatureSet) -> Result<(Function, usize)>>),
    Table(Vector<'a, Table, fn(&'a [u8], usize, FeatureSet) -> Result<(Table, usize)>>),
    Memory(Vector<'a, Memory, fn(&'a [u8], usize, FeatureSet) -> Result<(Memory, usize)>>),
    Global(Vector<'a, Global, fn(&'a [u8], usize, FeatureSet) -> Result<(Global, usize)>>),
    Export(Vector<'a, Export, fn(&'a [u8], usize, FeatureSet) -> Result<(Export, usize)>>),
    Start(u32),
    Element(Vector<'a, Element, fn(&'a [u8], usize, FeatureSet) -> Result<(Element, usize)>>),
    Code(
        Vector<
            'a,
            wasmlift_format::module::Code,
            fn(&'a [u8], usize, FeatureSet) -> Result<(wasmlift_format::module::Code, usize)>,
        >,
    ),
    Data(Vector<'a, Data, fn(&'a [u8], usize, FeatureSet) -> Result<(Data, usize)>>),
    DataCount(u32),
}

/// Interpret a known section's raw bytes as its typed lazy reader.
pub fn open_known_section<'a>(
    id: SectionId,
    bytes: &'a [u8],
    offset: usize,
    features: FeatureSet,
) -> Result<KnownSection<'a>> {
    Ok(match id {
        SectionId::Custom => {
            return Err(Error::at(offset, ErrorKind::UnknownSectionId { id: SectionId::Custom.encode() }));
        }
        SectionId::Type => KnownSection::Type(Vector::new(bytes, offset, features, read_type_entry)?),
        SectionId::Import => KnownSection::Import(Vector::new(bytes, offset, features, read_import)?),
        SectionId::Function => KnownSection::Function(Vector::new(bytes, offset, features, read_function_entry)?),
        SectionId::Table => KnownSection::Table(Vector::new(bytes, offset, features, read_table_entry)?),
        SectionId::Memory => KnownSection::Memory(Vector::new(bytes, offset, features, read_memory_entry)?),
        SectionId::Global => KnownSection::Global(Vector::new(bytes, offset, features, read_global_entry)?),
        SectionId::Export => KnownSection::Export(Vector::new(bytes, offset, features, read_export_entry)?),
        SectionId::Start => {
            let (index, _) = leb128::read_u32(bytes, 0)?;
            KnownSection::Start(index)
        }
        SectionId::Element => KnownSection::Element(Vector::new(bytes, offset, features, read_element_entry)?),
        SectionId::Code => KnownSection::Code(Vector::new(bytes, offset, features, read_code_entry)?),
        SectionId::Data => KnownSection::Data(Vector::new(bytes, offset, features, read_data_entry)?),
        SectionId::DataCount => {
            crate::reader::require_feature(features.bulk_memory, "bulk_memory", offset)?;
            let (count, _) = leb128::read_u32(bytes, 0)?;
            KnownSection::DataCount(count)
        }
    })
}

/// Shared rejection path for constructs that are recognized but whose
/// feature flag is off in the caller's feature set.
pub fn require_feature(enabled: bool, feature: &'static str, offset: usize) -> Result<()> {
    if enabled {
        Ok(())
    } else {
        Err(Error::at(offset, ErrorKind::UnknownFeature { feature }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leb(value: u32) -> Vec<u8> {
        leb128::write_u32(value)
    }

    fn empty_module() -> Vec<u8> {
        let mut module = tags::MAGIC.to_vec();
        module.extend_from_slice(&tags::VERSION.to_le_bytes());
        module
    }

    #[test]
    fn parses_empty_module_header() {
        let module = empty_module();
        let mut parser = Parser::new(&module).unwrap();
        assert!(parser.next().is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0x00, 0x61, 0x73, 0x00, 0x01, 0x00, 0x00, 0x00];
        let err = Parser::new(&bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadMagic { .. }));
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = [0x00, 0x61, 0x73, 0x6d, 0x02, 0x00, 0x00, 0x00];
        let err = Parser::new(&bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadVersion { found: 2 }));
    }

    #[test]
    fn reads_minimal_function_section() {
        let mut module = empty_module();
        let mut type_section = leb(1);
        type_section.push(tags::FUNC_TYPE_FORM);
        type_section.extend_from_slice(&leb(0));
        type_section.extend_from_slice(&leb(0));
        module.push(SectionId::Type.encode());
        module.extend_from_slice(&leb(type_section.len() as u32));
        module.extend_from_slice(&type_section);

        let mut parser = Parser::new(&module).unwrap();
        let payload = parser.next().unwrap().unwrap();
        match payload {
            Payload::Known { id: SectionId::Type, bytes, .. } => {
                let types = match open_known_section(SectionId::Type, bytes, 0, FeatureSet::wasm_mvp()).unwrap() {
                    KnownSection::Type(v) => v.collect::<Result<Vec<_>>>().unwrap(),
                    _ => unreachable!(),
                };
                assert_eq!(types.len(), 1);
                assert!(types[0].params.is_empty());
                assert!(types[0].results.is_empty());
            }
            _ => panic!("expected type section"),
        }
    }

    #[test]
    fn out_of_order_known_sections_are_reported() {
        let mut module = empty_module();
        module.push(SectionId::Function.encode());
        module.extend_from_slice(&leb(1));
        module.push(0x00);
        module.push(SectionId::Type.encode());
        module.extend_from_slice(&leb(1));
        module.push(0x00);

        let mut parser = Parser::new(&module).unwrap();
        parser.next().unwrap().unwrap();
        let err = parser.next().unwrap().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OrderViolation { .. }));
    }

    #[test]
    fn truncated_code_entry_is_an_error_not_a_panic() {
        let mut body = leb(200); // declared size far exceeds what follows
        body.extend_from_slice(&[0x00, 0x0b]);
        let err = read_code_entry(&body, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SectionSizeMismatch { .. }));
    }

    #[test]
    fn bulk_memory_element_encoding_is_rejected_under_mvp() {
        // flags=1 (PassiveFuncIndices), elem kind 0x00, zero entries.
        let bytes = [0x01, 0x00, 0x00];
        let err = read_element_entry(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { .. }));
    }

    #[test]
    fn data_count_section_needs_bulk_memory() {
        let bytes = leb(0);
        let err = open_known_section(SectionId::DataCount, &bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "bulk_memory" }));
    }
}
