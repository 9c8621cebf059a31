//! Structured decoding for the handful of custom sections that carry a
//! well-known internal format: `name`, `linking`, and `reloc.*`.
//!
//! Every other custom section stays exactly what [`crate::module::CustomSection`]
//! already stores: an opaque, order-preserved byte blob. These three are
//! different only in that tools (and this crate's own transform passes)
//! need to read their contents, not just carry them along; the raw bytes
//! in `CustomSection::payload` remain the source of truth the writer
//! re-emits, so decoding here never needs a matching byte-exact encoder
//! except for `name`, whose structure this crate also produces.

use wasmlift_error::{Error, ErrorKind, Result};

use crate::module::{NameMap, NameSection};
use crate::tags::{LinkingSubsectionId, NameSubsectionId, RelocationType};
use crate::{leb128, primitives};

impl NameSection {
    /// Decode a `name` custom section's payload into its subsections.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut section = NameSection::default();
        let mut pos = 0;
        while pos < payload.len() {
            let (tag, tag_len) = primitives::read_u8(payload, pos)?;
            pos += tag_len;
            let (bytes, bytes_len) = primitives::read_byte_vec(payload, pos)?;
            pos += bytes_len;
            let id = NameSubsectionId::decode(tag).ok_or_else(|| Error::at(pos, ErrorKind::UnknownSectionId { id: tag }))?;
            match id {
                NameSubsectionId::Module => {
                    let (name, _) = primitives::read_string(bytes, 0)?;
                    section.module_name = Some(name);
                }
                NameSubsectionId::Function => {
                    section.function_names = decode_name_map(bytes, 0)?.0;
                }
                NameSubsectionId::Local => {
                    section.local_names = decode_indirect_name_map(bytes)?;
                }
                other => section.other.push((other, bytes.to_vec())),
            }
        }
        Ok(section)
    }

    /// Re-encode the subsections back into a `name` section payload.
    ///
    /// A module decoded from a conventionally-ordered `name` section
    /// (module name, then function names, then local names, then any
    /// other subsections in ascending id order) re-encodes byte for
    /// byte; a section whose subsections appeared out of that order
    /// does not round-trip exactly, since the order isn't retained once
    /// split into these fields.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(name) = &self.module_name {
            push_subsection(&mut out, NameSubsectionId::Module.encode(), &primitives::write_string(name));
        }
        if !self.function_names.names.is_empty() {
            push_subsection(&mut out, NameSubsectionId::Function.encode(), &encode_name_map(&self.function_names));
        }
        if !self.local_names.is_empty() {
            push_subsection(&mut out, NameSubsectionId::Local.encode(), &encode_indirect_name_map(&self.local_names));
        }
        for (id, bytes) in &self.other {
            push_subsection(&mut out, id.encode(), bytes);
        }
        out
    }
}

fn push_subsection(out: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&primitives::write_byte_vec(payload));
}

fn decode_name_map(bytes: &[u8], start: usize) -> Result<(NameMap, usize)> {
    let (count, len) = leb128::read_u32(bytes, start)?;
    let mut pos = start + len;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (index, len) = leb128::read_u32(bytes, pos)?;
        pos += len;
        let (name, len) = primitives::read_string(bytes, pos)?;
        pos += len;
        names.push((index, name));
    }
    Ok((NameMap { names }, pos - start))
}

fn decode_indirect_name_map(bytes: &[u8]) -> Result<Vec<(u32, NameMap)>> {
    let (count, len) = leb128::read_u32(bytes, 0)?;
    let mut pos = len;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (index, len) = leb128::read_u32(bytes, pos)?;
        pos += len;
        let (map, len) = decode_name_map(bytes, pos)?;
        pos += len;
        out.push((index, map));
    }
    Ok(out)
}

fn encode_name_map(map: &NameMap) -> Vec<u8> {
    let mut out = leb128::write_u32(map.names.len() as u32);
    for (index, name) in &map.names {
        out.extend_from_slice(&leb128::write_u32(*index));
        out.extend_from_slice(&primitives::write_string(name));
    }
    out
}

fn encode_indirect_name_map(entries: &[(u32, NameMap)]) -> Vec<u8> {
    let mut out = leb128::write_u32(entries.len() as u32);
    for (index, map) in entries {
        out.extend_from_slice(&leb128::write_u32(*index));
        out.extend_from_slice(&encode_name_map(map));
    }
    out
}

/// One entry of a `linking` section's symbol table.
///
/// `index` and `name` are both optional because an undefined symbol
/// (flag bit `0x10`) may omit either depending on its kind: an
/// undefined data symbol still carries a name but no segment index, an
/// undefined function symbol with no explicit-name flag carries
/// neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// `0` function, `1` data, `2` global, `3` section, `4` tag, `5` table.
    pub kind: u8,
    /// Raw symbol flags bitfield, including the `SYM_UNDEFINED` and
    /// `SYM_EXPLICIT_NAME` bits.
    pub flags: u32,
    /// The symbol's name, when present for this symbol's kind and flags.
    pub name: Option<String>,
    /// The index this symbol refers to, when applicable for its kind.
    pub index: Option<u32>,
}

const SYM_UNDEFINED: u32 = 0x10;
const SYM_EXPLICIT_NAME: u32 = 0x40;

/// The decoded form of a `linking` custom section.
///
/// Only the symbol table is parsed into a structured shape; segment
/// info, init functions, and comdat info are kept as raw per-subsection
/// bytes in `other` since nothing in this crate currently needs to
/// inspect them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkingSection {
    /// The `linking` section's format version.
    pub version: u32,
    /// The parsed symbol table subsection, if present.
    pub symbol_table: Vec<SymbolInfo>,
    /// Other subsections, kept as raw bytes keyed by subsection id.
    pub other: Vec<(LinkingSubsectionId, Vec<u8>)>,
}

impl LinkingSection {
    /// Decode a `linking` custom section's payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (version, len) = leb128::read_u32(payload, 0)?;
        let mut pos = len;
        let mut section = LinkingSection { version, ..LinkingSection::default() };
        while pos < payload.len() {
            let (tag, tag_len) = primitives::read_u8(payload, pos)?;
            pos += tag_len;
            let (bytes, bytes_len) = primitives::read_byte_vec(payload, pos)?;
            pos += bytes_len;
            let id = LinkingSubsectionId::decode(tag).ok_or_else(|| Error::at(pos, ErrorKind::UnknownSectionId { id: tag }))?;
            match id {
                LinkingSubsectionId::SymbolTable => section.symbol_table = decode_symbol_table(bytes)?,
                other => section.other.push((other, bytes.to_vec())),
            }
        }
        Ok(section)
    }
}

fn decode_symbol_table(bytes: &[u8]) -> Result<Vec<SymbolInfo>> {
    let (count, len) = leb128::read_u32(bytes, 0)?;
    let mut pos = len;
    let mut symbols = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (kind, kind_len) = primitives::read_u8(bytes, pos)?;
        pos += kind_len;
        let (flags, flags_len) = leb128::read_u32(bytes, pos)?;
        pos += flags_len;
        let undefined = flags & SYM_UNDEFINED != 0;
        let explicit_name = flags & SYM_EXPLICIT_NAME != 0;

        let (name, index) = match kind {
            0 | 2 | 4 | 5 => {
                let (index, len) = leb128::read_u32(bytes, pos)?;
                pos += len;
                let name = if !undefined || explicit_name {
                    let (name, len) = primitives::read_string(bytes, pos)?;
                    pos += len;
                    Some(name)
                } else {
                    None
                };
                (name, Some(index))
            }
            1 => {
                let (name, len) = primitives::read_string(bytes, pos)?;
                pos += len;
                let index = if undefined {
                    None
                } else {
                    let (index, len) = leb128::read_u32(bytes, pos)?;
                    pos += len;
                    let (_offset, len) = leb128::read_u32(bytes, pos)?;
                    pos += len;
                    let (_size, len) = leb128::read_u32(bytes, pos)?;
                    pos += len;
                    Some(index)
                };
                (Some(name), index)
            }
            3 => {
                let (index, len) = leb128::read_u32(bytes, pos)?;
                pos += len;
                (None, Some(index))
            }
            other => return Err(Error::at(pos, ErrorKind::UnknownSectionId { id: other })),
        };
        symbols.push(SymbolInfo { kind, flags, name, index });
    }
    Ok(symbols)
}

fn has_addend(reloc_type: RelocationType) -> bool {
    matches!(
        reloc_type,
        RelocationType::MemoryAddrLeb
            | RelocationType::MemoryAddrSleb
            | RelocationType::MemoryAddrI32
            | RelocationType::MemoryAddrLeb64
            | RelocationType::MemoryAddrSleb64
            | RelocationType::MemoryAddrI64
            | RelocationType::FunctionOffsetI32
            | RelocationType::SectionOffsetI32
    )
}

/// One relocation entry from a `reloc.*` custom section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// The kind of relocation and the encoding it targets.
    pub reloc_type: RelocationType,
    /// Byte offset within the target section where the relocation applies.
    pub offset: u32,
    /// The index (function, global, memory, etc.) this relocation refers to.
    pub index: u32,
    /// The addend to apply, for relocation types that carry one.
    pub addend: Option<i32>,
}

/// The decoded form of a `reloc.*` custom section: which combined
/// section (by index, counting custom sections) the entries apply to,
/// and the entries themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelocationSection {
    /// Index, counting custom sections, of the section these relocations apply to.
    pub section_index: u32,
    /// The relocation entries themselves.
    pub relocations: Vec<Relocation>,
}

impl RelocationSection {
    /// Decode a `reloc.*` custom section's payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (section_index, len) = leb128::read_u32(payload, 0)?;
        let mut pos = len;
        let (count, len) = leb128::read_u32(payload, pos)?;
        pos += len;
        let mut relocations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (tag, tag_len) = primitives::read_u8(payload, pos)?;
            pos += tag_len;
            let reloc_type = RelocationType::decode(tag).ok_or_else(|| Error::at(pos, ErrorKind::UnknownSectionId { id: tag }))?;
            let (offset, len) = leb128::read_u32(payload, pos)?;
            pos += len;
            let (index, len) = leb128::read_u32(payload, pos)?;
            pos += len;
            let addend = if has_addend(reloc_type) {
                let (addend, len) = leb128::read_i32(payload, pos)?;
                pos += len;
                Some(addend)
            } else {
                None
            };
            relocations.push(Relocation { reloc_type, offset, index, addend });
        }
        Ok(RelocationSection { section_index, relocations })
    }
}

/// Find and structurally decode the module's `name` custom section, if
/// it has one.
pub fn decode_name_section(module: &crate::module::Module) -> Option<Result<NameSection>> {
    module.find_custom_section("name").map(|section| NameSection::decode(&section.payload))
}

/// Find and structurally decode the module's `linking` custom section,
/// if it has one.
pub fn decode_linking_section(module: &crate::module::Module) -> Option<Result<LinkingSection>> {
    module.find_custom_section("linking").map(|section| LinkingSection::decode(&section.payload))
}

/// Structurally decode every `reloc.*` custom section, paired with the
/// section name it targets.
pub fn decode_relocation_sections(module: &crate::module::Module) -> Vec<(String, Result<RelocationSection>)> {
    module
        .custom_sections
        .iter()
        .filter(|section| section.name.starts_with("reloc."))
        .map(|section| (section.name.clone(), RelocationSection::decode(&section.payload)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::NameMap;

    fn name_map(pairs: &[(u32, &str)]) -> NameMap {
        NameMap { names: pairs.iter().map(|(i, n)| (*i, n.to_string())).collect() }
    }

    #[test]
    fn name_section_round_trips_byte_for_byte() {
        let section = NameSection {
            module_name: Some("adder".to_string()),
            function_names: name_map(&[(0, "add"), (1, "helper")]),
            local_names: vec![(0, name_map(&[(0, "lhs"), (1, "rhs")]))],
            other: Vec::new(),
        };
        let encoded = section.encode();
        let decoded = NameSection::decode(&encoded).unwrap();
        assert_eq!(decoded, section);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn name_section_with_only_module_name_round_trips() {
        let section = NameSection { module_name: Some("m".to_string()), ..NameSection::default() };
        let encoded = section.encode();
        assert_eq!(NameSection::decode(&encoded).unwrap(), section);
    }

    #[test]
    fn unknown_name_subsection_tag_is_rejected() {
        let payload = vec![0xff, 0x00];
        let err = NameSection::decode(&payload).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownSectionId { id: 0xff }));
    }

    #[test]
    fn linking_section_decodes_function_and_data_symbols() {
        let mut payload = leb128::write_u32(2); // linking version
        let mut symtab = leb128::write_u32(2); // two symbols
        symtab.push(0); // function symbol
        symtab.extend_from_slice(&leb128::write_u32(0)); // flags
        symtab.extend_from_slice(&leb128::write_u32(3)); // function index
        symtab.extend_from_slice(&primitives::write_string("run"));
        symtab.push(1); // data symbol
        symtab.extend_from_slice(&leb128::write_u32(0)); // flags
        symtab.extend_from_slice(&primitives::write_string("buf"));
        symtab.extend_from_slice(&leb128::write_u32(0)); // segment index
        symtab.extend_from_slice(&leb128::write_u32(4)); // offset
        symtab.extend_from_slice(&leb128::write_u32(16)); // size
        payload.push(LinkingSubsectionId::SymbolTable.encode());
        payload.extend_from_slice(&primitives::write_byte_vec(&symtab));

        let section = LinkingSection::decode(&payload).unwrap();
        assert_eq!(section.version, 2);
        assert_eq!(section.symbol_table.len(), 2);
        assert_eq!(section.symbol_table[0].name.as_deref(), Some("run"));
        assert_eq!(section.symbol_table[0].index, Some(3));
        assert_eq!(section.symbol_table[1].name.as_deref(), Some("buf"));
        assert_eq!(section.symbol_table[1].index, Some(0));
    }

    #[test]
    fn relocation_section_decodes_entries_with_and_without_addend() {
        let mut payload = leb128::write_u32(1); // applies to combined section index 1
        payload.extend_from_slice(&leb128::write_u32(2)); // two relocations
        payload.push(RelocationType::FunctionIndexLeb.encode());
        payload.extend_from_slice(&leb128::write_u32(10)); // offset
        payload.extend_from_slice(&leb128::write_u32(5)); // index
        payload.push(RelocationType::MemoryAddrSleb.encode());
        payload.extend_from_slice(&leb128::write_u32(20));
        payload.extend_from_slice(&leb128::write_u32(7));
        payload.extend_from_slice(&leb128::write_i32(100)); // addend

        let section = RelocationSection::decode(&payload).unwrap();
        assert_eq!(section.section_index, 1);
        assert_eq!(section.relocations.len(), 2);
        assert_eq!(section.relocations[0].addend, None);
        assert_eq!(section.relocations[1].addend, Some(100));
    }
}
