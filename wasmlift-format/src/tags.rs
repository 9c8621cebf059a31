//! Bidirectional maps between Wasm binary-format byte tags and the
//! abstract kinds in [`crate::types`] and [`crate::module`].
//!
//! Every table here follows the same shape: an `encode` function from
//! the abstract kind to its byte tag (total, infallible), and a `decode`
//! function from the byte tag back to the abstract kind (partial: an
//! unrecognized tag yields `None`, leaving the caller to decide whether
//! that is `UnknownOpcode`, `UnknownSectionId`, or similar).

use crate::types::{HeapType, RefKind, ReferenceType, ValueType};

/// The `\0asm` magic that opens every Wasm binary.
pub const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// The only binary format version this toolkit understands.
pub const VERSION: u32 = 1;

/// Single-byte tag for the `i32` value type.
pub const I32: u8 = 0x7f;
/// Single-byte tag for the `i64` value type.
pub const I64: u8 = 0x7e;
/// Single-byte tag for the `f32` value type.
pub const F32: u8 = 0x7d;
/// Single-byte tag for the `f64` value type.
pub const F64: u8 = 0x7c;
/// Single-byte tag for the `v128` value type.
pub const V128: u8 = 0x7b;
/// Single-byte tag for the `funcref` reference type.
pub const FUNCREF: u8 = 0x70;
/// Single-byte tag for the `externref` reference type.
pub const EXTERNREF: u8 = 0x6f;
/// Single-byte tag for the `anyref` reference type.
pub const ANYREF: u8 = 0x6e;
/// Single-byte tag for the `eqref` reference type.
pub const EQREF: u8 = 0x6d;
/// Single-byte tag for the `i31ref` reference type.
pub const I31REF: u8 = 0x6c;
/// Prefix introducing a parametric `ref null? <heaptype>` value type.
pub const REF_NULL: u8 = 0x63;
/// Prefix introducing a parametric `ref <heaptype>` (non-nullable) value type.
pub const REF: u8 = 0x64;

/// Decode a single-byte value type tag, for the non-parametric shorthands.
#[must_use]
pub fn decode_value_type(tag: u8) -> Option<ValueType> {
    Some(match tag {
        I32 => ValueType::I32,
        I64 => ValueType::I64,
        F32 => ValueType::F32,
        F64 => ValueType::F64,
        V128 => ValueType::V128,
        FUNCREF => ValueType::funcref(),
        EXTERNREF => ValueType::externref(),
        ANYREF => ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Any) }),
        EQREF => ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Eq) }),
        I31REF => ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::I31) }),
        _ => return None,
    })
}

/// Encode a value type to its single-byte tag. Parametric reference types
/// with a type-index heap type have no single-byte shorthand and are
/// encoded by the caller using [`REF`]/[`REF_NULL`] plus the index.
#[must_use]
pub fn encode_value_type(value_type: ValueType) -> Option<u8> {
    Some(match value_type {
        ValueType::I32 => I32,
        ValueType::I64 => I64,
        ValueType::F32 => F32,
        ValueType::F64 => F64,
        ValueType::V128 => V128,
        ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Func) }) => FUNCREF,
        ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Extern) }) => EXTERNREF,
        ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Any) }) => ANYREF,
        ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::Eq) }) => EQREF,
        ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Kind(RefKind::I31) }) => I31REF,
        ValueType::Ref(_) => return None,
    })
}

/// Single-byte form tag that opens a function type in the type section.
pub const FUNC_TYPE_FORM: u8 = 0x60;

/// Known (non-custom) section ids, in the canonical order the Wasm
/// specification mandates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SectionId {
    /// Custom section, identified by name rather than canonical order.
    Custom = 0,
    /// Type section.
    Type = 1,
    /// Import section.
    Import = 2,
    /// Function section.
    Function = 3,
    /// Table section.
    Table = 4,
    /// Memory section.
    Memory = 5,
    /// Global section.
    Global = 6,
    /// Export section.
    Export = 7,
    /// Start section.
    Start = 8,
    /// Element section.
    Element = 9,
    /// Code section.
    Code = 10,
    /// Data section.
    Data = 11,
    /// Data count section.
    DataCount = 12,
}

impl SectionId {
    /// Decode a section id byte.
    #[must_use]
    pub fn decode(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            12 => SectionId::DataCount,
            _ => return None,
        })
    }

    /// Encode to the section id byte.
    #[must_use]
    pub fn encode(self) -> u8 {
        self as u8
    }

    /// Position of this section in the canonical ordering. Custom
    /// sections are exempt from ordering and are not assigned a rank.
    ///
    /// This is *not* the same as the section's id: `DataCount` carries
    /// id 12 but is written between `Element` and `Code`, since it was
    /// added to the format after `Code`/`Data` already had their ids
    /// assigned.
    #[must_use]
    pub fn canonical_rank(self) -> Option<u8> {
        Some(match self {
            SectionId::Custom => return None,
            SectionId::Type => 1,
            SectionId::Import => 2,
            SectionId::Function => 3,
            SectionId::Table => 4,
            SectionId::Memory => 5,
            SectionId::Global => 6,
            SectionId::Export => 7,
            SectionId::Start => 8,
            SectionId::Element => 9,
            SectionId::DataCount => 10,
            SectionId::Code => 11,
            SectionId::Data => 12,
        })
    }
}

/// The kind of entity an import or export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    /// Refers to a function.
    Function,
    /// Refers to a table.
    Table,
    /// Refers to a memory.
    Memory,
    /// Refers to a global.
    Global,
    /// Exception tag (exceptions feature).
    Tag,
}

impl ExternalKind {
    /// Decode an import/export kind byte.
    #[must_use]
    pub fn decode(tag: u8) -> Option<Self> {
        Some(match tag {
            0x00 => ExternalKind::Function,
            0x01 => ExternalKind::Table,
            0x02 => ExternalKind::Memory,
            0x03 => ExternalKind::Global,
            0x04 => ExternalKind::Tag,
            _ => return None,
        })
    }

    /// Encode to the import/export kind byte.
    #[must_use]
    pub fn encode(self) -> u8 {
        match self {
            ExternalKind::Function => 0x00,
            ExternalKind::Table => 0x01,
            ExternalKind::Memory => 0x02,
            ExternalKind::Global => 0x03,
            ExternalKind::Tag => 0x04,
        }
    }
}

/// Element-segment encoding flavors, as the six-bit-flag scheme used by
/// the binary format's element section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementEncoding {
    /// Active segment of function indices, implicit table 0.
    ActiveFuncIndices,
    /// Passive segment of function indices.
    PassiveFuncIndices,
    /// Active segment of function indices, explicit table index.
    ActiveFuncIndicesExplicitTable,
    /// Declared segment of function indices.
    DeclaredFuncIndices,
    /// Active segment of element expressions, implicit table 0.
    ActiveExprs,
    /// Passive segment of element expressions.
    PassiveExprs,
    /// Active segment of element expressions, explicit table index.
    ActiveExprsExplicitTable,
    /// Declared segment of element expressions.
    DeclaredExprs,
}

impl ElementEncoding {
    /// Decode an element segment's flags word.
    #[must_use]
    pub fn decode(flags: u32) -> Option<Self> {
        Some(match flags {
            0 => ElementEncoding::ActiveFuncIndices,
            1 => ElementEncoding::PassiveFuncIndices,
            2 => ElementEncoding::ActiveFuncIndicesExplicitTable,
            3 => ElementEncoding::DeclaredFuncIndices,
            4 => ElementEncoding::ActiveExprs,
            5 => ElementEncoding::PassiveExprs,
            6 => ElementEncoding::ActiveExprsExplicitTable,
            7 => ElementEncoding::DeclaredExprs,
            _ => return None,
        })
    }

    /// Encode to the element segment's flags word.
    #[must_use]
    pub fn encode(self) -> u32 {
        match self {
            ElementEncoding::ActiveFuncIndices => 0,
            ElementEncoding::PassiveFuncIndices => 1,
            ElementEncoding::ActiveFuncIndicesExplicitTable => 2,
            ElementEncoding::DeclaredFuncIndices => 3,
            ElementEncoding::ActiveExprs => 4,
            ElementEncoding::PassiveExprs => 5,
            ElementEncoding::ActiveExprsExplicitTable => 6,
            ElementEncoding::DeclaredExprs => 7,
        }
    }
}

/// `name` custom-section subsection ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameSubsectionId {
    /// Module name subsection.
    Module,
    /// Function names subsection.
    Function,
    /// Local names subsection.
    Local,
    /// Label names subsection.
    Label,
    /// Type names subsection.
    Type,
    /// Table names subsection.
    Table,
    /// Memory names subsection.
    Memory,
    /// Global names subsection.
    Global,
    /// Element segment names subsection.
    Element,
    /// Data segment names subsection.
    Data,
    /// Field names subsection.
    Field,
}

impl NameSubsectionId {
    /// Decode a `name` custom-section subsection id byte.
    #[must_use]
    pub fn decode(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => NameSubsectionId::Module,
            1 => NameSubsectionId::Function,
            2 => NameSubsectionId::Local,
            3 => NameSubsectionId::Label,
            4 => NameSubsectionId::Type,
            5 => NameSubsectionId::Table,
            6 => NameSubsectionId::Memory,
            7 => NameSubsectionId::Global,
            8 => NameSubsectionId::Element,
            9 => NameSubsectionId::Data,
            10 => NameSubsectionId::Field,
            _ => return None,
        })
    }

    /// Encode to the `name` custom-section subsection id byte.
    #[must_use]
    pub fn encode(self) -> u8 {
        match self {
            NameSubsectionId::Module => 0,
            NameSubsectionId::Function => 1,
            NameSubsectionId::Local => 2,
            NameSubsectionId::Label => 3,
            NameSubsectionId::Type => 4,
            NameSubsectionId::Table => 5,
            NameSubsectionId::Memory => 6,
            NameSubsectionId::Global => 7,
            NameSubsectionId::Element => 8,
            NameSubsectionId::Data => 9,
            NameSubsectionId::Field => 10,
        }
    }
}

/// `linking` custom-section subsection ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkingSubsectionId {
    /// Segment info subsection.
    SegmentInfo,
    /// Init funcs subsection.
    InitFuncs,
    /// Comdat info subsection.
    ComdatInfo,
    /// Symbol table subsection.
    SymbolTable,
}

impl LinkingSubsectionId {
    /// Decode a `linking` custom-section subsection id byte.
    #[must_use]
    pub fn decode(tag: u8) -> Option<Self> {
        Some(match tag {
            5 => LinkingSubsectionId::SegmentInfo,
            6 => LinkingSubsectionId::InitFuncs,
            7 => LinkingSubsectionId::ComdatInfo,
            8 => LinkingSubsectionId::SymbolTable,
            _ => return None,
        })
    }

    /// Encode to the `linking` custom-section subsection id byte.
    #[must_use]
    pub fn encode(self) -> u8 {
        match self {
            LinkingSubsectionId::SegmentInfo => 5,
            LinkingSubsectionId::InitFuncs => 6,
            LinkingSubsectionId::ComdatInfo => 7,
            LinkingSubsectionId::SymbolTable => 8,
        }
    }
}

/// Relocation entry types used by `reloc.*` custom sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationType {
    /// A function index encoded as LEB128.
    FunctionIndexLeb,
    /// A table index encoded as SLEB128.
    TableIndexSleb,
    /// A table index encoded as a 32-bit integer.
    TableIndexI32,
    /// A linear memory address encoded as LEB128.
    MemoryAddrLeb,
    /// A linear memory address encoded as SLEB128.
    MemoryAddrSleb,
    /// A linear memory address encoded as a 32-bit integer.
    MemoryAddrI32,
    /// A type index encoded as LEB128.
    TypeIndexLeb,
    /// A global index encoded as LEB128.
    GlobalIndexLeb,
    /// A function offset encoded as a 32-bit integer.
    FunctionOffsetI32,
    /// A section offset encoded as a 32-bit integer.
    SectionOffsetI32,
    /// A tag (exception) index encoded as LEB128.
    TagIndexLeb,
    /// A global index encoded as a 32-bit integer.
    GlobalIndexI32,
    /// A linear memory address encoded as 64-bit LEB128.
    MemoryAddrLeb64,
    /// A linear memory address encoded as 64-bit SLEB128.
    MemoryAddrSleb64,
    /// A linear memory address encoded as a 64-bit integer.
    MemoryAddrI64,
    /// A table index encoded as 64-bit SLEB128.
    TableIndexSleb64,
    /// A table index encoded as a 64-bit integer.
    TableIndexI64,
    /// A table number encoded as LEB128.
    TableNumberLeb,
}

impl RelocationType {
    /// Decode a relocation type byte.
    #[must_use]
    pub fn decode(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => RelocationType::FunctionIndexLeb,
            1 => RelocationType::TableIndexSleb,
            2 => RelocationType::TableIndexI32,
            3 => RelocationType::MemoryAddrLeb,
            4 => RelocationType::MemoryAddrSleb,
            5 => RelocationType::MemoryAddrI32,
            6 => RelocationType::TypeIndexLeb,
            7 => RelocationType::GlobalIndexLeb,
            8 => RelocationType::FunctionOffsetI32,
            9 => RelocationType::SectionOffsetI32,
            10 => RelocationType::TagIndexLeb,
            13 => RelocationType::GlobalIndexI32,
            14 => RelocationType::MemoryAddrLeb64,
            15 => RelocationType::MemoryAddrSleb64,
            16 => RelocationType::MemoryAddrI64,
            17 => RelocationType::TableIndexSleb64,
            18 => RelocationType::TableIndexI64,
            19 => RelocationType::TableNumberLeb,
            _ => return None,
        })
    }

    /// Encode to the relocation type byte.
    #[must_use]
    pub fn encode(self) -> u8 {
        match self {
            RelocationType::FunctionIndexLeb => 0,
            RelocationType::TableIndexSleb => 1,
            RelocationType::TableIndexI32 => 2,
            RelocationType::MemoryAddrLeb => 3,
            RelocationType::MemoryAddrSleb => 4,
            RelocationType::MemoryAddrI32 => 5,
            RelocationType::TypeIndexLeb => 6,
            RelocationType::GlobalIndexLeb => 7,
            RelocationType::FunctionOffsetI32 => 8,
            RelocationType::SectionOffsetI32 => 9,
            RelocationType::TagIndexLeb => 10,
            RelocationType::GlobalIndexI32 => 13,
            RelocationType::MemoryAddrLeb64 => 14,
            RelocationType::MemoryAddrSleb64 => 15,
            RelocationType::MemoryAddrI64 => 16,
            RelocationType::TableIndexSleb64 => 17,
            RelocationType::TableIndexI64 => 18,
            RelocationType::TableNumberLeb => 19,
        }
    }
}
