//! The in-memory module model: the types, imports, functions, tables,
//! memories, globals, exports, elements, data, and code that make up a
//! decoded Wasm module, plus the custom sections preserved alongside
//! them.

use crate::instr::Instruction;
use crate::tags::{ElementEncoding, ExternalKind, NameSubsectionId};
use crate::types::{EventType, FuncType, GlobalType, MemoryType, TableType, ValueType};

/// A constant initializer expression: the restricted instruction
/// sequence allowed for global initializers and segment offsets,
/// terminated by (but not including) its `end` opcode.
pub type ConstExpr = Vec<Instruction>;

/// What kind of entity an import provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    /// Imports a function of the given type index.
    Function(u32),
    /// Imports a table of the given type.
    Table(TableType),
    /// Imports a memory of the given type.
    Memory(MemoryType),
    /// Imports a global of the given type.
    Global(GlobalType),
    /// Imports an exception tag of the given type.
    Event(EventType),
}

impl ImportDesc {
    /// The external kind this import descriptor corresponds to.
    #[must_use]
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDesc::Function(_) => ExternalKind::Function,
            ImportDesc::Table(_) => ExternalKind::Table,
            ImportDesc::Memory(_) => ExternalKind::Memory,
            ImportDesc::Global(_) => ExternalKind::Global,
            ImportDesc::Event(_) => ExternalKind::Tag,
        }
    }
}

/// A single import: `(module, name) -> desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The name of the module this import is requested from.
    pub module: String,
    /// The name of the imported entity within that module.
    pub name: String,
    /// The kind and type of the imported entity.
    pub desc: ImportDesc,
}

/// A locally defined function: just its type index; the body lives in
/// the parallel code list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub type_index: u32,
}

/// A locally defined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub table_type: TableType,
}

/// A locally defined memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memory {
    pub memory_type: MemoryType,
}

/// A locally defined global, with its constant initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: ConstExpr,
}

/// A single named export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

/// How an element segment places its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementMode {
    /// Copied into a table at instantiation time.
    Active { table_index: u32, offset: ConstExpr },
    /// Only usable via `table.init`; not copied automatically.
    Passive,
    /// Not copied anywhere; declares that functions may be referenced
    /// by `ref.func` without a table (reference-types).
    Declared,
}

/// The payload of an element segment, either raw function indices (the
/// compact MVP-extended encoding) or general constant expressions (the
/// reference-types encoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementInit {
    FuncIndices(Vec<u32>),
    Exprs { element_type: ValueType, exprs: Vec<ConstExpr> },
}

/// An element segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub mode: ElementMode,
    pub init: ElementInit,
    /// The binary encoding flavor this segment was read as, preserved
    /// so the writer can round-trip the same flavor rather than
    /// normalizing to a canonical one.
    pub encoding: ElementEncoding,
}

/// How a data segment places its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataMode {
    Active { memory_index: u32, offset: ConstExpr },
    Passive,
}

/// A data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub mode: DataMode,
    pub init: Vec<u8>,
}

/// One declared local group within a code body: `count` locals of
/// `value_type`, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGroup {
    pub count: u32,
    pub value_type: ValueType,
}

/// A function body: its declared local groups and its instruction
/// sequence (including the trailing `end`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub locals: Vec<LocalGroup>,
    pub body: Vec<Instruction>,
}

/// A single `name` subsection, keyed by index, function-index, or
/// (function-index, local-index) depending on its subsection id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameMap {
    pub names: Vec<(u32, String)>,
}

/// The decoded `name` custom section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameSection {
    pub module_name: Option<String>,
    pub function_names: NameMap,
    pub local_names: Vec<(u32, NameMap)>,
    pub other: Vec<(NameSubsectionId, Vec<u8>)>,
}

/// A custom section preserved verbatim, tagged with the position
/// (relative to the known sections already read) it occupied in the
/// original binary so the writer can reproduce that position exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub payload: Vec<u8>,
    /// Number of known sections that had already been emitted when this
    /// custom section was encountered while reading.
    pub position: usize,
}

/// A fully decoded Wasm module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub tables: Vec<Table>,
    pub memories: Vec<Memory>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<Element>,
    /// `Some(n)` iff a data-count section was present, declaring `n`.
    pub data_count: Option<u32>,
    pub code: Vec<Code>,
    pub data: Vec<Data>,
    pub events: Vec<EventType>,
    pub custom_sections: Vec<CustomSection>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of functions in the combined (imports then locals)
    /// function index space.
    #[must_use]
    pub fn function_count(&self) -> u32 {
        self.imported_function_count() + self.functions.len() as u32
    }

    #[must_use]
    pub fn imported_function_count(&self) -> u32 {
        self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Function(_))).count() as u32
    }

    #[must_use]
    pub fn imported_table_count(&self) -> u32 {
        self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Table(_))).count() as u32
    }

    #[must_use]
    pub fn imported_memory_count(&self) -> u32 {
        self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Memory(_))).count() as u32
    }

    #[must_use]
    pub fn imported_global_count(&self) -> u32 {
        self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Global(_))).count() as u32
    }

    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.imported_table_count() + self.tables.len() as u32
    }

    #[must_use]
    pub fn memory_count(&self) -> u32 {
        self.imported_memory_count() + self.memories.len() as u32
    }

    #[must_use]
    pub fn global_count(&self) -> u32 {
        self.imported_global_count() + self.globals.len() as u32
    }

    /// The function type of the function at combined index `index`,
    /// whether imported or local.
    #[must_use]
    pub fn function_type(&self, index: u32) -> Option<&FuncType> {
        let imported = self.imported_function_count();
        if index < imported {
            let mut seen = 0u32;
            for import in &self.imports {
                if let ImportDesc::Function(type_index) = import.desc {
                    if seen == index {
                        return self.types.get(type_index as usize);
                    }
                    seen += 1;
                }
            }
            None
        } else {
            let local = self.functions.get((index - imported) as usize)?;
            self.types.get(local.type_index as usize)
        }
    }

    pub fn find_custom_section(&self, name: &str) -> Option<&CustomSection> {
        self.custom_sections.iter().find(|section| section.name == name)
    }
}
