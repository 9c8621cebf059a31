//! The one module-shape edit this crate ships a policy for: inserting
//! a new import and renumbering every reference that follows it.
//!
//! Every index space that interleaves imports with locally-defined
//! entities (functions, tables, memories, globals, and exception tags)
//! assigns imports the low indices and locals the indices after them.
//! Inserting an import in the middle of that space means every
//! existing reference at or past the insertion point now points one
//! index too low unless it is bumped. [`insert_import`] does that bump
//! across every place an index from the affected space can appear:
//! exports, the start function, element-segment tables and function
//! lists, data-segment memories, `call`/`call_indirect`/`ref.func`,
//! `global.get`/`global.set`, `table.get`/`table.set`, `table.init`/
//! `table.copy`, `memory.copy`, and every `memarg`'s memory index.
//!
//! Only the function's *type* index is left untouched: it names an
//! entry in the type section, a space imports never interleave with.

use wasmlift_format::instr::{self as op, CopyArg, Immediate, InitArg, Instruction};
use wasmlift_format::module::{DataMode, ElementInit, ElementMode, Import, Module};
use wasmlift_format::tags::ExternalKind;

/// Insert `import` at import-list position `position` (clamped to the
/// list's current length), and renumber every reference to its kind's
/// index space that the insertion shifts.
pub fn insert_import(module: &mut Module, position: usize, import: Import) {
    let position = position.min(module.imports.len());
    let kind = import.desc.kind();
    let k = module.imports[..position].iter().filter(|existing| existing.desc.kind() == kind).count() as u32;

    module.imports.insert(position, import);
    renumber_references(module, kind, k);
}

fn bump(index: &mut u32, k: u32) {
    if *index >= k {
        *index += 1;
    }
}

fn renumber_references(module: &mut Module, kind: ExternalKind, k: u32) {
    if kind == ExternalKind::Function {
        if let Some(start) = module.start.as_mut() {
            bump(start, k);
        }
    }

    for export in &mut module.exports {
        if export.kind == kind {
            bump(&mut export.index, k);
        }
    }

    for element in &mut module.elements {
        if kind == ExternalKind::Table {
            if let ElementMode::Active { table_index, .. } = &mut element.mode {
                bump(table_index, k);
            }
        }
        match &mut element.init {
            ElementInit::FuncIndices(indices) if kind == ExternalKind::Function => {
                for index in indices {
                    bump(index, k);
                }
            }
            ElementInit::Exprs { exprs, .. } => {
                for expr in exprs {
                    renumber_instructions(expr, kind, k);
                }
            }
            ElementInit::FuncIndices(_) => {}
        }
        if let ElementMode::Active { offset, .. } = &mut element.mode {
            renumber_instructions(offset, kind, k);
        }
    }

    for data in &mut module.data {
        if let DataMode::Active { memory_index, offset } = &mut data.mode {
            if kind == ExternalKind::Memory {
                bump(memory_index, k);
            }
            renumber_instructions(offset, kind, k);
        }
    }

    for global in &mut module.globals {
        renumber_instructions(&mut global.init, kind, k);
    }

    for code in &mut module.code {
        renumber_instructions(&mut code.body, kind, k);
    }
}

/// `table.grow` / `table.size` / `table.fill` (bulk-memory `0xfc 0x0f`
/// through `0x11`): each carries just the table index.
const TABLE_GROW: u32 = 0xfc0f;
const TABLE_SIZE: u32 = 0xfc10;
const TABLE_FILL: u32 = 0xfc11;

fn renumber_instructions(instructions: &mut [Instruction], kind: ExternalKind, k: u32) {
    for instr in instructions {
        match instr.opcode {
            op::CALL | op::RETURN_CALL | op::REF_FUNC if kind == ExternalKind::Function => {
                if let Immediate::Index(index) = &mut instr.immediate {
                    bump(index, k);
                }
            }
            op::GLOBAL_GET | op::GLOBAL_SET if kind == ExternalKind::Global => {
                if let Immediate::Index(index) = &mut instr.immediate {
                    bump(index, k);
                }
            }
            op::TABLE_GET | op::TABLE_SET | TABLE_GROW | TABLE_SIZE | TABLE_FILL if kind == ExternalKind::Table => {
                if let Immediate::Index(index) = &mut instr.immediate {
                    bump(index, k);
                }
            }
            op::CALL_INDIRECT | op::RETURN_CALL_INDIRECT if kind == ExternalKind::Table => {
                if let Immediate::CallIndirect { table_index, .. } = &mut instr.immediate {
                    bump(table_index, k);
                }
            }
            op::TABLE_COPY if kind == ExternalKind::Table => {
                if let Immediate::Copy(CopyArg { dst, src }) = &mut instr.immediate {
                    bump(dst, k);
                    bump(src, k);
                }
            }
            op::TABLE_INIT if kind == ExternalKind::Table => {
                if let Immediate::Init(InitArg { dst, .. }) = &mut instr.immediate {
                    bump(dst, k);
                }
            }
            op::MEMORY_COPY if kind == ExternalKind::Memory => {
                if let Immediate::Copy(CopyArg { dst, src }) = &mut instr.immediate {
                    bump(dst, k);
                    bump(src, k);
                }
            }
            // `memory.init`'s destination field is a reserved byte the
            // reader always decodes as 0, not a genuine memory index;
            // renumbering it would corrupt rather than fix it.
            _ => {}
        }
        if kind == ExternalKind::Memory {
            if let Immediate::MemArg(mem_arg) = &mut instr.immediate {
                bump(&mut mem_arg.memory_index, k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmlift_format::module::{Code, Element, Export, Function, ImportDesc};
    use wasmlift_format::tags::ElementEncoding;
    use wasmlift_format::types::{FuncType, MemoryType, Limits, ValueType};

    fn function_import(module: &str, name: &str) -> Import {
        Import { module: module.into(), name: name.into(), desc: ImportDesc::Function(0) }
    }

    #[test]
    fn call_target_past_the_insertion_point_is_bumped() {
        let mut module = Module::new();
        module.types.push(FuncType::default());
        module.imports.push(function_import("env", "a"));
        module.imports.push(function_import("env", "b"));
        module.functions.push(Function { type_index: 0 });
        module.code.push(Code {
            locals: vec![],
            body: vec![
                Instruction::new(op::CALL, Immediate::Index(2), 0),
                Instruction::new(op::END, Immediate::None, 0),
            ],
        });
        module.elements.push(Element {
            mode: ElementMode::Active { table_index: 0, offset: vec![] },
            init: ElementInit::FuncIndices(vec![2]),
            encoding: ElementEncoding::ActiveFuncIndices,
        });

        insert_import(&mut module, 2, function_import("env", "c"));

        assert_eq!(module.imports.len(), 3);
        assert_eq!(module.code[0].body[0].immediate, Immediate::Index(3));
        let ElementInit::FuncIndices(indices) = &module.elements[0].init else { panic!("expected func indices") };
        assert_eq!(indices, &vec![3]);
    }

    #[test]
    fn references_before_the_insertion_point_are_unaffected() {
        let mut module = Module::new();
        module.imports.push(function_import("env", "a"));
        module.imports.push(function_import("env", "b"));
        module.code.push(Code {
            locals: vec![],
            body: vec![
                Instruction::new(op::CALL, Immediate::Index(0), 0),
                Instruction::new(op::END, Immediate::None, 0),
            ],
        });

        insert_import(&mut module, 2, function_import("env", "c"));

        assert_eq!(module.code[0].body[0].immediate, Immediate::Index(0));
    }

    #[test]
    fn other_kinds_are_untouched_by_a_function_import() {
        let mut module = Module::new();
        module.imports.push(Import {
            module: "env".into(),
            name: "mem".into(),
            desc: ImportDesc::Memory(MemoryType { limits: Limits::new(1), index_type: wasmlift_format::types::IndexType::I32 }),
        });
        module.exports.push(Export { name: "memory".into(), kind: ExternalKind::Memory, index: 0 });

        insert_import(&mut module, 0, function_import("env", "f"));

        assert_eq!(module.exports[0].index, 0);
    }

    #[test]
    fn function_type_index_is_never_renumbered() {
        let mut module = Module::new();
        module.types.push(FuncType::new(vec![ValueType::I32], vec![]));
        module.functions.push(Function { type_index: 0 });

        insert_import(&mut module, 0, function_import("env", "f"));

        assert_eq!(module.functions[0].type_index, 0);
    }
}
