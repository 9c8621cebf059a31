//! The eager reader: drains the lazy section stream into a fully
//! materialized [`Module`], so callers who want the whole shape at once
//! don't have to drive the iterator themselves.
//!
//! Two classes of problem are reported into the caller's [`ErrorSink`]
//! rather than aborting the decode: a known section id repeated a
//! second time (the first occurrence wins), and a declared count
//! (code vs functions, data vs the data-count section) that disagrees
//! with what was actually present. Every other failure — malformed
//! bytes, an out-of-order section, a bad opcode — is a hard error,
//! because there is no sensible partial module to keep building past
//! it.

use log::debug;

use wasmlift_error::{Error, ErrorKind, ErrorSink, Result};
use wasmlift_format::module::Module;
use wasmlift_format::tags::SectionId;
use wasmlift_format::FeatureSet;

use crate::reader::{open_known_section, KnownSection, Parser, Payload};

#[derive(Default)]
struct SeenSections {
    type_section: bool,
    import: bool,
    function: bool,
    table: bool,
    memory: bool,
    global: bool,
    export: bool,
    start: bool,
    element: bool,
    code: bool,
    data: bool,
    data_count: bool,
}

impl SeenSections {
    fn mark(&mut self, id: SectionId) -> bool {
        let slot = match id {
            SectionId::Custom => return false,
            SectionId::Type => &mut self.type_section,
            SectionId::Import => &mut self.import,
            SectionId::Function => &mut self.function,
            SectionId::Table => &mut self.table,
            SectionId::Memory => &mut self.memory,
            SectionId::Global => &mut self.global,
            SectionId::Export => &mut self.export,
            SectionId::Start => &mut self.start,
            SectionId::Element => &mut self.element,
            SectionId::Code => &mut self.code,
            SectionId::Data => &mut self.data,
            SectionId::DataCount => &mut self.data_count,
        };
        let already_seen = *slot;
        *slot = true;
        already_seen
    }
}

/// Decode an entire binary module into memory.
///
/// Structural disagreements that don't prevent building a module at all
/// (a duplicated known section, a code/function or data/data-count
/// count mismatch) are recorded into `sink` and the decode continues;
/// anything else is returned as `Err` immediately.
pub fn decode_module(input: &[u8], features: FeatureSet, sink: &mut ErrorSink) -> Result<Module> {
    let parser = Parser::new(input)?;
    let mut module = Module::new();
    let mut seen = SeenSections::default();

    for payload in parser {
        match payload? {
            Payload::Custom { name, payload, offset, position } => {
                debug!("custom section `{name}` ({} bytes) at offset {offset}", payload.len());
                check_structured_custom_section(&name, payload, offset, sink);
                module.custom_sections.push(wasmlift_format::module::CustomSection {
                    name,
                    payload: payload.to_vec(),
                    position,
                });
            }
            Payload::Known { id, bytes, offset } => {
                if seen.mark(id) {
                    sink.push(Error::at(offset, ErrorKind::CountMismatch {
                        what: section_name(id),
                        expected: 1,
                        found: 2,
                    }));
                    continue;
                }
                apply_known_section(&mut module, id, bytes, offset, features)?;
            }
        }
    }

    if module.code.len() != module.functions.len() {
        sink.push(Error::new(ErrorKind::CountMismatch {
            what: "code vs functions",
            expected: module.functions.len() as u32,
            found: module.code.len() as u32,
        }));
    }
    if let Some(declared) = module.data_count {
        if declared != module.data.len() as u32 {
            sink.push(Error::new(ErrorKind::CountMismatch {
                what: "data vs data count",
                expected: declared,
                found: module.data.len() as u32,
            }));
        }
    }

    Ok(module)
}

/// `name`, `linking`, and `reloc.*` custom sections carry a well-known
/// internal format; a module whose section of one of these names
/// doesn't parse as that format is reported into `sink` without
/// aborting the decode; the raw bytes are still kept verbatim in
/// [`wasmlift_format::module::CustomSection`] either way.
fn check_structured_custom_section(name: &str, payload: &[u8], _offset: usize, sink: &mut ErrorSink) {
    use wasmlift_format::custom::{LinkingSection, NameSection, RelocationSection};

    let result = if name == "name" {
        NameSection::decode(payload).map(|_| ())
    } else if name == "linking" {
        LinkingSection::decode(payload).map(|_| ())
    } else if name.starts_with("reloc.") {
        RelocationSection::decode(payload).map(|_| ())
    } else {
        return;
    };
    if let Err(err) = result {
        sink.push(err);
    }
}

fn section_name(id: SectionId) -> &'static str {
    match id {
        SectionId::Custom => "custom",
        SectionId::Type => "type section",
        SectionId::Import => "import section",
        SectionId::Function => "function section",
        SectionId::Table => "table section",
        SectionId::Memory => "memory section",
        SectionId::Global => "global section",
        SectionId::Export => "export section",
        SectionId::Start => "start section",
        SectionId::Element => "element section",
        SectionId::Code => "code section",
        SectionId::Data => "data section",
        SectionId::DataCount => "data count section",
    }
}

fn apply_known_section(
    module: &mut Module,
    id: SectionId,
    bytes: &[u8],
    offset: usize,
    features: FeatureSet,
) -> Result<()> {
    match open_known_section(id, bytes, offset, features)? {
        KnownSection::Type(iter) => {
            module.types = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Import(iter) => {
            module.imports = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Function(iter) => {
            module.functions = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Table(iter) => {
            module.tables = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Memory(iter) => {
            module.memories = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Global(iter) => {
            module.globals = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Export(iter) => {
            module.exports = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Start(index) => {
            module.start = Some(index);
        }
        KnownSection::Element(iter) => {
            module.elements = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Code(iter) => {
            module.code = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::Data(iter) => {
            module.data = iter.collect::<Result<Vec<_>>>()?;
        }
        KnownSection::DataCount(count) => {
            module.data_count = Some(count);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmlift_format::leb128;
    use wasmlift_format::tags;

    fn leb(value: u32) -> Vec<u8> {
        leb128::write_u32(value)
    }

    fn empty_module() -> Vec<u8> {
        let mut module = tags::MAGIC.to_vec();
        module.extend_from_slice(&tags::VERSION.to_le_bytes());
        module
    }

    fn push_section(module: &mut Vec<u8>, id: SectionId, payload: &[u8]) {
        module.push(id.encode());
        module.extend_from_slice(&leb(payload.len() as u32));
        module.extend_from_slice(payload);
    }

    #[test]
    fn decodes_a_module_with_one_function() {
        let mut type_section = leb(1);
        type_section.push(tags::FUNC_TYPE_FORM);
        type_section.extend_from_slice(&leb(0));
        type_section.extend_from_slice(&leb(0));

        let function_section = {
            let mut s = leb(1);
            s.extend_from_slice(&leb(0));
            s
        };

        let code_section = {
            let mut body = leb(0); // no locals
            body.push(0x0b); // end
            let mut entry = leb(body.len() as u32);
            entry.extend_from_slice(&body);
            let mut s = leb(1);
            s.extend_from_slice(&entry);
            s
        };

        let mut module_bytes = empty_module();
        push_section(&mut module_bytes, SectionId::Type, &type_section);
        push_section(&mut module_bytes, SectionId::Function, &function_section);
        push_section(&mut module_bytes, SectionId::Code, &code_section);

        let mut sink = ErrorSink::new();
        let module = decode_module(&module_bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.code.len(), 1);
    }

    #[test]
    fn mismatched_code_and_function_counts_are_reported_not_fatal() {
        let function_section = {
            let mut s = leb(1);
            s.extend_from_slice(&leb(0));
            s
        };

        let mut module_bytes = empty_module();
        push_section(&mut module_bytes, SectionId::Function, &function_section);

        let mut sink = ErrorSink::new();
        let module = decode_module(&module_bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.code.len(), 0);
        assert_eq!(sink.len(), 1);
        assert!(matches!(sink.iter().next().unwrap().kind(), ErrorKind::CountMismatch { .. }));
    }

    #[test]
    fn name_section_decodes_into_structured_form() {
        use wasmlift_format::custom::NameSection;
        use wasmlift_format::module::NameMap;

        let name_section = NameSection {
            module_name: Some("adder".to_string()),
            function_names: NameMap { names: vec![(0, "add".to_string())] },
            local_names: Vec::new(),
            other: Vec::new(),
        };
        let payload = name_section.encode();

        let mut module_bytes = empty_module();
        module_bytes.push(SectionId::Custom.encode());
        let mut section_payload = leb(4);
        section_payload.extend_from_slice(b"name");
        section_payload.extend_from_slice(&payload);
        module_bytes.extend_from_slice(&leb(section_payload.len() as u32));
        module_bytes.extend_from_slice(&section_payload);

        let mut sink = ErrorSink::new();
        let module = decode_module(&module_bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
        assert!(sink.is_empty());
        let custom = module.find_custom_section("name").unwrap();
        assert_eq!(wasmlift_format::custom::NameSection::decode(&custom.payload).unwrap(), name_section);
    }

    #[test]
    fn malformed_name_section_is_reported_not_fatal() {
        let mut module_bytes = empty_module();
        module_bytes.push(SectionId::Custom.encode());
        let mut section_payload = leb(4);
        section_payload.extend_from_slice(b"name");
        section_payload.push(0xff); // not a valid subsection id
        section_payload.push(0x00);
        module_bytes.extend_from_slice(&leb(section_payload.len() as u32));
        module_bytes.extend_from_slice(&section_payload);

        let mut sink = ErrorSink::new();
        let module = decode_module(&module_bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
        assert_eq!(module.custom_sections.len(), 1);
        assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::UnknownSectionId { .. })));
    }

    #[test]
    fn duplicate_known_section_is_reported_not_fatal() {
        let mut module_bytes = empty_module();
        push_section(&mut module_bytes, SectionId::Import, &leb(0));
        push_section(&mut module_bytes, SectionId::Import, &leb(0));

        let mut sink = ErrorSink::new();
        let module = decode_module(&module_bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
        assert!(module.imports.is_empty());
        assert_eq!(sink.len(), 1);
        assert!(matches!(sink.iter().next().unwrap().kind(), ErrorKind::CountMismatch { .. }));
    }
}
