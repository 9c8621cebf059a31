//! Scenario-level fixtures exercising the reader/validator/writer/
//! transform pipeline end to end, rather than one function at a time.

use wasmlift_decoder::{decode_module, insert_import, validate, write_module};
use wasmlift_error::{ErrorKind, ErrorSink};
use wasmlift_format::custom::NameSection;
use wasmlift_format::instr::{self as op, Immediate, Instruction};
use wasmlift_format::module::{
    Code, Element, ElementInit, ElementMode, Function, Import, ImportDesc, NameMap,
};
use wasmlift_format::tags::ElementEncoding;
use wasmlift_format::types::FuncType;
use wasmlift_format::FeatureSet;

fn instr(opcode: u32, immediate: Immediate) -> Instruction {
    Instruction::new(opcode, immediate, 0)
}

/// S1 — an empty module reads into an empty `Module` and re-encodes to
/// the exact same 8 bytes.
#[test]
fn s1_empty_module_round_trips() {
    let bytes: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    let mut sink = ErrorSink::new();
    let module = decode_module(&bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
    assert!(sink.is_empty());
    assert!(module.types.is_empty());
    assert!(module.functions.is_empty());
    assert_eq!(write_module(&module), bytes);
}

/// S2 — a single no-op function (`[] -> []`, body is just `end`) reads
/// clean, validates clean, and re-encodes to the exact input bytes.
#[test]
fn s2_minimal_function_round_trips() {
    let bytes: [u8; 22] = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type section: [] -> []
        0x03, 0x02, 0x01, 0x00, // func section: func0:type0
        0x0a, 0x04, 0x01, 0x02, 0x00, 0x0b, // code: 1 body, size=2, 0 locals, end
    ];
    let mut sink = ErrorSink::new();
    let module = decode_module(&bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
    assert!(sink.is_empty());
    assert_eq!(module.types.len(), 1);
    assert_eq!(module.functions.len(), 1);

    let mut validation = ErrorSink::new();
    validate(&module, FeatureSet::wasm_mvp(), &mut validation);
    assert!(validation.is_empty());

    assert_eq!(write_module(&module), bytes);
}

/// S6 — inserting a new function import at position 2 bumps every
/// existing function-space reference at or past that position: the
/// `call` target in a function body and a passive element segment's
/// function-index list. The module stays valid afterward.
#[test]
fn s6_import_insertion_renumbers_call_targets_and_elements() {
    let mut module = wasmlift_format::Module::new();
    module.types.push(FuncType::new(vec![], vec![]));
    module.imports.push(Import { module: "env".to_string(), name: "a".to_string(), desc: ImportDesc::Function(0) });
    module.imports.push(Import { module: "env".to_string(), name: "b".to_string(), desc: ImportDesc::Function(0) });
    module.functions.push(Function { type_index: 0 });
    module.code.push(Code {
        locals: Vec::new(),
        body: vec![instr(op::CALL, Immediate::Index(2)), instr(op::END, Immediate::None)],
    });
    module.elements.push(Element {
        mode: ElementMode::Passive,
        init: ElementInit::FuncIndices(vec![2]),
        encoding: ElementEncoding::PassiveFuncIndices,
    });

    let mut sink = ErrorSink::new();
    validate(&module, FeatureSet::wasm_mvp(), &mut sink);
    assert!(sink.is_empty());

    insert_import(&mut module, 2, Import { module: "env".to_string(), name: "c".to_string(), desc: ImportDesc::Function(0) });

    assert_eq!(module.code[0].body[0].immediate, Immediate::Index(3));
    match &module.elements[0].init {
        ElementInit::FuncIndices(indices) => assert_eq!(indices, &vec![3]),
        ElementInit::Exprs { .. } => panic!("expected FuncIndices"),
    }

    let mut sink = ErrorSink::new();
    validate(&module, FeatureSet::wasm_mvp(), &mut sink);
    assert!(sink.is_empty());
}

fn custom_section_bytes(name: &str, content: &[u8]) -> Vec<u8> {
    let mut payload = wasmlift_format::primitives::write_string(name);
    payload.extend_from_slice(content);
    let mut section = vec![0x00]; // SectionId::Custom
    section.extend_from_slice(&wasmlift_format::leb128::write_u32(payload.len() as u32));
    section.extend_from_slice(&payload);
    section
}

/// S7 — a custom section before the type section and another after the
/// code section both land back in their original relative positions
/// after a decode/re-encode cycle.
#[test]
fn s7_custom_sections_preserve_their_position() {
    let mut bytes = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    bytes.extend_from_slice(&custom_section_bytes("pre", b"hello"));
    bytes.extend_from_slice(&[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]); // type section
    bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // func section
    bytes.extend_from_slice(&[0x0a, 0x04, 0x01, 0x02, 0x00, 0x0b]); // code section
    bytes.extend_from_slice(&custom_section_bytes("post", b"world"));

    let mut sink = ErrorSink::new();
    let module = decode_module(&bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
    assert!(sink.is_empty());
    assert_eq!(module.custom_sections.len(), 2);
    assert_eq!(module.custom_sections[0].position, 0);
    assert_eq!(module.custom_sections[1].position, 3);

    assert_eq!(write_module(&module), bytes);
}

/// S9 — a data-count section declaring 2 segments paired with a data
/// section that only contains one is reported as a `CountMismatch`,
/// without aborting the decode.
#[test]
fn s9_data_count_mismatch_is_reported() {
    let mut bytes = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    bytes.extend_from_slice(&[0x0c, 0x01, 0x02]); // data count section: declares 2
    // data section: one active segment at memory 0, offset `i32.const 0`, empty init
    let data_entry: [u8; 5] = [0x00, 0x41, 0x00, 0x0b, 0x00];
    let mut data_section_payload = vec![0x01]; // one segment
    data_section_payload.extend_from_slice(&data_entry);
    bytes.push(0x0b); // SectionId::Data
    bytes.push(data_section_payload.len() as u8);
    bytes.extend_from_slice(&data_section_payload);

    let mut sink = ErrorSink::new();
    let module = decode_module(&bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
    assert_eq!(module.data.len(), 1);
    assert_eq!(module.data_count, Some(2));
    assert!(sink.iter().any(|e| matches!(e.kind(), ErrorKind::CountMismatch { .. })));
}

/// S10 — a module carrying a `name` custom section with a module-name
/// subsection and a function-names subsection decodes into structured
/// subsections and the whole module re-encodes byte for byte.
#[test]
fn s10_name_section_round_trips() {
    let name_section = NameSection {
        module_name: Some("adder".to_string()),
        function_names: NameMap { names: vec![(0, "add".to_string())] },
        local_names: Vec::new(),
        other: Vec::new(),
    };

    let mut bytes = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    bytes.extend_from_slice(&custom_section_bytes("name", &name_section.encode()));

    let mut sink = ErrorSink::new();
    let module = decode_module(&bytes, FeatureSet::wasm_mvp(), &mut sink).unwrap();
    assert!(sink.is_empty());

    let custom = module.find_custom_section("name").unwrap();
    let decoded = NameSection::decode(&custom.payload).unwrap();
    assert_eq!(decoded, name_section);

    assert_eq!(write_module(&module), bytes);
}
