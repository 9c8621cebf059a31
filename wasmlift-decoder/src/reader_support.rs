//! Value-type and heap-type decoding shared between the section reader
//! and the instruction reader, since `ref.null`'s immediate and every
//! reference-typed value use the same heap-type grammar.
//!
//! Both decoders also gate the feature-dependent corners of this
//! grammar here, in one place: `externref` needs `reference_types`,
//! `anyref`/`eqref`/`i31ref` and parametric `ref <typeidx>` need `gc`
//! or `function_references`, and a non-nullable `ref <heaptype>` needs
//! `function_references`. `funcref` alone is always available, since
//! tables need it even under the MVP feature set.

use wasmlift_error::{Error, ErrorKind, Result};
use wasmlift_format::tags;
use wasmlift_format::types::{HeapType, RefKind, ReferenceType, ValueType};
use wasmlift_format::primitives;
use wasmlift_format::leb128;
use wasmlift_format::FeatureSet;

/// Reject a heap type whose feature flag is off in `features`.
fn gate_heap_type(heap_type: HeapType, features: FeatureSet, offset: usize) -> Result<()> {
    match heap_type {
        HeapType::Kind(RefKind::Func) => Ok(()),
        HeapType::Kind(RefKind::Extern) => {
            crate::reader::require_feature(features.reference_types, "reference_types", offset)
        }
        HeapType::Kind(RefKind::Any | RefKind::Eq | RefKind::I31) => {
            crate::reader::require_feature(features.gc, "gc", offset)
        }
        HeapType::Index(_) => crate::reader::require_feature(
            features.function_references || features.gc,
            "function_references",
            offset,
        ),
    }
}

/// Decode a value type, including the parametric `ref [null] <heaptype>`
/// form that has no single-byte shorthand.
pub fn read_value_type(data: &[u8], pos: usize, features: FeatureSet) -> Result<(ValueType, usize)> {
    let (tag, consumed) = primitives::read_u8(data, pos)?;
    match tag {
        tags::REF | tags::REF_NULL => {
            let nullable = tag == tags::REF_NULL;
            if !nullable {
                crate::reader::require_feature(features.function_references, "function_references", pos)?;
            }
            let (heap, heap_len) = read_heap_type(data, pos + consumed, features)?;
            Ok((ValueType::Ref(ReferenceType { nullable, heap_type: heap }), consumed + heap_len))
        }
        _ => {
            let value_type = tags::decode_value_type(tag)
                .ok_or_else(|| Error::at(pos, ErrorKind::UnknownOpcode { opcode: u32::from(tag) }))?;
            if let ValueType::Ref(ReferenceType { heap_type, .. }) = value_type {
                gate_heap_type(heap_type, features, pos)?;
            }
            Ok((value_type, consumed))
        }
    }
}

/// Decode a heap type: either a bare reference-kind keyword or a signed
/// LEB128 type index.
pub fn read_heap_type(data: &[u8], pos: usize, features: FeatureSet) -> Result<(HeapType, usize)> {
    let (byte, byte_len) = primitives::read_u8(data, pos)?;
    let kind = match byte {
        tags::FUNCREF => Some(RefKind::Func),
        tags::EXTERNREF => Some(RefKind::Extern),
        tags::ANYREF => Some(RefKind::Any),
        tags::EQREF => Some(RefKind::Eq),
        tags::I31REF => Some(RefKind::I31),
        _ => None,
    };
    if let Some(kind) = kind {
        gate_heap_type(HeapType::Kind(kind), features, pos)?;
        return Ok((HeapType::Kind(kind), byte_len));
    }
    let (index, index_len) = leb128::read_i32(data, pos)?;
    let heap_type = HeapType::Index(index as u32);
    gate_heap_type(heap_type, features, pos)?;
    Ok((heap_type, index_len))
}

/// Encode a value type, the inverse of [`read_value_type`]. Built-in
/// nullable reference kinds use their single-byte shorthand; everything
/// else (non-nullable references, parametric type-index references)
/// falls back to the `ref [null] <heaptype>` form.
#[must_use]
pub fn write_value_type(value_type: ValueType) -> Vec<u8> {
    if let Some(tag) = tags::encode_value_type(value_type) {
        return vec![tag];
    }
    let ValueType::Ref(ReferenceType { nullable, heap_type }) = value_type else {
        // Every non-reference value type has a shorthand tag; this arm
        // is unreachable in practice.
        return vec![tags::I32];
    };
    let mut out = vec![if nullable { tags::REF_NULL } else { tags::REF }];
    out.extend(write_heap_type(heap_type));
    out
}

/// Encode a heap type, the inverse of [`read_heap_type`].
#[must_use]
pub fn write_heap_type(heap_type: HeapType) -> Vec<u8> {
    match heap_type {
        HeapType::Kind(RefKind::Func) => vec![tags::FUNCREF],
        HeapType::Kind(RefKind::Extern) => vec![tags::EXTERNREF],
        HeapType::Kind(RefKind::Any) => vec![tags::ANYREF],
        HeapType::Kind(RefKind::Eq) => vec![tags::EQREF],
        HeapType::Kind(RefKind::I31) => vec![tags::I31REF],
        HeapType::Index(index) => leb128::write_i32(index as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_funcref_shorthand() {
        let (value_type, len) = read_value_type(&[tags::FUNCREF], 0, FeatureSet::wasm_mvp()).unwrap();
        assert_eq!(value_type, ValueType::funcref());
        assert_eq!(len, 1);
    }

    #[test]
    fn decodes_parametric_ref_null_with_type_index() {
        let bytes = [tags::REF_NULL, 0x05];
        let (value_type, len) = read_value_type(&bytes, 0, FeatureSet::all()).unwrap();
        assert_eq!(value_type, ValueType::Ref(ReferenceType { nullable: true, heap_type: HeapType::Index(5) }));
        assert_eq!(len, 2);
    }

    #[test]
    fn externref_is_rejected_without_reference_types() {
        let err = read_value_type(&[tags::EXTERNREF], 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "reference_types" }));
    }

    #[test]
    fn externref_is_accepted_with_reference_types() {
        let features = FeatureSet { reference_types: true, ..FeatureSet::wasm_mvp() };
        let (value_type, _) = read_value_type(&[tags::EXTERNREF], 0, features).unwrap();
        assert_eq!(value_type, ValueType::externref());
    }

    #[test]
    fn i31ref_needs_gc_not_just_reference_types() {
        let features = FeatureSet { reference_types: true, ..FeatureSet::wasm_mvp() };
        let err = read_value_type(&[tags::I31REF], 0, features).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "gc" }));
    }

    #[test]
    fn non_nullable_ref_needs_function_references() {
        let bytes = [tags::REF, 0x70];
        let err = read_value_type(&bytes, 0, FeatureSet::wasm_mvp()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownFeature { feature: "function_references" }));
    }
}
