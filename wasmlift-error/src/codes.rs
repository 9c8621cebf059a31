//! Numeric error codes, grouped by category.
//!
//! Codes are stable identifiers clients can match on without depending on
//! the shape of [`crate::ErrorKind`]; the kind enum is where the structured
//! data lives, these constants are for logs and wire protocols.

// Format errors (1000-1999): malformed bytes, bad framing, unrecognized
// encodings.
/// Input ended before a value was fully read.
pub const UNEXPECTED_EOF: u16 = 1000;
/// A LEB128 integer used more bytes than its bit width allows.
pub const INTEGER_TOO_LONG: u16 = 1001;
/// A LEB128 integer's unused high bits were not a valid sign/zero extension.
pub const INTEGER_OVERFLOW: u16 = 1002;
/// A length-prefixed string was not valid UTF-8.
pub const BAD_UTF8: u16 = 1003;
/// The 4-byte `\0asm` magic was missing or incorrect.
pub const BAD_MAGIC: u16 = 1004;
/// The binary format version was not the one this toolkit understands.
pub const BAD_VERSION: u16 = 1005;
/// An opcode byte (or prefixed opcode) has no known meaning.
pub const UNKNOWN_OPCODE: u16 = 1006;
/// A section id byte does not correspond to any known or custom section.
pub const UNKNOWN_SECTION_ID: u16 = 1007;
/// A construct is recognized but its feature flag is not enabled.
pub const UNKNOWN_FEATURE: u16 = 1008;
/// A section's declared size did not match the bytes actually consumed.
pub const SECTION_SIZE_MISMATCH: u16 = 1009;
/// A known section appeared out of the Wasm-mandated canonical order.
pub const ORDER_VIOLATION: u16 = 1010;

// Structural errors (2000-2999): index-space and module-shape violations.
/// An index referenced a slot outside its index space's bounds.
pub const INDEX_OUT_OF_BOUNDS: u16 = 2000;
/// Two exports declared the same name.
pub const DUPLICATE_EXPORT: u16 = 2001;
/// Two related vectors (code/functions, data/data-count) disagreed in length.
pub const COUNT_MISMATCH: u16 = 2002;
/// More than one memory was declared without the multi-memory feature.
pub const MULTIPLE_MEMORIES: u16 = 2003;
/// More than one table was declared without the reference-types feature.
pub const MULTIPLE_TABLES: u16 = 2004;
/// A memory instruction's alignment hint exceeded the access width.
pub const INVALID_ALIGNMENT: u16 = 2005;
/// A limits pair had `max < min`, or a shared memory lacked a max.
pub const INVALID_LIMITS: u16 = 2006;

// Type errors (3000-3999): symbolic stack and constant-expression violations.
/// The operand stack's top did not match an instruction's expected types.
pub const TYPE_MISMATCH: u16 = 3000;
/// An instruction popped more values than the enclosing frame provided.
pub const STACK_UNDERFLOW: u16 = 3001;
/// A block/loop/if was not closed by a matching `end`, or `end` was
/// unmatched.
pub const UNBALANCED_CONTROL: u16 = 3002;
/// A constant expression used an instruction other than the restricted set.
pub const NON_CONSTANT_INITIALIZER: u16 = 3003;
/// A global initializer's value type did not match the global's declared
/// type.
pub const INVALID_GLOBAL_INIT: u16 = 3004;
/// A branch target label index had no enclosing control frame.
pub const UNDEFINED_LABEL: u16 = 3005;
/// A table used with `call_indirect` did not have a function reference
/// element type.
pub const NON_FUNCTION_REF_IN_TABLE: u16 = 3006;
