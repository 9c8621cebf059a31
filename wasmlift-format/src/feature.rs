//! The feature gate: a value-typed set of booleans selecting which Wasm
//! extensions the reader, validator, and writer recognize.
//!
//! This is deliberately *not* a Cargo compile-time feature and not
//! process-global state — it is threaded explicitly by value into every
//! constructor that needs it, so two callers can decode the same bytes
//! under different feature sets in the same process.

/// One independently togglable Wasm extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    /// Allows globals to be declared mutable.
    pub mutable_globals: bool,
    /// Enables the sign-extension operator instructions.
    pub sign_extension: bool,
    /// Enables the non-trapping (saturating) float-to-int conversions.
    pub saturating_float_to_int: bool,
    /// Allows function types with more than one result.
    pub multi_value: bool,
    /// Enables reference types (`funcref`, `externref`, `ref`/`ref null`).
    pub reference_types: bool,
    /// Enables the bulk memory and table operations.
    pub bulk_memory: bool,
    /// Enables the `v128` SIMD value type and instructions.
    pub simd: bool,
    /// Enables shared memories and atomic instructions.
    pub threads: bool,
    /// Enables `return_call`/`return_call_indirect` tail calls.
    pub tail_call: bool,
    /// Enables typed function references.
    pub function_references: bool,
    /// Enables 64-bit memory indices.
    pub memory64: bool,
    /// Allows a module to declare more than one memory.
    pub multi_memory: bool,
    /// Enables exception handling (`tag`/`throw`/`try`/`catch`).
    pub exceptions: bool,
    /// Enables garbage-collected reference types.
    pub gc: bool,
    /// Enables custom annotations in the text format.
    pub annotations: bool,
}

impl FeatureSet {
    /// The WebAssembly 1.0 (MVP) feature set: every extension disabled.
    #[must_use]
    pub fn wasm_mvp() -> Self {
        Self {
            mutable_globals: true,
            sign_extension: false,
            saturating_float_to_int: false,
            multi_value: false,
            reference_types: false,
            bulk_memory: false,
            simd: false,
            threads: false,
            tail_call: false,
            function_references: false,
            memory64: false,
            multi_memory: false,
            exceptions: false,
            gc: false,
            annotations: false,
        }
    }

    /// Every extension this toolkit recognizes, enabled. Intended for
    /// fixture-driven tests exercising the full opcode surface.
    #[must_use]
    pub fn all() -> Self {
        Self {
            mutable_globals: true,
            sign_extension: true,
            saturating_float_to_int: true,
            multi_value: true,
            reference_types: true,
            bulk_memory: true,
            simd: true,
            threads: true,
            tail_call: true,
            function_references: true,
            memory64: true,
            multi_memory: true,
            exceptions: true,
            gc: true,
            annotations: true,
        }
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::wasm_mvp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mvp_disables_every_extension() {
        let mvp = FeatureSet::wasm_mvp();
        assert!(mvp.mutable_globals);
        assert!(!mvp.reference_types);
        assert!(!mvp.simd);
        assert!(!mvp.gc);
    }

    #[test]
    fn all_enables_every_extension() {
        let all = FeatureSet::all();
        assert!(all.reference_types && all.simd && all.gc && all.exceptions);
    }
}
