// Copyright (c) 2024 The wasmlift Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Wasm primitives, encoding tables, and the in-memory module model.
//!
//! This crate has no notion of "decoding a file" or "validating a
//! module" — it supplies the vocabulary [`wasmlift-decoder`] builds
//! those operations from: LEB128 and UTF-8 codecs, the byte-tag tables
//! for every binary-format enumeration, the value-type system, the
//! module shape, the instruction/immediate model, and the feature gate
//! that threads through all of it.

pub mod custom;
pub mod feature;
pub mod instr;
pub mod leb128;
pub mod module;
pub mod primitives;
pub mod tags;
pub mod types;

pub use feature::FeatureSet;
pub use module::Module;
