// Copyright (c) 2024 The wasmlift Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! The lazy reader, eager reader, validator, and writer that turn Wasm
//! binary bytes into a [`wasmlift_format::Module`] and back.
//!
//! [`reader::Parser`] frames a binary's sections one at a time without
//! materializing anything past the current section; [`eager::decode_module`]
//! drains that stream into a fully owned `Module`. [`validator::validate`]
//! runs the two-pass structural and type check over a `Module`.
//! [`writer::write_module`] re-encodes a `Module` back to bytes, and
//! [`transform::insert_import`] is the one module-shape edit this crate
//! ships a policy for: renumbering every index space that interleaves
//! imports with locals.
//!
//! Every phase takes a [`wasmlift_format::FeatureSet`] by value and an
//! `&mut wasmlift_error::ErrorSink` where it can produce more than one
//! diagnostic, matching the "never stop at the first problem" policy
//! `wasmlift-error` documents.

pub mod eager;
pub mod instr_reader;
pub mod reader;
pub mod reader_support;
pub mod transform;
pub mod validator;
pub mod writer;

pub use eager::decode_module;
pub use reader::{KnownSection, Parser, Payload};
pub use transform::insert_import;
pub use validator::{validate, validate_function_body};
pub use writer::write_module;
