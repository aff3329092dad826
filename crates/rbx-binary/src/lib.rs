// SPDX-License-Identifier: Apache-2.0
//! The binary ("B-form") codec: a chunked, per-chunk LZ4-compressed
//! container over the columnar value encoding in [`rbx_model`].
//!
//! Layering, leaves first: [`stream`] (typed byte I/O) → [`chunk`] (LZ4
//! framing) → [`transform`] + [`cframe`] (per-field numeric transforms) →
//! [`value`] (columnar value arrays) → [`bform`] (the document itself).

pub mod bform;
pub mod cframe;
pub mod chunk;
pub mod stream;
pub mod transform;
pub mod value;

pub use bform::{decode, encode, BformDocument, BformError};
pub use value::ValueError;
