// SPDX-License-Identifier: Apache-2.0
//! The textual ("T-form") codec: a generic tag tree ([`tag`]) carrying a
//! scene-shaped vocabulary of `Item`/`Properties`/value tags ([`tform`]),
//! with scalar value encoding in [`value`] and an optional external schema
//! in [`schema`].

pub mod schema;
pub mod tag;
pub mod tform;
pub mod value;

pub use schema::{PropertyType, Schema};
pub use tform::{decode, encode, TformError};
pub use value::ValueTextError;
