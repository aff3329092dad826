// SPDX-License-Identifier: Apache-2.0
//! Logical scene model for the rbx document format.
//!
//! This crate defines the domain contract shared by the binary (`rbx-binary`)
//! and text (`rbx-text`) codecs. It contains NO serialization logic — that
//! lives downstream, in those two crates.
//!
//! # Design Principles
//!
//! - **Pure domain types.** [`scene::Scene`] and [`value::Value`] know nothing
//!   about bytes, chunks, or tags.
//! - **Non-owning parent links.** Children lists own; the parent pointer is a
//!   lookup, never a second owner.
//! - **Reference identifiers are opaque strings** outside the model. Codecs
//!   translate their own local identifiers (`i32` instance ids, `referent`
//!   attributes) to [`scene::InstanceHandle`]s at the boundary.

pub mod diagnostics;
pub mod reference;
pub mod scene;
pub mod value;

pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use reference::ReferenceRegistry;
pub use scene::{Instance, InstanceHandle, Scene, SceneError};
pub use value::{
    CFrame, Color3, Content, ContentKind, Ray, TypeId, UDim, UDim2, Value, Vector2, Vector2int16,
    Vector3, Vector3int16,
};
