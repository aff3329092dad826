// SPDX-License-Identifier: Apache-2.0
//! Non-fatal diagnostics shared by both codecs (§4.H, §7).
//!
//! Fatal errors are modeled separately per codec (`rbx-binary::BformError`,
//! `rbx-text::TformError`) since their failure modes differ; warnings are
//! structurally identical across both forms, so they share one taxonomy.

use std::fmt;

/// One non-fatal diagnostic raised during decode or encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    /// The kind of diagnostic.
    pub kind: WarningKind,
    /// Free-form context, e.g. the property or chunk name involved.
    pub context: String,
}

impl Warning {
    /// Construct a warning with context.
    pub fn new(kind: WarningKind, context: impl Into<String>) -> Self {
        Self { kind, context: context.into() }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.context)
    }
}

/// Diagnostic categories, one per non-fatal case in §7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// §7.5 — property value kind didn't match the schema's declared type;
    /// the property was dropped.
    TypeMismatch,
    /// §7.6 — an unrecognized chunk signature was skipped.
    UnknownChunkSignature,
    /// §7.7 — a reserved field that must be zero was non-zero.
    ReservedFieldNonZero,
    /// §7.8 — a reference-valued property pointed at an unknown referent and
    /// was silently dropped.
    UnresolvableReference,
    /// §7.9 (decode) — an enum token value was outside the schema's declared
    /// range; the value was retained anyway.
    EnumTokenOutOfRange,
    /// §7.9 (encode) — an enum token value was outside the schema's declared
    /// range; the property was refused.
    EnumTokenRefused,
    /// A chunk's trailing framing (`END`'s compression/content) deviated from
    /// the documented convention without being fatal.
    NonconformingTrailer,
    /// §4.E — an `Item` or value tag was missing a required attribute (e.g.
    /// `class`, or a value tag's `name`); the tag was skipped.
    MissingRequiredAttribute,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TypeMismatch => "type mismatch",
            Self::UnknownChunkSignature => "unknown chunk signature",
            Self::ReservedFieldNonZero => "reserved field non-zero",
            Self::UnresolvableReference => "unresolvable reference",
            Self::EnumTokenOutOfRange => "enum token out of range",
            Self::EnumTokenRefused => "enum token refused",
            Self::NonconformingTrailer => "nonconforming trailer",
            Self::MissingRequiredAttribute => "missing required attribute",
        };
        f.write_str(label)
    }
}

/// An ordered, append-only collection of [`Warning`]s.
///
/// Order is preserved in source (decode/encode) order, per §7's propagation
/// rule: warnings never get deduplicated or reordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// An empty diagnostics set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a warning.
    pub fn push(&mut self, kind: WarningKind, context: impl Into<String>) {
        self.warnings.push(Warning::new(kind, context));
    }

    /// All warnings, in source order.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// True if no warnings were raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(WarningKind::UnknownChunkSignature, "XTRA");
        diagnostics.push(WarningKind::ReservedFieldNonZero, "header");
        let kinds: Vec<_> = diagnostics.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(kinds, [WarningKind::UnknownChunkSignature, WarningKind::ReservedFieldNonZero]);
    }
}
