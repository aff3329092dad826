// SPDX-License-Identifier: Apache-2.0
//! Reference identifier interning and generation (§4.G).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rand::RngCore;

use crate::scene::InstanceHandle;

/// `""`, `"null"`, and `"nil"` are reserved "empty reference" markers and are
/// never interned (§3 invariant).
#[must_use]
pub fn is_reserved(reference: &str) -> bool {
    matches!(reference, "" | "null" | "nil")
}

/// Generates and interns reference identifiers during encode.
///
/// Freshly generated identifiers are 16 random bytes, hex-uppercased and
/// prefixed `RBX` (35 characters total). Collisions regenerate until a free
/// identifier is found.
pub struct ReferenceRegistry<R: RngCore> {
    rng: R,
    interned: BTreeMap<String, InstanceHandle>,
}

impl ReferenceRegistry<rand::rngs::ThreadRng> {
    /// A registry seeded from the host's non-deterministic entropy source,
    /// per the default policy in §5.
    #[must_use]
    pub fn new() -> Self {
        Self { rng: rand::thread_rng(), interned: BTreeMap::new() }
    }
}

impl Default for ReferenceRegistry<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> ReferenceRegistry<R> {
    /// A registry driven by an explicit, caller-supplied RNG.
    ///
    /// Tests use this with a seeded deterministic RNG (e.g. `StdRng::seed_from_u64`)
    /// to get reproducible `RBX…` identifiers, per the host-override clause in §5.
    pub fn with_rng(rng: R) -> Self {
        Self { rng, interned: BTreeMap::new() }
    }

    /// Resolve `reference` for `handle`: if it is empty/reserved, or already
    /// claimed by a different handle, generate and intern a fresh identifier
    /// and return it. Otherwise intern and return `reference` unchanged.
    pub fn resolve(&mut self, reference: &str, handle: InstanceHandle) -> String {
        if !is_reserved(reference) {
            match self.interned.get(reference) {
                None => {
                    self.interned.insert(reference.to_string(), handle);
                    return reference.to_string();
                }
                Some(&owner) if owner == handle => return reference.to_string(),
                Some(_) => {}
            }
        }
        loop {
            let candidate = self.generate();
            if !self.interned.contains_key(&candidate) {
                self.interned.insert(candidate.clone(), handle);
                return candidate;
            }
        }
    }

    fn generate(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        let mut out = String::with_capacity(35);
        out.push_str("RBX");
        for byte in bytes {
            // `write!` to a `String` never fails.
            let _ = write!(out, "{byte:02X}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Instance, Scene};
    use rand::SeedableRng;

    #[test]
    fn reserved_markers_are_never_interned() {
        assert!(is_reserved(""));
        assert!(is_reserved("null"));
        assert!(is_reserved("nil"));
        assert!(!is_reserved("RBX0"));
    }

    #[test]
    fn fresh_identifiers_have_expected_shape() {
        let mut scene = Scene::new();
        let handle = scene.insert_root(Instance::new("Part", ""));
        let mut registry = ReferenceRegistry::with_rng(rand::rngs::StdRng::seed_from_u64(7));
        let id = registry.resolve("", handle);
        assert_eq!(id.len(), 35);
        assert!(id.starts_with("RBX"));
        assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit() && (c.is_ascii_digit() || c.is_uppercase())));
    }

    #[test]
    fn stable_references_round_trip_through_resolve() {
        let mut scene = Scene::new();
        let handle = scene.insert_root(Instance::new("Part", "RBXSTABLE"));
        let mut registry = ReferenceRegistry::with_rng(rand::rngs::StdRng::seed_from_u64(1));
        assert_eq!(registry.resolve("RBXSTABLE", handle), "RBXSTABLE");
        // Same handle resolving again returns the same string, no regeneration.
        assert_eq!(registry.resolve("RBXSTABLE", handle), "RBXSTABLE");
    }

    #[test]
    fn colliding_reference_is_rewritten() {
        let mut scene = Scene::new();
        let a = scene.insert_root(Instance::new("A", "DUP"));
        let b = scene.insert_root(Instance::new("B", "DUP"));
        let mut registry = ReferenceRegistry::with_rng(rand::rngs::StdRng::seed_from_u64(3));
        let ra = registry.resolve("DUP", a);
        let rb = registry.resolve("DUP", b);
        assert_eq!(ra, "DUP");
        assert_ne!(rb, "DUP");
        assert!(rb.starts_with("RBX"));
    }
}
