// SPDX-License-Identifier: Apache-2.0
//! The logical scene model: an arena of instances forming a forest.
//!
//! Mutations are single-threaded (§4.F). [`Instance`] owns its children list;
//! [`Scene`] owns the roots. The parent link is a non-owning lookup into the
//! same arena, so it can never by itself create an ownership cycle — only the
//! children lists can, and [`Scene::would_cycle`] guards against that.

use std::collections::BTreeMap;

use crate::value::Value;

/// Opaque index into a [`Scene`]'s instance arena.
///
/// Never leaks outside the logical model: the binary codec's scene-local
/// `i32` ids and the text codec's `referent` strings are both translated to
/// and from `InstanceHandle` at the codec boundary, never stored here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceHandle(usize);

/// A node in the scene forest: a class name, a reference label, a property
/// bag, and an ordered list of owned children.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    /// Declared class name (e.g. `"Part"`).
    pub class_name: String,
    /// Opaque reference identifier. Empty string means "no reference assigned
    /// yet"; see [`crate::reference::ReferenceRegistry`].
    pub reference: String,
    /// Property bag, keyed by property name. A `BTreeMap` gives the
    /// lexicographic-by-name iteration order the encoder requires for free.
    pub properties: BTreeMap<String, Value>,
    children: Vec<InstanceHandle>,
    parent: Option<InstanceHandle>,
}

impl Instance {
    /// Construct a new, parentless, childless instance.
    #[must_use]
    pub fn new(class_name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            reference: reference.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// This instance's current parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<InstanceHandle> {
        self.parent
    }

    /// This instance's children, in order.
    #[must_use]
    pub fn children(&self) -> &[InstanceHandle] {
        &self.children
    }
}

/// Errors that can occur while mutating or encoding a [`Scene`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// `set_parent` would have introduced a cycle in the ownership forest.
    #[error("setting parent would introduce a cycle in the instance forest")]
    Cycle,
    /// An [`InstanceHandle`] does not belong to this scene's arena.
    #[error("instance handle does not belong to this scene")]
    UnknownHandle,
}

/// An ordered forest of [`Instance`]s.
///
/// Instances live in an arena ([`Vec<Instance>`]); [`InstanceHandle`]s are
/// stable indices into it for the lifetime of the scene (no deletion is
/// supported, matching the format's append-only decode/encode lifecycle).
#[derive(Clone, Debug, Default)]
pub struct Scene {
    arena: Vec<Instance>,
    roots: Vec<InstanceHandle>,
}

impl Scene {
    /// An empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new instance as a root. Returns its handle.
    pub fn insert_root(&mut self, instance: Instance) -> InstanceHandle {
        let handle = self.push(instance);
        self.roots.push(handle);
        handle
    }

    fn push(&mut self, instance: Instance) -> InstanceHandle {
        let handle = InstanceHandle(self.arena.len());
        self.arena.push(instance);
        handle
    }

    /// Insert a new instance as a child of `parent`. Returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownHandle`] if `parent` is not in this scene.
    pub fn insert_child(
        &mut self,
        parent: InstanceHandle,
        instance: Instance,
    ) -> Result<InstanceHandle, SceneError> {
        if parent.0 >= self.arena.len() {
            return Err(SceneError::UnknownHandle);
        }
        let handle = self.push(instance);
        self.arena[handle.0].parent = Some(parent);
        self.arena[parent.0].children.push(handle);
        Ok(handle)
    }

    /// Borrow an instance by handle.
    #[must_use]
    pub fn get(&self, handle: InstanceHandle) -> Option<&Instance> {
        self.arena.get(handle.0)
    }

    /// Mutably borrow an instance by handle.
    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut Instance> {
        self.arena.get_mut(handle.0)
    }

    /// Root-level instance handles, in order.
    #[must_use]
    pub fn roots(&self) -> &[InstanceHandle] {
        &self.roots
    }

    /// Total number of instances in the scene (roots plus all descendants).
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the scene has no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// All instance handles in arena (insertion) order.
    pub fn handles(&self) -> impl Iterator<Item = InstanceHandle> + '_ {
        (0..self.arena.len()).map(InstanceHandle)
    }

    /// Detach `handle` from its current parent (or the root list) and attach
    /// it to `new_parent`, or make it a root when `new_parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownHandle`] if either handle is not in this
    /// scene, and [`SceneError::Cycle`] if `new_parent` is `handle` itself or
    /// a descendant of `handle`.
    pub fn set_parent(
        &mut self,
        handle: InstanceHandle,
        new_parent: Option<InstanceHandle>,
    ) -> Result<(), SceneError> {
        if handle.0 >= self.arena.len() {
            return Err(SceneError::UnknownHandle);
        }
        if let Some(np) = new_parent {
            if np.0 >= self.arena.len() {
                return Err(SceneError::UnknownHandle);
            }
            if np == handle || self.is_descendant(handle, np) {
                return Err(SceneError::Cycle);
            }
        }

        match self.arena[handle.0].parent {
            Some(old) => self.arena[old.0].children.retain(|&c| c != handle),
            None => self.roots.retain(|&r| r != handle),
        }

        self.arena[handle.0].parent = new_parent;
        match new_parent {
            Some(np) => self.arena[np.0].children.push(handle),
            None => self.roots.push(handle),
        }
        Ok(())
    }

    /// True if `candidate` is `ancestor` or a descendant of `ancestor`.
    fn is_descendant(&self, ancestor: InstanceHandle, candidate: InstanceHandle) -> bool {
        let mut stack = vec![ancestor];
        while let Some(h) = stack.pop() {
            if h == candidate {
                return true;
            }
            stack.extend(self.arena[h.0].children.iter().copied());
        }
        false
    }

    /// Verify the forest invariant (§3: the parent graph has no cycles).
    ///
    /// Encoders call this before emitting a document; a cycle here is a fatal
    /// error per §7 item 10.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut visiting = vec![false; self.arena.len()];
        let mut visited = vec![false; self.arena.len()];
        for root in self.handles() {
            if !visited[root.0] && self.visit_for_cycle(root, &mut visiting, &mut visited) {
                return true;
            }
        }
        false
    }

    fn visit_for_cycle(
        &self,
        handle: InstanceHandle,
        visiting: &mut [bool],
        visited: &mut [bool],
    ) -> bool {
        if visiting[handle.0] {
            return true;
        }
        if visited[handle.0] {
            return false;
        }
        visiting[handle.0] = true;
        for &child in &self.arena[handle.0].children {
            if self.visit_for_cycle(child, visiting, visited) {
                return true;
            }
        }
        visiting[handle.0] = false;
        visited[handle.0] = true;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup_roundtrip() {
        let mut scene = Scene::new();
        let a = scene.insert_root(Instance::new("Workspace", ""));
        let b = scene.insert_child(a, Instance::new("Part", "")).unwrap();
        assert_eq!(scene.get(a).unwrap().children(), &[b]);
        assert_eq!(scene.get(b).unwrap().parent(), Some(a));
        assert!(!scene.has_cycle());
    }

    #[test]
    fn set_parent_moves_between_lists() {
        let mut scene = Scene::new();
        let a = scene.insert_root(Instance::new("A", ""));
        let b = scene.insert_root(Instance::new("B", ""));
        scene.set_parent(b, Some(a)).unwrap();
        assert_eq!(scene.roots(), &[a]);
        assert_eq!(scene.get(a).unwrap().children(), &[b]);

        scene.set_parent(b, None).unwrap();
        assert_eq!(scene.roots(), &[a, b]);
        assert!(scene.get(a).unwrap().children().is_empty());
    }

    #[test]
    fn set_parent_rejects_cycle() {
        let mut scene = Scene::new();
        let a = scene.insert_root(Instance::new("A", ""));
        let b = scene.insert_child(a, Instance::new("B", "")).unwrap();
        assert_eq!(scene.set_parent(a, Some(b)), Err(SceneError::Cycle));
        assert_eq!(scene.set_parent(a, Some(a)), Err(SceneError::Cycle));
    }

    #[test]
    fn unknown_handle_is_reported() {
        let mut scene_a = Scene::new();
        let handle_from_a = scene_a.insert_root(Instance::new("A", ""));
        let mut scene_b = Scene::new();
        assert_eq!(
            scene_b.set_parent(handle_from_a, None),
            Err(SceneError::UnknownHandle)
        );
    }
}
