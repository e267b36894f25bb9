//! Typed per-frame resource registry.
//!
//! Features communicate through the registry instead of holding references
//! to each other: one feature publishes a value (`CullingResultsData`, the
//! camera target handle, the view uniform block) and later features look it
//! up by type. Entries are scoped: view entries vanish at end of view so
//! nothing leaks between stereo views, frame entries vanish at end of frame,
//! persistent entries stay until explicitly cleared.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::error::GraphError;

/// Lifetime scope of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    /// Survives until explicitly cleared.
    Persistent,
    /// Cleared at end of frame.
    Frame,
    /// Cleared at end of the current view.
    View,
}

struct Entry {
    value: Box<dyn Any>,
    scope: ResourceScope,
}

/// Type-keyed storage for values produced and consumed by render features.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value under its type, replacing any previous entry of that
    /// type regardless of scope.
    pub fn set<T: 'static>(&mut self, value: T, scope: ResourceScope) {
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                value: Box::new(value),
                scope,
            },
        );
    }

    /// Look up an entry, failing with
    /// [`GraphError::MissingResource`] if nobody published one.
    pub fn get<T: 'static>(&self) -> Result<&T, GraphError> {
        self.try_get::<T>().ok_or(GraphError::MissingResource {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Look up an entry that may legitimately be absent.
    pub fn try_get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Remove an entry. Returns whether one was present.
    pub fn clear<T: 'static>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<T>()).is_some()
    }

    /// Drop all view-scoped entries.
    pub fn end_view(&mut self) {
        self.entries
            .retain(|_, entry| entry.scope != ResourceScope::View);
    }

    /// Drop everything except persistent entries. Runs unconditionally at
    /// end of frame, including after an aborted frame.
    pub fn end_frame(&mut self) {
        self.entries
            .retain(|_, entry| entry.scope == ResourceScope::Persistent);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
