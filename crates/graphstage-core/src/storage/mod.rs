//! # Storage Providers
//!
//! The backend surface the coordinator persists to, plus two providers:
//! - `MemoryStore`: in-process store with configurable capabilities
//! - `RedbStore`: disk-backed store using the redb embedded database
//!
//! A provider declares what it can do through [`BackendCapabilities`].
//! The coordinator only calls the methods matching declared capabilities;
//! the default bodies of the optional methods reject with `Unsupported`.

mod memory;
mod redb_store;

pub use memory::{BackendCall, MemoryStore};
pub use redb_store::RedbStore;

use crate::graph::Graph;
use crate::query::QueryableStorage;
use crate::{GraphName, StageError, Triple};
use serde::{Deserialize, Serialize};

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Static facts about what a backend can do.
///
/// Captured once when a coordinator is created; every Flush branch is
/// decided from these four flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendCapabilities {
    /// The backend never accepts writes.
    pub read_only: bool,
    /// `update_graph` may be called with triple-level batches.
    pub supports_incremental_update: bool,
    /// `delete_graph` may be called.
    pub supports_delete_graph: bool,
    /// `list_graphs` may be called.
    pub supports_list_graphs: bool,
}

impl BackendCapabilities {
    /// Writable, incremental, delete- and list-capable.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            read_only: false,
            supports_incremental_update: true,
            supports_delete_graph: true,
            supports_list_graphs: true,
        }
    }

    /// Readable and listable, never written to.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            read_only: true,
            supports_incremental_update: false,
            supports_delete_graph: false,
            supports_list_graphs: true,
        }
    }

    /// Writable only in whole graphs.
    #[must_use]
    pub const fn graph_level() -> Self {
        Self {
            read_only: false,
            supports_incremental_update: false,
            supports_delete_graph: true,
            supports_list_graphs: true,
        }
    }
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

// =============================================================================
// STORAGE PROVIDER TRAIT
// =============================================================================

/// A capability-limited persistent graph store.
///
/// All fallible operations return `Result<T, StageError>`; I/O and storage
/// errors surface as `StageError::BackendFailure`.
pub trait StorageProvider {
    /// What this backend can do. Must not change over the provider's lifetime.
    fn capabilities(&self) -> BackendCapabilities;

    /// Store a graph, replacing any existing graph of the same name.
    fn save_graph(&mut self, graph: &Graph) -> Result<(), StageError>;

    /// Load a graph. Returns `StageError::GraphNotFound` if it does not exist.
    fn load_graph(&self, name: &GraphName) -> Result<Graph, StageError>;

    /// Delete a graph. Only called when `supports_delete_graph`.
    fn delete_graph(&mut self, name: &GraphName) -> Result<(), StageError> {
        Err(StageError::Unsupported(format!(
            "backend cannot delete graph {}",
            name
        )))
    }

    /// Apply triple-level changes to a graph. Retractions are applied
    /// before assertions. An absent graph is created only when assertions
    /// are supplied. Only called when `supports_incremental_update`.
    fn update_graph(
        &mut self,
        name: &GraphName,
        _assertions: Option<&[Triple]>,
        _retractions: Option<&[Triple]>,
    ) -> Result<(), StageError> {
        Err(StageError::Unsupported(format!(
            "backend cannot update graph {} incrementally",
            name
        )))
    }

    /// Names of all stored graphs. Only called when `supports_list_graphs`.
    fn list_graphs(&self) -> Result<Vec<GraphName>, StageError> {
        Err(StageError::Unsupported(
            "backend cannot list graphs".to_string(),
        ))
    }

    /// Native query/update evaluation, if the backend has it.
    fn as_queryable(&self) -> Option<&dyn QueryableStorage> {
        None
    }

    /// Mutable access to native query/update evaluation.
    fn as_queryable_mut(&mut self) -> Option<&mut dyn QueryableStorage> {
        None
    }
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Runtime choice between the bundled providers.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-process store (volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb.
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::default())
    }
}

impl StorageBackend {
    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// The redb database handle cannot be safely cloned.

impl StorageProvider for StorageBackend {
    fn capabilities(&self) -> BackendCapabilities {
        match self {
            Self::InMemory(store) => store.capabilities(),
            Self::Persistent(store) => store.capabilities(),
        }
    }

    fn save_graph(&mut self, graph: &Graph) -> Result<(), StageError> {
        match self {
            Self::InMemory(store) => store.save_graph(graph),
            Self::Persistent(store) => store.save_graph(graph),
        }
    }

    fn load_graph(&self, name: &GraphName) -> Result<Graph, StageError> {
        match self {
            Self::InMemory(store) => store.load_graph(name),
            Self::Persistent(store) => store.load_graph(name),
        }
    }

    fn delete_graph(&mut self, name: &GraphName) -> Result<(), StageError> {
        match self {
            Self::InMemory(store) => store.delete_graph(name),
            Self::Persistent(store) => store.delete_graph(name),
        }
    }

    fn update_graph(
        &mut self,
        name: &GraphName,
        assertions: Option<&[Triple]>,
        retractions: Option<&[Triple]>,
    ) -> Result<(), StageError> {
        match self {
            Self::InMemory(store) => store.update_graph(name, assertions, retractions),
            Self::Persistent(store) => store.update_graph(name, assertions, retractions),
        }
    }

    fn list_graphs(&self) -> Result<Vec<GraphName>, StageError> {
        match self {
            Self::InMemory(store) => store.list_graphs(),
            Self::Persistent(store) => store.list_graphs(),
        }
    }

    fn as_queryable(&self) -> Option<&dyn QueryableStorage> {
        match self {
            Self::InMemory(store) => store.as_queryable(),
            Self::Persistent(store) => store.as_queryable(),
        }
    }

    fn as_queryable_mut(&mut self) -> Option<&mut dyn QueryableStorage> {
        match self {
            Self::InMemory(store) => store.as_queryable_mut(),
            Self::Persistent(store) => store.as_queryable_mut(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// A provider implementing only the mandatory methods.
    struct SaveOnly;

    impl StorageProvider for SaveOnly {
        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                read_only: false,
                supports_incremental_update: false,
                supports_delete_graph: false,
                supports_list_graphs: false,
            }
        }

        fn save_graph(&mut self, _graph: &Graph) -> Result<(), StageError> {
            Ok(())
        }

        fn load_graph(&self, name: &GraphName) -> Result<Graph, StageError> {
            Err(StageError::GraphNotFound(name.clone()))
        }
    }

    #[test]
    fn optional_methods_default_to_unsupported() {
        let mut provider = SaveOnly;
        let name = GraphName::named("urn:g");
        assert!(matches!(
            provider.delete_graph(&name),
            Err(StageError::Unsupported(_))
        ));
        assert!(matches!(
            provider.update_graph(&name, Some(&[]), None),
            Err(StageError::Unsupported(_))
        ));
        assert!(matches!(
            provider.list_graphs(),
            Err(StageError::Unsupported(_))
        ));
        assert!(provider.as_queryable().is_none());
    }

    #[test]
    fn capability_presets() {
        assert!(!BackendCapabilities::full().read_only);
        assert!(BackendCapabilities::read_only().read_only);
        assert!(!BackendCapabilities::graph_level().supports_incremental_update);
        assert_eq!(BackendCapabilities::default(), BackendCapabilities::full());
    }

    #[test]
    fn default_backend_is_in_memory() {
        let backend = StorageBackend::default();
        assert!(!backend.is_persistent());
        assert!(backend.as_queryable().is_some());
    }
}
