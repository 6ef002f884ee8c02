//! # redb-backed Graph Storage
//!
//! A disk-backed `StorageProvider` using the redb embedded database:
//! - ACID transactions (every provider call is one transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! One table holds all graphs. Keys are the postcard encoding of the
//! `GraphName`, values are persistence-format graph bytes.

use super::{BackendCapabilities, StorageProvider};
use crate::formats::persistence::{graph_from_bytes, graph_to_bytes};
use crate::graph::Graph;
use crate::{GraphName, StageError, Triple};
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable,
    ReadableTableMetadata, TableDefinition, TableError,
};
use std::path::Path;

/// Table for graphs: encoded GraphName -> encoded Graph
const GRAPHS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("graphs");

fn backend_err(e: impl std::fmt::Display) -> StageError {
    StageError::BackendFailure(e.to_string())
}

/// Open the graphs table for reading; `None` if it was never created.
fn read_graphs(
    txn: &ReadTransaction,
) -> Result<Option<ReadOnlyTable<&'static [u8], &'static [u8]>>, StageError> {
    match txn.open_table(GRAPHS) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(backend_err(e)),
    }
}

fn encode_name(name: &GraphName) -> Result<Vec<u8>, StageError> {
    postcard::to_allocvec(name).map_err(|e| StageError::SerializationError(e.to_string()))
}

/// A disk-backed graph store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Declared capabilities; full unless restricted.
    capabilities: BackendCapabilities,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let db = Database::create(path.as_ref()).map_err(backend_err)?;

        // Initialize the table if it doesn't exist
        let write_txn = db.begin_write().map_err(backend_err)?;
        {
            let _ = write_txn.open_table(GRAPHS).map_err(backend_err)?;
        }
        write_txn.commit().map_err(backend_err)?;

        tracing::debug!(path = %path.as_ref().display(), "opened redb store");
        Ok(Self {
            db,
            capabilities: BackendCapabilities::full(),
        })
    }

    /// Open an existing store without writing to it.
    ///
    /// The file must exist. Capabilities are read-only; nothing is created,
    /// including the graphs table.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let db = Database::open(path.as_ref()).map_err(backend_err)?;

        tracing::debug!(path = %path.as_ref().display(), "opened redb store read-only");
        Ok(Self {
            db,
            capabilities: BackendCapabilities::read_only(),
        })
    }

    /// Restrict the capabilities this store declares.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Number of stored graphs.
    pub fn graph_count(&self) -> Result<usize, StageError> {
        let read_txn = self.db.begin_read().map_err(backend_err)?;
        let Some(table) = read_graphs(&read_txn)? else {
            return Ok(0);
        };
        let count = table.len().map_err(backend_err)?;
        usize::try_from(count).map_err(backend_err)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), StageError> {
        self.db.compact().map_err(backend_err)?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StageError> {
        if self.capabilities.read_only {
            return Err(StageError::Unsupported("backend is read-only".to_string()));
        }
        Ok(())
    }
}

impl StorageProvider for RedbStore {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn save_graph(&mut self, graph: &Graph) -> Result<(), StageError> {
        self.ensure_writable()?;
        let key = encode_name(graph.name())?;
        let value = graph_to_bytes(graph)?;

        let write_txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut table = write_txn.open_table(GRAPHS).map_err(backend_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(backend_err)?;
        }
        write_txn.commit().map_err(backend_err)?;
        Ok(())
    }

    fn load_graph(&self, name: &GraphName) -> Result<Graph, StageError> {
        let key = encode_name(name)?;
        let read_txn = self.db.begin_read().map_err(backend_err)?;
        let Some(table) = read_graphs(&read_txn)? else {
            return Err(StageError::GraphNotFound(name.clone()));
        };

        match table.get(key.as_slice()).map_err(backend_err)? {
            Some(bytes) => graph_from_bytes(bytes.value()),
            None => Err(StageError::GraphNotFound(name.clone())),
        }
    }

    fn delete_graph(&mut self, name: &GraphName) -> Result<(), StageError> {
        self.ensure_writable()?;
        if !self.capabilities.supports_delete_graph {
            return Err(StageError::Unsupported(format!(
                "backend cannot delete graph {}",
                name
            )));
        }
        let key = encode_name(name)?;

        let write_txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut table = write_txn.open_table(GRAPHS).map_err(backend_err)?;
            table.remove(key.as_slice()).map_err(backend_err)?;
        }
        write_txn.commit().map_err(backend_err)?;
        Ok(())
    }

    /// Read-modify-write of one graph inside a single write transaction.
    fn update_graph(
        &mut self,
        name: &GraphName,
        assertions: Option<&[Triple]>,
        retractions: Option<&[Triple]>,
    ) -> Result<(), StageError> {
        self.ensure_writable()?;
        if !self.capabilities.supports_incremental_update {
            return Err(StageError::Unsupported(format!(
                "backend cannot update graph {} incrementally",
                name
            )));
        }
        let key = encode_name(name)?;

        let write_txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut table = write_txn.open_table(GRAPHS).map_err(backend_err)?;

            let existing = table
                .get(key.as_slice())
                .map_err(backend_err)?
                .map(|bytes| graph_from_bytes(bytes.value()))
                .transpose()?;
            let creates = assertions.is_some_and(|triples| !triples.is_empty());
            let mut graph = match existing {
                Some(graph) => graph,
                None if creates => Graph::new(name.clone()),
                None => return Ok(()),
            };

            for triple in retractions.unwrap_or_default() {
                graph.remove(triple);
            }
            for triple in assertions.unwrap_or_default() {
                graph.insert(triple.clone());
            }

            let value = graph_to_bytes(&graph)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(backend_err)?;
        }
        write_txn.commit().map_err(backend_err)?;
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphName>, StageError> {
        if !self.capabilities.supports_list_graphs {
            return Err(StageError::Unsupported(
                "backend cannot list graphs".to_string(),
            ));
        }
        let read_txn = self.db.begin_read().map_err(backend_err)?;
        let Some(table) = read_graphs(&read_txn)? else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for entry in table.iter().map_err(backend_err)? {
            let (key, _) = entry.map_err(backend_err)?;
            let name: GraphName = postcard::from_bytes(key.value())
                .map_err(|e| StageError::DeserializationError(e.to_string()))?;
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn g(name: &str) -> GraphName {
        GraphName::named(name)
    }

    fn t(s: &str) -> Triple {
        Triple::new(s, "ex:p", "ex:o")
    }

    #[test]
    fn save_and_load_graph() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let graph = Graph::with_triples(g("urn:g"), [t("a"), t("b")]);
        store.save_graph(&graph).expect("save");

        assert_eq!(store.load_graph(&g("urn:g")).expect("load"), graph);
        assert_eq!(store.graph_count().expect("count"), 1);
    }

    #[test]
    fn load_missing_graph_is_not_found() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert!(matches!(
            store.load_graph(&GraphName::Default),
            Err(StageError::GraphNotFound(GraphName::Default))
        ));
    }

    #[test]
    fn update_graph_creates_then_modifies() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store
            .update_graph(&g("urn:g"), Some(&[t("a"), t("b")]), None)
            .expect("assert");
        store
            .update_graph(&g("urn:g"), None, Some(&[t("a"), t("missing")]))
            .expect("retract");

        let graph = store.load_graph(&g("urn:g")).expect("load");
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(&t("b")));
    }

    #[test]
    fn delete_and_list() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.save_graph(&Graph::new(g("urn:b"))).expect("save");
        store.save_graph(&Graph::new(g("urn:a"))).expect("save");
        store.save_graph(&Graph::new(GraphName::Default)).expect("save");

        assert_eq!(
            store.list_graphs().expect("list"),
            vec![GraphName::Default, g("urn:a"), g("urn:b")]
        );

        store.delete_graph(&g("urn:a")).expect("delete");
        store.delete_graph(&g("urn:never")).expect("delete absent");
        assert_eq!(
            store.list_graphs().expect("list"),
            vec![GraphName::Default, g("urn:b")]
        );
    }

    #[test]
    fn restricted_capabilities_are_enforced() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb"))
            .expect("open db")
            .with_capabilities(BackendCapabilities::read_only());

        assert!(matches!(
            store.save_graph(&Graph::new(g("urn:g"))),
            Err(StageError::Unsupported(_))
        ));
        assert!(store.update_graph(&g("urn:g"), Some(&[t("a")]), None).is_err());
        assert!(store.delete_graph(&g("urn:g")).is_err());
        assert_eq!(store.graph_count().expect("count"), 0);
    }

    #[test]
    fn read_only_open_leaves_file_untouched() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        assert!(RedbStore::open_read_only(&db_path).is_err());
        assert!(!db_path.exists());

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store
                .save_graph(&Graph::with_triples(g("urn:g"), [t("a")]))
                .expect("save");
        }
        let before = std::fs::read(&db_path).expect("read file");

        let mut store = RedbStore::open_read_only(&db_path).expect("open read-only");
        assert_eq!(store.capabilities(), BackendCapabilities::read_only());
        assert!(store.load_graph(&g("urn:g")).expect("load").contains(&t("a")));
        assert_eq!(store.list_graphs().expect("list"), vec![g("urn:g")]);
        assert!(matches!(
            store.save_graph(&Graph::new(g("urn:other"))),
            Err(StageError::Unsupported(_))
        ));
        drop(store);

        assert_eq!(std::fs::read(&db_path).expect("read file"), before);
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Phase 1: Create data
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store
                .save_graph(&Graph::with_triples(g("urn:g"), [t("a")]))
                .expect("save");
            store
                .update_graph(&g("urn:g"), Some(&[t("b")]), None)
                .expect("update");
        }
        // Store dropped here, simulating process exit

        // Phase 2: Reopen and verify
        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            let graph = store.load_graph(&g("urn:g")).expect("load");
            assert!(graph.contains(&t("a")));
            assert!(graph.contains(&t("b")));
        }
    }

    #[test]
    fn recovery_compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            for i in 0..20 {
                store
                    .save_graph(&Graph::with_triples(g(&format!("urn:g{}", i)), [t("a")]))
                    .expect("save");
            }
            for i in 0..10 {
                store
                    .delete_graph(&g(&format!("urn:g{}", i)))
                    .expect("delete");
            }
            store.compact().expect("compact");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.graph_count().expect("count"), 10);
    }
}
