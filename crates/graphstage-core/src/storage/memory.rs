//! # In-Process Storage
//!
//! `MemoryStore` keeps graphs in a `BTreeMap` and journals every write call
//! it accepts. It enforces its declared capabilities: calling a method the
//! capability set does not allow fails with `Unsupported`, exactly as a
//! limited remote store would.

use super::{BackendCapabilities, StorageProvider};
use crate::graph::Graph;
use crate::query::{QueryResults, QueryableStorage, TriplePattern, UpdateCommand};
use crate::{GraphName, StageError, Triple};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A write call accepted by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    SaveGraph(Graph),
    DeleteGraph(GraphName),
    UpdateGraph {
        graph: GraphName,
        assertions: Option<Vec<Triple>>,
        retractions: Option<Vec<Triple>>,
    },
    /// A natively executed update.
    Update(UpdateCommand),
}

/// In-process graph store.
#[derive(Debug)]
pub struct MemoryStore {
    /// Stored graphs: GraphName -> Graph
    graphs: BTreeMap<GraphName, Graph>,
    /// Declared capabilities.
    capabilities: BackendCapabilities,
    /// Accepted write calls, oldest first.
    journal: Vec<BackendCall>,
    /// Number of `load_graph`/`list_graphs`/`query` calls served.
    reads: AtomicUsize,
    /// Reject writes once this many have been accepted.
    write_budget: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(BackendCapabilities::full())
    }
}

impl MemoryStore {
    /// Create an empty store with the given capabilities.
    #[must_use]
    pub fn new(capabilities: BackendCapabilities) -> Self {
        Self {
            graphs: BTreeMap::new(),
            capabilities,
            journal: Vec::new(),
            reads: AtomicUsize::new(0),
            write_budget: None,
        }
    }

    /// Create a store pre-populated with graphs. Seeding is not journaled.
    #[must_use]
    pub fn with_graphs(
        capabilities: BackendCapabilities,
        graphs: impl IntoIterator<Item = Graph>,
    ) -> Self {
        let mut store = Self::new(capabilities);
        for graph in graphs {
            store.graphs.insert(graph.name().clone(), graph);
        }
        store
    }

    /// Fail every write after `accepted` writes have succeeded.
    #[must_use]
    pub fn fail_after(mut self, accepted: usize) -> Self {
        self.write_budget = Some(accepted);
        self
    }

    /// A stored graph, without counting a read.
    #[must_use]
    pub fn graph(&self, name: &GraphName) -> Option<&Graph> {
        self.graphs.get(name)
    }

    /// All stored graphs in deterministic order, without counting a read.
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Accepted write calls, oldest first.
    #[must_use]
    pub fn journal(&self) -> &[BackendCall] {
        &self.journal
    }

    /// Forget recorded calls and reset the read counter.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
        self.reads.store(0, Ordering::Relaxed);
    }

    /// Number of read calls served.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total calls received: writes plus reads.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.journal.len() + self.read_count()
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Admit a write: reject on read-only or exhausted budget, else journal it.
    fn admit(&mut self, call: BackendCall) -> Result<(), StageError> {
        if self.capabilities.read_only {
            return Err(StageError::Unsupported(
                "backend is read-only".to_string(),
            ));
        }
        if self
            .write_budget
            .is_some_and(|budget| self.journal.len() >= budget)
        {
            return Err(StageError::BackendFailure(
                "write rejected by store".to_string(),
            ));
        }
        self.journal.push(call);
        Ok(())
    }

    fn apply_update(
        &mut self,
        name: &GraphName,
        assertions: Option<&[Triple]>,
        retractions: Option<&[Triple]>,
    ) {
        let creates = assertions.is_some_and(|triples| !triples.is_empty());
        if !creates && !self.graphs.contains_key(name) {
            return;
        }
        let graph = self
            .graphs
            .entry(name.clone())
            .or_insert_with(|| Graph::new(name.clone()));
        for triple in retractions.unwrap_or_default() {
            graph.remove(triple);
        }
        for triple in assertions.unwrap_or_default() {
            graph.insert(triple.clone());
        }
    }
}

impl StorageProvider for MemoryStore {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn save_graph(&mut self, graph: &Graph) -> Result<(), StageError> {
        self.admit(BackendCall::SaveGraph(graph.clone()))?;
        self.graphs.insert(graph.name().clone(), graph.clone());
        Ok(())
    }

    fn load_graph(&self, name: &GraphName) -> Result<Graph, StageError> {
        self.count_read();
        self.graphs
            .get(name)
            .cloned()
            .ok_or_else(|| StageError::GraphNotFound(name.clone()))
    }

    fn delete_graph(&mut self, name: &GraphName) -> Result<(), StageError> {
        if !self.capabilities.supports_delete_graph {
            return Err(StageError::Unsupported(format!(
                "backend cannot delete graph {}",
                name
            )));
        }
        self.admit(BackendCall::DeleteGraph(name.clone()))?;
        self.graphs.remove(name);
        Ok(())
    }

    fn update_graph(
        &mut self,
        name: &GraphName,
        assertions: Option<&[Triple]>,
        retractions: Option<&[Triple]>,
    ) -> Result<(), StageError> {
        if !self.capabilities.supports_incremental_update {
            return Err(StageError::Unsupported(format!(
                "backend cannot update graph {} incrementally",
                name
            )));
        }
        self.admit(BackendCall::UpdateGraph {
            graph: name.clone(),
            assertions: assertions.map(<[Triple]>::to_vec),
            retractions: retractions.map(<[Triple]>::to_vec),
        })?;
        self.apply_update(name, assertions, retractions);
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphName>, StageError> {
        if !self.capabilities.supports_list_graphs {
            return Err(StageError::Unsupported(
                "backend cannot list graphs".to_string(),
            ));
        }
        self.count_read();
        Ok(self.graphs.keys().cloned().collect())
    }

    fn as_queryable(&self) -> Option<&dyn QueryableStorage> {
        Some(self)
    }

    fn as_queryable_mut(&mut self) -> Option<&mut dyn QueryableStorage> {
        Some(self)
    }
}

impl QueryableStorage for MemoryStore {
    fn query(&self, pattern: &TriplePattern) -> Result<QueryResults, StageError> {
        self.count_read();
        Ok(QueryResults::from_graphs(self.graphs.values(), pattern))
    }

    fn update(&mut self, command: &UpdateCommand) -> Result<(), StageError> {
        if let UpdateCommand::Drop { graph } = command
            && !self.capabilities.supports_delete_graph
        {
            return Err(StageError::Unsupported(format!(
                "backend cannot delete graph {}",
                graph
            )));
        }
        self.admit(BackendCall::Update(command.clone()))?;

        match command {
            UpdateCommand::InsertData { graph, triples } => {
                self.apply_update(graph, Some(triples), None);
            }
            UpdateCommand::DeleteData { graph, triples } => {
                self.apply_update(graph, None, Some(triples));
            }
            UpdateCommand::Clear { graph } => {
                self.graphs
                    .entry(graph.clone())
                    .or_insert_with(|| Graph::new(graph.clone()))
                    .clear();
            }
            UpdateCommand::Drop { graph } => {
                self.graphs.remove(graph);
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
