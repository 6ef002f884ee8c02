//! # Persistence Coordinator
//!
//! Owns the in-memory collection and a storage provider, and moves staged
//! actions between them.
//!
//! - **Flush** drains the log and replays it to the backend, batched by the
//!   planner and shaped by the backend's capabilities.
//! - **Discard** drains the log and applies its inverse to memory only.
//! - **Sync Gate**: backend-delegated `query`/`update` refuse to run while
//!   anything is staged.
//!
//! Graphs are loaded from the backend on first touch. Loading, replay and
//! eviction all run with the log in `Applying` mode, so none of them is
//! ever recorded.
//!
//! ## Failure Policy
//!
//! Flush is not atomic against the backend. The log is drained before the
//! first call; if a call fails, the error is returned and every entry after
//! the failed one is dropped. The coordinator is synced afterwards either
//! way.

use crate::batch::{BatchPlanner, Step};
use crate::collection::GraphCollection;
use crate::graph::Graph;
use crate::log::{ActionLog, GraphActionKind, TripleActionKind};
use crate::query::{
    GenericUpdateProcessor, QueryResults, TriplePattern, UpdateCommand, UpdateProcessor,
};
use crate::storage::{BackendCapabilities, StorageProvider};
use crate::{GraphName, StageError, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// REPORTS
// =============================================================================

/// What a Flush sent to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Log entries drained.
    pub actions: usize,
    /// `save_graph` calls issued.
    pub saves: usize,
    /// `delete_graph` calls issued.
    pub deletes: usize,
    /// `update_graph` calls issued.
    pub updates: usize,
}

impl FlushReport {
    /// Total backend write calls issued.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.saves + self.deletes + self.updates
    }
}

/// What a Discard undid in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardReport {
    /// Log entries drained.
    pub actions: usize,
    /// Entries whose inverse changed memory.
    pub reverted: usize,
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Staging layer over one storage provider.
pub struct Coordinator<B: StorageProvider> {
    /// Working view plus action log.
    collection: GraphCollection,
    /// The persistence target.
    backend: B,
    /// Captured once at construction.
    capabilities: BackendCapabilities,
    /// Fallback for backends without native query/update.
    processor: Box<dyn UpdateProcessor>,
}

impl<B: StorageProvider + std::fmt::Debug> std::fmt::Debug for Coordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("backend", &self.backend)
            .field("capabilities", &self.capabilities)
            .field("graphs", &self.collection.len())
            .field("pending", &self.collection.log().len())
            .finish_non_exhaustive()
    }
}

impl<B: StorageProvider> Coordinator<B> {
    /// Create a coordinator using the generic update processor.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_processor(backend, Box::new(GenericUpdateProcessor))
    }

    /// Create a coordinator with a custom update processor.
    #[must_use]
    pub fn with_processor(backend: B, processor: Box<dyn UpdateProcessor>) -> Self {
        let capabilities = backend.capabilities();
        tracing::debug!(?capabilities, "coordinator created");
        Self {
            collection: GraphCollection::new(),
            backend,
            capabilities,
            processor,
        }
    }

    /// Backend capabilities as captured at construction.
    #[must_use]
    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    /// Get a reference to the storage provider.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The in-memory working view.
    #[must_use]
    pub fn collection(&self) -> &GraphCollection {
        &self.collection
    }

    /// The staged action log.
    #[must_use]
    pub fn log(&self) -> &ActionLog {
        self.collection.log()
    }

    /// Check if nothing is staged.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.collection.log().is_synced()
    }

    /// Number of staged actions.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.collection.log().len()
    }

    // =========================================================================
    // GRAPH ACCESS
    // =========================================================================

    /// Check whether a graph exists in the combined view.
    ///
    /// Memory wins; a pending delete hides the backend copy; otherwise the
    /// backend is asked (list if supported, else a trial load).
    pub fn has_graph(&self, name: &GraphName) -> Result<bool, StageError> {
        if self.collection.contains(name) {
            return Ok(true);
        }
        if self.collection.log().is_pending_delete(name) {
            return Ok(false);
        }
        if self.capabilities.supports_list_graphs {
            return Ok(self.backend.list_graphs()?.contains(name));
        }
        match self.backend.load_graph(name) {
            Ok(_) => Ok(true),
            Err(StageError::GraphNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a graph, loading it from the backend on first access.
    pub fn graph(&mut self, name: &GraphName) -> Result<&Graph, StageError> {
        self.ensure_loaded(name)?;
        self.collection.get(name)
    }

    /// Names visible in the combined view, in order.
    pub fn graph_names(&self) -> Result<Vec<GraphName>, StageError> {
        let mut names: BTreeSet<GraphName> = self.collection.names().cloned().collect();
        if self.capabilities.supports_list_graphs {
            let log = self.collection.log();
            names.extend(
                self.backend
                    .list_graphs()?
                    .into_iter()
                    .filter(|name| !log.is_pending_delete(name)),
            );
        }
        Ok(names.into_iter().collect())
    }

    /// Names stored in the backend, ignoring anything staged.
    pub fn backend_graphs(&self) -> Result<Vec<GraphName>, StageError> {
        if !self.capabilities.supports_list_graphs {
            return Err(StageError::Unsupported(
                "backend cannot list graphs".to_string(),
            ));
        }
        self.backend.list_graphs()
    }

    /// Load a graph into memory without recording, unless it is already
    /// there or has a pending delete. Returns whether the graph is in memory.
    fn ensure_loaded(&mut self, name: &GraphName) -> Result<bool, StageError> {
        if self.collection.contains(name) {
            return Ok(true);
        }
        if self.collection.log().is_pending_delete(name) {
            return Ok(false);
        }
        match self.backend.load_graph(name) {
            Ok(graph) => {
                tracing::debug!(graph = %name, triples = graph.len(), "loaded graph from backend");
                self.collection.applying().add_graph(graph);
                Ok(true)
            }
            Err(StageError::GraphNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add a graph, merging into any existing graph of the same name.
    pub fn add_graph(&mut self, graph: Graph) -> Result<(), StageError> {
        self.ensure_loaded(graph.name())?;
        self.collection.add_graph(graph);
        Ok(())
    }

    /// Remove a graph, returning the removed content.
    pub fn remove_graph(&mut self, name: &GraphName) -> Result<Graph, StageError> {
        self.ensure_loaded(name)?;
        self.collection.remove_graph(name)
    }

    /// Assert a triple into a graph, creating the graph if needed.
    pub fn assert(&mut self, name: &GraphName, triple: Triple) -> Result<(), StageError> {
        self.ensure_loaded(name)?;
        self.collection.assert(name, triple);
        Ok(())
    }

    /// Retract a triple from a graph.
    pub fn retract(&mut self, name: &GraphName, triple: Triple) -> Result<(), StageError> {
        self.ensure_loaded(name)?;
        self.collection.retract(name, triple);
        Ok(())
    }

    // =========================================================================
    // FLUSH / DISCARD
    // =========================================================================

    /// Commit staged actions to the backend.
    ///
    /// See the module docs for the failure policy.
    pub fn flush(&mut self) -> Result<FlushReport, StageError> {
        let actions = self.collection.log_mut().drain();
        let mut report = FlushReport {
            actions: actions.len(),
            ..FlushReport::default()
        };
        if actions.is_empty() {
            return Ok(report);
        }
        if self.capabilities.read_only {
            tracing::info!(
                actions = report.actions,
                "read-only backend: staged actions cleared without backend calls"
            );
            return Ok(report);
        }

        let mut planner = BatchPlanner::new(actions);
        let result = if self.capabilities.supports_incremental_update {
            flush_incremental(&mut self.backend, self.capabilities, &mut planner, &mut report)
        } else {
            flush_whole_graphs(
                &mut self.backend,
                &self.collection,
                self.capabilities,
                &mut planner,
                &mut report,
            )
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    actions = report.actions,
                    saves = report.saves,
                    deletes = report.deletes,
                    updates = report.updates,
                    "flush complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    dropped = planner.remaining(),
                    calls = report.calls(),
                    "flush failed; remaining staged actions dropped"
                );
                Err(e)
            }
        }
    }

    /// Undo staged actions in memory. Never touches the backend.
    pub fn discard(&mut self) -> DiscardReport {
        let mut actions = self.collection.log_mut().drain();
        actions.make_contiguous().reverse();
        let mut report = DiscardReport {
            actions: actions.len(),
            reverted: 0,
        };

        let mut applying = self.collection.applying();
        for step in BatchPlanner::new(actions) {
            match step {
                Step::Graph(action) => match action.kind {
                    GraphActionKind::Added => {
                        if applying.remove_graph(&action.graph).is_ok() {
                            report.reverted += 1;
                        }
                    }
                    GraphActionKind::Deleted => {
                        if let Some(snapshot) = action.snapshot {
                            applying.add_graph(snapshot);
                            report.reverted += 1;
                        }
                    }
                },
                Step::Batch(batch) => {
                    for action in batch.actions.into_iter().filter(|a| a.effective) {
                        match action.kind.inverse() {
                            TripleActionKind::Assert => {
                                applying.assert(&action.graph, action.triple);
                            }
                            TripleActionKind::Retract => {
                                applying.retract(&action.graph, action.triple);
                            }
                        }
                        report.reverted += 1;
                    }
                }
            }
        }
        drop(applying);

        tracing::info!(
            actions = report.actions,
            reverted = report.reverted,
            "discard complete"
        );
        report
    }

    // =========================================================================
    // QUERY / UPDATE
    // =========================================================================

    /// Run a query against the backend. Fails with `NotSynced` while
    /// anything is staged.
    pub fn query(&self, pattern: &TriplePattern) -> Result<QueryResults, StageError> {
        if !self.is_synced() {
            return Err(StageError::NotSynced);
        }
        match self.backend.as_queryable() {
            Some(native) => native.query(pattern),
            None => self.processor.query(&self.backend, pattern),
        }
    }

    /// Run a query against the in-memory view only. Not gated.
    #[must_use]
    pub fn query_memory(&self, pattern: &TriplePattern) -> QueryResults {
        QueryResults::from_graphs(self.collection.graphs(), pattern)
    }

    /// Run an update against the backend. Fails with `NotSynced` while
    /// anything is staged. The affected graph is evicted from memory so
    /// the next access reloads it.
    pub fn update(&mut self, command: &UpdateCommand) -> Result<(), StageError> {
        if !self.is_synced() {
            return Err(StageError::NotSynced);
        }
        if self.capabilities.read_only {
            return Err(StageError::Unsupported("backend is read-only".to_string()));
        }

        match self.backend.as_queryable_mut() {
            Some(native) => native.update(command)?,
            None => self.processor.update(&mut self.backend, command)?,
        }

        let graph = command.graph();
        if self.collection.applying().remove_graph(graph).is_ok() {
            tracing::debug!(graph = %graph, "evicted graph after update");
        }
        Ok(())
    }
}

// =============================================================================
// FLUSH STRATEGIES
// =============================================================================

/// Triple-level replay: one `update_graph` per batch.
fn flush_incremental<B: StorageProvider>(
    backend: &mut B,
    capabilities: BackendCapabilities,
    planner: &mut BatchPlanner,
    report: &mut FlushReport,
) -> Result<(), StageError> {
    for step in planner.by_ref() {
        match step {
            Step::Graph(action) => match action.kind {
                GraphActionKind::Added => {
                    tracing::debug!(graph = %action.graph, "save_graph (empty)");
                    backend.save_graph(&Graph::new(action.graph))?;
                    report.saves += 1;
                }
                GraphActionKind::Deleted => {
                    delete_if_supported(backend, capabilities, &action.graph, report)?;
                }
            },
            Step::Batch(batch) => {
                let triples = batch.triples();
                tracing::debug!(
                    graph = %batch.graph,
                    kind = ?batch.kind,
                    triples = triples.len(),
                    "update_graph"
                );
                match batch.kind {
                    TripleActionKind::Assert => {
                        backend.update_graph(&batch.graph, Some(triples.as_slice()), None)?;
                    }
                    TripleActionKind::Retract => {
                        backend.update_graph(&batch.graph, None, Some(triples.as_slice()))?;
                    }
                }
                report.updates += 1;
            }
        }
    }
    Ok(())
}

/// Graph-level replay: `Added` saves the current in-memory content, triple
/// actions only mark their graph as touched. Touched graphs never saved
/// through an `Added` are saved once at the end.
fn flush_whole_graphs<B: StorageProvider>(
    backend: &mut B,
    collection: &GraphCollection,
    capabilities: BackendCapabilities,
    planner: &mut BatchPlanner,
    report: &mut FlushReport,
) -> Result<(), StageError> {
    let mut saved = BTreeSet::new();
    let mut touched = BTreeSet::new();

    for step in planner.by_ref() {
        match step {
            Step::Graph(action) => match action.kind {
                GraphActionKind::Added => {
                    if let Ok(graph) = collection.get(&action.graph) {
                        tracing::debug!(graph = %action.graph, triples = graph.len(), "save_graph");
                        backend.save_graph(graph)?;
                        report.saves += 1;
                    }
                    saved.insert(action.graph);
                }
                GraphActionKind::Deleted => {
                    delete_if_supported(backend, capabilities, &action.graph, report)?;
                }
            },
            Step::Batch(batch) => {
                touched.insert(batch.graph);
            }
        }
    }

    for name in touched.difference(&saved) {
        if let Ok(graph) = collection.get(name) {
            tracing::debug!(graph = %name, triples = graph.len(), "save_graph (touched)");
            backend.save_graph(graph)?;
            report.saves += 1;
        }
    }
    Ok(())
}

fn delete_if_supported<B: StorageProvider>(
    backend: &mut B,
    capabilities: BackendCapabilities,
    graph: &GraphName,
    report: &mut FlushReport,
) -> Result<(), StageError> {
    if capabilities.supports_delete_graph {
        tracing::debug!(graph = %graph, "delete_graph");
        backend.delete_graph(graph)?;
        report.deletes += 1;
    } else {
        tracing::warn!(graph = %graph, "backend cannot delete graphs; deletion not persisted");
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
