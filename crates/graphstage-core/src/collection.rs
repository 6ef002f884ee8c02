//! # In-Memory Graph Collection
//!
//! The authoritative, mutable working view: graph name to graph content.
//!
//! Every mutating operation records its action in the owned `ActionLog`
//! before returning. There is no other way to change the collection, so
//! the log can never miss a mutation.
//!
//! While the log is in `Applying` mode (see [`GraphCollection::applying`])
//! the same operations mutate data without recording.

use crate::graph::Graph;
use crate::log::{ActionLog, CoordinatorMode, GraphAction, TripleAction};
use crate::{GraphName, StageError, Triple};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// The working set of graphs plus the log of how it got there.
#[derive(Debug, Clone, Default)]
pub struct GraphCollection {
    /// Graph storage: GraphName -> Graph
    graphs: BTreeMap<GraphName, Graph>,
    /// Staged mutations since the last Flush/Discard.
    log: ActionLog,
}

impl GraphCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add a graph.
    ///
    /// If no graph of that name exists, records `Added` followed by one
    /// `Assert` per triple. Otherwise the content is merged into the
    /// existing graph and only the asserts are recorded.
    pub fn add_graph(&mut self, graph: Graph) {
        let (name, triples) = graph.into_parts();
        if !self.graphs.contains_key(&name) {
            self.graphs.insert(name.clone(), Graph::new(name.clone()));
            self.log.record(GraphAction::added(name.clone()));
        }
        for triple in triples {
            self.assert(&name, triple);
        }
    }

    /// Remove a graph, returning its content.
    pub fn remove_graph(&mut self, name: &GraphName) -> Result<Graph, StageError> {
        let removed = self
            .graphs
            .remove(name)
            .ok_or_else(|| StageError::GraphNotFound(name.clone()))?;
        if self.log.is_recording() {
            self.log.record(GraphAction::deleted(removed.clone()));
        }
        Ok(removed)
    }

    /// Assert a triple into a graph, creating the graph if needed.
    ///
    /// Asserting a triple that is already present changes nothing but is
    /// still recorded.
    pub fn assert(&mut self, name: &GraphName, triple: Triple) {
        if !self.graphs.contains_key(name) {
            self.graphs.insert(name.clone(), Graph::new(name.clone()));
            self.log.record(GraphAction::added(name.clone()));
        }
        let effective = self
            .graphs
            .get_mut(name)
            .is_some_and(|graph| graph.insert(triple.clone()));
        self.log
            .record(TripleAction::assert(name.clone(), triple, effective));
    }

    /// Retract a triple from a graph.
    ///
    /// Retracting from an absent graph, or retracting an absent triple,
    /// changes nothing but is still recorded.
    pub fn retract(&mut self, name: &GraphName, triple: Triple) {
        let effective = self
            .graphs
            .get_mut(name)
            .is_some_and(|graph| graph.remove(&triple));
        self.log
            .record(TripleAction::retract(name.clone(), triple, effective));
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Check if a graph is present in memory.
    #[must_use]
    pub fn contains(&self, name: &GraphName) -> bool {
        self.graphs.contains_key(name)
    }

    /// Get a graph by name.
    pub fn get(&self, name: &GraphName) -> Result<&Graph, StageError> {
        self.graphs
            .get(name)
            .ok_or_else(|| StageError::GraphNotFound(name.clone()))
    }

    /// Names of all in-memory graphs in deterministic order.
    pub fn names(&self) -> impl Iterator<Item = &GraphName> {
        self.graphs.keys()
    }

    /// All in-memory graphs in deterministic order.
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Number of in-memory graphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Check if no graph is held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// The staged action log.
    #[must_use]
    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ActionLog {
        &mut self.log
    }

    /// Switch to `Applying` until the returned guard is dropped.
    ///
    /// Mutations made through the guard are not recorded. The previous
    /// mode is restored on drop, including during unwinding.
    pub(crate) fn applying(&mut self) -> Applying<'_> {
        let previous = self.log.mode();
        self.log.set_mode(CoordinatorMode::Applying);
        Applying {
            collection: self,
            previous,
        }
    }
}

// =============================================================================
// APPLYING GUARD
// =============================================================================

/// Exclusive access to a collection whose log is in `Applying` mode.
pub(crate) struct Applying<'a> {
    collection: &'a mut GraphCollection,
    previous: CoordinatorMode,
}

impl Deref for Applying<'_> {
    type Target = GraphCollection;

    fn deref(&self) -> &Self::Target {
        self.collection
    }
}

impl DerefMut for Applying<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.collection
    }
}

impl Drop for Applying<'_> {
    fn drop(&mut self) {
        self.collection.log.set_mode(self.previous);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Action, GraphActionKind, TripleActionKind};

    fn g(name: &str) -> GraphName {
        GraphName::named(name)
    }

    fn t(s: &str) -> Triple {
        Triple::new(s, "ex:p", "ex:o")
    }

    #[test]
    fn add_graph_records_added_then_asserts() {
        let mut collection = GraphCollection::new();
        collection.add_graph(Graph::with_triples(g("urn:g"), [t("a"), t("b")]));

        let actions: Vec<_> = collection.log().iter().cloned().collect();
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            Action::Graph(a) if a.kind == GraphActionKind::Added && a.graph == g("urn:g")
        ));
        assert!(matches!(
            &actions[1],
            Action::Triple(a) if a.kind == TripleActionKind::Assert && a.triple == t("a")
        ));
        assert!(matches!(
            &actions[2],
            Action::Triple(a) if a.kind == TripleActionKind::Assert && a.triple == t("b")
        ));
    }

    #[test]
    fn add_existing_graph_merges() {
        let mut collection = GraphCollection::new();
        collection.add_graph(Graph::with_triples(g("urn:g"), [t("a")]));
        collection.log_mut().drain();

        collection.add_graph(Graph::with_triples(g("urn:g"), [t("a"), t("b")]));

        assert_eq!(collection.get(&g("urn:g")).expect("graph").len(), 2);
        let effective: Vec<_> = collection
            .log()
            .iter()
            .map(|a| match a {
                Action::Triple(a) => a.effective,
                Action::Graph(_) => true,
            })
            .collect();
        assert_eq!(effective, vec![false, true]);
    }

    #[test]
    fn remove_graph_captures_snapshot() {
        let mut collection = GraphCollection::new();
        collection.add_graph(Graph::with_triples(g("urn:g"), [t("a")]));
        collection.log_mut().drain();

        let removed = collection.remove_graph(&g("urn:g")).expect("remove");
        assert_eq!(removed.len(), 1);
        assert!(!collection.contains(&g("urn:g")));

        match collection.log().iter().next() {
            Some(Action::Graph(action)) => {
                assert_eq!(action.kind, GraphActionKind::Deleted);
                assert_eq!(action.snapshot.as_ref(), Some(&removed));
            }
            other => unreachable!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn remove_absent_graph_fails_without_recording() {
        let mut collection = GraphCollection::new();
        let result = collection.remove_graph(&g("urn:missing"));
        assert!(matches!(result, Err(StageError::GraphNotFound(_))));
        assert!(collection.log().is_synced());
    }

    #[test]
    fn get_absent_graph_fails() {
        let collection = GraphCollection::new();
        assert!(matches!(
            collection.get(&GraphName::Default),
            Err(StageError::GraphNotFound(GraphName::Default))
        ));
    }

    #[test]
    fn assert_into_absent_graph_creates_it() {
        let mut collection = GraphCollection::new();
        collection.assert(&GraphName::Default, t("a"));

        assert!(collection.contains(&GraphName::Default));
        assert_eq!(collection.log().len(), 2);
        assert_eq!(
            collection.log().last_graph_action(&GraphName::Default),
            Some(GraphActionKind::Added)
        );
    }

    #[test]
    fn redundant_mutations_still_record() {
        let mut collection = GraphCollection::new();
        collection.assert(&g("urn:g"), t("a"));
        collection.assert(&g("urn:g"), t("a"));
        collection.retract(&g("urn:g"), t("missing"));
        collection.retract(&g("urn:other"), t("a"));

        // Added + 4 triple actions
        assert_eq!(collection.log().len(), 5);
        assert!(!collection.contains(&g("urn:other")));
    }

    #[test]
    fn applying_guard_suppresses_and_restores() {
        let mut collection = GraphCollection::new();
        {
            let mut applying = collection.applying();
            applying.assert(&g("urn:g"), t("a"));
            applying.retract(&g("urn:g"), t("a"));
            applying.add_graph(Graph::new(g("urn:h")));
            assert_eq!(applying.log().mode(), CoordinatorMode::Applying);
        }
        assert!(collection.log().is_synced());
        assert_eq!(collection.log().mode(), CoordinatorMode::Recording);

        collection.assert(&g("urn:g"), t("b"));
        assert_eq!(collection.log().len(), 1);
    }
}
