//! # Graph Content
//!
//! A named set of triples. This is the unit that storage providers save,
//! load and delete, and the value the in-memory collection holds per name.
//!
//! Triples are kept in a `BTreeSet` so iteration order is deterministic.

use crate::query::TriplePattern;
use crate::{GraphName, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named set of triples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// The graph's name.
    name: GraphName,
    /// The statements in this graph.
    triples: BTreeSet<Triple>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new(name: GraphName) -> Self {
        Self {
            name,
            triples: BTreeSet::new(),
        }
    }

    /// Create a graph holding the given triples.
    #[must_use]
    pub fn with_triples(name: GraphName, triples: impl IntoIterator<Item = Triple>) -> Self {
        Self {
            name,
            triples: triples.into_iter().collect(),
        }
    }

    /// The graph's name.
    #[must_use]
    pub fn name(&self) -> &GraphName {
        &self.name
    }

    /// All triples in deterministic order.
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Consume the graph, returning its name and triples.
    #[must_use]
    pub fn into_parts(self) -> (GraphName, BTreeSet<Triple>) {
        (self.name, self.triples)
    }

    /// Number of triples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Check if the graph holds no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Check if the graph holds a triple.
    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Insert a triple. Returns `true` if it was not already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    /// Remove a triple. Returns `true` if it was present.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    /// Remove every triple, keeping the name.
    pub fn clear(&mut self) {
        self.triples.clear();
    }

    /// Triples matching the subject/predicate/object constraints of a pattern.
    ///
    /// The pattern's graph constraint is not consulted here; callers decide
    /// which graphs a pattern applies to.
    pub fn matching<'a>(&'a self, pattern: &'a TriplePattern) -> impl Iterator<Item = &'a Triple> {
        self.triples.iter().filter(move |t| pattern.matches(t))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Term;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(s, p, o)
    }

    #[test]
    fn insert_reports_novelty() {
        let mut graph = Graph::new(GraphName::Default);
        assert!(graph.insert(t("a", "b", "c")));
        assert!(!graph.insert(t("a", "b", "c")));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let mut graph = Graph::with_triples(GraphName::named("urn:g"), [t("a", "b", "c")]);
        assert!(graph.remove(&t("a", "b", "c")));
        assert!(!graph.remove(&t("a", "b", "c")));
        assert!(graph.is_empty());
    }

    #[test]
    fn triples_iterate_in_order() {
        let graph = Graph::with_triples(
            GraphName::Default,
            [t("c", "p", "o"), t("a", "p", "o"), t("b", "p", "o")],
        );
        let subjects: Vec<_> = graph.triples().map(|t| t.subject.as_str()).collect();
        assert_eq!(subjects, vec!["a", "b", "c"]);
    }

    #[test]
    fn matching_filters_by_pattern() {
        let graph = Graph::with_triples(
            GraphName::Default,
            [t("a", "knows", "b"), t("a", "name", "Alice"), t("b", "knows", "c")],
        );
        let pattern = TriplePattern::any().with_predicate(Term::new("knows"));
        assert_eq!(graph.matching(&pattern).count(), 2);
    }
}
