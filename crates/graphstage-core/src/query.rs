//! # Query Module
//!
//! Structured query and update types for backend-delegated execution.
//!
//! Queries are triple patterns; updates are typed data commands. No query
//! language is parsed here. A backend that can evaluate these natively
//! exposes [`QueryableStorage`]; any other backend is served by an
//! [`UpdateProcessor`] that decomposes the request into plain
//! [`StorageProvider`] calls.

use crate::graph::Graph;
use crate::storage::StorageProvider;
use crate::{GraphName, Quad, StageError, Term, Triple};
use serde::{Deserialize, Serialize};

// =============================================================================
// QUERY
// =============================================================================

/// A triple pattern; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriplePattern {
    /// Restrict to one graph. `None` searches every graph.
    pub graph: Option<GraphName>,
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
}

impl TriplePattern {
    /// Pattern matching every triple in every graph.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to one graph.
    #[must_use]
    pub fn in_graph(mut self, graph: GraphName) -> Self {
        self.graph = Some(graph);
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Check a triple against the subject/predicate/object constraints.
    #[must_use]
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().is_none_or(|s| s == &triple.subject)
            && self.predicate.as_ref().is_none_or(|p| p == &triple.predicate)
            && self.object.as_ref().is_none_or(|o| o == &triple.object)
    }

    /// Check whether this pattern applies to a graph.
    #[must_use]
    pub fn covers(&self, graph: &GraphName) -> bool {
        self.graph.as_ref().is_none_or(|g| g == graph)
    }
}

/// Result of a pattern query: matching quads in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResults {
    pub quads: Vec<Quad>,
}

impl QueryResults {
    /// Collect matches of `pattern` from a sequence of graphs.
    pub fn from_graphs<'a>(
        graphs: impl IntoIterator<Item = &'a Graph>,
        pattern: &TriplePattern,
    ) -> Self {
        let mut quads: Vec<Quad> = graphs
            .into_iter()
            .filter(|graph| pattern.covers(graph.name()))
            .flat_map(|graph| {
                graph
                    .matching(pattern)
                    .map(|triple| Quad::new(graph.name().clone(), triple.clone()))
            })
            .collect();
        quads.sort();
        Self { quads }
    }

    /// Number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Check if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// A data update against a single graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UpdateCommand {
    /// Add triples, creating the graph if needed.
    InsertData { graph: GraphName, triples: Vec<Triple> },
    /// Remove triples.
    DeleteData { graph: GraphName, triples: Vec<Triple> },
    /// Remove every triple, keeping the graph.
    Clear { graph: GraphName },
    /// Remove the graph itself.
    Drop { graph: GraphName },
}

impl UpdateCommand {
    /// The graph this command changes.
    #[must_use]
    pub fn graph(&self) -> &GraphName {
        match self {
            Self::InsertData { graph, .. }
            | Self::DeleteData { graph, .. }
            | Self::Clear { graph }
            | Self::Drop { graph } => graph,
        }
    }
}

// =============================================================================
// CAPABILITY TRAITS
// =============================================================================

/// A backend that evaluates queries and updates itself.
pub trait QueryableStorage {
    /// Evaluate a pattern query.
    fn query(&self, pattern: &TriplePattern) -> Result<QueryResults, StageError>;

    /// Apply an update.
    fn update(&mut self, command: &UpdateCommand) -> Result<(), StageError>;
}

/// Executes queries and updates for backends that are not queryable,
/// using only the [`StorageProvider`] surface.
pub trait UpdateProcessor: Send + Sync {
    fn query(
        &self,
        provider: &dyn StorageProvider,
        pattern: &TriplePattern,
    ) -> Result<QueryResults, StageError>;

    fn update(
        &self,
        provider: &mut dyn StorageProvider,
        command: &UpdateCommand,
    ) -> Result<(), StageError>;
}

/// Decomposes queries and updates into load/save/update/delete calls,
/// honouring the provider's declared capabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericUpdateProcessor;

impl GenericUpdateProcessor {
    /// Load a graph, treating an absent graph as empty.
    fn load_or_empty(
        provider: &dyn StorageProvider,
        graph: &GraphName,
    ) -> Result<Graph, StageError> {
        match provider.load_graph(graph) {
            Ok(loaded) => Ok(loaded),
            Err(StageError::GraphNotFound(_)) => Ok(Graph::new(graph.clone())),
            Err(e) => Err(e),
        }
    }
}

impl UpdateProcessor for GenericUpdateProcessor {
    fn query(
        &self,
        provider: &dyn StorageProvider,
        pattern: &TriplePattern,
    ) -> Result<QueryResults, StageError> {
        let names = match &pattern.graph {
            Some(graph) => vec![graph.clone()],
            None => {
                if !provider.capabilities().supports_list_graphs {
                    return Err(StageError::Unsupported(
                        "querying all graphs requires a backend that can list graphs".to_string(),
                    ));
                }
                provider.list_graphs()?
            }
        };

        let mut graphs = Vec::with_capacity(names.len());
        for name in &names {
            graphs.push(Self::load_or_empty(provider, name)?);
        }
        Ok(QueryResults::from_graphs(&graphs, pattern))
    }

    fn update(
        &self,
        provider: &mut dyn StorageProvider,
        command: &UpdateCommand,
    ) -> Result<(), StageError> {
        let capabilities = provider.capabilities();
        if capabilities.read_only {
            return Err(StageError::Unsupported(
                "backend is read-only".to_string(),
            ));
        }

        match command {
            UpdateCommand::InsertData { graph, triples } => {
                if capabilities.supports_incremental_update {
                    provider.update_graph(graph, Some(triples.as_slice()), None)
                } else {
                    let mut current = Self::load_or_empty(provider, graph)?;
                    for triple in triples {
                        current.insert(triple.clone());
                    }
                    provider.save_graph(&current)
                }
            }
            UpdateCommand::DeleteData { graph, triples } => {
                if capabilities.supports_incremental_update {
                    provider.update_graph(graph, None, Some(triples.as_slice()))
                } else {
                    let mut current = Self::load_or_empty(provider, graph)?;
                    for triple in triples {
                        current.remove(triple);
                    }
                    provider.save_graph(&current)
                }
            }
            UpdateCommand::Clear { graph } => provider.save_graph(&Graph::new(graph.clone())),
            UpdateCommand::Drop { graph } => {
                if capabilities.supports_delete_graph {
                    provider.delete_graph(graph)
                } else {
                    Err(StageError::Unsupported(format!(
                        "backend cannot delete graph {}",
                        graph
                    )))
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
