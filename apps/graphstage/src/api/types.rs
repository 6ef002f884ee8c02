//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Graph names travel as an optional string: absent or `null` is the
//! default graph, anything else a named graph.

use crate::error::AppError;
use graphstage_core::{
    BackendCapabilities, Graph, GraphName, Quad, Term, Triple, TriplePattern, UpdateCommand,
    primitives::MAX_TRIPLES_PER_REQUEST,
};
use serde::{Deserialize, Serialize};

fn graph_name(name: Option<&String>) -> GraphName {
    GraphName::from_optional(name.map(String::as_str))
}

fn graph_label(name: &GraphName) -> Option<String> {
    name.as_str().map(str::to_string)
}

/// Convert and validate a batch of triples, enforcing the per-request limit.
fn to_triples(triples: &[TripleJson]) -> Result<Vec<Triple>, AppError> {
    if triples.len() > MAX_TRIPLES_PER_REQUEST {
        return Err(AppError::bad_request(format!(
            "triple count {} exceeds maximum {}",
            triples.len(),
            MAX_TRIPLES_PER_REQUEST
        )));
    }
    triples.iter().map(TripleJson::to_triple).collect()
}

// =============================================================================
// SHARED SHAPES
// =============================================================================

/// A triple as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleJson {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl TripleJson {
    /// Convert to a `Triple`, validating every term.
    pub fn to_triple(&self) -> Result<Triple, AppError> {
        let triple = Triple::new(
            self.subject.as_str(),
            self.predicate.as_str(),
            self.object.as_str(),
        );
        triple.validate()?;
        Ok(triple)
    }
}

impl From<&Triple> for TripleJson {
    fn from(triple: &Triple) -> Self {
        Self {
            subject: triple.subject.to_string(),
            predicate: triple.predicate.to_string(),
            object: triple.object.to_string(),
        }
    }
}

/// A triple with the graph it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadJson {
    pub graph: Option<String>,
    #[serde(flatten)]
    pub triple: TripleJson,
}

impl From<&Quad> for QuadJson {
    fn from(quad: &Quad) -> Self {
        Self {
            graph: graph_label(&quad.graph),
            triple: TripleJson::from(&quad.triple),
        }
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Coordinator status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub synced: bool,
    pub pending: usize,
    pub graphs_in_memory: usize,
    pub persistent: bool,
    pub capabilities: BackendCapabilities,
}

// =============================================================================
// GRAPHS
// =============================================================================

/// Names in the combined view; `null` is the default graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphListResponse {
    pub graphs: Vec<Option<String>>,
}

impl GraphListResponse {
    #[must_use]
    pub fn new(names: &[GraphName]) -> Self {
        Self {
            graphs: names.iter().map(graph_label).collect(),
        }
    }
}

/// Selects one graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRequest {
    #[serde(default)]
    pub graph: Option<String>,
}

impl GraphRequest {
    #[must_use]
    pub fn graph_name(&self) -> GraphName {
        graph_name(self.graph.as_ref())
    }
}

/// Content of one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub graph: Option<String>,
    pub triples: Vec<TripleJson>,
}

impl From<&Graph> for GraphResponse {
    fn from(graph: &Graph) -> Self {
        Self {
            graph: graph_label(graph.name()),
            triples: graph.triples().map(TripleJson::from).collect(),
        }
    }
}

/// Add (or replace) a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddGraphRequest {
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default)]
    pub triples: Vec<TripleJson>,
}

impl AddGraphRequest {
    /// Build the graph, validating every triple.
    pub fn to_graph(&self) -> Result<Graph, AppError> {
        Ok(Graph::with_triples(
            graph_name(self.graph.as_ref()),
            to_triples(&self.triples)?,
        ))
    }
}

/// Assert or retract one triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleRequest {
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(flatten)]
    pub triple: TripleJson,
}

impl TripleRequest {
    #[must_use]
    pub fn graph_name(&self) -> GraphName {
        graph_name(self.graph.as_ref())
    }
}

/// Result of a staged mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    /// Staged actions after the mutation.
    pub pending: usize,
    /// Triples in the removed graph, for `/graph/remove`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_triples: Option<usize>,
}

impl MutationResponse {
    #[must_use]
    pub fn staged(pending: usize) -> Self {
        Self {
            success: true,
            pending,
            removed_triples: None,
        }
    }

    #[must_use]
    pub fn removed(pending: usize, triples: usize) -> Self {
        Self {
            success: true,
            pending,
            removed_triples: Some(triples),
        }
    }
}

// =============================================================================
// QUERY / UPDATE
// =============================================================================

/// Pattern query; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Restrict to one graph. Omit to search all graphs.
    #[serde(default)]
    pub graph: Option<String>,
    /// With `graph` omitted, restrict to the default graph.
    #[serde(default)]
    pub default_graph: bool,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
}

impl QueryRequest {
    #[must_use]
    pub fn to_pattern(&self) -> TriplePattern {
        let mut pattern = TriplePattern::any();
        if let Some(graph) = &self.graph {
            pattern = pattern.in_graph(GraphName::named(graph.as_str()));
        } else if self.default_graph {
            pattern = pattern.in_graph(GraphName::Default);
        }
        if let Some(subject) = &self.subject {
            pattern = pattern.with_subject(Term::new(subject.as_str()));
        }
        if let Some(predicate) = &self.predicate {
            pattern = pattern.with_predicate(Term::new(predicate.as_str()));
        }
        if let Some(object) = &self.object {
            pattern = pattern.with_object(Term::new(object.as_str()));
        }
        pattern
    }
}

/// Query matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub count: usize,
    pub results: Vec<QuadJson>,
}

impl QueryResponse {
    #[must_use]
    pub fn new(quads: &[Quad]) -> Self {
        Self {
            count: quads.len(),
            results: quads.iter().map(QuadJson::from).collect(),
        }
    }
}

/// Update operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOp {
    InsertData,
    DeleteData,
    Clear,
    Drop,
}

/// Update against one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub op: UpdateOp,
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default)]
    pub triples: Vec<TripleJson>,
}

impl UpdateRequest {
    /// Convert to an `UpdateCommand`, validating triples.
    pub fn to_command(&self) -> Result<UpdateCommand, AppError> {
        let graph = graph_name(self.graph.as_ref());
        let command = match self.op {
            UpdateOp::InsertData => UpdateCommand::InsertData {
                graph,
                triples: to_triples(&self.triples)?,
            },
            UpdateOp::DeleteData => UpdateCommand::DeleteData {
                graph,
                triples: to_triples(&self.triples)?,
            },
            UpdateOp::Clear => UpdateCommand::Clear { graph },
            UpdateOp::Drop => UpdateCommand::Drop { graph },
        };
        Ok(command)
    }
}

/// Result of an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub graph: Option<String>,
}

impl UpdateResponse {
    #[must_use]
    pub fn applied(graph: &GraphName) -> Self {
        Self {
            success: true,
            graph: graph_label(graph),
        }
    }
}

// =============================================================================
// OPERATION SCRIPTS
// =============================================================================

/// One step of an operation script (`graphstage apply`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    AddGraph(AddGraphRequest),
    RemoveGraph(GraphRequest),
    Assert(TripleRequest),
    Retract(TripleRequest),
}
