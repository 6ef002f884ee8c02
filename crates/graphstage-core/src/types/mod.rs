//! # Core Type Definitions
//!
//! This module contains the value types shared by every part of graphstage:
//! - Graph identifiers (`GraphName`)
//! - Statement components (`Term`, `Triple`, `Quad`)
//! - Error types (`StageError`)
//!
//! ## Ordering Guarantees
//!
//! All types in this module implement `Ord` so they can live in
//! `BTreeMap`/`BTreeSet` and iterate in a deterministic order.

use crate::primitives::MAX_TERM_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH NAME
// =============================================================================

/// Identifier of a graph inside a store.
///
/// `Default` is the reserved sentinel for the unnamed default graph.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum GraphName {
    /// The unnamed default graph.
    #[default]
    Default,
    /// A graph identified by a name (typically an IRI).
    Named(String),
}

impl GraphName {
    /// Create a named graph identifier.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Map an optional name onto a graph identifier, `None` being the default graph.
    #[must_use]
    pub fn from_optional(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::named(name),
            None => Self::Default,
        }
    }

    /// Check whether this is the default graph.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// The name of a named graph, `None` for the default graph.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Named(name) => write!(f, "<{}>", name),
        }
    }
}

// =============================================================================
// TRIPLE COMPONENTS
// =============================================================================

/// An opaque statement component.
///
/// The engine never interprets terms; it only compares and orders them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term(pub String);

impl Term {
    /// Create a new term from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the term as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `(subject, predicate, object)` statement.
///
/// A triple carries no graph of its own; it is always handled in the
/// context of one `GraphName`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    /// Create a new triple.
    #[must_use]
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl Triple {
    /// Check every term is non-empty and within `MAX_TERM_LENGTH`.
    pub fn validate(&self) -> Result<(), StageError> {
        for (position, term) in [
            ("subject", &self.subject),
            ("predicate", &self.predicate),
            ("object", &self.object),
        ] {
            if term.0.is_empty() {
                return Err(StageError::InvalidInput(format!("empty {}", position)));
            }
            if term.0.len() > MAX_TERM_LENGTH {
                return Err(StageError::InvalidInput(format!(
                    "{} exceeds {} bytes",
                    position, MAX_TERM_LENGTH
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A triple together with the graph it was found in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub graph: GraphName,
    pub triple: Triple,
}

impl Quad {
    /// Create a new quad.
    #[must_use]
    pub fn new(graph: GraphName, triple: Triple) -> Self {
        Self { graph, triple }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in graphstage.
///
/// - No silent failures
/// - Use `Result<T, StageError>` for fallible operations
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum StageError {
    /// A backend-dependent operation was attempted while actions are still staged.
    /// Call `flush()` or `discard()` first.
    #[error("Store is not synced: flush or discard staged actions first")]
    NotSynced,

    /// The backend's capability set cannot perform the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A storage provider call failed.
    #[error("Backend failure: {0}")]
    BackendFailure(String),

    /// The requested graph does not exist.
    #[error("Graph not found: {0}")]
    GraphNotFound(GraphName),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Caller supplied input that cannot be accepted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn default_graph_sorts_first() {
        let mut names = BTreeSet::new();
        names.insert(GraphName::named("urn:b"));
        names.insert(GraphName::Default);
        names.insert(GraphName::named("urn:a"));

        let ordered: Vec<_> = names.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                GraphName::Default,
                GraphName::named("urn:a"),
                GraphName::named("urn:b")
            ]
        );
    }

    #[test]
    fn graph_name_from_optional() {
        assert!(GraphName::from_optional(None).is_default());
        assert_eq!(
            GraphName::from_optional(Some("urn:g")).as_str(),
            Some("urn:g")
        );
    }

    #[test]
    fn triple_display() {
        let triple = Triple::new("ex:s", "ex:p", "ex:o");
        assert_eq!(triple.to_string(), "ex:s ex:p ex:o .");
    }

    #[test]
    fn triple_validation_limits() {
        assert!(Triple::new("ex:s", "ex:p", "ex:o").validate().is_ok());
        assert!(matches!(
            Triple::new("", "ex:p", "ex:o").validate(),
            Err(StageError::InvalidInput(_))
        ));
        let long = "x".repeat(MAX_TERM_LENGTH + 1);
        assert!(Triple::new("ex:s", "ex:p", long).validate().is_err());
    }

    #[test]
    fn error_messages_name_the_graph() {
        let err = StageError::GraphNotFound(GraphName::named("urn:g"));
        assert_eq!(err.to_string(), "Graph not found: <urn:g>");
    }
}
