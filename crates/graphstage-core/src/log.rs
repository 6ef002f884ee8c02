//! # Action Log
//!
//! The ordered record of staged mutations awaiting Flush or Discard.
//!
//! - One entry per observed mutation, in the order the collection saw them
//! - Never reordered while recording
//! - Emptied only by `drain()` (Flush or Discard)
//!
//! The log records intent, not delta: asserting a triple that is already
//! present still produces an entry. `TripleAction::effective` remembers
//! whether the mutation changed data so that rollback can stay exact.

use crate::graph::Graph;
use crate::{GraphName, Triple};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// =============================================================================
// ACTIONS
// =============================================================================

/// Kind of a graph-level action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphActionKind {
    Added,
    Deleted,
}

/// A graph was created in, or removed from, the working view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAction {
    pub graph: GraphName,
    pub kind: GraphActionKind,
    /// Content of the graph at deletion time. Always `Some` for `Deleted`.
    pub snapshot: Option<Graph>,
}

impl GraphAction {
    /// A graph was added.
    #[must_use]
    pub fn added(graph: GraphName) -> Self {
        Self {
            graph,
            kind: GraphActionKind::Added,
            snapshot: None,
        }
    }

    /// A graph was deleted; `snapshot` is its content just before removal.
    #[must_use]
    pub fn deleted(snapshot: Graph) -> Self {
        Self {
            graph: snapshot.name().clone(),
            kind: GraphActionKind::Deleted,
            snapshot: Some(snapshot),
        }
    }
}

/// Kind of a triple-level action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripleActionKind {
    Assert,
    Retract,
}

impl TripleActionKind {
    /// The kind that undoes this one.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Assert => Self::Retract,
            Self::Retract => Self::Assert,
        }
    }
}

/// A triple was asserted into, or retracted from, a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleAction {
    pub graph: GraphName,
    pub triple: Triple,
    pub kind: TripleActionKind,
    /// Whether the mutation changed in-memory data when it was recorded.
    pub effective: bool,
}

impl TripleAction {
    #[must_use]
    pub fn assert(graph: GraphName, triple: Triple, effective: bool) -> Self {
        Self {
            graph,
            triple,
            kind: TripleActionKind::Assert,
            effective,
        }
    }

    #[must_use]
    pub fn retract(graph: GraphName, triple: Triple, effective: bool) -> Self {
        Self {
            graph,
            triple,
            kind: TripleActionKind::Retract,
            effective,
        }
    }
}

/// One entry of the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Graph(GraphAction),
    Triple(TripleAction),
}

impl From<GraphAction> for Action {
    fn from(action: GraphAction) -> Self {
        Self::Graph(action)
    }
}

impl From<TripleAction> for Action {
    fn from(action: TripleAction) -> Self {
        Self::Triple(action)
    }
}

// =============================================================================
// COORDINATOR MODE
// =============================================================================

/// Whether collection mutations are being recorded.
///
/// The coordinator switches to `Applying` while it replays or rolls back the
/// log (and while it loads graphs from the backend), so its own mutations
/// are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinatorMode {
    #[default]
    Recording,
    Applying,
}

// =============================================================================
// ACTION LOG
// =============================================================================

/// Append-only, strictly ordered sequence of staged actions.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: VecDeque<Action>,
    mode: CoordinatorMode,
}

impl ActionLog {
    /// Create an empty log in `Recording` mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action. Returns `false` (and drops it) while `Applying`.
    pub fn record(&mut self, action: impl Into<Action>) -> bool {
        if self.mode == CoordinatorMode::Applying {
            return false;
        }
        self.entries.push_back(action.into());
        true
    }

    /// `true` iff nothing is staged.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of staged actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staged actions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.entries.iter()
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> CoordinatorMode {
        self.mode
    }

    /// Check if mutations are currently being recorded.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.mode == CoordinatorMode::Recording
    }

    pub(crate) fn set_mode(&mut self, mode: CoordinatorMode) {
        self.mode = mode;
    }

    /// Take every staged action, leaving the log empty.
    pub fn drain(&mut self) -> VecDeque<Action> {
        std::mem::take(&mut self.entries)
    }

    /// The most recent graph-level action staged for `graph`, if any.
    #[must_use]
    pub fn last_graph_action(&self, graph: &GraphName) -> Option<GraphActionKind> {
        self.entries.iter().rev().find_map(|action| match action {
            Action::Graph(action) if &action.graph == graph => Some(action.kind),
            _ => None,
        })
    }

    /// Check if `graph` has a deletion staged that was not followed by a re-add.
    #[must_use]
    pub fn is_pending_delete(&self, graph: &GraphName) -> bool {
        self.last_graph_action(graph) == Some(GraphActionKind::Deleted)
    }
}

// =============================================================================
// TESTS
// =============================================================================
