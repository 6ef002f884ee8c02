//! # Batch Planner
//!
//! Turns a drained action log into the sequence of steps that Flush sends to
//! a backend, and that Discard applies (inverted) to memory.
//!
//! The planner works strictly front to back:
//!
//! 1. A graph-level action at the head is emitted as its own step.
//! 2. A triple-level action at the head starts a window: the maximal run of
//!    consecutive triple actions. Every entry of that run belonging to the
//!    head's graph is pulled out, in order; entries for other graphs stay
//!    where they were and get their turn on a later pass.
//! 3. The pulled entries are split into batches, a new batch starting each
//!    time the kind switches between assert and retract.
//!
//! Graph-level actions act as barriers: no triple action is ever moved
//! across one, so per-graph ordering is preserved exactly while the number
//! of backend calls is bounded by the number of kind switches.

use crate::log::{Action, GraphAction, TripleAction, TripleActionKind};
use crate::{GraphName, Triple};
use std::collections::VecDeque;

/// Consecutive triple actions of one kind against one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleBatch {
    pub graph: GraphName,
    pub kind: TripleActionKind,
    pub actions: Vec<TripleAction>,
}

impl TripleBatch {
    fn new(first: TripleAction) -> Self {
        Self {
            graph: first.graph.clone(),
            kind: first.kind,
            actions: vec![first],
        }
    }

    /// The batch's triples in log order, duplicates included.
    #[must_use]
    pub fn triples(&self) -> Vec<Triple> {
        self.actions.iter().map(|a| a.triple.clone()).collect()
    }

    /// Number of actions in the batch.
    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }
}

/// One unit of work produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Graph(GraphAction),
    Batch(TripleBatch),
}

/// Lazy iterator of [`Step`]s over a queue of actions.
#[derive(Debug, Default)]
pub struct BatchPlanner {
    /// Actions not yet planned.
    queue: VecDeque<Action>,
    /// Batches formed for the current graph, not yet handed out.
    ready: VecDeque<TripleBatch>,
}

impl BatchPlanner {
    /// Plan over actions in the given order.
    #[must_use]
    pub fn new(actions: VecDeque<Action>) -> Self {
        Self {
            queue: actions,
            ready: VecDeque::new(),
        }
    }

    /// Number of actions not yet handed out in a step.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len() + self.ready.iter().map(TripleBatch::len).sum::<usize>()
    }

    /// Pull the head graph's entries out of the leading triple run and
    /// compact them into batches.
    fn plan_window(&mut self, graph: GraphName) {
        let run = self
            .queue
            .iter()
            .take_while(|action| matches!(action, Action::Triple(_)))
            .count();

        let mut left_behind = Vec::new();
        for action in self.queue.drain(..run) {
            match action {
                Action::Triple(action) if action.graph == graph => match self.ready.back_mut() {
                    Some(batch) if batch.kind == action.kind => batch.actions.push(action),
                    _ => self.ready.push_back(TripleBatch::new(action)),
                },
                other => left_behind.push(other),
            }
        }

        for action in left_behind.into_iter().rev() {
            self.queue.push_front(action);
        }
    }
}

impl Iterator for BatchPlanner {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if let Some(batch) = self.ready.pop_front() {
            return Some(Step::Batch(batch));
        }

        let window = match self.queue.front()? {
            Action::Graph(_) => None,
            Action::Triple(action) => Some(action.graph.clone()),
        };

        match window {
            Some(graph) => {
                self.plan_window(graph);
                self.ready.pop_front().map(Step::Batch)
            }
            None => match self.queue.pop_front() {
                Some(Action::Graph(action)) => Some(Step::Graph(action)),
                _ => None,
            },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::log::GraphActionKind;

    fn g(name: &str) -> GraphName {
        GraphName::named(name)
    }

    fn assert_in(graph: &str, s: &str) -> Action {
        TripleAction::assert(g(graph), Triple::new(s, "p", "o"), true).into()
    }

    fn retract_in(graph: &str, s: &str) -> Action {
        TripleAction::retract(g(graph), Triple::new(s, "p", "o"), true).into()
    }

    /// Render steps as compact strings, e.g. `g:A[a,b]` or `+g`.
    fn describe(actions: Vec<Action>) -> Vec<String> {
        BatchPlanner::new(actions.into())
            .map(|step| match step {
                Step::Graph(action) => {
                    let sign = match action.kind {
                        GraphActionKind::Added => '+',
                        GraphActionKind::Deleted => '-',
                    };
                    format!("{}{}", sign, action.graph.as_str().unwrap_or("default"))
                }
                Step::Batch(batch) => {
                    let kind = match batch.kind {
                        TripleActionKind::Assert => 'A',
                        TripleActionKind::Retract => 'R',
                    };
                    let subjects: Vec<_> = batch
                        .actions
                        .iter()
                        .map(|a| a.triple.subject.as_str().to_string())
                        .collect();
                    format!(
                        "{}:{}[{}]",
                        batch.graph.as_str().unwrap_or("default"),
                        kind,
                        subjects.join(",")
                    )
                }
            })
            .collect()
    }

    #[test]
    fn batches_split_on_kind_switch() {
        let steps = describe(vec![
            assert_in("g", "a"),
            assert_in("g", "b"),
            retract_in("g", "a"),
            assert_in("g", "c"),
        ]);
        assert_eq!(steps, vec!["g:A[a,b]", "g:R[a]", "g:A[c]"]);
    }

    #[test]
    fn other_graphs_wait_their_turn() {
        let steps = describe(vec![
            assert_in("g", "a"),
            assert_in("h", "x"),
            assert_in("g", "b"),
            retract_in("h", "y"),
            assert_in("h", "z"),
        ]);
        assert_eq!(steps, vec!["g:A[a,b]", "h:A[x]", "h:R[y]", "h:A[z]"]);
    }

    #[test]
    fn graph_actions_are_barriers() {
        let steps = describe(vec![
            assert_in("g", "a"),
            assert_in("h", "x"),
            Action::Graph(GraphAction::deleted(Graph::new(g("h")))),
            assert_in("g", "b"),
            assert_in("h", "y"),
        ]);
        assert_eq!(
            steps,
            vec!["g:A[a]", "h:A[x]", "-h", "g:A[b]", "h:A[y]"]
        );
    }

    #[test]
    fn graph_action_at_head_is_emitted_alone() {
        let steps = describe(vec![
            Action::Graph(GraphAction::added(g("g"))),
            assert_in("g", "a"),
        ]);
        assert_eq!(steps, vec!["+g", "g:A[a]"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let steps = describe(vec![assert_in("g", "a"), assert_in("g", "a")]);
        assert_eq!(steps, vec!["g:A[a,a]"]);
    }

    #[test]
    fn remaining_counts_unplanned_and_ready() {
        let mut planner = BatchPlanner::new(
            vec![
                assert_in("g", "a"),
                retract_in("g", "a"),
                assert_in("h", "b"),
            ]
            .into(),
        );
        assert_eq!(planner.remaining(), 3);
        let _ = planner.next();
        assert_eq!(planner.remaining(), 2);
        let _ = planner.next();
        let _ = planner.next();
        assert_eq!(planner.remaining(), 0);
        assert!(planner.next().is_none());
    }

    #[test]
    fn empty_log_plans_nothing() {
        assert!(describe(Vec::new()).is_empty());
    }
}
