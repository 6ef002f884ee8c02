//! # Property-Based Tests
//!
//! Random mutation sequences against a seeded store, checking that:
//! - Flush leaves the backend equal to the in-memory view
//! - Discard restores the previous view exactly, without backend calls
//! - the sync gate tracks the log

#![allow(clippy::unwrap_used, clippy::panic)]

use graphstage_core::{
    BackendCapabilities, Coordinator, Graph, GraphName, MemoryStore, StageError, Triple,
    TriplePattern,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

// =============================================================================
// OPERATION MODEL
// =============================================================================

const GRAPHS: usize = 3;
const SUBJECTS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    AddGraph(usize, Vec<usize>),
    RemoveGraph(usize),
    Assert(usize, usize),
    Retract(usize, usize),
}

fn graph_name(index: usize) -> GraphName {
    match index {
        0 => GraphName::Default,
        n => GraphName::named(format!("urn:g{}", n)),
    }
}

fn triple(index: usize) -> Triple {
    Triple::new(format!("ex:s{}", index), "ex:p", "ex:o")
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => (0..GRAPHS, vec(0..SUBJECTS, 0..3)).prop_map(|(g, ts)| Op::AddGraph(g, ts)),
        1 => (0..GRAPHS).prop_map(Op::RemoveGraph),
        4 => (0..GRAPHS, 0..SUBJECTS).prop_map(|(g, t)| Op::Assert(g, t)),
        3 => (0..GRAPHS, 0..SUBJECTS).prop_map(|(g, t)| Op::Retract(g, t)),
    ]
}

/// Backend content before any mutation: g1 holds s0, the default graph holds s1.
fn seeded(capabilities: BackendCapabilities) -> MemoryStore {
    MemoryStore::with_graphs(
        capabilities,
        [
            Graph::with_triples(graph_name(1), [triple(0)]),
            Graph::with_triples(graph_name(0), [triple(1)]),
        ],
    )
}

fn apply(coordinator: &mut Coordinator<MemoryStore>, op: &Op) {
    let result = match op {
        Op::AddGraph(g, ts) => coordinator.add_graph(Graph::with_triples(
            graph_name(*g),
            ts.iter().map(|&t| triple(t)),
        )),
        Op::RemoveGraph(g) => coordinator.remove_graph(&graph_name(*g)).map(|_| ()),
        Op::Assert(g, t) => coordinator.assert(&graph_name(*g), triple(*t)),
        Op::Retract(g, t) => coordinator.retract(&graph_name(*g), triple(*t)),
    };
    match result {
        Ok(()) | Err(StageError::GraphNotFound(_)) => {}
        Err(e) => panic!("unexpected error for {:?}: {}", op, e),
    }
}

/// The combined view over every graph name in the universe.
fn view(coordinator: &mut Coordinator<MemoryStore>) -> BTreeMap<GraphName, Graph> {
    let mut graphs = BTreeMap::new();
    for index in 0..GRAPHS {
        let name = graph_name(index);
        match coordinator.graph(&name) {
            Ok(graph) => {
                graphs.insert(name, graph.clone());
            }
            Err(StageError::GraphNotFound(_)) => {}
            Err(e) => panic!("unexpected error reading {}: {}", name, e),
        }
    }
    graphs
}

fn stored(store: &MemoryStore) -> BTreeMap<GraphName, Graph> {
    store
        .graphs()
        .map(|graph| (graph.name().clone(), graph.clone()))
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// After Flush on a fully capable backend, backend content equals the view.
    #[test]
    fn commit_equivalence_incremental(ops in vec(op(), 0..40)) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::full()));
        for op in &ops {
            apply(&mut coordinator, op);
        }
        let expected = view(&mut coordinator);

        coordinator.flush().expect("flush");
        prop_assert!(coordinator.is_synced());
        prop_assert_eq!(stored(coordinator.backend()), expected);
    }

    /// Same property for a backend that only saves whole graphs.
    #[test]
    fn commit_equivalence_graph_level(ops in vec(op(), 0..40)) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::graph_level()));
        for op in &ops {
            apply(&mut coordinator, op);
        }
        let expected = view(&mut coordinator);

        coordinator.flush().expect("flush");
        prop_assert_eq!(stored(coordinator.backend()), expected);
    }

    /// Discard restores the previous view and makes zero backend calls.
    #[test]
    fn exact_rollback(
        committed in vec(op(), 0..20),
        staged in vec(op(), 0..40),
    ) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::full()));
        for op in &committed {
            apply(&mut coordinator, op);
        }
        coordinator.flush().expect("flush");

        let before = view(&mut coordinator);
        for op in &staged {
            apply(&mut coordinator, op);
        }

        let calls = coordinator.backend().call_count();
        let pending = coordinator.pending();
        let report = coordinator.discard();
        prop_assert_eq!(coordinator.backend().call_count(), calls);
        prop_assert_eq!(report.actions, pending);
        prop_assert!(coordinator.is_synced());
        prop_assert_eq!(view(&mut coordinator), before);
    }

    /// Rollback is capability-independent: a read-only backend rolls back too.
    #[test]
    fn rollback_on_read_only_backend(ops in vec(op(), 1..30)) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::read_only()));
        let before = view(&mut coordinator);
        for op in &ops {
            apply(&mut coordinator, op);
        }
        coordinator.discard();

        prop_assert_eq!(view(&mut coordinator), before);
        prop_assert!(coordinator.backend().journal().is_empty());
    }

    /// The gate is closed exactly while the log is non-empty.
    #[test]
    fn sync_gate_tracks_log(ops in vec(op(), 0..20), settle_by_flush in any::<bool>()) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::full()));
        for op in &ops {
            apply(&mut coordinator, op);
        }

        let gated = coordinator.query(&TriplePattern::any());
        if coordinator.pending() > 0 {
            prop_assert!(matches!(gated, Err(StageError::NotSynced)));
        } else {
            prop_assert!(gated.is_ok());
        }

        if settle_by_flush {
            coordinator.flush().expect("flush");
        } else {
            coordinator.discard();
        }
        prop_assert!(coordinator.query(&TriplePattern::any()).is_ok());
    }

    /// A second Flush right after the first sends nothing.
    #[test]
    fn flush_is_idempotent(ops in vec(op(), 0..30)) {
        let mut coordinator = Coordinator::new(seeded(BackendCapabilities::full()));
        for op in &ops {
            apply(&mut coordinator, op);
        }
        coordinator.flush().expect("first flush");
        let journal = coordinator.backend().journal().len();

        let report = coordinator.flush().expect("second flush");
        prop_assert_eq!(report.actions, 0);
        prop_assert_eq!(coordinator.backend().journal().len(), journal);
    }
}
