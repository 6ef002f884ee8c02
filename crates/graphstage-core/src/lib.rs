//! # graphstage-core
//!
//! Transactional in-memory staging over capability-limited triple stores.
//!
//! Callers mutate an in-memory view of named graphs. Every mutation is
//! recorded in an ordered action log, and later either:
//! - **flushed** to a storage provider, batched to keep round-trips low, or
//! - **discarded**, undoing the log in memory with no backend interaction.
//!
//! ## Layout
//!
//! - `types`: graph names, terms, triples, errors
//! - `graph`, `collection`, `log`: the working view and what changed in it
//! - `batch`: the planner shared by Flush and Discard
//! - `coordinator`, `scope`: the Flush/Discard engine and scoped units of work
//! - `storage`: the provider trait plus in-memory and redb providers
//! - `query`: pattern queries and typed updates, native or decomposed
//! - `formats`: binary encoding of graphs
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no async and no network dependencies
//! - Deterministic iteration: `BTreeMap`/`BTreeSet` throughout
//! - All fallible operations return `Result<T, StageError>`

// =============================================================================
// MODULES
// =============================================================================

pub mod batch;
pub mod collection;
pub mod coordinator;
pub mod formats;
pub mod graph;
pub mod log;
pub mod primitives;
pub mod query;
pub mod scope;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{GraphName, Quad, StageError, Term, Triple};

// =============================================================================
// RE-EXPORTS: Staging Engine
// =============================================================================

pub use batch::{BatchPlanner, Step, TripleBatch};
pub use collection::GraphCollection;
pub use coordinator::{Coordinator, DiscardReport, FlushReport};
pub use graph::Graph;
pub use log::{
    Action, ActionLog, CoordinatorMode, GraphAction, GraphActionKind, TripleAction,
    TripleActionKind,
};
pub use scope::Scope;

// =============================================================================
// RE-EXPORTS: Storage and Query
// =============================================================================

pub use query::{
    GenericUpdateProcessor, QueryResults, QueryableStorage, TriplePattern, UpdateCommand,
    UpdateProcessor,
};
pub use storage::{
    BackendCall, BackendCapabilities, MemoryStore, RedbStore, StorageBackend, StorageProvider,
};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::persistence::{MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader};
pub use formats::{graph_from_bytes, graph_to_bytes};
