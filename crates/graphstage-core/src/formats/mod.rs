//! # Formats
//!
//! Byte-level encodings of graphs.
//!
//! `persistence` is the only format: header + postcard payload, used for
//! redb values and for CLI export/import files.

pub mod persistence;

pub use persistence::{graph_from_bytes, graph_to_bytes};
