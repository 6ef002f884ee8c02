//! # graphstage
//!
//! Library half of the graphstage binary: configuration, the HTTP API and
//! the CLI commands, all driving one `graphstage_core::Coordinator`.
//!
//! Exposed as a library so integration tests can build the router and
//! call commands directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::AppError;
