//! # graphstage CLI Module
//!
//! This module implements the CLI interface for graphstage.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Write a config file and create the database
//! - `status` - Show backend and staging status
//! - `list` - List graph names
//! - `show` - Print one graph
//! - `apply` - Replay a JSON operation script in a scope
//! - `query` - Run a pattern query against the backend
//! - `export` - Export a graph to file
//! - `import` - Import a graph from file

mod commands;

use crate::config::{BackendKind, Config};
use crate::error::AppError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// graphstage - transactional staging over capability-limited triple stores
///
/// Mutations are staged in memory and either flushed to the backend in
/// batches or discarded without touching it.
#[derive(Parser, Debug)]
#[command(name = "graphstage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a graphstage.toml config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the graph database (overrides config)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Open the backend read-only (overrides config)
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Persistence format (header + postcard), importable
    Binary,
    /// JSON listing of the graph's triples
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Show backend and staging status
    Status,

    /// List graph names
    List,

    /// Print one graph
    Show {
        /// Graph name (omit for the default graph)
        #[arg(short, long)]
        graph: Option<String>,
    },

    /// Replay a JSON operation script, then flush
    Apply {
        /// Path to the script (JSON array of operations)
        #[arg(short, long)]
        file: PathBuf,

        /// Roll the script back instead of flushing
        #[arg(long)]
        discard: bool,
    },

    /// Run a pattern query against the backend
    Query {
        /// Restrict to a named graph
        #[arg(short, long)]
        graph: Option<String>,

        /// Restrict to the default graph
        #[arg(long, conflicts_with = "graph")]
        default_graph: bool,

        /// Subject to match
        #[arg(short, long)]
        subject: Option<String>,

        /// Predicate to match
        #[arg(short, long)]
        predicate: Option<String>,

        /// Object to match
        #[arg(short, long)]
        object: Option<String>,
    },

    /// Export a graph to file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Graph name (omit for the default graph)
        #[arg(short, long)]
        graph: Option<String>,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value = "binary")]
        format: ExportFormat,
    },

    /// Import a graph exported in binary format
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

impl Cli {
    /// Resolve configuration: file first, then flags on top.
    pub fn resolve_config(&self) -> Result<Config, AppError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.storage.path.clone_from(database);
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if self.read_only {
            config.storage.read_only = true;
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let mut config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => {
            cmd_init(&config, cli.config.as_deref(), force)
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::List) => cmd_list(&config, json_mode),
        Some(Commands::Show { graph }) => cmd_show(&config, json_mode, graph),
        Some(Commands::Apply { file, discard }) => cmd_apply(&config, json_mode, &file, discard),
        Some(Commands::Query {
            graph,
            default_graph,
            subject,
            predicate,
            object,
        }) => {
            let request = crate::api::QueryRequest {
                graph,
                default_graph,
                subject,
                predicate,
                object,
            };
            cmd_query(&config, json_mode, &request)
        }
        Some(Commands::Export {
            output,
            graph,
            format,
        }) => cmd_export(&config, &output, graph, format),
        Some(Commands::Import { input }) => cmd_import(&config, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "graphstage",
            "--backend",
            "memory",
            "--read-only",
            "--database",
            "other.redb",
            "status",
        ]);
        let config = cli.resolve_config().expect("config");

        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert!(config.storage.read_only);
        assert_eq!(config.storage.path, PathBuf::from("other.redb"));
    }

    #[test]
    fn apply_parses_discard_flag() {
        let cli = Cli::parse_from(["graphstage", "apply", "-f", "ops.json", "--discard"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Apply { discard: true, .. })
        ));
    }
}
