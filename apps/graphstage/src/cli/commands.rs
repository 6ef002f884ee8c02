//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Each command opens its own coordinator over the configured backend.

use super::ExportFormat;
use crate::api::{self, GraphListResponse, GraphResponse, QueryRequest, QueryResponse, ScriptOp};
use crate::config::Config;
use crate::error::AppError;
use graphstage_core::{
    Coordinator, GraphName, MAX_PERSISTENCE_PAYLOAD_SIZE, StageError, StorageBackend,
    graph_from_bytes, graph_to_bytes,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum operation script size (100 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AppError> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(AppError::bad_request(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and check it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| {
        AppError::bad_request(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AppError::bad_request(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AppError::bad_request(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let filename = path
        .file_name()
        .ok_or_else(|| AppError::bad_request("Output path has no filename"))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open a coordinator over the configured backend.
pub fn open_coordinator(config: &Config) -> Result<Coordinator<StorageBackend>, AppError> {
    Ok(Coordinator::new(config.storage.open_backend()?))
}

/// Refuse commands that would stage writes a read-only backend never receives.
fn ensure_writable(coordinator: &Coordinator<StorageBackend>) -> Result<(), AppError> {
    if coordinator.capabilities().read_only {
        return Err(StageError::Unsupported(
            "backend is read-only; nothing would be persisted".to_string(),
        )
        .into());
    }
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), AppError> {
    let coordinator = open_coordinator(config)?;

    println!("graphstage server starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", config.server.addr());
    println!("  Backend:  {}", config.storage.backend);
    println!("  Database: {}", config.storage.path.display());
    println!("  Capabilities: {:?}", coordinator.capabilities());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config.server.addr(), coordinator).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write a config file and create the database.
pub fn cmd_init(config: &Config, path: Option<&Path>, force: bool) -> Result<(), AppError> {
    let path = path.unwrap_or(Path::new(crate::config::DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    std::fs::write(path, config.to_toml_string()?)?;
    let coordinator = open_coordinator(config)?;

    println!("Wrote {}", path.display());
    if coordinator.backend().is_persistent() {
        println!("Database ready at {}", config.storage.path.display());
    }
    Ok(())
}

// =============================================================================
// STATUS / LIST / SHOW
// =============================================================================

/// Show backend and staging status.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let coordinator = open_coordinator(config)?;
    let capabilities = coordinator.capabilities();
    let stored = match coordinator.backend_graphs() {
        Ok(names) => Some(names.len()),
        Err(StageError::Unsupported(_)) => None,
        Err(e) => return Err(e.into()),
    };

    if json_mode {
        let output = serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": config.storage.backend.to_string(),
            "capabilities": capabilities,
            "stored_graphs": stored,
            "synced": coordinator.is_synced(),
        });
        return print_json(&output);
    }

    println!("graphstage Status");
    println!("=================");
    println!("Database: {}", config.storage.path.display());
    println!("Backend:  {}", config.storage.backend);
    println!();
    println!("Read-only:          {}", capabilities.read_only);
    println!("Incremental update: {}", capabilities.supports_incremental_update);
    println!("Delete graph:       {}", capabilities.supports_delete_graph);
    println!("List graphs:        {}", capabilities.supports_list_graphs);
    match stored {
        Some(count) => println!("Stored graphs:      {}", count),
        None => println!("Stored graphs:      (backend cannot list)"),
    }

    Ok(())
}

/// List graph names.
pub fn cmd_list(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let coordinator = open_coordinator(config)?;
    let names = coordinator.backend_graphs()?;

    if json_mode {
        return print_json(&GraphListResponse::new(&names));
    }

    for name in &names {
        println!("{}", name);
    }
    println!("{} graph(s)", names.len());
    Ok(())
}

/// Print one graph.
pub fn cmd_show(config: &Config, json_mode: bool, graph: Option<String>) -> Result<(), AppError> {
    let mut coordinator = open_coordinator(config)?;
    let name = GraphName::from_optional(graph.as_deref());
    let graph = coordinator.graph(&name)?;

    if json_mode {
        return print_json(&GraphResponse::from(graph));
    }

    println!("# {} ({} triples)", name, graph.len());
    for triple in graph.triples() {
        println!("{}", triple);
    }
    Ok(())
}

// =============================================================================
// APPLY COMMAND
// =============================================================================

/// Parse an operation script.
pub fn parse_script(contents: &[u8]) -> Result<Vec<ScriptOp>, AppError> {
    Ok(serde_json::from_slice(contents)?)
}

/// Apply a script in a scope; returns the number of staged actions.
///
/// The scope flushes on exit, or discards when `discard` is set. A failing
/// step still leaves the steps before it settled. Without `discard`, a
/// read-only backend is rejected before anything is staged.
pub fn apply_script(
    coordinator: &mut Coordinator<StorageBackend>,
    ops: &[ScriptOp],
    discard: bool,
) -> Result<usize, AppError> {
    if !discard {
        ensure_writable(coordinator)?;
    }
    coordinator.scoped(|scope| -> Result<usize, AppError> {
        if discard {
            scope.discard_on_exit();
        }
        for (index, op) in ops.iter().enumerate() {
            let step = match op {
                ScriptOp::AddGraph(request) => request
                    .to_graph()
                    .and_then(|graph| scope.add_graph(graph).map_err(AppError::from)),
                ScriptOp::RemoveGraph(request) => scope
                    .remove_graph(&request.graph_name())
                    .map(|_| ())
                    .map_err(AppError::from),
                ScriptOp::Assert(request) => request
                    .triple
                    .to_triple()
                    .and_then(|triple| {
                        scope
                            .assert(&request.graph_name(), triple)
                            .map_err(AppError::from)
                    }),
                ScriptOp::Retract(request) => request
                    .triple
                    .to_triple()
                    .and_then(|triple| {
                        scope
                            .retract(&request.graph_name(), triple)
                            .map_err(AppError::from)
                    }),
            };
            if let Err(e) = step {
                tracing::warn!(step = index, error = %e, "script step failed");
                return Err(e);
            }
        }
        Ok(scope.pending())
    })
}

/// Replay a JSON operation script, then flush (or discard).
pub fn cmd_apply(
    config: &Config,
    json_mode: bool,
    file: &Path,
    discard: bool,
) -> Result<(), AppError> {
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_SCRIPT_FILE_SIZE)?;
    let contents = std::fs::read(&validated_path)?;
    let ops = parse_script(&contents)?;

    tracing::info!(operations = ops.len(), discard, "applying script");

    let mut coordinator = open_coordinator(config)?;
    let staged = apply_script(&mut coordinator, &ops, discard)?;

    if json_mode {
        let output = serde_json::json!({
            "operations": ops.len(),
            "staged_actions": staged,
            "committed": !discard,
        });
        return print_json(&output);
    }

    let outcome = if discard { "discarded" } else { "flushed" };
    println!(
        "Applied {} operations ({} staged actions, {})",
        ops.len(),
        staged,
        outcome
    );
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Run a pattern query against the backend.
pub fn cmd_query(config: &Config, json_mode: bool, request: &QueryRequest) -> Result<(), AppError> {
    let coordinator = open_coordinator(config)?;
    let results = coordinator.query(&request.to_pattern())?;

    if json_mode {
        return print_json(&QueryResponse::new(&results.quads));
    }

    for quad in &results.quads {
        println!("[{}] {}", quad.graph, quad.triple);
    }
    println!("{} match(es)", results.len());
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export a graph to file.
pub fn cmd_export(
    config: &Config,
    output: &Path,
    graph: Option<String>,
    format: ExportFormat,
) -> Result<(), AppError> {
    let validated_output = validate_output_path(output)?;

    let mut coordinator = open_coordinator(config)?;
    let name = GraphName::from_optional(graph.as_deref());
    let graph = coordinator.graph(&name)?;

    let data = match format {
        ExportFormat::Binary => graph_to_bytes(graph)?,
        ExportFormat::Json => serde_json::to_vec_pretty(&GraphResponse::from(graph))?,
    };
    std::fs::write(&validated_output, &data)?;

    println!(
        "Exported {} ({} triples, {} bytes) to {}",
        name,
        graph.len(),
        data.len(),
        validated_output.display()
    );
    Ok(())
}

/// Import a graph exported in binary format, merging into any graph of
/// the same name.
pub fn cmd_import(config: &Config, input: &Path) -> Result<(), AppError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_PERSISTENCE_PAYLOAD_SIZE as u64)?;
    let data = std::fs::read(&validated_path)?;
    let graph = graph_from_bytes(&data)?;

    let name = graph.name().clone();
    let count = graph.len();

    let mut coordinator = open_coordinator(config)?;
    ensure_writable(&coordinator)?;
    coordinator.scoped(|scope| scope.add_graph(graph))?;

    println!("Imported {} ({} triples)", name, count);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
