//! # Configuration
//!
//! `graphstage.toml` layout:
//!
//! ```toml
//! [storage]
//! backend = "redb"          # "redb" or "memory"
//! path = "graphstage.redb"
//! read_only = false
//! incremental_update = true
//! delete_graph = true
//! list_graphs = true
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! Lookup order: `--config`, then `GRAPHSTAGE_CONFIG`, then `graphstage.toml`
//! in the working directory, then built-in defaults. CLI flags override
//! whatever the file says.

use crate::error::AppError;
use graphstage_core::{BackendCapabilities, MemoryStore, RedbStore, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "GRAPHSTAGE_CONFIG";

/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "graphstage.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// Which storage provider backs the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local store; contents vanish on exit.
    Memory,
    /// redb database file.
    #[default]
    Redb,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redb => write!(f, "redb"),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
    /// Overrides every other switch.
    pub read_only: bool,
    pub incremental_update: bool,
    pub delete_graph: bool,
    pub list_graphs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("graphstage.redb"),
            read_only: false,
            incremental_update: true,
            delete_graph: true,
            list_graphs: true,
        }
    }
}

impl StorageConfig {
    /// Capabilities the opened backend will declare.
    #[must_use]
    pub fn capabilities(&self) -> BackendCapabilities {
        if self.read_only {
            return BackendCapabilities::read_only();
        }
        BackendCapabilities {
            read_only: false,
            supports_incremental_update: self.incremental_update,
            supports_delete_graph: self.delete_graph,
            supports_list_graphs: self.list_graphs,
        }
    }

    /// Open the configured storage provider.
    pub fn open_backend(&self) -> Result<StorageBackend, AppError> {
        let capabilities = self.capabilities();
        let backend = match self.backend {
            BackendKind::Memory => StorageBackend::InMemory(MemoryStore::new(capabilities)),
            BackendKind::Redb if self.read_only => {
                StorageBackend::Persistent(RedbStore::open_read_only(&self.path)?)
            }
            BackendKind::Redb => StorageBackend::Persistent(
                RedbStore::open(&self.path)?.with_capabilities(capabilities),
            ),
        };
        tracing::info!(
            backend = %self.backend,
            path = %self.path.display(),
            ?capabilities,
            "storage backend opened"
        );
        Ok(backend)
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(AppError::Config(format!(
                "{} exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Resolve the config using the lookup order.
    ///
    /// An explicitly named file (flag or env) must exist; the working
    /// directory default is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::from_file(default_path);
        }
        Ok(Self::default())
    }

    /// Render as TOML, used by `init`.
    pub fn to_toml_string(&self) -> Result<String, AppError> {
        toml::to_string(self).map_err(|e| AppError::Config(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use graphstage_core::StorageProvider;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
        assert_eq!(config.storage.capabilities(), BackendCapabilities::full());
    }

    #[test]
    fn sections_are_parsed() {
        let config = Config::from_toml_str(
            r#"
            [storage]
            backend = "memory"
            incremental_update = false
            delete_graph = false

            [server]
            port = 9000
            "#,
        )
        .expect("parse");

        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");

        let caps = config.storage.capabilities();
        assert!(!caps.supports_incremental_update);
        assert!(!caps.supports_delete_graph);
        assert!(caps.supports_list_graphs);
    }

    #[test]
    fn read_only_overrides_switches() {
        let config = Config::from_toml_str("[storage]\nread_only = true\n").expect("parse");
        assert_eq!(
            config.storage.capabilities(),
            BackendCapabilities::read_only()
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml_str("[storage]\nbakend = \"redb\"\n"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        assert!(Config::load(Some(&temp.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn rendered_config_parses_back() {
        let mut config = Config::default();
        config.storage.backend = BackendKind::Memory;
        config.server.port = 7777;

        let text = config.to_toml_string().expect("render");
        assert_eq!(Config::from_toml_str(&text).expect("parse"), config);
    }

    #[test]
    fn memory_backend_opens_without_touching_disk() {
        let mut config = Config::default();
        config.storage.backend = BackendKind::Memory;
        let backend = config.storage.open_backend().expect("open");
        assert!(!backend.is_persistent());
    }

    #[test]
    fn read_only_redb_requires_existing_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut config = Config::default();
        config.storage.path = temp.path().join("graphs.redb");
        config.storage.read_only = true;

        assert!(config.storage.open_backend().is_err());
        assert!(!config.storage.path.exists());

        config.storage.read_only = false;
        drop(config.storage.open_backend().expect("create"));

        config.storage.read_only = true;
        let backend = config.storage.open_backend().expect("open read-only");
        assert!(backend.capabilities().read_only);
    }
}
