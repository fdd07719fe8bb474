//! # Configuration
//!
//! Layered application settings. Later layers win:
//!
//! 1. Built-in defaults
//! 2. `stride.toml` (or the file passed with `--config`)
//! 3. Environment variables
//! 4. CLI flags (applied by the `cli` module)
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STRIDE_HOST` | `server.host` |
//! | `STRIDE_PORT` | `server.port` |
//! | `STRIDE_CORS_ORIGINS` | `server.cors_origins` |
//! | `STRIDE_BACKEND` | `storage.backend` |
//! | `STRIDE_DATA` | `storage.path` |
//! | `STRIDE_RATE_LIMIT` | `limits.rate_limit_per_profile` |
//!
//! `STRIDE_LOG_FORMAT` is read by `main` before any of this runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use stride_core::{
    FileStore, MemoryStore, RedbStore, ServiceOptions, SnapshotStore, StrideError,
};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "stride.toml";

/// Maximum accepted config file size.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub progression: ServiceOptions,
    pub limits: LimitsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated origins, or `*`. Unset means localhost only.
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Directory (file backend) or database file (redb backend).
    pub path: Option<PathBuf>,
}

/// Request limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Requests per second per profile. 0 disables limiting.
    pub rate_limit_per_profile: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_profile: 20,
        }
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Snapshot store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile; everything is lost on exit.
    Memory,
    /// One JSON file per profile.
    #[default]
    File,
    /// redb database file.
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::File => "file",
            Backend::Redb => "redb",
        }
    }

    /// Path used when `storage.path` is unset.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        match self {
            Backend::Memory | Backend::File => PathBuf::from("stride-data"),
            Backend::Redb => PathBuf::from("stride.redb"),
        }
    }
}

impl FromStr for Backend {
    type Err = StrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(StrideError::Config(format!(
                "Unknown storage backend '{}' (expected memory, file or redb)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Read the config file and apply process environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `stride.toml` is used if
    /// present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, StrideError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, StrideError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| StrideError::Config(format!("{}: {}", path.display(), e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(StrideError::Config(format!(
                "{}: file size {} bytes exceeds maximum allowed {} bytes",
                path.display(),
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| StrideError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Parse TOML text. Missing sections and fields take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, StrideError> {
        toml::from_str(text).map_err(|e| StrideError::Config(e.to_string()))
    }

    /// Apply `STRIDE_*` overrides read through `lookup`.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StrideError> {
        if let Some(host) = lookup("STRIDE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("STRIDE_PORT") {
            self.server.port = parse_env("STRIDE_PORT", &port)?;
        }
        if let Some(origins) = lookup("STRIDE_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
        if let Some(backend) = lookup("STRIDE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("STRIDE_DATA") {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("STRIDE_RATE_LIMIT") {
            self.limits.rate_limit_per_profile = parse_env("STRIDE_RATE_LIMIT", &limit)?;
        }
        Ok(self)
    }

    /// Effective storage path.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| self.storage.backend.default_path())
    }

    /// Open the configured snapshot store.
    pub fn open_store(&self) -> Result<Arc<dyn SnapshotStore>, StrideError> {
        let store: Arc<dyn SnapshotStore> = match self.storage.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::File => Arc::new(FileStore::open(self.data_path())?),
            Backend::Redb => Arc::new(RedbStore::open(self.data_path())?),
        };
        Ok(store)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, StrideError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StrideError::Config(format!("{}={:?}: {}", key, value, e)))
}

// =============================================================================
// TESTS
// =============================================================================
