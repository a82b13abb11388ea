//! Configuration schema (querygate.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// SQL dialect used for tokenizing generated statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI SQL
    Ansi,

    /// PostgreSQL SQL dialect
    Postgres,

    /// Microsoft SQL Server / Azure SQL (T-SQL)
    MsSql,

    /// MySQL SQL dialect
    MySql,

    /// BigQuery SQL dialect
    BigQuery,

    /// Snowflake SQL dialect
    Snowflake,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Ansi
    }
}

/// Guardrail rules as written in the config file
///
/// Both lists are optional and default to empty (no restriction).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Keywords that must not appear as tokens
    #[serde(default, alias = "blockedKeywords")]
    pub blocked_keywords: Vec<String>,

    /// Tables queries may reference (simple or schema-qualified)
    #[serde(default, alias = "allowedTables")]
    pub allowed_tables: Vec<String>,

    /// Reject tables that are not in the schema snapshot
    #[serde(default, alias = "restrictToSchema")]
    pub restrict_to_schema: bool,
}

/// Regeneration loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Regenerations allowed after the first generation
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: usize,

    /// Wall-clock limit for a single generator/regenerator call
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_max_regenerations() -> usize {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_regenerations: default_max_regenerations(),
            attempt_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Per-attempt timeout as a duration
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }
}

/// Schema snapshot cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Where the persisted snapshot lives (relative to project root)
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Persist snapshots to disk after a live load
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".querygate/schema_snapshot.json")
}

fn default_persist() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            persist: default_persist(),
        }
    }
}

/// Backing schema store connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store type (postgres)
    #[serde(rename = "type")]
    pub store_type: String,

    /// Connection settings (store-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: "postgres".to_string(),
            settings: HashMap::new(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Guardrail rules
    #[serde(default)]
    pub rules: RulesConfig,

    /// Regeneration loop settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Schema cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Backing schema store (needed only for live reloads)
    #[serde(default)]
    pub store: Option<StoreConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            rules: RulesConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
            store: None,
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Snapshot path resolved against the project root
    pub fn snapshot_path(&self) -> PathBuf {
        if self.cache.snapshot_path.is_absolute() {
            self.cache.snapshot_path.clone()
        } else {
            self.project_root.join(&self.cache.snapshot_path)
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
