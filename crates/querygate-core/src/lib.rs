//! QueryGate Core
//!
//! Shared domain model: schema snapshots, guardrail rule sets, validation
//! results and pipeline outcomes, plus the `querygate.toml` configuration.

pub mod schema;
pub mod rules;
pub mod validation;
pub mod config;

pub use schema::{SchemaSnapshot, SchemaRow, TableInfo, NO_DESCRIPTION};
pub use rules::RuleSet;
pub use validation::{ValidationResult, Attempt, PipelineOutcome, Termination};
pub use config::{
    Config, ConfigError, DialectConfig, RulesConfig, PipelineConfig, CacheConfig, StoreConfig,
};
