//! Pipeline errors
//!
//! Validation failures are data ([`ValidationResult`]) and never show up
//! here. These are the faults that end a run early: schema unavailable,
//! external call failed or stalled, cancellation. Each carries the attempts
//! made so far so callers can show the last SQL and its violations.
//!
//! [`ValidationResult`]: querygate_core::ValidationResult

use crate::collaborators::BoxError;
use querygate_cache::SchemaError;
use querygate_core::{Attempt, PipelineOutcome};
use std::time::Duration;
use thiserror::Error;

/// External call made by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Regenerate,
    Execute,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generation"),
            Self::Regenerate => write!(f, "regeneration"),
            Self::Execute => write!(f, "execution"),
        }
    }
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The schema snapshot could not be loaded
    #[error("Schema unavailable: {0}")]
    Schema(#[from] SchemaError),

    /// The generator failed
    #[error("SQL generation failed: {source}")]
    Generation {
        #[source]
        source: BoxError,
        attempts: Vec<Attempt>,
    },

    /// The regenerator failed
    #[error("SQL regeneration failed after {} attempt(s): {source}", .attempts.len())]
    Regeneration {
        #[source]
        source: BoxError,
        attempts: Vec<Attempt>,
    },

    /// An external call exceeded the per-attempt limit
    #[error("SQL {stage} timed out after {}s", .limit.as_secs_f64())]
    Timeout {
        stage: Stage,
        limit: Duration,
        attempts: Vec<Attempt>,
    },

    /// The run was cancelled before the next external call
    #[error("Pipeline run cancelled before {stage} after {} attempt(s)", .attempts.len())]
    Cancelled { stage: Stage, attempts: Vec<Attempt> },

    /// The executor failed on validated SQL
    #[error("Query execution failed: {source}")]
    Execution {
        #[source]
        source: BoxError,
        attempts: Vec<Attempt>,
    },

    /// Execution was requested but the final SQL never passed validation
    #[error("SQL rejected after {} attempt(s): {}", .outcome.attempt_count(), .outcome.validation.joined_errors())]
    NotValidated { outcome: Box<PipelineOutcome> },
}

impl PipelineError {
    /// Attempts made before the run ended
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Schema(_) => &[],
            Self::Generation { attempts, .. }
            | Self::Regeneration { attempts, .. }
            | Self::Timeout { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::Execution { attempts, .. } => attempts,
            Self::NotValidated { outcome } => &outcome.attempts,
        }
    }

    /// Number of attempts made before the run ended
    pub fn attempt_count(&self) -> usize {
        self.attempts().len()
    }

    /// SQL of the last attempt, if any was produced
    pub fn last_sql(&self) -> Option<&str> {
        self.attempts().last().map(|attempt| attempt.sql.as_str())
    }

    /// Violations of the last attempt
    pub fn last_errors(&self) -> &[String] {
        self.attempts()
            .last()
            .map(|attempt| attempt.result.errors.as_slice())
            .unwrap_or(&[])
    }
}
