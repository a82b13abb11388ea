//! Validation results and regeneration pipeline outcomes

use serde::{Deserialize, Serialize};

/// Result of validating one SQL statement
///
/// `ok` is true iff `errors` is empty. All checks run; every violation is
/// collected in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the statement passed every check
    pub ok: bool,

    /// Violation messages in check order
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result
    pub fn valid() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// Build a result from collected errors
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }

    /// A failing result with a single error
    pub fn single(error: impl Into<String>) -> Self {
        Self::from_errors(vec![error.into()])
    }

    /// Errors joined into one message for regeneration prompts
    pub fn joined_errors(&self) -> String {
        self.errors.join("; ")
    }
}

/// One generate/validate step of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Attempt number, starting at 0
    pub index: usize,

    /// SQL produced by the generator or regenerator
    pub sql: String,

    /// Validation result for `sql`
    pub result: ValidationResult,
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The last attempt passed validation
    Validated,

    /// The regeneration budget ran out while still invalid
    BudgetExhausted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validated => write!(f, "validated"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
        }
    }
}

/// Terminal outcome of one regeneration pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// SQL of the last attempt
    pub final_sql: String,

    /// Validation result of the last attempt
    pub validation: ValidationResult,

    /// Every attempt, in order
    pub attempts: Vec<Attempt>,

    /// Terminal state
    pub terminated: Termination,
}

impl PipelineOutcome {
    /// Whether the final SQL passed validation
    pub fn is_validated(&self) -> bool {
        self.terminated == Termination::Validated
    }

    /// Number of attempts made
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_tracks_errors() {
        assert!(ValidationResult::from_errors(vec![]).ok);
        assert!(!ValidationResult::single("Empty SQL statement.").ok);
        assert!(ValidationResult::valid().errors.is_empty());
    }

    #[test]
    fn joined_errors_keeps_order() {
        let result = ValidationResult::from_errors(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(result.joined_errors(), "first; second");
    }

    #[test]
    fn termination_serializes_snake_case() {
        let json = serde_json::to_string(&Termination::BudgetExhausted).unwrap();
        assert_eq!(json, "\"budget_exhausted\"");
    }
}
