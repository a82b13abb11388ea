//! Controller plus gated execution

use crate::cancel::CancelToken;
use crate::collaborators::{QueryExecutor, QueryResult};
use crate::controller::RegenerationController;
use crate::error::{PipelineError, Stage};
use querygate_core::PipelineOutcome;
use std::sync::Arc;
use tracing::info;

/// A validated run and the rows its SQL returned
#[derive(Debug, Clone)]
pub struct ExecutedRun {
    pub outcome: PipelineOutcome,
    pub result: QueryResult,
}

/// Question in, rows out
///
/// The executor only ever receives SQL from a `Validated` outcome.
pub struct Pipeline {
    controller: RegenerationController,
    executor: Arc<dyn QueryExecutor>,
}

impl Pipeline {
    pub fn new(controller: RegenerationController, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            controller,
            executor,
        }
    }

    pub fn controller(&self) -> &RegenerationController {
        &self.controller
    }

    /// Generate and validate SQL without executing it
    pub async fn run(
        &self,
        question: &str,
        schema_override: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.controller.run(question, schema_override, cancel).await
    }

    /// Generate, validate, then execute the validated SQL
    ///
    /// Fails with [`PipelineError::NotValidated`] when the budget ran out;
    /// the executor is not called in that case.
    pub async fn run_and_execute(
        &self,
        question: &str,
        schema_override: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<ExecutedRun, PipelineError> {
        let outcome = self.controller.run(question, schema_override, cancel).await?;

        if !outcome.is_validated() {
            return Err(PipelineError::NotValidated {
                outcome: Box::new(outcome),
            });
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: Stage::Execute,
                attempts: outcome.attempts,
            });
        }

        match self.executor.execute(&outcome.final_sql).await {
            Ok(result) => {
                info!(
                    rows = result.row_count,
                    seconds = result.execution_time_seconds,
                    "validated SQL executed"
                );
                Ok(ExecutedRun { outcome, result })
            }
            Err(source) => Err(PipelineError::Execution {
                source,
                attempts: outcome.attempts,
            }),
        }
    }
}
