//! Regeneration controller
//!
//! A fixed state machine per run:
//!
//! ```text
//! Generating -> Validating -> (Regenerating -> Validating)* -> Validated | BudgetExhausted
//! ```
//!
//! The first passing validation ends the run. A run that is still invalid
//! after `1 + max_regenerations` attempts ends as `BudgetExhausted` with the
//! last SQL and its violations; invalid SQL is never reported as validated.
//! Generator and regenerator faults are not retried.

use crate::cancel::CancelToken;
use crate::collaborators::{BoxError, SqlGenerator, SqlRegenerator};
use crate::error::{PipelineError, Stage};
use querygate_cache::SchemaCache;
use querygate_core::{Attempt, PipelineConfig, PipelineOutcome, SchemaSnapshot, Termination};
use querygate_sql::Guardrail;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Regenerations allowed after the first generation
pub const DEFAULT_MAX_REGENERATIONS: usize = 2;

/// Drives generate/validate/regenerate runs
///
/// Holds no per-run state: one controller can serve any number of
/// concurrent runs.
pub struct RegenerationController {
    guardrail: Guardrail,
    cache: Arc<SchemaCache>,
    generator: Arc<dyn SqlGenerator>,
    regenerator: Arc<dyn SqlRegenerator>,
    max_regenerations: usize,
    attempt_timeout: Option<Duration>,
}

impl RegenerationController {
    pub fn new(
        guardrail: Guardrail,
        cache: Arc<SchemaCache>,
        generator: Arc<dyn SqlGenerator>,
        regenerator: Arc<dyn SqlRegenerator>,
    ) -> Self {
        Self {
            guardrail,
            cache,
            generator,
            regenerator,
            max_regenerations: DEFAULT_MAX_REGENERATIONS,
            attempt_timeout: None,
        }
    }

    /// Set the regeneration budget
    pub fn with_max_regenerations(mut self, max_regenerations: usize) -> Self {
        self.max_regenerations = max_regenerations;
        self
    }

    /// Bound each generator/regenerator call by wall-clock time
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Apply budget and timeout from the `[pipeline]` config section
    pub fn with_pipeline_config(mut self, config: &PipelineConfig) -> Self {
        self.max_regenerations = config.max_regenerations;
        self.attempt_timeout = config.attempt_timeout();
        self
    }

    pub fn max_regenerations(&self) -> usize {
        self.max_regenerations
    }

    pub fn guardrail(&self) -> &Guardrail {
        &self.guardrail
    }

    /// Run one question through the pipeline
    ///
    /// `schema_override` replaces the schema text derived from the cached
    /// snapshot; validation always uses the snapshot.
    pub async fn run(
        &self,
        question: &str,
        schema_override: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let span = info_span!("pipeline_run", max_regenerations = self.max_regenerations);
        self.run_inner(question, schema_override, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        question: &str,
        schema_override: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let snapshot = self.cache.get().await?;
        let schema_text = match schema_override {
            Some(text) => text.to_string(),
            None => snapshot.to_prompt_text(),
        };

        let mut attempts: Vec<Attempt> = Vec::new();

        let mut sql = self
            .call(Stage::Generate, cancel, &mut attempts, || {
                self.generator.generate(question, &schema_text)
            })
            .await?;

        loop {
            let attempt = self.validate_attempt(attempts.len(), sql, &snapshot);

            if attempt.result.ok {
                info!(attempts = attempts.len() + 1, "SQL validated");
                return Ok(finish(attempts, attempt, Termination::Validated));
            }

            if attempts.len() + 1 > self.max_regenerations {
                warn!(attempts = attempts.len() + 1, "regeneration budget exhausted");
                return Ok(finish(attempts, attempt, Termination::BudgetExhausted));
            }

            let errors_text = attempt.result.joined_errors();
            let bad_sql = attempt.sql.clone();
            attempts.push(attempt);

            sql = self
                .call(Stage::Regenerate, cancel, &mut attempts, || {
                    self.regenerator
                        .regenerate(question, &bad_sql, &errors_text, &schema_text)
                })
                .await?;
        }
    }

    fn validate_attempt(&self, index: usize, sql: String, snapshot: &SchemaSnapshot) -> Attempt {
        let result = self.guardrail.validate(&sql, snapshot);
        if result.ok {
            debug!(attempt = index, "attempt passed validation");
        } else {
            info!(
                attempt = index,
                errors = result.errors.len(),
                "attempt rejected: {}",
                result.joined_errors()
            );
        }

        Attempt { index, sql, result }
    }

    /// Issue one external call unless cancelled, bounded by the attempt timeout
    async fn call<F, Fut>(
        &self,
        stage: Stage,
        cancel: &CancelToken,
        attempts: &mut Vec<Attempt>,
        make_call: F,
    ) -> Result<String, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BoxError>>,
    {
        if cancel.is_cancelled() {
            info!(%stage, "pipeline run cancelled");
            return Err(PipelineError::Cancelled {
                stage,
                attempts: std::mem::take(attempts),
            });
        }

        debug!(%stage, attempt = attempts.len(), "calling external SQL {}", stage);

        let result = match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, make_call()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%stage, limit_secs = limit.as_secs_f64(), "external call timed out");
                    return Err(PipelineError::Timeout {
                        stage,
                        limit,
                        attempts: std::mem::take(attempts),
                    });
                }
            },
            None => make_call().await,
        };

        result.map_err(|source| {
            let attempts = std::mem::take(attempts);
            match stage {
                Stage::Regenerate => PipelineError::Regeneration { source, attempts },
                _ => PipelineError::Generation { source, attempts },
            }
        })
    }
}

fn finish(mut attempts: Vec<Attempt>, last: Attempt, terminated: Termination) -> PipelineOutcome {
    let final_sql = last.sql.clone();
    let validation = last.result.clone();
    attempts.push(last);

    PipelineOutcome {
        final_sql,
        validation,
        attempts,
        terminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use querygate_catalog::MockStoreBuilder;
    use querygate_core::RuleSet;
    use std::sync::Mutex;

    /// Returns the same SQL every time and records every call
    struct Fixed {
        sql: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl Fixed {
        fn new(sql: &'static str) -> Arc<Self> {
            Arc::new(Self {
                sql,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SqlGenerator for Fixed {
        async fn generate(&self, question: &str, _schema_text: &str) -> Result<String, BoxError> {
            self.calls.lock().unwrap().push(question.to_string());
            Ok(self.sql.to_string())
        }
    }

    #[async_trait]
    impl SqlRegenerator for Fixed {
        async fn regenerate(
            &self,
            _question: &str,
            _bad_sql: &str,
            errors_text: &str,
            _schema_text: &str,
        ) -> Result<String, BoxError> {
            self.calls.lock().unwrap().push(errors_text.to_string());
            Ok(self.sql.to_string())
        }
    }

    fn cache() -> Arc<SchemaCache> {
        let store = MockStoreBuilder::new()
            .with_table("", "orders", &["order_id", "total"], None)
            .build();
        Arc::new(SchemaCache::new(Arc::new(store)))
    }

    fn guardrail() -> Guardrail {
        Guardrail::new(RuleSet::new(["DROP"], ["orders"]))
    }

    #[tokio::test]
    async fn zero_budget_means_single_attempt() {
        let generator = Fixed::new("DROP TABLE orders");
        let regenerator = Fixed::new("SELECT 1");
        let controller =
            RegenerationController::new(guardrail(), cache(), generator.clone(), regenerator.clone())
                .with_max_regenerations(0);

        let outcome = controller
            .run("drop it", None, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(outcome.terminated, Termination::BudgetExhausted);
        assert_eq!(outcome.attempt_count(), 1);
        assert!(regenerator.calls().is_empty());
    }

    #[test]
    fn pipeline_config_sets_budget() {
        let config = PipelineConfig {
            max_regenerations: 5,
            attempt_timeout_secs: Some(10),
        };
        let controller =
            RegenerationController::new(guardrail(), cache(), Fixed::new("SELECT 1"), Fixed::new("SELECT 1"))
                .with_pipeline_config(&config);

        assert_eq!(controller.max_regenerations(), 5);
        assert_eq!(controller.attempt_timeout, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn regenerator_receives_joined_errors() {
        let generator = Fixed::new("DROP TABLE orders; SELECT * FROM customers");
        let regenerator = Fixed::new("SELECT order_id FROM orders");
        let controller =
            RegenerationController::new(guardrail(), cache(), generator, regenerator.clone());

        let outcome = controller
            .run("clean up", None, &CancelToken::never())
            .await
            .unwrap();

        assert!(outcome.is_validated());
        assert_eq!(outcome.attempt_count(), 2);
        assert_eq!(
            regenerator.calls(),
            vec![
                "Blocked keyword detected: DROP; Unauthorized table(s) used: customers".to_string()
            ]
        );
    }
}
