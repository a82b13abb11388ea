//! Integration tests for the regeneration controller and gated execution

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use querygate_cache::SchemaCache;
use querygate_catalog::{MockStore, MockStoreBuilder, StoreError};
use querygate_core::{RuleSet, Termination};
use querygate_pipeline::{
    BoxError, CancelHandle, CancelToken, Pipeline, PipelineError, QueryExecutor, QueryResult,
    RegenerationController, SqlGenerator, SqlRegenerator, Stage,
};
use querygate_sql::Guardrail;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VALID: &str = "SELECT order_id, total FROM orders";
const INVALID: &str = "DROP TABLE orders";

/// One call made to the scripted model
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Generate {
        question: String,
        schema_text: String,
    },
    Regenerate {
        bad_sql: String,
        errors_text: String,
        schema_text: String,
    },
}

/// Generator and regenerator replaying scripted replies
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Call>>,
    cancel_on_call: Option<Arc<CancelHandle>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    fn replying(replies: &[Result<&str, &str>]) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn always(sql: &str, times: usize) -> Self {
        Self::replying(&vec![Ok(sql); times])
    }

    fn cancelling(mut self, handle: Arc<CancelHandle>) -> Self {
        self.cancel_on_call = Some(handle);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn regenerations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Regenerate { .. }))
            .count()
    }

    async fn reply(&self, call: Call) -> Result<String, BoxError> {
        self.calls.lock().unwrap().push(call);
        if let Some(handle) = &self.cancel_on_call {
            handle.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(sql)) => Ok(sql),
            Some(Err(message)) => Err(message.into()),
            None => Err("script exhausted".into()),
        }
    }
}

#[async_trait]
impl SqlGenerator for ScriptedModel {
    async fn generate(&self, question: &str, schema_text: &str) -> Result<String, BoxError> {
        self.reply(Call::Generate {
            question: question.to_string(),
            schema_text: schema_text.to_string(),
        })
        .await
    }
}

#[async_trait]
impl SqlRegenerator for ScriptedModel {
    async fn regenerate(
        &self,
        _question: &str,
        bad_sql: &str,
        errors_text: &str,
        schema_text: &str,
    ) -> Result<String, BoxError> {
        self.reply(Call::Regenerate {
            bad_sql: bad_sql.to_string(),
            errors_text: errors_text.to_string(),
            schema_text: schema_text.to_string(),
        })
        .await
    }
}

/// Executor recording the SQL it was given
#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult, BoxError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err("relation does not exist".into());
        }

        let mut row = serde_json::Map::new();
        row.insert("order_id".to_string(), serde_json::json!(1));
        row.insert("total".to_string(), serde_json::json!(19.5));
        Ok(QueryResult::new(vec![row], 0.01))
    }
}

fn shop_store() -> MockStore {
    MockStoreBuilder::new()
        .with_table("", "orders", &["order_id", "customer_id", "total"], None)
        .with_table("", "customers", &["customer_id", "name"], None)
        .build()
}

fn shop_cache() -> Arc<SchemaCache> {
    Arc::new(SchemaCache::new(Arc::new(shop_store())))
}

fn guardrail() -> Guardrail {
    Guardrail::new(RuleSet::new(["DROP", "DELETE"], ["orders"]))
}

fn controller(model: &Arc<ScriptedModel>) -> RegenerationController {
    RegenerationController::new(guardrail(), shop_cache(), model.clone(), model.clone())
}

#[tokio::test]
async fn always_invalid_exhausts_budget() {
    let model = Arc::new(ScriptedModel::always(INVALID, 10));

    let outcome = controller(&model)
        .run("remove orders", None, &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(outcome.terminated, Termination::BudgetExhausted);
    assert_eq!(outcome.attempt_count(), 3);
    assert_eq!(
        outcome.attempts.iter().map(|a| a.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(outcome.final_sql, INVALID);
    assert!(!outcome.validation.ok);
    assert_eq!(model.regenerations(), 2);
}

#[tokio::test]
async fn budget_follows_configuration() {
    let model = Arc::new(ScriptedModel::always(INVALID, 10));

    let outcome = controller(&model)
        .with_max_regenerations(4)
        .run("remove orders", None, &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(outcome.attempt_count(), 5);
    assert_eq!(model.regenerations(), 4);
}

#[tokio::test]
async fn valid_first_attempt_never_regenerates() {
    let model = Arc::new(ScriptedModel::always(VALID, 1));

    let outcome = controller(&model)
        .run("order totals", None, &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(outcome.terminated, Termination::Validated);
    assert_eq!(outcome.attempt_count(), 1);
    assert_eq!(outcome.final_sql, VALID);
    assert_eq!(model.regenerations(), 0);
}

#[tokio::test]
async fn regeneration_fixes_invalid_sql() {
    let model = Arc::new(ScriptedModel::replying(&[
        Ok("SELECT * FROM orders JOIN customers ON orders.customer_id = customers.customer_id"),
        Ok(VALID),
        Ok(INVALID),
    ]));

    let outcome = controller(&model)
        .run("orders with customers", None, &CancelToken::never())
        .await
        .unwrap();

    assert!(outcome.is_validated());
    assert_eq!(outcome.attempt_count(), 2);
    assert_eq!(
        outcome.attempts[0].result.errors,
        vec!["Unauthorized table(s) used: customers".to_string()]
    );
    assert!(outcome.attempts[1].result.ok);
    assert_eq!(outcome.final_sql, VALID);
}

#[tokio::test]
async fn regenerator_gets_previous_sql_errors_and_schema_text() {
    let model = Arc::new(ScriptedModel::replying(&[Ok(INVALID), Ok(VALID)]));

    controller(&model)
        .run("order totals", None, &CancelToken::never())
        .await
        .unwrap();

    let schema_text = "customers: customer_id, name\norders: order_id, customer_id, total";
    assert_eq!(
        model.calls(),
        vec![
            Call::Generate {
                question: "order totals".to_string(),
                schema_text: schema_text.to_string(),
            },
            Call::Regenerate {
                bad_sql: INVALID.to_string(),
                errors_text: "Blocked keyword detected: DROP; \
                              No valid DML statement (SELECT, INSERT, UPDATE, DELETE) found."
                    .to_string(),
                schema_text: schema_text.to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn schema_override_reaches_both_calls() {
    let model = Arc::new(ScriptedModel::replying(&[Ok(INVALID), Ok(VALID)]));

    controller(&model)
        .run("order totals", Some("orders: order_id"), &CancelToken::never())
        .await
        .unwrap();

    for call in model.calls() {
        let text = match call {
            Call::Generate { schema_text, .. } | Call::Regenerate { schema_text, .. } => schema_text,
        };
        assert_eq!(text, "orders: order_id");
    }
}

#[tokio::test]
async fn generator_failure_is_fatal() {
    let model = Arc::new(ScriptedModel::replying(&[Err("rate limited")]));

    let err = controller(&model)
        .run("order totals", None, &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Generation { .. }));
    assert_eq!(err.attempt_count(), 0);
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn regenerator_failure_surfaces_history() {
    let model = Arc::new(ScriptedModel::replying(&[Ok(INVALID), Err("model unavailable")]));

    let err = controller(&model)
        .run("order totals", None, &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Regeneration { .. }));
    assert_eq!(err.attempt_count(), 1);
    assert_eq!(err.last_sql(), Some(INVALID));
    assert_eq!(err.last_errors().len(), 2);
}

#[tokio::test]
async fn schema_load_failure_stops_before_generation() {
    let store = shop_store();
    store
        .fail_with(StoreError::NetworkError("connection refused".to_string()))
        .await;
    let cache = Arc::new(SchemaCache::new(Arc::new(store)));
    let model = Arc::new(ScriptedModel::always(VALID, 1));
    let controller = RegenerationController::new(guardrail(), cache, model.clone(), model.clone());

    let err = controller
        .run("order totals", None, &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn cancelled_run_issues_no_calls() {
    let handle = CancelHandle::new();
    handle.cancel();
    let model = Arc::new(ScriptedModel::always(VALID, 1));

    let err = controller(&model)
        .run("order totals", None, &handle.token())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::Generate,
            ..
        }
    ));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn cancel_during_call_stops_before_next_call() {
    let handle = Arc::new(CancelHandle::new());
    let token = handle.token();
    let model = Arc::new(ScriptedModel::always(INVALID, 3).cancelling(handle));

    let err = controller(&model)
        .run("remove orders", None, &token)
        .await
        .unwrap_err();

    // The dispatched generation completed and was validated.
    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::Regenerate,
            ..
        }
    ));
    assert_eq!(err.attempt_count(), 1);
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_call_times_out() {
    let model = Arc::new(ScriptedModel::always(INVALID, 3).delayed(Duration::from_secs(120)));

    let err = controller(&model)
        .with_attempt_timeout(Duration::from_secs(5))
        .run("remove orders", None, &CancelToken::never())
        .await
        .unwrap_err();

    match err {
        PipelineError::Timeout {
            stage,
            limit,
            attempts,
        } => {
            assert_eq!(stage, Stage::Generate);
            assert_eq!(limit, Duration::from_secs(5));
            assert!(attempts.is_empty());
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_runs_share_one_schema_load() {
    let store = shop_store();
    let cache = Arc::new(SchemaCache::new(Arc::new(store.clone())));
    let model = Arc::new(ScriptedModel::always(VALID, 4));
    let controller = Arc::new(RegenerationController::new(
        guardrail(),
        cache,
        model.clone(),
        model.clone(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller
                    .run(&format!("question {i}"), None, &CancelToken::never())
                    .await
                    .map(|outcome| outcome.terminated)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Termination::Validated);
    }
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn validated_sql_is_executed() {
    let model = Arc::new(ScriptedModel::replying(&[Ok(INVALID), Ok(VALID)]));
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = Pipeline::new(controller(&model), executor.clone());

    let run = pipeline
        .run_and_execute("order totals", None, &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(run.outcome.attempt_count(), 2);
    assert_eq!(run.result.row_count, 1);
    assert_eq!(*executor.executed.lock().unwrap(), vec![VALID.to_string()]);
}

#[tokio::test]
async fn exhausted_budget_is_never_executed() {
    let model = Arc::new(ScriptedModel::always(INVALID, 3));
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = Pipeline::new(controller(&model), executor.clone());

    let err = pipeline
        .run_and_execute("remove orders", None, &CancelToken::never())
        .await
        .unwrap_err();

    match &err {
        PipelineError::NotValidated { outcome } => {
            assert_eq!(outcome.terminated, Termination::BudgetExhausted);
        }
        other => panic!("expected NotValidated, got {other:?}"),
    }
    assert_eq!(err.attempt_count(), 3);
    assert!(executor.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn executor_failure_is_distinct() {
    let model = Arc::new(ScriptedModel::always(VALID, 1));
    let executor = Arc::new(RecordingExecutor {
        fail: true,
        ..RecordingExecutor::default()
    });
    let pipeline = Pipeline::new(controller(&model), executor);

    let err = pipeline
        .run_and_execute("order totals", None, &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Execution { .. }));
    assert_eq!(err.last_sql(), Some(VALID));
}
