//! Bounded generate/validate/regenerate pipeline
//!
//! The [`RegenerationController`] drives one natural-language question
//! through the external SQL generator, validates every produced statement
//! with the guardrail, and feeds violations back to the regenerator until a
//! statement passes or the regeneration budget runs out. [`Pipeline`] adds
//! gated execution: the executor only ever sees SQL whose most recent
//! validation passed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use querygate_pipeline::{CancelHandle, RegenerationController};
//!
//! let controller = RegenerationController::new(guardrail, cache, generator, regenerator)
//!     .with_pipeline_config(&config.pipeline);
//!
//! let cancel = CancelHandle::new();
//! let outcome = controller.run("top 5 customers by revenue", None, &cancel.token()).await?;
//! if outcome.is_validated() {
//!     println!("{}", outcome.final_sql);
//! }
//! ```

pub mod cancel;
pub mod collaborators;
pub mod controller;
pub mod error;
pub mod pipeline;

pub use cancel::{CancelHandle, CancelToken};
pub use collaborators::{BoxError, QueryExecutor, QueryResult, SqlGenerator, SqlRegenerator};
pub use controller::{RegenerationController, DEFAULT_MAX_REGENERATIONS};
pub use error::{PipelineError, Stage};
pub use pipeline::{ExecutedRun, Pipeline};
