//! SQL guardrails
//!
//! This crate handles:
//! - Tokenizing SQL with a configurable sqlparser dialect
//! - Extracting table references from FROM lists and JOIN clauses
//! - Validating statements against a guardrail rule set

pub mod tokenizer;
pub mod tables;
pub mod guardrail;

pub use tokenizer::{SqlTokenizer, SqlToken, TokenKind, TokenizeError};
pub use tables::{TableRef, extract_tables};
pub use guardrail::{Guardrail, validate, validate_with, messages};
