//! Guardrail validator
//!
//! Evaluates one SQL statement against a [`RuleSet`]. Checks run over
//! tokens, never over raw substrings, so a blocked `DROP` does not fire on a
//! `dropdown_id` column or a `'drop'` literal. Every check runs and every
//! violation is collected; validation never fails with an error.

use crate::tables::{extract_tables, TableRef};
use crate::tokenizer::{SqlToken, SqlTokenizer, TokenKind};
use querygate_core::{Config, RuleSet, SchemaSnapshot, ValidationResult};
use std::collections::BTreeMap;
use tracing::debug;

/// Violation messages
pub mod messages {
    pub const EMPTY_STATEMENT: &str = "Empty SQL statement.";
    pub const NO_DML: &str = "No valid DML statement (SELECT, INSERT, UPDATE, DELETE) found.";

    pub fn parse_error(detail: impl std::fmt::Display) -> String {
        format!("SQL parse error: {}", detail)
    }

    pub fn blocked_keyword(keyword: &str) -> String {
        format!("Blocked keyword detected: {}", keyword)
    }

    pub fn unauthorized_tables(tables: &[String]) -> String {
        format!("Unauthorized table(s) used: {}", tables.join(", "))
    }

    pub fn unknown_tables(tables: &[String]) -> String {
        format!("Unknown table(s) not present in schema: {}", tables.join(", "))
    }
}

/// A rule set bound to a tokenizer dialect
pub struct Guardrail {
    rules: RuleSet,
    tokenizer: SqlTokenizer,
}

impl Guardrail {
    /// Create a guardrail using the generic dialect
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            tokenizer: SqlTokenizer::new(),
        }
    }

    /// Create a guardrail from the config's rules and dialect
    pub fn from_config(config: &Config) -> Self {
        Self {
            rules: RuleSet::from_config(&config.rules),
            tokenizer: SqlTokenizer::from_dialect(&config.dialect),
        }
    }

    /// The rules this guardrail enforces
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validate a statement against this guardrail's rules
    pub fn validate(&self, sql: &str, schema: &SchemaSnapshot) -> ValidationResult {
        validate_with(&self.tokenizer, sql, &self.rules, schema)
    }
}

/// Validate a statement with the generic dialect
pub fn validate(sql: &str, rules: &RuleSet, schema: &SchemaSnapshot) -> ValidationResult {
    validate_with(&SqlTokenizer::new(), sql, rules, schema)
}

/// Validate a statement with a specific tokenizer
pub fn validate_with(
    tokenizer: &SqlTokenizer,
    sql: &str,
    rules: &RuleSet,
    schema: &SchemaSnapshot,
) -> ValidationResult {
    if sql.trim().is_empty() {
        return ValidationResult::single(messages::EMPTY_STATEMENT);
    }

    let tokens = match tokenizer.tokenize(sql) {
        Ok(tokens) => tokens,
        Err(e) => return ValidationResult::single(messages::parse_error(e)),
    };

    let mut errors = Vec::new();

    for keyword in blocked_keywords_found(&tokens, rules) {
        errors.push(messages::blocked_keyword(&keyword));
    }

    let tables = extract_tables(&tokens);

    let unauthorized = distinct_sorted(
        tables
            .iter()
            .filter(|t| !rules.is_table_allowed(t.simple(), t.qualified().as_deref())),
    );
    if !unauthorized.is_empty() {
        errors.push(messages::unauthorized_tables(&unauthorized));
    }

    if !has_top_level_dml(&tokens) {
        errors.push(messages::NO_DML.to_string());
    }

    if rules.restricts_to_schema() {
        let unknown = distinct_sorted(tables.iter().filter(|t| !is_in_schema(t, schema)));
        if !unknown.is_empty() {
            errors.push(messages::unknown_tables(&unknown));
        }
    }

    debug!(
        tokens = tokens.len(),
        tables = tables.len(),
        violations = errors.len(),
        "validated statement"
    );

    ValidationResult::from_errors(errors)
}

/// Blocked entries that appear as bare word or punctuation tokens, in rule order
///
/// Punctuation entries such as `;` match operator tokens by text; literals
/// and quoted identifiers never match.
fn blocked_keywords_found(tokens: &[SqlToken], rules: &RuleSet) -> Vec<String> {
    rules
        .blocked_keywords()
        .iter()
        .filter(|keyword| {
            tokens.iter().any(|t| {
                (t.is_bare_word() || t.kind == TokenKind::Punctuation)
                    && t.normalized() == **keyword
            })
        })
        .cloned()
        .collect()
}

fn has_top_level_dml(tokens: &[SqlToken]) -> bool {
    tokens
        .iter()
        .any(|t| t.depth == 0 && t.kind == TokenKind::Dml)
}

fn is_in_schema(table: &TableRef, schema: &SchemaSnapshot) -> bool {
    table
        .qualified()
        .is_some_and(|q| schema.contains_table(&q))
        || schema.contains_table(table.simple())
}

/// Table names as written, deduplicated case-insensitively and sorted
fn distinct_sorted<'a>(tables: impl Iterator<Item = &'a TableRef>) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for table in tables {
        let name = table.to_string();
        seen.entry(name.to_uppercase()).or_insert(name);
    }
    seen.into_values().collect()
}
