//! Guardrail rule set

use crate::config::RulesConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized guardrail rules
///
/// Entries are trimmed and upper-cased. An empty `allowed_tables` set means
/// no table restriction. The rule set is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    blocked_keywords: BTreeSet<String>,
    allowed_tables: BTreeSet<String>,
    restrict_to_schema: bool,
}

impl RuleSet {
    /// Create a rule set from raw keyword and table lists
    pub fn new<K, T>(blocked_keywords: K, allowed_tables: T) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            blocked_keywords: normalize_all(blocked_keywords),
            allowed_tables: normalize_all(allowed_tables),
            restrict_to_schema: false,
        }
    }

    /// Build from the `[rules]` section of the config
    pub fn from_config(config: &RulesConfig) -> Self {
        Self::new(&config.blocked_keywords, &config.allowed_tables)
            .with_schema_restriction(config.restrict_to_schema)
    }

    /// Also reject tables that are absent from the schema snapshot
    pub fn with_schema_restriction(mut self, restrict: bool) -> Self {
        self.restrict_to_schema = restrict;
        self
    }

    /// Normalized blocked keywords, sorted
    pub fn blocked_keywords(&self) -> &BTreeSet<String> {
        &self.blocked_keywords
    }

    /// Normalized allowed tables, sorted
    pub fn allowed_tables(&self) -> &BTreeSet<String> {
        &self.allowed_tables
    }

    /// Whether unknown tables are rejected
    pub fn restricts_to_schema(&self) -> bool {
        self.restrict_to_schema
    }

    /// Check if a keyword (any case) is blocked
    pub fn is_blocked(&self, keyword: &str) -> bool {
        self.blocked_keywords.contains(&normalize(keyword))
    }

    /// Check a table reference against the allow-list
    ///
    /// Passes when the list is empty, or when either the simple name or the
    /// qualified name is listed.
    pub fn is_table_allowed(&self, simple: &str, qualified: Option<&str>) -> bool {
        if self.allowed_tables.is_empty() {
            return true;
        }

        self.allowed_tables.contains(&normalize(simple))
            || qualified.is_some_and(|q| self.allowed_tables.contains(&normalize(q)))
    }
}

/// Trim and upper-case a rule entry
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

fn normalize_all<I>(values: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| normalize(v.as_ref()))
        .filter(|v| !v.is_empty())
        .collect()
}
