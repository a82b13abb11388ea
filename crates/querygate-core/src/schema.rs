//! Schema snapshot types
//!
//! A snapshot is an immutable, point-in-time view of table/column/description
//! metadata. Snapshots are built once per load cycle and replaced wholesale on
//! reload; nothing mutates a snapshot after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel returned for tables without a description
pub const NO_DESCRIPTION: &str = "No description available.";

/// One row from the backing schema store
///
/// Rows arrive ordered by schema, table and ordinal position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRow {
    /// Schema (namespace) name, empty when the store has no schemas
    pub schema_name: String,

    /// Table name
    pub table_name: String,

    /// Column name
    pub column_name: String,

    /// Table description, if the store has one
    pub description: Option<String>,
}

impl SchemaRow {
    /// Create a new row
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            description,
        }
    }

    /// Snapshot key for this row: `schema.table`, or bare `table`
    pub fn table_key(&self) -> String {
        if self.schema_name.trim().is_empty() {
            self.table_name.clone()
        } else {
            format!("{}.{}", self.schema_name, self.table_name)
        }
    }
}

/// Columns and description for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Column names in ordinal order
    pub columns: Vec<String>,

    /// Table description
    pub description: Option<String>,
}

/// Immutable mapping from table name to its columns and description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, TableInfo>,

    /// When the snapshot was read from the backing store
    loaded_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Build a snapshot from store rows
    ///
    /// Column order follows row order. The first non-empty description seen
    /// for a table wins.
    pub fn from_rows(rows: impl IntoIterator<Item = SchemaRow>) -> Self {
        let mut tables: BTreeMap<String, TableInfo> = BTreeMap::new();

        for row in rows {
            let entry = tables.entry(row.table_key()).or_insert_with(|| TableInfo {
                columns: Vec::new(),
                description: None,
            });

            if !row.column_name.is_empty() && !entry.columns.contains(&row.column_name) {
                entry.columns.push(row.column_name);
            }

            if entry.description.is_none() {
                entry.description = row
                    .description
                    .filter(|d| !d.trim().is_empty());
            }
        }

        Self {
            tables,
            loaded_at: Utc::now(),
        }
    }

    /// A snapshot with no tables
    ///
    /// Used where validation runs without schema knowledge; the cache never
    /// hands out an empty snapshot.
    pub fn empty() -> Self {
        Self::from_tables(BTreeMap::new())
    }

    /// Build a snapshot directly from a table map
    pub fn from_tables(tables: BTreeMap<String, TableInfo>) -> Self {
        Self {
            tables,
            loaded_at: Utc::now(),
        }
    }

    /// Number of tables in the snapshot
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Check if the snapshot has no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// When this snapshot was loaded from the backing store
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Iterate over table keys in sorted order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Iterate over all tables
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableInfo)> {
        self.tables.iter().map(|(name, info)| (name.as_str(), info))
    }

    /// Find a table by stored key or, when unambiguous, by bare name
    ///
    /// Matching is case-insensitive.
    pub fn lookup(&self, table: &str) -> Option<(&str, &TableInfo)> {
        let wanted = table.trim();
        if wanted.is_empty() {
            return None;
        }

        if let Some((name, info)) = self.tables.get_key_value(wanted) {
            return Some((name.as_str(), info));
        }

        if let Some((name, info)) = self
            .tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        {
            return Some((name.as_str(), info));
        }

        let mut by_bare_name = self.tables.iter().filter(|(name, _)| {
            name.rsplit('.')
                .next()
                .is_some_and(|bare| bare.eq_ignore_ascii_case(wanted))
        });

        match (by_bare_name.next(), by_bare_name.next()) {
            (Some((name, info)), None) => Some((name.as_str(), info)),
            _ => None,
        }
    }

    /// Check whether a table exists in the snapshot
    pub fn contains_table(&self, table: &str) -> bool {
        self.lookup(table).is_some()
    }

    /// Column names for a table; empty for unknown tables
    pub fn columns(&self, table: &str) -> Vec<String> {
        self.lookup(table)
            .map(|(_, info)| info.columns.clone())
            .unwrap_or_default()
    }

    /// Description for a table, or [`NO_DESCRIPTION`]
    pub fn description(&self, table: &str) -> String {
        self.lookup(table)
            .and_then(|(_, info)| info.description.clone())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string())
    }

    /// Render the snapshot as schema context for SQL generation
    ///
    /// One line per table: `table: col1, col2`
    pub fn to_prompt_text(&self) -> String {
        self.tables
            .iter()
            .map(|(name, info)| format!("{}: {}", name, info.columns.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
