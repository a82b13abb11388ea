//! Table reference extraction
//!
//! Works over the classified token stream:
//! - every identifier list following `FROM` (comma-separated, with aliases)
//! - the identifier following each `JOIN`, scanning forward until the next
//!   identifier or keyword, whichever comes first
//!
//! A `JOIN` that reaches a keyword before any identifier (`JOIN LATERAL ...`)
//! contributes no table. `FROM` inside a function call such as
//! `EXTRACT(YEAR FROM created_at)` is not a table source and is skipped.
//!
//! A name followed by a parenthesis group is still a table reference: that
//! covers table-valued functions (`hr.salaries_fn(1)`) and T-SQL table hints
//! (`orders (NOLOCK)`, `orders WITH (NOLOCK)`). The group is stepped over.

use crate::tokenizer::{SqlToken, TokenKind};
use std::fmt;

/// A table named in a FROM or JOIN clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Name parts as written, e.g. `["sales", "orders"]`
    pub parts: Vec<String>,
}

impl TableRef {
    /// Create a reference from name parts
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// The bare table name (last part)
    pub fn simple(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The dotted name, when the reference is qualified
    pub fn qualified(&self) -> Option<String> {
        if self.parts.len() > 1 {
            Some(self.parts.join("."))
        } else {
            None
        }
    }

    /// Whether the reference carries a schema (or catalog) prefix
    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// Extract all FROM and JOIN table references, in statement order
pub fn extract_tables(tokens: &[SqlToken]) -> Vec<TableRef> {
    let mut tables = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if token.is_keyword("FROM") {
            if is_inside_function_call(tokens, i) {
                continue;
            }
            tables.extend(read_from_list(tokens, i + 1));
        } else if token.is_keyword("JOIN") {
            tables.extend(read_join_target(tokens, i + 1));
        }
    }

    tables
}

/// Read `name [(args)] [AS] [alias] [WITH (hints)] (, ...)*`
fn read_from_list(tokens: &[SqlToken], start: usize) -> Vec<TableRef> {
    let mut tables = Vec::new();
    let mut pos = start;

    while let Some((table, next)) = read_qualified_name(tokens, pos) {
        tables.push(table);
        pos = skip_group(tokens, next);
        pos = skip_alias(tokens, pos);
        pos = skip_table_hints(tokens, pos);

        match tokens.get(pos) {
            Some(t) if t.is_punct(",") => pos += 1,
            _ => break,
        }
    }

    tables
}

fn read_join_target(tokens: &[SqlToken], start: usize) -> Option<TableRef> {
    for (offset, token) in tokens[start.min(tokens.len())..].iter().enumerate() {
        match token.kind {
            TokenKind::Identifier => {
                return read_qualified_name(tokens, start + offset).map(|(table, _)| table);
            }
            TokenKind::Keyword | TokenKind::Dml => return None,
            TokenKind::Literal | TokenKind::Punctuation => continue,
        }
    }

    None
}

/// Read `ident(.ident)*` starting at `pos`
///
/// Returns the reference and the position after it.
fn read_qualified_name(tokens: &[SqlToken], pos: usize) -> Option<(TableRef, usize)> {
    let first = tokens.get(pos)?;
    if first.kind != TokenKind::Identifier {
        return None;
    }

    let mut parts = vec![first.text.clone()];
    let mut next = pos + 1;

    while let (Some(dot), Some(part)) = (tokens.get(next), tokens.get(next + 1)) {
        if dot.is_punct(".") && part.kind == TokenKind::Identifier {
            parts.push(part.text.clone());
            next += 2;
        } else {
            break;
        }
    }

    Some((TableRef::new(parts), next))
}

/// Step over a balanced `( ... )` group starting at `pos`, if there is one
fn skip_group(tokens: &[SqlToken], pos: usize) -> usize {
    let Some(open) = tokens.get(pos).filter(|t| t.is_punct("(")) else {
        return pos;
    };

    tokens[pos + 1..]
        .iter()
        .position(|t| t.depth == open.depth && t.is_punct(")"))
        .map(|offset| pos + 1 + offset + 1)
        .unwrap_or(tokens.len())
}

/// Step over T-SQL `WITH (hint, ...)`
fn skip_table_hints(tokens: &[SqlToken], pos: usize) -> usize {
    match (tokens.get(pos), tokens.get(pos + 1)) {
        (Some(with), Some(open)) if with.is_keyword("WITH") && open.is_punct("(") => {
            skip_group(tokens, pos + 1)
        }
        _ => pos,
    }
}

fn skip_alias(tokens: &[SqlToken], pos: usize) -> usize {
    match tokens.get(pos) {
        Some(t) if t.is_keyword("AS") => match tokens.get(pos + 1) {
            Some(alias) if alias.kind == TokenKind::Identifier => pos + 2,
            _ => pos + 1,
        },
        Some(t) if t.kind == TokenKind::Identifier => pos + 1,
        _ => pos,
    }
}

/// Whether the token at `index` sits inside `name( ... )` rather than a
/// subquery `( SELECT ... )`
fn is_inside_function_call(tokens: &[SqlToken], index: usize) -> bool {
    let depth = tokens[index].depth;
    if depth == 0 {
        return false;
    }

    let open = tokens[..index]
        .iter()
        .rposition(|t| t.depth == depth - 1 && t.is_punct("("));

    match open {
        Some(open) => !tokens
            .get(open + 1)
            .is_some_and(|t| t.is_keyword("SELECT") || t.is_keyword("WITH")),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::SqlTokenizer;
    use querygate_core::DialectConfig;

    fn tables(sql: &str) -> Vec<String> {
        let tokens = SqlTokenizer::new().tokenize(sql).unwrap();
        extract_tables(&tokens).iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn single_from_table() {
        assert_eq!(tables("SELECT * FROM orders"), vec!["orders"]);
    }

    #[test]
    fn comma_separated_list_with_aliases() {
        assert_eq!(
            tables("SELECT * FROM orders o, sales.customers AS c, items WHERE o.id = c.id"),
            vec!["orders", "sales.customers", "items"]
        );
    }

    #[test]
    fn join_chain() {
        assert_eq!(
            tables(
                "SELECT * FROM orders o \
                 JOIN customers c ON o.customer_id = c.id \
                 LEFT OUTER JOIN crm.regions r ON c.region_id = r.id"
            ),
            vec!["orders", "customers", "crm.regions"]
        );
    }

    #[test]
    fn join_stops_at_keyword() {
        assert_eq!(
            tables("SELECT * FROM orders JOIN LATERAL customers ON true"),
            vec!["orders"]
        );
    }

    #[test]
    fn join_on_subquery_contributes_inner_tables_only() {
        assert_eq!(
            tables("SELECT * FROM orders JOIN (SELECT id FROM customers) c ON c.id = orders.cid"),
            vec!["orders", "customers"]
        );
    }

    #[test]
    fn subquery_in_from() {
        assert_eq!(
            tables("SELECT * FROM (SELECT * FROM archive.orders) x"),
            vec!["archive.orders"]
        );
    }

    #[test]
    fn function_from_is_not_a_table() {
        assert_eq!(
            tables("SELECT EXTRACT(YEAR FROM created_at) FROM orders"),
            vec!["orders"]
        );
    }

    #[test]
    fn table_function_is_a_table_reference() {
        assert_eq!(tables("SELECT * FROM hr.salaries_fn(1)"), vec!["hr.salaries_fn"]);
        assert_eq!(
            tables("SELECT * FROM orders JOIN dbo.secret_tvf() x ON 1 = 1"),
            vec!["orders", "dbo.secret_tvf"]
        );
    }

    #[test]
    fn list_continues_after_table_function() {
        assert_eq!(
            tables("SELECT * FROM generate_series(1, 2) g, secret"),
            vec!["generate_series", "secret"]
        );
    }

    #[test]
    fn function_arguments_are_not_tables() {
        assert_eq!(
            tables("SELECT * FROM unnest_rows((SELECT id FROM staging)) r, orders"),
            vec!["unnest_rows", "orders", "staging"]
        );
    }

    #[test]
    fn legacy_hint_without_with() {
        let tokens = SqlTokenizer::from_dialect(&DialectConfig::MsSql)
            .tokenize("SELECT * FROM secret (NOLOCK), orders")
            .unwrap();

        let names: Vec<String> = extract_tables(&tokens).iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["secret", "orders"]);
    }

    #[test]
    fn with_hints_then_next_table() {
        let tokens = SqlTokenizer::from_dialect(&DialectConfig::MsSql)
            .tokenize("SELECT * FROM orders o WITH (NOLOCK), secret s WITH (NOLOCK, INDEX(ix_id))")
            .unwrap();

        let names: Vec<String> = extract_tables(&tokens).iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["orders", "secret"]);
    }

    #[test]
    fn delete_from_target() {
        assert_eq!(tables("DELETE FROM orders WHERE id = 1"), vec!["orders"]);
    }

    #[test]
    fn bracketed_mssql_names() {
        let tokens = SqlTokenizer::from_dialect(&DialectConfig::MsSql)
            .tokenize("SELECT TOP 10 * FROM [dbo].[orders] WITH (NOLOCK)")
            .unwrap();

        let refs = extract_tables(&tokens);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].simple(), "orders");
        assert_eq!(refs[0].qualified().as_deref(), Some("dbo.orders"));
    }

    #[test]
    fn simple_and_qualified_forms() {
        let table = TableRef::new(vec!["sales".to_string(), "orders".to_string()]);
        assert_eq!(table.simple(), "orders");
        assert_eq!(table.qualified().as_deref(), Some("sales.orders"));
        assert!(table.is_qualified());

        let bare = TableRef::new(vec!["orders".to_string()]);
        assert_eq!(bare.qualified(), None);
    }
}
