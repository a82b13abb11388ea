//! SQL tokenizing using sqlparser's dialect-aware tokenizer
//!
//! Statements are reduced to a flat sequence of classified tokens. Whitespace
//! and comments are dropped; every token records its parenthesis depth so
//! callers can tell top-level tokens from nested ones.

use querygate_core::DialectConfig;
use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SnowflakeDialect,
};
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError, Word};

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// SELECT, INSERT, UPDATE or DELETE
    Dml,

    /// Clause-structuring keyword (FROM, JOIN, WHERE, ...)
    Keyword,

    /// Table, column, alias or function name
    Identifier,

    /// String or numeric literal
    Literal,

    /// Operators, commas, periods, parentheses
    Punctuation,
}

/// A classified SQL token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlToken {
    /// Token text; quoted identifiers are stored without their quotes
    pub text: String,

    /// Classification
    pub kind: TokenKind,

    /// Whether this was a quoted identifier
    pub quoted: bool,

    /// Parenthesis nesting depth (0 = top level)
    pub depth: usize,
}

impl SqlToken {
    /// Upper-cased text for keyword comparison
    pub fn normalized(&self) -> String {
        self.text.to_uppercase()
    }

    /// Unquoted word (keyword, DML or identifier)
    pub fn is_bare_word(&self) -> bool {
        !self.quoted
            && matches!(self.kind, TokenKind::Dml | TokenKind::Keyword | TokenKind::Identifier)
    }

    /// Check for a specific keyword, case-insensitively
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.kind, TokenKind::Dml | TokenKind::Keyword)
            && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Check for a specific punctuation symbol
    pub fn is_punct(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == symbol
    }
}

/// Keywords that structure a statement
///
/// Any other unquoted word is an identifier, so non-reserved keywords such as
/// `data` or `user` can still name tables.
const CLAUSE_KEYWORDS: &[Keyword] = &[
    Keyword::FROM,
    Keyword::WHERE,
    Keyword::JOIN,
    Keyword::INNER,
    Keyword::LEFT,
    Keyword::RIGHT,
    Keyword::FULL,
    Keyword::OUTER,
    Keyword::CROSS,
    Keyword::NATURAL,
    Keyword::LATERAL,
    Keyword::APPLY,
    Keyword::ON,
    Keyword::USING,
    Keyword::GROUP,
    Keyword::BY,
    Keyword::ORDER,
    Keyword::HAVING,
    Keyword::LIMIT,
    Keyword::OFFSET,
    Keyword::FETCH,
    Keyword::TOP,
    Keyword::UNION,
    Keyword::EXCEPT,
    Keyword::INTERSECT,
    Keyword::WITH,
    Keyword::AS,
    Keyword::INTO,
    Keyword::VALUES,
    Keyword::SET,
    Keyword::AND,
    Keyword::OR,
    Keyword::NOT,
    Keyword::CASE,
    Keyword::WHEN,
    Keyword::THEN,
    Keyword::ELSE,
    Keyword::END,
    Keyword::IS,
    Keyword::NULL,
    Keyword::IN,
    Keyword::EXISTS,
    Keyword::BETWEEN,
    Keyword::LIKE,
    Keyword::DISTINCT,
    Keyword::ALL,
    Keyword::ANY,
    Keyword::WINDOW,
    Keyword::OVER,
    Keyword::PARTITION,
    Keyword::QUALIFY,
    Keyword::RETURNING,
    Keyword::TABLE,
    Keyword::UNNEST,
    Keyword::MERGE,
    Keyword::CREATE,
    Keyword::ALTER,
    Keyword::DROP,
    Keyword::TRUNCATE,
    Keyword::GRANT,
    Keyword::REVOKE,
    Keyword::EXECUTE,
    Keyword::BEGIN,
    Keyword::COMMIT,
    Keyword::ROLLBACK,
];

fn classify_word(word: &Word) -> TokenKind {
    if word.quote_style.is_some() {
        return TokenKind::Identifier;
    }

    match word.keyword {
        Keyword::SELECT | Keyword::INSERT | Keyword::UPDATE | Keyword::DELETE => TokenKind::Dml,
        Keyword::NoKeyword => TokenKind::Identifier,
        keyword if CLAUSE_KEYWORDS.contains(&keyword) => TokenKind::Keyword,
        _ => TokenKind::Identifier,
    }
}

/// SQL tokenizer with configurable dialect
pub struct SqlTokenizer {
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl SqlTokenizer {
    /// Create a tokenizer with the default (generic) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a tokenizer from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        let dialect: Box<dyn Dialect + Send + Sync> = match dialect {
            DialectConfig::Ansi => Box::new(GenericDialect {}),
            DialectConfig::Postgres => Box::new(PostgreSqlDialect {}),
            DialectConfig::MsSql => Box::new(MsSqlDialect {}),
            DialectConfig::MySql => Box::new(MySqlDialect {}),
            DialectConfig::BigQuery => Box::new(BigQueryDialect {}),
            DialectConfig::Snowflake => Box::new(SnowflakeDialect {}),
        };

        Self { dialect }
    }

    /// Tokenize a statement into classified tokens
    pub fn tokenize(&self, sql: &str) -> Result<Vec<SqlToken>, TokenizeError> {
        let raw = Tokenizer::new(&*self.dialect, sql).tokenize()?;

        let mut tokens = Vec::with_capacity(raw.len());
        let mut depth: usize = 0;

        for token in raw {
            let (text, kind, quoted) = match &token {
                Token::Whitespace(_) | Token::EOF => continue,
                Token::Word(word) => (
                    word.value.clone(),
                    classify_word(word),
                    word.quote_style.is_some(),
                ),
                Token::Number(_, _)
                | Token::SingleQuotedString(_)
                | Token::DoubleQuotedString(_)
                | Token::NationalStringLiteral(_)
                | Token::EscapedStringLiteral(_)
                | Token::HexStringLiteral(_)
                | Token::DollarQuotedString(_) => (token.to_string(), TokenKind::Literal, false),
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    (token.to_string(), TokenKind::Punctuation, false)
                }
                _ => (token.to_string(), TokenKind::Punctuation, false),
            };

            tokens.push(SqlToken {
                text,
                kind,
                quoted,
                depth,
            });

            if token == Token::LParen {
                depth += 1;
            }
        }

        Ok(tokens)
    }
}

impl Default for SqlTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizer failure (unterminated literal, stray quote, ...)
#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("{0}")]
    Tokenizer(#[from] TokenizerError),
}
