//! Statement kinds other than SELECT, and dispatch by leading keyword.

use super::clause::SelectQuery;
use super::lexer::{find_phrase, tokenize, Token, TokenKind};
use crate::types::error::{EngineError, Result};
use crate::types::record::Record;
use serde_json::{Number, Value};

/// A parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
}

impl Statement {
    /// Parse a statement, choosing its kind from the first keyword.
    pub fn parse(sql: &str) -> Result<Self> {
        let tokens = tokenize(sql);
        let first = tokens
            .first()
            .ok_or_else(|| EngineError::malformed("Empty query"))?;

        match first.text.to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select(SelectQuery::parse(sql)?)),
            "insert" => Ok(Self::Insert(InsertStatement::parse(sql, &tokens)?)),
            "update" => Ok(Self::Update(UpdateStatement::parse(sql, &tokens)?)),
            "delete" => Ok(Self::Delete(DeleteStatement::parse(sql, &tokens)?)),
            "create" => Ok(Self::CreateTable(CreateTableStatement::parse(sql, &tokens)?)),
            other => Err(EngineError::unsupported(format!("SQL statement '{}'", other))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::CreateTable(_) => "create",
        }
    }

    /// Target table.
    pub fn table(&self) -> &str {
        match self {
            Self::Select(q) => &q.table,
            Self::Insert(s) => &s.table,
            Self::Update(s) => &s.table,
            Self::Delete(s) => &s.table,
            Self::CreateTable(s) => &s.table,
        }
    }
}

/// `INSERT INTO t [(cols)] VALUES (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Column values; `{"data": "<raw>"}` when no column list was given
    pub values: Record,
}

impl InsertStatement {
    fn parse(sql: &str, tokens: &[Token<'_>]) -> Result<Self> {
        let into = find_phrase(tokens, 0, "into")
            .ok_or_else(|| EngineError::malformed("INSERT requires INTO <table>"))?;
        let table = table_after(tokens, into, "INSERT INTO")?;

        let columns: Vec<String> = match tokens.get(into + 2) {
            Some(t) if t.kind == TokenKind::LParen => paren_groups(sql, tokens, into + 2)
                .into_iter()
                .map(|c| unquote(c).to_string())
                .collect(),
            _ => Vec::new(),
        };

        let mut values = Record::new();
        if let Some(at) = find_phrase(tokens, into + 2, "values") {
            let open = at + 1;
            if tokens.get(open).map(|t| t.kind) != Some(TokenKind::LParen) {
                return Err(EngineError::malformed("VALUES requires a parenthesized list"));
            }
            let items = paren_groups(sql, tokens, open);
            if columns.is_empty() {
                values.insert("data".to_string(), Value::String(paren_body(sql, tokens, open)));
            } else if columns.len() != items.len() {
                return Err(EngineError::malformed(format!(
                    "INSERT has {} columns but {} values",
                    columns.len(),
                    items.len()
                )));
            } else {
                for (column, item) in columns.into_iter().zip(items) {
                    values.insert(column, parse_literal(item));
                }
            }
        }

        Ok(Self { table, values })
    }
}

/// `UPDATE t SET a = 1, b = 'x' [WHERE cond]`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Record,
    pub filter: Option<String>,
}

impl UpdateStatement {
    fn parse(sql: &str, tokens: &[Token<'_>]) -> Result<Self> {
        let table = table_after(tokens, 0, "UPDATE")?;
        let set = find_phrase(tokens, 2, "set")
            .ok_or_else(|| EngineError::malformed("UPDATE requires SET"))?;
        let where_at = find_phrase(tokens, set + 1, "where");
        let set_end = where_at.unwrap_or(tokens.len());

        let mut assignments = Record::new();
        for item in split_top_level(sql, &tokens[set + 1..trim_semicolons(tokens, set + 1, set_end)]) {
            let (field, value) = item
                .split_once('=')
                .ok_or_else(|| EngineError::malformed(format!("Bad SET assignment: {}", item)))?;
            let field = unquote(field.trim());
            if field.is_empty() {
                return Err(EngineError::malformed(format!("Bad SET assignment: {}", item)));
            }
            assignments.insert(field.to_string(), parse_literal(value.trim()));
        }
        if assignments.is_empty() {
            return Err(EngineError::malformed("UPDATE SET has no assignments"));
        }

        Ok(Self {
            table,
            assignments,
            filter: where_at.and_then(|at| tail_text(sql, tokens, at + 1)),
        })
    }
}

/// `DELETE FROM t [WHERE cond]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub filter: Option<String>,
}

impl DeleteStatement {
    fn parse(sql: &str, tokens: &[Token<'_>]) -> Result<Self> {
        let from = find_phrase(tokens, 0, "from")
            .ok_or_else(|| EngineError::malformed("DELETE requires FROM <table>"))?;
        let table = table_after(tokens, from, "DELETE FROM")?;
        let filter = find_phrase(tokens, from + 2, "where")
            .and_then(|at| tail_text(sql, tokens, at + 1));
        Ok(Self { table, filter })
    }
}

/// `CREATE TABLE t (col def, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table: String,
    /// Column definitions as written
    pub columns: Vec<String>,
}

impl CreateTableStatement {
    fn parse(sql: &str, tokens: &[Token<'_>]) -> Result<Self> {
        if !tokens.get(1).map_or(false, |t| t.is_keyword("table")) {
            let object = tokens.get(1).map_or("", |t| t.text);
            return Err(EngineError::unsupported(format!("CREATE {}", object)));
        }

        let at = if find_phrase(tokens, 2, "if not exists") == Some(2) { 4 } else { 1 };
        let table = table_after(tokens, at, "CREATE TABLE")?;

        let columns: Vec<String> = match tokens.get(at + 2) {
            Some(t) if t.kind == TokenKind::LParen => paren_groups(sql, tokens, at + 2)
                .into_iter()
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self { table, columns })
    }
}

fn table_after(tokens: &[Token<'_>], at: usize, context: &str) -> Result<String> {
    tokens
        .get(at + 1)
        .filter(|t| matches!(t.kind, TokenKind::Word | TokenKind::Quoted))
        .map(|t| t.unquoted().to_string())
        .ok_or_else(|| EngineError::malformed(format!("{} requires a table name", context)))
}

fn trim_semicolons(tokens: &[Token<'_>], start: usize, mut end: usize) -> usize {
    while end > start && tokens[end - 1].kind == TokenKind::Semicolon {
        end -= 1;
    }
    end
}

/// Source text from token `start` to the end, minus trailing semicolons.
fn tail_text(sql: &str, tokens: &[Token<'_>], start: usize) -> Option<String> {
    let end = trim_semicolons(tokens, start, tokens.len());
    if start >= end {
        return None;
    }
    let text = sql[tokens[start].start..tokens[end - 1].end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Index of the token closing the parenthesis opened at `open`.
fn matching_paren(tokens: &[Token<'_>], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        match t.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Raw text between the parenthesis at `open` and its match.
fn paren_body(sql: &str, tokens: &[Token<'_>], open: usize) -> String {
    let close = matching_paren(tokens, open);
    let start = tokens[open].end;
    let end = tokens.get(close).map_or(sql.len(), |t| t.start);
    sql[start..end.max(start)].trim().to_string()
}

/// Comma-separated items inside the parenthesis at `open`.
fn paren_groups<'a>(sql: &'a str, tokens: &[Token<'_>], open: usize) -> Vec<&'a str> {
    let close = matching_paren(tokens, open);
    split_top_level(sql, &tokens[open + 1..close.min(tokens.len())])
}

/// Split a token run on commas that are not nested in parentheses.
fn split_top_level<'a>(sql: &'a str, tokens: &[Token<'_>]) -> Vec<&'a str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut item_start: Option<usize> = None;
    let mut item_end = 0;

    for t in tokens {
        match t.kind {
            TokenKind::Comma if depth == 0 => {
                if let Some(start) = item_start.take() {
                    items.push(sql[start..item_end].trim());
                }
                continue;
            }
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        item_start.get_or_insert(t.start);
        item_end = t.end;
    }
    if let Some(start) = item_start {
        items.push(sql[start..item_end].trim());
    }
    items
}

fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'\'' || first == b'"') {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Type a literal: quoted string, integer, float, boolean, null, or bare text.
pub fn parse_literal(text: &str) -> Value {
    let text = text.trim();
    let unquoted = unquote(text);
    if unquoted.len() != text.len() {
        return Value::String(unquoted.to_string());
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}
