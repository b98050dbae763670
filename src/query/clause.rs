//! SELECT clause extraction.
//!
//! Clauses may appear in any order. Each clause body runs from its keyword to
//! the nearest boundary keyword in that clause's candidate list (or the end of
//! the query), matched case-insensitively and never inside quotes.

use super::aggregate::Aggregate;
use super::lexer::{find_phrase, phrase_len, tokenize, Token, TokenKind};
use super::sort::{Direction, OrderItem};
use crate::types::error::{EngineError, Result};

const WHERE_BOUNDARIES: &[&str] = &["order by", "group by", "having", "limit"];
const ORDER_BOUNDARIES: &[&str] = &["limit", "offset"];
const GROUP_BOUNDARIES: &[&str] = &["having", "order by", "limit"];
const HAVING_BOUNDARIES: &[&str] = &["order by", "limit"];

/// Parsed SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Select list items as written (`*`, `name`, `sum(amount)`)
    pub fields: Vec<String>,
    pub table: String,
    /// Tables named after `JOIN`; recorded but never read
    pub joins: Vec<String>,
    pub filter: Option<String>,
    pub group_by: Vec<String>,
    /// Aggregate columns found in the select list
    pub aggregates: Vec<Aggregate>,
    pub having: Option<String>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<usize>,
    /// Parsed for completeness; the executor does not apply it
    pub offset: Option<usize>,
}

impl SelectQuery {
    /// Parse a SELECT statement.
    ///
    /// Fails only when no table follows `FROM`.
    pub fn parse(query: &str) -> Result<Self> {
        let tokens = tokenize(query);

        let from = find_phrase(&tokens, 0, "from");
        let table = from
            .and_then(|i| tokens.get(i + 1))
            .filter(|t| matches!(t.kind, TokenKind::Word | TokenKind::Quoted))
            .map(|t| t.unquoted().to_string())
            .ok_or_else(|| EngineError::malformed("No table specified in FROM clause"))?;

        let fields = match (tokens.first(), from) {
            (Some(first), Some(from)) if first.is_keyword("select") && from > 1 => {
                split_list(span_text(query, &tokens[1..from]))
            }
            _ => Vec::new(),
        };
        let aggregates = fields.iter().filter_map(|f| Aggregate::parse(f)).collect();

        let joins = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_keyword("join"))
            .filter_map(|(i, _)| tokens.get(i + 1))
            .map(|t| t.unquoted().to_string())
            .collect();

        let order_by = clause_body(query, &tokens, "order by", ORDER_BOUNDARIES)
            .map(parse_order_items)
            .unwrap_or_default();
        let group_by = clause_body(query, &tokens, "group by", GROUP_BOUNDARIES)
            .map(split_list)
            .unwrap_or_default();

        Ok(Self {
            fields,
            table,
            joins,
            filter: clause_body(query, &tokens, "where", WHERE_BOUNDARIES).map(str::to_string),
            group_by,
            aggregates,
            having: clause_body(query, &tokens, "having", HAVING_BOUNDARIES).map(str::to_string),
            order_by,
            limit: numeric_argument(&tokens, "limit"),
            offset: numeric_argument(&tokens, "offset"),
        })
    }
}

/// Source text covered by a run of tokens.
fn span_text<'a>(query: &'a str, tokens: &[Token<'_>]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &query[first.start..last.end],
        _ => "",
    }
}

/// Body text of a clause, or `None` if the keyword is absent or the body is empty.
fn clause_body<'a>(
    query: &'a str,
    tokens: &[Token<'_>],
    keyword: &str,
    boundaries: &[&str],
) -> Option<&'a str> {
    let start = find_phrase(tokens, 0, keyword)? + phrase_len(keyword);
    let mut end = boundaries
        .iter()
        .filter_map(|b| find_phrase(tokens, start, b))
        .min()
        .unwrap_or(tokens.len());
    while end > start && tokens[end - 1].kind == TokenKind::Semicolon {
        end -= 1;
    }
    if start >= end {
        return None;
    }
    let body = span_text(query, &tokens[start..end]).trim();
    (!body.is_empty()).then_some(body)
}

/// Integer token following a keyword; anything else is ignored.
fn numeric_argument(tokens: &[Token<'_>], keyword: &str) -> Option<usize> {
    let at = find_phrase(tokens, 0, keyword)?;
    tokens.get(at + 1)?.text.parse().ok()
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split ORDER BY items; a trailing `asc`/`desc` word sets the direction.
fn parse_order_items(text: &str) -> Vec<OrderItem> {
    split_list(text)
        .into_iter()
        .map(|item| {
            let mut words: Vec<&str> = item.split_whitespace().collect();
            let direction = match words.last() {
                Some(w) if w.eq_ignore_ascii_case("desc") => Some(Direction::Desc),
                Some(w) if w.eq_ignore_ascii_case("asc") => Some(Direction::Asc),
                _ => None,
            };
            if direction.is_some() && words.len() > 1 {
                words.pop();
            }
            OrderItem {
                field: words.join(" "),
                direction: direction.unwrap_or_default(),
            }
        })
        .collect()
}
