//! Quote-aware tokenizer for query text.
//!
//! Tokens keep their byte span in the source, so clause bodies can be cut out
//! of the original text verbatim while keyword detection ignores anything
//! inside quotes.

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted run of characters other than whitespace, `,`, `(`, `)` and `;`
    Word,
    /// `'...'` or `"..."` including the quotes
    Quoted,
    Comma,
    LParen,
    RParen,
    Semicolon,
}

/// One token and where it sits in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    /// Case-insensitive comparison for unquoted words.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Text with one layer of surrounding quotes removed.
    pub fn unquoted(&self) -> &'a str {
        match self.kind {
            TokenKind::Quoted if self.text.len() >= 2 => &self.text[1..self.text.len() - 1],
            TokenKind::Quoted => &self.text[1..],
            _ => self.text,
        }
    }
}

/// Split `source` into tokens.
///
/// An unterminated quote runs to the end of the input.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let punct = match c {
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punct {
            chars.next();
            let end = start + c.len_utf8();
            tokens.push(Token { kind, text: &source[start..end], start, end });
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut end = source.len();
            for (i, ch) in chars.by_ref() {
                if ch == c {
                    end = i + ch.len_utf8();
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Quoted,
                text: &source[start..end],
                start,
                end,
            });
            continue;
        }

        let mut end = source.len();
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() || matches!(ch, ',' | '(' | ')' | ';' | '\'' | '"') {
                end = i;
                break;
            }
            chars.next();
        }
        tokens.push(Token {
            kind: TokenKind::Word,
            text: &source[start..end],
            start,
            end,
        });
    }

    tokens
}

/// Index of the first token at or after `from` that starts `phrase`.
///
/// `phrase` is a space-separated keyword sequence such as `"order by"`.
pub fn find_phrase(tokens: &[Token<'_>], from: usize, phrase: &str) -> Option<usize> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    (from..tokens.len()).find(|&i| {
        words
            .iter()
            .enumerate()
            .all(|(k, word)| tokens.get(i + k).map_or(false, |t| t.is_keyword(word)))
    })
}

/// Number of tokens a keyword phrase occupies.
pub fn phrase_len(phrase: &str) -> usize {
    phrase.split_whitespace().count()
}
