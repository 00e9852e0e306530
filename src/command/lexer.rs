//! Tokenizer for command lines.
//!
//! Splits a single line into words and punctuation, keeping byte spans so the
//! parser can check adjacency (`U1.VIN` vs `U1 . VIN`) and report columns.

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of `[A-Za-z0-9_+-]`.
    Word,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `?`
    Question,
    /// Any other non-whitespace character.
    Other,
}

/// A token with its byte span in the source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token category.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl<'a> Token<'a> {
    /// Returns `true` if this is a word equal to `keyword`, ignoring ASCII case.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Returns `true` if `next` starts exactly where this token ends.
    #[must_use]
    pub const fn touches(&self, next: &Token<'a>) -> bool {
        self.end == next.start
    }
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')
}

/// Splits `line` into tokens. Whitespace separates tokens and is dropped.
#[must_use]
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if is_word_char(c) {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !is_word_char(next) {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Word,
                text: &line[start..end],
                start,
                end,
            });
            continue;
        }

        let kind = match c {
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '?' => TokenKind::Question,
            _ => TokenKind::Other,
        };
        let end = start + c.len_utf8();
        tokens.push(Token {
            kind,
            text: &line[start..end],
            start,
            end,
        });
    }

    tokens
}

/// Converts a byte offset into a 1-based character column.
#[must_use]
pub fn column(line: &str, offset: usize) -> usize {
    line.get(..offset).map_or(offset, |prefix| prefix.chars().count()) + 1
}
