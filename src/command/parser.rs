//! Recursive-descent parser for single command lines.
//!
//! [`parse`] is a pure function of its input. It never panics and never
//! guesses: anything it cannot read yields a [`ParseDiagnostic`] naming what
//! was expected and where. Text following a complete command is ignored, so
//! generator commentary such as `add component Device:R at 0,0 (pull-up)`
//! still parses.
//!
//! Markdown artifacts (bold markers, list numbering) are the miner's job and
//! are not handled here.

use std::fmt;

use super::lexer::{column, tokenize, Token, TokenKind};
use super::{Action, ComponentId, LibraryId, ListTarget, Point};

/// Why a line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The line has no tokens.
    Empty,
    /// The first word is not a known command verb.
    UnknownCommand,
    /// The line ended before the command was complete.
    Incomplete,
    /// A token did not match what the grammar expects.
    Unexpected,
    /// A coordinate or width is not an integer.
    InvalidNumber,
    /// A trace coordinate or width is negative.
    NegativeValue,
    /// A reference or name contains characters the grammar does not admit.
    InvalidName,
}

/// A structured parse rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Rejection category.
    pub kind: ParseErrorKind,
    /// Human-readable description.
    pub message: String,
    /// 1-based character column, if the rejection points at a token.
    pub column: Option<usize>,
}

impl ParseDiagnostic {
    fn new(kind: ParseErrorKind, message: impl Into<String>, column: Option<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            column,
        }
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(f, "{} at column {col}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseDiagnostic {}

type ParseResult<T> = Result<T, ParseDiagnostic>;

/// Parses one command line into an [`Action`].
///
/// # Errors
///
/// Returns a [`ParseDiagnostic`] if the line is not a complete command.
pub fn parse(line: &str) -> ParseResult<Action> {
    Parser::new(line).command()
}

struct Parser<'a> {
    line: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            tokens: tokenize(line),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn previous(&self) -> Option<Token<'a>> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat_keyword(&mut self, keywords: &[&str]) -> Option<Token<'a>> {
        let token = self.peek()?;
        if keywords.iter().any(|kw| token.is_keyword(kw)) {
            self.pos += 1;
            return Some(token);
        }
        None
    }

    fn eat_kind(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let token = self.peek()?;
        if token.kind == kind {
            self.pos += 1;
            return Some(token);
        }
        None
    }

    fn eat_other(&mut self, text: &str) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Other && token.text == text => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn incomplete(expected: &str) -> ParseDiagnostic {
        ParseDiagnostic::new(
            ParseErrorKind::Incomplete,
            format!("expected {expected}"),
            None,
        )
    }

    fn unexpected(&self, token: Token<'_>, expected: &str) -> ParseDiagnostic {
        ParseDiagnostic::new(
            ParseErrorKind::Unexpected,
            format!("expected {expected}, found '{}'", token.text),
            Some(column(self.line, token.start)),
        )
    }

    fn expect_keyword(&mut self, keywords: &[&str], expected: &str) -> ParseResult<Token<'a>> {
        if let Some(token) = self.eat_keyword(keywords) {
            return Ok(token);
        }
        match self.peek() {
            Some(token) => Err(self.unexpected(token, expected)),
            None => Err(Self::incomplete(expected)),
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token<'a>> {
        if let Some(token) = self.eat_kind(kind) {
            return Ok(token);
        }
        match self.peek() {
            Some(token) => Err(self.unexpected(token, expected)),
            None => Err(Self::incomplete(expected)),
        }
    }

    fn integer(&mut self, expected: &str) -> ParseResult<i64> {
        let token = self.expect_kind(TokenKind::Word, expected)?;
        token.text.parse::<i64>().map_err(|_| {
            ParseDiagnostic::new(
                ParseErrorKind::InvalidNumber,
                format!("'{}' is not an integer", token.text),
                Some(column(self.line, token.start)),
            )
        })
    }

    /// `<x>,<y>`, optionally wrapped in parentheses.
    fn point(&mut self) -> ParseResult<Point> {
        let parenthesised = self.eat_other("(");
        let x = self.integer("x coordinate")?;
        self.expect_kind(TokenKind::Comma, "','")?;
        let y = self.integer("y coordinate")?;
        if parenthesised && !self.eat_other(")") {
            return match self.peek() {
                Some(token) => Err(self.unexpected(token, "')'")),
                None => Err(Self::incomplete("')'")),
            };
        }
        Ok(Point::new(x, y))
    }

    fn non_negative_point(&mut self) -> ParseResult<Point> {
        let start = self.peek();
        let point = self.point()?;
        if point.x < 0 || point.y < 0 {
            return Err(ParseDiagnostic::new(
                ParseErrorKind::NegativeValue,
                format!("trace coordinates must be non-negative, got {point}"),
                start.map(|t| column(self.line, t.start)),
            ));
        }
        Ok(point)
    }

    /// A library nickname or item name: a word, optionally followed by
    /// directly adjacent `.word` segments (`SOIC-8_3.9x4.9mm`).
    fn name(&mut self, expected: &str) -> ParseResult<String> {
        let first = self.expect_kind(TokenKind::Word, expected)?;
        if !is_name(first.text) {
            return Err(self.invalid_name(first, expected));
        }

        let mut end = first.end;
        while let (Some(dot), Some(word)) = (
            self.tokens.get(self.pos).copied(),
            self.tokens.get(self.pos + 1).copied(),
        ) {
            if dot.kind != TokenKind::Dot
                || word.kind != TokenKind::Word
                || dot.start != end
                || !dot.touches(&word)
            {
                break;
            }
            end = word.end;
            self.pos += 2;
        }

        Ok(self.line[first.start..end].to_string())
    }

    /// A reference designator or similar identifier.
    fn identifier(&mut self, expected: &str) -> ParseResult<String> {
        let token = self.expect_kind(TokenKind::Word, expected)?;
        if !is_identifier(token.text) {
            return Err(self.invalid_name(token, expected));
        }
        Ok(token.text.to_string())
    }

    fn invalid_name(&self, token: Token<'_>, expected: &str) -> ParseDiagnostic {
        ParseDiagnostic::new(
            ParseErrorKind::InvalidName,
            format!("'{}' is not a valid {expected}", token.text),
            Some(column(self.line, token.start)),
        )
    }

    fn command(mut self) -> ParseResult<Action> {
        let Some(verb) = self.advance() else {
            return Err(ParseDiagnostic::new(
                ParseErrorKind::Empty,
                "empty command",
                None,
            ));
        };

        if verb.kind == TokenKind::Question {
            return Ok(Action::Help);
        }
        if verb.kind != TokenKind::Word {
            return Err(self.unknown(verb));
        }

        match verb.text.to_ascii_lowercase().as_str() {
            "add" => {
                let noun = self.expect_keyword(
                    &["component", "symbol", "trace"],
                    "'component' or 'trace'",
                )?;
                if noun.is_keyword("trace") {
                    self.add_trace()
                } else {
                    self.add_component()
                }
            }
            "place" => {
                self.eat_keyword(&["component", "symbol"]);
                self.add_component()
            }
            "connect" | "wire" => self.connect(),
            "modify" | "change" => {
                let noun = self.expect_keyword(
                    &["component", "footprint"],
                    "'component' or 'footprint'",
                )?;
                if noun.is_keyword("component") {
                    let refdes = self.identifier("reference designator")?;
                    Ok(Action::ModifyComponent { refdes })
                } else {
                    let name = self.name("footprint name")?;
                    Ok(Action::ModifyFootprint { name })
                }
            }
            "help" => Ok(Action::Help),
            "list" => self.list(),
            "query" | "search" => self.query(verb),
            _ => Err(self.unknown(verb)),
        }
    }

    fn unknown(&self, verb: Token<'_>) -> ParseDiagnostic {
        ParseDiagnostic::new(
            ParseErrorKind::UnknownCommand,
            format!("unknown command '{}'", verb.text),
            Some(column(self.line, verb.start)),
        )
    }

    fn add_component(&mut self) -> ParseResult<Action> {
        let first = self.name("component name")?;
        let id = if let Some(colon) = self.eat_kind(TokenKind::Colon) {
            let Some(word) = self.peek() else {
                return Err(Self::incomplete("symbol name after ':'"));
            };
            if !colon.touches(&word) {
                return Err(self.unexpected(word, "symbol name directly after ':'"));
            }
            let item = self.name("symbol name")?;
            ComponentId::Qualified(LibraryId::new(first, item))
        } else {
            ComponentId::Bare(first)
        };

        let at = if self.eat_keyword(&["at"]).is_some() {
            Some(self.point()?)
        } else {
            None
        };

        Ok(Action::AddComponent { id, at })
    }

    /// `<ref>.<pin>` or `<ref> pin <pin>`.
    fn endpoint(&mut self) -> ParseResult<(String, String)> {
        let reference = self.identifier("reference designator")?;
        let ref_token = self.previous();

        if let Some(dot) = self.peek().filter(|t| t.kind == TokenKind::Dot) {
            if ref_token.is_some_and(|r| r.touches(&dot)) {
                self.pos += 1;
                let pin = self.expect_kind(TokenKind::Word, "pin after '.'")?;
                return Ok((reference, pin.text.to_string()));
            }
        }

        if self.eat_keyword(&["pin"]).is_some() {
            let pin = self.expect_kind(TokenKind::Word, "pin name or number")?;
            return Ok((reference, pin.text.to_string()));
        }

        match self.peek() {
            Some(token) => Err(self.unexpected(token, "'.<pin>' or 'pin <pin>'")),
            None => Err(Self::incomplete("'.<pin>' or 'pin <pin>'")),
        }
    }

    fn connect(&mut self) -> ParseResult<Action> {
        let (ref1, pin1) = self.endpoint()?;
        self.expect_keyword(&["to"], "'to'")?;
        let (ref2, pin2) = self.endpoint()?;
        Ok(Action::Connect {
            ref1,
            pin1,
            ref2,
            pin2,
        })
    }

    fn add_trace(&mut self) -> ParseResult<Action> {
        self.expect_keyword(&["from"], "'from'")?;
        let start = self.non_negative_point()?;
        self.expect_keyword(&["to"], "'to'")?;
        let end = self.non_negative_point()?;

        let width = if self.eat_keyword(&["width"]).is_some() {
            let token = self.peek();
            let width = self.integer("trace width")?;
            if width < 0 {
                return Err(ParseDiagnostic::new(
                    ParseErrorKind::NegativeValue,
                    format!("trace width must be non-negative, got {width}"),
                    token.map(|t| column(self.line, t.start)),
                ));
            }
            Some(width)
        } else {
            None
        };

        Ok(Action::AddTrace { start, end, width })
    }

    fn list(&mut self) -> ParseResult<Action> {
        let noun = self.expect_keyword(
            &[
                "components",
                "component",
                "libraries",
                "library",
                "symbols",
                "footprints",
                "footprint",
            ],
            "'components', 'libraries' or 'footprints'",
        )?;
        let text = noun.text.to_ascii_lowercase();
        let target = if text.starts_with("component") {
            ListTarget::Components
        } else if text.starts_with("footprint") {
            ListTarget::Footprints
        } else {
            ListTarget::Libraries
        };
        Ok(Action::List { target })
    }

    fn query(&mut self, verb: Token<'_>) -> ParseResult<Action> {
        let term = self.line[verb.end..].trim().trim_matches('"').trim();
        if term.is_empty() {
            return Err(Self::incomplete("search term"));
        }
        self.pos = self.tokens.len();
        Ok(Action::Query {
            term: term.to_string(),
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_-]*`
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Library and item names additionally admit a leading digit or `+`
/// (`74xx:74HC00`, `power:+5V`).
fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}
