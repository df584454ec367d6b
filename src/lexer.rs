// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions)]

use crate::*;
use core::fmt::{self, Debug, Formatter};

use anyhow::{anyhow, bail, Result};

struct SourceText {
    name: String,
    text: String,
    // Byte offset of the first character of every line.
    line_starts: Vec<u32>,
}

/// Policy text shared by every span that points into it.
#[derive(Clone)]
pub struct Source {
    inner: Rc<SourceText>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

impl Source {
    /// Wrap `text`, which is identified by `name` in diagnostics.
    pub fn from_contents(name: String, text: String) -> Result<Source> {
        if text.len() >= u32::MAX as usize {
            bail!("{name} is too large to be read as a policy");
        }
        let line_starts = core::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i as u32 + 1))
            .collect();
        Ok(Source {
            inner: Rc::new(SourceText {
                name,
                text,
                line_starts,
            }),
        })
    }

    pub fn file(&self) -> &String {
        &self.inner.name
    }

    pub fn contents(&self) -> &String {
        &self.inner.text
    }

    /// Text of the 1-based line `line`, without its terminator.
    pub fn line(&self, line: u32) -> &str {
        let starts = &self.inner.line_starts;
        let Some(&start) = starts.get((line as usize).wrapping_sub(1)) else {
            return "";
        };
        let end = starts
            .get(line as usize)
            .map_or(self.inner.text.len(), |&next| next as usize - 1);
        self.inner.text[start as usize..end].trim_end_matches('\r')
    }

    /// Render a diagnostic pointing at `line`:`col`.
    ///
    /// ```text
    /// <policy>:1:10: error: unmatched "
    ///   |
    /// 1 | [:= [:a] "abc]
    ///   |          ^
    /// ```
    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        let number = line.to_string();
        let gutter = " ".repeat(number.len());
        let pad = " ".repeat(col.saturating_sub(1) as usize);
        format!(
            "{}:{line}:{col}: {kind}: {msg}\n{gutter} |\n{number} | {}\n{gutter} | {pad}^",
            self.inner.name,
            self.line(line),
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

/// A range of bytes in a [`Source`], along with the line and column where it starts.
#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text: String = self.text().chars().take(32).collect();
        write!(
            f,
            "{}:{} {:?}{}",
            self.line,
            self.col,
            text,
            if text.len() < self.text().len() { "..." } else { "" }
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    /// `[ ] ( ) { }` and the set opener `#{`.
    Symbol,
    /// Double-quoted string. The span excludes the quotes.
    String,
    Number,
    /// `:name`. The span excludes the colon.
    Keyword,
    /// Bare word such as `true`, `nil` or `and`.
    Word,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

/// Characters that may appear in keywords and bare words.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || "-_./?!*+<>=&%$'".contains(ch)
}

/// Splits policy text into tokens. Commas are whitespace and `;` starts a
/// comment that runs to the end of the line.
#[derive(Clone)]
pub struct Lexer<'source> {
    source: &'source Source,
    text: &'source str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source,
            text: source.contents(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn rest(&self) -> &'source str {
        &self.text[self.pos..]
    }

    fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn lookahead(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.current().is_some_and(&pred) {
            self.advance();
        }
    }

    fn fail<T>(&self, line: u32, col: u32, msg: &str) -> Result<T> {
        Err(self.source.error(line, col, msg))
    }

    fn token(&self, kind: TokenKind, line: u32, col: u32, start: usize, end: usize) -> Token {
        Token(
            kind,
            Span {
                source: self.source.clone(),
                line,
                col,
                start: start as u32,
                end: end as u32,
            },
        )
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                Some(ch) if ch.is_whitespace() || ch == ',' => {
                    self.advance();
                }
                Some(';') => self.advance_while(|ch| ch != '\n'),
                _ => return,
            }
        }
    }

    fn keyword(&mut self, line: u32, col: u32) -> Result<Token> {
        self.advance();
        let start = self.pos;
        self.advance_while(is_word_char);
        if self.pos == start {
            return self.fail(line, col, "empty keyword");
        }
        Ok(self.token(TokenKind::Keyword, line, col, start, self.pos))
    }

    // Numbers follow the JSON grammar.
    fn number(&mut self, line: u32, col: u32) -> Result<Token> {
        let start = self.pos;
        if self.current() == Some('-') {
            self.advance();
        }
        if self.advance() != Some('0') {
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        if self.current() == Some('.') && self.lookahead().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        if matches!(self.current(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.current(), Some('+' | '-')) {
                self.advance();
            }
            self.advance_while(|ch| ch.is_ascii_digit());
        }
        let end = self.pos;
        if self
            .current()
            .is_some_and(|ch| ch == '_' || ch == '.' || ch.is_alphanumeric())
        {
            return self.fail(self.line, self.col, "invalid number");
        }
        if let Err(e) = self.text[start..end].parse::<Number>() {
            return self.fail(line, col, &format!("invalid number. {e}"));
        }
        Ok(self.token(TokenKind::Number, line, col, start, end))
    }

    fn string(&mut self, line: u32, col: u32) -> Result<Token> {
        self.advance();
        let start = self.pos;
        loop {
            match self.current() {
                None => return self.fail(line, col, "unmatched \""),
                Some('"') => break,
                Some('\\') => {
                    self.advance();
                    let (esc_line, esc_col) = (self.line, self.col);
                    match self.advance() {
                        Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => (),
                        _ => return self.fail(esc_line, esc_col, "invalid escape sequence"),
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let end = self.pos;
        self.advance();
        Ok(self.token(TokenKind::String, line, col + 1, start, end))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let (line, col, start) = (self.line, self.col, self.pos);

        let Some(ch) = self.current() else {
            return Ok(self.token(TokenKind::Eof, line, col, start, start));
        };
        match (ch, self.lookahead()) {
            ('[' | ']' | '(' | ')' | '{' | '}', _) => {
                self.advance();
                Ok(self.token(TokenKind::Symbol, line, col, start, self.pos))
            }
            ('#', Some('{')) => {
                self.advance();
                self.advance();
                Ok(self.token(TokenKind::Symbol, line, col, start, self.pos))
            }
            (':', _) => self.keyword(line, col),
            ('"', _) => self.string(line, col),
            ('-', Some(next)) if next.is_ascii_digit() => self.number(line, col),
            (digit, _) if digit.is_ascii_digit() => self.number(line, col),
            (word, _) if is_word_char(word) => {
                self.advance_while(is_word_char);
                Ok(self.token(TokenKind::Word, line, col, start, self.pos))
            }
            _ => self.fail(line, col, &format!("unexpected character `{ch}`")),
        }
    }
}
