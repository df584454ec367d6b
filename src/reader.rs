// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reader and printer for the textual policy notation.
//!
//! The notation is a small EDN dialect: `[..]` or `(..)` vectors, `{..}`
//! maps, `#{..}` sets, JSON strings and numbers, `true`, `false`, `nil` and
//! `:keywords`. Keywords and bare words read as strings.

use crate::lexer::*;
use crate::*;

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};

/// Read a single value from `text`. Trailing input is an error.
pub fn read(file: &str, text: &str) -> Result<Value> {
    let source = Source::from_contents(file.to_string(), text.to_string())?;
    let mut reader = Reader::new(&source)?;
    let value = reader.read_value()?;
    if reader.tok.0 != TokenKind::Eof {
        bail!(reader.tok.1.error("unexpected input after expression"));
    }
    Ok(value)
}

struct Reader<'source> {
    lexer: Lexer<'source>,
    tok: Token,
}

impl<'source> Reader<'source> {
    fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self { lexer, tok })
    }

    fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn read_value(&mut self) -> Result<Value> {
        let kind = self.tok.0.clone();
        let span = self.tok.1.clone();
        let value = match (kind, span.text()) {
            (TokenKind::Symbol, "[") => return self.read_seq("]"),
            (TokenKind::Symbol, "(") => return self.read_seq(")"),
            (TokenKind::Symbol, "#{") => {
                let items = self.read_items("}")?;
                return Ok(Value::from(items.into_iter().collect::<BTreeSet<_>>()));
            }
            (TokenKind::Symbol, "{") => return self.read_map(),
            (TokenKind::Symbol, s) => bail!(span.error(&format!("unexpected `{s}`"))),
            (TokenKind::String, _) => {
                let contents = span.source.contents();
                let quoted = &contents[span.start as usize - 1..span.end as usize + 1];
                match serde_json::from_str::<String>(quoted) {
                    Ok(s) => Value::from(s),
                    Err(e) => bail!(span.error(&format!("invalid string. {e}"))),
                }
            }
            (TokenKind::Number, text) => match text.parse::<Number>() {
                Ok(n) => Value::from(n),
                Err(e) => bail!(span.error(&e.to_string())),
            },
            (TokenKind::Keyword, text) => Value::from(text),
            (TokenKind::Word, "true") => Value::Bool(true),
            (TokenKind::Word, "false") => Value::Bool(false),
            (TokenKind::Word, "nil") => Value::Null,
            (TokenKind::Word, text) => Value::from(text),
            (TokenKind::Eof, _) => bail!(span.error("unexpected end of input")),
        };
        self.next_token()?;
        Ok(value)
    }

    fn read_items(&mut self, close: &str) -> Result<Vec<Value>> {
        let open = self.tok.1.clone();
        self.next_token()?;
        let mut items = vec![];
        loop {
            match self.tok.0 {
                TokenKind::Symbol if self.tok.1.text() == close => break,
                TokenKind::Eof => bail!(open.error(&format!("missing `{close}`"))),
                _ => items.push(self.read_value()?),
            }
        }
        self.next_token()?;
        Ok(items)
    }

    fn read_seq(&mut self, close: &str) -> Result<Value> {
        Ok(Value::from(self.read_items(close)?))
    }

    fn read_map(&mut self) -> Result<Value> {
        let open = self.tok.1.clone();
        let items = self.read_items("}")?;
        if items.len() % 2 != 0 {
            bail!(open.error("map literal must contain an even number of forms"));
        }
        let mut map = BTreeMap::new();
        let mut items = items.into_iter();
        while let (Some(k), Some(v)) = (items.next(), items.next()) {
            map.insert(k, v);
        }
        Ok(Value::from(map))
    }
}

fn is_keyword(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

fn write_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    match serde_json::to_string(s) {
        Ok(quoted) => f.write_str(&quoted),
        Err(_) => Err(fmt::Error),
    }
}

/// Write a path key or operator: `:name` when it reads back as the same string.
pub fn write_key(f: &mut fmt::Formatter<'_>, key: &Value) -> fmt::Result {
    match key {
        Value::String(s) if is_keyword(s) => write!(f, ":{s}"),
        _ => write_value(f, key),
    }
}

/// Write a value in policy notation.
pub fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    fn write_all<'a>(
        f: &mut fmt::Formatter<'_>,
        items: impl Iterator<Item = &'a Value>,
    ) -> fmt::Result {
        for (idx, item) in items.enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write_value(f, item)?;
        }
        Ok(())
    }

    match value {
        Value::Null => f.write_str("nil"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => write_str(f, s),
        Value::Array(items) => {
            f.write_str("[")?;
            write_all(f, items.iter())?;
            f.write_str("]")
        }
        Value::Set(items) => {
            f.write_str("#{")?;
            write_all(f, items.iter())?;
            f.write_str("}")
        }
        Value::Object(fields) => {
            f.write_str("{")?;
            for (idx, (k, v)) in fields.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write_key(f, k)?;
                f.write_str(" ")?;
                write_value(f, v)?;
            }
            f.write_str("}")
        }
    }
}

/// Adapter to render a value in policy notation with `{}`.
pub struct Notation<'a>(pub &'a Value);

impl fmt::Display for Notation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0)
    }
}
