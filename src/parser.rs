// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Count, Node, OperatorId, Path, Quantifier};
use crate::operators::operand_kind;
use crate::reader::{read, Notation};
use crate::value::Value;

/// A policy expression that is not well formed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {}", Notation(.offending))]
pub struct ParseError {
    pub reason: String,
    /// The smallest sub-expression the problem was found in.
    pub offending: Value,
}

type Result<T> = core::result::Result<T, ParseError>;

fn error<T>(reason: impl Into<String>, offending: &Value) -> Result<T> {
    Err(ParseError {
        reason: reason.into(),
        offending: offending.clone(),
    })
}

/// Parse policy text such as `[:and [:= [:doc :role] "admin"] ...]`.
pub fn parse_str(text: &str) -> Result<Node> {
    match read("<policy>", text) {
        Ok(expr) => parse(&expr),
        Err(e) => Err(ParseError {
            reason: e.to_string(),
            offending: Value::from(text),
        }),
    }
}

/// Parse a policy expression given as a tagged vector.
///
/// Tags may be written with or without a leading `:`, so JSON input like
/// `["=", ["doc", "role"], "admin"]` is accepted as well.
pub fn parse(expr: &Value) -> Result<Node> {
    let items = match expr {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return error("empty expression", expr),
        _ => return error("expression must be a tagged vector", expr),
    };
    let tag = match &items[0] {
        Value::String(s) => keyword(s),
        _ => return error("expression tag must be a keyword", expr),
    };
    let args = &items[1..];

    match tag {
        "" => error("expression tag must not be empty", expr),
        "and" => Ok(Node::And(parse_all(args)?)),
        "or" => Ok(Node::Or(parse_all(args)?)),
        "not" => match args {
            [child] => Ok(Node::Not(Box::new(parse(child)?))),
            _ => error("`not` takes exactly one expression", expr),
        },
        "forall" => Ok(Node::ForAll(parse_quantifier(tag, args, expr)?)),
        "exists" => Ok(Node::Exists(parse_quantifier(tag, args, expr)?)),
        "count" => parse_count(args, expr),
        "where" => error("`where` is only allowed inside a quantifier", expr),
        op => match args {
            [path, operand] => {
                let path = parse_path(path)?;
                check_operand(op, operand, expr)?;
                Ok(Node::Constraint(Constraint::new(path, op, operand.clone())))
            }
            _ => error(
                format!("constraint `{op}` takes a path and an operand"),
                expr,
            ),
        },
    }
}

fn parse_all(exprs: &[Value]) -> Result<Vec<Node>> {
    exprs.iter().map(parse).collect()
}

fn keyword(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}

fn is_where(v: &Value) -> bool {
    matches!(v, Value::String(s) if keyword(s) == "where")
}

fn parse_path(expr: &Value) -> Result<Path> {
    let keys = match expr {
        Value::Array(keys) if !keys.is_empty() => keys,
        Value::Array(_) => return error("path must not be empty", expr),
        _ => return error("path must be a vector of keys", expr),
    };
    keys.iter()
        .map(|key| match key {
            Value::String(s) => Ok(Value::from(keyword(s))),
            Value::Number(n) if n.as_u64().is_some() => Ok(key.clone()),
            _ => error("path keys must be keywords, strings or indexes", key),
        })
        .collect::<Result<Vec<_>>>()
        .map(Path::new)
}

fn check_operand(op: &str, operand: &Value, expr: &Value) -> Result<()> {
    // Custom operators accept any operand.
    match operand_kind(op).map(|kind| kind.check(operand)) {
        Some(Err(reason)) => error(format!("`{op}` {reason}"), expr),
        _ => Ok(()),
    }
}

// [tag path body] or [tag path :where filter body]
fn parse_quantifier(tag: &str, args: &[Value], expr: &Value) -> Result<Quantifier> {
    let (binding, filter, body) = match args {
        [binding, body] => (binding, None, body),
        [binding, w, filter, body] if is_where(w) => (binding, Some(filter), body),
        _ => {
            return error(
                format!("`{tag}` takes a binding path, an optional `:where` filter and a body"),
                expr,
            )
        }
    };
    Ok(Quantifier {
        binding: parse_path(binding)?,
        filter: filter.map(parse).transpose()?.map(Box::new),
        body: Box::new(parse(body)?),
    })
}

// [count path comparator value] or [count path :where filter comparator value]
fn parse_count(args: &[Value], expr: &Value) -> Result<Node> {
    let (binding, filter, comparator, operand) = match args {
        [binding, comparator, operand] => (binding, None, comparator, operand),
        [binding, w, filter, comparator, operand] if is_where(w) => {
            (binding, Some(filter), comparator, operand)
        }
        _ => {
            return error(
                "`count` takes a binding path, an optional `:where` filter, a comparator and a value",
                expr,
            )
        }
    };
    let comparator: OperatorId = match comparator {
        Value::String(s) if !keyword(s).is_empty() => keyword(s).into(),
        _ => return error("count comparator must be an operator keyword", comparator),
    };
    check_operand(&comparator, operand, expr)?;
    Ok(Node::Count(Count {
        binding: parse_path(binding)?,
        filter: filter.map(parse).transpose()?.map(Box::new),
        comparator,
        operand: operand.clone(),
    }))
}
