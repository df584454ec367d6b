// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::operators::{insert, Check, OperandKind, Operator, OperatorTable};
use crate::value::Value;

use core::cmp::Ordering;

pub fn register(m: &mut OperatorTable) {
    insert(m, Operator::builtin("=", OperandKind::Any, |v, o| v == o));
    insert(m, Operator::builtin("!=", OperandKind::Any, |v, o| v != o));
    for id in [">", "<", ">=", "<="] {
        if let Some(accept) = accepts(id) {
            insert(
                m,
                Operator::builtin(id, OperandKind::Orderable, move |v, o| {
                    ordering(v, o).is_some_and(accept)
                }),
            );
        }
    }
}

/// Ordering between two numbers or two strings. Mixed kinds are unordered.
fn ordering(value: &Value, operand: &Value) -> Option<Ordering> {
    match (value, operand) {
        (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn accepts(id: &str) -> Option<fn(Ordering) -> bool> {
    Some(match id {
        ">" => Ordering::is_gt,
        "<" => Ordering::is_lt,
        ">=" => Ordering::is_ge,
        "<=" => Ordering::is_le,
        _ => return None,
    })
}

pub fn specialize(id: &str, operand: &Value) -> Option<Check> {
    let operand = operand.clone();
    match id {
        "=" => Some(Box::new(move |v: &Value| *v == operand)),
        "!=" => Some(Box::new(move |v: &Value| *v != operand)),
        _ => {
            let accept = accepts(id)?;
            let check: Check = match operand {
                Value::Number(bound) => Box::new(move |v: &Value| match v {
                    Value::Number(n) => accept(n.cmp(&bound)),
                    _ => false,
                }),
                Value::String(bound) => Box::new(move |v: &Value| match v {
                    Value::String(s) => accept(s.as_ref().cmp(bound.as_ref())),
                    _ => false,
                }),
                _ => Box::new(|_: &Value| false),
            };
            Some(check)
        }
    }
}
