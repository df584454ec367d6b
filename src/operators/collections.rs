// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::operators::{insert, Check, OperandKind, Operator, OperatorTable};
use crate::value::Value;

use std::collections::BTreeSet;

pub fn register(m: &mut OperatorTable) {
    insert(
        m,
        Operator::builtin("in", OperandKind::Collection, member_of),
    );
    insert(
        m,
        Operator::builtin("not-in", OperandKind::Collection, |v, o| !member_of(v, o)),
    );
    insert(m, Operator::builtin("contains", OperandKind::Any, contains));
}

fn member_of(value: &Value, collection: &Value) -> bool {
    match collection {
        Value::Array(items) => items.contains(value),
        Value::Set(items) => items.contains(value),
        _ => false,
    }
}

/// Substring for strings, membership for collections.
fn contains(value: &Value, needle: &Value) -> bool {
    match (value, needle) {
        (Value::String(s), Value::String(n)) => s.contains(n.as_ref()),
        (Value::Array(_) | Value::Set(_), _) => member_of(needle, value),
        _ => false,
    }
}

// Arrays are searched linearly by the generic predicate. Equality and
// ordering agree on values, so a set lookup gives the same answer.
fn membership(collection: &Value) -> BTreeSet<Value> {
    match collection {
        Value::Array(items) => items.iter().cloned().collect(),
        Value::Set(items) => (**items).clone(),
        _ => BTreeSet::new(),
    }
}

pub fn specialize(id: &str, operand: &Value) -> Option<Check> {
    match id {
        "in" => {
            let members = membership(operand);
            Some(Box::new(move |v: &Value| members.contains(v)))
        }
        "not-in" => {
            let members = membership(operand);
            Some(Box::new(move |v: &Value| !members.contains(v)))
        }
        "contains" => {
            let needle = operand.clone();
            Some(Box::new(move |v: &Value| contains(v, &needle)))
        }
        _ => None,
    }
}
