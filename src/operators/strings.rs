// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::operators::{insert, Check, OperandKind, Operator, OperatorTable};
use crate::value::Value;

type Affix = fn(&str, &str) -> bool;

fn starts_with(s: &str, prefix: &str) -> bool {
    s.starts_with(prefix)
}

fn ends_with(s: &str, suffix: &str) -> bool {
    s.ends_with(suffix)
}

fn affix_test(id: &str) -> Option<Affix> {
    match id {
        "starts-with" => Some(starts_with),
        "ends-with" => Some(ends_with),
        _ => None,
    }
}

pub fn register(m: &mut OperatorTable) {
    for id in ["starts-with", "ends-with"] {
        if let Some(test) = affix_test(id) {
            insert(
                m,
                Operator::builtin(id, OperandKind::String, move |v, o| affix(v, o, test)),
            );
        }
    }
}

fn affix(value: &Value, operand: &Value, test: Affix) -> bool {
    match (value, operand) {
        (Value::String(s), Value::String(a)) => test(s, a),
        _ => false,
    }
}

pub fn specialize(id: &str, operand: &Value) -> Option<Check> {
    let test = affix_test(id)?;
    let operand = operand.clone();
    Some(Box::new(move |v: &Value| affix(v, &operand, test)))
}
