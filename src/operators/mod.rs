// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod collections;
mod comparison;
#[cfg(feature = "regex")]
mod patterns;
mod strings;

use crate::ast::OperatorId;
use crate::value::Value;
use crate::*;

use core::fmt;
use std::collections::BTreeMap;

/// A comparison predicate applied as `predicate(document_value, operand)`.
pub type Predicate = Rc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// A predicate with its operand baked in. Produced when specializing a
/// constraint on a built-in operator.
pub type Check = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Operator table keyed by id.
pub type OperatorTable = BTreeMap<OperatorId, Rc<Operator>>;

/// Shape an operand must have for an operator to accept it.
///
/// Checked structurally by the parser. Custom operators accept `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Any,
    /// Number or string.
    Orderable,
    /// Array or set.
    Collection,
    /// String holding a valid regular expression.
    Pattern,
    String,
}

impl OperandKind {
    /// Explain why `operand` does not fit, if it doesn't.
    pub fn check(&self, operand: &Value) -> Result<(), String> {
        let ok = match self {
            OperandKind::Any => true,
            OperandKind::Orderable => matches!(operand, Value::Number(_) | Value::String(_)),
            OperandKind::Collection => matches!(operand, Value::Array(_) | Value::Set(_)),
            OperandKind::String => matches!(operand, Value::String(_)),
            OperandKind::Pattern => {
                #[cfg(feature = "regex")]
                if let Value::String(pattern) = operand {
                    return patterns::validate(pattern);
                }
                false
            }
        };
        match ok {
            true => Ok(()),
            false => Err(format!("expects {self} operand, got {}", operand.kind())),
        }
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandKind::Any => "any",
            OperandKind::Orderable => "a number or string",
            OperandKind::Collection => "an array or set",
            OperandKind::Pattern => "a regex string",
            OperandKind::String => "a string",
        })
    }
}

/// A named comparison operator.
#[derive(Clone)]
pub struct Operator {
    pub id: OperatorId,
    pub predicate: Predicate,
    pub operand: OperandKind,
    pub builtin: bool,
}

impl Operator {
    /// A custom operator. Custom operators accept any operand.
    pub fn new<F>(id: &str, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            predicate: Rc::new(predicate),
            operand: OperandKind::Any,
            builtin: false,
        }
    }

    fn builtin<F>(id: &str, operand: OperandKind, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            operand,
            builtin: true,
            ..Self::new(id, predicate)
        }
    }

    pub fn holds(&self, value: &Value, operand: &Value) -> bool {
        (self.predicate)(value, operand)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("id", &self.id)
            .field("operand", &self.operand)
            .field("builtin", &self.builtin)
            .finish_non_exhaustive()
    }
}

fn insert(m: &mut OperatorTable, op: Operator) {
    m.insert(op.id.clone(), Rc::new(op));
}

/// Table of built-in operators.
pub fn builtins() -> OperatorTable {
    let mut m = OperatorTable::new();
    comparison::register(&mut m);
    collections::register(&mut m);
    strings::register(&mut m);
    #[cfg(feature = "regex")]
    patterns::register(&mut m);
    m
}

pub fn is_builtin(id: &str) -> bool {
    operand_kind(id).is_some()
}

/// Operand shape of a built-in operator.
pub fn operand_kind(id: &str) -> Option<OperandKind> {
    Some(match id {
        "=" | "!=" | "contains" => OperandKind::Any,
        ">" | "<" | ">=" | "<=" => OperandKind::Orderable,
        "in" | "not-in" => OperandKind::Collection,
        "starts-with" | "ends-with" => OperandKind::String,
        #[cfg(feature = "regex")]
        "matches" | "not-matches" => OperandKind::Pattern,
        _ => return None,
    })
}

/// Exact logical inverse of an operator over every value/operand pair.
pub fn inverse(id: &str) -> Option<&'static str> {
    Some(match id {
        "=" => "!=",
        "!=" => "=",
        "in" => "not-in",
        "not-in" => "in",
        "matches" => "not-matches",
        "not-matches" => "matches",
        _ => return None,
    })
}

/// Inverse of a comparator applied to a count. Counts are always numbers,
/// so the ordering operators invert exactly as well.
pub fn inverse_comparator(id: &str) -> Option<&'static str> {
    Some(match id {
        "<" => ">=",
        ">=" => "<",
        ">" => "<=",
        "<=" => ">",
        _ => return inverse(id),
    })
}

/// Build a single-argument check for a built-in operator with its operand
/// baked in. Returns `None` for ids that are not built-in.
pub fn specialize(id: &str, operand: &Value) -> Option<Check> {
    comparison::specialize(id, operand)
        .or_else(|| collections::specialize(id, operand))
        .or_else(|| strings::specialize(id, operand))
        .or_else(|| specialize_pattern(id, operand))
}

#[cfg(feature = "regex")]
use patterns::specialize as specialize_pattern;

#[cfg(not(feature = "regex"))]
fn specialize_pattern(_id: &str, _operand: &Value) -> Option<Check> {
    None
}
