// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Path};
use crate::value::Value;

use core::fmt;
use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// A constraint that was checked and failed, with the offending value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Violation {
    pub constraint: Constraint,
    pub witness: Value,
}

pub type Opens = BTreeMap<Path, Vec<Constraint>>;
pub type Conflicts = BTreeMap<Path, Vec<Violation>>;

/// Outcome of evaluating a policy against a possibly incomplete document.
///
/// Neither `Open` nor `Conflict` is an error. `Open` lists what the document
/// must still provide; `Conflict` lists what it got wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Residual {
    Satisfied,
    Open(Opens),
    Conflict(Conflicts),
}

impl Residual {
    /// A single open constraint, keyed by its path.
    pub fn open(constraint: Constraint) -> Self {
        let mut opens = Opens::new();
        opens.insert(constraint.path.clone(), vec![constraint]);
        Residual::Open(opens)
    }

    /// A single violation, keyed by the constraint's path.
    pub fn conflict(constraint: Constraint, witness: Value) -> Self {
        let mut conflicts = Conflicts::new();
        conflicts.insert(
            constraint.path.clone(),
            vec![Violation {
                constraint,
                witness,
            }],
        );
        Residual::Conflict(conflicts)
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Residual::Satisfied)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Residual::Open(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Residual::Conflict(_))
    }

    /// Whether the residual is a decided outcome.
    pub fn is_decided(&self) -> bool {
        !self.is_open()
    }

    /// Total number of open constraints across all paths.
    pub fn open_count(&self) -> usize {
        match self {
            Residual::Open(opens) => opens.values().map(Vec::len).sum(),
            _ => 0,
        }
    }

    /// Render as a plain value.
    ///
    /// `Satisfied` is the string `"satisfied"`; the other two are single-key
    /// objects (`open`, `conflict`) mapping each rendered path to its entries.
    pub fn to_value(&self) -> Value {
        let mut out = BTreeMap::new();
        match self {
            Residual::Satisfied => return Value::from("satisfied"),
            Residual::Open(opens) => {
                let by_path = opens
                    .iter()
                    .map(|(path, cs)| {
                        let cs = cs.iter().map(|c| Value::from(c.to_string())).collect();
                        (Value::from(path.to_string()), Value::from_array(cs))
                    })
                    .collect();
                out.insert(Value::from("open"), Value::from_map(by_path));
            }
            Residual::Conflict(conflicts) => {
                let by_path = conflicts
                    .iter()
                    .map(|(path, vs)| {
                        let vs = vs
                            .iter()
                            .map(|v| {
                                Value::from_map(BTreeMap::from([
                                    (Value::from("constraint"), Value::from(v.constraint.to_string())),
                                    (Value::from("witness"), v.witness.clone()),
                                ]))
                            })
                            .collect();
                        (Value::from(path.to_string()), Value::from_array(vs))
                    })
                    .collect();
                out.insert(Value::from("conflict"), Value::from_map(by_path));
            }
        }
        Value::from_map(out)
    }
}

impl Serialize for Residual {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl fmt::Display for Residual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residual::Satisfied => f.write_str("satisfied"),
            Residual::Open(opens) => {
                f.write_str("open")?;
                for (path, cs) in opens {
                    for c in cs {
                        write!(f, "\n  {path}: {c}")?;
                    }
                }
                Ok(())
            }
            Residual::Conflict(conflicts) => {
                f.write_str("conflict")?;
                for (path, vs) in conflicts {
                    for v in vs {
                        write!(f, "\n  {path}: {} (got {})", v.constraint, v.witness)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Append `from` into `into` path by path, skipping entries already present.
pub(crate) fn merge_opens(into: &mut Opens, from: Opens) {
    for (path, cs) in from {
        let entry = into.entry(path).or_default();
        for c in cs {
            if !entry.contains(&c) {
                entry.push(c);
            }
        }
    }
}

pub(crate) fn merge_conflicts(into: &mut Conflicts, from: Conflicts) {
    for (path, vs) in from {
        let entry = into.entry(path).or_default();
        for v in vs {
            if !entry.contains(&v) {
                entry.push(v);
            }
        }
    }
}
