// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared test utilities for YAML-based test cases

use crate::*;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Turn values read from YAML into documents.
///
/// YAML has no sets, so a single-entry map `set!: [items...]` stands for one.
pub fn process_value(v: &Value) -> Result<Value> {
    Ok(match v {
        Value::Object(fields) => match fields.iter().next() {
            Some((Value::String(tag), Value::Array(items)))
                if fields.len() == 1 && tag.as_ref() == "set!" =>
            {
                Value::from(items.iter().map(process_value).collect::<Result<BTreeSet<_>>>()?)
            }
            _ => Value::from(
                fields
                    .iter()
                    .map(|(k, v)| Ok((process_value(k)?, process_value(v)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
        },
        Value::Array(items) => Value::from(items.iter().map(process_value).collect::<Result<Vec<_>>>()?),
        Value::Set(_) => bail!("sets cannot appear in json or yaml input"),
        _ => v.clone(),
    })
}

/// Compare a residual with its expected rendering.
pub fn match_residual(computed: &Residual, expected: &Value, context: &str) -> Result<()> {
    let rendered = computed.to_value();
    if rendered != *expected {
        bail!(
            "{context}: residuals do not match:\nexpected: {}\nactual:   {}\n{computed}",
            serde_json::to_string(expected)?,
            serde_json::to_string(&rendered)?,
        );
    }
    Ok(())
}

/// One residual test case.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct TestCase {
    pub note: String,
    /// Policies in policy notation; several are evaluated together.
    pub policies: Vec<String>,
    #[serde(default)]
    pub document: Option<Value>,
    /// Evaluate the negation of the (single) policy instead.
    #[serde(default)]
    pub negate: bool,
    /// Full expected residual as rendered by `Residual::to_value`.
    pub want: Option<Value>,
    /// Only the kind of residual: `satisfied`, `open` or `conflict`.
    pub outcome: Option<String>,
    /// Tier picked by the compiler when no ceiling is given.
    pub tier: Option<Tier>,
    pub error: Option<String>,
    pub skip: Option<bool>,
}

/// Standard YAML test file structure
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct YamlTest {
    pub cases: Vec<TestCase>,
}
