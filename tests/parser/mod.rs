// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, bail, Result};
use polix::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

fn check<T: PartialEq + std::fmt::Display>(actual: &T, expected: &T, what: &str) -> Result<()> {
    if actual != expected {
        bail!("{what} mismatch:\n  expected: {expected}\n  actual:   {actual}");
    }
    Ok(())
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct TestCase {
    note: String,
    /// Policy notation text.
    policy: Option<String>,
    /// Policy given as a value, as JSON callers supply it.
    expr: Option<Value>,
    /// Expected tagged-vector form of the parsed node.
    want: Option<Value>,
    /// Expected display form of the parsed node.
    display: Option<String>,
    error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn parse_case(case: &TestCase) -> Result<Node> {
    match (&case.policy, &case.expr) {
        (Some(text), None) => Ok(parse_str(text)?),
        (None, Some(expr)) => Ok(parse(expr)?),
        _ => bail!("exactly one of policy or expr must be specified"),
    }
}

fn run_case(case: &TestCase) -> Result<()> {
    let node = match (parse_case(case), &case.error) {
        (Ok(node), None) => node,
        (Ok(node), Some(expected)) => bail!("`{node}` parsed; expected error `{expected}`"),
        (Err(e), Some(expected)) if e.to_string().contains(expected.as_str()) => return Ok(()),
        (Err(e), _) => return Err(e),
    };
    if let Some(want) = &case.want {
        check(&node.to_expr(), want, "tagged form")?;
    }
    if let Some(display) = &case.display {
        check(&node.to_string(), display, "display form")?;
    }
    // Printing and parsing again gives back the same node.
    let reparsed = parse_str(&node.to_string())?;
    check(&reparsed, &node, "reparsed node")
}

#[test_resources("tests/parser/**/*.yaml")]
fn run(path: &str) {
    let test: YamlTest = match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|text| Ok(serde_yaml::from_str(&text)?))
    {
        Ok(test) => test,
        Err(e) => panic!("{path}: {e}"),
    };
    for case in &test.cases {
        if let Err(e) = run_case(case) {
            panic!("{path}: case `{}` failed: {e}", case.note);
        }
    }
}

#[test]
fn parse_error_carries_offending_expression() -> Result<()> {
    let err = parse_str(r#"[:and [:= [:a] 1] [:forall [:xs]]]"#)
        .err()
        .ok_or_else(|| anyhow!("expected a parse error"))?;
    assert_eq!(err.offending.to_string(), r#"["forall",["xs"]]"#);
    assert!(err.reason.contains("`forall`"));
    Ok(())
}
