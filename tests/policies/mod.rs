// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, bail, Result};
use polix::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Expected outcomes for the policy file of the same name.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Expectations {
    tier: Tier,
    documents: Vec<Expectation>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Expectation {
    note: String,
    document: Value,
    outcome: String,
    open: Option<usize>,
}

fn outcome(residual: &Residual) -> &'static str {
    match residual {
        Residual::Satisfied => "satisfied",
        Residual::Open(_) => "open",
        Residual::Conflict(_) => "conflict",
    }
}

fn check_policy(path: &str) -> Result<()> {
    let mut engine = Engine::new();
    engine.add_policy_from_file(path)?;

    let yaml_path = path.replace(".edn", ".yaml");
    let yaml = std::fs::read_to_string(&yaml_path)
        .map_err(|e| anyhow!("missing expectations {yaml_path}. {e}"))?;
    let expectations: Expectations = serde_yaml::from_str(&yaml)?;

    let compiled = engine.compile()?;
    if compiled.tier() != expectations.tier {
        bail!("{path}: compiled as {} instead of {}", compiled.tier(), expectations.tier);
    }

    for e in &expectations.documents {
        let residual = engine.eval(&e.document)?;
        if residual != engine.interpret(&e.document)? {
            bail!("{path}: {}: compiled and interpreted residuals differ", e.note);
        }
        if outcome(&residual) != e.outcome {
            bail!("{path}: {}: expected {}, got\n{residual}", e.note, e.outcome);
        }
        if let Some(open) = e.open {
            if residual.open_count() != open {
                bail!("{path}: {}: expected {open} open constraints, got\n{residual}", e.note);
            }
        }
    }
    Ok(())
}

#[test]
fn sample_policies() -> Result<()> {
    let mut total = 0;

    for entry in WalkDir::new("tests/policies/samples")
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("failed to convert path to utf8 {:?}", entry.path()))?;
        if !path.ends_with(".edn") {
            continue;
        }

        total += 1;
        println!("checking {path}");
        check_policy(path)?;
    }

    assert!(total > 0, "no sample policies found");
    println!("{total} sample policies passed.");
    Ok(())
}
