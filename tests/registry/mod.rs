// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use polix::registry::operators;
use polix::*;

#[test]
fn process_wide_registry() -> Result<()> {
    let before = operators::current_version();
    let version = operators::register("tests.registry.longer-than", |v, operand| {
        match (v.as_string(), operand.as_number()) {
            (Ok(s), Ok(n)) => n.as_u64().map_or(false, |n| s.len() as u64 > n),
            _ => false,
        }
    })?;
    assert!(version > before);
    assert!(operators::current_version() >= version);

    let op = operators::lookup("tests.registry.longer-than")?;
    assert!(!op.builtin);
    assert!(op.holds(&Value::from("abcdef"), &Value::from(3)));

    let node = parse_str(r#"[:tests.registry.longer-than [:name] 3]"#)?;
    assert!(evaluate(&node, &Value::from_json_str(r#"{"name": "ab"}"#)?)?.is_conflict());
    assert!(evaluate(&node, &Value::from_json_str(r#"{"name": "abcd"}"#)?)?.is_satisfied());
    Ok(())
}

#[test]
fn builtins_are_reserved() {
    let registry = OperatorRegistry::with_builtins();
    for id in ["=", "!=", ">", "<", ">=", "<=", "in", "not-in", "contains", "starts-with", "ends-with"] {
        assert!(registry.is_builtin(id), "{id}");
        match registry.register(id, |_, _| true) {
            Err(RegistryError::BuiltinOperator { name }) => assert_eq!(name.as_ref(), id),
            r => panic!("registering {id} gave {r:?}"),
        }
    }
    assert_eq!(registry.current_version(), 0);
}

#[test]
fn names_must_not_be_blank() {
    let registry = OperatorRegistry::new();
    assert!(matches!(
        registry.register("  ", |_, _| true),
        Err(RegistryError::InvalidName { .. })
    ));
    assert_eq!(registry.current_version(), 0);
}

#[test]
fn replacement_bumps_the_version() -> Result<()> {
    let registry = OperatorRegistry::with_builtins();
    assert_eq!(registry.register("flag", |_, _| true)?, 1);
    assert!(registry.lookup("flag")?.holds(&Value::Null, &Value::Null));
    assert_eq!(registry.register("flag", |_, _| false)?, 2);
    assert!(!registry.lookup("flag")?.holds(&Value::Null, &Value::Null));
    assert_eq!(registry.current_version(), 2);
    Ok(())
}

#[test]
fn empty_registry_knows_nothing() {
    let registry = OperatorRegistry::new();
    assert!(registry.operator_ids().is_empty());
    assert_eq!(
        registry.lookup("=").err(),
        Some(UnknownOperator(OperatorId::from("=")))
    );
    let residual = Interpreter::new(&registry).evaluate(
        &Node::Constraint(Constraint::new(["a"].into_iter().collect(), "=", Value::from(1))),
        &Value::new_object(),
    );
    // Missing data never reaches the operator table.
    assert!(matches!(residual, Ok(Residual::Open(_))));
}

#[test]
fn interpreters_keep_their_snapshot() -> Result<()> {
    let registry = OperatorRegistry::with_builtins();
    registry.register("flag", |_, _| true)?;
    let interpreter = Interpreter::new(&registry);
    registry.register("flag", |_, _| false)?;

    let node = parse_str("[:flag [:a] nil]")?;
    let document = Value::from_json_str(r#"{"a": 1}"#)?;
    assert_eq!(interpreter.version(), 1);
    assert!(interpreter.evaluate(&node, &document)?.is_satisfied());
    assert!(Interpreter::new(&registry).evaluate(&node, &document)?.is_conflict());
    Ok(())
}
