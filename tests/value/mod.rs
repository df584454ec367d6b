// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use polix::*;

#[test]
fn non_string_key() -> Result<()> {
    let mut obj = Value::new_object();

    obj.as_object_mut()?.insert(Value::Null, Value::Null);
    obj.as_object_mut()?.insert(Value::Bool(false), Value::Null);
    obj.as_object_mut()?
        .insert(Value::from(std::f64::consts::PI), Value::Null);
    obj.as_object_mut()?.insert(
        Value::from(vec![Value::Bool(true), Value::Null]),
        Value::Null,
    );

    let json = serde_json::to_string_pretty(&obj)?;
    let expected = r#"{
  "null": null,
  "false": null,
  "3.141592653589793": null,
  "[true,null]": null
}"#;

    assert_eq!(json, expected);
    Ok(())
}

#[test]
fn serialize_number() -> Result<()> {
    // Check that integer values are serialized without fractional part
    assert_eq!(serde_json::to_string_pretty(&Value::from(1.0))?, "1");
    assert_eq!(serde_json::to_string_pretty(&Value::from(-1.0))?, "-1");

    // Ensure that fractional parts are also serialized.
    assert_eq!(serde_json::to_string_pretty(&Value::from(1.1))?, "1.1");
    assert_eq!(serde_json::to_string_pretty(&Value::from(-1.1))?, "-1.1");

    Ok(())
}

#[test]
fn sets_serialize_as_arrays() -> Result<()> {
    let mut set = Value::new_set();
    set.as_set_mut()?.insert(Value::from("b"));
    set.as_set_mut()?.insert(Value::from("a"));
    assert_eq!(serde_json::to_string(&set)?, r#"["a","b"]"#);
    Ok(())
}

#[test]
fn numbers_are_numeric() {
    assert_eq!(Value::from(2), Value::from(2.0));
    assert!(Value::from(2) < Value::from(2.5));
    assert_eq!(Value::from(3usize), Value::from(3i64));
}

#[test]
fn kinds_are_totally_ordered() -> Result<()> {
    let ordered = [
        Value::Null,
        Value::Bool(false),
        Value::Bool(true),
        Value::from(-1),
        Value::from("a"),
        Value::from_json_str("[]")?,
        Value::new_set(),
        Value::new_object(),
    ];
    for pair in ordered.windows(2) {
        assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
    }
    Ok(())
}

#[test]
fn missing_is_not_null() -> Result<()> {
    let doc = Value::from_json_str(r#"{"doc": {"role": null, "tags": ["a", "b"]}}"#)?;
    let path = |keys: &[&str]| keys.iter().copied().collect::<Path>();

    assert_eq!(doc.lookup(&path(&["doc", "role"])), Some(&Value::Null));
    assert_eq!(doc.lookup(&path(&["doc", "level"])), None);
    assert_eq!(doc.lookup(&path(&["doc", "role", "name"])), None);

    let second: Path = [Value::from("doc"), Value::from("tags"), Value::from(1)]
        .into_iter()
        .collect();
    assert_eq!(doc.lookup(&second), Some(&Value::from("b")));
    Ok(())
}

#[test]
fn elements_of_collections() -> Result<()> {
    assert_eq!(Value::from_json_str("[1, 2]")?.elements().map(|e| e.len()), Some(2));
    assert_eq!(Value::new_set().elements().map(|e| e.len()), Some(0));
    assert!(Value::new_object().elements().is_none());
    assert!(Value::from("abc").elements().is_none());
    Ok(())
}

#[test]
fn index_operators() -> Result<()> {
    let obj = Value::from_json_str(r#"{ "a" : 5, "b" : [6, 7] }"#)?;
    assert_eq!(&obj["a"], &Value::from(5.0));
    assert_eq!(&obj["b"][1usize], &Value::from(7));
    assert_eq!(&obj["c"], &Value::Null);
    assert_eq!(&obj["b"][5usize], &Value::Null);
    assert_eq!(&obj[&Value::from("a")], &Value::from(5));
    Ok(())
}

#[test]
fn api() -> Result<()> {
    assert!(&Value::from_json_str("{}")?.as_object()?.is_empty());
    let mut v = Value::new_object();
    v.as_object_mut()?
        .insert(Value::String("a".into()), Value::from(3.145));
    assert_eq!(v["a"], Value::from(3.145));
    assert_eq!(v.as_object()?.len(), 1);

    // Check invalid api calls.
    assert!(Value::Null.as_object().is_err());
    assert!(Value::Null.as_set().is_err());
    assert!(Value::String("anc".into()).as_array().is_err());
    assert!(Value::new_object().as_number().is_err());
    assert!(Value::from(5.6).as_bool().is_err());
    Ok(())
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_documents() -> Result<()> {
    let doc = Value::from_yaml_str("doc:\n  role: admin\n  level: 3\n")?;
    assert_eq!(doc, Value::from_json_str(r#"{"doc": {"role": "admin", "level": 3}}"#)?);
    Ok(())
}
