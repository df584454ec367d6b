// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::Path;
use crate::number::Number;
use crate::Rc;

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::ops;

use anyhow::{anyhow, bail, Result};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Error as _, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A document, or an operand inside a policy.
///
/// Documents are nested maps whose keys can be any value (keywords read from
/// policy text become strings). Collections are ordered so residuals come out
/// in a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    /// Written `#{...}` in policy text; serialized as an array.
    Set(Rc<BTreeSet<Value>>),
    Object(Rc<BTreeMap<Value, Value>>),
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => serializer.collect_seq(items.iter()),
            Value::Set(items) => serializer.collect_seq(items.iter()),
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields.iter() {
                    // JSON keys are strings; other keys are written as their JSON text.
                    match key {
                        Value::String(s) => map.serialize_entry(s.as_ref(), value)?,
                        _ => {
                            let text = serde_json::to_string(key).map_err(S::Error::custom)?;
                            map.serialize_entry(&text, value)?
                        }
                    }
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

macro_rules! visit_scalar {
    ($($name:ident($ty:ty) => $make:expr;)*) => {
        $(
            fn $name<E: de::Error>(self, v: $ty) -> Result<Value, E> {
                #[allow(clippy::redundant_closure_call)]
                Ok(($make)(v))
            }
        )*
    };
}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON or YAML value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    visit_scalar! {
        visit_bool(bool) => Value::Bool;
        visit_i64(i64) => Value::from;
        visit_u64(u64) => |v: u64| Value::Number(Number::from(v));
        visit_f64(f64) => Value::from;
        visit_str(&str) => Value::from;
        visit_string(String) => Value::from;
    }

    fn visit_seq<V>(self, mut seq: V) -> Result<Value, V::Error>
    where
        V: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::from(items))
    }

    fn visit_map<V>(self, mut entries: V) -> Result<Value, V::Error>
    where
        V: MapAccess<'de>,
    {
        let mut fields = BTreeMap::new();
        while let Some((key, value)) = entries.next_entry()? {
            fields.insert(key, value);
        }
        Ok(Value::from(fields))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

number_from!(i32, i64, usize, f64);

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(items: BTreeSet<Value>) -> Self {
        Value::Set(Rc::new(items))
    }
}

impl From<BTreeMap<Value, Value>> for Value {
    fn from(fields: BTreeMap<Value, Value>) -> Self {
        Value::Object(Rc::new(fields))
    }
}

/// Constructors and parsing.
impl Value {
    pub fn new_object() -> Value {
        Value::from(BTreeMap::new())
    }

    pub fn new_set() -> Value {
        Value::from(BTreeSet::new())
    }

    pub fn new_array() -> Value {
        Value::from(vec![])
    }

    pub fn from_array(items: Vec<Value>) -> Value {
        Value::from(items)
    }

    pub fn from_map(fields: BTreeMap<Value, Value>) -> Value {
        Value::from(fields)
    }

    pub fn from_json_str(json: &str) -> Result<Value> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_str(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: &str) -> Result<Value> {
        Self::from_json_str(&read_file(path)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Value> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_file(path: &str) -> Result<Value> {
        Self::from_yaml_str(&read_file(path)?)
    }
}

fn read_file(path: &str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) => bail!("Failed to read {path}. {e}"),
    }
}

/// Typed access.
impl Value {
    /// Name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn mismatch(&self, expected: &str) -> anyhow::Error {
        anyhow!("expected {expected}, found {}", self.kind())
    }

    pub fn as_bool(&self) -> Result<&bool> {
        match self {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_string(&self) -> Result<&Rc<str>> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn as_number(&self) -> Result<&Number> {
        match self {
            Value::Number(n) => Ok(n),
            _ => Err(self.mismatch("number")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Value>> {
        match self {
            Value::Array(items) => Ok(items),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_set(&self) -> Result<&BTreeSet<Value>> {
        match self {
            Value::Set(items) => Ok(items),
            _ => Err(self.mismatch("set")),
        }
    }

    pub fn as_object(&self) -> Result<&BTreeMap<Value, Value>> {
        match self {
            Value::Object(fields) => Ok(fields),
            _ => Err(self.mismatch("object")),
        }
    }

    // The mutable accessors copy shared storage on write.

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Ok(Rc::make_mut(items)),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut BTreeSet<Value>> {
        match self {
            Value::Set(items) => Ok(Rc::make_mut(items)),
            _ => Err(self.mismatch("set")),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut BTreeMap<Value, Value>> {
        match self {
            Value::Object(fields) => Ok(Rc::make_mut(fields)),
            _ => Err(self.mismatch("object")),
        }
    }
}

/// Navigation.
impl Value {
    /// Look up a single key.
    ///
    /// Objects are indexed by key equality, arrays by non-negative integer
    /// keys and sets by their members. Any other combination is missing.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match (self, key) {
            (Value::Object(fields), _) => fields.get(key),
            (Value::Set(items), _) => items.get(key),
            (Value::Array(items), Value::Number(n)) => n
                .as_u64()
                .and_then(|idx| usize::try_from(idx).ok())
                .and_then(|idx| items.get(idx)),
            _ => None,
        }
    }

    /// Resolve a path. `None` means the document does not have the path,
    /// which is different from a path whose value is null.
    pub fn lookup(&self, path: &Path) -> Option<&Value> {
        path.keys()
            .iter()
            .try_fold(self, |value, key| value.get(key))
    }

    /// Elements of a collection in iteration order, or `None` for scalars and objects.
    pub fn elements(&self) -> Option<Vec<&Value>> {
        match self {
            Value::Array(items) => Some(items.iter().collect()),
            Value::Set(items) => Some(items.iter().collect()),
            _ => None,
        }
    }
}

// Indexing never panics: anything missing reads as null.

impl ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(&Value::from(index)).unwrap_or(&Value::Null)
    }
}

impl ops::Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Self::Output {
        self.get(&Value::from(key)).unwrap_or(&Value::Null)
    }
}

impl ops::Index<&Value> for Value {
    type Output = Value;

    fn index(&self, key: &Value) -> &Self::Output {
        self.get(key).unwrap_or(&Value::Null)
    }
}
