// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::operators::{insert, Check, OperandKind, Operator, OperatorTable};
use crate::value::Value;
use crate::*;

use regex::Regex;

#[cfg(feature = "cache")]
mod cache {
    use super::*;
    use core::num::NonZeroUsize;
    use lru::LruCache;
    use parking_lot::Mutex;

    const CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(n) => n,
        None => NonZeroUsize::MIN,
    };

    lazy_static::lazy_static! {
        static ref PATTERNS: Mutex<LruCache<String, Option<Rc<Regex>>>> =
            Mutex::new(LruCache::new(CAPACITY));
    }

    pub fn compiled(pattern: &str) -> Option<Rc<Regex>> {
        let mut patterns = PATTERNS.lock();
        if let Some(re) = patterns.get(pattern) {
            return re.clone();
        }
        let re = Regex::new(pattern).ok().map(Rc::new);
        patterns.put(pattern.to_string(), re.clone());
        re
    }
}

#[cfg(feature = "cache")]
use cache::compiled;

#[cfg(not(feature = "cache"))]
fn compiled(pattern: &str) -> Option<Rc<Regex>> {
    Regex::new(pattern).ok().map(Rc::new)
}

pub fn register(m: &mut OperatorTable) {
    insert(m, Operator::builtin("matches", OperandKind::Pattern, matches));
    insert(
        m,
        Operator::builtin("not-matches", OperandKind::Pattern, |v, o| !matches(v, o)),
    );
}

/// Search semantics: the pattern may match anywhere in the string.
/// Non-string values and invalid patterns never match.
fn matches(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::String(s), Value::String(p)) => compiled(p).is_some_and(|re| re.is_match(s)),
        _ => false,
    }
}

pub fn validate(pattern: &str) -> Result<(), String> {
    match Regex::new(pattern) {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("invalid regex `{pattern}`: {e}")),
    }
}

pub fn specialize(id: &str, operand: &Value) -> Option<Check> {
    let negate = match id {
        "matches" => false,
        "not-matches" => true,
        _ => return None,
    };
    let re = match operand {
        Value::String(p) => Regex::new(p).ok(),
        _ => None,
    };
    Some(Box::new(move |v: &Value| {
        let found = match (v, &re) {
            (Value::String(s), Some(re)) => re.is_match(s),
            _ => false,
        };
        found != negate
    }))
}
