// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::reader::{write_key, write_value};
use crate::value::Value;
use crate::*;

use core::fmt;
use std::collections::BTreeSet;

/// Identifier of a comparison operator, e.g. `=` or `matches`.
pub type OperatorId = Rc<str>;

/// A sequence of keys into a document.
///
/// Keys are values: strings (keywords in policy text) select object fields
/// and non-negative integers select array elements.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Path(Rc<[Value]>);

impl Path {
    pub fn new(keys: Vec<Value>) -> Self {
        Self(keys.into())
    }

    pub fn keys(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This path followed by `other`.
    pub fn join(&self, other: &Path) -> Path {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Path(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// This path followed by a single key.
    pub fn child(&self, key: Value) -> Path {
        Path(self.0.iter().cloned().chain(Some(key)).collect())
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.0.to_vec())
    }
}

impl<K: Into<Value>> FromIterator<K> for Path {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Path(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, key) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write_key(f, key)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Leaf of a policy: the value at `path` must satisfy `operator` against `operand`.
///
/// `negated` constraints must *not* hold. The parser never produces them;
/// they show up in residuals and constraint sets when a negated leaf has no
/// exact inverse operator.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constraint {
    pub path: Path,
    pub operator: OperatorId,
    pub operand: Value,
    pub negated: bool,
}

impl Constraint {
    pub fn new(path: Path, operator: impl Into<OperatorId>, operand: Value) -> Self {
        Self {
            path,
            operator: operator.into(),
            operand,
            negated: false,
        }
    }

    /// The same constraint relocated under `prefix`.
    pub fn rebase(&self, prefix: &Path) -> Self {
        Self {
            path: prefix.join(&self.path),
            ..self.clone()
        }
    }

    /// Tagged-vector form, e.g. `["=", ["doc", "role"], "admin"]`.
    pub fn to_expr(&self) -> Value {
        let leaf = Value::from(vec![
            Value::String(self.operator.clone()),
            self.path.to_value(),
            self.operand.clone(),
        ]);
        if self.negated {
            Value::from(vec![Value::from("not"), leaf])
        } else {
            leaf
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("[:not ")?;
        }
        f.write_str("[")?;
        write_key(f, &Value::String(self.operator.clone()))?;
        write!(f, " {} ", self.path)?;
        write_value(f, &self.operand)?;
        f.write_str("]")?;
        if self.negated {
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `forall`/`exists` over the collection at `binding`.
///
/// Each element is a sub-document for `filter` and `body`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantifier {
    pub binding: Path,
    pub filter: Option<Box<Node>>,
    pub body: Box<Node>,
}

/// Number of elements at `binding` (that pass `filter`) compared against `operand`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Count {
    pub binding: Path,
    pub filter: Option<Box<Node>>,
    pub comparator: OperatorId,
    pub operand: Value,
}

/// Policy AST. Never mutated once built; structurally equal trees are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Constraint(Constraint),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    ForAll(Quantifier),
    Exists(Quantifier),
    Count(Count),
}

impl Node {
    pub fn constraint(path: Path, operator: &str, operand: Value) -> Node {
        Node::Constraint(Constraint::new(path, operator, operand))
    }

    /// All of `nodes` as one policy. A single node is returned as is.
    pub fn conjunction(nodes: &[Node]) -> Node {
        match nodes {
            [single] => single.clone(),
            all => Node::And(all.to_vec()),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Node::Constraint(_) => "constraint",
            Node::And(_) => "and",
            Node::Or(_) => "or",
            Node::Not(_) => "not",
            Node::ForAll(_) => "forall",
            Node::Exists(_) => "exists",
            Node::Count(_) => "count",
        }
    }

    /// Collect every operator the node can invoke, including count comparators.
    pub fn gather_operators(&self, operators: &mut BTreeSet<OperatorId>) {
        match self {
            Node::Constraint(c) => {
                operators.insert(c.operator.clone());
            }
            Node::And(children) | Node::Or(children) => {
                for child in children {
                    child.gather_operators(operators);
                }
            }
            Node::Not(child) => child.gather_operators(operators),
            Node::ForAll(q) | Node::Exists(q) => {
                if let Some(filter) = &q.filter {
                    filter.gather_operators(operators);
                }
                q.body.gather_operators(operators);
            }
            Node::Count(c) => {
                if let Some(filter) = &c.filter {
                    filter.gather_operators(operators);
                }
                operators.insert(c.comparator.clone());
            }
        }
    }

    /// Tagged-vector form accepted by [`crate::parse`].
    pub fn to_expr(&self) -> Value {
        let tag = |t: &str| Value::from(t);
        match self {
            Node::Constraint(c) => c.to_expr(),
            Node::And(children) | Node::Or(children) => {
                let mut items = vec![tag(self.tag())];
                items.extend(children.iter().map(Node::to_expr));
                Value::from(items)
            }
            Node::Not(child) => Value::from(vec![tag("not"), child.to_expr()]),
            Node::ForAll(q) | Node::Exists(q) => {
                let mut items = vec![tag(self.tag()), q.binding.to_value()];
                if let Some(filter) = &q.filter {
                    items.push(tag("where"));
                    items.push(filter.to_expr());
                }
                items.push(q.body.to_expr());
                Value::from(items)
            }
            Node::Count(c) => {
                let mut items = vec![tag("count"), c.binding.to_value()];
                if let Some(filter) = &c.filter {
                    items.push(tag("where"));
                    items.push(filter.to_expr());
                }
                items.push(Value::String(c.comparator.clone()));
                items.push(c.operand.clone());
                Value::from(items)
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constraint(c) => fmt::Display::fmt(c, f),
            Node::And(children) | Node::Or(children) => {
                write!(f, "[:{}", self.tag())?;
                for child in children {
                    write!(f, " {child}")?;
                }
                f.write_str("]")
            }
            Node::Not(child) => write!(f, "[:not {child}]"),
            Node::ForAll(q) | Node::Exists(q) => {
                write!(f, "[:{} {}", self.tag(), q.binding)?;
                if let Some(filter) = &q.filter {
                    write!(f, " :where {filter}")?;
                }
                write!(f, " {}]", q.body)
            }
            Node::Count(c) => {
                write!(f, "[:count {}", c.binding)?;
                if let Some(filter) = &c.filter {
                    write!(f, " :where {filter}")?;
                }
                f.write_str(" ")?;
                write_key(f, &Value::String(c.comparator.clone()))?;
                f.write_str(" ")?;
                write_value(f, &c.operand)?;
                f.write_str("]")
            }
        }
    }
}
