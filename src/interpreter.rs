// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Count, Node, Path, Quantifier};
use crate::negate::{negate, negate_constraint};
use crate::operators::inverse_comparator;
use crate::registry::{operators, OperatorRegistry, Snapshot, UnknownOperator};
use crate::residual::{merge_conflicts, merge_opens, Conflicts, Opens, Residual};
use crate::value::Value;

use tracing::trace;

type Result<T> = core::result::Result<T, UnknownOperator>;

/// Evaluate `node` against `document` using the process-wide registry.
pub fn evaluate(node: &Node, document: &Value) -> Result<Residual> {
    Interpreter::new(operators::global()).evaluate(node, document)
}

/// Residual-producing tree walker.
///
/// The interpreter captures the registry's operator table when it is created
/// and uses that snapshot for every evaluation.
#[derive(Clone)]
pub struct Interpreter {
    operators: Snapshot,
}

impl Interpreter {
    pub fn new(registry: &OperatorRegistry) -> Self {
        Self {
            operators: registry.snapshot(),
        }
    }

    pub fn from_snapshot(operators: Snapshot) -> Self {
        Self { operators }
    }

    /// Registry version the interpreter evaluates against.
    pub fn version(&self) -> u64 {
        self.operators.version
    }

    pub fn evaluate(&self, node: &Node, document: &Value) -> Result<Residual> {
        self.eval(node, document, &Path::default(), true)
    }

    // `positive == false` evaluates the negation of `node`. Residual paths
    // are reported under `prefix`, the location of `document` in the root.
    fn eval(&self, node: &Node, document: &Value, prefix: &Path, positive: bool) -> Result<Residual> {
        match node {
            Node::Constraint(c) => self.eval_constraint(c, document, prefix, positive),
            Node::And(children) => self.eval_children(children, document, prefix, positive, positive),
            Node::Or(children) => self.eval_children(children, document, prefix, positive, !positive),
            Node::Not(child) => self.eval(child, document, prefix, !positive),
            Node::ForAll(q) => self.eval_quantifier(node, q, document, prefix, positive, positive),
            Node::Exists(q) => self.eval_quantifier(node, q, document, prefix, positive, !positive),
            Node::Count(c) => self.eval_count(c, document, prefix, positive),
        }
    }

    fn eval_constraint(
        &self,
        c: &Constraint,
        document: &Value,
        prefix: &Path,
        positive: bool,
    ) -> Result<Residual> {
        let Some(value) = document.lookup(&c.path) else {
            return Ok(Residual::open(effective(c, prefix, positive)));
        };
        let op = self.operators.lookup(&c.operator)?;
        let holds = op.holds(value, &c.operand) != c.negated;
        Ok(match holds == positive {
            true => Residual::Satisfied,
            false => Residual::conflict(effective(c, prefix, positive), value.clone()),
        })
    }

    fn eval_children(
        &self,
        children: &[Node],
        document: &Value,
        prefix: &Path,
        positive: bool,
        conjunction: bool,
    ) -> Result<Residual> {
        if conjunction {
            // Of the conflicting children, the one whose first path sorts
            // lowest decides, the earliest on ties. Compiled policies scan
            // paths in order and stop at the same conflict.
            let mut opens = Opens::new();
            let mut conflict: Option<Conflicts> = None;
            for child in children {
                match self.eval(child, document, prefix, positive)? {
                    Residual::Satisfied => (),
                    Residual::Open(o) => merge_opens(&mut opens, o),
                    Residual::Conflict(c) => {
                        let lower = conflict
                            .as_ref()
                            .map_or(true, |best| c.keys().next() < best.keys().next());
                        if lower {
                            conflict = Some(c);
                        }
                    }
                }
            }
            return Ok(match (conflict, opens.is_empty()) {
                (Some(c), _) => Residual::Conflict(c),
                (None, true) => Residual::Satisfied,
                (None, false) => Residual::Open(opens),
            });
        }

        // Disjunction: the open branch with the fewest open constraints is
        // reported, the earliest one on ties. With no open branch every
        // conflict is reported.
        let mut best: Option<(usize, Opens)> = None;
        let mut conflicts = Conflicts::new();
        for child in children {
            match self.eval(child, document, prefix, positive)? {
                Residual::Satisfied => return Ok(Residual::Satisfied),
                Residual::Open(o) => {
                    let count = o.values().map(Vec::len).sum();
                    if best.as_ref().map_or(true, |(n, _)| count < *n) {
                        best = Some((count, o));
                    }
                }
                Residual::Conflict(c) => merge_conflicts(&mut conflicts, c),
            }
        }
        Ok(match best {
            Some((_, opens)) => Residual::Open(opens),
            None => Residual::Conflict(conflicts),
        })
    }

    fn eval_quantifier(
        &self,
        node: &Node,
        q: &Quantifier,
        document: &Value,
        prefix: &Path,
        positive: bool,
        universal: bool,
    ) -> Result<Residual> {
        let binding = prefix.join(&q.binding);
        let synthetic = || {
            let effective = match positive {
                true => node.clone(),
                false => negate(node),
            };
            let tag = if universal { "forall" } else { "exists" };
            Constraint::new(binding.clone(), tag, effective.to_expr())
        };

        let Some(collection) = document.lookup(&q.binding) else {
            trace!(binding = %binding, "quantifier binding missing");
            return Ok(Residual::open(synthetic()));
        };
        let Some(elements) = collection.elements() else {
            return Ok(Residual::conflict(synthetic(), collection.clone()));
        };

        let mut opens = Opens::new();
        let mut conflicts = Conflicts::new();
        for (idx, element) in elements.into_iter().enumerate() {
            let at = binding.child(element_key(collection, idx, element));
            let filter = match &q.filter {
                Some(filter) => self.eval(filter, element, &at, true)?,
                None => Residual::Satisfied,
            };
            let filter_opens = match filter {
                Residual::Conflict(_) => continue,
                Residual::Open(o) => Some(o),
                Residual::Satisfied => None,
            };
            let body = self.eval(&q.body, element, &at, positive)?;

            match (universal, body) {
                (true, Residual::Satisfied) => continue,
                (true, conflict @ Residual::Conflict(_)) if filter_opens.is_none() => {
                    return Ok(conflict)
                }
                (true, Residual::Conflict(_)) => (),
                (false, Residual::Satisfied) if filter_opens.is_none() => {
                    return Ok(Residual::Satisfied)
                }
                (false, Residual::Satisfied) => (),
                (false, Residual::Conflict(c)) => {
                    merge_conflicts(&mut conflicts, c);
                    continue;
                }
                (_, Residual::Open(o)) => merge_opens(&mut opens, o),
            }
            if let Some(o) = filter_opens {
                merge_opens(&mut opens, o);
            }
        }

        Ok(if !opens.is_empty() {
            Residual::Open(opens)
        } else if universal {
            Residual::Satisfied
        } else if !conflicts.is_empty() {
            Residual::Conflict(conflicts)
        } else {
            // Nothing was selected, so nothing can satisfy the node.
            Residual::conflict(synthetic(), collection.clone())
        })
    }

    fn eval_count(
        &self,
        c: &Count,
        document: &Value,
        prefix: &Path,
        positive: bool,
    ) -> Result<Residual> {
        let binding = prefix.join(&c.binding);
        let mut constraint = Constraint::new(binding.clone(), c.comparator.clone(), c.operand.clone());
        if !positive {
            match inverse_comparator(&c.comparator) {
                Some(inverse) => constraint.operator = inverse.into(),
                None => constraint.negated = true,
            }
        }

        let Some(collection) = document.lookup(&c.binding) else {
            return Ok(Residual::open(constraint));
        };
        let Some(elements) = collection.elements() else {
            return Ok(Residual::conflict(constraint, collection.clone()));
        };

        // Elements whose filter is undecided are not counted.
        let mut count = 0usize;
        for (idx, element) in elements.into_iter().enumerate() {
            let selected = match &c.filter {
                Some(filter) => {
                    let at = binding.child(element_key(collection, idx, element));
                    self.eval(filter, element, &at, true)?.is_satisfied()
                }
                None => true,
            };
            if selected {
                count += 1;
            }
        }

        let count = Value::from(count);
        let op = self.operators.lookup(&c.comparator)?;
        Ok(match op.holds(&count, &c.operand) == positive {
            true => Residual::Satisfied,
            false => Residual::conflict(constraint, count),
        })
    }
}

/// Key that leads from `collection` to `element`: the index in an array, the
/// element itself in a set.
fn element_key(collection: &Value, idx: usize, element: &Value) -> Value {
    match collection {
        Value::Set(_) => element.clone(),
        _ => Value::from(idx),
    }
}

/// The constraint as it must hold under the given polarity, relocated under `prefix`.
fn effective(c: &Constraint, prefix: &Path, positive: bool) -> Constraint {
    let c = c.rebase(prefix);
    if positive {
        return c;
    }
    negate_constraint(&c).unwrap_or_else(|| Constraint {
        negated: true,
        ..c
    })
}
