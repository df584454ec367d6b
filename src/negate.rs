// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Count, Node, Quantifier};
use crate::operators::{inverse, inverse_comparator};

/// Logical negation of a policy, pushed down to the leaves.
///
/// `And`/`Or` swap by De Morgan, `ForAll`/`Exists` swap with a negated body
/// (the filter keeps selecting the same elements) and `Not` cancels. Leaves
/// flip to their exact inverse operator where one exists and are wrapped in
/// `Not` otherwise.
pub fn negate(node: &Node) -> Node {
    match node {
        Node::Constraint(c) => match negate_constraint(c) {
            Some(c) => Node::Constraint(c),
            None => Node::Not(Box::new(node.clone())),
        },
        Node::And(children) => Node::Or(children.iter().map(negate).collect()),
        Node::Or(children) => Node::And(children.iter().map(negate).collect()),
        Node::Not(child) => (**child).clone(),
        Node::ForAll(q) => Node::Exists(negate_quantifier(q)),
        Node::Exists(q) => Node::ForAll(negate_quantifier(q)),
        Node::Count(c) => match inverse_comparator(&c.comparator) {
            Some(comparator) => Node::Count(Count {
                comparator: comparator.into(),
                ..c.clone()
            }),
            None => Node::Not(Box::new(node.clone())),
        },
    }
}

/// The constraint that holds exactly when `c` does not, if it can be
/// expressed as a single constraint.
pub(crate) fn negate_constraint(c: &Constraint) -> Option<Constraint> {
    if c.negated {
        return Some(Constraint {
            negated: false,
            ..c.clone()
        });
    }
    inverse(&c.operator).map(|op| Constraint {
        operator: op.into(),
        ..c.clone()
    })
}

fn negate_quantifier(q: &Quantifier) -> Quantifier {
    Quantifier {
        binding: q.binding.clone(),
        filter: q.filter.clone(),
        body: Box::new(negate(&q.body)),
    }
}
