// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Node, OperatorId, Path};
use crate::negate::{negate, negate_constraint};

use std::collections::{BTreeMap, BTreeSet};

/// Policies flattened into per-path constraint lists.
///
/// Every constraint in `constraints` and every node in `complex` must hold;
/// the set as a whole is the conjunction of all of them. `complex` keeps the
/// structure that cannot be flattened (disjunctions, quantifiers, counts) in
/// the order it was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintSet {
    pub constraints: BTreeMap<Path, Vec<Constraint>>,
    pub complex: Vec<Node>,
    pub has_complex: bool,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge several policies. Policies sharing a path have their
    /// constraint lists concatenated.
    pub fn from_policies(policies: &[Node]) -> Self {
        let mut set = Self::new();
        for policy in policies {
            set.add(policy);
        }
        set
    }

    pub fn add(&mut self, policy: &Node) {
        self.flatten(policy, true);
        self.has_complex = !self.complex.is_empty();
    }

    fn flatten(&mut self, node: &Node, positive: bool) {
        match node {
            Node::Constraint(c) => {
                let c = match positive {
                    true => c.clone(),
                    false => negate_constraint(c).unwrap_or_else(|| Constraint {
                        negated: true,
                        ..c.clone()
                    }),
                };
                let at = self.constraints.entry(c.path.clone()).or_default();
                if !at.contains(&c) {
                    at.push(c);
                }
            }
            // A single child needs no connective.
            Node::And(children) | Node::Or(children) if children.len() == 1 => {
                self.flatten(&children[0], positive)
            }
            Node::And(children) if positive => {
                for child in children {
                    self.flatten(child, positive);
                }
            }
            Node::Or(children) if !positive => {
                for child in children {
                    self.flatten(child, positive);
                }
            }
            Node::Not(child) => self.flatten(child, !positive),
            _ => {
                let node = match positive {
                    true => node.clone(),
                    false => negate(node),
                };
                if !self.complex.contains(&node) {
                    self.complex.push(node);
                }
            }
        }
    }

    /// Number of flattened constraints.
    pub fn len(&self) -> usize {
        self.constraints.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.complex.is_empty()
    }

    /// Operators referenced anywhere in the set.
    pub fn operators(&self) -> BTreeSet<OperatorId> {
        let mut operators = BTreeSet::new();
        for c in self.constraints.values().flatten() {
            operators.insert(c.operator.clone());
        }
        for node in &self.complex {
            node.gather_operators(&mut operators);
        }
        operators
    }

    /// The set as a single policy: flattened constraints in path order,
    /// followed by the complex nodes.
    pub fn to_node(&self) -> Node {
        let leaves = self
            .constraints
            .values()
            .flatten()
            .cloned()
            .map(Node::Constraint);
        Node::And(leaves.chain(self.complex.iter().cloned()).collect())
    }
}
