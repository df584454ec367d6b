// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Constraint, Node, Path};
use crate::compiler::{Analysis, CompileError, CompileOptions, Compiler, ConstraintSet};
use crate::interpreter::Interpreter;
use crate::operators::{specialize, Check};
use crate::registry::{OperatorRegistry, Snapshot, UnknownOperator};
use crate::residual::{Opens, Residual};
use crate::value::Value;
use crate::*;

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Execution strategy of a compiled policy, slowest first.
///
/// Every tier produces the same residual for the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Interprets the normalized policy on every call.
    T0,
    /// T2 behind a registry version check, falling back when the check fails.
    T1,
    /// Pre-resolved predicates per path.
    T2,
    /// Operands baked into specialized checks.
    T3,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Anything that turns a document into a residual.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator>;
}

/// Optional code generator for the fastest tier.
///
/// Returning `None` is always allowed; the compiler then uses T2.
pub trait NativeSpecializer: Send + Sync {
    fn specialize(&self, set: &ConstraintSet) -> Option<Rc<dyn Evaluator>>;
}

/// Specializer that builds one monomorphic check per constraint: regexes
/// are compiled once, membership operands become sets and comparison
/// bounds are captured by value.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSpecializer;

impl NativeSpecializer for InlineSpecializer {
    fn specialize(&self, set: &ConstraintSet) -> Option<Rc<dyn Evaluator>> {
        if set.has_complex {
            return None;
        }
        let e: Rc<dyn Evaluator> = Rc::new(ClosureCompiled::specialized(set)?);
        Some(e)
    }
}

/// T0: the tree-walking interpreter against the live registry.
pub(crate) struct Interpreted {
    node: Node,
    registry: Rc<OperatorRegistry>,
}

impl Interpreted {
    pub(crate) fn new(node: Node, registry: Rc<OperatorRegistry>) -> Self {
        Self { node, registry }
    }
}

impl Evaluator for Interpreted {
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        Interpreter::new(&self.registry).evaluate(&self.node, document)
    }
}

struct PathPlan {
    path: Path,
    // Residual entry when the path is missing.
    open: Vec<Constraint>,
    checks: Vec<(Constraint, Check)>,
}

/// T2 and T3: per-path checks run in path order.
///
/// The first failing check ends evaluation with a conflict. Missing paths
/// contribute their prebuilt open entry.
pub(crate) struct ClosureCompiled {
    plans: Vec<PathPlan>,
}

impl ClosureCompiled {
    fn build<F>(set: &ConstraintSet, mut make_check: F) -> Result<Self, UnknownOperator>
    where
        F: FnMut(&Constraint) -> Result<Check, UnknownOperator>,
    {
        let mut plans = Vec::with_capacity(set.constraints.len());
        for (path, constraints) in &set.constraints {
            let checks = constraints
                .iter()
                .map(|c| Ok((c.clone(), make_check(c)?)))
                .collect::<Result<Vec<_>, UnknownOperator>>()?;
            plans.push(PathPlan {
                path: path.clone(),
                open: constraints.clone(),
                checks,
            });
        }
        Ok(Self { plans })
    }

    /// Checks calling the predicates registered at `snapshot`.
    pub(crate) fn generic(set: &ConstraintSet, snapshot: &Snapshot) -> Result<Self, UnknownOperator> {
        Self::build(set, |c| {
            let predicate = snapshot.lookup(&c.operator)?.predicate.clone();
            let operand = c.operand.clone();
            let negated = c.negated;
            let check: Check = Box::new(move |v: &Value| predicate(v, &operand) != negated);
            Ok(check)
        })
    }

    /// Checks specialized for built-in operators. `None` if any constraint
    /// uses another operator.
    pub(crate) fn specialized(set: &ConstraintSet) -> Option<Self> {
        Self::build(set, |c| {
            let check = specialize(&c.operator, &c.operand)
                .ok_or_else(|| UnknownOperator(c.operator.clone()))?;
            if !c.negated {
                return Ok(check);
            }
            let negated: Check = Box::new(move |v: &Value| !check(v));
            Ok(negated)
        })
        .ok()
    }
}

impl Evaluator for ClosureCompiled {
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        let mut opens = Opens::new();
        for plan in &self.plans {
            let Some(value) = document.lookup(&plan.path) else {
                opens.insert(plan.path.clone(), plan.open.clone());
                continue;
            };
            for (constraint, check) in &plan.checks {
                if !check(value) {
                    return Ok(Residual::conflict(constraint.clone(), value.clone()));
                }
            }
        }
        Ok(match opens.is_empty() {
            true => Residual::Satisfied,
            false => Residual::Open(opens),
        })
    }
}

/// T1: runs the fast evaluator only while the registry is at the version it
/// was compiled against.
pub(crate) struct Guarded {
    compiled_version: u64,
    registry: Rc<OperatorRegistry>,
    fast: Rc<dyn Evaluator>,
    fallback: Rc<dyn Evaluator>,
}

impl Guarded {
    pub(crate) fn new(
        compiled_version: u64,
        registry: Rc<OperatorRegistry>,
        fast: Rc<dyn Evaluator>,
        fallback: Rc<dyn Evaluator>,
    ) -> Self {
        Self {
            compiled_version,
            registry,
            fast,
            fallback,
        }
    }
}

impl Evaluator for Guarded {
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        let current = self.registry.current_version();
        if current == self.compiled_version {
            return self.fast.evaluate(document);
        }
        trace!(
            compiled = self.compiled_version,
            current,
            "registry changed; using fallback"
        );
        self.fallback.evaluate(document)
    }
}

pub(crate) struct CompiledPolicyData {
    pub(crate) tier: Tier,
    pub(crate) compiled_version: u64,
    pub(crate) set: ConstraintSet,
    pub(crate) analysis: Analysis,
    pub(crate) evaluator: Rc<dyn Evaluator>,
    pub(crate) fallback: Option<Rc<dyn Evaluator>>,
    pub(crate) registry: Rc<OperatorRegistry>,
    pub(crate) policies: Vec<Node>,
    pub(crate) options: CompileOptions,
}

/// A constraint set bound to the evaluator the compiler picked for it.
///
/// Cheap to clone and safe to share across threads. Never changes after
/// compilation; [`CompiledPolicy::refresh`] builds a new one.
#[derive(Clone)]
pub struct CompiledPolicy {
    inner: Rc<CompiledPolicyData>,
}

impl fmt::Debug for CompiledPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPolicy")
            .field("tier", &self.inner.tier)
            .field("compiled_version", &self.inner.compiled_version)
            .field("set", &self.inner.set)
            .finish_non_exhaustive()
    }
}

impl CompiledPolicy {
    pub(crate) fn new(inner: Rc<CompiledPolicyData>) -> Self {
        Self { inner }
    }

    pub fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        self.inner.evaluator.evaluate(document)
    }

    pub fn tier(&self) -> Tier {
        self.inner.tier
    }

    /// Registry version the policy was compiled against.
    pub fn compiled_version(&self) -> u64 {
        self.inner.compiled_version
    }

    pub fn constraint_set(&self) -> &ConstraintSet {
        &self.inner.set
    }

    pub fn analysis(&self) -> &Analysis {
        &self.inner.analysis
    }

    pub fn fallback(&self) -> Option<&Rc<dyn Evaluator>> {
        self.inner.fallback.as_ref()
    }

    /// Whether the registry moved past the version a guarded policy was
    /// compiled against. Such a policy still evaluates correctly, through
    /// its fallback.
    pub fn is_stale(&self) -> bool {
        self.inner.tier == Tier::T1
            && self.inner.registry.current_version() != self.inner.compiled_version
    }

    /// Compile the same policies again against the current registry.
    pub fn refresh(&self) -> Result<CompiledPolicy, CompileError> {
        Compiler::new(self.inner.registry.clone()).compile_set(
            self.inner.policies.clone(),
            self.inner.set.clone(),
            self.inner.options.clone(),
        )
    }
}

impl Evaluator for CompiledPolicy {
    fn evaluate(&self, document: &Value) -> Result<Residual, UnknownOperator> {
        CompiledPolicy::evaluate(self, document)
    }
}
