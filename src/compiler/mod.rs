// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod analyze;
mod normalize;

pub use analyze::{analyze, Analysis};
pub use normalize::ConstraintSet;

use crate::ast::{Node, OperatorId};
use crate::compiled_policy::{
    ClosureCompiled, CompiledPolicy, CompiledPolicyData, Evaluator, Guarded, Interpreted,
    NativeSpecializer, Tier,
};
use crate::registry::{operators, OperatorRegistry, UnknownOperator};
use crate::*;

use core::fmt;

use tracing::debug;

/// Safety net used when a guarded policy finds the registry has changed.
#[derive(Clone, Default)]
pub enum Fallback {
    /// Interpret the policies against the live registry.
    #[default]
    Synthesize,
    /// Caller-provided evaluator.
    Supplied(Rc<dyn Evaluator>),
    /// No fallback. Policies using custom operators fail to compile.
    Disabled,
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fallback::Synthesize => "Synthesize",
            Fallback::Supplied(_) => "Supplied",
            Fallback::Disabled => "Disabled",
        })
    }
}

/// Options for [`compile`].
#[derive(Clone, Default)]
pub struct CompileOptions {
    /// Highest tier the compiler may pick. `None` allows every tier.
    pub tier: Option<Tier>,
    pub fallback: Fallback,
    /// Code generator for T3. Without one, T2 is the fastest tier.
    pub specializer: Option<Rc<dyn NativeSpecializer>>,
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("tier", &self.tier)
            .field("fallback", &self.fallback)
            .field("specializer", &self.specializer.is_some())
            .finish()
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_fallback(mut self, fallback: Rc<dyn Evaluator>) -> Self {
        self.fallback = Fallback::Supplied(fallback);
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = Fallback::Disabled;
        self
    }

    pub fn with_specializer(mut self, specializer: Rc<dyn NativeSpecializer>) -> Self {
        self.specializer = Some(specializer);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("custom operators {} require a fallback evaluator", list(.operators))]
    MissingFallback { operators: Vec<OperatorId> },
    #[error(transparent)]
    UnknownOperator(#[from] UnknownOperator),
}

fn list(ids: &[OperatorId]) -> String {
    ids.iter()
        .map(|id| format!("`{id}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compile policies against the process-wide registry.
pub fn compile(policies: &[Node], opts: CompileOptions) -> Result<CompiledPolicy, CompileError> {
    Compiler::new(operators::shared()).compile(policies, opts)
}

/// Compiles policies against one operator registry.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Rc<OperatorRegistry>,
}

impl Compiler {
    pub fn new(registry: Rc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Rc<OperatorRegistry> {
        &self.registry
    }

    /// Merge `policies` into one constraint set and build the fastest
    /// admissible evaluator for it.
    ///
    /// Every referenced operator must be registered. Policies using custom
    /// operators need a fallback.
    pub fn compile(
        &self,
        policies: &[Node],
        opts: CompileOptions,
    ) -> Result<CompiledPolicy, CompileError> {
        let set = ConstraintSet::from_policies(policies);
        self.compile_set(policies.to_vec(), set, opts)
    }

    pub(crate) fn compile_set(
        &self,
        policies: Vec<Node>,
        set: ConstraintSet,
        opts: CompileOptions,
    ) -> Result<CompiledPolicy, CompileError> {
        let analysis = analyze(&set);
        let snapshot = self.registry.snapshot();
        for id in &analysis.operators {
            snapshot.lookup(id)?;
        }

        let fallback = match &opts.fallback {
            Fallback::Disabled if !analysis.custom.is_empty() => {
                return Err(CompileError::MissingFallback {
                    operators: analysis.custom.iter().cloned().collect(),
                })
            }
            Fallback::Disabled => None,
            Fallback::Supplied(e) => Some(e.clone()),
            Fallback::Synthesize => {
                let e: Rc<dyn Evaluator> = Rc::new(Interpreted::new(
                    Node::conjunction(&policies),
                    self.registry.clone(),
                ));
                Some(e)
            }
        };

        let ceiling = opts.tier.unwrap_or(Tier::T3);
        // T0 runs the policies exactly as given.
        let interpreted = || -> Rc<dyn Evaluator> {
            Rc::new(Interpreted::new(
                Node::conjunction(&policies),
                self.registry.clone(),
            ))
        };
        let guarded = |fast: Rc<dyn Evaluator>, fallback: &Option<Rc<dyn Evaluator>>| {
            let fallback = fallback.clone().unwrap_or_else(interpreted);
            let e: Rc<dyn Evaluator> = Rc::new(Guarded::new(
                snapshot.version,
                self.registry.clone(),
                fast,
                fallback,
            ));
            e
        };

        let (tier, evaluator) = if analysis.has_complex || ceiling == Tier::T0 {
            (Tier::T0, interpreted())
        } else if !analysis.all_builtin() || ceiling == Tier::T1 {
            let fast = Rc::new(ClosureCompiled::generic(&set, &snapshot)?);
            (Tier::T1, guarded(fast, &fallback))
        } else {
            let specialized = match (ceiling, &opts.specializer) {
                (Tier::T3, Some(specializer)) => specializer.specialize(&set),
                _ => None,
            };
            match specialized {
                Some(e) => (Tier::T3, e),
                None => {
                    let e: Rc<dyn Evaluator> =
                        Rc::new(ClosureCompiled::generic(&set, &snapshot)?);
                    (Tier::T2, e)
                }
            }
        };

        debug!(
            ?tier,
            version = snapshot.version,
            constraints = set.len(),
            complex = set.complex.len(),
            custom = analysis.custom.len(),
            "compiled policy"
        );

        Ok(CompiledPolicy::new(Rc::new(CompiledPolicyData {
            tier,
            compiled_version: snapshot.version,
            set,
            analysis,
            evaluator,
            fallback,
            registry: self.registry.clone(),
            policies,
            options: opts,
        })))
    }
}
