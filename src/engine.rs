// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::Node;
use crate::compiled_policy::{CompiledPolicy, InlineSpecializer};
use crate::compiler::{CompileError, CompileOptions, Compiler, ConstraintSet};
use crate::interpreter::Interpreter;
use crate::negate::negate;
use crate::parser::{parse, parse_str, ParseError};
use crate::registry::{OperatorRegistry, RegistryError, UnknownOperator};
use crate::residual::Residual;
use crate::value::Value;
use crate::*;

use std::path::Path;

use anyhow::{bail, Result};
use dashmap::DashMap;
use tracing::debug;

/// Compiled policies keyed by their normalized constraint set.
///
/// A guarded entry whose registry version moved is recompiled on access.
#[derive(Debug, Default)]
pub struct PolicyCache {
    entries: DashMap<ConstraintSet, CompiledPolicy>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &self,
        compiler: &Compiler,
        policies: &[Node],
        opts: &CompileOptions,
    ) -> core::result::Result<CompiledPolicy, CompileError> {
        let set = ConstraintSet::from_policies(policies);
        // Clone out of the map so no shard lock is held while compiling.
        let cached = self.entries.get(&set).map(|entry| entry.value().clone());
        let policy = match cached {
            Some(policy) if !policy.is_stale() => return Ok(policy),
            Some(stale) => {
                debug!(
                    compiled = stale.compiled_version(),
                    current = compiler.registry().current_version(),
                    "refreshing stale policy"
                );
                stale.refresh()?
            }
            None => compiler.compile_set(policies.to_vec(), set.clone(), opts.clone())?,
        };
        self.entries.insert(set, policy.clone());
        Ok(policy)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Policy engine with its own operator registry and compiled-policy cache.
///
/// Policies added to the engine are evaluated together, as if joined by `and`.
#[derive(Clone)]
pub struct Engine {
    compiler: Compiler,
    policies: Vec<Node>,
    options: CompileOptions,
    cache: Rc<PolicyCache>,
}

/// Create a default engine.
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with a fresh registry holding the built-in operators.
    pub fn new() -> Self {
        Self::with_registry(Rc::new(OperatorRegistry::with_builtins()))
    }

    pub fn with_registry(registry: Rc<OperatorRegistry>) -> Self {
        Self {
            compiler: Compiler::new(registry),
            policies: vec![],
            options: CompileOptions::new().with_specializer(Rc::new(InlineSpecializer)),
            cache: Rc::new(PolicyCache::new()),
        }
    }

    pub fn registry(&self) -> &Rc<OperatorRegistry> {
        self.compiler.registry()
    }

    /// Register a custom operator with the engine's registry.
    pub fn register_operator<F>(&self, id: &str, predicate: F) -> core::result::Result<u64, RegistryError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.registry().register(id, predicate)
    }

    /// Parse and add a policy written in policy notation.
    pub fn add_policy(&mut self, policy: &str) -> core::result::Result<Node, ParseError> {
        let node = parse_str(policy)?;
        self.policies.push(node.clone());
        Ok(node)
    }

    /// Parse and add a policy given as a tagged-vector value.
    pub fn add_policy_value(&mut self, expr: &Value) -> core::result::Result<Node, ParseError> {
        let node = parse(expr)?;
        self.policies.push(node.clone());
        Ok(node)
    }

    pub fn add_policy_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Node> {
        let text = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.as_ref().display()),
        };
        Ok(self.add_policy(&text)?)
    }

    pub fn get_policies(&self) -> &[Node] {
        &self.policies
    }

    pub fn clear_policies(&mut self) {
        self.policies.clear();
    }

    /// Options used for every compilation. Changing them empties the cache.
    pub fn set_compile_options(&mut self, options: CompileOptions) {
        self.options = options;
        self.cache.clear();
    }

    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    /// Compile the engine's policies, reusing a cached compilation when possible.
    pub fn compile(&self) -> core::result::Result<CompiledPolicy, CompileError> {
        self.cache
            .get_or_compile(&self.compiler, &self.policies, &self.options)
    }

    /// Evaluate the engine's policies through their compiled form.
    pub fn eval(&self, document: &Value) -> Result<Residual> {
        Ok(self.compile()?.evaluate(document)?)
    }

    /// Evaluate the engine's policies with the interpreter, without compiling.
    pub fn interpret(&self, document: &Value) -> core::result::Result<Residual, UnknownOperator> {
        Interpreter::new(self.registry()).evaluate(&self.policy(), document)
    }

    /// What the empty document would have to provide to contradict the policies.
    pub fn inverse_query(&self) -> core::result::Result<Residual, UnknownOperator> {
        Interpreter::new(self.registry()).evaluate(&negate(&self.policy()), &Value::new_object())
    }

    fn policy(&self) -> Node {
        Node::conjunction(&self.policies)
    }
}
