// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Versioned operator registry.
//!
//! The table of operators is an immutable snapshot that is replaced as a
//! whole on every registration. Readers load the published snapshot without
//! taking a lock and never observe a partially updated table. Writers are
//! serialized among themselves; the snapshot is published before the version
//! counter moves, so a reader that sees version `n` also sees every
//! registration up to `n`.

use crate::ast::OperatorId;
use crate::operators::{Operator, OperatorTable};
use crate::value::Value;
use crate::*;

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::info;


/// Errors that can occur when registering an operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("operator registration failed: the name '{name}' is invalid (empty or whitespace-only names are not allowed)")]
    InvalidName { name: OperatorId },
    #[error("operator registration failed: '{name}' is a built-in operator and cannot be replaced")]
    BuiltinOperator { name: OperatorId },
}

/// A constraint referenced an operator that is not registered.
///
/// This is a configuration error, not a residual outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator `{0}`")]
pub struct UnknownOperator(pub OperatorId);

/// Validates that a name is not empty or whitespace-only.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        Err(RegistryError::InvalidName { name: name.into() })
    } else {
        Ok(())
    }
}

/// Immutable view of the registry at one version.
#[derive(Clone)]
pub struct Snapshot {
    pub table: Rc<OperatorTable>,
    pub version: u64,
}

impl Snapshot {
    pub fn lookup(&self, id: &str) -> Result<&Rc<Operator>, UnknownOperator> {
        self.table
            .get(id)
            .ok_or_else(|| UnknownOperator(id.into()))
    }
}

/// Thread-safe registry of named comparison operators.
pub struct OperatorRegistry {
    current: ArcSwap<Snapshot>,
    // Mirrors `current.version` so guards only read an atomic.
    version: AtomicU64,
    writer: Mutex<()>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.operator_ids())
            .field("version", &self.current_version())
            .finish()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl OperatorRegistry {
    /// An empty registry without the built-in operators.
    pub fn new() -> Self {
        Self::from_table(OperatorTable::new())
    }

    /// A registry holding the built-in operators at version 0.
    pub fn with_builtins() -> Self {
        Self::from_table(crate::operators::builtins())
    }

    fn from_table(table: OperatorTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot {
                table: Rc::new(table),
                version: 0,
            }),
            version: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Install or replace a custom operator and return the new version.
    pub fn register<F>(&self, id: &str, predicate: F) -> Result<u64, RegistryError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.register_operator(Operator::new(id, predicate))
    }

    /// Install or replace an operator and return the new version.
    ///
    /// Built-in ids are reserved; their predicates never change.
    pub fn register_operator(&self, operator: Operator) -> Result<u64, RegistryError> {
        validate_name(&operator.id)?;
        if crate::operators::is_builtin(&operator.id) {
            return Err(RegistryError::BuiltinOperator {
                name: operator.id.clone(),
            });
        }
        let id = operator.id.clone();

        let writer = self.writer.lock();
        let current = self.current.load_full();
        let mut table = (*current.table).clone();
        let replaced = table.insert(id.clone(), Rc::new(operator)).is_some();
        let version = current.version + 1;
        self.current.store(Rc::new(Snapshot {
            table: Rc::new(table),
            version,
        }));
        self.version.store(version, Ordering::Release);
        drop(writer);

        info!(operator = %id, version, replaced, "registered operator");
        Ok(version)
    }

    /// Current operator registered under `id`.
    pub fn lookup(&self, id: &str) -> Result<Rc<Operator>, UnknownOperator> {
        self.snapshot().lookup(id).cloned()
    }

    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The table and version as of now.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::clone(&self.current.load_full())
    }

    pub fn is_builtin(&self, id: &str) -> bool {
        crate::operators::is_builtin(id) && self.snapshot().table.contains_key(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().table.contains_key(id)
    }

    /// Registered operator ids in sorted order.
    pub fn operator_ids(&self) -> Vec<OperatorId> {
        self.snapshot().table.keys().cloned().collect()
    }
}

/// Process-wide registry instance.
pub mod instances {
    use super::*;

    lazy_static::lazy_static! {
        /// Global registry, initialized with the built-in operators.
        pub static ref OPERATOR_REGISTRY: Rc<OperatorRegistry> = Rc::new(OperatorRegistry::with_builtins());
    }
}

/// Helper functions for the process-wide operator registry.
pub mod operators {
    use super::instances::OPERATOR_REGISTRY;
    use super::*;

    /// The process-wide registry.
    pub fn global() -> &'static OperatorRegistry {
        &OPERATOR_REGISTRY
    }

    /// Shared handle to the process-wide registry.
    pub fn shared() -> Rc<OperatorRegistry> {
        Rc::clone(&OPERATOR_REGISTRY)
    }

    /// Install or replace a custom operator in the process-wide registry.
    pub fn register<F>(id: &str, predicate: F) -> Result<u64, RegistryError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        OPERATOR_REGISTRY.register(id, predicate)
    }

    /// Retrieve an operator by id.
    pub fn lookup(id: &str) -> Result<Rc<Operator>, UnknownOperator> {
        OPERATOR_REGISTRY.lookup(id)
    }

    /// Version of the process-wide registry.
    pub fn current_version() -> u64 {
        OPERATOR_REGISTRY.current_version()
    }
}
