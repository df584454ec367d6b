// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::OperatorId;
use crate::compiler::ConstraintSet;
use crate::operators::is_builtin;

use std::collections::BTreeSet;

/// What a constraint set needs from the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    /// Structure that only the interpreter can evaluate.
    pub has_complex: bool,
    /// Every referenced operator id.
    pub operators: BTreeSet<OperatorId>,
    /// Built-in operators. Their behavior never changes.
    pub builtin: BTreeSet<OperatorId>,
    /// Operators that can be replaced through the registry.
    pub custom: BTreeSet<OperatorId>,
}

impl Analysis {
    pub fn all_builtin(&self) -> bool {
        self.custom.is_empty()
    }
}

pub fn analyze(set: &ConstraintSet) -> Analysis {
    let operators = set.operators();
    let (builtin, custom) = operators.iter().cloned().partition(|id| is_builtin(id));
    Analysis {
        has_complex: set.has_complex,
        operators,
        builtin,
        custom,
    }
}
