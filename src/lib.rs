// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

// Policies, documents and compiled policies are shared across threads.
pub(crate) use std::sync::Arc as Rc;

mod ast;
mod compiled_policy;
mod compiler;
mod engine;
mod interpreter;
mod lexer;
mod negate;
mod number;
mod operators;
mod parser;
mod reader;
pub mod registry;
mod residual;
mod value;

pub use ast::{Constraint, Count, Node, OperatorId, Path, Quantifier};
pub use compiled_policy::{CompiledPolicy, Evaluator, InlineSpecializer, NativeSpecializer, Tier};
pub use compiler::{
    analyze, compile, Analysis, CompileError, CompileOptions, Compiler, ConstraintSet, Fallback,
};
pub use engine::{Engine, PolicyCache};
pub use interpreter::{evaluate, Interpreter};
pub use negate::negate;
pub use number::Number;
pub use operators::{OperandKind, Operator, Predicate};
pub use parser::{parse, parse_str, ParseError};
pub use registry::{OperatorRegistry, RegistryError, UnknownOperator};
pub use residual::{Residual, Violation};
pub use value::Value;

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::lexer::*;
    pub use crate::reader::read;
}
