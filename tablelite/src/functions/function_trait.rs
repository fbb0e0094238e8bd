// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar function interface

use crate::storage::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Invalid argument count: expected {expected}, got {actual}")]
    InvalidArgumentCount { expected: usize, actual: usize },

    #[error("Invalid argument type: {message}")]
    InvalidArgumentType { message: String },

    #[error("Function execution failed: {0}")]
    ExecutionError(String),
}

pub type FunctionResult<T> = Result<T, FunctionError>;

/// Evaluated arguments handed to a function call
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    pub arguments: Vec<Value>,
}

impl FunctionContext {
    pub fn new(arguments: Vec<Value>) -> Self {
        Self { arguments }
    }

    pub fn get_argument(&self, index: usize) -> FunctionResult<&Value> {
        self.arguments
            .get(index)
            .ok_or(FunctionError::InvalidArgumentCount {
                expected: index + 1,
                actual: self.arguments.len(),
            })
    }

    /// Argument that may be omitted
    pub fn optional_argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }
}

/// A scalar function callable from expressions
pub trait Function: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Minimum number of arguments
    fn argument_count(&self) -> usize;

    /// Maximum number of arguments; `None` for variadic functions
    fn max_argument_count(&self) -> Option<usize> {
        Some(self.argument_count())
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value>;

    fn return_type(&self) -> &str;

    /// Check an argument count against this function's arity
    fn accepts(&self, count: usize) -> bool {
        count >= self.argument_count()
            && self.max_argument_count().map_or(true, |max| count <= max)
    }
}
