// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution errors

use crate::functions::FunctionError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Unsupported node: {0}")]
    UnsupportedNode(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing source: {0}")]
    MissingSource(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Duplicate key in '{table}': {key}")]
    DuplicateKey { table: String, key: String },

    #[error("Recursive source '{name}' exceeded {limit} iterations")]
    RecursionLimit { name: String, limit: usize },

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Missing handler: {0}")]
    MissingHandler(String),

    /// Abort signal for [`crate::Database::transaction`]
    #[error("Transaction rolled back")]
    Rollback,
}

impl ExecutionError {
    /// Errors raised while compiling a tree, before any row is touched
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ExecutionError::UnsupportedNode(_)
                | ExecutionError::UnknownFunction(_)
                | ExecutionError::InvalidArgument(_)
        )
    }
}
