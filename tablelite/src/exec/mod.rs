// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution engine
//!
//! A node tree is compiled once into a [`QueryProgram`]: a tree of closures
//! with every function resolved and every window collected. Running the
//! program against an [`ExecutionContext`] produces a [`QueryResult`].

pub mod aggregate;
pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub(crate) mod expression;
pub mod filter;
pub mod grouping;
pub mod recursive;
pub mod result;
pub mod select;
pub mod set_operation;
pub mod sorting;
pub mod source;
pub mod window;
pub mod write_stmt;

// Re-export the main types for convenience
pub use compiler::{CompiledExpr, Compiler, Evaluator};
pub use context::{ExecutionContext, ResultRecord};
pub use error::ExecutionError;
pub use executor::QueryProgram;
pub use result::{QueryOutput, QueryResult};
