// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Entry points for running node trees against collections
//!
//! - [`exec`] compiles and runs a tree in one step
//! - [`prepare`] compiles once into a [`PreparedQuery`] that can run many times
//! - [`Database`] owns shared collections and adds transactions and streaming
//!
//! A statement runs against a copy-on-write clone of the caller's
//! collections. The clone is written back only when the statement succeeds,
//! so a failing statement never leaves a partial mutation behind.

pub mod database;
pub mod options;

pub use database::{Counted, Database, DatabaseStatement};
pub use options::ExecOptions;

use std::sync::Arc;

use crate::ast::NodeRef;
use crate::exec::{Compiler, ExecutionContext, ExecutionError, QueryOutput, QueryProgram, QueryResult};
use crate::functions::FunctionRegistry;
use crate::storage::{Collections, Record};

/// A compiled tree, ready to run against any collections
#[derive(Clone)]
pub struct PreparedQuery {
    program: Arc<QueryProgram>,
}

impl PreparedQuery {
    pub fn compile(
        query: &NodeRef,
        registry: Arc<FunctionRegistry>,
    ) -> Result<Self, ExecutionError> {
        let mut compiler = Compiler::new(registry);
        let program = compiler.compile_program(query)?;
        log::debug!("Prepared {} statement {}", program.kind(), query.id());
        Ok(Self { program })
    }

    pub fn kind(&self) -> &'static str {
        self.program.kind()
    }

    pub fn is_mutation(&self) -> bool {
        self.program.is_mutation()
    }

    /// Run and return the raw result; `collections` changes only on success
    pub fn run(
        &self,
        collections: &mut Collections,
        options: &ExecOptions,
    ) -> Result<QueryResult, ExecutionError> {
        let mut ctx = ExecutionContext::new(collections.clone(), options);
        let result = self.program.run(&mut ctx);
        match result {
            Ok(mut result) => {
                result.affected = ctx.affected();
                *collections = ctx.into_collections();
                log::debug!(
                    "{} statement finished: {} rows, {} affected",
                    self.kind(),
                    result.len(),
                    result.affected
                );
                Ok(result)
            }
            Err(error) => {
                log::debug!("{} statement failed: {}", self.kind(), error);
                Err(error)
            }
        }
    }

    /// Run with `params` merged over the option parameters and shape the output
    pub fn execute(
        &self,
        collections: &mut Collections,
        options: &ExecOptions,
        params: Record,
    ) -> Result<QueryOutput, ExecutionError> {
        let result = if params.is_empty() {
            self.run(collections, options)?
        } else {
            let mut options = options.clone();
            options.params.extend(params);
            self.run(collections, &options)?
        };
        Ok(result.into_output(options.array_mode, options.affected_count))
    }
}

/// Compile a tree with the default function registry
pub fn prepare(query: &NodeRef) -> Result<PreparedQuery, ExecutionError> {
    PreparedQuery::compile(query, Arc::new(FunctionRegistry::default()))
}

pub fn prepare_with_registry(
    query: &NodeRef,
    registry: Arc<FunctionRegistry>,
) -> Result<PreparedQuery, ExecutionError> {
    PreparedQuery::compile(query, registry)
}

/// Compile and run a tree in one step
pub fn exec(
    collections: &mut Collections,
    options: &ExecOptions,
    query: &NodeRef,
) -> Result<QueryOutput, ExecutionError> {
    prepare(query)?.execute(collections, options, Record::new())
}
