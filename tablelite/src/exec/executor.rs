// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Runnable programs for query-shaped nodes

use crate::ast::{NodeKind, NodeRef};
use crate::exec::compiler::Compiler;
use crate::exec::context::ExecutionContext;
use crate::exec::result::QueryResult;
use crate::exec::select::SelectPlan;
use crate::exec::set_operation::SetOperationPlan;
use crate::exec::write_stmt::{
    DataStatementExecutor, DeleteExecutor, InsertExecutor, StatementExecutor, UpdateExecutor,
};
use crate::exec::ExecutionError;

pub enum QueryProgram {
    Select(SelectPlan),
    SetOperation(SetOperationPlan),
    Insert(InsertExecutor),
    Update(UpdateExecutor),
    Delete(DeleteExecutor),
}

impl QueryProgram {
    pub fn compile(compiler: &mut Compiler, node: &NodeRef) -> Result<Self, ExecutionError> {
        log::trace!("Compiling {} {}", node.kind_tag(), node.id());
        Ok(match node.kind() {
            NodeKind::Query(query) => QueryProgram::Select(SelectPlan::compile(compiler, query)?),
            NodeKind::SetOperation(operation) => {
                QueryProgram::SetOperation(SetOperationPlan::compile(compiler, operation)?)
            }
            NodeKind::Insert(insert) => {
                QueryProgram::Insert(InsertExecutor::compile(compiler, insert)?)
            }
            NodeKind::Update(update) => {
                QueryProgram::Update(UpdateExecutor::compile(compiler, update)?)
            }
            NodeKind::Delete(delete) => {
                QueryProgram::Delete(DeleteExecutor::compile(compiler, delete)?)
            }
            _ => {
                return Err(ExecutionError::UnsupportedNode(format!(
                    "{} is not a query",
                    node.kind_tag()
                )))
            }
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryProgram::Select(_) => "select",
            QueryProgram::SetOperation(_) => "set_operation",
            QueryProgram::Insert(executor) => executor.operation_type().as_str(),
            QueryProgram::Update(executor) => executor.operation_type().as_str(),
            QueryProgram::Delete(executor) => executor.operation_type().as_str(),
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            QueryProgram::Insert(_) | QueryProgram::Update(_) | QueryProgram::Delete(_)
        )
    }

    /// Run against the context's current state
    pub fn run(&self, ctx: &mut ExecutionContext) -> Result<QueryResult, ExecutionError> {
        let result = match self {
            QueryProgram::Select(plan) => plan.execute(ctx),
            QueryProgram::SetOperation(plan) => plan.execute(ctx),
            QueryProgram::Insert(executor) => executor.execute(ctx),
            QueryProgram::Update(executor) => executor.execute(ctx),
            QueryProgram::Delete(executor) => executor.execute(ctx),
        }?;
        log::trace!(
            "{} returned {} rows, {} affected",
            self.kind(),
            result.len(),
            result.affected
        );
        Ok(result)
    }

    /// Run as a sub-query whose outer row is the context's current row
    pub fn run_nested(&self, ctx: &mut ExecutionContext) -> Result<QueryResult, ExecutionError> {
        let outer = ctx.current_row().clone();
        let scope = ctx.enter_scope(outer);
        let result = self.run(ctx);
        ctx.exit_scope(scope);
        result
    }
}
