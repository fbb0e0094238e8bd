// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
use crate::ast::Delete;
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::ExecutionContext;
use crate::exec::filter::passes_all;
use crate::exec::source::SourcePlan;
use crate::exec::write_stmt::{
    DataStatementExecutor, Modification, OperationType, Returning, StatementExecutor, TargetTable,
};
use crate::exec::ExecutionError;
use crate::storage::Record;

/// Executor for DELETE statements
pub struct DeleteExecutor {
    target: TargetTable,
    sources: SourcePlan,
    filters: Vec<CompiledExpr>,
    returning: Returning,
}

impl DeleteExecutor {
    pub fn compile(compiler: &mut Compiler, statement: &Delete) -> Result<Self, ExecutionError> {
        Ok(Self {
            target: TargetTable::compile(&statement.target)?,
            sources: SourcePlan::compile(compiler, &statement.sources)?,
            filters: compiler.compile_all(&statement.filters)?,
            returning: Returning::compile(compiler, &statement.returning)?,
        })
    }
}

impl StatementExecutor for DeleteExecutor {
    fn operation_type(&self) -> OperationType {
        OperationType::Delete
    }

    fn operation_description(&self) -> String {
        format!("DELETE from '{}'", self.target.name)
    }
}

impl DataStatementExecutor for DeleteExecutor {
    fn target(&self) -> &TargetTable {
        &self.target
    }

    fn returning(&self) -> &Returning {
        &self.returning
    }

    fn execute_modification(
        &self,
        rows: &mut Vec<Record>,
        ctx: &mut ExecutionContext,
    ) -> Result<Modification, ExecutionError> {
        let stream = self.sources.resolve(ctx)?;
        let mut modification = Modification::default();
        let mut kept = Vec::with_capacity(rows.len());

        for row in rows.drain(..) {
            let mut matched = false;
            for joined in &stream {
                let eval_row = self.target.bound_row(joined, &row, ctx);
                let (passed, _) = ctx.on_row(eval_row, |ctx| passes_all(ctx, &self.filters));
                if passed? {
                    matched = true;
                    break;
                }
            }
            if matched {
                modification.affected += 1;
                modification.touched.push(row);
            } else {
                kept.push(row);
            }
        }

        *rows = kept;
        Ok(modification)
    }
}
