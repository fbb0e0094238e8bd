// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
use std::sync::Arc;

use crate::ast::{SetClause, Update};
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::QueryProgram;
use crate::exec::filter::passes_all;
use crate::exec::source::SourcePlan;
use crate::exec::write_stmt::{
    DataStatementExecutor, Modification, OperationType, Returning, StatementExecutor, TargetTable,
};
use crate::exec::ExecutionError;
use crate::storage::{Record, Value};

enum Setter {
    Column(String, CompiledExpr),
    /// `(a, b) = (SELECT ...)`: first row, columns by position
    Row(Vec<String>, Arc<QueryProgram>),
}

impl Setter {
    fn evaluate(
        &self,
        ctx: &mut ExecutionContext,
        out: &mut Vec<(String, Value)>,
    ) -> Result<(), ExecutionError> {
        match self {
            Setter::Column(column, expr) => out.push((column.clone(), expr.evaluate(ctx)?)),
            Setter::Row(columns, program) => {
                let result = program.run_nested(ctx)?;
                let first = result.rows.first().map(|row| result.tuple(row));
                for (index, column) in columns.iter().enumerate() {
                    let value = first
                        .as_ref()
                        .and_then(|tuple| tuple.get(index).cloned())
                        .unwrap_or(Value::Null);
                    out.push((column.clone(), value));
                }
            }
        }
        Ok(())
    }
}

/// Executor for UPDATE statements
pub struct UpdateExecutor {
    target: TargetTable,
    sources: SourcePlan,
    setters: Vec<Setter>,
    filters: Vec<CompiledExpr>,
    returning: Returning,
}

impl UpdateExecutor {
    pub fn compile(compiler: &mut Compiler, statement: &Update) -> Result<Self, ExecutionError> {
        let target = TargetTable::compile(&statement.target)?;
        let sources = SourcePlan::compile(compiler, &statement.sources)?;
        let mut setters = Vec::with_capacity(statement.set.len());
        for clause in &statement.set {
            setters.push(match clause {
                SetClause::Column(assignment) => Setter::Column(
                    assignment.column.clone(),
                    compiler.compile(&assignment.value)?,
                ),
                SetClause::Row { columns, query } => {
                    Setter::Row(columns.clone(), compiler.compile_program(query)?)
                }
            });
        }
        let filters = compiler.compile_all(&statement.filters)?;
        let returning = Returning::compile(compiler, &statement.returning)?;
        Ok(Self {
            target,
            sources,
            setters,
            filters,
            returning,
        })
    }
}

impl StatementExecutor for UpdateExecutor {
    fn operation_type(&self) -> OperationType {
        OperationType::Update
    }

    fn operation_description(&self) -> String {
        format!("UPDATE '{}' with {} setters", self.target.name, self.setters.len())
    }
}

impl DataStatementExecutor for UpdateExecutor {
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

        for row in rows.iter_mut() {
            let mut values = None;
            for joined in &stream {
                let eval_row = self.target.bound_row(joined, row, ctx);
                let (outcome, _) = ctx.on_row(eval_row, |ctx| {
                    if !passes_all(ctx, &self.filters)? {
                        return Ok(None);
                    }
                    let mut values = Vec::new();
                    for setter in &self.setters {
                        setter.evaluate(ctx, &mut values)?;
                    }
                    Ok(Some(values))
                });
                if let Some(found) = outcome? {
                    values = Some(found);
                    break;
                }
            }

            if let Some(values) = values {
                for (column, value) in values {
                    self.target.assign(row, &column, value);
                }
                modification.affected += 1;
                modification.touched.push(row.clone());
            }
        }
        Ok(modification)
    }
}
