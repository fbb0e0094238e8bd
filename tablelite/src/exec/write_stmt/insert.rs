// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
use std::sync::Arc;

use crate::ast::{Assignment, Insert, InsertRows, OnConflict};
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::QueryProgram;
use crate::exec::filter::passes_all;
use crate::exec::source::{bind, SourcePlan};
use crate::exec::write_stmt::{
    DataStatementExecutor, Modification, OperationType, Returning, StatementExecutor, TargetTable,
};
use crate::exec::ExecutionError;
use crate::storage::Record;

/// Binding of the candidate row inside an on-duplicate update
pub const EXCLUDED: &str = "excluded";

type CompiledAssignments = Vec<(String, CompiledExpr)>;

fn compile_assignments(
    compiler: &mut Compiler,
    assignments: &[Assignment],
) -> Result<CompiledAssignments, ExecutionError> {
    assignments
        .iter()
        .map(|assignment| Ok((assignment.column.clone(), compiler.compile(&assignment.value)?)))
        .collect()
}

enum CandidateRows {
    Values(Vec<CompiledAssignments>),
    Query(Arc<QueryProgram>),
}

enum ConflictPolicy {
    Fail,
    Ignore,
    Update {
        set: CompiledAssignments,
        filter: Vec<CompiledExpr>,
    },
}

/// Executor for INSERT statements
pub struct InsertExecutor {
    target: TargetTable,
    sources: SourcePlan,
    rows: CandidateRows,
    conflict: ConflictPolicy,
    returning: Returning,
}

impl InsertExecutor {
    pub fn compile(compiler: &mut Compiler, statement: &Insert) -> Result<Self, ExecutionError> {
        let target = TargetTable::compile(&statement.target)?;
        let sources = SourcePlan::compile(compiler, &statement.sources)?;
        let rows = match &statement.rows {
            InsertRows::Values(rows) => CandidateRows::Values(
                rows.iter()
                    .map(|row| compile_assignments(compiler, row))
                    .collect::<Result<_, _>>()?,
            ),
            InsertRows::Query(query) => CandidateRows::Query(compiler.compile_program(query)?),
        };
        let conflict = match &statement.conflict {
            None => ConflictPolicy::Fail,
            Some(OnConflict::Ignore) => ConflictPolicy::Ignore,
            Some(OnConflict::Update { set, filter }) => ConflictPolicy::Update {
                set: compile_assignments(compiler, set)?,
                filter: compiler.compile_optional(filter.as_ref())?.into_iter().collect(),
            },
        };
        let returning = Returning::compile(compiler, &statement.returning)?;
        Ok(Self {
            target,
            sources,
            rows,
            conflict,
            returning,
        })
    }

    /// Candidate rows keyed by logical column name
    fn candidates(&self, ctx: &mut ExecutionContext) -> Result<Vec<Record>, ExecutionError> {
        match &self.rows {
            CandidateRows::Values(rows) => {
                let mut out = Vec::with_capacity(rows.len());
                for assignments in rows {
                    let mut row = Record::new();
                    for (column, expr) in assignments {
                        row.insert(column.clone(), expr.evaluate(ctx)?);
                    }
                    out.push(row);
                }
                Ok(out)
            }
            CandidateRows::Query(program) => Ok(program.run_nested(ctx)?.rows),
        }
    }

    /// Candidate converted to a stored row
    fn stored(&self, candidate: Record) -> Record {
        let mut row = Record::new();
        for (column, value) in candidate {
            self.target.assign(&mut row, &column, value);
        }
        self.target.complete(&mut row);
        row
    }
}

impl StatementExecutor for InsertExecutor {
    fn operation_type(&self) -> OperationType {
        OperationType::Insert
    }

    fn operation_description(&self) -> String {
        format!("INSERT into '{}'", self.target.name)
    }
}

impl DataStatementExecutor for InsertExecutor {
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
        // WITH sources only bind names; the stream itself is unused
        self.sources.resolve(ctx)?;
        let candidates = self.candidates(ctx)?;
        let base = ctx.current_row().clone();
        let mut modification = Modification::default();

        for candidate in candidates {
            let stored = self.stored(candidate);
            let Some(existing) = self.target.find_by_key(rows, &stored, ctx.ignore_case) else {
                modification.affected += 1;
                modification.touched.push(stored.clone());
                rows.push(stored);
                continue;
            };

            match &self.conflict {
                ConflictPolicy::Fail => {
                    return Err(ExecutionError::DuplicateKey {
                        table: self.target.name.clone(),
                        key: self.target.describe_key(&stored),
                    })
                }
                ConflictPolicy::Ignore => {
                    log::trace!(
                        "Skipping duplicate {} in '{}'",
                        self.target.describe_key(&stored),
                        self.target.name
                    );
                }
                ConflictPolicy::Update { set, filter } => {
                    let mut eval_row = self.target.bound_row(&base, &rows[existing], ctx);
                    bind(&mut eval_row, EXCLUDED, self.target.view(&stored, ctx));
                    let (values, _) = ctx.on_row(eval_row, |ctx| {
                        if !passes_all(ctx, filter)? {
                            return Ok(None);
                        }
                        let mut values = Vec::with_capacity(set.len());
                        for (column, expr) in set {
                            values.push((column.as_str(), expr.evaluate(ctx)?));
                        }
                        Ok(Some(values))
                    });
                    if let Some(values) = values? {
                        let row = &mut rows[existing];
                        for (column, value) in values {
                            self.target.assign(row, column, value);
                        }
                        modification.affected += 1;
                        modification.touched.push(row.clone());
                    }
                }
            }
        }
        Ok(modification)
    }
}
