// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! UNION, INTERSECT and EXCEPT over tuple-shaped rows

use crate::ast::{SetOperation, SetOperator};
use crate::compare::tuples_equal;
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::{ExecutionContext, ResultRecord};
use crate::exec::executor::QueryProgram;
use crate::exec::result::QueryResult;
use crate::exec::select::{page, paging_value};
use crate::exec::sorting::{rank_records, SortKey};
use crate::exec::ExecutionError;
use crate::storage::{Record, Value};
use std::sync::Arc;

type Tuple = Vec<Value>;

fn position(rows: &[Tuple], row: &Tuple, ignore_case: bool) -> Option<usize> {
    rows.iter().position(|seen| tuples_equal(seen, row, ignore_case))
}

pub fn dedup(rows: Vec<Tuple>, ignore_case: bool) -> Vec<Tuple> {
    let mut unique: Vec<Tuple> = Vec::with_capacity(rows.len());
    for row in rows {
        if position(&unique, &row, ignore_case).is_none() {
            unique.push(row);
        }
    }
    unique
}

pub fn union(left: Vec<Tuple>, right: Vec<Tuple>, all: bool, ignore_case: bool) -> Vec<Tuple> {
    if all {
        let mut out = left;
        out.extend(right);
        return out;
    }
    let mut out = dedup(left, ignore_case);
    for row in right {
        if position(&out, &row, ignore_case).is_none() {
            out.push(row);
        }
    }
    out
}

pub fn intersect(left: Vec<Tuple>, right: Vec<Tuple>, all: bool, ignore_case: bool) -> Vec<Tuple> {
    if !all {
        return dedup(left, ignore_case)
            .into_iter()
            .filter(|row| position(&right, row, ignore_case).is_some())
            .collect();
    }
    let mut pool: Vec<Option<Tuple>> = right.into_iter().map(Some).collect();
    let mut out = Vec::new();
    for row in left {
        let hit = pool.iter().position(|candidate| {
            candidate
                .as_ref()
                .is_some_and(|candidate| tuples_equal(candidate, &row, ignore_case))
        });
        if let Some(hit) = hit {
            pool[hit] = None;
            out.push(row);
        }
    }
    out
}

/// Each right row removes at most one structural match, with or without ALL
pub fn except(left: Vec<Tuple>, right: Vec<Tuple>, ignore_case: bool) -> Vec<Tuple> {
    let mut out = left;
    for row in &right {
        if let Some(hit) = position(&out, row, ignore_case) {
            out.remove(hit);
        }
    }
    out
}

struct SetStep {
    operator: SetOperator,
    all: bool,
    program: Arc<QueryProgram>,
}

struct OrderingPlan {
    order_by: Vec<SortKey>,
    limit: Option<CompiledExpr>,
    offset: Option<CompiledExpr>,
}

pub struct SetOperationPlan {
    left: Arc<QueryProgram>,
    steps: Vec<SetStep>,
    order_by: Vec<SortKey>,
    limit: Option<CompiledExpr>,
    offset: Option<CompiledExpr>,
}

impl SetOperationPlan {
    pub fn compile(compiler: &mut Compiler, node: &SetOperation) -> Result<Self, ExecutionError> {
        let left = compiler.compile_program(&node.left)?;
        let mut steps = Vec::with_capacity(node.operations.len());
        for item in &node.operations {
            steps.push(SetStep {
                operator: item.operator,
                all: item.all,
                program: compiler.compile_program(&item.query)?,
            });
        }

        compiler.push_scope();
        let ordering = Self::compile_ordering(compiler, node);
        let scope = compiler.pop_scope();
        let OrderingPlan {
            order_by,
            limit,
            offset,
        } = ordering?;
        if !scope.windows.is_empty() {
            return Err(ExecutionError::UnsupportedNode(
                "window function in a set operation ORDER BY".to_string(),
            ));
        }

        Ok(Self {
            left,
            steps,
            order_by,
            limit,
            offset,
        })
    }

    fn compile_ordering(
        compiler: &mut Compiler,
        node: &SetOperation,
    ) -> Result<OrderingPlan, ExecutionError> {
        let order_by = node
            .order_by
            .iter()
            .map(|item| SortKey::compile(compiler, item))
            .collect::<Result<_, _>>()?;
        let limit = compiler.compile_optional(node.limit.as_ref())?;
        let offset = compiler.compile_optional(node.offset.as_ref())?;
        Ok(OrderingPlan {
            order_by,
            limit,
            offset,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<QueryResult, ExecutionError> {
        let ignore_case = ctx.ignore_case;
        let left = self.left.run_nested(ctx)?;
        let columns = left.columns.clone();
        let mut rows = left.tuples();

        for step in &self.steps {
            let right = step.program.run_nested(ctx)?;
            if right.columns.len() != columns.len() {
                return Err(ExecutionError::RuntimeError(format!(
                    "set operation operands have {} and {} columns",
                    columns.len(),
                    right.columns.len()
                )));
            }
            let right = right.tuples();
            rows = match step.operator {
                SetOperator::Union => union(rows, right, step.all, ignore_case),
                SetOperator::Intersect => intersect(rows, right, step.all, ignore_case),
                SetOperator::Except => except(rows, right, ignore_case),
            };
        }
        log::debug!("Set operation produced {} rows", rows.len());

        let records: Vec<Record> = rows
            .into_iter()
            .map(|tuple| columns.iter().cloned().zip(tuple).collect())
            .collect();

        let records = if self.order_by.is_empty() {
            records
        } else {
            ctx.records = records.into_iter().map(ResultRecord::singleton).collect();
            rank_records(ctx, &[], &self.order_by)?;
            std::mem::take(&mut ctx.records)
                .into_iter()
                .map(|record| record.row)
                .collect()
        };

        let offset = paging_value(ctx, self.offset.as_ref(), "OFFSET")?;
        let limit = paging_value(ctx, self.limit.as_ref(), "LIMIT")?;
        Ok(QueryResult::new(columns, page(records, offset, limit)))
    }
}
