// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SELECT orchestration
//!
//! resolve sources -> WHERE -> group -> HAVING -> windows -> project ->
//! DISTINCT -> ORDER BY -> OFFSET/LIMIT

use crate::ast::{Node, NodeKind, Query, SelectItem};
use crate::compare::records_equal;
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::{ExecutionContext, ResultRecord};
use crate::exec::filter::{apply_filters, passes_all};
use crate::exec::grouping::{group_rows, GroupingPlan};
use crate::exec::result::QueryResult;
use crate::exec::sorting::{rank_records, SortKey};
use crate::exec::source::SourcePlan;
use crate::exec::window::{evaluate_windows, WindowPlan};
use crate::exec::ExecutionError;
use crate::storage::{Record, Value};

/// One output column; `expand` merges a record value into the output row
#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub name: String,
    pub expr: CompiledExpr,
    pub expand: bool,
}

pub(crate) fn compile_columns(
    compiler: &mut Compiler,
    items: &[SelectItem],
) -> Result<Vec<SelectColumn>, ExecutionError> {
    if items.is_empty() {
        let expr = compiler.compile(&Node::wildcard(None))?;
        return Ok(vec![SelectColumn {
            name: "*".to_string(),
            expr,
            expand: true,
        }]);
    }
    let mut columns = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let expr = compiler.compile(&item.expr)?;
        let expand = item.alias.is_none() && matches!(item.expr.kind(), NodeKind::Wildcard(_));
        let name = item
            .alias
            .clone()
            .or_else(|| expr.alias().map(str::to_string))
            .unwrap_or_else(|| format!("col_{}", index));
        columns.push(SelectColumn { name, expr, expand });
    }
    Ok(columns)
}

/// Output names of non-expanding columns, first occurrence order
pub(crate) fn column_names(columns: &[SelectColumn]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        if !names.contains(&column.name) {
            names.push(column.name.clone());
        }
    }
    names
}

/// Compute the select list of every record in the context
pub(crate) fn project(
    ctx: &mut ExecutionContext,
    columns: &[SelectColumn],
) -> Result<(), ExecutionError> {
    for index in 0..ctx.records.len() {
        let selects = ctx.at_record(index, |ctx| {
            let mut selects = Record::new();
            for column in columns {
                let value = column.expr.evaluate(ctx)?;
                match value {
                    Value::Record(fields) if column.expand => selects.extend(fields),
                    Value::Null if column.expand => {}
                    value => {
                        selects.insert(column.name.clone(), value);
                    }
                }
            }
            Ok(selects)
        })?;
        ctx.records[index].selects = selects;
    }
    Ok(())
}

/// Build the result of projected records
pub(crate) fn collect_result(records: Vec<ResultRecord>, columns: &[SelectColumn]) -> QueryResult {
    let rows: Vec<Record> = records.into_iter().map(|record| record.selects).collect();
    if columns.iter().any(|column| column.expand) {
        QueryResult::from_rows(rows)
    } else {
        QueryResult::new(column_names(columns), rows)
    }
}

/// Evaluate a LIMIT or OFFSET expression; anything but a non-negative number is ignored
pub(crate) fn paging_value(
    ctx: &mut ExecutionContext,
    expr: Option<&CompiledExpr>,
    clause: &str,
) -> Result<Option<usize>, ExecutionError> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match expr.evaluate(ctx)? {
        Value::Number(n) if n >= 0.0 && n.is_finite() => Ok(Some(n.trunc() as usize)),
        Value::Null => Ok(None),
        other => {
            log::warn!("Ignoring {} of {} '{}'", clause, other.type_name(), other);
            Ok(None)
        }
    }
}

pub(crate) fn page<T>(rows: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    rows.into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Keep the records every predicate accepts
pub(crate) fn retain_records(
    ctx: &mut ExecutionContext,
    predicates: &[CompiledExpr],
) -> Result<(), ExecutionError> {
    if predicates.is_empty() {
        return Ok(());
    }
    let mut keep = Vec::with_capacity(ctx.records.len());
    for index in 0..ctx.records.len() {
        keep.push(ctx.at_record(index, |ctx| passes_all(ctx, predicates))?);
    }
    let mut flags = keep.into_iter();
    ctx.records.retain(|_| flags.next().unwrap_or(false));
    Ok(())
}

pub struct SelectPlan {
    sources: SourcePlan,
    filters: Vec<CompiledExpr>,
    grouping: GroupingPlan,
    having: Vec<CompiledExpr>,
    windows: Vec<WindowPlan>,
    columns: Vec<SelectColumn>,
    order_by: Vec<SortKey>,
    distinct: bool,
    limit: Option<CompiledExpr>,
    offset: Option<CompiledExpr>,
}

impl SelectPlan {
    pub fn compile(compiler: &mut Compiler, query: &Query) -> Result<Self, ExecutionError> {
        compiler.push_scope();
        let plan = Self::compile_in_scope(compiler, query);
        let scope = compiler.pop_scope();
        let mut plan = plan?;
        plan.windows = scope.windows;
        plan.grouping.aggregate = scope.has_aggregate;
        Ok(plan)
    }

    fn compile_in_scope(compiler: &mut Compiler, query: &Query) -> Result<Self, ExecutionError> {
        let sources = SourcePlan::compile(compiler, &query.sources)?;
        let filters = compiler.compile_all(&query.filters)?;
        let grouping = GroupingPlan::compile(compiler, &query.groupings)?;
        let having = compiler.compile_all(&query.having)?;
        let columns = compile_columns(compiler, &query.selects)?;

        let mut order_by = Vec::with_capacity(query.order_by.len());
        for item in &query.order_by {
            let aliased = match item.expr.kind() {
                NodeKind::Field(field) if field.source.is_none() => columns
                    .iter()
                    .find(|column| !column.expand && column.name == field.name)
                    .map(|column| column.expr.clone()),
                _ => None,
            };
            let expr = match aliased {
                Some(expr) => expr,
                None => compiler.compile(&item.expr)?,
            };
            order_by.push(SortKey {
                expr,
                descending: item.descending,
                nulls_last: item.nulls_last,
            });
        }

        Ok(Self {
            sources,
            filters,
            grouping,
            having,
            windows: Vec::new(),
            columns,
            order_by,
            distinct: query.distinct,
            limit: compiler.compile_optional(query.limit.as_ref())?,
            offset: compiler.compile_optional(query.offset.as_ref())?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<QueryResult, ExecutionError> {
        let rows = self.sources.resolve(ctx)?;
        let rows = apply_filters(ctx, &self.filters, rows)?;
        group_rows(ctx, &self.grouping, rows)?;
        retain_records(ctx, &self.having)?;
        evaluate_windows(ctx, &self.windows)?;
        project(ctx, &self.columns)?;

        if self.distinct {
            let ignore_case = ctx.ignore_case;
            let mut unique: Vec<ResultRecord> = Vec::with_capacity(ctx.records.len());
            for record in std::mem::take(&mut ctx.records) {
                if !unique
                    .iter()
                    .any(|kept| records_equal(&kept.selects, &record.selects, ignore_case))
                {
                    unique.push(record);
                }
            }
            ctx.records = unique;
        }

        if !self.order_by.is_empty() {
            rank_records(ctx, &[], &self.order_by)?;
        }

        let offset = paging_value(ctx, self.offset.as_ref(), "OFFSET")?;
        let limit = paging_value(ctx, self.limit.as_ref(), "LIMIT")?;
        let records = page(std::mem::take(&mut ctx.records), offset, limit);
        Ok(collect_result(records, &self.columns))
    }
}
