// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! WHERE evaluation over joined rows

use crate::exec::compiler::CompiledExpr;
use crate::exec::context::ExecutionContext;
use crate::exec::ExecutionError;
use crate::storage::Record;

/// True when every predicate is truthy for the context's current row
pub fn passes_all(
    ctx: &mut ExecutionContext,
    filters: &[CompiledExpr],
) -> Result<bool, ExecutionError> {
    for filter in filters {
        if !filter.evaluate(ctx)?.is_truthy() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Keep the rows every predicate accepts, in order
pub fn apply_filters(
    ctx: &mut ExecutionContext,
    filters: &[CompiledExpr],
    rows: Vec<Record>,
) -> Result<Vec<Record>, ExecutionError> {
    if filters.is_empty() {
        return Ok(rows);
    }
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let (passed, row) = ctx.on_row(row, |ctx| passes_all(ctx, filters));
        if passed? {
            kept.push(row);
        }
    }
    Ok(kept)
}
