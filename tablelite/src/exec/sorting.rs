// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Two-level stable sort over result records
//!
//! Sorting by primary keys then secondary keys, followed by one walk that
//! assigns partition (primary) and peer (secondary) positions, backs ORDER
//! BY, window PARTITION BY / ORDER BY and grouping-set partitioning alike.

use crate::ast::OrderItem;
use crate::compare::compare_sort_values;
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::ExecutionContext;
use crate::exec::ExecutionError;
use crate::storage::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: CompiledExpr,
    pub descending: bool,
    pub nulls_last: bool,
}

impl SortKey {
    pub fn ascending(expr: CompiledExpr) -> Self {
        Self {
            expr,
            descending: false,
            nulls_last: false,
        }
    }

    pub fn compile(compiler: &mut Compiler, item: &OrderItem) -> Result<Self, ExecutionError> {
        Ok(Self {
            expr: compiler.compile(&item.expr)?,
            descending: item.descending,
            nulls_last: item.nulls_last,
        })
    }
}

/// Compare two evaluated key tuples under `keys`
pub fn compare_key_values(
    a: &[Value],
    b: &[Value],
    keys: &[SortKey],
    ignore_case: bool,
) -> Ordering {
    for ((left, right), key) in a.iter().zip(b.iter()).zip(keys.iter()) {
        let ord = compare_sort_values(left, right, key.descending, key.nulls_last, ignore_case);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn evaluate_keys(
    ctx: &mut ExecutionContext,
    index: usize,
    keys: &[SortKey],
) -> Result<Vec<Value>, ExecutionError> {
    ctx.at_record(index, |ctx| {
        keys.iter().map(|key| key.expr.evaluate(ctx)).collect()
    })
}

/// Sort the context's records and assign partition and peer positions
pub fn rank_records(
    ctx: &mut ExecutionContext,
    primary: &[SortKey],
    secondary: &[SortKey],
) -> Result<(), ExecutionError> {
    let count = ctx.records.len();
    let mut keyed = Vec::with_capacity(count);
    for index in 0..count {
        let first = evaluate_keys(ctx, index, primary)?;
        let second = evaluate_keys(ctx, index, secondary)?;
        keyed.push((index, first, second));
    }

    let ignore_case = ctx.ignore_case;
    keyed.sort_by(|a, b| {
        compare_key_values(&a.1, &b.1, primary, ignore_case)
            .then_with(|| compare_key_values(&a.2, &b.2, secondary, ignore_case))
    });

    let mut slots: Vec<_> = std::mem::take(&mut ctx.records).into_iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(count);
    for (index, _, _) in &keyed {
        if let Some(record) = slots[*index].take() {
            sorted.push(record);
        }
    }
    ctx.records = sorted;

    let mut partition_start = 0;
    let mut peer_start = 0;
    let mut peer_group = 0;
    for position in 0..count {
        if position > 0 {
            let (previous, current) = (&keyed[position - 1], &keyed[position]);
            if compare_key_values(&previous.1, &current.1, primary, ignore_case) != Ordering::Equal {
                partition_start = position;
                peer_start = position;
                peer_group = 0;
            } else if compare_key_values(&previous.2, &current.2, secondary, ignore_case)
                != Ordering::Equal
            {
                peer_start = position;
                peer_group += 1;
            }
        }
        let record = &mut ctx.records[position];
        record.partition_index = position - partition_start;
        record.peer_index = position - peer_start;
        record.peer_group = peer_group;
    }

    let mut partition_end = count;
    let mut peer_end = count;
    for position in (0..count).rev() {
        if position + 1 < count {
            let next = &ctx.records[position + 1];
            if next.partition_index == 0 {
                partition_end = position + 1;
            }
            if next.peer_index == 0 {
                peer_end = position + 1;
            }
        }
        let record = &mut ctx.records[position];
        record.partition_size = partition_end - (position - record.partition_index);
        record.peer_size = peer_end - (position - record.peer_index);
    }

    Ok(())
}
