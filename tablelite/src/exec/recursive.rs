// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fixpoint evaluation of recursive WITH sources

use crate::compare::records_equal;
use crate::exec::context::ExecutionContext;
use crate::exec::executor::QueryProgram;
use crate::exec::ExecutionError;
use crate::storage::{Collection, Record};
use std::sync::Arc;

pub struct RecursivePlan {
    pub name: String,
    pub seed: Arc<QueryProgram>,
    pub recursive: Arc<QueryProgram>,
    /// UNION ALL: keep structurally equal rows
    pub all: bool,
}

fn contains(rows: &[Record], row: &Record, ignore_case: bool) -> bool {
    rows.iter().any(|seen| records_equal(seen, row, ignore_case))
}

/// Remove structural duplicates, keeping first occurrences
pub(crate) fn dedup_records(rows: Vec<Record>, ignore_case: bool) -> Vec<Record> {
    let mut unique: Vec<Record> = Vec::with_capacity(rows.len());
    for row in rows {
        if !contains(&unique, &row, ignore_case) {
            unique.push(row);
        }
    }
    unique
}

/// Evaluate the seed, then the recursive branch until it adds no rows
///
/// Each iteration sees the source name bound to the rows the previous
/// iteration produced. On return the name is bound to the full result.
pub fn evaluate(
    ctx: &mut ExecutionContext,
    plan: &RecursivePlan,
) -> Result<Collection, ExecutionError> {
    let ignore_case = ctx.ignore_case;
    let seed = plan.seed.run_nested(ctx)?.rows;
    let mut accumulated = if plan.all {
        seed
    } else {
        dedup_records(seed, ignore_case)
    };
    let mut working = accumulated.clone();
    let mut iteration = 0usize;

    while !working.is_empty() {
        iteration += 1;
        if let Some(limit) = ctx.max_recursion {
            if iteration > limit {
                return Err(ExecutionError::RecursionLimit {
                    name: plan.name.clone(),
                    limit,
                });
            }
        }

        ctx.bind_virtual(&plan.name, Arc::new(working));
        let produced = plan.recursive.run_nested(ctx)?.rows;
        let fresh = if plan.all {
            produced
        } else {
            let mut fresh: Vec<Record> = Vec::new();
            for row in produced {
                if !contains(&accumulated, &row, ignore_case) && !contains(&fresh, &row, ignore_case)
                {
                    fresh.push(row);
                }
            }
            fresh
        };
        log::trace!(
            "Recursive '{}' iteration {} produced {} new rows",
            plan.name,
            iteration,
            fresh.len()
        );

        accumulated.extend(fresh.iter().cloned());
        working = fresh;
    }

    log::debug!(
        "Recursive '{}' reached a fixpoint after {} iterations with {} rows",
        plan.name,
        iteration,
        accumulated.len()
    );
    let result = Arc::new(accumulated);
    ctx.bind_virtual(&plan.name, result.clone());
    Ok(result)
}
