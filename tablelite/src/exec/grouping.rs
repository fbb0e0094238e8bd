// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GROUP BY, GROUPING SETS, ROLLUP and CUBE

use crate::ast::{GroupingDeclaration, NodeId};
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::{ExecutionContext, ResultRecord};
use crate::exec::sorting::{rank_records, SortKey};
use crate::exec::ExecutionError;
use crate::storage::{Record, Value};
use std::sync::Arc;

/// One grouping declaration over keys of type `T`
#[derive(Debug, Clone)]
pub enum GroupingSpec<T> {
    By(Vec<T>),
    Sets(Vec<Vec<T>>),
    Rollup(Vec<T>),
    Cube(Vec<T>),
}

impl<T: Clone> GroupingSpec<T> {
    /// Concrete key lists denoted by this declaration
    pub fn expand(&self) -> Vec<Vec<T>> {
        match self {
            GroupingSpec::By(keys) => vec![keys.clone()],
            GroupingSpec::Sets(sets) => sets.clone(),
            GroupingSpec::Rollup(keys) => (0..=keys.len())
                .rev()
                .map(|len| keys[..len].to_vec())
                .collect(),
            GroupingSpec::Cube(keys) => {
                let n = keys.len();
                (0..1u64 << n)
                    .rev()
                    .map(|mask| {
                        keys.iter()
                            .enumerate()
                            .filter(|(i, _)| mask & (1 << (n - 1 - i)) != 0)
                            .map(|(_, key)| key.clone())
                            .collect()
                    })
                    .collect()
            }
        }
    }
}

/// Compose several declarations by concatenating one key list of each
pub fn combine<T: Clone>(specs: &[GroupingSpec<T>]) -> Vec<Vec<T>> {
    let mut lists: Vec<Vec<T>> = vec![Vec::new()];
    for spec in specs {
        let expanded = spec.expand();
        let mut next = Vec::with_capacity(lists.len() * expanded.len());
        for prefix in &lists {
            for list in &expanded {
                let mut keys = prefix.clone();
                keys.extend(list.iter().cloned());
                next.push(keys);
            }
        }
        lists = next;
    }
    lists
}

#[derive(Debug, Default)]
pub struct GroupingPlan {
    /// None when the query declares no grouping at all
    key_lists: Option<Vec<Vec<CompiledExpr>>>,
    /// Every key seen in any list, first occurrence order
    all_keys: Vec<CompiledExpr>,
    /// A plain aggregate turns an ungrouped query into one group
    pub(crate) aggregate: bool,
}

impl GroupingPlan {
    pub fn compile(
        compiler: &mut Compiler,
        declarations: &[GroupingDeclaration],
    ) -> Result<Self, ExecutionError> {
        if declarations.is_empty() {
            return Ok(Self::default());
        }
        let mut specs = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            specs.push(match declaration {
                GroupingDeclaration::By(keys) => GroupingSpec::By(compiler.compile_all(keys)?),
                GroupingDeclaration::Rollup(keys) => {
                    GroupingSpec::Rollup(compiler.compile_all(keys)?)
                }
                GroupingDeclaration::Cube(keys) => GroupingSpec::Cube(compiler.compile_all(keys)?),
                GroupingDeclaration::GroupingSets(sets) => GroupingSpec::Sets(
                    sets.iter()
                        .map(|set| compiler.compile_all(set))
                        .collect::<Result<_, _>>()?,
                ),
            });
        }
        let key_lists = combine(&specs);

        let mut all_keys: Vec<CompiledExpr> = Vec::new();
        for key in key_lists.iter().flatten() {
            if !all_keys.iter().any(|seen| seen.id() == key.id()) {
                all_keys.push(key.clone());
            }
        }

        Ok(Self {
            key_lists: Some(key_lists),
            all_keys,
            aggregate: false,
        })
    }

    pub fn is_grouped(&self) -> bool {
        self.key_lists.is_some() || self.aggregate
    }
}

/// Turn filtered rows into the context's result records
pub fn group_rows(
    ctx: &mut ExecutionContext,
    plan: &GroupingPlan,
    rows: Vec<Record>,
) -> Result<(), ExecutionError> {
    let Some(key_lists) = &plan.key_lists else {
        ctx.records = if plan.aggregate {
            let head = rows.first().cloned().unwrap_or_else(|| ctx.current_row().clone());
            vec![ResultRecord::grouped(head, Arc::new(rows))]
        } else {
            rows.into_iter().map(ResultRecord::singleton).collect()
        };
        return Ok(());
    };

    let shared = Arc::new(rows);
    let mut output = Vec::new();
    for keys in key_lists {
        let absent: Vec<NodeId> = plan
            .all_keys
            .iter()
            .map(CompiledExpr::id)
            .filter(|id| !keys.iter().any(|key| key.id() == *id))
            .collect();
        let absent = Arc::new(absent);
        log::trace!("Grouping set of {} keys, {} cleared", keys.len(), absent.len());

        let mut records = if keys.is_empty() {
            let head = shared
                .first()
                .cloned()
                .unwrap_or_else(|| ctx.current_row().clone());
            vec![ResultRecord::grouped(head, shared.clone())]
        } else {
            partition(ctx, keys, &shared)?
        };

        for record in &mut records {
            for id in absent.iter() {
                record.cache.insert(*id, Value::Null);
            }
            record.absent_keys = absent.clone();
        }
        output.extend(records);
    }
    ctx.records = output;

    if key_lists.len() > 1 {
        let keys: Vec<SortKey> = plan
            .all_keys
            .iter()
            .map(|key| SortKey {
                expr: key.clone(),
                descending: false,
                nulls_last: true,
            })
            .collect();
        rank_records(ctx, &keys, &[])?;
    }
    Ok(())
}

/// One grouped record per block of rows with equal key values
fn partition(
    ctx: &mut ExecutionContext,
    keys: &[CompiledExpr],
    rows: &Arc<Vec<Record>>,
) -> Result<Vec<ResultRecord>, ExecutionError> {
    let saved = std::mem::replace(
        &mut ctx.records,
        rows.iter().cloned().map(ResultRecord::singleton).collect(),
    );
    let sort_keys: Vec<SortKey> = keys.iter().cloned().map(SortKey::ascending).collect();
    let ranked = rank_records(ctx, &sort_keys, &[]);
    let sorted = std::mem::replace(&mut ctx.records, saved);
    ranked?;

    let mut groups = Vec::new();
    let mut index = 0;
    while index < sorted.len() {
        let size = sorted[index].partition_size.max(1);
        let block: Vec<Record> = sorted[index..index + size]
            .iter()
            .map(|record| record.row.clone())
            .collect();
        let head = block[0].clone();
        groups.push(ResultRecord::grouped(head, Arc::new(block)));
        index += size;
    }
    Ok(groups)
}
