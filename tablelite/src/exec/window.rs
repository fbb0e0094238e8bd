// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Window functions and frame arithmetic
//!
//! Windows are evaluated in a pre-pass: the records are ranked by the
//! window's partition and order keys, then the function is evaluated once per
//! record and memoized in the record cache. Ranking functions read only the
//! positions the ranking left behind.

use crate::ast::{FrameBound, FrameMode, NodeRef, WindowCall, WindowFrame, WindowFunction, WindowSpec};
use crate::exec::compiler::{evaluator, CompiledExpr, Compiler, Evaluator};
use crate::exec::context::{ExecutionContext, ResultRecord};
use crate::exec::sorting::{rank_records, SortKey};
use crate::exec::ExecutionError;
use crate::storage::Value;

/// One window evaluation pass
#[derive(Debug, Clone)]
pub struct WindowPlan {
    pub expr: CompiledExpr,
    pub partition_by: Vec<SortKey>,
    pub order_by: Vec<SortKey>,
}

impl WindowPlan {
    /// Compile the OVER clause for the node currently being lowered
    pub(crate) fn compile(
        compiler: &mut Compiler,
        node: &NodeRef,
        spec: &WindowSpec,
    ) -> Result<Self, ExecutionError> {
        let expr = compiler.placeholder(node.id())?;
        let partition_by = spec
            .partition_by
            .iter()
            .map(|key| compiler.compile(key).map(SortKey::ascending))
            .collect::<Result<_, _>>()?;
        let order_by = spec
            .order_by
            .iter()
            .map(|item| SortKey::compile(compiler, item))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            expr,
            partition_by,
            order_by,
        })
    }
}

/// Run every window pass of a query over the context's records
pub fn evaluate_windows(
    ctx: &mut ExecutionContext,
    windows: &[WindowPlan],
) -> Result<(), ExecutionError> {
    for window in windows {
        rank_records(ctx, &window.partition_by, &window.order_by)?;
        ctx.last_window = Some(window.expr.id());
        log::trace!(
            "Window pass {} over {} records",
            window.expr.id(),
            ctx.records.len()
        );
        for index in 0..ctx.records.len() {
            ctx.at_record(index, |ctx| window.expr.evaluate(ctx))?;
        }
    }
    ctx.last_window = None;
    Ok(())
}

/// Absolute inclusive bounds of the frame around `index`, `None` when empty
pub fn frame_bounds(
    records: &[ResultRecord],
    index: usize,
    frame: Option<&WindowFrame>,
) -> Option<(usize, usize)> {
    let record = records.get(index)?;
    let first = record.partition_start(index);
    let last = first + record.partition_size.max(1) - 1;
    let Some(frame) = frame else {
        return Some((first, last));
    };

    let (start, end) = match frame.mode {
        FrameMode::Rows => {
            let at = signed(index);
            let bound = |bound: FrameBound| match bound {
                FrameBound::UnboundedPreceding => signed(first),
                FrameBound::Preceding(n) => at.saturating_sub(signed(n)),
                FrameBound::CurrentRow => at,
                FrameBound::Following(n) => at.saturating_add(signed(n)),
                FrameBound::UnboundedFollowing => signed(last),
            };
            (bound(frame.start), bound(frame.end))
        }
        FrameMode::Range | FrameMode::Groups => {
            let groups = peer_groups(records, first, last);
            let current = record.peer_group as isize;
            let group = |ordinal: isize| -> Option<(usize, usize)> {
                usize::try_from(ordinal)
                    .ok()
                    .and_then(|ordinal| groups.get(ordinal).copied())
            };
            let count = groups.len() as isize;
            let start = match frame.start {
                FrameBound::UnboundedPreceding => first as isize,
                FrameBound::Preceding(n) => match group(current.saturating_sub(signed(n))) {
                    Some((start, _)) => start as isize,
                    None => first as isize,
                },
                FrameBound::CurrentRow => group(current).map_or(index, |g| g.0) as isize,
                FrameBound::Following(n) => match group(current.saturating_add(signed(n))) {
                    Some((start, _)) => start as isize,
                    None => last as isize + 1,
                },
                FrameBound::UnboundedFollowing => group(count - 1).map_or(last, |g| g.0) as isize,
            };
            let end = match frame.end {
                FrameBound::UnboundedPreceding => group(0).map_or(first, |g| g.1) as isize,
                FrameBound::Preceding(n) => match group(current.saturating_sub(signed(n))) {
                    Some((_, end)) => end as isize,
                    None => first as isize - 1,
                },
                FrameBound::CurrentRow => group(current).map_or(index, |g| g.1) as isize,
                FrameBound::Following(n) => match group(current.saturating_add(signed(n))) {
                    Some((_, end)) => end as isize,
                    None => last as isize,
                },
                FrameBound::UnboundedFollowing => last as isize,
            };
            (start, end)
        }
    };

    let start = start.max(first as isize);
    let end = end.min(last as isize);
    if start > end {
        None
    } else {
        Some((start as usize, end as usize))
    }
}

/// Offsets past `isize::MAX` saturate; they land outside any partition anyway
fn signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

/// Inclusive bounds of each peer group of one partition, by ordinal
fn peer_groups(records: &[ResultRecord], first: usize, last: usize) -> Vec<(usize, usize)> {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for position in first..=last {
        match groups.last_mut() {
            Some(group) if records[position].peer_group == records[group.0].peer_group => {
                group.1 = position;
            }
            _ => groups.push((position, position)),
        }
    }
    groups
}

/// Frame of the context's current record
pub(crate) fn current_frame(
    ctx: &ExecutionContext,
    frame: Option<&WindowFrame>,
) -> Result<Option<(usize, usize)>, ExecutionError> {
    let index = current_index(ctx)?;
    Ok(frame_bounds(&ctx.records, index, frame))
}

fn current_index(ctx: &ExecutionContext) -> Result<usize, ExecutionError> {
    ctx.current.ok_or_else(|| {
        ExecutionError::RuntimeError("window function evaluated outside of a query".to_string())
    })
}

/// Fail unless the window pass for `plan_id` is running
pub(crate) fn ensure_window_pass(
    ctx: &ExecutionContext,
    plan_id: crate::ast::NodeId,
) -> Result<(), ExecutionError> {
    if ctx.last_window == Some(plan_id) {
        Ok(())
    } else {
        Err(ExecutionError::RuntimeError(format!(
            "window expression {} evaluated outside of its window pass",
            plan_id
        )))
    }
}

fn offset_argument(
    ctx: &mut ExecutionContext,
    expr: Option<&CompiledExpr>,
    fallback: i64,
) -> Result<i64, ExecutionError> {
    match expr {
        None => Ok(fallback),
        Some(expr) => match expr.evaluate(ctx)? {
            Value::Null => Ok(fallback),
            value => value.as_integer().ok_or_else(|| {
                ExecutionError::InvalidArgument(format!(
                    "window offset must be an integer, got {}",
                    value.type_name()
                ))
            }),
        },
    }
}

/// Bucket of a row in NTILE: the first `size % buckets` buckets hold one extra row
fn ntile_bucket(position: usize, size: usize, buckets: usize) -> usize {
    let base = size / buckets;
    let extra = size % buckets;
    let large = extra * (base + 1);
    if position < large {
        position / (base + 1) + 1
    } else {
        extra + (position - large) / base.max(1) + 1
    }
}

pub(crate) fn lower_window(
    compiler: &mut Compiler,
    node: &NodeRef,
    call: &WindowCall,
) -> Result<Evaluator, ExecutionError> {
    let plan = WindowPlan::compile(compiler, node, &call.window)?;
    let id = plan.expr.id();
    compiler.register_window(plan)?;
    let frame = call.window.frame;

    match &call.function {
        WindowFunction::RowNumber
        | WindowFunction::Rank
        | WindowFunction::DenseRank
        | WindowFunction::PercentRank
        | WindowFunction::CumeDist => {
            let function = call.function.clone();
            Ok(evaluator(move |ctx| {
                ensure_window_pass(ctx, id)?;
                let index = current_index(ctx)?;
                let record = &ctx.records[index];
                let rank = record.partition_index - record.peer_index + 1;
                let size = record.partition_size.max(1);
                Ok(Value::Number(match function {
                    WindowFunction::RowNumber => (record.partition_index + 1) as f64,
                    WindowFunction::Rank => rank as f64,
                    WindowFunction::DenseRank => (record.peer_group + 1) as f64,
                    WindowFunction::PercentRank if size <= 1 => 0.0,
                    WindowFunction::PercentRank => (rank - 1) as f64 / (size - 1) as f64,
                    _ => (rank - 1 + record.peer_size) as f64 / size as f64,
                }))
            }))
        }
        WindowFunction::Ntile(buckets) => {
            let buckets = compiler.compile(buckets)?;
            Ok(evaluator(move |ctx| {
                ensure_window_pass(ctx, id)?;
                let count = match buckets.evaluate(ctx)?.as_integer() {
                    Some(count) if count >= 1 => count as usize,
                    _ => {
                        return Err(ExecutionError::InvalidArgument(
                            "NTILE bucket count must be a positive integer".to_string(),
                        ))
                    }
                };
                let index = current_index(ctx)?;
                let record = &ctx.records[index];
                let bucket = ntile_bucket(record.partition_index, record.partition_size, count);
                Ok(Value::Number(bucket as f64))
            }))
        }
        WindowFunction::Lag {
            expr,
            offset,
            default,
        }
        | WindowFunction::Lead {
            expr,
            offset,
            default,
        } => {
            let lag = matches!(call.function, WindowFunction::Lag { .. });
            let expr = compiler.compile(expr)?;
            let offset = compiler.compile_optional(offset.as_ref())?;
            let default = compiler.compile_optional(default.as_ref())?;
            Ok(evaluator(move |ctx| {
                ensure_window_pass(ctx, id)?;
                let steps = offset_argument(ctx, offset.as_ref(), 1)?;
                let steps = if lag { steps.checked_neg() } else { Some(steps) };
                let index = current_index(ctx)?;
                let record = &ctx.records[index];
                let first = record.partition_start(index) as i64;
                let last = first + record.partition_size.max(1) as i64 - 1;
                let target = steps
                    .and_then(|steps| (index as i64).checked_add(steps))
                    .filter(|target| (first..=last).contains(target));
                match target {
                    Some(target) => ctx.at_record(target as usize, |ctx| expr.evaluate(ctx)),
                    None => match &default {
                        Some(default) => default.evaluate(ctx),
                        None => Ok(Value::Null),
                    },
                }
            }))
        }
        WindowFunction::FirstValue(expr) | WindowFunction::LastValue(expr) => {
            let first = matches!(call.function, WindowFunction::FirstValue(_));
            let expr = compiler.compile(expr)?;
            Ok(evaluator(move |ctx| {
                ensure_window_pass(ctx, id)?;
                match current_frame(ctx, frame.as_ref())? {
                    Some((start, end)) => {
                        let target = if first { start } else { end };
                        ctx.at_record(target, |ctx| expr.evaluate(ctx))
                    }
                    None => Ok(Value::Null),
                }
            }))
        }
        WindowFunction::NthValue(expr, n) => {
            let expr = compiler.compile(expr)?;
            let n = compiler.compile(n)?;
            Ok(evaluator(move |ctx| {
                ensure_window_pass(ctx, id)?;
                let nth = match n.evaluate(ctx)?.as_integer() {
                    Some(nth) if nth >= 1 => nth as usize,
                    _ => {
                        return Err(ExecutionError::InvalidArgument(
                            "NTH_VALUE position must be a positive integer".to_string(),
                        ))
                    }
                };
                match current_frame(ctx, frame.as_ref())? {
                    Some((start, end)) => match start.checked_add(nth - 1) {
                        Some(target) if target <= end => {
                            ctx.at_record(target, |ctx| expr.evaluate(ctx))
                        }
                        _ => Ok(Value::Null),
                    },
                    None => Ok(Value::Null),
                }
            }))
        }
    }
}
