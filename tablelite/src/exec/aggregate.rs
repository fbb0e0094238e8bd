// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Aggregate functions over groups and window frames

use crate::ast::{Aggregate, AggregateFunction, NodeRef};
use crate::compare::{compare_values, values_equal};
use crate::exec::compiler::{evaluator, CompiledExpr, Compiler, Evaluator};
use crate::exec::context::ExecutionContext;
use crate::exec::filter::passes_all;
use crate::exec::sorting::{compare_key_values, SortKey};
use crate::exec::window::{current_frame, ensure_window_pass, WindowPlan};
use crate::exec::ExecutionError;
use crate::storage::Value;
use std::cmp::Ordering;

/// Argument values of one input row plus its local ORDER BY keys
struct AggregateInput {
    args: Vec<Value>,
    keys: Vec<Value>,
}

struct AggregatePlan {
    function: AggregateFunction,
    args: Vec<CompiledExpr>,
    distinct: bool,
    filter: Vec<CompiledExpr>,
    order_by: Vec<SortKey>,
}

impl AggregatePlan {
    fn input(&self, ctx: &mut ExecutionContext) -> Result<Option<AggregateInput>, ExecutionError> {
        if !passes_all(ctx, &self.filter)? {
            return Ok(None);
        }
        let args = self
            .args
            .iter()
            .map(|arg| arg.evaluate(ctx))
            .collect::<Result<_, _>>()?;
        let keys = self
            .order_by
            .iter()
            .map(|key| key.expr.evaluate(ctx))
            .collect::<Result<_, _>>()?;
        Ok(Some(AggregateInput { args, keys }))
    }

    fn finish(
        &self,
        mut inputs: Vec<AggregateInput>,
        ignore_case: bool,
    ) -> Result<Value, ExecutionError> {
        if self.distinct {
            let mut unique: Vec<AggregateInput> = Vec::with_capacity(inputs.len());
            for input in inputs {
                let first = input.args.first().unwrap_or(&Value::Null);
                let seen = unique.iter().any(|kept| {
                    values_equal(kept.args.first().unwrap_or(&Value::Null), first, ignore_case)
                });
                if !seen {
                    unique.push(input);
                }
            }
            inputs = unique;
        }
        if !self.order_by.is_empty() {
            inputs.sort_by(|a, b| compare_key_values(&a.keys, &b.keys, &self.order_by, ignore_case));
        }
        reduce(self.function, &inputs, self.args.is_empty(), ignore_case)
    }
}

pub(crate) fn lower_aggregate(
    compiler: &mut Compiler,
    node: &NodeRef,
    aggregate: &Aggregate,
) -> Result<Evaluator, ExecutionError> {
    let window = match &aggregate.window {
        Some(spec) => {
            let plan = WindowPlan::compile(compiler, node, spec)?;
            let id = plan.expr.id();
            compiler.register_window(plan)?;
            Some((id, spec.frame))
        }
        None => {
            compiler.mark_aggregate();
            None
        }
    };

    let plan = AggregatePlan {
        function: aggregate.function,
        args: compiler.compile_all(&aggregate.args)?,
        distinct: aggregate.distinct,
        filter: compiler.compile_optional(aggregate.filter.as_ref())?.into_iter().collect(),
        order_by: aggregate
            .order_by
            .iter()
            .map(|item| SortKey::compile(compiler, item))
            .collect::<Result<_, _>>()?,
    };

    match window {
        Some((id, frame)) => Ok(evaluator(move |ctx| {
            ensure_window_pass(ctx, id)?;
            let mut inputs = Vec::new();
            if let Some((start, end)) = current_frame(ctx, frame.as_ref())? {
                for index in start..=end {
                    if let Some(input) = ctx.at_record(index, |ctx| plan.input(ctx))? {
                        inputs.push(input);
                    }
                }
            }
            plan.finish(inputs, ctx.ignore_case)
        })),
        None => Ok(evaluator(move |ctx| {
            let group = match ctx.current_record() {
                Some(record) => record.group.clone(),
                None => {
                    return Err(ExecutionError::RuntimeError(format!(
                        "aggregate {} used outside of a grouped query",
                        plan.function.name()
                    )))
                }
            };
            let mut inputs = Vec::with_capacity(group.len());
            for row in group.iter() {
                let (input, _) = ctx.on_row(row.clone(), |ctx| plan.input(ctx));
                if let Some(input) = input? {
                    inputs.push(input);
                }
            }
            plan.finish(inputs, ctx.ignore_case)
        })),
    }
}

fn first_values(inputs: &[AggregateInput]) -> impl Iterator<Item = &Value> {
    inputs
        .iter()
        .map(|input| input.args.first().unwrap_or(&Value::Null))
        .filter(|value| !value.is_null())
}

fn numbers(inputs: &[AggregateInput]) -> Vec<f64> {
    first_values(inputs).filter_map(Value::as_number).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sum_of_squares(values: &[f64]) -> f64 {
    let avg = mean(values);
    values.iter().map(|v| (v - avg) * (v - avg)).sum()
}

/// Reduce collected inputs; nulls are skipped except by ARRAY_AGG
fn reduce(
    function: AggregateFunction,
    inputs: &[AggregateInput],
    count_rows: bool,
    ignore_case: bool,
) -> Result<Value, ExecutionError> {
    let value = match function {
        AggregateFunction::Count if count_rows => Value::from(inputs.len()),
        AggregateFunction::Count => Value::from(first_values(inputs).count()),
        AggregateFunction::Sum => {
            let values = numbers(inputs);
            if values.is_empty() {
                Value::Null
            } else {
                Value::Number(values.iter().sum())
            }
        }
        AggregateFunction::Avg => {
            let values = numbers(inputs);
            if values.is_empty() {
                Value::Null
            } else {
                Value::Number(mean(&values))
            }
        }
        AggregateFunction::Min | AggregateFunction::Max => {
            let wanted = if function == AggregateFunction::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            first_values(inputs)
                .fold(None::<&Value>, |best, value| match best {
                    Some(best) if compare_values(value, best, ignore_case) != wanted => Some(best),
                    _ => Some(value),
                })
                .cloned()
                .unwrap_or(Value::Null)
        }
        AggregateFunction::StringAgg => {
            let separator = inputs
                .first()
                .and_then(|input| input.args.get(1))
                .and_then(Value::as_string)
                .unwrap_or(",")
                .to_string();
            let parts: Vec<String> = first_values(inputs)
                .map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            if parts.is_empty() {
                Value::Null
            } else {
                Value::String(parts.join(&separator))
            }
        }
        AggregateFunction::ArrayAgg => {
            if inputs.is_empty() {
                Value::Null
            } else {
                Value::List(
                    inputs
                        .iter()
                        .map(|input| input.args.first().cloned().unwrap_or(Value::Null))
                        .collect(),
                )
            }
        }
        AggregateFunction::BoolAnd | AggregateFunction::BoolOr => {
            let flags: Vec<bool> = first_values(inputs).filter_map(Value::as_tristate).collect();
            if flags.is_empty() {
                Value::Null
            } else if function == AggregateFunction::BoolAnd {
                Value::Boolean(flags.iter().all(|b| *b))
            } else {
                Value::Boolean(flags.iter().any(|b| *b))
            }
        }
        AggregateFunction::BitOr | AggregateFunction::BitAnd => {
            let bits: Vec<i64> = first_values(inputs).filter_map(Value::as_integer).collect();
            let folded = if function == AggregateFunction::BitOr {
                bits.iter().copied().reduce(|a, b| a | b)
            } else {
                bits.iter().copied().reduce(|a, b| a & b)
            };
            folded.map_or(Value::Null, Value::from)
        }
        AggregateFunction::StdDev | AggregateFunction::Variance => {
            let values = numbers(inputs);
            if values.len() < 2 {
                Value::Null
            } else {
                let variance = sum_of_squares(&values) / (values.len() - 1) as f64;
                Value::Number(if function == AggregateFunction::StdDev {
                    variance.sqrt()
                } else {
                    variance
                })
            }
        }
        AggregateFunction::StdDevPop => {
            let values = numbers(inputs);
            if values.is_empty() {
                Value::Null
            } else {
                Value::Number((sum_of_squares(&values) / values.len() as f64).sqrt())
            }
        }
    };
    Ok(value)
}
