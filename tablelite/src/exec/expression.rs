// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression lowering: one closed match over node kinds

use crate::ast::{
    BinaryOperator, CaseExpr, FieldRef, InList, NodeKind, NodeRef, UnaryOperator,
};
use crate::coercion;
use crate::compare::{like_to_regex, matches_like, try_compare};
use crate::exec::compiler::{evaluator, Compiler, Evaluator};
use crate::exec::context::ExecutionContext;
use crate::exec::{aggregate, window, ExecutionError};
use crate::functions::FunctionContext;
use crate::storage::{Record, Value};
use regex::Regex;
use std::cmp::Ordering;

/// Lower a node into its evaluator
pub(crate) fn lower(compiler: &mut Compiler, node: &NodeRef) -> Result<Evaluator, ExecutionError> {
    match node.kind() {
        NodeKind::Field(field) => {
            let field = field.clone();
            Ok(evaluator(move |ctx| Ok(resolve_field(ctx, &field))))
        }
        NodeKind::Constant(value) => {
            let value = value.clone();
            Ok(evaluator(move |_| Ok(value.clone())))
        }
        NodeKind::Parameter(name) => {
            let name = name.clone();
            Ok(evaluator(move |ctx| ctx.param(&name)))
        }
        NodeKind::Wildcard(source) => {
            let source = source.clone();
            Ok(evaluator(move |ctx| Ok(expand_wildcard(ctx.current_row(), source.as_deref()))))
        }
        NodeKind::Function { name, args } => lower_function(compiler, name, args),
        NodeKind::Aggregate(agg) => aggregate::lower_aggregate(compiler, node, agg),
        NodeKind::Window(call) => window::lower_window(compiler, node, call),
        NodeKind::Grouping(keys) => lower_grouping(compiler, keys),
        NodeKind::Case(case) => lower_case(compiler, case),
        NodeKind::Cast { expr, data_type } => {
            let expr = compiler.compile(expr)?;
            let data_type = data_type.clone();
            Ok(evaluator(move |ctx| {
                Ok(coercion::cast(&expr.evaluate(ctx)?, &data_type))
            }))
        }
        NodeKind::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let expr = compiler.compile(expr)?;
            let low = compiler.compile(low)?;
            let high = compiler.compile(high)?;
            let negated = *negated;
            Ok(evaluator(move |ctx| {
                let value = expr.evaluate(ctx)?;
                let low = low.evaluate(ctx)?;
                let high = high.evaluate(ctx)?;
                let above = try_compare(&value, &low, ctx.ignore_case).map(|o| o != Ordering::Less);
                let below =
                    try_compare(&value, &high, ctx.ignore_case).map(|o| o != Ordering::Greater);
                let inside = and3(above, below);
                Ok(tristate(if negated { inside.map(|b| !b) } else { inside }))
            }))
        }
        NodeKind::In {
            expr,
            list,
            negated,
        } => lower_in(compiler, expr, list, *negated),
        NodeKind::Exists { query, negated } => {
            let program = compiler.compile_program(query)?;
            let negated = *negated;
            Ok(evaluator(move |ctx| {
                let found = !program.run_nested(ctx)?.is_empty();
                Ok(Value::Boolean(found != negated))
            }))
        }
        NodeKind::Row(items) => {
            let items = compiler.compile_all(items)?;
            Ok(evaluator(move |ctx| {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    values.push(item.evaluate(ctx)?);
                }
                Ok(Value::List(values))
            }))
        }
        NodeKind::Binary { op, left, right } => lower_binary(compiler, *op, left, right),
        NodeKind::Unary { op, expr } => {
            let expr = compiler.compile(expr)?;
            let op = *op;
            Ok(evaluator(move |ctx| {
                let value = expr.evaluate(ctx)?;
                Ok(match op {
                    UnaryOperator::Not => tristate(value.as_tristate().map(|b| !b)),
                    UnaryOperator::Negate => match value {
                        Value::Number(n) => Value::Number(-n),
                        _ => Value::Null,
                    },
                    UnaryOperator::IsNull => Value::Boolean(value.is_null()),
                    UnaryOperator::IsNotNull => Value::Boolean(!value.is_null()),
                })
            }))
        }
        NodeKind::Query(_) | NodeKind::SetOperation(_) => {
            let program = compiler.compile_program(node)?;
            Ok(evaluator(move |ctx| Ok(program.run_nested(ctx)?.first_value())))
        }
        NodeKind::Source(_) | NodeKind::Insert(_) | NodeKind::Update(_) | NodeKind::Delete(_) => {
            Err(ExecutionError::UnsupportedNode(format!(
                "{} cannot be used as an expression",
                node.kind_tag()
            )))
        }
    }
}

/// Resolve a field against a joined row
///
/// A qualified reference reads the named sub-record. An unqualified one
/// searches sub-records from the most recently bound source backwards, then
/// falls back to a top-level field of the same name.
pub(crate) fn resolve_field(ctx: &ExecutionContext, field: &FieldRef) -> Value {
    let row = ctx.current_row();
    let (source, name) = if ctx.use_names {
        (
            field.table.as_deref().or(field.source.as_deref()),
            field.column.as_deref().unwrap_or(&field.name),
        )
    } else {
        (field.source.as_deref(), field.name.as_str())
    };

    match source {
        Some(source) => match row.get(source) {
            Some(Value::Record(sub)) => sub.get(name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        },
        None => {
            for value in row.values().rev() {
                if let Value::Record(sub) = value {
                    if let Some(found) = sub.get(name) {
                        return found.clone();
                    }
                }
            }
            row.get(name).cloned().unwrap_or(Value::Null)
        }
    }
}

fn expand_wildcard(row: &Record, source: Option<&str>) -> Value {
    if let Some(source) = source {
        return row.get(source).cloned().unwrap_or(Value::Null);
    }
    let nested = row.values().any(|value| matches!(value, Value::Record(_)));
    if !nested {
        return Value::Record(row.clone());
    }
    let mut out = Record::new();
    for value in row.values() {
        if let Value::Record(sub) = value {
            for (key, field) in sub {
                out.insert(key.clone(), field.clone());
            }
        }
    }
    Value::Record(out)
}

fn lower_function(
    compiler: &mut Compiler,
    name: &str,
    args: &[NodeRef],
) -> Result<Evaluator, ExecutionError> {
    let function = compiler
        .registry()
        .get(name)
        .ok_or_else(|| ExecutionError::UnknownFunction(name.to_string()))?;
    if !function.accepts(args.len()) {
        return Err(ExecutionError::InvalidArgument(format!(
            "{} does not accept {} arguments",
            function.name(),
            args.len()
        )));
    }
    let args = compiler.compile_all(args)?;
    Ok(evaluator(move |ctx| {
        let mut values = Vec::with_capacity(args.len());
        for arg in &args {
            values.push(arg.evaluate(ctx)?);
        }
        Ok(function.execute(&FunctionContext::new(values))?)
    }))
}

fn lower_grouping(compiler: &mut Compiler, keys: &[NodeRef]) -> Result<Evaluator, ExecutionError> {
    let keys = compiler.compile_all(keys)?;
    Ok(evaluator(move |ctx| {
        let record = ctx.current_record().ok_or_else(|| {
            ExecutionError::RuntimeError("GROUPING used outside of a grouped query".to_string())
        })?;
        let mut mask = 0u64;
        for key in &keys {
            mask = (mask << 1) | u64::from(record.absent_keys.contains(&key.id()));
        }
        Ok(Value::Number(mask as f64))
    }))
}

fn lower_case(compiler: &mut Compiler, case: &CaseExpr) -> Result<Evaluator, ExecutionError> {
    let operand = compiler.compile_optional(case.operand.as_ref())?;
    let mut branches = Vec::with_capacity(case.branches.len());
    for (when, then) in &case.branches {
        branches.push((compiler.compile(when)?, compiler.compile(then)?));
    }
    let otherwise = compiler.compile_optional(case.otherwise.as_ref())?;

    Ok(evaluator(move |ctx| {
        let subject = match &operand {
            Some(operand) => Some(operand.evaluate(ctx)?),
            None => None,
        };
        for (when, then) in &branches {
            let candidate = when.evaluate(ctx)?;
            let hit = match &subject {
                Some(subject) => {
                    try_compare(subject, &candidate, ctx.ignore_case) == Some(Ordering::Equal)
                }
                None => candidate.is_truthy(),
            };
            if hit {
                return then.evaluate(ctx);
            }
        }
        match &otherwise {
            Some(otherwise) => otherwise.evaluate(ctx),
            None => Ok(Value::Null),
        }
    }))
}

fn lower_in(
    compiler: &mut Compiler,
    expr: &NodeRef,
    list: &InList,
    negated: bool,
) -> Result<Evaluator, ExecutionError> {
    let expr = compiler.compile(expr)?;
    match list {
        InList::Values(values) => {
            let values = compiler.compile_all(values)?;
            Ok(evaluator(move |ctx| {
                let needle = expr.evaluate(ctx)?;
                let mut candidates = Vec::with_capacity(values.len());
                for value in &values {
                    candidates.push(value.evaluate(ctx)?);
                }
                Ok(membership(&needle, &candidates, negated, ctx.ignore_case))
            }))
        }
        InList::Query(query) => {
            let program = compiler.compile_program(query)?;
            Ok(evaluator(move |ctx| {
                let needle = expr.evaluate(ctx)?;
                let candidates = program.run_nested(ctx)?.first_column();
                Ok(membership(&needle, &candidates, negated, ctx.ignore_case))
            }))
        }
    }
}

/// Three-valued IN: unknown when nothing matches but a candidate is null
fn membership(needle: &Value, candidates: &[Value], negated: bool, ignore_case: bool) -> Value {
    if needle.is_null() {
        return Value::Null;
    }
    let mut saw_null = false;
    for candidate in candidates {
        match try_compare(needle, candidate, ignore_case) {
            Some(Ordering::Equal) => return Value::Boolean(!negated),
            None if candidate.is_null() => saw_null = true,
            _ => {}
        }
    }
    if saw_null {
        Value::Null
    } else {
        Value::Boolean(negated)
    }
}

fn lower_binary(
    compiler: &mut Compiler,
    op: BinaryOperator,
    left: &NodeRef,
    right: &NodeRef,
) -> Result<Evaluator, ExecutionError> {
    // Constant patterns are translated once, in both case modes
    let constant_pattern = match (op, right.kind()) {
        (
            BinaryOperator::Like | BinaryOperator::NotLike | BinaryOperator::ILike,
            NodeKind::Constant(Value::String(pattern)),
        ) => match (like_to_regex(pattern, false), like_to_regex(pattern, true)) {
            (Ok(sensitive), Ok(insensitive)) => Some((sensitive, insensitive)),
            _ => None,
        },
        _ => None,
    };

    let left = compiler.compile(left)?;
    let right = compiler.compile(right)?;

    Ok(evaluator(move |ctx| match op {
        BinaryOperator::And => {
            let lhs = left.evaluate(ctx)?.as_tristate();
            if lhs == Some(false) {
                return Ok(Value::Boolean(false));
            }
            let rhs = right.evaluate(ctx)?.as_tristate();
            Ok(tristate(and3(lhs, rhs)))
        }
        BinaryOperator::Or => {
            let lhs = left.evaluate(ctx)?.as_tristate();
            if lhs == Some(true) {
                return Ok(Value::Boolean(true));
            }
            let rhs = right.evaluate(ctx)?.as_tristate();
            Ok(tristate(or3(lhs, rhs)))
        }
        BinaryOperator::Like | BinaryOperator::NotLike | BinaryOperator::ILike => {
            let value = left.evaluate(ctx)?;
            let pattern = right.evaluate(ctx)?;
            let insensitive = op == BinaryOperator::ILike || ctx.ignore_case;
            let matched = match &constant_pattern {
                Some(_) if value.is_null() => None,
                Some((sensitive, case_free)) => {
                    let text = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let regex: &Regex = if insensitive { case_free } else { sensitive };
                    Some(regex.is_match(&text))
                }
                None => matches_like(&value, &pattern, insensitive),
            };
            let matched = if op == BinaryOperator::NotLike {
                matched.map(|b| !b)
            } else {
                matched
            };
            Ok(tristate(matched))
        }
        _ => {
            let lhs = left.evaluate(ctx)?;
            let rhs = right.evaluate(ctx)?;
            Ok(apply_binary(op, &lhs, &rhs, ctx.ignore_case))
        }
    }))
}

/// Comparison, arithmetic and concatenation on already evaluated operands
pub(crate) fn apply_binary(op: BinaryOperator, lhs: &Value, rhs: &Value, ignore_case: bool) -> Value {
    let compare = |test: fn(Ordering) -> bool| match try_compare(lhs, rhs, ignore_case) {
        Some(ordering) => Value::Boolean(test(ordering)),
        None => Value::Null,
    };
    match op {
        BinaryOperator::Eq => compare(|o| o == Ordering::Equal),
        BinaryOperator::NotEq => compare(|o| o != Ordering::Equal),
        BinaryOperator::Lt => compare(|o| o == Ordering::Less),
        BinaryOperator::LtEq => compare(|o| o != Ordering::Greater),
        BinaryOperator::Gt => compare(|o| o == Ordering::Greater),
        BinaryOperator::GtEq => compare(|o| o != Ordering::Less),
        BinaryOperator::Concat => {
            if lhs.is_null() || rhs.is_null() {
                Value::Null
            } else {
                Value::String(format!("{}{}", lhs, rhs))
            }
        }
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => arithmetic(op, lhs, rhs),
        BinaryOperator::And | BinaryOperator::Or => {
            let (l, r) = (lhs.as_tristate(), rhs.as_tristate());
            tristate(if op == BinaryOperator::And {
                and3(l, r)
            } else {
                or3(l, r)
            })
        }
        BinaryOperator::Like | BinaryOperator::ILike => {
            tristate(matches_like(lhs, rhs, ignore_case || op == BinaryOperator::ILike))
        }
        BinaryOperator::NotLike => tristate(matches_like(lhs, rhs, ignore_case).map(|b| !b)),
    }
}

fn arithmetic(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match op {
            BinaryOperator::Add => Value::Number(a + b),
            BinaryOperator::Subtract => Value::Number(a - b),
            BinaryOperator::Multiply => Value::Number(a * b),
            BinaryOperator::Divide if *b == 0.0 => Value::Null,
            BinaryOperator::Divide => Value::Number(a / b),
            BinaryOperator::Modulo if *b == 0.0 => Value::Null,
            BinaryOperator::Modulo => Value::Number(a % b),
            _ => Value::Null,
        },
        (Value::DateTime(dt), Value::Number(millis)) => {
            let delta = chrono::Duration::milliseconds(millis.trunc() as i64);
            match op {
                BinaryOperator::Add => dt.checked_add_signed(delta).map_or(Value::Null, Value::DateTime),
                BinaryOperator::Subtract => {
                    dt.checked_sub_signed(delta).map_or(Value::Null, Value::DateTime)
                }
                _ => Value::Null,
            }
        }
        (Value::DateTime(a), Value::DateTime(b)) if op == BinaryOperator::Subtract => {
            Value::Number((*a - *b).num_milliseconds() as f64)
        }
        _ => Value::Null,
    }
}

pub(crate) fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

pub(crate) fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn tristate(value: Option<bool>) -> Value {
    value.map(Value::Boolean).unwrap_or(Value::Null)
}

/// Compile and evaluate one standalone expression in row mode
#[cfg(test)]
pub(crate) fn eval_standalone(node: &NodeRef, row: Record) -> Result<Value, ExecutionError> {
    use crate::exec::compiler::CompiledExpr;
    use crate::session::ExecOptions;
    use crate::storage::Collections;

    let mut compiler = Compiler::default();
    let expr: CompiledExpr = compiler.compile(node)?;
    let mut ctx = ExecutionContext::new(Collections::new(), &ExecOptions::default());
    let (result, _) = ctx.on_row(row, |ctx| expr.evaluate(ctx));
    result
}
