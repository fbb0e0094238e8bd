// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Null-handling and comparison functions: COALESCE, NULLIF, GREATEST, LEAST,
//! plus NOW

use super::function_trait::{Function, FunctionContext, FunctionResult};
use crate::compare::{compare_values, values_equal};
use crate::storage::Value;
use std::cmp::Ordering;

/// COALESCE(a, b, ...) - first non-null argument
#[derive(Debug)]
pub struct CoalesceFunction;

impl Function for CoalesceFunction {
    fn name(&self) -> &str {
        "COALESCE"
    }

    fn description(&self) -> &str {
        "Returns the first non-null argument"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn max_argument_count(&self) -> Option<usize> {
        None
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        Ok(context
            .arguments
            .iter()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "Any"
    }
}

/// NULLIF(a, b) - null when both arguments are equal, otherwise `a`
#[derive(Debug)]
pub struct NullIfFunction;

impl Function for NullIfFunction {
    fn name(&self) -> &str {
        "NULLIF"
    }

    fn description(&self) -> &str {
        "Returns null if both arguments are equal, otherwise the first"
    }

    fn argument_count(&self) -> usize {
        2
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let first = context.get_argument(0)?;
        let second = context.get_argument(1)?;
        if !first.is_null() && values_equal(first, second, false) {
            Ok(Value::Null)
        } else {
            Ok(first.clone())
        }
    }

    fn return_type(&self) -> &str {
        "Any"
    }
}

/// GREATEST(...) / LEAST(...) - nulls are ignored
#[derive(Debug)]
pub struct ExtremumFunction {
    greatest: bool,
}

impl ExtremumFunction {
    pub fn greatest() -> Self {
        Self { greatest: true }
    }

    pub fn least() -> Self {
        Self { greatest: false }
    }
}

impl Function for ExtremumFunction {
    fn name(&self) -> &str {
        if self.greatest {
            "GREATEST"
        } else {
            "LEAST"
        }
    }

    fn description(&self) -> &str {
        if self.greatest {
            "Returns the largest non-null argument"
        } else {
            "Returns the smallest non-null argument"
        }
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn max_argument_count(&self) -> Option<usize> {
        None
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let wanted = if self.greatest {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        let mut best: Option<&Value> = None;
        for value in context.arguments.iter().filter(|v| !v.is_null()) {
            best = match best {
                Some(current) if compare_values(value, current, false) != wanted => Some(current),
                _ => Some(value),
            };
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }

    fn return_type(&self) -> &str {
        "Any"
    }
}

/// NOW() - current UTC timestamp
#[derive(Debug)]
pub struct NowFunction;

impl Function for NowFunction {
    fn name(&self) -> &str {
        "NOW"
    }

    fn description(&self) -> &str {
        "Returns the current timestamp"
    }

    fn argument_count(&self) -> usize {
        0
    }

    fn execute(&self, _context: &FunctionContext) -> FunctionResult<Value> {
        Ok(Value::DateTime(chrono::Utc::now()))
    }

    fn return_type(&self) -> &str {
        "DateTime"
    }
}
