// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Numeric function implementations: ABS, ROUND, FLOOR, CEIL

use super::function_trait::{Function, FunctionContext, FunctionError, FunctionResult};
use crate::storage::Value;

fn number_argument(value: &Value, name: &str) -> FunctionResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(*n)),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            FunctionError::InvalidArgumentType {
                message: format!("{} expects a number, got '{}'", name, s),
            }
        }),
        other => Err(FunctionError::InvalidArgumentType {
            message: format!("{} expects a number, got {}", name, other.type_name()),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryMath {
    Abs,
    Floor,
    Ceil,
}

/// ABS(n) / FLOOR(n) / CEIL(n)
#[derive(Debug)]
pub struct UnaryMathFunction {
    op: UnaryMath,
}

impl UnaryMathFunction {
    pub fn new(op: UnaryMath) -> Self {
        Self { op }
    }
}

impl Function for UnaryMathFunction {
    fn name(&self) -> &str {
        match self.op {
            UnaryMath::Abs => "ABS",
            UnaryMath::Floor => "FLOOR",
            UnaryMath::Ceil => "CEIL",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            UnaryMath::Abs => "Absolute value",
            UnaryMath::Floor => "Largest integer not greater than the argument",
            UnaryMath::Ceil => "Smallest integer not less than the argument",
        }
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let Some(n) = number_argument(context.get_argument(0)?, self.name())? else {
            return Ok(Value::Null);
        };
        Ok(Value::Number(match self.op {
            UnaryMath::Abs => n.abs(),
            UnaryMath::Floor => n.floor(),
            UnaryMath::Ceil => n.ceil(),
        }))
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}

/// ROUND(n [, digits]) - half away from zero
#[derive(Debug)]
pub struct RoundFunction;

impl Function for RoundFunction {
    fn name(&self) -> &str {
        "ROUND"
    }

    fn description(&self) -> &str {
        "Rounds to the given number of decimal digits. ROUND(n [, digits])"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn max_argument_count(&self) -> Option<usize> {
        Some(2)
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let Some(n) = number_argument(context.get_argument(0)?, "ROUND")? else {
            return Ok(Value::Null);
        };
        let digits = match context.optional_argument(1) {
            Some(value) => match number_argument(value, "ROUND")? {
                Some(d) => d.trunc() as i32,
                None => return Ok(Value::Null),
            },
            None => 0,
        };
        let factor = 10f64.powi(digits);
        Ok(Value::Number((n * factor).round() / factor))
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}
