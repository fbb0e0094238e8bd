// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! String function implementations
//!
//! - LOWER / UPPER: case conversion
//! - LENGTH: character count
//! - TRIM / LTRIM / RTRIM: whitespace removal
//! - SUBSTR: 1-based substring
//! - REPLACE: substring replacement
//! - CONCAT: null-skipping concatenation
//!
//! Every function except CONCAT returns null when its text argument is null.

use super::function_trait::{Function, FunctionContext, FunctionError, FunctionResult};
use crate::storage::Value;

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn integer_argument(value: &Value, name: &str) -> FunctionResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) if n.is_finite() => Ok(Some(n.trunc() as i64)),
        other => Err(FunctionError::InvalidArgumentType {
            message: format!("{} expects a number, got {}", name, other.type_name()),
        }),
    }
}

// ==============================================================================
// LOWER / UPPER FUNCTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Lower,
    Upper,
}

/// LOWER(text) / UPPER(text)
#[derive(Debug)]
pub struct CaseFunction {
    mode: CaseMode,
}

impl CaseFunction {
    pub fn new(mode: CaseMode) -> Self {
        Self { mode }
    }
}

impl Function for CaseFunction {
    fn name(&self) -> &str {
        match self.mode {
            CaseMode::Lower => "LOWER",
            CaseMode::Upper => "UPPER",
        }
    }

    fn description(&self) -> &str {
        match self.mode {
            CaseMode::Lower => "Converts text to lowercase",
            CaseMode::Upper => "Converts text to uppercase",
        }
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let Some(text) = text_of(context.get_argument(0)?) else {
            return Ok(Value::Null);
        };
        Ok(Value::String(match self.mode {
            CaseMode::Lower => text.to_lowercase(),
            CaseMode::Upper => text.to_uppercase(),
        }))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// LENGTH FUNCTION
// ==============================================================================

/// LENGTH(text) - number of characters; lists report their element count
#[derive(Debug)]
pub struct LengthFunction;

impl Function for LengthFunction {
    fn name(&self) -> &str {
        "LENGTH"
    }

    fn description(&self) -> &str {
        "Returns the number of characters in text"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        match context.get_argument(0)? {
            Value::Null => Ok(Value::Null),
            Value::List(items) => Ok(Value::Number(items.len() as f64)),
            other => Ok(Value::Number(
                text_of(other).map_or(0, |s| s.chars().count()) as f64,
            )),
        }
    }

    fn return_type(&self) -> &str {
        "Number"
    }
}

// ==============================================================================
// TRIM FUNCTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    Both,
    Leading,
    Trailing,
}

/// TRIM(text) / LTRIM(text) / RTRIM(text)
#[derive(Debug)]
pub struct TrimFunction {
    mode: TrimMode,
}

impl TrimFunction {
    pub fn new(mode: TrimMode) -> Self {
        Self { mode }
    }
}

impl Function for TrimFunction {
    fn name(&self) -> &str {
        match self.mode {
            TrimMode::Both => "TRIM",
            TrimMode::Leading => "LTRIM",
            TrimMode::Trailing => "RTRIM",
        }
    }

    fn description(&self) -> &str {
        "Removes surrounding whitespace"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let Some(text) = text_of(context.get_argument(0)?) else {
            return Ok(Value::Null);
        };
        let trimmed = match self.mode {
            TrimMode::Both => text.trim(),
            TrimMode::Leading => text.trim_start(),
            TrimMode::Trailing => text.trim_end(),
        };
        Ok(Value::String(trimmed.to_string()))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// SUBSTR FUNCTION
// ==============================================================================

/// SUBSTR(text, start [, length]) with a 1-based start position
#[derive(Debug)]
pub struct SubstrFunction;

impl Function for SubstrFunction {
    fn name(&self) -> &str {
        "SUBSTR"
    }

    fn description(&self) -> &str {
        "Extracts a substring. SUBSTR(text, start [, length])"
    }

    fn argument_count(&self) -> usize {
        2
    }

    fn max_argument_count(&self) -> Option<usize> {
        Some(3)
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let Some(text) = text_of(context.get_argument(0)?) else {
            return Ok(Value::Null);
        };
        let Some(start) = integer_argument(context.get_argument(1)?, "SUBSTR")? else {
            return Ok(Value::Null);
        };
        let length = match context.optional_argument(2) {
            Some(value) => match integer_argument(value, "SUBSTR")? {
                Some(length) if length < 0 => {
                    return Err(FunctionError::InvalidArgumentType {
                        message: "SUBSTR length must not be negative".to_string(),
                    })
                }
                Some(length) => Some(length),
                None => return Ok(Value::Null),
            },
            None => None,
        };

        // Positions before 1 still consume length, as in SQL
        let first = start.max(1);
        let end = length.map(|length| start.saturating_add(length));
        let skip = (first - 1) as usize;
        let take = match end {
            Some(end) if end <= first => 0,
            Some(end) => (end - first) as usize,
            None => usize::MAX,
        };
        Ok(Value::String(text.chars().skip(skip).take(take).collect()))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// REPLACE FUNCTION
// ==============================================================================

/// REPLACE(text, from, to)
#[derive(Debug)]
pub struct ReplaceFunction;

impl Function for ReplaceFunction {
    fn name(&self) -> &str {
        "REPLACE"
    }

    fn description(&self) -> &str {
        "Replaces every occurrence of a substring. REPLACE(text, from, to)"
    }

    fn argument_count(&self) -> usize {
        3
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        let text = text_of(context.get_argument(0)?);
        let from = text_of(context.get_argument(1)?);
        let to = text_of(context.get_argument(2)?);
        match (text, from, to) {
            (Some(text), Some(from), Some(to)) if !from.is_empty() => {
                Ok(Value::String(text.replace(&from, &to)))
            }
            (Some(text), Some(_), Some(_)) => Ok(Value::String(text)),
            _ => Ok(Value::Null),
        }
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

// ==============================================================================
// CONCAT FUNCTION
// ==============================================================================

/// CONCAT(a, b, ...) - null arguments are skipped
#[derive(Debug)]
pub struct ConcatFunction;

impl Function for ConcatFunction {
    fn name(&self) -> &str {
        "CONCAT"
    }

    fn description(&self) -> &str {
        "Concatenates all non-null arguments"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn max_argument_count(&self) -> Option<usize> {
        None
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        Ok(Value::String(
            context.arguments.iter().filter_map(text_of).collect(),
        ))
    }

    fn return_type(&self) -> &str {
        "String"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: &dyn Function, args: Vec<Value>) -> Value {
        function.execute(&FunctionContext::new(args)).unwrap()
    }

    #[test]
    fn test_case_and_length() {
        assert_eq!(run(&CaseFunction::new(CaseMode::Upper), vec!["ab".into()]), Value::from("AB"));
        assert_eq!(run(&LengthFunction, vec!["héllo".into()]), Value::Number(5.0));
        assert_eq!(run(&LengthFunction, vec![Value::Null]), Value::Null);
    }

    #[test]
    fn test_substr_positions() {
        let f = SubstrFunction;
        assert_eq!(run(&f, vec!["hello".into(), 2.into()]), Value::from("ello"));
        assert_eq!(run(&f, vec!["hello".into(), 2.into(), 3.into()]), Value::from("ell"));
        assert_eq!(run(&f, vec!["hello".into(), 0.into(), 2.into()]), Value::from("h"));
        assert_eq!(run(&f, vec!["hello".into(), 9.into()]), Value::from(""));
    }

    #[test]
    fn test_concat_skips_nulls() {
        let value = run(&ConcatFunction, vec!["a".into(), Value::Null, 1.into()]);
        assert_eq!(value, Value::from("a1"));
    }

    #[test]
    fn test_trim_modes() {
        let input = || vec![Value::from("  x  ")];
        assert_eq!(run(&TrimFunction::new(TrimMode::Both), input()), Value::from("x"));
        assert_eq!(run(&TrimFunction::new(TrimMode::Leading), input()), Value::from("x  "));
        assert_eq!(run(&TrimFunction::new(TrimMode::Trailing), input()), Value::from("  x"));
    }
}
