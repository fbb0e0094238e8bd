// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cast and column coercion
//!
//! Casting never fails: input that cannot be represented in the target type
//! becomes `Null` and flows through ordinary null handling.

pub mod temporal;

use crate::ast::DataType;
use crate::storage::Value;

/// Cast a value to the given type
pub fn cast(value: &Value, data_type: &DataType) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match data_type {
        DataType::Boolean => to_boolean(value),
        DataType::SmallInt => to_integer(value, i16::MIN as f64, i16::MAX as f64),
        DataType::Integer => to_integer(value, i32::MIN as f64, i32::MAX as f64),
        DataType::BigInt => to_integer(value, i64::MIN as f64, i64::MAX as f64),
        DataType::Real => to_number(value)
            .map(|n| Value::Number(n as f32 as f64))
            .unwrap_or(Value::Null),
        DataType::Double => to_number(value).map(Value::Number).unwrap_or(Value::Null),
        DataType::Numeric { scale } => match (to_number(value), scale) {
            (Some(n), Some(scale)) => Value::Number(round_to_scale(n, *scale)),
            (Some(n), None) => Value::Number(n),
            (None, _) => Value::Null,
        },
        DataType::Text { length } => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match length {
                Some(max) => Value::String(text.chars().take(*max).collect()),
                None => Value::String(text),
            }
        }
        DataType::Date => to_timestamp(value)
            .and_then(temporal::start_of_day)
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        DataType::Timestamp => to_timestamp(value)
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        DataType::Json => match value {
            Value::String(s) => serde_json::from_str::<serde_json::Value>(s)
                .map(Value::from)
                .unwrap_or_else(|_| value.clone()),
            other => other.clone(),
        },
        DataType::List(inner) => match value {
            Value::List(items) => Value::List(items.iter().map(|item| cast(item, inner)).collect()),
            Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(serde_json::Value::Array(items)) => Value::List(
                    items
                        .into_iter()
                        .map(|item| cast(&Value::from(item), inner))
                        .collect(),
                ),
                _ => Value::Null,
            },
            _ => Value::Null,
        },
    }
}

/// Cast when a declared type is present, otherwise keep the value
pub fn coerce(value: Value, data_type: Option<&DataType>) -> Value {
    match data_type {
        Some(data_type) => cast(&value, data_type),
        None => value,
    }
}

fn to_boolean(value: &Value) -> Value {
    match value {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::Number(n) => Value::Boolean(*n != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Value::Boolean(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Value::Boolean(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::DateTime(dt) => Some(dt.timestamp_millis() as f64),
        _ => None,
    }
}

fn to_integer(value: &Value, min: f64, max: f64) -> Value {
    match to_number(value) {
        Some(n) if n.is_nan() => Value::Null,
        Some(n) => Value::Number(n.trunc().clamp(min, max)),
        None => Value::Null,
    }
}

fn round_to_scale(n: f64, scale: u32) -> f64 {
    let factor = 10f64.powi(scale as i32);
    (n * factor).round() / factor
}

fn to_timestamp(value: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::String(s) => temporal::parse_timestamp(s),
        Value::Number(n) => temporal::from_epoch_millis(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_truncates_and_clamps() {
        assert_eq!(cast(&Value::from("12.9"), &DataType::Integer), Value::Number(12.0));
        assert_eq!(cast(&Value::Number(-3.7), &DataType::Integer), Value::Number(-3.0));
        assert_eq!(
            cast(&Value::Number(1e9), &DataType::SmallInt),
            Value::Number(i16::MAX as f64)
        );
        assert_eq!(cast(&Value::from("abc"), &DataType::Integer), Value::Null);
    }

    #[test]
    fn test_boolean_spellings() {
        assert_eq!(cast(&Value::from("yes"), &DataType::Boolean), Value::Boolean(true));
        assert_eq!(cast(&Value::from("F"), &DataType::Boolean), Value::Boolean(false));
        assert_eq!(cast(&Value::from("maybe"), &DataType::Boolean), Value::Null);
    }

    #[test]
    fn test_text_truncates_to_length() {
        assert_eq!(cast(&Value::from("abcdef"), &DataType::varchar(3)), Value::from("abc"));
        assert_eq!(cast(&Value::Number(42.0), &DataType::text()), Value::from("42"));
    }

    #[test]
    fn test_numeric_rounds_to_scale() {
        assert_eq!(cast(&Value::Number(1.2345), &DataType::numeric(2)), Value::Number(1.23));
    }

    #[test]
    fn test_date_is_midnight() {
        let value = cast(&Value::from("2024-05-06 17:30:00"), &DataType::Date);
        let expected = temporal::parse_timestamp("2024-05-06").map(Value::DateTime).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_json_and_list() {
        let parsed = cast(&Value::from("[1, 2]"), &DataType::Json);
        assert_eq!(parsed, Value::List(vec![Value::Number(1.0), Value::Number(2.0)]));
        let listed = cast(
            &Value::List(vec![Value::from("1"), Value::from("x")]),
            &DataType::list_of(DataType::Integer),
        );
        assert_eq!(listed, Value::List(vec![Value::Number(1.0), Value::Null]));
    }

    #[test]
    fn test_null_casts_to_null() {
        assert_eq!(cast(&Value::Null, &DataType::text()), Value::Null);
    }
}
