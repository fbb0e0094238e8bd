// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Comparator and predicate library
//!
//! [`compare_values`] is a total order used by sorting and deduplication.
//! [`try_compare`] is the predicate view of the same order: it reports
//! `None` when either side is null or the kinds differ, which predicate
//! operators turn into a `Null` result.

use crate::storage::{Record, Value};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// Locale-style string order: letters compare case-insensitively first and
/// case only breaks ties, lowercase before uppercase
pub fn compare_strings(a: &str, b: &str, ignore_case: bool) -> Ordering {
    let primary = a.to_lowercase().cmp(&b.to_lowercase());
    if ignore_case {
        primary
    } else {
        primary.then_with(|| b.cmp(a))
    }
}

/// Total order across heterogeneous values
pub fn compare_values(a: &Value, b: &Value, ignore_case: bool) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or_else(|| {
            // NaN sorts after every number
            x.is_nan().cmp(&y.is_nan())
        }),
        (Value::String(x), Value::String(y)) => compare_strings(x, y, ignore_case),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right, ignore_case);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Record(x), Value::Record(y)) => compare_records(x, y, ignore_case),
        _ => a.kind_rank().cmp(&b.kind_rank()),
    }
}

fn compare_records(x: &Record, y: &Record, ignore_case: bool) -> Ordering {
    for ((left_key, left), (right_key, right)) in x.iter().zip(y.iter()) {
        let ord = compare_strings(left_key, right_key, false)
            .then_with(|| compare_values(left, right, ignore_case));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

/// Comparison for predicates; `None` means "not comparable"
pub fn try_compare(a: &Value, b: &Value, ignore_case: bool) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::List(x), Value::List(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                match try_compare(left, right, ignore_case)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ if a.kind_rank() == b.kind_rank() => Some(compare_values(a, b, ignore_case)),
        _ => None,
    }
}

/// Structural equality; nulls are equal to each other
pub fn values_equal(a: &Value, b: &Value, ignore_case: bool) -> bool {
    match (a, b) {
        (Value::Record(x), Value::Record(y)) => records_equal(x, y, ignore_case),
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|(left, right)| values_equal(left, right, ignore_case))
        }
        _ => compare_values(a, b, ignore_case) == Ordering::Equal,
    }
}

/// Structural equality of two records, ignoring key order
pub fn records_equal(a: &Record, b: &Record, ignore_case: bool) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, left)| {
            b.get(key)
                .map(|right| values_equal(left, right, ignore_case))
                .unwrap_or(false)
        })
}

/// Structural equality of two tuples
pub fn tuples_equal(a: &[Value], b: &[Value], ignore_case: bool) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(left, right)| values_equal(left, right, ignore_case))
}

/// Sort-key comparison with explicit null placement
///
/// Nulls compare equal to each other; `nulls_last` alone decides where they
/// go, independent of `descending`.
pub fn compare_sort_values(
    a: &Value,
    b: &Value,
    descending: bool,
    nulls_last: bool,
    ignore_case: bool,
) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if nulls_last {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, true) => {
            if nulls_last {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, false) => {
            let ord = compare_values(a, b, ignore_case);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Translate a LIKE pattern into an anchored regular expression
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    expr.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
}

/// LIKE predicate; `None` when either side is null
pub fn matches_like(value: &Value, pattern: &Value, case_insensitive: bool) -> Option<bool> {
    if value.is_null() || pattern.is_null() {
        return None;
    }
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let pattern = match pattern {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match like_to_regex(&pattern, case_insensitive) {
        Ok(regex) => Some(regex.is_match(&text)),
        Err(e) => {
            log::warn!("Invalid LIKE pattern '{}': {}", pattern, e);
            None
        }
    }
}
