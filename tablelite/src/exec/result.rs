// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query results

use crate::storage::{Record, Value};
use serde::Serialize;

/// Materialized result of one program run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Output column names, in select order
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    /// Rows inserted, updated or deleted by the statement
    pub affected: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self {
            columns,
            rows,
            affected: 0,
        }
    }

    /// Collect column names from the rows themselves, in first-seen order
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self::new(columns, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as tuples ordered by `columns`; missing fields become null
    pub fn tuples(&self) -> Vec<Vec<Value>> {
        self.rows.iter().map(|row| self.tuple(row)).collect()
    }

    pub fn tuple(&self, row: &Record) -> Vec<Value> {
        self.columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// First column of the first row, or null
    pub fn first_value(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| match self.columns.first() {
                Some(column) => row.get(column).cloned(),
                None => row.values().next().cloned(),
            })
            .unwrap_or(Value::Null)
    }

    /// Values of the first column
    pub fn first_column(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| match self.columns.first() {
                Some(column) => row.get(column).cloned().unwrap_or(Value::Null),
                None => row.values().next().cloned().unwrap_or(Value::Null),
            })
            .collect()
    }

    /// Shape the result the way the caller asked for
    pub fn into_output(self, array_mode: bool, affected_count: bool) -> QueryOutput {
        let affected = self.affected;
        let inner = if array_mode {
            QueryOutput::Tuples(self.tuples())
        } else {
            QueryOutput::Records(self.rows)
        };
        if affected_count {
            QueryOutput::Affected {
                affected,
                result: Box::new(inner),
            }
        } else {
            inner
        }
    }
}

/// Result shape handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Records(Vec<Record>),
    Tuples(Vec<Vec<Value>>),
    Affected {
        affected: usize,
        result: Box<QueryOutput>,
    },
}

impl QueryOutput {
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            QueryOutput::Records(rows) => Some(rows),
            QueryOutput::Affected { result, .. } => result.records(),
            QueryOutput::Tuples(_) => None,
        }
    }

    pub fn tuples(&self) -> Option<&[Vec<Value>]> {
        match self {
            QueryOutput::Tuples(rows) => Some(rows),
            QueryOutput::Affected { result, .. } => result.tuples(),
            QueryOutput::Records(_) => None,
        }
    }

    pub fn affected(&self) -> Option<usize> {
        match self {
            QueryOutput::Affected { affected, .. } => Some(*affected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_tuples_follow_column_order() {
        let result = QueryResult::new(
            vec!["b".into(), "a".into()],
            vec![record(&[("a", 1.into()), ("b", 2.into())])],
        );
        assert_eq!(result.tuples(), vec![vec![Value::Number(2.0), Value::Number(1.0)]]);
    }

    #[test]
    fn test_output_wrapping() {
        let mut result = QueryResult::from_rows(vec![record(&[("a", 1.into())])]);
        result.affected = 1;
        let output = result.into_output(true, true);
        assert_eq!(output.affected(), Some(1));
        assert_eq!(output.tuples().unwrap().len(), 1);
        assert!(output.records().is_none());
    }

    #[test]
    fn test_first_value_of_empty_is_null() {
        assert_eq!(QueryResult::default().first_value(), Value::Null);
    }
}
