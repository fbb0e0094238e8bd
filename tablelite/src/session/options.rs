// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-call execution options

use crate::storage::{Record, Value};
use serde::{Deserialize, Serialize};

/// Options for one `exec`/`execute` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecOptions {
    /// Named parameter values
    pub params: Record,
    /// Case-insensitive string comparison
    pub ignore_case: bool,
    /// Bind sources under their storage names and skip column renaming
    pub use_names: bool,
    /// Wrap the output with the affected-row count
    pub affected_count: bool,
    /// Return tuples instead of records
    pub array_mode: bool,
    /// Cap on recursive-source iterations; uncapped when unset
    pub max_recursion: Option<usize>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Record) -> Self {
        self.params = params;
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_use_names(mut self, use_names: bool) -> Self {
        self.use_names = use_names;
        self
    }

    pub fn with_affected_count(mut self, affected_count: bool) -> Self {
        self.affected_count = affected_count;
        self
    }

    pub fn with_array_mode(mut self, array_mode: bool) -> Self {
        self.array_mode = array_mode;
        self
    }

    pub fn with_max_recursion(mut self, limit: usize) -> Self {
        self.max_recursion = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_partial_options() {
        let options: ExecOptions = serde_json::from_value(json!({
            "ignoreCase": true,
            "maxRecursion": 10,
            "params": {"min": 3}
        }))
        .unwrap();
        assert!(options.ignore_case);
        assert!(!options.array_mode);
        assert_eq!(options.max_recursion, Some(10));
        assert_eq!(options.params["min"], Value::from(3));
    }

    #[test]
    fn test_builder_setters() {
        let options = ExecOptions::new()
            .with_param("id", 1)
            .with_array_mode(true)
            .with_affected_count(true);
        assert!(options.array_mode && options.affected_count);
        assert_eq!(options.params.len(), 1);
        assert_eq!(options.max_recursion, None);
    }
}
