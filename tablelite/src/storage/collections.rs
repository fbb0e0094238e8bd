// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Named in-memory collections
//!
//! Each collection is an ordered list of records shared behind an `Arc`.
//! Cloning [`Collections`] is cheap; writers go through [`Arc::make_mut`] so
//! a clone taken before a statement (or a transaction) is never touched.

use super::value::{record_from_json, Record};
use super::StorageError;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, immutable view of one collection's rows
pub type Collection = Arc<Vec<Record>>;

/// The set of caller-visible tables, keyed by storage name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    tables: HashMap<String, Collection>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a table
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Record>) -> Self {
        self.insert(name, rows);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, rows: Vec<Record>) {
        self.tables.insert(name.into(), Arc::new(rows));
    }

    /// Replace a table with an already shared row set
    pub fn replace(&mut self, name: impl Into<String>, rows: Collection) {
        self.tables.insert(name.into(), rows);
    }

    pub fn get(&self, name: &str) -> Option<&Collection> {
        self.tables.get(name)
    }

    pub fn table(&self, name: &str) -> Option<&[Record]> {
        self.tables.get(name).map(|rows| rows.as_slice())
    }

    /// Mutable access to a table's rows, copying them first if shared
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Vec<Record>> {
        self.tables.get_mut(name).map(Arc::make_mut)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Collection> {
        self.tables.remove(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Load collections from a JSON object of arrays of objects
    pub fn from_json(json: JsonValue) -> Result<Self, StorageError> {
        let JsonValue::Object(map) = json else {
            return Err(StorageError::InvalidFixture(
                "collections must be a JSON object".to_string(),
            ));
        };

        let mut collections = Collections::new();
        for (name, rows) in map {
            let JsonValue::Array(items) = rows else {
                return Err(StorageError::InvalidFixture(format!(
                    "collection '{}' must be an array",
                    name
                )));
            };
            let mut records = Vec::with_capacity(items.len());
            for (position, item) in items.into_iter().enumerate() {
                let record = record_from_json(item).ok_or_else(|| {
                    StorageError::InvalidFixture(format!(
                        "row {} of collection '{}' is not an object",
                        position, name
                    ))
                })?;
                records.push(record);
            }
            log::debug!("Loaded collection '{}' with {} rows", name, records.len());
            collections.insert(name, records);
        }
        Ok(collections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;
    use serde_json::json;

    #[test]
    fn test_from_json_loads_tables() {
        let collections = Collections::from_json(json!({
            "todo": [{"id": 1, "done": true}, {"id": 2, "done": false}]
        }))
        .unwrap();
        let todo = collections.table("todo").unwrap();
        assert_eq!(todo.len(), 2);
        assert_eq!(todo[1]["done"], Value::Boolean(false));
    }

    #[test]
    fn test_from_json_rejects_scalar_rows() {
        let err = Collections::from_json(json!({"todo": [1]})).unwrap_err();
        assert!(matches!(err, StorageError::InvalidFixture(_)));
    }

    #[test]
    fn test_table_mut_leaves_clones_untouched() {
        let mut live = Collections::from_json(json!({"t": [{"a": 1}]})).unwrap();
        let snapshot = live.clone();
        live.table_mut("t").unwrap().clear();
        assert_eq!(snapshot.table("t").unwrap().len(), 1);
        assert!(live.table("t").unwrap().is_empty());
    }
}
