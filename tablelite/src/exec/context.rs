// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution context for one evaluation run
//!
//! Expressions evaluate in one of two modes:
//! - row mode: no current record, fields resolve against `row` (the joined
//!   row being filtered, or a group member being aggregated);
//! - record mode: `current` points into `records`, fields resolve against
//!   that record's base row and results are memoized in its cache.

use crate::ast::NodeId;
use crate::exec::ExecutionError;
use crate::session::ExecOptions;
use crate::storage::{Collection, Collections, Record, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One logical output row, possibly standing for a whole group
#[derive(Debug, Clone, Default)]
pub struct ResultRecord {
    /// Base row: alias to sub-record
    pub row: Record,
    /// Rows aggregated into this record
    pub group: Arc<Vec<Record>>,
    /// Memoized expression values, filled at most once per expression
    pub cache: HashMap<NodeId, Value>,
    /// Computed select list
    pub selects: Record,
    /// Grouping keys outside this record's grouping set
    pub absent_keys: Arc<Vec<NodeId>>,
    pub partition_index: usize,
    pub partition_size: usize,
    pub peer_index: usize,
    pub peer_size: usize,
    pub peer_group: usize,
}

impl ResultRecord {
    pub fn singleton(row: Record) -> Self {
        let group = Arc::new(vec![row.clone()]);
        Self::grouped(row, group)
    }

    pub fn grouped(row: Record, group: Arc<Vec<Record>>) -> Self {
        Self {
            row,
            group,
            partition_size: 1,
            peer_size: 1,
            ..Self::default()
        }
    }

    /// Absolute position of the first record of this record's partition
    pub fn partition_start(&self, position: usize) -> usize {
        position - self.partition_index
    }
}

/// Saved evaluation state, restored when a nested query finishes
pub(crate) struct Scope {
    row: Record,
    records: Vec<ResultRecord>,
    current: Option<usize>,
    last_window: Option<NodeId>,
    virtual_sources: HashMap<String, Collection>,
}

pub struct ExecutionContext {
    collections: Collections,
    virtual_sources: HashMap<String, Collection>,
    params: Record,
    pub(crate) row: Record,
    pub(crate) records: Vec<ResultRecord>,
    pub(crate) current: Option<usize>,
    pub(crate) last_window: Option<NodeId>,
    pub(crate) affected: usize,
    pub ignore_case: bool,
    pub use_names: bool,
    pub max_recursion: Option<usize>,
}

impl ExecutionContext {
    pub fn new(collections: Collections, options: &ExecOptions) -> Self {
        Self {
            collections,
            virtual_sources: HashMap::new(),
            params: options.params.clone(),
            row: Record::new(),
            records: Vec::new(),
            current: None,
            last_window: None,
            affected: 0,
            ignore_case: options.ignore_case,
            use_names: options.use_names,
            max_recursion: options.max_recursion,
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn into_collections(self) -> Collections {
        self.collections
    }

    pub fn affected(&self) -> usize {
        self.affected
    }

    /// Replace one caller collection with a statement's result
    pub(crate) fn commit_table(&mut self, name: &str, rows: Vec<Record>) {
        self.collections.replace(name.to_string(), Arc::new(rows));
    }

    /// Look a named source up: WITH sources first, then caller collections
    pub fn lookup_source(&self, name: &str) -> Result<Collection, ExecutionError> {
        self.virtual_sources
            .get(name)
            .or_else(|| self.collections.get(name))
            .cloned()
            .ok_or_else(|| ExecutionError::MissingSource(name.to_string()))
    }

    /// Rows of a caller collection, for statements that modify it
    pub(crate) fn target_rows(&self, name: &str) -> Result<Vec<Record>, ExecutionError> {
        self.collections
            .get(name)
            .map(|rows| rows.as_ref().clone())
            .ok_or_else(|| ExecutionError::MissingSource(name.to_string()))
    }

    pub(crate) fn bind_virtual(&mut self, name: &str, rows: Collection) {
        self.virtual_sources.insert(name.to_string(), rows);
    }

    pub fn param(&self, name: &str) -> Result<Value, ExecutionError> {
        self.params
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::MissingParameter(name.to_string()))
    }

    /// Row that field references currently resolve against
    pub fn current_row(&self) -> &Record {
        match self.current.and_then(|index| self.records.get(index)) {
            Some(record) => &record.row,
            None => &self.row,
        }
    }

    pub fn current_record(&self) -> Option<&ResultRecord> {
        self.current.and_then(|index| self.records.get(index))
    }

    pub(crate) fn cached(&self, id: NodeId) -> Option<Value> {
        self.current_record()
            .and_then(|record| record.cache.get(&id))
            .cloned()
    }

    pub(crate) fn store(&mut self, id: NodeId, value: &Value) {
        if let Some(record) = self.current.and_then(|index| self.records.get_mut(index)) {
            record.cache.entry(id).or_insert_with(|| value.clone());
        }
    }

    /// Evaluate in row mode against `row`, handing the row back afterwards
    pub(crate) fn on_row<T>(
        &mut self,
        row: Record,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> (Result<T, ExecutionError>, Record) {
        let saved_row = std::mem::replace(&mut self.row, row);
        let saved_current = self.current.take();
        let result = f(self);
        self.current = saved_current;
        let row = std::mem::replace(&mut self.row, saved_row);
        (result, row)
    }

    /// Evaluate in record mode at `index`
    pub(crate) fn at_record<T>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        if index >= self.records.len() {
            return Err(ExecutionError::InvalidIndex(format!(
                "record {} of {}",
                index,
                self.records.len()
            )));
        }
        let saved = self.current.replace(index);
        let result = f(self);
        self.current = saved;
        result
    }

    /// Start a nested query whose sources see `row` as the outer row
    pub(crate) fn enter_scope(&mut self, row: Record) -> Scope {
        Scope {
            row: std::mem::replace(&mut self.row, row),
            records: std::mem::take(&mut self.records),
            current: self.current.take(),
            last_window: self.last_window.take(),
            virtual_sources: self.virtual_sources.clone(),
        }
    }

    pub(crate) fn exit_scope(&mut self, scope: Scope) {
        self.row = scope.row;
        self.records = scope.records;
        self.current = scope.current;
        self.last_window = scope.last_window;
        self.virtual_sources = scope.virtual_sources;
    }
}
