// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared in-memory database provider
//!
//! [`Database`] keeps its collections behind a read/write lock. Reads run on
//! a snapshot taken under the read lock; mutations hold the write lock for
//! the whole statement.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ast::NodeRef;
use crate::exec::{ExecutionError, QueryOutput, QueryResult};
use crate::functions::FunctionRegistry;
use crate::session::{ExecOptions, PreparedQuery};
use crate::storage::{Collections, Record, Value};

/// Caller hook for stored-procedure calls
pub type ProcHandler =
    Arc<dyn Fn(&str, &[Value]) -> Result<QueryOutput, ExecutionError> + Send + Sync>;

/// Caller hook for raw query text
pub type QueryHandler =
    Arc<dyn Fn(&str, &Record) -> Result<QueryOutput, ExecutionError> + Send + Sync>;

/// A result together with the statement's affected-row count
#[derive(Debug, Clone, PartialEq)]
pub struct Counted<T> {
    pub affected: usize,
    pub result: T,
}

#[derive(Clone)]
pub struct Database {
    collections: Arc<RwLock<Collections>>,
    options: ExecOptions,
    registry: Arc<FunctionRegistry>,
    proc_handler: Option<ProcHandler>,
    query_handler: Option<QueryHandler>,
}

impl Database {
    pub fn new(collections: Collections, options: ExecOptions) -> Self {
        Self {
            collections: Arc::new(RwLock::new(collections)),
            options,
            registry: Arc::new(FunctionRegistry::default()),
            proc_handler: None,
            query_handler: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_proc_handler(mut self, handler: ProcHandler) -> Self {
        self.proc_handler = Some(handler);
        self
    }

    pub fn with_query_handler(mut self, handler: QueryHandler) -> Self {
        self.query_handler = Some(handler);
        self
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    /// Copy-on-write snapshot of every collection
    pub fn collections(&self) -> Collections {
        self.collections.read().clone()
    }

    pub fn table(&self, name: &str) -> Option<Vec<Record>> {
        self.collections.read().table(name).map(<[Record]>::to_vec)
    }

    pub fn prepare(&self, query: &NodeRef) -> Result<DatabaseStatement<'_>, ExecutionError> {
        Ok(DatabaseStatement {
            database: self,
            prepared: PreparedQuery::compile(query, self.registry.clone())?,
        })
    }

    fn execute(
        &self,
        prepared: &PreparedQuery,
        params: Record,
    ) -> Result<QueryResult, ExecutionError> {
        let options = if params.is_empty() {
            self.options.clone()
        } else {
            let mut options = self.options.clone();
            options.params.extend(params);
            options
        };

        if prepared.is_mutation() {
            let mut collections = self.collections.write();
            prepared.run(&mut collections, &options)
        } else {
            let mut snapshot = self.collections();
            prepared.run(&mut snapshot, &options)
        }
    }

    fn run_query(&self, query: &NodeRef) -> Result<QueryResult, ExecutionError> {
        let prepared = PreparedQuery::compile(query, self.registry.clone())?;
        self.execute(&prepared, Record::new())
    }

    pub fn get(&self, query: &NodeRef) -> Result<Vec<Record>, ExecutionError> {
        Ok(self.run_query(query)?.rows)
    }

    pub fn tuples(&self, query: &NodeRef) -> Result<Vec<Vec<Value>>, ExecutionError> {
        Ok(self.run_query(query)?.tuples())
    }

    pub fn count(&self, query: &NodeRef) -> Result<Counted<Vec<Record>>, ExecutionError> {
        let result = self.run_query(query)?;
        Ok(Counted {
            affected: result.affected,
            result: result.rows,
        })
    }

    pub fn count_tuples(&self, query: &NodeRef) -> Result<Counted<Vec<Vec<Value>>>, ExecutionError> {
        let result = self.run_query(query)?;
        Ok(Counted {
            affected: result.affected,
            result: result.tuples(),
        })
    }

    /// Run a statement for its side effects, returning the affected count
    pub fn run(&self, query: &NodeRef) -> Result<usize, ExecutionError> {
        Ok(self.run_query(query)?.affected)
    }

    /// Deliver the result in batches of `batch_size`
    ///
    /// `callback` receives each item with its batch index, the batch count
    /// and the whole batch; its `Some` values are collected.
    pub fn stream<T, F>(
        &self,
        query: &NodeRef,
        batch_size: usize,
        callback: F,
    ) -> Result<Vec<T>, ExecutionError>
    where
        F: FnMut(&Record, usize, usize, &[Record]) -> Option<T>,
    {
        let rows = self.get(query)?;
        stream_batches(&rows, batch_size, callback)
    }

    pub fn stream_tuples<T, F>(
        &self,
        query: &NodeRef,
        batch_size: usize,
        callback: F,
    ) -> Result<Vec<T>, ExecutionError>
    where
        F: FnMut(&Vec<Value>, usize, usize, &[Vec<Value>]) -> Option<T>,
    {
        let rows = self.tuples(query)?;
        stream_batches(&rows, batch_size, callback)
    }

    /// Run `f` against a snapshot and commit it when `f` succeeds
    ///
    /// Returning [`ExecutionError::Rollback`] from `f` discards the snapshot
    /// and yields `Ok(None)`; any other error discards it and propagates.
    pub fn transaction<T, F>(&self, f: F) -> Result<Option<T>, ExecutionError>
    where
        F: FnOnce(&Database) -> Result<T, ExecutionError>,
    {
        let transaction = Database {
            collections: Arc::new(RwLock::new(self.collections())),
            ..self.clone()
        };
        log::debug!("Transaction started");

        match f(&transaction) {
            Ok(value) => {
                let committed = transaction.collections();
                *self.collections.write() = committed;
                log::debug!("Transaction committed");
                Ok(Some(value))
            }
            Err(ExecutionError::Rollback) => {
                log::debug!("Transaction rolled back");
                Ok(None)
            }
            Err(error) => {
                log::debug!("Transaction aborted: {}", error);
                Err(error)
            }
        }
    }

    /// Forward a stored-procedure call to the caller's handler
    pub fn proc(&self, name: &str, args: &[Value]) -> Result<QueryOutput, ExecutionError> {
        match &self.proc_handler {
            Some(handler) => handler(name, args),
            None => Err(ExecutionError::MissingHandler(format!("procedure '{}'", name))),
        }
    }

    /// Forward raw query text to the caller's handler
    pub fn query(&self, text: &str, params: &Record) -> Result<QueryOutput, ExecutionError> {
        match &self.query_handler {
            Some(handler) => handler(text, params),
            None => Err(ExecutionError::MissingHandler("query".to_string())),
        }
    }
}

fn stream_batches<I, T, F>(
    items: &[I],
    batch_size: usize,
    mut callback: F,
) -> Result<Vec<T>, ExecutionError>
where
    F: FnMut(&I, usize, usize, &[I]) -> Option<T>,
{
    if batch_size == 0 {
        return Err(ExecutionError::InvalidArgument(
            "batch size must be positive".to_string(),
        ));
    }
    let batch_count = items.len().div_ceil(batch_size);
    let mut out = Vec::new();
    for (index, batch) in items.chunks(batch_size).enumerate() {
        log::trace!("Streaming batch {}/{}", index + 1, batch_count);
        out.extend(
            batch
                .iter()
                .filter_map(|item| callback(item, index, batch_count, batch)),
        );
    }
    Ok(out)
}

/// A statement prepared against one database
pub struct DatabaseStatement<'a> {
    database: &'a Database,
    prepared: PreparedQuery,
}

impl DatabaseStatement<'_> {
    pub fn is_mutation(&self) -> bool {
        self.prepared.is_mutation()
    }

    pub fn get(&self, params: Record) -> Result<Vec<Record>, ExecutionError> {
        Ok(self.database.execute(&self.prepared, params)?.rows)
    }

    pub fn tuples(&self, params: Record) -> Result<Vec<Vec<Value>>, ExecutionError> {
        Ok(self.database.execute(&self.prepared, params)?.tuples())
    }

    pub fn run(&self, params: Record) -> Result<usize, ExecutionError> {
        Ok(self.database.execute(&self.prepared, params)?.affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_batches_reports_positions() {
        let items = vec![1, 2, 3, 4, 5];
        let seen = stream_batches(&items, 2, |item, index, count, batch| {
            Some((*item, index, count, batch.len()))
        })
        .unwrap();
        assert_eq!(seen[0], (1, 0, 3, 2));
        assert_eq!(seen[4], (5, 2, 3, 1));
    }

    #[test]
    fn test_stream_batches_collects_only_some() {
        let items = vec![1, 2, 3, 4];
        let even = stream_batches(&items, 3, |item, _, _, _| (item % 2 == 0).then_some(*item))
            .unwrap();
        assert_eq!(even, vec![2, 4]);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let items: Vec<i32> = Vec::new();
        let result = stream_batches(&items, 0, |_, _, _, _| Some(()));
        assert!(matches!(result, Err(ExecutionError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_handlers() {
        let database = Database::new(Collections::new(), ExecOptions::default());
        assert!(matches!(
            database.proc("p", &[]),
            Err(ExecutionError::MissingHandler(_))
        ));
        let database = database.with_query_handler(Arc::new(|_: &str, _: &Record| {
            Ok(QueryOutput::Records(Vec::new()))
        }));
        assert!(database.query("select 1", &Record::new()).is_ok());
    }
}
