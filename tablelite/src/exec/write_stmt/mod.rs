// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Data-modification statements: INSERT, UPDATE, DELETE
//!
//! Every executor works on a private copy of the target collection and
//! commits it to the context only after the statement, including its
//! RETURNING list, has succeeded.

pub mod delete;
pub mod insert;
pub mod update;

pub use delete::DeleteExecutor;
pub use insert::InsertExecutor;
pub use update::UpdateExecutor;

use crate::ast::{ColumnDef, NodeKind, NodeRef, SelectItem, SourceKind};
use crate::coercion::coerce;
use crate::compare::values_equal;
use crate::exec::compiler::Compiler;
use crate::exec::context::{ExecutionContext, ResultRecord};
use crate::exec::result::QueryResult;
use crate::exec::select::{collect_result, compile_columns, project, SelectColumn};
use crate::exec::source::bind;
use crate::exec::ExecutionError;
use crate::storage::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Insert,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }
}

pub trait StatementExecutor {
    fn operation_type(&self) -> OperationType;

    fn operation_description(&self) -> String;
}

/// Outcome of one modification pass
#[derive(Debug, Default)]
pub struct Modification {
    pub affected: usize,
    /// Post-image of inserted/updated rows, or the removed rows
    pub touched: Vec<Record>,
}

pub trait DataStatementExecutor: StatementExecutor {
    fn target(&self) -> &TargetTable;

    fn returning(&self) -> &Returning;

    /// Apply the statement to `rows`, the private copy of the target collection
    fn execute_modification(
        &self,
        rows: &mut Vec<Record>,
        ctx: &mut ExecutionContext,
    ) -> Result<Modification, ExecutionError>;

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<QueryResult, ExecutionError> {
        let target = self.target();
        log::debug!("{}", self.operation_description());

        let mut rows = ctx.target_rows(&target.name)?;
        let modification = self.execute_modification(&mut rows, ctx)?;
        let mut result = self.returning().evaluate(ctx, target, modification.touched)?;

        ctx.commit_table(&target.name, rows);
        ctx.affected += modification.affected;
        result.affected = modification.affected;
        log::debug!(
            "{} on '{}' affected {} rows",
            self.operation_type().as_str(),
            target.name,
            modification.affected
        );
        Ok(result)
    }
}

/// Target collection of a modification statement
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub name: String,
    pub alias: String,
    pub columns: Vec<ColumnDef>,
}

impl TargetTable {
    pub fn compile(node: &NodeRef) -> Result<Self, ExecutionError> {
        match node.kind() {
            NodeKind::Source(source) if matches!(source.kind, SourceKind::Table) => Ok(Self {
                name: source.name.clone(),
                alias: source.binding().to_string(),
                columns: source.columns.clone(),
            }),
            _ => Err(ExecutionError::UnsupportedNode(format!(
                "{} cannot be the target of a modification",
                node.kind_tag()
            ))),
        }
    }

    pub fn binding(&self, ctx: &ExecutionContext) -> &str {
        if ctx.use_names {
            &self.name
        } else {
            &self.alias
        }
    }

    fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Field name a logical column is stored under
    pub fn storage_key(&self, column: &str) -> String {
        self.column(column)
            .map_or(column, ColumnDef::stored_as)
            .to_string()
    }

    pub fn coerce_value(&self, column: &str, value: Value) -> Value {
        coerce(
            value,
            self.column(column).and_then(|column| column.data_type.as_ref()),
        )
    }

    /// Write a logical column into a stored row
    pub fn assign(&self, row: &mut Record, column: &str, value: Value) {
        let value = self.coerce_value(column, value);
        row.insert(self.storage_key(column), value);
    }

    /// Declared columns missing from a stored row become null
    pub fn complete(&self, row: &mut Record) {
        for column in &self.columns {
            if !row.contains_key(column.stored_as()) {
                row.insert(column.stored_as().to_string(), Value::Null);
            }
        }
    }

    /// A stored row as expressions see it
    pub fn view(&self, row: &Record, ctx: &ExecutionContext) -> Record {
        if ctx.use_names {
            return row.clone();
        }
        row.iter()
            .map(|(key, value)| {
                let logical = self
                    .columns
                    .iter()
                    .find(|column| column.stored_as() == key)
                    .map_or(key, |column| &column.name);
                (logical.clone(), value.clone())
            })
            .collect()
    }

    /// Evaluation row with the stored row bound under the target binding
    pub fn bound_row(&self, base: &Record, row: &Record, ctx: &ExecutionContext) -> Record {
        let mut bound = base.clone();
        bind(&mut bound, self.binding(ctx), self.view(row, ctx));
        bound
    }

    fn primary_key(&self) -> Vec<&ColumnDef> {
        self.columns.iter().filter(|column| column.primary_key).collect()
    }

    /// Index of the stored row sharing `candidate`'s primary key
    pub fn find_by_key(
        &self,
        rows: &[Record],
        candidate: &Record,
        ignore_case: bool,
    ) -> Option<usize> {
        let key = self.primary_key();
        if key.is_empty() {
            return None;
        }
        let wanted: Vec<&Value> = key
            .iter()
            .map(|column| candidate.get(column.stored_as()).unwrap_or(&Value::Null))
            .collect();
        if wanted.iter().any(|value| value.is_null()) {
            return None;
        }
        rows.iter().position(|row| {
            key.iter().zip(wanted.iter()).all(|(column, value)| {
                row.get(column.stored_as())
                    .is_some_and(|stored| values_equal(stored, value, ignore_case))
            })
        })
    }

    /// Printable primary key of a stored row
    pub fn describe_key(&self, row: &Record) -> String {
        self.primary_key()
            .iter()
            .map(|column| {
                format!(
                    "{}={}",
                    column.name,
                    row.get(column.stored_as()).unwrap_or(&Value::Null)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// RETURNING list, evaluated over the touched rows only
#[derive(Debug, Default)]
pub struct Returning {
    columns: Vec<SelectColumn>,
}

impl Returning {
    pub fn compile(compiler: &mut Compiler, items: &[SelectItem]) -> Result<Self, ExecutionError> {
        if items.is_empty() {
            return Ok(Self::default());
        }
        compiler.push_scope();
        let columns = compile_columns(compiler, items);
        let scope = compiler.pop_scope();
        if !scope.windows.is_empty() || scope.has_aggregate {
            return Err(ExecutionError::UnsupportedNode(
                "aggregate or window function in RETURNING".to_string(),
            ));
        }
        Ok(Self { columns: columns? })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn evaluate(
        &self,
        ctx: &mut ExecutionContext,
        target: &TargetTable,
        touched: Vec<Record>,
    ) -> Result<QueryResult, ExecutionError> {
        if self.is_empty() {
            return Ok(QueryResult::default());
        }
        let base = ctx.current_row().clone();
        let records: Vec<ResultRecord> = touched
            .iter()
            .map(|row| ResultRecord::singleton(target.bound_row(&base, row, ctx)))
            .collect();

        let scope = ctx.enter_scope(base);
        ctx.records = records;
        let projected = project(ctx, &self.columns);
        let records = std::mem::take(&mut ctx.records);
        ctx.exit_scope(scope);
        projected?;
        Ok(collect_result(records, &self.columns))
    }
}
