// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! # TableLite
//!
//! An in-memory relational query engine. TableLite interprets a strongly
//! typed query tree against plain collections of records and produces
//! result rows, tuples or mutation side effects.
//!
//! Supported relational features:
//! - multi-way inner, left, right, full and cross joins
//! - grouping, GROUPING SETS, ROLLUP and CUBE
//! - ordering with explicit null placement
//! - window functions with ROWS, RANGE and GROUPS frames
//! - recursive WITH sources evaluated to a fixpoint
//! - UNION, INTERSECT and EXCEPT with or without ALL
//! - INSERT (with conflict policies), UPDATE and DELETE with RETURNING
//!
//! ## Example
//!
//! ```ignore
//! use tablelite::ast::{Node, Query, Source};
//! use tablelite::{exec, Collections, ExecOptions};
//!
//! let mut collections = Collections::from_json(json!({"todo": [...]}))?;
//! let query = Query::new()
//!     .from(Source::table("todo").build())
//!     .select_as("title", Node::column("todo", "title"))
//!     .build();
//! let output = exec(&mut collections, &ExecOptions::default(), &query)?;
//! ```

pub mod ast;
pub mod coercion;
pub mod compare;
pub mod exec;
pub mod functions;
pub mod session;
pub mod storage;

pub use ast::{Node, NodeRef};
pub use exec::{ExecutionError, QueryOutput, QueryResult};
pub use functions::FunctionRegistry;
pub use session::{exec, prepare, Database, ExecOptions, PreparedQuery};
pub use storage::{Collections, Record, Value};
