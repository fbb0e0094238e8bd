// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! AST subsystem: the node contract consumed by the engine
//!
//! Trees are built by the caller (normally a query builder) and handed to
//! the engine as `Arc<Node>`. The constructors here are deliberately plain.

pub mod data_type;
pub mod node;
pub mod statement;

pub use data_type::DataType;
pub use node::{
    Aggregate, AggregateFunction, BinaryOperator, CaseExpr, FieldRef, FrameBound, FrameMode,
    InList, Node, NodeId, NodeKind, NodeRef, OrderItem, UnaryOperator, WindowCall, WindowFrame,
    WindowFunction, WindowSpec,
};
pub use statement::{
    Assignment, ColumnDef, Delete, GroupingDeclaration, Insert, InsertRows, JoinKind, OnConflict,
    Query, SelectItem, SetClause, SetOperation, SetOperationItem, SetOperator, Source,
    SourceClause, SourceKind, SourceRole, Update,
};
