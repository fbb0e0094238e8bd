// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression and query nodes
//!
//! Every node receives a process-unique [`NodeId`] when it is constructed.
//! The compiler and the per-record value cache are keyed by that id, so the
//! same `Arc<Node>` shared in two places of a tree (an alias reused in ORDER
//! BY, a grouping key repeated in the select list) compiles and caches once.

use super::data_type::DataType;
use super::statement::{Delete, Insert, Query, SetOperation, Source};
use crate::storage::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to an immutable node
pub type NodeRef = Arc<Node>;

/// Stable identity of a node, assigned at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
}

/// Reference to a field of a bound source
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Source alias; `None` searches every bound source
    pub source: Option<String>,
    /// Storage name of the source, used when resolving by names
    pub table: Option<String>,
    /// Logical field name
    pub name: String,
    /// Storage column name, used when resolving by names
    pub column: Option<String>,
}

impl FieldRef {
    pub fn new(source: Option<&str>, name: &str) -> Self {
        Self {
            source: source.map(str::to_string),
            table: None,
            name: name.to_string(),
            column: None,
        }
    }

    /// Qualified path shared by every reference to the same field
    pub fn path(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source.as_deref().unwrap_or(""),
            self.table.as_deref().unwrap_or(""),
            self.name,
            self.column.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    ILike,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StringAgg,
    ArrayAgg,
    BoolAnd,
    BoolOr,
    BitOr,
    BitAnd,
    StdDev,
    StdDevPop,
    Variance,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::StringAgg => "string_agg",
            AggregateFunction::ArrayAgg => "array_agg",
            AggregateFunction::BoolAnd => "bool_and",
            AggregateFunction::BoolOr => "bool_or",
            AggregateFunction::BitOr => "bit_or",
            AggregateFunction::BitAnd => "bit_and",
            AggregateFunction::StdDev => "stddev",
            AggregateFunction::StdDevPop => "stddev_pop",
            AggregateFunction::Variance => "variance",
        }
    }
}

/// One ORDER BY key
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: NodeRef,
    pub descending: bool,
    pub nulls_last: bool,
}

impl OrderItem {
    pub fn asc(expr: NodeRef) -> Self {
        Self {
            expr,
            descending: false,
            nulls_last: false,
        }
    }

    pub fn desc(expr: NodeRef) -> Self {
        Self {
            expr,
            descending: true,
            nulls_last: false,
        }
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls_last = true;
        self
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls_last = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(usize),
    CurrentRow,
    Following(usize),
    UnboundedFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub mode: FrameMode,
    pub start: FrameBound,
    pub end: FrameBound,
}

impl WindowFrame {
    pub fn rows(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Rows,
            start,
            end,
        }
    }

    pub fn range(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Range,
            start,
            end,
        }
    }

    pub fn groups(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Groups,
            start,
            end,
        }
    }
}

/// OVER (...) clause
#[derive(Debug, Clone, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<NodeRef>,
    pub order_by: Vec<OrderItem>,
    pub frame: Option<WindowFrame>,
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, expr: NodeRef) -> Self {
        self.partition_by.push(expr);
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn frame(mut self, frame: WindowFrame) -> Self {
        self.frame = Some(frame);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub args: Vec<NodeRef>,
    pub distinct: bool,
    pub filter: Option<NodeRef>,
    pub order_by: Vec<OrderItem>,
    pub window: Option<WindowSpec>,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, args: Vec<NodeRef>) -> Self {
        Self {
            function,
            args,
            distinct: false,
            filter: None,
            order_by: Vec::new(),
            window: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn filter(mut self, predicate: NodeRef) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn over(mut self, window: WindowSpec) -> Self {
        self.window = Some(window);
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Aggregate(self))
    }
}

#[derive(Debug, Clone)]
pub enum WindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    PercentRank,
    CumeDist,
    Ntile(NodeRef),
    Lag {
        expr: NodeRef,
        offset: Option<NodeRef>,
        default: Option<NodeRef>,
    },
    Lead {
        expr: NodeRef,
        offset: Option<NodeRef>,
        default: Option<NodeRef>,
    },
    FirstValue(NodeRef),
    LastValue(NodeRef),
    NthValue(NodeRef, NodeRef),
}

impl WindowFunction {
    pub fn name(&self) -> &'static str {
        match self {
            WindowFunction::RowNumber => "row_number",
            WindowFunction::Rank => "rank",
            WindowFunction::DenseRank => "dense_rank",
            WindowFunction::PercentRank => "percent_rank",
            WindowFunction::CumeDist => "cume_dist",
            WindowFunction::Ntile(_) => "ntile",
            WindowFunction::Lag { .. } => "lag",
            WindowFunction::Lead { .. } => "lead",
            WindowFunction::FirstValue(_) => "first_value",
            WindowFunction::LastValue(_) => "last_value",
            WindowFunction::NthValue(_, _) => "nth_value",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowCall {
    pub function: WindowFunction,
    pub window: WindowSpec,
}

#[derive(Debug, Clone)]
pub struct CaseExpr {
    pub operand: Option<NodeRef>,
    pub branches: Vec<(NodeRef, NodeRef)>,
    pub otherwise: Option<NodeRef>,
}

#[derive(Debug, Clone)]
pub enum InList {
    Values(Vec<NodeRef>),
    Query(NodeRef),
}

#[derive(Debug)]
pub enum NodeKind {
    Field(FieldRef),
    Constant(Value),
    Parameter(String),
    Wildcard(Option<String>),
    Function {
        name: String,
        args: Vec<NodeRef>,
    },
    Aggregate(Aggregate),
    Window(WindowCall),
    Grouping(Vec<NodeRef>),
    Case(CaseExpr),
    Cast {
        expr: NodeRef,
        data_type: DataType,
    },
    Between {
        expr: NodeRef,
        low: NodeRef,
        high: NodeRef,
        negated: bool,
    },
    In {
        expr: NodeRef,
        list: InList,
        negated: bool,
    },
    Exists {
        query: NodeRef,
        negated: bool,
    },
    Row(Vec<NodeRef>),
    Binary {
        op: BinaryOperator,
        left: NodeRef,
        right: NodeRef,
    },
    Unary {
        op: UnaryOperator,
        expr: NodeRef,
    },
    Source(Source),
    Query(Query),
    SetOperation(SetOperation),
    Insert(Insert),
    Update(super::statement::Update),
    Delete(Delete),
}

impl Node {
    pub fn new(kind: NodeKind) -> NodeRef {
        Arc::new(Node {
            id: NodeId::next(),
            kind,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Name of the node kind, used in diagnostics
    pub fn kind_tag(&self) -> &'static str {
        match &self.kind {
            NodeKind::Field(_) => "field",
            NodeKind::Constant(_) => "constant",
            NodeKind::Parameter(_) => "parameter",
            NodeKind::Wildcard(_) => "wildcard",
            NodeKind::Function { .. } => "function",
            NodeKind::Aggregate(_) => "aggregate",
            NodeKind::Window(_) => "window",
            NodeKind::Grouping(_) => "grouping",
            NodeKind::Case(_) => "case",
            NodeKind::Cast { .. } => "cast",
            NodeKind::Between { .. } => "between",
            NodeKind::In { .. } => "in",
            NodeKind::Exists { .. } => "exists",
            NodeKind::Row(_) => "row",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Source(_) => "source",
            NodeKind::Query(_) => "query",
            NodeKind::SetOperation(_) => "set_operation",
            NodeKind::Insert(_) => "insert",
            NodeKind::Update(_) => "update",
            NodeKind::Delete(_) => "delete",
        }
    }

    /// Direct child nodes, in evaluation order
    pub fn children(&self) -> Vec<&NodeRef> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Field(_)
            | NodeKind::Constant(_)
            | NodeKind::Parameter(_)
            | NodeKind::Wildcard(_) => {}
            NodeKind::Function { args, .. } => out.extend(args.iter()),
            NodeKind::Aggregate(agg) => {
                out.extend(agg.args.iter());
                out.extend(agg.filter.iter());
                out.extend(agg.order_by.iter().map(|item| &item.expr));
                if let Some(window) = &agg.window {
                    push_window(&mut out, window);
                }
            }
            NodeKind::Window(call) => {
                match &call.function {
                    WindowFunction::Ntile(n) => out.push(n),
                    WindowFunction::Lag {
                        expr,
                        offset,
                        default,
                    }
                    | WindowFunction::Lead {
                        expr,
                        offset,
                        default,
                    } => {
                        out.push(expr);
                        out.extend(offset.iter());
                        out.extend(default.iter());
                    }
                    WindowFunction::FirstValue(expr) | WindowFunction::LastValue(expr) => {
                        out.push(expr)
                    }
                    WindowFunction::NthValue(expr, n) => {
                        out.push(expr);
                        out.push(n);
                    }
                    _ => {}
                }
                push_window(&mut out, &call.window);
            }
            NodeKind::Grouping(keys) | NodeKind::Row(keys) => out.extend(keys.iter()),
            NodeKind::Case(case) => {
                out.extend(case.operand.iter());
                for (when, then) in &case.branches {
                    out.push(when);
                    out.push(then);
                }
                out.extend(case.otherwise.iter());
            }
            NodeKind::Cast { expr, .. } | NodeKind::Unary { expr, .. } => out.push(expr),
            NodeKind::Between {
                expr, low, high, ..
            } => {
                out.push(expr);
                out.push(low);
                out.push(high);
            }
            NodeKind::In { expr, list, .. } => {
                out.push(expr);
                match list {
                    InList::Values(values) => out.extend(values.iter()),
                    InList::Query(query) => out.push(query),
                }
            }
            NodeKind::Exists { query, .. } => out.push(query),
            NodeKind::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            NodeKind::Source(source) => source.push_children(&mut out),
            NodeKind::Query(query) => query.push_children(&mut out),
            NodeKind::SetOperation(op) => op.push_children(&mut out),
            NodeKind::Insert(insert) => insert.push_children(&mut out),
            NodeKind::Update(update) => update.push_children(&mut out),
            NodeKind::Delete(delete) => delete.push_children(&mut out),
        }
        out
    }

    // Expression constructors

    pub fn field(name: &str) -> NodeRef {
        Node::new(NodeKind::Field(FieldRef::new(None, name)))
    }

    pub fn column(source: &str, name: &str) -> NodeRef {
        Node::new(NodeKind::Field(FieldRef::new(Some(source), name)))
    }

    pub fn field_ref(field: FieldRef) -> NodeRef {
        Node::new(NodeKind::Field(field))
    }

    pub fn constant(value: impl Into<Value>) -> NodeRef {
        Node::new(NodeKind::Constant(value.into()))
    }

    pub fn null() -> NodeRef {
        Node::new(NodeKind::Constant(Value::Null))
    }

    pub fn param(name: &str) -> NodeRef {
        Node::new(NodeKind::Parameter(name.to_string()))
    }

    pub fn wildcard(source: Option<&str>) -> NodeRef {
        Node::new(NodeKind::Wildcard(source.map(str::to_string)))
    }

    pub fn call(name: &str, args: Vec<NodeRef>) -> NodeRef {
        Node::new(NodeKind::Function {
            name: name.to_string(),
            args,
        })
    }

    pub fn aggregate(function: AggregateFunction, args: Vec<NodeRef>) -> NodeRef {
        Aggregate::new(function, args).build()
    }

    pub fn count_all() -> NodeRef {
        Aggregate::new(AggregateFunction::Count, Vec::new()).build()
    }

    pub fn window(function: WindowFunction, window: WindowSpec) -> NodeRef {
        Node::new(NodeKind::Window(WindowCall { function, window }))
    }

    pub fn grouping(keys: Vec<NodeRef>) -> NodeRef {
        Node::new(NodeKind::Grouping(keys))
    }

    pub fn case(
        operand: Option<NodeRef>,
        branches: Vec<(NodeRef, NodeRef)>,
        otherwise: Option<NodeRef>,
    ) -> NodeRef {
        Node::new(NodeKind::Case(CaseExpr {
            operand,
            branches,
            otherwise,
        }))
    }

    pub fn cast(expr: NodeRef, data_type: DataType) -> NodeRef {
        Node::new(NodeKind::Cast { expr, data_type })
    }

    pub fn between(expr: NodeRef, low: NodeRef, high: NodeRef, negated: bool) -> NodeRef {
        Node::new(NodeKind::Between {
            expr,
            low,
            high,
            negated,
        })
    }

    pub fn in_list(expr: NodeRef, values: Vec<NodeRef>, negated: bool) -> NodeRef {
        Node::new(NodeKind::In {
            expr,
            list: InList::Values(values),
            negated,
        })
    }

    pub fn in_query(expr: NodeRef, query: NodeRef, negated: bool) -> NodeRef {
        Node::new(NodeKind::In {
            expr,
            list: InList::Query(query),
            negated,
        })
    }

    pub fn exists(query: NodeRef, negated: bool) -> NodeRef {
        Node::new(NodeKind::Exists { query, negated })
    }

    pub fn row(items: Vec<NodeRef>) -> NodeRef {
        Node::new(NodeKind::Row(items))
    }

    pub fn binary(op: BinaryOperator, left: NodeRef, right: NodeRef) -> NodeRef {
        Node::new(NodeKind::Binary { op, left, right })
    }

    pub fn unary(op: UnaryOperator, expr: NodeRef) -> NodeRef {
        Node::new(NodeKind::Unary { op, expr })
    }

    pub fn eq(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Eq, left, right)
    }

    pub fn not_eq(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::NotEq, left, right)
    }

    pub fn lt(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Lt, left, right)
    }

    pub fn gt(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Gt, left, right)
    }

    pub fn gt_eq(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::GtEq, left, right)
    }

    pub fn lt_eq(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::LtEq, left, right)
    }

    pub fn and(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Or, left, right)
    }

    pub fn add(left: NodeRef, right: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Add, left, right)
    }

    pub fn like(left: NodeRef, pattern: NodeRef) -> NodeRef {
        Node::binary(BinaryOperator::Like, left, pattern)
    }

    pub fn not(expr: NodeRef) -> NodeRef {
        Node::unary(UnaryOperator::Not, expr)
    }

    pub fn is_null(expr: NodeRef) -> NodeRef {
        Node::unary(UnaryOperator::IsNull, expr)
    }

    pub fn is_not_null(expr: NodeRef) -> NodeRef {
        Node::unary(UnaryOperator::IsNotNull, expr)
    }
}

fn push_window<'a>(out: &mut Vec<&'a NodeRef>, window: &'a WindowSpec) {
    out.extend(window.partition_by.iter());
    out.extend(window.order_by.iter().map(|item| &item.expr));
}
