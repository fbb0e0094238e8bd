// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sources, queries and data-modification statements

use super::data_type::DataType;
use super::node::{Node, NodeKind, NodeRef, OrderItem};
use crate::storage::Record;

/// Declared column of a source
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Name of the field in the stored records, when it differs from `name`
    pub storage_name: Option<String>,
    pub data_type: Option<DataType>,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            storage_name: None,
            data_type: None,
            primary_key: false,
        }
    }

    pub fn typed(name: &str, data_type: DataType) -> Self {
        Self::new(name).data_type(data_type)
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn storage_name(mut self, storage_name: &str) -> Self {
        self.storage_name = Some(storage_name.to_string());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn stored_as(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub enum SourceKind {
    /// A caller collection or a WITH source, looked up by name
    Table,
    /// Literal rows
    Values(Vec<Record>),
    /// Derived table or non-recursive WITH body
    Query(NodeRef),
    /// Recursive WITH body
    Recursive {
        seed: NodeRef,
        recursive: NodeRef,
        all: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub alias: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub kind: SourceKind,
}

impl Source {
    pub fn table(name: &str) -> Self {
        Self::with_kind(name, SourceKind::Table)
    }

    pub fn values(name: &str, rows: Vec<Record>) -> Self {
        Self::with_kind(name, SourceKind::Values(rows))
    }

    pub fn query(name: &str, query: NodeRef) -> Self {
        Self::with_kind(name, SourceKind::Query(query))
    }

    pub fn recursive(name: &str, seed: NodeRef, recursive: NodeRef, all: bool) -> Self {
        Self::with_kind(
            name,
            SourceKind::Recursive {
                seed,
                recursive,
                all,
            },
        )
    }

    fn with_kind(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            columns: Vec::new(),
            kind,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Alias the source is bound under in each joined row
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Source(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        match &self.kind {
            SourceKind::Table | SourceKind::Values(_) => {}
            SourceKind::Query(query) => out.push(query),
            SourceKind::Recursive {
                seed, recursive, ..
            } => {
                out.push(seed);
                out.push(recursive);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Full,
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub enum SourceRole {
    With,
    From,
    Only,
    Join {
        kind: JoinKind,
        on: Option<NodeRef>,
    },
    Using,
    Target,
}

impl SourceRole {
    /// Processing rank; sources resolve in this order regardless of declaration
    pub fn rank(&self) -> u8 {
        match self {
            SourceRole::With => 0,
            SourceRole::From | SourceRole::Only => 1,
            SourceRole::Join { .. } => 2,
            SourceRole::Using => 3,
            SourceRole::Target => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceClause {
    pub role: SourceRole,
    pub source: NodeRef,
}

#[derive(Debug, Clone)]
pub struct SelectItem {
    pub alias: Option<String>,
    pub expr: NodeRef,
}

#[derive(Debug, Clone)]
pub enum GroupingDeclaration {
    By(Vec<NodeRef>),
    GroupingSets(Vec<Vec<NodeRef>>),
    Rollup(Vec<NodeRef>),
    Cube(Vec<NodeRef>),
}

/// SELECT query
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub sources: Vec<SourceClause>,
    pub selects: Vec<SelectItem>,
    pub filters: Vec<NodeRef>,
    pub groupings: Vec<GroupingDeclaration>,
    pub having: Vec<NodeRef>,
    pub order_by: Vec<OrderItem>,
    pub distinct: bool,
    pub limit: Option<NodeRef>,
    pub offset: Option<NodeRef>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, role: SourceRole, source: NodeRef) -> Self {
        self.sources.push(SourceClause { role, source });
        self
    }

    pub fn with(self, source: NodeRef) -> Self {
        self.source(SourceRole::With, source)
    }

    pub fn from(self, source: NodeRef) -> Self {
        self.source(SourceRole::From, source)
    }

    pub fn join(self, kind: JoinKind, source: NodeRef, on: Option<NodeRef>) -> Self {
        self.source(SourceRole::Join { kind, on }, source)
    }

    pub fn select(mut self, expr: NodeRef) -> Self {
        self.selects.push(SelectItem { alias: None, expr });
        self
    }

    pub fn select_as(mut self, alias: &str, expr: NodeRef) -> Self {
        self.selects.push(SelectItem {
            alias: Some(alias.to_string()),
            expr,
        });
        self
    }

    pub fn filter(mut self, predicate: NodeRef) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn group_by(mut self, keys: Vec<NodeRef>) -> Self {
        self.groupings.push(GroupingDeclaration::By(keys));
        self
    }

    pub fn grouping_sets(mut self, sets: Vec<Vec<NodeRef>>) -> Self {
        self.groupings.push(GroupingDeclaration::GroupingSets(sets));
        self
    }

    pub fn rollup(mut self, keys: Vec<NodeRef>) -> Self {
        self.groupings.push(GroupingDeclaration::Rollup(keys));
        self
    }

    pub fn cube(mut self, keys: Vec<NodeRef>) -> Self {
        self.groupings.push(GroupingDeclaration::Cube(keys));
        self
    }

    pub fn having(mut self, predicate: NodeRef) -> Self {
        self.having.push(predicate);
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: NodeRef) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: NodeRef) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Query(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        push_sources(out, &self.sources);
        out.extend(self.selects.iter().map(|item| &item.expr));
        out.extend(self.filters.iter());
        for declaration in &self.groupings {
            match declaration {
                GroupingDeclaration::By(keys)
                | GroupingDeclaration::Rollup(keys)
                | GroupingDeclaration::Cube(keys) => out.extend(keys.iter()),
                GroupingDeclaration::GroupingSets(sets) => {
                    out.extend(sets.iter().flatten());
                }
            }
        }
        out.extend(self.having.iter());
        out.extend(self.order_by.iter().map(|item| &item.expr));
        out.extend(self.limit.iter());
        out.extend(self.offset.iter());
    }
}

fn push_sources<'a>(out: &mut Vec<&'a NodeRef>, sources: &'a [SourceClause]) {
    for clause in sources {
        if let SourceRole::Join { on: Some(on), .. } = &clause.role {
            out.push(on);
        }
        out.push(&clause.source);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone)]
pub struct SetOperationItem {
    pub operator: SetOperator,
    pub all: bool,
    pub query: NodeRef,
}

#[derive(Debug, Clone)]
pub struct SetOperation {
    pub left: NodeRef,
    pub operations: Vec<SetOperationItem>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<NodeRef>,
    pub offset: Option<NodeRef>,
}

impl SetOperation {
    pub fn new(left: NodeRef) -> Self {
        Self {
            left,
            operations: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn operation(mut self, operator: SetOperator, all: bool, query: NodeRef) -> Self {
        self.operations.push(SetOperationItem {
            operator,
            all,
            query,
        });
        self
    }

    pub fn union(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Union, false, query)
    }

    pub fn union_all(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Union, true, query)
    }

    pub fn intersect(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Intersect, false, query)
    }

    pub fn intersect_all(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Intersect, true, query)
    }

    pub fn except(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Except, false, query)
    }

    pub fn except_all(self, query: NodeRef) -> Self {
        self.operation(SetOperator::Except, true, query)
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn limit(mut self, limit: NodeRef) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: NodeRef) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::SetOperation(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        out.push(&self.left);
        out.extend(self.operations.iter().map(|item| &item.query));
        out.extend(self.order_by.iter().map(|item| &item.expr));
        out.extend(self.limit.iter());
        out.extend(self.offset.iter());
    }
}

/// `column = value`
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: NodeRef,
}

impl Assignment {
    pub fn new(column: &str, value: NodeRef) -> Self {
        Self {
            column: column.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SetClause {
    Column(Assignment),
    /// `(a, b) = (SELECT x, y ...)`
    Row {
        columns: Vec<String>,
        query: NodeRef,
    },
}

#[derive(Debug, Clone)]
pub enum InsertRows {
    Values(Vec<Vec<Assignment>>),
    Query(NodeRef),
}

#[derive(Debug, Clone)]
pub enum OnConflict {
    Ignore,
    /// On-duplicate update; the candidate row is bound under `excluded`
    Update {
        set: Vec<Assignment>,
        filter: Option<NodeRef>,
    },
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub target: NodeRef,
    pub sources: Vec<SourceClause>,
    pub rows: InsertRows,
    pub conflict: Option<OnConflict>,
    pub returning: Vec<SelectItem>,
}

impl Insert {
    pub fn new(target: NodeRef) -> Self {
        Self {
            target,
            sources: Vec::new(),
            rows: InsertRows::Values(Vec::new()),
            conflict: None,
            returning: Vec::new(),
        }
    }

    pub fn with(mut self, source: NodeRef) -> Self {
        self.sources.push(SourceClause {
            role: SourceRole::With,
            source,
        });
        self
    }

    /// Append one literal row
    pub fn values(mut self, row: Vec<Assignment>) -> Self {
        match &mut self.rows {
            InsertRows::Values(rows) => rows.push(row),
            InsertRows::Query(_) => self.rows = InsertRows::Values(vec![row]),
        }
        self
    }

    pub fn select(mut self, query: NodeRef) -> Self {
        self.rows = InsertRows::Query(query);
        self
    }

    pub fn on_conflict_ignore(mut self) -> Self {
        self.conflict = Some(OnConflict::Ignore);
        self
    }

    pub fn on_conflict_update(mut self, set: Vec<Assignment>, filter: Option<NodeRef>) -> Self {
        self.conflict = Some(OnConflict::Update { set, filter });
        self
    }

    pub fn returning(mut self, alias: Option<&str>, expr: NodeRef) -> Self {
        self.returning.push(SelectItem {
            alias: alias.map(str::to_string),
            expr,
        });
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Insert(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        out.push(&self.target);
        push_sources(out, &self.sources);
        match &self.rows {
            InsertRows::Values(rows) => {
                out.extend(rows.iter().flatten().map(|assignment| &assignment.value));
            }
            InsertRows::Query(query) => out.push(query),
        }
        if let Some(OnConflict::Update { set, filter }) = &self.conflict {
            out.extend(set.iter().map(|assignment| &assignment.value));
            out.extend(filter.iter());
        }
        out.extend(self.returning.iter().map(|item| &item.expr));
    }
}

#[derive(Debug, Clone)]
pub struct Update {
    pub target: NodeRef,
    pub sources: Vec<SourceClause>,
    pub set: Vec<SetClause>,
    pub filters: Vec<NodeRef>,
    pub returning: Vec<SelectItem>,
}

impl Update {
    pub fn new(target: NodeRef) -> Self {
        Self {
            target,
            sources: Vec::new(),
            set: Vec::new(),
            filters: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn source(mut self, role: SourceRole, source: NodeRef) -> Self {
        self.sources.push(SourceClause { role, source });
        self
    }

    pub fn set(mut self, column: &str, value: NodeRef) -> Self {
        self.set.push(SetClause::Column(Assignment::new(column, value)));
        self
    }

    pub fn set_row(mut self, columns: &[&str], query: NodeRef) -> Self {
        self.set.push(SetClause::Row {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            query,
        });
        self
    }

    pub fn filter(mut self, predicate: NodeRef) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn returning(mut self, alias: Option<&str>, expr: NodeRef) -> Self {
        self.returning.push(SelectItem {
            alias: alias.map(str::to_string),
            expr,
        });
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Update(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        out.push(&self.target);
        push_sources(out, &self.sources);
        for clause in &self.set {
            match clause {
                SetClause::Column(assignment) => out.push(&assignment.value),
                SetClause::Row { query, .. } => out.push(query),
            }
        }
        out.extend(self.filters.iter());
        out.extend(self.returning.iter().map(|item| &item.expr));
    }
}

#[derive(Debug, Clone)]
pub struct Delete {
    pub target: NodeRef,
    pub sources: Vec<SourceClause>,
    pub filters: Vec<NodeRef>,
    pub returning: Vec<SelectItem>,
}

impl Delete {
    pub fn new(target: NodeRef) -> Self {
        Self {
            target,
            sources: Vec::new(),
            filters: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn source(mut self, role: SourceRole, source: NodeRef) -> Self {
        self.sources.push(SourceClause { role, source });
        self
    }

    pub fn filter(mut self, predicate: NodeRef) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn returning(mut self, alias: Option<&str>, expr: NodeRef) -> Self {
        self.returning.push(SelectItem {
            alias: alias.map(str::to_string),
            expr,
        });
        self
    }

    pub fn build(self) -> NodeRef {
        Node::new(NodeKind::Delete(self))
    }

    pub(crate) fn push_children<'a>(&'a self, out: &mut Vec<&'a NodeRef>) {
        out.push(&self.target);
        push_sources(out, &self.sources);
        out.extend(self.filters.iter());
        out.extend(self.returning.iter().map(|item| &item.expr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_children_cover_every_clause() {
        let source = Source::table("todo").build();
        let predicate = Node::eq(Node::field("done"), Node::constant(true));
        let query = Query::new()
            .from(source)
            .select(Node::field("name"))
            .filter(predicate)
            .order_by(OrderItem::asc(Node::field("name")))
            .build();
        assert_eq!(query.children().len(), 4);
        assert_eq!(query.kind_tag(), "query");
    }

    #[test]
    fn test_role_rank_orders_with_first() {
        assert!(SourceRole::With.rank() < SourceRole::From.rank());
        assert!(SourceRole::Using.rank() < SourceRole::Target.rank());
    }
}
