// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lowering of expression trees into evaluator closures
//!
//! A [`Compiler`] lives for one compilation. It memoizes by [`NodeId`]: the
//! first time a node is seen it registers a placeholder whose evaluator cell
//! is filled once lowering finishes, and every later occurrence of the node
//! shares that placeholder. Field references are additionally interned by
//! their qualified path so that `project` in the select list, in ORDER BY
//! and in GROUP BY all read the same cache slot.

use crate::ast::{Node, NodeId, NodeKind, NodeRef};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::QueryProgram;
use crate::exec::expression;
use crate::exec::window::WindowPlan;
use crate::exec::ExecutionError;
use crate::functions::FunctionRegistry;
use crate::storage::Value;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Closure produced by lowering one node
pub type Evaluator =
    Arc<dyn Fn(&mut ExecutionContext) -> Result<Value, ExecutionError> + Send + Sync>;

/// Box a closure as an [`Evaluator`]
pub(crate) fn evaluator<F>(f: F) -> Evaluator
where
    F: Fn(&mut ExecutionContext) -> Result<Value, ExecutionError> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct CompiledInner {
    id: NodeId,
    alias: Option<String>,
    memoize: bool,
    evaluator: OnceCell<Evaluator>,
}

/// Compiled form of one node, shared by every occurrence of that node
#[derive(Clone)]
pub struct CompiledExpr {
    inner: Arc<CompiledInner>,
}

impl CompiledExpr {
    fn placeholder(node: &Node) -> Self {
        Self {
            inner: Arc::new(CompiledInner {
                id: node.id(),
                alias: default_alias(node),
                memoize: !matches!(node.kind(), NodeKind::Constant(_) | NodeKind::Parameter(_)),
                evaluator: OnceCell::new(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Output name suggested by the node itself
    pub fn alias(&self) -> Option<&str> {
        self.inner.alias.as_deref()
    }

    /// Evaluate against the context's current row or record
    ///
    /// In record mode the value is memoized in the record's cache, and a
    /// value already present there (including a cleared grouping key) wins.
    pub fn evaluate(&self, ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
        if self.inner.memoize {
            if let Some(value) = ctx.cached(self.inner.id) {
                return Ok(value);
            }
        }
        let evaluator = self.inner.evaluator.get().ok_or_else(|| {
            ExecutionError::RuntimeError(format!(
                "expression {} evaluated before it was compiled",
                self.inner.id
            ))
        })?;
        let value = evaluator(ctx)?;
        if self.inner.memoize {
            ctx.store(self.inner.id, &value);
        }
        Ok(value)
    }

    fn fill(&self, evaluator: Evaluator) {
        // A second fill can only come from the same node; keep the first
        let _ = self.inner.evaluator.set(evaluator);
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("id", &self.inner.id)
            .field("alias", &self.inner.alias)
            .field("compiled", &self.inner.evaluator.get().is_some())
            .finish()
    }
}

fn default_alias(node: &Node) -> Option<String> {
    match node.kind() {
        NodeKind::Field(field) => Some(field.name.clone()),
        NodeKind::Function { name, .. } => Some(name.to_lowercase()),
        NodeKind::Aggregate(agg) => Some(agg.function.name().to_string()),
        NodeKind::Window(call) => Some(call.function.name().to_string()),
        NodeKind::Cast { expr, .. } => default_alias(expr),
        _ => None,
    }
}

/// Per-query compilation state
#[derive(Default)]
pub(crate) struct QueryScope {
    pub windows: Vec<WindowPlan>,
    pub has_aggregate: bool,
}

pub struct Compiler {
    registry: Arc<FunctionRegistry>,
    compiled: HashMap<NodeId, CompiledExpr>,
    fields: HashMap<String, CompiledExpr>,
    programs: HashMap<NodeId, Arc<QueryProgram>>,
    scopes: Vec<QueryScope>,
}

impl Compiler {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            compiled: HashMap::new(),
            fields: HashMap::new(),
            programs: HashMap::new(),
            scopes: Vec::new(),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Compile one expression node
    pub fn compile(&mut self, node: &NodeRef) -> Result<CompiledExpr, ExecutionError> {
        if let Some(existing) = self.compiled.get(&node.id()) {
            return Ok(existing.clone());
        }

        let field_path = match node.kind() {
            NodeKind::Field(field) => Some(field.path()),
            _ => None,
        };
        if let Some(path) = &field_path {
            if let Some(existing) = self.fields.get(path).cloned() {
                self.compiled.insert(node.id(), existing.clone());
                return Ok(existing);
            }
        }

        let compiled = CompiledExpr::placeholder(node);
        self.compiled.insert(node.id(), compiled.clone());
        if let Some(path) = field_path {
            self.fields.insert(path, compiled.clone());
        }

        let evaluator = expression::lower(self, node)?;
        compiled.fill(evaluator);
        Ok(compiled)
    }

    pub fn compile_all(&mut self, nodes: &[NodeRef]) -> Result<Vec<CompiledExpr>, ExecutionError> {
        nodes.iter().map(|node| self.compile(node)).collect()
    }

    pub fn compile_optional(
        &mut self,
        node: Option<&NodeRef>,
    ) -> Result<Option<CompiledExpr>, ExecutionError> {
        node.map(|node| self.compile(node)).transpose()
    }

    /// Compile a query-shaped node into a runnable program
    pub fn compile_program(&mut self, node: &NodeRef) -> Result<Arc<QueryProgram>, ExecutionError> {
        if let Some(existing) = self.programs.get(&node.id()) {
            return Ok(existing.clone());
        }
        let program = Arc::new(QueryProgram::compile(self, node)?);
        self.programs.insert(node.id(), program.clone());
        Ok(program)
    }

    /// Placeholder registered for a node currently being lowered
    pub(crate) fn placeholder(&self, id: NodeId) -> Result<CompiledExpr, ExecutionError> {
        self.compiled.get(&id).cloned().ok_or_else(|| {
            ExecutionError::RuntimeError(format!("node {} has no compiled placeholder", id))
        })
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(QueryScope::default());
    }

    pub(crate) fn pop_scope(&mut self) -> QueryScope {
        self.scopes.pop().unwrap_or_default()
    }

    pub(crate) fn register_window(&mut self, plan: WindowPlan) -> Result<(), ExecutionError> {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.windows.push(plan);
                Ok(())
            }
            None => Err(ExecutionError::UnsupportedNode(
                "window function outside of a query".to_string(),
            )),
        }
    }

    pub(crate) fn mark_aggregate(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.has_aggregate = true;
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::default()))
    }
}
