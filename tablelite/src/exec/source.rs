// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Source resolution: WITH materialization, cross products and joins
//!
//! Clauses resolve in role order (WITH, FROM/ONLY, JOIN, USING, TARGET),
//! stable within a role. Each stream row is the outer row merged with one
//! `{binding: sub-record}` entry per source.

use crate::ast::{JoinKind, NodeKind, SourceClause, SourceKind, SourceRole};
use crate::exec::compiler::{CompiledExpr, Compiler};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::QueryProgram;
use crate::exec::filter::passes_all;
use crate::exec::recursive::{self, RecursivePlan};
use crate::exec::ExecutionError;
use crate::storage::{Collection, Record, Value};
use std::sync::Arc;

enum Producer {
    /// Looked up by name; `renames` maps storage names to logical names
    Table {
        name: String,
        renames: Vec<(String, String)>,
    },
    Values(Collection),
    Query(Arc<QueryProgram>),
    Recursive(RecursivePlan),
}

impl Producer {
    fn produce(&self, ctx: &mut ExecutionContext) -> Result<Collection, ExecutionError> {
        match self {
            Producer::Table { name, renames } => {
                let rows = ctx.lookup_source(name)?;
                if renames.is_empty() || ctx.use_names {
                    return Ok(rows);
                }
                Ok(Arc::new(
                    rows.iter().map(|row| rename_fields(row, renames)).collect(),
                ))
            }
            Producer::Values(rows) => Ok(rows.clone()),
            Producer::Query(program) => Ok(Arc::new(program.run_nested(ctx)?.rows)),
            Producer::Recursive(plan) => recursive::evaluate(ctx, plan),
        }
    }
}

fn rename_fields(row: &Record, renames: &[(String, String)]) -> Record {
    row.iter()
        .map(|(key, value)| {
            let key = renames
                .iter()
                .find(|(stored, _)| stored == key)
                .map_or(key, |(_, logical)| logical);
            (key.clone(), value.clone())
        })
        .collect()
}

enum StepKind {
    With,
    Cross,
    Join {
        kind: JoinKind,
        on: Option<CompiledExpr>,
    },
}

struct SourceStep {
    kind: StepKind,
    name: String,
    alias: String,
    producer: Producer,
}

impl SourceStep {
    fn binding(&self, ctx: &ExecutionContext) -> &str {
        if ctx.use_names {
            &self.name
        } else {
            &self.alias
        }
    }
}

/// Compiled source clauses of one statement
#[derive(Default)]
pub struct SourcePlan {
    steps: Vec<SourceStep>,
}

impl SourcePlan {
    pub fn compile(
        compiler: &mut Compiler,
        clauses: &[SourceClause],
    ) -> Result<Self, ExecutionError> {
        let mut ordered: Vec<&SourceClause> = clauses.iter().collect();
        ordered.sort_by_key(|clause| clause.role.rank());

        let mut steps = Vec::with_capacity(ordered.len());
        for clause in ordered {
            let NodeKind::Source(source) = clause.source.kind() else {
                return Err(ExecutionError::UnsupportedNode(format!(
                    "{} cannot be used as a source",
                    clause.source.kind_tag()
                )));
            };

            let producer = match &source.kind {
                SourceKind::Table => Producer::Table {
                    name: source.name.clone(),
                    renames: source
                        .columns
                        .iter()
                        .filter(|column| column.stored_as() != column.name)
                        .map(|column| (column.stored_as().to_string(), column.name.clone()))
                        .collect(),
                },
                SourceKind::Values(rows) => Producer::Values(Arc::new(rows.clone())),
                SourceKind::Query(query) => Producer::Query(compiler.compile_program(query)?),
                SourceKind::Recursive {
                    seed,
                    recursive,
                    all,
                } => Producer::Recursive(RecursivePlan {
                    name: source.name.clone(),
                    seed: compiler.compile_program(seed)?,
                    recursive: compiler.compile_program(recursive)?,
                    all: *all,
                }),
            };

            let kind = match &clause.role {
                SourceRole::With => StepKind::With,
                SourceRole::Join { kind, on } => StepKind::Join {
                    kind: *kind,
                    on: compiler.compile_optional(on.as_ref())?,
                },
                SourceRole::From | SourceRole::Only | SourceRole::Using | SourceRole::Target => {
                    StepKind::Cross
                }
            };

            steps.push(SourceStep {
                kind,
                name: source.name.clone(),
                alias: source.binding().to_string(),
                producer,
            });
        }
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Produce the joined row stream against the context's current row
    pub fn resolve(&self, ctx: &mut ExecutionContext) -> Result<Vec<Record>, ExecutionError> {
        let base = ctx.current_row().clone();
        let mut stream = vec![base.clone()];
        let mut seeded = false;

        for step in &self.steps {
            let rows = step.producer.produce(ctx)?;
            let binding = step.binding(ctx).to_string();
            match &step.kind {
                StepKind::With => {
                    log::trace!("WITH '{}' materialized {} rows", step.name, rows.len());
                    ctx.bind_virtual(&step.name, rows);
                    continue;
                }
                StepKind::Cross => {
                    stream = cross(&stream, &rows, &binding);
                }
                StepKind::Join { .. } if !seeded => {
                    stream = cross(&stream, &rows, &binding);
                }
                StepKind::Join { kind, on } => {
                    stream = join(ctx, stream, &rows, &binding, *kind, on.as_ref(), &base)?;
                }
            }
            seeded = true;
        }
        Ok(stream)
    }
}

/// Bind `sub` under `binding`, moving the binding to the end of the row
pub(crate) fn bind(row: &mut Record, binding: &str, sub: Record) {
    row.shift_remove(binding);
    row.insert(binding.to_string(), Value::Record(sub));
}

fn merged(left: &Record, binding: &str, right: &Record) -> Record {
    let mut row = left.clone();
    bind(&mut row, binding, right.clone());
    row
}

fn cross(stream: &[Record], rows: &[Record], binding: &str) -> Vec<Record> {
    let mut out = Vec::with_capacity(stream.len() * rows.len());
    for left in stream {
        for right in rows {
            out.push(merged(left, binding, right));
        }
    }
    out
}

fn matches(
    ctx: &mut ExecutionContext,
    condition: Option<&CompiledExpr>,
    row: Record,
) -> Result<(bool, Record), ExecutionError> {
    let Some(condition) = condition else {
        return Ok((true, row));
    };
    let (passed, row) = ctx.on_row(row, |ctx| passes_all(ctx, std::slice::from_ref(condition)));
    Ok((passed?, row))
}

fn join(
    ctx: &mut ExecutionContext,
    stream: Vec<Record>,
    rows: &[Record],
    binding: &str,
    kind: JoinKind,
    on: Option<&CompiledExpr>,
    base: &Record,
) -> Result<Vec<Record>, ExecutionError> {
    let mut out = Vec::new();
    match kind {
        JoinKind::Full | JoinKind::Inner | JoinKind::Left => {
            for left in stream {
                let mut matched = false;
                for right in rows {
                    let (passed, row) = matches(ctx, on, merged(&left, binding, right))?;
                    if passed {
                        matched = true;
                        out.push(row);
                        if kind == JoinKind::Inner {
                            break;
                        }
                    }
                }
                if !matched && kind == JoinKind::Left {
                    out.push(left);
                }
            }
        }
        JoinKind::Right => {
            for right in rows {
                let mut matched = false;
                for left in &stream {
                    let (passed, row) = matches(ctx, on, merged(left, binding, right))?;
                    if passed {
                        matched = true;
                        out.push(row);
                    }
                }
                if !matched {
                    out.push(merged(base, binding, right));
                }
            }
        }
    }
    Ok(out)
}
