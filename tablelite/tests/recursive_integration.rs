// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Recursive WITH sources evaluated to a fixpoint

#[path = "testutils/mod.rs"]
mod testutils;

use tablelite::ast::{JoinKind, Node, NodeRef, OrderItem, Query, Source};
use tablelite::storage::record_from_json;
use tablelite::{exec, Collections, ExecOptions, ExecutionError, Record, Value};
use serde_json::json;
use testutils::{column, numbers, strings};

fn comment_tree() -> NodeRef {
    let seed = Query::new()
        .from(Source::table("comment").build())
        .select(Node::column("comment", "id"))
        .select(Node::column("comment", "content"))
        .select_as("depth", Node::constant(0))
        .filter(Node::eq(Node::column("comment", "id"), Node::constant(1)))
        .build();
    let recursive = Query::new()
        .from(Source::table("comment").alias("c").build())
        .join(
            JoinKind::Inner,
            Source::table("tree").build(),
            Some(Node::eq(Node::column("c", "parentId"), Node::column("tree", "id"))),
        )
        .select(Node::column("c", "id"))
        .select(Node::column("c", "content"))
        .select_as(
            "depth",
            Node::add(Node::column("tree", "depth"), Node::constant(1)),
        )
        .build();

    Query::new()
        .with(Source::recursive("tree", seed, recursive, false).build())
        .from(Source::table("tree").build())
        .select(Node::column("tree", "content"))
        .select(Node::column("tree", "depth"))
        .order_by(OrderItem::asc(Node::field("content")))
        .build()
}

/// `n` counting up from the rows of `start` while below `limit`
fn counter(start: Vec<Record>, limit: i64, all: bool) -> NodeRef {
    let seed = Query::new()
        .from(Source::values("start", start).build())
        .select(Node::column("start", "n"))
        .build();
    let recursive = Query::new()
        .from(Source::table("counter").build())
        .select_as("n", Node::add(Node::column("counter", "n"), Node::constant(1)))
        .filter(Node::lt(Node::column("counter", "n"), Node::constant(limit)))
        .build();
    Query::new()
        .with(Source::recursive("counter", seed, recursive, all).build())
        .from(Source::table("counter").build())
        .select(Node::column("counter", "n"))
        .build()
}

fn ones(count: usize) -> Vec<Record> {
    (0..count)
        .filter_map(|_| record_from_json(json!({"n": 1})))
        .collect()
}

fn run(collections: &mut Collections, options: &ExecOptions, query: &NodeRef) -> Result<Vec<Record>, ExecutionError> {
    testutils::init();
    let output = exec(collections, options, query)?;
    Ok(output.records().unwrap_or_default().to_vec())
}

#[test]
fn test_comment_tree_depths() {
    let mut collections = testutils::comments();
    let rows = run(&mut collections, &ExecOptions::default(), &comment_tree()).unwrap();
    assert_eq!(column(&rows, "content"), strings(&["A", "A1", "A1a", "A1b", "A2"]));
    assert_eq!(column(&rows, "depth"), numbers(&[0.0, 1.0, 2.0, 2.0, 1.0]));
}

#[test]
fn test_recursion_without_all_deduplicates() {
    let mut collections = Collections::new();
    let rows = run(&mut collections, &ExecOptions::default(), &counter(ones(2), 2, false)).unwrap();
    assert_eq!(column(&rows, "n"), numbers(&[1.0, 2.0]));
}

#[test]
fn test_recursion_with_all_keeps_duplicates() {
    let mut collections = Collections::new();
    let rows = run(&mut collections, &ExecOptions::default(), &counter(ones(2), 2, true)).unwrap();
    assert_eq!(column(&rows, "n"), numbers(&[1.0, 1.0, 2.0, 2.0]));
}

#[test]
fn test_recursion_limit_is_enforced() {
    let mut collections = Collections::new();
    let options = ExecOptions::new().with_max_recursion(5);
    let error = run(&mut collections, &options, &counter(ones(1), 1_000, false)).unwrap_err();
    assert_eq!(
        error,
        ExecutionError::RecursionLimit {
            name: "counter".to_string(),
            limit: 5,
        }
    );

    let rows = run(&mut collections, &options, &counter(ones(1), 4, false)).unwrap();
    assert_eq!(column(&rows, "n"), numbers(&[1.0, 2.0, 3.0, 4.0]));
    assert_eq!(rows[3]["n"], Value::from(4));
}
