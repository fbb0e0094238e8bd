// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! INSERT, UPDATE and DELETE against caller collections

#[path = "testutils/mod.rs"]
mod testutils;

use tablelite::ast::{Assignment, Delete, Insert, Node, NodeRef, Query, Source, Update};
use tablelite::{exec, Collections, ExecOptions, ExecutionError, Value};
use testutils::{column, numbers, strings, todo_table};

fn todo_row(id: i64, name: &str) -> Vec<Assignment> {
    vec![
        Assignment::new("id", Node::constant(id)),
        Assignment::new("name", Node::constant(name)),
        Assignment::new("done", Node::constant(false)),
    ]
}

fn counted(collections: &mut Collections, query: &NodeRef) -> Result<usize, ExecutionError> {
    testutils::init();
    let options = ExecOptions::new().with_affected_count(true);
    let output = exec(collections, &options, query)?;
    Ok(output.affected().unwrap_or_default())
}

fn names(collections: &Collections) -> Vec<Value> {
    column(collections.table("todo").unwrap_or_default(), "name")
}

#[test]
fn test_insert_appends_with_declared_types() {
    let mut collections = testutils::todo();
    let query = Insert::new(todo_table())
        .values(vec![
            Assignment::new("id", Node::constant("4")),
            Assignment::new("name", Node::constant("Task 4")),
        ])
        .build();
    assert_eq!(counted(&mut collections, &query).unwrap(), 1);

    let rows = collections.table("todo").unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["id"], Value::from(4));
    assert_eq!(rows[3]["done"], Value::Null);
}

#[test]
fn test_insert_duplicate_key_fails_and_leaves_collection() {
    let mut collections = testutils::todo();
    let query = Insert::new(todo_table())
        .values(todo_row(4, "Task 4"))
        .values(todo_row(1, "Again"))
        .build();
    let error = counted(&mut collections, &query).unwrap_err();
    assert!(matches!(error, ExecutionError::DuplicateKey { ref table, .. } if table == "todo"));
    assert_eq!(names(&collections), strings(&["Task 1", "Task 2", "Task 3"]));
}

#[test]
fn test_insert_ignore_skips_duplicates() {
    let mut collections = testutils::todo();
    let query = Insert::new(todo_table())
        .values(todo_row(1, "Again"))
        .values(todo_row(4, "Task 4"))
        .on_conflict_ignore()
        .build();
    assert_eq!(counted(&mut collections, &query).unwrap(), 1);
    assert_eq!(names(&collections), strings(&["Task 1", "Task 2", "Task 3", "Task 4"]));
}

#[test]
fn test_insert_on_duplicate_update() {
    let mut collections = testutils::todo();
    let query = Insert::new(todo_table())
        .values(todo_row(2, "Renamed"))
        .values(todo_row(3, "Skipped"))
        .on_conflict_update(
            vec![Assignment::new("name", Node::column("excluded", "name"))],
            Some(Node::eq(Node::column("todo", "done"), Node::constant(false))),
        )
        .returning(None, Node::column("todo", "name"))
        .build();

    testutils::init();
    let options = ExecOptions::new().with_affected_count(true);
    let output = exec(&mut collections, &options, &query).unwrap();
    assert_eq!(output.affected(), Some(1));
    assert_eq!(column(output.records().unwrap(), "name"), strings(&["Renamed"]));
    assert_eq!(names(&collections), strings(&["Task 1", "Renamed", "Task 3"]));
}

#[test]
fn test_insert_from_query() {
    let mut collections = testutils::todo();
    let copy = Query::new()
        .from(Source::table("todo").alias("t").build())
        .select_as("id", Node::add(Node::column("t", "id"), Node::constant(10)))
        .select(Node::column("t", "name"))
        .filter(Node::column("t", "done"))
        .build();
    let query = Insert::new(todo_table()).select(copy).build();
    assert_eq!(counted(&mut collections, &query).unwrap(), 2);
    let rows = collections.table("todo").unwrap();
    assert_eq!(column(rows, "id"), numbers(&[1.0, 2.0, 3.0, 11.0, 13.0]));
}

#[test]
fn test_update_with_returning() {
    let mut collections = testutils::todo();
    let query = Update::new(todo_table())
        .set("done", Node::constant(true))
        .set("name", Node::cast(Node::column("todo", "id"), tablelite::ast::DataType::Text { length: None }))
        .filter(Node::eq(Node::column("todo", "done"), Node::constant(false)))
        .returning(Some("id"), Node::column("todo", "id"))
        .returning(Some("name"), Node::column("todo", "name"))
        .build();

    testutils::init();
    let output = exec(&mut collections, &ExecOptions::new().with_affected_count(true), &query).unwrap();
    assert_eq!(output.affected(), Some(1));
    let returned = output.records().unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0]["id"], Value::from(2));
    assert_eq!(returned[0]["name"], Value::from("2"));

    let rows = collections.table("todo").unwrap();
    assert!(rows.iter().all(|row| row["done"] == Value::Boolean(true)));
}

#[test]
fn test_update_row_from_subquery() {
    let mut collections = testutils::todo();
    let newest = Query::new()
        .from(Source::table("todo").alias("other").build())
        .select_as("name", Node::column("other", "name"))
        .filter(Node::eq(Node::column("other", "id"), Node::constant(3)))
        .build();
    let query = Update::new(todo_table())
        .set_row(&["name"], newest)
        .filter(Node::eq(Node::column("todo", "id"), Node::constant(1)))
        .build();
    assert_eq!(counted(&mut collections, &query).unwrap(), 1);
    assert_eq!(names(&collections), strings(&["Task 3", "Task 2", "Task 3"]));
}

#[test]
fn test_delete_matching_rows_only() {
    let mut collections = testutils::todo();
    let query = Delete::new(todo_table())
        .filter(Node::eq(Node::column("todo", "done"), Node::constant(true)))
        .build();
    assert_eq!(counted(&mut collections, &query).unwrap(), 2);
    assert_eq!(names(&collections), strings(&["Task 2"]));
}

#[test]
fn test_delete_with_returning_reports_removed_rows() {
    let mut collections = testutils::todo();
    let query = Delete::new(todo_table())
        .filter(Node::lt(Node::column("todo", "id"), Node::constant(3)))
        .returning(None, Node::column("todo", "name"))
        .build();
    testutils::init();
    let output = exec(&mut collections, &ExecOptions::default(), &query).unwrap();
    assert_eq!(column(output.records().unwrap(), "name"), strings(&["Task 1", "Task 2"]));
    assert_eq!(names(&collections), strings(&["Task 3"]));
}

#[test]
fn test_insert_into_missing_collection_fails() {
    testutils::init();
    let mut collections = Collections::new();
    let query = Insert::new(Source::table("ghost").build())
        .values(vec![Assignment::new("id", Node::constant(1))])
        .build();
    let error = exec(&mut collections, &ExecOptions::default(), &query).unwrap_err();
    assert_eq!(error, ExecutionError::MissingSource("ghost".to_string()));
}
