// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database provider: reads, prepared statements, streaming and transactions

#[path = "testutils/mod.rs"]
mod testutils;

use tablelite::ast::{Delete, Node, NodeRef, OrderItem, Query, Source, Update};
use tablelite::{Database, ExecOptions, ExecutionError, Record, Value};
use testutils::{column, strings, todo_table};

fn database() -> Database {
    testutils::init();
    Database::new(testutils::todo(), ExecOptions::default())
}

fn names_query() -> NodeRef {
    Query::new()
        .from(Source::table("todo").build())
        .select(Node::column("todo", "name"))
        .order_by(OrderItem::asc(Node::column("todo", "id")))
        .build()
}

fn delete_done() -> NodeRef {
    Delete::new(todo_table())
        .filter(Node::column("todo", "done"))
        .build()
}

fn table_names(database: &Database) -> Vec<Value> {
    column(&database.table("todo").unwrap_or_default(), "name")
}

#[test]
fn test_get_tuples_and_count() {
    let database = database();
    let rows = database.get(&names_query()).unwrap();
    assert_eq!(column(&rows, "name"), strings(&["Task 1", "Task 2", "Task 3"]));

    let tuples = database.tuples(&names_query()).unwrap();
    assert_eq!(tuples[1], vec![Value::from("Task 2")]);

    let counted = database.count(&delete_done()).unwrap();
    assert_eq!(counted.affected, 2);
    assert!(counted.result.is_empty());
    assert_eq!(table_names(&database), strings(&["Task 2"]));
}

#[test]
fn test_prepared_statement_with_parameters() {
    let database = database();
    let statement = database
        .prepare(
            &Update::new(todo_table())
                .set("name", Node::param("name"))
                .filter(Node::eq(Node::column("todo", "id"), Node::param("id")))
                .build(),
        )
        .unwrap();
    assert!(statement.is_mutation());

    let mut params = Record::new();
    params.insert("id".to_string(), Value::from(3));
    params.insert("name".to_string(), Value::from("Third"));
    assert_eq!(statement.run(params).unwrap(), 1);
    assert_eq!(table_names(&database), strings(&["Task 1", "Task 2", "Third"]));

    let error = statement.run(Record::new()).unwrap_err();
    assert!(matches!(error, ExecutionError::MissingParameter(_)));
}

#[test]
fn test_stream_batches() {
    let database = database();
    let seen = database
        .stream(&names_query(), 2, |row, index, count, batch| {
            Some(format!("{}:{}/{}:{}", row["name"], index, count, batch.len()))
        })
        .unwrap();
    assert_eq!(seen, vec!["Task 1:0/2:2", "Task 2:0/2:2", "Task 3:1/2:1"]);

    let firsts = database
        .stream_tuples(&names_query(), 2, |tuple, _, _, batch| {
            (tuple == &batch[0]).then(|| tuple[0].clone())
        })
        .unwrap();
    assert_eq!(firsts, strings(&["Task 1", "Task 3"]));
}

#[test]
fn test_transaction_commits_on_success() {
    let database = database();
    let affected = database
        .transaction(|tx| {
            let affected = tx.run(&delete_done())?;
            assert_eq!(table_names(tx), strings(&["Task 2"]));
            // live collections are untouched until commit
            assert_eq!(table_names(&database), strings(&["Task 1", "Task 2", "Task 3"]));
            Ok(affected)
        })
        .unwrap();
    assert_eq!(affected, Some(2));
    assert_eq!(table_names(&database), strings(&["Task 2"]));
}

#[test]
fn test_transaction_rollback_discards_changes() {
    let database = database();
    let outcome: Option<()> = database
        .transaction(|tx| {
            tx.run(&delete_done())?;
            Err(ExecutionError::Rollback)
        })
        .unwrap();
    assert_eq!(outcome, None);
    assert_eq!(table_names(&database), strings(&["Task 1", "Task 2", "Task 3"]));
}

#[test]
fn test_transaction_propagates_other_errors() {
    let database = database();
    let result = database.transaction(|tx| {
        tx.run(&delete_done())?;
        tx.get(
            &Query::new()
                .from(Source::table("missing").build())
                .build(),
        )
    });
    assert_eq!(result, Err(ExecutionError::MissingSource("missing".to_string())));
    assert_eq!(table_names(&database), strings(&["Task 1", "Task 2", "Task 3"]));
}
