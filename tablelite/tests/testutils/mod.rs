// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared fixtures for integration tests
#![allow(dead_code)]

use serde_json::json;
use tablelite::ast::{ColumnDef, DataType, NodeRef, Source};
use tablelite::{Collections, Value};

/// Route engine logs through the test harness
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn todo() -> Collections {
    Collections::from_json(json!({
        "todo": [
            {"id": 1, "name": "Task 1", "done": true},
            {"id": 2, "name": "Task 2", "done": false},
            {"id": 3, "name": "Task 3", "done": true}
        ]
    }))
    .expect("todo fixture")
}

/// `todo` with a declared integer primary key
pub fn todo_table() -> NodeRef {
    Source::table("todo")
        .column(ColumnDef::typed("id", DataType::Integer).primary_key())
        .column(ColumnDef::new("name"))
        .column(ColumnDef::typed("done", DataType::Boolean))
        .build()
}

pub fn employees() -> Collections {
    Collections::from_json(json!({
        "employee": [
            {"id": 1, "name": "Ann", "project": "Bridge", "amount": 100},
            {"id": 2, "name": "Bob", "project": "Home", "amount": 2},
            {"id": 3, "name": "Cid", "project": "Bridge", "amount": 80},
            {"id": 4, "name": "Dee", "project": "Workshop", "amount": 400},
            {"id": 5, "name": "Eve", "project": "Home", "amount": 5},
            {"id": 6, "name": "Fay", "project": "Bridge", "amount": 90},
            {"id": 7, "name": "Gus", "project": "Home", "amount": 4},
            {"id": 8, "name": "Hal", "project": "Bridge", "amount": 90},
            {"id": 9, "name": "Ivy", "project": "Home", "amount": 6}
        ]
    }))
    .expect("employee fixture")
}

pub fn comments() -> Collections {
    Collections::from_json(json!({
        "comment": [
            {"id": 1, "parentId": null, "content": "A"},
            {"id": 2, "parentId": 1, "content": "A1"},
            {"id": 3, "parentId": 1, "content": "A2"},
            {"id": 4, "parentId": 2, "content": "A1a"},
            {"id": 5, "parentId": 2, "content": "A1b"},
            {"id": 6, "parentId": null, "content": "B"},
            {"id": 7, "parentId": 6, "content": "B1"}
        ]
    }))
    .expect("comment fixture")
}

pub fn sales() -> Collections {
    Collections::from_json(json!({
        "sales": [
            {"region": "East", "product": "apple", "amount": 10},
            {"region": "East", "product": "pear", "amount": 20},
            {"region": "East", "product": "apple", "amount": 5},
            {"region": "West", "product": "apple", "amount": 7}
        ]
    }))
    .expect("sales fixture")
}

pub fn scores() -> Collections {
    Collections::from_json(json!({
        "score": [
            {"name": "a", "team": "red", "points": 90},
            {"name": "b", "team": "blue", "points": 80},
            {"name": "c", "team": "red", "points": 80},
            {"name": "d", "team": "blue", "points": 70}
        ],
        "left_side": [{"x": 1}, {"x": 2}, {"x": 2}, {"x": 3}],
        "right_side": [{"x": 2}, {"x": 3}, {"x": 4}]
    }))
    .expect("score fixture")
}

/// Sensor readings with a gap at `t = 2`
pub fn readings() -> Collections {
    Collections::from_json(json!({
        "reading": [
            {"t": 1, "v": 10},
            {"t": 2, "v": null},
            {"t": 3, "v": 30}
        ]
    }))
    .expect("reading fixture")
}

/// Accounts stored with a `user_name` field
pub fn accounts() -> Collections {
    Collections::from_json(json!({
        "account": [
            {"id": 1, "user_name": "ann"},
            {"id": 2, "user_name": "bob"}
        ]
    }))
    .expect("account fixture")
}

/// Values of `column` across `rows`
pub fn column(rows: &[tablelite::Record], column: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| Value::from(*value)).collect()
}

pub fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().map(|value| Value::Number(*value)).collect()
}
