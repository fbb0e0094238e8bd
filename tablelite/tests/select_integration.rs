// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! End-to-end SELECT evaluation: filters, joins, grouping, windows and set operations

#[path = "testutils/mod.rs"]
mod testutils;

use tablelite::ast::{
    Aggregate, AggregateFunction, ColumnDef, FieldRef, FrameBound, JoinKind, Node, NodeRef,
    OrderItem, Query, SetOperation, Source, WindowFrame, WindowFunction, WindowSpec,
};
use tablelite::{exec, Collections, ExecOptions, ExecutionError, QueryOutput, Record, Value};
use testutils::{column, numbers, strings};

fn records(collections: Collections, query: &NodeRef) -> Vec<Record> {
    records_with(collections, &ExecOptions::default(), query)
}

fn records_with(collections: Collections, options: &ExecOptions, query: &NodeRef) -> Vec<Record> {
    testutils::init();
    let mut collections = collections;
    let output = exec(&mut collections, options, query).unwrap();
    output.records().unwrap().to_vec()
}

fn by_points() -> WindowSpec {
    WindowSpec::new().order_by(OrderItem::desc(Node::column("score", "points")))
}

fn lead(expr: NodeRef, offset: Option<NodeRef>, default: Option<NodeRef>) -> WindowFunction {
    WindowFunction::Lead {
        expr,
        offset,
        default,
    }
}

fn lag(expr: NodeRef, offset: Option<NodeRef>, default: Option<NodeRef>) -> WindowFunction {
    WindowFunction::Lag {
        expr,
        offset,
        default,
    }
}

fn x_from(table: &str) -> NodeRef {
    Query::new()
        .from(Source::table(table).build())
        .select_as("x", Node::column(table, "x"))
        .build()
}

#[test]
fn test_filter_todo_by_done() {
    let query = Query::new()
        .from(Source::table("todo").build())
        .select(Node::column("todo", "name"))
        .filter(Node::eq(Node::column("todo", "done"), Node::constant(true)))
        .build();
    let rows = records(testutils::todo(), &query);
    assert_eq!(column(&rows, "name"), strings(&["Task 1", "Task 3"]));
}

#[test]
fn test_array_mode_with_affected_count() {
    testutils::init();
    let mut collections = testutils::todo();
    let query = Query::new()
        .from(Source::table("todo").alias("t").build())
        .select(Node::column("t", "id"))
        .filter(Node::not(Node::column("t", "done")))
        .build();
    let options = ExecOptions::new()
        .with_array_mode(true)
        .with_affected_count(true);
    let output = exec(&mut collections, &options, &query).unwrap();
    match output {
        QueryOutput::Affected { affected, result } => {
            assert_eq!(affected, 0);
            assert_eq!(*result, QueryOutput::Tuples(vec![vec![Value::from(2)]]));
        }
        other => panic!("expected affected wrapper, got {:?}", other),
    }
}

#[test]
fn test_group_employees_by_project() {
    let project = Node::column("employee", "project");
    let query = Query::new()
        .from(Source::table("employee").build())
        .select(project.clone())
        .select_as("count", Node::count_all())
        .select_as(
            "total",
            Node::aggregate(AggregateFunction::Sum, vec![Node::column("employee", "amount")]),
        )
        .group_by(vec![project.clone()])
        .order_by(OrderItem::asc(project))
        .build();
    let rows = records(testutils::employees(), &query);
    assert_eq!(column(&rows, "project"), strings(&["Bridge", "Home", "Workshop"]));
    assert_eq!(column(&rows, "count"), numbers(&[4.0, 4.0, 1.0]));
    assert_eq!(column(&rows, "total"), numbers(&[360.0, 17.0, 400.0]));
}

#[test]
fn test_having_filters_groups() {
    let project = Node::column("employee", "project");
    let total = Node::aggregate(AggregateFunction::Sum, vec![Node::column("employee", "amount")]);
    let query = Query::new()
        .from(Source::table("employee").build())
        .select(project.clone())
        .group_by(vec![project.clone()])
        .having(Node::gt(total, Node::constant(100)))
        .order_by(OrderItem::asc(project))
        .build();
    let rows = records(testutils::employees(), &query);
    assert_eq!(column(&rows, "project"), strings(&["Bridge", "Workshop"]));
}

#[test]
fn test_aggregate_without_grouping_is_one_record() {
    let query = Query::new()
        .from(Source::table("employee").build())
        .select_as("n", Node::count_all())
        .select_as(
            "projects",
            Aggregate::new(
                AggregateFunction::Count,
                vec![Node::column("employee", "project")],
            )
            .distinct()
            .build(),
        )
        .build();
    let rows = records(testutils::employees(), &query);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], Value::from(9));
    assert_eq!(rows[0]["projects"], Value::from(3));
}

#[test]
fn test_rollup_yields_prefix_grouping_sets() {
    let region = Node::column("sales", "region");
    let product = Node::column("sales", "product");
    let query = Query::new()
        .from(Source::table("sales").build())
        .select(region.clone())
        .select(product.clone())
        .select_as(
            "total",
            Node::aggregate(AggregateFunction::Sum, vec![Node::column("sales", "amount")]),
        )
        .select_as("level", Node::grouping(vec![region.clone(), product.clone()]))
        .rollup(vec![region, product])
        .build();
    let rows = records(testutils::sales(), &query);

    assert_eq!(
        column(&rows, "region"),
        vec![
            Value::from("East"),
            Value::from("East"),
            Value::from("East"),
            Value::from("West"),
            Value::from("West"),
            Value::Null,
        ]
    );
    assert_eq!(
        column(&rows, "product"),
        vec![
            Value::from("apple"),
            Value::from("pear"),
            Value::Null,
            Value::from("apple"),
            Value::Null,
            Value::Null,
        ]
    );
    assert_eq!(column(&rows, "total"), numbers(&[15.0, 20.0, 35.0, 7.0, 7.0, 42.0]));
    assert_eq!(column(&rows, "level"), numbers(&[0.0, 0.0, 1.0, 0.0, 1.0, 3.0]));
}

#[test]
fn test_cube_yields_every_subset() {
    let region = Node::column("sales", "region");
    let product = Node::column("sales", "product");
    let query = Query::new()
        .from(Source::table("sales").build())
        .select(region.clone())
        .select(product.clone())
        .select_as("n", Node::count_all())
        .cube(vec![region, product])
        .build();
    let rows = records(testutils::sales(), &query);
    // 3 pairs, 2 regions, 2 products, 1 grand total
    assert_eq!(rows.len(), 8);
    let grand_total: Vec<&Record> = rows
        .iter()
        .filter(|row| row["region"].is_null() && row["product"].is_null())
        .collect();
    assert_eq!(grand_total.len(), 1);
    assert_eq!(grand_total[0]["n"], Value::from(4));
}

#[test]
fn test_left_and_inner_joins() {
    let on = || Node::eq(Node::column("l", "x"), Node::column("r", "x"));
    let base = |kind: JoinKind| {
        Query::new()
            .from(Source::table("left_side").alias("l").build())
            .join(kind, Source::table("right_side").alias("r").build(), Some(on()))
            .select_as("lx", Node::column("l", "x"))
            .select_as("rx", Node::column("r", "x"))
            .build()
    };

    let rows = records(testutils::scores(), &base(JoinKind::Left));
    assert_eq!(column(&rows, "lx"), numbers(&[1.0, 2.0, 2.0, 3.0]));
    assert_eq!(
        column(&rows, "rx"),
        vec![Value::Null, Value::from(2), Value::from(2), Value::from(3)]
    );

    let rows = records(testutils::scores(), &base(JoinKind::Inner));
    assert_eq!(column(&rows, "lx"), numbers(&[2.0, 2.0, 3.0]));
}

#[test]
fn test_distinct_order_and_limit() {
    let project = Node::column("employee", "project");
    let query = Query::new()
        .from(Source::table("employee").build())
        .select(project.clone())
        .distinct()
        .order_by(OrderItem::desc(project))
        .limit(Node::constant(2))
        .build();
    let rows = records(testutils::employees(), &query);
    assert_eq!(column(&rows, "project"), strings(&["Workshop", "Home"]));
}

#[test]
fn test_nulls_last_ordering() {
    let parent = Node::column("comment", "parentId");
    let query = Query::new()
        .from(Source::table("comment").build())
        .select(parent.clone())
        .order_by(OrderItem::asc(parent).nulls_last())
        .build();
    let rows = records(testutils::comments(), &query);
    let parents = column(&rows, "parentId");
    assert_eq!(parents[0], Value::from(1));
    assert!(parents[5].is_null() && parents[6].is_null());
}

#[test]
fn test_ranking_functions_share_ties() {
    let points = Node::column("score", "points");
    let by_points = || WindowSpec::new().order_by(OrderItem::desc(points.clone()));
    let query = Query::new()
        .from(Source::table("score").build())
        .select(Node::column("score", "name"))
        .select_as("rnk", Node::window(WindowFunction::Rank, by_points()))
        .select_as("dense", Node::window(WindowFunction::DenseRank, by_points()))
        .select_as("rn", Node::window(WindowFunction::RowNumber, by_points()))
        .select_as(
            "previous",
            Node::window(
                WindowFunction::Lag {
                    expr: points.clone(),
                    offset: None,
                    default: None,
                },
                by_points(),
            ),
        )
        .order_by(OrderItem::asc(Node::field("name")))
        .build();
    let rows = records(testutils::scores(), &query);

    assert_eq!(column(&rows, "name"), strings(&["a", "b", "c", "d"]));
    assert_eq!(column(&rows, "rnk"), numbers(&[1.0, 2.0, 2.0, 4.0]));
    assert_eq!(column(&rows, "dense"), numbers(&[1.0, 2.0, 2.0, 3.0]));
    assert_eq!(column(&rows, "rn"), numbers(&[1.0, 2.0, 3.0, 4.0]));
    assert_eq!(
        column(&rows, "previous"),
        vec![Value::Null, Value::from(90), Value::from(80), Value::from(80)]
    );
}

#[test]
fn test_partitioned_window_with_running_frame() {
    let points = Node::column("score", "points");
    let window = WindowSpec::new()
        .partition_by(Node::column("score", "team"))
        .order_by(OrderItem::desc(points.clone()));
    let query = Query::new()
        .from(Source::table("score").build())
        .select(Node::column("score", "name"))
        .select_as("rn", Node::window(WindowFunction::RowNumber, window.clone()))
        .select_as(
            "running",
            Aggregate::new(AggregateFunction::Sum, vec![points.clone()])
                .over(
                    WindowSpec::new()
                        .order_by(OrderItem::desc(points))
                        .frame(WindowFrame::rows(
                            FrameBound::UnboundedPreceding,
                            FrameBound::CurrentRow,
                        )),
                )
                .build(),
        )
        .order_by(OrderItem::asc(Node::field("name")))
        .build();
    let rows = records(testutils::scores(), &query);

    assert_eq!(column(&rows, "rn"), numbers(&[1.0, 1.0, 2.0, 2.0]));
    assert_eq!(column(&rows, "running"), numbers(&[90.0, 170.0, 250.0, 320.0]));
}

#[test]
fn test_set_operations() {
    let cases = vec![
        (SetOperation::new(x_from("left_side")).union(x_from("right_side")), vec![1.0, 2.0, 3.0, 4.0]),
        (
            SetOperation::new(x_from("left_side")).union_all(x_from("right_side")),
            vec![1.0, 2.0, 2.0, 3.0, 2.0, 3.0, 4.0],
        ),
        (SetOperation::new(x_from("left_side")).intersect(x_from("right_side")), vec![2.0, 3.0]),
        (SetOperation::new(x_from("left_side")).except(x_from("right_side")), vec![1.0, 2.0]),
        (SetOperation::new(x_from("left_side")).except_all(x_from("right_side")), vec![1.0, 2.0]),
    ];
    for (operation, expected) in cases {
        let rows = records(testutils::scores(), &operation.build());
        assert_eq!(column(&rows, "x"), numbers(&expected));
    }
}

#[test]
fn test_set_operation_order_and_limit() {
    let query = SetOperation::new(x_from("left_side"))
        .union(x_from("right_side"))
        .order_by(OrderItem::desc(Node::field("x")))
        .limit(Node::constant(2))
        .build();
    let rows = records(testutils::scores(), &query);
    assert_eq!(column(&rows, "x"), numbers(&[4.0, 3.0]));
}

#[test]
fn test_missing_source_fails() {
    testutils::init();
    let query = Query::new()
        .from(Source::table("nowhere").build())
        .select(Node::column("nowhere", "x"))
        .build();
    let mut collections = Collections::new();
    let error = exec(&mut collections, &ExecOptions::default(), &query).unwrap_err();
    assert_eq!(error, ExecutionError::MissingSource("nowhere".to_string()));
}

#[test]
fn test_value_and_distribution_window_functions() {
    let points = Node::column("score", "points");
    let name = Node::column("score", "name");
    let query = Query::new()
        .from(Source::table("score").build())
        .select(name.clone())
        .select_as("next", Node::window(lead(points, None, None), by_points()))
        .select_as("first", Node::window(WindowFunction::FirstValue(name.clone()), by_points()))
        .select_as("last", Node::window(WindowFunction::LastValue(name.clone()), by_points()))
        .select_as(
            "second",
            Node::window(WindowFunction::NthValue(name, Node::constant(2)), by_points()),
        )
        .select_as("tile", Node::window(WindowFunction::Ntile(Node::constant(3)), by_points()))
        .select_as("pct", Node::window(WindowFunction::PercentRank, by_points()))
        .select_as("cume", Node::window(WindowFunction::CumeDist, by_points()))
        .order_by(OrderItem::asc(Node::field("name")))
        .build();
    let rows = records(testutils::scores(), &query);

    assert_eq!(column(&rows, "name"), strings(&["a", "b", "c", "d"]));
    assert_eq!(
        column(&rows, "next"),
        vec![Value::from(80), Value::from(80), Value::from(70), Value::Null]
    );
    assert_eq!(column(&rows, "first"), strings(&["a", "a", "a", "a"]));
    assert_eq!(column(&rows, "last"), strings(&["d", "d", "d", "d"]));
    assert_eq!(column(&rows, "second"), strings(&["b", "b", "b", "b"]));
    assert_eq!(column(&rows, "tile"), numbers(&[1.0, 1.0, 2.0, 3.0]));
    assert_eq!(column(&rows, "pct"), numbers(&[0.0, 1.0 / 3.0, 1.0 / 3.0, 1.0]));
    assert_eq!(column(&rows, "cume"), numbers(&[0.25, 0.75, 0.75, 1.0]));
}

#[test]
fn test_huge_offsets_fall_back_to_default() {
    let points = Node::column("score", "points");
    let fallback = || Some(Node::constant(-1));
    let query = Query::new()
        .from(Source::table("score").build())
        .select(Node::column("score", "name"))
        .select_as(
            "lead_far",
            Node::window(lead(points.clone(), Some(Node::constant(1e19)), fallback()), by_points()),
        )
        .select_as(
            "lag_far",
            Node::window(lag(points.clone(), Some(Node::constant(1e19)), fallback()), by_points()),
        )
        .select_as(
            "lag_negative",
            Node::window(lag(points, Some(Node::constant(-1e19)), fallback()), by_points()),
        )
        .build();
    let rows = records(testutils::scores(), &query);

    let fallbacks = numbers(&[-1.0, -1.0, -1.0, -1.0]);
    assert_eq!(column(&rows, "lead_far"), fallbacks);
    assert_eq!(column(&rows, "lag_far"), fallbacks);
    assert_eq!(column(&rows, "lag_negative"), fallbacks);
}

#[test]
fn test_offset_default_only_outside_partition() {
    let v = Node::column("reading", "v");
    let by_time = || WindowSpec::new().order_by(OrderItem::asc(Node::column("reading", "t")));
    let query = Query::new()
        .from(Source::table("reading").build())
        .select(Node::column("reading", "t"))
        .select_as(
            "previous",
            Node::window(lag(v.clone(), None, Some(Node::constant(-1))), by_time()),
        )
        .select_as("next", Node::window(lead(v, None, Some(Node::constant(-1))), by_time()))
        .order_by(OrderItem::asc(Node::field("t")))
        .build();
    let rows = records(testutils::readings(), &query);

    // a null value inside the partition is returned as is
    assert_eq!(
        column(&rows, "previous"),
        vec![Value::from(-1), Value::from(10), Value::Null]
    );
    assert_eq!(
        column(&rows, "next"),
        vec![Value::Null, Value::from(30), Value::from(-1)]
    );
}

#[test]
fn test_range_and_groups_frames_follow_peers() {
    let points = Node::column("score", "points");
    let framed = |frame: WindowFrame| {
        Aggregate::new(AggregateFunction::Sum, vec![points.clone()])
            .over(by_points().frame(frame))
            .build()
    };
    let query = Query::new()
        .from(Source::table("score").build())
        .select(Node::column("score", "name"))
        .select_as(
            "range_total",
            framed(WindowFrame::range(FrameBound::UnboundedPreceding, FrameBound::CurrentRow)),
        )
        .select_as(
            "groups_total",
            framed(WindowFrame::groups(FrameBound::Preceding(1), FrameBound::CurrentRow)),
        )
        .order_by(OrderItem::asc(Node::field("name")))
        .build();
    let rows = records(testutils::scores(), &query);

    assert_eq!(column(&rows, "range_total"), numbers(&[90.0, 250.0, 250.0, 320.0]));
    assert_eq!(column(&rows, "groups_total"), numbers(&[90.0, 250.0, 250.0, 230.0]));
}

#[test]
fn test_right_join_keeps_unmatched_right_rows() {
    let query = Query::new()
        .from(Source::table("left_side").alias("l").build())
        .join(
            JoinKind::Right,
            Source::table("right_side").alias("r").build(),
            Some(Node::eq(Node::column("l", "x"), Node::column("r", "x"))),
        )
        .select_as("lx", Node::column("l", "x"))
        .select_as("rx", Node::column("r", "x"))
        .build();
    let rows = records(testutils::scores(), &query);

    assert_eq!(
        column(&rows, "lx"),
        vec![Value::from(2), Value::from(2), Value::from(3), Value::Null]
    );
    assert_eq!(column(&rows, "rx"), numbers(&[2.0, 2.0, 3.0, 4.0]));
}

#[test]
fn test_full_join_keeps_every_passing_pair() {
    let base = |kind: JoinKind| {
        Query::new()
            .from(Source::table("left_side").alias("l").build())
            .join(
                kind,
                Source::table("right_side").alias("r").build(),
                Some(Node::lt_eq(Node::column("l", "x"), Node::column("r", "x"))),
            )
            .select_as("lx", Node::column("l", "x"))
            .select_as("rx", Node::column("r", "x"))
            .build()
    };

    let rows = records(testutils::scores(), &base(JoinKind::Full));
    assert_eq!(
        column(&rows, "lx"),
        numbers(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0])
    );
    assert_eq!(
        column(&rows, "rx"),
        numbers(&[2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 3.0, 4.0])
    );

    // inner stops at the first match of each left row
    let rows = records(testutils::scores(), &base(JoinKind::Inner));
    assert_eq!(column(&rows, "rx"), numbers(&[2.0, 2.0, 2.0, 3.0]));
}

#[test]
fn test_grouping_sets_are_sorted_with_nulls_last() {
    let region = Node::column("sales", "region");
    let product = Node::column("sales", "product");
    let query = Query::new()
        .from(Source::table("sales").build())
        .select(region.clone())
        .select(product.clone())
        .select_as(
            "total",
            Node::aggregate(AggregateFunction::Sum, vec![Node::column("sales", "amount")]),
        )
        .grouping_sets(vec![vec![region], vec![product]])
        .build();
    let rows = records(testutils::sales(), &query);

    assert_eq!(
        column(&rows, "region"),
        vec![Value::from("East"), Value::from("West"), Value::Null, Value::Null]
    );
    assert_eq!(
        column(&rows, "product"),
        vec![Value::Null, Value::Null, Value::from("apple"), Value::from("pear")]
    );
    assert_eq!(column(&rows, "total"), numbers(&[35.0, 7.0, 22.0, 20.0]));
}

#[test]
fn test_group_by_composed_with_rollup() {
    let region = Node::column("sales", "region");
    let product = Node::column("sales", "product");
    let query = Query::new()
        .from(Source::table("sales").build())
        .select(region.clone())
        .select(product.clone())
        .select_as(
            "total",
            Node::aggregate(AggregateFunction::Sum, vec![Node::column("sales", "amount")]),
        )
        .group_by(vec![region])
        .rollup(vec![product])
        .build();
    let rows = records(testutils::sales(), &query);

    assert_eq!(
        column(&rows, "region"),
        strings(&["East", "East", "East", "West", "West"])
    );
    assert_eq!(
        column(&rows, "product"),
        vec![
            Value::from("apple"),
            Value::from("pear"),
            Value::Null,
            Value::from("apple"),
            Value::Null,
        ]
    );
    assert_eq!(column(&rows, "total"), numbers(&[15.0, 20.0, 35.0, 7.0, 7.0]));
}

#[test]
fn test_aggregate_filter_distinct_and_ordering() {
    let project = Node::column("employee", "project");
    let name = Node::column("employee", "name");
    let amount = Node::column("employee", "amount");
    let query = Query::new()
        .from(Source::table("employee").build())
        .select(project.clone())
        .select_as(
            "names",
            Aggregate::new(AggregateFunction::StringAgg, vec![name.clone(), Node::constant(", ")])
                .order_by(OrderItem::desc(name))
                .build(),
        )
        .select_as(
            "large",
            Aggregate::new(AggregateFunction::Count, vec![])
                .filter(Node::gt(amount.clone(), Node::constant(50)))
                .build(),
        )
        .select_as(
            "amounts",
            Aggregate::new(AggregateFunction::Count, vec![amount])
                .distinct()
                .build(),
        )
        .group_by(vec![project.clone()])
        .order_by(OrderItem::asc(project))
        .build();
    let rows = records(testutils::employees(), &query);

    assert_eq!(
        column(&rows, "names"),
        strings(&["Hal, Fay, Cid, Ann", "Ivy, Gus, Eve, Bob", "Dee"])
    );
    assert_eq!(column(&rows, "large"), numbers(&[4.0, 0.0, 1.0]));
    assert_eq!(column(&rows, "amounts"), numbers(&[3.0, 4.0, 1.0]));
}

#[test]
fn test_ignore_case_comparisons() {
    let name = Node::column("todo", "name");
    let query = Query::new()
        .from(Source::table("todo").build())
        .select(name.clone())
        .filter(Node::eq(name, Node::constant("TASK 2")))
        .build();

    assert!(records(testutils::todo(), &query).is_empty());
    let rows = records_with(
        testutils::todo(),
        &ExecOptions::new().with_ignore_case(true),
        &query,
    );
    assert_eq!(column(&rows, "name"), strings(&["Task 2"]));
}

#[test]
fn test_storage_names_and_use_names() {
    let account = Source::table("account")
        .alias("a")
        .column(ColumnDef::new("name").storage_name("user_name"))
        .build();
    let name = Node::field_ref(FieldRef {
        source: Some("a".to_string()),
        table: Some("account".to_string()),
        name: "name".to_string(),
        column: Some("user_name".to_string()),
    });
    let query = Query::new().from(account).select_as("name", name).build();

    // logical names: the alias binding with renamed fields
    let rows = records(testutils::accounts(), &query);
    assert_eq!(column(&rows, "name"), strings(&["ann", "bob"]));

    // storage names: the table binding with stored fields
    let rows = records_with(
        testutils::accounts(),
        &ExecOptions::new().with_use_names(true),
        &query,
    );
    assert_eq!(column(&rows, "name"), strings(&["ann", "bob"]));
}
