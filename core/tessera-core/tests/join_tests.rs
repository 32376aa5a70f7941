// Join integration tests
//
// Equi-joins through Table and Engine: kinds, composite keys, naming, null
// keys, strategy selection and cross joins.

use tessera_core::{
    Engine, EngineConfig, JoinKind, JoinOn, JoinOptions, JoinSide, JoinStrategy, Row,
    ScalarValue, Suffixes, Table, TesseraError,
};

use arrow::array::{
    Array, ArrayRef, AsArray, Date32Array, Date64Array, Float64Array, Int32Array, Int64Array,
    NullArray, StringArray, TimestampMillisecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use std::sync::Arc;

// ─── Helpers ────────────────────────────────────────────

fn left() -> Table {
    Table::from_rows(vec![
        Row::new().with("id", 1i64).with("v", "a"),
        Row::new().with("id", 2i64).with("v", "b"),
    ])
    .unwrap()
}

fn right() -> Table {
    Table::from_rows(vec![
        Row::new().with("id", 2i64).with("w", "x"),
        Row::new().with("id", 3i64).with("w", "y"),
    ])
    .unwrap()
}

fn int_col(table: &Table, name: &str) -> Vec<Option<i64>> {
    table
        .column(name)
        .unwrap()
        .as_primitive::<Int64Type>()
        .iter()
        .collect()
}

fn str_col(table: &Table, name: &str) -> Vec<Option<String>> {
    table
        .column(name)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn engine_with(strategy: JoinStrategy) -> Engine {
    Engine::new(EngineConfig {
        force_join_strategy: Some(strategy),
        ..Default::default()
    })
}

// ═══════════════════════════════════════════════════════════
// Join kinds
// ═══════════════════════════════════════════════════════════

#[test]
fn inner_join_single_match() {
    let out = left().inner_join(&right(), "id").unwrap();
    assert_eq!(out.column_names(), &["id", "v", "w"]);
    assert_eq!(out.num_rows(), 1);
    assert_eq!(out.value("id", 0).unwrap(), ScalarValue::Int64(2));
    assert_eq!(out.value("v", 0).unwrap(), ScalarValue::Utf8("b".into()));
    assert_eq!(out.value("w", 0).unwrap(), ScalarValue::Utf8("x".into()));
}

#[test]
fn left_join_keeps_every_left_row() {
    let out = left().left_join(&right(), "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(1), Some(2)]);
    assert_eq!(str_col(&out, "w"), vec![None, Some("x".into())]);
}

#[test]
fn right_join_takes_key_from_right() {
    let out = left().right_join(&right(), "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(2), Some(3)]);
    assert_eq!(str_col(&out, "v"), vec![Some("b".into()), None]);
    assert_eq!(str_col(&out, "w"), vec![Some("x".into()), Some("y".into())]);
}

#[test]
fn outer_join_coalesces_key() {
    let out = left().outer_join(&right(), "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(str_col(&out, "v"), vec![Some("a".into()), Some("b".into()), None]);
    assert_eq!(str_col(&out, "w"), vec![None, Some("x".into()), Some("y".into())]);
}

#[test]
fn duplicate_keys_multiply() {
    let l = Table::from_rows(vec![
        Row::new().with("k", "a").with("l", 1),
        Row::new().with("k", "a").with("l", 2),
    ])
    .unwrap();
    let r = Table::from_rows(vec![
        Row::new().with("k", "a").with("r", 10),
        Row::new().with("k", "a").with("r", 20),
        Row::new().with("k", "b").with("r", 30),
    ])
    .unwrap();
    let out = l.inner_join(&r, "k").unwrap();
    assert_eq!(out.num_rows(), 4);
    let rows: Vec<(ScalarValue, ScalarValue)> = (0..4)
        .map(|i| (out.value("l", i).unwrap(), out.value("r", i).unwrap()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (ScalarValue::Int32(1), ScalarValue::Int32(10)),
            (ScalarValue::Int32(1), ScalarValue::Int32(20)),
            (ScalarValue::Int32(2), ScalarValue::Int32(10)),
            (ScalarValue::Int32(2), ScalarValue::Int32(20)),
        ]
    );
}

// ═══════════════════════════════════════════════════════════
// Keys and naming
// ═══════════════════════════════════════════════════════════

#[test]
fn composite_keys() {
    let l = Table::from_rows(vec![
        Row::new().with("a", 1).with("b", "x").with("v", 1),
        Row::new().with("a", 1).with("b", "y").with("v", 2),
        Row::new().with("a", 2).with("b", "x").with("v", 3),
    ])
    .unwrap();
    let r = Table::from_rows(vec![
        Row::new().with("a", 1).with("b", "y").with("w", 10),
        Row::new().with("a", 2).with("b", "x").with("w", 20),
    ])
    .unwrap();
    let out = l.inner_join(&r, ["a", "b"]).unwrap();
    assert_eq!(out.column_names(), &["a", "b", "v", "w"]);
    assert_eq!(out.num_rows(), 2);
    assert_eq!(out.value("v", 0).unwrap(), ScalarValue::Int32(2));
    assert_eq!(out.value("w", 1).unwrap(), ScalarValue::Int32(20));
}

#[test]
fn differently_named_keys_are_both_kept() {
    let l = Table::from_rows(vec![Row::new().with("lid", 1).with("v", "a")]).unwrap();
    let r = Table::from_rows(vec![Row::new().with("rid", 1).with("v", "b")]).unwrap();
    let out = l.inner_join(&r, ("lid", "rid")).unwrap();
    assert_eq!(out.column_names(), &["lid", "v_x", "rid", "v_y"]);
}

#[test]
fn custom_and_missing_suffixes() {
    let l = Table::from_rows(vec![Row::new().with("id", 1).with("v", "a")]).unwrap();
    let r = Table::from_rows(vec![Row::new().with("id", 1).with("v", "b")]).unwrap();

    let opts = JoinOptions::new("id").with_suffixes(Suffixes::new("_l", "_r"));
    let out = l.join(&r, JoinKind::Inner, &opts).unwrap();
    assert_eq!(out.column_names(), &["id", "v_l", "v_r"]);

    let opts = JoinOptions::new("id").with_suffixes(Suffixes {
        left: None,
        right: Some("_r".into()),
    });
    let out = l.join(&r, JoinKind::Inner, &opts).unwrap();
    assert_eq!(out.column_names(), &["id", "v", "v_r"]);

    let opts = JoinOptions::new("id").with_suffixes(Suffixes::none());
    let err = l.join(&r, JoinKind::Inner, &opts).unwrap_err();
    assert!(matches!(err, TesseraError::DuplicateColumn(ref c) if c == "v"));
}

#[test]
fn engine_default_suffixes_apply() {
    let engine = Engine::new(EngineConfig {
        default_suffixes: Suffixes::new("_left", "_right"),
        ..Default::default()
    });
    let l = Table::from_rows(vec![Row::new().with("id", 1).with("v", "a")]).unwrap();
    let r = Table::from_rows(vec![Row::new().with("id", 1).with("v", "b")]).unwrap();
    let out = engine
        .join(&l, &r, JoinKind::Inner, &JoinOptions::new("id"))
        .unwrap();
    assert_eq!(out.column_names(), &["id", "v_left", "v_right"]);
}

#[test]
fn missing_key_reports_side_and_column() {
    let err = left().inner_join(&right(), ("v", "v")).unwrap_err();
    assert!(matches!(
        err,
        TesseraError::JoinKeyNotFound { side: JoinSide::Right, ref column } if column == "v"
    ));
    let err = left()
        .inner_join(&right(), JoinOn::pairs(["id", "v"], ["id"]))
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArguments(_)));
}

#[test]
fn mixed_numeric_key_types_unify() {
    let l = Table::from_columns(vec![("k", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![
        ("k", Arc::new(Float64Array::from(vec![2.0, 2.5])) as ArrayRef),
        ("w", Arc::new(Int64Array::from(vec![20, 25])) as ArrayRef),
    ])
    .unwrap();
    let out = l.inner_join(&r, "k").unwrap();
    assert_eq!(int_col(&out, "w"), vec![Some(20)]);
    // unified key keeps the left column's type
    assert_eq!(out.column("k").unwrap().data_type(), &DataType::Int32);
}

#[test]
fn outer_join_merged_key_keeps_right_values() {
    let l = Table::from_columns(vec![("id", Arc::new(Int64Array::from(vec![1])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![("id", Arc::new(Float64Array::from(vec![2.5])) as ArrayRef)])
        .unwrap();
    let out = l.outer_join(&r, "id").unwrap();
    let ids = out.column("id").unwrap();
    assert_eq!(ids.data_type(), &DataType::Float64);
    assert_eq!(ids.as_primitive::<Float64Type>().values().to_vec(), vec![1.0, 2.5]);

    let l = Table::from_columns(vec![("id", Arc::new(Int32Array::from(vec![1])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![(
        "id",
        Arc::new(Int64Array::from(vec![5_000_000_000])) as ArrayRef,
    )])
    .unwrap();
    let out = l.outer_join(&r, "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(1), Some(5_000_000_000)]);
}

#[test]
fn outer_join_with_all_null_left_key() {
    let l = Table::from_columns(vec![
        ("id", Arc::new(NullArray::new(1)) as ArrayRef),
        ("v", Arc::new(Int64Array::from(vec![7])) as ArrayRef),
    ])
    .unwrap();
    let r = Table::from_columns(vec![("id", Arc::new(Int64Array::from(vec![2])) as ArrayRef)])
        .unwrap();
    let out = l.outer_join(&r, "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![None, Some(2)]);
    assert_eq!(int_col(&out, "v"), vec![Some(7), None]);
}

#[test]
fn right_join_mixed_key_takes_right_values() {
    let l = Table::from_columns(vec![("k", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![(
        "k",
        Arc::new(Float64Array::from(vec![2.0, 3.5])) as ArrayRef,
    )])
    .unwrap();
    let out = l.right_join(&r, "k").unwrap();
    let mut keys: Vec<f64> = out
        .column("k")
        .unwrap()
        .as_primitive::<Float64Type>()
        .values()
        .to_vec();
    keys.sort_by(f64::total_cmp);
    assert_eq!(keys, vec![2.0, 3.5]);
}

#[test]
fn date_keys_compare_as_the_same_day() {
    let l = Table::from_columns(vec![("d", Arc::new(Date32Array::from(vec![1])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![
        ("d", Arc::new(Date64Array::from(vec![86_400_000, 1])) as ArrayRef),
        ("w", Arc::new(Int64Array::from(vec![10, 20])) as ArrayRef),
    ])
    .unwrap();
    let out = l.inner_join(&r, "d").unwrap();
    assert_eq!(int_col(&out, "w"), vec![Some(10)]);
}

#[test]
fn timestamp_keys_compare_at_the_finer_unit() {
    let l = Table::from_columns(vec![(
        "ts",
        Arc::new(TimestampSecondArray::from(vec![1])) as ArrayRef,
    )])
    .unwrap();
    let r = Table::from_columns(vec![
        ("ts", Arc::new(TimestampMillisecondArray::from(vec![1_500, 1_000])) as ArrayRef),
        ("w", Arc::new(Int64Array::from(vec![15, 10])) as ArrayRef),
    ])
    .unwrap();
    let out = l.inner_join(&r, "ts").unwrap();
    assert_eq!(int_col(&out, "w"), vec![Some(10)]);
}

#[test]
fn temporal_and_integer_keys_do_not_unify() {
    let l = Table::from_columns(vec![("d", Arc::new(Date32Array::from(vec![1])) as ArrayRef)])
        .unwrap();
    let r = Table::from_columns(vec![("d", Arc::new(Int64Array::from(vec![1])) as ArrayRef)])
        .unwrap();
    let err = l.inner_join(&r, "d").unwrap_err();
    assert!(matches!(err, TesseraError::TypeMismatch { .. }));
}

#[test]
fn text_and_number_keys_do_not_unify() {
    let l = Table::from_rows(vec![Row::new().with("k", 1)]).unwrap();
    let r = Table::from_rows(vec![Row::new().with("k", "1")]).unwrap();
    let err = l.inner_join(&r, "k").unwrap_err();
    assert!(matches!(err, TesseraError::TypeMismatch { .. }));
}

#[test]
fn null_keys_match_only_when_requested() {
    let l = Table::from_columns(vec![(
        "k",
        Arc::new(StringArray::from(vec![None, Some("a")])) as ArrayRef,
    )])
    .unwrap();
    let r = Table::from_columns(vec![
        ("k", Arc::new(StringArray::from(vec![None, Some("a")])) as ArrayRef),
        ("w", Arc::new(Int64Array::from(vec![0, 1])) as ArrayRef),
    ])
    .unwrap();
    let out = l.inner_join(&r, "k").unwrap();
    assert_eq!(int_col(&out, "w"), vec![Some(1)]);

    let opts = JoinOptions::new("k").with_null_equals_null(true);
    let out = l.join(&r, JoinKind::Inner, &opts).unwrap();
    assert_eq!(int_col(&out, "w"), vec![Some(0), Some(1)]);
}

// ═══════════════════════════════════════════════════════════
// Views, empty inputs, strategies
// ═══════════════════════════════════════════════════════════

#[test]
fn joins_respect_views() {
    let l = Table::from_rows((1..=5i64).map(|i| Row::new().with("id", i)))
        .unwrap()
        .order_by(&[("id", false)])
        .unwrap()
        .head(3)
        .unwrap();
    let r = Table::from_rows((1..=5i64).map(|i| Row::new().with("id", i).with("sq", i * i))).unwrap();
    let out = l.inner_join(&r, "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(5), Some(4), Some(3)]);
    assert_eq!(int_col(&out, "sq"), vec![Some(25), Some(16), Some(9)]);
}

#[test]
fn empty_inputs() {
    let empty_r = right().filter(&[false, false]).unwrap();
    let out = left().inner_join(&empty_r, "id").unwrap();
    assert_eq!(out.num_rows(), 0);
    assert_eq!(out.column_names(), &["id", "v", "w"]);

    let out = left().left_join(&empty_r, "id").unwrap();
    assert_eq!(out.num_rows(), 2);
    assert_eq!(out.column("w").unwrap().null_count(), 2);

    let empty_l = left().head(0).unwrap();
    let out = empty_l.right_join(&right(), "id").unwrap();
    assert_eq!(int_col(&out, "id"), vec![Some(2), Some(3)]);
    assert_eq!(out.column("v").unwrap().null_count(), 2);

    let out = empty_l.outer_join(&empty_r, "id").unwrap();
    assert_eq!(out.num_rows(), 0);
    assert_eq!(out.column_names(), &["id", "v", "w"]);
}

#[test]
fn strategies_agree_on_every_kind() {
    let l = Table::from_rows((0..40i64).map(|i| Row::new().with("k", i % 7).with("s", format!("l{i}"))))
        .unwrap();
    let r = Table::from_rows((0..30i64).map(|i| Row::new().with("k", (i * 3) % 11).with("t", i)))
        .unwrap();
    for kind in [JoinKind::Inner, JoinKind::Left, JoinKind::Right, JoinKind::Outer] {
        let opts = JoinOptions::new("k");
        let vectorized = engine_with(JoinStrategy::Vectorized)
            .join_indices(&l, &r, kind, &opts)
            .unwrap();
        let hash = engine_with(JoinStrategy::Hash)
            .join_indices(&l, &r, kind, &opts)
            .unwrap();
        assert_eq!(vectorized, hash, "{kind:?}");
    }
}

#[test]
fn threshold_switches_strategy_without_changing_output() {
    let small = Engine::new(EngineConfig {
        join_hash_threshold: 1_000_000,
        ..Default::default()
    });
    let large = Engine::new(EngineConfig {
        join_hash_threshold: 0,
        ..Default::default()
    });
    let a = small
        .join(&left(), &right(), JoinKind::Outer, &JoinOptions::new("id"))
        .unwrap();
    let b = large
        .join(&left(), &right(), JoinKind::Outer, &JoinOptions::new("id"))
        .unwrap();
    assert_eq!(a.rows().unwrap(), b.rows().unwrap());
}

// ═══════════════════════════════════════════════════════════
// Cross join
// ═══════════════════════════════════════════════════════════

#[test]
fn cross_join_left_major() {
    let out = left().cross_join(&right(), None).unwrap();
    assert_eq!(out.num_rows(), 4);
    assert_eq!(out.column_names(), &["id_x", "v", "id_y", "w"]);
    assert_eq!(
        int_col(&out, "id_x"),
        vec![Some(1), Some(1), Some(2), Some(2)]
    );
    assert_eq!(
        int_col(&out, "id_y"),
        vec![Some(2), Some(3), Some(2), Some(3)]
    );
}

#[test]
fn cross_join_guard() {
    let err = left().cross_join(&right(), Some(3)).unwrap_err();
    assert!(matches!(
        err,
        TesseraError::RowCountGuardExceeded { rows: 4, max_rows: 3 }
    ));
    assert_eq!(left().cross_join(&right(), Some(4)).unwrap().num_rows(), 4);
}
