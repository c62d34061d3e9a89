use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{AppError, IdentKind};
use crate::server::exec::*;
use crate::server::schema::{ColumnType, TableSchema};
use crate::storage::{MemoryStore, SharedStore, TagStore, TimeSeriesPoint};

fn ts(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap() }

fn wave_ctx(n: i64) -> ExecContext {
    let store = MemoryStore::from_points((0..n).map(|i| TimeSeriesPoint::new("wave.sin", ts(i), i as f64)));
    store.insert_points((0..3).map(|i| TimeSeriesPoint::new("other", ts(i), -(i as f64))));
    ExecContext::new(SharedStore::new(store), TableSchema::default())
}

fn rows(ctx: &ExecContext, sql: &str) -> ResultSet {
    match execute_query(ctx, sql).expect("execute") {
        QueryOutcome::Rows(rs) => rs,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn times(rs: &ResultSet, idx: usize) -> Vec<chrono::NaiveDateTime> {
    rs.rows.iter().map(|r| match &r[idx] {
        Value::Timestamp(t) => *t,
        other => panic!("not a timestamp: {:?}", other),
    }).collect()
}

/// Returns every series newest-first and records the limit it was asked for.
struct DescendingStore {
    points: Vec<TimeSeriesPoint>,
    seen_limit: parking_lot::Mutex<Option<Option<usize>>>,
}

impl TagStore for DescendingStore {
    fn fetch(&self, tag: Option<&str>, limit: Option<usize>) -> Result<Vec<TimeSeriesPoint>> {
        *self.seen_limit.lock() = Some(limit);
        let mut out: Vec<TimeSeriesPoint> = self.points.iter()
            .filter(|p| tag.map(|t| p.name == t).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.time.cmp(&a.time));
        out.truncate(limit.unwrap_or(usize::MAX));
        Ok(out)
    }
}

struct FailingStore;

impl TagStore for FailingStore {
    fn fetch(&self, _tag: Option<&str>, _limit: Option<usize>) -> Result<Vec<TimeSeriesPoint>> {
        Err(anyhow!("segment file /data/seg-0001 is corrupt"))
    }
}

#[test]
fn newest_ten_points_descending() {
    let ctx = wave_ctx(100);
    let rs = rows(&ctx, "SELECT name, time, value FROM example WHERE name = 'wave.sin' ORDER BY time DESC LIMIT 10");
    assert_eq!(rs.row_count(), 10);
    let t = times(&rs, 1);
    assert_eq!(t[0], ts(99).naive_utc());
    assert_eq!(t[9], ts(90).naive_utc());
    assert!(t.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(rs.rows[0][0], Value::Text("wave.sin".into()));
    assert_eq!(rs.rows[0][2], Value::Double(99.0));
}

#[test]
fn limit_larger_than_available() {
    let ctx = wave_ctx(4);
    let rs = rows(&ctx, "SELECT time FROM example WHERE name = 'wave.sin' ORDER BY time DESC LIMIT 50");
    assert_eq!(rs.row_count(), 4);
}

#[test]
fn limit_zero_keeps_metadata() {
    let ctx = wave_ctx(10);
    let rs = rows(&ctx, "SELECT value, name FROM example WHERE name = 'wave.sin' LIMIT 0");
    assert!(rs.rows.is_empty());
    assert_eq!(rs.columns, vec![
        ResultColumn::new("value", ColumnType::Double),
        ResultColumn::new("name", ColumnType::Text),
    ]);
}

#[test]
fn star_expands_in_schema_order() {
    let ctx = wave_ctx(2);
    let rs = rows(&ctx, "SELECT * FROM example WHERE name = 'other'");
    let names: Vec<&str> = rs.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["name", "time", "value"]);
    assert_eq!(rs.row_count(), 3);
}

#[test]
fn projection_keeps_requested_order_and_duplicates() {
    let ctx = wave_ctx(2);
    let rs = rows(&ctx, "SELECT value, value, time FROM example WHERE name = 'wave.sin' LIMIT 1");
    assert_eq!(rs.rows[0], vec![Value::Double(0.0), Value::Double(0.0), Value::Timestamp(ts(0).naive_utc())]);
}

#[test]
fn full_scan_without_predicate() {
    let ctx = wave_ctx(5);
    let rs = rows(&ctx, "SELECT name FROM example");
    // tags in name order, no implicit limit
    assert_eq!(rs.row_count(), 8);
    assert_eq!(rs.rows[0][0], Value::Text("other".into()));
    assert_eq!(rs.rows[7][0], Value::Text("wave.sin".into()));
}

#[test]
fn unknown_tag_is_empty_not_error() {
    let ctx = wave_ctx(5);
    let rs = rows(&ctx, "SELECT * FROM example WHERE name = 'nope'");
    assert_eq!(rs.row_count(), 0);
    assert_eq!(rs.columns.len(), 3);
}

#[test]
fn identifier_errors() {
    let ctx = wave_ctx(1);
    assert_eq!(execute_query(&ctx, "SELECT bogus FROM example").unwrap_err(),
        AppError::UnknownIdentifier { kind: IdentKind::Column, name: "bogus".into() });
    assert_eq!(execute_query(&ctx, "SELECT * FROM missing").unwrap_err(),
        AppError::UnknownIdentifier { kind: IdentKind::Table, name: "missing".into() });
    assert!(matches!(execute_query(&ctx, "SELECT * FROM example ORDER BY bogus"),
        Err(AppError::UnknownIdentifier { kind: IdentKind::Column, .. })));
    assert!(matches!(execute_query(&ctx, "SELECT * FROM example WHERE bogus = 1"),
        Err(AppError::UnknownIdentifier { kind: IdentKind::Column, .. })));
    // case-sensitive
    assert!(matches!(execute_query(&ctx, "SELECT NAME FROM example"),
        Err(AppError::UnknownIdentifier { .. })));
}

#[test]
fn predicate_must_use_name() {
    let ctx = wave_ctx(1);
    let err = execute_query(&ctx, "SELECT * FROM example WHERE value = 1").unwrap_err();
    assert_eq!(err, AppError::UnsupportedPredicate { column: "value".into(), key: "name".into() });
    assert_eq!(err.pgwire_fields().0, "0A000");
}

#[test]
fn numeric_literal_matches_tag_text() {
    let store = MemoryStore::from_points(vec![TimeSeriesPoint::new("42", ts(0), 1.0)]);
    let ctx = ExecContext::new(SharedStore::new(store), TableSchema::default());
    assert_eq!(rows(&ctx, "SELECT * FROM example WHERE name = 42").row_count(), 1);
}

#[test]
fn unordered_store_is_sorted_and_limit_not_pushed_down() {
    let points: Vec<TimeSeriesPoint> = (0..20).map(|i| TimeSeriesPoint::new("t", ts(i), i as f64)).collect();
    let store = std::sync::Arc::new(DescendingStore { points, seen_limit: parking_lot::Mutex::new(None) });
    let ctx = ExecContext { store: SharedStore(store.clone()), schema: std::sync::Arc::new(TableSchema::default()) };

    let rs = rows(&ctx, "SELECT time FROM example WHERE name = 't' ORDER BY time ASC LIMIT 3");
    assert_eq!(times(&rs, 0), vec![ts(0).naive_utc(), ts(1).naive_utc(), ts(2).naive_utc()]);
    assert_eq!(*store.seen_limit.lock(), Some(None));

    let rs = rows(&ctx, "SELECT time FROM example WHERE name = 't' LIMIT 3");
    assert_eq!(rs.row_count(), 3);
    assert_eq!(*store.seen_limit.lock(), Some(Some(3)));
}

#[test]
fn order_by_value_and_name() {
    let store = MemoryStore::from_points(vec![
        TimeSeriesPoint::new("b", ts(0), 2.0),
        TimeSeriesPoint::new("b", ts(1), -1.0),
        TimeSeriesPoint::new("a", ts(2), 5.0),
    ]);
    let ctx = ExecContext::new(SharedStore::new(store), TableSchema::default());
    let rs = rows(&ctx, "SELECT value FROM example ORDER BY value DESC");
    assert_eq!(rs.rows, vec![vec![Value::Double(5.0)], vec![Value::Double(2.0)], vec![Value::Double(-1.0)]]);
    let rs = rows(&ctx, "SELECT name FROM example ORDER BY name DESC LIMIT 1");
    assert_eq!(rs.rows, vec![vec![Value::Text("b".into())]]);
}

#[test]
fn store_failure_is_generic_internal_error() {
    let ctx = ExecContext::new(SharedStore::new(FailingStore), TableSchema::default());
    let err = execute_query(&ctx, "SELECT * FROM example WHERE name = 'x'").unwrap_err();
    let (code, sev, msg) = err.pgwire_fields();
    assert_eq!((code, sev), ("XX000", "ERROR"));
    assert!(!msg.contains("seg-0001"));
}

#[test]
fn repeated_query_is_idempotent() {
    let ctx = wave_ctx(30);
    let sql = "SELECT * FROM example WHERE name = 'wave.sin' ORDER BY time DESC LIMIT 7";
    assert_eq!(rows(&ctx, sql), rows(&ctx, sql));
}

#[test]
fn probe_set_and_empty() {
    let ctx = wave_ctx(1);
    let rs = rows(&ctx, "SELECT 1");
    assert_eq!(rs.columns, vec![ResultColumn::new("?column?", ColumnType::Int4)]);
    assert_eq!(rs.rows, vec![vec![Value::Int4(1)]]);
    assert_eq!(execute_query(&ctx, "SET application_name = 'x'").unwrap(), QueryOutcome::Command("SET"));
    assert_eq!(execute_query(&ctx, "  ").unwrap(), QueryOutcome::Empty);
}

#[test]
fn configured_table_name() {
    let store = MemoryStore::from_points(vec![TimeSeriesPoint::new("a", ts(0), 1.0)]);
    let ctx = ExecContext::new(SharedStore::new(store), TableSchema::new("tags"));
    assert_eq!(rows(&ctx, "SELECT * FROM tags").row_count(), 1);
    assert!(execute_query(&ctx, "SELECT * FROM example").is_err());
}
