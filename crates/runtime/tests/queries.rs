//! End-to-end query resolution against the fake engine.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::{result, FakeEngine};
use quarry_common::models::{
    MetricsView, MetricsViewDimension, MetricsViewMeasure, NumericStatistics, TimeGrain,
};
use quarry_common::{Interval, Value};
use quarry_runtime::catalog::{Catalog, CatalogEntry};
use quarry_runtime::engine::{ConnectionGate, Dialect, ExecCtx, TypeCode};
use quarry_runtime::error::QueryError;
use quarry_runtime::queries::{
    ColumnCardinality, ColumnDescriptiveStatistics, ColumnNullCount, ColumnNumericHistogram,
    ColumnTimeGrain, ColumnTimeRange, ColumnTopK, MetricsViewToplist, Query,
};
use quarry_runtime::{CacheConfig, Runtime};

struct FakeCatalog {
    views: Vec<MetricsView>,
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn get_entry(
        &self,
        _ctx: &ExecCtx,
        _instance_id: &str,
        name: &str,
    ) -> Result<CatalogEntry, QueryError> {
        if name == "not_a_view" {
            return Ok(CatalogEntry {
                name: name.to_string(),
                metrics_view: None,
            });
        }
        self.views
            .iter()
            .find(|v| v.name == name)
            .map(|v| CatalogEntry {
                name: name.to_string(),
                metrics_view: Some(v.clone()),
            })
            .ok_or_else(|| QueryError::NotFound(format!("entry '{name}' not found")))
    }
}

fn runtime_with(engine: Arc<FakeEngine>, views: Vec<MetricsView>) -> Runtime {
    let rt = Runtime::new(Arc::new(FakeCatalog { views }), CacheConfig::default());
    rt.register_instance("default", Arc::new(ConnectionGate::new(engine, 2)));
    rt
}

#[tokio::test]
async fn null_count_resolves_and_caches() -> anyhow::Result<()> {
    let engine = FakeEngine::new();
    engine.respond(
        "SELECT count(*) AS count FROM \"events\" WHERE \"user_id\" IS NULL",
        result(&[("count", TypeCode::Int)], vec![vec![Value::Int(42)]]),
    );
    let rt = runtime_with(engine.clone(), vec![]);
    let ctx = ExecCtx::new();

    let mut q = ColumnNullCount::new("events", "user_id");
    rt.query(&ctx, "default", &mut q, 1).await?;
    assert_eq!(q.result, 42.0);

    // Second run is served from the cache.
    let mut q2 = ColumnNullCount::new("events", "user_id");
    rt.query(&ctx, "default", &mut q2, 1).await?;
    assert_eq!(q2.result, 42.0);
    assert_eq!(engine.executions("count(*) as count"), 1);

    // Invalidate the table and the query re-executes.
    rt.invalidate_table("default", "events").await;
    let mut q3 = ColumnNullCount::new("events", "user_id");
    rt.query(&ctx, "default", &mut q3, 1).await?;
    assert_eq!(engine.executions("count(*) as count"), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_instance_is_invalid_argument() {
    let engine = FakeEngine::new();
    let rt = runtime_with(engine, vec![]);
    let mut q = ColumnNullCount::new("events", "user_id");
    let err = rt
        .query(&ExecCtx::new(), "missing", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}

#[tokio::test]
async fn dialect_mismatch_is_unsupported() {
    let engine = FakeEngine::with_dialect(Dialect::ClickHouse);
    let rt = runtime_with(engine, vec![]);
    let mut q = ColumnNullCount::new("events", "user_id");
    let err = rt
        .query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(Dialect::ClickHouse)));
}

#[tokio::test]
async fn descriptive_statistics_of_empty_column_are_empty() {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "stddev_pop",
        result(
            &[
                ("min", TypeCode::Float),
                ("q25", TypeCode::Float),
                ("q50", TypeCode::Float),
                ("q75", TypeCode::Float),
                ("max", TypeCode::Float),
                ("mean", TypeCode::Float),
                ("sd", TypeCode::Float),
            ],
            vec![vec![
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ]],
        ),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnDescriptiveStatistics::new("events", "latency");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert_eq!(q.result, NumericStatistics::default());
}

#[tokio::test]
async fn cardinality_requires_a_row() {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "approx_count_distinct",
        result(&[("count", TypeCode::Int)], vec![]),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnCardinality::new("events", "session");
    let err = rt
        .query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Internal(_)));
}

#[tokio::test]
async fn time_range_decodes_native_interval() {
    let engine = FakeEngine::new();
    let min = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    let max = Utc.with_ymd_and_hms(2022, 4, 1, 0, 0, 0).unwrap();
    engine.respond_contains(
        "as interval",
        result(
            &[
                ("min", TypeCode::Timestamp),
                ("max", TypeCode::Timestamp),
                ("interval", TypeCode::Interval),
            ],
            vec![vec![
                Value::Timestamp(min),
                Value::Timestamp(max),
                Value::Interval(Interval {
                    months: 3,
                    days: 0,
                    micros: 0,
                }),
            ]],
        ),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnTimeRange::new("events", "created_at");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert_eq!(q.result.min, Some(min));
    assert_eq!(q.result.max, Some(max));
    assert_eq!(
        q.result.interval,
        Some(Interval {
            months: 3,
            days: 0,
            micros: 0,
        })
    );
}

#[tokio::test]
async fn time_range_decodes_day_count_for_date_columns() {
    let engine = FakeEngine::new();
    let min = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    let max = Utc.with_ymd_and_hms(2022, 3, 2, 0, 0, 0).unwrap();
    engine.respond_contains(
        "as interval",
        result(
            &[
                ("min", TypeCode::Timestamp),
                ("max", TypeCode::Timestamp),
                ("interval", TypeCode::Int),
            ],
            vec![vec![
                Value::Timestamp(min),
                Value::Timestamp(max),
                Value::Int(60),
            ]],
        ),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnTimeRange::new("events", "day");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert_eq!(
        q.result.interval,
        Some(Interval {
            months: 0,
            days: 60,
            micros: 0,
        })
    );
}

#[tokio::test]
async fn time_range_rejects_other_interval_shapes() {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "as interval",
        result(
            &[
                ("min", TypeCode::Timestamp),
                ("max", TypeCode::Timestamp),
                ("interval", TypeCode::String),
            ],
            vec![vec![
                Value::Timestamp(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()),
                Value::Timestamp(Utc.with_ymd_and_hms(2022, 1, 2, 0, 0, 0).unwrap()),
                Value::String("1 day".into()),
            ]],
        ),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnTimeRange::new("events", "created_at");
    let err = rt
        .query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Internal(_)));
}

#[tokio::test]
async fn numeric_histogram_end_to_end() {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "as iqr",
        result(
            &[
                ("iqr", TypeCode::Float),
                ("count", TypeCode::Int),
                ("range", TypeCode::Float),
            ],
            vec![vec![
                Value::Float(50.0),
                Value::Int(10_000),
                Value::Float(100.0),
            ]],
        ),
    );
    // Freedman–Diaconis lands on 22 buckets for this column.
    engine.respond_contains(
        "range(0,22,1)",
        result(
            &[
                ("bucket", TypeCode::Int),
                ("low", TypeCode::Float),
                ("high", TypeCode::Float),
                ("count", TypeCode::Int),
            ],
            vec![
                vec![
                    Value::Int(0),
                    Value::Float(0.0),
                    Value::Float(4.5),
                    Value::Int(120),
                ],
                vec![
                    Value::Int(1),
                    Value::Float(4.5),
                    Value::Float(9.0),
                    Value::Int(80),
                ],
            ],
        ),
    );
    let rt = runtime_with(engine, vec![]);

    let mut q = ColumnNumericHistogram::new("events", "latency");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert_eq!(q.result.len(), 2);
    assert_eq!(q.result[0].count, 120);
    assert_eq!(q.result[1].bucket, 1);
}

#[tokio::test]
async fn numeric_histogram_empty_when_no_spread() {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "as iqr",
        result(
            &[
                ("iqr", TypeCode::Float),
                ("count", TypeCode::Int),
                ("range", TypeCode::Float),
            ],
            vec![vec![Value::Float(0.0), Value::Int(1), Value::Float(0.0)]],
        ),
    );
    let rt = runtime_with(engine.clone(), vec![]);

    let mut q = ColumnNumericHistogram::new("events", "constant");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert!(q.result.is_empty());
    // Phase two never ran.
    assert_eq!(engine.executions("histogram_with_edge"), 0);
}

#[tokio::test]
async fn time_grain_estimation_end_to_end() {
    let engine = FakeEngine::new();
    engine.respond(
        "SELECT count(*) AS c FROM \"events\"",
        result(&[("c", TypeCode::Int)], vec![vec![Value::Int(72)]]),
    );
    // Hourly cadence over three days.
    engine.respond_contains(
        "lastdayofmonth",
        result(
            &[
                ("year", TypeCode::Int),
                ("month", TypeCode::Int),
                ("dayofyear", TypeCode::Int),
                ("dayofmonth", TypeCode::Int),
                ("lastdayofmonth", TypeCode::Bool),
                ("weekofyear", TypeCode::Int),
                ("dayofweek", TypeCode::Int),
                ("hour", TypeCode::Int),
                ("minute", TypeCode::Int),
                ("second", TypeCode::Int),
                ("ms", TypeCode::Int),
            ],
            vec![vec![
                Value::Int(1),
                Value::Int(1),
                Value::Int(3),
                Value::Int(3),
                Value::Bool(false),
                Value::Int(1),
                Value::Int(3),
                Value::Int(24),
                Value::Int(1),
                Value::Int(1),
                Value::Int(1),
            ]],
        ),
    );
    let rt = runtime_with(engine.clone(), vec![]);

    let mut q = ColumnTimeGrain::new("events", "ts");
    rt.query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap();
    assert_eq!(q.result, TimeGrain::Hour);
    // 72 rows is under the sample threshold.
    assert_eq!(engine.executions("using sample"), 0);
}

#[tokio::test]
async fn toplist_resolves_through_the_catalog() -> anyhow::Result<()> {
    let engine = FakeEngine::new();
    engine.respond_contains(
        "group by \"domain\"",
        result(
            &[("domain", TypeCode::String), ("total", TypeCode::Int)],
            vec![
                vec![Value::from("news.com"), Value::Int(10)],
                vec![Value::from("sports.com"), Value::Int(7)],
            ],
        ),
    );
    let view = MetricsView {
        name: "ad_bids".into(),
        model: "ad_bids_model".into(),
        time_dimension: Some("timestamp".into()),
        dimensions: vec![MetricsViewDimension {
            name: "domain".into(),
            label: String::new(),
        }],
        measures: vec![MetricsViewMeasure {
            name: "total".into(),
            expression: "count(*)".into(),
            label: String::new(),
        }],
    };
    let rt = runtime_with(engine, vec![view]);

    let mut q = MetricsViewToplist {
        metrics_view_name: "ad_bids".into(),
        dimension_name: "domain".into(),
        measure_names: vec!["total".into()],
        time_start: None,
        time_end: None,
        limit: None,
        offset: None,
        sort: vec![],
        filter: None,
        result: None,
    };
    rt.query(&ExecCtx::new(), "default", &mut q, 0).await?;

    let result = q.result.expect("toplist result populated");
    assert_eq!(result.meta.len(), 2);
    assert_eq!(result.data.len(), 2);
    assert_eq!(
        result.data[0].get("domain"),
        Some(&serde_json::json!("news.com"))
    );
    assert_eq!(result.data[0].get("total"), Some(&serde_json::json!(10)));
    Ok(())
}

#[tokio::test]
async fn toplist_catalog_miss_is_invalid_argument() {
    let engine = FakeEngine::new();
    let rt = runtime_with(engine, vec![]);
    let mut q = MetricsViewToplist {
        metrics_view_name: "missing".into(),
        dimension_name: "domain".into(),
        measure_names: vec![],
        time_start: None,
        time_end: None,
        limit: None,
        offset: None,
        sort: vec![],
        filter: None,
        result: None,
    };
    let err = rt
        .query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
}

#[tokio::test]
async fn toplist_on_non_view_entry_is_not_found() {
    let engine = FakeEngine::new();
    let rt = runtime_with(engine, vec![]);
    let mut q = MetricsViewToplist {
        metrics_view_name: "not_a_view".into(),
        dimension_name: "domain".into(),
        measure_names: vec![],
        time_start: None,
        time_end: None,
        limit: None,
        offset: None,
        sort: vec![],
        filter: None,
        result: None,
    };
    let err = rt
        .query(&ExecCtx::new(), "default", &mut q, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound(_)));
}

#[tokio::test]
async fn results_round_trip_through_marshal() {
    let mut topk = ColumnTopK::new("t", "c", None, None);
    topk.result = vec![quarry_common::models::TopKEntry {
        value: Value::from("US"),
        count: 3.0,
    }];
    let mut topk2 = ColumnTopK::new("t", "c", None, None);
    topk2.unmarshal_result(topk.marshal_result()).unwrap();
    assert_eq!(topk2.result, topk.result);

    let mut grain = ColumnTimeGrain::new("t", "c");
    grain.result = TimeGrain::Week;
    let mut grain2 = ColumnTimeGrain::new("t", "c");
    grain2.unmarshal_result(grain.marshal_result()).unwrap();
    assert_eq!(grain2.result, TimeGrain::Week);

    let mut range = ColumnTimeRange::new("t", "c");
    range.result.min = Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());
    range.result.interval = Some(Interval {
        months: 1,
        days: 2,
        micros: 3,
    });
    let mut range2 = ColumnTimeRange::new("t", "c");
    range2.unmarshal_result(range.marshal_result()).unwrap();
    assert_eq!(range2.result, range.result);

    // A mismatched payload is rejected.
    let mut bad = ColumnTimeGrain::new("t", "c");
    assert!(bad
        .unmarshal_result(serde_json::json!({"nope": true}))
        .is_err());
}
