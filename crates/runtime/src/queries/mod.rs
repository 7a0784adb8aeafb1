//! Typed analytic queries.
//!
//! Each query kind is a struct carrying its parameters and a `result` slot;
//! [`Query`] gives the coordinator a uniform handle for cache keys,
//! dependency tracking, dialect checks, and resolution. SQL builders are
//! plain methods so the generated text can be unit-tested without an
//! engine.

use async_trait::async_trait;
use quarry_common::models::{MetricsView, MetricsViewColumn};

use crate::engine::{Dialect, ExecCtx, ResultSet};
use crate::error::QueryError;
use crate::Runtime;

mod column_cardinality;
mod column_descriptive_statistics;
mod column_null_count;
mod column_numeric_histogram;
mod column_rug_histogram;
mod column_time_grain;
mod column_time_range;
mod column_topk;
mod metrics_view_toplist;
mod metrics_view_totals;

pub use column_cardinality::ColumnCardinality;
pub use column_descriptive_statistics::ColumnDescriptiveStatistics;
pub use column_null_count::ColumnNullCount;
pub use column_numeric_histogram::ColumnNumericHistogram;
pub use column_rug_histogram::ColumnRugHistogram;
pub use column_time_grain::ColumnTimeGrain;
pub use column_time_range::ColumnTimeRange;
pub use column_topk::ColumnTopK;
pub use metrics_view_toplist::MetricsViewToplist;
pub use metrics_view_totals::MetricsViewTotals;

/// A resolvable query with a stable cache identity.
#[async_trait]
pub trait Query: Send {
    /// Stable identity for result caching.
    fn key(&self) -> String;

    /// Tables (or catalog objects) this query reads.
    fn deps(&self) -> Vec<String>;

    /// Dialects the query can compile for.
    fn dialects(&self) -> &'static [Dialect];

    /// Serializes the populated result.
    fn marshal_result(&self) -> serde_json::Value;

    /// Restores a result produced by [`marshal_result`](Query::marshal_result).
    fn unmarshal_result(&mut self, v: serde_json::Value) -> Result<(), QueryError>;

    /// Executes the query and writes into the struct's result slot.
    async fn resolve(
        &mut self,
        ctx: &ExecCtx,
        rt: &Runtime,
        instance_id: &str,
        priority: i32,
    ) -> Result<(), QueryError>;
}

/// Resolves a metrics view by catalog name. A missing entry is an invalid
/// argument (the name came from the request); an entry of another kind is
/// not-found.
pub(crate) async fn lookup_metrics_view(
    ctx: &ExecCtx,
    rt: &Runtime,
    instance_id: &str,
    name: &str,
) -> Result<MetricsView, QueryError> {
    let entry = rt
        .catalog()
        .get_entry(ctx, instance_id, name)
        .await
        .map_err(|e| QueryError::InvalidInput(e.to_string()))?;
    entry
        .metrics_view
        .ok_or_else(|| QueryError::NotFound(format!("object named '{name}' is not a metrics view")))
}

/// Drains a result set into JSON row objects.
pub(crate) async fn rows_to_data(
    rs: &mut ResultSet,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, QueryError> {
    let mut data = Vec::new();
    while let Some(row) = rs.next_row().await? {
        let map = rs.map_scan(&row);
        let mut obj = serde_json::Map::with_capacity(map.len());
        for (name, value) in map {
            obj.insert(name, value.to_json());
        }
        data.push(obj);
    }
    Ok(data)
}

pub(crate) fn schema_to_columns(rs: &ResultSet) -> Vec<MetricsViewColumn> {
    rs.schema()
        .fields
        .iter()
        .map(|f| MetricsViewColumn {
            name: f.name.clone(),
            type_code: f.type_code.as_str().to_string(),
            nullable: f.nullable,
        })
        .collect()
}

/// The CTE chain shared by the numeric and rug histograms: non-null values
/// cast to double, bucket edges over `[min, max]`, binned counts, and the
/// right-edge correction folding `v == max` into the last bucket (`floor`
/// never reaches the bucket count).
pub(crate) fn histogram_cte(column: &str, table: &str, buckets: i64) -> String {
    let col = quarry_sql::safe_name(column);
    let tbl = quarry_sql::safe_name(table);
    format!(
        r#"WITH data_table AS (
  SELECT {col}::DOUBLE AS value
  FROM {tbl}
  WHERE {col} IS NOT NULL
), s AS (
  SELECT
    min(value) AS min_val,
    max(value) AS max_val,
    max(value) - min(value) AS range
  FROM data_table
), buckets AS (
  SELECT
    range AS bucket,
    (range) * (SELECT range FROM s) / {buckets} + (SELECT min_val FROM s) AS low,
    (range + 1) * (SELECT range FROM s) / {buckets} + (SELECT min_val FROM s) AS high
  FROM range(0, {buckets}, 1)
), binned_data AS (
  SELECT FLOOR((value - (SELECT min_val FROM s)) / (SELECT range FROM s) * {buckets}) AS bucket
  FROM data_table
), histogram_stage AS (
  SELECT
    buckets.bucket,
    low,
    high,
    SUM(CASE WHEN binned_data.bucket = buckets.bucket THEN 1 ELSE 0 END) AS count
  FROM buckets
  LEFT JOIN binned_data ON binned_data.bucket = buckets.bucket
  GROUP BY buckets.bucket, low, high
  ORDER BY buckets.bucket
), right_edge AS (
  SELECT count(*) AS c FROM data_table WHERE value = (SELECT max_val FROM s)
), histogram_with_edge AS (
  SELECT
    bucket,
    low,
    high,
    CASE WHEN high = (SELECT max(high) FROM histogram_stage)
         THEN count + (SELECT c FROM right_edge)
         ELSE count
    END AS count
  FROM histogram_stage
)"#
    )
}
