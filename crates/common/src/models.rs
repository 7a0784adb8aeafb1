//! Wire models for the profiling and metrics-view APIs.
//!
//! These structs mirror the transport protobuf messages field for field and
//! are served as JSON. Summary types use externally tagged enums where the
//! protobuf uses a oneof.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::{Interval, Value};

// --- Filter predicate ---

/// A structured include/exclude predicate over dimension columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub include: Vec<Cond>,
    #[serde(default)]
    pub exclude: Vec<Cond>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// One dimension condition: exact matches plus case-insensitive patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cond {
    pub name: String,
    #[serde(default, rename = "in")]
    pub in_: Vec<Value>,
    #[serde(default)]
    pub like: Vec<String>,
}

// --- Column profiling requests ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopKRequest {
    pub instance_id: String,
    pub table_name: String,
    pub column_name: String,
    /// Aggregate expression, defaults to `count(*)`.
    #[serde(default)]
    pub agg: Option<String>,
    /// Number of groups to return, defaults to 50.
    #[serde(default)]
    pub k: Option<u32>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRequest {
    pub instance_id: String,
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub priority: i32,
}

// --- Column profiling responses ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKEntry {
    pub value: Value,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalSummary {
    TopK(Vec<TopKEntry>),
    Cardinality(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStatistics {
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
    pub mean: f64,
    pub sd: f64,
}

/// One `[low, high)` histogram interval; the last bucket is closed on `high`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub bucket: i64,
    pub low: f64,
    pub high: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierBin {
    pub bucket: i64,
    pub low: f64,
    pub high: f64,
    pub present: bool,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericSummary {
    Statistics(NumericStatistics),
    Histogram(Vec<HistogramBin>),
    Outliers(Vec<OutlierBin>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeSummary {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
    pub interval: Option<Interval>,
}

/// The smallest rollup grain the column's data can reliably support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrain {
    #[default]
    Unspecified,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopKResponse {
    pub categorical_summary: CategoricalSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullCountResponse {
    pub count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveStatisticsResponse {
    pub numeric_summary: NumericSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardinalityResponse {
    pub categorical_summary: CategoricalSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericHistogramResponse {
    pub numeric_summary: NumericSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RugHistogramResponse {
    pub numeric_summary: NumericSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRangeSummaryResponse {
    pub time_range_summary: TimeRangeSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeGrainResponse {
    pub time_grain: TimeGrain,
}

// --- Metrics views ---

/// Catalog definition of a metrics view: a model plus named dimensions and
/// measure expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
    pub name: String,
    /// Table or model the view reads from.
    pub model: String,
    #[serde(default)]
    pub time_dimension: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<MetricsViewDimension>,
    #[serde(default)]
    pub measures: Vec<MetricsViewMeasure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsViewDimension {
    pub name: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsViewMeasure {
    pub name: String,
    /// SQL aggregate expression, e.g. `sum(revenue)`.
    pub expression: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsViewColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_code: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsViewSort {
    pub name: String,
    #[serde(default)]
    pub ascending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsViewToplistRequest {
    pub instance_id: String,
    pub metrics_view_name: String,
    pub dimension_name: String,
    pub measure_names: Vec<String>,
    #[serde(default)]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub sort: Vec<MetricsViewSort>,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsViewTotalsRequest {
    pub instance_id: String,
    pub metrics_view_name: String,
    pub measure_names: Vec<String>,
    #[serde(default)]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsViewToplistResponse {
    pub meta: Vec<MetricsViewColumn>,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsViewTotalsResponse {
    pub meta: Vec<MetricsViewColumn>,
    pub data: serde_json::Map<String, serde_json::Value>,
}
