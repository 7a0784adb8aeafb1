//! Estimates the smallest time grain a temporal column can reliably roll
//! up to.
//!
//! Samples up to 500 000 rows, computes an approximate distinct count per
//! temporal extractor, and classifies with a first-match rule chain from
//! millisecond up through year. The heuristic covers the common grains
//! only; quarters and irregular cadences come back unspecified.

use async_trait::async_trait;
use quarry_common::models::TimeGrain;
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

const SAMPLE_SIZE: i64 = 500_000;

#[derive(Debug, Clone)]
pub struct ColumnTimeGrain {
    pub table_name: String,
    pub column_name: String,
    pub result: TimeGrain,
}

/// Approximate distinct counts per extractor over the sample, plus whether
/// every value falls on the last day of its month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct GrainCounts {
    pub year: f64,
    pub month: f64,
    pub dayofyear: f64,
    pub dayofmonth: f64,
    pub lastdayofmonth: bool,
    pub weekofyear: f64,
    pub dayofweek: f64,
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
    pub ms: f64,
}

/// First matching rule wins, finest grain first.
pub(crate) fn classify_grain(c: &GrainCounts) -> TimeGrain {
    if c.ms > 1.0 {
        TimeGrain::Millisecond
    } else if c.second > 1.0 {
        TimeGrain::Second
    } else if c.minute > 1.0 {
        TimeGrain::Minute
    } else if c.hour > 1.0 {
        TimeGrain::Hour
    } else if c.dayofyear == 1.0 && c.year > 1.0 {
        TimeGrain::Year
    } else if (c.dayofmonth == 1.0 || c.lastdayofmonth) && c.month > 1.0 {
        TimeGrain::Month
    } else if c.dayofweek == 1.0 && c.weekofyear > 1.0 {
        TimeGrain::Week
    } else if c.hour == 1.0 {
        TimeGrain::Day
    } else {
        TimeGrain::Unspecified
    }
}

impl ColumnTimeGrain {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: TimeGrain::Unspecified,
        }
    }

    fn count_sql(&self) -> String {
        format!(
            "SELECT count(*) AS c FROM {tbl}",
            tbl = safe_name(&self.table_name)
        )
    }

    fn estimate_sql(&self, total_rows: i64) -> String {
        let sample_clause = if total_rows < SAMPLE_SIZE {
            String::new()
        } else {
            format!("USING SAMPLE {SAMPLE_SIZE} ROWS")
        };
        format!(
            r#"WITH cleaned_column AS (
  SELECT {col} AS cd FROM {tbl} {sample_clause}
)
SELECT
  approx_count_distinct(extract('years' FROM cd)) AS year,
  approx_count_distinct(extract('months' FROM cd)) AS month,
  approx_count_distinct(extract('dayofyear' FROM cd)) AS dayofyear,
  approx_count_distinct(extract('dayofmonth' FROM cd)) AS dayofmonth,
  min(cd = last_day(cd)) = TRUE AS lastdayofmonth,
  approx_count_distinct(extract('weekofyear' FROM cd)) AS weekofyear,
  approx_count_distinct(extract('dayofweek' FROM cd)) AS dayofweek,
  approx_count_distinct(extract('hour' FROM cd)) AS hour,
  approx_count_distinct(extract('minute' FROM cd)) AS minute,
  approx_count_distinct(extract('second' FROM cd)) AS second,
  approx_count_distinct(extract('millisecond' FROM cd) - extract('seconds' FROM cd) * 1000) AS ms
FROM cleaned_column"#,
            col = safe_name(&self.column_name),
            tbl = safe_name(&self.table_name),
        )
    }
}

#[async_trait]
impl Query for ColumnTimeGrain {
    fn key(&self) -> String {
        format!("ColumnTimeGrain:{}:{}", self.table_name, self.column_name)
    }

    fn deps(&self) -> Vec<String> {
        vec![self.table_name.clone()]
    }

    fn dialects(&self) -> &'static [Dialect] {
        &[Dialect::DuckDb]
    }

    fn marshal_result(&self) -> serde_json::Value {
        serde_json::to_value(self.result).unwrap_or_default()
    }

    fn unmarshal_result(&mut self, v: serde_json::Value) -> Result<(), QueryError> {
        self.result = serde_json::from_value(v).map_err(|e| {
            QueryError::Internal(format!("column time grain: mismatched unmarshal input: {e}"))
        })?;
        Ok(())
    }

    async fn resolve(
        &mut self,
        ctx: &ExecCtx,
        rt: &Runtime,
        instance_id: &str,
        priority: i32,
    ) -> Result<(), QueryError> {
        let olap = rt.olap(instance_id)?;

        let mut total_rows: i64 = 0;
        let mut rs = olap
            .execute(ctx, Statement::new(self.count_sql()).with_priority(priority))
            .await?;
        while let Some(row) = rs.next_row().await? {
            (total_rows,) = row.scan()?;
        }
        drop(rs);

        let mut rs = olap
            .execute(
                ctx,
                Statement::new(self.estimate_sql(total_rows)).with_priority(priority),
            )
            .await?;
        let row = match rs.next_row().await? {
            Some(row) => row,
            None => {
                self.result = TimeGrain::Unspecified;
                return Ok(());
            }
        };

        type GrainRow = (
            f64,
            f64,
            f64,
            f64,
            Option<bool>,
            f64,
            f64,
            f64,
            f64,
            f64,
            f64,
        );
        let (
            year,
            month,
            dayofyear,
            dayofmonth,
            lastdayofmonth,
            weekofyear,
            dayofweek,
            hour,
            minute,
            second,
            ms,
        ): GrainRow = row.scan()?;

        self.result = classify_grain(&GrainCounts {
            year,
            month,
            dayofyear,
            dayofmonth,
            lastdayofmonth: lastdayofmonth.unwrap_or(false),
            weekofyear,
            dayofweek,
            hour,
            minute,
            second,
            ms,
        });
        Ok(())
    }
}
