//! Numeric histogram with Freedman–Diaconis bucket sizing.

use async_trait::async_trait;
use quarry_common::models::HistogramBin;
use quarry_sql::safe_name;

use super::{histogram_cte, Query};
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct ColumnNumericHistogram {
    pub table_name: String,
    pub column_name: String,
    pub result: Vec<HistogramBin>,
}

impl ColumnNumericHistogram {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: Vec::new(),
        }
    }

    fn bucket_size_sql(&self) -> String {
        let col = safe_name(&self.column_name);
        format!(
            "SELECT approx_quantile({col}, 0.75)-approx_quantile({col}, 0.25) AS iqr, \
             approx_count_distinct({col}) AS count, \
             max({col}) - min({col}) AS range \
             FROM {tbl}",
            tbl = safe_name(&self.table_name),
        )
    }

    fn histogram_sql(&self, buckets: i64) -> String {
        format!(
            "{cte}\nSELECT bucket, low, high, count FROM histogram_with_edge",
            cte = histogram_cte(&self.column_name, &self.table_name, buckets),
        )
    }

    async fn bucket_count(
        &self,
        ctx: &ExecCtx,
        rt: &Runtime,
        instance_id: &str,
        priority: i32,
    ) -> Result<f64, QueryError> {
        let olap = rt.olap(instance_id)?;
        let mut rs = olap
            .execute(
                ctx,
                Statement::new(self.bucket_size_sql()).with_priority(priority),
            )
            .await?;

        let mut iqr: Option<f64> = None;
        let mut count: f64 = 0.0;
        let mut range: Option<f64> = None;
        if let Some(row) = rs.next_row().await? {
            (iqr, count, range) = row.scan()?;
        }
        Ok(freedman_diaconis_buckets(iqr, count, range))
    }
}

/// Picks the bucket count: the distinct count itself under 40 values,
/// otherwise the Freedman–Diaconis estimate capped at 40. Returns 0 when
/// the column has no usable spread.
pub(crate) fn freedman_diaconis_buckets(
    iqr: Option<f64>,
    count: f64,
    range: Option<f64>,
) -> f64 {
    let (iqr, range) = match (iqr, range) {
        (Some(iqr), Some(range)) if range != 0.0 => (iqr, range),
        _ => return 0.0,
    };
    if count < 40.0 {
        count
    } else {
        let bucket_width = (2.0 * iqr) / count.cbrt();
        (range / bucket_width).ceil().min(40.0)
    }
}

#[async_trait]
impl Query for ColumnNumericHistogram {
    fn key(&self) -> String {
        format!(
            "ColumnNumericHistogram:{}:{}",
            self.table_name, self.column_name
        )
    }

    fn deps(&self) -> Vec<String> {
        vec![self.table_name.clone()]
    }

    fn dialects(&self) -> &'static [Dialect] {
        &[Dialect::DuckDb]
    }

    fn marshal_result(&self) -> serde_json::Value {
        serde_json::to_value(&self.result).unwrap_or_default()
    }

    fn unmarshal_result(&mut self, v: serde_json::Value) -> Result<(), QueryError> {
        self.result = serde_json::from_value(v).map_err(|e| {
            QueryError::Internal(format!(
                "column numeric histogram: mismatched unmarshal input: {e}"
            ))
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
        let buckets = self.bucket_count(ctx, rt, instance_id, priority).await?;
        if buckets == 0.0 {
            self.result = Vec::new();
            return Ok(());
        }

        let olap = rt.olap(instance_id)?;
        let mut rs = olap
            .execute(
                ctx,
                Statement::new(self.histogram_sql(buckets as i64)).with_priority(priority),
            )
            .await?;

        let mut bins = Vec::new();
        while let Some(row) = rs.next_row().await? {
            let (bucket, low, high, count): (i64, f64, f64, f64) = row.scan()?;
            bins.push(HistogramBin {
                bucket,
                low,
                high,
                count: count as i64,
            });
        }
        self.result = bins;
        Ok(())
    }
}
