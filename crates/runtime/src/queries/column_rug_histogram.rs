//! Outlier (rug) histogram: a fixed 500-bucket pass that reports only the
//! buckets that contain values.

use async_trait::async_trait;
use quarry_common::models::OutlierBin;

use super::{histogram_cte, Query};
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

const OUTLIER_BUCKETS: i64 = 500;

#[derive(Debug, Clone)]
pub struct ColumnRugHistogram {
    pub table_name: String,
    pub column_name: String,
    pub result: Vec<OutlierBin>,
}

impl ColumnRugHistogram {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: Vec::new(),
        }
    }

    fn rug_sql(&self) -> String {
        format!(
            "{cte}\nSELECT bucket, low, high, count > 0 AS present, count \
             FROM histogram_with_edge WHERE count > 0",
            cte = histogram_cte(&self.column_name, &self.table_name, OUTLIER_BUCKETS),
        )
    }
}

#[async_trait]
impl Query for ColumnRugHistogram {
    fn key(&self) -> String {
        format!("ColumnRugHistogram:{}:{}", self.table_name, self.column_name)
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
                "column rug histogram: mismatched unmarshal input: {e}"
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
        let olap = rt.olap(instance_id)?;
        let mut rs = olap
            .execute(ctx, Statement::new(self.rug_sql()).with_priority(priority))
            .await?;

        let mut bins = Vec::new();
        while let Some(row) = rs.next_row().await? {
            let (bucket, low, high, present, count): (i64, f64, f64, bool, f64) = row.scan()?;
            bins.push(OutlierBin {
                bucket,
                low,
                high,
                present,
                count: count as i64,
            });
        }
        self.result = bins;
        Ok(())
    }
}
