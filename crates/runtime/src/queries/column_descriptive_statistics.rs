//! Descriptive statistics for a numeric column in one pass.

use async_trait::async_trait;
use quarry_common::models::NumericStatistics;
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct ColumnDescriptiveStatistics {
    pub table_name: String,
    pub column_name: String,
    pub result: NumericStatistics,
}

impl ColumnDescriptiveStatistics {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: NumericStatistics::default(),
        }
    }

    fn statistics_sql(&self) -> String {
        let col = safe_name(&self.column_name);
        format!(
            "SELECT min({col}) AS min, \
             approx_quantile({col}, 0.25) AS q25, \
             approx_quantile({col}, 0.5) AS q50, \
             approx_quantile({col}, 0.75) AS q75, \
             max({col}) AS max, \
             avg({col})::FLOAT AS mean, \
             stddev_pop({col}) AS sd \
             FROM {tbl}",
            tbl = safe_name(&self.table_name),
        )
    }
}

#[async_trait]
impl Query for ColumnDescriptiveStatistics {
    fn key(&self) -> String {
        format!(
            "ColumnDescriptiveStatistics:{}:{}",
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
                "column descriptive statistics: mismatched unmarshal input: {e}"
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
            .execute(
                ctx,
                Statement::new(self.statistics_sql()).with_priority(priority),
            )
            .await?;

        while let Some(row) = rs.next_row().await? {
            type StatsRow = (
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
            );
            let (min, q25, q50, q75, max, mean, sd): StatsRow = row.scan()?;
            // An all-null column aggregates to null everywhere; report the
            // empty statistics object instead of erroring.
            let Some(min) = min else {
                self.result = NumericStatistics::default();
                return Ok(());
            };
            self.result = NumericStatistics {
                min,
                q25: q25.unwrap_or_default(),
                q50: q50.unwrap_or_default(),
                q75: q75.unwrap_or_default(),
                max: max.unwrap_or_default(),
                mean: mean.unwrap_or_default(),
                sd: sd.unwrap_or_default(),
            };
        }
        Ok(())
    }
}
