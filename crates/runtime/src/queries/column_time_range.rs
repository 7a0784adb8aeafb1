//! Time extent of a temporal column.

use async_trait::async_trait;
use quarry_common::models::TimeRangeSummary;
use quarry_common::{Interval, Value};
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct ColumnTimeRange {
    pub table_name: String,
    pub column_name: String,
    pub result: TimeRangeSummary,
}

impl ColumnTimeRange {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: TimeRangeSummary::default(),
        }
    }

    fn time_range_sql(&self) -> String {
        let col = safe_name(&self.column_name);
        format!(
            "SELECT min({col}) AS min, max({col}) AS max, max({col}) - min({col}) AS interval FROM {tbl}",
            tbl = safe_name(&self.table_name),
        )
    }
}

fn timestamp_of(name: &str, v: Option<&Value>) -> Result<chrono::DateTime<chrono::Utc>, QueryError> {
    match v {
        Some(Value::Timestamp(ts)) => Ok(*ts),
        Some(other) => Err(QueryError::Internal(format!(
            "time range: column '{name}' is {}, expected timestamp",
            other.kind()
        ))),
        None => Err(QueryError::Internal(format!(
            "time range: column '{name}' missing from result"
        ))),
    }
}

#[async_trait]
impl Query for ColumnTimeRange {
    fn key(&self) -> String {
        format!("ColumnTimeRange:{}:{}", self.table_name, self.column_name)
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
            QueryError::Internal(format!("column time range: mismatched unmarshal input: {e}"))
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
                Statement::new(self.time_range_sql()).with_priority(priority),
            )
            .await?;

        let row = rs
            .next_row()
            .await?
            .ok_or_else(|| QueryError::Internal("no rows returned".into()))?;
        let map = rs.map_scan(&row);

        let mut summary = TimeRangeSummary::default();
        if map.get("min").is_some_and(|v| !v.is_null()) {
            summary.min = Some(timestamp_of("min", map.get("min"))?);
            summary.max = Some(timestamp_of("max", map.get("max"))?);
            let interval = map
                .get("interval")
                .ok_or_else(|| QueryError::Internal("time range: interval missing".into()))?;
            summary.interval = Some(
                Interval::from_value(interval)
                    .map_err(|e| QueryError::Internal(e.to_string()))?,
            );
        }
        self.result = summary;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::sanitize_query;

    #[test]
    fn computes_extent_and_interval() {
        let q = ColumnTimeRange::new("events", "created_at");
        assert_eq!(
            sanitize_query(&q.time_range_sql(), true),
            "select min(\"created_at\") as min,max(\"created_at\") as max,\
             max(\"created_at\") - min(\"created_at\") as interval from \"events\""
        );
    }
}
