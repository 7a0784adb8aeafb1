//! Count of null values in a column.

use async_trait::async_trait;
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct ColumnNullCount {
    pub table_name: String,
    pub column_name: String,
    pub result: f64,
}

impl ColumnNullCount {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: 0.0,
        }
    }

    fn null_count_sql(&self) -> String {
        format!(
            "SELECT count(*) AS count FROM {tbl} WHERE {col} IS NULL",
            tbl = safe_name(&self.table_name),
            col = safe_name(&self.column_name),
        )
    }
}

#[async_trait]
impl Query for ColumnNullCount {
    fn key(&self) -> String {
        format!("ColumnNullCount:{}:{}", self.table_name, self.column_name)
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
            QueryError::Internal(format!("column null count: mismatched unmarshal input: {e}"))
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
                Statement::new(self.null_count_sql()).with_priority(priority),
            )
            .await?;

        while let Some(row) = rs.next_row().await? {
            let (count,): (f64,) = row.scan()?;
            self.result = count;
        }
        Ok(())
    }
}
