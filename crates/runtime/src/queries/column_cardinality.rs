//! Approximate distinct count of a column.

use async_trait::async_trait;
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct ColumnCardinality {
    pub table_name: String,
    pub column_name: String,
    pub result: f64,
}

impl ColumnCardinality {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            result: 0.0,
        }
    }

    fn cardinality_sql(&self) -> String {
        format!(
            "SELECT approx_count_distinct({col}) AS count FROM {tbl}",
            col = safe_name(&self.column_name),
            tbl = safe_name(&self.table_name),
        )
    }
}

#[async_trait]
impl Query for ColumnCardinality {
    fn key(&self) -> String {
        format!("ColumnCardinality:{}:{}", self.table_name, self.column_name)
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
            QueryError::Internal(format!("column cardinality: mismatched unmarshal input: {e}"))
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
                Statement::new(self.cardinality_sql()).with_priority(priority),
            )
            .await?;

        match rs.next_row().await? {
            Some(row) => {
                let (count,): (f64,) = row.scan()?;
                self.result = count;
                Ok(())
            }
            None => Err(QueryError::Internal("no rows returned".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::sanitize_query;

    #[test]
    fn uses_approximate_distinct() {
        let q = ColumnCardinality::new("events", "session");
        assert_eq!(
            sanitize_query(&q.cardinality_sql(), true),
            "select approx_count_distinct(\"session\") as count from \"events\""
        );
    }
}
