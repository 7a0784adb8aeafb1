//! Top-K values of a column by an aggregate.

use async_trait::async_trait;
use quarry_common::models::TopKEntry;
use quarry_common::Value;
use quarry_sql::safe_name;

use super::Query;
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

pub const DEFAULT_AGG: &str = "count(*)";
pub const DEFAULT_K: usize = 50;

#[derive(Debug, Clone)]
pub struct ColumnTopK {
    pub table_name: String,
    pub column_name: String,
    pub agg: String,
    pub k: usize,
    pub result: Vec<TopKEntry>,
}

impl ColumnTopK {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        agg: Option<String>,
        k: Option<usize>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            agg: agg.filter(|a| !a.is_empty()).unwrap_or_else(|| DEFAULT_AGG.to_string()),
            k: k.filter(|k| *k > 0).unwrap_or(DEFAULT_K),
            result: Vec::new(),
        }
    }

    fn topk_sql(&self) -> String {
        format!(
            "SELECT {col}, {agg} AS v FROM {tbl} GROUP BY {col} ORDER BY v DESC LIMIT {k}",
            col = safe_name(&self.column_name),
            agg = self.agg,
            tbl = safe_name(&self.table_name),
            k = self.k,
        )
    }
}

#[async_trait]
impl Query for ColumnTopK {
    fn key(&self) -> String {
        format!(
            "ColumnTopK:{}:{}:{}:{}",
            self.table_name, self.column_name, self.agg, self.k
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
        self.result = serde_json::from_value(v)
            .map_err(|e| QueryError::Internal(format!("column top-k: mismatched unmarshal input: {e}")))?;
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
            .execute(ctx, Statement::new(self.topk_sql()).with_priority(priority))
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rs.next_row().await? {
            let (value, count): (Value, f64) = row.scan()?;
            entries.push(TopKEntry { value, count });
        }
        self.result = entries;
        Ok(())
    }
}
