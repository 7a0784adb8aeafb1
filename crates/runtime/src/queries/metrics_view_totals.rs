//! Single-row measure totals over a metrics view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quarry_common::models::{Filter, MetricsView, MetricsViewTotalsResponse};
use quarry_common::Value;
use quarry_sql::{compile_filter, safe_name};

use super::metrics_view_toplist::{measure_expressions, time_range_clause};
use super::{lookup_metrics_view, schema_to_columns, Query};
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

#[derive(Debug, Clone)]
pub struct MetricsViewTotals {
    pub metrics_view_name: String,
    pub measure_names: Vec<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub filter: Option<Filter>,
    pub result: Option<MetricsViewTotalsResponse>,
}

impl MetricsViewTotals {
    fn totals_sql(&self, mv: &MetricsView) -> Result<(String, Vec<Value>), QueryError> {
        let measures = measure_expressions(mv, &self.measure_names)?;

        let mut args = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE 1=1",
            measures.join(", "),
            safe_name(&mv.model),
        );
        sql.push_str(&time_range_clause(mv, self.time_start, self.time_end, &mut args)?);

        if let Some(filter) = &self.filter {
            let (clause, filter_args) = compile_filter(filter)?;
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(&clause);
                args.extend(filter_args);
            }
        }
        Ok((sql, args))
    }
}

#[async_trait]
impl Query for MetricsViewTotals {
    fn key(&self) -> String {
        let params = serde_json::to_string(&(
            &self.measure_names,
            &self.time_start,
            &self.time_end,
            &self.filter,
        ))
        .unwrap_or_default();
        format!("MetricsViewTotals:{}:{params}", self.metrics_view_name)
    }

    fn deps(&self) -> Vec<String> {
        vec![self.metrics_view_name.clone()]
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
                "metrics view totals: mismatched unmarshal input: {e}"
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
        let mv = lookup_metrics_view(ctx, rt, instance_id, &self.metrics_view_name).await?;
        let (sql, args) = self.totals_sql(&mv)?;

        let olap = rt.olap(instance_id)?;
        let mut rs = olap
            .execute(
                ctx,
                Statement::new(sql).with_args(args).with_priority(priority),
            )
            .await?;

        let meta = schema_to_columns(&rs);
        let row = rs
            .next_row()
            .await?
            .ok_or_else(|| QueryError::Internal("no rows returned".into()))?;
        let mut data = serde_json::Map::new();
        for (name, value) in rs.map_scan(&row) {
            data.insert(name, value.to_json());
        }
        self.result = Some(MetricsViewTotalsResponse { meta, data });
        Ok(())
    }
}
