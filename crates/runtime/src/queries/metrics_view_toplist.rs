//! Dimension leaderboard over a metrics view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quarry_common::models::{
    Filter, MetricsView, MetricsViewSort, MetricsViewToplistResponse,
};
use quarry_common::Value;
use quarry_sql::{compile_filter, safe_name};

use super::{lookup_metrics_view, rows_to_data, schema_to_columns, Query};
use crate::engine::{Dialect, ExecCtx, Statement};
use crate::error::QueryError;
use crate::Runtime;

const DEFAULT_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct MetricsViewToplist {
    pub metrics_view_name: String,
    pub dimension_name: String,
    pub measure_names: Vec<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub sort: Vec<MetricsViewSort>,
    pub filter: Option<Filter>,
    pub result: Option<MetricsViewToplistResponse>,
}

/// Selects the requested measures off the view; every name must exist.
pub(crate) fn measure_expressions(
    mv: &MetricsView,
    names: &[String],
) -> Result<Vec<String>, QueryError> {
    let mut exprs = Vec::new();
    if names.is_empty() {
        for m in &mv.measures {
            exprs.push(format!("{} AS {}", m.expression, safe_name(&m.name)));
        }
        return Ok(exprs);
    }
    for name in names {
        let measure = mv
            .measures
            .iter()
            .find(|m| &m.name == name)
            .ok_or_else(|| {
                QueryError::InvalidInput(format!("measure '{name}' not found in metrics view"))
            })?;
        exprs.push(format!("{} AS {}", measure.expression, safe_name(name)));
    }
    Ok(exprs)
}

/// `AND time >= ?` / `AND time < ?` clauses for the optional window.
pub(crate) fn time_range_clause(
    mv: &MetricsView,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    args: &mut Vec<Value>,
) -> Result<String, QueryError> {
    if time_start.is_none() && time_end.is_none() {
        return Ok(String::new());
    }
    let time_col = mv.time_dimension.as_deref().ok_or_else(|| {
        QueryError::InvalidInput("metrics view has no time dimension".to_string())
    })?;
    let col = safe_name(time_col);
    let mut clause = String::new();
    if let Some(start) = time_start {
        clause.push_str(&format!(" AND {col} >= ?"));
        args.push(Value::Timestamp(start));
    }
    if let Some(end) = time_end {
        clause.push_str(&format!(" AND {col} < ?"));
        args.push(Value::Timestamp(end));
    }
    Ok(clause)
}

impl MetricsViewToplist {
    fn toplist_sql(&self, mv: &MetricsView) -> Result<(String, Vec<Value>), QueryError> {
        if !mv.dimensions.iter().any(|d| d.name == self.dimension_name) {
            return Err(QueryError::InvalidInput(format!(
                "dimension '{}' not found in metrics view",
                self.dimension_name
            )));
        }
        let dim = safe_name(&self.dimension_name);
        let measures = measure_expressions(mv, &self.measure_names)?;

        let mut args = Vec::new();
        let mut sql = format!(
            "SELECT {dim}, {} FROM {} WHERE 1=1",
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

        sql.push_str(&format!(" GROUP BY {dim}"));

        if !self.sort.is_empty() {
            let order: Vec<String> = self
                .sort
                .iter()
                .map(|s| {
                    format!(
                        "{} {}",
                        safe_name(&s.name),
                        if s.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        sql.push_str(&format!(" LIMIT {}", self.limit.unwrap_or(DEFAULT_LIMIT)));
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok((sql, args))
    }
}

#[async_trait]
impl Query for MetricsViewToplist {
    fn key(&self) -> String {
        let params = serde_json::to_string(&(
            &self.dimension_name,
            &self.measure_names,
            &self.time_start,
            &self.time_end,
            &self.limit,
            &self.offset,
            &self.sort,
            &self.filter,
        ))
        .unwrap_or_default();
        format!("MetricsViewToplist:{}:{params}", self.metrics_view_name)
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
                "metrics view toplist: mismatched unmarshal input: {e}"
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
        let (sql, args) = self.toplist_sql(&mv)?;

        let olap = rt.olap(instance_id)?;
        let mut rs = olap
            .execute(
                ctx,
                Statement::new(sql).with_args(args).with_priority(priority),
            )
            .await?;

        let meta = schema_to_columns(&rs);
        let data = rows_to_data(&mut rs).await?;
        self.result = Some(MetricsViewToplistResponse { meta, data });
        Ok(())
    }
}
