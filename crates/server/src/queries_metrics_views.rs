//! Metrics-view handlers.

use quarry_common::models::{
    MetricsViewToplistRequest, MetricsViewToplistResponse, MetricsViewTotalsRequest,
    MetricsViewTotalsResponse,
};
use quarry_runtime::queries::{MetricsViewToplist, MetricsViewTotals};
use quarry_runtime::ExecCtx;
use tonic::Status;

use crate::Server;

impl Server {
    pub async fn metrics_view_toplist(
        &self,
        ctx: &ExecCtx,
        req: MetricsViewToplistRequest,
    ) -> Result<MetricsViewToplistResponse, Status> {
        let mut q = MetricsViewToplist {
            metrics_view_name: req.metrics_view_name,
            dimension_name: req.dimension_name,
            measure_names: req.measure_names,
            time_start: req.time_start,
            time_end: req.time_end,
            limit: req.limit,
            offset: req.offset,
            sort: req.sort,
            filter: req.filter,
            result: None,
        };
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        q.result
            .ok_or_else(|| Status::internal("toplist resolved without a result"))
    }

    pub async fn metrics_view_totals(
        &self,
        ctx: &ExecCtx,
        req: MetricsViewTotalsRequest,
    ) -> Result<MetricsViewTotalsResponse, Status> {
        let mut q = MetricsViewTotals {
            metrics_view_name: req.metrics_view_name,
            measure_names: req.measure_names,
            time_start: req.time_start,
            time_end: req.time_end,
            filter: req.filter,
            result: None,
        };
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        q.result
            .ok_or_else(|| Status::internal("totals resolved without a result"))
    }
}
