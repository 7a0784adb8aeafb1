//! Column profiling handlers.

use quarry_common::models::{
    CardinalityResponse, CategoricalSummary, ColumnRequest, DescriptiveStatisticsResponse,
    NullCountResponse, NumericHistogramResponse, NumericSummary, RugHistogramResponse,
    TimeGrainResponse, TimeRangeSummaryResponse, TopKRequest, TopKResponse,
};
use quarry_runtime::queries::{
    ColumnCardinality, ColumnDescriptiveStatistics, ColumnNullCount, ColumnNumericHistogram,
    ColumnRugHistogram, ColumnTimeGrain, ColumnTimeRange, ColumnTopK,
};
use quarry_runtime::ExecCtx;
use tonic::Status;

use crate::Server;

impl Server {
    pub async fn get_top_k(
        &self,
        ctx: &ExecCtx,
        req: TopKRequest,
    ) -> Result<TopKResponse, Status> {
        let mut q = ColumnTopK::new(
            req.table_name,
            req.column_name,
            req.agg,
            req.k.map(|k| k as usize),
        );
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(TopKResponse {
            categorical_summary: CategoricalSummary::TopK(q.result),
        })
    }

    pub async fn get_null_count(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<NullCountResponse, Status> {
        let mut q = ColumnNullCount::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(NullCountResponse { count: q.result })
    }

    pub async fn get_descriptive_statistics(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<DescriptiveStatisticsResponse, Status> {
        let mut q = ColumnDescriptiveStatistics::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(DescriptiveStatisticsResponse {
            numeric_summary: NumericSummary::Statistics(q.result),
        })
    }

    pub async fn get_cardinality_of_column(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<CardinalityResponse, Status> {
        let mut q = ColumnCardinality::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(CardinalityResponse {
            categorical_summary: CategoricalSummary::Cardinality(q.result),
        })
    }

    pub async fn get_numeric_histogram(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<NumericHistogramResponse, Status> {
        let mut q = ColumnNumericHistogram::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(NumericHistogramResponse {
            numeric_summary: NumericSummary::Histogram(q.result),
        })
    }

    pub async fn get_rug_histogram(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<RugHistogramResponse, Status> {
        let mut q = ColumnRugHistogram::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(RugHistogramResponse {
            numeric_summary: NumericSummary::Outliers(q.result),
        })
    }

    pub async fn get_time_range_summary(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<TimeRangeSummaryResponse, Status> {
        let mut q = ColumnTimeRange::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(TimeRangeSummaryResponse {
            time_range_summary: q.result,
        })
    }

    pub async fn estimate_smallest_time_grain(
        &self,
        ctx: &ExecCtx,
        req: ColumnRequest,
    ) -> Result<TimeGrainResponse, Status> {
        let mut q = ColumnTimeGrain::new(req.table_name, req.column_name);
        self.run_query(ctx, &req.instance_id, &mut q, req.priority)
            .await?;
        Ok(TimeGrainResponse {
            time_grain: q.result,
        })
    }
}
