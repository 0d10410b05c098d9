use analysis_core::{validate, MetricSeries};
use analysis_orchestrator::CompanyMetrics;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{analysis_err, bad_request, ApiResponse, AppError, AppState};

#[derive(Deserialize, utoipa::IntoParams)]
pub struct MetricsQuery {
    /// Exchange ticker, e.g. AAPL
    pub ticker: String,
    /// Fiscal years to return, 1-20 (default 4)
    pub years: Option<u32>,
}

/// Normalized metric series without narrative.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub ticker: String,
    pub cik: String,
    pub entity_name: Option<String>,
    pub metrics: MetricSeries,
}

impl From<CompanyMetrics> for MetricsResponse {
    fn from(m: CompanyMetrics) -> Self {
        Self {
            ticker: m.ticker,
            cik: m.cik,
            entity_name: m.entity_name,
            metrics: m.metrics,
        }
    }
}

pub fn xbrl_routes() -> Router<AppState> {
    Router::new().route("/sec/xbrl/metrics", get(get_metrics))
}

#[utoipa::path(
    get,
    path = "/sec/xbrl/metrics",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Metric series for the requested window", body = MetricsResponse),
        (status = 400, description = "Invalid ticker or years"),
        (status = 404, description = "Unknown ticker or no annual facts"),
        (status = 502, description = "Registry unavailable")
    ),
    tag = "SEC"
)]
pub async fn get_metrics(
    State(state): State<AppState>,
    query: Result<Query<MetricsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<MetricsResponse>>, AppError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let ticker = validate::ticker(&query.ticker).map_err(bad_request)?;
    let years = validate::years(query.years).map_err(bad_request)?;

    let metrics = state
        .orchestrator
        .metrics_only(&ticker, years)
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(metrics.into())))
}
