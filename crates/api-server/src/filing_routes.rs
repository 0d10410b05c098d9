use analysis_core::{validate, AnalysisResult, FilingSummary};
use analysis_orchestrator::FilingPreview;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{analysis_err, analysis_request, bad_request, ApiResponse, AppError, AppState};

#[derive(Deserialize, utoipa::IntoParams)]
pub struct LatestFilingQuery {
    pub ticker: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LatestFilingResponse {
    pub ticker: String,
    pub cik: String,
    pub filing: FilingSummary,
    /// Opening text of the document
    pub excerpt: String,
    /// Start of the "Item 1A. Risk Factors" section
    pub risk_excerpt: String,
}

impl From<FilingPreview> for LatestFilingResponse {
    fn from(p: FilingPreview) -> Self {
        Self {
            ticker: p.ticker,
            cik: p.cik,
            filing: p.filing,
            excerpt: p.excerpt,
            risk_excerpt: p.risk_excerpt,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AnalyzeFilingRequest {
    pub ticker: String,
    pub years: Option<u32>,
    pub output_lang: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FilingAnalysisResponse {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub filing: FilingSummary,
}

pub fn filing_routes() -> Router<AppState> {
    Router::new()
        .route("/sec/10k/latest", get(latest_filing))
        .route("/sec/10k/analyze", post(analyze_filing))
}

#[utoipa::path(
    get,
    path = "/sec/10k/latest",
    params(LatestFilingQuery),
    responses(
        (status = 200, description = "Latest annual report metadata and excerpts", body = LatestFilingResponse),
        (status = 404, description = "Unknown ticker or no annual report"),
        (status = 502, description = "Registry unavailable")
    ),
    tag = "SEC"
)]
pub async fn latest_filing(
    State(state): State<AppState>,
    query: Result<Query<LatestFilingQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<LatestFilingResponse>>, AppError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let ticker = validate::ticker(&query.ticker).map_err(bad_request)?;

    let preview = state
        .orchestrator
        .latest_filing(&ticker)
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(preview.into())))
}

#[utoipa::path(
    post,
    path = "/sec/10k/analyze",
    request_body = AnalyzeFilingRequest,
    responses(
        (status = 200, description = "Analysis drawing on the annual report's risk factors", body = FilingAnalysisResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Unknown ticker, no annual facts or no annual report"),
        (status = 502, description = "Registry unavailable")
    ),
    tag = "AI"
)]
pub async fn analyze_filing(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeFilingRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<FilingAnalysisResponse>>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let request =
        analysis_request(&state, &req.ticker, req.years, req.output_lang.as_deref(), None).map_err(bad_request)?;

    let outcome = state
        .orchestrator
        .analyze_filing(&request)
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(FilingAnalysisResponse {
        analysis: outcome.analysis,
        filing: outcome.filing,
    })))
}
