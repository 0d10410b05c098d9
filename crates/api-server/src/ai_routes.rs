use analysis_core::{validate, AnalysisResult, FilingSummary};
use analysis_orchestrator::AskMode;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{analysis_err, analysis_request, bad_request, ApiResponse, AppError, AppState};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AnalyzeXbrlRequest {
    pub ticker: String,
    /// 1-20, default 4
    pub years: Option<u32>,
    /// `en` or `ja`; defaults to the server setting
    pub output_lang: Option<String>,
    /// Forecast periods, 1-5
    pub horizon: Option<u32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AskRequest {
    pub ticker: String,
    pub question: String,
    /// `xbrl` (default) or `10k`
    pub mode: Option<String>,
    /// false skips the provider and returns the rule-based narrative
    pub use_ai: Option<bool>,
    pub years: Option<u32>,
    pub output_lang: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AskResponse {
    pub question: String,
    pub mode: String,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing: Option<FilingSummary>,
}

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/analyze/xbrl", post(analyze_xbrl))
        .route("/ask", post(ask))
}

#[utoipa::path(
    post,
    path = "/ai/analyze/xbrl",
    request_body = AnalyzeXbrlRequest,
    responses(
        (status = 200, description = "Analysis; provider failures are reported as degraded", body = AnalysisResult),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Unknown ticker or no annual facts"),
        (status = 502, description = "Registry unavailable")
    ),
    tag = "AI"
)]
pub async fn analyze_xbrl(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeXbrlRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AnalysisResult>>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let request = analysis_request(&state, &req.ticker, req.years, req.output_lang.as_deref(), req.horizon)
        .map_err(bad_request)?;

    let result = state
        .orchestrator
        .analyze_xbrl(&request)
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answer with metrics and narrative", body = AskResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Unknown ticker, no annual facts or no annual report"),
        (status = 502, description = "Registry unavailable")
    ),
    tag = "AI"
)]
pub async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AskResponse>>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let mode: AskMode = match req.mode.as_deref() {
        Some(raw) => raw.parse().map_err(bad_request)?,
        None => AskMode::default(),
    };
    let mut request =
        analysis_request(&state, &req.ticker, req.years, req.output_lang.as_deref(), None).map_err(bad_request)?;
    let question = validate::question(&req.question).map_err(bad_request)?;
    request.question = Some(question.clone());
    request.use_ai = req.use_ai.unwrap_or(true);

    let outcome = state.orchestrator.ask(&request, mode).await.map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(AskResponse {
        question,
        mode: mode.to_string(),
        analysis: outcome.analysis,
        filing: outcome.filing,
    })))
}
