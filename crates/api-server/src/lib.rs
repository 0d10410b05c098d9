//! HTTP surface of the analysis service.

use analysis_core::{
    validate, AiReport, AnalysisError, AnalysisResult, DegradationReason, FilingSummary, ForecastResult, Metric,
    MetricPoint, MetricSeries, OutputLanguage, Projection, ValidationError,
};
use analysis_orchestrator::{AiOrchestrator, AnalysisOrchestrator, AnalysisRequest, PipelineSettings};
use anyhow::Context;
use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sec_client::SecClient;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub mod config;

mod ai_routes;
mod filing_routes;
mod request_id;
mod security_headers;
mod xbrl_routes;


pub use config::{AppConfig, ConfigError};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub config: Arc<AppConfig>,
}

/// Envelope for every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {:#}", self.error);
            "Internal server error".to_string()
        } else {
            if self.status.is_server_error() {
                tracing::error!("{}: {:#}", self.status, self.error);
            } else {
                tracing::warn!("{}: {:#}", self.status, self.error);
            }
            format!("{:#}", self.error)
        };

        (self.status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

pub(crate) fn bad_request(error: impl std::fmt::Display) -> AppError {
    AppError::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!("{error}"))
}

/// Validation → 400, missing registry data → 404, registry failure → 502.
pub(crate) fn analysis_err(err: AnalysisError) -> AppError {
    match err {
        AnalysisError::Validation(e) => bad_request(e),
        AnalysisError::Upstream(e) if e.is_not_found() => {
            AppError::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("{e}"))
        }
        AnalysisError::Upstream(e) => AppError::with_status(StatusCode::BAD_GATEWAY, anyhow::anyhow!("{e}")),
    }
}

/// Validate the parameters shared by every analysis endpoint.
pub(crate) fn analysis_request(
    state: &AppState,
    ticker: &str,
    years: Option<u32>,
    output_lang: Option<&str>,
    horizon: Option<u32>,
) -> Result<AnalysisRequest, ValidationError> {
    let mut request = AnalysisRequest::new(validate::ticker(ticker)?, validate::years(years)?);
    request.lang = match output_lang {
        Some(lang) => lang.parse()?,
        None => state.config.output_lang,
    };
    request.horizon = Some(validate::horizon(horizon, state.config.forecast_horizon)?);
    Ok(request)
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub provider: String,
    pub output_lang: OutputLanguage,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthStatus)),
    tag = "System"
)]
async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        provider: state.orchestrator.ai().provider_name().unwrap_or("none").to_string(),
        output_lang: state.config.output_lang,
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn not_found() -> AppError {
    AppError::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("No such route"))
}

#[derive(OpenApi)]
#[openapi(
    info(title = "SEC XBRL analysis API", description = "Normalized filing metrics with AI narrative"),
    paths(
        health,
        xbrl_routes::get_metrics,
        ai_routes::analyze_xbrl,
        ai_routes::ask,
        filing_routes::latest_filing,
        filing_routes::analyze_filing,
    ),
    components(schemas(
        HealthStatus,
        AnalysisResult,
        AiReport,
        DegradationReason,
        ForecastResult,
        Projection,
        Metric,
        MetricPoint,
        MetricSeries,
        OutputLanguage,
        FilingSummary,
        xbrl_routes::MetricsResponse,
        ai_routes::AnalyzeXbrlRequest,
        ai_routes::AskRequest,
        ai_routes::AskResponse,
        filing_routes::LatestFilingResponse,
        filing_routes::AnalyzeFilingRequest,
        filing_routes::FilingAnalysisResponse,
    )),
    tags(
        (name = "System", description = "Liveness and API description"),
        (name = "SEC", description = "Registry data without narrative"),
        (name = "AI", description = "Analyses with generated narrative")
    )
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(xbrl_routes::xbrl_routes())
        .merge(ai_routes::ai_routes())
        .merge(filing_routes::filing_routes())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(trace)
                .layer(cors)
                .layer(middleware::from_fn(request_id::request_id_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    security_headers::security_headers_middleware,
                )),
        )
        .with_state(state)
}

/// Wire the registry client, provider and pipeline from configuration.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let sec = Arc::new(SecClient::new(config.sec.clone()).context("building registry client")?);
    let provider = llm_client::build_provider(&config.llm).context("building LLM provider")?;
    let ai = AiOrchestrator::new(Some(provider), config.llm.timeout);
    let settings = PipelineSettings {
        metric_profile: config.metric_profile,
        forecast_horizon: config.forecast_horizon,
    };

    Ok(AppState {
        orchestrator: Arc::new(AnalysisOrchestrator::new(sec.clone(), sec, ai, settings)),
        config: Arc::new(config),
    })
}

/// `RUST_LOG` filter (default `info`); `RUST_LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Config: provider={} lang={} profile={:?} horizon={} cache_ttl={}s",
        config.llm.kind,
        config.output_lang.as_str(),
        config.metric_profile,
        config.forecast_horizon,
        config.sec.cache_ttl.as_secs()
    );

    let bind_addr = config.bind_addr;
    let state = build_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
