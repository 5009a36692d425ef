//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/search` | Multi-provider hotel search |
//! | `GET`  | `/api/suggest` | Destination autocomplete |
//! | `POST` | `/api/events` | Analytics event intake |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Every response carries `cache-control: no-store`. All origins are
//! permitted since the browser front end is served separately.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::config::Config;
use crate::events::{AnalyticsEvent, EventForwarder, EventRejection};
use crate::pipeline::SearchPipeline;
use crate::provider::build_http_client;
use crate::response::SearchOutcome;
use crate::suggest::{SuggestClient, SuggestResponse};
use crate::{ScannerError, SearchQuery};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<SearchPipeline>,
    suggest: Arc<SuggestClient>,
    events: Arc<EventForwarder>,
}

/// Build the router with every collaborator constructed from `config`.
pub fn router(config: &Config) -> Result<Router, ScannerError> {
    let http = build_http_client(&config.http)?;
    let state = AppState {
        pipeline: Arc::new(SearchPipeline::from_config(config)?),
        suggest: Arc::new(SuggestClient::new(http.clone(), &config.suggest)?),
        events: Arc::new(EventForwarder::new(http, &config.analytics)),
    };
    info!(
        mode = ?state.pipeline.mode(),
        analytics_forwarding = state.events.is_forwarding(),
        "API router built"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/search", get(handle_search))
        .route("/api/suggest", get(handle_suggest))
        .route("/api/events", post(handle_event))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state))
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = router(config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "Hotel scanner API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

struct AppError {
    status: StatusCode,
    error: String,
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(error: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        error: error.into(),
        message: None,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/search ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    destination: Option<String>,
    check_in: Option<String>,
    check_out: Option<String>,
    guests: Option<String>,
}

/// 200 with merged hotels, 404 `no_live_offers` when nothing usable came back.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, AppError> {
    let query = SearchQuery::from_params(
        params.destination.as_deref(),
        params.check_in.as_deref(),
        params.check_out.as_deref(),
        params.guests.as_deref(),
    )
    .map_err(|e| bad_request(e.to_string()))?;

    Ok(match state.pipeline.search(&query).await {
        SearchOutcome::Offers(body) => Json(body).into_response(),
        SearchOutcome::NoOffers(body) => (StatusCode::NOT_FOUND, Json(body)).into_response(),
    })
}

// ============ GET /api/suggest ============

#[derive(Debug, Deserialize)]
struct SuggestParams {
    q: Option<String>,
}

async fn handle_suggest(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<SuggestResponse> {
    Json(state.suggest.suggest(params.q.as_deref().unwrap_or_default()).await)
}

// ============ POST /api/events ============

#[derive(Serialize)]
struct EventAck {
    ok: bool,
}

async fn handle_event(State(state): State<AppState>, body: Bytes) -> Result<Json<EventAck>, AppError> {
    let event = AnalyticsEvent::parse(&body).map_err(|rejection| match rejection {
        EventRejection::InvalidJson(message) => AppError {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_json".to_string(),
            message: Some(message),
        },
        EventRejection::MissingName => bad_request("name is required"),
    })?;

    state.events.record(&event).await;
    Ok(Json(EventAck { ok: true }))
}
