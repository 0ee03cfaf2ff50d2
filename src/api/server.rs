use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::types::{SqlQuery, TruthDto};
use crate::collectors::cartodb::SqlGateway;
use crate::collectors::earth_engine::EeSession;
use crate::core::landsat::LandsatError;
use crate::locator::truth::{find, TruthError};
use crate::utils::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cartodb: SqlGateway,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", get(run_query))
        .route("/truth", get(get_truth))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn run_query(State(state): State<AppState>, Query(q): Query<SqlQuery>) -> impl IntoResponse {
    let Some(query) = q.q else {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "missing q"})));
    };

    match state.cartodb.execute(&query).await {
        Some(body) => (StatusCode::OK, Json(body)),
        None => (StatusCode::BAD_GATEWAY, Json(serde_json::json!({"error": "CartoDB query failed"}))),
    }
}

async fn get_truth(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    // one session per request, dropped with it
    let session = match EeSession::initialize(&state.config.earth_engine) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Earth Engine session unavailable");
            return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"error": e.to_string()})));
        }
    };

    match find(&session, &params).await {
        Ok(url) => (StatusCode::OK, Json(serde_json::json!(TruthDto { url }))),
        Err(e) => {
            warn!(error = %e, "Truth lookup failed");
            let status = match e {
                TruthError::Params(_) | TruthError::Landsat(LandsatError::DateRange { .. }) => {
                    StatusCode::BAD_REQUEST
                }
                TruthError::Landsat(LandsatError::NoScene { .. }) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(serde_json::json!({"error": e.to_string()})))
        }
    }
}
