use crate::app::{self, Dashboard, DashboardSettings, DashboardSnapshot};
use crate::data::StockApi;
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
struct WebState {
    dashboard: Arc<Mutex<Dashboard>>,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct RangeRequest {
    label: String,
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_err(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: msg.into() }))
}

fn router(state: WebState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/state", get(full_state))
        .route("/api/select", post(select))
        .route("/api/range", post(change_range))
        .with_state(state)
}

pub async fn run_webui_server(port: u16, api: StockApi, settings: DashboardSettings) -> Result<()> {
    let (mut dashboard, mut outcomes) = app::connect(api, settings);
    dashboard.start();
    let dashboard = Arc::new(Mutex::new(dashboard));

    let applier = dashboard.clone();
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            applier.lock().await.apply(outcome);
        }
    });

    let addr = format!("0.0.0.0:{}", port);
    info!("WebUI listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(WebState { dashboard })).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn full_state(State(state): State<WebState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard.lock().await.snapshot())
}

async fn select(
    State(state): State<WebState>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<DashboardSnapshot> {
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(api_err(StatusCode::BAD_REQUEST, "symbol is required"));
    }
    let mut dashboard = state.dashboard.lock().await;
    dashboard.select_symbol(&symbol);
    Ok(Json(dashboard.snapshot()))
}

async fn change_range(
    State(state): State<WebState>,
    Json(req): Json<RangeRequest>,
) -> ApiResult<DashboardSnapshot> {
    let mut dashboard = state.dashboard.lock().await;
    match dashboard.change_range(req.label.trim()) {
        Some(_) => Ok(Json(dashboard.snapshot())),
        None => Err(api_err(
            StatusCode::BAD_REQUEST,
            format!(
                "unknown range label {:?}; expected one of 1month, 3months, 1year, 5years",
                req.label
            ),
        )),
    }
}
