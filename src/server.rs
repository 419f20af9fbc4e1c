use crate::api_client::AdsApi;
use crate::config::Config;
use crate::error::Error;
use crate::runner::{self, RunResult, RunStatus};
use crate::warehouse::Warehouse;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn AdsApi>,
    pub warehouse: Arc<dyn Warehouse>,
    pub config: Arc<Config>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
}

#[derive(Deserialize)]
struct RunParams {
    date: Option<NaiveDate>,
}

impl RunStatus {
    pub fn http_status(&self) -> StatusCode {
        match self {
            RunStatus::Success => StatusCode::OK,
            RunStatus::PartialSuccess => StatusCode::MULTI_STATUS,
            RunStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RunResult {
    fn into_response(self) -> Response {
        (self.status.http_status(), Json(self)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/run", post(run_stats))
        .route("/update_meta", post(update_meta))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<(), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Service is running".to_string(),
    })
}

async fn run_stats(State(state): State<AppState>, Query(params): Query<RunParams>) -> RunResult {
    let date = params.date.unwrap_or_else(runner::yesterday);
    runner::run_stats(
        state.api.as_ref(),
        state.warehouse.as_ref(),
        &state.config,
        &date,
    )
    .await
}

async fn update_meta(State(state): State<AppState>, Query(params): Query<RunParams>) -> RunResult {
    let date = params.date.unwrap_or_else(runner::yesterday);
    runner::update_meta(
        state.api.as_ref(),
        state.warehouse.as_ref(),
        &state.config,
        &date,
    )
    .await
}
