use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use newsboard_common::{Column, ProductionEdit};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::dnd::{BoardController, DragPayload};
use super::store::BoardStore;
use crate::errors::BoardError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: BoardStore,
    pub controller: Arc<BoardController>,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DropRequest {
    pub column: String,
    pub payload: DragPayload,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        let msg = err.to_string();
        match err {
            BoardError::Unauthenticated => ApiError::Unauthorized(msg),
            BoardError::ItemNotFound { .. } | BoardError::NoPendingConfirmation { .. } => {
                ApiError::NotFound(msg)
            }
            BoardError::AlreadyPromoted { .. }
            | BoardError::MoveInFlight { .. }
            | BoardError::ConfirmationRequired { .. } => ApiError::Conflict(msg),
            BoardError::InvalidColumn { .. } => ApiError::BadRequest(msg),
            BoardError::RolledBack { .. }
            | BoardError::Gateway(_)
            | BoardError::Notification(_) => ApiError::BadGateway(msg),
            BoardError::Config(_) | BoardError::Other(_) => ApiError::Internal(msg),
        }
    }
}

fn parse_column(raw: &str) -> Result<Column, ApiError> {
    Column::from_str(raw).map_err(|_| {
        BoardError::InvalidColumn {
            column: raw.to_string(),
        }
        .into()
    })
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/board", get(get_board))
        .route("/api/reload", post(reload_board))
        .route("/api/columns/{column}", get(get_column))
        .route("/api/drop", post(drop_card))
        .route(
            "/api/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/api/items/{id}/send", post(send_item))
        .route("/api/items/{id}/reprove/confirm", post(confirm_reprove))
        .route("/api/items/{id}/reprove/cancel", post(cancel_reprove))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_board(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.store.board().await)
}

async fn reload_board(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    state.store.load().await?;
    Ok(Json(state.store.board().await))
}

async fn get_column(
    State(state): State<SharedState>,
    Path(column): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let column = parse_column(&column)?;
    Ok(Json(state.store.column(column).await))
}

async fn drop_card(
    State(state): State<SharedState>,
    Json(req): Json<DropRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let column = parse_column(&req.column)?;
    let result = state.controller.drop_on(column, &req.payload).await?;
    Ok(Json(result))
}

async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.controller.orchestrator().fetch_detail(&id).await?;
    Ok(Json(item))
}

async fn update_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(edit): Json<ProductionEdit>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .controller
        .orchestrator()
        .save_edits(&id, &edit)
        .await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.orchestrator().delete_item(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.controller.orchestrator().send_to_wordpress(&id).await?;
    Ok(Json(report))
}

async fn confirm_reprove(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.controller.confirm(&id).await?;
    Ok(Json(report))
}

async fn cancel_reprove(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state.controller.cancel(&id).await?;
    Ok(Json(serde_json::json!({ "id": id, "column": column })))
}

// ── Tests ─────────────────────────────────────────────────────────────
