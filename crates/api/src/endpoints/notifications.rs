//! Notifications endpoints.

use axum::{Json, Router, extract::State, routing::post};
use carpool_common::AppResult;
use carpool_core::NotificationList;
use carpool_db::entities::notification::NotificationKind;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub carpool_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<NotificationList>> {
    let list = state.notification_service.list(&user.id).await?;
    Ok(ApiResponse::ok(list))
}

async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let unread_count = state.notification_service.unread_count(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { unread_count }))
}

/// Mark one type of notification for a carpool read. Read rows are removed.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let unread_count = state
        .notification_service
        .mark_read(&user.id, &req.carpool_id, req.kind)
        .await?;
    Ok(ApiResponse::ok(UnreadCountResponse { unread_count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(list))
        .route("/unread-count", post(unread_count))
        .route("/mark-read", post(mark_read))
}
