//! Admin endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use carpool_common::AppResult;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ok};

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: String,
}

/// Delete a user with their carpools, seats, cars and orphaned children.
async fn delete_user(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteUserRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .admin_service
        .delete_user(&admin.id, &req.user_id)
        .await?;
    Ok(ok())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users/delete", post(delete_user))
}
