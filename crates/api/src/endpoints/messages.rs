//! Carpool chat endpoints.

use axum::{Json, Router, extract::State, routing::post};
use carpool_common::AppResult;
use carpool_db::entities::carpool_message;
use serde::Deserialize;

use crate::{
    endpoints::carpools::CarpoolIdRequest, extractors::AuthUser, middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub carpool_id: String,
    pub content: String,
}

async fn history(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<ApiResponse<Vec<carpool_message::Model>>> {
    let messages = state.chat_service.history(&req.carpool_id).await?;
    Ok(ApiResponse::ok(messages))
}

async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<ApiResponse<carpool_message::Model>> {
    let message = state
        .chat_service
        .send_message(&req.carpool_id, &user.id, &req.content)
        .await?;
    Ok(ApiResponse::ok(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(history))
        .route("/send", post(send))
}
