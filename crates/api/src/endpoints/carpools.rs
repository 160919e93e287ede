//! Carpool endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use carpool_common::AppResult;
use carpool_core::{CarpoolDetails, CarpoolSummary, CreateCarpoolInput};
use carpool_db::entities::{activity, carpool};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, ok},
};

#[derive(Debug, Deserialize)]
pub struct CarpoolIdRequest {
    pub carpool_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListCarpoolsRequest {
    pub activity_id: String,
}

/// Visible activities.
async fn activities(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<activity::Model>>> {
    let activities = state.carpool_service.activities().await?;
    Ok(ApiResponse::ok(activities))
}

/// Offer a carpool. The caller becomes the driver.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCarpoolInput>,
) -> AppResult<ApiResponse<carpool::Model>> {
    let carpool = state.carpool_service.create(&user.id, req).await?;
    Ok(ApiResponse::ok(carpool))
}

async fn list(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListCarpoolsRequest>,
) -> AppResult<ApiResponse<Vec<CarpoolSummary>>> {
    let carpools = state
        .carpool_service
        .list_by_activity(&req.activity_id)
        .await?;
    Ok(ApiResponse::ok(carpools))
}

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<ApiResponse<CarpoolDetails>> {
    let details = state.carpool_service.details(&req.carpool_id).await?;
    Ok(ApiResponse::ok(details))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .carpool_service
        .delete(&user.id, &req.carpool_id)
        .await?;
    Ok(ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activities", post(activities))
        .route("/create", post(create))
        .route("/list", post(list))
        .route("/show", post(show))
        .route("/delete", post(delete))
}
