//! Passenger endpoints.

use axum::{Json, Router, extract::State, routing::post};
use carpool_common::{AppError, AppResult};
use carpool_core::{EligibleChildren, JoinStatus, OccupantSelection, PassengerEntry, SeatChange};
use carpool_db::entities::passenger::Occupant;
use serde::Deserialize;

use crate::{
    endpoints::carpools::CarpoolIdRequest, extractors::AuthUser, middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct AddPassengerRequest {
    pub carpool_id: String,
    pub child_id: Option<String>,
    #[serde(default)]
    pub add_self: bool,
}

/// Remove a child, a direct user, or the caller when neither is given.
#[derive(Debug, Deserialize)]
pub struct RemovePassengerRequest {
    pub carpool_id: String,
    pub child_id: Option<String>,
    pub user_id: Option<String>,
}

impl RemovePassengerRequest {
    fn occupant(&self, caller_id: &str) -> AppResult<Occupant> {
        match (&self.child_id, &self.user_id) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Pass either child_id or user_id, not both".to_string(),
            )),
            (Some(child_id), None) => Ok(Occupant::Child(child_id.clone())),
            (None, Some(user_id)) => Ok(Occupant::DirectUser(user_id.clone())),
            (None, None) => Ok(Occupant::DirectUser(caller_id.to_string())),
        }
    }
}

async fn add(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AddPassengerRequest>,
) -> AppResult<ApiResponse<SeatChange>> {
    let selection = OccupantSelection::from_request(req.child_id, req.add_self)?;
    let change = state
        .seat_ledger
        .add_passenger(&user, &req.carpool_id, selection)
        .await?;
    Ok(ApiResponse::ok(change))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RemovePassengerRequest>,
) -> AppResult<ApiResponse<SeatChange>> {
    let occupant = req.occupant(&user.id)?;
    let change = state
        .seat_ledger
        .remove_passenger(&user, &req.carpool_id, occupant)
        .await?;
    Ok(ApiResponse::ok(change))
}

async fn list(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<ApiResponse<Vec<PassengerEntry>>> {
    let passengers = state.seat_ledger.passengers(&req.carpool_id).await?;
    Ok(ApiResponse::ok(passengers))
}

async fn eligible_children(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<ApiResponse<EligibleChildren>> {
    let children = state
        .seat_ledger
        .eligible_children(&user.id, &req.carpool_id)
        .await?;
    Ok(ApiResponse::ok(children))
}

async fn join_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CarpoolIdRequest>,
) -> AppResult<ApiResponse<JoinStatus>> {
    let status = state
        .seat_ledger
        .join_status(&user.id, &req.carpool_id)
        .await?;
    Ok(ApiResponse::ok(status))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add))
        .route("/remove", post(remove))
        .route("/list", post(list))
        .route("/eligible-children", post(eligible_children))
        .route("/join-status", post(join_status))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(child_id: Option<&str>, user_id: Option<&str>) -> RemovePassengerRequest {
        RemovePassengerRequest {
            carpool_id: "c1".to_string(),
            child_id: child_id.map(str::to_string),
            user_id: user_id.map(str::to_string),
        }
    }

    #[test]
    fn test_remove_target() {
        assert_eq!(
            request(None, None).occupant("me").unwrap(),
            Occupant::DirectUser("me".to_string())
        );
        assert_eq!(
            request(Some("k1"), None).occupant("me").unwrap(),
            Occupant::Child("k1".to_string())
        );
        assert!(request(Some("k1"), Some("u1")).occupant("me").is_err());
    }
}
