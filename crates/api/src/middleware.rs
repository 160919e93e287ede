//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use carpool_core::{AdminService, CarpoolService, ChatService, NotificationService, SeatLedger};
use carpool_db::repositories::UserRepository;

use crate::streaming::StreamingState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_repo: UserRepository,
    pub carpool_service: CarpoolService,
    pub seat_ledger: SeatLedger,
    pub chat_service: ChatService,
    pub notification_service: NotificationService,
    pub admin_service: AdminService,
    pub streaming: StreamingState,
}

/// Pull the access token from `Authorization: Bearer` or the `i` query parameter.
fn request_token(req: &Request<Body>) -> Option<String> {
    if let Some(token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    // The WebSocket client cannot set headers
    req.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "i")
            .map(|(_, value)| value.to_string())
    })
}

/// Authentication middleware.
///
/// Resolves the token to a user and stores it in the request extensions.
/// Whether a route requires one is up to its extractors.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = request_token(&req).filter(|t| !t.is_empty()) {
        match state.user_repo.find_by_token(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => tracing::debug!("Unknown access token"),
            Err(e) => tracing::warn!(error = %e, "Token lookup failed"),
        }
    }

    next.run(req).await
}
