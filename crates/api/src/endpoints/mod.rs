//! API endpoints.

mod admin;
mod carpools;
mod messages;
mod notifications;
mod passengers;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/carpools", carpools::router())
        .nest("/carpools/passengers", passengers::router())
        .nest("/carpools/messages", messages::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
