//! Carpool server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use carpool_api::{StreamingState, middleware::AppState, router as api_router, streaming_handler};
use carpool_common::{Config, IdGenerator, SuppressionBackend};
use carpool_core::{
    AdminService, CarpoolService, ChatService, EmailSuppressionService, InMemoryEmailSuppression,
    InMemoryPresenceTracker, NotificationService, PresenceService, RealtimeService,
    RedisEmailSuppression, RoleRegistry, RoleService, RosterResolver, SeatLedger, SmtpMailer,
};
use carpool_db::repositories::{
    ActivityRepository, CarRepository, CarpoolMessageRepository, CarpoolRepository,
    ChildRepository, NotificationRepository, RoleRepository, UserRepository,
};
use fred::prelude::*;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Pick the suppression store configured for this deployment.
async fn suppression_store(config: &Config) -> anyhow::Result<EmailSuppressionService> {
    match config.notifications.suppression_backend {
        SuppressionBackend::Memory => {
            info!("Using in-memory email suppression");
            Ok(Arc::new(InMemoryEmailSuppression::new()))
        }
        SuppressionBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .context("notifications.suppression_backend = \"redis\" needs a [redis] section")?;

            let fred_config = fred::types::config::Config::from_url(&redis.url)
                .context("Failed to parse Redis URL")?;
            let client = fred::clients::Client::new(fred_config, None, None, None);
            client.init().await.context("Failed to connect to Redis")?;
            info!("Using Redis email suppression");

            Ok(Arc::new(RedisEmailSuppression::new(
                Arc::new(client),
                redis.prefix.clone(),
            )))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carpool=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting carpool server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(carpool_db::connect(&config.database).await?);
    info!("Connected to database");

    let applied = carpool_db::migrate(&db).await?;
    info!(applied, "Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let role_repo = RoleRepository::new(Arc::clone(&db));
    let child_repo = ChildRepository::new(Arc::clone(&db));
    let carpool_repo = CarpoolRepository::new(Arc::clone(&db));
    let activity_repo = ActivityRepository::new(Arc::clone(&db));

    let registry = RoleRegistry::load(&role_repo, &IdGenerator::new()).await?;
    let roles = RoleService::new(role_repo, registry);
    let roster = RosterResolver::new(carpool_repo.clone(), child_repo.clone(), user_repo.clone());

    let streaming = StreamingState::new();
    let realtime: RealtimeService = Arc::new(streaming.clone());
    let presence: PresenceService = Arc::new(InMemoryPresenceTracker::new());

    let mut notification_service = NotificationService::new(
        NotificationRepository::new(Arc::clone(&db)),
        user_repo.clone(),
        carpool_repo.clone(),
        activity_repo.clone(),
        roster.clone(),
        presence.clone(),
        suppression_store(&config).await?,
        config.notifications.clone(),
        config.server.url.clone(),
    );
    notification_service.set_realtime(realtime.clone());
    if let Some(ref mail) = config.mail {
        notification_service.set_mailer(Arc::new(SmtpMailer::new(mail)?));
        info!(host = %mail.host, "SMTP mailer configured");
    } else {
        warn!("No [mail] section, notification emails are disabled");
    }

    let mut seat_ledger = SeatLedger::new(
        carpool_repo.clone(),
        activity_repo.clone(),
        child_repo,
        roles.clone(),
        roster.clone(),
    );
    seat_ledger.set_realtime(realtime.clone());
    seat_ledger.set_notifications(notification_service.clone());

    let mut chat_service = ChatService::new(
        carpool_repo.clone(),
        CarpoolMessageRepository::new(Arc::clone(&db)),
        presence,
    );
    chat_service.set_realtime(realtime);
    chat_service.set_notifications(notification_service.clone());

    let carpool_service = CarpoolService::new(
        carpool_repo,
        activity_repo,
        CarRepository::new(Arc::clone(&db)),
        user_repo.clone(),
        roster,
        roles.clone(),
    );
    let admin_service = AdminService::new(user_repo.clone(), roles);

    let state = AppState {
        user_repo,
        carpool_service,
        seat_ledger,
        chat_service,
        notification_service,
        admin_service,
        streaming,
    };

    // Build router
    let app = Router::new()
        .route("/streaming", get(streaming_handler))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            carpool_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid server.host {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
