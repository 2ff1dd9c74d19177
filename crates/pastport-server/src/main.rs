use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router, middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use pastport_api::auth::{self, AppState, AppStateInner};
use pastport_api::middleware::require_auth;
use pastport_api::{entries, notifications, preferences};
use pastport_notify::Notifier;
use pastport_notify::email::{EmailConfig, create_provider};
use pastport_scheduler::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pastport=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PASTPORT_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PASTPORT_DB_PATH").unwrap_or_else(|_| "pastport.db".into());
    let host = std::env::var("PASTPORT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PASTPORT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let scheduler_config = SchedulerConfig {
        unlock_interval: env_secs("PASTPORT_UNLOCK_SCAN_SECS", 3600),
        lookahead_interval: env_secs("PASTPORT_LOOKAHEAD_SCAN_SECS", 86_400),
        cleanup_interval: env_secs("PASTPORT_CLEANUP_SCAN_SECS", 86_400),
    };

    // Init database
    let db = Arc::new(pastport_db::Database::open(&PathBuf::from(&db_path))?);

    // Email transport; absent SMTP config leaves it disabled and sends
    // report "skipped".
    let email_config = email_config_from_env();
    match &email_config {
        Some(cfg) => info!("Email transport: SMTP via {}:{}", cfg.host, cfg.port),
        None => info!("Email transport disabled (PASTPORT_SMTP_HOST not set)"),
    }
    let provider = create_provider(email_config)?;
    let notifier = Arc::new(Notifier::new(db.clone(), provider));

    // Background passes
    let mut scheduler = Scheduler::new(db.clone(), notifier.clone(), scheduler_config);
    scheduler.start();

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        notifier,
        jwt_secret,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/capsules", get(entries::list_capsules))
        .route("/capsules", post(entries::create_capsule))
        .route("/capsules/{id}", get(entries::get_capsule))
        .route("/capsules/{id}", patch(entries::update_capsule))
        .route("/capsules/{id}", delete(entries::delete_capsule))
        .route("/capsules/{id}/unlock", post(entries::unlock_capsule))
        .route("/journal", get(entries::list_journal_entries))
        .route("/journal", post(entries::create_journal_entry))
        .route("/journal/{id}", get(entries::get_journal_entry))
        .route("/journal/{id}", patch(entries::update_journal_entry))
        .route("/journal/{id}", delete(entries::delete_journal_entry))
        .route("/journal/{id}/unlock", post(entries::unlock_journal_entry))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/me/preferences", get(preferences::get_prefs))
        .route("/me/preferences", patch(preferences::update_prefs))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("PastPort server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

fn email_config_from_env() -> Option<EmailConfig> {
    let host = std::env::var("PASTPORT_SMTP_HOST").ok()?;
    Some(EmailConfig {
        host,
        port: std::env::var("PASTPORT_SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587),
        username: std::env::var("PASTPORT_SMTP_USERNAME").ok(),
        password: std::env::var("PASTPORT_SMTP_PASSWORD").ok(),
        use_tls: std::env::var("PASTPORT_SMTP_TLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true),
        from_address: std::env::var("PASTPORT_EMAIL_FROM")
            .unwrap_or_else(|_| "no-reply@pastport.local".into()),
        from_name: std::env::var("PASTPORT_EMAIL_FROM_NAME").ok(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
