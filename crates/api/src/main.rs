use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use taskflow_api::config::ServerConfig;
use taskflow_api::router::build_app_router;
use taskflow_api::state::AppState;
use taskflow_events::{EventBus, EventPersistence};

const DEFAULT_LOG_FILTER: &str = "taskflow_api=debug,taskflow_events=info,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    let pool = open_database().await;

    let event_bus = Arc::new(EventBus::default());
    let event_log = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    let app = build_app_router(
        AppState {
            pool,
            config: Arc::new(config.clone()),
            event_bus: Arc::clone(&event_bus),
        },
        &config,
    );

    let host = config
        .host
        .parse()
        .unwrap_or_else(|e| panic!("HOST is not an IP address ({}): {e}", config.host));
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Cannot bind {addr}: {e}"));
    tracing::info!(%addr, "Taskflow API listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
    {
        tracing::error!(error = %e, "Server terminated with an error");
    }

    // Last sender; the event log exits once it has drained the channel.
    drop(event_bus);
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(grace, event_log).await {
        Ok(_) => tracing::info!("Shutdown complete"),
        Err(_) => tracing::warn!(
            grace_secs = config.shutdown_timeout_secs,
            "Event log still draining at shutdown, remaining events dropped"
        ),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, ping and migrate. Any failure aborts start-up.
async fn open_database() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = taskflow_db::create_pool(&url)
        .await
        .expect("Cannot connect to the database");
    taskflow_db::health_check(&pool)
        .await
        .expect("Database did not answer the health check");
    taskflow_db::run_migrations(&pool)
        .await
        .expect("Migrations failed");
    tracing::info!("Database connected and migrated");
    pool
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown requested, draining connections");
}
