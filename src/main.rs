//! Account ledger server
//!
//! HTTP front end over the ledger engine, backed by PostgreSQL or by the
//! in-memory store (`STORE_BACKEND=memory`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use account_ledger::config::{LogFormat, StoreBackend};
use account_ledger::notify::{ChannelNotifier, LogSink};
use account_ledger::store::{InMemoryStore, LedgerRepository, PgStore};
use account_ledger::{api, db, jobs, Config, LedgerEngine};

/// How long queued notifications may take to drain on shutdown
const NOTIFY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "account_ledger=debug,tower_http=debug".into()),
    );

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(
        environment = %config.environment,
        backend = ?config.store_backend,
        "Starting account ledger server"
    );

    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;

            tracing::info!("Connecting to database...");
            let pool = db::connect(database_url, config.database_max_connections).await?;
            db::verify_connection(&pool).await?;

            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }
            tracing::info!("Database connected successfully");

            serve(PgStore::new(pool.clone()), &config, addr).await?;

            pool.close().await;
            tracing::info!("Database connections closed");
        }
        StoreBackend::Memory => {
            if config.is_production() {
                tracing::warn!("In-memory store in production: data is lost on restart");
            }
            serve(InMemoryStore::new(), &config, addr).await?;
        }
    }

    tracing::info!("Goodbye!");
    Ok(())
}

/// Run the HTTP server over `store` until a shutdown signal arrives
async fn serve<S>(store: S, config: &Config, addr: SocketAddr) -> anyhow::Result<()>
where
    S: LedgerRepository + 'static,
{
    let (notifier, delivery) = ChannelNotifier::spawn(LogSink, config.notifier_config());
    let engine = Arc::new(LedgerEngine::new(store, notifier, config.engine_config()));

    let reconciliation = config.reconcile_interval.map(|period| {
        tracing::info!(period_secs = period.as_secs(), "Scheduling reconciliation");
        jobs::spawn_reconciliation_job(engine.clone(), period)
    });

    let app = api::build_router(engine.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(job) = reconciliation {
        job.abort();
        let _ = job.await;
    }

    // last engine handle closes the notification queue
    drop(engine);
    match tokio::time::timeout(NOTIFY_DRAIN_TIMEOUT, delivery).await {
        Ok(Ok(stats)) => tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "Notifications drained"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "Notification task failed"),
        Err(_) => tracing::warn!("Timed out draining notifications"),
    }

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
