use std::sync::Arc;

use cci_portal::app::{AppServices, app_router};
use cci_portal::core::clock::{SharedClock, SystemClock};
use cci_portal::core::config::Config;
use cci_portal::core::db::{MemoryStore, Stores, create_pool_with_migrations, postgres_stores};
use cci_portal::core::notify::{LogNotifier, NotificationDispatcher, Notifier, ResendNotifier};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, email={}, timezone={}, service_start={}",
        config.has_database(),
        config.has_email_provider(),
        config.check_in.timezone(),
        config.check_in.service_start()
    );

    let (stores, pool) = match &config.database {
        Some(db) => {
            let pool = create_pool_with_migrations(db).await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            (postgres_stores(pool.clone()), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            (Stores::from_single(Arc::new(MemoryStore::new())), None)
        }
    };

    let notifier: Arc<dyn Notifier> = match config.resend.clone() {
        Some(resend) => Arc::new(ResendNotifier::new(resend)),
        None => {
            tracing::warn!("RESEND_API_KEY not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let (notifications, _notification_worker) = NotificationDispatcher::spawn(notifier);

    let clock: SharedClock = Arc::new(SystemClock);
    let mut services = AppServices::new(&config, stores, notifications, clock);
    if let Some(pool) = pool {
        services = services.with_pool(pool);
    }

    let _sweeper = services
        .ledger
        .clone()
        .spawn_sweeper(config.refresh_sweep_interval);

    let app = app_router(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
