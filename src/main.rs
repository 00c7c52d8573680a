use crosspay_core::adapters::{InMemoryOrderStore, PostgresOrderStore};
use crosspay_core::config::Config;
use crosspay_core::ports::OrderStore;
use crosspay_core::services::build_providers;
use crosspay_core::{create_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresOrderStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("Database migrations completed");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    let providers = build_providers(&config).await?;
    tracing::info!(
        primary = config.primary_provider.as_str(),
        fallbacks = ?config.fallback_providers.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "Swap providers ready"
    );

    let state = AppState::new(store, providers, config.fees.clone(), config.retry.clone())?
        .with_cors_origins(config.cors_allowed_origins.clone());
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
