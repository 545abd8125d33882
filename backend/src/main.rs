use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ngo_identity_api::{
    app,
    config::Config,
    db::{self, MemoryRegistryStore, PgRegistryStore, RegistryStore},
    services::ledger::xrpl::{XrplConfig, XrplRpcGateway},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let store: Arc<dyn RegistryStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected and migrations applied");
            Arc::new(PgRegistryStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store, records are lost on restart");
            Arc::new(MemoryRegistryStore::new())
        }
    };

    let ledger = Arc::new(XrplRpcGateway::new(XrplConfig::from_config(&config)));
    info!("Ledger gateway: {} via {}", config.xrpl_network, config.xrpl_rpc_url);

    let state = AppState::new(store, ledger, config.clone());
    match state.issuer.as_deref() {
        Some(issuer) if issuer.can_sign() => {
            info!("Anchoring enabled: server signs as {}", issuer.address)
        }
        Some(issuer) => info!(
            "Anchoring templates only: {} has no seed configured",
            issuer.address
        ),
        None => info!("No issuer configured, anchoring disabled"),
    }

    let addr = format!("{}:{}", config.host, config.port);
    info!("NGO identity registry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
