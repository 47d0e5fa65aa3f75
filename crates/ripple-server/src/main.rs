mod config;
mod probe;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use ripple_api::{routes, state::AppStateInner};
use ripple_store::{FailoverStore, LocalStore, RemoteStore, StoreBackend};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ripple=debug,ripple_core=debug,ripple_store=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // The local database is always opened; it is the fallback in remote mode.
    let local = LocalStore::open(&config.db_path)?;

    let store = match config.remote.clone() {
        Some(remote) => {
            info!("Using remote store at {}", remote.base_url);
            let primary = StoreBackend::Remote(RemoteStore::new(remote)?);
            let store = Arc::new(FailoverStore::new(primary, local));
            if !store.probe().await {
                warn!(
                    "Remote store not reachable at startup, serving from {}",
                    config.db_path.display()
                );
            }
            tokio::spawn(probe::run_probe_loop(store.clone(), config.probe_interval));
            store
        }
        None => {
            info!("Using local store at {}", config.db_path.display());
            Arc::new(FailoverStore::local_only(local))
        }
    };

    let app = routes::router(AppStateInner::new(store))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Ripple server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
