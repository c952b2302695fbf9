use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use common_auth::{JwtConfig, JwtVerifier};
use order_service::store::{MemoryStore, PgStore, Store};
use order_service::vendor::{HttpVendorClient, SalePoster};
use order_service::{build_router, AppConfig, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn Store> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let vendor: Arc<dyn SalePoster> = Arc::new(HttpVendorClient::new(config.vendor.clone())?);
    let jwt_config = JwtConfig::new(config.login.secret.clone(), config.login.issuer.clone())
        .with_leeway(config.login.leeway_seconds);
    let jwt_verifier = Arc::new(JwtVerifier::new(jwt_config));

    let ip: IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY not set; admin routes are unguarded");
    }

    let state = AppState {
        store,
        vendor,
        jwt_verifier,
        config: Arc::new(config),
    };
    let app = build_router(state);

    info!(%addr, "starting order-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
