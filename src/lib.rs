pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{
    InstanceConfigError, InstanceConfigResponse, InstanceConfigService, ProjectRegistry,
    RegistryError,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryResponseCache, MemoryStore, PostgresStore, ResponseCache, Store};

use std::sync::Arc;

use crate::api::handlers::AppContext;
use crate::config::{AppConfig, ConfigDefaults};

/// Wire a store and response cache into a ready-to-serve router
pub fn build_app<S: Store + 'static>(
    store: Arc<S>,
    cache: Arc<dyn ResponseCache>,
    defaults: ConfigDefaults,
    config: &AppConfig,
) -> axum::Router {
    let instance_config = InstanceConfigService::new(
        store.clone(),
        cache,
        defaults,
        config.instance_config_ttl(),
    );
    let state = Arc::new(AppContext {
        store,
        instance_config,
    });
    api::routes::create_router().with_state(state)
}

/// Connect to PostgreSQL, apply migrations and the optional bootstrap, then serve
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use env_logger::Builder;
    use log::LevelFilter;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Info by default, sqlx debug logs suppressed; RUST_LOG still overrides
    let _ = Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .try_init();

    let config = AppConfig::load()?;
    log::info!(
        "configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    log::info!("connecting to PostgreSQL");
    let database_url = config.database_url()?;
    let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

    log::info!("running database migrations");
    postgres_store.migrate().await?;
    let store = Arc::new(postgres_store);

    bootstrap(&*store).await?;

    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryResponseCache::default());
    let app = build_app(store, cache, ConfigDefaults::from_env(), &config);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("projectdesk running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}

/// Optional first-run setup driven by `REGISTER_INSTANCE` and `INSTANCE_ADMIN_USER_ID`
pub async fn bootstrap<S: Store>(store: &S) -> anyhow::Result<()> {
    if std::env::var("REGISTER_INSTANCE").unwrap_or_default() == "true" {
        let name = std::env::var("INSTANCE_NAME").unwrap_or_else(|_| "ProjectDesk".to_string());
        seed::register_instance(store, &name).await?;
    }

    if let Ok(user_id) = std::env::var("INSTANCE_ADMIN_USER_ID") {
        if !user_id.trim().is_empty() {
            seed::grant_instance_admin(store, user_id.trim()).await?;
        }
    }

    Ok(())
}
