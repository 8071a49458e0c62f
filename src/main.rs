mod api;
mod config;
mod error;
mod middleware;
mod models;
mod services;
mod store;

use std::sync::Arc;
use std::time::Instant;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;
use crate::services::{
    AnalyticsLog, ConfigSynchronizer, NginxReloader, SessionManager, ViewerCountCache,
};
use crate::store::ConfigStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_admin_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings and the declarative configuration store
    let settings = Settings::load()?;
    tracing::info!("Settings loaded successfully");

    let store = ConfigStore::open(&settings)?;
    let analytics = AnalyticsLog::new(&settings);

    // Restore the session record, applying crash/restart recovery
    let session = Arc::new(SessionManager::load(&settings, analytics.clone()));

    let synchronizer = Arc::new(ConfigSynchronizer::new(&settings));
    if let Ok(config) = store.read() {
        synchronizer.warn_on_secret_mismatch(&config);
    }

    let state = AppState {
        store,
        analytics,
        session,
        synchronizer,
        reloader: NginxReloader::new(&settings),
        viewers: Arc::new(ViewerCountCache::new(&settings)),
        started_at: Instant::now(),
    };

    // Build router
    let app = axum::Router::new()
        .nest("/api", api::routes(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub analytics: AnalyticsLog,
    pub session: Arc<SessionManager>,
    pub synchronizer: Arc<ConfigSynchronizer>,
    pub reloader: NginxReloader,
    pub viewers: Arc<ViewerCountCache>,
    pub started_at: Instant,
}
