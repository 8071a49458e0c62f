mod callbacks;
mod config;
mod status;
mod token;

use axum::{middleware, Router};

use crate::middleware::require_admin;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let admin = config::routes().layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .merge(admin)
        .merge(status::routes())
        .merge(token::routes())
        .merge(callbacks::routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Instant;

    use crate::models::{StreamConfig, StreamUser};
    use crate::services::{
        AnalyticsLog, ConfigSynchronizer, NginxReloader, SessionManager, ViewerCountCache,
    };
    use crate::store::ConfigStore;
    use crate::AppState;

    /// App state over temp files, with one configured publisher
    /// (alice / k1) and the viewer cache pointed at `stat_url`.
    pub fn state_with_stat_url(dir: &tempfile::TempDir, stat_url: &str) -> AppState {
        let store = ConfigStore::at(dir.path().join("config.json"));
        let mut config = StreamConfig::default();
        config.auth.users.push(StreamUser {
            username: "alice".into(),
            key: "k1".into(),
        });
        store.write(&config).unwrap();

        let analytics = AnalyticsLog::at(dir.path().join("analytics.json"));
        let session = Arc::new(SessionManager::load_from(
            dir.path().join("session.json"),
            analytics.clone(),
        ));

        AppState {
            store,
            analytics,
            session,
            synchronizer: Arc::new(ConfigSynchronizer::with_conf_path(
                dir.path().join("nginx.conf"),
            )),
            reloader: NginxReloader::with_binary("true".into()),
            viewers: Arc::new(ViewerCountCache::with_stat_url(stat_url.to_string())),
            started_at: Instant::now(),
        }
    }
}
