use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    cache::{Cache, MemoryCache},
    config::AppConfig,
    notifications::{Notifier, TracingNotifier},
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn Cache>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(
        orm: DatabaseConnection,
        config: AppConfig,
        cache: Arc<dyn Cache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orm,
            config: Arc::new(config),
            cache,
            notifier,
        }
    }

    /// In-process cache and a notifier that only logs.
    pub fn with_defaults(orm: DatabaseConnection, config: AppConfig) -> Self {
        Self::new(
            orm,
            config,
            Arc::new(MemoryCache::new()),
            Arc::new(TracingNotifier),
        )
    }
}
