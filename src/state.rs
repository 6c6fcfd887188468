//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::storage::ObjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn ObjectStore>,
    db: SqlitePool,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, db: SqlitePool) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, store, db }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the object store
    pub fn store(&self) -> &dyn ObjectStore {
        self.inner.store.as_ref()
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }
}
