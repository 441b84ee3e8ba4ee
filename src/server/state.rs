//! Application state shared across handlers.

use crate::config::Config;
use crate::db::Database;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Catalog database.
    pub db: Database,
}

impl AppState {
    /// Create new application state with database.
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    /// Absolute base URL for generating links.
    pub fn base_url(&self, host: Option<&str>) -> String {
        self.config.base_url(host)
    }
}
