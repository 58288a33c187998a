use std::sync::Arc;

use sqlx::SqlitePool;

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::watchdog::DisconnectWatchdog;

/// Shared application state.
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub collaborators: Collaborators,
    pub watchdog: Arc<DisconnectWatchdog>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, collaborators: Collaborators) -> Self {
        let watchdog = Arc::new(DisconnectWatchdog::new(
            config.disconnect_timeout,
            config.watchdog_max_retries,
            config.watchdog_retry_delay,
        ));
        Self {
            db,
            config,
            collaborators,
            watchdog,
        }
    }

    /// Attempts per best-effort collaborator call.
    pub fn attempts(&self) -> u32 {
        self.config.collaborator_attempts
    }
}
