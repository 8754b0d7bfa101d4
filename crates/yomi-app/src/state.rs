use std::sync::Arc;

use tokio::sync::RwLock;
use yomi_config::Config;

use crate::status::AppStatus;

/// State shared between the orchestrator and whoever drives it
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub status: AppStatus,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            status: AppStatus::new(),
        }
    }
}
