use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;

/// Pipeline status information
#[derive(Clone, Debug, Default)]
pub struct PipelineStatus {
    pub capturing: bool,
    pub current_message: String,
    pub sentences_published: u64,
    pub last_published_at: Option<SystemTime>,
    pub error_count: u64,
}

/// Application status
pub struct AppStatus {
    pub pipeline: Arc<RwLock<PipelineStatus>>,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            pipeline: Arc::new(RwLock::new(PipelineStatus::default())),
        }
    }
}

impl Default for AppStatus {
    fn default() -> Self {
        Self::new()
    }
}
