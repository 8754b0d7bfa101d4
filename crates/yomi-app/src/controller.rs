use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use yomi_types::AppEvent;

use crate::orchestrator::{Orchestrator, Services};
use crate::state::AppState;

/// Centralized channel management
pub struct ChannelSet {
    pub app_to_ui: (AsyncSender<AppEvent>, AsyncReceiver<AppEvent>),
    pub ui_to_app: (AsyncSender<AppEvent>, AsyncReceiver<AppEvent>),
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            app_to_ui: kanal::bounded_async(256), // sentence bursts
            ui_to_app: kanal::bounded_async(64),  // user commands
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Application controller for task spawning and lifecycle
pub struct AppController {
    channels: ChannelSet,
    state: Arc<AppState>,
    cancel_token: CancellationToken,
}

impl AppController {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            channels: ChannelSet::new(),
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Sender for commands into the orchestrator
    pub fn commands(&self) -> AsyncSender<AppEvent> {
        self.channels.ui_to_app.0.clone()
    }

    /// Receiver for notifications coming out of the orchestrator
    pub fn notifications(&self) -> AsyncReceiver<AppEvent> {
        self.channels.app_to_ui.1.clone()
    }

    pub async fn spawn_tasks(&self, services: Services) -> JoinSet<anyhow::Result<()>> {
        let mut tasks = JoinSet::new();

        let orchestrator = Orchestrator::new(
            self.state.clone(),
            services,
            self.channels.app_to_ui.0.clone(),
        )
        .await;

        // Event loop
        tasks.spawn(orchestrator.run(
            self.channels.ui_to_app.1.clone(),
            self.cancel_token.child_token(),
        ));

        // Notification log, stands in for a presentation layer
        tasks.spawn(log_notifications(self.channels.app_to_ui.1.clone()));

        tasks
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

/// Log everything the orchestrator reports until `ShutdownComplete`
pub async fn log_notifications(events: AsyncReceiver<AppEvent>) -> anyhow::Result<()> {
    loop {
        match events.recv().await? {
            AppEvent::StatusUpdate { status, capturing } => {
                tracing::info!("Status: {} (capturing: {})", status, capturing);
            }
            AppEvent::SentenceDetected { text, tokens } => {
                let readings: Vec<String> = tokens
                    .iter()
                    .map(|t| {
                        if t.reading.is_empty() || t.reading == t.surface {
                            t.surface.clone()
                        } else {
                            format!("{}[{}]", t.surface, t.reading)
                        }
                    })
                    .collect();
                tracing::info!("Sentence: {} => {}", text, readings.join(" "));
            }
            AppEvent::CaptureStopped(summary) => {
                tracing::info!("Capture stopped: {:?}", summary);
            }
            AppEvent::SnapshotSaved {
                image_path,
                json_path,
            } => {
                tracing::info!("Snapshot saved: {} / {}", image_path, json_path);
            }
            AppEvent::ShutdownComplete => {
                tracing::info!("Shutdown complete");
                return Ok(());
            }
            other => {
                tracing::debug!("Ignoring command on notification channel: {:?}", other);
            }
        }
    }
}
