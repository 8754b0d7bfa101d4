use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_target_fps() -> f64 {
    60.0
}

fn default_ruby_offset() -> i32 {
    5
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OverlayConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,
    /// Pixels between a word and its ruby text
    #[serde(default = "default_ruby_offset")]
    pub ruby_offset: i32,
}

impl OverlayConfig {
    /// Per-frame budget, 16667µs at the default 60fps
    pub fn frame_budget_micros(&self) -> u64 {
        let fps = if self.target_fps.is_finite() && self.target_fps > 0.0 {
            self.target_fps
        } else {
            default_target_fps()
        };
        (1_000_000.0 / fps) as u64
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            target_fps: default_target_fps(),
            ruby_offset: default_ruby_offset(),
        }
    }
}
