use std::env;

use serde::{Deserialize, Serialize};

pub const MIN_INTERVAL_SECONDS: f64 = 0.1;
pub const MAX_INTERVAL_SECONDS: f64 = 5.0;
const MIN_INTERVAL_MS: u64 = 10;

fn default_interval_seconds() -> f64 {
    1.0
}

fn default_change_detection() -> bool {
    false
}

fn default_queue_capacity() -> usize {
    8
}

fn default_occlusion_threshold() -> f64 {
    0.2
}

fn default_max_failures_before_fallback() -> u32 {
    60
}

fn default_duplication_timeout_ms() -> u64 {
    100
}

fn default_failure_backoff_ms() -> u64 {
    10
}

fn default_change_threshold() -> f64 {
    0.95
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds between capture attempts, clamped to 0.1..=5.0
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    /// Skip frames whose histogram barely moved
    #[serde(default = "default_change_detection")]
    pub change_detection: bool,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Fraction of the target covered by another window before the
    /// duplication backend refuses to capture
    #[serde(default = "default_occlusion_threshold")]
    pub occlusion_threshold: f64,
    #[serde(default = "default_max_failures_before_fallback")]
    pub max_failures_before_fallback: u32,
    /// How long the duplication backend waits for a changed screen
    #[serde(default = "default_duplication_timeout_ms")]
    pub duplication_timeout_ms: u64,
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
    /// Histogram correlation above which a frame counts as unchanged
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f64,
}

impl CaptureConfig {
    pub fn new() -> Self {
        let interval_seconds = env::var("YOMI_CAPTURE_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_interval_seconds);

        let change_detection = env::var("YOMI_CHANGE_DETECTION")
            .ok()
            .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
            .unwrap_or_else(default_change_detection);

        Self {
            interval_seconds: clamp_interval_seconds(interval_seconds),
            change_detection,
            ..Self::default()
        }
    }

    /// Capture cadence in milliseconds with a 10ms floor
    pub fn interval_ms(&self) -> u64 {
        interval_seconds_to_ms(self.interval_seconds)
    }

    /// Stable polls the assembler needs before a sentence is released
    pub fn required_stable_frames(&self) -> u32 {
        if clamp_interval_seconds(self.interval_seconds) <= 0.5 {
            1
        } else {
            2
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            change_detection: default_change_detection(),
            queue_capacity: default_queue_capacity(),
            occlusion_threshold: default_occlusion_threshold(),
            max_failures_before_fallback: default_max_failures_before_fallback(),
            duplication_timeout_ms: default_duplication_timeout_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            change_threshold: default_change_threshold(),
        }
    }
}

pub fn clamp_interval_seconds(seconds: f64) -> f64 {
    if seconds.is_nan() {
        return default_interval_seconds();
    }
    seconds.clamp(MIN_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS)
}

pub fn interval_seconds_to_ms(seconds: f64) -> u64 {
    let ms = (clamp_interval_seconds(seconds) * 1000.0).round() as u64;
    ms.max(MIN_INTERVAL_MS)
}
