use serde::{Deserialize, Serialize};

// Tuned against real captures, treat as calibration knobs.

fn default_min_confidence() -> f32 {
    60.0
}

fn default_min_area() -> i64 {
    400
}

fn default_line_gap_tolerance() -> i32 {
    24
}

fn default_line_height_ratio() -> f64 {
    0.6
}

fn default_ruby_max_chars() -> usize {
    4
}

fn default_ruby_height_ratio() -> f64 {
    0.6
}

fn default_ruby_min_overlap() -> f64 {
    0.4
}

fn default_ruby_center_padding() -> f64 {
    0.25
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AssemblerConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Minimum bounding box area in px²
    #[serde(default = "default_min_area")]
    pub min_area: i64,
    #[serde(default = "default_line_gap_tolerance")]
    pub line_gap_tolerance: i32,
    #[serde(default = "default_line_height_ratio")]
    pub line_height_ratio: f64,
    #[serde(default = "default_ruby_max_chars")]
    pub ruby_max_chars: usize,
    #[serde(default = "default_ruby_height_ratio")]
    pub ruby_height_ratio: f64,
    #[serde(default = "default_ruby_min_overlap")]
    pub ruby_min_overlap: f64,
    #[serde(default = "default_ruby_center_padding")]
    pub ruby_center_padding: f64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            min_area: default_min_area(),
            line_gap_tolerance: default_line_gap_tolerance(),
            line_height_ratio: default_line_height_ratio(),
            ruby_max_chars: default_ruby_max_chars(),
            ruby_height_ratio: default_ruby_height_ratio(),
            ruby_min_overlap: default_ruby_min_overlap(),
            ruby_center_padding: default_ruby_center_padding(),
        }
    }
}
