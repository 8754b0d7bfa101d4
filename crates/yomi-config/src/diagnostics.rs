use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("diagnostics")
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}
