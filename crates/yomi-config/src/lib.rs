use std::env;

use serde::{Deserialize, Serialize};

use self::assembler::AssemblerConfig;
use self::capture::CaptureConfig;
use self::diagnostics::DiagnosticsConfig;
use self::ocr::OcrConfig;
use self::overlay::OverlayConfig;
use self::tokenizer::TokenizerConfig;

pub mod assembler;
pub mod capture;
pub mod diagnostics;
pub mod ocr;
pub mod overlay;
pub mod tokenizer;

fn default_poll_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub ocr: OcrConfig,
    pub assembler: AssemblerConfig,
    pub overlay: OverlayConfig,
    pub tokenizer: TokenizerConfig,
    pub diagnostics: DiagnosticsConfig,

    /// Orchestrator tick that feeds the sentence assembler
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn new() -> Self {
        let poll_interval_ms = env::var("YOMI_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_poll_interval_ms);

        Config {
            capture: CaptureConfig::new(),
            ocr: OcrConfig::new(),
            assembler: AssemblerConfig::default(),
            overlay: OverlayConfig::default(),
            tokenizer: TokenizerConfig::new(),
            diagnostics: DiagnosticsConfig::default(),

            poll_interval_ms: poll_interval_ms.max(1),
        }
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            ocr: OcrConfig::default(),
            assembler: AssemblerConfig::default(),
            overlay: OverlayConfig::default(),
            tokenizer: TokenizerConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
