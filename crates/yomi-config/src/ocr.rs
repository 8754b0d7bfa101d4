use std::env;

use serde::{Deserialize, Serialize};
use yomi_types::{OcrEngineKind, Rect};

fn default_engine() -> OcrEngineKind {
    OcrEngineKind::Windows
}

fn default_fallback_engine() -> OcrEngineKind {
    OcrEngineKind::Windows
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_allow_fallback() -> bool {
    true
}

fn default_poll_timeout_ms() -> u64 {
    100
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OcrConfig {
    #[serde(default = "default_engine")]
    pub engine: OcrEngineKind,
    #[serde(default = "default_language")]
    pub language: String,
    /// Model or trained-data directory, engine specific
    pub model_path: String,
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
    #[serde(default = "default_fallback_engine")]
    pub fallback_engine: OcrEngineKind,
    /// Client-area-relative region OCR is restricted to
    pub roi: Option<Rect>,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl OcrConfig {
    pub fn new() -> Self {
        let engine = env::var("YOMI_OCR_ENGINE")
            .ok()
            .and_then(|v| OcrEngineKind::parse(&v))
            .unwrap_or_else(default_engine);

        let language = env::var("YOMI_OCR_LANGUAGE").unwrap_or_else(|_| default_language());

        Self {
            engine,
            language,
            ..Self::default()
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            language: default_language(),
            model_path: String::new(),
            allow_fallback: default_allow_fallback(),
            fallback_engine: default_fallback_engine(),
            roi: None,
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}
