use std::env;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Reading dictionary, empty means built-in script rules only
    pub dictionary_path: String,
}

impl TokenizerConfig {
    pub fn new() -> Self {
        let dictionary_path = env::var("YOMI_DICTIONARY_PATH").unwrap_or_default();

        Self { dictionary_path }
    }
}
