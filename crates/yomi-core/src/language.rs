use yomi_types::Token;

use crate::error::TokenizeError;

/// Morphological tokenizer interface for language implementations
pub trait Tokenizer: Send + Sync {
    /// Load dictionaries, an empty path means built-in data only
    fn initialize(&mut self, dictionary_path: &str) -> Result<(), TokenizeError>;

    /// Break a sentence into tokens
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizeError>;

    fn is_initialized(&self) -> bool;
}
