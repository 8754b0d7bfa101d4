use std::collections::HashSet;
use std::sync::Arc;

use kanal::AsyncSender;
use yomi_core::Tokenizer;
use yomi_types::{TextSegment, Token};

/// Tokenizer output for one dispatched sentence
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Empty when tokenization failed or produced nothing
    pub tokens: Vec<Token>,
    /// Segments the assembler kept for the sentence, in reading order
    pub segments: Vec<TextSegment>,
}

/// Runs the tokenizer off the event loop, one job per sentence
///
/// Completions come back through a channel so the orchestrator handles them
/// on its own task. A sentence stays in flight until `complete` is called
/// for it and can't be dispatched twice meanwhile.
pub struct TokenizationDispatcher {
    tokenizer: Arc<dyn Tokenizer>,
    completions_tx: AsyncSender<Completion>,
    in_flight: HashSet<String>,
}

impl TokenizationDispatcher {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, completions_tx: AsyncSender<Completion>) -> Self {
        Self {
            tokenizer,
            completions_tx,
            in_flight: HashSet::new(),
        }
    }

    /// Submit `text`, returns false if it is already being tokenized
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, text: String, segments: Vec<TextSegment>) -> bool {
        if !self.in_flight.insert(text.clone()) {
            tracing::debug!("[PIPELINE] {:?} already in flight", text);
            return false;
        }

        let tokenizer = self.tokenizer.clone();
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let input = text.clone();
            let result = tokio::task::spawn_blocking(move || tokenizer.tokenize(&input)).await;

            let tokens = match result {
                Ok(Ok(tokens)) => tokens,
                Ok(Err(e)) => {
                    tracing::warn!("[PIPELINE] Tokenization failed: {}", e);
                    Vec::new()
                }
                Err(e) => {
                    tracing::error!("[PIPELINE] Tokenizer task error: {}", e);
                    Vec::new()
                }
            };

            let completion = Completion {
                text,
                tokens,
                segments,
            };
            if tx.send(completion).await.is_err() {
                tracing::debug!("[PIPELINE] Completion dropped, receiver closed");
            }
        });

        true
    }

    /// Clear the in-flight mark, returns whether `text` was in flight
    pub fn complete(&mut self, text: &str) -> bool {
        self.in_flight.remove(text)
    }

    pub fn is_in_flight(&self, text: &str) -> bool {
        self.in_flight.contains(text)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }
}
