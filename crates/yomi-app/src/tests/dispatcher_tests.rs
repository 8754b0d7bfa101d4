use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::fakes::{BrokenTokenizer, GatedTokenizer, kyoto_segments};
use crate::dispatcher::TokenizationDispatcher;

/// Test 1: same sentence is not tokenized twice while in flight
#[tokio::test]
async fn test_in_flight_sentence_is_not_redispatched() {
    let tokenizer = GatedTokenizer::default();
    let (tx, rx) = kanal::unbounded_async();
    let mut dispatcher = TokenizationDispatcher::new(Arc::new(tokenizer.clone()), tx);

    assert!(dispatcher.dispatch("京都へ".to_string(), kyoto_segments()));
    assert!(!dispatcher.dispatch("京都へ".to_string(), kyoto_segments()));
    assert!(dispatcher.is_in_flight("京都へ"));
    assert_eq!(dispatcher.in_flight_count(), 1);

    tokenizer.release();
    let completion = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("completion never arrived")
        .unwrap();
    assert_eq!(completion.text, "京都へ");
    assert_eq!(completion.segments.len(), 2);
    assert_eq!(tokenizer.calls(), 1);

    assert!(dispatcher.complete("京都へ"));
    assert!(!dispatcher.is_in_flight("京都へ"));
    assert!(!dispatcher.complete("京都へ"));

    // free again once completed
    assert!(dispatcher.dispatch("京都へ".to_string(), Vec::new()));
    timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(tokenizer.calls(), 2);
}

/// Test 2: different sentences run side by side
#[tokio::test]
async fn test_distinct_sentences_dispatch_independently() {
    let tokenizer = GatedTokenizer::default();
    let (tx, rx) = kanal::unbounded_async();
    let mut dispatcher = TokenizationDispatcher::new(Arc::new(tokenizer.clone()), tx);

    assert!(dispatcher.dispatch("一つ目".to_string(), Vec::new()));
    assert!(dispatcher.dispatch("二つ目".to_string(), Vec::new()));
    assert_eq!(dispatcher.in_flight_count(), 2);

    tokenizer.release();
    let mut texts = vec![
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap().text,
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap().text,
    ];
    texts.sort();
    assert_eq!(texts, ["一つ目", "二つ目"]);
}

/// Test 3: tokenizer errors come back as an empty completion
#[tokio::test]
async fn test_tokenizer_error_yields_empty_tokens() {
    let (tx, rx) = kanal::unbounded_async();
    let mut dispatcher = TokenizationDispatcher::new(Arc::new(BrokenTokenizer), tx);

    assert!(dispatcher.dispatch("京都へ".to_string(), Vec::new()));
    let completion = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completion.text, "京都へ");
    assert!(completion.tokens.is_empty());
    assert!(dispatcher.is_in_flight("京都へ"));
}
