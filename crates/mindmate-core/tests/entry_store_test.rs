//! Integration test: entry store over a temporary sled database.

use async_trait::async_trait;
use mindmate_core::{
    CacheState, ConnectionCache, Connector, EntryStore, Error, JournalPatch, MoodClassifier, MoodLabel,
    Result, SentimentScorer, StoreConfig, StoreHandle,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn mem_store() -> EntryStore {
    let config = StoreConfig {
        uri: "mem://".to_string(),
        ..StoreConfig::default()
    };
    EntryStore::from_config(&config, MoodClassifier::default()).unwrap()
}

/// Scorer that records how often it was consulted.
struct CountingScorer(Arc<AtomicUsize>);

impl SentimentScorer for CountingScorer {
    fn score(&self, _text: &str) -> i32 {
        self.0.fetch_add(1, Ordering::SeqCst);
        1
    }
}

/// Backend that never comes up.
struct Unreachable;

#[async_trait]
impl Connector for Unreachable {
    type Handle = StoreHandle;

    async fn connect(&self) -> Result<StoreHandle> {
        Err(Error::StoreUnavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn create_classifies_and_persists() {
    let store = mem_store();
    let entry = store
        .create("Today was a wonderful and uplifting day!")
        .await
        .expect("create should succeed");

    assert_eq!(entry.mood, MoodLabel::Positive.as_str());
    assert!(entry.score > 2);
    assert_eq!(entry.id.len(), 36, "uuid v4 string");

    let fetched = store.get(&entry.id).await.unwrap();
    assert_eq!(fetched, entry);
}

#[tokio::test]
async fn short_content_never_reaches_store_or_classifier() {
    let consulted = Arc::new(AtomicUsize::new(0));
    let classifier = MoodClassifier::new(Arc::new(CountingScorer(Arc::clone(&consulted))));
    let config = StoreConfig {
        uri: "mem://".to_string(),
        ..StoreConfig::default()
    };
    let store = EntryStore::from_config(&config, classifier).unwrap();

    let err = store.create("123456789").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(consulted.load(Ordering::SeqCst), 0, "classifier not consulted");
    assert_eq!(store.cache().status().await.attempts, 0, "store not touched");
}

#[tokio::test]
async fn list_is_newest_first() {
    let store = mem_store();
    let mut ids = Vec::new();
    for text in ["first entry of the week", "second entry of the week", "third entry of the week"] {
        ids.push(store.create(text).await.unwrap().id);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let listed: Vec<String> = store.list().await.unwrap().into_iter().map(|e| e.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn update_overwrites_only_supplied_fields() {
    let store = mem_store();
    let original = store.create("A quiet evening with tea and a book").await.unwrap();

    let updated = store
        .update(
            &original.id,
            JournalPatch {
                content: None,
                mood: Some("Reflective".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.mood, "Reflective");
    assert_eq!(updated.content, original.content);
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.score, original.score);

    let updated = store
        .update(
            &original.id,
            JournalPatch {
                content: Some("Rewrote this entry the next morning".to_string()),
                mood: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, "Rewrote this entry the next morning");
    assert_eq!(updated.mood, "Reflective");

    let err = store
        .update(
            &original.id,
            JournalPatch {
                content: Some("short".to_string()),
                mood: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.get(&original.id).await.unwrap(), updated);
}

#[tokio::test]
async fn missing_and_malformed_ids_are_not_found() {
    let store = mem_store();
    let unknown = "7d4f1c2e-0000-4000-8000-000000000000";

    for id in [unknown, "not-a-valid-id"] {
        assert!(matches!(store.get(id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            store.update(id, JournalPatch::default()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(store.delete(id).await, Err(Error::NotFound(_))));
    }
    // Domain outcomes keep the connection.
    assert_eq!(store.cache().status().await.state, CacheState::Connected);
}

#[tokio::test]
async fn delete_removes_entry() {
    let store = mem_store();
    let entry = store.create("Went for a long run by the river").await.unwrap();

    let removed = store.delete(&entry.id).await.unwrap();
    assert_eq!(removed.id, entry.id);
    assert!(matches!(store.get(&entry.id).await, Err(Error::NotFound(_))));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn mood_records_are_separate_from_journal() {
    let store = mem_store();
    assert!(matches!(store.record_mood("   ").await, Err(Error::InvalidInput(_))));

    store.record_mood("calm").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let latest = store.record_mood(" anxious ").await.unwrap();
    assert_eq!(latest.mood, "anxious");

    let moods: Vec<String> = store.list_moods().await.unwrap().into_iter().map(|m| m.mood).collect();
    assert_eq!(moods, vec!["anxious", "calm"]);
    assert!(store.list().await.unwrap().is_empty(), "no journal entries created");
}

#[tokio::test]
async fn analyze_does_not_connect() {
    let store = mem_store();
    let c = store.analyze("I feel sad and tired");
    assert_eq!(c.label, MoodLabel::Negative);
    assert_eq!(store.cache().status().await.attempts, 0);
}

#[tokio::test]
async fn unreachable_backend_is_store_unavailable_and_retried() {
    let cache = ConnectionCache::new(Unreachable, Duration::from_millis(500));
    let store = EntryStore::new(cache, MoodClassifier::default(), Duration::from_secs(1));

    let err = store.list().await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.public_message(), "Database temporarily unavailable");
    assert_eq!(store.cache().status().await.state, CacheState::Uninitialized);

    // The process stays up and the next request makes a fresh attempt.
    assert!(store.create("Trying again after the outage").await.is_err());
    assert_eq!(store.cache().status().await.attempts, 2);
}
