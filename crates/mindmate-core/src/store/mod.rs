//! Journal entries and mood records, persisted through the connection cache.
//!
//! Every operation obtains its handle from [`ConnectionCache`] and runs the sled
//! calls on the blocking pool under the socket timeout. A backend error or an
//! expired timeout is reported as `StoreUnavailable` and invalidates the handle,
//! so the next request reconnects.

mod sled_backend;

pub use sled_backend::{SledConnector, StoreHandle, StoreTarget, JOURNAL_TREE, MOOD_TREE};

use crate::config::StoreConfig;
use crate::connection::{ConnectionCache, Connector};
use crate::error::{Error, Result};
use crate::mood::{Classification, MoodClassifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Minimum journal content length, in characters after trimming.
pub const MIN_CONTENT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub content: String,
    pub mood: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodRecord {
    pub id: String,
    pub mood: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JournalPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

impl JournalPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.mood.is_none()
    }

    fn validate(&self) -> Result<()> {
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        if let Some(mood) = &self.mood {
            if mood.trim().is_empty() {
                return Err(Error::invalid_input("Mood is required"));
            }
        }
        Ok(())
    }

    fn apply(&self, entry: &mut JournalEntry) {
        if let Some(content) = &self.content {
            entry.content = content.clone();
        }
        if let Some(mood) = &self.mood {
            entry.mood = mood.trim().to_string();
        }
    }
}

/// Content must be at least [`MIN_CONTENT_CHARS`] characters once trimmed.
pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return Err(Error::invalid_input(format!(
            "Content must be at least {} characters",
            MIN_CONTENT_CHARS
        )));
    }
    Ok(())
}

/// Newest first; equal timestamps fall back to id, descending.
fn newest_first(a: &DateTime<Utc>, a_id: &str, b: &DateTime<Utc>, b_id: &str) -> Ordering {
    b.cmp(a).then_with(|| b_id.cmp(a_id))
}

/// Failure inside a blocking store closure.
enum OpError {
    /// Backend-level failure; the handle is suspect.
    Backend(String),
    /// Domain outcome (not found, corrupt document); the handle is fine.
    Rejected(Error),
}

impl From<sled::Error> for OpError {
    fn from(e: sled::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for OpError {
    fn from(e: serde_json::Error) -> Self {
        Self::Rejected(Error::store(format!("undecodable document: {}", e)))
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, OpError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn entry_not_found() -> OpError {
    OpError::Rejected(Error::not_found("Entry"))
}

pub struct EntryStore<C = SledConnector>
where
    C: Connector<Handle = StoreHandle>,
{
    cache: ConnectionCache<C>,
    classifier: MoodClassifier,
    socket_timeout: Duration,
}

impl EntryStore<SledConnector> {
    /// Store over the configured sled database. Does not connect yet.
    pub fn from_config(config: &StoreConfig, classifier: MoodClassifier) -> Result<Self> {
        let connector = SledConnector::new(&config.uri)?;
        Ok(Self::new(
            ConnectionCache::new(connector, config.connect_timeout()),
            classifier,
            config.socket_timeout(),
        ))
    }
}

impl<C> EntryStore<C>
where
    C: Connector<Handle = StoreHandle>,
{
    pub fn new(cache: ConnectionCache<C>, classifier: MoodClassifier, socket_timeout: Duration) -> Self {
        Self {
            cache,
            classifier,
            socket_timeout,
        }
    }

    pub fn cache(&self) -> &ConnectionCache<C> {
        &self.cache
    }

    pub fn classifier(&self) -> &MoodClassifier {
        &self.classifier
    }

    /// Runs `op` against the cached handle on the blocking pool.
    async fn run<T, F>(&self, name: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreHandle) -> std::result::Result<T, OpError> + Send + 'static,
    {
        let handle = self.cache.get().await?;
        let worker = Arc::clone(&handle);
        let outcome =
            tokio::time::timeout(self.socket_timeout, tokio::task::spawn_blocking(move || op(worker.as_ref()))).await;

        let failure = match outcome {
            Ok(Ok(Ok(value))) => return Ok(value),
            Ok(Ok(Err(OpError::Rejected(e)))) => return Err(e),
            Ok(Ok(Err(OpError::Backend(detail)))) => format!("{} failed: {}", name, detail),
            Ok(Err(join_err)) => format!("{} task failed: {}", name, join_err),
            Err(_) => format!(
                "{} exceeded socket timeout of {}ms",
                name,
                self.socket_timeout.as_millis()
            ),
        };
        tracing::error!(op = name, "[STORE] {}", failure);
        self.cache.invalidate(&handle, &failure).await;
        Err(Error::StoreUnavailable(failure))
    }

    /// Standalone classification. Nothing is persisted.
    pub fn analyze(&self, text: &str) -> Classification {
        self.classifier.classify(text)
    }

    /// Validates, classifies and persists a new journal entry.
    pub async fn create(&self, content: &str) -> Result<JournalEntry> {
        validate_content(content)?;
        let classification = self.classifier.classify(content);
        let entry = JournalEntry {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            mood: classification.label.to_string(),
            score: classification.score,
            created_at: Utc::now(),
        };

        let doc = entry.clone();
        self.run("journal.create", move |h| {
            let bytes = serde_json::to_vec(&doc)?;
            h.journal().insert(doc.id.as_bytes(), bytes)?;
            Ok(())
        })
        .await?;

        tracing::info!(id = %entry.id, mood = %entry.mood, score = entry.score, "[JOURNAL] Entry created");
        Ok(entry)
    }

    pub async fn list(&self) -> Result<Vec<JournalEntry>> {
        self.run("journal.list", |h| {
            let mut entries = Vec::with_capacity(h.journal().len());
            for item in h.journal().iter() {
                let (_, value) = item?;
                entries.push(decode::<JournalEntry>(&value)?);
            }
            entries.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
            Ok(entries)
        })
        .await
    }

    /// Unknown or malformed ids are `NotFound`.
    pub async fn get(&self, id: &str) -> Result<JournalEntry> {
        let id = id.to_string();
        self.run("journal.get", move |h| match h.journal().get(id.as_bytes())? {
            Some(value) => decode(&value),
            None => Err(entry_not_found()),
        })
        .await
    }

    /// Overwrites the supplied fields; `id`, `createdAt` and `score` never change.
    pub async fn update(&self, id: &str, patch: JournalPatch) -> Result<JournalEntry> {
        patch.validate()?;
        let id = id.to_string();
        let updated = self
            .run("journal.update", move |h| {
                let Some(value) = h.journal().get(id.as_bytes())? else {
                    return Err(entry_not_found());
                };
                let mut entry: JournalEntry = decode(&value)?;
                if patch.is_empty() {
                    return Ok(entry);
                }
                patch.apply(&mut entry);
                h.journal().insert(id.as_bytes(), serde_json::to_vec(&entry)?)?;
                Ok(entry)
            })
            .await?;
        tracing::info!(id = %updated.id, "[JOURNAL] Entry updated");
        Ok(updated)
    }

    /// Removes the entry and returns what was stored.
    pub async fn delete(&self, id: &str) -> Result<JournalEntry> {
        let id = id.to_string();
        let removed = self
            .run("journal.delete", move |h| match h.journal().remove(id.as_bytes())? {
                Some(value) => decode::<JournalEntry>(&value),
                None => Err(entry_not_found()),
            })
            .await?;
        tracing::info!(id = %removed.id, "[JOURNAL] Entry deleted");
        Ok(removed)
    }

    /// Direct mood write; bypasses the classifier.
    pub async fn record_mood(&self, mood: &str) -> Result<MoodRecord> {
        let mood = mood.trim();
        if mood.is_empty() {
            return Err(Error::invalid_input("Mood is required"));
        }
        let record = MoodRecord {
            id: uuid::Uuid::new_v4().to_string(),
            mood: mood.to_string(),
            created_at: Utc::now(),
        };
        let doc = record.clone();
        self.run("mood.create", move |h| {
            h.moods().insert(doc.id.as_bytes(), serde_json::to_vec(&doc)?)?;
            Ok(())
        })
        .await?;
        tracing::debug!(id = %record.id, mood = %record.mood, "[MOOD] Record stored");
        Ok(record)
    }

    pub async fn list_moods(&self) -> Result<Vec<MoodRecord>> {
        self.run("mood.list", |h| {
            let mut records = Vec::with_capacity(h.moods().len());
            for item in h.moods().iter() {
                let (_, value) = item?;
                records.push(decode::<MoodRecord>(&value)?);
            }
            records.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));
            Ok(records)
        })
        .await
    }
}
