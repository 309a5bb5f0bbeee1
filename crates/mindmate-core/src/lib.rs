//! mindmate-core: journaling backend core library.
//!
//! Holds the pieces with real invariants: the deterministic mood classifier, the
//! single-flight connection cache in front of the backing store, the journal/mood
//! entry store, and the AI gateway that proxies chat messages upstream. The HTTP
//! surface lives in the `mindmate-gateway` add-on.

pub mod ai_gateway;
pub mod config;
pub mod connection;
pub mod error;
pub mod mood;
pub mod store;

pub use ai_gateway::AiGateway;
pub use config::{AiConfig, AppConfig, RateLimitConfig, RunMode, StoreConfig};
pub use connection::{CacheState, CacheStatus, ConnectionCache, Connector};
pub use error::{Error, Result};
pub use mood::{Classification, LexiconScorer, MoodClassifier, MoodLabel, SentimentScorer};
pub use store::{
    validate_content, EntryStore, JournalEntry, JournalPatch, MoodRecord, SledConnector,
    StoreHandle, StoreTarget, MIN_CONTENT_CHARS,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
