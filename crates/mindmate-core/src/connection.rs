//! Process-wide, lazily established backing-store connection.
//!
//! ```text
//! Uninitialized ──get()──▶ Connecting ──ok──▶ Connected
//!       ▲                      │                  │
//!       └──────── err ─────────┘◀── invalidate ───┘
//! ```
//!
//! At most one attempt is in flight. Callers that arrive while `Connecting` await
//! the same shared future. The attempt runs on its own task and settles the state
//! itself, so a caller whose request is dropped cannot strand the others.

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Opens a handle to the backing store.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    async fn connect(&self) -> Result<Self::Handle>;

    /// Target description for logs. Must not contain credentials.
    fn describe(&self) -> String {
        "backing store".to_string()
    }
}

type PendingConnect<H> = Shared<BoxFuture<'static, Result<Arc<H>>>>;

enum State<H> {
    Uninitialized,
    Connecting {
        attempt: u64,
        pending: PendingConnect<H>,
    },
    Connected {
        attempt: u64,
        handle: Arc<H>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Uninitialized,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub state: CacheState,
    /// Connection attempts started since the cache was created.
    pub attempts: u64,
}

struct Inner<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    state: Mutex<State<C::Handle>>,
    attempts: AtomicU64,
}

impl<C: Connector> Inner<C> {
    /// Applies the outcome of `attempt`, unless the state has moved on since.
    async fn settle(&self, attempt: u64, outcome: &Result<Arc<C::Handle>>) {
        let mut state = self.state.lock().await;
        let current = matches!(&*state, State::Connecting { attempt: a, .. } if *a == attempt);
        if !current {
            return;
        }
        match outcome {
            Ok(handle) => {
                tracing::info!(attempt, "[STORE] Connected to {}", self.connector.describe());
                *state = State::Connected {
                    attempt,
                    handle: Arc::clone(handle),
                };
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "[STORE] Connection attempt failed; cache reset");
                *state = State::Uninitialized;
            }
        }
    }
}

/// Single-flight cache around one [`Connector`]. Cheap to clone; clones share state.
pub struct ConnectionCache<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionCache<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                connect_timeout,
                state: Mutex::new(State::Uninitialized),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// Returns the cached handle, joining or starting a connection attempt if needed.
    pub async fn get(&self) -> Result<Arc<C::Handle>> {
        let pending = {
            let mut state = self.inner.state.lock().await;
            match &*state {
                State::Connected { handle, .. } => return Ok(Arc::clone(handle)),
                State::Connecting { pending, .. } => pending.clone(),
                State::Uninitialized => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = Self::start_attempt(Arc::clone(&self.inner), attempt);
                    *state = State::Connecting {
                        attempt,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };
        pending.await
    }

    fn start_attempt(inner: Arc<Inner<C>>, attempt: u64) -> PendingConnect<C::Handle> {
        tracing::info!(
            attempt,
            "[STORE] Connecting to {} (timeout {}ms)",
            inner.connector.describe(),
            inner.connect_timeout.as_millis()
        );

        let worker = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            let outcome =
                match tokio::time::timeout(worker.connect_timeout, worker.connector.connect()).await {
                    Ok(Ok(handle)) => Ok(Arc::new(handle)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(Error::StoreUnavailable(format!(
                        "connection attempt timed out after {}ms",
                        worker.connect_timeout.as_millis()
                    ))),
                };
            worker.settle(attempt, &outcome).await;
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    // The task never reached settle(); reset here instead.
                    let outcome = Err(Error::store(format!("connection task aborted: {}", join_err)));
                    inner.settle(attempt, &outcome).await;
                    outcome
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drops the cached handle if it is still `handle`. Returns whether a reset happened.
    pub async fn invalidate(&self, handle: &Arc<C::Handle>, reason: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let matched = match &*state {
            State::Connected {
                attempt,
                handle: current,
            } if Arc::ptr_eq(current, handle) => Some(*attempt),
            _ => None,
        };
        match matched {
            Some(attempt) => {
                tracing::warn!(attempt, reason, "[STORE] Connection invalidated; next request reconnects");
                *state = State::Uninitialized;
                true
            }
            None => false,
        }
    }

    /// Current state. Never triggers a connection attempt.
    pub async fn status(&self) -> CacheStatus {
        let state = self.inner.state.lock().await;
        let state = match &*state {
            State::Uninitialized => CacheState::Uninitialized,
            State::Connecting { .. } => CacheState::Connecting,
            State::Connected { .. } => CacheState::Connected,
        };
        CacheStatus {
            state,
            attempts: self.inner.attempts.load(Ordering::SeqCst),
        }
    }
}
