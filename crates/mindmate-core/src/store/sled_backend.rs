//! sled-backed connector. A "connection" is an open database plus its two trees.

use crate::connection::Connector;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;

pub const JOURNAL_TREE: &str = "journal_entries";
pub const MOOD_TREE: &str = "mood_records";

/// Where the database lives, parsed from the configured URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Path(PathBuf),
    /// Throwaway database removed when the last handle drops.
    Temporary,
}

impl StoreTarget {
    /// `sled://<path>`, a bare path, or `mem://`. Other schemes are rejected.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(Error::Configuration("store uri is empty".to_string()));
        }
        if uri == "mem://" || uri == "memory://" {
            return Ok(Self::Temporary);
        }
        if let Some(path) = uri.strip_prefix("sled://") {
            if path.is_empty() {
                return Err(Error::Configuration("sled:// uri has no path".to_string()));
            }
            return Ok(Self::Path(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(Error::Configuration(format!(
                "unsupported store scheme '{}' (expected sled:// or mem://)",
                scheme
            )));
        }
        Ok(Self::Path(PathBuf::from(uri)))
    }
}

impl std::fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => write!(f, "sled://{}", p.display()),
            Self::Temporary => f.write_str("mem://"),
        }
    }
}

/// The two trees of an open database. Dropping the last handle closes it.
pub struct StoreHandle {
    journal: sled::Tree,
    moods: sled::Tree,
}

impl StoreHandle {
    pub(crate) fn journal(&self) -> &sled::Tree {
        &self.journal
    }

    pub(crate) fn moods(&self) -> &sled::Tree {
        &self.moods
    }
}

fn open(target: &StoreTarget) -> Result<StoreHandle> {
    let db = match target {
        StoreTarget::Path(p) => sled::open(p),
        StoreTarget::Temporary => sled::Config::new().temporary(true).open(),
    }
    .map_err(|e| Error::store(format!("open {}: {}", target, e)))?;
    let journal = db
        .open_tree(JOURNAL_TREE)
        .map_err(|e| Error::store(format!("open tree {}: {}", JOURNAL_TREE, e)))?;
    let moods = db
        .open_tree(MOOD_TREE)
        .map_err(|e| Error::store(format!("open tree {}: {}", MOOD_TREE, e)))?;
    Ok(StoreHandle { journal, moods })
}

/// Opens the configured sled database on the blocking pool.
#[derive(Debug, Clone)]
pub struct SledConnector {
    target: StoreTarget,
}

impl SledConnector {
    pub fn new(uri: &str) -> Result<Self> {
        Ok(Self {
            target: StoreTarget::parse(uri)?,
        })
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }
}

#[async_trait]
impl Connector for SledConnector {
    type Handle = StoreHandle;

    async fn connect(&self) -> Result<StoreHandle> {
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || open(&target))
            .await
            .map_err(|e| Error::store(format!("open task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        self.target.to_string()
    }
}
