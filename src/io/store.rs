use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;

use crate::model::note::Frontmatter;
use crate::parse::frontmatter::parse_frontmatter;

/// Error type for note storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("invalid note path: {0}")]
    InvalidPath(String),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: String,
        source: std::io::Error,
    },
    #[error("could not list notes: {0}")]
    ListError(String),
}

/// Where notes live. Every call is a suspension point.
///
/// Paths are vault-relative and `/`-separated.
pub trait NoteStore: Send + Sync + 'static {
    /// All note paths, in the store's own order.
    fn enumerate(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Whether `path` resolves to an existing note.
    fn contains(&self, path: &str) -> impl Future<Output = bool> + Send;

    /// Cached frontmatter for a note. May lag behind a recent write.
    fn metadata(&self, path: &str) -> impl Future<Output = Result<Frontmatter, StoreError>> + Send;

    /// Full raw text of a note.
    fn read(&self, path: &str) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Replace the full text of a note.
    fn write(&self, path: &str, content: &str)
    -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// An in-process note store.
///
/// Keeps insertion order for enumeration. Reads and writes can be made to
/// fail per path, and writes are counted, so hosts can exercise the engine
/// without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: Mutex<IndexMap<String, String>>,
    failing_reads: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(path, content)` pairs.
    pub fn with_notes<P, C>(notes: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<String>,
    {
        let store = Self::new();
        for (path, content) in notes {
            store.insert(path, content);
        }
        store
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(path)
    }

    /// Current content, bypassing failure injection.
    pub fn get(&self, path: &str) -> Option<String> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Make reads and metadata lookups of `path` fail.
    pub fn fail_reads_for(&self, path: impl Into<String>) {
        self.failing_reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into());
    }

    /// Make every write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_readable(&self, path: &str) -> Result<(), StoreError> {
        let failing = self
            .failing_reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failing.contains(path) {
            return Err(StoreError::ReadError {
                path: path.to_string(),
                source: std::io::Error::other("read failure"),
            });
        }
        Ok(())
    }
}

impl NoteStore for MemoryStore {
    async fn enumerate(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn contains(&self, path: &str) -> bool {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    async fn metadata(&self, path: &str) -> Result<Frontmatter, StoreError> {
        self.check_readable(path)?;
        let content = self
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(parse_frontmatter(&content).unwrap_or_default())
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        self.check_readable(path)?;
        self.get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteError {
                path: path.to_string(),
                source: std::io::Error::other("write failure"),
            });
        }
        self.insert(path, content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
