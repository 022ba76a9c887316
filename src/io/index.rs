use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::io::config_io::KANLINE_DIR;
use crate::io::store::NoteStore;
use crate::parse::query::{parse_query, QueryError};
use crate::parse::tags::effective_tags;

/// Index file inside the `.kanline/` directory
pub const INDEX_FILE: &str = "index.json";

const INDEX_VERSION: u32 = 1;

/// One page returned by an index query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHit {
    pub path: String,
    /// Display name (usually the file name)
    pub name: String,
}

/// Error type for index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index is not available")]
    Unavailable,
    #[error("index query failed: {0}")]
    Query(String),
    #[error("index query failed: {0}")]
    Parse(#[from] QueryError),
    #[error("could not read index {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write index {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt index file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// An optional, pre-built note index with its own query language.
pub trait ExternalIndex: Send + Sync + 'static {
    /// Capability probe. No I/O.
    fn is_available(&self) -> bool;

    /// Run a query, returning matching pages in index order.
    fn query(&self, query: &str) -> impl Future<Output = Result<Vec<IndexHit>, IndexError>> + Send;
}

/// The absent index
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl ExternalIndex for NoIndex {
    fn is_available(&self) -> bool {
        false
    }

    async fn query(&self, _query: &str) -> Result<Vec<IndexHit>, IndexError> {
        Err(IndexError::Unavailable)
    }
}

/// A note's indexed facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub name: String,
    /// Canonical tags at build time
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// A tag/folder index persisted as `.kanline/index.json`.
///
/// Available only once a snapshot has been built or loaded. Entries go
/// stale as notes change until the index is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    snapshot: Option<IndexSnapshot>,
}

impl LocalIndex {
    /// An index with no snapshot (reports unavailable)
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        LocalIndex {
            snapshot: Some(IndexSnapshot {
                version: INDEX_VERSION,
                built_at: Utc::now(),
                entries,
            }),
        }
    }

    pub fn index_path(vault_dir: &Path) -> PathBuf {
        vault_dir.join(KANLINE_DIR).join(INDEX_FILE)
    }

    /// Load the snapshot from the vault.
    ///
    /// A missing file gives an unavailable index; a corrupt file or one
    /// written by another format version is logged and treated the same.
    pub async fn load(vault_dir: &Path) -> Self {
        match Self::try_load(vault_dir).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(error = %e, "local index not loaded");
                Self::unavailable()
            }
        }
    }

    async fn try_load(vault_dir: &Path) -> Result<Self, IndexError> {
        let path = Self::index_path(vault_dir);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::unavailable());
            }
            Err(source) => return Err(IndexError::ReadError { path, source }),
        };
        let snapshot: IndexSnapshot = serde_json::from_str(&text)?;
        if snapshot.version != INDEX_VERSION {
            tracing::warn!(version = snapshot.version, "ignoring index with unknown version");
            return Ok(Self::unavailable());
        }
        Ok(LocalIndex {
            snapshot: Some(snapshot),
        })
    }

    /// Build a fresh snapshot by reading every note. Unreadable notes are
    /// left out of the index.
    pub async fn build<S: NoteStore>(store: &S) -> Result<Self, crate::io::store::StoreError> {
        let mut entries = Vec::new();
        for path in store.enumerate().await? {
            let frontmatter = match store.metadata(&path).await {
                Ok(fm) => fm,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "not indexing note");
                    continue;
                }
            };
            let content = match store.read(&path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "not indexing note");
                    continue;
                }
            };
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            entries.push(IndexEntry {
                tags: effective_tags(&frontmatter, &content),
                name,
                path,
            });
        }
        tracing::info!(notes = entries.len(), "index built");
        Ok(Self::from_entries(entries))
    }

    /// Persist the snapshot. Does nothing for an unavailable index.
    pub async fn save(&self, vault_dir: &Path) -> Result<(), IndexError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let path = Self::index_path(vault_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| IndexError::WriteError {
                    path: path.clone(),
                    source,
                })?;
        }
        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, text)
            .await
            .map_err(|source| IndexError::WriteError { path, source })
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.built_at)
    }

    pub fn len(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExternalIndex for LocalIndex {
    fn is_available(&self) -> bool {
        self.snapshot.is_some()
    }

    async fn query(&self, query: &str) -> Result<Vec<IndexHit>, IndexError> {
        let snapshot = self.snapshot.as_ref().ok_or(IndexError::Unavailable)?;
        let expr = parse_query(query)?;
        Ok(snapshot
            .entries
            .iter()
            .filter(|e| expr.matches(&e.path, &e.tags))
            .map(|e| IndexHit {
                path: e.path.clone(),
                name: e.name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use tempfile::TempDir;

    fn entry(path: &str, tags: &[&str]) -> IndexEntry {
        IndexEntry {
            path: path.into(),
            name: path.rsplit('/').next().unwrap().into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn no_index_is_unavailable() {
        assert!(!NoIndex.is_available());
        assert!(matches!(
            NoIndex.query("#todo").await,
            Err(IndexError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn queries_by_tag_and_folder() {
        let index = LocalIndex::from_entries(vec![
            entry("work/a.md", &["todo"]),
            entry("home/b.md", &["todo", "errand"]),
            entry("work/c.md", &["doing"]),
        ]);
        assert!(index.is_available());
        let hits = index.query("#todo").await.unwrap();
        let paths: Vec<_> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["work/a.md", "home/b.md"]);

        let hits = index.query("\"work\" and #todo").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a.md");
    }

    #[tokio::test]
    async fn invalid_query_is_an_error() {
        let index = LocalIndex::from_entries(vec![]);
        assert!(matches!(
            index.query("#a and").await,
            Err(IndexError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn build_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_notes([
            ("a.md", "---\ntags: [todo]\n---\n"),
            ("sub/b.md", "text #doing"),
            ("broken.md", "#todo"),
        ]);
        store.fail_reads_for("broken.md");

        let index = LocalIndex::build(&store).await.unwrap();
        assert_eq!(index.len(), 2);
        index.save(dir.path()).await.unwrap();

        let loaded = LocalIndex::load(dir.path()).await;
        assert!(loaded.is_available());
        let hits = loaded.query("#doing").await.unwrap();
        assert_eq!(
            hits,
            vec![IndexHit {
                path: "sub/b.md".into(),
                name: "b.md".into()
            }]
        );
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(!LocalIndex::load(dir.path()).await.is_available());

        std::fs::create_dir_all(dir.path().join(KANLINE_DIR)).unwrap();
        std::fs::write(LocalIndex::index_path(dir.path()), "{not json").unwrap();
        assert!(!LocalIndex::load(dir.path()).await.is_available());
    }
}
