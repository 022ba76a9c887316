use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use tokio::sync::RwLock;

use crate::io::store::{NoteStore, StoreError};
use crate::model::note::Frontmatter;
use crate::parse::frontmatter::parse_frontmatter;

/// Markdown notes under a vault directory.
///
/// Hidden files and directories (`.kanline/`, `.obsidian/`, ...) are not
/// notes. Frontmatter is cached per note and re-parsed when the file's
/// modification time changes.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, (SystemTime, Frontmatter)>>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault-relative note path to a file path. Absolute paths and
    /// `..` components are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(path);
        if path.is_empty() || rel.is_absolute() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        for component in rel.components() {
            if !matches!(component, Component::Normal(_) | Component::CurDir) {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
        }
        Ok(self.root.join(rel))
    }

    fn read_error(path: &str, source: std::io::Error) -> StoreError {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_string())
        } else {
            StoreError::ReadError {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// `/`-separated path of `abs` relative to `root`
fn relative_note_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn walk_notes(root: &Path) -> Vec<String> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut paths = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
        let is_md = entry.path().extension().and_then(|e| e.to_str()) == Some("md");
        if is_file
            && is_md
            && let Some(rel) = relative_note_path(root, entry.path())
        {
            paths.push(rel);
        }
    }
    paths
}

impl NoteStore for FsStore {
    async fn enumerate(&self) -> Result<Vec<String>, StoreError> {
        if !fs::metadata(&self.root).await.is_ok_and(|m| m.is_dir()) {
            return Err(StoreError::ListError(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_notes(&root))
            .await
            .map_err(|e| StoreError::ListError(e.to_string()))
    }

    async fn contains(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(abs) => fs::metadata(abs).await.is_ok_and(|m| m.is_file()),
            Err(_) => false,
        }
    }

    async fn metadata(&self, path: &str) -> Result<Frontmatter, StoreError> {
        let abs = self.resolve(path)?;
        let modified = fs::metadata(&abs)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| Self::read_error(path, e))?;

        if let Some((stamp, fm)) = self.cache.read().await.get(path)
            && *stamp == modified
        {
            return Ok(fm.clone());
        }

        let content = fs::read_to_string(&abs)
            .await
            .map_err(|e| Self::read_error(path, e))?;
        let fm = parse_frontmatter(&content).unwrap_or_else(|e| {
            tracing::debug!(path, error = %e, "ignoring malformed frontmatter");
            Frontmatter::new()
        });
        self.cache
            .write()
            .await
            .insert(path.to_string(), (modified, fm.clone()));
        Ok(fm)
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        let abs = self.resolve(path)?;
        fs::read_to_string(&abs)
            .await
            .map_err(|e| Self::read_error(path, e))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let abs = self.resolve(path)?;
        fs::write(&abs, content)
            .await
            .map_err(|e| StoreError::WriteError {
                path: path.to_string(),
                source: e,
            })?;
        self.cache.write().await.remove(path);
        Ok(())
    }
}
