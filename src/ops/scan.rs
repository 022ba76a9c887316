use std::collections::HashSet;

use crate::io::store::{NoteStore, StoreError};
use crate::model::note::Note;
use crate::parse::tags::{effective_tags, has_tag, normalize_tag};

/// Find every note carrying any of `tags`, by reading the whole vault.
///
/// Notes come back in enumeration order, each at most once. A note whose
/// metadata or content cannot be read is logged and skipped; only a
/// failure to enumerate is an error.
pub async fn scan_notes_by_tags<S, T>(store: &S, tags: &[T]) -> Result<Vec<Note>, StoreError>
where
    S: NoteStore,
    T: AsRef<str>,
{
    let targets: Vec<&str> = tags.iter().map(|t| normalize_tag(t.as_ref())).collect();
    let paths = store.enumerate().await?;
    tracing::debug!(notes = paths.len(), tags = ?targets, "scanning vault");

    let mut seen = HashSet::new();
    let mut notes = Vec::new();
    for path in paths {
        if seen.contains(&path) {
            continue;
        }
        let frontmatter = match store.metadata(&path).await {
            Ok(fm) => fm,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping note");
                continue;
            }
        };
        let content = match store.read(&path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping note");
                continue;
            }
        };
        let note_tags = effective_tags(&frontmatter, &content);
        if targets.iter().any(|t| has_tag(&note_tags, t)) {
            seen.insert(path.clone());
            notes.push(Note::new(path, frontmatter, note_tags));
        }
    }
    Ok(notes)
}

/// Single-tag form of `scan_notes_by_tags`.
pub async fn scan_notes_by_tag<S: NoteStore>(store: &S, tag: &str) -> Result<Vec<Note>, StoreError> {
    scan_notes_by_tags(store, &[tag]).await
}
