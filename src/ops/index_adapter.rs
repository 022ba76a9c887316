use std::collections::HashSet;
use std::sync::Arc;

use crate::io::index::{ExternalIndex, IndexError, IndexHit};
use crate::io::store::NoteStore;
use crate::model::note::Note;
use crate::parse::query::{any_tag_query, compose_query, tag_query};
use crate::parse::tags::effective_tags;

/// Runs queries against an external index and turns the hits back into
/// notes read from the store.
///
/// An unavailable index gives empty results rather than errors; the
/// caller is expected to probe `is_available` before relying on it.
pub struct IndexAdapter<S, I> {
    store: Arc<S>,
    index: Arc<I>,
}

impl<S, I> Clone for IndexAdapter<S, I> {
    fn clone(&self) -> Self {
        IndexAdapter {
            store: Arc::clone(&self.store),
            index: Arc::clone(&self.index),
        }
    }
}

impl<S: NoteStore, I: ExternalIndex> IndexAdapter<S, I> {
    pub fn new(store: Arc<S>, index: Arc<I>) -> Self {
        IndexAdapter { store, index }
    }

    pub fn is_available(&self) -> bool {
        self.index.is_available()
    }

    pub async fn query_by_tag(&self, tag: &str) -> Result<Vec<Note>, IndexError> {
        self.query_custom(&tag_query(tag)).await
    }

    pub async fn query_by_multiple_tags<T: AsRef<str>>(
        &self,
        tags: &[T],
    ) -> Result<Vec<Note>, IndexError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let notes = self.query_custom(&any_tag_query(tags)).await?;
        Ok(dedup_by_path(notes))
    }

    /// Notes for one column of a board: the board filter ANDed with the
    /// column tag. Nothing to query means no notes.
    pub async fn query_for_column(
        &self,
        board_filter: Option<&str>,
        column_tag: &str,
    ) -> Result<Vec<Note>, IndexError> {
        let query = compose_query(board_filter, Some(column_tag));
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.query_custom(&query).await
    }

    /// Run a query in the index's own language.
    pub async fn query_custom(&self, query: &str) -> Result<Vec<Note>, IndexError> {
        if !self.is_available() {
            tracing::debug!("index unavailable, returning no notes");
            return Ok(Vec::new());
        }
        let hits = match self.index.query(query).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(query, error = %e, "index query failed");
                return Err(match e {
                    IndexError::Query(msg) => IndexError::Query(msg),
                    other => IndexError::Query(other.to_string()),
                });
            }
        };
        Ok(self.resolve_hits(hits).await)
    }

    /// Run several queries, merging their results by path.
    pub async fn query_multiple<Q: AsRef<str>>(
        &self,
        queries: &[Q],
    ) -> Result<Vec<Note>, IndexError> {
        let mut notes = Vec::new();
        for query in queries {
            notes.extend(self.query_custom(query.as_ref()).await?);
        }
        Ok(dedup_by_path(notes))
    }

    async fn resolve_hits(&self, hits: Vec<IndexHit>) -> Vec<Note> {
        let mut notes = Vec::with_capacity(hits.len());
        for hit in hits {
            if !self.store.contains(&hit.path).await {
                tracing::debug!(path = %hit.path, "index hit not in store");
                continue;
            }
            let frontmatter = match self.store.metadata(&hit.path).await {
                Ok(fm) => fm,
                Err(e) => {
                    tracing::warn!(path = %hit.path, error = %e, "skipping index hit");
                    continue;
                }
            };
            let content = match self.store.read(&hit.path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %hit.path, error = %e, "skipping index hit");
                    continue;
                }
            };
            let tags = effective_tags(&frontmatter, &content);
            notes.push(Note::with_display_name(hit.path, &hit.name, frontmatter, tags));
        }
        notes
    }
}

fn dedup_by_path(notes: Vec<Note>) -> Vec<Note> {
    let mut seen = HashSet::new();
    notes
        .into_iter()
        .filter(|n| seen.insert(n.path.clone()))
        .collect()
}
