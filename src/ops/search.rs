use std::ops::Range;

use regex::Regex;

use crate::io::store::{NoteStore, StoreError};
use crate::model::note::note_title;
use crate::parse::frontmatter::frontmatter_block;
use crate::parse::tags::{dedup_tags, effective_tags, has_tag};

/// Which part of a note matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Tag,
    /// A line of the note text below the frontmatter
    Body,
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchField::Title => write!(f, "title"),
            MatchField::Tag => write!(f, "tag"),
            MatchField::Body => write!(f, "body"),
        }
    }
}

/// A search hit in one field of one note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub field: MatchField,
    /// The matched text: the title, the tag, or the body line
    pub text: String,
    /// 1-based line number for body hits
    pub line: Option<usize>,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search note titles, tags and body lines.
///
/// With `tag_filter`, only notes carrying that tag are searched. Notes
/// that cannot be read are skipped.
pub async fn search_notes<S: NoteStore>(
    store: &S,
    re: &Regex,
    tag_filter: Option<&str>,
) -> Result<Vec<SearchHit>, StoreError> {
    let mut hits = Vec::new();
    for path in store.enumerate().await? {
        let (frontmatter, content) = match (store.metadata(&path).await, store.read(&path).await) {
            (Ok(fm), Ok(content)) => (fm, content),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(path = %path, error = %e, "skipping note");
                continue;
            }
        };
        let tags = effective_tags(&frontmatter, &content);
        if let Some(filter) = tag_filter
            && !has_tag(&tags, filter)
        {
            continue;
        }
        let title = note_title(&path, &frontmatter);
        search_note(re, &path, &title, &tags, &content, &mut hits);
    }
    Ok(hits)
}

fn search_note(
    re: &Regex,
    path: &str,
    title: &str,
    tags: &[String],
    content: &str,
    hits: &mut Vec<SearchHit>,
) {
    let hit = |field, text: &str, line, spans| SearchHit {
        path: path.to_string(),
        title: title.to_string(),
        field,
        text: text.to_string(),
        line,
        spans,
    };

    // Title
    let spans = find_matches(re, title);
    if !spans.is_empty() {
        hits.push(hit(MatchField::Title, title, None, spans));
    }

    // Tags, once each
    for tag in dedup_tags(tags) {
        let spans = find_matches(re, &tag);
        if !spans.is_empty() {
            hits.push(hit(MatchField::Tag, tag.as_str(), None, spans));
        }
    }

    // Body lines after the frontmatter block
    let (body, first_line) = match frontmatter_block(content) {
        Some(block) => (&content[block.end..], content[..block.end].lines().count() + 1),
        None => (content, 1),
    };
    for (i, line) in body.lines().enumerate() {
        let spans = find_matches(re, line);
        if !spans.is_empty() {
            hits.push(hit(MatchField::Body, line, Some(first_line + i), spans));
        }
    }
}
