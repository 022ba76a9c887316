use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::io::store::{NoteStore, StoreError};
use crate::parse::frontmatter::frontmatter_body;
use crate::parse::tags::normalize_tag;

/// Error type for moving a note between columns
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("invalid tag: {0:?}")]
    InvalidTag(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The note was written once with the renamed tag
    Rewritten { inline: bool, frontmatter: bool },
    /// Nothing to rename; the note was not written
    Unchanged,
}

/// Text after renaming a tag, with where the renames happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub inline: bool,
    pub frontmatter: bool,
}

impl Rewrite {
    pub fn changed(&self) -> bool {
        self.inline || self.frontmatter
    }
}

static FLOW_SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\btags:\s*\[(.*?)\]").expect("valid flow sequence regex"));
static BLOCK_SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\btags:[ \t]*\r?\n((?:[ \t]*-[ \t]*.+\n?)*)").expect("valid block sequence regex")
});
static INLINE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btags:[ \t]*([^\r\n\[]+)").expect("valid inline list regex"));
static SEGMENT_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid separator regex"));

/// The ways a frontmatter `tags:` key is written, in matching priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagShape {
    /// `tags: ["a", 'b']`
    FlowSequence,
    /// `tags:` followed by `- a` lines
    BlockSequence,
    /// `tags: a, b c`
    Inline,
}

impl TagShape {
    pub const PRIORITY: [TagShape; 3] = [
        TagShape::FlowSequence,
        TagShape::BlockSequence,
        TagShape::Inline,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            TagShape::FlowSequence => &*FLOW_SEQUENCE_RE,
            TagShape::BlockSequence => &*BLOCK_SEQUENCE_RE,
            TagShape::Inline => &*INLINE_LIST_RE,
        }
    }

    /// Try this shape against a frontmatter body.
    fn rewrite(self, body: &str, from: &str, to: &str) -> ShapeMatch {
        let Some(group) = self.regex().captures(body).and_then(|c| c.get(1)) else {
            return ShapeMatch::NoMatch;
        };
        let renamed = match self {
            TagShape::FlowSequence => rename_quoted(group.as_str(), from, to),
            TagShape::BlockSequence => rename_list_items(group.as_str(), from, to),
            TagShape::Inline => rename_segments(group.as_str(), from, to),
        };
        match renamed {
            Some(replacement) => {
                ShapeMatch::Rewritten(splice(body, group.range(), &replacement))
            }
            None => ShapeMatch::Unchanged,
        }
    }
}

enum ShapeMatch {
    NoMatch,
    /// The key was found in this shape but the tag was not in it
    Unchanged,
    Rewritten(String),
}

fn splice(text: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    out
}

/// `"from"` and `'from'` elements, keeping the quote character.
fn rename_quoted(items: &str, from: &str, to: &str) -> Option<String> {
    let double = (format!("\"{}\"", from), format!("\"{}\"", to));
    let single = (format!("'{}'", from), format!("'{}'", to));
    if !items.contains(&double.0) && !items.contains(&single.0) {
        return None;
    }
    Some(items.replace(&double.0, &double.1).replace(&single.0, &single.1))
}

/// `- from` lines (optionally quoted), other lines untouched.
fn rename_list_items(list: &str, from: &str, to: &str) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(list.len());
    for line in list.split_inclusive('\n') {
        match rename_list_item(line, from, to) {
            Some(renamed) => {
                changed = true;
                out.push_str(&renamed);
            }
            None => out.push_str(line),
        }
    }
    changed.then_some(out)
}

fn rename_list_item(line: &str, from: &str, to: &str) -> Option<String> {
    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    let rest = line[indent..].strip_prefix('-')?;
    let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let value_start = indent + 1 + gap;
    let value = line[value_start..].trim_end();
    let value_end = value_start + value.len();

    let replacement = if value == from {
        to.to_string()
    } else if value == format!("\"{}\"", from) {
        format!("\"{}\"", to)
    } else if value == format!("'{}'", from) {
        format!("'{}'", to)
    } else {
        return None;
    };
    Some(splice(line, value_start..value_end, &replacement))
}

/// `a, b c` segments; rejoined with `, ` when one of them is `from`.
fn rename_segments(list: &str, from: &str, to: &str) -> Option<String> {
    let segments: Vec<&str> = SEGMENT_SEP_RE
        .split(list.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !segments.contains(&from) {
        return None;
    }
    Some(
        segments
            .iter()
            .map(|&s| if s == from { to } else { s })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Rename inline `#from` to `#to`. An occurrence directly followed by an
/// ASCII word character (`#todo2` when renaming `todo`) is left alone.
pub fn rewrite_inline(text: &str, from: &str, to: &str) -> String {
    let needle = format!("#{}", from);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(&needle) {
        let end = start + needle.len();
        let followed_by_word = text[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if followed_by_word {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push('#');
        out.push_str(to);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// Rename `from` in the frontmatter `tags:` key.
///
/// Only the first shape whose key pattern matches is tried. If that shape
/// does not contain the tag, the frontmatter is left alone even when a
/// later shape would have matched. Returns `None` when nothing changed.
pub fn rewrite_frontmatter(text: &str, from: &str, to: &str) -> Option<String> {
    let range = frontmatter_body(text)?;
    let body = &text[range.clone()];
    for shape in TagShape::PRIORITY {
        match shape.rewrite(body, from, to) {
            ShapeMatch::NoMatch => continue,
            ShapeMatch::Unchanged => return None,
            ShapeMatch::Rewritten(new_body) => {
                tracing::debug!(?shape, "renamed frontmatter tag");
                return Some(splice(text, range, &new_body));
            }
        }
    }
    None
}

/// Rename a tag across both representations. `from` and `to` are
/// canonical (no leading `#`).
pub fn rewrite_tag(text: &str, from: &str, to: &str) -> Rewrite {
    let inline_text = rewrite_inline(text, from, to);
    let inline = inline_text != text;
    match rewrite_frontmatter(&inline_text, from, to) {
        Some(rewritten) => Rewrite {
            frontmatter: rewritten != inline_text,
            text: rewritten,
            inline,
        },
        None => Rewrite {
            text: inline_text,
            inline,
            frontmatter: false,
        },
    }
}

fn canonical_tag(tag: &str) -> Result<&str, RewriteError> {
    let canonical = normalize_tag(tag.trim());
    if canonical.is_empty() || canonical.chars().any(char::is_whitespace) {
        return Err(RewriteError::InvalidTag(tag.to_string()));
    }
    Ok(canonical)
}

/// Move a note from one column to another by renaming its tag.
///
/// Writes the note at most once, and only when its text changed.
pub async fn move_note<S: NoteStore>(
    store: &S,
    path: &str,
    from: &str,
    to: &str,
) -> Result<MoveOutcome, RewriteError> {
    let from = canonical_tag(from)?;
    let to = canonical_tag(to)?;
    if !store.contains(path).await {
        return Err(RewriteError::NotFound(path.to_string()));
    }

    let original = store.read(path).await?;
    let rewrite = rewrite_tag(&original, from, to);
    if !rewrite.changed() {
        tracing::debug!(path, from, to, "no tag to rename");
        return Ok(MoveOutcome::Unchanged);
    }

    store.write(path, &rewrite.text).await?;
    tracing::info!(path, from, to, "moved note");
    Ok(MoveOutcome::Rewritten {
        inline: rewrite.inline,
        frontmatter: rewrite.frontmatter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn inline_respects_word_boundary() {
        assert_eq!(
            rewrite_inline("a #todo b #todo2 c #todo_x #todo", "todo", "doing"),
            "a #doing b #todo2 c #todo_x #doing"
        );
        // `-` and `/` are not word characters
        assert_eq!(rewrite_inline("#todo-later #todo/x", "todo", "done"), "#done-later #done/x");
        assert_eq!(rewrite_inline("no tags", "todo", "done"), "no tags");
    }

    #[test]
    fn inline_handles_multibyte_neighbours() {
        assert_eq!(rewrite_inline("é#todoé", "todo", "done"), "é#doneé");
    }

    #[test]
    fn flow_sequence_keeps_quote_style() {
        let text = "---\ntags: [\"todo\", 'todo', other]\n---\nbody\n";
        let out = rewrite_frontmatter(text, "todo", "done").unwrap();
        assert_eq!(out, "---\ntags: [\"done\", 'done', other]\n---\nbody\n");
    }

    #[test]
    fn flow_sequence_unquoted_is_not_renamed() {
        let text = "---\ntags: [todo, other]\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn block_sequence_renames_exact_items() {
        let text = "---\ntitle: x\ntags:\n  - todo\n  - todo-later\n  - \"todo\"\nstatus: open\n---\n";
        let out = rewrite_frontmatter(text, "todo", "doing").unwrap();
        assert_eq!(
            out,
            "---\ntitle: x\ntags:\n  - doing\n  - todo-later\n  - \"doing\"\nstatus: open\n---\n"
        );
    }

    #[test]
    fn inline_list_rejoins_segments() {
        let text = "---\ntags: alpha todo,beta\n---\n";
        let out = rewrite_frontmatter(text, "todo", "done").unwrap();
        assert_eq!(out, "---\ntags: alpha, done, beta\n---\n");
    }

    #[test]
    fn inline_list_substring_is_not_a_match() {
        let text = "---\ntags: todo-later, beta\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn first_structural_match_short_circuits() {
        // Flow sequence matches first but holds no quoted "todo"; the
        // block list further down is never tried.
        let text = "---\ntags: [other]\naliases:\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);

        let text = "---\ntags:\nnext: 1\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn crlf_line_endings_are_kept() {
        let text = "---\r\ntags: [\"todo\"]\r\n---\r\nbody\r\n";
        assert_eq!(
            rewrite_frontmatter(text, "todo", "done").unwrap(),
            "---\r\ntags: [\"done\"]\r\n---\r\nbody\r\n"
        );

        let text = "---\r\ntags:\r\n  - todo\r\n  - work\r\ntitle: x\r\n---\r\n";
        assert_eq!(
            rewrite_frontmatter(text, "todo", "done").unwrap(),
            "---\r\ntags:\r\n  - done\r\n  - work\r\ntitle: x\r\n---\r\n"
        );

        let text = "---\r\ntags: todo, later\r\ntitle: x\r\n---\r\n";
        assert_eq!(
            rewrite_frontmatter(text, "todo", "done").unwrap(),
            "---\r\ntags: done, later\r\ntitle: x\r\n---\r\n"
        );
    }

    #[test]
    fn blank_line_after_key_is_an_empty_block_list() {
        // The block shape matches with zero items, so nothing is renamed
        let text = "---\ntags:\n\n  - todo\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn tags_key_needs_word_boundary() {
        let text = "---\nsubtags: todo\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn frontmatter_must_open_the_text() {
        let text = "intro\n---\ntags: todo\n---\n";
        assert_eq!(rewrite_frontmatter(text, "todo", "done"), None);
    }

    #[test]
    fn rewrite_tag_reports_both_sites() {
        let r = rewrite_tag("---\ntags: todo\n---\nsee #todo\n", "todo", "done");
        assert_eq!(r.text, "---\ntags: done\n---\nsee #done\n");
        assert!(r.inline && r.frontmatter);

        let r = rewrite_tag("plain", "todo", "done");
        assert!(!r.changed());
        assert_eq!(r.text, "plain");
    }

    #[tokio::test]
    async fn move_note_writes_once() {
        let store = MemoryStore::with_notes([("a.md", "---\ntags: [\"todo\"]\n---\n#todo\n")]);
        let outcome = move_note(&store, "a.md", "#todo", "doing").await.unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Rewritten {
                inline: true,
                frontmatter: true
            }
        );
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.get("a.md").unwrap(),
            "---\ntags: [\"doing\"]\n---\n#doing\n"
        );
    }

    #[tokio::test]
    async fn move_note_without_tag_does_not_write() {
        let store = MemoryStore::with_notes([("a.md", "#other\n")]);
        let outcome = move_note(&store, "a.md", "todo", "doing").await.unwrap();
        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.get("a.md").unwrap(), "#other\n");
    }

    #[tokio::test]
    async fn move_note_errors() {
        let store = MemoryStore::with_notes([("a.md", "#todo")]);
        assert!(matches!(
            move_note(&store, "missing.md", "todo", "doing").await,
            Err(RewriteError::NotFound(p)) if p == "missing.md"
        ));
        assert!(matches!(
            move_note(&store, "a.md", "#", "doing").await,
            Err(RewriteError::InvalidTag(_))
        ));
        assert!(matches!(
            move_note(&store, "a.md", "todo", "in progress").await,
            Err(RewriteError::InvalidTag(_))
        ));

        store.fail_writes(true);
        assert!(matches!(
            move_note(&store, "a.md", "todo", "doing").await,
            Err(RewriteError::Store(StoreError::WriteError { .. }))
        ));
        assert_eq!(store.get("a.md").unwrap(), "#todo");
    }
}
