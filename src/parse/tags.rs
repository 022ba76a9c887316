use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::model::note::Frontmatter;

/// Inline tag: `#` followed by word chars, hyphens, underscores or slashes
static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_\-/]+").expect("valid inline tag regex"));

/// Canonical form of a tag: a single leading `#` removed.
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('#').unwrap_or(tag)
}

/// Inline form of a tag: exactly one leading `#`.
pub fn format_tag(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

/// The shape of a frontmatter `tags` field, resolved once
#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterTags {
    Absent,
    /// `tags: [a, b]` or a block list
    Sequence(Vec<Value>),
    /// `tags: a, b`
    Text(String),
    /// Any other YAML value (mapping, number, bool, ...)
    Unsupported,
}

impl FrontmatterTags {
    pub fn from_frontmatter(frontmatter: &Frontmatter) -> Self {
        match frontmatter.get("tags") {
            None => FrontmatterTags::Absent,
            Some(Value::Sequence(items)) => FrontmatterTags::Sequence(items.clone()),
            Some(Value::String(s)) => FrontmatterTags::Text(s.clone()),
            Some(_) => FrontmatterTags::Unsupported,
        }
    }

    /// Canonical tags in source order
    pub fn into_tags(self) -> Vec<String> {
        match self {
            FrontmatterTags::Absent | FrontmatterTags::Unsupported => Vec::new(),
            FrontmatterTags::Sequence(items) => items
                .iter()
                .map(|v| normalize_tag(&value_to_text(v)).to_string())
                .collect(),
            FrontmatterTags::Text(s) => s
                .split(',')
                .map(|t| normalize_tag(t.trim()).to_string())
                .collect(),
        }
    }
}

/// Coerce a YAML scalar (or anything else) to text.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Tags declared in the frontmatter `tags` field.
pub fn extract_tags_from_frontmatter(frontmatter: &Frontmatter) -> Vec<String> {
    FrontmatterTags::from_frontmatter(frontmatter).into_tags()
}

/// Inline `#tags` in the note text, in order, duplicates kept.
pub fn extract_tags_from_content(content: &str) -> Vec<String> {
    INLINE_TAG_RE
        .find_iter(content)
        .map(|m| normalize_tag(m.as_str()).to_string())
        .collect()
}

/// The effective tag sequence of a note: frontmatter tags, then inline tags.
pub fn effective_tags(frontmatter: &Frontmatter, content: &str) -> Vec<String> {
    let mut tags = extract_tags_from_frontmatter(frontmatter);
    tags.extend(extract_tags_from_content(content));
    tags
}

/// Exact, case-sensitive membership on canonical forms.
pub fn has_tag<S: AsRef<str>>(tags: &[S], target: &str) -> bool {
    let target = normalize_tag(target);
    tags.iter().any(|t| normalize_tag(t.as_ref()) == target)
}

/// Drop repeated tags (by canonical form), keeping first occurrences.
pub fn dedup_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| normalize_tag(t.as_ref()))
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}
