use serde::Serialize;

/// Parsed YAML frontmatter of a note (empty when the note has none)
pub type Frontmatter = serde_yaml::Mapping;

/// A note as it appears on a board card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Vault-relative path, `/`-separated. Unique key.
    pub path: String,
    /// Display title
    pub title: String,
    /// Effective tags: frontmatter tags first, then inline tags.
    /// Canonical form (no `#`), duplicates preserved.
    pub tags: Vec<String>,
    /// Cached frontmatter at the time the note was classified
    #[serde(skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub frontmatter: Frontmatter,
}

impl Note {
    /// Build a note, deriving the title from frontmatter or the file name.
    pub fn new(path: impl Into<String>, frontmatter: Frontmatter, tags: Vec<String>) -> Self {
        let path = path.into();
        let title = note_title(&path, &frontmatter);
        Note {
            path,
            title,
            tags,
            frontmatter,
        }
    }

    /// Same as `new`, but prefer an externally supplied display name.
    pub fn with_display_name(
        path: impl Into<String>,
        display_name: &str,
        frontmatter: Frontmatter,
        tags: Vec<String>,
    ) -> Self {
        let mut note = Note::new(path, frontmatter, tags);
        let name = display_name.strip_suffix(".md").unwrap_or(display_name);
        if !name.is_empty() {
            note.title = name.to_string();
        }
        note
    }
}

/// Title from the frontmatter `title` key, falling back to the file stem.
pub fn note_title(path: &str, frontmatter: &Frontmatter) -> String {
    if let Some(title) = frontmatter
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
    {
        return title.to_string();
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .strip_suffix(".md")
        .unwrap_or(file_name)
        .to_string()
}
