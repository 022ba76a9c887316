use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named set of tag columns, optionally narrowed by an index query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    /// Query in the external index's language, ANDed with each column tag
    #[serde(default, alias = "dataviewQuery", skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Board {
    /// Columns sorted by their `order` field
    pub fn ordered_columns(&self) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.order);
        cols
    }

    /// The non-blank board filter, if any
    pub fn filter_query(&self) -> Option<&str> {
        self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Column tags in display order
    pub fn column_tags(&self) -> Vec<String> {
        self.ordered_columns()
            .into_iter()
            .map(|c| c.tag.clone())
            .collect()
    }
}

/// One classification bucket: every note carrying `tag`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub order: usize,
}

/// Name/tag pairs seeded into a board created without explicit columns
pub const DEFAULT_BOARD_COLUMNS: &[(&str, &str)] = &[
    ("To Do", "todo"),
    ("In Progress", "doing"),
    ("Done", "done"),
];

/// Turn a display name into an identifier: lowercase ASCII alphanumerics
/// separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// A slug for `name` that does not collide with any of `existing`.
pub fn unique_id<'a>(name: &str, existing: impl Iterator<Item = &'a str> + Clone) -> String {
    let base = match slugify(name) {
        s if s.is_empty() => "untitled".to_string(),
        s => s,
    };
    if !existing.clone().any(|e| e == base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !existing.clone().any(|e| e == candidate) {
            return candidate;
        }
        n += 1;
    }
}
