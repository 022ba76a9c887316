use serde::{Deserialize, Serialize};

use super::board::Board;

/// Bounds for `auto_refresh_interval`, in seconds
pub const AUTO_REFRESH_MIN_SECS: u64 = 1;
pub const AUTO_REFRESH_MAX_SECS: u64 = 60;

/// Persisted settings (`.kanline/settings.toml`).
///
/// Field names are snake_case on disk; the camelCase names used by the
/// editor plugin's `data.json` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Default: true
    #[serde(default = "default_true", alias = "showTagsOnCards")]
    pub show_tags_on_cards: bool,
    /// Default: normal
    #[serde(default, alias = "cardHeight")]
    pub card_height: CardHeight,
    /// Classify through the external index when it is available. Default: false
    #[serde(default, alias = "useDataviewQueries")]
    pub use_dataview_queries: bool,
    /// Fall back to a classic scan when an index query fails. Default: true
    #[serde(default = "default_true", alias = "dataviewFallback")]
    pub dataview_fallback: bool,
    /// Default: true
    #[serde(default = "default_true", alias = "autoRefreshEnabled")]
    pub auto_refresh_enabled: bool,
    /// Seconds between auto-refresh cycles. Default: 5
    #[serde(default = "default_interval", alias = "autoRefreshInterval")]
    pub auto_refresh_interval: u64,
    /// Board opened when none is named explicitly
    #[serde(default, alias = "defaultBoard", skip_serializing_if = "Option::is_none")]
    pub default_board: Option<String>,
    #[serde(default)]
    pub boards: Vec<Board>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            show_tags_on_cards: true,
            card_height: CardHeight::Normal,
            use_dataview_queries: false,
            dataview_fallback: true,
            auto_refresh_enabled: true,
            auto_refresh_interval: default_interval(),
            default_board: None,
            boards: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    5
}

/// How much of a note each card shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardHeight {
    Compact,
    #[default]
    Normal,
    Expanded,
}

impl std::str::FromStr for CardHeight {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(CardHeight::Compact),
            "normal" => Ok(CardHeight::Normal),
            "expanded" => Ok(CardHeight::Expanded),
            other => Err(ConfigError::InvalidValue {
                key: "card_height".into(),
                value: other.into(),
            }),
        }
    }
}

impl std::fmt::Display for CardHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardHeight::Compact => write!(f, "compact"),
            CardHeight::Normal => write!(f, "normal"),
            CardHeight::Expanded => write!(f, "expanded"),
        }
    }
}

/// Error type for settings validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("auto_refresh_interval must be between 1 and 60 seconds, got {0}")]
    IntervalOutOfRange(u64),
}

/// A partial update to `Settings`. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub show_tags_on_cards: Option<bool>,
    pub card_height: Option<CardHeight>,
    pub use_dataview_queries: Option<bool>,
    pub dataview_fallback: Option<bool>,
    pub auto_refresh_enabled: Option<bool>,
    pub auto_refresh_interval: Option<u64>,
    /// `Some(None)` clears the default board
    pub default_board: Option<Option<String>>,
    pub boards: Option<Vec<Board>>,
}

impl SettingsPatch {
    /// Build a single-field patch from a `key = value` pair as typed on
    /// the command line. Keys may be snake_case or camelCase.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, ConfigError> {
        let mut patch = SettingsPatch::default();
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let parse_bool = |v: &str| v.parse::<bool>().map_err(|_| invalid());
        match key {
            "show_tags_on_cards" | "showTagsOnCards" => {
                patch.show_tags_on_cards = Some(parse_bool(value)?)
            }
            "card_height" | "cardHeight" => patch.card_height = Some(value.parse()?),
            "use_dataview_queries" | "useDataviewQueries" => {
                patch.use_dataview_queries = Some(parse_bool(value)?)
            }
            "dataview_fallback" | "dataviewFallback" => {
                patch.dataview_fallback = Some(parse_bool(value)?)
            }
            "auto_refresh_enabled" | "autoRefreshEnabled" => {
                patch.auto_refresh_enabled = Some(parse_bool(value)?)
            }
            "auto_refresh_interval" | "autoRefreshInterval" => {
                patch.auto_refresh_interval = Some(value.parse().map_err(|_| invalid())?)
            }
            "default_board" | "defaultBoard" => {
                patch.default_board = Some(Some(value.to_string()).filter(|v| !v.is_empty()))
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(patch)
    }
}

fn check_interval(secs: u64) -> Result<(), ConfigError> {
    if (AUTO_REFRESH_MIN_SECS..=AUTO_REFRESH_MAX_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(ConfigError::IntervalOutOfRange(secs))
    }
}

impl Settings {
    /// Apply a partial update, producing a new snapshot.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<Settings, ConfigError> {
        if let Some(secs) = patch.auto_refresh_interval {
            check_interval(secs)?;
        }
        let mut next = self.clone();
        if let Some(v) = patch.show_tags_on_cards {
            next.show_tags_on_cards = v;
        }
        if let Some(v) = patch.card_height {
            next.card_height = v;
        }
        if let Some(v) = patch.use_dataview_queries {
            next.use_dataview_queries = v;
        }
        if let Some(v) = patch.dataview_fallback {
            next.dataview_fallback = v;
        }
        if let Some(v) = patch.auto_refresh_enabled {
            next.auto_refresh_enabled = v;
        }
        if let Some(v) = patch.auto_refresh_interval {
            next.auto_refresh_interval = v;
        }
        if let Some(v) = &patch.default_board {
            next.default_board = v.clone();
        }
        if let Some(v) = &patch.boards {
            next.boards = v.clone();
        }
        Ok(next)
    }

    /// Check a snapshot read from disk or imported from the plugin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_interval(self.auto_refresh_interval)
    }

    pub fn board(&self, id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    /// Resolve a board by id or by (case-insensitive) name
    pub fn find_board(&self, key: &str) -> Option<&Board> {
        self.board(key).or_else(|| {
            self.boards
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(key))
        })
    }
}
