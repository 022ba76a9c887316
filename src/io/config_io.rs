use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::{ConfigError, Settings, SettingsPatch};

/// Per-vault state directory
pub const KANLINE_DIR: &str = ".kanline";
/// Settings file inside `KANLINE_DIR`
pub const SETTINGS_FILE: &str = "settings.toml";

/// Error type for settings I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigIoError {
    #[error("not a kanline vault: no .kanline/settings.toml found (run `kanline init`)")]
    NotAVault,
    #[error("vault already initialized at {0} (use --force to reset)")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse settings.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize settings.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("could not edit settings.toml: {0}")]
    EditError(#[from] toml_edit::TomlError),
    #[error("could not parse plugin data: {0}")]
    PluginDataError(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

pub fn settings_path(vault_dir: &Path) -> PathBuf {
    vault_dir.join(KANLINE_DIR).join(SETTINGS_FILE)
}

/// Find the vault by walking up from `start`, looking for
/// `.kanline/settings.toml`.
pub fn discover_vault(start: &Path) -> Result<PathBuf, ConfigIoError> {
    let mut current = start.to_path_buf();
    loop {
        if settings_path(&current).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigIoError::NotAVault);
        }
    }
}

/// Create `.kanline/settings.toml` with default settings.
pub fn init_vault(vault_dir: &Path, force: bool) -> Result<Settings, ConfigIoError> {
    let path = settings_path(vault_dir);
    if path.exists() && !force {
        return Err(ConfigIoError::AlreadyInitialized(vault_dir.to_path_buf()));
    }
    let dir = vault_dir.join(KANLINE_DIR);
    fs::create_dir_all(&dir).map_err(|e| ConfigIoError::WriteError {
        path: dir.clone(),
        source: e,
    })?;
    let settings = Settings::default();
    save_settings(vault_dir, &settings)?;
    Ok(settings)
}

/// Read the settings, returning both the parsed snapshot and the raw
/// toml_edit document for format-preserving edits.
pub fn read_settings(vault_dir: &Path) -> Result<(Settings, toml_edit::DocumentMut), ConfigIoError> {
    let path = settings_path(vault_dir);
    let text = fs::read_to_string(&path).map_err(|e| ConfigIoError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let settings: Settings = toml::from_str(&text)?;
    settings.validate()?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((settings, doc))
}

/// Write an edited settings document back, preserving its formatting.
pub fn write_settings_doc(
    vault_dir: &Path,
    doc: &toml_edit::DocumentMut,
) -> Result<(), ConfigIoError> {
    let path = settings_path(vault_dir);
    fs::write(&path, doc.to_string()).map_err(|e| ConfigIoError::WriteError { path, source: e })
}

/// Serialize a whole snapshot. Used when boards change, since board
/// tables are rewritten wholesale.
pub fn save_settings(vault_dir: &Path, settings: &Settings) -> Result<(), ConfigIoError> {
    let path = settings_path(vault_dir);
    let text = toml::to_string_pretty(settings)?;
    fs::write(&path, text).map_err(|e| ConfigIoError::WriteError { path, source: e })
}

/// Mirror the scalar fields of a patch into the document. Any camelCase
/// alias of a key being set is removed so the file keeps one spelling.
/// `patch.boards` is not handled here; use `save_settings`.
pub fn apply_patch_to_doc(doc: &mut toml_edit::DocumentMut, patch: &SettingsPatch) {
    if let Some(None) = &patch.default_board {
        doc.remove("default_board");
        doc.remove("defaultBoard");
    }
    let mut set = |key: &str, alias: &str, item: toml_edit::Item| {
        doc.remove(alias);
        doc[key] = item;
    };
    if let Some(v) = patch.show_tags_on_cards {
        set("show_tags_on_cards", "showTagsOnCards", toml_edit::value(v));
    }
    if let Some(v) = patch.card_height {
        set("card_height", "cardHeight", toml_edit::value(v.to_string()));
    }
    if let Some(v) = patch.use_dataview_queries {
        set("use_dataview_queries", "useDataviewQueries", toml_edit::value(v));
    }
    if let Some(v) = patch.dataview_fallback {
        set("dataview_fallback", "dataviewFallback", toml_edit::value(v));
    }
    if let Some(v) = patch.auto_refresh_enabled {
        set("auto_refresh_enabled", "autoRefreshEnabled", toml_edit::value(v));
    }
    if let Some(v) = patch.auto_refresh_interval {
        set(
            "auto_refresh_interval",
            "autoRefreshInterval",
            toml_edit::value(v as i64),
        );
    }
    if let Some(Some(id)) = &patch.default_board {
        set("default_board", "defaultBoard", toml_edit::value(id.as_str()));
    }
}

/// Validate a patch against the current file and persist it.
pub fn update_settings(vault_dir: &Path, patch: &SettingsPatch) -> Result<Settings, ConfigIoError> {
    let (current, mut doc) = read_settings(vault_dir)?;
    let next = current.apply(patch)?;
    if patch.boards.is_some() {
        save_settings(vault_dir, &next)?;
    } else {
        apply_patch_to_doc(&mut doc, patch);
        write_settings_doc(vault_dir, &doc)?;
    }
    Ok(next)
}

/// Read settings from the editor plugin's `data.json`.
pub fn import_plugin_data(json: &str) -> Result<Settings, ConfigIoError> {
    let settings: Settings = serde_json::from_str(json)?;
    settings.validate()?;
    Ok(settings)
}
