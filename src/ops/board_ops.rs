use chrono::{DateTime, Utc};

use crate::model::board::{Board, Column, DEFAULT_BOARD_COLUMNS, unique_id};
use crate::model::config::Settings;
use crate::parse::tags::normalize_tag;

/// Error type for board and column edits
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("board name cannot be empty")]
    EmptyName,
    #[error("invalid column tag: {0:?}")]
    InvalidTag(String),
    #[error("board {board} already has a column for #{tag}")]
    DuplicateTag { board: String, tag: String },
}

/// Changes to a column; `None` fields are kept
#[derive(Debug, Clone, Default)]
pub struct ColumnUpdate {
    pub name: Option<String>,
    pub tag: Option<String>,
    /// `Some(None)` clears the color
    pub color: Option<Option<String>>,
}

fn canonical_tag(tag: &str) -> Result<String, BoardError> {
    let canonical = normalize_tag(tag.trim());
    if canonical.is_empty() || canonical.chars().any(char::is_whitespace) {
        return Err(BoardError::InvalidTag(tag.to_string()));
    }
    Ok(canonical.to_string())
}

fn board_mut<'a>(settings: &'a mut Settings, key: &str) -> Result<&'a mut Board, BoardError> {
    let id = settings
        .find_board(key)
        .map(|b| b.id.clone())
        .ok_or_else(|| BoardError::BoardNotFound(key.to_string()))?;
    settings
        .boards
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or(BoardError::BoardNotFound(id))
}

/// Renumber column orders to 0..n, keeping their relative order.
fn renormalize_order(board: &mut Board) {
    board.columns.sort_by_key(|c| c.order);
    for (i, column) in board.columns.iter_mut().enumerate() {
        column.order = i;
    }
}

/// Add a board. With no `columns`, the default To Do / In Progress / Done
/// columns are created. Returns the new board's id.
pub fn create_board(
    settings: &mut Settings,
    name: &str,
    filter: Option<&str>,
    columns: &[(String, String)],
    now: DateTime<Utc>,
) -> Result<String, BoardError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::EmptyName);
    }
    let id = unique_id(name, settings.boards.iter().map(|b| b.id.as_str()));

    let specs: Vec<(String, String)> = if columns.is_empty() {
        DEFAULT_BOARD_COLUMNS
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    } else {
        columns.to_vec()
    };

    let mut board = Board {
        id: id.clone(),
        name: name.to_string(),
        filter: filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string),
        created_at: now,
        updated_at: now,
        columns: Vec::new(),
    };
    for (col_name, tag) in &specs {
        push_column(&mut board, col_name, tag, None)?;
    }
    settings.boards.push(board);
    Ok(id)
}

fn push_column(
    board: &mut Board,
    name: &str,
    tag: &str,
    color: Option<&str>,
) -> Result<String, BoardError> {
    let tag = canonical_tag(tag)?;
    if board.columns.iter().any(|c| c.tag == tag) {
        return Err(BoardError::DuplicateTag {
            board: board.name.clone(),
            tag,
        });
    }
    let name = match name.trim() {
        "" => tag.clone(),
        n => n.to_string(),
    };
    let id = unique_id(&name, board.columns.iter().map(|c| c.id.as_str()));
    board.columns.push(Column {
        id: id.clone(),
        name,
        tag,
        color: color.map(str::to_string),
        order: board.columns.len(),
    });
    Ok(id)
}

pub fn rename_board(
    settings: &mut Settings,
    key: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(), BoardError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::EmptyName);
    }
    let board = board_mut(settings, key)?;
    board.name = name.to_string();
    board.updated_at = now;
    Ok(())
}

/// Set or clear (`None` or blank) the board filter query.
pub fn set_board_filter(
    settings: &mut Settings,
    key: &str,
    filter: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), BoardError> {
    let board = board_mut(settings, key)?;
    board.filter = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    board.updated_at = now;
    Ok(())
}

/// Remove a board, clearing the default board if it pointed there.
pub fn delete_board(settings: &mut Settings, key: &str) -> Result<Board, BoardError> {
    let id = board_mut(settings, key)?.id.clone();
    let pos = settings
        .boards
        .iter()
        .position(|b| b.id == id)
        .ok_or_else(|| BoardError::BoardNotFound(id.clone()))?;
    if settings.default_board.as_deref() == Some(id.as_str()) {
        settings.default_board = None;
    }
    Ok(settings.boards.remove(pos))
}

pub fn set_default_board(settings: &mut Settings, key: Option<&str>) -> Result<(), BoardError> {
    let id = match key {
        Some(key) => Some(board_mut(settings, key)?.id.clone()),
        None => None,
    };
    settings.default_board = id;
    Ok(())
}

/// Append a column. Returns the new column's id.
pub fn add_column(
    settings: &mut Settings,
    key: &str,
    name: &str,
    tag: &str,
    color: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, BoardError> {
    let board = board_mut(settings, key)?;
    renormalize_order(board);
    let id = push_column(board, name, tag, color)?;
    board.updated_at = now;
    Ok(id)
}

pub fn update_column(
    settings: &mut Settings,
    key: &str,
    column_id: &str,
    update: &ColumnUpdate,
    now: DateTime<Utc>,
) -> Result<(), BoardError> {
    let board = board_mut(settings, key)?;
    let new_tag = update.tag.as_deref().map(canonical_tag).transpose()?;
    if let Some(tag) = &new_tag
        && board
            .columns
            .iter()
            .any(|c| c.id != column_id && &c.tag == tag)
    {
        return Err(BoardError::DuplicateTag {
            board: board.name.clone(),
            tag: tag.clone(),
        });
    }
    let column = board
        .columns
        .iter_mut()
        .find(|c| c.id == column_id)
        .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;
    if let Some(name) = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        column.name = name.to_string();
    }
    if let Some(tag) = new_tag {
        column.tag = tag;
    }
    if let Some(color) = &update.color {
        column.color = color.clone();
    }
    board.updated_at = now;
    Ok(())
}

/// Remove a column; the remaining columns are renumbered 0..n.
pub fn remove_column(
    settings: &mut Settings,
    key: &str,
    column_id: &str,
    now: DateTime<Utc>,
) -> Result<Column, BoardError> {
    let board = board_mut(settings, key)?;
    let pos = board
        .columns
        .iter()
        .position(|c| c.id == column_id)
        .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;
    let removed = board.columns.remove(pos);
    renormalize_order(board);
    board.updated_at = now;
    Ok(removed)
}
