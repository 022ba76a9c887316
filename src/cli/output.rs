use serde::Serialize;

use crate::model::board::{Board, Column};
use crate::model::config::{CardHeight, Settings};
use crate::model::note::Note;
use crate::ops::membership::Classification;
use crate::ops::rewrite::MoveOutcome;
use crate::ops::search::SearchHit;
use crate::parse::tags::{dedup_tags, format_tag};
use crate::util::unicode::{display_width, pad_to_width, truncate_to_width};

/// Card titles are cut to this many cells in the text board
const MAX_TITLE_CELLS: usize = 48;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ColumnJson {
    pub id: String,
    pub name: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub order: usize,
}

#[derive(Serialize)]
pub struct BoardInfoJson {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub default: bool,
    pub columns: Vec<ColumnJson>,
}

#[derive(Serialize)]
pub struct NoteJson {
    pub path: String,
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct ColumnCardsJson {
    pub id: String,
    pub name: String,
    pub tag: String,
    pub notes: Vec<NoteJson>,
}

#[derive(Serialize)]
pub struct BoardViewJson {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub columns: Vec<ColumnCardsJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct MoveJson {
    pub path: String,
    pub from: String,
    pub to: String,
    pub changed: bool,
    pub inline: bool,
    pub frontmatter: bool,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub path: String,
    pub title: String,
    pub field: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Serialize)]
pub struct IndexStatusJson {
    pub available: bool,
    pub notes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn column_to_json(column: &Column) -> ColumnJson {
    ColumnJson {
        id: column.id.clone(),
        name: column.name.clone(),
        tag: column.tag.clone(),
        color: column.color.clone(),
        order: column.order,
    }
}

pub fn board_to_json(board: &Board, settings: &Settings) -> BoardInfoJson {
    BoardInfoJson {
        id: board.id.clone(),
        name: board.name.clone(),
        filter: board.filter.clone(),
        default: settings.default_board.as_deref() == Some(board.id.as_str()),
        columns: board.ordered_columns().into_iter().map(column_to_json).collect(),
    }
}

pub fn note_to_json(note: &Note) -> NoteJson {
    NoteJson {
        path: note.path.clone(),
        title: note.title.clone(),
        tags: dedup_tags(&note.tags),
    }
}

pub fn board_view_to_json(
    board: &Board,
    columns: &Classification,
    error: Option<&str>,
) -> BoardViewJson {
    BoardViewJson {
        id: board.id.clone(),
        name: board.name.clone(),
        filter: board.filter.clone(),
        columns: board
            .ordered_columns()
            .into_iter()
            .map(|c| ColumnCardsJson {
                id: c.id.clone(),
                name: c.name.clone(),
                tag: c.tag.clone(),
                notes: columns
                    .get(&c.id)
                    .map(|notes| notes.iter().map(note_to_json).collect())
                    .unwrap_or_default(),
            })
            .collect(),
        error: error.map(str::to_string),
    }
}

pub fn move_to_json(path: &str, from: &str, to: &str, outcome: MoveOutcome) -> MoveJson {
    let (changed, inline, frontmatter) = match outcome {
        MoveOutcome::Rewritten { inline, frontmatter } => (true, inline, frontmatter),
        MoveOutcome::Unchanged => (false, false, false),
    };
    MoveJson {
        path: path.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        changed,
        inline,
        frontmatter,
    }
}

pub fn search_hit_to_json(hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        path: hit.path.clone(),
        title: hit.title.clone(),
        field: hit.field.to_string(),
        text: hit.text.clone(),
        line: hit.line,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn format_tags(tags: &[String]) -> String {
    dedup_tags(tags)
        .iter()
        .map(|t| format_tag(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line per board: default marker, id, name, column tags
pub fn format_board_listing(settings: &Settings) -> Vec<String> {
    let id_width = settings
        .boards
        .iter()
        .map(|b| display_width(&b.id))
        .max()
        .unwrap_or(0);
    settings
        .boards
        .iter()
        .map(|b| {
            let marker = if settings.default_board.as_deref() == Some(b.id.as_str()) {
                '*'
            } else {
                ' '
            };
            let tags = b
                .ordered_columns()
                .iter()
                .map(|c| format_tag(&c.tag))
                .collect::<Vec<_>>()
                .join(" ");
            let mut line = format!("{} {}  {}  [{}]", marker, pad_to_width(&b.id, id_width), b.name, tags);
            if let Some(filter) = b.filter_query() {
                line.push_str(&format!("  filter: {}", filter));
            }
            line
        })
        .collect()
}

/// The board as plain text, one section per column.
///
/// `card_height` picks how much of each card is shown: the title only,
/// title and path on one line, or title, path and tags on separate lines.
pub fn format_board(board: &Board, columns: &Classification, settings: &Settings) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", board.name, board.id)];
    if let Some(filter) = board.filter_query() {
        lines.push(format!("filter: {}", filter));
    }

    for column in board.ordered_columns() {
        let notes = columns.get(&column.id).map(Vec::as_slice).unwrap_or(&[]);
        lines.push(String::new());
        lines.push(format!("{}  {}  ({})", column.name, format_tag(&column.tag), notes.len()));
        if notes.is_empty() {
            lines.push("  (empty)".to_string());
            continue;
        }

        let titles: Vec<String> = notes
            .iter()
            .map(|n| truncate_to_width(&n.title, MAX_TITLE_CELLS))
            .collect();
        let title_width = titles.iter().map(|t| display_width(t)).max().unwrap_or(0);

        for (note, title) in notes.iter().zip(&titles) {
            let tags = format_tags(&note.tags);
            let show_tags = settings.show_tags_on_cards && !tags.is_empty();
            match settings.card_height {
                CardHeight::Compact => lines.push(format!("  {}", title)),
                CardHeight::Normal => {
                    let mut line = format!("  {}  {}", pad_to_width(title, title_width), note.path);
                    if show_tags {
                        line.push_str("  ");
                        line.push_str(&tags);
                    }
                    lines.push(line);
                }
                CardHeight::Expanded => {
                    lines.push(format!("  {}", title));
                    lines.push(format!("      {}", note.path));
                    if show_tags {
                        lines.push(format!("      {}", tags));
                    }
                }
            }
        }
    }
    lines
}

pub fn format_search_hit(hit: &SearchHit) -> String {
    match hit.line {
        Some(line) => format!("{}:{}: {}", hit.path, line, hit.text.trim()),
        None => format!("{} ({}: {})", hit.path, hit.field, hit.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::note::Frontmatter;
    use chrono::Utc;
    use insta::assert_snapshot;

    fn board() -> Board {
        let now = Utc::now();
        let column = |id: &str, name: &str, order| Column {
            id: id.into(),
            name: name.into(),
            tag: id.into(),
            color: None,
            order,
        };
        Board {
            id: "work".into(),
            name: "Work".into(),
            filter: Some("\"Projects\"".into()),
            created_at: now,
            updated_at: now,
            columns: vec![column("todo", "To Do", 0), column("done", "Done", 1)],
        }
    }

    fn note(path: &str, tags: &[&str]) -> Note {
        Note::new(
            path,
            Frontmatter::new(),
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    fn classification() -> Classification {
        let mut c = Classification::new();
        c.insert(
            "todo".into(),
            vec![
                note("Projects/launch plan.md", &["todo", "urgent", "todo"]),
                note("Projects/设计.md", &["todo"]),
            ],
        );
        c.insert("done".into(), vec![]);
        c
    }

    #[test]
    fn board_normal_cards() {
        let text = format_board(&board(), &classification(), &Settings::default()).join("\n");
        assert_snapshot!(text, @r#"
        Work (work)
        filter: "Projects"

        To Do  #todo  (2)
          launch plan  Projects/launch plan.md  #todo #urgent
          设计         Projects/设计.md  #todo

        Done  #done  (0)
          (empty)
        "#);
    }

    #[test]
    fn board_compact_and_expanded_cards() {
        let settings = Settings {
            card_height: CardHeight::Compact,
            ..Settings::default()
        };
        let text = format_board(&board(), &classification(), &settings);
        assert_eq!(text[4], "  launch plan");

        let settings = Settings {
            card_height: CardHeight::Expanded,
            show_tags_on_cards: false,
            ..Settings::default()
        };
        let text = format_board(&board(), &classification(), &settings);
        assert_eq!(text[4], "  launch plan");
        assert_eq!(text[5], "      Projects/launch plan.md");
        assert_eq!(text[6], "  设计");
    }

    #[test]
    fn board_listing_marks_default() {
        let mut settings = Settings {
            boards: vec![board()],
            ..Settings::default()
        };
        settings.default_board = Some("work".into());
        assert_eq!(
            format_board_listing(&settings),
            vec!["* work  Work  [#todo #done]  filter: \"Projects\""]
        );
    }

    #[test]
    fn move_json_flags() {
        let json = move_to_json("a.md", "todo", "done", MoveOutcome::Unchanged);
        assert!(!json.changed);
        let json = move_to_json(
            "a.md",
            "todo",
            "done",
            MoveOutcome::Rewritten {
                inline: true,
                frontmatter: false,
            },
        );
        assert!(json.changed && json.inline && !json.frontmatter);
    }
}
