use indexmap::IndexMap;

use crate::model::board::{Board, Column};
use crate::model::note::Note;
use crate::parse::tags::has_tag;

/// Notes per column, keyed by column id in display order
pub type Classification = IndexMap<String, Vec<Note>>;

/// Does `note` belong in `column`? Exact tag equality, no nesting.
pub fn belongs(note: &Note, column: &Column) -> bool {
    has_tag(&note.tags, &column.tag)
}

/// Bucket `notes` into the board's columns.
///
/// A note carrying several column tags appears in each of those columns.
/// Notes keep their input order within a column.
pub fn classify(board: &Board, notes: &[Note]) -> Classification {
    board
        .ordered_columns()
        .into_iter()
        .map(|column| {
            let members = notes
                .iter()
                .filter(|n| belongs(n, column))
                .cloned()
                .collect();
            (column.id.clone(), members)
        })
        .collect()
}

/// One `(column id, path, tags)` entry per card, used to tell whether a
/// refresh changed anything visible.
pub type Signature = Vec<(String, String, Vec<String>)>;

pub fn signature(classification: &Classification) -> Signature {
    classification
        .iter()
        .flat_map(|(column_id, notes)| {
            notes
                .iter()
                .map(move |n| (column_id.clone(), n.path.clone(), n.tags.clone()))
        })
        .collect()
}
