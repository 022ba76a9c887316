pub mod board_ops;
pub mod index_adapter;
pub mod membership;
pub mod rewrite;
pub mod scan;
pub mod search;

pub use index_adapter::IndexAdapter;
pub use membership::{Classification, belongs, classify, signature};
pub use rewrite::{MoveOutcome, RewriteError, move_note, rewrite_tag};
pub use scan::{scan_notes_by_tag, scan_notes_by_tags};
