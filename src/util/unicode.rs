use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Terminal cells taken by `s`. Card titles are often CJK or carry
/// combining marks, so `len()` is not a usable width.
pub fn display_width(s: &str) -> usize {
    s.width()
}

/// Cut `s` to fit `max_cells`, ending in an ellipsis when anything was
/// dropped. Graphemes are never split.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if s.width() <= max_cells {
        return s.to_string();
    }
    let Some(budget) = max_cells.checked_sub(1) else {
        return String::new();
    };

    let mut used = 0;
    let mut kept: String = s
        .graphemes(true)
        .take_while(|g| {
            used += g.width();
            used <= budget
        })
        .collect();
    kept.push(ELLIPSIS);
    kept
}

/// Right-pad with spaces to `cells` terminal cells. Longer strings are
/// returned as they are.
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let mut out = s.to_string();
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(s.width())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_of_note_titles() {
        assert_eq!(display_width("Launch plan"), 11);
        assert_eq!(display_width("会议记录"), 8);
        assert_eq!(display_width("Re\u{0301}sume\u{0301}"), 6);
    }

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(truncate_to_width("Inbox", 5), "Inbox");
        assert_eq!(truncate_to_width("", 3), "");
    }

    #[test]
    fn long_titles_end_in_ellipsis() {
        assert_eq!(truncate_to_width("Quarterly review", 8), "Quarter\u{2026}");
        assert_eq!(truncate_to_width("Quarterly review", 1), "\u{2026}");
        assert_eq!(truncate_to_width("Quarterly review", 0), "");
    }

    #[test]
    fn wide_graphemes_are_not_split() {
        // 6 cells leave 5 for text: two 2-cell chars fit, the third does not
        assert_eq!(truncate_to_width("会议记录", 6), "会议\u{2026}");
        assert_eq!(truncate_to_width("会议记录", 3), "会\u{2026}");
        assert_eq!(truncate_to_width("Cafe\u{0301} notes", 5), "Cafe\u{0301}\u{2026}");
    }

    #[test]
    fn padding_counts_cells() {
        assert_eq!(pad_to_width("todo", 6), "todo  ");
        assert_eq!(pad_to_width("会议", 6), "会议  ");
        assert_eq!(pad_to_width("Done", 2), "Done");
    }
}
