use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::note::Frontmatter;

/// `---` line, block body, `---` line, anchored at the start of the text.
/// Lines may end in `\r\n`.
static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---(?:\r?\n|\z)").expect("valid frontmatter regex")
});

/// Byte range of the frontmatter body (between the delimiter lines),
/// or `None` when the text does not open with a frontmatter block.
pub fn frontmatter_body(text: &str) -> Option<Range<usize>> {
    FRONTMATTER_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

/// Byte range of the whole frontmatter block, delimiter lines included.
pub fn frontmatter_block(text: &str) -> Option<Range<usize>> {
    FRONTMATTER_RE.find(text).map(|m| m.range())
}

/// Parse the frontmatter block as a YAML mapping.
///
/// No block, an empty block, or a block that is not a mapping all give an
/// empty mapping. Malformed YAML is an error.
pub fn parse_frontmatter(text: &str) -> Result<Frontmatter, serde_yaml::Error> {
    let Some(range) = frontmatter_body(text) else {
        return Ok(Frontmatter::new());
    };
    let value: serde_yaml::Value = serde_yaml::from_str(&text[range])?;
    Ok(match value {
        serde_yaml::Value::Mapping(map) => map,
        _ => Frontmatter::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_block_body() {
        let text = "---\ntags: [a]\n---\nbody";
        let range = frontmatter_body(text).unwrap();
        assert_eq!(&text[range], "tags: [a]");
    }

    #[test]
    fn block_at_end_of_text() {
        let text = "---\ntitle: x\n---";
        assert_eq!(&text[frontmatter_body(text).unwrap()], "title: x");
    }

    #[test]
    fn lazy_match_stops_at_first_closing_line() {
        let text = "---\na: 1\n---\n\n---\nb: 2\n---\n";
        assert_eq!(&text[frontmatter_body(text).unwrap()], "a: 1");
    }

    #[test]
    fn must_start_at_beginning() {
        assert!(frontmatter_body("\n---\na: 1\n---\n").is_none());
        assert!(frontmatter_body("# Title\n---\na: 1\n---\n").is_none());
    }

    #[test]
    fn closing_delimiter_must_be_whole_line() {
        assert!(frontmatter_body("---\na: 1\n----\n").is_none());
    }

    #[test]
    fn crlf_delimiters() {
        let text = "---\r\ntags: [\"todo\"]\r\n---\r\nbody\r\n";
        assert_eq!(&text[frontmatter_body(text).unwrap()], "tags: [\"todo\"]");
        assert_eq!(&text[frontmatter_block(text).unwrap()], "---\r\ntags: [\"todo\"]\r\n---\r\n");
        let fm = parse_frontmatter("---\r\ntitle: Plan\r\nstatus: open\r\n---\r\n").unwrap();
        assert_eq!(fm.get("status").and_then(|v| v.as_str()), Some("open"));
    }

    #[test]
    fn parses_mapping() {
        let fm = parse_frontmatter("---\ntitle: Plan\ntags: [a, b]\n---\nbody").unwrap();
        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Plan"));
    }

    #[test]
    fn missing_or_scalar_block_is_empty() {
        assert!(parse_frontmatter("no frontmatter").unwrap().is_empty());
        assert!(parse_frontmatter("---\njust text\n---\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(parse_frontmatter("---\ntags: [a, b\n---\n").is_err());
    }
}
