//! Index query strings: composition of board/column queries, and the
//! source-expression language evaluated by the bundled local index.
//!
//! Grammar (keywords case-insensitive, `and` binds tighter than `or`):
//!
//! ```text
//! expr  := and ( "or" and )*
//! and   := unary ( "and" unary )*
//! unary := ( "-" | "!" ) unary | atom
//! atom  := "#"tag | "\"" folder "\"" | "(" expr ")"
//! ```

use crate::parse::tags::{format_tag, normalize_tag};

/// Combine a board filter and a column tag into one query.
///
/// An empty result means "no query": callers must return no notes for it
/// rather than treating it as match-everything.
pub fn compose_query(board_filter: Option<&str>, column_tag: Option<&str>) -> String {
    let filter = board_filter.map(str::trim).filter(|f| !f.is_empty());
    let tag = column_tag
        .map(|t| normalize_tag(t.trim()))
        .filter(|t| !t.is_empty());
    match (filter, tag) {
        (Some(f), Some(t)) => format!("{} and #{}", f, t),
        (Some(f), None) => f.to_string(),
        (None, Some(t)) => format!("#{}", t),
        (None, None) => String::new(),
    }
}

/// `#tag`
pub fn tag_query(tag: &str) -> String {
    format_tag(normalize_tag(tag))
}

/// `#a OR #b OR #c`
pub fn any_tag_query<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| tag_query(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Error type for query parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("empty query")]
    Empty,
    #[error("unexpected `{token}` at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },
    #[error("unterminated folder string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("unexpected end of query")]
    UnexpectedEnd,
}

/// A parsed source expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Folder(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Does a note with this path and these (canonical) tags match?
    ///
    /// `#tag` also matches nested tags (`#tag/child`).
    pub fn matches<S: AsRef<str>>(&self, path: &str, tags: &[S]) -> bool {
        match self {
            Expr::Tag(tag) => tags.iter().any(|t| {
                let t = normalize_tag(t.as_ref());
                t == tag
                    || t.strip_prefix(tag.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }),
            Expr::Folder(folder) => {
                folder.is_empty()
                    || path == folder
                    || path
                        .strip_prefix(folder.as_str())
                        .is_some_and(|rest| rest.starts_with('/') || rest == ".md")
            }
            Expr::Not(inner) => !inner.matches(path, tags),
            Expr::And(a, b) => a.matches(path, tags) && b.matches(path, tags),
            Expr::Or(a, b) => a.matches(path, tags) || b.matches(path, tags),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Folder(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

fn tokenize(query: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = query.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::Open, offset));
                i += 1;
            }
            ')' => {
                tokens.push((Token::Close, offset));
                i += 1;
            }
            '-' | '!' => {
                tokens.push((Token::Not, offset));
                i += 1;
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != '"' {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(QueryError::UnterminatedString(offset));
                }
                let folder: String = chars[start..end].iter().map(|(_, c)| c).collect();
                tokens.push((Token::Folder(folder.trim_matches('/').to_string()), offset));
                i = end + 1;
            }
            '#' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && !chars[end].1.is_whitespace()
                    && chars[end].1 != '('
                    && chars[end].1 != ')'
                {
                    end += 1;
                }
                if end == start {
                    return Err(QueryError::UnexpectedToken {
                        token: "#".into(),
                        offset,
                    });
                }
                let tag: String = chars[start..end].iter().map(|(_, c)| c).collect();
                tokens.push((Token::Tag(tag), offset));
                i = end;
            }
            _ => {
                let start = i;
                let mut end = start;
                while end < chars.len() && chars[end].1.is_alphanumeric() {
                    end += 1;
                }
                let word: String = chars[start..end.max(start + 1)]
                    .iter()
                    .map(|(_, c)| c)
                    .collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push((Token::And, offset)),
                    "or" => tokens.push((Token::Or, offset)),
                    _ => {
                        return Err(QueryError::UnexpectedToken {
                            token: word,
                            offset,
                        });
                    }
                }
                i = end;
            }
        }
    }
    Ok(tokens)
}

/// Parse a source expression.
pub fn parse_query(query: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((token, offset)) => Err(QueryError::UnexpectedToken {
            token: token_text(token),
            offset: *offset,
        }),
    }
}

fn token_text(token: &Token) -> String {
    match token {
        Token::Tag(t) => format!("#{}", t),
        Token::Folder(f) => format!("\"{}\"", f),
        Token::And => "and".into(),
        Token::Or => "or".into(),
        Token::Not => "-".into(),
        Token::Open => "(".into(),
        Token::Close => ")".into(),
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, QueryError> {
        let Some((token, offset)) = self.tokens.get(self.pos).cloned() else {
            return Err(QueryError::UnexpectedEnd);
        };
        self.pos += 1;
        match token {
            Token::Tag(t) => Ok(Expr::Tag(t)),
            Token::Folder(f) => Ok(Expr::Folder(f)),
            Token::Open => {
                let inner = self.or_expr()?;
                match self.tokens.get(self.pos) {
                    Some((Token::Close, _)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some((other, offset)) => Err(QueryError::UnexpectedToken {
                        token: token_text(other),
                        offset: *offset,
                    }),
                    None => Err(QueryError::UnexpectedEnd),
                }
            }
            other => Err(QueryError::UnexpectedToken {
                token: token_text(&other),
                offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compose_both() {
        assert_eq!(
            compose_query(Some("\"Projects\""), Some("todo")),
            "\"Projects\" and #todo"
        );
    }

    #[test]
    fn compose_filter_only_is_unchanged() {
        assert_eq!(compose_query(Some("#work or #home"), None), "#work or #home");
    }

    #[test]
    fn compose_tag_only() {
        assert_eq!(compose_query(None, Some("doing")), "#doing");
        assert_eq!(compose_query(None, Some("#doing")), "#doing");
    }

    #[test]
    fn compose_neither_is_empty() {
        assert_eq!(compose_query(None, None), "");
        assert_eq!(compose_query(Some("  "), Some("")), "");
    }

    #[test]
    fn any_tag_query_joins_with_or() {
        assert_eq!(any_tag_query(&["todo", "#doing"]), "#todo OR #doing");
        assert_eq!(any_tag_query::<&str>(&[]), "");
    }

    #[test]
    fn parse_precedence_and_binds_tighter() {
        let expr = parse_query("#a or #b and #c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(Expr::Tag("a".into())),
                Box::new(Expr::And(
                    Box::new(Expr::Tag("b".into())),
                    Box::new(Expr::Tag("c".into()))
                ))
            )
        );
    }

    #[test]
    fn parse_groups_negation_and_folders() {
        let expr = parse_query("(\"Projects/\" OR #work) AND -#archived").unwrap();
        let tags = ["work"];
        assert!(expr.matches("Inbox/a.md", &tags));
        assert!(expr.matches("Projects/b.md", &["x"]));
        assert!(!expr.matches("Projects/b.md", &["archived"]));
        assert!(!expr.matches("Inbox/c.md", &["home"]));
    }

    #[test]
    fn tag_atom_matches_nested_tags() {
        let expr = parse_query("#area").unwrap();
        assert!(expr.matches("x.md", &["area"]));
        assert!(expr.matches("x.md", &["area/home"]));
        assert!(!expr.matches("x.md", &["areas"]));
    }

    #[test]
    fn folder_atom_matches_prefix_only_at_boundary() {
        let expr = parse_query("\"notes\"").unwrap();
        assert!(expr.matches("notes/a.md", &[] as &[&str]));
        assert!(!expr.matches("notes-old/a.md", &[] as &[&str]));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_query("   "), Err(QueryError::Empty));
        assert_eq!(parse_query("#a and"), Err(QueryError::UnexpectedEnd));
        assert!(matches!(
            parse_query("#a xor #b"),
            Err(QueryError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_query("\"open"),
            Err(QueryError::UnterminatedString(0))
        ));
        assert!(matches!(
            parse_query("(#a"),
            Err(QueryError::UnexpectedEnd)
        ));
        assert!(matches!(
            parse_query("#a)"),
            Err(QueryError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn composed_queries_parse() {
        let q = compose_query(Some("#work or #home"), Some("todo"));
        let expr = parse_query(&q).unwrap();
        assert!(expr.matches("a.md", &["home", "todo"]));
        assert!(!expr.matches("a.md", &["home"]));
        // `and` binds tighter: work alone still matches
        assert!(expr.matches("a.md", &["work"]));
    }
}
