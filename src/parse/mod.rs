pub mod frontmatter;
pub mod query;
pub mod tags;

pub use frontmatter::{frontmatter_block, frontmatter_body, parse_frontmatter};
pub use query::{any_tag_query, compose_query, parse_query, tag_query, Expr, QueryError};
pub use tags::{
    dedup_tags, effective_tags, extract_tags_from_content, extract_tags_from_frontmatter,
    format_tag, has_tag, normalize_tag, FrontmatterTags,
};
