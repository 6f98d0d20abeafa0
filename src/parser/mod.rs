//! Desired-state SQL parsing.

pub mod ir;
pub(crate) mod pg_query;

pub use ir::{CommentDecl, Decl, Located, SourceSpan};
pub use pg_query::parse_sql;
pub(crate) use pg_query::reparse_select;
