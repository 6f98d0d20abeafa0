//! Declaration IR for desired-state SQL.
//!
//! Each supported statement lowers to one [`Decl`] carrying catalog-shaped
//! data. The IR keeps schema qualification optional and statement order
//! intact; catalog assembly resolves forward references, default schemas,
//! and duplicate definitions.

use crate::catalog::types::{
    EnumType, Extension, Function, Index, Sequence, Table, Trigger, View,
};
use crate::catalog::CommentKind;

/// One parsed declaration from the desired schema text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Schema(String),
    Extension(Extension),
    Enum(EnumType),
    Sequence(Sequence),
    Table(Table),
    /// Standalone `CREATE INDEX`; inline constraint indexes never appear
    /// here.
    Index(Index),
    View(View),
    Function(Function),
    Trigger(Trigger),
    Comment(CommentDecl),
}

impl Decl {
    /// Human-readable object kind, used in duplicate/unmanaged errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Decl::Schema(_) => "schema",
            Decl::Extension(_) => "extension",
            Decl::Enum(_) => "enum type",
            Decl::Sequence(_) => "sequence",
            Decl::Table(_) => "table",
            Decl::Index(_) => "index",
            Decl::View(_) => "view",
            Decl::Function(_) => "function",
            Decl::Trigger(_) => "trigger",
            Decl::Comment(_) => "comment",
        }
    }
}

/// `COMMENT ON <kind> <dotted.path> IS <text | NULL>`.
///
/// The path is kept raw (possibly unqualified); assembly resolves it
/// against the default schema once table/column context is known.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentDecl {
    pub kind: CommentKind,
    pub path: Vec<String>,
    /// `None` means `IS NULL` — remove the comment.
    pub text: Option<String>,
}

/// A parsed declaration with its source location.
#[derive(Debug, Clone)]
pub struct Located<T> {
    pub node: T,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpan {
    pub start_line: usize,   // 1-based
    pub end_line: usize,     // 1-based, inclusive
    pub start_offset: usize, // byte offset from start of input
    pub end_offset: usize,
}

impl SourceSpan {
    pub fn zero() -> Self {
        Self {
            start_line: 1,
            end_line: 1,
            start_offset: 0,
            end_offset: 0,
        }
    }
}
