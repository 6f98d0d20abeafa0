//! The dialect seam.
//!
//! Everything dialect-specific — identifier quoting, feature support,
//! catalog validation, DDL rendering, introspection queries, connection
//! management — lives behind [`Provider`]. The differ, resolver, planner,
//! and executor are dialect-neutral above this trait.

use crate::catalog::Catalog;
use crate::diff::edit::Edit;
use crate::error::{DbErrorInfo, Error, Result};
use crate::normalize;

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresProvider;
pub use sqlite::SqliteProvider;

/// Target dialect.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Guess the dialect from a connection URL. `postgres://` and
    /// `postgresql://` are PostgreSQL; `sqlite://`, `:memory:`, and bare
    /// paths ending in `.db`/`.sqlite`/`.sqlite3` are SQLite.
    pub fn from_url(url: &str) -> Option<Dialect> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if url.starts_with("sqlite://")
            || url == ":memory:"
            || url.ends_with(".db")
            || url.ends_with(".sqlite")
            || url.ends_with(".sqlite3")
        {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }

    pub fn provider(&self) -> Box<dyn Provider> {
        match self {
            Dialect::Postgres => Box::new(PostgresProvider),
            Dialect::Sqlite => Box::new(SqliteProvider),
        }
    }
}

/// Per-provider feature flags. Declared objects of an unsupported kind
/// produce validation errors; some features demote instead (SQLite drops
/// columns via table rebuild rather than refusing).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Schemas,
    Extensions,
    Enums,
    Sequences,
    StoredFunctions,
    StoredProcedures,
    Triggers,
    MaterializedViews,
    ConcurrentIndexes,
    AdvisoryLocks,
    AlterColumnType,
    AlterDropColumn,
}

/// One value out of a driver row, reduced to the shapes catalog queries
/// actually produce.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SqlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Text(s) => s.parse().ok(),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Null => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Int(i) => Some(*i != 0),
            SqlValue::Text(s) => match s.as_str() {
                "t" | "true" | "yes" | "1" | "YES" => Some(true),
                "f" | "false" | "no" | "0" | "NO" => Some(false),
                _ => None,
            },
            SqlValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

pub type Row = Vec<SqlValue>;

/// The thin wire adapter around a database driver. Catalog queries embed
/// their arguments as SQL literals (the introspector quotes them), so the
/// surface is just text in, rows out.
pub trait DbClient {
    fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DbErrorInfo>;
    fn execute(&mut self, sql: &str) -> std::result::Result<u64, DbErrorInfo>;
    fn close(self: Box<Self>) -> std::result::Result<(), DbErrorInfo>;
}

/// Dialect-specific backend.
pub trait Provider {
    fn dialect(&self) -> Dialect;

    fn supports(&self, feature: Feature) -> bool;

    /// Quote an identifier for this dialect. Both shipped dialects accept
    /// double-quoted identifiers, so the shared rule is the default.
    fn quote_ident(&self, ident: &str) -> String {
        normalize::quote_ident(ident)
    }

    /// Check a desired catalog against this provider's rules. Returns
    /// every violation (all [`Error::Validation`] values), not just the
    /// first, so the user can fix their schema in one pass.
    fn validate_catalog(&self, catalog: &Catalog) -> Vec<Error>;

    /// Render one edit into zero or more SQL statements. `desired` supplies
    /// context some renderings need (e.g. the full table shape for
    /// SQLite's rebuild-based column drop).
    fn render_edit(&self, edit: &Edit, desired: &Catalog) -> Result<Vec<String>>;

    /// Open a client for the given connection URL.
    fn connect(&self, url: &str) -> Result<Box<dyn DbClient>>;

    /// Introspect the live catalog restricted to `schemas`.
    fn introspect(&self, client: &mut dyn DbClient, schemas: &[String]) -> Result<Catalog>;

    /// Try to take the advisory lock; `false` means currently held
    /// elsewhere. Only called when [`Feature::AdvisoryLocks`] is
    /// supported.
    fn try_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<bool>;

    fn release_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<()>;
}
