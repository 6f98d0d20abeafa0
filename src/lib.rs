//! schema-sync: declarative schema reconciliation for PostgreSQL and
//! SQLite.
//!
//! The user writes the desired schema as CREATE statements; the tool
//! parses it into a canonical catalog, introspects the live database into
//! the same shape, computes the minimal DDL to converge, and applies it
//! with transaction discipline. There is no migration history — the live
//! catalog is the only state.

pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod exec;
pub mod input;
pub mod introspect;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod plan;
pub mod provider;
pub mod resolve;

// Re-export the types a typical embedding touches.
pub use catalog::{assemble::assemble, Catalog};
pub use config::Config;
pub use error::{Error, Result};
pub use exec::{apply, ApplyOutcome, ConfirmPrompt, ExecuteOptions, LockOptions, NoPrompt};
pub use parser::parse_sql;
pub use plan::{build_plan, MigrationPlan};
pub use provider::{Dialect, Provider};
