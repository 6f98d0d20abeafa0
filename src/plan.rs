//! Migration plan assembly.
//!
//! Takes the differ's unordered edits, orders them into the fixed phase
//! sequence (with table creates/drops in resolver order), renders each
//! edit through the provider, and partitions the statements into the three
//! execution buckets: `transactional`, `deferred`, and `concurrent`.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::diff::{self, Edit, Phase};
use crate::error::{Error, Result};
use crate::provider::Provider;

/// An ordered, rendered migration plan.
///
/// `transactional` and `deferred` run inside one transaction (deferred
/// after transactional, so cyclic-FK additions follow their tables);
/// `concurrent` runs outside any transaction, sequentially, after commit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationPlan {
    pub transactional: Vec<String>,
    pub deferred: Vec<String>,
    pub concurrent: Vec<String>,
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    pub fn has_changes(&self) -> bool {
        !self.transactional.is_empty()
            || !self.deferred.is_empty()
            || !self.concurrent.is_empty()
    }

    pub fn statement_count(&self) -> usize {
        self.transactional.len() + self.deferred.len() + self.concurrent.len()
    }

    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.transactional
            .iter()
            .chain(self.deferred.iter())
            .chain(self.concurrent.iter())
            .map(|s| s.as_str())
    }
}

/// Compute the full plan for making `current` match `desired`.
pub fn build_plan(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
) -> Result<MigrationPlan> {
    let validation_errors = provider.validate_catalog(desired);
    if !validation_errors.is_empty() {
        let combined = validation_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Validation {
            code: "schema_invalid",
            message: combined,
            suggestion: None,
        });
    }

    let mut result = diff::diff(desired, current, provider)?;
    order_edits(&mut result.edits, &result.create_order, &result.drop_order);

    let mut plan = MigrationPlan {
        warnings: result.warnings.clone(),
        ..Default::default()
    };

    for edit in &result.edits {
        let statements = provider.render_edit(edit, desired)?;
        let bucket = bucket_for(edit);
        match bucket {
            Bucket::Transactional => plan.transactional.extend(statements),
            Bucket::Deferred => plan.deferred.extend(statements),
            Bucket::Concurrent => plan.concurrent.extend(statements),
        }
    }

    Ok(plan)
}

enum Bucket {
    Transactional,
    Deferred,
    Concurrent,
}

/// Statements that cannot run in a transaction go to the concurrent tail;
/// cycle-breaking FK additions go to the deferred bucket (same
/// transaction, after every table exists).
fn bucket_for(edit: &Edit) -> Bucket {
    match edit {
        Edit::AddEnumValue { .. } => Bucket::Concurrent,
        Edit::CreateIndex {
            concurrently: true, ..
        } => Bucket::Concurrent,
        Edit::AddForeignKey { .. } => Bucket::Deferred,
        _ => Bucket::Transactional,
    }
}

/// Total deterministic order: phase first, then resolver order for table
/// creates/drops, then drops-before-creates, then canonical name.
fn order_edits(edits: &mut [Edit], create_order: &[String], drop_order: &[String]) {
    let position = |list: &[String], key: &str| -> usize {
        list.iter().position(|k| k == key).unwrap_or(usize::MAX)
    };

    edits.sort_by(|a, b| {
        let pa = a.phase();
        let pb = b.phase();
        if pa != pb {
            return pa.cmp(&pb);
        }
        match pa {
            Phase::TableCreate => {
                position(create_order, &a.sort_name()).cmp(&position(create_order, &b.sort_name()))
            }
            Phase::TableDrop => {
                position(drop_order, &a.sort_name()).cmp(&position(drop_order, &b.sort_name()))
            }
            _ => b
                .is_drop()
                .cmp(&a.is_drop())
                .then_with(|| a.sort_name().cmp(&b.sort_name())),
        }
    });
}
