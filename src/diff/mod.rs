//! The diff engine: desired Catalog × current Catalog → edits.
//!
//! Pure and deterministic — identical inputs yield identical edit lists,
//! edit for edit. Neither catalog is ever mutated. All dialect questions
//! are answered through the provider's feature flags; rendering happens
//! later, in the provider.

use log::warn;

pub mod edit;
mod enums;
mod objects;
mod tables;

pub use edit::{Edit, Phase, TableAction};

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::provider::{Feature, Provider};
use crate::resolve;

/// Everything the planner needs: the edits plus the table orderings the
/// resolver computed while breaking cycles.
#[derive(Debug, Default)]
pub struct DiffResult {
    pub edits: Vec<Edit>,
    pub warnings: Vec<String>,
    /// Desired-table creation order (parents first).
    pub create_order: Vec<String>,
    /// Current-table deletion order (children first).
    pub drop_order: Vec<String>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.edits.is_empty()
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Compute the unordered edit set that reconciles `current` into `desired`.
pub fn diff(desired: &Catalog, current: &Catalog, provider: &dyn Provider) -> Result<DiffResult> {
    let mut out = DiffResult::default();

    // Resolve the desired FK graph up front; table diffing needs to know
    // which FKs are deferred.
    let create_resolution = resolve::order_tables(desired.tables())?;
    out.create_order = create_resolution.order.clone();

    // Deletion ordering over the tables that are going away.
    let dropped_tables: Vec<&Table> = current
        .tables()
        .filter(|t| !desired.has_table(&t.name.key()))
        .collect();
    let drop_resolution = resolve::order_tables(dropped_tables.iter().copied())?;
    out.drop_order = drop_resolution.order.iter().rev().cloned().collect();

    diff_schemas(desired, current, provider, &mut out);
    diff_extensions(desired, current, provider, &mut out);
    enums::diff_enums(desired, current, provider, &mut out)?;
    diff_sequences(desired, current, provider, &mut out);
    tables::diff_tables(
        desired,
        current,
        provider,
        &create_resolution,
        &drop_resolution,
        &mut out,
    );
    objects::diff_views(desired, current, provider, &mut out);
    objects::diff_functions(desired, current, provider, &mut out);
    objects::diff_triggers(desired, current, provider, &mut out);
    diff_comments(desired, current, &mut out);

    Ok(out)
}

fn diff_schemas(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    if !provider.supports(Feature::Schemas) {
        return;
    }
    for schema in desired.schemas() {
        if !current.has_schema(schema) {
            out.edits.push(Edit::CreateSchema {
                name: schema.to_string(),
            });
        }
    }
    for schema in current.schemas() {
        // `public` is never reconciled away.
        if schema != "public" && !desired.has_schema(schema) {
            out.edits.push(Edit::DropSchema {
                name: schema.to_string(),
            });
        }
    }
}

fn diff_extensions(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    if !provider.supports(Feature::Extensions) {
        return;
    }
    for ext in desired.extensions() {
        if current.get_extension(&ext.name).is_none() {
            out.edits.push(Edit::CreateExtension(ext.clone()));
        }
    }
    for ext in current.extensions() {
        if desired.get_extension(&ext.name).is_none() {
            out.warn(format!(
                "extension {} will be dropped with CASCADE; objects owned by \
                 the extension (and anything depending on them) go with it",
                ext.name
            ));
            out.edits.push(Edit::DropExtension {
                name: ext.name.clone(),
            });
        }
    }
}

fn diff_sequences(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    if !provider.supports(Feature::Sequences) {
        return;
    }
    for seq in desired.sequences() {
        match current.get_sequence(&seq.name.key()) {
            None => out.edits.push(Edit::CreateSequence(seq.clone())),
            Some(existing) if existing != seq => {
                // Every attribute is in-place alterable.
                out.edits.push(Edit::AlterSequence(seq.clone()));
            }
            Some(_) => {}
        }
    }
    for seq in current.sequences() {
        if desired.get_sequence(&seq.name.key()).is_none() {
            out.edits.push(Edit::DropSequence {
                name: seq.name.clone(),
            });
        }
    }
}

fn diff_comments(desired: &Catalog, current: &Catalog, out: &mut DiffResult) {
    for (key, text) in desired.comments() {
        if current.get_comment(key) != Some(text) {
            out.edits.push(Edit::SetComment {
                key: key.clone(),
                text: Some(text.to_string()),
            });
        }
    }
    for (key, _) in current.comments() {
        if desired.get_comment(key).is_none() {
            // If the commented object is itself going away, the comment
            // goes with it; an explicit reset would fail on the missing
            // object.
            if comment_target_in(desired, key) {
                out.edits.push(Edit::SetComment {
                    key: key.clone(),
                    text: None,
                });
            }
        }
    }
}

/// Does the comment's target object exist in this catalog?
fn comment_target_in(catalog: &Catalog, key: &CommentKey) -> bool {
    match key.kind {
        CommentKind::Schema => catalog.has_schema(&key.target),
        CommentKind::Extension => catalog.get_extension(&key.target).is_some(),
        CommentKind::Type => catalog.get_enum(&key.target).is_some(),
        CommentKind::Sequence => catalog.get_sequence(&key.target).is_some(),
        CommentKind::Table => catalog.has_table(&key.target),
        CommentKind::Column => match key.target.rsplit_once('.') {
            Some((table, column)) => catalog
                .get_table(table)
                .is_some_and(|t| t.get_column(column).is_some()),
            None => false,
        },
        CommentKind::Index => catalog
            .tables()
            .flat_map(|t| t.indexes.iter())
            .any(|i| key.target.ends_with(&i.name)),
        CommentKind::View | CommentKind::MaterializedView => {
            catalog.get_view(&key.target).is_some()
        }
        CommentKind::Function => catalog
            .functions()
            .any(|f| f.name.key() == key.target),
        CommentKind::Trigger => catalog.get_trigger(&key.target).is_some(),
    }
}
