//! Enum type reconciliation.
//!
//! The only safe in-place change to an enum is appending labels. Removal,
//! reordering, and renaming would silently corrupt or destroy stored
//! values, so anything that is not an ordered-prefix extension fails fast.

use crate::catalog::Catalog;
use crate::diff::edit::Edit;
use crate::diff::DiffResult;
use crate::error::{Error, Result};
use crate::provider::{Feature, Provider};

pub(super) fn diff_enums(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) -> Result<()> {
    if !provider.supports(Feature::Enums) {
        return Ok(());
    }

    for e in desired.enums() {
        let key = e.name.key();
        match current.get_enum(&key) {
            None => out.edits.push(Edit::CreateEnum(e.clone())),
            Some(existing) if existing.values == e.values => {}
            Some(existing) => {
                if e.values.len() > existing.values.len()
                    && e.values[..existing.values.len()] == existing.values[..]
                {
                    // Strict ordered-prefix extension: one ADD VALUE per
                    // appended label, in order. Non-transactional in
                    // PostgreSQL, so these land in the concurrent tail.
                    for value in &e.values[existing.values.len()..] {
                        out.edits.push(Edit::AddEnumValue {
                            name: e.name.clone(),
                            value: value.clone(),
                        });
                    }
                } else {
                    let removed: Vec<&String> = existing
                        .values
                        .iter()
                        .filter(|v| !e.values.contains(v))
                        .collect();
                    let detail = if removed.is_empty() {
                        format!(
                            "values reordered (current: {:?}, desired: {:?})",
                            existing.values, e.values
                        )
                    } else {
                        format!(
                            "value(s) {} removed (current: {:?}, desired: {:?})",
                            removed
                                .iter()
                                .map(|v| format!("'{}'", v))
                                .collect::<Vec<_>>()
                                .join(", "),
                            existing.values,
                            e.values
                        )
                    };
                    return Err(Error::UnsafeChange {
                        object: key,
                        message: format!(
                            "enum types only support appending values; {}. \
                             Create a new type and migrate the column instead",
                            detail
                        ),
                    });
                }
            }
        }
    }

    for e in current.enums() {
        let key = e.name.key();
        if desired.get_enum(&key).is_none() {
            // Removal happens post-table-phase and only when nothing in
            // the desired state still uses the type.
            if desired.enum_in_use(&key) {
                out.warnings.push(format!(
                    "enum type {} was removed from the schema but a column \
                     still uses it; keeping the type",
                    key
                ));
            } else {
                out.edits.push(Edit::DropEnum {
                    name: e.name.clone(),
                });
            }
        }
    }

    Ok(())
}
