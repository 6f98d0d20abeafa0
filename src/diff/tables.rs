//! Table, column, constraint, and index reconciliation.

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::diff::edit::{Edit, TableAction};
use crate::diff::DiffResult;
use crate::provider::{Feature, Provider};
use crate::resolve::TableGraphOrder;

pub(super) fn diff_tables(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    create_resolution: &TableGraphOrder,
    drop_resolution: &TableGraphOrder,
    out: &mut DiffResult,
) {
    // New tables, with cycle-participating FKs withheld and re-added as
    // deferred edits.
    for table in desired.tables() {
        let key = table.name.key();
        if current.has_table(&key) {
            continue;
        }
        let mut skipped_fks = Vec::new();
        for fk in &table.foreign_keys {
            if create_resolution.is_deferred(&key, &fk.name) {
                skipped_fks.push(fk.name.clone());
                out.edits.push(Edit::AddForeignKey {
                    table: table.name.clone(),
                    fk: fk.clone(),
                });
            }
        }
        out.edits.push(Edit::CreateTable {
            table: table.clone(),
            skipped_fks,
        });
        for index in &table.indexes {
            out.edits.push(Edit::CreateIndex {
                index: index.clone(),
                concurrently: false,
            });
        }
    }

    // Removed tables. Cycle edges among them are dropped up front so the
    // DROP TABLE order cannot matter.
    for table in current.tables() {
        let key = table.name.key();
        if desired.has_table(&key) {
            continue;
        }
        for fk in &table.foreign_keys {
            if drop_resolution.is_deferred(&key, &fk.name) {
                out.edits.push(Edit::DropForeignKey {
                    table: table.name.clone(),
                    name: fk.name.clone(),
                });
            }
        }
        out.edits.push(Edit::DropTable {
            name: table.name.clone(),
        });
        // Indexes and triggers vanish with the table; no separate drops.
    }

    // Existing tables: column-level and constraint-level sub-edits batched
    // into one ALTER TABLE per table.
    for table in desired.tables() {
        let key = table.name.key();
        let Some(existing) = current.get_table(&key) else {
            continue;
        };
        diff_existing_table(table, existing, provider, create_resolution, out);
        diff_indexes(table, existing, provider, out);
    }
}

fn diff_existing_table(
    desired: &Table,
    current: &Table,
    provider: &dyn Provider,
    create_resolution: &TableGraphOrder,
    out: &mut DiffResult,
) {
    let mut actions = Vec::new();

    diff_columns(desired, current, provider, &mut actions, out);
    diff_primary_key(desired, current, &mut actions);
    diff_uniques(desired, current, &mut actions);
    diff_checks(desired, current, &mut actions);
    diff_foreign_keys(desired, current, create_resolution, &mut actions, out);

    if !actions.is_empty() {
        // Deterministic clause order within the batched ALTER.
        actions.sort_by(|a, b| action_rank(a).cmp(&action_rank(b)).then_with(|| {
            a.target().cmp(b.target())
        }));
        out.edits.push(Edit::AlterTable {
            name: desired.name.clone(),
            actions,
        });
    }
}

/// Clause ordering inside one ALTER TABLE: drops first (so a re-added
/// constraint with the same name never collides), then column changes,
/// then constraint adds.
fn action_rank(action: &TableAction) -> u8 {
    match action {
        TableAction::DropConstraint { .. } => 0,
        TableAction::DropColumn { .. } => 1,
        TableAction::AddColumn(_) => 2,
        TableAction::AlterColumnType { .. } => 3,
        TableAction::SetNotNull { .. } | TableAction::DropNotNull { .. } => 4,
        TableAction::SetDefault { .. } | TableAction::DropDefault { .. } => 5,
        TableAction::AddPrimaryKey(_) => 6,
        TableAction::AddUnique(_) => 7,
        TableAction::AddCheck(_) => 8,
        TableAction::AddForeignKey(_) => 9,
    }
}

fn diff_columns(
    desired: &Table,
    current: &Table,
    provider: &dyn Provider,
    actions: &mut Vec<TableAction>,
    out: &mut DiffResult,
) {
    for col in &desired.columns {
        match current.get_column(&col.name) {
            None => actions.push(TableAction::AddColumn(col.clone())),
            Some(existing) => diff_column(desired, col, existing, actions, out),
        }
    }

    for col in &current.columns {
        if desired.get_column(&col.name).is_none() {
            if provider.supports(Feature::AlterDropColumn) {
                actions.push(TableAction::DropColumn {
                    name: col.name.clone(),
                });
            } else {
                out.warn(format!(
                    "column {}.{} cannot be dropped on this backend; leaving it in place",
                    desired.name.key(),
                    col.name
                ));
            }
        }
    }
}

fn diff_column(
    table: &Table,
    desired: &Column,
    current: &Column,
    actions: &mut Vec<TableAction>,
    out: &mut DiffResult,
) {
    // Serial transitions cannot be expressed as a column alteration (the
    // backing sequence has to be created or re-owned); warn and leave the
    // column alone except for changes the marker does not cover.
    if desired.serial != current.serial {
        out.warn(format!(
            "column {}.{}: serial/identity markers differ between schema and \
             database; converting requires recreating the column",
            table.name.key(),
            desired.name
        ));
        return;
    }

    // Type change. The canonical default comparison below is independent:
    // when only the type changes and the default is unchanged, exactly one
    // ALTER COLUMN TYPE clause is emitted and the default is not touched.
    if desired.type_name != current.type_name {
        let using = if desired.type_name.family() == current.type_name.family() {
            None
        } else {
            out.warn(format!(
                "column {}.{}: cast from {} to {} crosses type families; \
                 using an explicit USING cast, verify the data converts",
                table.name.key(),
                desired.name,
                current.type_name,
                desired.type_name
            ));
            Some(format!(
                "{}::{}",
                crate::normalize::quote_ident(&desired.name),
                desired.type_name
            ))
        };
        actions.push(TableAction::AlterColumnType {
            name: desired.name.clone(),
            type_name: desired.type_name.clone(),
            using,
        });
    }

    if desired.nullable != current.nullable {
        if desired.nullable {
            actions.push(TableAction::DropNotNull {
                name: desired.name.clone(),
            });
        } else {
            actions.push(TableAction::SetNotNull {
                name: desired.name.clone(),
            });
        }
    }

    if desired.default != current.default {
        match &desired.default {
            Some(expr) => actions.push(TableAction::SetDefault {
                name: desired.name.clone(),
                expr: expr.clone(),
            }),
            None => actions.push(TableAction::DropDefault {
                name: desired.name.clone(),
            }),
        }
    }
}

fn diff_primary_key(desired: &Table, current: &Table, actions: &mut Vec<TableAction>) {
    match (&desired.primary_key, &current.primary_key) {
        (Some(d), Some(c)) if d == c => {}
        (Some(d), Some(c)) => {
            actions.push(TableAction::DropConstraint { name: c.name.clone() });
            actions.push(TableAction::AddPrimaryKey(d.clone()));
        }
        (Some(d), None) => actions.push(TableAction::AddPrimaryKey(d.clone())),
        (None, Some(c)) => actions.push(TableAction::DropConstraint { name: c.name.clone() }),
        (None, None) => {}
    }
}

fn diff_uniques(desired: &Table, current: &Table, actions: &mut Vec<TableAction>) {
    for u in &desired.uniques {
        match current.uniques.iter().find(|c| c.name == u.name) {
            Some(existing) if existing.columns == u.columns => {}
            Some(existing) => {
                actions.push(TableAction::DropConstraint {
                    name: existing.name.clone(),
                });
                actions.push(TableAction::AddUnique(u.clone()));
            }
            None => actions.push(TableAction::AddUnique(u.clone())),
        }
    }
    for u in &current.uniques {
        if !desired.uniques.iter().any(|d| d.name == u.name) {
            actions.push(TableAction::DropConstraint { name: u.name.clone() });
        }
    }
}

fn diff_checks(desired: &Table, current: &Table, actions: &mut Vec<TableAction>) {
    for c in &desired.checks {
        match current.checks.iter().find(|x| x.name == c.name) {
            Some(existing) if existing.expression == c.expression => {}
            Some(existing) => {
                actions.push(TableAction::DropConstraint {
                    name: existing.name.clone(),
                });
                actions.push(TableAction::AddCheck(c.clone()));
            }
            None => actions.push(TableAction::AddCheck(c.clone())),
        }
    }
    for c in &current.checks {
        if !desired.checks.iter().any(|d| d.name == c.name) {
            actions.push(TableAction::DropConstraint { name: c.name.clone() });
        }
    }
}

fn diff_foreign_keys(
    desired: &Table,
    current: &Table,
    create_resolution: &TableGraphOrder,
    actions: &mut Vec<TableAction>,
    out: &mut DiffResult,
) {
    let table_key = desired.name.key();
    for fk in &desired.foreign_keys {
        let add = |actions: &mut Vec<TableAction>, out: &mut DiffResult| {
            if create_resolution.is_deferred(&table_key, &fk.name) {
                out.edits.push(Edit::AddForeignKey {
                    table: desired.name.clone(),
                    fk: fk.clone(),
                });
            } else {
                actions.push(TableAction::AddForeignKey(fk.clone()));
            }
        };
        match current.get_foreign_key(&fk.name) {
            Some(existing) if existing.same_definition(fk) => {}
            Some(existing) => {
                actions.push(TableAction::DropConstraint {
                    name: existing.name.clone(),
                });
                add(actions, out);
            }
            None => add(actions, out),
        }
    }
    for fk in &current.foreign_keys {
        if desired.get_foreign_key(&fk.name).is_none() {
            actions.push(TableAction::DropConstraint { name: fk.name.clone() });
        }
    }
}

/// Index reconciliation for a table that exists on both sides. New and
/// replacement indexes go concurrent when the backend supports it, since
/// the table may be live.
fn diff_indexes(desired: &Table, current: &Table, provider: &dyn Provider, out: &mut DiffResult) {
    let concurrently = provider.supports(Feature::ConcurrentIndexes);

    for idx in &desired.indexes {
        match current.indexes.iter().find(|c| c.name == idx.name) {
            Some(existing) if existing.same_definition(idx) => {}
            Some(_) => {
                out.edits.push(Edit::DropIndex {
                    name: ObjectName {
                        schema: desired.name.schema.clone(),
                        name: idx.name.clone(),
                    },
                });
                out.edits.push(Edit::CreateIndex {
                    index: idx.clone(),
                    concurrently,
                });
            }
            None => out.edits.push(Edit::CreateIndex {
                index: idx.clone(),
                concurrently,
            }),
        }
    }

    for idx in &current.indexes {
        if idx.origin == IndexOrigin::ConstraintBacking {
            continue;
        }
        if !desired.indexes.iter().any(|d| d.name == idx.name) {
            out.edits.push(Edit::DropIndex {
                name: ObjectName {
                    schema: current.name.schema.clone(),
                    name: idx.name.clone(),
                },
            });
        }
    }
}
