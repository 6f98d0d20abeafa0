//! Catalog assembly — turns parsed declarations into a [`Catalog`].
//!
//! Declarations may arrive in any order; assembly does two passes so that
//! forward references (an index before its table, a comment before the
//! commented object) resolve. Assembly is also where the desired state is
//! checked for duplicate definitions and for objects outside the managed
//! schema set.

use std::collections::BTreeSet;

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::parser::ir::{CommentDecl, Decl, Located};

/// Assemble a catalog from parsed declarations.
///
/// `managed_schemas` is the allow-list from the caller (`--schemas`); its
/// first entry doubles as the default schema for unqualified names.
pub fn assemble(decls: Vec<Located<Decl>>, managed_schemas: &[String]) -> Result<Catalog> {
    let default_schema = managed_schemas
        .first()
        .map(|s| s.as_str())
        .unwrap_or("public");
    let managed: BTreeSet<&str> = managed_schemas.iter().map(|s| s.as_str()).collect();

    let mut catalog = Catalog::empty();
    // Relation namespace: tables, views, and sequences share it.
    let mut relations: BTreeSet<String> = BTreeSet::new();
    let mut index_names: BTreeSet<String> = BTreeSet::new();
    let mut indexes: Vec<Index> = Vec::new();
    let mut triggers: Vec<Trigger> = Vec::new();
    let mut comments: Vec<CommentDecl> = Vec::new();

    let check_managed = |name: &ObjectName, kind: &'static str| -> Result<()> {
        let schema = name.schema.as_deref().unwrap_or(default_schema);
        if managed.contains(schema) || (managed.is_empty() && schema == default_schema) {
            Ok(())
        } else {
            Err(Error::SchemaNotManaged {
                kind,
                name: name.name.clone(),
                schema: schema.to_string(),
            })
        }
    };

    // First pass: containers (schemas, extensions, types, sequences,
    // tables, views, functions). Indexes, triggers, and comments are
    // buffered so they can reference objects declared later.
    for located in decls {
        match located.node {
            Decl::Schema(name) => {
                if !managed.contains(name.as_str()) {
                    return Err(Error::SchemaNotManaged {
                        kind: "schema",
                        name: name.clone(),
                        schema: name,
                    });
                }
                catalog.insert_schema(name);
            }
            Decl::Extension(ext) => {
                if catalog.get_extension(&ext.name).is_some() {
                    return Err(Error::DuplicateObject {
                        kind: "extension",
                        name: ext.name,
                    });
                }
                catalog.insert_extension(ext);
            }
            Decl::Enum(mut e) => {
                e.name.set_default_schema(default_schema);
                check_managed(&e.name, "enum type")?;
                catalog.insert_schema(e.name.schema.clone().unwrap_or_default());
                if catalog.insert_enum(e.clone()).is_some() {
                    return Err(Error::DuplicateObject {
                        kind: "enum type",
                        name: e.name.key(),
                    });
                }
            }
            Decl::Sequence(mut s) => {
                s.name.set_default_schema(default_schema);
                check_managed(&s.name, "sequence")?;
                catalog.insert_schema(s.name.schema.clone().unwrap_or_default());
                if !relations.insert(s.name.key()) {
                    return Err(Error::DuplicateObject {
                        kind: "sequence",
                        name: s.name.key(),
                    });
                }
                catalog.insert_sequence(s);
            }
            Decl::Table(mut t) => {
                t.name.set_default_schema(default_schema);
                check_managed(&t.name, "table")?;
                catalog.insert_schema(t.name.schema.clone().unwrap_or_default());
                for fk in &mut t.foreign_keys {
                    fk.ref_table.set_default_schema(default_schema);
                }
                check_duplicate_columns(&t)?;
                if !relations.insert(t.name.key()) {
                    return Err(Error::DuplicateObject {
                        kind: "table",
                        name: t.name.key(),
                    });
                }
                catalog.insert_table(t);
            }
            Decl::View(mut v) => {
                v.name.set_default_schema(default_schema);
                check_managed(&v.name, "view")?;
                catalog.insert_schema(v.name.schema.clone().unwrap_or_default());
                if !relations.insert(v.name.key()) {
                    return Err(Error::DuplicateObject {
                        kind: "view",
                        name: v.name.key(),
                    });
                }
                catalog.insert_view(v);
            }
            Decl::Function(mut f) => {
                f.name.set_default_schema(default_schema);
                check_managed(&f.name, "function")?;
                catalog.insert_schema(f.name.schema.clone().unwrap_or_default());
                let signature = f.signature();
                if catalog.insert_function(f).is_some() {
                    return Err(Error::DuplicateObject {
                        kind: "function",
                        name: signature,
                    });
                }
            }
            Decl::Index(mut idx) => {
                idx.table.set_default_schema(default_schema);
                check_managed(&idx.table, "index")?;
                indexes.push(idx);
            }
            Decl::Trigger(mut t) => {
                t.table.set_default_schema(default_schema);
                t.function.set_default_schema(default_schema);
                check_managed(&t.table, "trigger")?;
                triggers.push(t);
            }
            Decl::Comment(c) => comments.push(c),
        }
    }

    // Second pass: attach indexes to their tables.
    for idx in indexes {
        let schema = idx.table.schema.clone().unwrap_or_default();
        let index_key = format!("{}.{}", schema, idx.name);
        if !index_names.insert(index_key) {
            return Err(Error::DuplicateObject {
                kind: "index",
                name: idx.name,
            });
        }
        let table_key = idx.table.key();
        let Some(table) = catalog.get_table_mut(&table_key) else {
            return Err(Error::validation(
                "unknown_table",
                format!("index {} references unknown table {}", idx.name, table_key),
                "declare the table in the same schema file",
            ));
        };
        validate_index_columns(table, &idx)?;
        table.indexes.push(idx);
    }

    // Triggers: the table must exist; the function may live outside the
    // managed set (extension-provided trigger functions are common).
    for trigger in triggers {
        if !catalog.has_table(&trigger.table.key()) {
            return Err(Error::validation(
                "unknown_table",
                format!(
                    "trigger {} references unknown table {}",
                    trigger.name,
                    trigger.table.key()
                ),
                "declare the table in the same schema file",
            ));
        }
        let key = trigger.key();
        if catalog.insert_trigger(trigger).is_some() {
            return Err(Error::DuplicateObject {
                kind: "trigger",
                name: key,
            });
        }
    }

    // Comments last, so every target can be resolved.
    for comment in comments {
        let key = resolve_comment_key(&catalog, &comment, default_schema)?;
        if let Some(text) = comment.text {
            catalog.insert_comment(key, text);
        }
        // COMMENT ... IS NULL in desired state is equivalent to absence.
    }

    Ok(catalog)
}

fn check_duplicate_columns(table: &Table) -> Result<()> {
    let mut seen = BTreeSet::new();
    for col in &table.columns {
        if !seen.insert(col.name.as_str()) {
            return Err(Error::DuplicateObject {
                kind: "column",
                name: format!("{}.{}", table.name.key(), col.name),
            });
        }
    }
    Ok(())
}

/// Invariant: every plain-column index entry names a column of the table.
fn validate_index_columns(table: &Table, idx: &Index) -> Result<()> {
    for entry in &idx.columns {
        if let Some(col) = entry.expr.column_name()
            && table.get_column(col).is_none()
        {
            return Err(Error::validation(
                "unknown_column",
                format!(
                    "index {} references unknown column {}.{}",
                    idx.name,
                    table.name.key(),
                    col
                ),
                "add the column to the table definition",
            ));
        }
    }
    Ok(())
}

/// Resolve a parsed COMMENT path into a canonical [`CommentKey`], checking
/// that the target exists in the assembled catalog.
fn resolve_comment_key(
    catalog: &Catalog,
    comment: &CommentDecl,
    default_schema: &str,
) -> Result<CommentKey> {
    let qualify = |parts: &[String]| -> ObjectName {
        match parts {
            [name] => ObjectName::qualified(default_schema, name.clone()),
            [schema, name, ..] => ObjectName::qualified(schema.clone(), name.clone()),
            _ => ObjectName::unqualified("unknown"),
        }
    };

    let missing = |what: String| {
        Error::validation(
            "unknown_comment_target",
            format!("COMMENT ON {} targets unknown object {}", comment.kind, what),
            "declare the object before commenting on it",
        )
    };

    match comment.kind {
        CommentKind::Schema => {
            let name = comment.path.last().cloned().unwrap_or_default();
            Ok(CommentKey::new(CommentKind::Schema, name))
        }
        CommentKind::Extension => {
            let name = comment.path.last().cloned().unwrap_or_default();
            if catalog.get_extension(&name).is_none() {
                return Err(missing(name));
            }
            Ok(CommentKey::new(CommentKind::Extension, name))
        }
        CommentKind::Type => {
            let name = qualify(&comment.path);
            if catalog.get_enum(&name.key()).is_none() {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(CommentKind::Type, name.key()))
        }
        CommentKind::Sequence => {
            let name = qualify(&comment.path);
            if catalog.get_sequence(&name.key()).is_none() {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(CommentKind::Sequence, name.key()))
        }
        CommentKind::Table => {
            let name = qualify(&comment.path);
            if !catalog.has_table(&name.key()) {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(CommentKind::Table, name.key()))
        }
        CommentKind::Column => {
            // Path is [table, column] or [schema, table, column].
            let (table_name, column) = match comment.path.as_slice() {
                [table, column] => (
                    ObjectName::qualified(default_schema, table.clone()),
                    column.clone(),
                ),
                [schema, table, column] => (
                    ObjectName::qualified(schema.clone(), table.clone()),
                    column.clone(),
                ),
                _ => return Err(missing(comment.path.join("."))),
            };
            let Some(table) = catalog.get_table(&table_name.key()) else {
                return Err(missing(table_name.key()));
            };
            if table.get_column(&column).is_none() {
                return Err(missing(format!("{}.{}", table_name.key(), column)));
            }
            Ok(CommentKey::new(
                CommentKind::Column,
                format!("{}.{}", table_name.key(), column),
            ))
        }
        CommentKind::Index => {
            let name = qualify(&comment.path);
            let found = catalog
                .tables()
                .flat_map(|t| t.indexes.iter())
                .any(|i| i.name == name.name);
            if !found {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(CommentKind::Index, name.key()))
        }
        CommentKind::View | CommentKind::MaterializedView => {
            let name = qualify(&comment.path);
            if catalog.get_view(&name.key()).is_none() {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(comment.kind, name.key()))
        }
        CommentKind::Function => {
            let name = qualify(&comment.path);
            let found = catalog.functions().any(|f| f.name == name);
            if !found {
                return Err(missing(name.key()));
            }
            Ok(CommentKey::new(CommentKind::Function, name.key()))
        }
        CommentKind::Trigger => {
            // Path is [table..., trigger]; the trigger name comes last.
            let (trigger, table_parts) = match comment.path.split_last() {
                Some((t, rest)) if !rest.is_empty() => (t.clone(), rest.to_vec()),
                _ => return Err(missing(comment.path.join("."))),
            };
            let table = qualify(&table_parts);
            let key = format!("{}.{}", table.key(), trigger);
            if catalog.get_trigger(&key).is_none() {
                return Err(missing(key));
            }
            Ok(CommentKey::new(CommentKind::Trigger, key))
        }
    }
}
