//! SQLite introspection.
//!
//! The primary source is `sqlite_master.sql`: SQLite stores each object's
//! original CREATE statement verbatim, and since this tool owns the
//! schema, that text is the renderer's own output and parses cleanly
//! through the desired-state parser — giving byte-identical canonical
//! catalogs on both sides of the diff. Tables created outside the tool
//! (whose SQL the PostgreSQL grammar rejects) fall back to a PRAGMA-based
//! reconstruction: `PRAGMA table_info`, `PRAGMA foreign_key_list`, and
//! `PRAGMA index_list`/`index_info`.

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::introspect::parse_type_text;
use crate::normalize;
use crate::parser::{self, Decl};
use crate::provider::{DbClient, Row};

fn run(client: &mut dyn DbClient, sql: &str) -> Result<Vec<Row>> {
    client.query(sql).map_err(|e| {
        Error::Connection(format!(
            "introspection query failed: {} (query: {})",
            e.message, sql
        ))
    })
}

fn text(row: &Row, i: usize) -> String {
    row.get(i).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

fn opt_text(row: &Row, i: usize) -> Option<String> {
    row.get(i).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn int(row: &Row, i: usize) -> i64 {
    row.get(i).and_then(|v| v.as_i64()).unwrap_or(0)
}

/// The managed-schema list is accepted for interface symmetry; SQLite has
/// a single namespace and every object lands in the default schema.
pub fn introspect(client: &mut dyn DbClient, schemas: &[String]) -> Result<Catalog> {
    let default_schema = schemas.first().map(|s| s.as_str()).unwrap_or("public");
    let mut catalog = Catalog::empty();
    catalog.insert_schema(default_schema);

    let rows = run(
        client,
        "SELECT type, name, tbl_name, sql FROM sqlite_master \
         WHERE name NOT LIKE 'sqlite_%' ORDER BY \
         CASE type WHEN 'table' THEN 0 WHEN 'index' THEN 1 ELSE 2 END, name",
    )?;

    for row in &rows {
        let kind = text(row, 0);
        let name = text(row, 1);
        let sql = match opt_text(row, 3) {
            Some(s) if !s.trim().is_empty() => s,
            // Auto-indexes backing UNIQUE/PK have no SQL; their
            // constraints cover them.
            _ => continue,
        };

        match kind.as_str() {
            "table" => match parse_object(&sql, default_schema) {
                Some(Decl::Table(mut table)) => {
                    table.name.set_default_schema(default_schema);
                    for fk in &mut table.foreign_keys {
                        fk.ref_table.set_default_schema(default_schema);
                    }
                    catalog.insert_table(table);
                }
                _ => {
                    let table = pragma_table(client, &name, default_schema)?;
                    catalog.insert_table(table);
                }
            },
            "index" => {
                if let Some(Decl::Index(mut index)) = parse_object(&sql, default_schema) {
                    index.table.set_default_schema(default_schema);
                    let table_key = index.table.key();
                    if let Some(table) = catalog.get_table_mut(&table_key) {
                        table.indexes.push(index);
                    }
                } else {
                    log::warn!("skipping unmodellable index: {}", name);
                }
            }
            "view" => {
                if let Some(Decl::View(mut view)) = parse_object(&sql, default_schema) {
                    view.name.set_default_schema(default_schema);
                    catalog.insert_view(view);
                } else {
                    log::warn!("skipping unmodellable view: {}", name);
                }
            }
            // Triggers are not managed on SQLite.
            _ => {}
        }
    }

    Ok(catalog)
}

fn parse_object(sql: &str, _default_schema: &str) -> Option<Decl> {
    let decls = parser::parse_sql(sql).ok()?;
    decls.into_iter().next().map(|l| l.node)
}

/// PRAGMA-based fallback for tables whose stored SQL the parser cannot
/// read. Constraint names are synthesized with the PostgreSQL defaults so
/// they line up with an equivalent desired declaration.
fn pragma_table(client: &mut dyn DbClient, name: &str, default_schema: &str) -> Result<Table> {
    let quoted = normalize::quote_ident(name);
    let mut table = Table::new(ObjectName::qualified(default_schema, name));

    let mut pk_columns: Vec<(i64, String)> = Vec::new();
    let rows = run(client, &format!("PRAGMA table_info({})", quoted))?;
    for row in &rows {
        // cid, name, type, notnull, dflt_value, pk
        let col_name = text(row, 1);
        let pk_ordinal = int(row, 5);
        if pk_ordinal > 0 {
            pk_columns.push((pk_ordinal, col_name.clone()));
        }
        table.columns.push(Column {
            name: col_name,
            type_name: parse_type_text(&text(row, 2).to_lowercase()),
            nullable: int(row, 3) == 0,
            default: opt_text(row, 4).map(|d| normalize::canonical_default(&d)),
            serial: None,
            identity: None,
        });
    }
    if !pk_columns.is_empty() {
        pk_columns.sort();
        table.primary_key = Some(PrimaryKey {
            name: format!("{}_pkey", name),
            columns: pk_columns.into_iter().map(|(_, c)| c).collect(),
        });
    }

    // Foreign keys: one row per column, grouped by id.
    let rows = run(client, &format!("PRAGMA foreign_key_list({})", quoted))?;
    let mut fks: Vec<(i64, ForeignKey)> = Vec::new();
    for row in &rows {
        // id, seq, table, from, to, on_update, on_delete, match
        let id = int(row, 0);
        let ref_table = text(row, 2);
        let from = text(row, 3);
        let to = text(row, 4);
        let action = |s: &str| match s {
            "CASCADE" => RefAction::Cascade,
            "RESTRICT" => RefAction::Restrict,
            "SET NULL" => RefAction::SetNull,
            "SET DEFAULT" => RefAction::SetDefault,
            _ => RefAction::NoAction,
        };
        match fks.iter_mut().find(|(fk_id, _)| *fk_id == id) {
            Some((_, fk)) => {
                fk.columns.push(from);
                fk.ref_columns.push(to);
            }
            None => fks.push((
                id,
                ForeignKey {
                    name: format!("{}_{}_fkey", name, from),
                    columns: vec![from],
                    ref_table: ObjectName::qualified(default_schema, ref_table),
                    ref_columns: vec![to],
                    on_update: action(&text(row, 5)),
                    on_delete: action(&text(row, 6)),
                    deferrable: false,
                    initially_deferred: false,
                },
            )),
        }
    }
    table.foreign_keys = fks.into_iter().map(|(_, fk)| fk).collect();

    // Indexes: origin 'c' = CREATE INDEX, 'u'/'pk' = constraint-backing.
    let rows = run(client, &format!("PRAGMA index_list({})", quoted))?;
    for row in &rows {
        // seq, name, unique, origin, partial
        let index_name = text(row, 1);
        let origin = text(row, 3);
        if origin != "c" {
            continue;
        }
        let info = run(client, &format!("PRAGMA index_info({})", normalize::quote_ident(&index_name)))?;
        let mut columns: Vec<(i64, IndexColumn)> = Vec::new();
        for info_row in &info {
            // seqno, cid, name
            columns.push((
                int(info_row, 0),
                IndexColumn {
                    expr: IndexExpr::Column(text(info_row, 2)),
                    direction: SortDirection::Asc,
                    opclass: None,
                },
            ));
        }
        columns.sort_by_key(|(seqno, _)| *seqno);
        table.indexes.push(Index {
            name: index_name,
            table: table.name.clone(),
            columns: columns.into_iter().map(|(_, c)| c).collect(),
            unique: int(row, 2) != 0,
            method: IndexMethod::Btree,
            predicate: None,
            storage_params: Vec::new(),
            origin: IndexOrigin::Declared,
        });
    }

    Ok(table)
}
