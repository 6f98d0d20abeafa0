//! SQLite provider.
//!
//! SQLite's ALTER TABLE covers only ADD COLUMN and renames, so every other
//! table change demotes to the documented rebuild dance: create the new
//! shape under a scratch name, copy the surviving columns, drop the old
//! table, rename. Object kinds SQLite cannot express (schemas, extensions,
//! enums, sequences, functions, triggers, materialized views, comments)
//! are rejected during validation with a suggestion.

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::diff::edit::{Edit, TableAction};
use crate::error::{DbErrorInfo, Error, Result};
use crate::introspect;
use crate::normalize::{quote_ident, quote_literal};
use crate::provider::{DbClient, Dialect, Feature, Provider, Row, SqlValue};

pub struct SqliteProvider;

/// SQLite has a single unnamed namespace; schema prefixes are dropped.
fn render_name(name: &ObjectName) -> String {
    quote_ident(&name.name)
}

impl Provider for SqliteProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::AlterDropColumn | Feature::AlterColumnType => true,
            Feature::Schemas
            | Feature::Extensions
            | Feature::Enums
            | Feature::Sequences
            | Feature::StoredFunctions
            | Feature::StoredProcedures
            | Feature::Triggers
            | Feature::MaterializedViews
            | Feature::ConcurrentIndexes
            | Feature::AdvisoryLocks => false,
        }
    }

    fn validate_catalog(&self, catalog: &Catalog) -> Vec<Error> {
        let mut errors = Vec::new();
        let mut reject = |code: &'static str, message: String, suggestion: &str| {
            errors.push(Error::validation(code, message, suggestion));
        };

        for schema in catalog.schemas() {
            if schema != "public" {
                reject(
                    "schemas_unsupported",
                    format!("schema {} cannot be created on SQLite", schema),
                    "SQLite has a single namespace; remove the CREATE SCHEMA",
                );
            }
        }
        for ext in catalog.extensions() {
            reject(
                "extensions_unsupported",
                format!("extension {} cannot be installed on SQLite", ext.name),
                "remove the CREATE EXTENSION statement",
            );
        }
        for e in catalog.enums() {
            reject(
                "enums_unsupported",
                format!("enum type {} cannot be created on SQLite", e.name),
                "use TEXT with a CHECK constraint instead",
            );
        }
        for s in catalog.sequences() {
            reject(
                "sequences_unsupported",
                format!("sequence {} cannot be created on SQLite", s.name),
                "use INTEGER PRIMARY KEY autoincrement behavior instead",
            );
        }
        for f in catalog.functions() {
            let code = match f.kind {
                RoutineKind::Function => "stored_functions_unsupported",
                RoutineKind::Procedure => "stored_procedures_unsupported",
            };
            reject(
                code,
                format!("{} cannot be created on SQLite", f.signature()),
                "move the logic into the application",
            );
        }
        for t in catalog.triggers() {
            reject(
                "triggers_unsupported",
                format!("trigger {} cannot be managed on SQLite", t.key()),
                "manage SQLite triggers outside the declarative schema",
            );
        }
        for v in catalog.views() {
            if v.materialized {
                reject(
                    "materialized_views_unsupported",
                    format!("materialized view {} cannot be created on SQLite", v.name),
                    "declare a plain view or maintain a table",
                );
            }
        }
        for (key, _) in catalog.comments() {
            reject(
                "comments_unsupported",
                format!("COMMENT ON {} has no SQLite equivalent", key),
                "remove COMMENT statements from the SQLite schema",
            );
        }
        for table in catalog.tables() {
            for col in &table.columns {
                if col.identity.is_some() {
                    reject(
                        "identity_unsupported",
                        format!(
                            "identity column {}.{} cannot be created on SQLite",
                            table.name, col.name
                        ),
                        "use INTEGER PRIMARY KEY instead",
                    );
                }
            }
            for idx in &table.indexes {
                if idx.method != IndexMethod::Btree {
                    reject(
                        "index_method_unsupported",
                        format!("index {} uses {} which SQLite lacks", idx.name, idx.method),
                        "remove the USING clause",
                    );
                }
                if idx.columns.iter().any(|c| c.opclass.is_some()) {
                    reject(
                        "opclass_unsupported",
                        format!("index {} uses an operator class", idx.name),
                        "remove the operator class",
                    );
                }
            }
        }
        errors
    }

    fn render_edit(&self, edit: &Edit, desired: &Catalog) -> Result<Vec<String>> {
        Ok(match edit {
            // SQLite resolves FK targets lazily, so cyclic tables can be
            // created with their FKs inline; the deferred edit has nothing
            // left to do. Indexes arrive as separate edits.
            Edit::CreateTable { table, .. } => {
                vec![render_create_table(table, &[])]
            }
            Edit::AddForeignKey { .. } => vec![],
            Edit::DropForeignKey { .. } => vec![],

            Edit::DropTable { name } => {
                vec![format!("DROP TABLE {}", render_name(name))]
            }

            Edit::AlterTable { name, actions } => render_alter_table(name, actions, desired)?,

            Edit::CreateIndex { index, .. } => vec![render_create_index(index)],
            Edit::DropIndex { name } => {
                vec![format!("DROP INDEX IF EXISTS {}", render_name(name))]
            }

            Edit::CreateView { view, .. } => {
                vec![format!(
                    "CREATE VIEW {} AS {}",
                    render_name(&view.name),
                    view.definition
                )]
            }
            Edit::DropView { name, .. } => {
                vec![format!("DROP VIEW IF EXISTS {}", render_name(name))]
            }

            other => {
                return Err(Error::Validation {
                    code: "unsupported_edit",
                    message: format!("SQLite cannot apply {:?}", other),
                    suggestion: None,
                });
            }
        })
    }

    fn connect(&self, url: &str) -> Result<Box<dyn DbClient>> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Box::new(SqliteClient { conn }))
    }

    fn introspect(&self, client: &mut dyn DbClient, schemas: &[String]) -> Result<Catalog> {
        introspect::sqlite::introspect(client, schemas)
    }

    fn try_advisory_lock(&self, _client: &mut dyn DbClient, _key: i64) -> Result<bool> {
        Err(Error::Connection(
            "advisory locks are not supported on SQLite".to_string(),
        ))
    }

    fn release_advisory_lock(&self, _client: &mut dyn DbClient, _key: i64) -> Result<()> {
        Err(Error::Connection(
            "advisory locks are not supported on SQLite".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_column(col: &Column) -> String {
    let mut sql = format!("{} {}", quote_ident(&col.name), col.type_name);
    if col.serial.is_some() {
        // Rendered as plain INTEGER; combined with a single-column PK this
        // becomes a rowid alias with autoincrement behavior.
        sql = format!("{} integer", quote_ident(&col.name));
    }
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    sql
}

fn render_fk_clause(fk: &ForeignKey) -> String {
    let cols: Vec<String> = fk.columns.iter().map(|c| quote_ident(c)).collect();
    let ref_cols: Vec<String> = fk.ref_columns.iter().map(|c| quote_ident(c)).collect();
    let mut sql = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        cols.join(", "),
        render_name(&fk.ref_table),
        ref_cols.join(", ")
    );
    if fk.on_delete != RefAction::NoAction {
        sql.push_str(&format!(" ON DELETE {}", fk.on_delete));
    }
    if fk.on_update != RefAction::NoAction {
        sql.push_str(&format!(" ON UPDATE {}", fk.on_update));
    }
    if fk.deferrable {
        sql.push_str(" DEFERRABLE");
        if fk.initially_deferred {
            sql.push_str(" INITIALLY DEFERRED");
        }
    }
    sql
}

fn render_create_table(table: &Table, _skipped: &[String]) -> String {
    let mut items: Vec<String> = table.columns.iter().map(render_column).collect();

    if let Some(pk) = &table.primary_key {
        let cols: Vec<String> = pk.columns.iter().map(|c| quote_ident(c)).collect();
        items.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(&pk.name),
            cols.join(", ")
        ));
    }
    for u in &table.uniques {
        let cols: Vec<String> = u.columns.iter().map(|c| quote_ident(c)).collect();
        items.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(&u.name),
            cols.join(", ")
        ));
    }
    for c in &table.checks {
        items.push(format!(
            "CONSTRAINT {} CHECK ({})",
            quote_ident(&c.name),
            c.expression
        ));
    }
    for fk in &table.foreign_keys {
        items.push(format!(
            "CONSTRAINT {} {}",
            quote_ident(&fk.name),
            render_fk_clause(fk)
        ));
    }

    format!(
        "CREATE TABLE {} ({})",
        render_name(&table.name),
        items.join(", ")
    )
}

fn render_create_index(index: &Index) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str(&format!(
        "INDEX IF NOT EXISTS {} ON {}",
        quote_ident(&index.name),
        render_name(&index.table)
    ));
    let cols: Vec<String> = index
        .columns
        .iter()
        .map(|c| {
            let mut part = match &c.expr {
                IndexExpr::Column(name) => quote_ident(name),
                IndexExpr::Expression(expr) => expr.clone(),
            };
            if c.direction == SortDirection::Desc {
                part.push_str(" DESC");
            }
            part
        })
        .collect();
    sql.push_str(&format!(" ({})", cols.join(", ")));
    if let Some(pred) = &index.predicate {
        sql.push_str(&format!(" WHERE {}", pred));
    }
    sql
}

/// ADD COLUMN is native (one statement per column); everything else goes
/// through the rebuild dance.
fn render_alter_table(
    name: &ObjectName,
    actions: &[TableAction],
    desired: &Catalog,
) -> Result<Vec<String>> {
    let only_adds = actions
        .iter()
        .all(|a| matches!(a, TableAction::AddColumn(_)));
    if only_adds {
        return Ok(actions
            .iter()
            .map(|a| match a {
                TableAction::AddColumn(col) => {
                    format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        render_name(name),
                        render_column(col)
                    )
                }
                _ => unreachable!(),
            })
            .collect());
    }

    let Some(table) = desired.get_table(&name.key()) else {
        return Err(Error::Validation {
            code: "unknown_table",
            message: format!("cannot rebuild unknown table {}", name),
            suggestion: None,
        });
    };

    // Columns present before the change: everything in the desired shape
    // that is not newly added.
    let added: Vec<&str> = actions
        .iter()
        .filter_map(|a| match a {
            TableAction::AddColumn(c) => Some(c.name.as_str()),
            _ => None,
        })
        .collect();
    let copy_cols: Vec<String> = table
        .columns
        .iter()
        .filter(|c| !added.contains(&c.name.as_str()))
        .map(|c| quote_ident(&c.name))
        .collect();

    let scratch = ObjectName {
        schema: table.name.schema.clone(),
        name: format!("{}__rebuild", table.name.name),
    };
    let mut scratch_table = table.clone();
    scratch_table.name = scratch.clone();

    let mut statements = vec![render_create_table(&scratch_table, &[])];
    if !copy_cols.is_empty() {
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            render_name(&scratch),
            copy_cols.join(", "),
            copy_cols.join(", "),
            render_name(name)
        ));
    }
    statements.push(format!("DROP TABLE {}", render_name(name)));
    statements.push(format!(
        "ALTER TABLE {} RENAME TO {}",
        render_name(&scratch),
        quote_ident(&name.name)
    ));
    // The drop took the table's indexes with it.
    for index in &table.indexes {
        statements.push(render_create_index(index));
    }
    Ok(statements)
}

// ---------------------------------------------------------------------------
// Client adapter
// ---------------------------------------------------------------------------

struct SqliteClient {
    conn: Connection,
}

fn db_error(e: rusqlite::Error) -> DbErrorInfo {
    DbErrorInfo {
        code: e.sqlite_error_code().map(|c| format!("{:?}", c)),
        message: e.to_string(),
        detail: None,
        hint: None,
        position: None,
    }
}

impl DbClient for SqliteClient {
    fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DbErrorInfo> {
        let mut stmt = self.conn.prepare(sql).map_err(db_error)?;
        let column_count = stmt.column_count();
        let mut rows = Vec::new();
        let mut raw = stmt.query([]).map_err(db_error)?;
        while let Some(row) = raw.next().map_err(db_error)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = match row.get_ref(i).map_err(db_error)? {
                    ValueRef::Null => SqlValue::Null,
                    ValueRef::Integer(v) => SqlValue::Int(v),
                    ValueRef::Real(v) => SqlValue::Text(v.to_string()),
                    ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
                    ValueRef::Blob(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
                };
                values.push(value);
            }
            rows.push(values);
        }
        Ok(rows)
    }

    fn execute(&mut self, sql: &str) -> std::result::Result<u64, DbErrorInfo> {
        self.conn.execute_batch(sql).map_err(db_error)?;
        Ok(0)
    }

    fn close(self: Box<Self>) -> std::result::Result<(), DbErrorInfo> {
        self.conn.close().map_err(|(_, e)| db_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;

    #[test]
    fn test_validate_rejects_postgres_only_kinds() {
        let catalog = CatalogBuilder::new()
            .schema("app")
            .extension("vector")
            .enum_type("status", &["a"])
            .sequence("seq")
            .build();
        let errors = SqliteProvider.validate_catalog(&catalog);
        let codes: Vec<&str> = errors
            .iter()
            .filter_map(|e| match e {
                Error::Validation { code, .. } => Some(*code),
                _ => None,
            })
            .collect();
        assert!(codes.contains(&"schemas_unsupported"));
        assert!(codes.contains(&"extensions_unsupported"));
        assert!(codes.contains(&"enums_unsupported"));
        assert!(codes.contains(&"sequences_unsupported"));
    }

    #[test]
    fn test_validate_accepts_plain_tables_and_views() {
        let catalog = CatalogBuilder::new()
            .table("t", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .view("v", "SELECT id FROM t")
            .build();
        assert!(SqliteProvider.validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_create_table_keeps_cyclic_fks_inline() {
        let catalog = CatalogBuilder::new()
            .table("a", |t| {
                t.column("id", "integer", false)
                    .column("b_id", "integer", true)
                    .fk("fkb", &["b_id"], "b", &["id"]);
            })
            .build();
        let table = catalog.get_table("public.a").unwrap().clone();
        let sql = SqliteProvider
            .render_edit(
                &Edit::CreateTable {
                    table,
                    skipped_fks: vec!["fkb".to_string()],
                },
                &catalog,
            )
            .unwrap();
        assert!(sql[0].contains("REFERENCES"), "sql: {}", sql[0]);

        // And the deferred edit is a no-op.
        let deferred = SqliteProvider
            .render_edit(
                &Edit::AddForeignKey {
                    table: ObjectName::qualified("public", "a"),
                    fk: ForeignKey {
                        name: "fkb".to_string(),
                        columns: vec!["b_id".to_string()],
                        ref_table: ObjectName::qualified("public", "b"),
                        ref_columns: vec!["id".to_string()],
                        on_delete: RefAction::NoAction,
                        on_update: RefAction::NoAction,
                        deferrable: false,
                        initially_deferred: false,
                    },
                },
                &catalog,
            )
            .unwrap();
        assert!(deferred.is_empty());
    }

    #[test]
    fn test_add_column_stays_native() {
        let catalog = CatalogBuilder::new()
            .table("t", |t| {
                t.column("id", "integer", false)
                    .column("email", "text", true);
            })
            .build();
        let sql = SqliteProvider
            .render_edit(
                &Edit::AlterTable {
                    name: ObjectName::qualified("public", "t"),
                    actions: vec![TableAction::AddColumn(Column {
                        name: "email".to_string(),
                        type_name: TypeName::simple("text"),
                        nullable: true,
                        default: None,
                        serial: None,
                        identity: None,
                    })],
                },
                &catalog,
            )
            .unwrap();
        assert_eq!(sql, vec!["ALTER TABLE t ADD COLUMN email text"]);
    }

    #[test]
    fn test_drop_column_rebuilds() {
        let catalog = CatalogBuilder::new()
            .table("t", |t| {
                t.column("id", "integer", false)
                    .index("idx_t_id", &["id"], false);
            })
            .build();
        let sql = SqliteProvider
            .render_edit(
                &Edit::AlterTable {
                    name: ObjectName::qualified("public", "t"),
                    actions: vec![TableAction::DropColumn {
                        name: "legacy".to_string(),
                    }],
                },
                &catalog,
            )
            .unwrap();
        assert!(sql[0].starts_with("CREATE TABLE t__rebuild"));
        assert_eq!(sql[1], "INSERT INTO t__rebuild (id) SELECT id FROM t");
        assert_eq!(sql[2], "DROP TABLE t");
        assert_eq!(sql[3], "ALTER TABLE t__rebuild RENAME TO t");
        assert!(sql[4].starts_with("CREATE INDEX IF NOT EXISTS idx_t_id"));
    }
}
