//! PostgreSQL provider: DDL rendering, connection management, advisory
//! locks, and the feature surface. Introspection queries live in
//! [`crate::introspect::postgres`].

use postgres::{Client, NoTls, SimpleQueryMessage};

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::diff::edit::{Edit, TableAction};
use crate::error::{DbErrorInfo, Error, Result};
use crate::introspect;
use crate::normalize::{quote_ident, quote_literal};
use crate::provider::{DbClient, Dialect, Feature, Provider, Row, SqlValue};

pub struct PostgresProvider;

/// Render a qualified name, omitting the `public` prefix the way pg_dump
/// does.
fn render_name(name: &ObjectName) -> String {
    match name.schema.as_deref() {
        Some("public") | None => quote_ident(&name.name),
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&name.name)),
    }
}

/// Same for a dotted comment-target path.
fn render_path(target: &str) -> String {
    let parts: Vec<&str> = target.split('.').collect();
    let parts = if parts.first() == Some(&"public") {
        &parts[1..]
    } else {
        &parts[..]
    };
    parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

impl Provider for PostgresProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    fn validate_catalog(&self, catalog: &Catalog) -> Vec<Error> {
        let mut errors = Vec::new();
        // FK column references must resolve inside the catalog when the
        // referenced table is managed.
        for table in catalog.tables() {
            for fk in &table.foreign_keys {
                if let Some(ref_table) = catalog.get_table(&fk.ref_table.key()) {
                    for col in &fk.ref_columns {
                        if ref_table.get_column(col).is_none() {
                            errors.push(Error::validation(
                                "unknown_column",
                                format!(
                                    "foreign key {} references unknown column {}.{}",
                                    fk.name,
                                    fk.ref_table.key(),
                                    col
                                ),
                                "fix the referenced column list",
                            ));
                        }
                    }
                }
            }
        }
        errors
    }

    fn render_edit(&self, edit: &Edit, desired: &Catalog) -> Result<Vec<String>> {
        let _ = desired;
        Ok(match edit {
            Edit::CreateSchema { name } => {
                vec![format!("CREATE SCHEMA {}", quote_ident(name))]
            }
            Edit::DropSchema { name } => {
                vec![format!("DROP SCHEMA {} CASCADE", quote_ident(name))]
            }

            Edit::CreateExtension(ext) => {
                let mut sql = format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(&ext.name));
                if let Some(schema) = &ext.schema {
                    sql.push_str(&format!(" SCHEMA {}", quote_ident(schema)));
                }
                vec![sql]
            }
            Edit::DropExtension { name } => {
                vec![format!("DROP EXTENSION {} CASCADE", quote_ident(name))]
            }

            Edit::CreateEnum(e) => {
                let values: Vec<String> = e.values.iter().map(|v| quote_literal(v)).collect();
                vec![format!(
                    "CREATE TYPE {} AS ENUM ({})",
                    render_name(&e.name),
                    values.join(", ")
                )]
            }
            Edit::AddEnumValue { name, value } => {
                vec![format!(
                    "ALTER TYPE {} ADD VALUE {}",
                    render_name(name),
                    quote_literal(value)
                )]
            }
            Edit::DropEnum { name } => {
                vec![format!("DROP TYPE IF EXISTS {}", render_name(name))]
            }

            Edit::CreateSequence(s) => vec![render_create_sequence(s)],
            Edit::AlterSequence(s) => vec![render_alter_sequence(s)],
            Edit::DropSequence { name } => {
                vec![format!("DROP SEQUENCE IF EXISTS {}", render_name(name))]
            }

            Edit::CreateTable { table, skipped_fks } => {
                vec![render_create_table(table, skipped_fks)]
            }
            Edit::DropTable { name } => {
                vec![format!("DROP TABLE {} CASCADE", render_name(name))]
            }
            Edit::AlterTable { name, actions } => {
                let clauses: Vec<String> =
                    actions.iter().map(render_table_action).collect();
                vec![format!(
                    "ALTER TABLE {} {}",
                    render_name(name),
                    clauses.join(", ")
                )]
            }

            Edit::AddForeignKey { table, fk } => {
                vec![format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    render_name(table),
                    quote_ident(&fk.name),
                    render_fk_clause(fk)
                )]
            }
            Edit::DropForeignKey { table, name } => {
                vec![format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                    render_name(table),
                    quote_ident(name)
                )]
            }

            Edit::CreateIndex {
                index,
                concurrently,
            } => vec![render_create_index(index, *concurrently)],
            Edit::DropIndex { name } => {
                vec![format!("DROP INDEX IF EXISTS {}", render_name(name))]
            }

            Edit::CreateView { view, or_replace } => vec![render_create_view(view, *or_replace)],
            Edit::DropView { name, materialized } => {
                let kind = if *materialized {
                    "MATERIALIZED VIEW"
                } else {
                    "VIEW"
                };
                vec![format!("DROP {} IF EXISTS {}", kind, render_name(name))]
            }

            Edit::CreateFunction(f) => vec![render_create_function(f)],
            Edit::DropFunction(f) => {
                let kind = match f.kind {
                    RoutineKind::Function => "FUNCTION",
                    RoutineKind::Procedure => "PROCEDURE",
                };
                let arg_types: Vec<String> = f
                    .params
                    .iter()
                    .filter(|p| {
                        matches!(p.mode, ParamMode::In | ParamMode::InOut | ParamMode::Variadic)
                    })
                    .map(|p| p.type_name.to_string())
                    .collect();
                vec![format!(
                    "DROP {} IF EXISTS {}({})",
                    kind,
                    render_name(&f.name),
                    arg_types.join(", ")
                )]
            }

            Edit::CreateTrigger(t) => vec![render_create_trigger(t)],
            Edit::DropTrigger { table, name } => {
                vec![format!(
                    "DROP TRIGGER IF EXISTS {} ON {}",
                    quote_ident(name),
                    render_name(table)
                )]
            }

            Edit::SetComment { key, text } => {
                let target = render_comment_target(key);
                let value = match text {
                    Some(t) => quote_literal(t),
                    None => "NULL".to_string(),
                };
                vec![format!("COMMENT ON {} IS {}", target, value)]
            }
        })
    }

    fn connect(&self, url: &str) -> Result<Box<dyn DbClient>> {
        let client = Client::connect(url, NoTls)
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Box::new(PgClient { client }))
    }

    fn introspect(&self, client: &mut dyn DbClient, schemas: &[String]) -> Result<Catalog> {
        introspect::postgres::introspect(client, schemas)
    }

    fn try_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<bool> {
        let rows = client
            .query(&format!("SELECT pg_try_advisory_lock({})", key))
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    fn release_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<()> {
        client
            .query(&format!("SELECT pg_advisory_unlock({})", key))
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_column(col: &Column) -> String {
    let mut sql = quote_ident(&col.name);
    match col.serial {
        Some(SerialKind::Small) => sql.push_str(" smallserial"),
        Some(SerialKind::Regular) => sql.push_str(" serial"),
        Some(SerialKind::Big) => sql.push_str(" bigserial"),
        None => {
            sql.push_str(&format!(" {}", col.type_name));
            match col.identity {
                Some(IdentityKind::Always) => sql.push_str(" GENERATED ALWAYS AS IDENTITY"),
                Some(IdentityKind::ByDefault) => {
                    sql.push_str(" GENERATED BY DEFAULT AS IDENTITY")
                }
                None => {}
            }
            if !col.nullable {
                sql.push_str(" NOT NULL");
            }
            if let Some(default) = &col.default {
                sql.push_str(&format!(" DEFAULT {}", default));
            }
        }
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

fn render_create_table(table: &Table, skipped_fks: &[String]) -> String {
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
        if skipped_fks.contains(&fk.name) {
            continue;
        }
        items.push(format!(
            "CONSTRAINT {} {}",
            quote_ident(&fk.name),
            render_fk_clause(fk)
        ));
    }

    format!("CREATE TABLE {} ({})", render_name(&table.name), items.join(", "))
}

fn render_table_action(action: &TableAction) -> String {
    match action {
        TableAction::AddColumn(col) => format!("ADD COLUMN {}", render_column(col)),
        TableAction::DropColumn { name } => format!("DROP COLUMN {}", quote_ident(name)),
        TableAction::AlterColumnType {
            name,
            type_name,
            using,
        } => {
            let mut sql = format!("ALTER COLUMN {} TYPE {}", quote_ident(name), type_name);
            if let Some(using) = using {
                sql.push_str(&format!(" USING {}", using));
            }
            sql
        }
        TableAction::SetNotNull { name } => {
            format!("ALTER COLUMN {} SET NOT NULL", quote_ident(name))
        }
        TableAction::DropNotNull { name } => {
            format!("ALTER COLUMN {} DROP NOT NULL", quote_ident(name))
        }
        TableAction::SetDefault { name, expr } => {
            format!("ALTER COLUMN {} SET DEFAULT {}", quote_ident(name), expr)
        }
        TableAction::DropDefault { name } => {
            format!("ALTER COLUMN {} DROP DEFAULT", quote_ident(name))
        }
        TableAction::AddPrimaryKey(pk) => {
            let cols: Vec<String> = pk.columns.iter().map(|c| quote_ident(c)).collect();
            format!(
                "ADD CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(&pk.name),
                cols.join(", ")
            )
        }
        TableAction::AddUnique(u) => {
            let cols: Vec<String> = u.columns.iter().map(|c| quote_ident(c)).collect();
            format!(
                "ADD CONSTRAINT {} UNIQUE ({})",
                quote_ident(&u.name),
                cols.join(", ")
            )
        }
        TableAction::AddCheck(c) => format!(
            "ADD CONSTRAINT {} CHECK ({})",
            quote_ident(&c.name),
            c.expression
        ),
        TableAction::AddForeignKey(fk) => format!(
            "ADD CONSTRAINT {} {}",
            quote_ident(&fk.name),
            render_fk_clause(fk)
        ),
        TableAction::DropConstraint { name } => {
            format!("DROP CONSTRAINT IF EXISTS {}", quote_ident(name))
        }
    }
}

fn render_create_index(index: &Index, concurrently: bool) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    if concurrently {
        sql.push_str("CONCURRENTLY ");
    }
    sql.push_str(&quote_ident(&index.name));
    sql.push_str(&format!(" ON {}", render_name(&index.table)));
    if index.method != IndexMethod::Btree {
        sql.push_str(&format!(" USING {}", index.method));
    }
    let cols: Vec<String> = index
        .columns
        .iter()
        .map(|c| {
            let mut part = match &c.expr {
                IndexExpr::Column(name) => quote_ident(name),
                IndexExpr::Expression(expr) => expr.clone(),
            };
            if let Some(opclass) = &c.opclass {
                part.push_str(&format!(" {}", opclass));
            }
            if c.direction == SortDirection::Desc {
                part.push_str(" DESC");
            }
            part
        })
        .collect();
    sql.push_str(&format!(" ({})", cols.join(", ")));
    if !index.storage_params.is_empty() {
        let params: Vec<String> = index
            .storage_params
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect();
        sql.push_str(&format!(" WITH ({})", params.join(", ")));
    }
    if let Some(pred) = &index.predicate {
        sql.push_str(&format!(" WHERE {}", pred));
    }
    sql
}

fn render_create_view(view: &View, or_replace: bool) -> String {
    let mut sql = String::from("CREATE ");
    if or_replace {
        sql.push_str("OR REPLACE ");
    }
    if view.materialized {
        sql.push_str("MATERIALIZED ");
    }
    sql.push_str(&format!("VIEW {}", render_name(&view.name)));
    if view.security_barrier {
        sql.push_str(" WITH (security_barrier = true)");
    }
    sql.push_str(&format!(" AS {}", view.definition));
    match view.check_option {
        CheckOption::None => {}
        CheckOption::Local => sql.push_str(" WITH LOCAL CHECK OPTION"),
        CheckOption::Cascaded => sql.push_str(" WITH CHECK OPTION"),
    }
    sql
}

fn render_params(params: &[FunctionParam]) -> String {
    params
        .iter()
        .map(|p| {
            let mut part = String::new();
            match p.mode {
                ParamMode::In => {}
                ParamMode::Out => part.push_str("OUT "),
                ParamMode::InOut => part.push_str("INOUT "),
                ParamMode::Variadic => part.push_str("VARIADIC "),
            }
            if let Some(name) = &p.name {
                part.push_str(&format!("{} ", quote_ident(name)));
            }
            part.push_str(&p.type_name.to_string());
            part
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick a dollar-quote tag that does not collide with the body.
fn dollar_quote(body: &str) -> (String, String) {
    let mut tag = String::new();
    loop {
        let delim = format!("${}$", tag);
        if !body.contains(&delim) {
            return (delim.clone(), delim);
        }
        tag.push('x');
    }
}

fn render_create_function(f: &Function) -> String {
    let kind = match f.kind {
        RoutineKind::Function => "FUNCTION",
        RoutineKind::Procedure => "PROCEDURE",
    };
    let mut sql = format!(
        "CREATE OR REPLACE {} {}({})",
        kind,
        render_name(&f.name),
        render_params(&f.params)
    );
    if let Some(returns) = &f.returns {
        sql.push_str(&format!(" RETURNS {}", returns));
    }
    sql.push_str(&format!(" LANGUAGE {}", f.language));
    if f.kind == RoutineKind::Function {
        if f.volatility != Volatility::Volatile {
            sql.push_str(&format!(" {}", f.volatility));
        }
        if f.strict {
            sql.push_str(" STRICT");
        }
    }
    let (open, close) = dollar_quote(&f.body);
    sql.push_str(&format!(" AS {}{}{}", open, f.body, close));
    sql
}

fn render_create_trigger(t: &Trigger) -> String {
    let events: Vec<String> = t
        .events
        .iter()
        .map(|e| match e {
            TriggerEvent::Insert => "INSERT".to_string(),
            TriggerEvent::Delete => "DELETE".to_string(),
            TriggerEvent::Truncate => "TRUNCATE".to_string(),
            TriggerEvent::Update(cols) if cols.is_empty() => "UPDATE".to_string(),
            TriggerEvent::Update(cols) => {
                let quoted: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
                format!("UPDATE OF {}", quoted.join(", "))
            }
        })
        .collect();

    let mut sql = format!(
        "CREATE TRIGGER {} {} {} ON {} FOR EACH {}",
        quote_ident(&t.name),
        t.timing,
        events.join(" OR "),
        render_name(&t.table),
        t.level
    );
    if let Some(when) = &t.when {
        sql.push_str(&format!(" WHEN ({})", when));
    }
    let args: Vec<String> = t.args.iter().map(|a| quote_literal(a)).collect();
    sql.push_str(&format!(
        " EXECUTE FUNCTION {}({})",
        render_name(&t.function),
        args.join(", ")
    ));
    sql
}

fn render_comment_target(key: &CommentKey) -> String {
    match key.kind {
        CommentKind::Trigger => {
            // target is schema.table.trigger
            let (table_path, trigger) = key
                .target
                .rsplit_once('.')
                .unwrap_or(("", key.target.as_str()));
            format!(
                "TRIGGER {} ON {}",
                quote_ident(trigger),
                render_path(table_path)
            )
        }
        kind => format!("{} {}", kind, render_path(&key.target)),
    }
}

fn render_create_sequence(s: &Sequence) -> String {
    let mut sql = format!("CREATE SEQUENCE {}", render_name(&s.name));
    push_sequence_options(&mut sql, s);
    sql
}

fn render_alter_sequence(s: &Sequence) -> String {
    let mut sql = format!("ALTER SEQUENCE {}", render_name(&s.name));
    push_sequence_options(&mut sql, s);
    sql
}

fn push_sequence_options(sql: &mut String, s: &Sequence) {
    if s.increment != 1 {
        sql.push_str(&format!(" INCREMENT BY {}", s.increment));
    }
    match s.min_value {
        Some(min) => sql.push_str(&format!(" MINVALUE {}", min)),
        None => sql.push_str(" NO MINVALUE"),
    }
    match s.max_value {
        Some(max) => sql.push_str(&format!(" MAXVALUE {}", max)),
        None => sql.push_str(" NO MAXVALUE"),
    }
    if s.start != 1 {
        sql.push_str(&format!(" START WITH {}", s.start));
    }
    if s.cache != 1 {
        sql.push_str(&format!(" CACHE {}", s.cache));
    }
    if s.cycle {
        sql.push_str(" CYCLE");
    }
}

// ---------------------------------------------------------------------------
// Client adapter
// ---------------------------------------------------------------------------

struct PgClient {
    client: Client,
}

fn db_error(e: postgres::Error) -> DbErrorInfo {
    match e.as_db_error() {
        Some(db) => DbErrorInfo {
            code: Some(db.code().code().to_string()),
            message: db.message().to_string(),
            detail: db.detail().map(|s| s.to_string()),
            hint: db.hint().map(|s| s.to_string()),
            position: match db.position() {
                Some(postgres::error::ErrorPosition::Original(p)) => Some(*p),
                _ => None,
            },
        },
        None => DbErrorInfo {
            code: None,
            message: e.to_string(),
            detail: None,
            hint: None,
            position: None,
        },
    }
}

impl DbClient for PgClient {
    /// Catalog queries go over the simple-query protocol: every value
    /// arrives as text, which is exactly the shape [`SqlValue`] wants.
    fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DbErrorInfo> {
        let messages = self.client.simple_query(sql).map_err(db_error)?;
        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let mut values = Vec::with_capacity(row.len());
                for i in 0..row.len() {
                    values.push(match row.get(i) {
                        Some(text) => SqlValue::Text(text.to_string()),
                        None => SqlValue::Null,
                    });
                }
                rows.push(values);
            }
        }
        Ok(rows)
    }

    fn execute(&mut self, sql: &str) -> std::result::Result<u64, DbErrorInfo> {
        self.client.batch_execute(sql).map_err(db_error)?;
        Ok(0)
    }

    fn close(self: Box<Self>) -> std::result::Result<(), DbErrorInfo> {
        // Dropping the client closes the connection.
        Ok(())
    }
}
