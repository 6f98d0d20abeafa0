//! PostgreSQL introspection over the system catalogs.
//!
//! Reads pg_class, pg_attribute, pg_constraint, pg_index, pg_type,
//! pg_enum, pg_proc, pg_trigger, pg_namespace, pg_depend, pg_description,
//! pg_sequence, and pg_extension, restricted to the managed schemas.
//! Objects owned by installed extensions are filtered out (the user never
//! declared them and must not drop them), as are the sequences backing
//! serial and identity columns.
//!
//! Server-reported definitions (constraint defs, index defs, trigger
//! defs, view bodies) are re-parsed through the desired-state parser so
//! both catalogs converge on the same canonical strings.

use std::collections::BTreeMap;

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::introspect::{parse_type_text, schema_list_literal};
use crate::normalize;
use crate::parser::{self, Decl};
use crate::provider::{DbClient, Row};

/// Fragment excluding rows whose object is owned by an extension.
fn not_extension_owned(oid_expr: &str) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM pg_depend dep \
         WHERE dep.objid = {} AND dep.deptype = 'e')",
        oid_expr
    )
}

fn run(client: &mut dyn DbClient, sql: &str) -> Result<Vec<Row>> {
    client.query(sql).map_err(|e| Error::Connection(format!(
        "introspection query failed: {} (query: {})",
        e.message, sql
    )))
}

fn text(row: &Row, i: usize) -> String {
    row.get(i).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

fn opt_text(row: &Row, i: usize) -> Option<String> {
    row.get(i).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn boolean(row: &Row, i: usize) -> bool {
    row.get(i).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn int(row: &Row, i: usize) -> i64 {
    row.get(i).and_then(|v| v.as_i64()).unwrap_or(0)
}

pub fn introspect(client: &mut dyn DbClient, schemas: &[String]) -> Result<Catalog> {
    let default_schema = schemas.first().map(|s| s.as_str()).unwrap_or("public");
    // Keep pg_get_*def output stable regardless of the role's settings.
    client
        .execute(&format!(
            "SET search_path = {}, pg_catalog",
            normalize::quote_ident(default_schema)
        ))
        .map_err(|e| Error::Connection(e.message))?;

    let list = schema_list_literal(schemas);
    let mut catalog = Catalog::empty();

    introspect_schemas(client, &list, &mut catalog)?;
    introspect_extensions(client, &mut catalog)?;
    introspect_enums(client, &list, &mut catalog)?;
    introspect_sequences(client, &list, &mut catalog)?;
    introspect_tables(client, &list, &mut catalog)?;
    introspect_constraints(client, &list, default_schema, &mut catalog)?;
    introspect_indexes(client, &list, &mut catalog)?;
    introspect_views(client, &list, &mut catalog)?;
    introspect_functions(client, &list, &mut catalog)?;
    introspect_triggers(client, &list, &mut catalog)?;
    introspect_comments(client, &list, &mut catalog)?;

    Ok(catalog)
}

fn introspect_schemas(
    client: &mut dyn DbClient,
    list: &str,
    catalog: &mut Catalog,
) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT nspname FROM pg_namespace WHERE nspname IN ({}) ORDER BY nspname",
            list
        ),
    )?;
    for row in &rows {
        catalog.insert_schema(text(row, 0));
    }
    Ok(())
}

fn introspect_extensions(client: &mut dyn DbClient, catalog: &mut Catalog) -> Result<()> {
    // plpgsql ships preinstalled; it is never part of the managed state.
    let rows = run(
        client,
        "SELECT e.extname, n.nspname \
         FROM pg_extension e \
         JOIN pg_namespace n ON n.oid = e.extnamespace \
         WHERE e.extname <> 'plpgsql' \
         ORDER BY e.extname",
    )?;
    for row in &rows {
        catalog.insert_extension(Extension {
            name: text(row, 0),
            schema: opt_text(row, 1),
        });
    }
    Ok(())
}

fn introspect_enums(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, t.typname, e.enumlabel \
             FROM pg_type t \
             JOIN pg_enum e ON e.enumtypid = t.oid \
             JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname IN ({}) AND {} \
             ORDER BY t.typname, e.enumsortorder",
            list,
            not_extension_owned("t.oid")
        ),
    )?;
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for row in &rows {
        grouped
            .entry((text(row, 0), text(row, 1)))
            .or_default()
            .push(text(row, 2));
    }
    for ((schema, name), values) in grouped {
        catalog.insert_enum(EnumType {
            name: ObjectName::qualified(schema, name),
            values,
        });
    }
    Ok(())
}

fn introspect_sequences(
    client: &mut dyn DbClient,
    list: &str,
    catalog: &mut Catalog,
) -> Result<()> {
    // deptype 'a'/'i' excludes sequences owned by serial and identity
    // columns; those are reconciled through the column marker.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, s.seqstart, s.seqincrement, \
                    s.seqmin, s.seqmax, s.seqcache, s.seqcycle \
             FROM pg_sequence s \
             JOIN pg_class c ON c.oid = s.seqrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname IN ({}) \
               AND NOT EXISTS (SELECT 1 FROM pg_depend dep \
                    WHERE dep.objid = c.oid AND dep.deptype IN ('a', 'i', 'e')) \
             ORDER BY n.nspname, c.relname",
            list
        ),
    )?;
    for row in &rows {
        let increment = int(row, 3);
        let min_raw = int(row, 4);
        let max_raw = int(row, 5);
        // The server materializes the default bounds; fold them back to
        // "unset" so they compare equal to an unspecified desired state.
        let min_value = if increment > 0 && min_raw == 1 {
            None
        } else if increment < 0 && (min_raw == i64::MIN || min_raw == -(2i64.pow(31))) {
            None
        } else {
            Some(min_raw)
        };
        let max_value = if increment > 0 && (max_raw == i64::MAX || max_raw == 2i64.pow(31) - 1) {
            None
        } else if increment < 0 && max_raw == -1 {
            None
        } else {
            Some(max_raw)
        };
        catalog.insert_sequence(Sequence {
            name: ObjectName::qualified(text(row, 0), text(row, 1)),
            start: int(row, 2),
            increment,
            min_value,
            max_value,
            cache: int(row, 6),
            cycle: boolean(row, 7),
        });
    }
    Ok(())
}

fn introspect_tables(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind = 'r' AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, c.relname",
            list,
            not_extension_owned("c.oid")
        ),
    )?;
    for row in &rows {
        catalog.insert_table(Table::new(ObjectName::qualified(text(row, 0), text(row, 1))));
    }

    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, a.attname, \
                    format_type(a.atttypid, a.atttypmod), \
                    a.attnotnull, pg_get_expr(d.adbin, d.adrelid), a.attidentity \
             FROM pg_attribute a \
             JOIN pg_class c ON c.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
             WHERE a.attnum > 0 AND NOT a.attisdropped \
               AND c.relkind = 'r' AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, c.relname, a.attnum",
            list,
            not_extension_owned("c.oid")
        ),
    )?;
    for row in &rows {
        let table_key = format!("{}.{}", text(row, 0), text(row, 1));
        let name = text(row, 2);
        let type_name = parse_type_text(&text(row, 3));
        let not_null = boolean(row, 4);
        let raw_default = opt_text(row, 5);
        let identity = match text(row, 6).as_str() {
            "a" => Some(IdentityKind::Always),
            "d" => Some(IdentityKind::ByDefault),
            _ => None,
        };

        let column = build_column(&text(row, 1), name, type_name, not_null, raw_default, identity);
        if let Some(table) = catalog.get_table_mut(&table_key) {
            table.columns.push(column);
        }
    }
    Ok(())
}

/// Reconstruct the canonical column, re-detecting the serial pattern:
/// integer family + NOT NULL + a `nextval('<table>_<col>_seq')` default
/// collapses back to the serial marker.
fn build_column(
    table: &str,
    name: String,
    type_name: TypeName,
    not_null: bool,
    raw_default: Option<String>,
    identity: Option<IdentityKind>,
) -> Column {
    if not_null && identity.is_none() {
        let serial = match type_name.name() {
            "smallint" => Some(SerialKind::Small),
            "integer" => Some(SerialKind::Regular),
            "bigint" => Some(SerialKind::Big),
            _ => None,
        };
        if let (Some(kind), Some(default)) = (serial, raw_default.as_deref()) {
            if normalize::nextval_sequence(default).as_deref()
                == Some(normalize::serial_sequence_name(table, &name).as_str())
            {
                return Column {
                    name,
                    type_name,
                    nullable: false,
                    default: None,
                    serial: Some(kind),
                    identity: None,
                };
            }
        }
    }

    Column {
        name,
        type_name,
        nullable: !not_null,
        default: raw_default.map(|d| normalize::canonical_default(&d)),
        serial: None,
        identity,
    }
}

fn introspect_constraints(
    client: &mut dyn DbClient,
    list: &str,
    default_schema: &str,
    catalog: &mut Catalog,
) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, rel.relname, con.conname, con.contype, \
                    pg_get_constraintdef(con.oid) \
             FROM pg_constraint con \
             JOIN pg_class rel ON rel.oid = con.conrelid \
             JOIN pg_namespace n ON n.oid = rel.relnamespace \
             WHERE con.contype IN ('p', 'u', 'c', 'f') AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, rel.relname, con.conname",
            list,
            not_extension_owned("rel.oid")
        ),
    )?;
    for row in &rows {
        let schema = text(row, 0);
        let table_key = format!("{}.{}", schema, text(row, 1));
        let conname = text(row, 2);
        let definition = text(row, 4);

        // Wrap the server's definition in a scratch CREATE TABLE and run
        // it through the parser: same code path, same canonical result as
        // the desired side.
        let wrapped = format!(
            "CREATE TABLE __c (CONSTRAINT {} {})",
            normalize::quote_ident(&conname),
            definition
        );
        let Ok(decls) = parser::parse_sql(&wrapped) else {
            return Err(Error::Connection(format!(
                "could not parse constraint definition for {}: {}",
                conname, definition
            )));
        };
        let Some(parser::Located {
            node: Decl::Table(scratch),
            ..
        }) = decls.into_iter().next()
        else {
            continue;
        };

        let Some(table) = catalog.get_table_mut(&table_key) else {
            continue;
        };
        if let Some(mut pk) = scratch.primary_key {
            // The scratch table is named __c; restore the real name.
            pk.name = conname.clone();
            table.primary_key = Some(pk);
        }
        for u in scratch.uniques {
            table.uniques.push(UniqueConstraint {
                name: conname.clone(),
                columns: u.columns,
            });
        }
        for c in scratch.checks {
            table.checks.push(CheckConstraint {
                name: conname.clone(),
                expression: c.expression,
            });
        }
        for mut fk in scratch.foreign_keys {
            fk.name = conname.clone();
            fk.ref_table.set_default_schema(default_schema);
            table.foreign_keys.push(fk);
        }
    }
    Ok(())
}

fn introspect_indexes(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    // Constraint-backing indexes (PK/UNIQUE) are reconciled through their
    // constraints and excluded here.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, t.relname, pg_get_indexdef(ix.indexrelid) \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE n.nspname IN ({}) \
               AND NOT ix.indisprimary \
               AND NOT EXISTS (SELECT 1 FROM pg_constraint pc \
                    WHERE pc.conindid = ix.indexrelid) \
               AND {} \
             ORDER BY n.nspname, i.relname",
            list,
            not_extension_owned("t.oid")
        ),
    )?;
    for row in &rows {
        let table_key = format!("{}.{}", text(row, 0), text(row, 1));
        let indexdef = text(row, 2);

        // pg_get_indexdef returns a complete CREATE INDEX statement; the
        // parser gives us the same canonical Index the desired side has.
        // Indexes the parser cannot model (e.g. spgist) are invisible to
        // the diff rather than fatal.
        let Ok(decls) = parser::parse_sql(&indexdef) else {
            log::warn!("skipping unmodellable index definition: {}", indexdef);
            continue;
        };
        let Some(parser::Located {
            node: Decl::Index(mut index),
            ..
        }) = decls.into_iter().next()
        else {
            continue;
        };
        index.table.set_default_schema(&text(row, 0));
        if let Some(table) = catalog.get_table_mut(&table_key) {
            table.indexes.push(index);
        }
    }
    Ok(())
}

fn introspect_views(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, c.relkind, pg_get_viewdef(c.oid), \
                    array_to_string(c.reloptions, ',') \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind IN ('v', 'm') AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, c.relname",
            list,
            not_extension_owned("c.oid")
        ),
    )?;
    for row in &rows {
        let definition = text(row, 3);
        // Round-trip the pretty-printed definition through the parser so
        // it matches what the desired side produced for the same query.
        let canonical = parser::reparse_select(&definition).unwrap_or(definition);
        let options = text(row, 4);
        catalog.insert_view(View {
            name: ObjectName::qualified(text(row, 0), text(row, 1)),
            definition: normalize::canonical_body(&canonical),
            materialized: text(row, 2) == "m",
            check_option: if options.contains("check_option=cascaded") {
                CheckOption::Cascaded
            } else if options.contains("check_option=local") {
                CheckOption::Local
            } else {
                CheckOption::None
            },
            security_barrier: options.contains("security_barrier=true"),
        });
    }
    Ok(())
}

fn introspect_functions(
    client: &mut dyn DbClient,
    list: &str,
    catalog: &mut Catalog,
) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, p.proname, pg_get_function_arguments(p.oid), \
                    pg_get_function_result(p.oid), l.lanname, p.prosrc, \
                    p.provolatile, p.proisstrict, p.prokind \
             FROM pg_proc p \
             JOIN pg_namespace n ON n.oid = p.pronamespace \
             JOIN pg_language l ON l.oid = p.prolang \
             WHERE p.prokind IN ('f', 'p') AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, p.proname",
            list,
            not_extension_owned("p.oid")
        ),
    )?;
    for row in &rows {
        let params = parse_function_arguments(&text(row, 2));
        let returns_raw = text(row, 3);
        let kind = if text(row, 8) == "p" {
            RoutineKind::Procedure
        } else {
            RoutineKind::Function
        };
        let returns = if kind == RoutineKind::Procedure || returns_raw.is_empty() {
            None
        } else {
            // SETOF folds away: the desired-side parser ignores it too.
            let base = returns_raw
                .strip_prefix("SETOF ")
                .unwrap_or(&returns_raw);
            Some(parse_type_text(base))
        };
        catalog.insert_function(Function {
            name: ObjectName::qualified(text(row, 0), text(row, 1)),
            kind,
            params,
            returns,
            language: text(row, 4),
            body: normalize::canonical_body(&text(row, 5)),
            volatility: match text(row, 6).as_str() {
                "i" => Volatility::Immutable,
                "s" => Volatility::Stable,
                _ => Volatility::Volatile,
            },
            strict: boolean(row, 7),
        });
    }
    Ok(())
}

/// Parse `pg_get_function_arguments` output: a comma-separated list of
/// `[mode] [name] type` items, where type may be a multiword name with a
/// modifier (`character varying(10)`).
fn parse_function_arguments(args: &str) -> Vec<FunctionParam> {
    if args.trim().is_empty() {
        return Vec::new();
    }

    // Split on top-level commas only (modifiers contain commas).
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());

    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|part| {
            let mut tokens: Vec<&str> = part.split_whitespace().collect();
            let mode = match tokens.first().copied() {
                Some("OUT") => {
                    tokens.remove(0);
                    ParamMode::Out
                }
                Some("INOUT") => {
                    tokens.remove(0);
                    ParamMode::InOut
                }
                Some("VARIADIC") => {
                    tokens.remove(0);
                    ParamMode::Variadic
                }
                Some("IN") => {
                    tokens.remove(0);
                    ParamMode::In
                }
                _ => ParamMode::In,
            };
            let (name, type_text) = if tokens.len() > 1 && !is_type_phrase(&tokens) {
                (Some(tokens[0].to_string()), tokens[1..].join(" "))
            } else {
                (None, tokens.join(" "))
            };
            FunctionParam {
                name: name.map(|n| n.replace('"', "")),
                type_name: parse_type_text(&type_text),
                mode,
            }
        })
        .collect()
}

/// Is the whole token list a type name (as opposed to `name type...`)?
/// Single tokens always are; multiword phrases are checked against the
/// known multiword type names.
fn is_type_phrase(tokens: &[&str]) -> bool {
    if tokens.len() <= 1 {
        return true;
    }
    let joined = tokens.join(" ").to_lowercase();
    let base = match joined.find('(') {
        Some(open) => {
            let close = joined.rfind(')').unwrap_or(joined.len() - 1);
            format!("{}{}", &joined[..open], &joined[close + 1..])
        }
        None => joined,
    };
    let base = normalize::collapse_spaces(&base);
    matches!(
        base.trim_end_matches("[]").trim(),
        "double precision"
            | "character varying"
            | "timestamp with time zone"
            | "timestamp without time zone"
            | "time with time zone"
            | "time without time zone"
    )
}

fn introspect_triggers(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, pg_get_triggerdef(t.oid) \
             FROM pg_trigger t \
             JOIN pg_class c ON c.oid = t.tgrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE NOT t.tgisinternal AND n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, c.relname, t.tgname",
            list,
            not_extension_owned("t.oid")
        ),
    )?;
    for row in &rows {
        let trigdef = text(row, 2);
        let Ok(decls) = parser::parse_sql(&trigdef) else {
            log::warn!("skipping unmodellable trigger definition: {}", trigdef);
            continue;
        };
        let Some(parser::Located {
            node: Decl::Trigger(mut trigger),
            ..
        }) = decls.into_iter().next()
        else {
            continue;
        };
        trigger.table.set_default_schema(&text(row, 0));
        trigger.function.set_default_schema(&text(row, 0));
        catalog.insert_trigger(trigger);
    }
    Ok(())
}

fn introspect_comments(client: &mut dyn DbClient, list: &str, catalog: &mut Catalog) -> Result<()> {
    // Relations and their columns (tables, views, matviews, indexes,
    // sequences) via pg_class; objsubid > 0 means a column.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, c.relkind, d.objsubid, a.attname, d.description \
             FROM pg_description d \
             JOIN pg_class c ON c.oid = d.objoid AND d.classoid = 'pg_class'::regclass \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             LEFT JOIN pg_attribute a \
               ON a.attrelid = c.oid AND a.attnum = d.objsubid AND d.objsubid > 0 \
             WHERE n.nspname IN ({}) AND {} \
             ORDER BY n.nspname, c.relname, d.objsubid",
            list,
            not_extension_owned("c.oid")
        ),
    )?;
    for row in &rows {
        let schema = text(row, 0);
        let relname = text(row, 1);
        let relkind = text(row, 2);
        let objsubid = int(row, 3);
        let description = text(row, 5);
        let key = if objsubid > 0 {
            CommentKey::new(
                CommentKind::Column,
                format!("{}.{}.{}", schema, relname, text(row, 4)),
            )
        } else {
            let kind = match relkind.as_str() {
                "r" => CommentKind::Table,
                "v" => CommentKind::View,
                "m" => CommentKind::MaterializedView,
                "i" => CommentKind::Index,
                "S" => CommentKind::Sequence,
                _ => continue,
            };
            CommentKey::new(kind, format!("{}.{}", schema, relname))
        };
        catalog.insert_comment(key, description);
    }

    // Enum types.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, t.typname, d.description \
             FROM pg_description d \
             JOIN pg_type t ON t.oid = d.objoid AND d.classoid = 'pg_type'::regclass \
             JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname IN ({}) AND {}",
            list,
            not_extension_owned("t.oid")
        ),
    )?;
    for row in &rows {
        catalog.insert_comment(
            CommentKey::new(
                CommentKind::Type,
                format!("{}.{}", text(row, 0), text(row, 1)),
            ),
            text(row, 2),
        );
    }

    // Functions and procedures.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, p.proname, d.description \
             FROM pg_description d \
             JOIN pg_proc p ON p.oid = d.objoid AND d.classoid = 'pg_proc'::regclass \
             JOIN pg_namespace n ON n.oid = p.pronamespace \
             WHERE n.nspname IN ({}) AND {}",
            list,
            not_extension_owned("p.oid")
        ),
    )?;
    for row in &rows {
        catalog.insert_comment(
            CommentKey::new(
                CommentKind::Function,
                format!("{}.{}", text(row, 0), text(row, 1)),
            ),
            text(row, 2),
        );
    }

    // Triggers.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, c.relname, t.tgname, d.description \
             FROM pg_description d \
             JOIN pg_trigger t ON t.oid = d.objoid AND d.classoid = 'pg_trigger'::regclass \
             JOIN pg_class c ON c.oid = t.tgrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname IN ({})",
            list
        ),
    )?;
    for row in &rows {
        catalog.insert_comment(
            CommentKey::new(
                CommentKind::Trigger,
                format!("{}.{}.{}", text(row, 0), text(row, 1), text(row, 2)),
            ),
            text(row, 3),
        );
    }

    // Schemas.
    let rows = run(
        client,
        &format!(
            "SELECT n.nspname, d.description \
             FROM pg_description d \
             JOIN pg_namespace n ON n.oid = d.objoid \
              AND d.classoid = 'pg_namespace'::regclass \
             WHERE n.nspname IN ({})",
            list
        ),
    )?;
    for row in &rows {
        catalog.insert_comment(
            CommentKey::new(CommentKind::Schema, text(row, 0)),
            text(row, 1),
        );
    }

    // Extensions.
    let rows = run(
        client,
        "SELECT e.extname, d.description \
         FROM pg_description d \
         JOIN pg_extension e ON e.oid = d.objoid \
          AND d.classoid = 'pg_extension'::regclass \
         WHERE e.extname <> 'plpgsql'",
    )?;
    for row in &rows {
        catalog.insert_comment(
            CommentKey::new(CommentKind::Extension, text(row, 0)),
            text(row, 1),
        );
    }

    Ok(())
}
