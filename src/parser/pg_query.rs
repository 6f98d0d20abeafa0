//! pg_query AST to declaration IR conversion.
//!
//! Converts the pg_query crate's PostgreSQL AST into [`Decl`] values with
//! every stored string already in canonical form. Statements that are not
//! part of a declarative schema (DML, GRANT, DROP, ALTER, DO blocks) are
//! rejected — desired state is CREATE/COMMENT only.

use pg_query::NodeEnum;
use pg_query::protobuf;

use crate::catalog::types::*;
use crate::error::Error;
use crate::normalize;
use crate::parser::ir::{CommentDecl, Decl, Located, SourceSpan};


/// Trigger timing/event bits from PostgreSQL's trigger.h.
const TRIGGER_TYPE_BEFORE: i32 = 1 << 1;
const TRIGGER_TYPE_INSERT: i32 = 1 << 2;
const TRIGGER_TYPE_DELETE: i32 = 1 << 3;
const TRIGGER_TYPE_UPDATE: i32 = 1 << 4;
const TRIGGER_TYPE_TRUNCATE: i32 = 1 << 5;
const TRIGGER_TYPE_INSTEAD: i32 = 1 << 6;

/// Parse a desired-state SQL source into located declarations.
///
/// Statement order is preserved; forward references are fine (assembly
/// resolves them). Line numbers in the returned spans are 1-based.
pub fn parse_sql(source: &str) -> Result<Vec<Located<Decl>>, Error> {
    let result = match pg_query::parse(source) {
        Ok(r) => r,
        Err(e) => return Err(parse_error(source, &e)),
    };

    let mut decls = Vec::new();

    for raw_stmt in &result.protobuf.stmts {
        let start_offset = raw_stmt.stmt_location as usize;
        let end_offset = if raw_stmt.stmt_len > 0 {
            start_offset + raw_stmt.stmt_len as usize
        } else {
            source.len()
        };
        // pg_query may include leading whitespace in stmt_location. Skip it
        // to find the actual first token for accurate line reporting.
        let token_start = source[start_offset..]
            .find(|c: char| !c.is_whitespace())
            .map(|i| start_offset + i)
            .unwrap_or(start_offset);
        let start_line = byte_offset_to_line(source, token_start);
        let end_line = byte_offset_to_line(source, end_offset.saturating_sub(1).max(start_offset));

        let span = SourceSpan {
            start_line,
            end_line,
            start_offset,
            end_offset,
        };

        let Some(node_enum) = raw_stmt.stmt.as_ref().and_then(|s| s.node.as_ref()) else {
            continue;
        };

        let decl = convert_node(node_enum).map_err(|message| Error::Parse {
            message,
            line: start_line,
            column: 1,
        })?;

        decls.push(Located { node: decl, span });
    }

    Ok(decls)
}

/// Map a pg_query error to [`Error::Parse`], locating the offending token
/// in the source when the message names one (`… at or near "tok"`).
fn parse_error(source: &str, err: &pg_query::Error) -> Error {
    let message = err.to_string();
    let (line, column) = match message.split("at or near \"").nth(1) {
        Some(rest) => match rest.split('"').next() {
            Some(token) if !token.is_empty() => match source.find(token) {
                Some(offset) => offset_to_line_col(source, offset),
                None => (1, 1),
            },
            _ => (1, 1),
        },
        None => (1, 1),
    };
    Error::Parse {
        message,
        line,
        column,
    }
}

fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    let clamped = offset.min(source.len());
    source[..clamped].matches('\n').count() + 1
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let line = source[..clamped].matches('\n').count() + 1;
    let column = source[..clamped]
        .rfind('\n')
        .map(|nl| clamped - nl)
        .unwrap_or(clamped + 1);
    (line, column)
}

/// Convert a single statement node. Returns an error message for statement
/// kinds that have no place in a declarative schema.
fn convert_node(node: &NodeEnum) -> Result<Decl, String> {
    match node {
        NodeEnum::CreateSchemaStmt(s) => Ok(Decl::Schema(s.schemaname.clone())),
        NodeEnum::CreateExtensionStmt(s) => Ok(convert_create_extension(s)),
        NodeEnum::CreateEnumStmt(s) => Ok(convert_create_enum(s)),
        NodeEnum::CreateSeqStmt(s) => convert_create_sequence(s),
        NodeEnum::CreateStmt(s) => convert_create_table(s),
        NodeEnum::IndexStmt(s) => convert_create_index(s),
        NodeEnum::ViewStmt(s) => Ok(convert_create_view(s)),
        NodeEnum::CreateTableAsStmt(s) => convert_create_table_as(s),
        NodeEnum::CreateFunctionStmt(s) => convert_create_function(s),
        NodeEnum::CreateTrigStmt(s) => convert_create_trigger(s),
        NodeEnum::CommentStmt(s) => convert_comment(s),
        other => Err(format!(
            "unsupported statement ({}); the desired schema must contain only \
             CREATE and COMMENT statements",
            stmt_kind_name(other)
        )),
    }
}

fn stmt_kind_name(node: &NodeEnum) -> &'static str {
    match node {
        NodeEnum::SelectStmt(_) => "SELECT",
        NodeEnum::InsertStmt(_) => "INSERT",
        NodeEnum::UpdateStmt(_) => "UPDATE",
        NodeEnum::DeleteStmt(_) => "DELETE",
        NodeEnum::DropStmt(_) => "DROP",
        NodeEnum::AlterTableStmt(_) => "ALTER TABLE",
        NodeEnum::AlterEnumStmt(_) => "ALTER TYPE",
        NodeEnum::GrantStmt(_) => "GRANT",
        NodeEnum::TruncateStmt(_) => "TRUNCATE",
        NodeEnum::DoStmt(_) => "DO",
        NodeEnum::TransactionStmt(_) => "transaction control",
        NodeEnum::VariableSetStmt(_) => "SET",
        _ => "statement",
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Convert a `RangeVar` to an [`ObjectName`]. pg_query has already folded
/// unquoted identifiers to lower case.
fn relation_to_object_name(rv: Option<&protobuf::RangeVar>) -> ObjectName {
    match rv {
        Some(rv) if !rv.schemaname.is_empty() => {
            ObjectName::qualified(rv.schemaname.clone(), rv.relname.clone())
        }
        Some(rv) => ObjectName::unqualified(rv.relname.clone()),
        None => ObjectName::unqualified("unknown"),
    }
}

/// Extract the strings from a list of `String` nodes.
fn extract_string_list(nodes: &[protobuf::Node]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .collect()
}

/// A dotted name list (`["public", "users"]`) to [`ObjectName`].
fn name_list_to_object_name(nodes: &[protobuf::Node]) -> ObjectName {
    let parts = extract_string_list(nodes);
    match parts.len() {
        0 => ObjectName::unqualified("unknown"),
        1 => ObjectName::unqualified(parts[0].clone()),
        _ => ObjectName::qualified(parts[0].clone(), parts[1].clone()),
    }
}

fn optional_name(name: &str) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Extract a canonical [`TypeName`] from a pg_query `TypeName` node.
///
/// Returns `(TypeName, Option<SerialKind>)`. Canonical name extraction uses
/// the LAST element of `names[]`, which drops the `pg_catalog` prefix and
/// normalizes most aliases for free; [`normalize::canonical_type`] handles
/// the rest.
fn extract_type_name(tn: Option<&protobuf::TypeName>) -> (TypeName, Option<SerialKind>) {
    let Some(tn) = tn else {
        return (TypeName::simple("unknown"), None);
    };

    // Built-in types arrive as pg_catalog.<name>; drop the prefix. User
    // types keep an explicit schema qualifier so they match what
    // format_type() reports for types outside the search path.
    let parts = extract_string_list(&tn.names);
    let raw = match parts.as_slice() {
        [] => "unknown".to_string(),
        [single] => single.clone(),
        [first, rest @ ..] if first == "pg_catalog" => {
            rest.last().cloned().unwrap_or_else(|| "unknown".to_string())
        }
        parts => parts.join("."),
    }
    .to_lowercase();

    let serial = match raw.as_str() {
        "smallserial" | "serial2" => Some(SerialKind::Small),
        "serial" | "serial4" => Some(SerialKind::Regular),
        "bigserial" | "serial8" => Some(SerialKind::Big),
        _ => None,
    };

    if let Some(kind) = serial {
        return (kind.backing_type(), Some(kind));
    }

    let modifiers = extract_type_modifiers(&tn.typmods);
    let type_name = if tn.array_bounds.is_empty() {
        TypeName::new(raw, modifiers)
    } else {
        TypeName::array_of(raw, modifiers)
    };

    (type_name, None)
}

/// Extract integer modifiers from `TypeName.typmods[]`.
fn extract_type_modifiers(typmods: &[protobuf::Node]) -> Vec<i64> {
    let mut mods = Vec::new();
    for node in typmods {
        if let Some(ref inner) = node.node {
            match inner {
                NodeEnum::Integer(i) => mods.push(i.ival as i64),
                NodeEnum::AConst(ac) => {
                    if let Some(protobuf::a_const::Val::Ival(i)) = &ac.val {
                        mods.push(i.ival as i64);
                    }
                }
                _ => {}
            }
        }
    }
    mods
}

/// Deparse an arbitrary expression node back to SQL text.
///
/// pg_query can only deparse whole statements, so the node is grafted into
/// a `SELECT NULL` template and the `SELECT ` prefix stripped afterwards.
fn deparse_expr(node: &protobuf::Node) -> String {
    let mut parse_result = match pg_query::parse("SELECT NULL") {
        Ok(pr) => pr,
        Err(_) => return format!("{:?}", node.node),
    };

    if let Some(stmt) = parse_result.protobuf.stmts.first_mut()
        && let Some(ref mut stmt_node) = stmt.stmt
        && let Some(NodeEnum::SelectStmt(ref mut select)) = stmt_node.node
        && let Some(first_target) = select.target_list.first_mut()
        && let Some(NodeEnum::ResTarget(ref mut res)) = first_target.node
    {
        res.val = Some(Box::new(node.clone()));
    }

    match pg_query::deparse(&parse_result.protobuf) {
        Ok(sql) => sql.strip_prefix("SELECT ").unwrap_or(&sql).to_string(),
        Err(_) => format!("{:?}", node.node),
    }
}

/// Deparse a whole statement node (used for view SELECT bodies).
fn deparse_stmt(node: &NodeEnum) -> String {
    let mut parse_result = match pg_query::parse("SELECT NULL") {
        Ok(pr) => pr,
        Err(_) => return String::new(),
    };

    if let Some(stmt) = parse_result.protobuf.stmts.first_mut()
        && let Some(ref mut raw) = stmt.stmt
    {
        raw.node = Some(node.clone());
    }

    match pg_query::deparse(&parse_result.protobuf) {
        Ok(sql) => sql,
        Err(_) => String::new(),
    }
}

/// Re-canonicalize a SELECT statement from `pg_get_viewdef` by parsing and
/// deparsing it, so the introspected definition matches what the parser
/// produced for the same query.
pub(crate) fn reparse_select(sql: &str) -> Option<String> {
    let trimmed = sql.trim().trim_end_matches(';');
    let result = pg_query::parse(trimmed).ok()?;
    let stmt = result.protobuf.stmts.first()?;
    let node = stmt.stmt.as_ref()?.node.as_ref()?;
    Some(deparse_stmt(node))
}

// ---------------------------------------------------------------------------
// CREATE TABLE
// ---------------------------------------------------------------------------

/// State accumulated while converting a CREATE TABLE's elements.
struct TableUnderConstruction {
    table: Table,
}

impl TableUnderConstruction {
    fn table_name(&self) -> &str {
        &self.table.name.name
    }

    /// PostgreSQL's default name for an anonymous constraint.
    fn default_name(&self, columns: &[String], suffix: &str) -> String {
        if columns.is_empty() {
            format!("{}_{}", self.table_name(), suffix)
        } else {
            format!("{}_{}_{}", self.table_name(), columns.join("_"), suffix)
        }
    }

    fn add_primary_key(&mut self, name: Option<String>, columns: Vec<String>) {
        // NOT NULL is implied for PK columns.
        for col_name in &columns {
            if let Some(col) = self.table.columns.iter_mut().find(|c| &c.name == col_name) {
                col.nullable = false;
            }
        }
        let name = name.unwrap_or_else(|| format!("{}_pkey", self.table_name()));
        self.table.primary_key = Some(PrimaryKey { name, columns });
    }

    fn add_unique(&mut self, name: Option<String>, columns: Vec<String>) {
        let name = name.unwrap_or_else(|| self.default_name(&columns, "key"));
        self.table.uniques.push(UniqueConstraint { name, columns });
    }

    fn add_check(&mut self, name: Option<String>, expression: String, column: Option<&str>) {
        // Anonymous table-level checks take the first referenced column,
        // matching the server's generated names (`t_amount_check`).
        let derived;
        let column = match column {
            Some(col) => Some(col),
            None => {
                derived = self.first_column_in(&expression);
                derived.as_deref()
            }
        };
        let name = name.unwrap_or_else(|| match column {
            Some(col) => format!("{}_{}_check", self.table_name(), col),
            None => format!("{}_check", self.table_name()),
        });
        self.table.checks.push(CheckConstraint { name, expression });
    }

    /// First identifier in the expression that names a declared column.
    fn first_column_in(&self, expression: &str) -> Option<String> {
        expression
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .find(|token| self.table.columns.iter().any(|c| c.name == *token))
            .map(|t| t.to_string())
    }

    fn add_foreign_key(&mut self, fk: PartialForeignKey) {
        let name = fk
            .name
            .unwrap_or_else(|| self.default_name(&fk.columns, "fkey"));
        self.table.foreign_keys.push(ForeignKey {
            name,
            columns: fk.columns,
            ref_table: fk.ref_table,
            ref_columns: fk.ref_columns,
            on_delete: fk.on_delete,
            on_update: fk.on_update,
            deferrable: fk.deferrable,
            initially_deferred: fk.initially_deferred,
        });
    }
}

struct PartialForeignKey {
    name: Option<String>,
    columns: Vec<String>,
    ref_table: ObjectName,
    ref_columns: Vec<String>,
    on_delete: RefAction,
    on_update: RefAction,
    deferrable: bool,
    initially_deferred: bool,
}

fn convert_create_table(create: &protobuf::CreateStmt) -> Result<Decl, String> {
    if create.partspec.is_some() || create.partbound.is_some() {
        return Err("partitioned tables are not supported".to_string());
    }
    if !create.inh_relations.is_empty() {
        return Err("table inheritance is not supported".to_string());
    }

    let name = relation_to_object_name(create.relation.as_ref());
    let mut under = TableUnderConstruction {
        table: Table::new(name),
    };

    for elt in &create.table_elts {
        match elt.node.as_ref() {
            Some(NodeEnum::ColumnDef(col)) => convert_column_def(col, &mut under)?,
            Some(NodeEnum::Constraint(con)) => convert_table_constraint(con, &mut under, None)?,
            _ => {}
        }
    }

    Ok(Decl::Table(under.table))
}

/// Convert a column definition, pushing the column and promoting inline
/// constraints to table level.
fn convert_column_def(
    col: &protobuf::ColumnDef,
    under: &mut TableUnderConstruction,
) -> Result<(), String> {
    let col_name = col.colname.clone();
    let (type_name, serial) = extract_type_name(col.type_name.as_ref());

    let mut column = Column {
        name: col_name.clone(),
        type_name,
        nullable: serial.is_none(),
        default: None,
        serial,
        identity: None,
    };

    for con_node in &col.constraints {
        let Some(NodeEnum::Constraint(con)) = con_node.node.as_ref() else {
            continue;
        };

        match con.contype() {
            protobuf::ConstrType::ConstrNotnull => column.nullable = false,
            protobuf::ConstrType::ConstrNull => column.nullable = true,
            protobuf::ConstrType::ConstrDefault => {
                if column.serial.is_none()
                    && let Some(ref expr) = con.raw_expr
                {
                    column.default = Some(normalize::canonical_default(&deparse_expr(expr)));
                }
            }
            protobuf::ConstrType::ConstrIdentity => {
                column.identity = Some(match con.generated_when.as_str() {
                    "a" => IdentityKind::Always,
                    _ => IdentityKind::ByDefault,
                });
                column.nullable = false;
            }
            protobuf::ConstrType::ConstrPrimary => {
                column.nullable = false;
                under.add_primary_key(optional_name(&con.conname), vec![col_name.clone()]);
            }
            protobuf::ConstrType::ConstrUnique => {
                under.add_unique(optional_name(&con.conname), vec![col_name.clone()]);
            }
            protobuf::ConstrType::ConstrCheck => {
                let expression = con
                    .raw_expr
                    .as_ref()
                    .map(|e| normalize::canonical_check_expr(&deparse_expr(e)))
                    .unwrap_or_default();
                under.add_check(optional_name(&con.conname), expression, Some(&col_name));
            }
            protobuf::ConstrType::ConstrForeign => {
                let fk = convert_foreign_key(con, vec![col_name.clone()]);
                under.add_foreign_key(fk);
            }
            _ => {}
        }
    }

    // serial implies NOT NULL regardless of explicit constraints.
    if column.serial.is_some() {
        column.nullable = false;
        column.default = None;
    }

    under.table.columns.push(column);
    Ok(())
}

/// Convert a table-level constraint.
fn convert_table_constraint(
    con: &protobuf::Constraint,
    under: &mut TableUnderConstruction,
    single_column: Option<&str>,
) -> Result<(), String> {
    match con.contype() {
        protobuf::ConstrType::ConstrPrimary => {
            let columns = extract_string_list(&con.keys);
            under.add_primary_key(optional_name(&con.conname), columns);
        }
        protobuf::ConstrType::ConstrUnique => {
            let columns = extract_string_list(&con.keys);
            under.add_unique(optional_name(&con.conname), columns);
        }
        protobuf::ConstrType::ConstrCheck => {
            let expression = con
                .raw_expr
                .as_ref()
                .map(|e| normalize::canonical_check_expr(&deparse_expr(e)))
                .unwrap_or_default();
            under.add_check(optional_name(&con.conname), expression, single_column);
        }
        protobuf::ConstrType::ConstrForeign => {
            let columns = extract_string_list(&con.fk_attrs);
            let fk = convert_foreign_key(con, columns);
            under.add_foreign_key(fk);
        }
        protobuf::ConstrType::ConstrExclusion => {
            return Err("EXCLUDE constraints are not supported".to_string());
        }
        _ => {}
    }
    Ok(())
}

/// Referential action codes from pg_query ('a', 'r', 'c', 'n', 'd').
fn ref_action(code: &str) -> RefAction {
    match code {
        "r" => RefAction::Restrict,
        "c" => RefAction::Cascade,
        "n" => RefAction::SetNull,
        "d" => RefAction::SetDefault,
        _ => RefAction::NoAction,
    }
}

fn convert_foreign_key(con: &protobuf::Constraint, columns: Vec<String>) -> PartialForeignKey {
    PartialForeignKey {
        name: optional_name(&con.conname),
        columns,
        ref_table: relation_to_object_name(con.pktable.as_ref()),
        ref_columns: extract_string_list(&con.pk_attrs),
        on_delete: ref_action(&con.fk_del_action),
        on_update: ref_action(&con.fk_upd_action),
        deferrable: con.deferrable,
        initially_deferred: con.initdeferred,
    }
}

// ---------------------------------------------------------------------------
// CREATE INDEX
// ---------------------------------------------------------------------------

fn convert_create_index(idx: &protobuf::IndexStmt) -> Result<Decl, String> {
    let table = relation_to_object_name(idx.relation.as_ref());

    let mut columns = Vec::new();
    for param in &idx.index_params {
        let Some(NodeEnum::IndexElem(elem)) = param.node.as_ref() else {
            continue;
        };
        let expr = if !elem.name.is_empty() {
            IndexExpr::Column(elem.name.clone())
        } else if let Some(ref e) = elem.expr {
            IndexExpr::Expression(normalize::canonical_index_expr(&deparse_expr(e)))
        } else {
            continue;
        };
        let direction = match elem.ordering() {
            protobuf::SortByDir::SortbyDesc => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        let opclass = extract_string_list(&elem.opclass)
            .last()
            .map(|s| s.to_lowercase());
        columns.push(IndexColumn {
            expr,
            direction,
            opclass,
        });
    }

    let name = if idx.idxname.is_empty() {
        default_index_name(&table, &columns)
    } else {
        idx.idxname.clone()
    };

    let method = if idx.access_method.is_empty() {
        IndexMethod::Btree
    } else {
        idx.access_method
            .to_lowercase()
            .parse()
            .map_err(|_| format!("unsupported index method {}", idx.access_method))?
    };

    let predicate = idx
        .where_clause
        .as_ref()
        .map(|w| normalize::canonical_check_expr(&deparse_expr(w)));

    let mut storage_params: Vec<(String, String)> = idx
        .options
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(NodeEnum::DefElem(de)) => {
                let value = de.arg.as_ref().map(def_elem_value).unwrap_or_default();
                Some((de.defname.to_lowercase(), value))
            }
            _ => None,
        })
        .collect();
    storage_params.sort();

    Ok(Decl::Index(Index {
        name,
        table,
        columns,
        unique: idx.unique,
        method,
        predicate,
        storage_params,
        origin: IndexOrigin::Declared,
    }))
}

/// PostgreSQL's default index name: `<table>_<cols>_idx`.
fn default_index_name(table: &ObjectName, columns: &[IndexColumn]) -> String {
    let cols: Vec<&str> = columns
        .iter()
        .filter_map(|c| c.expr.column_name())
        .collect();
    if cols.is_empty() {
        format!("{}_expr_idx", table.name)
    } else {
        format!("{}_{}_idx", table.name, cols.join("_"))
    }
}

// ---------------------------------------------------------------------------
// CREATE VIEW / CREATE MATERIALIZED VIEW
// ---------------------------------------------------------------------------

fn convert_create_view(vs: &protobuf::ViewStmt) -> Decl {
    let name = relation_to_object_name(vs.view.as_ref());
    let definition = vs
        .query
        .as_ref()
        .and_then(|q| q.node.as_ref())
        .map(deparse_stmt)
        .unwrap_or_default();

    let check_option = match vs.with_check_option() {
        protobuf::ViewCheckOption::LocalCheckOption => CheckOption::Local,
        protobuf::ViewCheckOption::CascadedCheckOption => CheckOption::Cascaded,
        _ => CheckOption::None,
    };

    let security_barrier = vs.options.iter().any(|n| match n.node.as_ref() {
        Some(NodeEnum::DefElem(de)) => {
            de.defname.eq_ignore_ascii_case("security_barrier")
                && def_elem_bool(de.arg.as_deref())
        }
        _ => false,
    });

    Decl::View(View {
        name,
        definition: normalize::canonical_body(&definition),
        materialized: false,
        check_option,
        security_barrier,
    })
}

fn convert_create_table_as(ctas: &protobuf::CreateTableAsStmt) -> Result<Decl, String> {
    if ctas.objtype() != protobuf::ObjectType::ObjectMatview {
        return Err("CREATE TABLE AS is not supported; declare the table and load data separately"
            .to_string());
    }

    let name = ctas
        .into
        .as_ref()
        .map(|into| relation_to_object_name(into.rel.as_ref()))
        .unwrap_or_else(|| ObjectName::unqualified("unknown"));

    let definition = ctas
        .query
        .as_ref()
        .and_then(|q| q.node.as_ref())
        .map(deparse_stmt)
        .unwrap_or_default();

    Ok(Decl::View(View {
        name,
        definition: normalize::canonical_body(&definition),
        materialized: true,
        check_option: CheckOption::None,
        security_barrier: false,
    }))
}

// ---------------------------------------------------------------------------
// CREATE TYPE ... AS ENUM
// ---------------------------------------------------------------------------

fn convert_create_enum(stmt: &protobuf::CreateEnumStmt) -> Decl {
    Decl::Enum(EnumType {
        name: name_list_to_object_name(&stmt.type_name),
        values: extract_string_list(&stmt.vals),
    })
}

// ---------------------------------------------------------------------------
// CREATE SEQUENCE
// ---------------------------------------------------------------------------

fn convert_create_sequence(stmt: &protobuf::CreateSeqStmt) -> Result<Decl, String> {
    let name = relation_to_object_name(stmt.sequence.as_ref());
    let mut seq = Sequence::with_defaults(name);

    for opt in &stmt.options {
        let Some(NodeEnum::DefElem(de)) = opt.node.as_ref() else {
            continue;
        };
        let int_arg = de.arg.as_ref().and_then(|a| def_elem_int(a));
        match de.defname.to_lowercase().as_str() {
            "start" => seq.start = int_arg.unwrap_or(1),
            "increment" => seq.increment = int_arg.unwrap_or(1),
            "minvalue" => seq.min_value = int_arg,
            "maxvalue" => seq.max_value = int_arg,
            "cache" => seq.cache = int_arg.unwrap_or(1),
            "cycle" => seq.cycle = def_elem_bool(de.arg.as_deref()),
            "owned_by" | "as" => {}
            other => return Err(format!("unsupported sequence option {}", other)),
        }
    }

    Ok(Decl::Sequence(seq))
}

fn def_elem_int(node: &protobuf::Node) -> Option<i64> {
    match node.node.as_ref() {
        Some(NodeEnum::Integer(i)) => Some(i.ival as i64),
        Some(NodeEnum::Float(f)) => f.fval.parse().ok(),
        _ => None,
    }
}

fn def_elem_bool(node: Option<&protobuf::Node>) -> bool {
    match node.and_then(|n| n.node.as_ref()) {
        Some(NodeEnum::Boolean(b)) => b.boolval,
        Some(NodeEnum::Integer(i)) => i.ival != 0,
        Some(NodeEnum::String(s)) => matches!(s.sval.as_str(), "true" | "on" | "1"),
        // Bare `CYCLE` / `security_barrier` with no argument means true.
        None => true,
        _ => false,
    }
}

fn def_elem_value(node: &protobuf::Node) -> String {
    match node.node.as_ref() {
        Some(NodeEnum::Integer(i)) => i.ival.to_string(),
        Some(NodeEnum::Float(f)) => f.fval.clone(),
        Some(NodeEnum::String(s)) => s.sval.clone(),
        Some(NodeEnum::Boolean(b)) => b.boolval.to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// CREATE EXTENSION
// ---------------------------------------------------------------------------

fn convert_create_extension(stmt: &protobuf::CreateExtensionStmt) -> Decl {
    let schema = stmt.options.iter().find_map(|n| match n.node.as_ref() {
        Some(NodeEnum::DefElem(de)) if de.defname.eq_ignore_ascii_case("schema") => {
            de.arg.as_ref().map(|a| def_elem_value(a))
        }
        _ => None,
    });

    Decl::Extension(Extension {
        name: stmt.extname.clone(),
        schema,
    })
}

// ---------------------------------------------------------------------------
// CREATE FUNCTION / CREATE PROCEDURE
// ---------------------------------------------------------------------------

fn convert_create_function(stmt: &protobuf::CreateFunctionStmt) -> Result<Decl, String> {
    let name = name_list_to_object_name(&stmt.funcname);

    let mut params = Vec::new();
    for p in &stmt.parameters {
        let Some(NodeEnum::FunctionParameter(fp)) = p.node.as_ref() else {
            continue;
        };
        let mode = match fp.mode() {
            protobuf::FunctionParameterMode::FuncParamOut => ParamMode::Out,
            protobuf::FunctionParameterMode::FuncParamInout => ParamMode::InOut,
            protobuf::FunctionParameterMode::FuncParamVariadic => ParamMode::Variadic,
            protobuf::FunctionParameterMode::FuncParamTable => {
                return Err("RETURNS TABLE parameters are not supported".to_string());
            }
            _ => ParamMode::In,
        };
        let (type_name, _) = extract_type_name(fp.arg_type.as_ref());
        params.push(FunctionParam {
            name: optional_name(&fp.name),
            type_name,
            mode,
        });
    }

    let returns = if stmt.is_procedure {
        None
    } else {
        let (tn, _) = extract_type_name(stmt.return_type.as_ref());
        Some(tn)
    };

    let mut language = "sql".to_string();
    let mut body = None;
    let mut volatility = Volatility::Volatile;
    let mut strict = false;

    for opt in &stmt.options {
        let Some(NodeEnum::DefElem(de)) = opt.node.as_ref() else {
            continue;
        };
        match de.defname.to_lowercase().as_str() {
            "language" => {
                if let Some(arg) = de.arg.as_ref() {
                    language = def_elem_value(arg).to_lowercase();
                }
            }
            "as" => {
                if let Some(arg) = de.arg.as_ref()
                    && let Some(NodeEnum::List(list)) = arg.node.as_ref()
                {
                    body = extract_string_list(&list.items).into_iter().next_back();
                }
            }
            "volatility" => {
                if let Some(arg) = de.arg.as_ref() {
                    volatility = match def_elem_value(arg).as_str() {
                        "immutable" => Volatility::Immutable,
                        "stable" => Volatility::Stable,
                        _ => Volatility::Volatile,
                    };
                }
            }
            "strict" => strict = def_elem_bool(de.arg.as_deref()),
            _ => {}
        }
    }

    // SQL-standard body (BEGIN ATOMIC ... END) arrives outside options.
    let body = match body {
        Some(b) => b,
        None => match stmt.sql_body.as_ref().and_then(|b| b.node.as_ref()) {
            Some(node) => deparse_stmt(node),
            None => return Err(format!("function {} has no body", name)),
        },
    };

    Ok(Decl::Function(Function {
        name,
        kind: if stmt.is_procedure {
            RoutineKind::Procedure
        } else {
            RoutineKind::Function
        },
        params,
        returns,
        language,
        body: normalize::canonical_body(&body),
        volatility,
        strict,
    }))
}

// ---------------------------------------------------------------------------
// CREATE TRIGGER
// ---------------------------------------------------------------------------

fn convert_create_trigger(stmt: &protobuf::CreateTrigStmt) -> Result<Decl, String> {
    if stmt.isconstraint {
        return Err("constraint triggers are not supported".to_string());
    }

    let timing = if stmt.timing & TRIGGER_TYPE_BEFORE != 0 {
        TriggerTiming::Before
    } else if stmt.timing & TRIGGER_TYPE_INSTEAD != 0 {
        TriggerTiming::InsteadOf
    } else {
        TriggerTiming::After
    };

    // Canonical event order: INSERT, UPDATE, DELETE, TRUNCATE.
    let mut events = Vec::new();
    if stmt.events & TRIGGER_TYPE_INSERT != 0 {
        events.push(TriggerEvent::Insert);
    }
    if stmt.events & TRIGGER_TYPE_UPDATE != 0 {
        let mut cols = extract_string_list(&stmt.columns);
        cols.sort();
        events.push(TriggerEvent::Update(cols));
    }
    if stmt.events & TRIGGER_TYPE_DELETE != 0 {
        events.push(TriggerEvent::Delete);
    }
    if stmt.events & TRIGGER_TYPE_TRUNCATE != 0 {
        events.push(TriggerEvent::Truncate);
    }

    let when = stmt
        .when_clause
        .as_ref()
        .map(|w| normalize::canonical_check_expr(&deparse_expr(w)));

    Ok(Decl::Trigger(Trigger {
        name: stmt.trigname.clone(),
        table: relation_to_object_name(stmt.relation.as_ref()),
        timing,
        events,
        level: if stmt.row {
            TriggerLevel::Row
        } else {
            TriggerLevel::Statement
        },
        when,
        function: name_list_to_object_name(&stmt.funcname),
        args: stmt
            .args
            .iter()
            .filter_map(|n| match n.node.as_ref() {
                Some(NodeEnum::String(s)) => Some(s.sval.clone()),
                _ => None,
            })
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// COMMENT ON
// ---------------------------------------------------------------------------

fn convert_comment(stmt: &protobuf::CommentStmt) -> Result<Decl, String> {
    let kind = match stmt.objtype() {
        protobuf::ObjectType::ObjectSchema => CommentKind::Schema,
        protobuf::ObjectType::ObjectExtension => CommentKind::Extension,
        protobuf::ObjectType::ObjectType => CommentKind::Type,
        protobuf::ObjectType::ObjectSequence => CommentKind::Sequence,
        protobuf::ObjectType::ObjectTable => CommentKind::Table,
        protobuf::ObjectType::ObjectColumn => CommentKind::Column,
        protobuf::ObjectType::ObjectIndex => CommentKind::Index,
        protobuf::ObjectType::ObjectView => CommentKind::View,
        protobuf::ObjectType::ObjectMatview => CommentKind::MaterializedView,
        protobuf::ObjectType::ObjectFunction => CommentKind::Function,
        protobuf::ObjectType::ObjectTrigger => CommentKind::Trigger,
        other => return Err(format!("COMMENT ON {:?} is not supported", other)),
    };

    let path = match stmt.object.as_ref().and_then(|o| o.node.as_ref()) {
        Some(NodeEnum::List(list)) => extract_string_list(&list.items),
        Some(NodeEnum::String(s)) => vec![s.sval.clone()],
        Some(NodeEnum::TypeName(tn)) => extract_string_list(&tn.names),
        Some(NodeEnum::ObjectWithArgs(owa)) => extract_string_list(&owa.objname),
        _ => return Err("unsupported COMMENT target".to_string()),
    };

    // `COMMENT ON … IS NULL` arrives as an empty comment string.
    let text = if stmt.comment.is_empty() {
        None
    } else {
        Some(stmt.comment.clone())
    };

    Ok(Decl::Comment(CommentDecl { kind, path, text }))
}
