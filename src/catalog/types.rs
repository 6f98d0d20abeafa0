//! Catalog object types.
//!
//! The catalog is a snapshot of one database's schema in canonical form.
//! The parser and the introspector both produce these types, so every
//! value-bearing field (type names, defaults, expressions, bodies) holds
//! the canonical form from [`crate::normalize`] — the differ compares them
//! verbatim.

use std::fmt;

use crate::normalize;

/// Schema-qualified name. `schema` is `None` only transiently during
/// parsing; assembly qualifies every name with the default schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    pub fn set_default_schema(&mut self, default_schema: &str) {
        if self.schema.is_none() {
            self.schema = Some(default_schema.to_string());
        }
    }

    /// Key used for catalog maps: `schema.name`, or bare `name` before
    /// qualification.
    pub fn key(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s, self.name),
            None => self.name.clone(),
        }
    }

    /// Quoted, schema-qualified form for emission into SQL.
    pub fn sql(&self) -> String {
        match &self.schema {
            Some(s) => format!(
                "{}.{}",
                normalize::quote_ident(s),
                normalize::quote_ident(&self.name)
            ),
            None => normalize::quote_ident(&self.name),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(s) => write!(f, "{}.{}", s, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Canonical type name plus modifiers. Construction goes through
/// [`TypeName::new`] so alias collapsing is unavoidable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    name: String,
    modifiers: Vec<i64>,
    pub array: bool,
}

impl TypeName {
    pub fn new(name: impl AsRef<str>, modifiers: Vec<i64>) -> Self {
        let (name, modifiers) = normalize::canonical_type(name.as_ref(), &modifiers);
        Self {
            name,
            modifiers,
            array: false,
        }
    }

    pub fn simple(name: impl AsRef<str>) -> Self {
        Self::new(name, vec![])
    }

    pub fn array_of(name: impl AsRef<str>, modifiers: Vec<i64>) -> Self {
        let mut tn = Self::new(name, modifiers);
        tn.array = true;
        tn
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> &[i64] {
        &self.modifiers
    }

    /// Same type family for the purpose of ALTER COLUMN TYPE USING
    /// inference: same-family casts are safe without an explicit cast
    /// expression.
    pub fn family(&self) -> TypeFamily {
        match self.name.as_str() {
            "smallint" | "integer" | "bigint" | "numeric" | "real" | "double precision" => {
                TypeFamily::Numeric
            }
            "text" | "character varying" | "character" => TypeFamily::Text,
            "timestamp" | "timestamp with time zone" | "date" | "time" | "time with time zone" => {
                TypeFamily::Temporal
            }
            "boolean" => TypeFamily::Boolean,
            _ => TypeFamily::Other,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.modifiers.is_empty() {
            let mods: Vec<String> = self.modifiers.iter().map(|m| m.to_string()).collect();
            write!(f, "({})", mods.join(", "))?;
        }
        if self.array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Numeric,
    Text,
    Temporal,
    Boolean,
    Other,
}

/// The serial pseudo-types, lowered by the parser and re-detected by the
/// introspector so round-trips are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialKind {
    Small,
    Regular,
    Big,
}

impl SerialKind {
    pub fn backing_type(&self) -> TypeName {
        match self {
            SerialKind::Small => TypeName::simple("smallint"),
            SerialKind::Regular => TypeName::simple("integer"),
            SerialKind::Big => TypeName::simple("bigint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Always,
    ByDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub type_name: TypeName,
    pub nullable: bool,
    /// Canonical default expression. `None` when the column has no default
    /// or is serial (the implicit `nextval` default is part of the serial
    /// marker, not a user default).
    pub default: Option<String>,
    pub serial: Option<SerialKind>,
    pub identity: Option<IdentityKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum RefAction {
    #[default]
    #[strum(serialize = "NO ACTION")]
    NoAction,
    #[strum(serialize = "RESTRICT")]
    Restrict,
    #[strum(serialize = "CASCADE")]
    Cascade,
    #[strum(serialize = "SET NULL")]
    SetNull,
    #[strum(serialize = "SET DEFAULT")]
    SetDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: ObjectName,
    pub ref_columns: Vec<String>,
    pub on_delete: RefAction,
    pub on_update: RefAction,
    pub deferrable: bool,
    pub initially_deferred: bool,
}

impl ForeignKey {
    /// Definition identity: everything except the constraint name.
    pub fn same_definition(&self, other: &ForeignKey) -> bool {
        self.columns == other.columns
            && self.ref_table == other.ref_table
            && self.ref_columns == other.ref_columns
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
            && self.deferrable == other.deferrable
            && self.initially_deferred == other.initially_deferred
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    /// Column order is significant: `(a, b)` and `(b, a)` are different
    /// constraints.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraint {
    pub name: String,
    /// Canonical expression, outer parentheses stripped.
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexExpr {
    /// Plain column reference.
    Column(String),
    /// Parenthesized expression in canonical form.
    Expression(String),
}

impl IndexExpr {
    pub fn column_name(&self) -> Option<&str> {
        match self {
            IndexExpr::Column(name) => Some(name),
            IndexExpr::Expression(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub expr: IndexExpr,
    pub direction: SortDirection,
    /// Operator class, case-folded. `None` means the type's default.
    pub opclass: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum IndexMethod {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
}

/// Where an index came from. Constraint-backing indexes (PK/UNIQUE) are
/// reconciled through their constraints and never diffed as indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexOrigin {
    #[default]
    Declared,
    ConstraintBacking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub table: ObjectName,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub method: IndexMethod,
    /// Canonical WHERE predicate for partial indexes.
    pub predicate: Option<String>,
    /// Storage parameters, name-sorted at assembly for stable comparison.
    pub storage_params: Vec<(String, String)>,
    pub origin: IndexOrigin,
}

impl Index {
    /// Definition identity: everything except the index name and origin.
    pub fn same_definition(&self, other: &Index) -> bool {
        self.table == other.table
            && self.columns == other.columns
            && self.unique == other.unique
            && self.method == other.method
            && self.predicate == other.predicate
            && self.storage_params == other.storage_params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: ObjectName,
    /// Columns in declaration order; names unique within the table.
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(name: ObjectName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: ObjectName,
    /// Ordered labels. Order is identity: appending is safe, anything else
    /// is an unsafe change.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckOption {
    #[default]
    None,
    Local,
    Cascaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: ObjectName,
    /// Canonical SELECT body (whitespace-normalized only).
    pub definition: String,
    pub materialized: bool,
    pub check_option: CheckOption,
    pub security_barrier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    #[default]
    In,
    Out,
    InOut,
    Variadic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: Option<String>,
    pub type_name: TypeName,
    pub mode: ParamMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Volatility {
    #[default]
    #[strum(serialize = "VOLATILE")]
    Volatile,
    #[strum(serialize = "STABLE")]
    Stable,
    #[strum(serialize = "IMMUTABLE")]
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Function,
    Procedure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: ObjectName,
    pub kind: RoutineKind,
    pub params: Vec<FunctionParam>,
    /// `None` for procedures.
    pub returns: Option<TypeName>,
    pub language: String,
    /// Canonical body (whitespace-normalized only).
    pub body: String,
    pub volatility: Volatility,
    pub strict: bool,
}

impl Function {
    /// Identity key: qualified name plus IN-parameter types, mirroring how
    /// the server identifies overloads.
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .params
            .iter()
            .filter(|p| {
                matches!(p.mode, ParamMode::In | ParamMode::InOut | ParamMode::Variadic)
            })
            .map(|p| p.type_name.to_string())
            .collect();
        format!("{}({})", self.name.key(), args.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TriggerTiming {
    #[strum(serialize = "BEFORE")]
    Before,
    #[strum(serialize = "AFTER")]
    After,
    #[strum(serialize = "INSTEAD OF")]
    InsteadOf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    /// UPDATE with an optional column list.
    Update(Vec<String>),
    Delete,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TriggerLevel {
    #[strum(serialize = "ROW")]
    Row,
    #[strum(serialize = "STATEMENT")]
    Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub table: ObjectName,
    pub timing: TriggerTiming,
    /// Events in canonical order: INSERT, UPDATE, DELETE, TRUNCATE.
    pub events: Vec<TriggerEvent>,
    pub level: TriggerLevel,
    /// Canonical WHEN expression.
    pub when: Option<String>,
    pub function: ObjectName,
    pub args: Vec<String>,
}

impl Trigger {
    /// Catalog key: trigger names are unique per table.
    pub fn key(&self) -> String {
        format!("{}.{}", self.table.key(), self.name)
    }

    /// Definition identity: everything except the name and table.
    pub fn same_definition(&self, other: &Trigger) -> bool {
        self.timing == other.timing
            && self.events == other.events
            && self.level == other.level
            && self.when == other.when
            && self.function == other.function
            && self.args == other.args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: ObjectName,
    pub start: i64,
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cache: i64,
    pub cycle: bool,
}

impl Sequence {
    pub fn with_defaults(name: ObjectName) -> Self {
        Self {
            name,
            start: 1,
            increment: 1,
            min_value: None,
            max_value: None,
            cache: 1,
            cycle: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub schema: Option<String>,
}

/// Object kinds that can carry a COMMENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum CommentKind {
    #[strum(serialize = "SCHEMA")]
    Schema,
    #[strum(serialize = "EXTENSION")]
    Extension,
    #[strum(serialize = "TYPE")]
    Type,
    #[strum(serialize = "SEQUENCE")]
    Sequence,
    #[strum(serialize = "TABLE")]
    Table,
    #[strum(serialize = "COLUMN")]
    Column,
    #[strum(serialize = "INDEX")]
    Index,
    #[strum(serialize = "VIEW")]
    View,
    #[strum(serialize = "MATERIALIZED VIEW")]
    MaterializedView,
    #[strum(serialize = "FUNCTION")]
    Function,
    #[strum(serialize = "TRIGGER")]
    Trigger,
}

/// Comment target: kind plus the dotted identifier path
/// (e.g. `(Column, "public.users.id")`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentKey {
    pub kind: CommentKind,
    pub target: String,
}

impl CommentKey {
    pub fn new(kind: CommentKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

impl fmt::Display for CommentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_key_and_sql() {
        let n = ObjectName::qualified("public", "users");
        assert_eq!(n.key(), "public.users");
        assert_eq!(n.sql(), "public.users");

        let quoted = ObjectName::qualified("public", "User Accounts");
        assert_eq!(quoted.sql(), "public.\"User Accounts\"");
    }

    #[test]
    fn test_type_name_canonicalizes_on_construction() {
        assert_eq!(TypeName::simple("int4").name(), "integer");
        assert_eq!(
            TypeName::new("varchar", vec![255]).to_string(),
            "character varying(255)"
        );
        assert_eq!(
            TypeName::new("numeric", vec![10]).to_string(),
            "numeric(10, 0)"
        );
        assert_eq!(TypeName::array_of("text", vec![]).to_string(), "text[]");
    }

    #[test]
    fn test_type_family() {
        assert_eq!(TypeName::simple("int8").family(), TypeFamily::Numeric);
        assert_eq!(TypeName::simple("varchar").family(), TypeFamily::Text);
        assert_eq!(TypeName::simple("uuid").family(), TypeFamily::Other);
    }

    #[test]
    fn test_fk_same_definition_ignores_name() {
        let a = ForeignKey {
            name: "fk_a".to_string(),
            columns: vec!["b_id".to_string()],
            ref_table: ObjectName::qualified("public", "b"),
            ref_columns: vec!["id".to_string()],
            on_delete: RefAction::Cascade,
            on_update: RefAction::NoAction,
            deferrable: false,
            initially_deferred: false,
        };
        let mut b = a.clone();
        b.name = "fk_b".to_string();
        assert!(a.same_definition(&b));
        b.on_delete = RefAction::NoAction;
        assert!(!a.same_definition(&b));
    }

    #[test]
    fn test_function_signature_excludes_out_params() {
        let f = Function {
            name: ObjectName::qualified("public", "add"),
            kind: RoutineKind::Function,
            params: vec![
                FunctionParam {
                    name: Some("a".to_string()),
                    type_name: TypeName::simple("int"),
                    mode: ParamMode::In,
                },
                FunctionParam {
                    name: Some("total".to_string()),
                    type_name: TypeName::simple("int"),
                    mode: ParamMode::Out,
                },
            ],
            returns: Some(TypeName::simple("int")),
            language: "sql".to_string(),
            body: "SELECT a".to_string(),
            volatility: Volatility::Immutable,
            strict: false,
        };
        assert_eq!(f.signature(), "public.add(integer)");
    }

    #[test]
    fn test_ref_action_display() {
        assert_eq!(RefAction::SetNull.to_string(), "SET NULL");
        assert_eq!(RefAction::NoAction.to_string(), "NO ACTION");
    }

    #[test]
    fn test_index_method_roundtrip() {
        use std::str::FromStr;
        assert_eq!(IndexMethod::from_str("gin").unwrap(), IndexMethod::Gin);
        assert_eq!(IndexMethod::Btree.to_string(), "btree");
    }
}
