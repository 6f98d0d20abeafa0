//! Canonical forms shared by the parser and the introspector.
//!
//! Idempotency rests on both sides of the pipeline emitting bit-identical
//! canonical values for equivalent inputs: the parser normalizes what the
//! user wrote, the introspector normalizes what the server reports, and the
//! differ compares the results verbatim. Every equivalence rule lives here
//! and nowhere else.

/// Map a type name to its canonical spelling.
///
/// Input is expected lowercased (pg_query already lowercases unquoted type
/// names; the introspector lowercases before calling). Aliases collapse to
/// the spelling `format_type()` reports, so an unchanged schema round-trips
/// bit-identically:
///
/// - `int2`/`smallint` → `smallint`; `int`/`int4` → `integer`; `int8` → `bigint`
/// - `float4`/`real` → `real`; `float8`/`double precision` → `double precision`
/// - `decimal` → `numeric`
/// - `varchar` → `character varying`; `char`/`bpchar` → `character`
/// - `timestamptz` → `timestamp with time zone`; `timetz` → `time with time zone`
/// - `bool` → `boolean`
///
/// Unrecognized names (user-defined types, enums, extension types) pass
/// through unchanged.
pub fn canonical_type_name(name: &str) -> &str {
    match name {
        "int2" | "smallint" => "smallint",
        "int" | "int4" | "integer" => "integer",
        "int8" | "bigint" => "bigint",
        "float4" | "real" => "real",
        "float8" | "double precision" => "double precision",
        "decimal" | "numeric" => "numeric",
        "varchar" | "character varying" => "character varying",
        "char" | "bpchar" | "character" => "character",
        "timestamptz" | "timestamp with time zone" => "timestamp with time zone",
        "timetz" | "time with time zone" => "time with time zone",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "time" | "time without time zone" => "time",
        "bool" | "boolean" => "boolean",
        other => other,
    }
}

/// Canonicalize a (name, modifiers) pair.
///
/// Handles the modifier-sensitive rules on top of [`canonical_type_name`]:
/// - `float(n)` with n ≤ 24 → `real`, otherwise `double precision`
///   (the modifier is dropped either way)
/// - `numeric(p)` → `numeric(p, 0)`
pub fn canonical_type(name: &str, modifiers: &[i64]) -> (String, Vec<i64>) {
    let lowered = name.to_lowercase();
    if lowered == "float" {
        return match modifiers.first() {
            Some(n) if *n <= 24 => ("real".to_string(), vec![]),
            _ => ("double precision".to_string(), vec![]),
        };
    }
    let canonical = canonical_type_name(&lowered).to_string();
    let modifiers = if canonical == "numeric" && modifiers.len() == 1 {
        vec![modifiers[0], 0]
    } else {
        modifiers.to_vec()
    };
    (canonical, modifiers)
}

/// Reserved words whose case is folded to upper case when they appear bare
/// in an expression. Quoted string content is never touched.
const FOLDED_KEYWORDS: &[&str] = &[
    "current_timestamp",
    "current_date",
    "current_time",
    "localtimestamp",
    "localtime",
    "current_user",
    "session_user",
    "null",
    "true",
    "false",
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Single-quoted string literal, quotes included, content verbatim.
    Str(String),
    /// Double-quoted identifier, quotes included, content verbatim.
    QuotedIdent(String),
    /// Bare identifier or keyword.
    Word(String),
    /// Numeric literal, possibly signed.
    Num(String),
    /// Run of operator characters (`>=`, `||`, `-`, …).
    Op(String),
    Open(char),
    Close(char),
    Comma,
    Dot,
    Semi,
}

const OP_CHARS: &str = "+-*/<>=~!@#%^&|?";

fn tokenize(expr: &str) -> Vec<Tok> {
    let chars: Vec<char> = expr.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' {
            let mut s = String::from('\'');
            i += 1;
            while i < chars.len() {
                let sc = chars[i];
                s.push(sc);
                i += 1;
                if sc == '\'' {
                    if i < chars.len() && chars[i] == '\'' {
                        s.push('\'');
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            toks.push(Tok::Str(s));
        } else if c == '"' {
            let mut s = String::from('"');
            i += 1;
            while i < chars.len() {
                let sc = chars[i];
                s.push(sc);
                i += 1;
                if sc == '"' {
                    if i < chars.len() && chars[i] == '"' {
                        s.push('"');
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            toks.push(Tok::QuotedIdent(s));
        } else if c.is_ascii_digit()
            || (c == '.'
                && i + 1 < chars.len()
                && chars[i + 1].is_ascii_digit()
                // `.5` is a number only in prefix position; after an
                // identifier the dot is field access (`a.5` stays split).
                && !matches!(
                    toks.last(),
                    Some(Tok::Word(_)) | Some(Tok::QuotedIdent(_)) | Some(Tok::Close(_))
                ))
        {
            let mut s = String::new();
            while i < chars.len()
                && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == 'e' || chars[i] == 'E')
            {
                s.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Num(s));
        } else if c.is_alphanumeric() || c == '_' {
            let mut s = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                s.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Word(s));
        } else if c == '-'
            && i + 1 < chars.len()
            && chars[i + 1].is_ascii_digit()
            && matches!(
                toks.last(),
                None | Some(Tok::Open(_)) | Some(Tok::Comma) | Some(Tok::Op(_))
            )
        {
            // Unary minus binds to the number in prefix position.
            let mut s = String::from('-');
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                s.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Num(s));
        } else if OP_CHARS.contains(c) {
            let mut s = String::new();
            while i < chars.len() && OP_CHARS.contains(chars[i]) {
                s.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Op(s));
        } else {
            match c {
                '(' | '[' => toks.push(Tok::Open(c)),
                ')' | ']' => toks.push(Tok::Close(if c == ')' { ')' } else { ']' })),
                ',' => toks.push(Tok::Comma),
                '.' => toks.push(Tok::Dot),
                ';' => toks.push(Tok::Semi),
                // Anything else (e.g. stray `:`), keep as operator-ish.
                other => toks.push(Tok::Op(other.to_string())),
            }
            i += 1;
        }
    }
    toks
}

fn render_tokens(toks: &[Tok]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Tok> = None;
    for tok in toks {
        let space = match (prev, tok) {
            (None, _) => false,
            // Nothing after an opener or a dot.
            (Some(Tok::Open(_)), _) | (Some(Tok::Dot), _) => false,
            // Nothing before closers, commas, dots, semicolons.
            (_, Tok::Close(_)) | (_, Tok::Comma) | (_, Tok::Dot) | (_, Tok::Semi) => false,
            // Function call: identifier immediately followed by `(`.
            (Some(Tok::Word(_)), Tok::Open('('))
            | (Some(Tok::QuotedIdent(_)), Tok::Open('(')) => false,
            // Array subscript.
            (Some(Tok::Word(_)), Tok::Open('['))
            | (Some(Tok::Close(_)), Tok::Open('[')) => false,
            _ => true,
        };
        if space {
            out.push(' ');
        }
        match tok {
            Tok::Str(s) | Tok::QuotedIdent(s) | Tok::Num(s) | Tok::Op(s) => out.push_str(s),
            Tok::Word(w) => {
                if FOLDED_KEYWORDS.contains(&w.to_lowercase().as_str()) {
                    out.push_str(&w.to_uppercase());
                } else {
                    out.push_str(w);
                }
            }
            Tok::Open(c) => out.push(*c),
            Tok::Close(c) => out.push(*c),
            Tok::Comma => out.push_str(","),
            Tok::Dot => out.push('.'),
            Tok::Semi => out.push(';'),
        }
        prev = Some(tok);
    }
    out
}

/// Canonicalize a default expression for comparison and re-rendering.
///
/// Rules:
/// - `::type` casts the server appends are stripped (`'hejsan'::text` ≡
///   `'hejsan'`), including multi-word and schema-qualified targets
/// - internal whitespace collapses to canonical single spacing
/// - bare reserved words fold to upper case (`current_timestamp` →
///   `CURRENT_TIMESTAMP`)
/// - a quoted literal that is purely numeric is unquoted (`'-1'::integer` ≡
///   `-1`), matching how the server stores bare numeric defaults
/// - single-quoted content is otherwise preserved byte-for-byte
pub fn canonical_default(expr: &str) -> String {
    let stripped = strip_casts(expr);
    let toks = tokenize(&stripped);
    // `'25'` with nothing else is a numeric literal in disguise.
    if let [Tok::Str(s)] = toks.as_slice() {
        let inner = &s[1..s.len() - 1];
        if !inner.is_empty()
            && inner
                .strip_prefix('-')
                .unwrap_or(inner)
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.')
            && inner.chars().any(|c| c.is_ascii_digit())
        {
            return inner.to_string();
        }
    }
    render_tokens(&toks)
}

/// Remove every `::type` cast outside quoted strings.
///
/// Handles chained casts (`'x'::text::varchar`), multi-word target types
/// (`::double precision`, `::character varying`), schema-qualified targets
/// (`::pg_catalog.text`), length modifiers (`::numeric(10,2)`) and array
/// suffixes (`::text[]`).
fn strip_casts(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                let sc = chars[i];
                out.push(sc);
                i += 1;
                if sc == '\'' {
                    if i < chars.len() && chars[i] == '\'' {
                        out.push('\'');
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
        } else if c == ':' && i + 1 < chars.len() && chars[i + 1] == ':' {
            i = skip_cast_target(&chars, i + 2);
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Advance past a cast target starting at `i`.
fn skip_cast_target(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    // One or more dotted identifier segments, possibly double-quoted.
    loop {
        if i < chars.len() && chars[i] == '"' {
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            i += 1;
        } else {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            // Multi-word types. The remainder starting at `start` may spell
            // one of these; if so, consume the full phrase.
            let rest: String = chars[start..].iter().collect::<String>().to_lowercase();
            for phrase in [
                "double precision",
                "character varying",
                "timestamp with time zone",
                "timestamp without time zone",
                "time with time zone",
                "time without time zone",
            ] {
                if rest.starts_with(phrase) {
                    i = start + phrase.chars().count();
                    break;
                }
            }
        }
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            continue;
        }
        break;
    }
    // Optional length modifier.
    if i < chars.len() && chars[i] == '(' {
        let mut depth = 0usize;
        while i < chars.len() {
            match chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
    // Optional array suffix.
    while i + 1 < chars.len() && chars[i] == '[' && chars[i + 1] == ']' {
        i += 2;
    }
    i
}

/// Canonicalize a view or function body: whitespace and trailing-newline
/// normalization only. Semantic equivalence is deliberately not attempted —
/// a body that differs in any non-whitespace way is treated as changed.
pub fn canonical_body(body: &str) -> String {
    let unified = body.replace("\r\n", "\n");
    unified
        .trim()
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Canonicalize an index expression element.
///
/// Parentheses around a bare column reference are stripped; whitespace
/// collapses. Genuine expressions keep exactly one set of outer
/// parentheses, matching how PostgreSQL re-reports them.
pub fn canonical_index_expr(expr: &str) -> String {
    let collapsed = canonical_default(expr);
    let trimmed = strip_redundant_parens(&collapsed);
    if is_bare_identifier(&trimmed) {
        trimmed
    } else {
        format!("({})", trimmed)
    }
}

/// Canonicalize a CHECK expression: cast stripping, spacing, and redundant
/// outer parentheses removed (`pg_get_constraintdef` double-wraps).
pub fn canonical_check_expr(expr: &str) -> String {
    strip_redundant_parens(&canonical_default(expr))
}

fn strip_redundant_parens(expr: &str) -> String {
    let mut s = expr.trim();
    while s.starts_with('(') && s.ends_with(')') {
        let inner = &s[1..s.len() - 1];
        let mut depth = 0i32;
        let mut wraps = true;
        for c in inner.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        wraps = false;
                        break;
                    }
                }
                _ => {}
            }
        }
        if wraps && depth == 0 {
            s = inner.trim();
        } else {
            break;
        }
    }
    s.to_string()
}

fn is_bare_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '"')
}

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold an identifier the way the server stores it: unquoted identifiers
/// lower-case, quoted identifiers byte-preserved.
pub fn fold_identifier(raw: &str, quoted: bool) -> String {
    if quoted {
        raw.to_string()
    } else {
        raw.to_lowercase()
    }
}

/// Quote an identifier for emission. Identifiers that are all-lowercase
/// alphanumeric/underscore and do not start with a digit are emitted bare;
/// everything else is double-quoted with embedded quotes doubled.
///
/// Both supported dialects accept double-quoted identifiers, so this lives
/// here rather than per provider.
pub fn quote_ident(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.chars().next().unwrap().is_ascii_digit()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if simple && !is_reserved_word(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Words that must be quoted when used as identifiers. Kept to the short
/// list that realistically shows up as column or table names.
fn is_reserved_word(name: &str) -> bool {
    matches!(
        name,
        "all" | "and" | "any" | "as" | "asc" | "both" | "case" | "cast" | "check" | "collate"
            | "column" | "constraint" | "create" | "current_date" | "current_time"
            | "current_timestamp" | "default" | "desc" | "distinct" | "do" | "else" | "end"
            | "except" | "for" | "foreign" | "from" | "group" | "having" | "in" | "index"
            | "initially" | "intersect" | "into" | "leading" | "limit" | "not" | "null"
            | "offset" | "on" | "only" | "or" | "order" | "primary" | "references" | "select"
            | "table" | "then" | "to" | "trailing" | "union" | "unique" | "user" | "using"
            | "when" | "where" | "with"
    )
}

/// FNV-1a 64-bit hash over the UTF-8 bytes of `s`.
///
/// Advisory lock keys are derived in-process from the lock name with this
/// hash. This is a deliberate compatibility break from deployments that
/// derived keys with the server-side `hashtext()`: the two produce
/// different keys for the same lock name, so upgrade all writers together.
pub fn fnv1a64(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Advisory lock key as the signed 64-bit integer `pg_try_advisory_lock`
/// expects.
pub fn advisory_lock_key(lock_name: &str) -> i64 {
    fnv1a64(lock_name) as i64
}

/// Extract the sequence name from a `nextval('…'::regclass)` default, used
/// to re-detect serial columns during introspection.
pub fn nextval_sequence(default_expr: &str) -> Option<String> {
    let canonical = canonical_default(default_expr);
    let rest = canonical.strip_prefix("nextval(")?;
    let rest = rest.strip_suffix(")")?;
    let inner = rest.trim().trim_matches('\'');
    // The stored default double-quotes mixed-case sequence names.
    Some(inner.replace('"', ""))
}

/// The sequence name PostgreSQL generates for a serial column.
pub fn serial_sequence_name(table: &str, column: &str) -> String {
    format!("{}_{}_seq", table, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_integer_aliases_collapse() {
        assert_eq!(canonical_type("int2", &[]).0, "smallint");
        assert_eq!(canonical_type("INT", &[]).0, "integer");
        assert_eq!(canonical_type("int4", &[]).0, "integer");
        assert_eq!(canonical_type("int8", &[]).0, "bigint");
        assert_eq!(canonical_type("bigint", &[]).0, "bigint");
    }

    #[test]
    fn test_float_aliases_collapse() {
        assert_eq!(canonical_type("float4", &[]).0, "real");
        assert_eq!(canonical_type("float8", &[]).0, "double precision");
        assert_eq!(canonical_type("float", &[24]), ("real".to_string(), vec![]));
        assert_eq!(
            canonical_type("float", &[25]),
            ("double precision".to_string(), vec![])
        );
        assert_eq!(
            canonical_type("float", &[]),
            ("double precision".to_string(), vec![])
        );
    }

    #[test]
    fn test_numeric_padding() {
        assert_eq!(canonical_type("decimal", &[]).0, "numeric");
        assert_eq!(
            canonical_type("numeric", &[10]),
            ("numeric".to_string(), vec![10, 0])
        );
        assert_eq!(
            canonical_type("numeric", &[10, 2]),
            ("numeric".to_string(), vec![10, 2])
        );
    }

    #[test]
    fn test_char_aliases() {
        assert_eq!(canonical_type("varchar", &[255]).0, "character varying");
        assert_eq!(canonical_type("bpchar", &[3]).0, "character");
    }

    #[test]
    fn test_time_aliases() {
        assert_eq!(
            canonical_type("timestamptz", &[]).0,
            "timestamp with time zone"
        );
        assert_eq!(
            canonical_type("timestamptz", &[3]),
            ("timestamp with time zone".to_string(), vec![3])
        );
        assert_eq!(canonical_type("timetz", &[]).0, "time with time zone");
    }

    #[test]
    fn test_default_cast_stripped() {
        assert_eq!(canonical_default("'hejsan'::text"), "'hejsan'");
        assert_eq!(canonical_default("'hej'::character varying"), "'hej'");
        assert_eq!(canonical_default("25"), "25");
        assert_eq!(canonical_default("'{}'::text[]"), "'{}'");
    }

    #[test]
    fn test_default_chained_casts() {
        assert_eq!(canonical_default("'x'::text::character varying"), "'x'");
    }

    #[test]
    fn test_default_numeric_literal_unquoted() {
        assert_eq!(canonical_default("'25'::integer"), "25");
        assert_eq!(canonical_default("'-1'::integer"), "-1");
        assert_eq!(canonical_default("-1"), "-1");
        assert_eq!(canonical_default("'3.14'::numeric(10,2)"), "3.14");
        // Non-numeric content keeps its quotes.
        assert_eq!(canonical_default("'25a'::text"), "'25a'");
    }

    #[test]
    fn test_default_keyword_folding() {
        assert_eq!(canonical_default("current_timestamp"), "CURRENT_TIMESTAMP");
        assert_eq!(canonical_default("Null"), "NULL");
        assert_eq!(canonical_default("true"), "TRUE");
    }

    #[test]
    fn test_default_whitespace_collapse() {
        assert_eq!(canonical_default("now(  )"), "now()");
        assert_eq!(canonical_default("concat( 'a' ,  'b' )"), "concat('a', 'b')");
        assert_eq!(canonical_default("1   +   2"), "1 + 2");
        assert_eq!(canonical_default("a>=b"), "a >= b");
    }

    #[test]
    fn test_default_quoted_content_preserved() {
        assert_eq!(
            canonical_default("'has  spaces and ::cast'::text"),
            "'has  spaces and ::cast'"
        );
        assert_eq!(canonical_default("'it''s'::text"), "'it''s'");
    }

    #[test]
    fn test_body_normalization() {
        assert_eq!(canonical_body("SELECT 1;\n"), "SELECT 1;");
        assert_eq!(canonical_body("\n\nSELECT 1;  \n\n"), "SELECT 1;");
        assert_eq!(
            canonical_body("SELECT a,\r\n       b\r\nFROM t\n"),
            "SELECT a,\n       b\nFROM t"
        );
    }

    #[test]
    fn test_index_expr_bare_column_unparenthesized() {
        assert_eq!(canonical_index_expr("(email)"), "email");
        assert_eq!(canonical_index_expr("email"), "email");
    }

    #[test]
    fn test_index_expr_expression_keeps_parens() {
        assert_eq!(canonical_index_expr("lower(email)"), "(lower(email))");
        assert_eq!(canonical_index_expr("(lower(email))"), "(lower(email))");
        assert_eq!(canonical_index_expr("((lower(email)))"), "(lower(email))");
    }

    #[test]
    fn test_check_expr_double_wrap_stripped() {
        assert_eq!(canonical_check_expr("((amount > 0))"), "amount > 0");
        assert_eq!(canonical_check_expr("amount>0"), "amount > 0");
    }

    #[test]
    fn test_identifier_folding() {
        assert_eq!(fold_identifier("Users", false), "users");
        assert_eq!(fold_identifier("Users", true), "Users");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("Users"), "\"Users\"");
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("2fast"), "\"2fast\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_fnv1a64_vectors() {
        // Published FNV-1a test vectors.
        assert_eq!(fnv1a64(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64("a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64("foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_nextval_sequence_extraction() {
        assert_eq!(
            nextval_sequence("nextval('users_id_seq'::regclass)"),
            Some("users_id_seq".to_string())
        );
        assert_eq!(
            nextval_sequence("nextval('\"Users_id_seq\"'::regclass)"),
            Some("Users_id_seq".to_string())
        );
        assert_eq!(nextval_sequence("42"), None);
    }

    #[test]
    fn test_serial_sequence_name() {
        assert_eq!(serial_sequence_name("users", "id"), "users_id_seq");
    }

    proptest! {
        /// Canonicalization is idempotent: a second pass never changes the
        /// result. This is what lets parser and introspector outputs be
        /// compared verbatim.
        #[test]
        fn prop_canonical_default_idempotent(s in "[ a-z0-9_':(),.]{0,40}") {
            let once = canonical_default(&s);
            let twice = canonical_default(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_canonical_body_idempotent(s in "[ a-zA-Z0-9_\n;*=<>.]{0,80}") {
            let once = canonical_body(&s);
            let twice = canonical_body(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_canonical_type_idempotent(
            name in "[a-z ]{1,20}",
            mods in proptest::collection::vec(0i64..40, 0..3),
        ) {
            let (n1, m1) = canonical_type(&name, &mods);
            let (n2, m2) = canonical_type(&n1, &m1);
            prop_assert_eq!(n1, n2);
            prop_assert_eq!(m1, m2);
        }
    }
}
