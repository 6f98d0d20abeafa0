//! Live-database introspection.
//!
//! Each backend reconstructs the same canonical [`Catalog`] shape the
//! parser produces, including re-detecting serial patterns and running
//! server-reported expressions back through the parser so both sides of
//! the diff converge on identical strings.

use crate::catalog::types::TypeName;
use crate::normalize;

pub mod postgres;
pub mod sqlite;

/// Parse a type string as the server reports it (`format_type()` output or
/// a SQLite declared type) into a canonical [`TypeName`].
///
/// Handles embedded modifiers in multiword names: `timestamp(3) with time
/// zone` → (`timestamp with time zone`, `[3]`), and trailing array markers.
pub(crate) fn parse_type_text(raw: &str) -> TypeName {
    let mut s = raw.trim().to_string();
    let mut array = false;
    if let Some(stripped) = s.strip_suffix("[]") {
        array = true;
        s = stripped.trim().to_string();
    }

    let (name, modifiers) = match s.find('(') {
        Some(open) => match s[open..].find(')') {
            Some(close_rel) => {
                let close = open + close_rel;
                let mods: Vec<i64> = s[open + 1..close]
                    .split(',')
                    .filter_map(|m| m.trim().parse().ok())
                    .collect();
                let name = format!("{}{}", &s[..open], &s[close + 1..]);
                (name.trim().to_string(), mods)
            }
            None => (s.clone(), vec![]),
        },
        None => (s.clone(), vec![]),
    };

    // Unquoted server type names are already lower case; quoted ones keep
    // their case with the quotes stripped.
    let name = name.replace('"', "");
    let name = normalize::collapse_spaces(&name);

    if array {
        TypeName::array_of(name, modifiers)
    } else {
        TypeName::new(name, modifiers)
    }
}

/// Render a managed-schema list as a SQL literal list: `'public', 'app'`.
pub(crate) fn schema_list_literal(schemas: &[String]) -> String {
    schemas
        .iter()
        .map(|s| normalize::quote_literal(s))
        .collect::<Vec<_>>()
        .join(", ")
}
