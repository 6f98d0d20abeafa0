//! Schema input loading.
//!
//! The schema argument is either inline SQL or a file path. It is treated
//! as SQL when it contains a newline, a semicolon, the substring `CREATE`,
//! or exceeds 500 characters; otherwise it is read as a UTF-8 file.

use std::path::Path;

use crate::error::{Error, Result};

const INLINE_LENGTH_THRESHOLD: usize = 500;

/// Resolve the schema argument to SQL text. An empty string is valid and
/// means an empty desired state (reconcile everything away).
pub fn load_schema_source(arg: &str) -> Result<String> {
    if looks_like_sql(arg) {
        return Ok(arg.to_string());
    }
    if arg.is_empty() {
        return Ok(String::new());
    }
    std::fs::read_to_string(Path::new(arg)).map_err(Error::Io)
}

fn looks_like_sql(arg: &str) -> bool {
    arg.contains('\n')
        || arg.contains(';')
        || arg.contains("CREATE")
        || arg.len() > INLINE_LENGTH_THRESHOLD
}
