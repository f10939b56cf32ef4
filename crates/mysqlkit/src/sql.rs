//! Quoting and name checks for statements that cannot bind identifiers.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

// Leading letter or underscore, then letters, digits, underscores, hyphens.
static DATABASE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_\-]*$").expect("DATABASE_NAME_REGEX: invalid regex pattern")
});

/// Quote a string literal.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Quote an identifier.
pub fn quote_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// `'name'@'host'` account notation.
pub fn account(name: &str, host: &str) -> String {
    format!("{}@{}", quote_string(name), quote_string(host))
}

/// Check a database name against the accepted pattern.
pub fn validate_database_name(name: &str) -> Result<()> {
    if DATABASE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "database name '{name}' must start with a letter or underscore and contain only letters, digits, underscores and hyphens"
        )))
    }
}

/// Reject empty or whitespace-only values.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
