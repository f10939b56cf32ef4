//! Privilege codec.
//!
//! Maps between privilege keywords and the per-privilege `Y`/`N` flag
//! columns of the `mysql.db` grant table. The catalog below is the single
//! source of truth for both directions and fixes the default ordering.

use crate::backend::{Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// (flag column in `mysql.db`, privilege keyword), in catalog order.
pub const CATALOG: [(&str, &str); 18] = [
    ("Select_priv", "SELECT"),
    ("Insert_priv", "INSERT"),
    ("Update_priv", "UPDATE"),
    ("Delete_priv", "DELETE"),
    ("Create_priv", "CREATE"),
    ("Drop_priv", "DROP"),
    ("References_priv", "REFERENCES"),
    ("Index_priv", "INDEX"),
    ("Alter_priv", "ALTER"),
    ("Create_tmp_table_priv", "CREATE TEMPORARY TABLES"),
    ("Lock_tables_priv", "LOCK TABLES"),
    ("Create_view_priv", "CREATE VIEW"),
    ("Show_view_priv", "SHOW VIEW"),
    ("Create_routine_priv", "CREATE ROUTINE"),
    ("Alter_routine_priv", "ALTER ROUTINE"),
    ("Execute_priv", "EXECUTE"),
    ("Event_priv", "EVENT"),
    ("Trigger_priv", "TRIGGER"),
];

/// Flag column holding the grant option.
pub const GRANT_COLUMN: &str = "Grant_priv";

/// Projection of `mysql.db` for one (host, user, db).
pub const PRIVILEGE_TABLE_QUERY: &str = "SELECT Host,Db,User,Select_priv,Insert_priv,Update_priv,\
Delete_priv,Create_priv,Drop_priv,Grant_priv,References_priv,Index_priv,Alter_priv,\
Create_tmp_table_priv,Lock_tables_priv,Create_view_priv,Show_view_priv,Create_routine_priv,\
Alter_routine_priv,Execute_priv,Event_priv,Trigger_priv FROM mysql.db WHERE Host = ? AND User = ? AND Db = ?";

/// A privilege name, stored with the casing it was written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privilege(String);

impl Privilege {
    /// Wrap a privilege name as written.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive identity.
    pub fn eq_ignore_case(&self, other: &Privilege) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Position in the catalog, if the name is a catalog keyword.
    pub fn catalog_index(&self) -> Option<usize> {
        CATALOG
            .iter()
            .position(|(_, keyword)| keyword.eq_ignore_ascii_case(&self.0))
    }

    /// Whether the name is a catalog keyword.
    pub fn is_known(&self) -> bool {
        self.catalog_index().is_some()
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Privilege {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Join privileges into the list used by GRANT and REVOKE.
pub fn to_sql(privileges: &[Privilege]) -> String {
    privileges
        .iter()
        .map(Privilege::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn flag(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Text(v)) => v == "Y",
        _ => false,
    }
}

/// Privileges whose flag is `Y`, in catalog order with canonical keywords.
///
/// Missing or malformed flags decode as not granted.
pub fn decode(row: &Row) -> Vec<Privilege> {
    CATALOG
        .iter()
        .filter(|(column, _)| flag(row, column))
        .map(|(_, keyword)| Privilege::new(*keyword))
        .collect()
}

/// Whether the row carries the grant option.
pub fn decode_grant_option(row: &Row) -> bool {
    flag(row, GRANT_COLUMN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(granted: &[&str]) -> Row {
        let mut row = Row::new().with("Host", "%").with("Db", "app").with("User", "reader");
        for (column, _) in CATALOG {
            let value = if granted.contains(&column) { "Y" } else { "N" };
            row.push(column, Value::from(value));
        }
        row
    }

    #[test]
    fn test_decode_follows_catalog_order() {
        let decoded = decode(&row(&["Trigger_priv", "Select_priv", "Create_tmp_table_priv"]));
        let names: Vec<_> = decoded.iter().map(Privilege::as_str).collect();
        assert_eq!(names, ["SELECT", "CREATE TEMPORARY TABLES", "TRIGGER"]);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let r = row(&["Insert_priv", "Update_priv"]);
        assert_eq!(decode(&r), decode(&r));
    }

    #[test]
    fn test_malformed_flags_decode_as_false() {
        let r = Row::new()
            .with("Select_priv", "y")
            .with("Insert_priv", Value::Null)
            .with("Update_priv", 1_i64)
            .with(GRANT_COLUMN, "yes");
        assert!(decode(&r).is_empty());
        assert!(!decode_grant_option(&r));
    }

    #[test]
    fn test_grant_option_reads_grant_column_only() {
        let mut r = row(&["Select_priv"]);
        assert!(!decode_grant_option(&r));
        r.push(GRANT_COLUMN, Value::from("Y"));
        assert!(decode_grant_option(&r));
    }

    #[test]
    fn test_catalog_lookup_ignores_case() {
        assert_eq!(Privilege::from("lock tables").catalog_index(), Some(10));
        assert!(!Privilege::from("SUPER").is_known());
        assert!(!Privilege::from("select ").is_known());
        assert!(!Privilege::from(" SHOW VIEW").is_known());
        assert!(Privilege::from("select").eq_ignore_case(&Privilege::from("SELECT")));
    }

    #[test]
    fn test_to_sql_joins_keywords() {
        let privileges = vec![Privilege::from("SELECT"), Privilege::from("show view")];
        assert_eq!(to_sql(&privileges), "SELECT, show view");
    }
}
