//! Databases (schemas).

use crate::backend::{Executor, Value};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::sql;
use serde::Serialize;

const SCHEMA_QUERY: &str = "SELECT SCHEMA_NAME, DEFAULT_CHARACTER_SET_NAME, DEFAULT_COLLATION_NAME \
FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?";

/// A schema as reported by `INFORMATION_SCHEMA`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    /// Schema name
    pub name: String,
    /// Default character set
    pub character_set: String,
    /// Default collation
    pub collation: String,
}

/// Look up one schema by name.
pub async fn lookup(exec: &dyn Executor, ctx: &CallContext, name: &str) -> Result<SchemaInfo> {
    let row = exec
        .query_row(ctx, SCHEMA_QUERY, &[Value::from(name)])
        .await?
        .ok_or_else(|| Error::not_found(format!("Database '{name}'")))?;
    Ok(SchemaInfo {
        name: row.text_at(0),
        character_set: row.text_at(1),
        collation: row.text_at(2),
    })
}

/// `CREATE DATABASE` statement with optional defaults.
pub fn create_statement(name: &str, character_set: Option<&str>, collation: Option<&str>) -> String {
    let mut statement = format!("CREATE DATABASE {}", sql::quote_ident(name));
    if let Some(charset) = character_set {
        statement.push_str(&format!(" CHARACTER SET {}", sql::quote_string(charset)));
    }
    if let Some(collation) = collation {
        statement.push_str(&format!(" COLLATE {}", sql::quote_string(collation)));
    }
    statement
}

/// Create a database.
pub async fn create(
    exec: &dyn Executor,
    ctx: &CallContext,
    name: &str,
    character_set: Option<&str>,
    collation: Option<&str>,
) -> Result<()> {
    sql::validate_database_name(name)?;
    let statement = create_statement(name, character_set, collation);
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Created database '{name}'");
    Ok(())
}

/// Drop a database.
pub async fn drop(exec: &dyn Executor, ctx: &CallContext, name: &str) -> Result<()> {
    sql::validate_database_name(name)?;
    let statement = format!("DROP DATABASE {}", sql::quote_ident(name));
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Dropped database '{name}'");
    Ok(())
}
