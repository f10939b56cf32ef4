//! Roles.

use crate::backend::Executor;
use crate::context::CallContext;
use crate::error::{ER_NONEXISTING_GRANT, Error, Result};
use crate::sql;

/// Reject an empty or blank role name.
pub fn validate_name(name: &str) -> Result<()> {
    sql::require_non_empty("role name", name)
}

/// `CREATE ROLE '<name>'`
pub async fn create(exec: &dyn Executor, ctx: &CallContext, name: &str) -> Result<()> {
    validate_name(name)?;
    let statement = format!("CREATE ROLE {}", sql::quote_string(name));
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Created role '{name}'");
    Ok(())
}

/// Check the role with `SHOW GRANTS`.
///
/// An empty listing, or the engine reporting that no such grant exists,
/// means the role is gone.
pub async fn exists(exec: &dyn Executor, ctx: &CallContext, name: &str) -> Result<()> {
    validate_name(name)?;
    let statement = format!("SHOW GRANTS FOR {}", sql::quote_string(name));
    match exec.query(ctx, &statement, &[]).await {
        Ok(rows) if rows.is_empty() => Err(Error::not_found(format!("role '{name}'"))),
        Ok(_) => Ok(()),
        Err(e) if e.code() == Some(ER_NONEXISTING_GRANT) => {
            Err(Error::not_found(format!("role '{name}'")))
        }
        Err(e) => Err(e),
    }
}

/// `DROP ROLE '<name>'`
pub async fn drop(exec: &dyn Executor, ctx: &CallContext, name: &str) -> Result<()> {
    validate_name(name)?;
    let statement = format!("DROP ROLE {}", sql::quote_string(name));
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Dropped role '{name}'");
    Ok(())
}
