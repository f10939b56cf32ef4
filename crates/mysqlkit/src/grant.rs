//! Database-level grants.

use crate::backend::{Executor, Value};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::privilege::{self, PRIVILEGE_TABLE_QUERY, Privilege};
use crate::reconcile::{ReconciledGrant, reconcile_grant};
use crate::sql;
use std::fmt;

/// Host pattern used when none is declared.
pub const DEFAULT_HOST: &str = "%";

/// The identity receiving privileges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A user account
    User(String),
    /// A role
    Role(String),
}

impl Principal {
    /// Pick the principal from mutually exclusive `user` / `role` fields.
    pub fn from_parts(user: Option<&str>, role: Option<&str>) -> Result<Self> {
        match (user, role) {
            (Some(_), Some(_)) => Err(Error::validation(
                "user and role are mutually exclusive; set only one",
            )),
            (None, None) => Err(Error::validation("one of user or role must be set")),
            (Some(user), None) => {
                sql::require_non_empty("user", user)?;
                Ok(Self::User(user.to_string()))
            }
            (None, Some(role)) => {
                sql::require_non_empty("role", role)?;
                Ok(Self::Role(role.to_string()))
            }
        }
    }

    /// Account or role name.
    pub fn name(&self) -> &str {
        match self {
            Self::User(name) | Self::Role(name) => name,
        }
    }

    /// "user" or "role".
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Role(_) => "role",
        }
    }
}

/// (database, principal, host pattern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantTarget {
    /// Database the grant applies to (`<db>.*`)
    pub database: String,
    /// Who receives the privileges
    pub principal: Principal,
    /// Host pattern of the account
    pub host: String,
}

impl GrantTarget {
    /// Validate and build a target; `host` defaults to `%`.
    pub fn new(database: &str, principal: Principal, host: Option<&str>) -> Result<Self> {
        sql::validate_database_name(database)?;
        let host = host.unwrap_or(DEFAULT_HOST);
        sql::require_non_empty("host", host)?;
        Ok(Self {
            database: database.to_string(),
            principal,
            host: host.to_string(),
        })
    }

    fn account(&self) -> String {
        sql::account(self.principal.name(), &self.host)
    }
}

impl fmt::Display for GrantTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.account(), self.database)
    }
}

/// A complete grant declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSpec {
    /// Who and where
    pub target: GrantTarget,
    /// Privileges, as declared
    pub privileges: Vec<Privilege>,
    /// Whether the principal may pass the privileges on
    pub with_grant_option: bool,
}

impl GrantSpec {
    /// Validate and build a grant.
    pub fn new(target: GrantTarget, privileges: Vec<Privilege>, with_grant_option: bool) -> Result<Self> {
        if privileges.is_empty() {
            return Err(Error::validation("privileges must contain at least one privilege"));
        }
        let unknown: Vec<_> = privileges
            .iter()
            .filter(|p| !p.is_known())
            .map(Privilege::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(Error::validation(format!(
                "unknown privilege(s): {}",
                unknown.join(", ")
            )));
        }
        Ok(Self {
            target,
            privileges,
            with_grant_option,
        })
    }
}

/// `GRANT ... ON <db>.* TO '<principal>'@'<host>' [WITH GRANT OPTION]`
pub fn grant_statement(spec: &GrantSpec) -> String {
    let mut statement = format!(
        "GRANT {} ON {}.* TO {}",
        privilege::to_sql(&spec.privileges),
        sql::quote_ident(&spec.target.database),
        spec.target.account()
    );
    if spec.with_grant_option {
        statement.push_str(" WITH GRANT OPTION");
    }
    statement
}

/// `REVOKE ... ON <db>.* FROM '<principal>'@'<host>'`
pub fn revoke_statement(target: &GrantTarget, privileges: &[Privilege]) -> String {
    format!(
        "REVOKE {} ON {}.* FROM {}",
        privilege::to_sql(privileges),
        sql::quote_ident(&target.database),
        target.account()
    )
}

/// Issue the grant.
pub async fn create(exec: &dyn Executor, ctx: &CallContext, spec: &GrantSpec) -> Result<()> {
    let statement = grant_statement(spec);
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Granted {} to {}", privilege::to_sql(&spec.privileges), spec.target);
    Ok(())
}

/// Read the grant back and reconcile it with the desired privileges.
pub async fn read(
    exec: &dyn Executor,
    ctx: &CallContext,
    target: &GrantTarget,
    desired: &[Privilege],
) -> Result<ReconciledGrant> {
    let args = [
        Value::from(target.host.as_str()),
        Value::from(target.principal.name()),
        Value::from(target.database.as_str()),
    ];
    let row = exec.query_row(ctx, PRIVILEGE_TABLE_QUERY, &args).await?;
    reconcile_grant(&target.to_string(), desired, row.as_ref())
}

/// Revoke the given privileges.
pub async fn revoke(
    exec: &dyn Executor,
    ctx: &CallContext,
    target: &GrantTarget,
    privileges: &[Privilege],
) -> Result<()> {
    if privileges.is_empty() {
        return Err(Error::validation("nothing to revoke"));
    }
    let statement = revoke_statement(target, privileges);
    exec.exec(ctx, &statement, &[]).await?;
    log::info!("Revoked {} from {}", privilege::to_sql(privileges), target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Row;
    use crate::backend::scripted::ScriptedHandle;

    fn target() -> GrantTarget {
        GrantTarget::new("app", Principal::User("reader".into()), None).unwrap()
    }

    fn privs(names: &[&str]) -> Vec<Privilege> {
        names.iter().map(|n| Privilege::from(*n)).collect()
    }

    #[test]
    fn test_principal_requires_exactly_one() {
        assert!(Principal::from_parts(Some("a"), Some("b")).is_err());
        assert!(Principal::from_parts(None, None).is_err());
        assert_eq!(
            Principal::from_parts(None, Some("writers")).unwrap(),
            Principal::Role("writers".into())
        );
    }

    #[test]
    fn test_target_rejects_bad_database_name() {
        let err = GrantTarget::new("1app", Principal::User("x".into()), None).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_spec_rejects_empty_and_unknown_privileges() {
        assert!(GrantSpec::new(target(), vec![], false).is_err());
        let err = GrantSpec::new(target(), privs(&["select", "SUPER"]), false).unwrap_err();
        assert!(err.to_string().contains("SUPER"));
    }

    #[test]
    fn test_statements() {
        let spec = GrantSpec::new(target(), privs(&["SELECT", "insert"]), true).unwrap();
        assert_eq!(
            grant_statement(&spec),
            "GRANT SELECT, insert ON `app`.* TO 'reader'@'%' WITH GRANT OPTION"
        );
        assert_eq!(
            revoke_statement(&spec.target, &spec.privileges),
            "REVOKE SELECT, insert ON `app`.* FROM 'reader'@'%'"
        );
    }

    #[tokio::test]
    async fn test_read_queries_privilege_table_and_reconciles() {
        let handle = ScriptedHandle::new();
        handle.push_rows(vec![
            Row::new()
                .with("Host", "%")
                .with("Db", "app")
                .with("User", "reader")
                .with("Select_priv", "Y")
                .with("Insert_priv", "Y")
                .with("Grant_priv", "N"),
        ]);
        let ctx = CallContext::background();

        let grant = read(&handle, &ctx, &target(), &privs(&["select"])).await.unwrap();
        assert_eq!(grant.privileges, privs(&["select", "INSERT"]));
        assert!(!grant.with_grant_option);

        let calls = handle.calls();
        assert_eq!(calls[0].statement, PRIVILEGE_TABLE_QUERY);
        assert_eq!(
            calls[0].args,
            vec![Value::from("%"), Value::from("reader"), Value::from("app")]
        );
    }

    #[tokio::test]
    async fn test_read_without_row_is_not_found() {
        let handle = ScriptedHandle::new();
        let ctx = CallContext::background();
        let err = read(&handle, &ctx, &target(), &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_failure_carries_statement() {
        let handle = ScriptedHandle::new();
        handle.push_error(Error::Execution {
            statement: "GRANT SELECT ON `app`.* TO 'reader'@'%'".into(),
            message: "Access denied".into(),
            code: Some(1044),
        });
        let ctx = CallContext::background();
        let spec = GrantSpec::new(target(), privs(&["SELECT"]), false).unwrap();

        let err = create(&handle, &ctx, &spec).await.unwrap_err();
        assert!(err.to_string().contains("GRANT SELECT ON `app`.*"));
    }
}
