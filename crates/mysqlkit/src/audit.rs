//! Audit rules and the stored-procedure protocol that manages them.
//!
//! Cloud SQL exposes audit rules only through stored procedures in the
//! `mysql` schema. Every procedure reports its outcome through the session
//! variables `@outval` / `@outmsg` instead of raising an error, so each call
//! is followed by a confirm query on the same connection. Creation does not
//! return the generated id; the new rule is found again by listing every
//! rule and matching the submitted fields.
//!
//! All four operations serialize on one [`ProcedureLock`] so that the
//! outcome variables and the re-list cannot interleave with another call.

use crate::backend::{Executor, Row, SqlHandle, Value};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::sql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Procedure creating a rule.
pub const CREATE_PROCEDURE: &str = "mysql.cloudsql_create_audit_rule";
/// Procedure updating a rule.
pub const UPDATE_PROCEDURE: &str = "mysql.cloudsql_update_audit_rule";
/// Procedure deleting a rule.
pub const DELETE_PROCEDURE: &str = "mysql.cloudsql_delete_audit_rule";
/// Procedure listing one rule, or all rules with `'*'`.
pub const LIST_PROCEDURE: &str = "mysql.cloudsql_list_audit_rule";

const CREATE_CALL: &str = "CALL mysql.cloudsql_create_audit_rule(?,?,?,?,?,1,@outval,@outmsg)";
const UPDATE_CALL: &str = "CALL mysql.cloudsql_update_audit_rule(?,?,?,?,?,?,1,@outval,@outmsg)";
const DELETE_CALL: &str = "CALL mysql.cloudsql_delete_audit_rule(?,1,@outval,@outmsg)";
const LIST_ALL_CALL: &str = "CALL mysql.cloudsql_list_audit_rule('*',@outval,@outmsg)";
const LIST_ONE_CALL: &str = "CALL mysql.cloudsql_list_audit_rule(?,@outval,@outmsg)";
const CONFIRM_QUERY: &str = "SELECT @outval, @outmsg";

/// The mutable fields of an audit rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRuleFields {
    /// Audited user pattern
    pub user: String,
    /// Audited database pattern
    pub database: String,
    /// Audited object pattern
    pub object: String,
    /// Audited operation(s)
    pub operation: String,
    /// Result filter (`S`, `U`, `B`, `E`)
    pub ops_result: String,
}

impl AuditRuleFields {
    /// Every field must be non-empty.
    pub fn validate(&self) -> Result<()> {
        sql::require_non_empty("user", &self.user)?;
        sql::require_non_empty("database", &self.database)?;
        sql::require_non_empty("object", &self.object)?;
        sql::require_non_empty("operation", &self.operation)?;
        sql::require_non_empty("ops_result", &self.ops_result)
    }

    /// Case-insensitive equality on all five fields.
    pub fn matches(&self, other: &AuditRuleFields) -> bool {
        self.user.eq_ignore_ascii_case(&other.user)
            && self.database.eq_ignore_ascii_case(&other.database)
            && self.object.eq_ignore_ascii_case(&other.object)
            && self.operation.eq_ignore_ascii_case(&other.operation)
            && self.ops_result.eq_ignore_ascii_case(&other.ops_result)
    }

    fn args(&self) -> [Value; 5] {
        [
            Value::from(self.user.as_str()),
            Value::from(self.database.as_str()),
            Value::from(self.object.as_str()),
            Value::from(self.operation.as_str()),
            Value::from(self.ops_result.as_str()),
        ]
    }
}

impl fmt::Display for AuditRuleFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={}, database={}, object={}, operation={}, ops_result={}",
            self.user, self.database, self.object, self.operation, self.ops_result
        )
    }
}

/// An audit rule with its server-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRule {
    /// Server-assigned id
    pub id: i64,
    /// Rule fields
    #[serde(flatten)]
    pub fields: AuditRuleFields,
}

impl AuditRule {
    /// Parse a listing row: (id, user, db, object, operation, result).
    fn from_row(row: &Row) -> Result<Self> {
        let id = row
            .at(0)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Procedure {
                procedure: LIST_PROCEDURE.to_string(),
                message: format!("listing row without an integer id: {row:?}"),
            })?;
        Ok(Self {
            id,
            fields: AuditRuleFields {
                user: row.text_at(1),
                database: row.text_at(2),
                object: row.text_at(3),
                operation: row.text_at(4),
                ops_result: row.text_at(5),
            },
        })
    }
}

/// `@outval` / `@outmsg` read right after one procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureOutcome {
    /// Zero on success
    pub status: i64,
    /// Message written by the procedure
    pub message: String,
}

impl ProcedureOutcome {
    /// NULL status reads as success.
    fn from_row(row: &Row) -> Self {
        Self {
            status: row.at(0).and_then(Value::as_i64).unwrap_or(0),
            message: row.text_at(1),
        }
    }

    /// Fail with the procedure's message on a nonzero status.
    pub fn into_result(self, procedure: &str) -> Result<()> {
        if self.status == 0 {
            Ok(())
        } else {
            Err(Error::Procedure {
                procedure: procedure.to_string(),
                message: self.message,
            })
        }
    }
}

/// A named process-wide critical section.
#[derive(Debug)]
pub struct ProcedureLock {
    name: &'static str,
    inner: Mutex<()>,
}

impl ProcedureLock {
    /// Create an unlocked section.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(()),
        }
    }

    /// Section name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for exclusive access; released when the guard drops.
    pub async fn enter(&self) -> MutexGuard<'_, ()> {
        log::trace!("Waiting for {}", self.name);
        let guard = self.inner.lock().await;
        log::trace!("Entered {}", self.name);
        guard
    }
}

/// Runs audit-rule procedures under a shared [`ProcedureLock`].
#[derive(Debug, Clone)]
pub struct AuditRuleProtocol {
    lock: Arc<ProcedureLock>,
}

impl AuditRuleProtocol {
    /// Create a protocol runner sharing `lock` with every other runner.
    pub fn new(lock: Arc<ProcedureLock>) -> Self {
        Self { lock }
    }

    /// Create a rule and recover its id.
    pub async fn create(
        &self,
        handle: &dyn SqlHandle,
        ctx: &CallContext,
        fields: &AuditRuleFields,
    ) -> Result<AuditRule> {
        fields.validate()?;
        let _guard = self.lock.enter().await;
        let session = handle.session(ctx).await?;

        session.exec(ctx, CREATE_CALL, &fields.args()).await?;
        confirm(session.as_ref(), ctx, CREATE_PROCEDURE).await?;

        let rows = session.query(ctx, LIST_ALL_CALL, &[]).await?;
        confirm(session.as_ref(), ctx, LIST_PROCEDURE).await?;

        for row in &rows {
            let rule = AuditRule::from_row(row)?;
            if rule.fields.matches(fields) {
                log::info!("Created audit rule {} ({})", rule.id, fields);
                return Ok(rule);
            }
        }
        Err(Error::Correlation {
            procedure: CREATE_PROCEDURE.to_string(),
            fields: fields.to_string(),
        })
    }

    /// Fetch one rule by id.
    pub async fn read(&self, handle: &dyn SqlHandle, ctx: &CallContext, id: i64) -> Result<AuditRule> {
        let _guard = self.lock.enter().await;
        let session = handle.session(ctx).await?;

        let rows = session.query(ctx, LIST_ONE_CALL, &[Value::Int(id)]).await?;
        confirm(session.as_ref(), ctx, LIST_PROCEDURE).await?;

        match rows.first() {
            Some(row) => AuditRule::from_row(row),
            None => Err(Error::not_found(format!("audit rule {id}"))),
        }
    }

    /// Overwrite every field of a rule.
    pub async fn update(
        &self,
        handle: &dyn SqlHandle,
        ctx: &CallContext,
        id: i64,
        fields: &AuditRuleFields,
    ) -> Result<()> {
        fields.validate()?;
        let _guard = self.lock.enter().await;
        let session = handle.session(ctx).await?;

        let mut args = vec![Value::Int(id)];
        args.extend(fields.args());
        session.exec(ctx, UPDATE_CALL, &args).await?;
        confirm(session.as_ref(), ctx, UPDATE_PROCEDURE).await?;
        log::info!("Updated audit rule {id} ({fields})");
        Ok(())
    }

    /// Delete a rule.
    pub async fn delete(&self, handle: &dyn SqlHandle, ctx: &CallContext, id: i64) -> Result<()> {
        let _guard = self.lock.enter().await;
        let session = handle.session(ctx).await?;

        session.exec(ctx, DELETE_CALL, &[Value::Int(id)]).await?;
        confirm(session.as_ref(), ctx, DELETE_PROCEDURE).await?;
        log::info!("Deleted audit rule {id}");
        Ok(())
    }
}

async fn confirm(session: &dyn Executor, ctx: &CallContext, procedure: &str) -> Result<()> {
    let outcome = session
        .query_row(ctx, CONFIRM_QUERY, &[])
        .await?
        .map(|row| ProcedureOutcome::from_row(&row))
        .ok_or_else(|| Error::Procedure {
            procedure: procedure.to_string(),
            message: "no outcome was reported".to_string(),
        })?;
    log::debug!(
        "{procedure} outcome: status={} message={:?}",
        outcome.status,
        outcome.message
    );
    outcome.into_result(procedure)
}
