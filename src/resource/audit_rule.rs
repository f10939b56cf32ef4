//! Audit rule resource
//!
//! The only resource updated in place. Its id is assigned by the server and
//! recorded in state after creation.

use super::{Connection, call_context, data, lifecycle_error, model};
use async_trait::async_trait;
use declarative::{
    ApplyContext, Attribute, Lifecycle, LifecycleError, LifecycleResult, ResourceData, Schema,
};
use mysqlkit::{AuditRule, AuditRuleFields, AuditRuleProtocol, ConnectionRegistry, ProcedureLock};
use std::sync::Arc;

/// `audit_rule.<name>`: a rule of the Cloud SQL audit plugin
pub struct AuditRuleResource {
    schema: Schema,
    connection: Connection,
    protocol: AuditRuleProtocol,
}

impl AuditRuleResource {
    /// `lock` serializes procedure calls across every audit rule operation
    pub fn new(registry: Arc<ConnectionRegistry>, lock: Arc<ProcedureLock>) -> Self {
        Self {
            schema: Schema::new(vec![
                Attribute::scalar("id").computed(),
                Attribute::scalar("user").case_insensitive(),
                Attribute::scalar("database").case_insensitive(),
                Attribute::scalar("object").case_insensitive(),
                Attribute::scalar("operation").case_insensitive(),
                Attribute::scalar("ops_result").case_insensitive(),
            ]),
            connection: Connection::new(registry),
            protocol: AuditRuleProtocol::new(lock),
        }
    }
}

fn recorded_id(prior: &ResourceData) -> LifecycleResult<i64> {
    prior
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| LifecycleError::Operation(anyhow::anyhow!("state holds no audit rule id")))
}

#[async_trait]
impl Lifecycle for AuditRuleResource {
    fn type_name(&self) -> &'static str {
        "audit_rule"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn tier(&self) -> u8 {
        2
    }

    fn configure(&self) -> LifecycleResult<()> {
        self.connection.configure()
    }

    fn validate(&self, desired: &ResourceData) -> LifecycleResult<()> {
        let fields: AuditRuleFields = model(desired)?;
        fields.validate().map_err(lifecycle_error)
    }

    async fn create(&self, ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
        let fields: AuditRuleFields = model(desired)?;
        let rule = self
            .protocol
            .create(self.connection.handle()?, &call_context(ctx), &fields)
            .await
            .map_err(lifecycle_error)?;
        data(&rule)
    }

    async fn read(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
        let id = recorded_id(prior)?;
        let rule = self
            .protocol
            .read(self.connection.handle()?, &call_context(ctx), id)
            .await
            .map_err(lifecycle_error)?;
        data(&rule)
    }

    async fn update(
        &self,
        ctx: &ApplyContext,
        prior: &ResourceData,
        desired: &ResourceData,
    ) -> LifecycleResult<ResourceData> {
        let id = recorded_id(prior)?;
        let fields: AuditRuleFields = model(desired)?;
        self.protocol
            .update(self.connection.handle()?, &call_context(ctx), id, &fields)
            .await
            .map_err(lifecycle_error)?;
        data(&AuditRule { id, fields })
    }

    async fn delete(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()> {
        let id = recorded_id(prior)?;
        self.protocol
            .delete(self.connection.handle()?, &call_context(ctx), id)
            .await
            .map_err(lifecycle_error)
    }
}
