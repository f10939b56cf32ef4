//! Database grant resource
//!
//! Every attribute identifies the grant, so any change destroys and
//! recreates it. Reading back reconciles the recorded privileges against the
//! `mysql.db` row: spelling recorded in state survives when it matches
//! case-insensitively, and the grant option is always taken from the server.

use super::{Connection, call_context, data, lifecycle_error, model};
use async_trait::async_trait;
use declarative::{ApplyContext, Attribute, Lifecycle, LifecycleResult, ResourceData, Schema};
use mysqlkit::grant::{self, DEFAULT_HOST};
use mysqlkit::{ConnectionRegistry, GrantSpec, GrantTarget, Principal, Privilege};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GrantModel {
    database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default = "default_host")]
    host: String,
    privileges: Vec<Privilege>,
    #[serde(default)]
    with_grant_option: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl GrantModel {
    fn target(&self) -> mysqlkit::Result<GrantTarget> {
        let principal = Principal::from_parts(self.user.as_deref(), self.role.as_deref())?;
        GrantTarget::new(&self.database, principal, Some(&self.host))
    }

    fn spec(&self) -> mysqlkit::Result<GrantSpec> {
        GrantSpec::new(self.target()?, self.privileges.clone(), self.with_grant_option)
    }
}

/// `grant.<name>`: privileges on `<database>.*` for one user or role
pub struct GrantResource {
    schema: Schema,
    connection: Connection,
}

impl GrantResource {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            schema: Schema::new(vec![
                Attribute::scalar("database").requires_replace(),
                Attribute::scalar("user").optional().requires_replace(),
                Attribute::scalar("role").optional().requires_replace(),
                Attribute::scalar("host")
                    .default_value(json!(DEFAULT_HOST))
                    .requires_replace(),
                Attribute::set("privileges").case_insensitive().requires_replace(),
                Attribute::scalar("with_grant_option")
                    .default_value(json!(false))
                    .requires_replace(),
            ]),
            connection: Connection::new(registry),
        }
    }
}

#[async_trait]
impl Lifecycle for GrantResource {
    fn type_name(&self) -> &'static str {
        "grant"
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
        let grant: GrantModel = model(desired)?;
        grant.spec().map(|_| ()).map_err(lifecycle_error)
    }

    async fn create(&self, ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
        let grant: GrantModel = model(desired)?;
        let spec = grant.spec().map_err(lifecycle_error)?;
        grant::create(self.connection.handle()?, &call_context(ctx), &spec)
            .await
            .map_err(lifecycle_error)?;
        data(&grant)
    }

    async fn read(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
        let mut grant: GrantModel = model(prior)?;
        let target = grant.target().map_err(lifecycle_error)?;
        let observed = grant::read(
            self.connection.handle()?,
            &call_context(ctx),
            &target,
            &grant.privileges,
        )
        .await
        .map_err(lifecycle_error)?;
        grant.privileges = observed.privileges;
        grant.with_grant_option = observed.with_grant_option;
        data(&grant)
    }

    async fn delete(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()> {
        let grant: GrantModel = model(prior)?;
        let target = grant.target().map_err(lifecycle_error)?;
        grant::revoke(
            self.connection.handle()?,
            &call_context(ctx),
            &target,
            &grant.privileges,
        )
        .await
        .map_err(lifecycle_error)
    }
}
