//! Role resource

use super::{Connection, call_context, lifecycle_error, model};
use async_trait::async_trait;
use declarative::{ApplyContext, Attribute, Lifecycle, LifecycleResult, ResourceData, Schema};
use mysqlkit::{ConnectionRegistry, role};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RoleModel {
    name: String,
}

/// `role.<name>`: a MySQL role
pub struct RoleResource {
    schema: Schema,
    connection: Connection,
}

impl RoleResource {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            schema: Schema::new(vec![Attribute::scalar("name").requires_replace()]),
            connection: Connection::new(registry),
        }
    }
}

#[async_trait]
impl Lifecycle for RoleResource {
    fn type_name(&self) -> &'static str {
        "role"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn tier(&self) -> u8 {
        1
    }

    fn configure(&self) -> LifecycleResult<()> {
        self.connection.configure()
    }

    fn validate(&self, desired: &ResourceData) -> LifecycleResult<()> {
        let role: RoleModel = model(desired)?;
        role::validate_name(&role.name).map_err(lifecycle_error)
    }

    async fn create(&self, ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
        let role: RoleModel = model(desired)?;
        role::create(self.connection.handle()?, &call_context(ctx), &role.name)
            .await
            .map_err(lifecycle_error)?;
        Ok(desired.clone())
    }

    async fn read(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
        let role: RoleModel = model(prior)?;
        role::exists(self.connection.handle()?, &call_context(ctx), &role.name)
            .await
            .map_err(lifecycle_error)?;
        Ok(prior.clone())
    }

    async fn delete(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()> {
        let role: RoleModel = model(prior)?;
        role::drop(self.connection.handle()?, &call_context(ctx), &role.name)
            .await
            .map_err(lifecycle_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing;
    use mysqlkit::backend::Row;
    use declarative::{ApplyContext, Cancellation};
    use mysqlkit::backend::scripted::{Response, ScriptedHandle};
    use serde_json::json;
    use std::time::Duration;

    fn configured(handle: &ScriptedHandle) -> RoleResource {
        let role = RoleResource::new(testing::registry(handle));
        role.configure().unwrap();
        role
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let handle = ScriptedHandle::new();
        let role = configured(&handle);
        let data = testing::json(json!({"name": "readers"}));

        let created = role.create(&testing::ctx(), &data).await.unwrap();
        assert_eq!(created, data);
        role.delete(&testing::ctx(), &data).await.unwrap();

        assert_eq!(
            handle.statements(),
            vec!["CREATE ROLE 'readers'", "DROP ROLE 'readers'"]
        );
    }

    #[tokio::test]
    async fn test_read_missing_role_is_not_found() {
        let handle = ScriptedHandle::new();
        handle.push_error(mysqlkit::Error::Execution {
            statement: "SHOW GRANTS FOR 'gone'".into(),
            message: "There is no such grant defined for user 'gone'".into(),
            code: Some(mysqlkit::ER_NONEXISTING_GRANT),
        });
        let role = configured(&handle);

        let err = role
            .read(&testing::ctx(), &testing::json(json!({"name": "gone"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    async fn test_read_existing_role() {
        let handle = ScriptedHandle::new();
        handle.push_rows(vec![Row::new().with("Grants for readers@%", "GRANT USAGE ON *.* TO `readers`@`%`")]);
        let role = configured(&handle);
        let data = testing::json(json!({"name": "readers"}));
        assert_eq!(role.read(&testing::ctx(), &data).await.unwrap(), data);
    }

    #[test]
    fn test_validate() {
        let handle = ScriptedHandle::new();
        let role = RoleResource::new(testing::registry(&handle));
        assert!(role.validate(&testing::json(json!({"name": "readers"}))).is_ok());
        assert!(role.validate(&testing::json(json!({"name": ""}))).is_err());
        assert!(role.validate(&testing::json(json!({"name": "  "}))).is_err());
        assert!(handle.calls().is_empty());
        assert!(role.validate(&testing::json(json!({"name": 3}))).is_err());
    }

    #[tokio::test]
    async fn test_cancel_aborts_statement_in_flight() {
        let handle = ScriptedHandle::new();
        handle.push(Response::Hang);
        let role = configured(&handle);
        let cancellation = Arc::new(Cancellation::new());
        let ctx = ApplyContext::new(&cancellation, false, false);

        let canceller = tokio::spawn({
            let cancellation = Arc::clone(&cancellation);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancellation.cancel();
            }
        });
        let err = role
            .create(&ctx, &testing::json(json!({"name": "readers"})))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "\"CREATE ROLE 'readers'\" aborted: cancelled");
    }
}
