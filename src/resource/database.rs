//! Database (schema) resource

use super::{Connection, call_context, data, lifecycle_error, model};
use async_trait::async_trait;
use declarative::{ApplyContext, Attribute, Lifecycle, LifecycleResult, ResourceData, Schema};
use mysqlkit::{ConnectionRegistry, database, validate_database_name};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseModel {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collation: Option<String>,
}

/// `database.<name>`: a schema, with optional default character set and collation
///
/// Character set and collation are filled from the server when not declared.
pub struct DatabaseResource {
    schema: Schema,
    connection: Connection,
}

impl DatabaseResource {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            schema: Schema::new(vec![
                Attribute::scalar("name").requires_replace(),
                Attribute::scalar("character_set")
                    .optional()
                    .computed()
                    .case_insensitive()
                    .requires_replace(),
                Attribute::scalar("collation")
                    .optional()
                    .computed()
                    .case_insensitive()
                    .requires_replace(),
            ]),
            connection: Connection::new(registry),
        }
    }

    async fn lookup(&self, ctx: &ApplyContext, name: &str) -> LifecycleResult<ResourceData> {
        let info = database::lookup(self.connection.handle()?, &call_context(ctx), name)
            .await
            .map_err(lifecycle_error)?;
        data(&DatabaseModel {
            name: info.name,
            character_set: Some(info.character_set),
            collation: Some(info.collation),
        })
    }
}

#[async_trait]
impl Lifecycle for DatabaseResource {
    fn type_name(&self) -> &'static str {
        "database"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn configure(&self) -> LifecycleResult<()> {
        self.connection.configure()
    }

    fn validate(&self, desired: &ResourceData) -> LifecycleResult<()> {
        let db: DatabaseModel = model(desired)?;
        validate_database_name(&db.name).map_err(lifecycle_error)
    }

    async fn create(&self, ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
        let db: DatabaseModel = model(desired)?;
        database::create(
            self.connection.handle()?,
            &call_context(ctx),
            &db.name,
            db.character_set.as_deref(),
            db.collation.as_deref(),
        )
        .await
        .map_err(lifecycle_error)?;
        self.lookup(ctx, &db.name).await
    }

    async fn read(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
        let db: DatabaseModel = model(prior)?;
        self.lookup(ctx, &db.name).await
    }

    async fn delete(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()> {
        let db: DatabaseModel = model(prior)?;
        database::drop(self.connection.handle()?, &call_context(ctx), &db.name)
            .await
            .map_err(lifecycle_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing;
    use mysqlkit::backend::Row;
    use mysqlkit::backend::scripted::ScriptedHandle;
    use serde_json::json;

    fn schema_row(name: &str) -> Row {
        Row::new()
            .with("SCHEMA_NAME", name)
            .with("DEFAULT_CHARACTER_SET_NAME", "utf8mb4")
            .with("DEFAULT_COLLATION_NAME", "utf8mb4_0900_ai_ci")
    }

    #[tokio::test]
    async fn test_create_fills_server_defaults() {
        let handle = ScriptedHandle::new();
        handle.push_affected(1).push_rows(vec![schema_row("app")]);
        let db = DatabaseResource::new(testing::registry(&handle));
        db.configure().unwrap();

        let state = db
            .create(&testing::ctx(), &testing::json(json!({"name": "app"})))
            .await
            .unwrap();
        assert_eq!(state.get_str("character_set"), Some("utf8mb4"));
        assert_eq!(state.get_str("collation"), Some("utf8mb4_0900_ai_ci"));
        assert_eq!(handle.statements()[0], "CREATE DATABASE `app`");
    }

    #[tokio::test]
    async fn test_read_missing_database() {
        let handle = ScriptedHandle::new();
        let db = DatabaseResource::new(testing::registry(&handle));
        db.configure().unwrap();

        let err = db
            .read(&testing::ctx(), &testing::json(json!({"name": "gone"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Database 'gone' not found");
    }

    #[test]
    fn test_undeclared_defaults_do_not_diff() {
        let handle = ScriptedHandle::new();
        let db = DatabaseResource::new(testing::registry(&handle));
        let prior = testing::json(json!({
            "name": "app", "character_set": "utf8mb4", "collation": "utf8mb4_0900_ai_ci"
        }));
        assert!(db.schema().changes(&prior, &testing::json(json!({"name": "app"}))).is_empty());

        let changes = db
            .schema()
            .changes(&prior, &testing::json(json!({"name": "app", "character_set": "latin1"})));
        assert_eq!(changes.len(), 1);
        assert!(changes[0].requires_replace);
    }

    #[test]
    fn test_validate_name() {
        let handle = ScriptedHandle::new();
        let db = DatabaseResource::new(testing::registry(&handle));
        assert!(db.validate(&testing::json(json!({"name": "app_1"}))).is_ok());
        assert!(db.validate(&testing::json(json!({"name": "1app"}))).is_err());
    }
}
