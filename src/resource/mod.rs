//! Resource types managed on a Cloud SQL for MySQL instance
//!
//! Each type implements [`declarative::Lifecycle`] on top of `mysqlkit`:
//! - `database` - schemas (tier 0)
//! - `role` - roles (tier 1)
//! - `grant` - database-level grants to a user or role (tier 2)
//! - `audit_rule` - audit plugin rules, managed through stored procedures (tier 2)
//!
//! Tiers order execution: databases and roles exist before anything is
//! granted on or to them, and are removed only after.

pub mod audit_rule;
pub mod database;
pub mod grant;
pub mod role;

use declarative::{ApplyContext, LifecycleError, LifecycleResult, ResourceData, ResourceTypes};
use mysqlkit::backend::SqlHandle;
use mysqlkit::{CallContext, ConnectionRegistry, ProcedureLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock};

pub use audit_rule::AuditRuleResource;
pub use database::DatabaseResource;
pub use grant::GrantResource;
pub use role::RoleResource;

/// Register every resource type against one connection registry
///
/// The audit rule type gets its own process-wide procedure lock.
pub fn resource_types(registry: &Arc<ConnectionRegistry>) -> ResourceTypes {
    let lock = Arc::new(ProcedureLock::new("audit-rule procedures"));
    let mut types = ResourceTypes::new();
    types.register(Arc::new(DatabaseResource::new(Arc::clone(registry))));
    types.register(Arc::new(RoleResource::new(Arc::clone(registry))));
    types.register(Arc::new(GrantResource::new(Arc::clone(registry))));
    types.register(Arc::new(AuditRuleResource::new(Arc::clone(registry), lock)));
    types
}

/// Connection handle a resource type resolves once, on configure
pub(crate) struct Connection {
    registry: Arc<ConnectionRegistry>,
    handle: OnceLock<Arc<dyn SqlHandle>>,
}

impl Connection {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            handle: OnceLock::new(),
        }
    }

    /// Acquire the instance-level handle (no default database)
    pub(crate) fn configure(&self) -> LifecycleResult<()> {
        if self.handle.get().is_some() {
            return Ok(());
        }
        let handle = self.registry.acquire_database("").map_err(lifecycle_error)?;
        // A concurrent configure may have won; the registry handed both the same handle.
        let _ = self.handle.set(handle);
        Ok(())
    }

    pub(crate) fn handle(&self) -> LifecycleResult<&dyn SqlHandle> {
        self.handle
            .get()
            .map(|handle| &**handle)
            .ok_or_else(|| LifecycleError::Operation(anyhow::anyhow!("resource type used before configure")))
    }
}

/// Database call context observing the apply context's cancellation and deadline
pub(crate) fn call_context(ctx: &ApplyContext) -> CallContext {
    CallContext::new(ctx.cancel_receiver(), ctx.deadline())
}

/// Map a database error onto the lifecycle taxonomy
///
/// Absence and structural problems keep their meaning for the runtime;
/// everything else is an operation failure carrying the full message.
pub(crate) fn lifecycle_error(error: mysqlkit::Error) -> LifecycleError {
    match error {
        mysqlkit::Error::NotFound { .. } => LifecycleError::NotFound(error.to_string()),
        mysqlkit::Error::Validation { message } => LifecycleError::Validation(message),
        other => LifecycleError::Operation(anyhow::Error::new(other)),
    }
}

/// Typed view of resource data
pub(crate) fn model<T: DeserializeOwned>(data: &ResourceData) -> LifecycleResult<T> {
    data.to_model()
        .map_err(|e| LifecycleError::Validation(format!("{e:#}")))
}

/// Resource data from a typed model
pub(crate) fn data<T: Serialize>(model: &T) -> LifecycleResult<ResourceData> {
    ResourceData::from_model(model).map_err(LifecycleError::Operation)
}


#[cfg(test)]
mod tests {
    use super::*;
    use mysqlkit::backend::scripted::ScriptedHandle;

    #[test]
    fn test_all_types_registered_in_tiers() {
        let handle = ScriptedHandle::new();
        let types = resource_types(&testing::registry(&handle));
        assert_eq!(
            types.names().collect::<Vec<_>>(),
            vec!["audit_rule", "database", "grant", "role"]
        );
        let tier = |name: &str| types.get(name).map(|t| t.tier());
        assert!(tier("database") < tier("role"));
        assert!(tier("role") < tier("grant"));
        assert_eq!(tier("grant"), tier("audit_rule"));
    }

    #[test]
    fn test_configure_acquires_one_handle() {
        let handle = ScriptedHandle::new();
        let registry = testing::registry(&handle);
        let types = resource_types(&registry);
        types.configure_all().unwrap();
        types.configure_all().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handle_before_configure_fails() {
        let handle = ScriptedHandle::new();
        let connection = Connection::new(testing::registry(&handle));
        assert!(connection.handle().is_err());
    }

    #[test]
    fn test_error_mapping() {
        let not_found = lifecycle_error(mysqlkit::Error::not_found("role 'x'"));
        assert!(not_found.is_not_found());

        let invalid = lifecycle_error(mysqlkit::Error::validation("bad"));
        assert!(matches!(invalid, LifecycleError::Validation(m) if m == "bad"));

        let failed = lifecycle_error(mysqlkit::Error::Execution {
            statement: "DROP ROLE 'x'".into(),
            message: "denied".into(),
            code: Some(1227),
        });
        assert!(!failed.is_not_found());
        assert_eq!(
            failed.to_string(),
            "statement \"DROP ROLE 'x'\" failed: denied"
        );
    }
}
