//! Lifecycle trait for declarative resource types
//!
//! A resource type knows how to create, read, update and delete instances of
//! itself. The planner and executor only ever talk to resource types through
//! this trait, so the same runtime drives any backend.

use crate::context::ApplyContext;
use crate::schema::Schema;
use crate::types::ResourceData;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The instance no longer exists
    #[error("{0}")]
    NotFound(String),

    /// The configuration is structurally invalid
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// The resource type does not implement the operation
    #[error("{type_name} does not support {operation}")]
    Unsupported {
        type_name: &'static str,
        operation: &'static str,
    },

    /// Any other failure
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

/// Core trait for declarative resource types
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Lifecycle, LifecycleResult, ResourceData, Schema};
///
/// struct Role { schema: Schema }
///
/// #[async_trait::async_trait]
/// impl Lifecycle for Role {
///     fn type_name(&self) -> &'static str { "role" }
///     fn schema(&self) -> &Schema { &self.schema }
///
///     fn validate(&self, _desired: &ResourceData) -> LifecycleResult<()> { Ok(()) }
///
///     async fn create(&self, _ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
///         Ok(desired.clone())
///     }
///     async fn read(&self, _ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
///         Ok(prior.clone())
///     }
///     async fn delete(&self, _ctx: &ApplyContext, _prior: &ResourceData) -> LifecycleResult<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Resource type name, the first half of an address
    fn type_name(&self) -> &'static str;

    /// Attribute schema
    fn schema(&self) -> &Schema;

    /// Dependency tier
    ///
    /// Lower tiers are created first and deleted last.
    fn tier(&self) -> u8 {
        0
    }

    /// Prepare for operations (connect, resolve handles)
    ///
    /// Called once before any other operation that touches the backend.
    fn configure(&self) -> LifecycleResult<()> {
        Ok(())
    }

    /// Structural validation; must not touch the backend
    fn validate(&self, desired: &ResourceData) -> LifecycleResult<()>;

    /// Create an instance and return its final state
    async fn create(&self, ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData>;

    /// Read the current state of an instance
    ///
    /// Returns [`LifecycleError::NotFound`] when the instance was deleted
    /// outside of this tool.
    async fn read(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData>;

    /// Change an instance in place
    async fn update(
        &self,
        _ctx: &ApplyContext,
        _prior: &ResourceData,
        _desired: &ResourceData,
    ) -> LifecycleResult<ResourceData> {
        Err(LifecycleError::Unsupported {
            type_name: self.type_name(),
            operation: "update",
        })
    }

    /// Delete an instance
    async fn delete(&self, ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()>;
}

/// Shared handle to a resource type
pub type SharedLifecycle = Arc<dyn Lifecycle>;

/// The set of resource types known to a runtime, keyed by type name
#[derive(Default, Clone)]
pub struct ResourceTypes {
    types: BTreeMap<&'static str, SharedLifecycle>,
}

impl ResourceTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type, replacing any previous one with the same name
    pub fn register(&mut self, lifecycle: SharedLifecycle) {
        self.types.insert(lifecycle.type_name(), lifecycle);
    }

    pub fn get(&self, type_name: &str) -> Option<&SharedLifecycle> {
        self.types.get(type_name)
    }

    /// Resource type names, sorted
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    /// Configure every registered type
    pub fn configure_all(&self) -> LifecycleResult<()> {
        for lifecycle in self.types.values() {
            lifecycle.configure()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResourceTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}
