//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! reading current state, and converging a backend to match.
//!
//! ## Core Concepts
//!
//! - **Lifecycle**: A resource type that can create, read, update and delete instances
//! - **ResourceData**: Attribute values of one instance (desired or recorded)
//! - **Schema**: Which attributes exist and which changes force a replacement
//! - **ExecutionPlan**: One [`ResourceDiff`] per instance address
//! - **Executor**: Applies a plan tier by tier with bounded concurrency
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     plan, execute_simple, ApplyContext, Cancellation, ExecuteOptions, ResourceTypes,
//! };
//!
//! let mut types = ResourceTypes::new();
//! types.register(std::sync::Arc::new(MyRole::new()));
//! types.configure_all()?;
//!
//! let plan = plan(&types, desired, prior)?;
//! let cancellation = Cancellation::new();
//! let ctx = ApplyContext::new(&cancellation, false, false);
//! let report = execute_simple(&types, plan, &ExecuteOptions::default(), &ctx).await?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Lifecycle`]: The backend operations of one resource type
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or backends.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, Cancellation, ConfirmCallback, NoProgress,
    ProgressCallback,
};
pub use diff::{Action, Address, DiffSummary, ResourceDiff, group_by_type};
pub use executor::{
    ExecuteReport, RefreshReport, StateUpdate, StepOutcome, execute, execute_simple, refresh,
};
pub use planner::{ExecutionPlan, plan, plan_destroy, prepare_desired};
pub use resource::{Lifecycle, LifecycleError, LifecycleResult, ResourceTypes, SharedLifecycle};
pub use schema::{Attribute, AttributeChange, AttributeKind, Schema};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceData};
