//! MySQL building blocks for managing Cloud SQL grants, roles, databases and audit rules.
//!
//! Everything talks to the server through the [`backend::Executor`] /
//! [`backend::SqlHandle`] traits, so the same code runs against a pooled sqlx
//! connection or the scripted handle used in tests.
//!
//! # Example
//!
//! ```no_run
//! use mysqlkit::backend::mysql::MySqlOpener;
//! use mysqlkit::{CallContext, ConnectionRegistry, DsnTemplate, role};
//!
//! # async fn example() -> mysqlkit::Result<()> {
//! let template = DsnTemplate::new("admin", "secret", "127.0.0.1", 3306)?;
//! let registry = ConnectionRegistry::new(template, Box::new(MySqlOpener::new(4)));
//! let handle = registry.acquire_database("")?;
//!
//! let ctx = CallContext::background();
//! role::create(handle.as_ref(), &ctx, "readers").await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod backend;
mod context;
pub mod database;
mod error;
pub mod grant;
pub mod privilege;
pub mod reconcile;
mod registry;
pub mod role;
mod sql;

pub use audit::{AuditRule, AuditRuleFields, AuditRuleProtocol, ProcedureLock};
pub use context::CallContext;
pub use error::{ER_NONEXISTING_GRANT, Error, ErrorCategory, Result};
pub use grant::{GrantSpec, GrantTarget, Principal};
pub use privilege::Privilege;
pub use registry::{ConnectionRegistry, DsnTemplate, mask_password};
pub use sql::validate_database_name;
