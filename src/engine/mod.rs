//! Execution engine for cloudsqlmysql
//!
//! The engine orchestrates:
//! 1. Planning - Join the manifest with recorded state, refreshed from the server
//! 2. Diffing - Show what would change
//! 3. Executing - Apply changes tier by tier and record the outcome in state

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ApplyOptions, execute};
pub use planner::Session;
