//! Apply context, cancellation, and callback traits
//!
//! The callback traits keep this crate free of any particular UI; the
//! cancellation flag keeps it free of any particular signal source.

use crate::types::ApplyResult;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Process-wide cancellation flag
///
/// Every [`ApplyContext`] built from it observes [`Cancellation::cancel`].
#[derive(Debug)]
pub struct Cancellation {
    tx: watch::Sender<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Request cancellation of all in-flight and pending operations
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver that sees the flag flip
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Context passed to every lifecycle operation
#[derive(Debug, Clone)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    cancelled: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl ApplyContext {
    /// Create a context observing `cancellation`
    pub fn new(cancellation: &Cancellation, dry_run: bool, verbose: bool) -> Self {
        Self {
            dry_run,
            verbose,
            cancelled: cancellation.subscribe(),
            deadline: None,
        }
    }

    /// A context that can never be cancelled
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            dry_run: false,
            verbose: false,
            cancelled: rx,
            deadline: None,
        }
    }

    /// Abort operations still running `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Cancellation receiver, for handing to lower layers
    pub fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancelled.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
/// Calls are made from the task driving the execution, never concurrently.
pub trait ProgressCallback: Send {
    /// Called when starting a phase of `count` operations
    fn on_batch_start(&mut self, label: &str, count: usize);

    /// Called when starting a single operation
    fn on_resource_start(&mut self, address: &str, description: &str);

    /// Called when an operation completes
    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called when a phase completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _label: &str, _count: usize) {}
    fn on_resource_start(&mut self, _address: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
