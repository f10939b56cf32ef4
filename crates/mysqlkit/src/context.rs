//! Cancellation and deadline context for database calls.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::sync::watch;
use tokio::time::Instant;

/// Context accepted by every database call.
///
/// A call aborts with [`Error::Cancelled`] as soon as the cancel flag flips
/// to `true` or the deadline passes, whichever happens first.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancelled: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Create a context driven by a cancel flag and an optional deadline.
    pub fn new(cancelled: watch::Receiver<bool>, deadline: Option<Instant>) -> Self {
        Self {
            cancelled,
            deadline,
        }
    }

    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx, None)
    }

    /// Copy of this context with a deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Drive `call` to completion unless the context fires first.
    pub async fn run<T, F>(&self, statement: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(cancelled(statement, "cancelled before start"));
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(cancelled(statement, "deadline exceeded before start"));
        }

        let mut flag = self.cancelled.clone();
        tokio::select! {
            biased;
            () = wait_cancelled(&mut flag) => Err(cancelled(statement, "cancelled")),
            () = wait_deadline(self.deadline) => Err(cancelled(statement, "deadline exceeded")),
            result = call => result,
        }
    }
}

fn cancelled(statement: &str, reason: &str) -> Error {
    log::debug!("Aborting \"{statement}\": {reason}");
    Error::Cancelled {
        statement: statement.to_string(),
        reason: reason.to_string(),
    }
}

async fn wait_cancelled(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            // Sender gone: the flag can never flip.
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
