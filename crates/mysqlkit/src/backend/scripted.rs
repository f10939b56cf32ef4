//! Scripted in-memory SQL handle.
//!
//! Records every statement it receives and answers from a queue of canned
//! responses. When the queue is empty, `exec` reports zero affected rows and
//! `query` returns no rows. Sessions share the parent's script and call log,
//! with each call marked as made on a session. Every call yields once to the
//! scheduler before answering.

use super::{Executor, Opener, Row, SqlHandle, Value};
use crate::context::CallContext;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A canned answer to the next call.
#[derive(Debug, Clone)]
pub enum Response {
    /// Rows for a query
    Rows(Vec<Row>),
    /// Affected-row count for an exec
    Affected(u64),
    /// Fail the call
    Fail(Error),
    /// Never complete; only the call context can end the call
    Hang,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Statement text
    pub statement: String,
    /// Bound arguments
    pub args: Vec<Value>,
    /// Whether the call ran on a pinned session
    pub on_session: bool,
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Response>,
    calls: Vec<Call>,
    sessions: usize,
}

/// Scripted handle for tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedHandle {
    /// Create a handle with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push(&self, response: Response) -> &Self {
        self.lock().responses.push_back(response);
        self
    }

    /// Queue a row set.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.push(Response::Rows(rows))
    }

    /// Queue an affected-row count.
    pub fn push_affected(&self, affected: u64) -> &Self {
        self.push(Response::Affected(affected))
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) -> &Self {
        self.push(Response::Fail(error))
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Statement text of every call received so far.
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|c| c.statement.clone())
            .collect()
    }

    /// Number of sessions opened.
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions
    }

    /// Responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, statement: &str, args: &[Value], on_session: bool) -> Option<Response> {
        let mut script = self.lock();
        script.calls.push(Call {
            statement: statement.to_string(),
            args: args.to_vec(),
            on_session,
        });
        script.responses.pop_front()
    }

    async fn answer(
        &self,
        ctx: &CallContext,
        statement: &str,
        args: &[Value],
        on_session: bool,
    ) -> Result<Response> {
        let response = self.record(statement, args, on_session);
        ctx.run(statement, async move {
            // Suspend like a network round trip so concurrent callers can interleave.
            tokio::task::yield_now().await;
            match response {
                Some(Response::Fail(error)) => Err(error),
                Some(Response::Hang) => std::future::pending().await,
                Some(other) => Ok(other),
                None => Ok(Response::Rows(Vec::new())),
            }
        })
        .await
    }

    async fn exec_as(
        &self,
        ctx: &CallContext,
        statement: &str,
        args: &[Value],
        on_session: bool,
    ) -> Result<u64> {
        match self.answer(ctx, statement, args, on_session).await? {
            Response::Affected(n) => Ok(n),
            _ => Ok(0),
        }
    }

    async fn query_as(
        &self,
        ctx: &CallContext,
        statement: &str,
        args: &[Value],
        on_session: bool,
    ) -> Result<Vec<Row>> {
        match self.answer(ctx, statement, args, on_session).await? {
            Response::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Executor for ScriptedHandle {
    async fn exec(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<u64> {
        self.exec_as(ctx, statement, args, false).await
    }

    async fn query(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<Vec<Row>> {
        self.query_as(ctx, statement, args, false).await
    }
}

#[async_trait]
impl SqlHandle for ScriptedHandle {
    async fn session(&self, _ctx: &CallContext) -> Result<Box<dyn Executor>> {
        self.lock().sessions += 1;
        Ok(Box::new(ScriptedSession {
            handle: self.clone(),
        }))
    }
}

struct ScriptedSession {
    handle: ScriptedHandle,
}

#[async_trait]
impl Executor for ScriptedSession {
    async fn exec(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<u64> {
        self.handle.exec_as(ctx, statement, args, true).await
    }

    async fn query(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<Vec<Row>> {
        self.handle.query_as(ctx, statement, args, true).await
    }
}

/// Opener that hands out one shared [`ScriptedHandle`] and counts opens.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOpener {
    handle: ScriptedHandle,
    opened: Arc<AtomicUsize>,
    refuse: Option<String>,
}

impl ScriptedOpener {
    /// Create an opener serving `handle`.
    pub fn new(handle: ScriptedHandle) -> Self {
        Self {
            handle,
            ..Self::default()
        }
    }

    /// Fail every open whose connection string contains `needle`.
    pub fn refusing(mut self, needle: impl Into<String>) -> Self {
        self.refuse = Some(needle.into());
        self
    }

    /// Shared open counter.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened)
    }
}

impl Opener for ScriptedOpener {
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlHandle>> {
        if self.refuse.as_deref().is_some_and(|needle| dsn.contains(needle)) {
            return Err(Error::Connection {
                target: crate::registry::mask_password(dsn),
                message: "connection refused".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_in_order_and_records_calls() {
        let handle = ScriptedHandle::new();
        handle
            .push_affected(1)
            .push_rows(vec![Row::new().with("id", 1_i64)]);
        let ctx = CallContext::background();

        assert_eq!(handle.exec(&ctx, "CREATE ROLE 'r'", &[]).await.unwrap(), 1);
        let rows = handle
            .query(&ctx, "SELECT ?", &[Value::from("x")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let calls = handle.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec![Value::from("x")]);
        assert!(!calls[1].on_session);
    }

    #[tokio::test]
    async fn test_session_shares_script() {
        let handle = ScriptedHandle::new();
        handle.push_error(Error::not_found("rule"));
        let ctx = CallContext::background();

        let session = handle.session(&ctx).await.unwrap();
        assert!(session.exec(&ctx, "CALL x()", &[]).await.is_err());
        assert_eq!(handle.sessions_opened(), 1);
        assert!(handle.calls()[0].on_session);
    }
}
