//! SQL execution handle abstraction.
//!
//! The [`Executor`] trait is the only way the rest of the crate talks to a
//! database, allowing for different implementations:
//! - [`mysql::MySqlBackend`]: a pooled sqlx connection to a real instance
//! - [`scripted::ScriptedHandle`]: a recorded, scripted handle for tests

pub mod mysql;
pub mod scripted;

use crate::context::CallContext;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A value bound to a statement placeholder or read back from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Any integer column or argument
    Int(i64),
    /// Any character or binary column, decoded lossily as UTF-8
    Text(String),
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, accepting numeric text as well.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One result row, keeping column order and names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    /// Builder form of [`Row::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Value at a column position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).map(|(_, v)| v)
    }

    /// Value of a named column (case-insensitive, as MySQL column names are).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Text at a column position, empty when NULL or missing.
    pub fn text_at(&self, index: usize) -> String {
        self.at(index)
            .map(|v| match v {
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Statement execution against a database or a single session.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn exec(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<u64>;

    /// Run a statement and collect every returned row.
    async fn query(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement and return its first row, if any.
    async fn query_row(
        &self,
        ctx: &CallContext,
        statement: &str,
        args: &[Value],
    ) -> Result<Option<Row>> {
        Ok(self.query(ctx, statement, args).await?.into_iter().next())
    }
}

/// A shareable connection handle.
///
/// The handle pools its own connections, so it is safe to use from many
/// tasks at once. Statements that rely on session state (user variables)
/// must run on one [`SqlHandle::session`].
#[async_trait]
pub trait SqlHandle: Executor {
    /// Pin a single underlying connection for a sequence of statements.
    async fn session(&self, ctx: &CallContext) -> Result<Box<dyn Executor>>;
}

/// Opens connection handles for resolved connection strings.
pub trait Opener: Send + Sync {
    /// Open a handle; the handle may connect lazily.
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let row = Row::new().with("Select_priv", "Y").with("Host", "%");
        assert_eq!(row.get("select_priv"), Some(&Value::Text("Y".into())));
        assert_eq!(row.get("HOST").and_then(Value::as_str), Some("%"));
        assert!(row.get("Insert_priv").is_none());
    }

    #[test]
    fn test_value_as_i64_accepts_numeric_text() {
        assert_eq!(Value::Int(3).as_i64(), Some(3));
        assert_eq!(Value::from("12").as_i64(), Some(12));
        assert_eq!(Value::from("x").as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn test_text_at_treats_null_as_empty() {
        let row = Row::new().with("id", 4_i64).with("user", Value::Null);
        assert_eq!(row.text_at(0), "4");
        assert_eq!(row.text_at(1), "");
        assert_eq!(row.text_at(9), "");
    }
}
