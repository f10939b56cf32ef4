//! sqlx-backed MySQL handle.
//!
//! Statements without arguments go over the text protocol (`raw_sql`), since
//! MySQL refuses to prepare some administrative statements such as
//! `SHOW GRANTS`. Statements with arguments are prepared and bound.

use super::{Executor, Opener, Row, SqlHandle, Value};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::registry::mask_password;
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column as _, Row as _};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Pooled MySQL handle.
pub struct MySqlBackend {
    pool: MySqlPool,
    target: String,
}

impl MySqlBackend {
    /// Wrap an existing pool. `target` is the masked connection string used in errors.
    pub fn new(pool: MySqlPool, target: impl Into<String>) -> Self {
        Self {
            pool,
            target: target.into(),
        }
    }
}

#[async_trait]
impl Executor for MySqlBackend {
    async fn exec(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<u64> {
        log::debug!("exec: {statement}");
        ctx.run(statement, async {
            execute(&self.pool, statement, args)
                .await
                .map_err(|e| Error::from_sqlx(statement, &e))
        })
        .await
    }

    async fn query(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<Vec<Row>> {
        log::debug!("query: {statement}");
        ctx.run(statement, async {
            fetch_all(&self.pool, statement, args)
                .await
                .map_err(|e| Error::from_sqlx(statement, &e))
        })
        .await
    }
}

#[async_trait]
impl SqlHandle for MySqlBackend {
    async fn session(&self, ctx: &CallContext) -> Result<Box<dyn Executor>> {
        let conn = ctx
            .run("acquire session", async {
                self.pool.acquire().await.map_err(|e| Error::Connection {
                    target: self.target.clone(),
                    message: e.to_string(),
                })
            })
            .await?;
        Ok(Box::new(MySqlSession {
            conn: Mutex::new(conn),
        }))
    }
}

/// One pinned pool connection; returned to the pool on drop.
struct MySqlSession {
    conn: Mutex<PoolConnection<MySql>>,
}

#[async_trait]
impl Executor for MySqlSession {
    async fn exec(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<u64> {
        log::debug!("exec (session): {statement}");
        let mut guard = self.conn.lock().await;
        let conn: &mut MySqlConnection = &mut guard;
        ctx.run(statement, async {
            execute(conn, statement, args)
                .await
                .map_err(|e| Error::from_sqlx(statement, &e))
        })
        .await
    }

    async fn query(&self, ctx: &CallContext, statement: &str, args: &[Value]) -> Result<Vec<Row>> {
        log::debug!("query (session): {statement}");
        let mut guard = self.conn.lock().await;
        let conn: &mut MySqlConnection = &mut guard;
        ctx.run(statement, async {
            fetch_all(conn, statement, args)
                .await
                .map_err(|e| Error::from_sqlx(statement, &e))
        })
        .await
    }
}

/// Opens lazily-connecting sqlx pools.
#[derive(Debug, Clone, Copy)]
pub struct MySqlOpener {
    max_connections: u32,
}

impl MySqlOpener {
    /// Create an opener whose pools hold at most `max_connections` connections.
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections: max_connections.max(1),
        }
    }
}

impl Opener for MySqlOpener {
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlHandle>> {
        let target = mask_password(dsn);
        log::info!("Opening connection pool for {target}");
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_lazy(dsn)
            .map_err(|e| Error::Connection {
                target: target.clone(),
                message: e.to_string(),
            })?;
        Ok(Arc::new(MySqlBackend::new(pool, target)))
    }
}

fn bind_all<'a>(
    mut query: Query<'a, MySql, MySqlArguments>,
    args: &'a [Value],
) -> Query<'a, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Int(i) => query.bind(*i),
            Value::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

async fn execute<'a, E>(executor: E, statement: &'a str, args: &'a [Value]) -> sqlx::Result<u64>
where
    E: sqlx::Executor<'a, Database = MySql>,
{
    let result = if args.is_empty() {
        executor.execute(sqlx::raw_sql(statement)).await?
    } else {
        executor
            .execute(bind_all(sqlx::query(statement), args))
            .await?
    };
    Ok(result.rows_affected())
}

async fn fetch_all<'a, E>(executor: E, statement: &'a str, args: &'a [Value]) -> sqlx::Result<Vec<Row>>
where
    E: sqlx::Executor<'a, Database = MySql>,
{
    let rows = if args.is_empty() {
        executor.fetch_all(sqlx::raw_sql(statement)).await?
    } else {
        executor
            .fetch_all(bind_all(sqlx::query(statement), args))
            .await?
    };
    Ok(rows.iter().map(convert_row).collect())
}

fn convert_row(mysql_row: &MySqlRow) -> Row {
    let mut row = Row::new();
    for (index, column) in mysql_row.columns().iter().enumerate() {
        row.push(column.name(), convert_value(mysql_row, index));
    }
    row
}

// NULL skips the type check, so the first decode attempt also catches every NULL.
fn convert_value(mysql_row: &MySqlRow, index: usize) -> Value {
    if let Ok(value) = mysql_row.try_get::<Option<i64>, _>(index) {
        value.map_or(Value::Null, Value::Int)
    } else if let Ok(Some(value)) = mysql_row.try_get::<Option<u64>, _>(index) {
        i64::try_from(value).map_or_else(|_| Value::Text(value.to_string()), Value::Int)
    } else if let Ok(Some(value)) = mysql_row.try_get::<Option<String>, _>(index) {
        Value::Text(value)
    } else if let Ok(Some(value)) = mysql_row.try_get::<Option<Vec<u8>>, _>(index) {
        Value::Text(String::from_utf8_lossy(&value).into_owned())
    } else {
        Value::Null
    }
}
