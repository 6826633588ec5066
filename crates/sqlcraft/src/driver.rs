//! Driver and connection contracts.
//!
//! A [`Driver`] declares its placeholder style and opens [`Connection`]s; the
//! pool owns the connections and hands them out one caller at a time.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::DbResult;
use crate::value::Value;

/// A database driver.
#[async_trait::async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Declared placeholder style name (`qmark`, `format`, `pyformat` or `numeric`).
    fn paramstyle(&self) -> &str;

    /// Open a new connection.
    async fn connect(&self) -> DbResult<Box<dyn Connection>>;
}

/// A live database connection.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Run a statement and return every row, cells in SELECT-list order.
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Vec<Value>>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Run one statement once per parameter row.
    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> DbResult<u64> {
        let mut affected = 0;
        for row in rows {
            affected += self.execute(sql, row).await?;
        }
        Ok(affected)
    }

    /// Whether the connection can no longer be used. Broken connections are
    /// discarded instead of returning to the pool.
    fn is_broken(&self) -> bool {
        false
    }
}
