//! In-process driver for unit tests: records statements, returns canned rows.

use super::{Connection, Driver};
use crate::error::{DbError, DbResult};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
    pub rows: Mutex<Vec<Vec<Value>>>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
    /// `connect` never completes.
    pub hang_connect: AtomicBool,
    /// Statements fail with a driver error after being recorded.
    pub fail_execute: AtomicBool,
    /// Connections opened from now on report themselves broken.
    pub broken: AtomicBool,
}

impl MockState {
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub(crate) struct MockDriver {
    pub state: Arc<MockState>,
    pub style: &'static str,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::with_style("qmark")
    }

    pub fn with_style(style: &'static str) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            style,
        }
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    fn paramstyle(&self) -> &str {
        self.style
    }

    async fn connect(&self) -> DbResult<Box<dyn Connection>> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DbError::Connection("mock refused connection".into()));
        }
        if self.state.hang_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            broken: self.state.broken.load(Ordering::SeqCst),
        }))
    }
}

pub(crate) struct MockConnection {
    state: Arc<MockState>,
    broken: bool,
}

impl MockConnection {
    fn record(&self, sql: &str, params: &[Value]) -> DbResult<()> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(DbError::Driver(format!("mock rejected: {sql}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Vec<Value>>> {
        self.record(sql, params)?;
        Ok(self.state.rows.lock().unwrap().clone())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        self.record(sql, params)?;
        Ok(1)
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}
