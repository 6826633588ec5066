//! Bounded connection pool.
//!
//! At most `max_size` connections exist at once. A checkout reuses an idle
//! connection, opens a new one while under the limit, and otherwise waits for
//! a connection to be returned (or for `checkout_timeout` to elapse).

#[cfg(test)]
mod tests;

use crate::driver::{Connection, Driver};
use crate::error::{DbError, DbResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened up front.
    pub min_idle: usize,
    /// Upper bound on open connections.
    pub max_size: usize,
    /// How long a checkout may wait; `None` waits indefinitely.
    pub checkout_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_idle: 10,
            max_size: 20,
            checkout_timeout: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = Some(timeout);
        self
    }

    fn validate(&self) -> DbResult<()> {
        if self.max_size == 0 {
            return Err(DbError::config("pool max_size must be at least 1"));
        }
        if self.min_idle > self.max_size {
            return Err(DbError::config(format!(
                "pool min_idle ({}) exceeds max_size ({})",
                self.min_idle, self.max_size
            )));
        }
        Ok(())
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub open: usize,
    pub max_size: usize,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    /// Idle plus checked-out connections.
    open: usize,
    closed: bool,
}

struct PoolInner {
    driver: Arc<dyn Driver>,
    config: PoolConfig,
    /// One permit per connection slot.
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
}

impl PoolInner {
    // The state is plain counters and a Vec; a panic while holding the lock
    // cannot leave it half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A shared, bounded set of live connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl Pool {
    /// Create a pool and open `min_idle` connections.
    pub async fn new(driver: impl Driver, config: PoolConfig) -> DbResult<Self> {
        Self::with_driver(Arc::new(driver), config).await
    }

    pub async fn with_driver(driver: Arc<dyn Driver>, config: PoolConfig) -> DbResult<Self> {
        config.validate()?;
        let pool = Self {
            inner: Arc::new(PoolInner {
                driver,
                semaphore: Arc::new(Semaphore::new(config.max_size)),
                config,
                state: Mutex::new(PoolState::default()),
            }),
        };

        let mut opened = Vec::with_capacity(pool.inner.config.min_idle);
        for _ in 0..pool.inner.config.min_idle {
            opened.push(pool.inner.driver.connect().await?);
        }
        {
            let mut state = pool.inner.lock();
            state.open = opened.len();
            state.idle = opened;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqlcraft.pool",
            min_idle = pool.inner.config.min_idle,
            max_size = pool.inner.config.max_size,
            "pool opened"
        );

        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Check out a connection, waiting while all `max_size` are in use.
    pub async fn get(&self) -> DbResult<PooledConnection> {
        let permit = self.acquire_permit().await?;

        // Reuse an idle connection, dropping any that went bad while parked.
        loop {
            let candidate = {
                let mut state = self.inner.lock();
                if state.closed {
                    return Err(DbError::Pool("pool is closed".into()));
                }
                match state.idle.pop() {
                    Some(conn) => Some(conn),
                    None => {
                        state.open += 1;
                        None
                    }
                }
            };
            match candidate {
                Some(conn) if conn.is_broken() => {
                    self.inner.lock().open -= 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(target: "sqlcraft.pool", "discarded broken idle connection");
                }
                Some(conn) => return Ok(self.wrap(conn, permit)),
                None => break,
            }
        }

        // The slot reserved in `open` above is released unless the connect succeeds,
        // including when this future is dropped mid-connect.
        let reservation = OpenReservation {
            pool: &self.inner,
            armed: true,
        };
        match self.inner.driver.connect().await {
            Ok(conn) => {
                reservation.keep();
                #[cfg(feature = "tracing")]
                tracing::debug!(target: "sqlcraft.pool", "opened new connection");
                Ok(self.wrap(conn, permit))
            }
            Err(e) => {
                drop(reservation);
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "sqlcraft.pool", error = %e, "failed to open connection");
                Err(e)
            }
        }
    }

    async fn acquire_permit(&self) -> DbResult<OwnedSemaphorePermit> {
        let semaphore = Arc::clone(&self.inner.semaphore);
        let acquired = match self.inner.config.checkout_timeout {
            Some(timeout) => tokio::time::timeout(timeout, semaphore.acquire_owned())
                .await
                .map_err(|_| DbError::Timeout(timeout))?,
            None => semaphore.acquire_owned().await,
        };
        acquired.map_err(|_| DbError::Pool("pool is closed".into()))
    }

    fn wrap(&self, conn: Box<dyn Connection>, permit: OwnedSemaphorePermit) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Drop idle connections and reject further checkouts. Connections still
    /// checked out are discarded when returned.
    pub fn close(&self) {
        let idle = {
            let mut state = self.inner.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.open -= idle.len();
            idle
        };
        self.inner.semaphore.close();
        drop(idle);

        #[cfg(feature = "tracing")]
        tracing::debug!(target: "sqlcraft.pool", "pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.lock();
        PoolStatus {
            idle: state.idle.len(),
            in_use: state.open - state.idle.len(),
            open: state.open,
            max_size: self.inner.config.max_size,
        }
    }
}

/// A slot counted in `open` for a connection that is still being opened.
struct OpenReservation<'a> {
    pool: &'a PoolInner,
    armed: bool,
}

impl OpenReservation<'_> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for OpenReservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.lock().open -= 1;
        }
    }
}

/// A checked-out connection. Dropping it returns the connection to the pool.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
    // Released after the connection is back in the idle set (fields drop after `drop`).
    _permit: OwnedSemaphorePermit,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        // `conn` is only taken in `drop`.
        match &self.conn {
            Some(conn) => conn.as_ref(),
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn.as_mut(),
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else { return };
        let mut state = self.pool.lock();
        if state.closed || conn.is_broken() {
            state.open -= 1;
            drop(state);
            drop(conn);
            #[cfg(feature = "tracing")]
            tracing::debug!(target: "sqlcraft.pool", "discarded returned connection");
        } else {
            state.idle.push(conn);
        }
    }
}
