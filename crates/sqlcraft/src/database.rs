//! Database facade: configuration, driver and pool in one handle.

use crate::builder::QueryBuilder;
use crate::dml::{DeleteBuilder, InsertBuilder, UpdateBuilder};
use crate::driver::Driver;
use crate::error::DbResult;
use crate::pool::{Pool, PoolConfig};
use crate::style::ParamStyle;
use crate::table::Table;
use std::fmt;
use std::sync::Arc;

/// Database configuration.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub pool: PoolConfig,
    /// Overrides the style declared by the driver.
    pub param_style: Option<ParamStyle>,
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_param_style(mut self, style: ParamStyle) -> Self {
        self.param_style = Some(style);
        self
    }
}

/// A connected database. Cheap to clone; clones share the pool.
///
/// ```ignore
/// use sqlcraft::{Database, DatabaseConfig, PgDriver, PoolConfig, Table};
///
/// let db = Database::connect(
///     PgDriver::from_url(&std::env::var("DATABASE_URL")?)?,
///     DatabaseConfig::new().with_pool(PoolConfig::new().with_min_idle(2).with_max_size(8)),
/// )
/// .await?;
///
/// let track = Table::new("Track", ["TrackId", "Name", "GenreId"])?;
/// let rows = db
///     .query()
///     .select(track.column("Name")?)
///     .where_(track.column("GenreId")?.eq(5))
///     .get()?
///     .execute()
///     .await?;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    pool: Pool,
    style: ParamStyle,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("param_style", &self.inner.style)
            .field("pool", &self.inner.pool)
            .finish()
    }
}

impl Database {
    /// Resolve the placeholder style and open the pool.
    pub async fn connect(driver: impl Driver, config: DatabaseConfig) -> DbResult<Self> {
        let style = match config.param_style {
            Some(style) => style,
            None => ParamStyle::from_name(driver.paramstyle())?,
        };
        let pool = Pool::new(driver, config.pool).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(target: "sqlcraft.pool", param_style = %style, "database connected");

        Ok(Self {
            inner: Arc::new(DatabaseInner { pool, style }),
        })
    }

    /// Start a SELECT bound to this database.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::for_database(self.clone())
    }

    /// Start an INSERT into `columns` of `table`.
    pub fn insert<I, S>(&self, table: &Table, columns: I) -> InsertBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        InsertBuilder::for_database(self.clone(), table).columns(columns)
    }

    pub fn update(&self, table: &Table) -> UpdateBuilder {
        UpdateBuilder::for_database(self.clone(), table)
    }

    pub fn delete(&self, table: &Table) -> DeleteBuilder {
        DeleteBuilder::for_database(self.clone(), table)
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    pub fn param_style(&self) -> ParamStyle {
        self.inner.style
    }

    /// Close the pool. Statements bound to this database fail afterwards.
    pub fn close(&self) {
        self.inner.pool.close();
    }
}
