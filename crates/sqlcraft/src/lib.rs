//! # sqlcraft
//!
//! Composable SQL statements over a bounded connection pool.
//!
//! ## Features
//!
//! - **Expressions as values**: tables hand out column expressions; operators build predicates
//!   with every operand parenthesized and every literal bound as a parameter
//! - **Derived FROM**: a query's FROM item is inferred from its SELECT list and WHERE clause
//! - **Joins and subqueries**: joins (`ON` or `USING`), finalized queries as FROM items or `IN`
//!   targets, aliases for both
//! - **Named parameters**: rebind a value on the finalized statement with `set_param`
//! - **Typed records**: each row carries the query's output names; convert with `FromRecord`
//! - **Safe defaults**: UPDATE and DELETE require WHERE unless `all_rows()` is called
//! - **Bounded pool**: at most `max_size` connections, waiting checkouts, optional timeout
//!
//! ## Example
//!
//! ```ignore
//! use sqlcraft::{Database, DatabaseConfig, Expr, PgDriver, Table};
//!
//! let db = Database::connect(PgDriver::from_url(url)?, DatabaseConfig::new()).await?;
//! let track = Table::new("Track", ["TrackId", "Name", "GenreId", "Milliseconds"])?;
//!
//! // SELECT
//! let mut long_tracks = db
//!     .query()
//!     .select([track.column("Name")?, track.column("Milliseconds")?])
//!     .where_(track.column("GenreId")?.eq(Expr::param("genre", 1)))
//!     .order_by_desc(track.column("Milliseconds")?)
//!     .get()?;
//! let rock = long_tracks.execute_page(Some(10), None).await?;
//! long_tracks.set_param("genre", 2)?;
//! let jazz = long_tracks.execute_page(Some(10), None).await?;
//!
//! // INSERT
//! db.insert(&track, ["TrackId", "Name", "GenreId", "Milliseconds"])
//!     .get()?
//!     .execute_values(&[vec![1.into(), "Intro".into(), 1.into(), 60_000.into()]])
//!     .await?;
//!
//! // UPDATE
//! db.update(&track)
//!     .set("Name", "Outro")
//!     .where_(track.column("TrackId")?.eq(1))
//!     .get()?
//!     .execute()
//!     .await?;
//!
//! // DELETE
//! db.delete(&track)
//!     .where_(track.column("TrackId")?.eq(1))
//!     .get()?
//!     .execute()
//!     .await?;
//! ```

pub mod builder;
pub mod database;
pub mod dml;
pub mod driver;
pub mod error;
pub mod expr;
pub mod ident;
pub mod join;
pub mod pool;
pub mod query;
pub mod record;
pub mod style;
pub mod table;
pub mod value;

pub use builder::{Nulls, Order, OrderKey, QueryBuilder};
pub use database::{Database, DatabaseConfig};
pub use dml::{DeleteBuilder, Insert, InsertBuilder, Statement, UpdateBuilder};
pub use driver::{Connection, Driver};
pub use error::{DbError, DbResult};
pub use expr::{AggregateFn, Expr, IntoExpr};
pub use ident::Ident;
pub use join::{Join, JoinKind, JoinMember, JoinOn};
pub use pool::{Pool, PoolConfig, PoolStatus, PooledConnection};
pub use query::Query;
pub use record::{FromRecord, Record, RecordShape};
pub use style::ParamStyle;
pub use table::{AliasedTable, Selectable, Table, TableExpr};
pub use value::{FromValue, Value};

pub use rust_decimal::Decimal;

#[cfg(feature = "postgres")]
pub use driver::postgres::{PgConnection, PgDriver};
