//! INSERT, UPDATE and DELETE.
//!
//! Builders follow the same pattern as [`QueryBuilder`](crate::QueryBuilder):
//! consuming setters, validation deferred to `get()`.

mod delete;
mod insert;
mod update;


pub use delete::DeleteBuilder;
pub use insert::{Insert, InsertBuilder};
pub use update::UpdateBuilder;

use crate::database::Database;
use crate::driver::Connection;
use crate::error::{DbError, DbResult};
use crate::expr::{Expr, Rendered, rebind};
use crate::query::write_params;
use crate::table::{Table, TableExpr};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct StatementShape {
    sql: String,
    named: HashMap<String, Vec<usize>>,
}

/// A finalized UPDATE or DELETE.
#[derive(Clone, Debug)]
pub struct Statement {
    shape: Arc<StatementShape>,
    params: Vec<Value>,
    db: Option<Database>,
}

impl Statement {
    pub(crate) fn new(rendered: Rendered, db: Option<Database>) -> Self {
        let Rendered { sql, params, named } = rendered;
        Self {
            shape: Arc::new(StatementShape { sql, named }),
            params,
            db,
        }
    }

    pub fn sql(&self) -> &str {
        &self.shape.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Rebind every slot of the named parameter.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> DbResult<()> {
        rebind(&self.shape.named, &mut self.params, name, value.into())
    }

    /// Run on a pooled connection; returns the number of affected rows.
    pub async fn execute(&self) -> DbResult<u64> {
        let db = self.db.as_ref().ok_or(DbError::NoDatabase)?;
        let mut conn = db.pool().get().await?;
        self.execute_on(&mut *conn).await
    }

    pub async fn execute_on(&self, conn: &mut dyn Connection) -> DbResult<u64> {
        let affected = conn.execute(&self.shape.sql, &self.params).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqlcraft.sql",
            sql = %self.shape.sql,
            param_count = self.params.len(),
            affected,
            "statement executed"
        );

        Ok(affected)
    }

    pub fn show(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.shape.sql)?;
        write_params(f, &self.params)
    }
}

/// Shared checks for expressions used by single-table statements.
fn check_single_table(table: &Table, clause: &str, exprs: &[&Expr]) -> DbResult<()> {
    let target = TableExpr::Table(table.clone());
    for expr in exprs {
        if expr.contains_aggregate() {
            return Err(DbError::build(format!(
                "aggregate functions are not allowed in {clause}"
            )));
        }
        for referenced in expr.tables() {
            if referenced != target {
                return Err(DbError::build(format!(
                    "{clause} references '{}'; only '{}' can be used here",
                    referenced.display_name(),
                    table.ident()
                )));
            }
        }
    }
    Ok(())
}

/// `WHERE` conjunction, or an error unless every row is explicitly targeted.
fn where_clause(statement: &str, conditions: &[Expr], all_rows: bool) -> DbResult<Option<Expr>> {
    match (conditions.is_empty(), all_rows) {
        (false, _) => Ok(Some(Expr::all(conditions.iter().cloned()))),
        (true, true) => Ok(None),
        (true, false) => Err(DbError::build(format!(
            "{statement} without WHERE; call all_rows() to target every row"
        ))),
    }
}
