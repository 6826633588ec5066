//! Finalized SELECT queries.

use crate::builder::{Nulls, Order, OrderKey};
use crate::database::Database;
use crate::driver::Connection;
use crate::error::{DbError, DbResult};
use crate::expr::{Clause, Expr, Rendered, SqlWriter, rebind};
use crate::record::{FromRecord, Record, RecordShape};
use crate::style::ParamStyle;
use crate::table::{AliasedTable, TableExpr};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// The frozen shape of a SELECT statement, validated by the builder.
#[derive(Debug)]
pub(crate) struct QuerySpec {
    pub select: Vec<Expr>,
    pub from: TableExpr,
    pub where_: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderKey>,
    pub distinct: bool,
    /// Column names that filter clauses must qualify.
    pub ambiguous: HashSet<String>,
    pub record: Arc<RecordShape>,
}

impl QuerySpec {
    pub fn render(&self, w: &mut SqlWriter) {
        w.push("SELECT ");
        if self.distinct {
            w.push("DISTINCT ");
        }
        let items: Vec<(&Expr, &String)> = self.select.iter().zip(self.record.names()).collect();
        w.with_clause(Clause::Qualified, |w| {
            w.push_list(&items, ", ", |w, (item, name)| {
                item.render(w);
                w.push(" AS ");
                w.push_name(name);
            });
        });

        w.push(" FROM ");
        self.from.write_from(w);

        w.with_clause(Clause::Filter, |w| {
            if let Some(cond) = &self.where_ {
                w.push(" WHERE ");
                cond.render(w);
            }
            if !self.group_by.is_empty() {
                w.push(" GROUP BY ");
                w.push_list(&self.group_by, ", ", |w, e| e.render(w));
            }
            if let Some(cond) = &self.having {
                w.push(" HAVING ");
                cond.render(w);
            }
            if !self.order_by.is_empty() {
                w.push(" ORDER BY ");
                w.push_list(&self.order_by, ", ", |w, key| {
                    key.expr.render(w);
                    if key.order == Order::Desc {
                        w.push(" DESC");
                    }
                    match key.nulls {
                        Nulls::Default => {}
                        Nulls::First => w.push(" NULLS FIRST"),
                        Nulls::Last => w.push(" NULLS LAST"),
                    }
                });
            }
        });
    }
}

#[derive(Debug)]
struct QueryShape {
    spec: QuerySpec,
    style: ParamStyle,
    sql: String,
    named: HashMap<String, Vec<usize>>,
}

/// A finalized SELECT statement.
///
/// The SQL text and the output names are fixed; only the values behind named
/// parameters can change (see [`Query::set_param`]). A query is also a FROM item:
/// select from it directly, alias it, or use it with [`Expr::in_query`].
#[derive(Clone, Debug)]
pub struct Query {
    shape: Arc<QueryShape>,
    params: Vec<Value>,
    db: Option<Database>,
}

impl Query {
    pub(crate) fn from_spec(
        spec: QuerySpec,
        style: ParamStyle,
        db: Option<Database>,
    ) -> DbResult<Self> {
        let mut w = SqlWriter::new(style);
        w.set_ambiguous(&spec.ambiguous);
        spec.render(&mut w);
        let Rendered { sql, params, named } = w.finish()?;
        Ok(Self {
            shape: Arc::new(QueryShape {
                spec,
                style,
                sql,
                named,
            }),
            params,
            db,
        })
    }

    /// Render this query inside another statement, with the current bindings.
    pub(crate) fn write_embedded(&self, w: &mut SqlWriter) {
        let start = w.param_count();
        let spec = &self.shape.spec;
        w.nested(&spec.ambiguous, |w| spec.render(w));
        w.overwrite_params(start, &self.params);
    }

    /// Whether both handles come from the same `get()` call.
    pub(crate) fn same(&self, other: &Query) -> bool {
        Arc::ptr_eq(&self.shape, &other.shape)
    }

    // ==================== Accessors ====================

    pub fn sql(&self) -> &str {
        &self.shape.sql
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param_style(&self) -> ParamStyle {
        self.shape.style
    }

    /// Output names, in SELECT-list order.
    pub fn column_names(&self) -> &[String] {
        self.shape.spec.record.names()
    }

    pub fn record_shape(&self) -> &RecordShape {
        &self.shape.spec.record
    }

    /// An output column, for use by an enclosing query.
    pub fn column(&self, name: &str) -> DbResult<Expr> {
        TableExpr::Query(self.clone()).column(name)
    }

    pub fn columns(&self) -> Vec<Expr> {
        TableExpr::Query(self.clone()).columns()
    }

    pub fn alias(&self, alias: impl Into<String>) -> AliasedTable {
        AliasedTable::new(self, alias)
    }

    /// Rebind every slot of the named parameter.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> DbResult<()> {
        rebind(&self.shape.named, &mut self.params, name, value.into())
    }

    /// Whether the query carries a named parameter.
    pub fn has_param(&self, name: &str) -> bool {
        self.shape.named.contains_key(name)
    }

    /// SQL and parameters with `LIMIT` / `OFFSET` appended as extra parameters.
    pub fn paged(&self, limit: Option<u64>, offset: Option<u64>) -> DbResult<(String, Vec<Value>)> {
        let mut sql = self.shape.sql.clone();
        let mut params = self.params.clone();
        for (keyword, value) in [(" LIMIT ", limit), (" OFFSET ", offset)] {
            let Some(value) = value else { continue };
            let value = i64::try_from(value)
                .map_err(|_| DbError::build(format!("{}value {value} is out of range", keyword.trim_start())))?;
            params.push(Value::Int(value));
            sql.push_str(keyword);
            self.shape.style.write_placeholder(params.len(), &mut sql);
        }
        Ok((sql, params))
    }

    // ==================== Execution ====================

    /// Run the query on a pooled connection and decode every row.
    pub async fn execute(&self) -> DbResult<Vec<Record>> {
        self.execute_page(None, None).await
    }

    /// Like [`Query::execute`], with `LIMIT` / `OFFSET` applied for this call only.
    pub async fn execute_page(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> DbResult<Vec<Record>> {
        let db = self.db.as_ref().ok_or(DbError::NoDatabase)?;
        let mut conn = db.pool().get().await?;
        self.execute_on(&mut *conn, limit, offset).await
    }

    /// Run the query on a caller-provided connection.
    pub async fn execute_on(
        &self,
        conn: &mut dyn Connection,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> DbResult<Vec<Record>> {
        let (sql, params) = self.paged(limit, offset)?;

        #[cfg(feature = "tracing")]
        let start = std::time::Instant::now();

        let rows = conn.query(&sql, &params).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqlcraft.sql",
            sql = %sql,
            param_count = params.len(),
            rows = rows.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query executed"
        );

        let record = &self.shape.spec.record;
        rows.into_iter()
            .map(|row| Record::from_row(Arc::clone(record), row))
            .collect()
    }

    /// Execute and convert each record.
    pub async fn fetch_all<T: FromRecord>(&self) -> DbResult<Vec<T>> {
        let records = self.execute().await?;
        records.iter().map(T::from_record).collect()
    }

    /// Execute and convert the first record, if any.
    pub async fn fetch_optional<T: FromRecord>(&self) -> DbResult<Option<T>> {
        let records = self.execute_page(Some(1), None).await?;
        records.first().map(T::from_record).transpose()
    }

    /// SQL followed by the bound parameters, for diagnostics.
    pub fn show(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.shape.sql)?;
        write_params(f, &self.params)
    }
}

pub(crate) fn write_params(f: &mut fmt::Formatter<'_>, params: &[Value]) -> fmt::Result {
    f.write_str("[")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{p}")?;
    }
    f.write_str("]")
}
