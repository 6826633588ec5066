use crate::database::Database;
use crate::driver::Connection;
use crate::error::{DbError, DbResult};
use crate::expr::SqlWriter;
use crate::query::Query;
use crate::style::ParamStyle;
use crate::table::Table;
use crate::value::Value;

/// INSERT builder: a table and the columns to fill.
#[derive(Clone, Debug)]
pub struct InsertBuilder {
    db: Option<Database>,
    style: ParamStyle,
    table: Table,
    columns: Vec<String>,
    build_error: Option<String>,
}

impl InsertBuilder {
    pub fn new(table: &Table) -> Self {
        Self {
            db: None,
            style: ParamStyle::default(),
            table: table.clone(),
            columns: Vec::new(),
            build_error: None,
        }
    }

    pub(crate) fn for_database(db: Database, table: &Table) -> Self {
        Self {
            style: db.param_style(),
            db: Some(db),
            ..Self::new(table)
        }
    }

    pub fn with_style(mut self, style: ParamStyle) -> Self {
        self.style = style;
        self
    }

    /// Add a column. Unknown columns are reported by `get()`.
    pub fn column(mut self, name: &str) -> Self {
        if !self.table.has_column(name) {
            self.build_error.get_or_insert_with(|| {
                format!("table '{}' has no column '{name}'", self.table.ident())
            });
            return self;
        }
        self.columns.push(name.to_string());
        self
    }

    pub fn columns<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(self, |builder, name| builder.column(name.as_ref()))
    }

    pub fn get(&self) -> DbResult<Insert> {
        if let Some(err) = &self.build_error {
            return Err(DbError::Build(err.clone()));
        }
        if self.columns.is_empty() {
            return Err(DbError::build("INSERT requires at least one column"));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(column) {
                return Err(DbError::build(format!(
                    "column '{column}' is listed more than once"
                )));
            }
        }

        let mut w = SqlWriter::new(self.style);
        w.push("INSERT INTO ");
        w.push_ident(self.table.ident());
        w.push(" (");
        w.push_list(&self.columns, ", ", |w, c| w.push_name(c));
        w.push(")");
        let (base, _) = w.into_parts();

        Ok(Insert {
            base,
            width: self.columns.len(),
            style: self.style,
            db: self.db.clone(),
        })
    }
}

/// A finalized INSERT, fed either with rows of values or with a query.
#[derive(Clone, Debug)]
pub struct Insert {
    /// `INSERT INTO t (a, b)`
    base: String,
    width: usize,
    style: ParamStyle,
    db: Option<Database>,
}

impl Insert {
    /// `INSERT INTO t (a, b) VALUES (?, ?)`: one placeholder per column.
    pub fn values_sql(&self) -> String {
        let mut sql = self.base.clone();
        sql.push_str(" VALUES (");
        for i in 1..=self.width {
            if i > 1 {
                sql.push_str(", ");
            }
            self.style.write_placeholder(i, &mut sql);
        }
        sql.push(')');
        sql
    }

    /// `INSERT INTO t (a, b) SELECT ...` with the query's current bindings.
    pub fn query_sql(&self, query: &Query) -> DbResult<(String, Vec<Value>)> {
        if query.column_names().len() != self.width {
            return Err(DbError::build(format!(
                "INSERT lists {} columns but the query selects {}",
                self.width,
                query.column_names().len()
            )));
        }
        let mut w = SqlWriter::new(self.style);
        w.push(&self.base);
        w.push(" ");
        query.write_embedded(&mut w);
        Ok(w.into_parts())
    }

    /// Insert every row; each row must have one value per column.
    pub async fn execute_values(&self, rows: &[Vec<Value>]) -> DbResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let db = self.db.as_ref().ok_or(DbError::NoDatabase)?;
        let mut conn = db.pool().get().await?;
        self.execute_values_on(&mut *conn, rows).await
    }

    pub async fn execute_values_on(
        &self,
        conn: &mut dyn Connection,
        rows: &[Vec<Value>],
    ) -> DbResult<u64> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != self.width) {
            return Err(DbError::build(format!(
                "row {i} has {} values, INSERT lists {} columns",
                row.len(),
                self.width
            )));
        }
        let sql = self.values_sql();
        let affected = conn.execute_many(&sql, rows).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqlcraft.sql",
            sql = %sql,
            rows = rows.len(),
            affected,
            "insert executed"
        );

        Ok(affected)
    }

    /// INSERT ... SELECT.
    pub async fn execute_query(&self, query: &Query) -> DbResult<u64> {
        let db = self.db.as_ref().ok_or(DbError::NoDatabase)?;
        let mut conn = db.pool().get().await?;
        self.execute_query_on(&mut *conn, query).await
    }

    pub async fn execute_query_on(&self, conn: &mut dyn Connection, query: &Query) -> DbResult<u64> {
        let (sql, params) = self.query_sql(query)?;
        let affected = conn.execute(&sql, &params).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "sqlcraft.sql",
            sql = %sql,
            param_count = params.len(),
            affected,
            "insert executed"
        );

        Ok(affected)
    }

    /// The VALUES form of the statement.
    pub fn show(&self) -> String {
        self.values_sql()
    }
}
