use super::{Statement, check_single_table, where_clause};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::expr::{Clause, Expr, IntoExpr, SqlWriter};
use crate::style::ParamStyle;
use crate::table::Table;

/// UPDATE builder.
///
/// ```
/// use sqlcraft::{Table, UpdateBuilder};
///
/// let track = Table::new("Track", ["TrackId", "UnitPrice"])?;
/// let stmt = UpdateBuilder::new(&track)
///     .set("UnitPrice", 1.29)
///     .where_(track.column("TrackId")?.eq(1))
///     .get()?;
/// assert_eq!(stmt.sql(), "UPDATE Track SET UnitPrice = ? WHERE (TrackId) = (?)");
/// # Ok::<(), sqlcraft::DbError>(())
/// ```
#[derive(Clone, Debug)]
pub struct UpdateBuilder {
    db: Option<Database>,
    style: ParamStyle,
    table: Table,
    sets: Vec<(String, Expr)>,
    where_: Vec<Expr>,
    all_rows: bool,
    build_error: Option<String>,
}

impl UpdateBuilder {
    pub fn new(table: &Table) -> Self {
        Self {
            db: None,
            style: ParamStyle::default(),
            table: table.clone(),
            sets: Vec::new(),
            where_: Vec::new(),
            all_rows: false,
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

    /// Assign a column. Unknown columns are reported by `get()`.
    pub fn set(mut self, column: &str, value: impl IntoExpr) -> Self {
        if !self.table.has_column(column) {
            self.build_error.get_or_insert_with(|| {
                format!("table '{}' has no column '{column}'", self.table.ident())
            });
            return self;
        }
        self.sets.push((column.to_string(), value.into_expr()));
        self
    }

    /// Add a WHERE predicate; repeated calls are ANDed.
    pub fn where_(mut self, cond: impl IntoExpr) -> Self {
        self.where_.push(cond.into_expr());
        self
    }

    /// Allow the statement to run without WHERE.
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    pub fn get(&self) -> DbResult<Statement> {
        if let Some(err) = &self.build_error {
            return Err(DbError::Build(err.clone()));
        }
        if self.sets.is_empty() {
            return Err(DbError::build("UPDATE requires at least one SET column"));
        }
        for (i, (column, _)) in self.sets.iter().enumerate() {
            if self.sets[..i].iter().any(|(prev, _)| prev == column) {
                return Err(DbError::build(format!("column '{column}' is set more than once")));
            }
        }
        let values: Vec<&Expr> = self.sets.iter().map(|(_, e)| e).collect();
        check_single_table(&self.table, "SET", &values)?;
        check_single_table(&self.table, "WHERE", &self.where_.iter().collect::<Vec<_>>())?;
        let condition = where_clause("UPDATE", &self.where_, self.all_rows)?;

        let mut w = SqlWriter::new(self.style);
        w.with_clause(Clause::Filter, |w| {
            w.push("UPDATE ");
            w.push_ident(self.table.ident());
            w.push(" SET ");
            w.push_list(&self.sets, ", ", |w, (column, value)| {
                w.push_name(column);
                w.push(" = ");
                value.render(w);
            });
            if let Some(cond) = &condition {
                w.push(" WHERE ");
                cond.render(w);
            }
        });
        Ok(Statement::new(w.finish()?, self.db.clone()))
    }
}
