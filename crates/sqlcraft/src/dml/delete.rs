use super::{Statement, check_single_table, where_clause};
use crate::database::Database;
use crate::error::DbResult;
use crate::expr::{Clause, Expr, IntoExpr, SqlWriter};
use crate::style::ParamStyle;
use crate::table::Table;

/// DELETE builder.
#[derive(Clone, Debug)]
pub struct DeleteBuilder {
    db: Option<Database>,
    style: ParamStyle,
    table: Table,
    where_: Vec<Expr>,
    all_rows: bool,
}

impl DeleteBuilder {
    pub fn new(table: &Table) -> Self {
        Self {
            db: None,
            style: ParamStyle::default(),
            table: table.clone(),
            where_: Vec::new(),
            all_rows: false,
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
        check_single_table(&self.table, "WHERE", &self.where_.iter().collect::<Vec<_>>())?;
        let condition = where_clause("DELETE", &self.where_, self.all_rows)?;

        let mut w = SqlWriter::new(self.style);
        w.with_clause(Clause::Filter, |w| {
            w.push("DELETE FROM ");
            w.push_ident(self.table.ident());
            if let Some(cond) = &condition {
                w.push(" WHERE ");
                cond.render(w);
            }
        });
        Ok(Statement::new(w.finish()?, self.db.clone()))
    }
}
