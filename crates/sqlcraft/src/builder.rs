//! SELECT query builder.
//!
//! A [`QueryBuilder`] collects clauses and validates them in [`QueryBuilder::get`],
//! which produces an immutable [`Query`]. Builders are cheap to clone: each clone
//! owns its clause lists and shares the expressions inside them.
//!
//! ```
//! use sqlcraft::{QueryBuilder, Table};
//!
//! let track = Table::new("Track", ["TrackId", "Name", "GenreId"])?;
//! let rock = QueryBuilder::new()
//!     .select(track.column("Name")?)
//!     .where_(track.column("GenreId")?.eq(1))
//!     .get()?;
//! assert_eq!(
//!     rock.sql(),
//!     "SELECT Track.Name AS Name FROM Track WHERE (GenreId) = (?)"
//! );
//! # Ok::<(), sqlcraft::DbError>(())
//! ```

#[cfg(test)]
mod tests;

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::expr::{Expr, IntoExpr};
use crate::query::{Query, QuerySpec};
use crate::record::RecordShape;
use crate::style::ParamStyle;
use crate::table::{Selectable, TableExpr};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nulls {
    /// Database default.
    #[default]
    Default,
    First,
    Last,
}

/// A single ORDER BY key.
#[derive(Debug, Clone)]
pub struct OrderKey {
    pub expr: Expr,
    pub order: Order,
    pub nulls: Nulls,
}

/// SELECT query builder.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    db: Option<Database>,
    style: ParamStyle,
    select: Vec<Expr>,
    from: Option<TableExpr>,
    where_: Vec<Expr>,
    group_by: Vec<Expr>,
    having: Vec<Expr>,
    order_by: Vec<OrderKey>,
    distinct: bool,
}

impl QueryBuilder {
    /// A detached builder: its queries render with `?` placeholders and cannot be executed.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn for_database(db: Database) -> Self {
        Self {
            style: db.param_style(),
            db: Some(db),
            ..Self::default()
        }
    }

    /// Render with a different placeholder style.
    pub fn with_style(mut self, style: ParamStyle) -> Self {
        self.style = style;
        self
    }

    // ==================== Clauses ====================

    /// Append items to the SELECT list. Tables, joins and queries add all of their columns.
    pub fn select(mut self, items: impl Selectable) -> Self {
        self.select.extend(items.select_items());
        self
    }

    /// Append every column of a FROM item.
    pub fn select_table(mut self, table: impl Into<TableExpr>) -> Self {
        self.select.extend(table.into().columns());
        self
    }

    /// Set the FROM item explicitly instead of deriving it.
    pub fn from(mut self, table: impl Into<TableExpr>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Add a WHERE predicate; repeated calls are ANDed.
    pub fn where_(mut self, cond: impl IntoExpr) -> Self {
        self.where_.push(cond.into_expr());
        self
    }

    pub fn group_by(mut self, expr: impl IntoExpr) -> Self {
        self.group_by.push(expr.into_expr());
        self
    }

    /// Add a HAVING predicate; repeated calls are ANDed.
    pub fn having(mut self, cond: impl IntoExpr) -> Self {
        self.having.push(cond.into_expr());
        self
    }

    pub fn order_by(mut self, expr: impl IntoExpr, order: Order, nulls: Nulls) -> Self {
        self.order_by.push(OrderKey {
            expr: expr.into_expr(),
            order,
            nulls,
        });
        self
    }

    pub fn order_by_asc(self, expr: impl IntoExpr) -> Self {
        self.order_by(expr, Order::Asc, Nulls::Default)
    }

    pub fn order_by_desc(self, expr: impl IntoExpr) -> Self {
        self.order_by(expr, Order::Desc, Nulls::Default)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== Build ====================

    /// Validate the clauses and render the finalized query.
    pub fn get(&self) -> DbResult<Query> {
        if self.select.is_empty() {
            return Err(DbError::build("query has an empty SELECT list"));
        }
        if !self.having.is_empty() && self.group_by.is_empty() {
            return Err(DbError::build("HAVING requires GROUP BY"));
        }
        if self.where_.iter().any(Expr::contains_aggregate) {
            return Err(DbError::build("aggregate functions are not allowed in WHERE"));
        }
        if self.group_by.iter().any(Expr::contains_aggregate) {
            return Err(DbError::build("aggregate functions are not allowed in GROUP BY"));
        }

        let from = match &self.from {
            Some(from) => from.clone(),
            None => self.derive_from()?,
        };
        self.check_scopes(&from)?;

        let record = Arc::new(RecordShape::new(
            self.select
                .iter()
                .map(|e| e.natural_name().map(str::to_string))
                .collect(),
        ));
        let ambiguous = self.ambiguous_names(&from, &record);

        let spec = QuerySpec {
            select: self.select.clone(),
            from,
            where_: conjunction(&self.where_),
            group_by: self.group_by.clone(),
            having: conjunction(&self.having),
            order_by: self.order_by.clone(),
            distinct: self.distinct,
            ambiguous,
            record,
        };
        Query::from_spec(spec, self.style, self.db.clone())
    }

    /// The single FROM item referenced by the SELECT list and WHERE.
    fn derive_from(&self) -> DbResult<TableExpr> {
        let mut candidates: Vec<TableExpr> = Vec::new();
        for expr in self.select.iter().chain(&self.where_) {
            for table in expr.tables() {
                if !candidates.contains(&table) {
                    candidates.push(table);
                }
            }
        }
        // Tables reached through a join collapse into the join.
        let outer: Vec<&TableExpr> = candidates
            .iter()
            .filter(|c| !candidates.iter().any(|o| o != *c && o.contains(c)))
            .collect();
        match outer.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(DbError::build(
                "missing FROM: no table is referenced by SELECT or WHERE",
            )),
            many => Err(DbError::build(format!(
                "ambiguous FROM: {} tables referenced ({}); join them or call from()",
                many.len(),
                many.iter()
                    .map(|t| t.display_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    fn check_scopes(&self, from: &TableExpr) -> DbResult<()> {
        let clauses = self
            .select
            .iter()
            .chain(&self.where_)
            .chain(&self.group_by)
            .chain(&self.having)
            .chain(self.order_by.iter().map(|k| &k.expr));
        for expr in clauses {
            for table in expr.tables() {
                if !from.contains(&table) {
                    return Err(DbError::build(format!(
                        "'{}' is referenced but not part of the FROM clause",
                        table.display_name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Names that filter clauses must qualify: columns defined by more than one
    /// FROM table, and output names that do not simply repeat their column.
    fn ambiguous_names(&self, from: &TableExpr, record: &RecordShape) -> HashSet<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for leaf in from.leaves() {
            for name in leaf.column_names() {
                *counts.entry(name).or_default() += 1;
            }
        }
        let mut ambiguous: HashSet<String> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name)
            .collect();
        for (item, name) in self.select.iter().zip(record.names()) {
            if item.source_column() != Some(name.as_str()) {
                ambiguous.insert(name.clone());
            }
        }
        ambiguous
    }
}

fn conjunction(exprs: &[Expr]) -> Option<Expr> {
    if exprs.is_empty() {
        None
    } else {
        Some(Expr::all(exprs.iter().cloned()))
    }
}
