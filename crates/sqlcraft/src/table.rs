//! Tables and the FROM items built from them.

use crate::error::{DbError, DbResult};
use crate::expr::{Expr, SqlWriter};
use crate::ident::Ident;
use crate::join::{Join, JoinMember};
use crate::query::Query;
use std::collections::HashSet;
use std::sync::Arc;

/// A database table: a possibly schema-qualified name and its columns.
///
/// Cheap to clone; every clone refers to the same definition.
#[derive(Clone, Debug)]
pub struct Table(Arc<TableInner>);

#[derive(Debug)]
struct TableInner {
    ident: Ident,
    columns: Vec<String>,
}

impl Table {
    /// Define a table.
    ///
    /// `name` accepts the dotted/quoted forms of [`Ident::parse`]
    /// (`Track`, `chinook.Track`, `"Play List"`).
    pub fn new<I, S>(name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ident = Ident::parse(name)?;
        let mut seen = HashSet::new();
        let mut cols = Vec::new();
        for column in columns {
            let column = column.into();
            // Column names are validated the same way as single-part identifiers.
            Ident::new(&column)?;
            if !seen.insert(column.clone()) {
                return Err(DbError::config(format!(
                    "duplicate column '{column}' in table '{ident}'"
                )));
            }
            cols.push(column);
        }
        if cols.is_empty() {
            return Err(DbError::config(format!("table '{ident}' has no columns")));
        }
        Ok(Self(Arc::new(TableInner {
            ident,
            columns: cols,
        })))
    }

    /// The table name without schema.
    pub fn name(&self) -> &str {
        self.0.ident.name()
    }

    pub fn ident(&self) -> &Ident {
        &self.0.ident
    }

    pub fn column_names(&self) -> &[String] {
        &self.0.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.0.columns.iter().any(|c| c == name)
    }

    /// A column of this table.
    pub fn column(&self, name: &str) -> DbResult<Expr> {
        TableExpr::Table(self.clone()).column(name)
    }

    /// Every column, in definition order.
    pub fn columns(&self) -> Vec<Expr> {
        TableExpr::Table(self.clone()).columns()
    }

    /// Alias this table for use in FROM clauses.
    pub fn alias(&self, alias: impl Into<String>) -> AliasedTable {
        AliasedTable::new(self, alias)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.0.ident == other.0.ident
    }
}

impl Eq for Table {}

/// A table, subquery or join given an alias.
#[derive(Clone, Debug)]
pub struct AliasedTable(Arc<AliasedInner>);

#[derive(Debug)]
struct AliasedInner {
    alias: String,
    inner: TableExpr,
}

impl AliasedTable {
    /// Alias a FROM item. Re-aliasing an aliased item replaces the alias.
    pub fn new(inner: impl Into<TableExpr>, alias: impl Into<String>) -> Self {
        let inner = match inner.into() {
            TableExpr::Aliased(aliased) => aliased.0.inner.clone(),
            other => other,
        };
        Self(Arc::new(AliasedInner {
            alias: alias.into(),
            inner,
        }))
    }

    pub fn alias(&self) -> &str {
        &self.0.alias
    }

    /// The aliased FROM item.
    pub fn inner(&self) -> &TableExpr {
        &self.0.inner
    }

    pub fn column(&self, name: &str) -> DbResult<Expr> {
        TableExpr::Aliased(self.clone()).column(name)
    }

    pub fn columns(&self) -> Vec<Expr> {
        TableExpr::Aliased(self.clone()).columns()
    }
}

impl PartialEq for AliasedTable {
    fn eq(&self, other: &Self) -> bool {
        self.0.alias == other.0.alias && self.0.inner == other.0.inner
    }
}

/// Anything usable in a FROM clause.
#[derive(Clone, Debug)]
pub enum TableExpr {
    Table(Table),
    Aliased(AliasedTable),
    Join(Join),
    Query(Query),
}

impl TableExpr {
    /// Name used to address this item inside a join: the table name or the alias.
    pub fn name(&self) -> Option<&str> {
        match self {
            TableExpr::Table(t) => Some(t.name()),
            TableExpr::Aliased(a) => Some(a.alias()),
            TableExpr::Join(_) | TableExpr::Query(_) => None,
        }
    }

    /// Column names exposed by this item. Joins report every leaf's columns.
    pub fn column_names(&self) -> Vec<String> {
        match self {
            TableExpr::Table(t) => t.column_names().to_vec(),
            TableExpr::Aliased(a) => {
                let mut seen = HashSet::new();
                a.inner()
                    .column_names()
                    .into_iter()
                    .filter(|name| seen.insert(name.clone()))
                    .collect()
            }
            TableExpr::Query(q) => q.column_names().to_vec(),
            TableExpr::Join(j) => j
                .leaves()
                .iter()
                .flat_map(TableExpr::column_names)
                .collect(),
        }
    }

    /// A column of this item. Inside a join the name must belong to exactly one table.
    pub fn column(&self, name: &str) -> DbResult<Expr> {
        let owner = self.resolve_owner(name)?;
        Ok(Expr::column_ref(owner, self.clone(), name))
    }

    /// Every column of this item, in order.
    pub fn columns(&self) -> Vec<Expr> {
        self.columns_scoped(self)
    }

    pub(crate) fn columns_scoped(&self, scope: &TableExpr) -> Vec<Expr> {
        match self {
            TableExpr::Join(j) => j
                .leaves()
                .iter()
                .flat_map(|leaf| leaf.columns_scoped(scope))
                .collect(),
            leaf => leaf
                .column_names()
                .into_iter()
                .map(|name| Expr::column_ref(leaf.clone(), scope.clone(), name))
                .collect(),
        }
    }

    /// The leaf item (table, aliased item or subquery) that defines `name`.
    pub(crate) fn resolve_owner(&self, name: &str) -> DbResult<TableExpr> {
        match self {
            TableExpr::Join(j) => {
                let mut owners = j
                    .leaves()
                    .into_iter()
                    .filter(|leaf| leaf.column_names().iter().any(|c| c == name));
                match (owners.next(), owners.next()) {
                    (Some(owner), None) => Ok(owner),
                    (None, _) => Err(DbError::unknown_column(self.display_name(), name)),
                    (Some(_), Some(_)) => Err(DbError::build(format!(
                        "column '{name}' is ambiguous in join; select it through the join's tables"
                    ))),
                }
            }
            leaf => {
                if leaf.column_names().iter().any(|c| c == name) {
                    Ok(leaf.clone())
                } else {
                    Err(DbError::unknown_column(leaf.display_name(), name))
                }
            }
        }
    }

    /// Whether `other` is this item or reachable through it as a join member.
    pub(crate) fn contains(&self, other: &TableExpr) -> bool {
        if self == other {
            return true;
        }
        match self {
            TableExpr::Join(j) => j.left_expr().contains(other) || j.right_expr().contains(other),
            _ => false,
        }
    }

    /// Non-join items, left to right.
    pub(crate) fn leaves(&self) -> Vec<TableExpr> {
        match self {
            TableExpr::Join(j) => j.leaves(),
            leaf => vec![leaf.clone()],
        }
    }

    pub(crate) fn display_name(&self) -> String {
        match self {
            TableExpr::Table(t) => t.ident().to_sql(),
            TableExpr::Aliased(a) => a.alias().to_string(),
            TableExpr::Join(_) => "join".to_string(),
            TableExpr::Query(_) => "subquery".to_string(),
        }
    }

    /// Write the prefix used to qualify this item's columns. Returns false when
    /// the item has none (an unaliased subquery).
    pub(crate) fn write_qualifier(&self, w: &mut SqlWriter) -> bool {
        match self {
            TableExpr::Table(t) => {
                w.push_ident(t.ident());
                true
            }
            TableExpr::Aliased(a) => {
                w.push_name(a.alias());
                true
            }
            TableExpr::Join(_) | TableExpr::Query(_) => false,
        }
    }

    /// Write this item as it appears in a FROM clause.
    pub(crate) fn write_from(&self, w: &mut SqlWriter) {
        match self {
            TableExpr::Table(t) => w.push_ident(t.ident()),
            TableExpr::Aliased(a) => {
                match a.inner() {
                    TableExpr::Table(t) => w.push_ident(t.ident()),
                    TableExpr::Query(q) => {
                        w.push("(");
                        q.write_embedded(w);
                        w.push(")");
                    }
                    inner => {
                        w.push("(");
                        inner.write_from(w);
                        w.push(")");
                    }
                }
                w.push(" AS ");
                w.push_name(a.alias());
            }
            TableExpr::Join(j) => j.write_from(w),
            TableExpr::Query(q) => {
                w.push("(");
                q.write_embedded(w);
                w.push(")");
            }
        }
    }
}

impl PartialEq for TableExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableExpr::Table(a), TableExpr::Table(b)) => a == b,
            (TableExpr::Aliased(a), TableExpr::Aliased(b)) => a == b,
            (TableExpr::Join(a), TableExpr::Join(b)) => a.same(b),
            (TableExpr::Query(a), TableExpr::Query(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<Table> for TableExpr {
    fn from(t: Table) -> Self {
        TableExpr::Table(t)
    }
}

impl From<&Table> for TableExpr {
    fn from(t: &Table) -> Self {
        TableExpr::Table(t.clone())
    }
}

impl From<AliasedTable> for TableExpr {
    fn from(a: AliasedTable) -> Self {
        TableExpr::Aliased(a)
    }
}

impl From<&AliasedTable> for TableExpr {
    fn from(a: &AliasedTable) -> Self {
        TableExpr::Aliased(a.clone())
    }
}

impl From<Join> for TableExpr {
    fn from(j: Join) -> Self {
        TableExpr::Join(j)
    }
}

impl From<&Join> for TableExpr {
    fn from(j: &Join) -> Self {
        TableExpr::Join(j.clone())
    }
}

impl From<Query> for TableExpr {
    fn from(q: Query) -> Self {
        TableExpr::Query(q)
    }
}

impl From<&Query> for TableExpr {
    fn from(q: &Query) -> Self {
        TableExpr::Query(q.clone())
    }
}

impl From<&TableExpr> for TableExpr {
    fn from(t: &TableExpr) -> Self {
        t.clone()
    }
}

// ==================== Selectable ====================

/// Something that can be placed in a SELECT list.
///
/// Expressions select themselves; tables, joins and subqueries select all of
/// their columns.
pub trait Selectable {
    fn select_items(&self) -> Vec<Expr>;
}

impl Selectable for Expr {
    fn select_items(&self) -> Vec<Expr> {
        vec![self.clone()]
    }
}

impl Selectable for Table {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl Selectable for AliasedTable {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl Selectable for TableExpr {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl Selectable for Join {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl Selectable for JoinMember {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl Selectable for Query {
    fn select_items(&self) -> Vec<Expr> {
        self.columns()
    }
}

impl<T: Selectable + ?Sized> Selectable for &T {
    fn select_items(&self) -> Vec<Expr> {
        (**self).select_items()
    }
}

impl<T: Selectable> Selectable for [T] {
    fn select_items(&self) -> Vec<Expr> {
        self.iter().flat_map(Selectable::select_items).collect()
    }
}

impl<T: Selectable, const N: usize> Selectable for [T; N] {
    fn select_items(&self) -> Vec<Expr> {
        self.as_slice().select_items()
    }
}

impl<T: Selectable> Selectable for Vec<T> {
    fn select_items(&self) -> Vec<Expr> {
        self.as_slice().select_items()
    }
}
