//! Joins between FROM items.
//!
//! ```
//! use sqlcraft::{Join, JoinOn, Table};
//!
//! let album = Table::new("Album", ["AlbumId", "Title", "ArtistId"])?;
//! let track = Table::new("Track", ["TrackId", "Name", "AlbumId"])?;
//! let join = Join::inner(&album, &track, JoinOn::using(["AlbumId"]))?;
//!
//! let title = join.table("Album")?.column("Title")?;
//! assert!(join.column("AlbumId").is_err()); // present on both sides
//! # let _ = title;
//! # Ok::<(), sqlcraft::DbError>(())
//! ```

use crate::error::{DbError, DbResult};
use crate::expr::{Clause, Expr, IntoExpr, SqlWriter};
use crate::table::TableExpr;
use std::sync::Arc;

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT OUTER JOIN",
            JoinKind::Right => "RIGHT OUTER JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// Join condition.
#[derive(Debug, Clone)]
pub enum JoinOn {
    /// Explicit boolean condition.
    On(Expr),
    /// Columns present on both sides, compared for equality.
    Using(Vec<String>),
}

impl JoinOn {
    pub fn on(condition: impl IntoExpr) -> Self {
        JoinOn::On(condition.into_expr())
    }

    pub fn using<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        JoinOn::Using(columns.into_iter().map(Into::into).collect())
    }
}

/// Two FROM items joined together.
///
/// Cheap to clone; identity (not structure) decides whether two joins are the same FROM item.
#[derive(Clone, Debug)]
pub struct Join(Arc<JoinInner>);

#[derive(Debug)]
struct JoinInner {
    kind: JoinKind,
    left: TableExpr,
    right: TableExpr,
    condition: Option<Expr>,
    /// Every named table reachable through this join, left to right.
    tables: Vec<(String, TableExpr)>,
}

impl Join {
    /// Build a join. `CROSS` takes no condition; every other kind requires one.
    pub fn new(
        kind: JoinKind,
        left: impl Into<TableExpr>,
        right: impl Into<TableExpr>,
        on: Option<JoinOn>,
    ) -> DbResult<Self> {
        let left = left.into();
        let right = right.into();

        let mut tables = Vec::new();
        for side in [&left, &right] {
            collect_named(side, &mut tables)?;
        }
        for (i, (name, _)) in tables.iter().enumerate() {
            if tables[..i].iter().any(|(prev, _)| prev == name) {
                return Err(DbError::build(format!(
                    "table name '{name}' appears more than once in join; alias one of them"
                )));
            }
        }

        let condition = match (kind, on) {
            (JoinKind::Cross, None) => None,
            (JoinKind::Cross, Some(_)) => {
                return Err(DbError::build("CROSS JOIN takes no join condition"));
            }
            (kind, None) => {
                return Err(DbError::build(format!(
                    "{} requires an ON or USING condition",
                    kind.keyword()
                )));
            }
            (_, Some(JoinOn::On(expr))) => {
                for table in expr.tables() {
                    if !left.contains(&table) && !right.contains(&table) {
                        return Err(DbError::build(format!(
                            "join condition references '{}', which is not part of the join",
                            table.display_name()
                        )));
                    }
                }
                Some(expr)
            }
            (_, Some(JoinOn::Using(columns))) => Some(using_condition(&left, &right, &columns)?),
        };

        Ok(Self(Arc::new(JoinInner {
            kind,
            left,
            right,
            condition,
            tables,
        })))
    }

    pub fn inner(left: impl Into<TableExpr>, right: impl Into<TableExpr>, on: JoinOn) -> DbResult<Self> {
        Self::new(JoinKind::Inner, left, right, Some(on))
    }

    pub fn left_outer(
        left: impl Into<TableExpr>,
        right: impl Into<TableExpr>,
        on: JoinOn,
    ) -> DbResult<Self> {
        Self::new(JoinKind::Left, left, right, Some(on))
    }

    pub fn right_outer(
        left: impl Into<TableExpr>,
        right: impl Into<TableExpr>,
        on: JoinOn,
    ) -> DbResult<Self> {
        Self::new(JoinKind::Right, left, right, Some(on))
    }

    pub fn full_outer(
        left: impl Into<TableExpr>,
        right: impl Into<TableExpr>,
        on: JoinOn,
    ) -> DbResult<Self> {
        Self::new(JoinKind::Full, left, right, Some(on))
    }

    pub fn cross(left: impl Into<TableExpr>, right: impl Into<TableExpr>) -> DbResult<Self> {
        Self::new(JoinKind::Cross, left, right, None)
    }

    pub fn kind(&self) -> JoinKind {
        self.0.kind
    }

    /// The join condition, with `USING` already expanded.
    pub fn condition(&self) -> Option<&Expr> {
        self.0.condition.as_ref()
    }

    /// The left operand.
    pub fn left(&self) -> JoinMember {
        self.member(self.0.left.clone())
    }

    /// The right operand.
    pub fn right(&self) -> JoinMember {
        self.member(self.0.right.clone())
    }

    /// A table reachable through this join (including nested joins), by name or alias.
    pub fn table(&self, name: &str) -> DbResult<JoinMember> {
        self.0
            .tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| self.member(t.clone()))
            .ok_or_else(|| DbError::build(format!("join has no table named '{name}'")))
    }

    /// Flattened name -> FROM item mapping.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableExpr)> {
        self.0.tables.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// A column whose name is unique across the joined tables.
    pub fn column(&self, name: &str) -> DbResult<Expr> {
        TableExpr::Join(self.clone()).column(name)
    }

    /// Every column of every joined table.
    pub fn columns(&self) -> Vec<Expr> {
        TableExpr::Join(self.clone()).columns()
    }

    fn member(&self, member: TableExpr) -> JoinMember {
        JoinMember {
            join: self.clone(),
            member,
        }
    }

    pub(crate) fn left_expr(&self) -> &TableExpr {
        &self.0.left
    }

    pub(crate) fn right_expr(&self) -> &TableExpr {
        &self.0.right
    }

    pub(crate) fn leaves(&self) -> Vec<TableExpr> {
        let mut out = self.0.left.leaves();
        out.extend(self.0.right.leaves());
        out
    }

    pub(crate) fn same(&self, other: &Join) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn write_from(&self, w: &mut SqlWriter) {
        self.0.left.write_from(w);
        w.push(" ");
        w.push(self.0.kind.keyword());
        w.push(" ");
        if let TableExpr::Join(_) = self.0.right {
            w.push("(");
            self.0.right.write_from(w);
            w.push(")");
        } else {
            self.0.right.write_from(w);
        }
        if let Some(condition) = &self.0.condition {
            w.push(" ON ");
            w.with_clause(Clause::Qualified, |w| condition.render(w));
        }
    }
}

/// One side of a join (or a table inside it), addressed through the join.
///
/// Columns obtained here are scoped to the whole join, so a query selecting
/// them derives the join as its FROM item.
#[derive(Clone, Debug)]
pub struct JoinMember {
    join: Join,
    member: TableExpr,
}

impl JoinMember {
    pub fn column(&self, name: &str) -> DbResult<Expr> {
        let owner = self.member.resolve_owner(name)?;
        Ok(Expr::column_ref(owner, TableExpr::Join(self.join.clone()), name))
    }

    pub fn columns(&self) -> Vec<Expr> {
        self.member.columns_scoped(&TableExpr::Join(self.join.clone()))
    }

    /// The member FROM item itself.
    pub fn table_expr(&self) -> &TableExpr {
        &self.member
    }

    pub fn join(&self) -> &Join {
        &self.join
    }
}

fn collect_named(side: &TableExpr, out: &mut Vec<(String, TableExpr)>) -> DbResult<()> {
    match side {
        TableExpr::Join(j) => {
            out.extend(j.tables().map(|(n, t)| (n.to_string(), t.clone())));
        }
        TableExpr::Query(_) => {
            return Err(DbError::build("a subquery in a join must be aliased"));
        }
        named => {
            if let Some(name) = named.name() {
                out.push((name.to_string(), named.clone()));
            }
        }
    }
    Ok(())
}

fn using_condition(left: &TableExpr, right: &TableExpr, columns: &[String]) -> DbResult<Expr> {
    if columns.is_empty() {
        return Err(DbError::build("USING requires at least one column"));
    }
    let mut equalities = Vec::with_capacity(columns.len());
    for name in columns {
        let lhs = side_column(left, name, "left")?;
        let rhs = side_column(right, name, "right")?;
        equalities.push(lhs.eq(rhs));
    }
    Ok(Expr::all(equalities))
}

fn side_column(side: &TableExpr, name: &str, which: &str) -> DbResult<Expr> {
    side.column(name).map_err(|e| match e {
        DbError::UnknownColumn { .. } => {
            DbError::build(format!("USING column '{name}' is missing on the {which} side"))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::ParamStyle;
    use crate::table::Table;

    fn album() -> Table {
        Table::new("Album", ["AlbumId", "Title", "ArtistId"]).unwrap()
    }

    fn track() -> Table {
        Table::new("Track", ["TrackId", "Name", "AlbumId", "GenreId"]).unwrap()
    }

    fn artist() -> Table {
        Table::new("Artist", ["ArtistId", "Name"]).unwrap()
    }

    fn from_sql(join: &Join) -> String {
        let mut w = SqlWriter::new(ParamStyle::Qmark);
        join.write_from(&mut w);
        w.into_parts().0
    }

    #[test]
    fn using_expands_to_qualified_equality() {
        let j = Join::inner(album(), track(), JoinOn::using(["AlbumId"])).unwrap();
        assert_eq!(
            from_sql(&j),
            "Album INNER JOIN Track ON (Album.AlbumId) = (Track.AlbumId)"
        );
    }

    #[test]
    fn using_matches_explicit_on() {
        let (a, t) = (album(), track());
        let using = Join::inner(&a, &t, JoinOn::using(["AlbumId"])).unwrap();
        let on = Join::inner(
            &a,
            &t,
            JoinOn::on(a.column("AlbumId").unwrap().eq(t.column("AlbumId").unwrap())),
        )
        .unwrap();
        assert_eq!(from_sql(&using), from_sql(&on));
    }

    #[test]
    fn using_missing_column_fails() {
        let err = Join::inner(album(), artist(), JoinOn::using(["AlbumId"])).unwrap_err();
        assert!(err.is_build());
    }

    #[test]
    fn join_kinds_require_conditions() {
        assert!(Join::new(JoinKind::Left, album(), track(), None).unwrap_err().is_build());
        let on = JoinOn::using(["AlbumId"]);
        assert!(Join::new(JoinKind::Cross, album(), track(), Some(on)).unwrap_err().is_build());
        let cross = Join::cross(album(), track()).unwrap();
        assert_eq!(from_sql(&cross), "Album CROSS JOIN Track");
    }

    #[test]
    fn duplicate_names_fail() {
        let err = Join::inner(track(), track(), JoinOn::using(["TrackId"])).unwrap_err();
        assert!(err.is_build());

        let t = track();
        let ok = Join::inner(&t, t.alias("t2"), JoinOn::using(["TrackId"])).unwrap();
        assert_eq!(
            from_sql(&ok),
            "Track INNER JOIN Track AS t2 ON (Track.TrackId) = (t2.TrackId)"
        );
    }

    #[test]
    fn nested_join_exposes_flattened_tables() {
        let album_track = Join::inner(album(), track(), JoinOn::using(["AlbumId"])).unwrap();
        let all = Join::inner(artist(), &album_track, JoinOn::on(
            artist()
                .column("ArtistId")
                .unwrap()
                .eq(album_track.table("Album").unwrap().column("ArtistId").unwrap()),
        ))
        .unwrap();

        let names: Vec<_> = all.tables().map(|(n, _)| n).collect();
        assert_eq!(names, ["Artist", "Album", "Track"]);
        assert_eq!(
            from_sql(&all),
            "Artist INNER JOIN (Album INNER JOIN Track ON (Album.AlbumId) = (Track.AlbumId)) \
             ON (Artist.ArtistId) = (Album.ArtistId)"
        );

        assert!(Join::inner(track().alias("x"), &album_track, JoinOn::using(["TrackId"])).is_ok());
        // Album is already inside the nested join.
        let err = Join::inner(album(), &album_track, JoinOn::using(["AlbumId"])).unwrap_err();
        assert!(err.is_build());
    }

    #[test]
    fn member_columns_are_scoped_to_the_join() {
        let j = Join::inner(album(), track(), JoinOn::using(["AlbumId"])).unwrap();
        let title = j.left().column("Title").unwrap();
        assert_eq!(title.tables(), vec![TableExpr::Join(j.clone())]);
        assert!(j.column("AlbumId").unwrap_err().is_build());
        assert!(j.column("Title").is_ok());
        assert_eq!(j.left().columns().len(), 3);
        assert_eq!(j.columns().len(), 7);
    }

    #[test]
    fn on_condition_must_stay_inside_the_join() {
        let err = Join::inner(
            album(),
            track(),
            JoinOn::on(artist().column("ArtistId").unwrap().eq(1)),
        )
        .unwrap_err();
        assert!(err.is_build());
    }
}
