use super::*;
use crate::join::{Join, JoinOn};
use crate::table::Table;
use crate::value::Value;

fn track() -> Table {
    Table::new(
        "Track",
        ["TrackId", "Name", "AlbumId", "GenreId", "Milliseconds"],
    )
    .unwrap()
}

fn album() -> Table {
    Table::new("Album", ["AlbumId", "Title", "ArtistId"]).unwrap()
}

fn col(t: &Table, name: &str) -> Expr {
    t.column(name).unwrap()
}

// ==================== FROM derivation ====================

#[test]
fn from_is_derived_from_select_and_where() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(5))
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Track.Name AS Name FROM Track WHERE (GenreId) = (?)"
    );
    assert_eq!(q.params(), &[Value::Int(5)]);
}

#[test]
fn missing_from_fails() {
    let err = QueryBuilder::new().select(Expr::value(1)).get().unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("missing FROM"));
}

#[test]
fn ambiguous_from_fails() {
    let (t, a) = (track(), album());
    let err = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&a, "Title").eq("Facelift"))
        .get()
        .unwrap_err();
    assert!(err.to_string().contains("ambiguous FROM"));
}

#[test]
fn explicit_from_must_cover_every_clause() {
    let (t, a) = (track(), album());
    let err = QueryBuilder::new()
        .from(&a)
        .select(col(&t, "Name"))
        .get()
        .unwrap_err();
    assert!(err.is_build());
}

#[test]
fn explicit_from_allows_constant_select() {
    let t = track();
    let q = QueryBuilder::new()
        .from(&t)
        .select(Expr::count_all().alias("n"))
        .get()
        .unwrap();
    assert_eq!(q.sql(), "SELECT COUNT(*) AS n FROM Track");
}

// ==================== Clause validation ====================

#[test]
fn empty_select_fails() {
    let t = track();
    let err = QueryBuilder::new().from(&t).get().unwrap_err();
    assert!(err.is_build());
}

#[test]
fn having_without_group_by_fails_at_get() {
    let t = track();
    let err = QueryBuilder::new()
        .select(col(&t, "GenreId"))
        .having(Expr::count_all().gt(10))
        .get()
        .unwrap_err();
    assert!(err.to_string().contains("HAVING requires GROUP BY"));
}

#[test]
fn aggregates_outside_select_and_having_fail() {
    let t = track();
    let base = QueryBuilder::new().select(col(&t, "GenreId"));

    let err = base
        .clone()
        .where_(col(&t, "Milliseconds").sum().gt(1000))
        .get()
        .unwrap_err();
    assert!(err.is_build());

    let err = base.clone().group_by(Expr::count_all()).get().unwrap_err();
    assert!(err.is_build());
}

#[test]
fn group_by_having_order_by() {
    let t = track();
    let q = QueryBuilder::new()
        .select([col(&t, "GenreId"), Expr::count_all().alias("n")])
        .group_by(col(&t, "GenreId"))
        .having(Expr::count_all().gt(10))
        .order_by(Expr::count_all(), Order::Desc, Nulls::Default)
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Track.GenreId AS GenreId, COUNT(*) AS n FROM Track \
         GROUP BY GenreId HAVING (COUNT(*)) > (?) ORDER BY COUNT(*) DESC"
    );
    assert_eq!(q.column_names(), ["GenreId", "n"]);
}

#[test]
fn repeated_where_and_having_are_conjoined() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "GenreId"))
        .where_(col(&t, "Milliseconds").gt(1000))
        .where_(col(&t, "AlbumId").ne(3))
        .group_by(col(&t, "GenreId"))
        .having(Expr::count_all().gt(1))
        .having(col(&t, "Milliseconds").max().lt(90_000))
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Track.GenreId AS GenreId FROM Track \
         WHERE ((Milliseconds) > (?)) AND ((AlbumId) <> (?)) \
         GROUP BY GenreId HAVING ((COUNT(*)) > (?)) AND ((MAX(Milliseconds)) < (?))"
    );
    assert_eq!(
        q.params(),
        &[
            Value::Int(1000),
            Value::Int(3),
            Value::Int(1),
            Value::Int(90_000)
        ]
    );
}

#[test]
fn distinct_and_nulls_ordering() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "GenreId"))
        .distinct()
        .order_by(col(&t, "GenreId"), Order::Asc, Nulls::Last)
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT DISTINCT Track.GenreId AS GenreId FROM Track ORDER BY GenreId NULLS LAST"
    );
}

#[test]
fn renamed_output_forces_qualified_filter_columns() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "GenreId").alias("Name"))
        .order_by_asc(col(&t, "Name"))
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Track.GenreId AS Name FROM Track ORDER BY Track.Name"
    );
}

#[test]
fn unnamed_outputs_get_positional_names() {
    let t = track();
    let q = QueryBuilder::new()
        .select([col(&t, "Name"), Expr::count_all(), col(&t, "Name")])
        .group_by(col(&t, "Name"))
        .get()
        .unwrap();
    assert_eq!(q.column_names(), ["Name", "_1", "_2"]);
}

// ==================== Cloning ====================

#[test]
fn clones_diverge_independently() {
    let t = track();
    let base = QueryBuilder::new().select(col(&t, "Name"));
    let rock = base.clone().where_(col(&t, "GenreId").eq(1));
    let jazz = base
        .clone()
        .where_(col(&t, "GenreId").eq(2))
        .order_by_desc(col(&t, "Name"));

    assert_eq!(base.get().unwrap().sql(), "SELECT Track.Name AS Name FROM Track");
    let rock = rock.get().unwrap();
    let jazz = jazz.get().unwrap();
    assert_eq!(rock.params(), &[Value::Int(1)]);
    assert!(!rock.sql().contains("ORDER BY"));
    assert_eq!(jazz.params(), &[Value::Int(2)]);
    assert!(jazz.sql().ends_with("ORDER BY Name DESC"));
}

// ==================== Parameters ====================

#[test]
fn parameters_follow_render_order() {
    let t = track();
    let builder = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "Milliseconds").between(1, 10))
        .where_(col(&t, "Name").in_list(["x", "y"]));

    let q = builder.get().unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Track.Name AS Name FROM Track \
         WHERE ((Milliseconds) BETWEEN (?) AND (?)) AND ((Name) IN (?, ?))"
    );
    assert_eq!(
        q.params(),
        &[
            Value::Int(1),
            Value::Int(10),
            Value::from("x"),
            Value::from("y")
        ]
    );

    let q = builder.with_style(ParamStyle::Numeric).get().unwrap();
    assert!(q.sql().ends_with("BETWEEN ($1) AND ($2)) AND ((Name) IN ($3, $4))"));
}

#[test]
fn percent_is_escaped_for_format_style() {
    let t = track();
    let q = QueryBuilder::new()
        .with_style(ParamStyle::Format)
        .select(col(&t, "Milliseconds") % 2)
        .get()
        .unwrap();
    assert_eq!(q.sql(), "SELECT (Track.Milliseconds) %% (%s) AS _0 FROM Track");
}

#[test]
fn set_param_rebinds_named_value() {
    let t = track();
    let genre = Expr::param("genre", 1);
    let mut q = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(&genre))
        .get()
        .unwrap();
    let sql = q.sql().to_string();

    q.set_param("genre", 5).unwrap();
    assert_eq!(q.params(), &[Value::Int(5)]);
    assert_eq!(q.sql(), sql);

    let err = q.set_param("album", 5).unwrap_err();
    assert!(matches!(err, DbError::UnknownParam(name) if name == "album"));
}

#[test]
fn one_named_node_used_twice_binds_both_slots() {
    let t = track();
    let id = Expr::param("id", 1);
    let mut q = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(&id).or(col(&t, "AlbumId").eq(&id)))
        .get()
        .unwrap();
    q.set_param("id", 7).unwrap();
    assert_eq!(q.params(), &[Value::Int(7), Value::Int(7)]);
}

#[test]
fn distinct_nodes_sharing_a_name_fail() {
    let t = track();
    let err = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(Expr::param("x", 1)))
        .where_(col(&t, "AlbumId").eq(Expr::param("x", 2)))
        .get()
        .unwrap_err();
    assert!(err.is_build());
}

#[test]
fn cloned_query_params_are_independent() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(Expr::param("genre", 1)))
        .get()
        .unwrap();
    let mut other = q.clone();
    other.set_param("genre", 2).unwrap();
    assert_eq!(q.params(), &[Value::Int(1)]);
    assert_eq!(other.params(), &[Value::Int(2)]);
}

// ==================== Subqueries ====================

fn rock_tracks(t: &Table) -> Query {
    QueryBuilder::new()
        .select([col(t, "TrackId"), col(t, "Name").alias("title")])
        .where_(col(t, "GenreId").eq(Expr::param("genre", 1)))
        .get()
        .unwrap()
}

#[test]
fn query_as_from_item_keeps_output_names() {
    let t = track();
    let inner = rock_tracks(&t);
    let outer = QueryBuilder::new().select(&inner).get().unwrap();
    assert_eq!(outer.column_names(), inner.column_names());
    assert_eq!(
        outer.sql(),
        "SELECT TrackId AS TrackId, title AS title FROM \
         (SELECT Track.TrackId AS TrackId, Track.Name AS title FROM Track WHERE (GenreId) = (?))"
    );
    assert_eq!(outer.params(), &[Value::Int(1)]);
}

#[test]
fn aliased_subquery_and_outer_filter() {
    let t = track();
    let inner = rock_tracks(&t);
    let sub = inner.alias("t");
    let mut outer = QueryBuilder::new()
        .select(&sub)
        .where_(sub.column("TrackId").unwrap().gt(10))
        .get()
        .unwrap();
    assert_eq!(
        outer.sql(),
        "SELECT t.TrackId AS TrackId, t.title AS title FROM \
         (SELECT Track.TrackId AS TrackId, Track.Name AS title FROM Track WHERE (GenreId) = (?)) AS t \
         WHERE (TrackId) > (?)"
    );
    assert_eq!(outer.params(), &[Value::Int(1), Value::Int(10)]);

    // Named parameters of the subquery stay addressable from the outer query.
    outer.set_param("genre", 2).unwrap();
    assert_eq!(outer.params(), &[Value::Int(2), Value::Int(10)]);
}

#[test]
fn subquery_uses_its_current_bindings() {
    let t = track();
    let mut inner = rock_tracks(&t);
    inner.set_param("genre", 9).unwrap();
    let outer = QueryBuilder::new().select(inner.alias("t")).get().unwrap();
    assert_eq!(outer.params(), &[Value::Int(9)]);
}

#[test]
fn in_query_embeds_subquery_parameters_in_order() {
    let (t, a) = (track(), album());
    let rock = QueryBuilder::new()
        .select(col(&t, "AlbumId"))
        .where_(col(&t, "GenreId").eq(1))
        .get()
        .unwrap();
    let builder = QueryBuilder::new()
        .select(col(&a, "Title"))
        .where_(col(&a, "ArtistId").eq(3))
        .where_(col(&a, "AlbumId").in_query(&rock));

    let q = builder.get().unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Album.Title AS Title FROM Album WHERE ((ArtistId) = (?)) AND \
         ((AlbumId) IN (SELECT Track.AlbumId AS AlbumId FROM Track WHERE (GenreId) = (?)))"
    );
    assert_eq!(q.params(), &[Value::Int(3), Value::Int(1)]);

    let q = builder.with_style(ParamStyle::Numeric).get().unwrap();
    assert!(q.sql().contains("(ArtistId) = ($1)"));
    assert!(q.sql().contains("(GenreId) = ($2)"));
}

// ==================== Joins ====================

#[test]
fn join_query_qualifies_only_ambiguous_filter_columns() {
    let (t, a) = (track(), album());
    let j = Join::inner(&a, &t, JoinOn::using(["AlbumId"])).unwrap();
    let at = j.table("Album").unwrap();
    let tt = j.table("Track").unwrap();
    let q = QueryBuilder::new()
        .select([at.column("Title").unwrap(), tt.column("Name").unwrap()])
        .where_(tt.column("AlbumId").unwrap().eq(1))
        .where_(col(&t, "GenreId").eq(2))
        .get()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT Album.Title AS Title, Track.Name AS Name FROM \
         Album INNER JOIN Track ON (Album.AlbumId) = (Track.AlbumId) \
         WHERE ((Track.AlbumId) = (?)) AND ((GenreId) = (?))"
    );
}

#[test]
fn selecting_a_join_renames_repeated_columns() {
    let (t, a) = (track(), album());
    let j = Join::inner(&a, &t, JoinOn::using(["AlbumId"])).unwrap();
    let q = QueryBuilder::new().select(&j).get().unwrap();
    assert_eq!(
        q.column_names(),
        [
            "AlbumId",
            "Title",
            "ArtistId",
            "TrackId",
            "Name",
            "_5",
            "GenreId",
            "Milliseconds"
        ]
    );
}

// ==================== Finalized query ====================

#[test]
fn paging_binds_limit_and_offset_independently() {
    let t = track();
    let q = QueryBuilder::new()
        .with_style(ParamStyle::Numeric)
        .select(col(&t, "Name"))
        .where_(col(&t, "GenreId").eq(5))
        .get()
        .unwrap();

    let (sql, params) = q.paged(Some(10), Some(20)).unwrap();
    assert!(sql.ends_with("WHERE (GenreId) = ($1) LIMIT $2 OFFSET $3"));
    assert_eq!(params, vec![Value::Int(5), Value::Int(10), Value::Int(20)]);

    let (sql, params) = q.paged(None, Some(20)).unwrap();
    assert!(sql.ends_with(" OFFSET $2"));
    assert!(!sql.contains("LIMIT"));
    assert_eq!(params.len(), 2);

    let (sql, _) = q.paged(None, None).unwrap();
    assert_eq!(sql, q.sql());
}

#[test]
fn show_lists_sql_then_parameters() {
    let t = track();
    let q = QueryBuilder::new()
        .select(col(&t, "Name"))
        .where_(col(&t, "Name").eq("Balls to the Wall"))
        .get()
        .unwrap();
    assert_eq!(
        q.show(),
        "SELECT Track.Name AS Name FROM Track WHERE (Name) = (?)\n[\"Balls to the Wall\"]"
    );
}

#[tokio::test]
async fn detached_query_cannot_execute() {
    let t = track();
    let q = QueryBuilder::new().select(col(&t, "Name")).get().unwrap();
    assert!(matches!(q.execute().await, Err(DbError::NoDatabase)));
}
