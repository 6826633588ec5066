//! Composable SQL expressions.
//!
//! An [`Expr`] is an immutable node shared through an `Arc`, so cloning one is
//! cheap and builders can hold the same expression in several clauses.
//! Composite expressions always parenthesize their operands:
//!
//! ```
//! use sqlcraft::{Expr, Table};
//!
//! let track = Table::new("Track", ["TrackId", "GenreId", "Milliseconds"])?;
//! let long_rock = track
//!     .column("GenreId")?
//!     .eq(1)
//!     .and(track.column("Milliseconds")?.gt(300_000));
//! assert_eq!(long_rock.to_sql(), "((GenreId) = (?)) AND ((Milliseconds) > (?))");
//! assert_eq!(long_rock.params().len(), 2);
//! # Ok::<(), sqlcraft::DbError>(())
//! ```

mod writer;


pub(crate) use writer::{Clause, Rendered, SqlWriter, rebind};

use crate::query::Query;
use crate::style::ParamStyle;
use crate::table::TableExpr;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::ops;
use std::sync::Arc;

/// A SQL expression.
#[derive(Clone, Debug)]
pub struct Expr(Arc<ExprKind>);

#[derive(Debug)]
pub(crate) enum ExprKind {
    Column(ColumnRef),
    Value(ValueExpr),
    /// Constant predicate (`1=1` / `1=0`).
    Const(bool),
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        lhs: Expr,
        rhs: Expr,
    },
    Chain {
        op: ChainOp,
        operands: Vec<Expr>,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
    },
    InList {
        expr: Expr,
        list: Vec<Expr>,
        negated: bool,
    },
    InQuery {
        expr: Expr,
        query: Query,
        negated: bool,
    },
    Aggregate {
        func: AggregateFn,
        arg: Option<Expr>,
        distinct: bool,
    },
    Aliased {
        expr: Expr,
        alias: String,
    },
}

/// A column reached through a FROM item.
#[derive(Debug, Clone)]
pub(crate) struct ColumnRef {
    /// The table, aliased table or subquery that defines the column.
    pub owner: TableExpr,
    /// The FROM item the column was obtained from (the owner itself, or an enclosing join).
    pub scope: TableExpr,
    pub name: String,
}

#[derive(Debug)]
pub(crate) struct ValueExpr {
    pub value: Value,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    SimilarTo,
    Is,
    Sub,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    fn token(self) -> &'static str {
        match self {
            BinaryOp::Eq => " = ",
            BinaryOp::Ne => " <> ",
            BinaryOp::Lt => " < ",
            BinaryOp::Gt => " > ",
            BinaryOp::Le => " <= ",
            BinaryOp::Ge => " >= ",
            BinaryOp::Like => " LIKE ",
            BinaryOp::NotLike => " NOT LIKE ",
            BinaryOp::SimilarTo => " SIMILAR TO ",
            BinaryOp::Is => " IS ",
            BinaryOp::Sub => " - ",
            BinaryOp::Div => " / ",
            BinaryOp::Mod => " % ",
            BinaryOp::Pow => " ^ ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainOp {
    And,
    Or,
    Add,
    Mul,
}

impl ChainOp {
    fn token(self) -> &'static str {
        match self {
            ChainOp::And => " AND ",
            ChainOp::Or => " OR ",
            ChainOp::Add => " + ",
            ChainOp::Mul => " * ",
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

// ==================== Conversion ====================

/// Anything usable as an operand: an expression, or a literal bound as a parameter.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::value(self)
    }
}

impl<T: Into<Value>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::value(self)
    }
}

macro_rules! literal_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::value(self)
                }
            }
        )*
    };
}

literal_into_expr!(
    bool,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    rust_decimal::Decimal,
    String,
    &str,
    &String,
    Vec<u8>,
    serde_json::Value,
    uuid::Uuid,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
);

// ==================== Construction ====================

impl Expr {
    fn new(kind: ExprKind) -> Self {
        Expr(Arc::new(kind))
    }

    pub(crate) fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub(crate) fn column_ref(owner: TableExpr, scope: TableExpr, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Column(ColumnRef {
            owner,
            scope,
            name: name.into(),
        }))
    }

    /// A literal bound as one positional parameter.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::new(ExprKind::Value(ValueExpr {
            value: value.into(),
            name: None,
        }))
    }

    /// A named literal whose value can be rebound on the finalized statement
    /// with `set_param`.
    pub fn param(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ExprKind::Value(ValueExpr {
            value: value.into(),
            name: Some(name.into()),
        }))
    }

    /// Always-true predicate.
    pub fn true_() -> Self {
        Self::new(ExprKind::Const(true))
    }

    /// Always-false predicate.
    pub fn false_() -> Self {
        Self::new(ExprKind::Const(false))
    }

    /// `COUNT(*)`.
    pub fn count_all() -> Self {
        Self::new(ExprKind::Aggregate {
            func: AggregateFn::Count,
            arg: None,
            distinct: false,
        })
    }

    /// Aggregate over an expression.
    pub fn aggregate(func: AggregateFn, arg: impl IntoExpr, distinct: bool) -> Self {
        Self::new(ExprKind::Aggregate {
            func,
            arg: Some(arg.into_expr()),
            distinct,
        })
    }

    /// AND of all predicates. An empty input is always true.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::chain_all(ChainOp::And, exprs).unwrap_or_else(Self::true_)
    }

    /// OR of all predicates. An empty input is always false.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::chain_all(ChainOp::Or, exprs).unwrap_or_else(Self::false_)
    }

    fn chain_all(op: ChainOp, exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        let mut operands: Vec<Expr> = exprs.into_iter().collect();
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(Self::new(ExprKind::Chain { op, operands })),
        }
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: self.clone(),
        })
    }

    fn binary(&self, op: BinaryOp, rhs: impl IntoExpr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            lhs: self.clone(),
            rhs: rhs.into_expr(),
        })
    }

    /// Associative operators flatten into one chain.
    fn chain(&self, op: ChainOp, rhs: impl IntoExpr) -> Self {
        let rhs = rhs.into_expr();
        let mut operands = Vec::new();
        for side in [self, &rhs] {
            match side.kind() {
                ExprKind::Chain { op: inner, operands: inner_ops } if *inner == op => {
                    operands.extend(inner_ops.iter().cloned());
                }
                _ => operands.push(side.clone()),
            }
        }
        Self::new(ExprKind::Chain { op, operands })
    }

    // ==================== Comparison ====================

    pub fn eq(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn gt(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn le(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn ge(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn like(&self, pattern: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Like, pattern)
    }

    pub fn not_like(&self, pattern: impl IntoExpr) -> Self {
        self.binary(BinaryOp::NotLike, pattern)
    }

    /// `(self) SIMILAR TO (pattern)`: SQL regular-expression match.
    pub fn similar_to(&self, pattern: impl IntoExpr) -> Self {
        self.binary(BinaryOp::SimilarTo, pattern)
    }

    /// `(self) IS (rhs)`.
    pub fn is_(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Is, rhs)
    }

    pub fn is_null(&self) -> Self {
        self.unary(UnaryOp::IsNull)
    }

    pub fn is_not_null(&self) -> Self {
        self.unary(UnaryOp::IsNotNull)
    }

    /// `(self) BETWEEN (low) AND (high)`
    pub fn between(&self, low: impl IntoExpr, high: impl IntoExpr) -> Self {
        Self::new(ExprKind::Between {
            expr: self.clone(),
            low: low.into_expr(),
            high: high.into_expr(),
        })
    }

    /// Membership in a literal list. An empty list never matches.
    pub fn in_list<I>(&self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        self.in_list_inner(items, false)
    }

    /// Negated membership in a literal list. An empty list always matches.
    pub fn not_in_list<I>(&self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        self.in_list_inner(items, true)
    }

    fn in_list_inner<I>(&self, items: I, negated: bool) -> Self
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        Self::new(ExprKind::InList {
            expr: self.clone(),
            list: items.into_iter().map(IntoExpr::into_expr).collect(),
            negated,
        })
    }

    /// Membership in the rows of a finalized query.
    pub fn in_query(&self, query: &Query) -> Self {
        Self::new(ExprKind::InQuery {
            expr: self.clone(),
            query: query.clone(),
            negated: false,
        })
    }

    pub fn not_in_query(&self, query: &Query) -> Self {
        Self::new(ExprKind::InQuery {
            expr: self.clone(),
            query: query.clone(),
            negated: true,
        })
    }

    // ==================== Boolean ====================

    pub fn and(&self, rhs: impl IntoExpr) -> Self {
        self.chain(ChainOp::And, rhs)
    }

    pub fn or(&self, rhs: impl IntoExpr) -> Self {
        self.chain(ChainOp::Or, rhs)
    }

    pub fn not(&self) -> Self {
        self.unary(UnaryOp::Not)
    }

    // ==================== Arithmetic ====================

    pub fn pow(&self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Pow, rhs)
    }

    /// Unary `+`.
    pub fn pos(&self) -> Self {
        self.unary(UnaryOp::Plus)
    }

    // ==================== Aggregates ====================

    pub fn count(&self) -> Self {
        Self::aggregate(AggregateFn::Count, self, false)
    }

    pub fn count_distinct(&self) -> Self {
        Self::aggregate(AggregateFn::Count, self, true)
    }

    pub fn sum(&self) -> Self {
        Self::aggregate(AggregateFn::Sum, self, false)
    }

    pub fn avg(&self) -> Self {
        Self::aggregate(AggregateFn::Avg, self, false)
    }

    pub fn min(&self) -> Self {
        Self::aggregate(AggregateFn::Min, self, false)
    }

    pub fn max(&self) -> Self {
        Self::aggregate(AggregateFn::Max, self, false)
    }

    // ==================== Naming ====================

    /// Give the expression an output name for SELECT lists.
    pub fn alias(&self, alias: impl Into<String>) -> Self {
        let inner = match self.kind() {
            ExprKind::Aliased { expr, .. } => expr.clone(),
            _ => self.clone(),
        };
        Self::new(ExprKind::Aliased {
            expr: inner,
            alias: alias.into(),
        })
    }

    /// The name this expression contributes to a result record, if it has one.
    pub fn natural_name(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Column(col) => Some(&col.name),
            ExprKind::Aliased { alias, .. } => Some(alias),
            ExprKind::Value(v) => v.name.as_deref(),
            _ => None,
        }
    }

    /// Column name when the expression is a (possibly aliased) column.
    pub(crate) fn source_column(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Column(col) => Some(&col.name),
            ExprKind::Aliased { expr, .. } => expr.source_column(),
            _ => None,
        }
    }

    // ==================== Inspection ====================

    /// FROM items referenced by this expression, without duplicates.
    ///
    /// Columns inside an `IN (subquery)` belong to the subquery and are not reported.
    pub fn tables(&self) -> Vec<TableExpr> {
        let mut out = Vec::new();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables(&self, out: &mut Vec<TableExpr>) {
        match self.kind() {
            ExprKind::Column(col) => {
                if !out.contains(&col.scope) {
                    out.push(col.scope.clone());
                }
            }
            ExprKind::Value(_) | ExprKind::Const(_) => {}
            ExprKind::Unary { operand, .. } => operand.collect_tables(out),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.collect_tables(out);
                rhs.collect_tables(out);
            }
            ExprKind::Chain { operands, .. } => {
                for operand in operands {
                    operand.collect_tables(out);
                }
            }
            ExprKind::Between { expr, low, high } => {
                expr.collect_tables(out);
                low.collect_tables(out);
                high.collect_tables(out);
            }
            ExprKind::InList { expr, list, .. } => {
                expr.collect_tables(out);
                for item in list {
                    item.collect_tables(out);
                }
            }
            ExprKind::InQuery { expr, .. } => expr.collect_tables(out),
            ExprKind::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_tables(out);
                }
            }
            ExprKind::Aliased { expr, .. } => expr.collect_tables(out),
        }
    }

    /// Whether an aggregate appears outside any nested subquery.
    pub fn contains_aggregate(&self) -> bool {
        match self.kind() {
            ExprKind::Aggregate { .. } => true,
            ExprKind::Column(_) | ExprKind::Value(_) | ExprKind::Const(_) => false,
            ExprKind::Unary { operand, .. } => operand.contains_aggregate(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.contains_aggregate() || rhs.contains_aggregate(),
            ExprKind::Chain { operands, .. } => operands.iter().any(Expr::contains_aggregate),
            ExprKind::Between { expr, low, high } => {
                expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate()
            }
            ExprKind::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            ExprKind::InQuery { expr, .. } => expr.contains_aggregate(),
            ExprKind::Aliased { expr, .. } => expr.contains_aggregate(),
        }
    }

    /// Render as a standalone predicate with `?` placeholders.
    pub fn to_sql(&self) -> String {
        self.build(ParamStyle::Qmark).0
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.build(ParamStyle::Qmark).1
    }

    /// Render as a standalone predicate in the given style.
    pub fn build(&self, style: ParamStyle) -> (String, Vec<Value>) {
        let mut w = SqlWriter::new(style);
        self.render(&mut w);
        w.into_parts()
    }

    // ==================== Rendering ====================

    fn node_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn render(&self, w: &mut SqlWriter) {
        match self.kind() {
            ExprKind::Column(col) => {
                let qualify = match w.clause() {
                    Clause::Qualified => true,
                    Clause::Filter => w.is_ambiguous(&col.name),
                };
                if qualify && col.owner.write_qualifier(w) {
                    w.push(".");
                }
                w.push_name(&col.name);
            }
            ExprKind::Value(v) => w.push_param(v.value.clone(), v.name.as_deref(), self.node_id()),
            ExprKind::Const(true) => w.push("1=1"),
            ExprKind::Const(false) => w.push("1=0"),
            ExprKind::Unary { op, operand } => {
                let (prefix, suffix) = match op {
                    UnaryOp::Not => ("NOT (", ")"),
                    UnaryOp::Neg => ("-(", ")"),
                    UnaryOp::Plus => ("+(", ")"),
                    UnaryOp::IsNull => ("(", ") IS NULL"),
                    UnaryOp::IsNotNull => ("(", ") IS NOT NULL"),
                };
                w.push(prefix);
                operand.render(w);
                w.push(suffix);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                w.push("(");
                lhs.render(w);
                w.push(")");
                w.push_operator(op.token());
                w.push("(");
                rhs.render(w);
                w.push(")");
            }
            ExprKind::Chain { op, operands } => {
                w.push_list(operands, op.token(), |w, operand| {
                    w.push("(");
                    operand.render(w);
                    w.push(")");
                });
            }
            ExprKind::Between { expr, low, high } => {
                w.push("(");
                expr.render(w);
                w.push(") BETWEEN (");
                low.render(w);
                w.push(") AND (");
                high.render(w);
                w.push(")");
            }
            ExprKind::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    w.push(if *negated { "1=1" } else { "1=0" });
                    return;
                }
                w.push("(");
                expr.render(w);
                w.push(if *negated { ") NOT IN (" } else { ") IN (" });
                w.push_list(list, ", ", |w, item| item.render(w));
                w.push(")");
            }
            ExprKind::InQuery {
                expr,
                query,
                negated,
            } => {
                w.push("(");
                expr.render(w);
                w.push(if *negated { ") NOT IN (" } else { ") IN (" });
                query.write_embedded(w);
                w.push(")");
            }
            ExprKind::Aggregate {
                func,
                arg,
                distinct,
            } => {
                w.push(func.sql_name());
                w.push("(");
                match arg {
                    Some(arg) => {
                        if *distinct {
                            w.push("DISTINCT ");
                        }
                        arg.render(w);
                    }
                    None => w.push("*"),
                }
                w.push(")");
            }
            ExprKind::Aliased { expr, .. } => expr.render(w),
        }
    }
}

// ==================== Operators ====================

macro_rules! binary_operator {
    ($trait:ident, $method:ident, |$lhs:ident, $rhs:ident| $body:expr) => {
        impl<R: IntoExpr> ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, $rhs: R) -> Expr {
                let $lhs = &self;
                $body
            }
        }

        impl<R: IntoExpr> ops::$trait<R> for &Expr {
            type Output = Expr;

            fn $method(self, $rhs: R) -> Expr {
                let $lhs = self;
                $body
            }
        }
    };
}

binary_operator!(Add, add, |lhs, rhs| lhs.chain(ChainOp::Add, rhs));
binary_operator!(Mul, mul, |lhs, rhs| lhs.chain(ChainOp::Mul, rhs));
binary_operator!(Sub, sub, |lhs, rhs| lhs.binary(BinaryOp::Sub, rhs));
binary_operator!(Div, div, |lhs, rhs| lhs.binary(BinaryOp::Div, rhs));
binary_operator!(Rem, rem, |lhs, rhs| lhs.binary(BinaryOp::Mod, rhs));
binary_operator!(BitAnd, bitand, |lhs, rhs| lhs.and(rhs));
binary_operator!(BitOr, bitor, |lhs, rhs| lhs.or(rhs));

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.unary(UnaryOp::Neg)
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.unary(UnaryOp::Neg)
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.unary(UnaryOp::Not)
    }
}

impl ops::Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.unary(UnaryOp::Not)
    }
}
