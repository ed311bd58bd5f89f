//! Builder DSL.
//!
//! Scalar operators come from `std::ops` overloads where Rust has them
//! (`+ - * /`, unary `-`) and from builder methods everywhere else
//! (`eq`, `and`, `like`, …). Chained `+`/`*` flatten into one n-ary node;
//! [paren] blocks the flattening and is never parenthesized twice.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::algebra::{CompareOp, DatePart, Expr, ExprKind, Table, TableKind};
use crate::nullable::Value;

// --- coercions (`make`) ---

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::new(ExprKind::Constant(v))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::new(ExprKind::Constant(Value::Bool(b)))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::new(ExprKind::Constant(Value::Int(n)))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::new(ExprKind::Constant(Value::Int(n as i64)))
    }
}

impl From<f64> for Expr {
    fn from(x: f64) -> Self {
        Expr::new(ExprKind::Constant(Value::Float(x)))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::new(ExprKind::Constant(Value::Text(s.to_string())))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::new(ExprKind::Constant(Value::Text(s)))
    }
}

/// A sequence becomes an expression list (the right side of `IN`, a
/// multi-column tuple).
impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::new(ExprKind::List(items.into_iter().map(Into::into).collect()))
    }
}

/// A table in scalar position is a subquery value.
impl From<Table> for Expr {
    fn from(t: Table) -> Self {
        Expr::new(ExprKind::Table(t))
    }
}

// --- item namespace ---

/// A label in the current query scope.
pub fn item(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Item(name.into()))
}

/// A label in the enclosing query scope (correlated reference).
pub fn host_item(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::HostItem(name.into()))
}

/// A named bind site.
pub fn param(name: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Parameter(name.into()))
}

pub fn constant(v: impl Into<Value>) -> Expr {
    Expr::new(ExprKind::Constant(v.into()))
}

pub fn value(v: impl Into<Value>) -> Expr {
    Expr::new(ExprKind::Value(v.into()))
}

pub fn null() -> Expr {
    Expr::new(ExprKind::Constant(Value::Null))
}

// --- table namespace ---

pub fn table(name: impl Into<String>) -> Table {
    Table::primary(name)
}

// --- operations ---

pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        name: name.into(),
        args: args.into_iter().collect(),
    })
}

pub fn cast(x: impl Into<Expr>, ty: impl Into<String>) -> Expr {
    Expr::new(ExprKind::Cast {
        expr: x.into(),
        ty: ty.into(),
    })
}

pub fn concat(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(ExprKind::Concat(items.into_iter().collect()))
}

/// Explicit grouping. Blocks `+`/`*` flattening and is never doubled.
pub fn paren(x: impl Into<Expr>) -> Expr {
    Expr::new(ExprKind::Parens(x.into()))
}

pub fn case(
    cases: impl IntoIterator<Item = (Expr, Expr)>,
    otherwise: Option<Expr>,
) -> Expr {
    Expr::new(ExprKind::Case {
        cases: cases.into_iter().collect(),
        otherwise,
    })
}

pub fn switch(
    on: impl Into<Expr>,
    cases: impl IntoIterator<Item = (Expr, Expr)>,
    otherwise: Option<Expr>,
) -> Expr {
    Expr::new(ExprKind::Switch {
        on: on.into(),
        cases: cases.into_iter().collect(),
        otherwise,
    })
}

pub fn now() -> Expr {
    Expr::new(ExprKind::Now)
}

pub fn next_val(sequence: impl Into<String>) -> Expr {
    Expr::new(ExprKind::NextVal(sequence.into()))
}

pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(ExprKind::And(exprs.into_iter().collect()))
}

pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(ExprKind::Or(exprs.into_iter().collect()))
}

pub fn not(x: impl Into<Expr>) -> Expr {
    Expr::new(ExprKind::Not(x.into()))
}

/// Null-tolerant equality: both null, or equal.
pub fn same(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    let a = a.into();
    let b = b.into();
    or_all([
        and_all([a.clone().is_null(), b.clone().is_null()]),
        a.eq(b),
    ])
}

/// Bind-by-parameter set list: every label maps to a parameter of the same
/// name. The common shape for `INSERT`/`UPDATE` statements executed with
/// named binds.
pub fn bind_params<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Vec<(String, Expr)> {
    labels
        .into_iter()
        .map(|l| {
            let l = l.into();
            let p = param(l.clone());
            (l, p)
        })
        .collect()
}

pub(crate) fn pairs<S: Into<String>, E: Into<Expr>>(
    items: impl IntoIterator<Item = (S, E)>,
) -> Vec<(String, Expr)> {
    items
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}

// --- scalar operators ---

impl Add for Expr {
    type Output = Expr;

    /// Numeric `+`; chains flatten into one n-ary summarize.
    fn add(self, other: Expr) -> Expr {
        let mut items = match self.kind() {
            ExprKind::Summarize(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match other.kind() {
            ExprKind::Summarize(ys) => items.extend(ys.iter().cloned()),
            _ => items.push(other.clone()),
        }
        Expr::new(ExprKind::Summarize(items))
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, other: T) -> Expr {
        Expr::new(ExprKind::Sub(self, other.into()))
    }
}

impl Mul for Expr {
    type Output = Expr;

    /// Numeric `*`; chains flatten into one n-ary multiply.
    fn mul(self, other: Expr) -> Expr {
        let mut items = match self.kind() {
            ExprKind::Multiply(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match other.kind() {
            ExprKind::Multiply(ys) => items.extend(ys.iter().cloned()),
            _ => items.push(other.clone()),
        }
        Expr::new(ExprKind::Multiply(items))
    }
}

impl<T: Into<Expr>> Div<T> for Expr {
    type Output = Expr;

    fn div(self, other: T) -> Expr {
        Expr::new(ExprKind::Div(self, other.into()))
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::new(ExprKind::Neg(self))
    }
}

macro_rules! scalar_rhs {
    ($($t:ty),+) => {$(
        impl Add<$t> for Expr {
            type Output = Expr;
            fn add(self, other: $t) -> Expr {
                self + Expr::from(other)
            }
        }
        impl Mul<$t> for Expr {
            type Output = Expr;
            fn mul(self, other: $t) -> Expr {
                self * Expr::from(other)
            }
        }
    )+};
}

scalar_rhs!(i64, i32, f64);

impl Expr {
    pub fn pos(self) -> Expr {
        Expr::new(ExprKind::Pos(self))
    }

    pub fn abs(self) -> Expr {
        call("ABS", [self])
    }

    pub fn pow(self, other: impl Into<Expr>) -> Expr {
        call("POWER", [self, other.into()])
    }

    pub fn modulo(self, other: impl Into<Expr>) -> Expr {
        call("MOD", [self, other.into()])
    }

    // comparisons

    fn compare(self, op: CompareOp, other: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::Comparison {
            op,
            left: self,
            right: other.into(),
        })
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Le, other)
    }

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ne, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ge, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gt, other)
    }

    pub fn between(self, lo: impl Into<Expr>, hi: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::Between {
            expr: self,
            lo: lo.into(),
            hi: hi.into(),
        })
    }

    /// Half-open range: `first <= self AND self < afterlast`.
    pub fn in_range(self, first: impl Into<Expr>, afterlast: impl Into<Expr>) -> Expr {
        and_all([
            first.into().le(self.clone()),
            self.lt(afterlast),
        ])
    }

    pub fn is_in(self, set: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::IsIn {
            expr: self,
            set: set.into(),
        })
    }

    pub fn not_in(self, set: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::NotIn {
            expr: self,
            set: set.into(),
        })
    }

    pub fn is_null(self) -> Expr {
        Expr::new(ExprKind::IsNull(self))
    }

    pub fn is_not_null(self) -> Expr {
        Expr::new(ExprKind::NotNull(self))
    }

    // booleans

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        let other = other.into();
        let mut items = match self.kind() {
            ExprKind::And(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match other.kind() {
            ExprKind::And(ys) => items.extend(ys.iter().cloned()),
            _ => items.push(other.clone()),
        }
        Expr::new(ExprKind::And(items))
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        let other = other.into();
        let mut items = match self.kind() {
            ExprKind::Or(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match other.kind() {
            ExprKind::Or(ys) => items.extend(ys.iter().cloned()),
            _ => items.push(other.clone()),
        }
        Expr::new(ExprKind::Or(items))
    }

    pub fn not(self) -> Expr {
        Expr::new(ExprKind::Not(self))
    }

    // strings

    /// String concatenation; chains flatten into one n-ary concat.
    pub fn append(self, suffix: impl Into<Expr>) -> Expr {
        let suffix = suffix.into();
        let mut items = match self.kind() {
            ExprKind::Concat(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match suffix.kind() {
            ExprKind::Concat(ys) => items.extend(ys.iter().cloned()),
            _ => items.push(suffix.clone()),
        }
        Expr::new(ExprKind::Concat(items))
    }

    pub fn prepend(self, prefix: impl Into<Expr>) -> Expr {
        prefix.into().append(self)
    }

    pub fn upper(self) -> Expr {
        call("UCASE", [self])
    }

    pub fn lower(self) -> Expr {
        call("LCASE", [self])
    }

    pub fn replace(self, old: impl Into<Expr>, new: impl Into<Expr>) -> Expr {
        call("REPLACE", [self, old.into(), new.into()])
    }

    pub fn ltrim(self) -> Expr {
        call("LTRIM", [self])
    }

    pub fn rtrim(self) -> Expr {
        call("RTRIM", [self])
    }

    pub fn trim(self) -> Expr {
        call("TRIM", [self])
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::Like {
            expr: self,
            pattern: pattern.into(),
            escape: None,
        })
    }

    pub fn like_escape(self, pattern: impl Into<Expr>, escape: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::Like {
            expr: self,
            pattern: pattern.into(),
            escape: Some(escape.into()),
        })
    }

    pub fn starts_with(self, prefix: impl Into<Expr>) -> Expr {
        let pattern = prefix.into().append("%");
        self.like(pattern)
    }

    pub fn ends_with(self, suffix: impl Into<Expr>) -> Expr {
        let pattern = suffix.into().prepend("%");
        self.like(pattern)
    }

    // datetimes

    pub fn date_part(self, part: DatePart) -> Expr {
        Expr::new(ExprKind::DateTimePart { date: self, part })
    }

    pub fn year(self) -> Expr {
        self.date_part(DatePart::Year)
    }

    pub fn month(self) -> Expr {
        self.date_part(DatePart::Month)
    }

    pub fn day(self) -> Expr {
        self.date_part(DatePart::Day)
    }

    pub fn hour(self) -> Expr {
        self.date_part(DatePart::Hour)
    }

    pub fn minute(self) -> Expr {
        self.date_part(DatePart::Minute)
    }

    pub fn second(self) -> Expr {
        self.date_part(DatePart::Second)
    }

    pub fn microsecond(self) -> Expr {
        self.date_part(DatePart::Microsecond)
    }

    pub fn period_start(self, part: DatePart) -> Period {
        Period {
            date: self,
            part,
            offset: Expr::from(0i64),
        }
    }

    pub fn year_start(self) -> Period {
        self.period_start(DatePart::Year)
    }

    pub fn month_start(self) -> Period {
        self.period_start(DatePart::Month)
    }

    pub fn day_start(self) -> Period {
        self.period_start(DatePart::Day)
    }

    pub fn hour_start(self) -> Period {
        self.period_start(DatePart::Hour)
    }

    pub fn minute_start(self) -> Period {
        self.period_start(DatePart::Minute)
    }

    pub fn second_start(self) -> Period {
        self.period_start(DatePart::Second)
    }

    pub fn date_text(self, sep: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::DateText {
            date: self,
            sep: sep.into(),
        })
    }

    pub fn time_text(self, sep: impl Into<Expr>) -> Expr {
        Expr::new(ExprKind::TimeText {
            date: self,
            sep: sep.into(),
        })
    }
}

/// The start of a calendar period, with whole-period shifting.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    date: Expr,
    part: DatePart,
    offset: Expr,
}

impl Period {
    pub fn next(self, n: i64) -> Period {
        Period {
            offset: self.offset + Expr::from(n),
            ..self
        }
    }

    pub fn prev(self, n: i64) -> Period {
        Period {
            offset: self.offset - Expr::from(n),
            ..self
        }
    }
}

impl From<Period> for Expr {
    fn from(p: Period) -> Self {
        Expr::new(ExprKind::PeriodStart {
            date: p.date,
            part: p.part,
            offset: p.offset,
        })
    }
}

// --- table chain methods ---

impl Table {
    pub fn qualify(&self) -> Table {
        Table::new(TableKind::Qualify(self.clone()))
    }

    pub fn alias(&self, alias: impl Into<String>) -> Table {
        Table::new(TableKind::Alias(self.clone(), alias.into()))
    }

    pub fn nest(&self) -> Table {
        Table::new(TableKind::Nest(self.clone(), None))
    }

    pub fn nest_as(&self, alias: impl Into<String>) -> Table {
        Table::new(TableKind::Nest(self.clone(), Some(alias.into())))
    }

    pub fn include<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Table {
        Table::new(TableKind::Include(self.clone(), strings(labels)))
    }

    pub fn exclude<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Table {
        Table::new(TableKind::Exclude(self.clone(), strings(labels)))
    }

    pub fn rename<S: Into<String>, S2: Into<String>>(
        &self,
        renamings: impl IntoIterator<Item = (S, S2)>,
    ) -> Table {
        let renamings = renamings
            .into_iter()
            .map(|(o, n)| (o.into(), n.into()))
            .collect();
        Table::new(TableKind::Rename(self.clone(), renamings))
    }

    /// The `Where` operator. Before a `Group` this accumulates into `WHERE`;
    /// after one, into `HAVING`.
    pub fn filter(&self, predicate: impl Into<Expr>) -> Table {
        Table::new(TableKind::Where(self.clone(), predicate.into()))
    }

    pub fn define<S: Into<String>, E: Into<Expr>>(
        &self,
        defs: impl IntoIterator<Item = (S, E)>,
    ) -> Table {
        Table::new(TableKind::Define(self.clone(), pairs(defs)))
    }

    pub fn redefine<S: Into<String>, E: Into<Expr>>(
        &self,
        defs: impl IntoIterator<Item = (S, E)>,
    ) -> Table {
        Table::new(TableKind::Redefine(self.clone(), pairs(defs)))
    }

    pub fn group<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Table {
        Table::new(TableKind::Group(self.clone(), strings(labels)))
    }

    pub fn assign<S: Into<String>, E: Into<Expr>>(
        &self,
        assignments: impl IntoIterator<Item = (S, E)>,
    ) -> Table {
        Table::new(TableKind::Assign(self.clone(), pairs(assignments)))
    }

    pub fn union(&self, other: impl Into<Table>) -> Table {
        let other = other.into();
        let mut members = match self.kind() {
            TableKind::Union(xs) => xs.clone(),
            _ => vec![self.clone()],
        };
        match other.kind() {
            TableKind::Union(ys) => members.extend(ys.iter().cloned()),
            _ => members.push(other.clone()),
        }
        Table::new(TableKind::Union(members))
    }

    pub fn inner_join(&self, right: impl Into<Table>) -> Table {
        Table::new(TableKind::InnerJoin(self.clone(), right.into()))
    }

    pub fn outer_join(&self, right: impl Into<Table>) -> Table {
        Table::new(TableKind::OuterJoin(self.clone(), right.into()))
    }

    pub fn cross_join(&self, right: impl Into<Table>) -> Table {
        Table::new(TableKind::CrossJoin(self.clone(), right.into()))
    }

    pub fn distinct(&self) -> Table {
        Table::new(TableKind::Distinct(self.clone()))
    }

    pub fn order_by(&self, exprs: impl IntoIterator<Item = Expr>) -> Table {
        Table::new(TableKind::OrderBy(
            self.clone(),
            exprs.into_iter().collect(),
        ))
    }

    /// Keep rows `first..afterlast`; stacked slices intersect.
    pub fn slice(&self, first: Option<i64>, afterlast: Option<i64>) -> Table {
        Table::new(TableKind::Slice {
            parent: self.clone(),
            first,
            afterlast,
        })
    }

    // scalar aspects

    pub fn all_value(&self) -> Expr {
        Expr::new(ExprKind::All(self.clone()))
    }

    pub fn any_value(&self) -> Expr {
        Expr::new(ExprKind::Any(self.clone()))
    }

    pub fn exists(&self) -> Expr {
        Expr::new(ExprKind::Exists(self.clone()))
    }

    pub fn not_exists(&self) -> Expr {
        self.exists().not()
    }

    pub fn count(&self) -> Expr {
        Expr::new(ExprKind::Count(self.clone()))
    }

    pub fn contains(&self, x: impl Into<Expr>) -> Expr {
        x.into().is_in(self.clone())
    }

    pub fn not_contains(&self, x: impl Into<Expr>) -> Expr {
        x.into().not_in(self.clone())
    }

    // mutation composites

    pub fn inserting<S: Into<String>, E: Into<Expr>>(
        &self,
        settings: impl IntoIterator<Item = (S, E)>,
    ) -> Table {
        Table::new(TableKind::Inserting(self.clone(), pairs(settings)))
    }

    pub fn updating_all<S: Into<String>, E: Into<Expr>>(
        &self,
        settings: impl IntoIterator<Item = (S, E)>,
    ) -> Table {
        Table::new(TableKind::UpdatingAll(self.clone(), pairs(settings)))
    }

    pub fn deleting_all(&self) -> Table {
        Table::new(TableKind::DeletingAll(self.clone()))
    }

    pub fn extending(&self, source: impl Into<Table>) -> Table {
        Table::new(TableKind::Extending(self.clone(), source.into()))
    }

    pub fn merging(&self, source: impl Into<Table>, inserting: Option<Table>) -> Table {
        Table::new(TableKind::Merging {
            target: self.clone(),
            source: source.into(),
            inserting,
        })
    }
}
