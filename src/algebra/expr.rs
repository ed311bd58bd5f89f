//! Scalar expression nodes.

use std::rc::Rc;

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::algebra::Table;
use crate::nullable::Value;

/// A scalar expression. Cheap to clone; chain methods share subtrees with
/// their receiver rather than copying them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr(pub(crate) Rc<ExprKind>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Node identity, not structural equality. Chained operators keep their
    /// operands' identity, which the parenthesizer relies on to recognize
    /// left spines.
    pub(crate) fn same_node(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum ExprKind {
    /// A literal rendered into the SQL text.
    Constant(Value),
    /// A host-supplied runtime value; renders like a constant, but evaluators
    /// may treat it distinctly.
    Value(Value),
    /// A label in the current query scope.
    Item(String),
    /// A label in the enclosing query scope (correlated reference).
    HostItem(String),
    /// A named bind site.
    Parameter(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Cast {
        expr: Expr,
        ty: String,
    },
    /// Explicit grouping; blocks operator flattening and is never wrapped
    /// again.
    Parens(Expr),
    Neg(Expr),
    Pos(Expr),
    /// n-ary `+`.
    Summarize(Vec<Expr>),
    Sub(Expr, Expr),
    /// n-ary `*`.
    Multiply(Vec<Expr>),
    Div(Expr, Expr),
    Concat(Vec<Expr>),
    Comparison {
        op: CompareOp,
        left: Expr,
        right: Expr,
    },
    Between {
        expr: Expr,
        lo: Expr,
        hi: Expr,
    },
    IsNull(Expr),
    NotNull(Expr),
    IsIn {
        expr: Expr,
        set: Expr,
    },
    NotIn {
        expr: Expr,
        set: Expr,
    },
    Like {
        expr: Expr,
        pattern: Expr,
        escape: Option<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Expr),
    Case {
        cases: Vec<(Expr, Expr)>,
        otherwise: Option<Expr>,
    },
    Switch {
        on: Expr,
        cases: Vec<(Expr, Expr)>,
        otherwise: Option<Expr>,
    },
    /// A tuple of expressions, e.g. the right side of `IN`.
    List(Vec<Expr>),
    DateTimePart {
        date: Expr,
        part: DatePart,
    },
    /// Start of the period containing `date`, shifted by `offset` periods.
    PeriodStart {
        date: Expr,
        part: DatePart,
        offset: Expr,
    },
    /// `date` formatted as `YYYY<sep>MM<sep>DD`.
    DateText {
        date: Expr,
        sep: Expr,
    },
    /// `date` formatted as `HH<sep>MM<sep>SS`.
    TimeText {
        date: Expr,
        sep: Expr,
    },
    Now,
    NextVal(String),
    /// Scalar aspects of a table.
    All(Table),
    Any(Table),
    Exists(Table),
    Count(Table),
    /// A table composite in scalar position (a subquery value).
    Table(Table),
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Microsecond,
}

impl DatePart {
    pub fn keyword(&self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
            DatePart::Day => "DAY",
            DatePart::Hour => "HOUR",
            DatePart::Minute => "MINUTE",
            DatePart::Second => "SECOND",
            DatePart::Microsecond => "MICROSECOND",
        }
    }

    /// Field name for `DATE_TRUNC`-style period arithmetic.
    pub fn lower(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
            DatePart::Microsecond => "microsecond",
        }
    }
}
