//! Table operator nodes.
//!
//! A table is a chain of operators over a root (`Primary` or `Union`). Chain
//! methods live in [crate::algebra::dsl]; this module is the node family the
//! composer walks.

use std::rc::Rc;

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::algebra::Expr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table(pub(crate) Rc<TableKind>);

impl Table {
    pub fn new(kind: TableKind) -> Self {
        Table(Rc::new(kind))
    }

    pub fn kind(&self) -> &TableKind {
        &self.0
    }

    /// A base table by name.
    pub fn primary(name: impl Into<String>) -> Self {
        Table::new(TableKind::Primary(name.into()))
    }
}

impl From<TableKind> for Table {
    fn from(kind: TableKind) -> Self {
        Table::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum TableKind {
    Primary(String),
    Union(Vec<Table>),
    /// Prefix item references with the principal source name.
    Qualify(Table),
    Alias(Table, String),
    /// Wrap into a derived table (a fresh SELECT scope).
    Nest(Table, Option<String>),
    Include(Table, Vec<String>),
    Exclude(Table, Vec<String>),
    /// `(old, new)` pairs.
    Rename(Table, Vec<(String, String)>),
    Define(Table, Vec<(String, Expr)>),
    /// Like `Define`, but the listed labels become the whole selection.
    Redefine(Table, Vec<(String, Expr)>),
    Where(Table, Expr),
    Group(Table, Vec<String>),
    /// Bind named parameters to expressions for the rest of the chain.
    Assign(Table, Vec<(String, Expr)>),
    Distinct(Table),
    OrderBy(Table, Vec<Expr>),
    Slice {
        parent: Table,
        first: Option<i64>,
        afterlast: Option<i64>,
    },
    InnerJoin(Table, Table),
    OuterJoin(Table, Table),
    CrossJoin(Table, Table),
    Inserting(Table, Vec<(String, Expr)>),
    UpdatingAll(Table, Vec<(String, Expr)>),
    DeletingAll(Table),
    /// Insert the rows of `source` into the parent table.
    Extending(Table, Table),
    Merging {
        target: Table,
        source: Table,
        inserting: Option<Table>,
    },
}
