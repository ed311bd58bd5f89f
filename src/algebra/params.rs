//! Free-parameter collection.
//!
//! Walks a model and reports the bind names a caller must supply. Names bound
//! by an `Assign` operator are satisfied inside that chain and are not free;
//! assignment values themselves are host-side and are not walked.

use std::collections::BTreeSet;

use crate::algebra::{Expr, ExprKind, Table, TableKind};

pub fn expr_params(expr: &Expr) -> BTreeSet<String> {
    let mut walker = Walker::default();
    walker.expr(expr);
    walker.params
}

pub fn table_params(table: &Table) -> BTreeSet<String> {
    let mut walker = Walker::default();
    walker.table(table);
    walker.params
}

#[derive(Default)]
struct Walker {
    params: BTreeSet<String>,
    bound: Vec<Vec<String>>,
}

impl Walker {
    fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().any(|names| names.iter().any(|n| n == name))
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for e in exprs {
            self.expr(e);
        }
    }

    fn bindings(&mut self, bindings: &[(String, Expr)]) {
        for (_, e) in bindings {
            self.expr(e);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr.kind() {
            ExprKind::Parameter(name) => {
                if !self.is_bound(name) {
                    self.params.insert(name.clone());
                }
            }
            ExprKind::Constant(_)
            | ExprKind::Value(_)
            | ExprKind::Item(_)
            | ExprKind::HostItem(_)
            | ExprKind::Now
            | ExprKind::NextVal(_) => {}
            ExprKind::Call { args, .. } => self.exprs(args),
            ExprKind::Cast { expr, .. } => self.expr(expr),
            ExprKind::Parens(x)
            | ExprKind::Neg(x)
            | ExprKind::Pos(x)
            | ExprKind::Not(x)
            | ExprKind::IsNull(x)
            | ExprKind::NotNull(x) => self.expr(x),
            ExprKind::Summarize(xs)
            | ExprKind::Multiply(xs)
            | ExprKind::Concat(xs)
            | ExprKind::And(xs)
            | ExprKind::Or(xs)
            | ExprKind::List(xs) => self.exprs(xs),
            ExprKind::Sub(a, b) | ExprKind::Div(a, b) => {
                self.expr(a);
                self.expr(b);
            }
            ExprKind::Comparison { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Between { expr, lo, hi } => {
                self.expr(expr);
                self.expr(lo);
                self.expr(hi);
            }
            ExprKind::IsIn { expr, set } | ExprKind::NotIn { expr, set } => {
                self.expr(expr);
                self.expr(set);
            }
            ExprKind::Like {
                expr,
                pattern,
                escape,
            } => {
                self.expr(expr);
                self.expr(pattern);
                if let Some(escape) = escape {
                    self.expr(escape);
                }
            }
            ExprKind::Case { cases, otherwise } => {
                for (when, then) in cases {
                    self.expr(when);
                    self.expr(then);
                }
                if let Some(e) = otherwise {
                    self.expr(e);
                }
            }
            ExprKind::Switch {
                on,
                cases,
                otherwise,
            } => {
                self.expr(on);
                for (when, then) in cases {
                    self.expr(when);
                    self.expr(then);
                }
                if let Some(e) = otherwise {
                    self.expr(e);
                }
            }
            ExprKind::DateTimePart { date, .. } => self.expr(date),
            ExprKind::PeriodStart { date, offset, .. } => {
                self.expr(date);
                self.expr(offset);
            }
            ExprKind::DateText { date, sep } | ExprKind::TimeText { date, sep } => {
                self.expr(date);
                self.expr(sep);
            }
            ExprKind::All(t) | ExprKind::Any(t) | ExprKind::Exists(t) | ExprKind::Count(t) => {
                self.table(t)
            }
            ExprKind::Table(t) => self.table(t),
        }
    }

    fn table(&mut self, table: &Table) {
        match table.kind() {
            TableKind::Primary(_) => {}
            TableKind::Union(members) => {
                for m in members {
                    self.table(m);
                }
            }
            TableKind::Qualify(parent)
            | TableKind::Distinct(parent)
            | TableKind::DeletingAll(parent)
            | TableKind::Alias(parent, _)
            | TableKind::Nest(parent, _)
            | TableKind::Include(parent, _)
            | TableKind::Exclude(parent, _)
            | TableKind::Rename(parent, _)
            | TableKind::Group(parent, _) => self.table(parent),
            TableKind::Define(parent, defs) | TableKind::Redefine(parent, defs) => {
                self.table(parent);
                self.bindings(defs);
            }
            TableKind::Where(parent, predicate) => {
                self.table(parent);
                self.expr(predicate);
            }
            TableKind::Assign(parent, bindings) => {
                self.bound
                    .push(bindings.iter().map(|(k, _)| k.clone()).collect());
                self.table(parent);
                self.bound.pop();
            }
            TableKind::OrderBy(parent, exprs) => {
                self.table(parent);
                self.exprs(exprs);
            }
            TableKind::Slice { parent, .. } => self.table(parent),
            TableKind::InnerJoin(left, right)
            | TableKind::OuterJoin(left, right)
            | TableKind::CrossJoin(left, right) => {
                self.table(left);
                self.table(right);
            }
            TableKind::Inserting(parent, settings)
            | TableKind::UpdatingAll(parent, settings) => {
                self.table(parent);
                self.bindings(settings);
            }
            TableKind::Extending(parent, source) => {
                self.table(parent);
                self.table(source);
            }
            TableKind::Merging {
                target,
                source,
                inserting,
            } => {
                self.table(target);
                self.table(source);
                if let Some(ins) = inserting {
                    self.table(ins);
                }
            }
        }
    }
}
