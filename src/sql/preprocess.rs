//! Pre-walk over a model counting its composite sources.
//!
//! A query with a single source can leave item references bare; one with two
//! or more must qualify every reference uniquely. The count saturates at two
//! — beyond that the answer cannot change. A second `Group` anywhere counts
//! as an extra composite because composition nests before regrouping.

use crate::algebra::{Expr, ExprKind, Table, TableKind};

pub(super) fn has_many_composites_expr(expr: &Expr) -> bool {
    let mut scan = Scan::default();
    scan.expr(expr);
    scan.sofar > 1
}

pub(super) fn has_many_composites_table(table: &Table) -> bool {
    let mut scan = Scan::default();
    scan.composite(table);
    scan.sofar > 1
}

#[derive(Default)]
struct Scan {
    sofar: usize,
    grouped: bool,
}

impl Scan {
    fn saturated(&self) -> bool {
        self.sofar > 1
    }

    fn composite(&mut self, table: &Table) {
        if self.saturated() {
            return;
        }
        self.sofar += 1;
        self.table(table);
    }

    fn table(&mut self, table: &Table) {
        if self.saturated() {
            return;
        }
        match table.kind() {
            TableKind::Primary(_) => {}
            TableKind::Union(members) => {
                for m in members {
                    self.composite(m);
                }
            }
            TableKind::Qualify(parent)
            | TableKind::Alias(parent, _)
            | TableKind::Include(parent, _)
            | TableKind::Exclude(parent, _)
            | TableKind::Rename(parent, _)
            | TableKind::Distinct(parent)
            | TableKind::Slice { parent, .. }
            | TableKind::Assign(parent, _)
            | TableKind::DeletingAll(parent) => self.table(parent),
            TableKind::Nest(parent, _) => {
                self.table(parent);
                if !self.saturated() {
                    self.sofar += 1;
                }
            }
            TableKind::Group(parent, _) => {
                self.table(parent);
                if self.grouped {
                    self.sofar += 1;
                } else {
                    self.grouped = true;
                }
            }
            TableKind::Define(parent, defs) | TableKind::Redefine(parent, defs) => {
                self.table(parent);
                for (_, e) in defs {
                    self.expr(e);
                }
            }
            TableKind::Where(parent, predicate) => {
                self.table(parent);
                self.expr(predicate);
            }
            TableKind::OrderBy(parent, exprs) => {
                self.table(parent);
                for e in exprs {
                    self.expr(e);
                }
            }
            TableKind::InnerJoin(left, right)
            | TableKind::OuterJoin(left, right)
            | TableKind::CrossJoin(left, right) => {
                self.table(left);
                self.composite(right);
            }
            TableKind::Inserting(parent, settings) | TableKind::UpdatingAll(parent, settings) => {
                self.table(parent);
                for (_, e) in settings {
                    self.expr(e);
                }
            }
            TableKind::Extending(parent, source) => {
                self.table(parent);
                self.composite(source);
            }
            TableKind::Merging {
                target,
                source,
                inserting,
            } => {
                self.table(target);
                self.composite(source);
                if let Some(ins) = inserting {
                    self.composite(ins);
                }
            }
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for e in exprs {
            self.expr(e);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if self.saturated() {
            return;
        }
        match expr.kind() {
            ExprKind::All(t)
            | ExprKind::Any(t)
            | ExprKind::Exists(t)
            | ExprKind::Count(t)
            | ExprKind::Table(t) => self.composite(t),
            ExprKind::Constant(_)
            | ExprKind::Value(_)
            | ExprKind::Item(_)
            | ExprKind::HostItem(_)
            | ExprKind::Parameter(_)
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
                if let Some(e) = escape {
                    self.expr(e);
                }
            }
            ExprKind::Case { cases, otherwise } => {
                for (w, t) in cases {
                    self.expr(w);
                    self.expr(t);
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
                for (w, t) in cases {
                    self.expr(w);
                    self.expr(t);
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
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::dsl::{host_item, item, table};

    #[test]
    fn test_single_composites() {
        assert!(!has_many_composites_expr(&item("ITEM_ID")));
        assert!(!has_many_composites_table(&table("T")));
        assert!(!has_many_composites_table(
            &table("T").filter(item("ID").eq(101i64))
        ));
        assert!(!has_many_composites_expr(
            &crate::algebra::dsl::param("X")
        ));
    }

    #[test]
    fn test_joins_count() {
        let joined = table("ORDERS").inner_join(
            table("ITEM").filter(host_item("ITEM_ID").eq(item("ITEM_ID"))),
        );
        assert!(has_many_composites_table(&joined));

        let more = joined
            .outer_join(table("CATEGORY").filter(host_item("CATEGORY").eq(item("CATEGORY"))))
            .nest_as("yo");
        assert!(has_many_composites_table(&more));
    }

    #[test]
    fn test_nest_counts() {
        assert!(has_many_composites_table(&table("T").nest_as("x")));
        assert!(has_many_composites_table(
            &table("T").nest_as("x").nest_as("y").nest_as("z")
        ));
    }

    #[test]
    fn test_subquery_in_define_counts() {
        let t = table("T").define([("YX", table("Y").include(["X"]))]);
        assert!(has_many_composites_table(&t));
    }

    #[test]
    fn test_second_group_counts() {
        let once = table("T").group(["A"]);
        assert!(!has_many_composites_table(&once));
        let twice = once.group(["B"]);
        assert!(has_many_composites_table(&twice));
    }
}
