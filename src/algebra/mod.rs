//! The algebra: scalar expressions, table operators, and the builder DSL.
//!
//! Nodes are immutable values; chain methods return new nodes sharing their
//! argument subtrees. Construction never fails — misuse (duplicate binding
//! keys, unknown labels) surfaces when the tree is emitted.

pub mod dsl;
mod expr;
pub mod labels;
pub mod params;
mod table;

pub use dsl::Period;
pub use expr::{CompareOp, DatePart, Expr, ExprKind};
pub use table::{Table, TableKind};

use crate::error::{Error, Result};

pub fn json_of_expr(expr: &Expr) -> Result<String> {
    serde_json::to_string(expr).map_err(|e| Error::invalid_argument(e.to_string()))
}

pub fn expr_of_json(json: &str) -> Result<Expr> {
    serde_json::from_str(json).map_err(|e| Error::invalid_argument(e.to_string()))
}

pub fn json_of_table(table: &Table) -> Result<String> {
    serde_json::to_string(table).map_err(|e| Error::invalid_argument(e.to_string()))
}

pub fn table_of_json(json: &str) -> Result<Table> {
    serde_json::from_str(json).map_err(|e| Error::invalid_argument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::dsl::{item, table};
    use super::*;

    #[test]
    fn test_expr_json_roundtrip() {
        let e = (item("A") + item("B")).gt(100i64);
        let json = json_of_expr(&e).unwrap();
        let back = expr_of_json(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn test_table_json_roundtrip() {
        let t = table("T").include(["A", "B"]).filter(item("A").gt(1i64));
        let json = json_of_table(&t).unwrap();
        let back = table_of_json(&json).unwrap();
        assert_eq!(t, back);
    }
}
