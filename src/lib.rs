//! relq — build relational queries as values, render them as SQL.
//!
//! A host program composes a query or mutation as a tree of typed expression
//! and table operators, then renders that tree into a target dialect as a
//! pretty-printed string. relq is not a driver, not a parser of SQL text, and
//! not an ORM: it starts from an in-memory algebra and ends at SQL.
//!
//! You probably want to start with [sql::compile]. For more granular access:
//!
//! ```ascii
//!          algebra value
//!       (dsl, `From` impls)
//!               │
//!    emit_table │ emit_expr
//!               │
//!               ▼
//!          layout::Doc
//!               │
//!     compact │ pretty │ pretty_tagged
//!               ▼
//!        SQL text (+ tag map)
//! ```
//!
//! ```
//! use relq::algebra::dsl::{item, table};
//! use relq::sql::{compile, Dialect};
//!
//! let query = table("ITEMS")
//!     .include(["ID", "NAME", "PRICE"])
//!     .filter(item("PRICE").gt(100i64));
//! let sql = compile(&query, &Dialect::default()).unwrap();
//! assert!(sql.starts_with("SELECT"));
//! ```

pub mod algebra;
mod error;
pub mod layout;
pub mod nullable;
pub mod sql;
pub mod template;

pub use error::{Error, Reason, Result, WithErrorInfo};

pub use algebra::{Expr, Table};
pub use sql::{compile, compile_expr};
