//! Feature map for SQL dialects.
//!
//! The default profile targets a generic, ANSI-leaning dialect; named profiles
//! override only the knobs their engine actually needs. Every knob is
//! independently toggleable, so tests and callers can tune a profile without
//! defining a new one.

use std::collections::HashMap;

use strum::VariantNames;

use crate::nullable::Value;

/// Rendering knobs. See [DialectName] for ready-made profiles.
#[derive(Debug, Clone)]
pub struct Dialect {
    /// Indentation unit for pretty output.
    pub tab: String,
    /// `FOR UPDATE`-style clause appended by locked emission.
    pub lock_select_ending: Option<String>,
    /// Table hint appended to the principal source under locked emission
    /// (`WITH (UPDLOCK)`).
    pub lock_table_ending: Option<String>,
    pub use_as_for_source_alias: bool,
    pub use_as_for_result_alias: bool,
    /// `JOIN … ON …` clauses; when off, joins render as comma sources with
    /// their predicates hoisted into `WHERE`.
    pub use_join_clause: bool,
    pub use_oracle_legacy_outer_join: bool,
    pub pagination: PaginationMode,
    pub bind_by_name: bool,
    pub param_prefix: String,
    pub concat_by_function: bool,
    pub concat_function_multiargs: bool,
    pub concat_operator: String,
    pub multi_columns_in: bool,
    pub now_text: String,
    /// `{}` is replaced by the sequence name; `None` means the dialect has no
    /// sequences.
    pub next_val_template: Option<String>,
    /// `TO_CHAR`-style function for datetime-to-text rendering.
    pub datetime_format_function: Option<String>,
    /// Route every qualifier through one global registry instead of
    /// per-scope ones.
    pub unique_qualifiers: bool,
    /// Overrides for type names in `CAST`.
    pub type_reprs: HashMap<String, String>,
    /// Override for constant rendering; return `None` to fall through to the
    /// default.
    pub const_repr: Option<fn(&Value) -> Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    LimitOffset,
    RowNum,
    AnalyticRowNumber,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            tab: "  ".to_string(),
            lock_select_ending: None,
            lock_table_ending: None,
            use_as_for_source_alias: false,
            use_as_for_result_alias: true,
            use_join_clause: true,
            use_oracle_legacy_outer_join: false,
            pagination: PaginationMode::LimitOffset,
            bind_by_name: true,
            param_prefix: ":".to_string(),
            concat_by_function: true,
            concat_function_multiargs: true,
            concat_operator: "||".to_string(),
            multi_columns_in: false,
            now_text: "CURRENT_TIMESTAMP".to_string(),
            next_val_template: Some("NEXT VALUE FOR {}".to_string()),
            datetime_format_function: Some("TO_CHAR".to_string()),
            unique_qualifiers: false,
            type_reprs: HashMap::new(),
            const_repr: None,
        }
    }
}

/// Named dialect profiles.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::EnumVariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum DialectName {
    Ansi,
    Generic,
    MsSql,
    MySql,
    Oracle,
    Postgres,
    SQLite,
}

impl Default for DialectName {
    fn default() -> Self {
        DialectName::Generic
    }
}

impl DialectName {
    pub fn profile(&self) -> Dialect {
        match self {
            DialectName::Ansi | DialectName::Generic => Dialect::default(),
            DialectName::MsSql => Dialect {
                param_prefix: "@".to_string(),
                concat_operator: "+".to_string(),
                now_text: "GETDATE()".to_string(),
                pagination: PaginationMode::AnalyticRowNumber,
                datetime_format_function: None,
                ..Dialect::default()
            },
            DialectName::MySql => Dialect {
                now_text: "NOW()".to_string(),
                next_val_template: None,
                datetime_format_function: None,
                ..Dialect::default()
            },
            DialectName::Oracle => Dialect {
                now_text: "SYSDATE".to_string(),
                next_val_template: Some("{}.NEXTVAL".to_string()),
                pagination: PaginationMode::RowNum,
                lock_select_ending: Some("FOR UPDATE".to_string()),
                ..Dialect::default()
            },
            DialectName::Postgres => Dialect {
                now_text: "NOW()".to_string(),
                next_val_template: Some("NEXTVAL('{}')".to_string()),
                lock_select_ending: Some("FOR UPDATE".to_string()),
                ..Dialect::default()
            },
            DialectName::SQLite => Dialect {
                concat_by_function: false,
                now_text: "DATETIME('now')".to_string(),
                next_val_template: None,
                datetime_format_function: None,
                ..Dialect::default()
            },
        }
    }

    pub fn names() -> &'static [&'static str] {
        DialectName::VARIANTS
    }
}
