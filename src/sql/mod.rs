//! SQL emission: walk an algebra value, produce a layout document, render it
//! in the configured dialect.

mod chain;
mod dialect;
mod gen_expr;
mod gen_query;
mod preprocess;

pub use dialect::{Dialect, DialectName, PaginationMode};

use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use crate::algebra::{Expr, Table};
use crate::error::{Error, Result};
use crate::layout::Doc;
use crate::template::Template;
use chain::{Chain, LayerKind, RootCtx};
use gen_expr::Env;
use gen_query::{render_content, Composer};

/// Source of root-table labels. Without one, a bare table selects `*`.
pub trait TableCatalog {
    fn table_labels(&self, table: &str) -> Option<Vec<String>>;
}

/// A stackable emitter overlay; see [SqlEmitter]'s builder methods.
#[derive(Debug, Clone)]
enum Decorator {
    Qualifying(String),
    Including(Vec<String>),
    Excluding(Vec<String>),
    Defining(Vec<(String, Expr)>),
    Renaming(Vec<(String, String)>),
    Substituting(Vec<(String, Expr)>),
}

/// The concrete emitter. Decorators stack lexically: the one applied last
/// intercepts first. A nested `SELECT` scope starts from a clean chain.
#[derive(Clone)]
pub struct SqlEmitter {
    pub dialect: Dialect,
    decorators: Vec<Decorator>,
    catalog: Option<Rc<dyn TableCatalog>>,
}

impl SqlEmitter {
    pub fn new(dialect: Dialect) -> Self {
        SqlEmitter {
            dialect,
            decorators: Vec::new(),
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Rc<dyn TableCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Prefix item references with `qualifier.`.
    pub fn qualifying(mut self, qualifier: impl Into<String>) -> Self {
        self.decorators.push(Decorator::Qualifying(qualifier.into()));
        self
    }

    /// Restrict visible items; anything else is a not-found error.
    pub fn including<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.decorators
            .push(Decorator::Including(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn excluding<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.decorators
            .push(Decorator::Excluding(names.into_iter().map(Into::into).collect()));
        self
    }

    /// Expand items inline by definition.
    pub fn defining<S: Into<String>, E: Into<Expr>>(
        mut self,
        defs: impl IntoIterator<Item = (S, E)>,
    ) -> Self {
        self.decorators
            .push(Decorator::Defining(crate::algebra::dsl::pairs(defs)));
        self
    }

    /// Emit the pre-rename name for renamed items.
    pub fn renaming<S: Into<String>, S2: Into<String>>(
        mut self,
        renamings: impl IntoIterator<Item = (S, S2)>,
    ) -> Self {
        self.decorators.push(Decorator::Renaming(
            renamings
                .into_iter()
                .map(|(o, n)| (o.into(), n.into()))
                .collect(),
        ));
        self
    }

    /// Expand parameters inline by substitution.
    pub fn substituting<S: Into<String>, E: Into<Expr>>(
        mut self,
        params: impl IntoIterator<Item = (S, E)>,
    ) -> Self {
        self.decorators
            .push(Decorator::Substituting(crate::algebra::dsl::pairs(params)));
        self
    }

    fn root_ctx(&self, qualify_free: bool) -> Rc<RootCtx> {
        Rc::new(RootCtx::new(
            self.dialect.clone(),
            qualify_free,
            self.catalog.clone(),
        ))
    }

    fn chain(&self) -> Chain {
        let mut chain = Chain::base();
        for decorator in &self.decorators {
            chain = chain.push(match decorator {
                Decorator::Qualifying(q) => LayerKind::Qualify(q.clone()),
                Decorator::Including(names) => LayerKind::Include(names.clone()),
                Decorator::Excluding(names) => LayerKind::Exclude(names.clone()),
                Decorator::Defining(defs) => LayerKind::Define(defs.clone()),
                Decorator::Renaming(renamings) => LayerKind::Rename(renamings.clone()),
                Decorator::Substituting(params) => LayerKind::ParamSubst(params.clone()),
            });
        }
        chain
    }

    /// Emit a scalar expression.
    pub fn emit_expr(&self, expr: &Expr) -> Result<Doc> {
        debug!("emitting expression");
        let root = self.root_ctx(!preprocess::has_many_composites_expr(expr));
        let env = Env {
            root: root.clone(),
            scope: None,
        };
        gen_expr::translate(expr, &self.chain(), &env)
    }

    /// Emit a table operator chain as a query or mutation statement.
    pub fn emit_table(&self, table: &Table) -> Result<Doc> {
        debug!("emitting table chain");
        let root = self.root_ctx(!preprocess::has_many_composites_table(table));
        let mut composer = Composer::for_guest(root.clone(), None);
        composer.apply(table)?;
        render_content(&composer.into_content(), &root)
    }

    /// Emit a query with the dialect's row-locking clauses: a select ending
    /// (`FOR UPDATE`) and/or a table hint on the principal source.
    pub fn emit_locked(&self, table: &Table) -> Result<Doc> {
        if self.dialect.lock_select_ending.is_none() && self.dialect.lock_table_ending.is_none() {
            return Err(Error::unsupported("row locking"));
        }
        let root = self.root_ctx(!preprocess::has_many_composites_table(table));
        root.locking.set(true);
        let mut composer = Composer::for_guest(root.clone(), None);
        composer.apply(table)?;
        let doc = render_content(&composer.into_content(), &root)?;
        Ok(match (&self.dialect.lock_select_ending, doc) {
            (Some(ending), Doc::Roster(mut items)) => {
                items.push(Doc::line([Doc::text(ending.clone())]));
                Doc::roster(items)
            }
            (Some(ending), doc) => Doc::roster(vec![doc, Doc::line([Doc::text(ending.clone())])]),
            (None, doc) => doc,
        })
    }

    /// Emit a query with its root clauses tagged, packaged as an editable
    /// template.
    pub fn emit_template(&self, table: &Table) -> Result<Template> {
        let root = self.root_ctx(!preprocess::has_many_composites_table(table));
        root.tag_root_clauses.set(true);
        let mut composer = Composer::for_guest(root.clone(), None);
        composer.apply(table)?;
        let doc = render_content(&composer.into_content(), &root)?;
        let (text, regions) = doc.pretty_tagged(&self.dialect.tab);
        let mut tags: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
        for region in regions {
            tags.entry(region.name).or_default().push((region.start, region.end));
        }
        Template::new(text, tags)
    }
}

/// Render a table chain as indented SQL in the given dialect.
pub fn compile(table: &Table, dialect: &Dialect) -> Result<String> {
    let emitter = SqlEmitter::new(dialect.clone());
    Ok(emitter.emit_table(table)?.pretty_with(&dialect.tab))
}

/// Render a scalar expression as SQL text.
pub fn compile_expr(expr: &Expr, dialect: &Dialect) -> Result<String> {
    let emitter = SqlEmitter::new(dialect.clone());
    Ok(emitter.emit_expr(expr)?.pretty_with(&dialect.tab))
}
