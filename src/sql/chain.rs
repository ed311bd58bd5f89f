//! The emitter decorator chain.
//!
//! Decorators compose lexically: each layer intercepts the node kinds it
//! cares about (items, parameters) and forwards everything else to the layer
//! beneath it. A chain is a persistent cons list, so capturing "the emitter
//! as of this point" — which `WHERE` and `ORDER BY` do — is a cheap clone,
//! and later layers never disturb captured ones.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::algebra::Expr;
use crate::sql::dialect::Dialect;
use crate::sql::TableCatalog;

/// Per-emission state shared by every scope of one model walk.
pub(super) struct RootCtx {
    pub dialect: Dialect,
    /// True when the model holds fewer than two composite sources, making
    /// qualification optional.
    pub qualify_free: bool,
    /// Registry of finalized top-level qualifiers.
    pub qualifiers: RefCell<HashSet<String>>,
    pub catalog: Option<Rc<dyn TableCatalog>>,
    /// Wrap the next rendered root query's clauses in layout tags.
    pub tag_root_clauses: Cell<bool>,
    /// Render with the dialect's locking hints.
    pub locking: Cell<bool>,
}

impl RootCtx {
    pub fn new(dialect: Dialect, qualify_free: bool, catalog: Option<Rc<dyn TableCatalog>>) -> Self {
        RootCtx {
            dialect,
            qualify_free,
            qualifiers: RefCell::new(HashSet::new()),
            catalog,
            tag_root_clauses: Cell::new(false),
            locking: Cell::new(false),
        }
    }
}

/// Shared state of one `SELECT` scope. Captured chains point here, so the
/// qualifier a scope settles on during finalization is visible to predicates
/// captured earlier.
pub(super) struct ScopeCtx {
    /// The enclosing scope, for correlated item references and qualifier
    /// uniquification.
    pub host: Option<HostLink>,
    pub qualifier: RefCell<Option<String>>,
    pub principal_alias: RefCell<Option<String>>,
    /// Base table name, when the principal source is one.
    pub principal_name: RefCell<Option<String>>,
    pub finalized: Cell<bool>,
    /// Qualifiers taken by guests of this scope.
    pub guests: RefCell<HashSet<String>>,
}

impl ScopeCtx {
    pub fn new(host: Option<HostLink>) -> Rc<Self> {
        Rc::new(ScopeCtx {
            host,
            qualifier: RefCell::new(None),
            principal_alias: RefCell::new(None),
            principal_name: RefCell::new(None),
            finalized: Cell::new(false),
            guests: RefCell::new(HashSet::new()),
        })
    }
}

/// A scope together with its decorator chain at a fixed point in time.
#[derive(Clone)]
pub(super) struct HostLink {
    pub scope: Rc<ScopeCtx>,
    pub chain: Chain,
}

#[derive(Clone)]
pub(super) struct Chain(Option<Rc<Layer>>);

pub(super) struct Layer {
    pub kind: LayerKind,
    pub next: Chain,
}

pub(super) enum LayerKind {
    /// Fixed-prefix qualification (`q.name`).
    Qualify(String),
    /// The base of a `SELECT` scope; qualifies through the scope state and
    /// routes host items outward.
    Scope(Rc<ScopeCtx>),
    Include(Vec<String>),
    Exclude(Vec<String>),
    /// Inline item definitions; `(name, expression)`.
    Define(Vec<(String, Expr)>),
    /// `(old, new)` pairs; item lookup maps new back to old.
    Rename(Vec<(String, String)>),
    /// Inline parameter substitutions.
    ParamSubst(Vec<(String, Expr)>),
}

impl Chain {
    pub fn base() -> Chain {
        Chain(None)
    }

    pub fn push(&self, kind: LayerKind) -> Chain {
        Chain(Some(Rc::new(Layer {
            kind,
            next: self.clone(),
        })))
    }

    pub fn top(&self) -> Option<&Layer> {
        self.0.as_deref()
    }

    /// The nearest scope layer, if any.
    pub fn scope(&self) -> Option<&Rc<ScopeCtx>> {
        let mut cur = self;
        while let Some(layer) = cur.top() {
            if let LayerKind::Scope(scope) = &layer.kind {
                return Some(scope);
            }
            cur = &layer.next;
        }
        None
    }
}
