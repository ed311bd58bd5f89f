//! Table-operator composition and query rendering.
//!
//! The composer walks a table chain and accumulates state into a per-SELECT
//! builder: principal source, labels, captured predicates, joins, grouping,
//! ordering, slicing. Rendering then lays the builder out clause by clause.
//! Predicates keep the decorator chain they were captured under, so a rename
//! or define applied later never rewrites an earlier filter.

use std::collections::HashSet;
use std::rc::Rc;

use itertools::Itertools;

use crate::algebra::{dsl, labels, Expr, Table, TableKind};
use crate::error::{Error, Result};
use crate::layout::Doc;
use crate::sql::chain::{Chain, HostLink, LayerKind, RootCtx, ScopeCtx};
use crate::sql::dialect::PaginationMode;
use crate::sql::gen_expr::{emit_part, Env};

pub(super) enum SqlContent {
    Select(Box<SqlSelect>),
    Union(SqlUnion),
    Command(SqlCommand),
}

pub(super) struct SqlSelect {
    pub scope: Rc<ScopeCtx>,
    pub current: Chain,
    labels: Option<Vec<String>>,
    aliasings: HashSet<String>,
    principal: Option<Principal>,
    joins: Vec<SqlJoin>,
    wheres: Vec<(Chain, Expr)>,
    group: Option<(Chain, Vec<String>)>,
    havings: Vec<(Chain, Expr)>,
    orderbys: Vec<(Chain, Expr)>,
    select_distinct: bool,
    first: Option<i64>,
    afterlast: Option<i64>,
    aspect: Option<Aspect>,
}

impl SqlSelect {
    fn new(host: Option<HostLink>) -> Self {
        let scope = ScopeCtx::new(host);
        let current = Chain::base().push(LayerKind::Scope(scope.clone()));
        SqlSelect {
            scope,
            current,
            labels: None,
            aliasings: HashSet::new(),
            principal: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            group: None,
            havings: Vec::new(),
            orderbys: Vec::new(),
            select_distinct: false,
            first: None,
            afterlast: None,
            aspect: None,
        }
    }

    fn is_fresh(&self) -> bool {
        self.principal.is_none()
            && self.labels.is_none()
            && self.joins.is_empty()
            && self.wheres.is_empty()
            && self.group.is_none()
    }
}

enum Principal {
    Table(String),
    Query(Box<SqlContent>),
}

pub(super) struct SqlUnion {
    members: Vec<SqlContent>,
}

pub(super) struct SqlJoin {
    kind: JoinKind,
    select: SqlSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Outer,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Aspect {
    Count,
}

pub(super) struct SqlCommand {
    kind: CommandKind,
    select: Box<SqlSelect>,
}

enum CommandKind {
    Insert(Vec<(String, Expr)>),
    UpdateAll(Vec<(String, Expr)>),
    DeleteAll,
    Extend(Box<SqlContent>),
    Merge {
        source: Box<SqlContent>,
        insert: Option<Vec<(String, Expr)>>,
    },
}

// --- composition ---

pub(super) struct Composer {
    root: Rc<RootCtx>,
    host: Option<HostLink>,
    content: SqlContent,
}

impl Composer {
    /// A composer for a scope nested in `host` (or a root scope when `None`).
    pub fn for_guest(root: Rc<RootCtx>, host: Option<HostLink>) -> Self {
        let content = SqlContent::Select(Box::new(SqlSelect::new(host.clone())));
        Composer {
            root,
            host,
            content,
        }
    }

    pub fn into_content(self) -> SqlContent {
        self.content
    }

    pub fn apply(&mut self, table: &Table) -> Result<()> {
        match table.kind() {
            TableKind::Primary(name) => self.primary(name),
            TableKind::Union(members) => self.union(members),
            TableKind::Qualify(parent) => {
                self.apply(parent)?;
                self.qualify()
            }
            TableKind::Alias(parent, alias) => {
                self.apply(parent)?;
                self.alias(alias)
            }
            TableKind::Nest(parent, alias) => {
                self.apply(parent)?;
                self.nest(alias.clone())
            }
            TableKind::Include(parent, names) => {
                self.apply(parent)?;
                self.include(names)
            }
            TableKind::Exclude(parent, names) => {
                self.apply(parent)?;
                self.exclude(names)
            }
            TableKind::Rename(parent, renamings) => {
                self.apply(parent)?;
                self.rename(renamings)
            }
            TableKind::Define(parent, defs) => {
                self.apply(parent)?;
                self.define(defs, false)
            }
            TableKind::Redefine(parent, defs) => {
                self.apply(parent)?;
                self.define(defs, true)
            }
            TableKind::Where(parent, predicate) => {
                self.apply(parent)?;
                self.filter(predicate)
            }
            TableKind::Group(parent, names) => {
                self.apply(parent)?;
                self.group(names)
            }
            TableKind::Assign(parent, bindings) => {
                self.apply(parent)?;
                self.assign(bindings)
            }
            TableKind::Distinct(parent) => {
                self.apply(parent)?;
                self.distinct()
            }
            TableKind::OrderBy(parent, exprs) => {
                self.apply(parent)?;
                self.order_by(exprs)
            }
            TableKind::Slice {
                parent,
                first,
                afterlast,
            } => {
                self.apply(parent)?;
                self.slice(*first, *afterlast)
            }
            TableKind::InnerJoin(left, right) => {
                self.apply(left)?;
                self.join(JoinKind::Inner, right)
            }
            TableKind::OuterJoin(left, right) => {
                self.apply(left)?;
                self.join(JoinKind::Outer, right)
            }
            TableKind::CrossJoin(left, right) => {
                self.apply(left)?;
                self.join(JoinKind::Cross, right)
            }
            TableKind::Inserting(parent, settings) => {
                self.apply(parent)?;
                labels::check_bindings(settings)?;
                self.into_command(CommandKind::Insert(settings.clone()))
            }
            TableKind::UpdatingAll(parent, settings) => {
                self.apply(parent)?;
                labels::check_bindings(settings)?;
                self.into_command(CommandKind::UpdateAll(settings.clone()))
            }
            TableKind::DeletingAll(parent) => {
                self.apply(parent)?;
                self.into_command(CommandKind::DeleteAll)
            }
            TableKind::Extending(parent, source) => {
                self.apply(parent)?;
                let source = self.subcontent(source)?;
                self.into_command(CommandKind::Extend(Box::new(source)))
            }
            TableKind::Merging {
                target,
                source,
                inserting,
            } => {
                self.apply(target)?;
                let source = self.subcontent(source)?;
                let insert = match inserting {
                    None => None,
                    Some(ins) => Some(self.merge_insert_settings(ins)?),
                };
                self.into_command(CommandKind::Merge {
                    source: Box::new(source),
                    insert,
                })
            }
        }
    }

    pub fn set_aspect(&mut self, aspect: Aspect) -> Result<()> {
        if matches!(self.content, SqlContent::Union(_)) {
            self.nest(None)?;
        }
        let select = self.select_mut("an aggregate aspect")?;
        select.aspect = Some(aspect);
        Ok(())
    }

    fn select_mut(&mut self, op: &str) -> Result<&mut SqlSelect> {
        match &mut self.content {
            SqlContent::Select(select) => Ok(select),
            SqlContent::Union(_) => Err(Error::unsupported(format!(
                "{op} directly on a union; nest it first"
            ))),
            SqlContent::Command(_) => Err(Error::invalid_argument(format!(
                "cannot apply {op} to a finished mutation"
            ))),
        }
    }

    fn labels_now(&self) -> Option<Vec<String>> {
        match &self.content {
            SqlContent::Select(select) => select_labels(select, &self.root),
            SqlContent::Union(u) => union_labels(u, &self.root),
            SqlContent::Command(_) => None,
        }
    }

    /// Compose a sibling table into its own content, sharing this composer's
    /// host scope.
    fn subcontent(&self, table: &Table) -> Result<SqlContent> {
        let mut sub = Composer::for_guest(self.root.clone(), self.host.clone());
        sub.apply(table)?;
        Ok(sub.into_content())
    }

    fn primary(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("empty table name is not allowed"));
        }
        let select = self.select_mut("a principal source")?;
        if select.principal.is_some() {
            return Err(Error::invalid_argument(
                "principal source is already set for this scope",
            ));
        }
        select.principal = Some(Principal::Table(name.to_string()));
        *select.scope.principal_name.borrow_mut() = Some(name.to_string());
        Ok(())
    }

    fn qualify(&mut self) -> Result<()> {
        let select = self.select_mut("qualify")?;
        ensure_qualifier(&select.scope)
    }

    fn alias(&mut self, alias: &str) -> Result<()> {
        let select = self.select_mut("alias")?;
        *select.scope.qualifier.borrow_mut() = Some(alias.to_string());
        *select.scope.principal_alias.borrow_mut() = Some(alias.to_string());
        Ok(())
    }

    /// Wrap the current content into a fresh outer scope.
    fn nest(&mut self, alias: Option<String>) -> Result<()> {
        if matches!(self.content, SqlContent::Command(_)) {
            return Err(Error::invalid_argument("cannot nest a finished mutation"));
        }
        let outer = SqlSelect::new(self.host.clone());
        let inner = std::mem::replace(&mut self.content, SqlContent::Select(Box::new(outer)));
        let alias = alias.unwrap_or_else(|| alias_proposal(&inner));
        if let SqlContent::Select(outer) = &mut self.content {
            outer.principal = Some(Principal::Query(Box::new(inner)));
            *outer.scope.qualifier.borrow_mut() = Some(alias.clone());
            *outer.scope.principal_alias.borrow_mut() = Some(alias);
        }
        Ok(())
    }

    fn include(&mut self, names: &[String]) -> Result<()> {
        if let Some(current) = self.labels_now() {
            labels::check_labels(&current, names)?;
        }
        let select = self.select_mut("include")?;
        select.labels = Some(names.to_vec());
        Ok(())
    }

    fn exclude(&mut self, names: &[String]) -> Result<()> {
        let current = self.labels_now().ok_or_else(|| {
            Error::invalid_argument("cannot exclude from a source with unknown labels")
        })?;
        labels::check_labels(&current, names)?;
        let select = self.select_mut("exclude")?;
        select.labels = Some(
            current
                .into_iter()
                .filter(|n| !names.contains(n))
                .collect(),
        );
        Ok(())
    }

    fn rename(&mut self, renamings: &[(String, String)]) -> Result<()> {
        let current = self.labels_now().ok_or_else(|| {
            Error::invalid_argument("cannot rename labels of a source with unknown labels")
        })?;
        let renamed = labels::renamed_labels(&current, renamings)?;
        let select = self.select_mut("rename")?;
        select.current = select.current.push(LayerKind::Rename(renamings.to_vec()));
        select.labels = Some(renamed);
        select
            .aliasings
            .extend(renamings.iter().map(|(_, new)| new.clone()));
        Ok(())
    }

    fn define(&mut self, defs: &[(String, Expr)], redefine: bool) -> Result<()> {
        labels::check_bindings(defs)?;
        let new_labels = if redefine {
            defs.iter().map(|(k, _)| k.clone()).collect()
        } else {
            let current = self.labels_now().ok_or_else(|| {
                Error::invalid_argument("cannot determine the labels this define extends")
            })?;
            labels::defined_labels(&current, defs)
        };
        let select = self.select_mut("define")?;
        select.current = select.current.push(LayerKind::Define(defs.to_vec()));
        select.labels = Some(new_labels);
        select.aliasings.extend(defs.iter().map(|(k, _)| k.clone()));
        Ok(())
    }

    fn filter(&mut self, predicate: &Expr) -> Result<()> {
        let select = self.select_mut("a predicate")?;
        let captured = (select.current.clone(), predicate.clone());
        if select.group.is_none() {
            select.wheres.push(captured);
        } else {
            select.havings.push(captured);
        }
        Ok(())
    }

    fn group(&mut self, names: &[String]) -> Result<()> {
        if matches!(&self.content, SqlContent::Select(s) if s.group.is_some()) {
            // regrouping a grouped query nests it first
            self.nest(None)?;
        }
        let select = self.select_mut("group")?;
        select.group = Some((select.current.clone(), names.to_vec()));
        select.labels = Some(names.to_vec());
        Ok(())
    }

    fn assign(&mut self, bindings: &[(String, Expr)]) -> Result<()> {
        labels::check_bindings(bindings)?;
        let select = self.select_mut("assign")?;
        select.current = select.current.push(LayerKind::ParamSubst(bindings.to_vec()));
        Ok(())
    }

    fn distinct(&mut self) -> Result<()> {
        let select = self.select_mut("distinct")?;
        if select.first.is_some() || select.afterlast.is_some() {
            return Err(Error::invalid_argument("cannot distinct a sliced query"));
        }
        select.select_distinct = true;
        Ok(())
    }

    fn order_by(&mut self, exprs: &[Expr]) -> Result<()> {
        let select = self.select_mut("order by")?;
        for e in exprs {
            select.orderbys.push((select.current.clone(), e.clone()));
        }
        Ok(())
    }

    fn slice(&mut self, mut first: Option<i64>, mut afterlast: Option<i64>) -> Result<()> {
        let select = self.select_mut("slice")?;
        if select.select_distinct {
            return Err(Error::invalid_argument("cannot slice a distinct query"));
        }
        if let Some(base) = select.first {
            // stacked slices compose: shift into the current window, then
            // take the tighter end
            if let Some(f) = first.as_mut() {
                *f += base;
            }
            if let Some(a) = afterlast.as_mut() {
                *a += base;
            }
        }
        if first.is_some() {
            select.first = first;
        }
        if let Some(a) = afterlast {
            select.afterlast = Some(select.afterlast.map_or(a, |cur| cur.min(a)));
        }
        Ok(())
    }

    fn union(&mut self, members: &[Table]) -> Result<()> {
        match &self.content {
            SqlContent::Select(s) if s.is_fresh() => {}
            _ => {
                return Err(Error::invalid_argument(
                    "a union must be the root of its chain",
                ))
            }
        }
        let members: Vec<SqlContent> = members
            .iter()
            .map(|m| self.subcontent(m))
            .try_collect()?;
        self.content = SqlContent::Union(SqlUnion { members });
        Ok(())
    }

    fn join(&mut self, kind: JoinKind, right: &Table) -> Result<()> {
        let link = {
            let select = self.select_mut("a join")?;
            HostLink {
                scope: select.scope.clone(),
                chain: select.current.clone(),
            }
        };
        let mut sub = Composer::for_guest(self.root.clone(), Some(link));
        sub.apply(right)?;
        let right = match sub.into_content() {
            SqlContent::Select(s) => {
                if !s.joins.is_empty() {
                    return Err(Error::invalid_argument(
                        "the right side of a join cannot contain joins itself; nest it first",
                    ));
                }
                *s
            }
            _ => {
                return Err(Error::invalid_argument(
                    "the right side of a join must be a simple source; nest it first",
                ))
            }
        };
        let select = self.select_mut("a join")?;
        select.joins.push(SqlJoin { kind, select: right });
        Ok(())
    }

    fn into_command(&mut self, kind: CommandKind) -> Result<()> {
        let placeholder = SqlContent::Select(Box::new(SqlSelect::new(None)));
        match std::mem::replace(&mut self.content, placeholder) {
            SqlContent::Select(select) => {
                self.content = SqlContent::Command(SqlCommand { kind, select });
                Ok(())
            }
            other => {
                self.content = other;
                Err(Error::invalid_argument(
                    "a mutation requires a plain query to operate on",
                ))
            }
        }
    }

    fn merge_insert_settings(&self, inserting: &Table) -> Result<Vec<(String, Expr)>> {
        match self.subcontent(inserting)? {
            SqlContent::Command(SqlCommand {
                kind: CommandKind::Insert(settings),
                ..
            }) => Ok(settings),
            _ => Err(Error::invalid_argument(
                "the insert arm of a merge must be an inserting composite",
            )),
        }
    }
}

fn alias_proposal(content: &SqlContent) -> String {
    match content {
        SqlContent::Select(select) => match select.scope.principal_name.borrow().as_ref() {
            Some(name) => name.clone(),
            None => match &select.principal {
                Some(Principal::Query(inner)) => alias_proposal(inner),
                _ => "t".to_string(),
            },
        },
        _ => "t".to_string(),
    }
}

fn select_labels(select: &SqlSelect, root: &Rc<RootCtx>) -> Option<Vec<String>> {
    if let Some(labels) = &select.labels {
        return Some(labels.clone());
    }
    match &select.principal {
        Some(Principal::Table(name)) => root
            .catalog
            .as_ref()
            .and_then(|c| c.table_labels(name)),
        Some(Principal::Query(inner)) => content_labels(inner, root),
        None => None,
    }
}

fn union_labels(u: &SqlUnion, root: &Rc<RootCtx>) -> Option<Vec<String>> {
    u.members.first().and_then(|m| content_labels(m, root))
}

fn content_labels(content: &SqlContent, root: &Rc<RootCtx>) -> Option<Vec<String>> {
    match content {
        SqlContent::Select(select) => select_labels(select, root),
        SqlContent::Union(u) => union_labels(u, root),
        SqlContent::Command(_) => None,
    }
}

// --- qualifier finalization ---

fn ensure_qualifier(scope: &Rc<ScopeCtx>) -> Result<()> {
    if scope.qualifier.borrow().is_some() {
        return Ok(());
    }
    let name = scope.principal_name.borrow().clone().ok_or_else(|| {
        Error::invalid_argument("cannot qualify a source without a base table or an alias")
    })?;
    *scope.qualifier.borrow_mut() = Some(name);
    Ok(())
}

pub(super) fn finalize_scope(scope: &Rc<ScopeCtx>, root: &Rc<RootCtx>) -> Result<()> {
    if scope.finalized.get() {
        return Ok(());
    }
    match scope.host.clone() {
        None => finalize_in_root(scope, root)?,
        Some(link) => finalize_guest(&link.scope, scope, root)?,
    }
    scope.finalized.set(true);
    Ok(())
}

fn finalize_in_root(scope: &Rc<ScopeCtx>, root: &Rc<RootCtx>) -> Result<()> {
    if root.qualify_free {
        return Ok(());
    }
    ensure_qualifier(scope)?;
    let qualifier = scope.qualifier.borrow().clone().unwrap_or_default();
    let unique = {
        let taken = root.qualifiers.borrow();
        uniquify(&qualifier, |cand| taken.contains(cand))
    };
    commit_qualifier(scope, &qualifier, &unique);
    root.qualifiers.borrow_mut().insert(unique);
    Ok(())
}

fn finalize_guest(host: &Rc<ScopeCtx>, guest: &Rc<ScopeCtx>, root: &Rc<RootCtx>) -> Result<()> {
    finalize_scope(host, root)?;
    if root.qualify_free {
        return Ok(());
    }
    if root.dialect.unique_qualifiers {
        return finalize_in_root(guest, root);
    }
    ensure_qualifier(guest)?;
    let qualifier = guest.qualifier.borrow().clone().unwrap_or_default();
    let unique = {
        let host_qualifier = host.qualifier.borrow();
        let taken = host.guests.borrow();
        uniquify(&qualifier, |cand| {
            taken.contains(cand) || host_qualifier.as_deref() == Some(cand)
        })
    };
    commit_qualifier(guest, &qualifier, &unique);
    host.guests.borrow_mut().insert(unique);
    Ok(())
}

fn commit_qualifier(scope: &Rc<ScopeCtx>, original: &str, unique: &str) {
    if unique != original {
        *scope.qualifier.borrow_mut() = Some(unique.to_string());
        *scope.principal_alias.borrow_mut() = Some(unique.to_string());
    }
}

/// Collision suffixing: `_N` with N counting from 2, the separator omitted
/// when the qualifier already ends in a digit.
fn uniquify(qualifier: &str, collides: impl Fn(&str) -> bool) -> String {
    if !collides(qualifier) {
        return qualifier.to_string();
    }
    let sep = if qualifier.ends_with(|c: char| c.is_ascii_digit()) {
        ""
    } else {
        "_"
    };
    let mut index = 2;
    loop {
        let candidate = format!("{qualifier}{sep}{index}");
        if !collides(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

// --- rendering ---

pub(super) fn render_content(content: &SqlContent, root: &Rc<RootCtx>) -> Result<Doc> {
    match content {
        SqlContent::Select(select) => render_select(select, root),
        SqlContent::Union(u) => render_union(u, root),
        SqlContent::Command(c) => render_command(c, root),
    }
}

fn render_union(u: &SqlUnion, root: &Rc<RootCtx>) -> Result<Doc> {
    let mut items = Vec::new();
    for member in &u.members {
        if !items.is_empty() {
            items.push(Doc::line([Doc::text("UNION ALL")]));
        }
        items.push(render_content(member, root)?);
    }
    Ok(Doc::roster(items))
}

enum PaginationWrap {
    RowNum { first: i64, afterlast: Option<i64> },
    Analytic { first: Option<i64>, afterlast: Option<i64> },
}

fn render_select(select: &SqlSelect, root: &Rc<RootCtx>) -> Result<Doc> {
    finalize_scope(&select.scope, root)?;
    let env = Env {
        root: root.clone(),
        scope: Some(HostLink {
            scope: select.scope.clone(),
            chain: select.current.clone(),
        }),
    };
    let dialect = &root.dialect;
    let tagging = root.tag_root_clauses.replace(false);
    let mut roster: Vec<Doc> = Vec::new();

    let push_clause = |roster: &mut Vec<Doc>, tag: &str, title: &str, content: Vec<Doc>| {
        let content = if tagging {
            vec![Doc::tag(tag, Doc::roster(content))]
        } else {
            content
        };
        roster.push(Doc::titled(title, content));
    };

    // selection
    let title = if select.select_distinct {
        "SELECT DISTINCT"
    } else {
        "SELECT"
    };
    let mut items: Vec<Doc> = Vec::new();
    if select.aspect == Some(Aspect::Count) {
        items.push(Doc::line([Doc::text("COUNT(*)")]));
    } else if let Some(names) = select_labels(select, root) {
        for name in &names {
            let doc = emit_part(&dsl::item(name.clone()), &select.current, &env)?;
            items.push(if select.aliasings.contains(name) {
                if dialect.use_as_for_result_alias {
                    Doc::line([
                        doc,
                        Doc::text(" "),
                        Doc::text("AS"),
                        Doc::text(" "),
                        Doc::text(name),
                    ])
                } else {
                    Doc::line([doc, Doc::text(" "), Doc::text(name)])
                }
            } else {
                Doc::line([doc])
            });
        }
    }
    if items.is_empty() {
        items.push(Doc::line([Doc::text("*")]));
    }
    push_clause(&mut roster, "select", title, vec![Doc::list(",", items)]);

    // legacy outer joins would need predicate-side markers
    if !dialect.use_join_clause
        && select.joins.iter().any(|j| j.kind == JoinKind::Outer)
    {
        return Err(Error::unsupported(if dialect.use_oracle_legacy_outer_join {
            "legacy (+) outer joins"
        } else {
            "outer joins without join clauses"
        }));
    }

    // sources
    let mut sources: Vec<Doc> = Vec::new();
    if let Some(line) = principal_source(select, root)? {
        sources.push(line);
    }
    if !dialect.use_join_clause {
        for join in &select.joins {
            finalize_scope(&join.select.scope, root)?;
            if let Some(line) = principal_source(&join.select, root)? {
                sources.push(line);
            }
        }
    }
    let mut from_content: Vec<Doc> = Vec::new();
    if !sources.is_empty() {
        from_content.push(Doc::list(",", sources));
    }
    if dialect.use_join_clause {
        for join in &select.joins {
            from_content.push(join_clause(join, root)?);
        }
    }
    if !from_content.is_empty() {
        push_clause(&mut roster, "from", "FROM", from_content);
    }

    // slicing plan; a ROWNUM window without an offset is a plain predicate
    let mut slice_predicate: Option<Doc> = None;
    let mut tail: Vec<Doc> = Vec::new();
    let mut wrap: Option<PaginationWrap> = None;
    let first = select.first.unwrap_or(0);
    if first > 0 || select.afterlast.is_some() {
        match dialect.pagination {
            PaginationMode::LimitOffset => {
                if let Some(afterlast) = select.afterlast {
                    tail.push(Doc::line([Doc::text(format!("LIMIT {}", afterlast - first))]));
                }
                if first > 0 {
                    tail.push(Doc::line([Doc::text(format!("OFFSET {first}"))]));
                }
            }
            PaginationMode::RowNum => {
                if first == 0 {
                    if let Some(afterlast) = select.afterlast {
                        slice_predicate =
                            Some(Doc::line([Doc::text(format!("ROWNUM <= {afterlast}"))]));
                    }
                } else {
                    wrap = Some(PaginationWrap::RowNum {
                        first,
                        afterlast: select.afterlast,
                    });
                }
            }
            PaginationMode::AnalyticRowNumber => {
                wrap = Some(PaginationWrap::Analytic {
                    first: select.first,
                    afterlast: select.afterlast,
                });
            }
        }
    }

    // predicates, with comma-join and cross-join conditions hoisted in
    let mut wheres: Vec<Doc> = select
        .wheres
        .iter()
        .map(|(chain, pred)| emit_part(pred, chain, &env))
        .try_collect()?;
    for join in &select.joins {
        if join.kind == JoinKind::Cross || !dialect.use_join_clause {
            wheres.extend(join_predicates(join, root)?);
        }
    }
    wheres.extend(slice_predicate);
    if !wheres.is_empty() {
        push_clause(&mut roster, "where", "WHERE", vec![Doc::list("AND", wheres)]);
    }

    // grouping
    if let Some((chain, names)) = &select.group {
        let docs: Vec<Doc> = names
            .iter()
            .map(|n| emit_part(&dsl::item(n.clone()), chain, &env))
            .try_collect()?;
        push_clause(&mut roster, "group by", "GROUP BY", vec![Doc::list(",", docs)]);
    }
    if !select.havings.is_empty() {
        let docs: Vec<Doc> = select
            .havings
            .iter()
            .map(|(chain, pred)| emit_part(pred, chain, &env))
            .try_collect()?;
        push_clause(&mut roster, "having", "HAVING", vec![Doc::list("AND", docs)]);
    }

    // ordering
    if !select.orderbys.is_empty() {
        let docs: Vec<Doc> = select
            .orderbys
            .iter()
            .map(|(chain, e)| emit_part(e, chain, &env))
            .try_collect()?;
        push_clause(&mut roster, "order by", "ORDER BY", vec![Doc::list(",", docs)]);
    }

    roster.extend(tail);
    let doc = Doc::roster(roster);
    Ok(match wrap {
        Some(plan) => wrap_for_pagination(doc, plan),
        None => doc,
    })
}

fn principal_source(select: &SqlSelect, root: &Rc<RootCtx>) -> Result<Option<Doc>> {
    let dialect = &root.dialect;
    let suffix = select.scope.principal_alias.borrow().clone().map(|a| {
        if dialect.use_as_for_source_alias {
            format!(" AS {a}")
        } else {
            format!(" {a}")
        }
    });
    match &select.principal {
        None => Ok(None),
        Some(Principal::Table(name)) => {
            let mut words = vec![Doc::text(name)];
            if let Some(suffix) = suffix {
                words.push(Doc::text(suffix));
            }
            if root.locking.get() {
                if let Some(hint) = &dialect.lock_table_ending {
                    words.push(Doc::text(format!(" {hint}")));
                }
            }
            Ok(Some(Doc::line(words)))
        }
        Some(Principal::Query(inner)) => {
            let inner = render_content(inner, root)?;
            let suffix = suffix
                .ok_or_else(|| Error::new_assert("derived principal source without an alias"))?;
            Ok(Some(Doc::line([
                Doc::scope("(", ")", vec![inner]),
                Doc::text(suffix),
            ])))
        }
    }
}

fn join_clause(join: &SqlJoin, root: &Rc<RootCtx>) -> Result<Doc> {
    finalize_scope(&join.select.scope, root)?;
    let prefix = match join.kind {
        JoinKind::Inner => "JOIN",
        JoinKind::Outer => "LEFT OUTER JOIN",
        JoinKind::Cross => "CROSS JOIN",
    };
    let source = principal_source(&join.select, root)?
        .ok_or_else(|| Error::new_assert("join without a principal source"))?;
    let mut words = vec![Doc::text(prefix), Doc::text(" "), source];
    if join.kind != JoinKind::Cross {
        let predicates = join_predicates(join, root)?;
        if !predicates.is_empty() {
            words.push(Doc::text(" "));
            words.push(Doc::text("ON"));
            words.push(Doc::text(" "));
            words.push(Doc::join(" AND ", predicates));
        }
    }
    Ok(Doc::line(words))
}

fn join_predicates(join: &SqlJoin, root: &Rc<RootCtx>) -> Result<Vec<Doc>> {
    let env = Env {
        root: root.clone(),
        scope: Some(HostLink {
            scope: join.select.scope.clone(),
            chain: join.select.current.clone(),
        }),
    };
    join.select
        .wheres
        .iter()
        .map(|(chain, pred)| emit_part(pred, chain, &env))
        .try_collect()
}

fn wrap_for_pagination(inner: Doc, plan: PaginationWrap) -> Doc {
    let derived = |inner: Doc, extra_item: Doc, where_line: Option<Doc>| {
        let mut roster = vec![
            Doc::titled(
                "SELECT",
                vec![Doc::list(
                    ",",
                    vec![Doc::line([Doc::text("q.*")]), Doc::line([extra_item])],
                )],
            ),
            Doc::titled(
                "FROM",
                vec![Doc::line([
                    Doc::scope("(", ")", vec![inner]),
                    Doc::text(" q"),
                ])],
            ),
        ];
        if let Some(line) = where_line {
            roster.push(Doc::titled("WHERE", vec![line]));
        }
        Doc::roster(roster)
    };
    let outer = |numbered: Doc, predicates: Vec<Doc>| {
        Doc::roster(vec![
            Doc::titled("SELECT", vec![Doc::line([Doc::text("*")])]),
            Doc::titled(
                "FROM",
                vec![Doc::line([
                    Doc::scope("(", ")", vec![numbered]),
                    Doc::text(" n"),
                ])],
            ),
            Doc::titled("WHERE", vec![Doc::list("AND", predicates)]),
        ])
    };
    match plan {
        PaginationWrap::RowNum { first, afterlast } => {
            let bound = afterlast
                .map(|hi| Doc::line([Doc::text(format!("ROWNUM <= {hi}"))]));
            let numbered = derived(inner, Doc::text("ROWNUM RN"), bound);
            outer(
                numbered,
                vec![Doc::line([Doc::text(format!("RN > {first}"))])],
            )
        }
        PaginationWrap::Analytic { first, afterlast } => {
            let numbered = derived(inner, Doc::text("ROW_NUMBER() OVER () RN"), None);
            let mut predicates = Vec::new();
            if let Some(first) = first {
                if first > 0 {
                    predicates.push(Doc::line([Doc::text(format!("RN > {first}"))]));
                }
            }
            if let Some(afterlast) = afterlast {
                predicates.push(Doc::line([Doc::text(format!("RN <= {afterlast}"))]));
            }
            outer(numbered, predicates)
        }
    }
}

fn render_command(command: &SqlCommand, root: &Rc<RootCtx>) -> Result<Doc> {
    let select = &command.select;
    finalize_scope(&select.scope, root)?;
    let env = Env {
        root: root.clone(),
        scope: Some(HostLink {
            scope: select.scope.clone(),
            chain: select.current.clone(),
        }),
    };
    let name = match &select.principal {
        Some(Principal::Table(name)) => name.clone(),
        _ => {
            return Err(Error::invalid_argument(
                "a mutation requires a base table as its principal source",
            ))
        }
    };

    let where_section = |roster: &mut Vec<Doc>| -> Result<()> {
        if select.wheres.is_empty() {
            return Ok(());
        }
        let docs: Vec<Doc> = select
            .wheres
            .iter()
            .map(|(chain, pred)| emit_part(pred, chain, &env))
            .try_collect()?;
        roster.push(Doc::titled("WHERE", vec![Doc::list("AND", docs)]));
        Ok(())
    };

    let name_scope = |names: Vec<String>| {
        Doc::scope(
            "(",
            ")",
            vec![Doc::list(
                ",",
                names.iter().map(|k| Doc::line([Doc::text(k)])).collect(),
            )],
        )
    };
    let column_scope =
        |settings: &[(String, Expr)]| name_scope(settings.iter().map(|(k, _)| k.clone()).collect());
    let value_scope = |settings: &[(String, Expr)]| -> Result<Doc> {
        let values: Vec<Doc> = settings
            .iter()
            .map(|(_, v)| emit_part(v, &select.current, &env).map(|d| Doc::line([d])))
            .try_collect()?;
        Ok(Doc::scope("(", ")", vec![Doc::list(",", values)]))
    };

    match &command.kind {
        CommandKind::Insert(settings) => {
            let roster = vec![
                Doc::line([
                    Doc::text("INSERT INTO"),
                    Doc::text(" "),
                    Doc::text(&name),
                    Doc::text(" "),
                    column_scope(settings),
                ]),
                Doc::line([
                    Doc::text("VALUES"),
                    Doc::text(" "),
                    value_scope(settings)?,
                ]),
            ];
            Ok(Doc::roster(roster))
        }
        CommandKind::UpdateAll(settings) => {
            let assignments: Vec<Doc> = settings
                .iter()
                .map(|(k, v)| {
                    emit_part(v, &select.current, &env)
                        .map(|d| Doc::line([Doc::text(k), Doc::text(" = "), d]))
                })
                .try_collect()?;
            let mut roster = vec![
                Doc::line([Doc::text("UPDATE"), Doc::text(" "), Doc::text(&name)]),
                Doc::titled("SET", vec![Doc::list(",", assignments)]),
            ];
            where_section(&mut roster)?;
            Ok(Doc::roster(roster))
        }
        CommandKind::DeleteAll => {
            let mut roster = vec![Doc::line([
                Doc::text("DELETE FROM"),
                Doc::text(" "),
                Doc::text(&name),
            ])];
            where_section(&mut roster)?;
            Ok(Doc::roster(roster))
        }
        CommandKind::Extend(source) => {
            let mut head = vec![
                Doc::text("INSERT INTO"),
                Doc::text(" "),
                Doc::text(&name),
            ];
            if let Some(names) = select_labels(select, root) {
                head.push(Doc::text(" "));
                head.push(name_scope(names));
            }
            Ok(Doc::roster(vec![
                Doc::line(head),
                render_content(source, root)?,
            ]))
        }
        CommandKind::Merge { source, insert } => {
            let predicates: Vec<Doc> = select
                .wheres
                .iter()
                .map(|(chain, pred)| emit_part(pred, chain, &env))
                .try_collect()?;
            if predicates.is_empty() {
                return Err(Error::invalid_argument(
                    "a merge requires a matching predicate on its target",
                ));
            }
            let mut roster = vec![
                Doc::line([Doc::text("MERGE INTO"), Doc::text(" "), Doc::text(&name)]),
                Doc::line([
                    Doc::text("USING"),
                    Doc::text(" "),
                    Doc::scope("(", ")", vec![render_content(source, root)?]),
                    Doc::text(" s"),
                ]),
                Doc::line([
                    Doc::text("ON"),
                    Doc::text(" "),
                    Doc::join(" AND ", predicates),
                ]),
            ];
            if let Some(settings) = insert {
                roster.push(Doc::line([Doc::text("WHEN NOT MATCHED THEN")]));
                roster.push(Doc::line([
                    Doc::text("INSERT"),
                    Doc::text(" "),
                    column_scope(settings),
                    Doc::text(" "),
                    Doc::text("VALUES"),
                    Doc::text(" "),
                    value_scope(settings)?,
                ]));
            }
            Ok(Doc::roster(roster))
        }
    }
}
