//! Scalar expression emission: one arm per node kind, producing layout
//! fragments.

use itertools::Itertools;

use crate::algebra::{Expr, ExprKind};
use crate::error::{Error, Result};
use crate::layout::Doc;
use crate::nullable::Value;
use crate::sql::chain::{Chain, HostLink, LayerKind};
use crate::sql::dialect::Dialect;
use crate::sql::gen_query::{render_content, Aspect, Composer};

/// Emission environment: the per-walk root state plus the scope currently
/// being rendered (with its final decorator chain), when inside one.
#[derive(Clone)]
pub(super) struct Env {
    pub root: std::rc::Rc<crate::sql::chain::RootCtx>,
    pub scope: Option<HostLink>,
}

/// Emit `expr` as-is, with no operand wrapping.
pub(super) fn translate(expr: &Expr, chain: &Chain, env: &Env) -> Result<Doc> {
    let dialect = &env.root.dialect;
    Ok(match expr.kind() {
        ExprKind::Constant(v) | ExprKind::Value(v) => Doc::text(const_repr(v, dialect)),
        ExprKind::Item(name) => emit_item(name, chain, env)?,
        ExprKind::HostItem(name) => emit_host_item(name, chain, env)?,
        ExprKind::Parameter(name) => emit_parameter(name, chain, env)?,
        ExprKind::Call { name, args } => {
            let args: Vec<Doc> = args
                .iter()
                .map(|a| operand(a, Some(expr), chain, env))
                .try_collect()?;
            Doc::line([
                Doc::text(name),
                Doc::text("("),
                Doc::join(", ", args),
                Doc::text(")"),
            ])
        }
        ExprKind::Cast { expr: value, ty } => {
            let v = operand(value, Some(expr), chain, env)?;
            Doc::line([
                Doc::text("CAST"),
                Doc::text("("),
                Doc::join(" ", [v, Doc::text("AS"), Doc::text(type_repr(ty, dialect))]),
                Doc::text(")"),
            ])
        }
        ExprKind::Parens(inner) => {
            let x = operand(inner, Some(expr), chain, env)?;
            Doc::line([Doc::text("("), x, Doc::text(")")])
        }
        ExprKind::Neg(n) => Doc::line([Doc::text("-"), operand(n, Some(expr), chain, env)?]),
        ExprKind::Pos(n) => Doc::line([Doc::text("+"), operand(n, Some(expr), chain, env)?]),
        ExprKind::Summarize(items) => {
            Doc::join(" + ", operands(items, expr, chain, env)?)
        }
        ExprKind::Sub(a, b) => Doc::line([
            operand(a, Some(expr), chain, env)?,
            Doc::text(" - "),
            operand(b, Some(expr), chain, env)?,
        ]),
        ExprKind::Multiply(items) => Doc::join(" * ", operands(items, expr, chain, env)?),
        ExprKind::Div(a, b) => Doc::line([
            operand(a, Some(expr), chain, env)?,
            Doc::text(" / "),
            operand(b, Some(expr), chain, env)?,
        ]),
        ExprKind::Concat(items) => {
            let docs = operands(items, expr, chain, env)?;
            if dialect.concat_by_function {
                concat_by_function(docs, dialect)
            } else {
                Doc::join(&format!(" {} ", dialect.concat_operator), docs)
            }
        }
        ExprKind::Comparison { op, left, right } => Doc::join(
            " ",
            [
                operand(left, Some(expr), chain, env)?,
                Doc::text(op.as_sql()),
                operand(right, Some(expr), chain, env)?,
            ],
        ),
        ExprKind::Between { expr: a, lo, hi } => Doc::join(
            " ",
            [
                operand(a, Some(expr), chain, env)?,
                Doc::text("BETWEEN"),
                operand(lo, Some(expr), chain, env)?,
                Doc::text("AND"),
                operand(hi, Some(expr), chain, env)?,
            ],
        ),
        ExprKind::IsNull(a) => Doc::join(
            " ",
            [operand(a, Some(expr), chain, env)?, Doc::text("IS"), Doc::text("NULL")],
        ),
        ExprKind::NotNull(a) => Doc::join(
            " ",
            [
                operand(a, Some(expr), chain, env)?,
                Doc::text("IS"),
                Doc::text("NOT"),
                Doc::text("NULL"),
            ],
        ),
        ExprKind::IsIn { expr: a, set } | ExprKind::NotIn { expr: a, set } => {
            check_multi_column(a, dialect)?;
            let negated = matches!(expr.kind(), ExprKind::NotIn { .. });
            let mut words = vec![operand(a, Some(expr), chain, env)?];
            if negated {
                words.push(Doc::text("NOT"));
            }
            words.push(Doc::text("IN"));
            words.push(operand(set, Some(expr), chain, env)?);
            Doc::join(" ", words)
        }
        ExprKind::Like {
            expr: s,
            pattern,
            escape,
        } => {
            let mut words = vec![
                operand(s, Some(expr), chain, env)?,
                Doc::text("LIKE"),
                operand(pattern, Some(expr), chain, env)?,
            ];
            if let Some(esc) = escape {
                words.push(Doc::text("ESCAPE"));
                words.push(operand(esc, Some(expr), chain, env)?);
            }
            Doc::join(" ", words)
        }
        ExprKind::And(items) => Doc::join(" AND ", operands(items, expr, chain, env)?),
        ExprKind::Or(items) => Doc::join(" OR ", operands(items, expr, chain, env)?),
        ExprKind::Not(b) => Doc::line([
            Doc::text("NOT"),
            Doc::text(" "),
            operand(b, Some(expr), chain, env)?,
        ]),
        ExprKind::Case { cases, otherwise } => {
            case_doc(None, cases, otherwise.as_ref(), expr, chain, env)?
        }
        ExprKind::Switch {
            on,
            cases,
            otherwise,
        } => case_doc(Some(on), cases, otherwise.as_ref(), expr, chain, env)?,
        ExprKind::List(items) => {
            let docs: Vec<Doc> = items
                .iter()
                .map(|x| operand(x, Some(expr), chain, env))
                .try_collect()?;
            Doc::line([Doc::text("("), Doc::join(", ", docs), Doc::text(")")])
        }
        ExprKind::DateTimePart { date, part } => Doc::line([
            Doc::text("EXTRACT"),
            Doc::text("("),
            Doc::text(part.keyword()),
            Doc::text(" "),
            Doc::text("FROM"),
            Doc::text(" "),
            operand(date, Some(expr), chain, env)?,
            Doc::text(")"),
        ]),
        ExprKind::PeriodStart { date, part, offset } => {
            let trunc = Doc::line([
                Doc::text("DATE_TRUNC"),
                Doc::text("("),
                Doc::text(sql_string(part.lower())),
                Doc::text(", "),
                operand(date, Some(expr), chain, env)?,
                Doc::text(")"),
            ]);
            if is_zero(offset) {
                trunc
            } else {
                Doc::line([
                    trunc,
                    Doc::text(" + "),
                    operand(offset, Some(expr), chain, env)?,
                    Doc::text(" * "),
                    Doc::text(format!("INTERVAL '1' {}", part.keyword())),
                ])
            }
        }
        ExprKind::DateText { date, sep } => {
            datetime_text(date, sep, &["YYYY", "MM", "DD"], expr, chain, env)?
        }
        ExprKind::TimeText { date, sep } => {
            datetime_text(date, sep, &["HH24", "MI", "SS"], expr, chain, env)?
        }
        ExprKind::Now => Doc::text(&dialect.now_text),
        ExprKind::NextVal(sequence) => match &dialect.next_val_template {
            Some(template) => Doc::text(template.replace("{}", sequence)),
            None => return Err(Error::unsupported("sequences")),
        },
        ExprKind::All(t) => prefixed_subquery("ALL", t, env)?,
        ExprKind::Any(t) => prefixed_subquery("ANY", t, env)?,
        ExprKind::Exists(t) => prefixed_subquery("EXISTS", t, env)?,
        ExprKind::Count(t) => {
            let mut composer = Composer::for_guest(env.root.clone(), env.scope.clone());
            composer.apply(t)?;
            composer.set_aspect(Aspect::Count)?;
            render_content(&composer.into_content(), &env.root)?
        }
        ExprKind::Table(t) => {
            let mut composer = Composer::for_guest(env.root.clone(), env.scope.clone());
            composer.apply(t)?;
            render_content(&composer.into_content(), &env.root)?
        }
    })
}

/// Emit `expr` as an operand of `outer`, parenthesizing when its rendering
/// would be ambiguous in that position.
pub(super) fn operand(expr: &Expr, outer: Option<&Expr>, chain: &Chain, env: &Env) -> Result<Doc> {
    let wrap = !matches!(outer.map(Expr::kind), Some(ExprKind::Parens(_)))
        && ambiguous(expr, outer, chain, &env.root.dialect);
    let doc = translate(expr, chain, env)?;
    Ok(if wrap {
        Doc::line([Doc::text("("), doc, Doc::text(")")])
    } else {
        doc
    })
}

/// Operand emission with no enclosing expression (selection items, captured
/// predicates).
pub(super) fn emit_part(expr: &Expr, chain: &Chain, env: &Env) -> Result<Doc> {
    operand(expr, None, chain, env)
}

fn operands(items: &[Expr], outer: &Expr, chain: &Chain, env: &Env) -> Result<Vec<Doc>> {
    items
        .iter()
        .map(|x| operand(x, Some(outer), chain, env))
        .try_collect()
}

// --- ambiguity ---

fn ambiguous(x: &Expr, outer: Option<&Expr>, chain: &Chain, dialect: &Dialect) -> bool {
    if matches!(outer.map(Expr::kind), Some(ExprKind::Parens(_))) {
        return false;
    }
    let x = resolve_substitutions(x, chain);
    if matches!(x.kind(), ExprKind::Table(_)) {
        return true;
    }
    if simple_chain(&x, outer) {
        return false;
    }
    if matches!(outer.map(Expr::kind), Some(ExprKind::Call { .. })) {
        return false;
    }
    !atomic(&x, dialect)
}

/// Substitute inline definitions so parenthesization reflects what will
/// actually be emitted.
fn resolve_substitutions(x: &Expr, chain: &Chain) -> Expr {
    let mut cur = chain.clone();
    let mut x = x.clone();
    while let Some(layer) = cur.top() {
        let replacement = match &layer.kind {
            LayerKind::Define(defs) => match x.kind() {
                ExprKind::Item(name) => {
                    defs.iter().find(|(k, _)| k == name).map(|(_, d)| d.clone())
                }
                _ => None,
            },
            LayerKind::ParamSubst(defs) => match x.kind() {
                ExprKind::Parameter(name) => {
                    defs.iter().find(|(k, _)| k == name).map(|(_, d)| d.clone())
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(replacement) = replacement {
            x = replacement;
        }
        let next = layer.next.clone();
        cur = next;
    }
    x
}

fn atomic(x: &Expr, dialect: &Dialect) -> bool {
    if dialect.concat_by_function && matches!(x.kind(), ExprKind::Concat(_)) {
        return true;
    }
    matches!(
        x.kind(),
        ExprKind::List(_)
            | ExprKind::Parens(_)
            | ExprKind::Constant(_)
            | ExprKind::Value(_)
            | ExprKind::Item(_)
            | ExprKind::HostItem(_)
            | ExprKind::Parameter(_)
            | ExprKind::Call { .. }
            | ExprKind::Cast { .. }
            | ExprKind::All(_)
            | ExprKind::Any(_)
            | ExprKind::Exists(_)
    )
}

/// A left spine of same-family operators reads unambiguously without
/// parentheses; right operands do not.
fn simple_chain(x: &Expr, outer: Option<&Expr>) -> bool {
    let Some(outer) = outer else {
        return false;
    };
    let sumsub = |e: &Expr| matches!(e.kind(), ExprKind::Summarize(_) | ExprKind::Sub(..));
    let muldiv = |e: &Expr| matches!(e.kind(), ExprKind::Multiply(_) | ExprKind::Div(..));
    if !((sumsub(x) && sumsub(outer)) || (muldiv(x) && muldiv(outer))) {
        return false;
    }
    let left = match outer.kind() {
        ExprKind::Summarize(items) | ExprKind::Multiply(items) => items.first(),
        ExprKind::Sub(a, _) | ExprKind::Div(a, _) => Some(a),
        _ => None,
    };
    left.is_some_and(|l| x.same_node(l))
}

// --- item / parameter resolution through the chain ---

fn emit_item(name: &str, chain: &Chain, env: &Env) -> Result<Doc> {
    let mut name = name.to_string();
    let mut cur = chain.clone();
    while let Some(layer) = cur.top() {
        match &layer.kind {
            LayerKind::Include(names) => {
                if !names.iter().any(|n| *n == name) {
                    return Err(Error::not_found(&name, "label"));
                }
            }
            LayerKind::Exclude(names) => {
                if names.iter().any(|n| *n == name) {
                    return Err(Error::not_found(&name, "label"));
                }
            }
            LayerKind::Rename(renamings) => {
                if let Some((old, _)) = renamings.iter().find(|(_, new)| *new == name) {
                    name = old.clone();
                }
            }
            LayerKind::Define(defs) => {
                if let Some((_, d)) = defs.iter().find(|(k, _)| *k == name) {
                    // inline the definition, rendered under the rest of the
                    // chain
                    return translate(d, &layer.next, env);
                }
            }
            LayerKind::ParamSubst(_) => {}
            LayerKind::Qualify(q) => return Ok(qualified_item(q, &name)),
            LayerKind::Scope(scope) => {
                return Ok(match scope.qualifier.borrow().as_deref() {
                    Some(q) => qualified_item(q, &name),
                    None => Doc::text(&name),
                });
            }
        }
        let next = layer.next.clone();
        cur = next;
    }
    Ok(Doc::text(&name))
}

fn qualified_item(qualifier: &str, name: &str) -> Doc {
    Doc::line([Doc::text(qualifier), Doc::text("."), Doc::text(name)])
}

fn emit_host_item(name: &str, chain: &Chain, env: &Env) -> Result<Doc> {
    match chain.scope().and_then(|scope| scope.host.clone()) {
        Some(link) => {
            let host_env = Env {
                root: env.root.clone(),
                scope: Some(link.clone()),
            };
            emit_item(name, &link.chain, &host_env)
        }
        None => Err(Error::not_found(name, "host item")),
    }
}

fn emit_parameter(name: &str, chain: &Chain, env: &Env) -> Result<Doc> {
    let mut cur = chain.clone();
    while let Some(layer) = cur.top() {
        if let LayerKind::ParamSubst(defs) = &layer.kind {
            if let Some((_, d)) = defs.iter().find(|(k, _)| k == name) {
                return translate(d, &layer.next, env);
            }
        }
        let next = layer.next.clone();
        cur = next;
    }
    let dialect = &env.root.dialect;
    Ok(if dialect.bind_by_name {
        Doc::text(format!("{}{}", dialect.param_prefix, name))
    } else {
        Doc::text("?")
    })
}

// --- rendering helpers ---

pub(super) fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub(super) fn const_repr(v: &Value, dialect: &Dialect) -> String {
    if let Some(hook) = dialect.const_repr {
        if let Some(s) = hook(v) {
            return s;
        }
    }
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => {
            if x.fract() == 0.0 && x.is_finite() {
                format!("{x:.1}")
            } else {
                format!("{x}")
            }
        }
        Value::Text(s) => sql_string(s),
    }
}

fn type_repr(ty: &str, dialect: &Dialect) -> String {
    dialect
        .type_reprs
        .get(ty)
        .cloned()
        .unwrap_or_else(|| ty.to_string())
}

fn concat_by_function(docs: Vec<Doc>, dialect: &Dialect) -> Doc {
    match docs.len() {
        0 => Doc::Line(Vec::new()),
        1 => docs.into_iter().next().unwrap_or(Doc::Line(Vec::new())),
        2 => concat_call(docs),
        _ if dialect.concat_function_multiargs => concat_call(docs),
        _ => {
            let mut iter = docs.into_iter();
            let mut acc: Vec<Doc> = iter.by_ref().take(2).collect();
            for next in iter {
                acc = vec![concat_call(acc), next];
            }
            concat_call(acc)
        }
    }
}

fn concat_call(args: Vec<Doc>) -> Doc {
    Doc::line([
        Doc::text("CONCAT"),
        Doc::text("("),
        Doc::join(", ", args),
        Doc::text(")"),
    ])
}

fn case_doc(
    on: Option<&Expr>,
    cases: &[(Expr, Expr)],
    otherwise: Option<&Expr>,
    outer: &Expr,
    chain: &Chain,
    env: &Env,
) -> Result<Doc> {
    let mut header = vec![Doc::text("CASE")];
    if let Some(on) = on {
        header.push(Doc::text(" "));
        header.push(operand(on, Some(outer), chain, env)?);
    }
    let mut content = Vec::new();
    for (when, then) in cases {
        content.push(Doc::line([
            Doc::text("WHEN"),
            Doc::text(" "),
            operand(when, Some(outer), chain, env)?,
            Doc::text(" "),
            Doc::text("THEN"),
            Doc::text(" "),
            operand(then, Some(outer), chain, env)?,
        ]));
    }
    if let Some(e) = otherwise {
        content.push(Doc::line([
            Doc::text("ELSE"),
            Doc::text(" "),
            operand(e, Some(outer), chain, env)?,
        ]));
    }
    Ok(Doc::roster(vec![
        Doc::section(vec![Doc::line(header)], content),
        Doc::line([Doc::text("END")]),
    ]))
}

fn datetime_text(
    date: &Expr,
    sep: &Expr,
    parts: &[&str],
    outer: &Expr,
    chain: &Chain,
    env: &Env,
) -> Result<Doc> {
    let dialect = &env.root.dialect;
    let function = dialect
        .datetime_format_function
        .clone()
        .ok_or_else(|| Error::unsupported("datetime formatting"))?;
    let sep = match sep.kind() {
        ExprKind::Constant(Value::Text(s)) | ExprKind::Value(Value::Text(s)) => s.clone(),
        _ => {
            return Err(Error::unsupported(
                "datetime formatting with a non-constant separator",
            ))
        }
    };
    let format = parts.join(&sep);
    Ok(Doc::line([
        Doc::text(function),
        Doc::text("("),
        operand(date, Some(outer), chain, env)?,
        Doc::text(", "),
        Doc::text(sql_string(&format)),
        Doc::text(")"),
    ]))
}

fn is_zero(offset: &Expr) -> bool {
    matches!(
        offset.kind(),
        ExprKind::Constant(Value::Int(0)) | ExprKind::Value(Value::Int(0))
    )
}

fn check_multi_column(lhs: &Expr, dialect: &Dialect) -> Result<()> {
    if let ExprKind::List(items) = lhs.kind() {
        if items.len() > 1 && !dialect.multi_columns_in {
            return Err(Error::unsupported("multi-column IN"));
        }
    }
    Ok(())
}

fn prefixed_subquery(keyword: &str, t: &crate::algebra::Table, env: &Env) -> Result<Doc> {
    let mut composer = Composer::for_guest(env.root.clone(), env.scope.clone());
    composer.apply(t)?;
    let inner = render_content(&composer.into_content(), &env.root)?;
    Ok(Doc::line([
        Doc::text(keyword),
        Doc::text(" "),
        Doc::scope("(", ")", vec![inner]),
    ]))
}
