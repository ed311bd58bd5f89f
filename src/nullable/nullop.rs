//! Unknown-propagating operations over [Value].
//!
//! Contract: if any input is unknown the result is unknown, except where
//! Kleene logic or membership can decide regardless (see the individual
//! operations). Host arithmetic faults — division by zero, operands of
//! incompatible types — surface as errors; they are never masked as unknown.

use crate::error::{Error, Result};
use crate::nullable::{like, Number, Value};

pub fn isnull(v: &Value) -> bool {
    v.is_null()
}

pub fn notnull(v: &Value) -> bool {
    !v.is_null()
}

pub fn accept(v: &Value) -> bool {
    v.accept()
}

pub fn hasnull(values: &[Value]) -> bool {
    values.iter().any(Value::is_null)
}

pub fn any(values: &[Value]) -> bool {
    values.iter().any(Value::accept)
}

pub fn all(values: &[Value]) -> bool {
    values.iter().all(Value::accept)
}

fn number(v: &Value) -> Result<Number> {
    v.as_number()
        .ok_or_else(|| Error::invalid_argument(format!("expected a number, found {v:?}")))
}

fn text(v: &Value) -> Result<&str> {
    match v {
        Value::Text(s) => Ok(s),
        _ => Err(Error::invalid_argument(format!(
            "expected a string, found {v:?}"
        ))),
    }
}

fn binary_numeric(
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(match (number(a)?, number(b)?) {
        (Number::Int(x), Number::Int(y)) => Value::Int(int_op(x, y)),
        (x, y) => Value::Float(float_op(x.as_f64(), y.as_f64())),
    })
}

pub fn neg(n: &Value) -> Result<Value> {
    if n.is_null() {
        return Ok(Value::Null);
    }
    Ok(match number(n)? {
        Number::Int(x) => Value::Int(-x),
        Number::Float(x) => Value::Float(-x),
    })
}

pub fn pos(n: &Value) -> Result<Value> {
    if n.is_null() {
        return Ok(Value::Null);
    }
    number(n)?;
    Ok(n.clone())
}

pub fn summarize(values: &[Value]) -> Result<Value> {
    if hasnull(values) {
        return Ok(Value::Null);
    }
    let mut acc = Value::Int(0);
    for v in values {
        acc = binary_numeric(&acc, v, |x, y| x + y, |x, y| x + y)?;
    }
    Ok(acc)
}

pub fn sub(a: &Value, b: &Value) -> Result<Value> {
    binary_numeric(a, b, |x, y| x - y, |x, y| x - y)
}

pub fn multiply(values: &[Value]) -> Result<Value> {
    if hasnull(values) {
        return Ok(Value::Null);
    }
    let mut acc = Value::Int(1);
    for v in values {
        acc = binary_numeric(&acc, v, |x, y| x * y, |x, y| x * y)?;
    }
    Ok(acc)
}

fn check_divisor(b: &Value) -> Result<()> {
    match number(b)? {
        Number::Int(0) => Err(Error::invalid_argument("division by zero")),
        Number::Float(x) if x == 0.0 => Err(Error::invalid_argument("division by zero")),
        _ => Ok(()),
    }
}

pub fn floordiv(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    check_divisor(b)?;
    binary_numeric(a, b, i64::div_euclid, |x, y| (x / y).floor())
}

pub fn truediv(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    check_divisor(b)?;
    Ok(Value::Float(number(a)?.as_f64() / number(b)?.as_f64()))
}

pub fn divmod(a: &Value, b: &Value) -> Result<(Value, Value)> {
    Ok((floordiv(a, b)?, modulo(a, b)?))
}

pub fn pow(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(match (number(a)?, number(b)?) {
        (Number::Int(x), Number::Int(y)) if y >= 0 => Value::Int(x.pow(y.min(u32::MAX as i64) as u32)),
        (x, y) => Value::Float(x.as_f64().powf(y.as_f64())),
    })
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    check_divisor(b)?;
    binary_numeric(a, b, i64::rem_euclid, |x, y| x.rem_euclid(y))
}

pub fn concat(values: &[Value]) -> Result<Value> {
    if hasnull(values) {
        return Ok(Value::Null);
    }
    let mut out = String::new();
    for v in values {
        out.push_str(text(v)?);
    }
    Ok(Value::Text(out))
}

pub fn concat2(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Text(format!("{}{}", text(a)?, text(b)?)))
}

/// Loose equality, as a host `==`: numbers compare numerically, everything
/// else compares within its own type and is unequal across types.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
        _ => match (a, b) {
            (Value::Text(x), Value::Text(y)) => x == y,
            _ => false,
        },
    }
}

pub fn isin(a: &Value, values: &[Value]) -> Value {
    if a.is_null() {
        return Value::Null;
    }
    if values.iter().any(|v| !v.is_null() && loose_eq(a, v)) {
        return Value::Bool(true);
    }
    if hasnull(values) {
        return Value::Null;
    }
    Value::Bool(false)
}

pub fn notin(a: &Value, values: &[Value]) -> Value {
    match isin(a, values) {
        Value::Null => Value::Null,
        v => Value::Bool(!v.accept()),
    }
}

fn ordering(a: &Value, b: &Value) -> Result<std::cmp::Ordering> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .ok_or_else(|| Error::invalid_argument("cannot order NaN")),
        _ => match (a, b) {
            (Value::Text(x), Value::Text(y)) => Ok(x.cmp(y)),
            _ => Err(Error::invalid_argument(format!(
                "cannot compare {a:?} with {b:?}"
            ))),
        },
    }
}

macro_rules! comparison {
    ($name:ident, $($ord:pat_param)|+) => {
        pub fn $name(a: &Value, b: &Value) -> Result<Value> {
            if a.is_null() || b.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Bool(matches!(ordering(a, b)?, $($ord)|+)))
        }
    };
}

comparison!(lt, std::cmp::Ordering::Less);
comparison!(le, std::cmp::Ordering::Less | std::cmp::Ordering::Equal);
comparison!(gt, std::cmp::Ordering::Greater);
comparison!(ge, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal);

pub fn eq(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(loose_eq(a, b)))
}

pub fn ne(a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(!loose_eq(a, b)))
}

pub fn between(a: &Value, lo: &Value, hi: &Value) -> Result<Value> {
    let vlo = ge(a, lo)?;
    let vhi = le(a, hi)?;
    Ok(and_all(&[vlo, vhi]))
}

/// Kleene conjunction. False wins over unknown.
pub fn and_all(values: &[Value]) -> Value {
    let mut r = Value::Bool(true);
    for v in values {
        if v.is_null() {
            r = Value::Null;
        } else if !v.accept() {
            return Value::Bool(false);
        }
    }
    r
}

/// Kleene disjunction. True wins over unknown.
pub fn or_all(values: &[Value]) -> Value {
    let mut r = Value::Bool(false);
    for v in values {
        if v.is_null() {
            r = Value::Null;
        } else if v.accept() {
            return Value::Bool(true);
        }
    }
    r
}

pub fn not(v: &Value) -> Value {
    if v.is_null() {
        return Value::Null;
    }
    Value::Bool(!v.accept())
}

macro_rules! string_op {
    ($name:ident, $f:expr) => {
        pub fn $name(s: &Value) -> Result<Value> {
            if s.is_null() {
                return Ok(Value::Null);
            }
            let f: fn(&str) -> String = $f;
            Ok(Value::Text(f(text(s)?)))
        }
    };
}

string_op!(ucase, |s| s.to_uppercase());
string_op!(lcase, |s| s.to_lowercase());
string_op!(ltrim, |s| s.trim_start().to_string());
string_op!(rtrim, |s| s.trim_end().to_string());
string_op!(trim, |s| s.trim().to_string());

pub fn replace(s: &Value, old: &Value, new: &Value) -> Result<Value> {
    if s.is_null() || old.is_null() || new.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Text(text(s)?.replace(text(old)?, text(new)?)))
}

/// SQL LIKE. `%` matches any run, `_` any single character; `escape`
/// neutralizes a following `%` or `_`. Compiled patterns are cached in a
/// bounded process-wide cache.
pub fn like(s: &Value, pattern: &Value, escape: Option<&Value>) -> Result<Value> {
    if s.is_null() || pattern.is_null() {
        return Ok(Value::Null);
    }
    let escape = match escape {
        None | Some(Value::Null) => None,
        Some(v) => Some(text(v)?),
    };
    Ok(Value::Bool(like::matches(text(s)?, text(pattern)?, escape)?))
}

pub fn cast(v: &Value, ty: &str) -> Result<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        "int" => Ok(Value::Int(match v {
            Value::Bool(b) => i64::from(*b),
            Value::Int(n) => *n,
            Value::Float(x) => *x as i64,
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::invalid_argument(format!("cannot cast {s:?} to int")))?,
            Value::Null => unreachable!(),
        })),
        "float" => Ok(Value::Float(match v {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(n) => *n as f64,
            Value::Float(x) => *x,
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::invalid_argument(format!("cannot cast {s:?} to float")))?,
            Value::Null => unreachable!(),
        })),
        "str" | "text" => Ok(Value::Text(v.to_string())),
        "bool" => Ok(Value::Bool(v.accept())),
        _ => Err(Error::invalid_argument(format!("unknown cast type `{ty}`"))),
    }
}

pub fn aggregate_summary(values: &[Value]) -> Result<Value> {
    let mut r = Value::Null;
    for v in values {
        if !v.is_null() {
            r = if r.is_null() {
                v.clone()
            } else {
                binary_numeric(&r, v, |x, y| x + y, |x, y| x + y)?
            };
        }
    }
    Ok(r)
}

pub fn aggregate_minimum(values: &[Value]) -> Result<Value> {
    let mut r = Value::Null;
    for v in values {
        if !v.is_null() {
            if r.is_null() || lt(v, &r)?.accept() {
                r = v.clone();
            }
        }
    }
    Ok(r)
}

pub fn aggregate_maximum(values: &[Value]) -> Result<Value> {
    let mut r = Value::Null;
    for v in values {
        if !v.is_null() {
            if r.is_null() || gt(v, &r)?.accept() {
                r = v.clone();
            }
        }
    }
    Ok(r)
}

pub fn aggregate_count(values: &[Value]) -> Value {
    Value::Int(values.iter().filter(|v| !v.is_null()).count() as i64)
}

fn columns(size: usize, rows: &[Vec<Value>]) -> Result<Vec<Vec<Value>>> {
    let mut cols = vec![Vec::with_capacity(rows.len()); size];
    for row in rows {
        if row.len() < size {
            return Err(Error::invalid_argument(format!(
                "expected rows of width {size}, found {}",
                row.len()
            )));
        }
        for (i, col) in cols.iter_mut().enumerate() {
            col.push(row[i].clone());
        }
    }
    Ok(cols)
}

pub fn aggregate_summaries(size: usize, rows: &[Vec<Value>]) -> Result<Vec<Value>> {
    columns(size, rows)?
        .iter()
        .map(|col| aggregate_summary(col))
        .collect()
}

pub fn aggregate_minimums(size: usize, rows: &[Vec<Value>]) -> Result<Vec<Value>> {
    columns(size, rows)?
        .iter()
        .map(|col| aggregate_minimum(col))
        .collect()
}

pub fn aggregate_maximums(size: usize, rows: &[Vec<Value>]) -> Result<Vec<Value>> {
    columns(size, rows)?
        .iter()
        .map(|col| aggregate_maximum(col))
        .collect()
}

pub fn aggregate_counts(size: usize, rows: &[Vec<Value>]) -> Result<Vec<Value>> {
    Ok(columns(size, rows)?
        .iter()
        .map(|col| aggregate_count(col))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NULL: Value = Value::Null;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn txt(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_null_propagation_arithmetic() {
        assert_eq!(neg(&NULL).unwrap(), NULL);
        assert_eq!(neg(&int(3)).unwrap(), int(-3));
        assert_eq!(summarize(&[int(1), int(2), int(3)]).unwrap(), int(6));
        assert_eq!(summarize(&[int(1), NULL, int(3)]).unwrap(), NULL);
        assert_eq!(sub(&int(5), &int(2)).unwrap(), int(3));
        assert_eq!(sub(&int(5), &NULL).unwrap(), NULL);
        assert_eq!(multiply(&[int(2), int(3), int(4)]).unwrap(), int(24));
        assert_eq!(multiply(&[int(2), NULL]).unwrap(), NULL);
        assert_eq!(
            summarize(&[int(1), Value::Float(0.5)]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_division() {
        assert_eq!(truediv(&int(7), &int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(floordiv(&int(7), &int(2)).unwrap(), int(3));
        assert_eq!(modulo(&int(7), &int(2)).unwrap(), int(1));
        assert_eq!(divmod(&int(7), &int(2)).unwrap(), (int(3), int(1)));
        assert_eq!(truediv(&NULL, &int(2)).unwrap(), NULL);
        // division by zero is a host error, not unknown
        assert!(truediv(&int(1), &int(0)).is_err());
        assert!(modulo(&int(1), &int(0)).is_err());
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            concat(&[txt("one"), txt("two")]).unwrap(),
            txt("onetwo")
        );
        assert_eq!(concat(&[txt("one"), NULL]).unwrap(), NULL);
        assert_eq!(concat2(&txt("a"), &txt("b")).unwrap(), txt("ab"));
        assert!(concat2(&txt("a"), &int(1)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(lt(&int(1), &int(2)).unwrap(), Value::Bool(true));
        assert_eq!(ge(&int(1), &int(2)).unwrap(), Value::Bool(false));
        assert_eq!(eq(&int(1), &Value::Float(1.0)).unwrap(), Value::Bool(true));
        assert_eq!(ne(&txt("a"), &txt("b")).unwrap(), Value::Bool(true));
        assert_eq!(lt(&NULL, &int(2)).unwrap(), NULL);
        assert_eq!(eq(&int(1), &NULL).unwrap(), NULL);
        assert!(lt(&txt("a"), &int(1)).is_err());
    }

    #[test]
    fn test_membership() {
        let set = [int(3), int(4), int(5)];
        assert_eq!(isin(&int(4), &set), Value::Bool(true));
        assert_eq!(isin(&int(9), &set), Value::Bool(false));
        assert_eq!(isin(&NULL, &set), NULL);
        assert_eq!(notin(&int(9), &set), Value::Bool(true));

        // an unknown member makes a miss unknown, but not a hit
        let with_null = [int(3), NULL];
        assert_eq!(isin(&int(3), &with_null), Value::Bool(true));
        assert_eq!(isin(&int(9), &with_null), NULL);
        assert_eq!(notin(&int(9), &with_null), NULL);
    }

    #[test]
    fn test_kleene_logic() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(and_all(&[t.clone(), t.clone()]), t);
        assert_eq!(and_all(&[t.clone(), f.clone()]), f);
        assert_eq!(and_all(&[t.clone(), NULL]), NULL);
        // false short-circuits over unknown
        assert_eq!(and_all(&[NULL, f.clone()]), f);
        assert_eq!(or_all(&[f.clone(), NULL]), NULL);
        // true short-circuits over unknown
        assert_eq!(or_all(&[NULL, t.clone()]), t);
        assert_eq!(not(&t), f);
        assert_eq!(not(&NULL), NULL);
    }

    #[test]
    fn test_between() {
        assert_eq!(
            between(&int(5), &int(1), &int(10)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            between(&int(50), &int(1), &int(10)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(between(&int(5), &NULL, &int(10)).unwrap(), NULL);
        // out of range on one known side decides despite the unknown side
        assert_eq!(
            between(&int(0), &int(1), &NULL).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(ucase(&txt("abc")).unwrap(), txt("ABC"));
        assert_eq!(lcase(&txt("ABC")).unwrap(), txt("abc"));
        assert_eq!(trim(&txt("  x  ")).unwrap(), txt("x"));
        assert_eq!(ltrim(&txt("  x  ")).unwrap(), txt("x  "));
        assert_eq!(rtrim(&txt("  x  ")).unwrap(), txt("  x"));
        assert_eq!(
            replace(&txt("a-b-c"), &txt("-"), &txt("+")).unwrap(),
            txt("a+b+c")
        );
        assert_eq!(ucase(&NULL).unwrap(), NULL);
        assert_eq!(replace(&txt("x"), &NULL, &txt("y")).unwrap(), NULL);
    }

    #[test]
    fn test_like() {
        let yes = |s: &str, p: &str| assert_eq!(like(&txt(s), &txt(p), None).unwrap(), Value::Bool(true));
        let no = |s: &str, p: &str| assert_eq!(like(&txt(s), &txt(p), None).unwrap(), Value::Bool(false));
        yes("text", "t%");
        yes("text", "te_t");
        yes("text", "%");
        no("text", "t");
        no("text", "x%");
        // the pattern must cover the whole string
        no("text", "ex");
        // regex specials in the pattern are literal
        yes("a.b", "a.b");
        no("axb", "a.b");
        yes("10+2", "10+_");

        assert_eq!(like(&NULL, &txt("%"), None).unwrap(), NULL);
        assert_eq!(like(&txt("x"), &NULL, None).unwrap(), NULL);
    }

    #[test]
    fn test_like_escape() {
        let esc = txt("!");
        assert_eq!(
            like(&txt("30%"), &txt("__!%"), Some(&esc)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            like(&txt("30x"), &txt("__!%"), Some(&esc)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            like(&txt("a_b"), &txt("a!_b"), Some(&esc)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            like(&txt("axb"), &txt("a!_b"), Some(&esc)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_cast() {
        assert_eq!(cast(&txt("12"), "int").unwrap(), int(12));
        assert_eq!(cast(&Value::Float(2.9), "int").unwrap(), int(2));
        assert_eq!(cast(&int(2), "float").unwrap(), Value::Float(2.0));
        assert_eq!(cast(&int(2), "str").unwrap(), txt("2"));
        assert_eq!(cast(&int(0), "bool").unwrap(), Value::Bool(false));
        assert_eq!(cast(&NULL, "int").unwrap(), NULL);
        assert!(cast(&txt("two"), "int").is_err());
        assert!(cast(&int(1), "interval").is_err());
    }

    #[test]
    fn test_aggregates() {
        let vs = [int(1), NULL, int(3)];
        assert_eq!(aggregate_summary(&vs).unwrap(), int(4));
        assert_eq!(aggregate_minimum(&vs).unwrap(), int(1));
        assert_eq!(aggregate_maximum(&vs).unwrap(), int(3));
        assert_eq!(aggregate_count(&vs), int(2));

        // all unknown in, unknown out; empty count is zero
        assert_eq!(aggregate_summary(&[NULL, NULL]).unwrap(), NULL);
        assert_eq!(aggregate_minimum(&[]).unwrap(), NULL);
        assert_eq!(aggregate_count(&[]), int(0));
    }

    #[test]
    fn test_aggregates_tuplewise() {
        let rows = vec![
            vec![int(1), NULL],
            vec![int(2), int(10)],
            vec![NULL, int(20)],
        ];
        assert_eq!(
            aggregate_summaries(2, &rows).unwrap(),
            vec![int(3), int(30)]
        );
        assert_eq!(
            aggregate_minimums(2, &rows).unwrap(),
            vec![int(1), int(10)]
        );
        assert_eq!(
            aggregate_maximums(2, &rows).unwrap(),
            vec![int(2), int(20)]
        );
        assert_eq!(aggregate_counts(2, &rows).unwrap(), vec![int(2), int(2)]);
        assert!(aggregate_counts(3, &rows).is_err());
    }
}
