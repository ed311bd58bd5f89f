//! Operator sugar over [Value] for the infallible null-propagating paths.
//!
//! `+` dispatches on operand shape: strings concatenate, numbers summarize.
//! Fallible operations (division, modulo, power) stay functions in [nullop]
//! because they must report host arithmetic faults.
//!
//! These impls panic on operands of incompatible types, as the host `+` would;
//! use the [nullop] functions to get an error instead.

use std::ops::{Add, Mul, Neg, Sub};

use crate::nullable::{nullop, Value};

fn host(r: crate::error::Result<Value>) -> Value {
    match r {
        Ok(v) => v,
        Err(e) => panic!("host arithmetic fault: {e}"),
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, other: Value) -> Value {
        if matches!(self, Value::Text(_)) || matches!(other, Value::Text(_)) {
            host(nullop::concat2(&self, &other))
        } else {
            host(nullop::summarize(&[self, other]))
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, other: Value) -> Value {
        host(nullop::sub(&self, &other))
    }
}

impl Mul for Value {
    type Output = Value;

    fn mul(self, other: Value) -> Value {
        host(nullop::multiply(&[self, other]))
    }
}

impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        host(nullop::neg(&self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_sugar() {
        assert_eq!(Value::Int(1) + Value::Int(2), Value::Int(3));
        assert_eq!(Value::Int(1) + Value::Null, Value::Null);
        assert_eq!(Value::Int(7) - Value::Int(2), Value::Int(5));
        assert_eq!(Value::Int(3) * Value::Null, Value::Null);
        assert_eq!(-Value::Int(3), Value::Int(-3));
        assert_eq!(-Value::Null, Value::Null);
    }

    #[test]
    fn test_add_dispatches_on_strings() {
        assert_eq!(
            Value::from("ab") + Value::from("cd"),
            Value::from("abcd")
        );
        assert_eq!(Value::from("ab") + Value::Null, Value::Null);
    }
}
