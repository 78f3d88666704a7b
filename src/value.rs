use std::fmt;
use std::rc::Rc;

use crate::object::{Obj, ObjString};

/// A tagged value flowing through the operand stack, constant pool and tables.
///
/// Scalars are copied; `Obj` shares the heap allocation, which stays owned by
/// the [`Heap`](crate::object::Heap) ledger.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Marks a reserved global slot that has not been defined yet.
    /// Never visible to scripts.
    #[default]
    Invalid,
    Nil,
    Bool(bool),
    Number(f64),
    Obj(Rc<Obj>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Invalid,
    Nil,
    Bool,
    Number,
    Obj,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Invalid => ValueType::Invalid,
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::Obj(_) => ValueType::Obj,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Rc<Obj>> {
        match self {
            Value::Obj(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&ObjString> {
        self.as_obj().and_then(|obj| obj.as_string())
    }

    pub fn is_string(&self) -> bool {
        self.as_string().is_some()
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    /// `nil` and `false` are falsey; everything else, `0` and `""` included, is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// 32-bit hash consistent with [`PartialEq`]: equal values hash equally.
    pub fn hash_value(&self) -> u32 {
        match self {
            Value::Invalid => u32::MAX - 1,
            Value::Nil => 0,
            Value::Bool(true) => 1,
            Value::Bool(false) => 2,
            Value::Number(n) => hash_number(*n),
            Value::Obj(obj) => obj.hash_value(),
        }
    }
}

/// Hashes the IEEE-754 bit pattern. `-0.0` is folded onto `+0.0` because the
/// two compare equal.
fn hash_number(n: f64) -> u32 {
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    // Small integers only differ in the high word; the murmur3 finalizer
    // spreads that into the low bits the table masks with.
    let mut h = (bits ^ (bits >> 32)) as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Tags must match. Numbers use native float comparison (`NaN != NaN`,
/// `0.0 == -0.0`); objects compare by identity, which is content equality for
/// interned strings.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Rc<Obj>> for Value {
    fn from(obj: Rc<Obj>) -> Self {
        Value::Obj(obj)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => write!(f, "INVALID"),
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Obj(obj) => write!(f, "{}", obj),
        }
    }
}

const PRINT_PRECISION: i32 = 6;

/// Formats a number the way C's `%g` does: six significant digits, trailing
/// zeros dropped, exponent notation below 1e-4 or from 1e6 upwards.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", (PRINT_PRECISION - 1) as usize, n);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRINT_PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (PRINT_PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
