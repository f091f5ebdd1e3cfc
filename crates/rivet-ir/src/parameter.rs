//! Gate parameters: numeric values or symbolic expressions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::fmt;

/// A numeric or symbolic gate parameter.
///
/// Symbols stay unresolved until bound; bound expressions fold to
/// [`ParameterExpression::Constant`] through [`ParameterExpression::simplify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A numeric value.
    Constant(f64),
    /// A named free parameter.
    Symbol(String),
    /// The constant π.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Sum.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Difference.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Product.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Quotient.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// A numeric parameter.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// A free symbolic parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// The constant π.
    pub fn pi() -> Self {
        ParameterExpression::Pi
    }

    /// Whether any free symbol remains.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) | ParameterExpression::Pi => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Evaluate to a number, if no symbol remains and no division by zero occurs.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Pi => Some(PI),
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// Names of all free symbols, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            ParameterExpression::Constant(_) | ParameterExpression::Pi => {}
            ParameterExpression::Symbol(name) => {
                out.insert(name.clone());
            }
            ParameterExpression::Neg(e) => e.collect_symbols(out),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Replace every symbol for which `lookup` yields a value.
    fn substitute(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Self {
        let rebuild = |a: &Self, b: &Self| {
            (Box::new(a.substitute(lookup)), Box::new(b.substitute(lookup)))
        };
        match self {
            ParameterExpression::Symbol(name) => match lookup(name) {
                Some(value) => ParameterExpression::Constant(value),
                None => self.clone(),
            },
            ParameterExpression::Constant(_) | ParameterExpression::Pi => self.clone(),
            ParameterExpression::Neg(e) => ParameterExpression::Neg(Box::new(e.substitute(lookup))),
            ParameterExpression::Add(a, b) => {
                let (a, b) = rebuild(a, b);
                ParameterExpression::Add(a, b)
            }
            ParameterExpression::Sub(a, b) => {
                let (a, b) = rebuild(a, b);
                ParameterExpression::Sub(a, b)
            }
            ParameterExpression::Mul(a, b) => {
                let (a, b) = rebuild(a, b);
                ParameterExpression::Mul(a, b)
            }
            ParameterExpression::Div(a, b) => {
                let (a, b) = rebuild(a, b);
                ParameterExpression::Div(a, b)
            }
        }
    }

    /// Bind one symbol, returning a new expression.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        self.substitute(&|n| (n == name).then_some(value))
    }

    /// Bind every symbol present in `values`.
    pub fn bind_all(&self, values: &BTreeMap<String, f64>) -> Self {
        self.substitute(&|n| values.get(n).copied())
    }

    /// Fold constant subexpressions.
    pub fn simplify(&self) -> Self {
        if let Some(v) = self.as_f64() {
            return ParameterExpression::Constant(v);
        }
        type Make = fn(Box<ParameterExpression>, Box<ParameterExpression>) -> ParameterExpression;
        let fold = |a: &Self, b: &Self, op: fn(f64, f64) -> Option<f64>, make: Make| {
            let a = a.simplify();
            let b = b.simplify();
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => op(x, y).map_or_else(
                    || make(Box::new(a.clone()), Box::new(b.clone())),
                    ParameterExpression::Constant,
                ),
                _ => make(Box::new(a), Box::new(b)),
            }
        };
        match self {
            ParameterExpression::Neg(e) => {
                let e = e.simplify();
                match e.as_f64() {
                    Some(v) => ParameterExpression::Constant(-v),
                    None => ParameterExpression::Neg(Box::new(e)),
                }
            }
            ParameterExpression::Add(a, b) => {
                fold(a, b, |x, y| Some(x + y), ParameterExpression::Add)
            }
            ParameterExpression::Sub(a, b) => {
                fold(a, b, |x, y| Some(x - y), ParameterExpression::Sub)
            }
            ParameterExpression::Mul(a, b) => {
                fold(a, b, |x, y| Some(x * y), ParameterExpression::Mul)
            }
            ParameterExpression::Div(a, b) => fold(
                a,
                b,
                |x, y| (y != 0.0).then(|| x / y),
                ParameterExpression::Div,
            ),
            _ => self.clone(),
        }
    }

    /// A stable textual form used for structural comparison.
    ///
    /// Numeric expressions render as the exact bit pattern of their value
    /// (with `-0.0` folded onto `0.0`), so `π/2` and `1.5707963267948966`
    /// agree. Symbolic expressions render their simplified tree.
    pub fn canonical(&self) -> String {
        match self.as_f64() {
            Some(v) => {
                let v = if v == 0.0 { 0.0 } else { v };
                format!("#{:016x}", v.to_bits())
            }
            None => self.simplify().to_string(),
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Pi => write!(f, "π"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl std::ops::Add for ParameterExpression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        ParameterExpression::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        ParameterExpression::Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        ParameterExpression::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for ParameterExpression {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        ParameterExpression::Div(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        ParameterExpression::Neg(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_single_symbol() {
        let p = ParameterExpression::symbol("theta") * ParameterExpression::constant(2.0);
        let bound = p.bind("theta", PI / 4.0);
        assert!(!bound.is_symbolic());
        assert!((bound.as_f64().unwrap() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bind_all_leaves_unknown_symbols() {
        let p = ParameterExpression::symbol("a") + ParameterExpression::symbol("b");
        let values = BTreeMap::from([("a".to_string(), 1.0)]);
        let partial = p.bind_all(&values);
        assert!(partial.is_symbolic());
        assert_eq!(partial.symbols(), BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn test_simplify_keeps_division_by_zero() {
        let p = ParameterExpression::constant(1.0) / ParameterExpression::constant(0.0);
        assert!(matches!(p.simplify(), ParameterExpression::Div(_, _)));
    }

    #[test]
    fn test_canonical_agrees_across_spellings() {
        let a = ParameterExpression::pi() / ParameterExpression::constant(2.0);
        let b = ParameterExpression::constant(PI / 2.0);
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(
            ParameterExpression::constant(-0.0).canonical(),
            ParameterExpression::constant(0.0).canonical()
        );
        assert_ne!(
            ParameterExpression::constant(0.1).canonical(),
            ParameterExpression::constant(0.2).canonical()
        );
    }

    #[test]
    fn test_canonical_symbolic() {
        let three = ParameterExpression::constant(1.0) + ParameterExpression::constant(2.0);
        let p = ParameterExpression::symbol("x") + three;
        assert_eq!(p.canonical(), "(x + 3)");
    }
}
