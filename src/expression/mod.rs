//! Expressions used by guards and `wccase` conditions.
//!
//! Any embeddable expression language can back the engine by implementing
//! [`Evaluator`]. The crate ships [`Interpreter`], a small boolean and
//! arithmetic language.
//!
//! [`Evaluator`]: trait.Evaluator.html
//! [`Interpreter`]: struct.Interpreter.html
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::{Error, Result};

mod interpreter;

pub use self::interpreter::Interpreter;

/// A dynamically typed expression result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `true` or `false`
    Bool(bool),
    /// Any number
    Number(f64),
    /// Text
    Str(String),
}

impl Value {
    /// `true` for boolean true, a non-empty string or a positive number
    ///
    /// # Examples
    /// ```
    /// use wildprompt::Value;
    ///
    /// assert!(Value::from("x").is_truthy());
    /// assert!(!Value::from("").is_truthy());
    /// assert!(!Value::from(-1.0).is_truthy());
    /// assert!(Value::from(true).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n > 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// The value as a number, parsing strings that hold one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

/// Resolves names while an expression runs
pub trait Lookup {
    /// Returns the value bound to `name`, or `None` if it is unbound
    fn lookup(&mut self, name: &str) -> Option<Value>;
}

impl<K, V> Lookup for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: Clone + Into<Value>,
{
    fn lookup(&mut self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

impl<K, V> Lookup for HashMap<K, V>
where
    K: Borrow<str> + Hash + Eq,
    V: Clone + Into<Value>,
{
    fn lookup(&mut self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

/// A function callable from expressions
pub type Function = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// A compiled expression, run against a [`Lookup`]
///
/// [`Lookup`]: trait.Lookup.html
pub type Compiled = Rc<dyn Fn(&mut dyn Lookup) -> Result<Value>>;

/// An expression language the engine can evaluate conditions with.
pub trait Evaluator {
    /// Compiles `source`. Implementations may cache by source text.
    fn compile(&mut self, source: &str) -> Result<Compiled>;

    /// Makes `function` callable as `name(...)` in later evaluations
    fn set_function(&mut self, name: &str, function: Function);
}

fn two_strings(name: &str, args: &[Value]) -> Result<(String, String)> {
    match args {
        [a, b] => Ok((a.to_string(), b.to_string())),
        _ => Err(Error::ExpressionError(format!(
            "{} expects 2 arguments, got {}",
            name,
            args.len()
        ))),
    }
}

/// `contains(haystack, needle)`
pub fn contains(args: &[Value]) -> Result<Value> {
    let (haystack, needle) = two_strings("contains", args)?;
    Ok(Value::Bool(haystack.contains(&needle)))
}

/// `icontains(haystack, needle)`, ignoring case
pub fn icontains(args: &[Value]) -> Result<Value> {
    let (haystack, needle) = two_strings("icontains", args)?;
    Ok(Value::Bool(haystack.to_lowercase().contains(&needle.to_lowercase())))
}
