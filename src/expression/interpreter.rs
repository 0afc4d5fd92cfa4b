use lazy_static::lazy_static;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{Compiled, Evaluator, Function, Lookup, Value};
use crate::{Error, Result};

#[derive(Parser)]
#[grammar = "expression/expression.pest"]
struct ExpressionParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::infix(Rule::pow, Assoc::Right))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unary {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Binary {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(String),
    Call(String, Vec<Expr>),
    Unary(Unary, Box<Expr>),
    Binary(Binary, Box<Expr>, Box<Expr>),
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn primary(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::number => pair
            .as_str()
            .parse()
            .map(|n| Expr::Literal(Value::Number(n)))
            .map_err(|e| Error::ParseError(format!("bad number '{}': {}", pair.as_str(), e))),
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
            Ok(Expr::Literal(Value::Str(unescape(inner))))
        }
        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
        Rule::ident => Ok(Expr::Name(pair.as_str().to_string())),
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            let args = inner.map(|p| build(p.into_inner())).collect::<Result<Vec<_>>>()?;
            Ok(Expr::Call(name, args))
        }
        Rule::expr => build(pair.into_inner()),
        rule => Err(Error::ParseError(format!("unexpected {:?}", rule))),
    }
}

fn build(pairs: Pairs<Rule>) -> Result<Expr> {
    PRATT
        .map_primary(primary)
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::neg => Unary::Neg,
                _ => Unary::Not,
            };
            Ok(Expr::Unary(op, Box::new(rhs?)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or => Binary::Or,
                Rule::and => Binary::And,
                Rule::eq => Binary::Eq,
                Rule::ne => Binary::Ne,
                Rule::lt => Binary::Lt,
                Rule::le => Binary::Le,
                Rule::gt => Binary::Gt,
                Rule::ge => Binary::Ge,
                Rule::add => Binary::Add,
                Rule::sub => Binary::Sub,
                Rule::mul => Binary::Mul,
                Rule::div => Binary::Div,
                Rule::rem => Binary::Rem,
                Rule::pow => Binary::Pow,
                rule => return Err(Error::ParseError(format!("unexpected operator {:?}", rule))),
            };
            Ok(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pairs)
}

fn parse(source: &str) -> Result<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::expression, source)
        .map_err(|e| Error::ParseError(format!("{}", e)))?;
    let expr = pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or_else(|| Error::ParseError(format!("empty expression '{}'", source)))?;
    build(expr.into_inner())
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn numbers(op: Binary, a: &Value, b: &Value) -> Result<(f64, f64)> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::ExpressionError(format!(
            "{:?} needs numbers, got '{}' and '{}'",
            op, a, b
        ))),
    }
}

struct Evaluation<'a> {
    lookup: &'a mut dyn Lookup,
    functions: &'a BTreeMap<String, Function>,
}

impl Evaluation<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self
                .lookup
                .lookup(name)
                .ok_or_else(|| Error::ExpressionError(format!("unknown name '{}'", name))),
            Expr::Call(name, args) => self.call(name, args),
            Expr::Unary(Unary::Not, e) => Ok(Value::Bool(!self.eval(e)?.is_truthy())),
            Expr::Unary(Unary::Neg, e) => {
                let v = self.eval(e)?;
                v.as_number()
                    .map(|n| Value::Number(-n))
                    .ok_or_else(|| Error::ExpressionError(format!("cannot negate '{}'", v)))
            }
            Expr::Binary(Binary::Or, a, b) => {
                let truthy = self.eval(a)?.is_truthy() || self.eval(b)?.is_truthy();
                Ok(Value::Bool(truthy))
            }
            Expr::Binary(Binary::And, a, b) => {
                let truthy = self.eval(a)?.is_truthy() && self.eval(b)?.is_truthy();
                Ok(Value::Bool(truthy))
            }
            Expr::Binary(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                binary(*op, &a, &b)
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value> {
        let values = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>>>()?;
        match (name, values.as_slice()) {
            ("length", [v]) => Ok(Value::Number(v.to_string().chars().count() as f64)),
            ("length", _) => Err(Error::ExpressionError("length expects 1 argument".into())),
            ("any", vs) => Ok(Value::Bool(vs.iter().any(Value::is_truthy))),
            _ => match self.functions.get(name) {
                Some(f) => f(&values),
                None => Err(Error::ExpressionError(format!("unknown function '{}'", name))),
            },
        }
    }
}

fn binary(op: Binary, a: &Value, b: &Value) -> Result<Value> {
    let value = match op {
        Binary::Eq => Value::Bool(compare(a, b) == Ordering::Equal),
        Binary::Ne => Value::Bool(compare(a, b) != Ordering::Equal),
        Binary::Lt => Value::Bool(compare(a, b) == Ordering::Less),
        Binary::Le => Value::Bool(compare(a, b) != Ordering::Greater),
        Binary::Gt => Value::Bool(compare(a, b) == Ordering::Greater),
        Binary::Ge => Value::Bool(compare(a, b) != Ordering::Less),
        Binary::Add => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Value::Number(x + y),
            _ => Value::Str(format!("{}{}", a, b)),
        },
        Binary::Sub => numbers(op, a, b).map(|(x, y)| Value::Number(x - y))?,
        Binary::Mul => numbers(op, a, b).map(|(x, y)| Value::Number(x * y))?,
        Binary::Div => numbers(op, a, b).map(|(x, y)| Value::Number(x / y))?,
        Binary::Rem => numbers(op, a, b).map(|(x, y)| Value::Number(x % y))?,
        Binary::Pow => numbers(op, a, b).map(|(x, y)| Value::Number(x.powf(y)))?,
        Binary::Or | Binary::And => Value::Bool(a.is_truthy() && b.is_truthy()),
    };
    Ok(value)
}

/// The built-in expression language.
///
/// Supports numbers, quoted strings, `true`/`false`, names (which may contain
/// inner hyphens, so `a-b` is a name and subtraction needs spaces), function
/// calls, and these operators from loosest to tightest:
///
/// | operators | |
/// |-----------|-|
/// | `\|\|` `or` | logical or |
/// | `&&` `and` | logical and |
/// | `==` `eq` `!=` `~=` `ne` `<` `lt` `<=` `le` `>` `gt` `>=` `ge` | comparison |
/// | `+` `-` | additive |
/// | `*` `/` `%` | multiplicative |
/// | `^` | power, right associative |
/// | `!` `~` `not` `-` | prefix |
///
/// Comparisons are numeric when both sides read as numbers. `length(x)` and
/// `any(...)` are always available; other functions are added with
/// [`set_function`]. Compiled expressions are cached by source text.
///
/// # Examples
/// ```
/// # use wildprompt::Result;
/// use wildprompt::{Evaluator, Interpreter, Value};
/// use maplit::btreemap;
/// # fn main() -> Result<()> {
/// let mut interpreter = Interpreter::new();
/// let compiled = interpreter.compile("length(color) gt 2 && size ge 10")?;
/// let mut scope = btreemap! { "color" => "red", "size" => "12" };
/// assert_eq!(compiled(&mut scope)?, Value::Bool(true));
/// # Ok(())
/// # }
/// ```
///
/// [`set_function`]: trait.Evaluator.html#tymethod.set_function
#[derive(Default)]
pub struct Interpreter {
    functions: Rc<RefCell<BTreeMap<String, Function>>>,
    cache: HashMap<String, Compiled>,
}

impl Interpreter {
    /// Creates an interpreter with no extra functions
    pub fn new() -> Interpreter {
        Interpreter::default()
    }
}

impl Evaluator for Interpreter {
    fn compile(&mut self, source: &str) -> Result<Compiled> {
        if let Some(compiled) = self.cache.get(source) {
            return Ok(compiled.clone());
        }
        let expr = parse(source)?;
        let functions = self.functions.clone();
        let compiled: Compiled = Rc::new(move |lookup: &mut dyn Lookup| {
            let functions = functions.borrow();
            Evaluation {
                lookup,
                functions: &functions,
            }
            .eval(&expr)
        });
        self.cache.insert(source.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn set_function(&mut self, name: &str, function: Function) {
        self.functions.borrow_mut().insert(name.to_string(), function);
    }
}
