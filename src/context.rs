use lazy_static::lazy_static;
use rand::RngCore;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::expression::{self, Evaluator, Lookup, Value};
use crate::{Diagnostics, Engine, Error, Estimate, Expand, Result, Scope, Template};

lazy_static! {
    /// Builtin function names that scope lookups never shadow
    pub(crate) static ref RESERVED: HashSet<&'static str> =
        ["any", "contains", "icontains", "length"].iter().copied().collect();
}

/// Where the innermost `wcmatch` is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Not inside a `wcmatch`
    None,
    /// Inside a `wcmatch`, no case has fired yet
    Open,
    /// Inside a `wcmatch` whose case already fired
    Closed,
}

impl Default for MatchState {
    fn default() -> MatchState {
        MatchState::None
    }
}

/// The result of expanding one line
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "wildcard_json", derive(serde::Serialize))]
pub struct Expansion {
    /// The expanded text
    pub text: String,
    /// Text collected by `wcnegative` directives
    pub negative: String,
    /// Variables as they stood when expansion finished
    pub variables: BTreeMap<String, String>,
    /// Warnings raised along the way
    pub warnings: Vec<String>,
}

/// State for one top-level evaluation.
///
/// Created by [`Engine::context`] and dropped when the evaluation is done.
/// Nothing in it is shared with other evaluations: each has its own scope,
/// match state and expression evaluator, the latter built on first use.
///
/// [`Engine::context`]: struct.Engine.html#method.context
pub struct Context<'a> {
    engine: &'a Engine,
    rng: &'a mut dyn RngCore,
    scope: Scope,
    match_state: MatchState,
    evaluator: Option<Box<dyn Evaluator>>,
    negative: String,
    diagnostics: Diagnostics,
    depth: usize,
}

impl<'a> Context<'a> {
    pub(crate) fn new(engine: &'a Engine, rng: &'a mut dyn RngCore) -> Context<'a> {
        Context {
            engine,
            rng,
            scope: Scope::new(),
            match_state: MatchState::None,
            evaluator: None,
            negative: String::new(),
            diagnostics: Diagnostics::new(),
            depth: 0,
        }
    }

    /// The engine this context belongs to
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// The random source for draws
    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    /// Variables and macros
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Variables and macros, mutably
    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// The current match state
    pub fn match_state(&self) -> MatchState {
        self.match_state
    }

    /// Sets the match state
    pub fn set_match_state(&mut self, state: MatchState) {
        self.match_state = state;
    }

    /// Text collected for the negative prompt
    pub fn negative(&self) -> &str {
        &self.negative
    }

    /// Adds text to the negative prompt, before or after what is there
    pub fn add_negative(&mut self, text: &str, prepend: bool) {
        if prepend {
            self.negative.insert_str(0, text);
        } else {
            self.negative.push_str(text);
        }
    }

    /// Warnings raised so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Records a warning
    pub fn warn<S: AsRef<str>>(&mut self, message: S) {
        self.diagnostics.warn(message)
    }

    /// Expands directive text within this context.
    ///
    /// Fails with [`Error::RecursionLimit`] once nesting passes the engine's
    /// limit. Failures of individual directives do not fail the call; they
    /// become warnings.
    ///
    /// [`Error::RecursionLimit`]: enum.Error.html#variant.RecursionLimit
    pub fn expand_text(&mut self, text: &str) -> Result<String> {
        let limit = self.engine.max_depth();
        if self.depth >= limit {
            return Err(Error::RecursionLimit(limit));
        }
        let template = Template::parse(text)?;
        self.depth += 1;
        let result = template.expand(self);
        self.depth -= 1;
        result
    }

    /// Evaluates `body` as the body of a `wcmatch`, restoring the previous
    /// match state afterwards whatever the outcome
    pub fn with_match(&mut self, body: &str) -> Result<String> {
        let saved = self.match_state;
        self.match_state = MatchState::Open;
        let result = self.expand_text(body);
        self.match_state = saved;
        result
    }

    /// Evaluates an expression against this context's scope
    pub fn evaluate(&mut self, source: &str) -> Result<Value> {
        let engine = self.engine;
        let evaluator = self.evaluator.get_or_insert_with(|| {
            let mut evaluator = engine.new_evaluator();
            evaluator.set_function("contains", Rc::new(expression::contains));
            evaluator.set_function("icontains", Rc::new(expression::icontains));
            evaluator
        });
        let compiled = evaluator.compile(source)?;
        compiled(&mut ScopeView { context: self })
    }

    /// Evaluates a condition. Failures count as false and are reported.
    pub fn is_true(&mut self, source: &str) -> bool {
        match self.evaluate(source) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                self.warn(format!("error evaluating '{}': {}", source, e));
                false
            }
        }
    }

    /// Consumes the context, returning the final text alongside its state
    pub fn finish(self, text: String) -> Expansion {
        Expansion {
            text,
            negative: self.negative,
            variables: self.scope.variables().clone(),
            warnings: self.diagnostics.into_warnings(),
        }
    }
}

/// Read-only view of a context's scope for expressions.
///
/// Macros are transpiled and expanded on every read, variables return their
/// stored value and anything else reads as empty text. Reserved builtin names
/// never resolve.
struct ScopeView<'c, 'a> {
    context: &'c mut Context<'a>,
}

impl Lookup for ScopeView<'_, '_> {
    fn lookup(&mut self, name: &str) -> Option<Value> {
        if RESERVED.contains(name) {
            return None;
        }
        let context = &mut *self.context;
        if let Some(text) = context.scope.macro_text(name).map(str::to_string) {
            let engine = context.engine;
            let source = engine.transpiler().transpile(&text, &mut context.diagnostics);
            let value = context.expand_text(&source).unwrap_or_else(|e| {
                context.warn(format!("error expanding macro '{}': {}", name, e));
                String::new()
            });
            return Some(Value::Str(value));
        }
        let value = context.scope.variable(name).unwrap_or_default();
        Some(Value::Str(value.to_string()))
    }
}

/// State for one static length estimate
pub struct Estimation<'a> {
    engine: &'a Engine,
    match_length: String,
    depth: usize,
}

impl<'a> Estimation<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Estimation<'a> {
        Estimation {
            engine,
            match_length: String::new(),
            depth: 0,
        }
    }

    /// The engine this estimate runs against
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Estimates directive text. Text that does not parse, or that nests
    /// past the engine's limit, is returned as is.
    pub fn estimate_text(&mut self, text: &str) -> String {
        if self.depth >= self.engine.max_depth() {
            return String::new();
        }
        let template = match Template::parse(text) {
            Ok(template) => template,
            Err(_) => return text.to_string(),
        };
        self.depth += 1;
        let estimate = template.estimate(self);
        self.depth -= 1;
        estimate
    }

    /// Estimates the body of a `wcmatch`, with a fresh longest-case record
    pub fn with_match(&mut self, body: &str) -> String {
        let saved = std::mem::take(&mut self.match_length);
        let estimate = self.estimate_text(body);
        self.match_length = saved;
        estimate
    }

    /// Records a case estimate, returning only the part by which it exceeds
    /// the longest case seen so far in the enclosing match
    pub fn record_case(&mut self, case: String) -> String {
        let seen = self.match_length.chars().count();
        if case.chars().count() > seen {
            let excess = case.chars().skip(seen).collect();
            self.match_length = case;
            excess
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_state_is_restored() -> Result<()> {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        assert_eq!(context.match_state(), MatchState::None);
        context.with_match("<wccase:x>")?;
        assert_eq!(context.match_state(), MatchState::None);
        Ok(())
    }

    #[test]
    fn scope_view() -> Result<()> {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        context.scope_mut().set_variable("size", "large");
        context.scope_mut().set_macro("color", "<var:size> red");
        assert_eq!(context.evaluate("color")?, Value::from("large red"));
        assert_eq!(context.evaluate("size eq 'large'")?, Value::Bool(true));
        assert_eq!(context.evaluate("undefined")?, Value::from(""));
        assert_eq!(context.evaluate("length(undefined) eq 0")?, Value::Bool(true));
        assert!(context.evaluate("length").is_err());
        Ok(())
    }

    #[test]
    fn macros_are_transpiled_when_read() -> Result<()> {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        context.scope_mut().set_macro("pick", "{solo}");
        assert_eq!(context.evaluate("pick")?, Value::from("solo"));
        Ok(())
    }

    #[test]
    fn failing_conditions_are_false() {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        assert!(!context.is_true("1 +"));
        assert_eq!(context.diagnostics().warnings().len(), 1);
    }

    #[test]
    fn negative_prompt() {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        context.add_negative("b", false);
        context.add_negative("a", true);
        let expansion = context.finish(String::new());
        assert_eq!(expansion.negative, "ab");
    }

    #[test]
    fn case_excess() {
        let engine = Engine::new();
        let mut estimation = engine.estimation();
        assert_eq!(estimation.record_case("abc".into()), "abc");
        assert_eq!(estimation.record_case("ab".into()), "");
        assert_eq!(estimation.record_case("abcde".into()), "de");
    }
}
