use rand::RngCore;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::expression::{Evaluator, Interpreter};
use crate::{
    Context, Diagnostics, Directive, Estimation, Expansion, Result, Selection, Transpiler,
    WildcardSet, WildcardSource,
};

/// Expands a directive: `(directive, context) -> text`
pub type Processor = Rc<dyn Fn(&Directive, &mut Context<'_>) -> Result<String>>;

/// Produces an upper-bound stand-in for a directive's output
pub type Estimator = Rc<dyn Fn(&Directive, &mut Estimation<'_>) -> String>;

/// The pair of functions registered for one tag name
#[derive(Clone)]
pub struct Handler {
    processor: Processor,
    estimator: Option<Estimator>,
}

impl Handler {
    /// Creates a handler whose estimate is the estimate of the directive body
    pub fn new(processor: Processor) -> Handler {
        Handler {
            processor,
            estimator: None,
        }
    }

    /// Sets the estimator, then returns the modified handler
    pub fn with_estimator(mut self, estimator: Estimator) -> Handler {
        self.estimator = Some(estimator);
        self
    }

    /// Runs the processor
    pub fn process(&self, directive: &Directive, context: &mut Context<'_>) -> Result<String> {
        (self.processor)(directive, context)
    }

    /// Runs the estimator
    pub fn estimate(&self, directive: &Directive, estimation: &mut Estimation<'_>) -> String {
        match &self.estimator {
            Some(estimator) => estimator(directive, estimation),
            None => estimation.estimate_text(directive.body()),
        }
    }
}

/// Expands canonical directive text.
///
/// Holds the registry of directive handlers, the wildcards `wcwildcard`
/// draws from, the selection policy and the expression language used by
/// guards and `wccase`. Each call to [`expand`] runs in a fresh [`Context`].
///
/// # Examples
/// ```
/// # use wildprompt::Result;
/// use wildprompt::{Engine, WildcardSet};
/// use maplit::hashmap;
/// # fn main() -> Result<()> {
/// let engine = Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
///     "colors" => vec!["red"],
/// }));
/// let text = "<setvar[size,false]:large>a <var:size> <wcwildcard:colors> car";
/// let expansion = engine.expand(text, &mut rand::thread_rng())?;
/// assert_eq!(expansion.text, "a large red car");
/// assert_eq!(expansion.variables["size"], "large");
/// # Ok(())
/// # }
/// ```
///
/// [`expand`]: #method.expand
/// [`Context`]: struct.Context.html
#[derive(Clone)]
pub struct Engine {
    handlers: BTreeMap<String, Handler>,
    wildcards: Rc<dyn WildcardSource>,
    transpiler: Transpiler,
    selection: Selection,
    max_depth: usize,
    evaluator: Rc<dyn Fn() -> Box<dyn Evaluator>>,
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

impl Engine {
    /// Creates an engine with the default directives and no wildcards
    pub fn new() -> Engine {
        Engine {
            handlers: crate::directives::get_default_directives(),
            wildcards: Rc::new(WildcardSet::new()),
            transpiler: Transpiler::new(),
            selection: Selection::Random,
            max_depth: 64,
            evaluator: Rc::new(|| Box::new(Interpreter::new())),
        }
    }

    /// Sets the wildcards to draw from, then returns the modified engine.
    ///
    /// The wildcard names also become the known names the engine's
    /// transpiler resolves globs against.
    pub fn with_wildcards<W: WildcardSource + 'static>(mut self, wildcards: W) -> Engine {
        self.set_wildcards(wildcards);
        self
    }

    /// Sets the wildcards to draw from
    pub fn set_wildcards<W: WildcardSource + 'static>(&mut self, wildcards: W) {
        self.transpiler.set_known_wildcards(wildcards.names());
        self.wildcards = Rc::new(wildcards);
    }

    /// Sets the selection policy, then returns the modified engine
    ///
    /// # Examples
    /// ```
    /// # use wildprompt::Result;
    /// use wildprompt::{Engine, Selection};
    /// # fn main() -> Result<()> {
    /// let engine = Engine::new().with_selection(Selection::Index(1));
    /// let expansion = engine.expand("<random:a|b|c>", &mut rand::thread_rng())?;
    /// assert_eq!(expansion.text, "b");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_selection(mut self, selection: Selection) -> Engine {
        self.selection = selection;
        self
    }

    /// Sets the selection policy
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Sets how deeply directive bodies may nest, then returns the modified engine
    pub fn with_max_depth(mut self, max_depth: usize) -> Engine {
        self.max_depth = max_depth;
        self
    }

    /// Sets the expression language, then returns the modified engine.
    ///
    /// `factory` is called at most once per evaluation, the first time a
    /// condition is evaluated.
    pub fn with_evaluator<F>(mut self, factory: F) -> Engine
    where
        F: Fn() -> Box<dyn Evaluator> + 'static,
    {
        self.evaluator = Rc::new(factory);
        self
    }

    /// Registers a handler for a tag name, replacing any existing one, then
    /// returns the modified engine
    ///
    /// # Examples
    /// ```
    /// # use wildprompt::Result;
    /// use std::rc::Rc;
    /// use wildprompt::{Context, Directive, Engine, Handler};
    ///
    /// fn shout(d: &Directive, context: &mut Context<'_>) -> Result<String> {
    ///     Ok(context.expand_text(d.body())?.to_uppercase())
    /// }
    /// # fn main() -> Result<()> {
    /// let engine = Engine::new().with_handler("shout", Handler::new(Rc::new(shout)));
    /// let expansion = engine.expand("<shout:<random:hi>>", &mut rand::thread_rng())?;
    /// assert_eq!(expansion.text, "HI");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_handler<S: AsRef<str>>(mut self, name: S, handler: Handler) -> Engine {
        self.handlers.insert(name.as_ref().to_lowercase(), handler);
        self
    }

    /// Sets the transpiler used when macros are read from expressions, then
    /// returns the modified engine
    pub fn with_transpiler(mut self, transpiler: Transpiler) -> Engine {
        self.transpiler = transpiler;
        self
    }

    /// The handler registered for `name`, matched case-insensitively
    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers
            .get(name)
            .or_else(|| self.handlers.get(&name.to_lowercase()))
    }

    /// The wildcards `wcwildcard` draws from
    pub fn wildcards(&self) -> &dyn WildcardSource {
        self.wildcards.as_ref()
    }

    /// The transpiler used for macro re-expansion
    pub fn transpiler(&self) -> &Transpiler {
        &self.transpiler
    }

    /// The selection policy
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The nesting limit
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) fn new_evaluator(&self) -> Box<dyn Evaluator> {
        (self.evaluator)()
    }

    /// Starts a new evaluation
    pub fn context<'a, R: RngCore>(&'a self, rng: &'a mut R) -> Context<'a> {
        Context::new(self, rng)
    }

    /// Expands one line of directive text in a fresh context
    pub fn expand<R: RngCore>(&self, text: &str, rng: &mut R) -> Result<Expansion> {
        let mut context = self.context(rng);
        let output = context.expand_text(text)?;
        Ok(context.finish(output))
    }

    /// Transpiles one line of source syntax, then expands it
    ///
    /// # Examples
    /// ```
    /// # use wildprompt::Result;
    /// use wildprompt::Engine;
    /// # fn main() -> Result<()> {
    /// let expansion = Engine::new().expand_source("${c=!{red}} a ${c} car", &mut rand::thread_rng())?;
    /// assert_eq!(expansion.text, " a red car");
    /// # Ok(())
    /// # }
    /// ```
    pub fn expand_source<R: RngCore>(&self, source: &str, rng: &mut R) -> Result<Expansion> {
        let mut diagnostics = Diagnostics::new();
        let text = self.transpiler.transpile(source, &mut diagnostics);
        let mut expansion = self.expand(&text, rng)?;
        let mut warnings = diagnostics.into_warnings();
        warnings.append(&mut expansion.warnings);
        expansion.warnings = warnings;
        Ok(expansion)
    }

    /// Starts a new length estimate
    pub fn estimation(&self) -> Estimation<'_> {
        Estimation::new(self)
    }

    /// Produces text at least as long as any expansion of `text`, without
    /// drawing anything
    ///
    /// # Examples
    /// ```
    /// use wildprompt::Engine;
    ///
    /// let engine = Engine::new();
    /// let estimate = engine.estimate("<wcmatch:<wccase[x]:short><wccase:much longer>>!");
    /// assert_eq!(estimate.chars().count(), "much longer!".len());
    /// ```
    pub fn estimate(&self, text: &str) -> String {
        self.estimation().estimate_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Interpreter};
    use maplit::hashmap;

    #[test]
    fn handlers_match_case_insensitively() {
        let engine = Engine::new();
        assert!(engine.handler("random").is_some());
        assert!(engine.handler("RANDOM").is_some());
        assert!(engine.handler("lora").is_none());
    }

    #[test]
    fn recursion_is_bounded() -> Result<()> {
        let engine = Engine::new().with_max_depth(8);
        let text = "<setmacro[loop,false]:x<macro:loop>><macro:loop>";
        let expansion = engine.expand(text, &mut rand::thread_rng())?;
        assert!(expansion.text.starts_with("xxxxxx"));
        assert!(!expansion.warnings.is_empty());

        let nested = "<comment:".repeat(4) + &">".repeat(4);
        let shallow = Engine::new().with_max_depth(0);
        assert_eq!(
            shallow.expand(&nested, &mut rand::thread_rng()),
            Err(Error::RecursionLimit(0))
        );
        Ok(())
    }

    #[test]
    fn wildcards_feed_the_transpiler() {
        let engine = Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
            "colors/warm" => vec!["red"],
        }));
        let mut diagnostics = Diagnostics::new();
        let text = engine.transpiler().transpile("__colors/*__", &mut diagnostics);
        assert_eq!(text, "<wcwildcard:colors/warm>");
    }

    #[test]
    fn custom_evaluator_is_built_once_per_context() -> Result<()> {
        use std::cell::Cell;
        let built = Rc::new(Cell::new(0));
        let counter = built.clone();
        let engine = Engine::new().with_evaluator(move || {
            counter.set(counter.get() + 1);
            Box::new(Interpreter::new())
        });
        let text = "<wcmatch:<wccase[1 eq 2]:a><wccase[2 eq 2]:b>><wcmatch:<wccase[true]:c>>";
        let expansion = engine.expand(text, &mut rand::thread_rng())?;
        assert_eq!(expansion.text, "bc");
        assert_eq!(built.get(), 1);
        engine.expand(text, &mut rand::thread_rng())?;
        assert_eq!(built.get(), 2);
        Ok(())
    }

    #[test]
    fn source_warnings_come_first() -> Result<()> {
        let engine = Engine::new();
        let expansion = engine.expand_source("__missing*__ <wccase:x>", &mut rand::thread_rng())?;
        assert_eq!(expansion.warnings.len(), 3);
        assert!(expansion.warnings[0].contains("no glob matches"));
        Ok(())
    }
}
