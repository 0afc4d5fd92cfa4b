#![warn(missing_docs)]
//! Dynamic prompts for text-to-image models
//!
//! `wildprompt` has two halves. The [`Transpiler`] rewrites the compact source
//! syntax people write in prompt files (`{a|b}` variants, `__name__` wildcard
//! references, `${var=value}` variables, `[from:to:step]` prompt editing and
//! `<ppp:...>` commands) into a uniform directive language of `<name:body>` tags.
//! The [`Engine`] then expands that directive text into a final prompt,
//! drawing choices at random and keeping variables, macros and a negative
//! prompt along the way.
//!
//! Example:
//!
//! ```
//! # use wildprompt::Result;
//! # fn main() -> Result<()> {
//! let directives = wildprompt::transpile("a {red|blue} __animals/cat__");
//! assert_eq!(directives, "a <random:red|blue> <wcwildcard:animals/cat>");
//! # Ok(())
//! # }
//! ```
//!
//! or, straight to a prompt:
//!
//! ```
//! # use wildprompt::Result;
//! # fn main() -> Result<()> {
//! let prompt = wildprompt::expand("${size=!{large}}a ${size} {blue|blue} car")?;
//! assert_eq!(prompt, "a large blue car");
//! # Ok(())
//! # }
//! ```
//!
//! ## API
//!
//! The convenience functions above use a default engine with no wildcards.
//! Wildcards, a selection policy, extra directives and a different
//! expression language are all configured on an [`Engine`]:
//!
//! ```
//! # use wildprompt::Result;
//! use wildprompt::{Engine, WildcardSet};
//! use maplit::hashmap;
//! # fn main() -> Result<()> {
//! let engine = Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
//!     "colors/warm" => vec!["red"],
//!     "colors/cool" => vec!["blue"],
//!     "fruit" => vec!["(small)::cherry", "(large)::melon"],
//! }));
//! let expansion = engine.expand_source("a __colors/warm__ __fruit'large'__", &mut rand::thread_rng())?;
//! assert_eq!(expansion.text, "a red melon");
//! assert!(expansion.warnings.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! `expand_source` transpiles and then expands. Directive text can also be
//! expanded directly with [`Engine::expand`], and [`Engine::estimate`]
//! produces text at least as long as any expansion without drawing anything.
//!
//! ## Directives
//!
//! Directive tags look like `<name[prefix]:body>`. The engine ships the
//! `random`, `wcwildcard`, `setvar`, `var`, `setmacro`, `macro`, `wcmatch`,
//! `wccase`, `wcnegative`, `fromto`, `alternate`, `comment` and related
//! directives, and [`Engine::with_handler`] adds or replaces any of them.
//!
//! ```
//! # use wildprompt::Result;
//! use wildprompt::Engine;
//! # fn main() -> Result<()> {
//! let text = "<setvar[season,false]:winter><wcmatch:<wccase[season == 'winter']:snowy><wccase:sunny>> day";
//! let expansion = Engine::new().expand(text, &mut rand::thread_rng())?;
//! assert_eq!(expansion.text, "snowy day");
//! # Ok(())
//! # }
//! ```
//!
//! [`Transpiler`]: struct.Transpiler.html
//! [`Engine`]: struct.Engine.html
//! [`Engine::expand`]: struct.Engine.html#method.expand
//! [`Engine::estimate`]: struct.Engine.html#method.estimate
//! [`Engine::with_handler`]: struct.Engine.html#method.with_handler

mod choice;
pub use crate::choice::{parse_count_prefix, Choice, ChoiceSet, Quantity, Selection};
mod context;
pub use crate::context::{Context, Estimation, Expansion, MatchState};
pub mod delimiter;
mod diagnostics;
pub use crate::diagnostics::Diagnostics;
mod directive;
pub use crate::directive::Directive;
mod directives;
mod engine;
pub use crate::engine::{Engine, Estimator, Handler, Processor};
mod error;
pub use crate::error::Error;
mod estimate;
pub use crate::estimate::Estimate;
mod expand;
pub use crate::expand::Expand;
pub mod expression;
pub use crate::expression::{Evaluator, Interpreter, Lookup, Value};
mod filter;
pub use crate::filter::{FilterEntry, LabelFilter};
pub mod glob;
mod node;
use crate::node::Node;
mod parser;
mod scope;
pub use crate::scope::Scope;
mod template;
pub use crate::template::Template;
mod transpile;
pub use crate::transpile::Transpiler;
mod wildcards;
pub use crate::wildcards::{WildcardSet, WildcardSource};

/// Transpiles one line of source syntax into directive text, discarding
/// warnings
pub fn transpile<S: AsRef<str>>(line: S) -> String {
    Transpiler::new().transpile(line.as_ref(), &mut Diagnostics::new())
}

/// Transpiles one line of source syntax, then expands it with a default
/// engine
pub fn expand<S: AsRef<str>>(line: S) -> Result<String> {
    let expansion = Engine::new().expand_source(line.as_ref(), &mut rand::thread_rng())?;
    Ok(expansion.text)
}

/// A convenience type for a `Result` of `T` or [`Error`]
///
/// [`Error`]: enum.Error.html
pub type Result<T> = ::std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_transpile() {
        assert_eq!(transpile("a {b|c}"), "a <random:b|c>");
        assert_eq!(transpile("plain text"), "plain text");
    }

    #[test]
    fn test_expand() -> Result<()> {
        assert_eq!(expand("a {b|b} c")?, "a b c");
        assert_eq!(expand("<comment:hidden>shown")?, "shown");
        Ok(())
    }

    #[test]
    fn source_to_prompt() -> Result<()> {
        let engine = Engine::new().with_wildcards(WildcardSet::from_map(hashmap! {
            "styles" => vec!["oil painting"],
            "subjects" => vec!["a fox", "a fox"],
        }));
        let mut rng = StdRng::seed_from_u64(7);
        let expansion = engine.expand_source(
            "__subjects__, [__styles__:watercolor:10] [[dark]]",
            &mut rng,
        )?;
        assert_eq!(expansion.text, "a fox, [oil painting:watercolor:10] (dark:0.81)");
        Ok(())
    }

    #[test]
    fn missing_wildcards_warn() -> Result<()> {
        assert_eq!(expand("a __nothing_here__ b")?, "a  b");
        let expansion = Engine::new().expand_source("__nothing_here__", &mut rand::thread_rng())?;
        assert_eq!(expansion.warnings.len(), 1);
        assert!(expansion.warnings[0].contains("missing wildcard: nothing_here"));
        Ok(())
    }
}
