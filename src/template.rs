use crate::parser::parse_str;
use crate::{Context, Directive, Estimate, Estimation, Expand, Node, Result};

/// A line of directive text split into literal text and directive tags.
///
/// Only top-level directives are split out; nested tags stay in their
/// parent's body and are parsed when that body is expanded.
///
/// # Examples
/// ```
/// # use wildprompt::Result;
/// use wildprompt::Template;
/// # fn main() -> Result<()> {
/// let t = Template::parse("a <random:red|blue> car, <wcwildcard[2,]:colors>")?;
/// let names: Vec<_> = t.directives().map(|d| d.name()).collect();
/// assert_eq!(names, vec!["random", "wcwildcard"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template(pub(crate) Vec<Node>);

impl Template {
    pub(crate) fn new(nodes: Vec<Node>) -> Template {
        Template(nodes)
    }

    /// Parses directive text
    pub fn parse<S: AsRef<str>>(source: S) -> Result<Template> {
        parse_str(source.as_ref())
    }

    /// The top-level directives, in order
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.0.iter().filter_map(Node::directive)
    }
}

impl Expand for Template {
    fn expand(&self, context: &mut Context<'_>) -> Result<String> {
        let parts = self
            .0
            .iter()
            .map(|n| n.expand(context))
            .collect::<Result<Vec<String>>>()?;
        Ok(parts.join(""))
    }
}

impl Estimate for Template {
    fn estimate(&self, estimation: &mut Estimation<'_>) -> String {
        self.0.iter().map(|n| n.estimate(estimation)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;

    #[test]
    fn expand_joins_nodes() -> Result<()> {
        let engine = Engine::new();
        let mut rng = rand::thread_rng();
        let mut context = engine.context(&mut rng);
        let t = Template::parse("a<comment:ignored> b")?;
        assert_eq!(t.expand(&mut context)?, "a b");
        Ok(())
    }

    #[test]
    fn estimate_keeps_text() -> Result<()> {
        let engine = Engine::new();
        let mut estimation = engine.estimation();
        let t = Template::parse("red <random:a|bbb> car")?;
        assert_eq!(t.estimate(&mut estimation), "red bbb car");
        Ok(())
    }
}
