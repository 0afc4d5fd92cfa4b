use crate::{Context, Directive, Estimate, Estimation, Expand, Result};

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Node {
    /// A directive tag such as `<random:a|b>`
    Directive(Directive),
    /// Plain text
    Text(String),
}

impl Node {
    pub(crate) fn directive(&self) -> Option<&Directive> {
        match self {
            Node::Directive(d) => Some(d),
            Node::Text(_) => None,
        }
    }
}

impl From<Directive> for Node {
    fn from(directive: Directive) -> Node {
        Node::Directive(directive)
    }
}

impl From<String> for Node {
    fn from(s: String) -> Node {
        Node::Text(s)
    }
}

impl Expand for Node {
    fn expand(&self, context: &mut Context<'_>) -> Result<String> {
        match self {
            Node::Directive(ref d) => d.expand(context),
            Node::Text(ref s) => Ok(s.to_owned()),
        }
    }
}

impl Estimate for Node {
    fn estimate(&self, estimation: &mut Estimation<'_>) -> String {
        match self {
            Node::Directive(ref d) => d.estimate(estimation),
            Node::Text(ref s) => s.to_owned(),
        }
    }
}
