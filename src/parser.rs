use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::{Directive, Error, Node, Result, Template};

#[derive(Parser)]
#[grammar = "template.pest"]
struct TemplateParser;

fn parse_error<E: std::fmt::Display>(e: E) -> Error {
    Error::ParseError(format!("{}", e))
}

fn directive(pair: Pair<Rule>) -> Directive {
    let mut directive = Directive::new("");
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => directive = Directive::new(inner.as_str()),
            Rule::prefix => directive = directive.with_prefix(inner.as_str()),
            Rule::body => directive = directive.with_body(inner.as_str()),
            _ => {}
        }
    }
    directive
}

/// Splits directive text into literal text and top-level directives
pub(crate) fn parse_str(source: &str) -> Result<Template> {
    let template = TemplateParser::parse(Rule::template, source)
        .map_err(parse_error)?
        .next()
        .ok_or_else(|| Error::ParseError(format!("nothing parsed from '{}'", source)))?;
    let nodes = template
        .into_inner()
        .filter_map(|pair| match pair.as_rule() {
            Rule::text => Some(Node::from(pair.as_str().to_string())),
            Rule::directive => Some(Node::from(directive(pair))),
            _ => None,
        })
        .collect();
    Ok(Template::new(nodes))
}

/// Parses exactly one directive, e.g. `<random[2,]:a|b>`
#[cfg(test)]
pub(crate) fn parse_directive(source: &str) -> Result<Directive> {
    let pair = TemplateParser::parse(Rule::directive, source)
        .map_err(parse_error)?
        .next()
        .ok_or_else(|| Error::ParseError(format!("no directive in '{}'", source)))?;
    if pair.as_str().len() != source.len() {
        return Err(Error::ParseError(format!("trailing input after directive in '{}'", source)));
    }
    Ok(directive(pair))
}
