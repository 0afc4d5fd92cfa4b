//! Rewrites dynamic-prompt source syntax into directive text.
//!
//! A line goes through a fixed sequence of passes: choice labels, wildcard
//! references, `${...}` variables, `<ppp:...>` block commands, square
//! brackets, the `BREAK` keyword and finally brace variants. Every construct
//! a pass recognizes has its inner text run through the whole sequence
//! again, so nesting resolves from the inside out whatever the pass order.

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use std::collections::BTreeSet;

use crate::delimiter::{find_top_level, find_top_level_str, is_escaped, TagDepth};
use crate::{Diagnostics, WildcardSet, WildcardSource};

mod bracket;
mod command;
mod labels;
mod variable;
mod variant;
mod wildcard;

/// The directive that stands for "nothing here"
pub(crate) const EMPTY: &str = "<comment:empty>";

pub(crate) fn or_empty(text: String) -> String {
    if text.is_empty() {
        EMPTY.to_string()
    } else {
        text
    }
}

lazy_static! {
    static ref QUANTIFIER: Regex = Regex::new(r"^[~@ro]*(\d+-\d+|-\d+|\d+-|\d+)?\$\$").unwrap();
}

const NESTING_OPENS: [char; 2] = ['{', '<'];
const NESTING_CLOSES: [char; 2] = ['}', '>'];

/// The `[flags][count]$$[separator$$]` head of a variant or wildcard body
#[derive(Debug, PartialEq)]
pub(crate) struct Head<'a> {
    pub(crate) count: Option<&'a str>,
    pub(crate) separator: Option<&'a str>,
    pub(crate) rest: &'a str,
}

impl<'a> Head<'a> {
    /// Splits the head off `text`, if it has one. Flags are dropped.
    pub(crate) fn split(text: &'a str) -> Option<Head<'a>> {
        let captures = QUANTIFIER.captures(text)?;
        let count = captures.get(1).map(|m| m.as_str());
        let rest = &text[captures.get(0).map_or(0, |m| m.end())..];
        let separator = find_top_level_str(rest, 0, "$$", &NESTING_OPENS, &NESTING_CLOSES)
            .filter(|at| find_top_level(&rest[..*at], 0, '|', &NESTING_OPENS, &NESTING_CLOSES).is_none());
        Some(match separator {
            Some(at) => Head {
                count,
                separator: Some(&rest[..at]),
                rest: &rest[at + 2..],
            },
            None => Head {
                count,
                separator: None,
                rest,
            },
        })
    }

    /// Renders the directive prefix, `[count,separator]`, or nothing when no
    /// count was given. `-N` gets a lower bound of 1 and `N-` keeps its open
    /// upper bound unless `open_upper` supplies one.
    pub(crate) fn prefix(&self, open_upper: Option<usize>, session: &mut Session<'_, '_>) -> String {
        let count = match self.count {
            Some(count) => count,
            None => return String::new(),
        };
        let count = match count.split_once('-') {
            Some(("", upper)) => format!("1-{}", upper),
            Some((lower, "")) => match (open_upper, lower.parse::<usize>()) {
                (Some(upper), Ok(n)) => format!("{}-{}", n, upper.max(n)),
                _ => format!("{}-", lower),
            },
            _ => count.to_string(),
        };
        let separator = match self.separator {
            Some(sep) if sep.contains(|c: char| matches!(c, '[' | ']' | '>')) => {
                session.warn(format!("separator '{}' cannot be represented and was dropped", sep));
                ""
            }
            Some(sep) => sep,
            None => "",
        };
        format!("[{},{}]", count, separator)
    }
}

/// Converts source syntax into directive text.
///
/// A transpiler never fails: malformed constructs are left as they are and
/// anything it cannot represent is reported through [`Diagnostics`].
///
/// # Examples
/// ```
/// use wildprompt::{Diagnostics, Transpiler};
///
/// let transpiler = Transpiler::new();
/// let mut diagnostics = Diagnostics::new();
/// assert_eq!(
///     transpiler.transpile("{2$$__flavours__} and [[[light]]]", &mut diagnostics),
///     "<wcwildcard[2,]:flavours> and (light:0.729)"
/// );
/// assert!(diagnostics.is_empty());
/// ```
///
/// [`Diagnostics`]: struct.Diagnostics.html
#[derive(Debug, Clone, PartialEq)]
pub struct Transpiler {
    prefix: Option<String>,
    known: BTreeSet<String>,
    max_depth: usize,
}

impl Default for Transpiler {
    fn default() -> Transpiler {
        Transpiler::new()
    }
}

impl Transpiler {
    /// Creates a transpiler with no prefix and no known wildcards
    pub fn new() -> Transpiler {
        Transpiler {
            prefix: None,
            known: BTreeSet::new(),
            max_depth: 64,
        }
    }

    /// Sets a folder prepended to every wildcard reference, then returns the
    /// modified transpiler
    ///
    /// # Examples
    /// ```
    /// use wildprompt::{Diagnostics, Transpiler};
    ///
    /// let transpiler = Transpiler::new().with_prefix("imported/");
    /// let out = transpiler.transpile("__colors__", &mut Diagnostics::new());
    /// assert_eq!(out, "<wcwildcard:imported/colors>");
    /// ```
    pub fn with_prefix<S: AsRef<str>>(mut self, prefix: S) -> Transpiler {
        let prefix = prefix.as_ref().trim_matches('/');
        self.prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
        self
    }

    /// Sets the wildcard names globs are resolved against, then returns the
    /// modified transpiler
    pub fn with_known_wildcards<I, S>(mut self, names: I) -> Transpiler
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_known_wildcards(names);
        self
    }

    /// Sets the wildcard names globs are resolved against
    pub fn set_known_wildcards<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known = names.into_iter().map(Into::into).collect();
    }

    /// Sets how deeply constructs may nest before they are left alone, then
    /// returns the modified transpiler
    pub fn with_max_depth(mut self, max_depth: usize) -> Transpiler {
        self.max_depth = max_depth;
        self
    }

    /// The wildcard names globs are resolved against
    pub fn known_wildcards(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub(crate) fn prefixed(&self, reference: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, reference),
            None => reference.to_string(),
        }
    }

    /// Transpiles one line
    pub fn transpile(&self, line: &str, diagnostics: &mut Diagnostics) -> String {
        let line = labels::rewrite(line);
        let mut session = Session {
            transpiler: self,
            diagnostics,
            depth: 0,
        };
        let output = session.transpile(&line);
        debug!("transpiled {:?} into {:?}", line, output);
        output
    }

    /// Transpiles every line of `text` independently
    ///
    /// # Examples
    /// ```
    /// use wildprompt::{Diagnostics, Transpiler};
    ///
    /// let out = Transpiler::new().transpile_text("{a|b}\n[c|d]", &mut Diagnostics::new());
    /// assert_eq!(out, "<random:a|b>\n<alternate:c||d>");
    /// ```
    pub fn transpile_text(&self, text: &str, diagnostics: &mut Diagnostics) -> String {
        text.split('\n')
            .map(|line| match line.strip_suffix('\r') {
                Some(line) => format!("{}\r", self.transpile(line, diagnostics)),
                None => self.transpile(line, diagnostics),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Transpiles every option of every wildcard in `set`.
    ///
    /// The set's own names are added to the known names for glob resolution.
    pub fn transpile_set(&self, set: &WildcardSet, diagnostics: &mut Diagnostics) -> WildcardSet {
        let mut transpiler = self.clone();
        transpiler.known.extend(set.names().into_iter().map(String::from));
        set.map_options(|_, option| transpiler.transpile(option, diagnostics))
    }
}

/// One run of the pass sequence, tracking recursion depth
pub(crate) struct Session<'t, 'd> {
    transpiler: &'t Transpiler,
    diagnostics: &'d mut Diagnostics,
    depth: usize,
}

impl<'t> Session<'t, '_> {
    pub(crate) fn transpiler(&self) -> &'t Transpiler {
        self.transpiler
    }

    pub(crate) fn warn<S: AsRef<str>>(&mut self, message: S) {
        self.diagnostics.warn(message)
    }

    pub(crate) fn transpile(&mut self, text: &str) -> String {
        if self.depth >= self.transpiler.max_depth {
            let limit = self.transpiler.max_depth;
            self.warn(format!("nesting deeper than {} levels left as is: '{}'", limit, text));
            return text.to_string();
        }
        self.depth += 1;
        trace!("transpiling {:?} at depth {}", text, self.depth);
        let text = wildcard::rewrite(self, text);
        let text = variable::rewrite(self, &text);
        let text = command::rewrite(self, &text);
        let text = bracket::rewrite(self, &text);
        let text = remove_breaks(&text);
        let text = variant::rewrite(self, &text);
        self.depth -= 1;
        text
    }
}

const BREAK: &str = "BREAK";

fn is_break_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| c.is_whitespace() || c == ',')
}

// BREAK only counts as a keyword when it stands alone between whitespace,
// commas or the ends of the text
fn remove_breaks(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut tags = TagDepth::default();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        let outside = tags.step(bytes[i]);
        if outside && bytes[i..].starts_with(BREAK.as_bytes()) && !is_escaped(text, i) {
            let end = i + BREAK.len();
            let before = text[..i].chars().last();
            let after = text[end..].chars().next();
            if is_break_boundary(before) && is_break_boundary(after) {
                out.push_str(&text[copied..i]);
                out.push_str(EMPTY);
                copied = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    fn transpile(line: &str) -> String {
        Transpiler::new().transpile(line, &mut Diagnostics::new())
    }

    #[test]
    fn breaks() {
        assert_eq!(transpile("BREAK"), "<comment:empty>");
        assert_eq!(transpile("hello BREAK world"), "hello <comment:empty> world");
        assert_eq!(transpile("BREAK middle BREAK"), "<comment:empty> middle <comment:empty>");
        assert_eq!(transpile("hello, BREAK! world?"), "hello, BREAK! world?");
        assert_eq!(transpile("hello, BREAK, world"), "hello, <comment:empty>, world");
        assert_eq!(transpile("break Break BREAK"), "break Break <comment:empty>");
        assert_eq!(transpile("BREAKDOWN unBREAKable"), "BREAKDOWN unBREAKable");
        assert_eq!(transpile("_BREAK BREAK_ _BREAK_"), "_BREAK BREAK_ _BREAK_");
        assert_eq!(transpile("hello.BREAK.world"), "hello.BREAK.world");
        assert_eq!(transpile("<wccase[BREAK]>content</wccase>"), "<wccase[BREAK]>content</wccase>");
    }

    #[test]
    fn non_ascii_text() {
        assert_eq!(
            transpile("café __x__ BREAK {a|b} 日本"),
            "café <wcwildcard:x> <comment:empty> <random:a|b> 日本"
        );
        assert_eq!(transpile("über__ünïcode__"), "über<wcwildcard:ünïcode>");
        assert_eq!(transpile("ñBREAK 日BREAK本"), "ñBREAK 日BREAK本");
        assert_eq!(transpile("{äpfel|birnen} · 2$$__obst__"), "<random:äpfel|birnen> · <wcwildcard[2,]:obst>");
    }

    #[test]
    fn breaks_in_protected_places() {
        assert_eq!(transpile("__wildcards/BREAK/foo__"), "<wcwildcard:wildcards/BREAK/foo>");
        assert_eq!(transpile("${BREAK=value}"), "<setmacro[BREAK,false]:value>");
        assert_eq!(transpile("${BREAK}"), "<macro:BREAK>");
        assert_eq!(
            transpile("hello BREAK __path/BREAK/file__ and BREAK ${BREAK=test} more BREAK"),
            "hello <comment:empty> <wcwildcard:path/BREAK/file> and <comment:empty> \
             <setmacro[BREAK,false]:test> more <comment:empty>"
        );
        assert_eq!(transpile("{hello|BREAK|world}"), "<random:hello|<comment:empty>|world>");
    }

    #[test]
    fn canonical_text_is_unchanged() {
        let lines = vec![
            "<random[2,]:a|b> and <wcwildcard:colors:warm>",
            "<wcmatch:<wccase[length(color) eq 0]:red><wccase:<macro:color>>>",
            "(primary)::plain text, (weighted:1.2)",
            "<fromto[5]:girl||boy> <alternate:a||b> <setmacro[x,false]:{y}>",
        ];
        for line in lines {
            assert_eq!(transpile(line), line);
        }
    }

    #[test]
    fn depth_limit() {
        let mut diagnostics = Diagnostics::new();
        let out = Transpiler::new()
            .with_max_depth(2)
            .transpile("{a|{b|{c|d}}}", &mut diagnostics);
        assert_eq!(out, "<random:a|<random:b|{c|d}>>");
        // "b" and "{c|d}" both hit the limit
        assert_eq!(diagnostics.warnings().len(), 2);
    }

    #[test]
    fn heads() {
        let head = Head::split("~r2-3$$ and $$a|b");
        assert_eq!(
            head,
            Some(Head {
                count: Some("2-3"),
                separator: Some(" and "),
                rest: "a|b",
            })
        );
        let head = Head::split("@$$a|b$$c");
        assert_eq!(
            head,
            Some(Head {
                count: None,
                separator: None,
                rest: "a|b$$c",
            })
        );
        assert_eq!(Head::split("robots"), None);
        assert_eq!(Head::split("a|2$$b"), None);
    }

    #[test]
    fn multi_line_text() {
        let out = Transpiler::new().transpile_text("'a'::{x|y}\r\nBREAK", &mut Diagnostics::new());
        assert_eq!(out, "(a)::<random:x|y>\r\n<comment:empty>");
    }

    #[test]
    fn whole_sets() {
        let set = WildcardSet::from_map(hashmap! {
            "colors/warm" => vec!["{red|orange}"],
            "colors/cold" => vec!["blue"],
            "scene" => vec!["__colors/*__ sky"],
        });
        let mut diagnostics = Diagnostics::new();
        let out = Transpiler::new().transpile_set(&set, &mut diagnostics);
        assert_eq!(out.options("colors/warm"), Some(&["<random:red|orange>".to_string()][..]));
        assert_eq!(
            out.options("scene"),
            Some(&["<random:<wcwildcard:colors/cold>|<wcwildcard:colors/warm>> sky".to_string()][..])
        );
        assert!(diagnostics.is_empty());
    }
}
