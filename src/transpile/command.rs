//! `<ppp:...>` block commands: set, echo, if/elif/else and stn.

use lazy_static::lazy_static;
use regex::Regex;

use super::variable::{self, Assign};
use super::{or_empty, Session};

lazy_static! {
    static ref STN_MARKER: Regex = Regex::new(r"(?i)<ppp:stn\s+i\d+>").unwrap();
}

const OPEN: &str = "<ppp:";

/// An opening command tag, `<ppp:keyword args>`
struct Opener<'a> {
    start: usize,
    end: usize,
    keyword: String,
    args: &'a str,
}

fn opener_at(text: &str, start: usize) -> Option<Opener<'_>> {
    let after = &text[start + OPEN.len()..];
    let keyword_len = after
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(after.len());
    if keyword_len == 0 {
        return None;
    }
    let close = after.find('>')?;
    if close < keyword_len {
        return None;
    }
    let args = &after[keyword_len..close];
    if !args.is_empty() && !args.starts_with(char::is_whitespace) {
        return None;
    }
    Some(Opener {
        start,
        end: start + OPEN.len() + close + 1,
        keyword: after[..keyword_len].to_lowercase(),
        args,
    })
}

fn closer(keyword: &str) -> String {
    format!("<ppp:/{}>", keyword)
}

fn find_from(text: &str, from: usize, pattern: &str) -> Option<usize> {
    text.get(from..)?.find(pattern).map(|at| at + from)
}

// Finds the closer balancing an opener, counting nested openers of the same
// keyword. Returns the closer's start index.
fn find_balanced_closer(text: &str, from: usize, keyword: &str) -> Option<usize> {
    let closer = closer(keyword);
    let mut depth = 0usize;
    let mut at = from;
    loop {
        let next_close = find_from(text, at, &closer)?;
        match find_from(text, at, OPEN).filter(|open| *open < next_close) {
            Some(open) => match opener_at(text, open) {
                Some(opener) if opener.keyword == keyword => {
                    depth += 1;
                    at = opener.end;
                }
                _ => at = open + OPEN.len(),
            },
            None if depth == 0 => return Some(next_close),
            None => {
                depth -= 1;
                at = next_close + closer.len();
            }
        }
    }
}

/// A finished conversion: the text to emit and where the source construct ends
struct Converted {
    text: String,
    end: usize,
}

fn convert_set(session: &mut Session<'_, '_>, text: &str, opener: &Opener<'_>) -> Option<Converted> {
    let mut words = opener.args.split_whitespace();
    let name = words.next()?;
    let (mut immediate, mut add, mut if_undefined) = (false, false, false);
    for word in words {
        match word.to_lowercase().as_str() {
            "evaluate" => immediate = true,
            "add" => add = true,
            "ifundefined" => if_undefined = true,
            other => session.warn(format!("unknown set modifier '{}' ignored", other)),
        }
    }
    if add && if_undefined {
        session.warn(format!("set '{}' cannot combine add and ifundefined", name));
        return None;
    }
    let close = find_from(text, opener.end, &closer("set"))?;
    let value = or_empty(session.transpile(&text[opener.end..close]));
    let assign = if add {
        Assign::Add
    } else if if_undefined {
        Assign::IfUndefined
    } else {
        Assign::Set
    };
    Some(Converted {
        text: variable::assignment(name, &value, assign, immediate),
        end: close + closer("set").len(),
    })
}

fn convert_echo(session: &mut Session<'_, '_>, text: &str, opener: &Opener<'_>) -> Option<Converted> {
    let name = opener.args.trim();
    if name.is_empty() {
        return None;
    }
    let closer = closer("echo");
    let paired = find_from(text, opener.end, &closer).filter(|close| {
        find_from(text, opener.end, "<ppp:echo")
            .map_or(true, |next| next > *close)
    });
    Some(match paired {
        Some(close) => {
            let default = session.transpile(&text[opener.end..close]);
            Converted {
                text: variable::read(name, &default),
                end: close + closer.len(),
            }
        }
        None => Converted {
            text: variable::read(name, ""),
            end: opener.end,
        },
    })
}

fn negated(op: &str) -> Option<&'static str> {
    Some(match op {
        "eq" => "ne",
        "ne" => "eq",
        "gt" => "le",
        "le" => "gt",
        "lt" => "ge",
        "ge" => "lt",
        _ => return None,
    })
}

/// Compiles `name [not] [op value]` into an expression, `None` if the
/// condition is malformed
fn compile_condition(session: &mut Session<'_, '_>, condition: &str) -> Option<String> {
    let condition = condition.trim();
    let (name, rest) = match condition.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (condition, ""),
    };
    if name.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some(name.to_string());
    }
    let (negate, rest) = match rest.split_once(char::is_whitespace) {
        Some((word, after)) if word.eq_ignore_ascii_case("not") => (true, after.trim_start()),
        _ if rest.eq_ignore_ascii_case("not") => return Some(format!("not {}", name)),
        _ => (false, rest),
    };
    let (op, value) = match rest.split_once(char::is_whitespace) {
        Some((op, value)) => (op.to_lowercase(), value.trim()),
        None => (rest.to_lowercase(), ""),
    };
    let values: Vec<&str> = match value.strip_prefix('(') {
        Some(list) => match list.strip_suffix(')') {
            Some(list) => list.split(',').map(str::trim).collect(),
            None => {
                session.warn(format!("unclosed value list in condition '{}'", condition));
                return None;
            }
        },
        None => vec![value],
    };
    let terms: Vec<String> = match op.as_str() {
        "contains" => values
            .iter()
            .map(|v| {
                let call = format!("contains({}, {})", name, v);
                if negate {
                    format!("not {}", call)
                } else {
                    call
                }
            })
            .collect(),
        "in" => {
            let op = if negate { "ne" } else { "eq" };
            values.iter().map(|v| format!("{} {} {}", name, op, v)).collect()
        }
        "eq" | "ne" | "gt" | "lt" | "ge" | "le" => {
            let op = if negate { negated(&op).unwrap_or("ne") } else { op.as_str() };
            values.iter().map(|v| format!("{} {} {}", name, op, v)).collect()
        }
        _ => {
            session.warn(format!("unknown condition operator '{}' passed through", op));
            let not = if negate { "not " } else { "" };
            return Some(format!("{} {}{} {}", name, not, op, value).trim_end().to_string());
        }
    };
    Some(terms.join(if negate { " && " } else { " || " }))
}

fn convert_if(session: &mut Session<'_, '_>, text: &str, opener: &Opener<'_>) -> Option<Converted> {
    let first = compile_condition(session, opener.args)?;
    let close = find_balanced_closer(text, opener.end, "if")?;
    let body = &text[opener.end..close];

    // split the body on elif/else tags that belong to this if
    let mut branches = Vec::new();
    let mut condition = Some(first);
    let mut branch_start = 0;
    let mut depth = 0usize;
    let mut at = 0;
    while let Some(found) = find_from(body, at, OPEN) {
        let tag = match opener_at(body, found) {
            Some(tag) => tag,
            None => {
                let is_if_closer = body[found..].starts_with(&closer("if"));
                if is_if_closer {
                    depth = depth.saturating_sub(1);
                }
                at = found + OPEN.len();
                continue;
            }
        };
        match tag.keyword.as_str() {
            "if" => depth += 1,
            "elif" | "else" if depth == 0 => {
                branches.push((condition.take(), &body[branch_start..found]));
                condition = if tag.keyword == "elif" {
                    Some(compile_condition(session, tag.args)?)
                } else {
                    None
                };
                branch_start = tag.end;
            }
            _ => {}
        }
        at = tag.end;
    }
    branches.push((condition, &body[branch_start..]));

    let mut out = String::from("<wcmatch:");
    for (condition, branch) in branches {
        let branch = or_empty(session.transpile(branch));
        match condition {
            Some(condition) => out.push_str(&format!("<wccase[{}]:{}>", condition, branch)),
            None => out.push_str(&format!("<wccase:{}>", branch)),
        }
    }
    out.push('>');
    Some(Converted {
        text: out,
        end: close + closer("if").len(),
    })
}

fn convert_stn(session: &mut Session<'_, '_>, text: &str, opener: &Opener<'_>) -> Option<Converted> {
    let close = find_balanced_closer(text, opener.end, "stn")?;
    let position = opener.args.trim().to_lowercase();
    let append = match position.as_str() {
        "" | "s" => false,
        "e" => true,
        p if p.starts_with('p') && p.len() > 1 && p[1..].bytes().all(|b| b.is_ascii_digit()) => {
            session.warn(format!("negative insertion point '{}' unsupported, appending", position));
            true
        }
        _ => {
            session.warn(format!("unknown negative position '{}', using start", position));
            false
        }
    };
    let content = session.transpile(&text[opener.end..close]);
    let text = if append {
        format!("<wcnegative:, {}>", content)
    } else {
        format!("<wcnegative[prepend]:{}, >", content)
    };
    Some(Converted {
        text,
        end: close + closer("stn").len(),
    })
}

fn remove_markers(session: &mut Session<'_, '_>, text: &str) -> String {
    if !STN_MARKER.is_match(text) {
        return text.to_string();
    }
    for marker in STN_MARKER.find_iter(text) {
        session.warn(format!("negative insertion marker '{}' removed", marker.as_str()));
    }
    STN_MARKER.replace_all(text, "").into_owned()
}

pub(super) fn rewrite(session: &mut Session<'_, '_>, text: &str) -> String {
    let text = remove_markers(session, text);
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(start) = find_from(&text, search, OPEN) {
        search = start + OPEN.len();
        let opener = match opener_at(&text, start) {
            Some(opener) => opener,
            None => continue,
        };
        let converted = match opener.keyword.as_str() {
            "set" => convert_set(session, &text, &opener),
            "echo" => convert_echo(session, &text, &opener),
            "if" => convert_if(session, &text, &opener),
            "stn" => convert_stn(session, &text, &opener),
            _ => None,
        };
        match converted {
            Some(converted) => {
                out.push_str(&text[copied..opener.start]);
                out.push_str(&converted.text);
                copied = converted.end;
                search = converted.end;
            }
            None => search = opener.end,
        }
    }
    out.push_str(&text[copied..]);
    out
}
