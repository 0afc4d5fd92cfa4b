//! `${...}` variable reads, defaults and assignments.

use super::{or_empty, Session};
use crate::delimiter::{find_matching_close, is_escaped};

/// How an assignment combines with the existing value
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Assign {
    Set,
    Add,
    IfUndefined,
}

/// Builds the directives for an assignment. `value` is already transpiled.
pub(super) fn assignment(name: &str, value: &str, assign: Assign, immediate: bool) -> String {
    match (assign, immediate) {
        (Assign::Set, false) => format!("<setmacro[{},false]:{}>", name, value),
        (Assign::Set, true) => format!(
            "<setvar[{n},false]:{}><setmacro[{n},false]:<var:{n}>>",
            value,
            n = name
        ),
        (Assign::Add, false) => format!("<wcaddmacro[{}]:, {}>", name, value),
        (Assign::Add, true) => format!(
            "<setvar[{n},false]:<macro:{n}>, {}><setmacro[{n},false]:<var:{n}>>",
            value,
            n = name
        ),
        (Assign::IfUndefined, immediate) => format!(
            "<wcmatch:<wccase[length({}) eq 0]:{}>>",
            name,
            assignment(name, value, Assign::Set, immediate)
        ),
    }
}

/// Builds a read of `name` that falls back to `default` when the value is
/// empty. `default` is already transpiled.
pub(super) fn read(name: &str, default: &str) -> String {
    if default.is_empty() {
        format!("<macro:{}>", name)
    } else {
        format!(
            "<wcmatch:<wccase[length({n}) eq 0]:{}><wccase:<macro:{n}>>>",
            default,
            n = name
        )
    }
}

enum Operator {
    Read,
    Default,
    Assign(Assign),
}

// The name runs up to the first operator
fn split_operator(content: &str) -> (&str, Operator, &str) {
    for (i, c) in content.char_indices() {
        let rest = &content[i..];
        let found = match c {
            ':' => Some((Operator::Default, 1)),
            '=' => Some((Operator::Assign(Assign::Set), 1)),
            '+' if rest.starts_with("+=") => Some((Operator::Assign(Assign::Add), 2)),
            '?' if rest.starts_with("?=") => Some((Operator::Assign(Assign::IfUndefined), 2)),
            _ => None,
        };
        if let Some((operator, width)) = found {
            return (&content[..i], operator, &content[i + width..]);
        }
    }
    (content, Operator::Read, "")
}

fn convert(session: &mut Session<'_, '_>, content: &str) -> Option<String> {
    let (name, operator, rest) = split_operator(content);
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(match operator {
        Operator::Read => read(name, ""),
        Operator::Default => {
            let default = session.transpile(rest);
            read(name, &default)
        }
        Operator::Assign(assign) => {
            let (immediate, value) = match rest.strip_prefix('!') {
                Some(value) => (true, value),
                None => (false, rest),
            };
            let value = or_empty(session.transpile(value));
            assignment(name, &value, assign, immediate)
        }
    })
}

pub(super) fn rewrite(session: &mut Session<'_, '_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(found) = text[search..].find("${") {
        let start = search + found;
        search = start + 2;
        if is_escaped(text, start) {
            continue;
        }
        let close = match find_matching_close(text, start + 1, '{', '}') {
            Some(close) => close,
            None => continue,
        };
        if let Some(replacement) = convert(session, &text[start + 2..close]) {
            out.push_str(&text[copied..start]);
            out.push_str(&replacement);
            copied = close + 1;
            search = close + 1;
        }
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use crate::{Diagnostics, Transpiler};

    fn transpile(line: &str) -> String {
        Transpiler::new().transpile(line, &mut Diagnostics::new())
    }

    #[test]
    fn reads_and_defaults() {
        assert_eq!(transpile("${color}"), "<macro:color>");
        assert_eq!(
            transpile("${color:red}"),
            "<wcmatch:<wccase[length(color) eq 0]:red><wccase:<macro:color>>>"
        );
        assert_eq!(transpile("${color:}"), "<macro:color>");
        assert_eq!(
            transpile("${time:12:30}"),
            "<wcmatch:<wccase[length(time) eq 0]:12:30><wccase:<macro:time>>>"
        );
        assert_eq!(
            transpile("${my_var-123:default}"),
            "<wcmatch:<wccase[length(my_var-123) eq 0]:default><wccase:<macro:my_var-123>>>"
        );
        assert_eq!(
            transpile("${mood:{happy|sad}}"),
            "<wcmatch:<wccase[length(mood) eq 0]:<random:happy|sad>><wccase:<macro:mood>>>"
        );
        assert_eq!(
            transpile("${name} likes ${color:blue}"),
            "<macro:name> likes <wcmatch:<wccase[length(color) eq 0]:blue><wccase:<macro:color>>>"
        );
    }

    #[test]
    fn assignments() {
        assert_eq!(
            transpile("${color=red} The ${color} car"),
            "<setmacro[color,false]:red> The <macro:color> car"
        );
        assert_eq!(
            transpile("${color=!red}"),
            "<setvar[color,false]:red><setmacro[color,false]:<var:color>>"
        );
        assert_eq!(transpile("${color+=blue}"), "<wcaddmacro[color]:, blue>");
        assert_eq!(
            transpile("${mood+=!{happy|excited}}"),
            "<setvar[mood,false]:<macro:mood>, <random:happy|excited>><setmacro[mood,false]:<var:mood>>"
        );
        assert_eq!(
            transpile("${color?=green}"),
            "<wcmatch:<wccase[length(color) eq 0]:<setmacro[color,false]:green>>>"
        );
        assert_eq!(
            transpile("${color?=!green}"),
            "<wcmatch:<wccase[length(color) eq 0]:<setvar[color,false]:green>\
             <setmacro[color,false]:<var:color>>>>"
        );
        assert_eq!(transpile("${color=}"), "<setmacro[color,false]:<comment:empty>>");
    }

    #[test]
    fn values_are_transpiled() {
        assert_eq!(
            transpile("${season=!__season__}${year={2000|2010|2020}} The ${season} of ${year}"),
            "<setvar[season,false]:<wcwildcard:season>><setmacro[season,false]:<var:season>>\
             <setmacro[year,false]:<random:2000|2010|2020>> The <macro:season> of <macro:year>"
        );
        assert_eq!(
            transpile("${colors={2$$red|blue|green}} palette"),
            "<setmacro[colors,false]:<random[2,]:red|blue|green>> palette"
        );
        assert_eq!(
            transpile("${clothed_state={__scenes/${scene}/clothed_state__}}"),
            "<setmacro[clothed_state,false]:<random:<wcwildcard:scenes/<macro:scene>/clothed_state>>>"
        );
    }

    #[test]
    fn malformed_is_literal() {
        assert_eq!(transpile("${color=red car"), "${color=red car");
        assert_eq!(transpile("\\${color}"), "\\${color}");
        assert_eq!(transpile("${=red}"), "${=red}");
    }
}
