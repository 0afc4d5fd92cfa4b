//! Brace variants, `{[flags][count]$$[separator$$]a|b|...}`.

use super::{or_empty, Head, Session};
use crate::delimiter::{find_matching_close, is_escaped, split_top_level, TagDepth};

const OPENS: [char; 2] = ['{', '<'];
const CLOSES: [char; 2] = ['}', '>'];

const WILDCARD: &str = "<wcwildcard:";

// A lone, unprefixed wildcard directive takes the quantifier itself
fn collapse(options: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty()
        || !options.starts_with(WILDCARD)
        || find_matching_close(options, 0, '<', '>') != Some(options.len() - 1)
    {
        return None;
    }
    Some(format!("<wcwildcard{}:{}", prefix, &options[WILDCARD.len()..]))
}

fn convert(session: &mut Session<'_, '_>, content: &str) -> String {
    let (head, options) = match Head::split(content) {
        Some(head) => {
            let options = head.rest;
            (Some(head), options)
        }
        None => (None, content),
    };
    let options: Vec<&str> = split_top_level(options, "|", &OPENS, &CLOSES);
    let prefix = match &head {
        Some(head) => head.prefix(Some(options.len().saturating_sub(1)), session),
        None => String::new(),
    };
    if let [only] = options.as_slice() {
        if let Some(collapsed) = collapse(only, &prefix) {
            return collapsed;
        }
    }
    let options: Vec<String> = options
        .into_iter()
        .map(|option| or_empty(session.transpile(option)))
        .collect();
    format!("<random{}:{}>", prefix, options.join("|"))
}

pub(super) fn rewrite(session: &mut Session<'_, '_>, text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut tags = TagDepth::default();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        let outside = tags.step(bytes[i]);
        let is_variable = i > 0 && bytes[i - 1] == b'$';
        if outside && bytes[i] == b'{' && !is_variable && !is_escaped(text, i) {
            if let Some(close) = find_matching_close(text, i, '{', '}') {
                let converted = convert(session, &text[i + 1..close]);
                out.push_str(&text[copied..i]);
                out.push_str(&converted);
                copied = close + 1;
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}
