//! Square brackets: prompt editing, alternation and negative attention.

use super::{or_empty, Session};
use crate::delimiter::{find_matching_close, find_top_level, is_escaped, split_top_level, TagDepth};

const OPENS: [char; 4] = ['<', '{', '[', '('];
const CLOSES: [char; 4] = ['>', '}', ']', ')'];

const ATTENTION: f64 = 0.9;

fn count_top_level(text: &str, target: char) -> usize {
    let mut count = 0;
    let mut at = 0;
    while let Some(found) = find_top_level(text, at, target, &OPENS, &CLOSES) {
        count += 1;
        at = found + 1;
    }
    count
}

fn format_weight(weight: f64) -> String {
    let text = format!("{:.3}", weight);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

// `(text:weight)` spanning the whole of `text`
fn as_weighted(text: &str) -> Option<(&str, f64)> {
    if !text.starts_with('(') || find_matching_close(text, 0, '(', ')') != Some(text.len() - 1) {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    let (content, weight) = inner.rsplit_once(':')?;
    Some((content, weight.parse().ok()?))
}

fn convert(session: &mut Session<'_, '_>, content: &str) -> String {
    if count_top_level(content, ':') == 2 {
        let parts = split_top_level(content, ":", &OPENS, &CLOSES);
        let mut parts: Vec<String> = parts
            .into_iter()
            .map(|part| or_empty(session.transpile(part)))
            .collect();
        let step = parts.pop().unwrap_or_default();
        return format!("<fromto[{}]:{}>", step, parts.join("||"));
    }
    if count_top_level(content, '|') > 0 {
        let options: Vec<String> = split_top_level(content, "|", &OPENS, &CLOSES)
            .into_iter()
            .map(|option| or_empty(session.transpile(option)))
            .collect();
        return format!("<alternate:{}>", options.join("||"));
    }
    let inner = session.transpile(content);
    match as_weighted(&inner) {
        Some((text, weight)) => format!("({}:{})", text, format_weight(weight * ATTENTION)),
        None => format!("({}:{})", inner, ATTENTION),
    }
}

pub(super) fn rewrite(session: &mut Session<'_, '_>, text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut tags = TagDepth::default();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        let outside = tags.step(bytes[i]);
        if outside && bytes[i] == b'[' && !is_escaped(text, i) {
            if let Some(close) = find_matching_close(text, i, '[', ']') {
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
