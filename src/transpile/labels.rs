//! Choice labels at the start of a line: `'a,b'::text` becomes `(a,b)::text`.

pub(super) fn rewrite(line: &str) -> String {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    let quote = match body.chars().next() {
        Some(q @ '\'') | Some(q @ '"') => q,
        _ => return line.to_string(),
    };
    let close = match body[1..].find(quote) {
        Some(at) => at + 1,
        None => return line.to_string(),
    };
    match body[close + 1..].strip_prefix("::") {
        Some(rest) => format!("{}({})::{}", indent, &body[1..close], rest),
        None => line.to_string(),
    }
}
