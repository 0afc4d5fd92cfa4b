//! Escape-aware scanning for nested delimiters.
//!
//! All indices are byte offsets. Every delimiter this crate cares about is
//! ASCII, so scanning bytes never splits a multi-byte character.

/// Returns `true` if the byte at `index` is preceded by an odd number of
/// backslashes.
pub fn is_escaped(text: &str, index: usize) -> bool {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = index;
    while i > 0 && bytes[i - 1] == b'\\' {
        count += 1;
        i -= 1;
    }
    count % 2 == 1
}

fn is(byte: u8, c: char) -> bool {
    byte as char == c
}

/// Finds the closer balancing the opener at `open_index`.
///
/// Escaped characters are skipped. Returns `None` if the text ends before the
/// opener is balanced; callers treat the opener as literal text.
///
/// # Examples
/// ```
/// use wildprompt::delimiter::find_matching_close;
///
/// assert_eq!(find_matching_close("{a|{b}}", 0, '{', '}'), Some(6));
/// assert_eq!(find_matching_close("{a\\}", 0, '{', '}'), None);
/// ```
pub fn find_matching_close(text: &str, open_index: usize, open: char, close: char) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for i in (open_index + 1)..bytes.len() {
        if is_escaped(text, i) {
            continue;
        }
        if is(bytes[i], close) {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        } else if is(bytes[i], open) {
            depth += 1;
        }
    }
    None
}

/// Finds the first `target` at or after `start` where every delimiter pair in
/// `opens`/`closes` is balanced.
///
/// # Examples
/// ```
/// use wildprompt::delimiter::find_top_level;
///
/// let text = "<random:a|b>|c";
/// assert_eq!(find_top_level(text, 0, '|', &['<'], &['>']), Some(12));
/// ```
pub fn find_top_level(
    text: &str,
    start: usize,
    target: char,
    opens: &[char],
    closes: &[char],
) -> Option<usize> {
    let mut buf = [0u8; 4];
    find_top_level_str(text, start, target.encode_utf8(&mut buf), opens, closes)
}

/// Like [`find_top_level`], but looks for a multi-character `pattern` such as
/// `$$` or `::`.
///
/// [`find_top_level`]: fn.find_top_level.html
pub fn find_top_level_str(
    text: &str,
    start: usize,
    pattern: &str,
    opens: &[char],
    closes: &[char],
) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depths = vec![0usize; opens.len()];
    let mut i = start;
    while i < bytes.len() {
        if is_escaped(text, i) {
            i += 1;
            continue;
        }
        if depths.iter().all(|d| *d == 0) && bytes[i..].starts_with(pattern.as_bytes()) {
            return Some(i);
        }
        if let Some(k) = opens.iter().position(|c| is(bytes[i], *c)) {
            depths[k] += 1;
        } else if let Some(k) = closes.iter().position(|c| is(bytes[i], *c)) {
            depths[k] = depths[k].saturating_sub(1);
        }
        i += 1;
    }
    None
}

/// Splits `text` on every top-level occurrence of `separator`.
///
/// # Examples
/// ```
/// use wildprompt::delimiter::split_top_level;
///
/// let parts = split_top_level("a|{b|c}|d\\|e", "|", &['{'], &['}']);
/// assert_eq!(parts, vec!["a", "{b|c}", "d\\|e"]);
/// ```
pub fn split_top_level<'a>(
    text: &'a str,
    separator: &str,
    opens: &[char],
    closes: &[char],
) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(at) = find_top_level_str(text, start, separator, opens, closes) {
        parts.push(&text[start..at]);
        start = at + separator.len();
    }
    parts.push(&text[start..]);
    parts
}

/// Tracks plain `<`/`>` nesting so passes can skip text inside directive tags.
///
/// Not escape-aware: canonical directive text never escapes angle brackets.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TagDepth(usize);

impl TagDepth {
    /// Feeds one byte, returning `true` if it lies outside every tag
    pub(crate) fn step(&mut self, byte: u8) -> bool {
        match byte {
            b'<' => {
                self.0 += 1;
                false
            }
            b'>' => {
                let outside = self.0 == 0;
                self.0 = self.0.saturating_sub(1);
                outside
            }
            _ => self.0 == 0,
        }
    }
}
