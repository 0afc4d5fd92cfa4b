//! Wildcard references, `__[flags][count]$$[separator$$]name['filter']__`.

use lazy_static::lazy_static;
use regex::Regex;

use super::{Head, Session};
use crate::delimiter::{find_top_level, find_top_level_str, is_escaped, TagDepth};
use crate::glob;

lazy_static! {
    static ref LEADING_COUNT: Regex = Regex::new(r"(\d+(?:-\d+)?)\$\$$").unwrap();
}

const OPENS: [char; 2] = ['<', '{'];
const CLOSES: [char; 2] = ['>', '}'];

/// What a quoted label filter asks for
#[derive(Debug, PartialEq)]
enum Filter {
    /// Filter the draw and remember the filter
    Apply(String),
    /// Reuse the filter remembered for another wildcard
    Inherit(String),
    /// Remember the filter without applying it
    Define(String),
}

fn macro_name(reference: &str) -> String {
    format!("wcfilter_{}", reference.replace('/', "_"))
}

// Filter indices are written 0-based and drawn 1-based
fn shift_indices(filter: &str) -> String {
    filter
        .split(',')
        .map(|entry| match entry.trim().parse::<usize>() {
            Ok(index) if entry.trim().bytes().all(|b| b.is_ascii_digit()) => (index + 1).to_string(),
            _ => entry.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

// Splits a trailing quoted filter off the reference
fn split_filter(rest: &str) -> (&str, Option<&str>) {
    let quote = match rest.chars().last() {
        Some(q @ '\'') | Some(q @ '"') if !is_escaped(rest, rest.len() - 1) => q,
        _ => return (rest, None),
    };
    match find_top_level(rest, 0, quote, &OPENS, &CLOSES) {
        Some(open) if open < rest.len() - 1 => (&rest[..open], Some(&rest[open + 1..rest.len() - 1])),
        _ => (rest, None),
    }
}

fn parse_filter(session: &mut Session<'_, '_>, raw: &str) -> Filter {
    if let Some(source) = raw.strip_prefix('^') {
        let source = session.transpile(source.trim());
        Filter::Inherit(session.transpiler().prefixed(&source))
    } else if let Some(labels) = raw.strip_prefix('#') {
        Filter::Define(shift_indices(&session.transpile(labels)))
    } else {
        Filter::Apply(shift_indices(&session.transpile(raw)))
    }
}

fn glob_references(session: &mut Session<'_, '_>, pattern: &str, prefix: &str, filter: Option<&Filter>) -> String {
    let transpiler = session.transpiler();
    let matches = match glob::resolve(pattern, transpiler.known_wildcards()) {
        Ok(matches) => matches,
        Err(e) => {
            session.warn(format!("bad glob '{}': {}", pattern, e));
            Vec::new()
        }
    };
    let suffix = match filter {
        Some(Filter::Apply(labels)) => format!(":{}", labels),
        Some(Filter::Inherit(source)) => format!(":<wcmacro:{}>", macro_name(source)),
        Some(Filter::Define(_)) | None => String::new(),
    };
    let references: Vec<String> = matches.iter().map(|m| transpiler.prefixed(m)).collect();
    match references.as_slice() {
        [] => {
            session.warn(format!("no glob matches for '{}'", pattern));
            format!("<wcwildcard:{}><comment:no glob matches>", transpiler.prefixed(pattern))
        }
        [only] => format!("<wcwildcard{}:{}{}>", prefix, only, suffix),
        _ => {
            let options: Vec<String> = references
                .iter()
                .map(|r| format!("<wcwildcard:{}{}>", r, suffix))
                .collect();
            format!("<random{}:{}>", prefix, options.join("|"))
        }
    }
}

fn convert(session: &mut Session<'_, '_>, body: &str) -> String {
    let head = Head::split(body);
    let rest = head.as_ref().map_or(body, |head| head.rest);
    let prefix = match &head {
        Some(head) => head.prefix(None, session),
        None => String::new(),
    };
    let (name, filter) = split_filter(rest);
    let name = session.transpile(name);
    let filter = filter.map(|raw| parse_filter(session, raw));

    if glob::is_glob(&name) && !name.contains('<') {
        return glob_references(session, &name, &prefix, filter.as_ref());
    }
    let reference = session.transpiler().prefixed(&name);
    let holder = macro_name(&reference);
    match filter {
        None => format!("<wcwildcard{}:{}>", prefix, reference),
        Some(Filter::Define(labels)) => format!(
            "<wcpushmacro[{h}]:{}><wcwildcard{}:{}><wcpopmacro:{h}>",
            labels,
            prefix,
            reference,
            h = holder
        ),
        Some(Filter::Apply(labels)) => format!(
            "<wcpushmacro[{h}]:{l}><wcwildcard{}:{}:{l}><wcpopmacro:{h}>",
            prefix,
            reference,
            h = holder,
            l = labels
        ),
        Some(Filter::Inherit(source)) => format!(
            "<wcpushmacro[{h}]:<wcmacro:{s}>><wcwildcard{}:{}:<wcmacro:{s}>><wcpopmacro:{h}>",
            prefix,
            reference,
            h = holder,
            s = macro_name(&source)
        ),
    }
}

// A `N$$` or `N-M$$` run written just before the underscores. Inside a
// variant (`{2$$__x__}`, `{~r2$$__x__}`) the count belongs to the variant.
fn leading_count(before: &str) -> Option<(usize, &str)> {
    let found = LEADING_COUNT.captures(before)?;
    let run = found.get(0)?;
    let flagless = before[..run.start()]
        .trim_end_matches(|c: char| matches!(c, '~' | '@' | 'r' | 'o'));
    if flagless.ends_with('{') {
        return None;
    }
    Some((run.start(), found.get(1)?.as_str()))
}

pub(super) fn rewrite(session: &mut Session<'_, '_>, text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut tags = TagDepth::default();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        let outside = tags.step(bytes[i]);
        if outside && bytes[i..].starts_with(b"__") && !is_escaped(text, i) {
            let end = find_top_level_str(text, i + 2, "__", &OPENS, &CLOSES);
            let body = end.map(|end| &text[i + 2..end]);
            if let (Some(end), Some(body)) = (end, body) {
                let trimmed = !body.is_empty()
                    && !body.starts_with(char::is_whitespace)
                    && !body.ends_with(char::is_whitespace);
                if trimmed {
                    let before = &text[copied..i];
                    let leading = leading_count(before).filter(|_| Head::split(body).is_none());
                    let converted = match leading {
                        Some((start, count)) => {
                            out.push_str(&before[..start]);
                            convert(session, &format!("{}$${}", count, body))
                        }
                        None => {
                            out.push_str(before);
                            convert(session, body)
                        }
                    };
                    out.push_str(&converted);
                    copied = end + 2;
                    i = end + 2;
                    continue;
                }
            }
            // an unmatched `__` is plain text
            tags.step(bytes[i + 1]);
            i += 2;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Diagnostics, Transpiler};

    fn transpile(line: &str) -> String {
        Transpiler::new().transpile(line, &mut Diagnostics::new())
    }

    fn with_files(line: &str, files: &[&str]) -> String {
        Transpiler::new()
            .with_known_wildcards(files.iter().copied())
            .transpile(line, &mut Diagnostics::new())
    }

    #[test]
    fn references() {
        assert_eq!(transpile("__season__ is coming"), "<wcwildcard:season> is coming");
        assert_eq!(
            transpile("__clothing/shirts__ and __clothing/pants__"),
            "<wcwildcard:clothing/shirts> and <wcwildcard:clothing/pants>"
        );
        assert_eq!(transpile("__special-chars_123__"), "<wcwildcard:special-chars_123>");
        assert_eq!(transpile("__incomplete"), "__incomplete");
        assert_eq!(transpile("snake __ case __ text"), "snake __ case __ text");
    }

    #[test]
    fn quantifiers() {
        assert_eq!(transpile("I like __2$$colors__"), "I like <wcwildcard[2,]:colors>");
        assert_eq!(transpile("__2-3$$animals__"), "<wcwildcard[2-3,]:animals>");
        assert_eq!(transpile("__-2$$flavors__"), "<wcwildcard[1-2,]:flavors>");
        assert_eq!(transpile("__2-$$flavors__"), "<wcwildcard[2-,]:flavors>");
        assert_eq!(transpile("__@~ro$$styles__"), "<wcwildcard:styles>");
        assert_eq!(transpile("__@~ro2$$moods__"), "<wcwildcard[2,]:moods>");
        assert_eq!(transpile("__2$$ and $$colors__"), "<wcwildcard[2, and ]:colors>");
        assert_eq!(transpile("__@~ro2-3$$ with $$themes__"), "<wcwildcard[2-3, with ]:themes>");
        assert_eq!(transpile("__$$colors__"), "<wcwildcard:colors>");
        assert_eq!(transpile("I like {__2$$colors__|blue}"), "I like <random:<wcwildcard[2,]:colors>|blue>");
    }

    #[test]
    fn leading_counts() {
        assert_eq!(transpile("2$$__color__"), "<wcwildcard[2,]:color>");
        assert_eq!(transpile("a 1-3$$__color__ b"), "a <wcwildcard[1-3,]:color> b");
        assert_eq!(transpile("32$$__word__, 2$$__x'warm'__"), "<wcwildcard[32,]:word>, \
             <wcpushmacro[wcfilter_x]:warm><wcwildcard[2,]:x:warm><wcpopmacro:wcfilter_x>");
        // a variant keeps the count for itself
        assert_eq!(transpile("{2$$__flavours__}"), "<wcwildcard[2,]:flavours>");
        assert_eq!(transpile("{~r2$$__flavours__}"), "<wcwildcard[2,]:flavours>");
        assert_eq!(transpile("{2$$__a__|__b__}"), "<random[2,]:<wcwildcard:a>|<wcwildcard:b>>");
        // a count inside the underscores wins
        assert_eq!(transpile("2$$__3$$x__"), "2$$<wcwildcard[3,]:x>");
        assert_eq!(transpile("$$__x__"), "$$<wcwildcard:x>");
    }

    #[test]
    fn nested_names() {
        assert_eq!(
            transpile("My favorite breed is __{cat|dog}s__"),
            "My favorite breed is <wcwildcard:<random:cat|dog>s>"
        );
        assert_eq!(
            transpile("__scenes/${scene}/clothed_state__"),
            "<wcwildcard:scenes/<macro:scene>/clothed_state>"
        );
        assert_eq!(transpile("__${a}/${b}__"), "<wcwildcard:<macro:a>/<macro:b>>");
        assert_eq!(
            transpile("__scenes/${scene}/{${mood}|happy}__"),
            "<wcwildcard:scenes/<macro:scene>/<random:<macro:mood>|happy>>"
        );
    }

    #[test]
    fn globs() {
        let files = ["colors-cold", "colors-warm"];
        assert_eq!(
            with_files("__colors*__ are nice", &files),
            "<random:<wcwildcard:colors-cold>|<wcwildcard:colors-warm>> are nice"
        );
        assert_eq!(
            with_files("__2$$ and $$colors*__", &files),
            "<random[2, and ]:<wcwildcard:colors-cold>|<wcwildcard:colors-warm>>"
        );
        assert_eq!(
            with_files("__artists/**__", &["artists/finnish", "artists/dutch"]),
            "<random:<wcwildcard:artists/dutch>|<wcwildcard:artists/finnish>>"
        );
        assert_eq!(with_files("__unique*__", &["unique-file"]), "<wcwildcard:unique-file>");
        assert_eq!(with_files("__2$$unique*__", &["unique-file"]), "<wcwildcard[2,]:unique-file>");

        let mut diagnostics = Diagnostics::new();
        let out = Transpiler::new().transpile("__nonexistent*__ test", &mut diagnostics);
        assert_eq!(out, "<wcwildcard:nonexistent*><comment:no glob matches> test");
        assert_eq!(diagnostics.warnings().len(), 1);
    }

    #[test]
    fn filters() {
        let filtered = "<wcpushmacro[wcfilter_colors]:primary><wcwildcard:colors:primary>\
                        <wcpopmacro:wcfilter_colors>";
        assert_eq!(transpile("__colors'primary'__"), filtered);
        assert_eq!(transpile("__colors\"primary\"__"), filtered);
        assert_eq!(
            transpile("__2$$ and $$colors'warm'__"),
            "<wcpushmacro[wcfilter_colors]:warm><wcwildcard[2, and ]:colors:warm>\
             <wcpopmacro:wcfilter_colors>"
        );
        assert_eq!(
            transpile("__styles'^colors'__"),
            "<wcpushmacro[wcfilter_styles]:<wcmacro:wcfilter_colors>>\
             <wcwildcard:styles:<wcmacro:wcfilter_colors>><wcpopmacro:wcfilter_styles>"
        );
        assert_eq!(
            transpile("__colors'#primary,bright'__"),
            "<wcpushmacro[wcfilter_colors]:primary,bright><wcwildcard:colors>\
             <wcpopmacro:wcfilter_colors>"
        );
        assert_eq!(
            transpile("__items'1,special'__"),
            "<wcpushmacro[wcfilter_items]:2,special><wcwildcard:items:2,special>\
             <wcpopmacro:wcfilter_items>"
        );
        assert_eq!(
            transpile("__colors''__"),
            "<wcpushmacro[wcfilter_colors]:><wcwildcard:colors:><wcpopmacro:wcfilter_colors>"
        );
        assert_eq!(
            transpile("__themes/modern'sleek'__"),
            "<wcpushmacro[wcfilter_themes_modern]:sleek><wcwildcard:themes/modern:sleek>\
             <wcpopmacro:wcfilter_themes_modern>"
        );
        assert_eq!(
            transpile("__styles'<macro:genre>+<macro:theme>'__"),
            "<wcpushmacro[wcfilter_styles]:<macro:genre>+<macro:theme>>\
             <wcwildcard:styles:<macro:genre>+<macro:theme>><wcpopmacro:wcfilter_styles>"
        );
        assert_eq!(
            with_files("__colors*'warm'__", &["colors-cold", "colors-warm"]),
            "<random:<wcwildcard:colors-cold:warm>|<wcwildcard:colors-warm:warm>>"
        );
    }

    #[test]
    fn prefix() {
        let transpiler = Transpiler::new()
            .with_prefix("imported")
            .with_known_wildcards(vec!["colors-cold", "colors-warm"]);
        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            transpiler.transpile("__colors*__ __x'^y'__", &mut diagnostics),
            "<random:<wcwildcard:imported/colors-cold>|<wcwildcard:imported/colors-warm>> \
             <wcpushmacro[wcfilter_imported_x]:<wcmacro:wcfilter_imported_y>>\
             <wcwildcard:imported/x:<wcmacro:wcfilter_imported_y>><wcpopmacro:wcfilter_imported_x>"
        );
    }

    #[test]
    fn filter_parts() {
        assert_eq!(split_filter("colors'warm'"), ("colors", Some("warm")));
        assert_eq!(split_filter("colors"), ("colors", None));
        assert_eq!(split_filter("colors'"), ("colors'", None));
        assert_eq!(shift_indices("0,3,warm+!bright"), "1,4,warm+!bright");
    }
}
