//! Glob resolution of wildcard references against known wildcard names.
use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

/// Returns `true` if the reference contains glob characters
pub fn is_glob(reference: &str) -> bool {
    reference.contains('*')
}

/// Translates a glob into an anchored, case-insensitive regex.
///
/// `**` matches any sequence including `/`, a lone `*` any sequence except
/// `/`. Everything else matches literally.
pub fn compile(pattern: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut rest = pattern;
    while let Some(star) = rest.find('*') {
        source.push_str(&regex::escape(&rest[..star]));
        if rest[star..].starts_with("**") {
            source.push_str(".*");
            rest = &rest[star + 2..];
        } else {
            source.push_str("[^/]*");
            rest = &rest[star + 1..];
        }
    }
    source.push_str(&regex::escape(rest));
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::ParseError(format!("bad glob '{}': {}", pattern, e)))
}

/// Returns every known name matching `pattern`, sorted.
///
/// # Examples
/// ```
/// # use wildprompt::Result;
/// # fn main() -> Result<()> {
/// let known = vec!["colors/warm", "colors/cold", "colors/dark/deep", "animals"];
/// let matches = wildprompt::glob::resolve("Colors/*", known.iter().copied())?;
/// assert_eq!(matches, vec!["colors/cold", "colors/warm"]);
///
/// let matches = wildprompt::glob::resolve("colors/**", known.iter().copied())?;
/// assert_eq!(matches.len(), 3);
/// # Ok(())
/// # }
/// ```
pub fn resolve<'a, I>(pattern: &str, known: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let matcher = compile(pattern)?;
    let mut matches: Vec<String> = known
        .into_iter()
        .filter(|name| matcher.is_match(name))
        .map(String::from)
        .collect();
    matches.sort();
    matches.dedup();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_star_stops_at_separator() -> Result<()> {
        let re = compile("colors-*")?;
        assert!(re.is_match("colors-cold"));
        assert!(re.is_match("COLORS-warm"));
        assert!(!re.is_match("colors-cold/deep"));
        assert!(!re.is_match("my-colors-cold"));
        Ok(())
    }

    #[test]
    fn double_star_crosses_separator() -> Result<()> {
        let re = compile("artists/**")?;
        assert!(re.is_match("artists/painters/dutch"));
        assert!(!re.is_match("artist"));
        Ok(())
    }

    #[test]
    fn escapes_literal_parts() -> Result<()> {
        let re = compile("a.b*")?;
        assert!(re.is_match("a.bc"));
        assert!(!re.is_match("axbc"));
        Ok(())
    }

    #[test]
    fn no_matches() -> Result<()> {
        let known = ["colors"];
        assert!(resolve("nothing*", known.iter().copied())?.is_empty());
        assert!(is_glob("x*"));
        assert!(!is_glob("x"));
        Ok(())
    }
}
