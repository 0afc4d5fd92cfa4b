use std::collections::BTreeMap;

#[cfg(feature = "wildcard_json")]
use crate::Result;

/// Lookup from a logical wildcard name to its ordered option lines.
///
/// Implemented by [`WildcardSet`]; hosts with their own storage can implement
/// it directly.
///
/// [`WildcardSet`]: struct.WildcardSet.html
pub trait WildcardSource {
    /// Returns the option lines of the named wildcard, if it exists
    fn options(&self, name: &str) -> Option<&[String]>;

    /// Every known wildcard name, in any order
    fn names(&self) -> Vec<&str>;
}

/// An in-memory set of wildcards.
///
/// Names use `/` as the path separator. Lookups try the exact name first and
/// then fall back to a case-insensitive match.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WildcardSet {
    map: BTreeMap<String, Vec<String>>,
}

fn normalize_name(name: &str) -> String {
    let name = name.trim().replace('\\', "/");
    let name = name.trim_matches('/');
    name.strip_suffix(".txt").unwrap_or(name).to_string()
}

fn is_option_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

impl WildcardSet {
    /// Creates an empty set
    pub fn new() -> WildcardSet {
        WildcardSet::default()
    }

    /// Creates a set from any iterator of `(name, options)` pairs
    ///
    /// # Examples
    /// ```
    /// use wildprompt::{WildcardSet, WildcardSource};
    /// use maplit::hashmap;
    ///
    /// let set = WildcardSet::from_map(hashmap! {
    ///     "colors" => vec!["red", "blue"],
    ///     "animals/cats" => vec!["tabby"],
    /// });
    /// assert_eq!(set.options("Colors").map(|o| o.len()), Some(2));
    /// assert!(set.options("animals").is_none());
    /// ```
    pub fn from_map<I, K, C, S>(iter: I) -> WildcardSet
    where
        I: IntoIterator<Item = (K, C)>,
        K: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = WildcardSet::new();
        for (name, options) in iter {
            set.insert(name.as_ref(), options);
        }
        set
    }

    /// Creates a set from a JSON object mapping names to option arrays
    ///
    /// # Examples
    /// ```
    /// # use wildprompt::Result;
    /// use wildprompt::{WildcardSet, WildcardSource};
    /// # fn main() -> Result<()> {
    /// let set = WildcardSet::from_json(r#"{ "seasons": ["summer", "winter"] }"#)?;
    /// assert_eq!(set.names(), vec!["seasons"]);
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "wildcard_json")]
    pub fn from_json<S: AsRef<str>>(s: S) -> Result<WildcardSet> {
        let source: BTreeMap<String, Vec<String>> = serde_json::from_str(s.as_ref())?;
        Ok(WildcardSet::from_map(source))
    }

    /// Inserts or replaces a wildcard. Blank lines and `#` comments are dropped.
    pub fn insert<C, S>(&mut self, name: &str, options: C)
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options
            .into_iter()
            .map(Into::into)
            .filter(|line: &String| is_option_line(line))
            .map(|line| line.trim_end().to_string())
            .collect();
        self.map.insert(normalize_name(name), options);
    }

    /// Inserts a wildcard from the contents of a text file, one option per line
    pub fn insert_text(&mut self, name: &str, content: &str) {
        self.insert(name, content.lines());
    }

    /// Number of wildcards in the set
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if the set holds no wildcards
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(name, options)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns a copy of this set with `f` applied to every option line
    pub fn map_options<F: FnMut(&str, &str) -> String>(&self, mut f: F) -> WildcardSet {
        let map = self
            .map
            .iter()
            .map(|(name, options)| {
                let options = options.iter().map(|line| f(name, line)).collect();
                (name.clone(), options)
            })
            .collect();
        WildcardSet { map }
    }
}

impl WildcardSource for WildcardSet {
    fn options(&self, name: &str) -> Option<&[String]> {
        let name = normalize_name(name);
        self.map
            .get(&name)
            .or_else(|| {
                self.map
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                    .map(|(_, v)| v)
            })
            .map(Vec::as_slice)
    }

    fn names(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }
}
