use std::collections::BTreeSet;

use crate::Choice;

/// One comma-separated entry of a [`LabelFilter`].
///
/// [`LabelFilter`]: struct.LabelFilter.html
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEntry {
    /// Matches the choice at this 1-based position
    Index(usize),
    /// Matches choices carrying every `required` label and no `excluded` one
    Labels {
        /// Labels the choice must have
        required: BTreeSet<String>,
        /// Labels the choice must not have
        excluded: BTreeSet<String>,
    },
}

impl FilterEntry {
    fn parse(text: &str) -> Option<FilterEntry> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse().ok().map(FilterEntry::Index);
        }
        let mut required = BTreeSet::new();
        let mut excluded = BTreeSet::new();
        for term in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            match term.strip_prefix('!') {
                Some(label) => excluded.insert(label.trim().to_lowercase()),
                None => required.insert(term.to_lowercase()),
            };
        }
        if required.is_empty() && excluded.is_empty() {
            None
        } else {
            Some(FilterEntry::Labels { required, excluded })
        }
    }

    fn matches(&self, choice: &Choice) -> bool {
        match self {
            FilterEntry::Index(i) => choice.position == *i,
            FilterEntry::Labels { required, excluded } => {
                required.is_subset(&choice.labels) && excluded.is_disjoint(&choice.labels)
            }
        }
    }
}

/// Selects choices by position or label.
///
/// A choice passes if it matches any entry. An empty filter passes everything.
///
/// # Examples
/// ```
/// use wildprompt::{Choice, LabelFilter};
///
/// let choices = Choice::parse_all(vec![
///     "(primary,bright)::red",
///     "(primary)::blue",
///     "(muted)::grey",
/// ]);
/// let filter = LabelFilter::parse("primary+!bright, 3");
/// let kept: Vec<_> = choices.iter().filter(|c| filter.matches(c)).map(|c| c.value.as_str()).collect();
/// assert_eq!(kept, vec!["blue", "grey"]);
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LabelFilter {
    entries: Vec<FilterEntry>,
}

impl LabelFilter {
    /// Parses a comma-separated filter
    pub fn parse(text: &str) -> LabelFilter {
        LabelFilter {
            entries: text.split(',').filter_map(FilterEntry::parse).collect(),
        }
    }

    /// The parsed entries
    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    /// `true` if the filter has no entries and so matches everything
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `choice` passes the filter
    pub fn matches(&self, choice: &Choice) -> bool {
        self.is_empty() || self.entries.iter().any(|e| e.matches(choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_all() {
        let filter = LabelFilter::parse(" , ");
        assert!(filter.is_empty());
        assert!(filter.matches(&Choice::new("anything")));
    }

    #[test]
    fn index_entries() {
        let choices = Choice::parse_all(vec!["a", "b", "c"]);
        let filter = LabelFilter::parse("1,3");
        assert_eq!(filter.entries(), &[FilterEntry::Index(1), FilterEntry::Index(3)]);
        let kept: Vec<_> = choices.iter().filter(|c| filter.matches(c)).map(|c| c.value.clone()).collect();
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[test]
    fn labels_are_case_insensitive() {
        let choice = Choice::new("x").with_labels(vec!["Warm"]);
        assert!(LabelFilter::parse("WARM").matches(&choice));
        assert!(!LabelFilter::parse("!warm").matches(&choice));
        assert!(LabelFilter::parse("cold, warm").matches(&choice));
        assert!(!LabelFilter::parse("warm+cold").matches(&choice));
    }
}
