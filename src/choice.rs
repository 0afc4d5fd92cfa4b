use rand::Rng;
use std::collections::BTreeSet;

use crate::delimiter::{find_matching_close, find_top_level_str};

/// One option inside a variant or wildcard list.
///
/// Parsed from `opts::value`, where `opts` holds, in this order, an optional
/// guard (`if <expr>`), an optional label clause (`(a,b)`) and an optional
/// weight. If `opts` is not in that shape the whole text is the value.
///
/// # Examples
/// ```
/// use wildprompt::Choice;
///
/// let c = Choice::parse("if mood eq 1 (warm,bright) 2.5::red car");
/// assert_eq!(c.value, "red car");
/// assert_eq!(c.weight, 2.5);
/// assert!(c.labels.contains("warm"));
/// assert_eq!(c.guard.as_deref(), Some("mood eq 1"));
///
/// let plain = Choice::parse("unquoted::content");
/// assert_eq!(plain.value, "unquoted::content");
/// assert_eq!(plain.weight, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// The option text, still unexpanded
    pub value: String,
    /// Relative weight, 1 unless given
    pub weight: f64,
    /// Lowercased labels
    pub labels: BTreeSet<String>,
    /// Guard expression gating the choice
    pub guard: Option<String>,
    /// 1-based position in the list the choice was parsed from, 0 if unknown
    pub position: usize,
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    guard: Option<String>,
    labels: BTreeSet<String>,
    weight: Option<f64>,
}

fn parse_labels(inner: &str) -> BTreeSet<String> {
    inner
        .split(',')
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

fn parse_guard(rest: &str) -> Option<Option<String>> {
    if rest.is_empty() {
        return Some(None);
    }
    let keyword = rest.get(..2).map_or(false, |k| k.eq_ignore_ascii_case("if"));
    let spaced = rest.get(2..).map_or(false, |r| r.starts_with(char::is_whitespace));
    if !(keyword && spaced) {
        return None;
    }
    let expr = rest[2..].trim();
    if expr.is_empty() {
        None
    } else {
        Some(Some(expr.to_string()))
    }
}

fn split_weight(opts: &str) -> (&str, Option<f64>) {
    let start = opts
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, _)| i);
    if let Some(start) = start {
        let boundary = opts[..start]
            .chars()
            .last()
            .map_or(true, |c| c.is_whitespace() || c == ')');
        if let (true, Ok(weight)) = (boundary, opts[start..].parse::<f64>()) {
            return (opts[..start].trim_end(), Some(weight));
        }
    }
    (opts, None)
}

fn split_labels(rest: &str) -> Option<(&str, &str)> {
    if !rest.ends_with(')') {
        return None;
    }
    let close = rest.len() - 1;
    let open = (0..close)
        .rev()
        .filter(|i| rest.as_bytes()[*i] == b'(')
        .find(|i| find_matching_close(rest, *i, '(', ')') == Some(close))?;
    let standalone = rest[..open].chars().last().map_or(true, char::is_whitespace);
    if standalone {
        Some((rest[..open].trim_end(), &rest[open + 1..close]))
    } else {
        None
    }
}

// A number ending a guard belongs to the expression unless a label clause
// sits between them: `if n eq 1::x` has no weight, `if n eq 1 () 2::x` does.
fn parse_options(opts: &str) -> Option<Options> {
    let opts = opts.trim();
    let (mut rest, mut weight) = split_weight(opts);
    if weight.is_some() && !rest.ends_with(')') && matches!(parse_guard(rest), Some(Some(_))) {
        rest = opts;
        weight = None;
    }

    if let Some((before, inner)) = split_labels(rest) {
        if let Some(guard) = parse_guard(before) {
            return Some(Options {
                guard,
                labels: parse_labels(inner),
                weight,
            });
        }
    }

    Some(Options {
        guard: parse_guard(rest)?,
        labels: BTreeSet::new(),
        weight,
    })
}

impl Choice {
    /// Creates a choice with weight 1 and no labels or guard
    pub fn new<S: Into<String>>(value: S) -> Choice {
        Choice {
            value: value.into(),
            weight: 1.0,
            labels: BTreeSet::new(),
            guard: None,
            position: 0,
        }
    }

    /// Parses `opts::value` syntax
    pub fn parse(text: &str) -> Choice {
        let parsed = find_top_level_str(text, 0, "::", &['<'], &['>'])
            .and_then(|at| parse_options(&text[..at]).map(|o| (o, &text[at + 2..])));
        match parsed {
            Some((options, value)) => Choice {
                value: value.to_string(),
                weight: options.weight.unwrap_or(1.0),
                labels: options.labels,
                guard: options.guard,
                position: 0,
            },
            None => Choice::new(text),
        }
    }

    /// Parses a list of option lines, numbering them from 1
    pub fn parse_all<I, S>(lines: I) -> Vec<Choice>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| Choice {
                position: i + 1,
                ..Choice::parse(line.as_ref())
            })
            .collect()
    }

    /// Sets the labels, then returns the modified choice
    pub fn with_labels<I, S>(mut self, labels: I) -> Choice
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = labels.into_iter().map(|l| l.as_ref().to_lowercase()).collect();
        self
    }

    /// Sets the weight, then returns the modified choice
    pub fn with_weight(mut self, weight: f64) -> Choice {
        self.weight = weight;
        self
    }
}

/// How a [`ChoiceSet`] picks among its remaining choices.
///
/// [`ChoiceSet`]: struct.ChoiceSet.html
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// Weighted random draw
    Random,
    /// Deterministic pick of `seed % remaining`
    Index(u64),
}

impl Default for Selection {
    fn default() -> Selection {
        Selection::Random
    }
}

/// Choices available for sampling without replacement.
///
/// Only choices with a positive weight are kept. A drawn choice is removed;
/// once the set is exhausted the next draw refills it from the original
/// choices, so repeated draws cycle.
///
/// # Examples
/// ```
/// use wildprompt::{Choice, ChoiceSet, Selection};
///
/// let mut set = ChoiceSet::new(vec![Choice::new("a"), Choice::new("b")]);
/// let drawn = set.draw_many(4, Selection::Random, &mut rand::thread_rng());
/// assert_eq!(drawn.len(), 4);
/// assert_ne!(drawn[0].value, drawn[1].value);
/// assert_eq!(set.refills(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChoiceSet {
    choices: Vec<Choice>,
    snapshot: Vec<Choice>,
    total_weight: f64,
    refills: usize,
}

impl ChoiceSet {
    /// Builds a set, dropping choices whose weight is not positive
    pub fn new<I: IntoIterator<Item = Choice>>(choices: I) -> ChoiceSet {
        let choices: Vec<Choice> = choices
            .into_iter()
            .filter(|c| c.weight > 0.0 && c.weight.is_finite())
            .collect();
        let total_weight = choices.iter().map(|c| c.weight).sum();
        ChoiceSet {
            snapshot: choices.clone(),
            choices,
            total_weight,
            refills: 0,
        }
    }

    /// Number of choices left in the current cycle
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// `true` if no choices are left in the current cycle
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Sum of the weights left in the current cycle
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// How many times the set has been refilled
    pub fn refills(&self) -> usize {
        self.refills
    }

    /// Choices left in the current cycle
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    fn refill(&mut self) {
        self.choices = self.snapshot.clone();
        self.total_weight = self.choices.iter().map(|c| c.weight).sum();
        self.refills += 1;
    }

    /// Draws and removes one choice. Returns `None` only if the set was built
    /// with no usable choices.
    pub fn draw<R: ?Sized + Rng>(&mut self, selection: Selection, rng: &mut R) -> Option<Choice> {
        if self.choices.is_empty() {
            if self.snapshot.is_empty() {
                return None;
            }
            self.refill();
        }
        let index = match selection {
            Selection::Index(seed) => (seed % self.choices.len() as u64) as usize,
            Selection::Random => {
                let mut target = rng.gen::<f64>() * self.total_weight;
                let last = self.choices.len() - 1;
                self.choices
                    .iter()
                    .position(|c| {
                        if target < c.weight {
                            true
                        } else {
                            target -= c.weight;
                            false
                        }
                    })
                    .unwrap_or(last)
            }
        };
        let choice = self.choices.remove(index);
        self.total_weight = if self.choices.is_empty() {
            0.0
        } else {
            (self.total_weight - choice.weight).max(0.0)
        };
        Some(choice)
    }

    /// Draws `count` choices, refilling as needed
    pub fn draw_many<R: ?Sized + Rng>(
        &mut self,
        count: usize,
        selection: Selection,
        rng: &mut R,
    ) -> Vec<Choice> {
        (0..count).filter_map(|_| self.draw(selection, rng)).collect()
    }
}

/// How many choices a directive draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    /// Smallest count
    pub lower: usize,
    /// Largest count; `None` means one less than the number of choices
    pub upper: Option<usize>,
}

impl Default for Quantity {
    fn default() -> Quantity {
        Quantity::exactly(1)
    }
}

impl Quantity {
    /// A fixed count
    pub fn exactly(n: usize) -> Quantity {
        Quantity {
            lower: n,
            upper: Some(n),
        }
    }

    /// Parses `n`, `a-b`, `-b` or `a-`
    ///
    /// # Examples
    /// ```
    /// use wildprompt::Quantity;
    ///
    /// assert_eq!(Quantity::parse("2"), Some(Quantity::exactly(2)));
    /// assert_eq!(Quantity::parse("-3"), Some(Quantity { lower: 1, upper: Some(3) }));
    /// assert_eq!(Quantity::parse("2-"), Some(Quantity { lower: 2, upper: None }));
    /// assert_eq!(Quantity::parse("x"), None);
    /// ```
    pub fn parse(spec: &str) -> Option<Quantity> {
        let spec = spec.trim();
        match spec.split_once('-') {
            None => spec.parse().ok().map(Quantity::exactly),
            Some(("", upper)) => Some(Quantity {
                lower: 1,
                upper: Some(upper.trim().parse().ok()?),
            }),
            Some((lower, "")) => Some(Quantity {
                lower: lower.trim().parse().ok()?,
                upper: None,
            }),
            Some((lower, upper)) => {
                let lower: usize = lower.trim().parse().ok()?;
                let upper: usize = upper.trim().parse().ok()?;
                Some(Quantity {
                    lower: lower.min(upper),
                    upper: Some(lower.max(upper)),
                })
            }
        }
    }

    /// Picks a concrete count given how many choices are available
    pub fn resolve<R: ?Sized + Rng>(&self, available: usize, rng: &mut R) -> usize {
        let upper = self
            .upper
            .unwrap_or_else(|| available.saturating_sub(1))
            .max(self.lower);
        if upper == self.lower {
            self.lower
        } else {
            rng.gen_range(self.lower..=upper)
        }
    }
}

/// Parses a `count[,separator]` prefix argument.
///
/// Without a comma the separator is a single space; a comma with nothing
/// after it means `", "`.
pub fn parse_count_prefix(prefix: &str) -> (Quantity, String) {
    let (count, separator) = match prefix.split_once(',') {
        None => (prefix, " ".to_string()),
        Some((count, "")) => (count, ", ".to_string()),
        Some((count, sep)) => (count, sep.to_string()),
    };
    let quantity = if count.trim().is_empty() {
        Quantity::default()
    } else {
        Quantity::parse(count).unwrap_or_default()
    };
    (quantity, separator)
}
