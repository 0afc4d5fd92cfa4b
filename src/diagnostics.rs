use log::warn;

/// Non-fatal problems found while transpiling or expanding a line.
///
/// Warnings are kept in the order they were raised and are also forwarded to
/// the `log` facade, so a host that installs a logger sees them as they
/// happen while a host that does not can still inspect them afterwards.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "wildcard_json", derive(serde::Serialize))]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    /// Creates an empty collector
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Records a warning. The stored text is prefixed with `Warning: `.
    ///
    /// # Examples
    /// ```
    /// use wildprompt::Diagnostics;
    ///
    /// let mut d = Diagnostics::new();
    /// d.warn("no glob matches for 'foo*'");
    /// assert_eq!(d.warnings(), ["Warning: no glob matches for 'foo*'"]);
    /// ```
    pub fn warn<S: AsRef<str>>(&mut self, message: S) {
        let message = message.as_ref();
        warn!("{}", message);
        self.warnings.push(format!("Warning: {}", message));
    }

    /// All warnings recorded so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// `true` if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Moves every warning from `other` into this collector
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    /// Consumes the collector, returning its warnings
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
