use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Variables and macros of one evaluation.
///
/// Variables hold finished text. Macros hold directive text that is expanded
/// again every time it is read.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scope {
    variables: BTreeMap<String, String>,
    macros: BTreeMap<String, String>,
    shadowed: BTreeMap<String, Vec<Option<String>>>,
}

impl Scope {
    /// Creates an empty scope
    pub fn new() -> Scope {
        Scope::default()
    }

    /// The value of a variable
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Sets a variable
    pub fn set_variable<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.variables.insert(name.into(), value.into());
    }

    /// The unexpanded text of a macro
    pub fn macro_text(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    /// Sets a macro
    pub fn set_macro<K: Into<String>, V: Into<String>>(&mut self, name: K, text: V) {
        self.macros.insert(name.into(), text.into());
    }

    /// All variables
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// All macros
    pub fn macros(&self) -> &BTreeMap<String, String> {
        &self.macros
    }

    /// Overrides a macro, remembering the value it replaces
    pub fn push_macro(&mut self, name: String, text: String) {
        let previous = self.macros.insert(name.clone(), text);
        match self.shadowed.entry(name) {
            Entry::Occupied(mut occ) => occ.get_mut().push(previous),
            Entry::Vacant(vac) => {
                vac.insert(vec![previous]);
            }
        }
    }

    /// Undoes the latest [`push_macro`] for `name`.
    ///
    /// If that push did not replace anything the pushed text stays, so the
    /// most recent value remains readable after its scope ends.
    ///
    /// # Examples
    /// ```
    /// use wildprompt::Scope;
    ///
    /// let mut scope = Scope::new();
    /// scope.push_macro("f".into(), "warm".into());
    /// scope.push_macro("f".into(), "cold".into());
    /// scope.pop_macro("f");
    /// assert_eq!(scope.macro_text("f"), Some("warm"));
    /// scope.pop_macro("f");
    /// assert_eq!(scope.macro_text("f"), Some("warm"));
    /// ```
    ///
    /// [`push_macro`]: #method.push_macro
    pub fn pop_macro(&mut self, name: &str) {
        if let Entry::Occupied(mut occ) = self.shadowed.entry(name.to_string()) {
            let stack = occ.get_mut();
            if let Some(Some(previous)) = stack.pop() {
                self.macros.insert(name.to_string(), previous);
            }
            if stack.is_empty() {
                occ.remove_entry();
            }
        }
    }
}
