use std::fmt;

use crate::{Context, Estimate, Estimation, Expand, Result};

/// A single directive tag, `<name[prefix]:body>`.
///
/// Both the prefix and the body are kept as raw text; handlers decide how
/// to interpret and expand them.
///
/// # Examples
/// ```
/// use wildprompt::Directive;
///
/// let d = Directive::new("random").with_prefix("2,").with_body("a|b|c");
/// assert_eq!(d.to_string(), "<random[2,]:a|b|c>");
/// assert_eq!(Directive::new("wcpopmacro").with_body("x").to_string(), "<wcpopmacro:x>");
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct Directive {
    name: String,
    prefix: Option<String>,
    body: Option<String>,
}

impl Directive {
    /// Creates a directive with the given name and no prefix or body
    pub fn new<S: Into<String>>(name: S) -> Directive {
        Directive {
            name: name.into(),
            prefix: None,
            body: None,
        }
    }

    /// Sets the prefix argument, then returns the modified directive
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Directive {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the body, then returns the modified directive
    pub fn with_body<S: Into<String>>(mut self, body: S) -> Directive {
        self.body = Some(body.into());
        self
    }

    /// The tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bracketed prefix argument, empty if absent
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }

    /// `true` if the tag was written with `[...]`
    pub fn has_prefix(&self) -> bool {
        self.prefix.is_some()
    }

    /// The text after the colon, empty if absent
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        if let Some(prefix) = &self.prefix {
            write!(f, "[{}]", prefix)?;
        }
        if let Some(body) = &self.body {
            write!(f, ":{}", body)?;
        }
        write!(f, ">")
    }
}

impl Expand for Directive {
    /// Runs the registered handler. Unknown tags are passed through verbatim.
    /// A failing handler is reported as a warning and expands to nothing.
    fn expand(&self, context: &mut Context<'_>) -> Result<String> {
        let engine = context.engine();
        let handler = match engine.handler(&self.name) {
            Some(handler) => handler,
            None => return Ok(self.to_string()),
        };
        match handler.process(self, context) {
            Ok(output) => Ok(output),
            Err(e) => {
                context.warn(format!("<{}> failed: {}", self.name, e));
                Ok(String::new())
            }
        }
    }
}

impl Estimate for Directive {
    fn estimate(&self, estimation: &mut Estimation<'_>) -> String {
        match estimation.engine().handler(&self.name) {
            Some(handler) => handler.estimate(self, estimation),
            None => self.to_string(),
        }
    }
}
