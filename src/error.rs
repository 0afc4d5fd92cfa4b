use thiserror::Error as ThisError;

/// The `wildprompt` error type
#[derive(Debug, Clone, PartialEq, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// Error encountered while parsing a directive template or expression
    #[error("parse error: {0}")]
    ParseError(String),

    /// A referenced wildcard does not exist in the wildcard source
    #[error("missing wildcard: {0}")]
    MissingWildcard(String),

    /// An expression failed to compile or evaluate
    #[error("expression error: {0}")]
    ExpressionError(String),

    /// A directive was used somewhere it is not allowed, or with bad arguments
    #[error("usage error: {0}")]
    UsageError(String),

    /// Nested expansion went deeper than the configured limit
    #[error("recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    /// Error encountered while parsing JSON input
    #[cfg(feature = "wildcard_json")]
    #[error("json error: {0}")]
    JsonError(String),
}

#[cfg(feature = "wildcard_json")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::JsonError(format!("{}", e))
    }
}
