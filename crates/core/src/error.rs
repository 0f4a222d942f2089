//! Typed error types for code and parameter parsing.

/// Failure while parsing a code line or reinterpreting a parameter.
///
/// The generic parameter parser never produces these: values that cannot be
/// interpreted degrade to text. Only driver ID parsing and the structural
/// code-line parser can fail.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeParseError {
    /// A driver ID had more than two segments or a non-numeric segment.
    #[error("malformed driver ID {text:?} in {letter} parameter")]
    MalformedDriverId {
        /// Parameter letter the value belonged to (`@` when unknown).
        letter: char,
        /// The offending text.
        text: String,
    },

    /// The line contained nothing but whitespace.
    #[error("empty code line")]
    EmptyLine,

    /// The major or minor number of a G/M/T-code could not be parsed.
    #[error("invalid command number: {text:?}")]
    InvalidCommandNumber {
        /// The command token as written.
        text: String,
    },

    /// A quoted string parameter was not closed before the end of the line.
    #[error("unterminated string parameter")]
    UnterminatedString,

    /// A `{...}` expression was not closed before the end of the line.
    #[error("unterminated expression parameter")]
    UnterminatedExpression,
}

/// A strict parameter accessor was asked for a type the value cannot provide.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {letter} parameter to {target} (value {raw_text:?})")]
pub struct ConversionError {
    /// Letter of the parameter.
    pub letter: char,
    /// The unparsed value text.
    pub raw_text: String,
    /// Name of the requested target type.
    pub target: &'static str,
}
