//! Error types shared across parsing, serialization, and query evaluation.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the parser, the DOM, and the query engine.
///
/// Nothing is retried internally; every failure propagates synchronously to
/// the immediate caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// Malformed XML input detected by the tokenizer.
    #[error("XML parse error at byte {offset}: {message}")]
    Parse {
        /// Human-readable description of the failure.
        message: String,
        /// Byte offset into the overall input stream.
        offset: usize,
    },

    /// A query pattern failed to compile.
    ///
    /// `start..end` is the byte span of the offending substring within
    /// `pattern`.
    #[error("query syntax error in {pattern:?}: unexpected {found:?} at {start}..{end}")]
    QuerySyntax {
        /// The full pattern that failed to compile.
        pattern: String,
        /// The offending substring.
        found: String,
        /// Span start, byte offset into the pattern.
        start: usize,
        /// Span end, byte offset into the pattern.
        end: usize,
    },

    /// A syntactically valid query construct with no evaluation support.
    #[error("unimplemented query operator: {0}")]
    UnimplementedOperator(String),

    /// A query function name with no entry in the built-in table.
    #[error("unimplemented query function: {0}")]
    UnimplementedFunction(String),

    /// A query operator was applied to a context shape it does not support.
    #[error("axis not applicable: {0}")]
    AxisUsage(String),

    /// A tree invariant violation detected at serialization time.
    #[error("structural error: {0}")]
    Structural(String),

    /// The tokenizer delivered an event sequence the tree builder cannot
    /// reconcile. Fatal; the parse is not resumable.
    #[error("event stream contract violated: {0}")]
    StreamContract(String),

    /// The base-URI stack popped a URI that does not match the one the
    /// tokenizer reported. Signals a tokenizer/builder disagreement.
    #[error("base URI mismatch: expected {expected:?}, got {actual:?}")]
    BaseMismatch {
        /// URI on top of the builder's base stack.
        expected: String,
        /// URI reported by the end-base event.
        actual: String,
    },

    /// An operation was attempted on a torn-down parser.
    #[error("parser used after destroy")]
    InvalidState,

    /// The caller-supplied entity reader failed to resolve an entity.
    #[error("entity resolution failed for {system_id:?}: {message}")]
    EntityResolve {
        /// System id that could not be resolved.
        system_id: String,
        /// Reader-supplied failure description.
        message: String,
    },
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>, offset: usize) -> Self {
        Error::Parse {
            message: message.into(),
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_span() {
        let err = Error::QuerySyntax {
            pattern: "/$".into(),
            found: "$".into(),
            start: 1,
            end: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("1..2"));
        assert!(msg.contains("/$"));
    }

    #[test]
    fn test_parse_helper() {
        let err = Error::parse("unexpected end of input", 17);
        assert_eq!(
            err,
            Error::Parse {
                message: "unexpected end of input".into(),
                offset: 17
            }
        );
    }
}
