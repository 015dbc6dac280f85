// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure to match a line against a dialect grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("found {found:?}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
    },
    #[error("invalid metric value {0}")]
    InvalidValue(String),
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(String),
    #[error("found {found:?}, expected keyword {expected:?}")]
    KeywordMismatch {
        found: String,
        expected: &'static str,
    },
    #[error("found end of line, expected closing quote")]
    UnterminatedQuote,
    #[error("cannot unscan {requested} tokens, only {available} buffered")]
    Pushback { requested: usize, available: usize },
}

/// A parsed point that breaks a length or character set rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: expected length between 1 and {max}, found {found}")]
    Length {
        field: &'static str,
        max: usize,
        found: usize,
    },
    #[error("{field}: invalid character {ch:?}")]
    InvalidCharacter { field: &'static str, ch: char },
    #[error("tag {key}: expected key and value length less than {max}, found {found}")]
    TagLength {
        key: String,
        max: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("incorrect point format: empty line")]
    Empty,
    #[error("incorrect point format: line is not valid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("missing source tag")]
    MissingSource,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Outcome of a failed post to the remote collector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShippingError {
    #[error("error posting data: {0}")]
    Transport(String),
    #[error("points rejected with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ParseError::Unexpected {
            found: "=".to_string(),
            expected: "whitespace",
        };
        assert_eq!(error.to_string(), "found \"=\", expected whitespace");

        let error = DecodeError::from(ValidationError::InvalidCharacter {
            field: "name",
            ch: '#',
        });
        assert_eq!(error.to_string(), "name: invalid character '#'");

        let error = ShippingError::Rejected(406);
        assert_eq!(error.to_string(), "points rejected with status 406");
    }

    #[test]
    fn test_decode_error_from_parse_error() {
        let error: DecodeError = ParseError::UnterminatedQuote.into();
        assert!(matches!(
            error,
            DecodeError::Parse(ParseError::UnterminatedQuote)
        ));
    }
}
