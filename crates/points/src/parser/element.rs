// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Grammar units. Each element consumes tokens from the shared stream and writes into the point
//! under construction.

use super::scanner::{Token, TokenKind};
use super::TokenStream;
use crate::errors::ParseError;
use crate::point::Point;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Metric name, bare or quoted.
    Name,
    /// Numeric literal, kept as text.
    Value,
    /// Epoch timestamp in seconds, milliseconds, microseconds or nanoseconds.
    Timestamp { optional: bool },
    /// A single whitespace run.
    Whitespace,
    /// `key=value`
    Tag,
    /// A literal that must match exactly, such as OpenTSDB's `put`.
    Keyword(&'static str),
    /// Zero or more of the wrapped element, whitespace separated, up to end of line.
    Repeated(Box<Element>),
}

impl Element {
    pub(crate) fn parse(
        &self,
        tokens: &mut TokenStream<'_>,
        point: &mut Point,
    ) -> Result<(), ParseError> {
        match self {
            Element::Name => {
                point.name = parse_literal(tokens)?;
                Ok(())
            }
            Element::Value => parse_value(tokens, point),
            Element::Timestamp { optional } => parse_timestamp(tokens, point, *optional),
            Element::Whitespace => {
                let token = tokens.scan();
                if token.kind == TokenKind::Whitespace {
                    Ok(())
                } else {
                    Err(unexpected(token, "whitespace"))
                }
            }
            Element::Tag => {
                let key = parse_literal(tokens)?;
                let token = tokens.scan();
                if token.kind != TokenKind::Equals {
                    return Err(unexpected(token, "equals"));
                }
                let value = parse_literal(tokens)?;
                point.tags.insert(key, value);
                Ok(())
            }
            Element::Keyword(keyword) => {
                let literal = parse_literal(tokens)?;
                if literal == *keyword {
                    Ok(())
                } else {
                    Err(ParseError::KeywordMismatch {
                        found: literal,
                        expected: keyword,
                    })
                }
            }
            Element::Repeated(element) => loop {
                if tokens.peek()?.kind == TokenKind::Eof {
                    return Ok(());
                }
                element.parse(tokens, point)?;

                let separator = tokens.scan();
                match separator.kind {
                    TokenKind::Eof => return Ok(()),
                    TokenKind::Whitespace => continue,
                    _ => return Err(unexpected(separator, "whitespace")),
                }
            },
        }
    }
}

fn unexpected(token: Token<'_>, expected: &'static str) -> ParseError {
    let found = if token.kind == TokenKind::Eof {
        token.kind.to_string()
    } else {
        token.text.to_string()
    };
    ParseError::Unexpected { found, expected }
}

/// A bare run of literal tokens, or everything between a pair of quotes.
fn parse_literal(tokens: &mut TokenStream<'_>) -> Result<String, ParseError> {
    let token = tokens.scan();
    if token.kind == TokenKind::Quote {
        return parse_quoted_literal(tokens);
    }
    if !token.kind.is_literal() {
        return Err(unexpected(token, "literal"));
    }

    let mut literal = String::from(token.text);
    loop {
        let token = tokens.scan();
        if !token.kind.is_literal() {
            tokens.unscan(1)?;
            return Ok(literal);
        }
        literal.push_str(token.text);
    }
}

// No escape handling: a backslash before a quote does not keep the literal open.
fn parse_quoted_literal(tokens: &mut TokenStream<'_>) -> Result<String, ParseError> {
    let mut literal = String::new();
    loop {
        let token = tokens.scan();
        match token.kind {
            TokenKind::Eof => return Err(ParseError::UnterminatedQuote),
            TokenKind::Quote => return Ok(literal),
            _ => literal.push_str(token.text),
        }
    }
}

fn parse_value(tokens: &mut TokenStream<'_>, point: &mut Point) -> Result<(), ParseError> {
    let mut token = tokens.scan();
    if token.kind == TokenKind::Eof {
        return Err(unexpected(token, "number"));
    }

    let mut value = String::new();
    if token.kind == TokenKind::Minus {
        value.push_str(token.text);
        token = tokens.scan();
    }
    loop {
        match token.kind {
            TokenKind::Digit | TokenKind::Letter | TokenKind::Dot => value.push_str(token.text),
            // exponent sign, as in 1e-05
            TokenKind::Minus if value.ends_with(['e', 'E']) => value.push_str(token.text),
            _ => break,
        }
        token = tokens.scan();
    }
    tokens.unscan(1)?;

    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => {
            point.value = value;
            Ok(())
        }
        _ => Err(ParseError::InvalidValue(value)),
    }
}

fn parse_timestamp(
    tokens: &mut TokenStream<'_>,
    point: &mut Point,
    optional: bool,
) -> Result<(), ParseError> {
    let token = tokens.scan();
    match token.kind {
        TokenKind::Digit => {
            let timestamp: i64 = token
                .text
                .parse()
                .map_err(|_| ParseError::InvalidTimestamp(token.text.to_string()))?;
            point.timestamp = infer_timestamp(timestamp, token.text.len());
            Ok(())
        }
        TokenKind::Eof => Err(unexpected(token, "timestamp")),
        _ if optional => {
            // Give back the separator consumed ahead of us along with the peeked token, so the
            // following whitespace element sees the line as if there were no timestamp slot.
            tokens.unscan(2)?;
            point.timestamp = infer_timestamp(0, 0);
            Ok(())
        }
        _ => Err(unexpected(token, "timestamp")),
    }
}

/// Scales a timestamp to seconds based on how many digits it was written with. Zero means
/// "now".
pub(crate) fn infer_timestamp(timestamp: i64, digits: usize) -> i64 {
    let seconds = match digits {
        19 => timestamp / 1_000_000_000,
        16 => timestamp / 1_000_000,
        13 => timestamp / 1_000,
        _ => timestamp,
    };
    if seconds == 0 {
        now()
    } else {
        seconds
    }
}

fn now() -> i64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
        .try_into()
        .unwrap_or_default()
}
