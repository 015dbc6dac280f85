// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line parsing for the Graphite and OpenTSDB dialects.
//!
//! A dialect is nothing more than an ordered list of [`Element`]s. [`PointParser`] runs those
//! elements in sequence over one line, sharing a token stream that can push back up to two
//! tokens so optional fields can be peeked and abandoned.

pub mod element;
pub mod scanner;

use std::sync::{Arc, OnceLock};

use crate::constants::OPENTSDB_PUT;
use crate::errors::ParseError;
use crate::point::Point;
pub use element::Element;
use scanner::{Scanner, Token};

/// Deepest backtrack any element is allowed to request.
const MAX_PUSHBACK: usize = 2;

/// Wire format accepted on a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Dialect {
    /// `<name> <value> [<timestamp>] <tag>=<value> ...`
    #[display("graphite")]
    Graphite,
    /// `put <name> <timestamp> <value> <tag>=<value> ...`
    #[display("opentsdb")]
    OpenTsdb,
}

impl Dialect {
    /// Returns the dialect's grammar. Built once per process and shared by every parser.
    pub fn grammar(self) -> Grammar {
        static GRAPHITE: OnceLock<Grammar> = OnceLock::new();
        static OPENTSDB: OnceLock<Grammar> = OnceLock::new();

        match self {
            Dialect::Graphite => GRAPHITE
                .get_or_init(|| {
                    Grammar::new(vec![
                        Element::Name,
                        Element::Whitespace,
                        Element::Value,
                        Element::Whitespace,
                        Element::Timestamp { optional: true },
                        Element::Whitespace,
                        Element::Repeated(Box::new(Element::Tag)),
                    ])
                })
                .clone(),
            Dialect::OpenTsdb => OPENTSDB
                .get_or_init(|| {
                    Grammar::new(vec![
                        Element::Keyword(OPENTSDB_PUT),
                        Element::Whitespace,
                        Element::Name,
                        Element::Whitespace,
                        Element::Timestamp { optional: false },
                        Element::Whitespace,
                        Element::Value,
                        Element::Whitespace,
                        Element::Repeated(Box::new(Element::Tag)),
                    ])
                })
                .clone(),
        }
    }
}

/// Immutable, cheaply cloned element sequence.
#[derive(Debug, Clone)]
pub struct Grammar {
    elements: Arc<[Element]>,
}

impl Grammar {
    pub fn new(elements: Vec<Element>) -> Self {
        Grammar {
            elements: elements.into(),
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

pub struct PointParser {
    grammar: Grammar,
}

impl PointParser {
    pub fn new(grammar: Grammar) -> Self {
        PointParser { grammar }
    }

    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(dialect.grammar())
    }

    /// Parses one line. Tags are returned as written; `source`/`host` handling is left to the
    /// decoder.
    pub fn parse(&self, line: &str) -> Result<Point, ParseError> {
        let mut tokens = TokenStream::new(line);
        let mut point = Point::default();
        for element in self.grammar.elements() {
            element.parse(&mut tokens, &mut point)?;
        }
        Ok(point)
    }
}

/// Scanner output with a bounded pushback window.
pub(crate) struct TokenStream<'a> {
    scanner: Scanner<'a>,
    // most recently scanned tokens, oldest first
    history: [Token<'a>; MAX_PUSHBACK],
    buffered: usize,
    pending: usize,
}

impl<'a> TokenStream<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        TokenStream {
            scanner: Scanner::new(line),
            history: [Token::EOF; MAX_PUSHBACK],
            buffered: 0,
            pending: 0,
        }
    }

    pub(crate) fn scan(&mut self) -> Token<'a> {
        if self.pending > 0 {
            let token = self.history[MAX_PUSHBACK - self.pending];
            self.pending -= 1;
            return token;
        }

        let token = self.scanner.scan();
        self.history.rotate_left(1);
        self.history[MAX_PUSHBACK - 1] = token;
        self.buffered = (self.buffered + 1).min(MAX_PUSHBACK);
        token
    }

    /// Pushes the last `n` scanned tokens back so they are returned again, in order.
    pub(crate) fn unscan(&mut self, n: usize) -> Result<(), ParseError> {
        let available = self.buffered - self.pending;
        if n > available {
            return Err(ParseError::Pushback {
                requested: n,
                available,
            });
        }
        self.pending += n;
        Ok(())
    }

    pub(crate) fn peek(&mut self) -> Result<Token<'a>, ParseError> {
        let token = self.scan();
        self.unscan(1)?;
        Ok(token)
    }
}
