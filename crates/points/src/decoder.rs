// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{HOST_TAG, SOURCE_TAG};
use crate::errors::DecodeError;
use crate::parser::{Dialect, PointParser};
use crate::point::Point;
use crate::validation::validate;
use tracing::trace;

/// Turns raw lines into validated points for one dialect.
///
/// A decoder serves one sequential stream of lines; give each connection its own.
pub struct Decoder {
    dialect: Dialect,
    parser: PointParser,
}

impl Decoder {
    pub fn new(dialect: Dialect) -> Self {
        Decoder {
            dialect,
            parser: PointParser::for_dialect(dialect),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn decode(&mut self, line: &[u8]) -> Result<Point, DecodeError> {
        let line = std::str::from_utf8(line)
            .map_err(|_| DecodeError::InvalidUtf8)?
            .trim();
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }
        trace!("Decoding {} line: {}", self.dialect, line);

        let mut point = self.parser.parse(line)?;
        take_source(&mut point)?;
        validate(&point)?;
        Ok(point)
    }
}

/// Moves the `source` tag, or failing that the `host` tag, into [`Point::source`].
fn take_source(point: &mut Point) -> Result<(), DecodeError> {
    let source = point
        .tags
        .remove(SOURCE_TAG)
        .or_else(|| point.tags.remove(HOST_TAG))
        .ok_or(DecodeError::MissingSource)?;
    point.source = source;
    Ok(())
}
