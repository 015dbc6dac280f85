// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{MAX_NAME_LENGTH, MAX_SOURCE_LENGTH, MAX_TAG_LENGTH};
use crate::errors::ValidationError;
use crate::point::Point;

/// Checks name, source and tag limits, stopping at the first violation.
///
/// The character rules apply to names, sources and tag keys, whether or not they were quoted
/// on the wire. Tag values are only length checked.
pub fn validate(point: &Point) -> Result<(), ValidationError> {
    validate_str("name", &point.name, MAX_NAME_LENGTH)?;
    validate_str("source", &point.source, MAX_SOURCE_LENGTH)?;

    for (key, value) in &point.tags {
        let total = key.len() + value.len();
        if total >= MAX_TAG_LENGTH {
            return Err(ValidationError::TagLength {
                key: key.clone(),
                max: MAX_TAG_LENGTH,
                found: total,
            });
        }
        validate_chars("tag key", key)?;
    }
    Ok(())
}

fn validate_str(field: &'static str, s: &str, max: usize) -> Result<(), ValidationError> {
    if s.is_empty() || s.len() >= max {
        return Err(ValidationError::Length {
            field,
            max: max - 1,
            found: s.len(),
        });
    }
    validate_chars(field, s)
}

fn validate_chars(field: &'static str, s: &str) -> Result<(), ValidationError> {
    for (idx, ch) in s.char_indices() {
        // a leading ~ marks internal metrics
        if !is_legal(ch) && !(idx == 0 && ch == '~') {
            return Err(ValidationError::InvalidCharacter { field, ch });
        }
    }
    Ok(())
}

// , - . / 0-9 A-Z _ a-z
fn is_legal(ch: char) -> bool {
    matches!(ch, ','..='9' | 'A'..='Z' | '_' | 'a'..='z')
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_NAME: &str = "validName";
    const VALID_SOURCE: &str = "validSource";

    fn point(name: &str, source: &str) -> Point {
        Point {
            name: name.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_point() {
        assert!(validate(&point(VALID_NAME, VALID_SOURCE)).is_ok());
        assert!(validate(&point("~proxy.points,total/1_a-b", "host-01.example.com")).is_ok());
        assert!(validate(&point(&"a".repeat(1023), &"b".repeat(1023))).is_ok());
    }

    #[test]
    fn test_invalid_lengths() {
        let long = "a".repeat(1024);
        assert_eq!(
            validate(&point(&long, VALID_SOURCE)),
            Err(ValidationError::Length {
                field: "name",
                max: 1023,
                found: 1024
            })
        );
        assert!(matches!(
            validate(&point(VALID_NAME, &long)),
            Err(ValidationError::Length { field: "source", .. })
        ));
        assert!(matches!(
            validate(&point("", VALID_SOURCE)),
            Err(ValidationError::Length { field: "name", .. })
        ));
        assert!(matches!(
            validate(&point(VALID_NAME, "")),
            Err(ValidationError::Length { field: "source", .. })
        ));
    }

    #[test]
    fn test_invalid_characters() {
        for name in ["foo bar", "system.cpu.load#", "system.cpu.load\\", "a~b", "é"] {
            assert!(
                matches!(
                    validate(&point(name, VALID_SOURCE)),
                    Err(ValidationError::InvalidCharacter { field: "name", .. })
                ),
                "{name} should be rejected"
            );
        }
        assert_eq!(
            validate(&point(VALID_NAME, "host:1")),
            Err(ValidationError::InvalidCharacter {
                field: "source",
                ch: ':'
            })
        );
    }

    #[test]
    fn test_name_checked_before_source() {
        assert!(matches!(
            validate(&point("bad#", "")),
            Err(ValidationError::InvalidCharacter { field: "name", .. })
        ));
    }

    #[test]
    fn test_tag_key_characters() {
        let mut p = point(VALID_NAME, VALID_SOURCE);
        p.tags.insert("~env.region-1".to_string(), "any value: #1".to_string());
        assert!(validate(&p).is_ok());

        p.tags.insert("bad#key".to_string(), "v".to_string());
        assert_eq!(
            validate(&p),
            Err(ValidationError::InvalidCharacter {
                field: "tag key",
                ch: '#'
            })
        );
    }

    #[test]
    fn test_tag_length() {
        let mut p = point(VALID_NAME, VALID_SOURCE);
        p.tags.insert("k".repeat(100), "v".repeat(154));
        assert!(validate(&p).is_ok());

        p.tags.insert("key".to_string(), "v".repeat(252));
        assert_eq!(
            validate(&p),
            Err(ValidationError::TagLength {
                key: "key".to_string(),
                max: 255,
                found: 255
            })
        );
    }
}
