// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt::Write;

/// One decoded metric sample.
///
/// `value` keeps the numeric literal exactly as it appeared on the line; the parser only checks
/// that it reads as a finite float.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Point {
    pub name: String,
    pub value: String,
    pub timestamp: i64,
    pub source: String,
    pub tags: HashMap<String, String>,
}

impl Point {
    /// Serializes the point into the line format the remote collector accepts:
    ///
    /// `"<name>" <value> <timestamp> source="<source>" ["<key>"="<value>" ...]`
    ///
    /// Tags are written sorted by key.
    pub fn to_wire_line(&self) -> String {
        let mut line = String::with_capacity(
            self.name.len() + self.value.len() + self.source.len() + 32 + self.tags.len() * 16,
        );
        push_quoted(&mut line, &self.name);
        line.push(' ');
        line.push_str(&self.value);
        // infallible for String
        let _ = write!(line, " {} source=", self.timestamp);
        push_quoted(&mut line, &self.source);

        let mut tags: Vec<(&String, &String)> = self.tags.iter().collect();
        tags.sort_unstable();
        for (key, value) in tags {
            line.push(' ');
            push_quoted(&mut line, key);
            line.push('=');
            push_quoted(&mut line, value);
        }
        line
    }
}

fn push_quoted(line: &mut String, s: &str) {
    line.push('"');
    for ch in s.chars() {
        match ch {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            '\t' => line.push_str("\\t"),
            _ => line.push(ch),
        }
    }
    line.push('"');
}
