// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Character class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum TokenKind {
    #[display("letter")]
    Letter,
    #[display("digit")]
    Digit,
    #[display("dot")]
    Dot,
    #[display("minus sign")]
    Minus,
    #[display("equals")]
    Equals,
    #[display("quotes")]
    Quote,
    #[display("whitespace")]
    Whitespace,
    #[display("character")]
    Other,
    #[display("end of line")]
    Eof,
}

impl TokenKind {
    /// Whether the token may appear in a bare (unquoted) literal.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Letter
                | TokenKind::Digit
                | TokenKind::Dot
                | TokenKind::Minus
                | TokenKind::Other
        )
    }

    // Letters, digits and whitespace are scanned as runs, everything else one char at a time.
    fn is_run(self) -> bool {
        matches!(
            self,
            TokenKind::Letter | TokenKind::Digit | TokenKind::Whitespace
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub const EOF: Self = Token {
        kind: TokenKind::Eof,
        text: "",
    };
}

/// Splits one line into classified tokens.
///
/// Once the input is exhausted every call returns [`Token::EOF`].
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    pub fn scan(&mut self) -> Token<'a> {
        let rest = &self.input[self.pos..];
        let Some(first) = rest.chars().next() else {
            return Token::EOF;
        };

        let kind = classify(first);
        let len = if kind.is_run() {
            rest.char_indices()
                .find(|&(_, ch)| classify(ch) != kind)
                .map_or(rest.len(), |(idx, _)| idx)
        } else {
            first.len_utf8()
        };

        self.pos += len;
        Token {
            kind,
            text: &rest[..len],
        }
    }
}

fn classify(ch: char) -> TokenKind {
    match ch {
        '.' => TokenKind::Dot,
        '-' => TokenKind::Minus,
        '=' => TokenKind::Equals,
        '"' => TokenKind::Quote,
        c if c.is_whitespace() => TokenKind::Whitespace,
        c if c.is_ascii_digit() => TokenKind::Digit,
        c if c.is_alphabetic() => TokenKind::Letter,
        _ => TokenKind::Other,
    }
}
