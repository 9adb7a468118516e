//! Tokenizer for expression text.
//!
//! The lexer is lazy: tokens are produced one at a time as the parser asks for them.
//! It is `Clone`, so looking ahead is done on a copy and never disturbs the original.

use alloc::format;

use crate::Real;
use crate::error::{ExprError, Result};
use crate::types::{Operator, TokenKind};

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// The matched source text. Empty for `End`.
    pub text: &'a str,
    /// Byte offset of the first character of the token.
    pub position: usize,
}

/// The lexer struct, which produces tokens from an input string.
#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            finished: false,
        }
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Peek at the character after the current one.
    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advance the position by one character.
    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.pos > start
    }

    /// Peek at the next token without consuming it.
    pub fn peek_token(&self) -> Result<Token<'a>> {
        let mut lexer_copy = self.clone();
        lexer_copy.next_token()
    }

    /// Get the next token from the input.
    ///
    /// Once the input is exhausted every call returns an `End` token positioned at the
    /// length of the input.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::End,
                text: "",
                position: start,
            });
        };

        let leading_dot = c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit());
        if c.is_ascii_digit() || leading_dot {
            return self.lex_number(start);
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                self.advance();
            }
            return Ok(self.token(TokenKind::Identifier, start));
        }

        let kind = match c {
            '(' => TokenKind::Open,
            ')' => TokenKind::Close,
            ',' => TokenKind::Comma,
            _ => match Operator::from_char(c) {
                Some(op) => TokenKind::Operator(op),
                None => {
                    return Err(ExprError::Lexical {
                        position: start,
                        message: format!("unexpected character '{}'", c),
                    });
                }
            },
        };
        self.advance();
        Ok(self.token(kind, start))
    }

    /// Decimal or scientific literal, including the leading-dot form (`.5`, `.9e2`).
    fn lex_number(&mut self, start: usize) -> Result<Token<'a>> {
        self.skip_digits();
        if self.peek() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if !self.skip_digits() {
                return Err(ExprError::Lexical {
                    position: start,
                    message: format!(
                        "malformed number '{}': missing exponent digits",
                        &self.input[start..self.pos]
                    ),
                });
            }
        }

        let text = &self.input[start..self.pos];
        let value = text.parse::<Real>().map_err(|_| ExprError::Lexical {
            position: start,
            message: format!("malformed number '{}'", text),
        })?;
        Ok(self.token(TokenKind::Number(value), start))
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.input[start..self.pos],
            position: start,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    /// Yields every token up to and including `End`, or up to the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if !matches!(&token, Ok(t) if t.kind != TokenKind::End) {
            self.finished = true;
        }
        Some(token)
    }
}

/// Tokenize the whole input, mostly useful for diagnostics.
pub fn tokenize(input: &str) -> Result<alloc::vec::Vec<Token<'_>>> {
    Lexer::new(input).collect()
}

impl core::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            TokenKind::End => write!(f, "end of input"),
            _ => write!(f, "'{}'", self.text),
        }
    }
}
