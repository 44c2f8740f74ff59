//! Tokenizer for the relaxed JSON grammar.
//!
//! The scanner never consumes a token body: [`Scanner::peek`] skips whitespace, comments
//! and a leading `+`, then classifies the character under the cursor. The reader advances
//! past the body itself once it knows how to parse it.

use std::fmt;

use crate::error::{Construct, Error};
use crate::Location;

/// Lexical token kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    ArrayStart,
    ArrayEnd,
    ObjectStart,
    ObjectEnd,
    String,
    Number,
    True,
    False,
    Null,
    NaN,
    PositiveInfinity,
    NegativeInfinity,
    Undefined,
    ValueDelim,
    NameDelim,
    UnquotedName,
    End,
}

const LITERALS: [(&str, Token); 7] = [
    ("false", Token::False),
    ("true", Token::True),
    ("null", Token::Null),
    ("NaN", Token::NaN),
    ("Infinity", Token::PositiveInfinity),
    ("-Infinity", Token::NegativeInfinity),
    ("undefined", Token::Undefined),
];

impl Token {
    /// Source length of a keyword literal token, `None` for other tokens.
    pub fn literal_len(self) -> Option<usize> {
        LITERALS
            .iter()
            .find(|(_, token)| *token == self)
            .map(|(text, _)| text.len())
    }

    /// `true` for tokens that can start a value.
    pub fn starts_value(self) -> bool {
        !matches!(
            self,
            Token::ArrayEnd
                | Token::ObjectEnd
                | Token::ValueDelim
                | Token::NameDelim
                | Token::UnquotedName
                | Token::End
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::ArrayStart => "'['",
            Token::ArrayEnd => "']'",
            Token::ObjectStart => "'{'",
            Token::ObjectEnd => "'}'",
            Token::String => "string",
            Token::Number => "number",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::NaN => "NaN",
            Token::PositiveInfinity => "Infinity",
            Token::NegativeInfinity => "-Infinity",
            Token::Undefined => "undefined",
            Token::ValueDelim => "','",
            Token::NameDelim => "':'",
            Token::UnquotedName => "unquoted name",
            Token::End => "end of input",
        };
        f.write_str(text)
    }
}

/// Cursor over the source text.
#[derive(Clone, Debug)]
pub(crate) struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let pos = if text.starts_with('\u{FEFF}') { 3 } else { 0 };
        Self { text, pos }
    }

    pub(crate) fn text(&self) -> &'a str {
        self.text
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor to `pos`. Callers only pass offsets they obtained from this scanner.
    #[inline]
    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    #[inline]
    pub(crate) fn advance(&mut self, bytes: usize) {
        self.set_pos(self.pos + bytes);
    }

    #[inline]
    pub(crate) fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub(crate) fn location(&self) -> Location {
        Location::at(self.text, self.pos)
    }

    pub(crate) fn location_of(&self, offset: usize) -> Location {
        Location::at(self.text, offset)
    }

    /// Skip whitespace and comments, then classify the next token without consuming it.
    ///
    /// Arguments:
    /// - `allow_unquoted`: accept unrecognized text as [`Token::UnquotedName`]
    ///   (object key position with unquoted keys enabled).
    pub(crate) fn peek(&mut self, allow_unquoted: bool) -> Result<Token, Error> {
        self.skip_insignificant()?;

        // Positive signing is extraneous.
        if self.rest().starts_with('+') {
            self.pos += 1;
        }

        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return Ok(Token::End);
        };

        let token = match c {
            '[' => Token::ArrayStart,
            ']' => Token::ArrayEnd,
            '{' => Token::ObjectStart,
            '}' => Token::ObjectEnd,
            '"' | '\'' => Token::String,
            ',' => Token::ValueDelim,
            ':' => Token::NameDelim,
            // Keys never start with a number or keyword, so `nullable` stays a name.
            _ if allow_unquoted => Token::UnquotedName,
            _ if c.is_ascii_digit() => Token::Number,
            '-' if rest.as_bytes().get(1).is_some_and(u8::is_ascii_digit) => Token::Number,
            _ => match LITERALS.iter().find(|(text, _)| rest.starts_with(text)) {
                Some((_, token)) => *token,
                None => return Err(self.malformed(c)),
            },
        };
        Ok(token)
    }

    /// Skip any run of whitespace, `/* */` and `//` comments.
    fn skip_insignificant(&mut self) -> Result<(), Error> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if !trimmed.starts_with('/') {
                return Ok(());
            }
            match trimmed.as_bytes().get(1) {
                Some(b'*') => {
                    let start = self.pos;
                    match trimmed[2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => {
                            return Err(Error::Unterminated {
                                construct: Construct::Comment,
                                location: self.location_of(start),
                            });
                        }
                    }
                }
                Some(b'/') => match trimmed.find(['\r', '\n']) {
                    Some(end) => self.pos += end,
                    None => self.pos = self.text.len(),
                },
                _ => return Err(self.malformed('/')),
            }
        }
    }

    /// Consume an unquoted object key.
    ///
    /// The key runs up to the next whitespace or structural character and is never empty
    /// when the scanner reported [`Token::UnquotedName`].
    pub(crate) fn read_unquoted_key(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| {
                c.is_whitespace()
                    || matches!(c, ':' | ',' | '{' | '}' | '[' | ']' | '"' | '\'')
            })
            .unwrap_or(rest.len());
        // A key starting with a structural character is still one character long.
        let len = if len == 0 {
            rest.chars().next().map_or(0, char::len_utf8)
        } else {
            len
        };
        self.pos += len;
        &rest[..len]
    }

    #[cold]
    fn malformed(&self, found: char) -> Error {
        let before: usize = self.text[..self.pos]
            .chars()
            .rev()
            .take(5)
            .map(char::len_utf8)
            .sum();
        let after: usize = self.rest().chars().take(20).map(char::len_utf8).sum();
        Error::MalformedToken {
            found,
            context: self.text[self.pos - before..self.pos + after].to_owned(),
            location: self.location(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(text);
        let mut out = Vec::new();
        loop {
            let token = scanner.peek(false).unwrap();
            out.push(token);
            match token {
                Token::End => return out,
                _ => match token.literal_len() {
                    Some(len) => scanner.advance(len),
                    None => scanner.advance(1),
                },
            }
        }
    }

    #[test]
    fn structural_tokens() {
        assert_eq!(
            tokens("[ { } ] , :"),
            vec![
                Token::ArrayStart,
                Token::ObjectStart,
                Token::ObjectEnd,
                Token::ArrayEnd,
                Token::ValueDelim,
                Token::NameDelim,
                Token::End
            ]
        );
    }

    #[test]
    fn literals_by_exact_match() {
        assert_eq!(
            tokens("true false null NaN Infinity -Infinity undefined"),
            vec![
                Token::True,
                Token::False,
                Token::Null,
                Token::NaN,
                Token::PositiveInfinity,
                Token::NegativeInfinity,
                Token::Undefined,
                Token::End
            ]
        );
    }

    #[test]
    fn consecutive_comments_are_skipped() {
        let mut scanner = Scanner::new("/* a */ // b\n /* c */\n  // d\n ]");
        assert_eq!(scanner.peek(false).unwrap(), Token::ArrayEnd);
        assert!(scanner.rest().starts_with(']'));
    }

    #[test]
    fn numbers_and_sign() {
        let mut scanner = Scanner::new("-1");
        assert_eq!(scanner.peek(false).unwrap(), Token::Number);
        let mut scanner = Scanner::new("+5");
        assert_eq!(scanner.peek(false).unwrap(), Token::Number);
        assert_eq!(scanner.pos(), 1);
    }

    #[test]
    fn unterminated_comment_reports_start() {
        let mut scanner = Scanner::new("  /* open");
        match scanner.peek(false) {
            Err(Error::Unterminated {
                construct: Construct::Comment,
                location,
            }) => assert_eq!(location.column(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lone_slash_is_malformed() {
        let mut scanner = Scanner::new("/");
        assert!(matches!(
            scanner.peek(false),
            Err(Error::MalformedToken { found: '/', .. })
        ));
    }

    #[test]
    fn malformed_token_context() {
        let mut scanner = Scanner::new("[1, 2, @oops, 3]");
        scanner.set_pos(7);
        match scanner.peek(false) {
            Err(Error::MalformedToken { found, context, .. }) => {
                assert_eq!(found, '@');
                assert_eq!(context, ", 2, @oops, 3]");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unquoted_key() {
        let mut scanner = Scanner::new("name_1 : 2");
        assert_eq!(scanner.peek(true).unwrap(), Token::UnquotedName);
        assert_eq!(scanner.read_unquoted_key(), "name_1");
        assert_eq!(scanner.peek(false).unwrap(), Token::NameDelim);

        let mut scanner = Scanner::new("nullable: 1");
        assert_eq!(scanner.peek(true).unwrap(), Token::UnquotedName);
        assert_eq!(scanner.read_unquoted_key(), "nullable");
    }

    #[test]
    fn skips_bom() {
        let mut scanner = Scanner::new("\u{FEFF}null");
        assert_eq!(scanner.peek(false).unwrap(), Token::Null);
    }
}
