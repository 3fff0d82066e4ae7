use std::{borrow::Cow, ops::Range, str::FromStr};

use crate::{DatabaseError, Result, sql::parser::Keyword};

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Keyword(Keyword),
    Identifier(&'a str),
    Integer(i64),
    Float(f64),

    /// A quoted literal, or a numeric literal that did not parse.
    String(Cow<'a, str>),

    Comma,
    Asterisk,
    SemiColon,
    Equal,
    Dot,

    LeftParen,
    RightParen,
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{kw}"),
            Token::Identifier(ident) => write!(f, "{ident}"),
            Token::Integer(i) => write!(f, "{i}"),
            Token::Float(fl) => write!(f, "{fl}"),
            Token::String(s) => write!(f, "'{s}'"),
            Token::Comma => write!(f, ","),
            Token::Asterisk => write!(f, "*"),
            Token::SemiColon => write!(f, ";"),
            Token::Equal => write!(f, "="),
            Token::Dot => write!(f, "."),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
        }
    }
}

/// A token and the byte range it covers in the query.
pub type Spanned<'a> = (Token<'a>, Range<usize>);

pub(crate) struct Lexer<'a> {
    pub whole: &'a str,
    pub rest: &'a str,
    pub position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            whole: input,
            rest: input,
            position: 0,
        }
    }

    fn advance(&mut self, len: usize) -> &'a str {
        let consumed = &self.rest[..len];
        self.position += len;
        self.rest = &self.rest[len..];
        consumed
    }

    fn skip_whitespace(&mut self) {
        let non_whitespace_pos = self
            .rest
            .char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map(|(pos, _)| pos)
            .unwrap_or(self.rest.len());

        self.advance(non_whitespace_pos);
    }

    fn consume_word(&mut self) -> &'a str {
        let word_end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());

        self.advance(word_end)
    }

    /// Reads a quoted literal. The opening quote is at the start of `rest`.
    fn consume_string(&mut self) -> Result<Cow<'a, str>> {
        let start = self.position;
        let body = &self.rest[1..];

        let mut escaped = false;
        let mut offset = 0;
        loop {
            let Some(found) = body[offset..].find('\'') else {
                self.advance(self.rest.len());
                return Err(DatabaseError::syntax(
                    self.whole,
                    start..self.whole.len(),
                    "Unterminated string literal",
                ));
            };

            let quote = offset + found;
            if body[quote + 1..].starts_with('\'') {
                escaped = true;
                offset = quote + 2;
                continue;
            }

            let raw = &body[..quote];
            self.advance(quote + 2);

            return Ok(if escaped {
                Cow::Owned(raw.replace("''", "'"))
            } else {
                Cow::Borrowed(raw)
            });
        }
    }

    fn consume_number(&mut self) -> Token<'a> {
        let sign = usize::from(self.rest.starts_with('-'));
        let number_end = self.rest[sign..]
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .map_or(self.rest.len(), |end| end + sign);

        let number_str = self.advance(number_end);
        if number_str.contains('.') {
            match number_str.parse::<f64>() {
                Ok(f) => Token::Float(f),
                Err(_) => Token::String(Cow::Borrowed(number_str)),
            }
        } else {
            match number_str.parse::<i64>() {
                Ok(i) => Token::Integer(i),
                Err(_) => Token::String(Cow::Borrowed(number_str)),
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();

        let char = self.rest.chars().next()?;
        let start = self.position;

        let single = match char {
            ',' => Some(Token::Comma),
            '*' => Some(Token::Asterisk),
            ';' => Some(Token::SemiColon),
            '=' => Some(Token::Equal),
            '.' => Some(Token::Dot),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };

        let token = if let Some(token) = single {
            self.advance(char.len_utf8());
            Ok(token)
        } else if char == '\'' {
            self.consume_string().map(Token::String)
        } else if char.is_ascii_digit()
            || (char == '-' && self.rest[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            Ok(self.consume_number())
        } else if char.is_alphabetic() || char == '_' {
            let word = self.consume_word();
            Ok(match Keyword::from_str(word) {
                Ok(keyword) => Token::Keyword(keyword),
                Err(_) => Token::Identifier(word),
            })
        } else {
            self.advance(char.len_utf8());
            Err(DatabaseError::syntax(
                self.whole,
                start..self.position,
                format!("Unexpected character '{char}'"),
            ))
        };

        Some(token.map(|token| (token, start..self.position)))
    }
}
