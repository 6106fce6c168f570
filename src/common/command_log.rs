//! Token layer of the history log: angle-bracket tokens, either bare
//! markers (`<BEGIN_COMMAND>`) or `<key=value>` fields split on the
//! first `=`. Values may not contain `<` or `>`.

use std::fmt::Write as _;

#[derive(Debug)]
pub enum ScanError {
    /// A `<` with no closing `>` before end of input (byte offset).
    UnterminatedToken(usize),
    /// Bytes outside any token that are not whitespace (byte offset).
    StrayInput(usize),
    EmptyToken(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    BeginGroup,
    EndGroup,
    BeginCommand,
    EndCommand,
    Field { key: String, value: String },
}

pub const BEGIN_GROUP: &str = "BEGIN_COMMAND_GROUP";
pub const END_GROUP: &str = "END_COMMAND_GROUP";
pub const BEGIN_COMMAND: &str = "BEGIN_COMMAND";
pub const END_COMMAND: &str = "END_COMMAND";

impl Token {
    pub fn field(key: &str, value: impl ToString) -> Self {
        Token::Field {
            key: key.to_owned(),
            value: value.to_string(),
        }
    }

    fn parse(body: &str) -> Token {
        match body {
            BEGIN_GROUP => Token::BeginGroup,
            END_GROUP => Token::EndGroup,
            BEGIN_COMMAND => Token::BeginCommand,
            END_COMMAND => Token::EndCommand,
            _ => match body.split_once('=') {
                Some((key, value)) => Token::Field {
                    key: key.to_owned(),
                    value: value.to_owned(),
                },
                None => Token::Field {
                    key: body.to_owned(),
                    value: String::new(),
                },
            },
        }
    }
}

pub fn emit(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::BeginGroup => {
                let _ = write!(out, "<{BEGIN_GROUP}>");
            }
            Token::EndGroup => {
                let _ = write!(out, "<{END_GROUP}>");
            }
            Token::BeginCommand => {
                let _ = write!(out, "<{BEGIN_COMMAND}>");
            }
            Token::EndCommand => {
                let _ = write!(out, "<{END_COMMAND}>");
            }
            Token::Field { key, value } => {
                let _ = write!(out, "<{key}={value}>");
            }
        }
    }
    out
}

/// Splits the input into tokens. Whitespace between tokens is ignored;
/// anything else outside a token is an error.
pub fn scan(input: &str) -> Result<Vec<Token>, ScanError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    let mut offset = 0;
    loop {
        let skipped = rest.len() - rest.trim_start().len();
        offset += skipped;
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }
        if !rest.starts_with('<') {
            return Err(ScanError::StrayInput(offset));
        }
        let Some(end) = rest.find('>') else {
            return Err(ScanError::UnterminatedToken(offset));
        };
        let body = &rest[1..end];
        if body.is_empty() {
            return Err(ScanError::EmptyToken(offset));
        }
        tokens.push(Token::parse(body));
        offset += end + 1;
        rest = &rest[end + 1..];
    }
}
