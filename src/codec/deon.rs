//! Deon body codec.
//!
//! Implements the subset of the deon notation the server exchanges:
//!
//! ```text
//! {
//!     token abc123
//!     changed false
//!     note 'two words'
//!     tags [
//!         one
//!         two
//!     ]
//! }
//! ```
//!
//! - Maps are `{ key value }` with entries separated by newlines or commas.
//! - Lists are `[ a, b ]` with the same separators.
//! - Bare words read as `true`, `false`, `null`, a number, or a string.
//! - Single-quoted strings support `\\`, `\'`, `\n`, `\r` and `\t` escapes.
//! - `//` starts a comment running to the end of the line.
//!
//! Encoding quotes any string that would not read back as the same string, so
//! `decode(encode(v)) == v` for every JSON value.

use serde_json::{Map, Number, Value};

use super::BodyCodec;
use crate::error::CodecError;

/// Registered media type for deon bodies.
pub const DEON_MEDIA_TYPE: &str = "application/deon";

const INDENT: &str = "    ";

/// Codec for `application/deon`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeonCodec;

impl BodyCodec for DeonCodec {
    fn media_type(&self) -> &str {
        DEON_MEDIA_TYPE
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8(e.valid_up_to()))?;
        let tokens = tokenize(text)?;
        Parser::new(tokens, text.len()).parse_document()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut out = String::new();
        write_value(&mut out, value, 0);
        out.push('\n');
        Ok(out.into_bytes())
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    OpenMap,
    CloseMap,
    OpenList,
    CloseList,
    Separator,
    Word(String),
    Quoted(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::OpenMap => "'{'".to_string(),
            Token::CloseMap => "'}'".to_string(),
            Token::OpenList => "'['".to_string(),
            Token::CloseList => "']'".to_string(),
            Token::Separator => "separator".to_string(),
            Token::Word(word) => format!("word '{}'", word),
            Token::Quoted(text) => format!("string '{}'", text),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '{' | '}' | '[' | ']' | '\'')
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, CodecError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            '\n' | ',' => {
                chars.next();
                tokens.push((Token::Separator, offset));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push((Token::OpenMap, offset));
            }
            '}' => {
                chars.next();
                tokens.push((Token::CloseMap, offset));
            }
            '[' => {
                chars.next();
                tokens.push((Token::OpenList, offset));
            }
            ']' => {
                chars.next();
                tokens.push((Token::CloseList, offset));
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((at, c)) = chars.next() {
                    match c {
                        '\'' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            let (_, escape) =
                                chars.next().ok_or(CodecError::UnterminatedString(offset))?;
                            value.push(match escape {
                                '\\' => '\\',
                                '\'' => '\'',
                                'n' => '\n',
                                'r' => '\r',
                                't' => '\t',
                                other => {
                                    return Err(CodecError::InvalidEscape {
                                        escape: other,
                                        offset: at,
                                    })
                                }
                            });
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(CodecError::UnterminatedString(offset));
                }
                tokens.push((Token::Quoted(value), offset));
            }
            '/' if text[offset..].starts_with("//") => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if is_delimiter(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push((Token::Word(word), offset));
            }
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_separators(&mut self) {
        while self.peek() == Some(&Token::Separator) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> CodecError {
        match self.peek() {
            Some(token) => CodecError::UnexpectedToken {
                found: token.describe(),
                offset: self.offset(),
            },
            None => CodecError::UnexpectedEnd,
        }
    }

    fn parse_document(mut self) -> Result<Value, CodecError> {
        self.skip_separators();
        if self.peek().is_none() {
            return Ok(Value::Object(Map::new()));
        }

        let value = self.parse_value()?;

        self.skip_separators();
        if self.peek().is_some() {
            return Err(CodecError::TrailingContent(self.offset()));
        }
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Value, CodecError> {
        match self.peek() {
            Some(Token::OpenMap) => {
                self.pos += 1;
                self.parse_map()
            }
            Some(Token::OpenList) => {
                self.pos += 1;
                self.parse_list()
            }
            Some(Token::Word(_)) | Some(Token::Quoted(_)) => match self.next() {
                Some(Token::Word(word)) => Ok(scalar_from_word(&word)),
                Some(Token::Quoted(text)) => Ok(Value::String(text)),
                _ => Err(CodecError::UnexpectedEnd),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_map(&mut self) -> Result<Value, CodecError> {
        let mut map = Map::new();
        loop {
            self.skip_separators();
            let key = match self.peek() {
                Some(Token::CloseMap) => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(Token::Word(_)) | Some(Token::Quoted(_)) => match self.next() {
                    Some(Token::Word(key)) | Some(Token::Quoted(key)) => key,
                    _ => return Err(CodecError::UnexpectedEnd),
                },
                _ => return Err(self.unexpected()),
            };

            match self.peek() {
                None => return Err(CodecError::UnexpectedEnd),
                Some(Token::Separator) | Some(Token::CloseMap) => {
                    return Err(CodecError::MissingValue(key))
                }
                _ => {}
            }
            let value = self.parse_value()?;
            map.insert(key, value);

            match self.peek() {
                Some(Token::Separator) | Some(Token::CloseMap) => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, CodecError> {
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            if self.peek() == Some(&Token::CloseList) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value()?);

            match self.peek() {
                Some(Token::Separator) | Some(Token::CloseList) => {}
                _ => return Err(self.unexpected()),
            }
        }
    }
}

/// Interpret a bare word as a scalar.
fn scalar_from_word(word: &str) -> Value {
    match word {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = word.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(n) = word.parse::<u64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = word.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }

    Value::String(word.to_string())
}

// =============================================================================
// Writer
// =============================================================================

fn is_bare_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '@' | '+')
}

fn can_write_bare(text: &str) -> bool {
    !text.is_empty() && !text.starts_with("//") && text.chars().all(is_bare_char)
}

fn write_quoted(out: &mut String, text: &str) {
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_key(out: &mut String, key: &str) {
    if can_write_bare(key) {
        out.push_str(key);
    } else {
        write_quoted(out, key);
    }
}

fn write_string(out: &mut String, text: &str) {
    let reads_back = matches!(scalar_from_word(text), Value::String(ref s) if s == text);
    if can_write_bare(text) && reads_back {
        out.push_str(text);
    } else {
        write_quoted(out, text);
    }
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for item in items {
                write_indent(out, depth + 1);
                write_value(out, item, depth + 1);
                out.push('\n');
            }
            write_indent(out, depth);
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (key, item) in map {
                write_indent(out, depth + 1);
                write_key(out, key);
                out.push(' ');
                write_value(out, item, depth + 1);
                out.push('\n');
            }
            write_indent(out, depth);
            out.push('}');
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
