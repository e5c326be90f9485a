//! Parser for host-language literal text.
//!
//! The parser turns the token stream from [`Lexer`] into a [`Value`], and
//! accepts only what the host's safe literal evaluator accepts: constants,
//! containers of literals, `set()`, a sign applied directly to a number, and
//! a real number plus or minus an imaginary constant.

use formcast_foundation::{Complex, Error, Result, Value};

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Parser for literal text.
pub struct Parser<'src> {
    /// The lexer providing tokens.
    lexer: Lexer<'src>,
    /// Current token (lookahead).
    current: Token,
}

/// A parsed numeric constant, before range checks.
#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i128),
    Float(f64),
    Complex(Complex),
}

impl Number {
    const fn is_real(self) -> bool {
        !matches!(self, Self::Complex(_))
    }

    fn negate(self) -> Self {
        match self {
            Self::Int(n) => Self::Int(-n),
            Self::Float(x) => Self::Float(-x),
            Self::Complex(c) => Self::Complex(Complex::new(-c.re, -c.im)),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
            Self::Complex(c) => c.re,
        }
    }
}

/// The syntactic shape of an operand, which decides where it may appear.
#[derive(Debug)]
enum Operand {
    /// A bare numeric constant.
    Constant(Number),
    /// A sign applied to a numeric constant.
    Signed(Number),
    /// A real plus or minus an imaginary constant.
    Sum(Number),
    /// Anything else.
    Value(Value),
}

impl<'src> Parser<'src> {
    /// Creates a new parser for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses the whole source as one literal.
    ///
    /// # Errors
    /// Returns an error if the source is not a literal.
    pub fn parse(&mut self) -> Result<Value> {
        let first = self.parse_expression()?;
        let value = if self.current.kind == TokenKind::Comma {
            let mut items = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.current.kind == TokenKind::Eof {
                    break;
                }
                items.push(self.parse_expression()?);
            }
            Value::Tuple(items)
        } else {
            first
        };
        if self.current.kind != TokenKind::Eof {
            return Err(self.unexpected());
        }
        Ok(value)
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                kind.name(),
                self.current.kind.name()
            )))
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::literal_syntax(message, self.current.offset)
    }

    fn unexpected(&self) -> Error {
        match &self.current.kind {
            TokenKind::Error(msg) => self.error(msg),
            kind => self.error(&format!("unexpected {}", kind.name())),
        }
    }

    fn parse_expression(&mut self) -> Result<Value> {
        let offset = self.current.offset;
        let operand = self.parse_sum()?;
        finish(operand, offset)
    }

    /// Parses `operand [(+|-) imaginary]`.
    fn parse_sum(&mut self) -> Result<Operand> {
        let left = self.parse_unary()?;
        let negative = match self.current.kind {
            TokenKind::Plus => false,
            TokenKind::Minus => true,
            _ => return Ok(left),
        };
        let real = match left {
            Operand::Constant(n) | Operand::Signed(n) if n.is_real() => n,
            _ => return Err(self.error("malformed node or string")),
        };
        self.advance();
        let imaginary = match self.parse_primary()? {
            Operand::Constant(Number::Complex(c)) => c,
            _ => return Err(self.error("malformed node or string")),
        };
        let re = real.as_f64();
        let sum = if negative {
            Complex::new(re - imaginary.re, 0.0 - imaginary.im)
        } else {
            Complex::new(re + imaginary.re, 0.0 + imaginary.im)
        };
        Ok(Operand::Sum(Number::Complex(sum)))
    }

    /// Parses `[+|-] primary`, where the sign may only touch a constant.
    fn parse_unary(&mut self) -> Result<Operand> {
        let negative = match self.current.kind {
            TokenKind::Plus => false,
            TokenKind::Minus => true,
            _ => return self.parse_primary(),
        };
        self.advance();
        match self.parse_primary()? {
            Operand::Constant(n) => Ok(Operand::Signed(if negative { n.negate() } else { n })),
            _ => Err(self.error("malformed node or string")),
        }
    }

    fn parse_primary(&mut self) -> Result<Operand> {
        match &self.current.kind {
            TokenKind::Int(n) => {
                let n = *n;
                self.advance();
                Ok(Operand::Constant(Number::Int(n)))
            }
            TokenKind::Float(x) => {
                let x = *x;
                self.advance();
                Ok(Operand::Constant(Number::Float(x)))
            }
            TokenKind::Imaginary(x) => {
                let x = *x;
                self.advance();
                Ok(Operand::Constant(Number::Complex(Complex::new(0.0, x))))
            }
            TokenKind::Str(_) | TokenKind::Bytes(_) => self.parse_text().map(Operand::Value),
            TokenKind::Ellipsis => {
                self.advance();
                Ok(Operand::Value(Value::Ellipsis))
            }
            TokenKind::Name(name) => {
                let value = match name.as_str() {
                    "True" => Value::Bool(true),
                    "False" => Value::Bool(false),
                    "None" => Value::None,
                    "set" => {
                        self.advance();
                        self.expect(&TokenKind::LParen)?;
                        self.expect(&TokenKind::RParen)?;
                        return Ok(Operand::Value(Value::Set(Vec::new())));
                    }
                    other => return Err(self.error(&format!("malformed node or string: {other}"))),
                };
                self.advance();
                Ok(Operand::Value(value))
            }
            TokenKind::LParen => self.parse_parenthesized(),
            TokenKind::LBracket => self.parse_list().map(Operand::Value),
            TokenKind::LBrace => self.parse_braced().map(Operand::Value),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses adjacent text or bytes literals, which concatenate.
    fn parse_text(&mut self) -> Result<Value> {
        let mut text: Option<String> = None;
        let mut bytes: Option<Vec<u8>> = None;
        loop {
            match &self.current.kind {
                TokenKind::Str(s) if bytes.is_none() => {
                    text.get_or_insert_with(String::new).push_str(s);
                }
                TokenKind::Bytes(b) if text.is_none() => {
                    bytes.get_or_insert_with(Vec::new).extend_from_slice(b);
                }
                TokenKind::Str(_) | TokenKind::Bytes(_) => {
                    return Err(self.error("cannot mix bytes and nonbytes literals"));
                }
                _ => break,
            }
            self.advance();
        }
        match (text, bytes) {
            (Some(s), _) => Ok(Value::Str(s)),
            (None, Some(b)) => Ok(Value::Bytes(b)),
            (None, None) => Err(self.unexpected()),
        }
    }

    /// Parses `( ... )`: a grouping or a tuple.
    fn parse_parenthesized(&mut self) -> Result<Operand> {
        self.expect(&TokenKind::LParen)?;
        if self.eat(&TokenKind::RParen) {
            return Ok(Operand::Value(Value::Tuple(Vec::new())));
        }
        let offset = self.current.offset;
        let first = self.parse_sum()?;
        if self.eat(&TokenKind::RParen) {
            return Ok(first);
        }
        let mut items = vec![finish(first, offset)?];
        self.expect(&TokenKind::Comma)?;
        while !self.eat(&TokenKind::RParen) {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }
        Ok(Operand::Value(Value::Tuple(items)))
    }

    /// Parses `[ ... ]`.
    fn parse_list(&mut self) -> Result<Value> {
        self.expect(&TokenKind::LBracket)?;
        let items = self.parse_items(&TokenKind::RBracket)?;
        Ok(Value::list(items))
    }

    /// Parses `{ ... }`: a dict, or a set when the first entry has no colon.
    fn parse_braced(&mut self) -> Result<Value> {
        self.expect(&TokenKind::LBrace)?;
        if self.eat(&TokenKind::RBrace) {
            return Ok(Value::dict(Vec::new()));
        }
        let offset = self.current.offset;
        let first = self.parse_expression()?;
        if self.current.kind != TokenKind::Colon {
            check_hashable(&first, offset)?;
            let mut items = vec![first];
            if self.eat(&TokenKind::Comma) {
                for item in self.parse_items(&TokenKind::RBrace)? {
                    check_hashable(&item, offset)?;
                    items.push(item);
                }
            } else {
                self.expect(&TokenKind::RBrace)?;
            }
            return Ok(Value::set(items));
        }

        let mut entries = Vec::new();
        let mut key = first;
        let mut key_offset = offset;
        loop {
            self.expect(&TokenKind::Colon)?;
            check_hashable(&key, key_offset)?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) || self.current.kind == TokenKind::RBrace {
                self.expect(&TokenKind::RBrace)?;
                break;
            }
            key_offset = self.current.offset;
            key = self.parse_expression()?;
        }
        Ok(Value::dict(entries))
    }

    /// Parses comma-separated items up to `close`, allowing a trailing comma.
    fn parse_items(&mut self, close: &TokenKind) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }
}

/// Converts a parsed operand into a value, range-checking integers.
fn finish(operand: Operand, offset: usize) -> Result<Value> {
    let number = match operand {
        Operand::Value(value) => return Ok(value),
        Operand::Constant(n) | Operand::Signed(n) | Operand::Sum(n) => n,
    };
    match number {
        Number::Int(n) => i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| Error::literal_syntax("integer out of range", offset)),
        Number::Float(x) => Ok(Value::Float(x)),
        Number::Complex(c) => Ok(Value::Complex(c)),
    }
}

fn check_hashable(value: &Value, offset: usize) -> Result<()> {
    if is_hashable(value) {
        Ok(())
    } else {
        Err(Error::literal_syntax(
            format!("unhashable type: '{}'", value.type_name()),
            offset,
        ))
    }
}

fn is_hashable(value: &Value) -> bool {
    match value {
        Value::List(_) | Value::Dict(_) | Value::Set(_) => false,
        Value::Tuple(items) => items.iter().all(is_hashable),
        _ => true,
    }
}

/// Evaluates literal text to the value it denotes.
///
/// # Errors
/// Returns a literal syntax error if the text is anything but a literal.
pub fn literal_eval(source: &str) -> Result<Value> {
    Parser::new(source).parse()
}
