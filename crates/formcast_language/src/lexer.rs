//! Lexer for host-language literal text.
//!
//! The lexer converts literal source text into a stream of tokens. It
//! recognizes numbers, prefixed and triple-quoted strings with escapes,
//! brackets, and the few names a literal may contain.

use crate::token::{Token, TokenKind};

/// Lexer for literal text.
pub struct Lexer<'src> {
    /// Full source text.
    source: &'src str,
    /// Remaining source text.
    rest: &'src str,
    /// Current byte offset in source.
    position: usize,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            position: 0,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.position;

        let Some(c) = self.peek_char() else {
            return Token::new(TokenKind::Eof, start);
        };
        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '.' if self.rest.starts_with("...") => {
                self.advance_by(3);
                TokenKind::Ellipsis
            }
            '.' if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            '\'' | '"' => self.scan_string(false, false),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_name(),
            c => {
                self.advance();
                TokenKind::Error(format!("unexpected character: {c}"))
            }
        };
        Token::new(kind, start)
    }

    /// Tokenizes all source and returns a vector of tokens, ending with `Eof`.
    #[must_use]
    pub fn tokenize_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        let len = c.len_utf8();
        self.rest = &self.rest[len..];
        self.position += len;
        Some(c)
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Skips whitespace, comments and line continuations.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while self.peek_char().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else if c == '\\' && self.peek_char_n(1) == Some('\n') {
                self.advance_by(2);
            } else {
                break;
            }
        }
    }

    fn scan_name(&mut self) -> TokenKind {
        let start = self.position;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let source = self.source;
        let name = &source[start..self.position];

        if matches!(self.peek_char(), Some('\'' | '"')) {
            let lower = name.to_ascii_lowercase();
            match lower.as_str() {
                "r" => return self.scan_string(true, false),
                "b" => return self.scan_string(false, true),
                "u" => return self.scan_string(false, false),
                "br" | "rb" => return self.scan_string(true, true),
                _ => {}
            }
        }
        TokenKind::Name(name.to_string())
    }

    fn scan_number(&mut self) -> TokenKind {
        let mut text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        // Exponent signs split the token above; pick them up here.
        while (text.ends_with('e') || text.ends_with('E'))
            && !text.starts_with("0x")
            && !text.starts_with("0X")
            && matches!(self.peek_char(), Some('+' | '-'))
        {
            if let Some(sign) = self.advance() {
                text.push(sign);
            }
            text.push_str(&self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
        parse_number(&text)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if !keep(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn scan_string(&mut self, raw: bool, bytes: bool) -> TokenKind {
        let Some(quote) = self.advance() else {
            return TokenKind::Error("unterminated string literal".into());
        };
        let triple = self.peek_char() == Some(quote) && self.peek_char_n(1) == Some(quote);
        if triple {
            self.advance_by(2);
        }

        let mut buf = if bytes {
            Buffer::Bytes(Vec::new())
        } else {
            Buffer::Text(String::new())
        };
        loop {
            let Some(c) = self.advance() else {
                return TokenKind::Error("unterminated string literal".into());
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek_char() == Some(quote) && self.peek_char_n(1) == Some(quote) {
                    self.advance_by(2);
                    break;
                }
                if let Err(e) = buf.push_char(c) {
                    return TokenKind::Error(e);
                }
                continue;
            }
            if c == '\n' && !triple {
                return TokenKind::Error("unterminated string literal".into());
            }
            let pushed = if c == '\\' {
                if raw {
                    // Raw strings keep the backslash, but it still protects the next char.
                    let next = self.advance();
                    buf.push_char('\\').and_then(|()| match next {
                        Some(n) => buf.push_char(n),
                        None => Err("unterminated string literal".into()),
                    })
                } else {
                    self.scan_escape(&mut buf)
                }
            } else {
                buf.push_char(c)
            };
            if let Err(e) = pushed {
                return TokenKind::Error(e);
            }
        }
        match buf {
            Buffer::Text(s) => TokenKind::Str(s),
            Buffer::Bytes(b) => TokenKind::Bytes(b),
        }
    }

    /// Scans the escape sequence after a backslash.
    fn scan_escape(&mut self, buf: &mut Buffer) -> Result<(), String> {
        let Some(c) = self.advance() else {
            return Err("unexpected end of input in string escape".into());
        };
        match c {
            '\n' => Ok(()),
            '\\' | '\'' | '"' => buf.push_char(c),
            'a' => buf.push_code(0x07),
            'b' => buf.push_code(0x08),
            'f' => buf.push_code(0x0c),
            'n' => buf.push_code(0x0a),
            'r' => buf.push_code(0x0d),
            't' => buf.push_code(0x09),
            'v' => buf.push_code(0x0b),
            '0'..='7' => {
                let mut digits = String::from(c);
                while digits.len() < 3 && self.peek_char().is_some_and(|d| d.is_digit(8)) {
                    digits.extend(self.advance());
                }
                let code = u32::from_str_radix(&digits, 8).map_err(|e| e.to_string())?;
                buf.push_code(code)
            }
            'x' => self.scan_hex_escape(buf, 2),
            'u' if buf.is_text() => self.scan_hex_escape(buf, 4),
            'U' if buf.is_text() => self.scan_hex_escape(buf, 8),
            'N' if buf.is_text() => Err("named unicode escapes are not supported".into()),
            other => {
                buf.push_char('\\')?;
                buf.push_char(other)
            }
        }
    }

    fn scan_hex_escape(&mut self, buf: &mut Buffer, width: usize) -> Result<(), String> {
        let mut digits = String::with_capacity(width);
        for _ in 0..width {
            match self.peek_char() {
                Some(d) if d.is_ascii_hexdigit() => {
                    digits.push(d);
                    self.advance();
                }
                _ => return Err(format!("truncated \\x escape, expected {width} hex digits")),
            }
        }
        let code = u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())?;
        buf.push_code(code)
    }
}

/// Accumulates the decoded content of a text or bytes literal.
enum Buffer {
    Text(String),
    Bytes(Vec<u8>),
}

impl Buffer {
    const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Pushes a source character (bytes literals only accept ASCII).
    fn push_char(&mut self, c: char) -> Result<(), String> {
        match self {
            Self::Text(s) => {
                s.push(c);
                Ok(())
            }
            Self::Bytes(b) => {
                let byte = u8::try_from(u32::from(c))
                    .ok()
                    .filter(u8::is_ascii)
                    .ok_or_else(|| "bytes can only contain ASCII literal characters".to_string())?;
                b.push(byte);
                Ok(())
            }
        }
    }

    /// Pushes an escaped code point or byte value.
    fn push_code(&mut self, code: u32) -> Result<(), String> {
        match self {
            Self::Text(s) => {
                let c = char::from_u32(code)
                    .ok_or_else(|| format!("invalid code point in escape: {code:#x}"))?;
                s.push(c);
                Ok(())
            }
            Self::Bytes(b) => {
                let byte =
                    u8::try_from(code).map_err(|_| format!("byte escape out of range: {code:#x}"))?;
                b.push(byte);
                Ok(())
            }
        }
    }
}

/// Parses numeric literal text (`42`, `0x1f`, `4.2`, `1e-05`, `2j`).
fn parse_number(text: &str) -> TokenKind {
    let lower = text.to_ascii_lowercase();
    if lower.contains("__") || lower.ends_with('_') {
        return TokenKind::Error(format!("invalid number literal: {text}"));
    }
    let cleaned = lower.replace('_', "");

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = cleaned.strip_prefix(prefix) {
            return i128::from_str_radix(digits, radix).map_or_else(
                |_| TokenKind::Error(format!("invalid number literal: {text}")),
                TokenKind::Int,
            );
        }
    }

    if let Some(body) = cleaned.strip_suffix('j') {
        return body.parse::<f64>().map_or_else(
            |_| TokenKind::Error(format!("invalid imaginary literal: {text}")),
            TokenKind::Imaginary,
        );
    }

    if cleaned.contains(['.', 'e']) {
        return cleaned.parse::<f64>().map_or_else(
            |_| TokenKind::Error(format!("invalid float literal: {text}")),
            TokenKind::Float,
        );
    }

    if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.bytes().any(|b| b != b'0') {
        return TokenKind::Error(format!("leading zeros in decimal integer: {text}"));
    }
    cleaned.parse::<i128>().map_or_else(
        |_| TokenKind::Error(format!("invalid integer literal: {text}")),
        TokenKind::Int,
    )
}
