//! Token types for host-language literal text.
//!
//! Tokens are the output of the literal lexer and input to the literal parser.

/// A token from lexical analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The type and value of this token.
    pub kind: TokenKind,
    /// Byte offset where this token starts.
    pub offset: usize,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Token types for literal text.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,

    // Literals
    /// `...`
    Ellipsis,
    /// Integer literal (decimal, hex, octal or binary)
    Int(i128),
    /// Float literal like `4.2` or `1e-05`
    Float(f64),
    /// Imaginary literal like `4.2j`
    Imaginary(f64),
    /// Text literal (after escape processing)
    Str(String),
    /// Bytes literal (after escape processing)
    Bytes(Vec<u8>),
    /// Identifier such as `True` or `set`
    Name(String),

    // Meta
    /// End of input
    Eof,
    /// Lexer error
    Error(String),
}

impl TokenKind {
    /// Returns a human-readable name for this token kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Colon => "':'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Ellipsis => "'...'",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Imaginary(_) => "imaginary",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Name(_) => "name",
            Self::Eof => "end of input",
            Self::Error(_) => "error",
        }
    }
}
