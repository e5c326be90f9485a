//! The form data structure consumed by the compiler.
//!
//! A [`Form`] is produced by an external reader. It is either a compound
//! (nested) expression, a symbol, a control word, or a self-denoting literal.

use std::fmt;

use crate::value::Value;

/// Prefix that marks a control word.
pub const CONTROL_PREFIX: char = ':';

/// A unit of the symbolic input language.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Form {
    /// Nested expression `(head arg ...)`.
    ///
    /// An empty compound is not an expression; it denotes the empty tuple.
    Compound(Vec<Form>),
    /// Identifier text, possibly qualified (`module..attr`), a module
    /// reference (`module.`), or raw host text.
    Symbol(String),
    /// Reserved punctuation such as `:`, `:*`, `:**`, `:?`, `:/`.
    Control(String),
    /// Any value that denotes itself.
    Literal(Value),
}

impl Form {
    /// Creates a compound form.
    #[must_use]
    pub fn compound(items: impl IntoIterator<Item = Form>) -> Self {
        Self::Compound(items.into_iter().collect())
    }

    /// Creates a symbol form.
    #[must_use]
    pub fn symbol(text: impl Into<String>) -> Self {
        Self::Symbol(text.into())
    }

    /// Creates a control word, adding the `:` prefix when missing.
    #[must_use]
    pub fn control(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with(CONTROL_PREFIX) {
            Self::Control(text)
        } else {
            Self::Control(format!("{CONTROL_PREFIX}{text}"))
        }
    }

    /// Creates a literal form.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a text literal form.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::Literal(Value::Str(text.into()))
    }

    /// Returns the symbol text, if this is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the control word text (including the prefix), if this is one.
    #[must_use]
    pub fn as_control(&self) -> Option<&str> {
        match self {
            Self::Control(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is the given control word.
    #[must_use]
    pub fn is_control(&self, word: &str) -> bool {
        self.as_control() == Some(word)
    }

    /// Returns the compound elements, if this is a compound form.
    #[must_use]
    pub fn as_compound(&self) -> Option<&[Form]> {
        match self {
            Self::Compound(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the data this form denotes when quoted.
    ///
    /// Compounds become tuples; symbols and control words become text.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Compound(items) => Value::Tuple(items.iter().map(Self::to_value).collect()),
            Self::Symbol(s) | Self::Control(s) => Value::Str(s.clone()),
            Self::Literal(v) => v.clone(),
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<Value> for Form {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<i64> for Form {
    fn from(n: i64) -> Self {
        Self::Literal(Value::Int(n))
    }
}

impl From<i32> for Form {
    fn from(n: i32) -> Self {
        Self::Literal(Value::from(n))
    }
}

impl From<f64> for Form {
    fn from(x: f64) -> Self {
        Self::Literal(Value::Float(x))
    }
}

impl From<bool> for Form {
    fn from(b: bool) -> Self {
        Self::Literal(Value::Bool(b))
    }
}

impl From<Vec<Form>> for Form {
    fn from(items: Vec<Form>) -> Self {
        Self::Compound(items)
    }
}
