//! Error types for the formcast system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every compiling step that fails adds a frame to [`ErrorContext`], so the
//! surfaced error reads from the innermost failure out to the top-level form.

use std::fmt;

use thiserror::Error;

/// The main error type for formcast operations.
#[derive(Debug, Error)]
#[error("{kind}{context}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Breadcrumbs from the failing step outwards.
    pub context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: ErrorContext::new(),
        }
    }

    /// Records that this error passed through `step` while it handled `form`.
    #[must_use]
    pub fn within(mut self, step: &str, form: impl fmt::Display) -> Self {
        self.context.stack.push(Frame {
            step: step.to_string(),
            form: form.to_string(),
        });
        self
    }

    /// Creates a wrong-arity error for a special form.
    #[must_use]
    pub fn arity(name: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            name: name.into(),
            expected: expected.into(),
            actual,
        })
    }

    /// Creates an odd-length pair sequence error.
    #[must_use]
    pub fn incomplete_pair(dangling: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompletePair(dangling.into()))
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(found: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter {
            found: found.into(),
            reason: reason.into(),
        })
    }

    /// Creates a missing module error.
    #[must_use]
    pub fn module_not_found(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModuleNotFound(name.into()))
    }

    /// Creates a missing attribute error.
    #[must_use]
    pub fn attribute_not_found(owner: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttributeNotFound {
            owner: owner.into(),
            attribute: attribute.into(),
        })
    }

    /// Creates a literal syntax error at a byte offset.
    #[must_use]
    pub fn literal_syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::new(ErrorKind::LiteralSyntax {
            message: message.into(),
            offset,
        })
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization(message.into()))
    }

    /// Returns true if the failure is a missing attribute (as opposed to a
    /// missing module or any other failure).
    #[must_use]
    pub const fn is_attribute_error(&self) -> bool {
        matches!(self.kind, ErrorKind::AttributeNotFound { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A special form received the wrong number of operands.
    #[error("{name} expects {expected} operand(s), got {actual}")]
    ArityMismatch {
        /// The special form.
        name: String,
        /// Description of the expected arity.
        expected: String,
        /// Actual operand count.
        actual: usize,
    },

    /// A pair sequence had an odd number of elements.
    #[error("incomplete pair: {0} has no partner")]
    IncompletePair(String),

    /// Iterable unpacking followed mapping unpacking in a call.
    #[error("iterable unpacking cannot follow mapping unpacking")]
    UnpackOrder,

    /// A parameter or keyword specification was not usable.
    #[error("invalid parameter {found}: {reason}")]
    InvalidParameter {
        /// The offending element.
        found: String,
        /// What was expected instead.
        reason: String,
    },

    /// A method call had no receiver.
    #[error("method call {0} has no receiver")]
    MissingReceiver(String),

    /// A qualified reference named a module that is not loaded.
    #[error("no module named {0}")]
    ModuleNotFound(String),

    /// A qualified reference named a missing attribute.
    #[error("{owner} has no attribute {attribute}")]
    AttributeNotFound {
        /// Where the lookup happened.
        owner: String,
        /// The missing name.
        attribute: String,
    },

    /// A macro callable reported a failure.
    #[error("macro {name} failed: {source}")]
    MacroFailed {
        /// The macro that failed.
        name: String,
        /// The macro's own error.
        source: Box<Error>,
    },

    /// A macro callable's own failure, raised from inside its body.
    #[error("{0}")]
    Macro(String),

    /// Text was not a valid literal.
    #[error("literal syntax error at offset {offset}: {message}")]
    LiteralSyntax {
        /// Description of the problem.
        message: String,
        /// Byte offset into the text.
        offset: usize,
    },

    /// Object serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Forms nested deeper than the compiler allows.
    #[error("form nesting exceeds maximum depth of {limit}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// One breadcrumb: a compiling step and the form it was handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Name of the compiling step.
    pub step: String,
    /// Text representation of the form.
    pub form: String,
}

/// Context about where an error occurred.
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    /// Breadcrumbs, innermost first.
    pub stack: Vec<Frame>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Adds a frame.
    #[must_use]
    pub fn with_frame(mut self, step: impl Into<String>, form: impl Into<String>) -> Self {
        self.stack.push(Frame {
            step: step.into(),
            form: form.into(),
        });
        self
    }

    /// Returns the innermost frame, if any.
    #[must_use]
    pub fn innermost(&self) -> Option<&Frame> {
        self.stack.first()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.stack {
            write!(f, "\n  in {}: {}", frame.step, frame.form)?;
        }
        Ok(())
    }
}

/// Result type alias using formcast's Error.
pub type Result<T> = std::result::Result<T, Error>;
