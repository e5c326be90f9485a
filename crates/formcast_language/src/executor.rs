//! The seam between the compiler and a host runtime.
//!
//! When a [`Compiler`](crate::Compiler) has an executor, every compiled form
//! is run in the target namespace right after it is compiled, so later forms
//! can use macros the earlier ones defined.

use thiserror::Error;

use crate::module_registry::SharedNamespace;

/// A run-time failure reported by the host.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ExecError {
    /// One-line description of the failure.
    pub message: String,
    /// The host's formatted traceback.
    pub traceback: String,
}

impl ExecError {
    /// Creates a new execution error.
    #[must_use]
    pub fn new(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: traceback.into(),
        }
    }
}

/// Runs compiled host source in a namespace.
pub trait Executor {
    /// Executes `code` in `namespace`.
    ///
    /// # Errors
    /// Returns the host's failure, with its traceback.
    fn execute(&mut self, code: &str, namespace: &SharedNamespace) -> Result<(), ExecError>;
}

impl<F> Executor for F
where
    F: FnMut(&str, &SharedNamespace) -> Result<(), ExecError>,
{
    fn execute(&mut self, code: &str, namespace: &SharedNamespace) -> Result<(), ExecError> {
        self(code, namespace)
    }
}
