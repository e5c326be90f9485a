//! Configuration for the compiler.

use crate::pretty::DEFAULT_WIDTH;

/// Default limit on form nesting.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// What the pipeline does after the entry-point module fails at run time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbortPolicy {
    /// Print the output compiled so far to stderr and exit with status 1.
    #[default]
    Exit,
    /// Return [`CompileError::Aborted`](crate::CompileError::Aborted) with
    /// the output compiled so far.
    Return,
}

/// Configuration for a [`Compiler`](crate::Compiler).
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// Qualified name of the module being compiled. `None` uses the
    /// namespace's `__name__`.
    pub qualname: Option<String>,

    /// Behavior after an entry-point run-time failure.
    pub abort_policy: AbortPolicy,

    /// Line width for pretty-printed literals.
    pub width: usize,

    /// Maximum form nesting before compilation fails.
    pub max_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            qualname: None,
            abort_policy: AbortPolicy::Exit,
            width: DEFAULT_WIDTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CompilerConfig {
    /// Sets the qualified module name.
    #[must_use]
    pub fn with_qualname(mut self, qualname: impl Into<String>) -> Self {
        self.qualname = Some(qualname.into());
        self
    }

    /// Sets the abort policy.
    #[must_use]
    pub fn with_abort_policy(mut self, policy: AbortPolicy) -> Self {
        self.abort_policy = policy;
        self
    }

    /// Sets the pretty-printer width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
