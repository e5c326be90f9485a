//! Compiler from forms to host source text.
//!
//! The compiler walks each top-level form, dispatching on its shape:
//!
//! - non-empty compounds are special forms (`quote`, `lambda`), macro
//!   invocations, or calls
//! - symbols are identifiers, qualified references, or raw text
//! - everything else is a literal
//!
//! When an [`Executor`] is attached, each compiled form is run in the target
//! namespace before the next one is compiled.

#![allow(clippy::module_name_repetitions)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use formcast_foundation::{Error, ErrorKind, Form, Result};
use thiserror::Error;

use crate::config::{AbortPolicy, CompilerConfig};
use crate::context;
use crate::executor::Executor;
use crate::module_registry::{ModuleRegistry, SharedNamespace};
use crate::namespace::{ENTRY_POINT, Namespace};
use crate::pretty::PrettyPrinter;
use crate::serialize::{ObjectSerializer, Pickle};

// =============================================================================
// Errors and warnings
// =============================================================================

/// Failure of the compile pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A form could not be compiled.
    #[error("cannot compile {form}: {source}")]
    Form {
        /// Text of the top-level form that failed.
        form: String,
        /// Output compiled before the failing form.
        output: String,
        /// The underlying error, with breadcrumbs.
        source: Error,
    },
    /// The entry-point module failed at run time.
    #[error("aborted: {message}")]
    Aborted {
        /// Output compiled up to and including the failing form.
        output: String,
        /// The host's failure message.
        message: String,
    },
}

/// A run-time failure in a library module, reported instead of aborting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostCompileWarning {
    /// Module whose form failed.
    pub module: String,
    /// The compiled form that failed.
    pub code: String,
    /// The host's failure message.
    pub message: String,
    /// The host's formatted traceback.
    pub traceback: String,
}

impl std::fmt::Display for PostCompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "post-compile failure in {}: {}", self.module, self.message)
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles forms for one module.
pub struct Compiler {
    /// Qualified name of the module being compiled.
    pub(crate) qualname: String,
    /// Namespace forms are compiled (and run) in.
    pub(crate) ns: SharedNamespace,
    /// Modules qualified macro references resolve through.
    pub(crate) modules: Rc<ModuleRegistry>,
    /// Writes values that have no literal form.
    pub(crate) serializer: Box<dyn ObjectSerializer>,
    /// Formats literal text.
    pub(crate) printer: PrettyPrinter,
    /// Runs compiled forms, when present.
    executor: Option<Box<dyn Executor>>,
    abort_policy: AbortPolicy,
    max_depth: usize,
    /// Current form nesting.
    depth: Cell<usize>,
    /// Set when the entry-point module fails at run time.
    abort: Option<String>,
    warnings: Vec<PostCompileWarning>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Namespace::new(ENTRY_POINT))
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("qualname", &self.qualname)
            .field("evaluate", &self.executor.is_some())
            .field("abort_policy", &self.abort_policy)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl Compiler {
    /// Creates a compiler for `namespace` with the default configuration.
    ///
    /// The qualified name is the namespace's `__name__`. No executor is
    /// attached, so forms are compiled but not run.
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self::with_shared(Rc::new(RefCell::new(namespace)))
    }

    /// Creates a compiler for an already shared namespace.
    #[must_use]
    pub fn with_shared(ns: SharedNamespace) -> Self {
        let qualname = ns.borrow().name().to_string();
        let config = CompilerConfig::default();
        Self {
            qualname,
            ns,
            modules: Rc::new(ModuleRegistry::new()),
            serializer: Box::new(Pickle),
            printer: PrettyPrinter::new(config.width),
            executor: None,
            abort_policy: config.abort_policy,
            max_depth: config.max_depth,
            depth: Cell::new(0),
            abort: None,
            warnings: Vec::new(),
        }
    }

    /// Applies a configuration.
    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        if let Some(qualname) = config.qualname {
            self.qualname = qualname;
        }
        self.printer = PrettyPrinter::new(config.width);
        self.abort_policy = config.abort_policy;
        self.max_depth = config.max_depth;
        self
    }

    /// Attaches an executor, so each compiled form is run after compiling.
    #[must_use]
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Uses a shared module registry for qualified macro references.
    #[must_use]
    pub fn with_modules(mut self, modules: Rc<ModuleRegistry>) -> Self {
        self.modules = modules;
        self
    }

    /// Replaces the object serializer used for non-literal values.
    #[must_use]
    pub fn with_serializer(mut self, serializer: impl ObjectSerializer + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    /// Returns the qualified module name.
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Returns the target namespace.
    #[must_use]
    pub fn namespace(&self) -> &SharedNamespace {
        &self.ns
    }

    /// Returns the module registry.
    #[must_use]
    pub fn modules(&self) -> &Rc<ModuleRegistry> {
        &self.modules
    }

    /// Returns true if compiled forms are run.
    #[must_use]
    pub fn evaluates(&self) -> bool {
        self.executor.is_some()
    }

    /// Returns the warnings recorded for library-module failures.
    #[must_use]
    pub fn warnings(&self) -> &[PostCompileWarning] {
        &self.warnings
    }

    /// Returns true if the entry-point module failed during the last
    /// [`compile`](Self::compile).
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.abort.is_some()
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Compiles a sequence of top-level forms into host source text.
    ///
    /// Each form is compiled and, with an executor attached, run before the
    /// next is compiled. Compiled forms are joined by a blank line.
    ///
    /// # Errors
    /// Returns [`CompileError::Form`] if a form cannot be compiled, and
    /// [`CompileError::Aborted`] if the entry-point module fails at run time
    /// under [`AbortPolicy::Return`]. Under [`AbortPolicy::Exit`] that
    /// failure prints the output so far to stderr and exits the process.
    pub fn compile(&mut self, forms: &[Form]) -> std::result::Result<String, CompileError> {
        self.abort = None;
        let _guard = context::enter(Rc::clone(&self.ns), Rc::clone(&self.modules));
        let mut result: Vec<String> = Vec::new();
        for form in forms {
            tracing::trace!(module = %self.qualname, %form, "compiling form");
            let compiled = match self.form(form) {
                Ok(compiled) => compiled,
                Err(source) => {
                    tracing::debug!(module = %self.qualname, error = %source, "form failed to compile");
                    return Err(CompileError::Form {
                        form: form.to_string(),
                        output: result.join("\n\n"),
                        source,
                    });
                }
            };
            result.extend(self.eval(compiled));
            if let Some(message) = self.abort.clone() {
                let output = result.join("\n\n");
                tracing::error!(module = %self.qualname, %message, "entry point failed; aborting");
                return match self.abort_policy {
                    AbortPolicy::Exit => {
                        eprintln!("{output}");
                        std::process::exit(1)
                    }
                    AbortPolicy::Return => Err(CompileError::Aborted { output, message }),
                };
            }
        }
        Ok(result.join("\n\n"))
    }

    /// Runs one compiled form, returning the text to emit for it.
    ///
    /// Without an executor the form is returned as is. A run-time failure
    /// appends the host's traceback as comment lines. In the entry-point
    /// module it also marks the compiler as aborted; in any other module it
    /// is recorded as a [`PostCompileWarning`].
    pub fn eval(&mut self, form: String) -> Vec<String> {
        let Some(executor) = self.executor.as_mut() else {
            return vec![form];
        };
        match executor.execute(&form, &self.ns) {
            Ok(()) => vec![form],
            Err(e) => {
                let module = self.ns.borrow().name().to_string();
                if module == ENTRY_POINT {
                    self.abort = Some(e.message.clone());
                } else {
                    tracing::warn!(%module, message = %e.message, "post-compile failure");
                    self.warnings.push(PostCompileWarning {
                        module,
                        code: form.clone(),
                        message: e.message.clone(),
                        traceback: e.traceback.clone(),
                    });
                }
                let trace = format!("# {}", e.traceback.replace('\n', "\n# "));
                vec![form, trace]
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Compiles any form.
    pub(crate) fn form(&self, form: &Form) -> Result<String> {
        let _depth = self.descend()?;
        let compiled = match form {
            Form::Compound(items) if !items.is_empty() => self.compound(items),
            Form::Symbol(symbol) => self.symbol(symbol),
            _ => self.quoted(form),
        };
        compiled.map_err(|e| e.within("form", form))
    }

    fn descend(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(Error::new(ErrorKind::DepthExceeded {
                limit: self.max_depth,
            }));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard(&self.depth))
    }

    fn compound(&self, items: &[Form]) -> Result<String> {
        match &items[0] {
            Form::Symbol(head) => self.special(head, items),
            _ => self.call(items),
        }
    }

    fn special(&self, head: &str, items: &[Form]) -> Result<String> {
        match head {
            "quote" => match items {
                [_, operand] => self.quoted(operand),
                _ => Err(Error::arity("quote", "exactly 1", items.len() - 1)),
            },
            "lambda" => self.function(items),
            _ => self.invocation(head, items),
        }
    }

    fn invocation(&self, head: &str, items: &[Form]) -> Result<String> {
        if let Some(expansion) = self.expand_macro(head, &items[1..])? {
            return Ok(format!("# {head}\n{expansion}"));
        }
        if head.contains(crate::macro_engine::AUTO_MARKER) {
            let mut items = items.to_vec();
            items[0] = Form::Symbol(head.replacen(crate::macro_engine::AUTO_MARKER, "..", 1));
            return self.call(&items);
        }
        self.call(items)
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

// =============================================================================
// Convenience
// =============================================================================

/// Compiles one form without running it.
///
/// Uses `ns` if given, otherwise the namespace currently being compiled,
/// otherwise a fresh entry-point namespace. Inside a macro this compiles in
/// the caller's module, with the caller's module registry.
///
/// The compiler's qualified name is the namespace's `__name__`, not always
/// `__main__`, so a fragment compiled for a library module resolves that
/// module's own qualified symbols and macros locally.
///
/// # Errors
/// Returns [`CompileError::Form`] if the form cannot be compiled.
pub fn readerless(
    form: &Form,
    ns: Option<SharedNamespace>,
) -> std::result::Result<String, CompileError> {
    let ns = ns
        .or_else(context::current)
        .unwrap_or_else(|| Rc::new(RefCell::new(Namespace::bare(ENTRY_POINT))));
    let mut compiler = Compiler::with_shared(ns);
    if let Some(modules) = context::current_modules() {
        compiler = compiler.with_modules(modules);
    }
    compiler.compile(std::slice::from_ref(form))
}
