//! Compiler from symbolic forms to Python source text.
//!
//! This crate provides:
//! - [`Compiler`] - Translates forms to host source, expanding macros and
//!   optionally running each form as it goes
//! - [`literal_eval`] - Side-effect-free reader for host literal text
//! - [`PrettyPrinter`] - Width-aware literal formatting
//! - [`Pickle`] - Object serialization for values with no literal form
//! - [`Namespace`], [`ModuleRegistry`] and [`context`] - The environment
//!   macros are resolved in
//!
//! # Example
//!
//! ```
//! use formcast_foundation::Form;
//! use formcast_language::Compiler;
//!
//! let form = Form::compound([Form::symbol("print"), Form::from(1), Form::from(2)]);
//! let python = Compiler::default().compile(&[form]).unwrap();
//! assert_eq!(python, "print(\n  (1),\n  (2))");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod call;
pub mod compiler;
pub mod config;
pub mod context;
pub mod executor;
pub mod function;
pub mod lexer;
pub mod literal;
pub mod macro_engine;
pub mod module_registry;
pub mod namespace;
pub mod parser;
pub mod pretty;
pub mod serialize;
pub mod symbol;
pub mod token;

pub use compiler::{CompileError, Compiler, PostCompileWarning, readerless};
pub use config::{AbortPolicy, CompilerConfig, DEFAULT_MAX_DEPTH};
pub use executor::{ExecError, Executor};
pub use lexer::Lexer;
pub use macro_engine::{AUTO_MARKER, MACRO_MARKER, MacroPath};
pub use module_registry::{ModuleRegistry, SharedNamespace};
pub use namespace::{ENTRY_POINT, MACROS, Macro, MacroTable, Namespace};
pub use parser::{Parser, literal_eval};
pub use pretty::{DEFAULT_WIDTH, PrettyPrinter, pformat};
pub use serialize::{ObjectSerializer, Pickle, PicklingError, Serialized, Unpickler, dumps};
pub use token::{Token, TokenKind};
