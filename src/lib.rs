//! formcast - Compiler from symbolic forms to Python source text
//!
//! This crate re-exports all layers of formcast for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: formcast_language   - Compiler, macros, literal codec, pickling
//! Layer 0: formcast_foundation - Core types (Form, Value, Error, repr)
//! ```

pub use formcast_foundation as foundation;
pub use formcast_language as language;

pub use formcast_foundation::{Error, ErrorKind, Form, Result, Value};
pub use formcast_language::{
    AbortPolicy, CompileError, Compiler, CompilerConfig, ModuleRegistry, Namespace, readerless,
};
