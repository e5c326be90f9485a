//! Core types for formcast: forms, values, and errors.
//!
//! This crate provides:
//! - [`Form`] - The symbolic input unit (compound, symbol, control word, literal)
//! - [`Value`] - Self-denoting data carried by literal forms
//! - [`repr()`] - Canonical host-language text for values
//! - [`Error`] - Rich error types with breadcrumb context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod form;
pub mod repr;
mod value;

pub use error::{Error, ErrorContext, ErrorKind, Frame, Result};
pub use form::{CONTROL_PREFIX, Form};
pub use repr::repr;
pub use value::{Complex, Construction, Dict, HostObject, List, Value};
