//! Integration tests for Layer 1: Language
//!
//! Tests for the compiler, literal encoding, macros, and the compile pipeline.

mod compiler;
mod literals;
mod macros;
mod pipeline;

use formcast_foundation::Form;

pub fn sym(s: &str) -> Form {
    Form::symbol(s)
}

pub fn ctl(s: &str) -> Form {
    Form::control(s)
}

pub fn compound<const N: usize>(items: [Form; N]) -> Form {
    Form::compound(items)
}
