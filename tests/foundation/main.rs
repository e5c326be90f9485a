//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Form, Value, repr, and Error.

mod errors;
mod forms;
mod values;
