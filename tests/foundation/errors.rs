//! Integration tests for Error types
//!
//! Tests error construction, display, breadcrumbs, and error kinds.

use formcast_foundation::{Error, ErrorKind, Form};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_arity() {
    let err = Error::arity("quote", "exactly 1", 2);
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { actual: 2, .. }));
    assert_eq!(err.to_string(), "quote expects exactly 1 operand(s), got 2");
}

#[test]
fn error_incomplete_pair() {
    let err = Error::incomplete_pair("'b'");
    assert!(matches!(err.kind, ErrorKind::IncompletePair(_)));
    assert!(err.to_string().contains("'b'"));
}

#[test]
fn error_module_not_found_is_not_attribute_error() {
    let err = Error::module_not_found("pkg.missing");
    assert!(!err.is_attribute_error());
    assert!(err.to_string().contains("pkg.missing"));
}

#[test]
fn error_attribute_not_found() {
    let err = Error::attribute_not_found("lib._macro_", "when");
    assert!(err.is_attribute_error());
    assert_eq!(err.to_string(), "lib._macro_ has no attribute when");
}

#[test]
fn error_macro_failed_keeps_source() {
    let inner = Error::new(ErrorKind::Macro("bad input".to_string()));
    let err = Error::new(ErrorKind::MacroFailed {
        name: "when".to_string(),
        source: Box::new(inner),
    });
    assert_eq!(err.to_string(), "macro when failed: bad input");
}

#[test]
fn error_depth_exceeded() {
    let err = Error::new(ErrorKind::DepthExceeded { limit: 8 });
    assert!(err.to_string().contains('8'));
}

// =============================================================================
// Breadcrumbs
// =============================================================================

#[test]
fn breadcrumbs_read_innermost_first() {
    let call = Form::compound([Form::symbol(".upper")]);
    let outer = Form::compound([Form::symbol("print"), call.clone()]);
    let err = Error::new(ErrorKind::MissingReceiver("upper".to_string()))
        .within("call", &call)
        .within("form", &call)
        .within("call", &outer);

    assert_eq!(err.context.stack.len(), 3);
    assert_eq!(err.context.innermost().unwrap().step, "call");
    assert_eq!(err.context.innermost().unwrap().form, "('.upper',)");
    assert_eq!(
        err.to_string(),
        "method call upper has no receiver\n  in call: ('.upper',)\n  in form: ('.upper',)\n  in call: ('print', ('.upper',))"
    );
}
