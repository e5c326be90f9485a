//! Integration tests for Form
//!
//! Tests construction helpers, accessors, and quoting to data.

use formcast_foundation::{Form, Value};

#[test]
fn control_words_get_their_prefix() {
    assert_eq!(Form::control("**"), Form::Control(":**".to_string()));
    assert_eq!(Form::control(":?"), Form::Control(":?".to_string()));
    assert!(Form::control("").is_control(":"));
}

#[test]
fn accessors_distinguish_shapes() {
    let symbol = Form::symbol("print");
    assert_eq!(symbol.as_symbol(), Some("print"));
    assert_eq!(symbol.as_control(), None);

    let text = Form::string("print");
    assert_eq!(text.as_symbol(), None);

    let compound = Form::compound([symbol.clone(), Form::from(1)]);
    assert_eq!(compound.as_compound().map(<[Form]>::len), Some(2));
}

#[test]
fn quoting_converts_to_data() {
    let form = Form::compound([
        Form::symbol("f"),
        Form::control(":"),
        Form::symbol("x"),
        Form::compound([]),
        Form::from(1.5),
    ]);
    assert_eq!(
        form.to_value(),
        Value::Tuple(vec![
            Value::str("f"),
            Value::str(":"),
            Value::str("x"),
            Value::Tuple(vec![]),
            Value::Float(1.5),
        ])
    );
    assert_eq!(form.to_string(), "('f', ':', 'x', (), 1.5)");
}
