//! Integration tests for Value types
//!
//! Tests equality under the host's numeric tower, repr, and shared cells.

use formcast_foundation::repr::{bytes_repr, complex_repr, float_repr, str_repr};
use formcast_foundation::{Complex, HostObject, Value, repr};
use proptest::prelude::*;

// =============================================================================
// Equality
// =============================================================================

#[test]
fn numeric_tower() {
    assert_eq!(Value::Bool(true), Value::Int(1));
    assert_eq!(Value::Int(1), Value::Float(1.0));
    assert_eq!(Value::Float(1.0), Value::complex(1.0, 0.0));
    assert_ne!(Value::Int(1), Value::complex(1.0, 1.0));
    assert_ne!(Value::Str("1".to_string()), Value::Int(1));
}

#[test]
fn nan_is_unequal_to_itself() {
    let nan = Value::Float(f64::NAN);
    assert_ne!(nan, nan.clone());
}

#[test]
fn shared_list_is_equal_to_itself_even_with_nan() {
    let list = Value::list(vec![Value::Float(f64::NAN)]);
    assert_eq!(list, list.clone());
    assert!(list.is_same(&list.clone()));
    assert_ne!(list, Value::list(vec![Value::Float(f64::NAN)]));
}

#[test]
fn sets_and_dicts_ignore_order() {
    assert_eq!(
        Value::set([1.into(), 2.into()]),
        Value::set([2.into(), 1.into()])
    );
    assert_eq!(
        Value::dict(vec![("a".into(), 1.into()), ("b".into(), 2.into())]),
        Value::dict(vec![("b".into(), 2.into()), ("a".into(), 1.into())])
    );
}

// =============================================================================
// Repr
// =============================================================================

#[test]
fn float_reprs() {
    assert_eq!(float_repr(1.0), "1.0");
    assert_eq!(float_repr(-4.2), "-4.2");
    assert_eq!(float_repr(1e16), "1e+16");
    assert_eq!(float_repr(1.5e-7), "1.5e-07");
    assert_eq!(float_repr(f64::INFINITY), "inf");
    assert_eq!(float_repr(f64::NAN), "nan");
}

#[test]
fn complex_reprs() {
    assert_eq!(complex_repr(Complex::new(0.0, 1.0)), "1j");
    assert_eq!(complex_repr(Complex::new(-0.0, -4.2)), "(-0-4.2j)");
    assert_eq!(complex_repr(Complex::new(1.0, 2.0)), "(1+2j)");
}

#[test]
fn text_reprs() {
    assert_eq!(str_repr("it's"), "\"it's\"");
    assert_eq!(str_repr("both ' and \""), "'both \\' and \"'");
    assert_eq!(str_repr("tab\tnew\n"), "'tab\\tnew\\n'");
    assert_eq!(bytes_repr(b"\x00a"), "b'\\x00a'");
}

#[test]
fn host_object_repr_and_type() {
    let object = HostObject::new("fractions", "Fraction", vec![1.into(), 3.into()]);
    let value = Value::object(object);
    assert_eq!(repr(&value), "Fraction(1, 3)");
    assert_eq!(value.type_name(), "object");
}

#[test]
fn ellipsis_and_none() {
    assert_eq!(repr(&Value::Ellipsis), "Ellipsis");
    assert_eq!(repr(&Value::None), "None");
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn int_repr_is_decimal(n in any::<i64>()) {
        prop_assert_eq!(repr(&Value::Int(n)), n.to_string());
    }

    #[test]
    fn equality_is_reflexive_without_nan(n in any::<i64>(), s in "[a-z]{0,8}") {
        let value = Value::Tuple(vec![Value::Int(n), Value::str(s), Value::list(vec![])]);
        prop_assert_eq!(value.clone(), value);
    }
}
