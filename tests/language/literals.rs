//! Integration tests for literal encoding
//!
//! Tests that emitted literals read back as equal values, that values with
//! no literal form fall back to pickling, and that numbers stay grouped.

use formcast_foundation::{Form, HostObject, Value, repr};
use formcast_language::{Compiler, ObjectSerializer, Pickle, literal_eval};
use proptest::prelude::*;

const LOADER: &str = "__import__('pickle').loads(";

fn compile_literal(value: &Value) -> String {
    Compiler::default()
        .compile(&[Form::literal(value.clone())])
        .unwrap()
}

/// Reads back the value a pickle fallback expression would load.
fn load_fallback(text: &str) -> Value {
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "unexpected fallback layout: {text}");
    assert!(lines[0].starts_with(LOADER));
    assert_eq!(lines[2], ")");
    let Value::Bytes(data) = literal_eval(lines[1].trim()).unwrap() else {
        panic!("fallback payload is not bytes: {}", lines[1]);
    };
    Pickle.deserialize(&data).unwrap()
}

// =============================================================================
// Generators
// =============================================================================

fn float() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => any::<f64>(),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::None),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        float().prop_map(Value::Float),
        (-1e6f64..1e6, -1e6f64..1e6).prop_map(|(re, im)| Value::complex(re, im)),
        r#"[a-zA-Z0-9 '"\\\t\né中]{0,30}"#.prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..30).prop_map(Value::Bytes),
        (any::<i64>(), 1i64..100).prop_map(|(n, d)| {
            Value::object(HostObject::new("fractions", "Fraction", vec![n.into(), d.into()]))
        }),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Tuple),
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::list),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|entries| {
                Value::dict(entries.into_iter().map(|(k, v)| (Value::Str(k), v)).collect())
            }),
        ]
    })
}

/// How a generated value is wrapped before it is emitted.
#[derive(Clone, Copy, Debug)]
enum Sharing {
    /// The value itself.
    Plain,
    /// `(s, s)` where `s = [value]`.
    Shared,
    /// `s = [value]; s.append(s)`.
    Cyclic,
}

fn sharing() -> impl Strategy<Value = Sharing> {
    prop_oneof![
        4 => Just(Sharing::Plain),
        1 => Just(Sharing::Shared),
        1 => Just(Sharing::Cyclic),
    ]
}

fn wrap(value: Value, sharing: Sharing) -> Value {
    match sharing {
        Sharing::Plain => value,
        Sharing::Shared => {
            let inner = Value::list(vec![value]);
            Value::Tuple(vec![inner.clone(), inner])
        }
        Sharing::Cyclic => {
            let list = Value::list(vec![value]);
            if let Value::List(cell) = &list {
                cell.borrow_mut().push(list.clone());
            }
            list
        }
    }
}

/// Breaks the cycle a [`Sharing::Cyclic`] value carries.
fn unlink(value: &Value) {
    if let Value::List(cell) = value {
        cell.borrow_mut().truncate(1);
    }
}

// =============================================================================
// Round trips
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn emitted_literals_read_back_equal(v in value(), how in sharing()) {
        let v = wrap(v, how);
        let text = compile_literal(&v);
        if text.starts_with(LOADER) {
            let loaded = load_fallback(&text);
            prop_assert_eq!(repr(&loaded), repr(&v));
            match how {
                Sharing::Plain => {}
                Sharing::Shared => {
                    let Value::Tuple(items) = &loaded else {
                        panic!("expected a tuple: {loaded:?}");
                    };
                    prop_assert!(items[0].is_same(&items[1]));
                }
                Sharing::Cyclic => {
                    let Value::List(cell) = &loaded else {
                        panic!("expected a list: {loaded:?}");
                    };
                    let last = cell.borrow()[1].clone();
                    prop_assert!(last.is_same(&loaded));
                    unlink(&loaded);
                }
            }
        } else {
            prop_assert!(!matches!(how, Sharing::Cyclic), "cycle emitted as a literal: {}", text);
            prop_assert_eq!(literal_eval(&text).unwrap(), v.clone());
        }
        if matches!(how, Sharing::Cyclic) {
            unlink(&v);
        }
    }

    #[test]
    fn numbers_accept_member_access(n in any::<i64>(), x in any::<f64>()) {
        for value in [Value::Int(n), Value::Float(x), Value::complex(x, 1.0)] {
            let text = compile_literal(&value);
            if !text.starts_with(LOADER) {
                prop_assert!(text.starts_with('(') && text.ends_with(')'), "{}", text);
                prop_assert!(literal_eval(&text).is_ok());
            }
        }
    }
}

#[test]
fn numbers_are_grouped() {
    assert_eq!(compile_literal(&Value::Int(-1)), "(-1)");
    assert_eq!(compile_literal(&Value::Float(-4.2)), "(-4.2)");
    assert_eq!(compile_literal(&Value::complex(-0.0, -4.2)), "((-0-4.2j))");
}

#[test]
fn long_collections_are_pretty_printed() {
    let value = Value::list((0..30).map(|i| Value::str(format!("item{i}"))).collect());
    let text = compile_literal(&value);
    assert!(text.starts_with("['item0',\n 'item1',\n"));
    assert_eq!(literal_eval(&text).unwrap(), value);
}

// =============================================================================
// Fallback
// =============================================================================

#[test]
fn nan_falls_back_to_pickle() {
    let text = compile_literal(&Value::Float(f64::NAN));
    assert_eq!(text, "__import__('pickle').loads(  # nan\n    b'Fnan\\n.'\n)");
    let Value::Float(x) = load_fallback(&text) else {
        panic!("expected a float");
    };
    assert!(x.is_nan());
}

#[test]
fn infinity_falls_back_to_pickle() {
    let text = compile_literal(&Value::Float(f64::INFINITY));
    assert!(text.starts_with("__import__('pickle').loads(  # inf\n"));
    assert_eq!(load_fallback(&text), Value::Float(f64::INFINITY));
}

#[test]
fn self_referential_list_falls_back_to_pickle() {
    let spam = Value::list(vec![]);
    if let Value::List(cell) = &spam {
        cell.borrow_mut().push(spam.clone());
    }
    let text = compile_literal(&spam);
    assert_eq!(
        text,
        "__import__('pickle').loads(  # [[...]]\n    b'(lp0\\ng0\\na.'\n)"
    );

    let loaded = load_fallback(&text);
    let Value::List(cell) = &loaded else {
        panic!("expected a list");
    };
    assert!(cell.borrow()[0].is_same(&loaded));

    if let Value::List(cell) = &spam {
        cell.borrow_mut().clear();
    }
    if let Value::List(cell) = &loaded {
        cell.borrow_mut().clear();
    }
}

#[test]
fn host_objects_fall_back_to_pickle() {
    let fraction = Value::object(HostObject::new(
        "fractions",
        "Fraction",
        vec![Value::Int(1), Value::Int(3)],
    ));
    let text = compile_literal(&fraction);
    assert!(text.starts_with("__import__('pickle').loads(  # Fraction(1, 3)\n"));
    assert_eq!(load_fallback(&text), fraction);
}

#[test]
fn nested_nan_pickles_the_whole_value() {
    let value = Value::Tuple(vec![Value::Int(1), Value::Float(f64::NAN)]);
    let text = compile_literal(&value);
    assert!(text.starts_with("__import__('pickle').loads(  # (1, nan)\n"));

    let loaded = load_fallback(&text);
    assert_eq!(repr(&loaded), "(1, nan)");
    let Value::Tuple(items) = &loaded else {
        panic!("expected a tuple");
    };
    assert_eq!(items[0], Value::Int(1));
    assert!(matches!(items[1], Value::Float(x) if x.is_nan()));
}
