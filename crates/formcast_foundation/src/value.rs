//! Core value type for literal data carried by forms.
//!
//! [`Value`] models the subset of host-language data that a form can denote
//! by itself: numbers, text, bytes, the null value, the ellipsis sentinel,
//! ordered and unordered collections, mappings, and opaque host objects.
//!
//! Lists and dicts are shared mutable cells, so a container may hold itself.
//! Equality follows the host language's rules (numeric tower, unordered sets,
//! NaN never equal to itself) and short-circuits on container identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::repr::repr;

/// Shared, mutable list cell.
pub type List = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered mapping cell.
pub type Dict = Rc<RefCell<Vec<(Value, Value)>>>;

/// A self-denoting data value.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// The null value (`None`).
    None,
    /// The ellipsis sentinel (`...`).
    Ellipsis,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Complex number.
    Complex(Complex),
    /// Text.
    Str(String),
    /// Byte sequence.
    Bytes(Vec<u8>),
    /// Immutable ordered sequence.
    Tuple(Vec<Value>),
    /// Mutable ordered sequence.
    List(List),
    /// Unordered collection of distinct elements.
    Set(Vec<Value>),
    /// Insertion-ordered mapping.
    Dict(Dict),
    /// Opaque host object with no literal syntax.
    Object(Rc<HostObject>),
}

/// A complex number with `f64` components.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Complex {
    /// Real part.
    pub re: f64,
    /// Imaginary part.
    pub im: f64,
}

impl Complex {
    /// Creates a complex number.
    #[must_use]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// How a host object is rebuilt from its constructor and arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Construction {
    /// Call the constructor with the arguments (`REDUCE`).
    Call,
    /// Allocate through `cls.__new__(cls, *args)` (`NEWOBJ`, binary protocols only).
    New,
}

/// An opaque host object.
///
/// The object is identified by a module-level constructor and the arguments
/// that rebuild it. It has a textual representation but no literal form.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostObject {
    /// Module that defines the constructor.
    pub module: String,
    /// Qualified name of the constructor inside the module.
    pub name: String,
    /// Constructor arguments.
    pub args: Vec<Value>,
    /// Reconstruction strategy.
    pub construction: Construction,
    /// Textual representation.
    pub repr: String,
}

impl HostObject {
    /// Creates a host object rebuilt by calling `module.name(*args)`.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>, args: Vec<Value>) -> Self {
        let name = name.into();
        let rendered: Vec<String> = args.iter().map(repr).collect();
        let repr = format!("{name}({})", rendered.join(", "));
        Self {
            module: module.into(),
            name,
            args,
            construction: Construction::Call,
            repr,
        }
    }

    /// Overrides the textual representation.
    #[must_use]
    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = repr.into();
        self
    }

    /// Sets the reconstruction strategy.
    #[must_use]
    pub fn with_construction(mut self, construction: Construction) -> Self {
        self.construction = construction;
        self
    }
}

impl Value {
    /// Creates a text value.
    #[must_use]
    pub fn str(text: impl Into<String>) -> Self {
        Self::Str(text.into())
    }

    /// Creates a bytes value.
    #[must_use]
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(data.into())
    }

    /// Creates a complex value.
    #[must_use]
    pub const fn complex(re: f64, im: f64) -> Self {
        Self::Complex(Complex::new(re, im))
    }

    /// Creates a new list cell.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Creates a new dict cell, keeping the last value for repeated keys.
    #[must_use]
    pub fn dict(entries: Vec<(Value, Value)>) -> Self {
        let mut unique: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if let Some(slot) = unique.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                unique.push((key, value));
            }
        }
        Self::Dict(Rc::new(RefCell::new(unique)))
    }

    /// Creates a set, dropping duplicate elements.
    #[must_use]
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Self::Set(unique)
    }

    /// Creates a host object value.
    #[must_use]
    pub fn object(object: HostObject) -> Self {
        Self::Object(Rc::new(object))
    }

    /// Returns the host-language type name of this value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Ellipsis => "ellipsis",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Complex(_) => "complex",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Dict(_) => "dict",
            Self::Object(_) => "object",
        }
    }

    /// Returns true for `int`, `float` and `complex` (but not `bool`).
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Complex(_))
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if `self` and `other` are the same shared container.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Self::Bool(b) => Some(Numeric::Int(i64::from(*b))),
            Self::Int(n) => Some(Numeric::Int(*n)),
            Self::Float(x) => Some(Numeric::Float(*x)),
            Self::Complex(c) => Some(Numeric::Complex(*c)),
            _ => None,
        }
    }
}

// =============================================================================
// Equality
// =============================================================================

#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
    Complex(Complex),
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn int_eq_float(n: i64, x: f64) -> bool {
    // 2^63 is exactly representable; anything outside the range cannot match.
    if !x.is_finite() || x.fract() != 0.0 || x < -9.223_372_036_854_775_808e18 || x >= 9.223_372_036_854_775_808e18 {
        return false;
    }
    x as i64 == n
}

fn real_eq(a: Numeric, b: Numeric) -> bool {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => x == y,
        (Numeric::Int(n), Numeric::Float(x)) | (Numeric::Float(x), Numeric::Int(n)) => {
            int_eq_float(n, x)
        }
        (Numeric::Float(x), Numeric::Float(y)) => x == y,
        (Numeric::Complex(c), other) | (other, Numeric::Complex(c)) => {
            if let Numeric::Complex(d) = other {
                return c.re == d.re && c.im == d.im;
            }
            c.im == 0.0 && real_eq(Numeric::Float(c.re), other)
        }
    }
}

/// Pairs of containers whose comparison is in progress.
///
/// Meeting a pair again means the comparison went around a cycle; the pair
/// is assumed equal and the rest of the walk decides.
type Visiting = Vec<(*const (), *const ())>;

fn eq_in(a: &Value, b: &Value, visiting: &mut Visiting) -> bool {
    if let (Some(x), Some(y)) = (a.numeric(), b.numeric()) {
        return real_eq(x, y);
    }
    match (a, b) {
        (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Tuple(x), Value::Tuple(y)) => seq_eq(x, y, visiting),
        (Value::List(x), Value::List(y)) => {
            Rc::ptr_eq(x, y)
                || entering(visiting, Rc::as_ptr(x).cast(), Rc::as_ptr(y).cast(), |visiting| {
                    seq_eq(&x.borrow(), &y.borrow(), visiting)
                })
        }
        (Value::Set(x), Value::Set(y)) => {
            x.len() == y.len() && x.iter().all(|e| y.iter().any(|f| eq_in(e, f, visiting)))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            Rc::ptr_eq(x, y)
                || entering(visiting, Rc::as_ptr(x).cast(), Rc::as_ptr(y).cast(), |visiting| {
                    let (x, y) = (x.borrow(), y.borrow());
                    x.len() == y.len()
                        && x.iter().all(|(k, v)| {
                            y.iter().any(|(k2, v2)| {
                                eq_in(k, k2, visiting) && eq_in(v, v2, visiting)
                            })
                        })
                })
        }
        (Value::Object(x), Value::Object(y)) => {
            Rc::ptr_eq(x, y)
                || (x.module == y.module
                    && x.name == y.name
                    && seq_eq(&x.args, &y.args, visiting))
        }
        _ => false,
    }
}

fn entering(
    visiting: &mut Visiting,
    a: *const (),
    b: *const (),
    compare: impl FnOnce(&mut Visiting) -> bool,
) -> bool {
    if visiting.contains(&(a, b)) {
        return true;
    }
    visiting.push((a, b));
    let equal = compare(visiting);
    visiting.pop();
    equal
}

fn seq_eq(a: &[Value], b: &[Value], visiting: &mut Visiting) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.is_same(y) || eq_in(x, y, visiting))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        eq_in(self, other, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&repr(self))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&repr(self))
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Self::Complex(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_tower_equality() {
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(Value::Float(2.0), Value::complex(2.0, 0.0));
        assert_ne!(Value::Int(2), Value::Float(2.5));
        assert_ne!(Value::Int(2), Value::complex(2.0, 1.0));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::Float(f64::NAN);
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn sets_compare_unordered() {
        let a = Value::set([Value::Int(1), Value::Int(2)]);
        let b = Value::set([Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn dicts_compare_by_content() {
        let a = Value::dict(vec![(Value::str("a"), 1.into()), (Value::str("b"), 2.into())]);
        let b = Value::dict(vec![(Value::str("b"), 2.into()), (Value::str("a"), 1.into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn dict_keeps_last_duplicate() {
        let d = Value::dict(vec![(1.into(), 1.into()), (1.into(), 2.into())]);
        let Value::Dict(cell) = &d else {
            panic!("expected dict");
        };
        assert_eq!(cell.borrow().len(), 1);
        assert_eq!(cell.borrow()[0].1, Value::Int(2));
    }

    #[test]
    fn tuple_and_list_differ() {
        assert_ne!(Value::Tuple(vec![]), Value::list(vec![]));
    }

    #[test]
    fn self_referential_list_equals_itself() {
        let spam = Value::list(vec![]);
        if let Value::List(cell) = &spam {
            cell.borrow_mut().push(spam.clone());
        }
        assert_eq!(spam, spam.clone());
        assert_ne!(spam, Value::list(vec![Value::list(vec![Value::Ellipsis])]));
    }

    #[test]
    fn distinct_cycles_of_the_same_shape_are_equal() {
        let cycle = || {
            let list = Value::list(vec![Value::Int(1)]);
            if let Value::List(cell) = &list {
                cell.borrow_mut().push(list.clone());
            }
            list
        };
        let (a, b) = (cycle(), cycle());
        assert_eq!(a, b);
        for v in [a, b] {
            if let Value::List(cell) = &v {
                cell.borrow_mut().clear();
            }
        }
    }

    #[test]
    fn deeply_nested_values_equal_themselves() {
        let nest = || {
            (0..300).fold(Value::Int(0), |inner, _| {
                Value::Tuple(vec![Value::list(vec![inner])])
            })
        };
        assert_eq!(nest(), nest());
    }

    #[test]
    fn host_objects_compare_by_constructor() {
        let a = Value::object(HostObject::new("fractions", "Fraction", vec![1.into(), 3.into()]));
        let b = Value::object(HostObject::new("fractions", "Fraction", vec![1.into(), 3.into()]));
        assert_eq!(a, b);
    }
}
