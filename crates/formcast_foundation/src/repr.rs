//! Host-language `repr` of values.
//!
//! Produces the canonical one-line text the host runtime would print for a
//! value. Self-referential containers print a recursion marker (`[...]`,
//! `{...}`) instead of recursing.

use std::fmt::Write;
use std::rc::Rc;

use crate::value::{Complex, Value};

/// Returns the canonical textual representation of a value.
#[must_use]
pub fn repr(value: &Value) -> String {
    let mut out = String::new();
    let mut active = Vec::new();
    write_repr(value, &mut out, &mut active);
    out
}

fn write_repr(value: &Value, out: &mut String, active: &mut Vec<usize>) {
    match value {
        Value::None => out.push_str("None"),
        Value::Ellipsis => out.push_str("Ellipsis"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(x) => out.push_str(&float_repr(*x)),
        Value::Complex(c) => out.push_str(&complex_repr(*c)),
        Value::Str(s) => out.push_str(&str_repr(s)),
        Value::Bytes(b) => out.push_str(&bytes_repr(b)),
        Value::Tuple(items) => {
            out.push('(');
            write_items(items, out, active);
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Value::List(cell) => {
            let id = Rc::as_ptr(cell) as usize;
            if active.contains(&id) {
                out.push_str("[...]");
                return;
            }
            active.push(id);
            out.push('[');
            write_items(&cell.borrow(), out, active);
            out.push(']');
            active.pop();
        }
        Value::Set(items) => {
            if items.is_empty() {
                out.push_str("set()");
                return;
            }
            out.push('{');
            write_items(items, out, active);
            out.push('}');
        }
        Value::Dict(cell) => {
            let id = Rc::as_ptr(cell) as usize;
            if active.contains(&id) {
                out.push_str("{...}");
                return;
            }
            active.push(id);
            out.push('{');
            for (i, (k, v)) in cell.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(k, out, active);
                out.push_str(": ");
                write_repr(v, out, active);
            }
            out.push('}');
            active.pop();
        }
        Value::Object(object) => out.push_str(&object.repr),
    }
}

fn write_items(items: &[Value], out: &mut String, active: &mut Vec<usize>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(item, out, active);
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// Shortest round-tripping text for a float, in the host language's layout.
///
/// Uses positional notation for decimal exponents in `-4..16`, scientific
/// notation (`1e+16`, `1e-05`) otherwise, and always shows a fractional part
/// in positional notation (`1.0`).
#[must_use]
pub fn float_repr(x: f64) -> String {
    format_float(x, true)
}

/// Text for a complex number (`1j`, `(1+2j)`, `(-0-4.2j)`).
#[must_use]
pub fn complex_repr(c: Complex) -> String {
    if c.re == 0.0 && c.re.is_sign_positive() {
        return format!("{}j", format_float(c.im, false));
    }
    let im = format_float(c.im, false);
    let sign = if im.starts_with('-') { "" } else { "+" };
    format!("({}{sign}{im}j)", format_float(c.re, false))
}

fn format_float(x: f64, add_dot_zero: bool) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return (if x > 0.0 { "inf" } else { "-inf" }).to_string();
    }
    let sign = if x.is_sign_negative() { "-" } else { "" };
    if x == 0.0 {
        return format!("{sign}0{}", if add_dot_zero { ".0" } else { "" });
    }

    // `{:e}` yields the shortest round-tripping digits, e.g. "1.5e-7".
    let scientific = format!("{:e}", x.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    let mut out = String::from(sign);
    if !(-4..16).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{exp_sign}{:02}", exponent.unsigned_abs());
    } else if exponent >= 0 {
        let int_len = usize::try_from(exponent).unwrap_or(0) + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            out.push_str(&"0".repeat(int_len - digits.len()));
            if add_dot_zero {
                out.push_str(".0");
            }
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    } else {
        let zeros = usize::try_from(-exponent - 1).unwrap_or(0);
        out.push_str("0.");
        out.push_str(&"0".repeat(zeros));
        out.push_str(&digits);
    }
    out
}

// =============================================================================
// Text
// =============================================================================

fn choose_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

fn is_printable(c: char) -> bool {
    !(c.is_control() || (c.is_whitespace() && c != ' ') || matches!(c, '\u{ad}' | '\u{feff}'))
}

/// Quoted, escaped text literal.
#[must_use]
pub fn str_repr(s: &str) -> String {
    let quote = choose_quote(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if is_printable(c) => out.push(c),
            c => {
                let code = u32::from(c);
                let _ = if code <= 0xff {
                    write!(out, "\\x{code:02x}")
                } else if code <= 0xffff {
                    write!(out, "\\u{code:04x}")
                } else {
                    write!(out, "\\U{code:08x}")
                };
            }
        }
    }
    out.push(quote);
    out
}

/// Quoted, escaped bytes literal (`b'...'`).
#[must_use]
pub fn bytes_repr(bytes: &[u8]) -> String {
    let quote = choose_quote(bytes.contains(&b'\''), bytes.contains(&b'"'));
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if char::from(b) == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(char::from(b)),
            b => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push(quote);
    out
}
