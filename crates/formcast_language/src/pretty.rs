//! Pretty-printer for literal values.
//!
//! Lays out collections, text, and bytes the way the host's standard
//! pretty-printer does with dict sorting disabled: a value that fits in the
//! remaining width prints on one line, otherwise its elements go one per
//! line with a one-space indent per nesting level. Long text and bytes are
//! split into adjacent literals, which the host concatenates.
//!
//! # Example
//!
//! ```
//! use formcast_foundation::Value;
//! use formcast_language::pretty::pformat;
//!
//! let v = Value::list(vec![Value::str("foo"), 2.into()]);
//! assert_eq!(pformat(&v), "['foo', 2]");
//! ```

use std::cmp::Ordering;
use std::rc::Rc;

use formcast_foundation::repr::{bytes_repr, str_repr};
use formcast_foundation::{Value, repr};

/// Default line width.
pub const DEFAULT_WIDTH: usize = 80;

/// Configuration for pretty-printing.
#[derive(Debug, Clone)]
pub struct PrettyPrinter {
    /// Maximum line width before breaking.
    pub width: usize,
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
        }
    }
}

/// Formats a value with the default width.
#[must_use]
pub fn pformat(value: &Value) -> String {
    PrettyPrinter::default().pformat(value)
}

impl PrettyPrinter {
    /// Creates a printer that breaks lines past `width` columns.
    #[must_use]
    pub const fn new(width: usize) -> Self {
        Self { width }
    }

    /// Formats a value.
    #[must_use]
    pub fn pformat(&self, value: &Value) -> String {
        let mut out = String::new();
        let mut context = Vec::new();
        self.format(value, &mut out, 0, 0, &mut context, 0);
        out
    }

    fn format(
        &self,
        value: &Value,
        out: &mut String,
        indent: usize,
        allowance: usize,
        context: &mut Vec<usize>,
        level: usize,
    ) {
        let id = container_id(value);
        if let Some(id) = id {
            if context.contains(&id) {
                out.push_str(&recursion(value, id));
                return;
            }
        }
        let rep = safe_repr(value, context);
        if len(&rep) + indent + allowance > self.width {
            if let Some(id) = id {
                context.push(id);
            }
            let level = level + 1;
            let handled = match value {
                Value::List(cell) => {
                    let items = cell.borrow().clone();
                    out.push('[');
                    self.format_items(&items, out, indent, allowance + 1, context, level);
                    out.push(']');
                    true
                }
                Value::Tuple(items) => {
                    let end = if items.len() == 1 { ",)" } else { ")" };
                    out.push('(');
                    self.format_items(items, out, indent, allowance + end.len(), context, level);
                    out.push_str(end);
                    true
                }
                Value::Set(items) if !items.is_empty() => {
                    let mut items = items.clone();
                    items.sort_by(safe_order);
                    out.push('{');
                    self.format_items(&items, out, indent, allowance + 1, context, level);
                    out.push('}');
                    true
                }
                Value::Dict(cell) => {
                    let entries = cell.borrow().clone();
                    out.push('{');
                    if !entries.is_empty() {
                        self.format_dict_items(&entries, out, indent, allowance + 1, context, level);
                    }
                    out.push('}');
                    true
                }
                Value::Str(s) if !s.is_empty() => {
                    self.format_str(s, out, indent, allowance, level);
                    true
                }
                Value::Bytes(b) => {
                    self.format_bytes(b, out, indent, allowance, level);
                    true
                }
                _ => false,
            };
            if id.is_some() {
                context.pop();
            }
            if handled {
                return;
            }
        }
        out.push_str(&rep);
    }

    fn format_items(
        &self,
        items: &[Value],
        out: &mut String,
        indent: usize,
        allowance: usize,
        context: &mut Vec<usize>,
        level: usize,
    ) {
        let indent = indent + 1;
        let delimiter = format!(",\n{}", " ".repeat(indent));
        let last_index = items.len().saturating_sub(1);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(&delimiter);
            }
            let allowance = if i == last_index { allowance } else { 1 };
            self.format(item, out, indent, allowance, context, level);
        }
    }

    fn format_dict_items(
        &self,
        entries: &[(Value, Value)],
        out: &mut String,
        indent: usize,
        allowance: usize,
        context: &mut Vec<usize>,
        level: usize,
    ) {
        let indent = indent + 1;
        let delimiter = format!(",\n{}", " ".repeat(indent));
        let last_index = entries.len().saturating_sub(1);
        for (i, (key, value)) in entries.iter().enumerate() {
            let last = i == last_index;
            let rep = safe_repr(key, context);
            out.push_str(&rep);
            out.push_str(": ");
            let allowance = if last { allowance } else { 1 };
            self.format(value, out, indent + len(&rep) + 2, allowance, context, level);
            if !last {
                out.push_str(&delimiter);
            }
        }
    }

    fn format_str(&self, s: &str, out: &mut String, indent: usize, allowance: usize, level: usize) {
        let parens = level == 1;
        let (indent, allowance) = if parens {
            (indent + 1, allowance + 1)
        } else {
            (indent, allowance)
        };
        let lines = split_lines(s);
        let mut chunks = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let last_line = i + 1 == lines.len();
            let rep = str_repr(line);
            let line_allowance = if last_line { allowance } else { 0 };
            if len(&rep) + indent + line_allowance <= self.width {
                chunks.push(rep);
                continue;
            }
            let parts = split_words(line);
            let mut current = String::new();
            for (j, part) in parts.iter().enumerate() {
                let candidate = format!("{current}{part}");
                let part_allowance = if last_line && j + 1 == parts.len() {
                    allowance
                } else {
                    0
                };
                if len(&str_repr(&candidate)) + indent + part_allowance > self.width {
                    if !current.is_empty() {
                        chunks.push(str_repr(&current));
                    }
                    current = (*part).to_string();
                } else {
                    current = candidate;
                }
            }
            if !current.is_empty() {
                chunks.push(str_repr(&current));
            }
        }
        write_chunks(&chunks, out, indent, parens);
    }

    fn format_bytes(&self, b: &[u8], out: &mut String, indent: usize, allowance: usize, level: usize) {
        if b.len() <= 4 {
            out.push_str(&bytes_repr(b));
            return;
        }
        let parens = level == 1;
        let (indent, allowance) = if parens {
            (indent + 1, allowance + 1)
        } else {
            (indent, allowance)
        };
        let last = b.len() / 4 * 4;
        let mut chunks = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        for (i, part) in b.chunks(4).enumerate() {
            let mut candidate = current.clone();
            candidate.extend_from_slice(part);
            let part_allowance = if i * 4 == last { allowance } else { 0 };
            if len(&bytes_repr(&candidate)) + indent + part_allowance > self.width {
                if !current.is_empty() {
                    chunks.push(bytes_repr(&current));
                }
                current = part.to_vec();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            chunks.push(bytes_repr(&current));
        }
        write_chunks(&chunks, out, indent, parens);
    }
}

fn write_chunks(chunks: &[String], out: &mut String, indent: usize, parens: bool) {
    if let [only] = chunks {
        out.push_str(only);
        return;
    }
    if parens {
        out.push('(');
    }
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&" ".repeat(indent));
        }
        out.push_str(chunk);
    }
    if parens {
        out.push(')');
    }
}

fn len(text: &str) -> usize {
    text.chars().count()
}

fn container_id(value: &Value) -> Option<usize> {
    match value {
        Value::List(cell) => Some(Rc::as_ptr(cell).cast::<()>() as usize),
        Value::Dict(cell) => Some(Rc::as_ptr(cell).cast::<()>() as usize),
        _ => None,
    }
}

fn recursion(value: &Value, id: usize) -> String {
    format!("<Recursion on {} with id={id}>", value.type_name())
}

/// One-line representation that marks recursive references instead of
/// eliding them, so a recursive value never reads back as a literal.
fn safe_repr(value: &Value, context: &mut Vec<usize>) -> String {
    match value {
        Value::List(cell) => {
            let id = Rc::as_ptr(cell).cast::<()>() as usize;
            if context.contains(&id) {
                return recursion(value, id);
            }
            context.push(id);
            let items: Vec<String> = cell.borrow().iter().map(|v| safe_repr(v, context)).collect();
            context.pop();
            format!("[{}]", items.join(", "))
        }
        Value::Dict(cell) => {
            let id = Rc::as_ptr(cell).cast::<()>() as usize;
            if context.contains(&id) {
                return recursion(value, id);
            }
            context.push(id);
            let entries: Vec<String> = cell
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}: {}", safe_repr(k, context), safe_repr(v, context)))
                .collect();
            context.pop();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tuple(items) => {
            let items: Vec<String> = items.iter().map(|v| safe_repr(v, context)).collect();
            if items.len() == 1 {
                format!("({},)", items[0])
            } else {
                format!("({})", items.join(", "))
            }
        }
        _ => repr(value),
    }
}

/// Orders set elements for display; unorderable pairs fall back to type name.
fn safe_order(a: &Value, b: &Value) -> Ordering {
    natural_order(a, b).unwrap_or_else(|| a.type_name().cmp(b.type_name()))
}

#[allow(clippy::cast_precision_loss)]
fn natural_order(a: &Value, b: &Value) -> Option<Ordering> {
    let real = |v: &Value| match v {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    };
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Tuple(x), Value::Tuple(y)) => {
            for (p, q) in x.iter().zip(y) {
                if p != q {
                    return natural_order(p, q);
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => real(a)?.partial_cmp(&real(b)?),
    }
}

/// Splits text at line boundaries, keeping the terminators.
fn split_lines(s: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\r' if chars.peek().is_some_and(|&(_, n)| n == '\n') => {
                chars.next();
                i + 2
            }
            '\n' | '\r' | '\u{b}' | '\u{c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}'
            | '\u{2028}' | '\u{2029}' => i + c.len_utf8(),
            _ => continue,
        };
        lines.push(&s[start..end]);
        start = end;
    }
    if start < s.len() {
        lines.push(&s[start..]);
    }
    lines
}

/// Splits a line into alternating runs: non-space followed by space.
fn split_words(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (i, c) in line.char_indices() {
        let space = c.is_whitespace();
        if in_space && !space {
            parts.push(&line[start..i]);
            start = i;
        }
        in_space = space;
    }
    if start < line.len() {
        parts.push(&line[start..]);
    }
    parts
}
