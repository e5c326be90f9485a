//! Call compilation.
//!
//! ```text
//! (head positional... : key value ...)
//! ```
//!
//! Arguments before the `:` separator are positional. After it they come in
//! pairs: a name gives a keyword argument, `:*` and `:**` unpack, and `:?`
//! passes the value bare. A head starting with a single `.` is a method
//! call on the first positional argument.

use formcast_foundation::{Error, ErrorKind, Form, Result};

use crate::compiler::Compiler;
use crate::symbol::QUALIFIER;

/// The separator between positional and paired arguments.
pub const SEPARATOR: &str = ":";

/// Joins compiled arguments one per line, indented under the opening
/// parenthesis.
#[must_use]
pub fn join_args(args: &[String]) -> String {
    if args.is_empty() {
        return String::new();
    }
    format!("\n{}", args.join(",\n")).replace('\n', "\n  ")
}

/// Splits items at the first `:` into single items and pairs.
pub(crate) fn split_pairs(items: &[Form]) -> (&[Form], &[Form]) {
    match items.iter().position(|item| item.is_control(SEPARATOR)) {
        Some(at) => (&items[..at], &items[at + 1..]),
        None => (items, &[]),
    }
}

/// Groups items into pairs.
///
/// # Errors
/// Returns an incomplete-pair error if the count is odd.
pub fn pairs(items: &[Form]) -> Result<Vec<(&Form, &Form)>> {
    let chunks = items.chunks_exact(2);
    if let [dangling] = chunks.remainder() {
        return Err(Error::incomplete_pair(dangling.to_string()));
    }
    Ok(chunks.map(|pair| (&pair[0], &pair[1])).collect())
}

fn method_name(head: &Form) -> Option<&str> {
    let head = head.as_symbol()?;
    if head.starts_with(QUALIFIER) {
        return None;
    }
    head.strip_prefix('.')
}

impl Compiler {
    /// Compiles a call.
    pub(crate) fn call(&self, items: &[Form]) -> Result<String> {
        self.call_inner(items)
            .map_err(|e| e.within("call", Form::Compound(items.to_vec())))
    }

    fn call_inner(&self, items: &[Form]) -> Result<String> {
        let (head, rest) = items
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::Internal("call without a head".to_string())))?;
        let (positional, paired) = split_pairs(rest);

        let mut args = positional
            .iter()
            .map(|arg| self.form(arg))
            .collect::<Result<Vec<_>>>()?;

        let mut unpacked_mapping = false;
        for (key, value) in pairs(paired)? {
            let value = self.form(value)?;
            let arg = match key {
                Form::Control(word) if word == ":*" => {
                    if unpacked_mapping {
                        return Err(Error::new(ErrorKind::UnpackOrder));
                    }
                    format!("*{value}")
                }
                Form::Control(word) if word == ":**" => {
                    unpacked_mapping = true;
                    format!("**{value}")
                }
                Form::Control(word) if word == ":?" => value,
                Form::Symbol(name) => format!("{name}={value}"),
                other => {
                    return Err(Error::invalid_parameter(
                        other.to_string(),
                        "keyword must be a name, :*, :** or :?",
                    ));
                }
            };
            args.push(arg);
        }

        if let Some(method) = method_name(head) {
            if positional.is_empty() {
                return Err(Error::new(ErrorKind::MissingReceiver(method.to_string())));
            }
            let receiver = args.remove(0);
            return Ok(format!("{receiver}.{method}({})", join_args(&args)));
        }
        Ok(format!("{}({})", self.form(head)?, join_args(&args)))
    }
}
