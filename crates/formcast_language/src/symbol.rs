//! Symbol resolution.
//!
//! A symbol compiles to one of:
//!
//! - raw host text, when it starts with `..` or contains a space or a
//!   parenthesis
//! - a lookup in the current module's globals, when it is qualified
//!   (`module..attr`) with the module being compiled
//! - an import expression, when it is qualified with another module or is a
//!   module reference (`module.`)
//! - itself, otherwise

use formcast_foundation::repr::str_repr;
use formcast_foundation::{Form, Result};

use crate::compiler::Compiler;

/// Separator between a module path and the attribute path.
pub const QUALIFIER: &str = "..";

/// Returns true if the symbol is emitted verbatim.
#[must_use]
pub fn is_raw(symbol: &str) -> bool {
    symbol.starts_with(QUALIFIER) || symbol.contains([' ', '(', ')'])
}

/// Import expression for `module`.
///
/// Dotted names import the submodule itself rather than its top-level
/// package.
#[must_use]
pub fn import_expression(module: &str) -> String {
    let fromlist = if module.contains('.') { ",fromlist='?'" } else { "" };
    format!("__import__({}{fromlist})", str_repr(module))
}

impl Compiler {
    /// Compiles a symbol.
    pub(crate) fn symbol(&self, symbol: &str) -> Result<String> {
        if is_raw(symbol) {
            return Ok(symbol.to_string());
        }
        if let Some((module, path)) = symbol.split_once(QUALIFIER) {
            if module == self.qualname {
                let (first, rest) = match path.split_once('.') {
                    Some((first, rest)) => (first, Some(rest)),
                    None => (path, None),
                };
                let key = self.quoted(&Form::string(first))?;
                let lookup = format!("__import__('builtins').globals()[{key}]");
                return Ok(match rest {
                    Some(rest) => format!("{lookup}.{rest}"),
                    None => lookup,
                });
            }
            return Ok(format!("{}.{path}", import_expression(module)));
        }
        if let Some(module) = symbol.strip_suffix('.') {
            return Ok(import_expression(module));
        }
        Ok(symbol.to_string())
    }
}
