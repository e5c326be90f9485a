//! Macro resolution and expansion.
//!
//! A head names a macro when:
//!
//! - it is unqualified and the module's `_macro_` table defines it
//! - it is `module.._macro_.name`, which must resolve
//! - it is `module..xAUTO_.name`, which resolves if it can and otherwise
//!   compiles as the call `module..name`
//!
//! A qualifier naming the module being compiled reads the local table;
//! any other qualifier goes through the module registry. An unknown
//! module is an error even with the auto marker.

use std::rc::Rc;

use formcast_foundation::{Error, ErrorKind, Form, Result};

use crate::compiler::Compiler;
use crate::context;
use crate::namespace::{MACROS, Macro};

/// Qualifier that requires a macro.
pub const MACRO_MARKER: &str = ".._macro_.";

/// Qualifier that prefers a macro and falls back to a plain call.
pub const AUTO_MARKER: &str = "..xAUTO_.";

/// A head split around its macro marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacroPath<'a> {
    /// Qualifying module.
    pub module: &'a str,
    /// Name inside the macro table.
    pub name: &'a str,
    /// True for the auto marker.
    pub auto: bool,
}

impl<'a> MacroPath<'a> {
    /// Splits `head` at its first macro marker.
    #[must_use]
    pub fn parse(head: &'a str) -> Option<Self> {
        let explicit = head.find(MACRO_MARKER);
        let auto = head.find(AUTO_MARKER);
        let (at, marker, auto) = match (explicit, auto) {
            (Some(e), Some(a)) if a < e => (a, AUTO_MARKER, true),
            (Some(e), _) => (e, MACRO_MARKER, false),
            (None, Some(a)) => (a, AUTO_MARKER, true),
            (None, None) => return None,
        };
        Some(Self {
            module: &head[..at],
            name: &head[at + marker.len()..],
            auto,
        })
    }
}

impl Compiler {
    /// Expands `head` as a macro applied to `args`, if it names one.
    ///
    /// Returns `None` when the head is not a macro and should compile as a
    /// call.
    pub(crate) fn expand_macro(&self, head: &str, args: &[Form]) -> Result<Option<String>> {
        let Some(expand) = self.resolve_macro(head)? else {
            return Ok(None);
        };
        tracing::debug!(module = %self.qualname, name = head, "expanding macro");
        let expansion = {
            let _guard = context::enter(Rc::clone(&self.ns), Rc::clone(&self.modules));
            expand(args).map_err(|source| {
                Error::new(ErrorKind::MacroFailed {
                    name: head.to_string(),
                    source: Box::new(source),
                })
            })
        };
        let within = |e: Error| {
            let mut items = vec![Form::symbol(head)];
            items.extend_from_slice(args);
            e.within("macro", Form::Compound(items))
        };
        let expansion = expansion.map_err(within)?;
        self.form(&expansion).map(Some).map_err(within)
    }

    fn resolve_macro(&self, head: &str) -> Result<Option<Macro>> {
        let Some(path) = MacroPath::parse(head) else {
            return Ok(self.ns.borrow().macro_named(head));
        };
        let found = if path.module == self.qualname {
            self.ns.borrow().macro_named(path.name).ok_or_else(|| {
                Error::attribute_not_found(format!("{}.{MACROS}", path.module), path.name)
            })
        } else {
            self.modules.resolve_macro(path.module, path.name)
        };
        match found {
            Ok(expand) => Ok(Some(expand)),
            Err(e) if path.auto && e.is_attribute_error() => {
                tracing::trace!(head, "no macro; compiling as a call");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
