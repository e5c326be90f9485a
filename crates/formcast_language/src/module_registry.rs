//! Module registry for resolving foreign modules at compile time.
//!
//! The `ModuleRegistry` stands in for the host's import system while
//! compiling: it maps module names to their live namespaces, so a qualified
//! macro reference like `pkg.mod.._macro_.name` can find the macro another
//! module defined.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use formcast_foundation::{Error, Result};

use crate::namespace::{MACROS, Macro, Namespace};

/// Shared handle to a live namespace.
pub type SharedNamespace = Rc<RefCell<Namespace>>;

/// Registry of importable modules.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Map from module name to namespace.
    modules: RefCell<HashMap<String, SharedNamespace>>,
}

impl ModuleRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a namespace under its own `__name__`, replacing any module
    /// already registered under that name.
    pub fn register(&self, namespace: SharedNamespace) {
        let name = namespace.borrow().name().to_string();
        self.insert(name, namespace);
    }

    /// Registers a namespace under an explicit module name.
    pub fn insert(&self, name: impl Into<String>, namespace: SharedNamespace) {
        let name = name.into();
        tracing::trace!(module = %name, "registered module");
        self.modules.borrow_mut().insert(name, namespace);
    }

    /// Removes a module.
    pub fn remove(&self, name: &str) -> Option<SharedNamespace> {
        self.modules.borrow_mut().remove(name)
    }

    /// Checks if a module is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.borrow().contains_key(name)
    }

    /// Returns all registered module names, sorted.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Imports a module by name.
    ///
    /// # Errors
    /// Returns a module-not-found error if nothing is registered under `name`.
    pub fn import(&self, name: &str) -> Result<SharedNamespace> {
        self.modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::module_not_found(name))
    }

    /// Resolves the macro `name` in the `_macro_` table of `module`.
    ///
    /// # Errors
    /// Returns a module-not-found error if the module is not registered, and
    /// an attribute error if the module has no macro table or the table has
    /// no such macro.
    pub fn resolve_macro(&self, module: &str, name: &str) -> Result<Macro> {
        let namespace = self.import(module)?;
        let namespace = namespace.borrow();
        let table = namespace
            .macros()
            .ok_or_else(|| Error::attribute_not_found(format!("module {module}"), MACROS))?;
        table
            .get(name)
            .ok_or_else(|| Error::attribute_not_found(format!("{module}.{MACROS}"), name))
    }
}
