//! Module namespaces and their macro tables.
//!
//! A [`Namespace`] is the live mapping a compilation unit compiles and
//! executes into. Its optional `_macro_` entry is a [`MacroTable`] that maps
//! local macro names to macro callables.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use formcast_foundation::{Form, HostObject, Result, Value};

/// Name of the module-level entry holding the macro table.
pub const MACROS: &str = "_macro_";

/// Name of the entry-point module.
pub const ENTRY_POINT: &str = "__main__";

/// A compile-time callable: takes raw argument forms, returns the expansion.
pub type Macro = Rc<dyn Fn(&[Form]) -> Result<Form>>;

// =============================================================================
// MacroTable
// =============================================================================

/// Table of macros defined by one module.
#[derive(Clone, Default)]
pub struct MacroTable {
    /// Map from local name to macro callable.
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    /// Creates a new empty macro table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a macro.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        expand: impl Fn(&[Form]) -> Result<Form> + 'static,
    ) {
        self.macros.insert(name.into(), Rc::new(expand));
    }

    /// Inserts an already shared macro callable.
    pub fn insert(&mut self, name: impl Into<String>, expand: Macro) {
        self.macros.insert(name.into(), expand);
    }

    /// Looks up a macro by local name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Macro> {
        self.macros.get(name).cloned()
    }

    /// Checks if a macro is defined under the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Removes a macro, returning it if it was defined.
    pub fn remove(&mut self, name: &str) -> Option<Macro> {
        self.macros.remove(name)
    }

    /// Returns all macro names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Returns true if no macros are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl fmt::Debug for MacroTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

// =============================================================================
// Namespace
// =============================================================================

/// The live environment of one module.
#[derive(Clone, Debug)]
pub struct Namespace {
    /// Module-level bindings.
    globals: HashMap<String, Value>,
    /// The `_macro_` entry, when the module defines one.
    macros: Option<MacroTable>,
}

impl Namespace {
    /// Creates a fresh module namespace seeded the way the host seeds a new
    /// module: `__name__`, `__doc__`, `__package__`, `__annotations__` and
    /// `__builtins__`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let builtins = HostObject::new("importlib", "import_module", vec![Value::str("builtins")])
            .with_repr("<module 'builtins' (built-in)>");
        let mut globals = HashMap::new();
        globals.insert("__name__".to_string(), Value::Str(name.into()));
        globals.insert("__doc__".to_string(), Value::None);
        globals.insert("__package__".to_string(), Value::None);
        globals.insert("__annotations__".to_string(), Value::dict(Vec::new()));
        globals.insert("__builtins__".to_string(), Value::object(builtins));
        Self {
            globals,
            macros: None,
        }
    }

    /// Creates a namespace that holds nothing but its name.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        let mut globals = HashMap::new();
        globals.insert("__name__".to_string(), Value::Str(name.into()));
        Self {
            globals,
            macros: None,
        }
    }

    /// Sets the module docstring.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.set("__doc__", Value::Str(doc.into()));
        self
    }

    /// Sets the module's package.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.set("__package__", Value::Str(package.into()));
        self
    }

    /// Returns the module name (`__name__`), or `""` if it was removed.
    #[must_use]
    pub fn name(&self) -> &str {
        self.globals
            .get("__name__")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Returns true if this is the entry-point module.
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        self.name() == ENTRY_POINT
    }

    /// Looks up a module-level binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Binds a module-level name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Removes a module-level binding.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.globals.remove(name)
    }

    /// Checks if a module-level name is bound (including `_macro_`).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains_key(name) || (name == MACROS && self.macros.is_some())
    }

    /// Returns the macro table, if the module has one.
    #[must_use]
    pub fn macros(&self) -> Option<&MacroTable> {
        self.macros.as_ref()
    }

    /// Returns the macro table, creating an empty one if needed.
    pub fn macros_mut(&mut self) -> &mut MacroTable {
        self.macros.get_or_insert_with(MacroTable::new)
    }

    /// Replaces (or removes) the macro table.
    pub fn set_macros(&mut self, macros: Option<MacroTable>) {
        self.macros = macros;
    }

    /// Defines a macro in this module, creating the table if needed.
    pub fn define_macro(
        &mut self,
        name: impl Into<String>,
        expand: impl Fn(&[Form]) -> Result<Form> + 'static,
    ) {
        self.macros_mut().define(name, expand);
    }

    /// Looks up a local macro.
    #[must_use]
    pub fn macro_named(&self, name: &str) -> Option<Macro> {
        self.macros.as_ref().and_then(|table| table.get(name))
    }
}
