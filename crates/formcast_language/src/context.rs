//! The compile context: which namespace is currently being compiled.
//!
//! Macros are ordinary callables invoked synchronously during compilation.
//! They read the namespace of the module being compiled through
//! [`current()`], not through an argument. The context is a thread-local
//! stack; [`enter()`] pushes a namespace and returns a guard that restores
//! the previous one on drop, on every exit path.

use std::cell::RefCell;
use std::rc::Rc;

use crate::module_registry::{ModuleRegistry, SharedNamespace};

struct Entry {
    namespace: SharedNamespace,
    modules: Rc<ModuleRegistry>,
}

thread_local! {
    static STACK: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard that restores the previous compile context on drop.
#[must_use = "the context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    entry_depth: usize,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        STACK.with(|stack| stack.borrow_mut().truncate(self.entry_depth));
    }
}

/// Makes `namespace` the current compile context until the guard drops.
///
/// `modules` is the registry foreign macro references resolve through while
/// this context is active.
pub fn enter(namespace: SharedNamespace, modules: Rc<ModuleRegistry>) -> ContextGuard {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let entry_depth = stack.len();
        stack.push(Entry { namespace, modules });
        ContextGuard { entry_depth }
    })
}

/// Returns the namespace currently being compiled, if any.
#[must_use]
pub fn current() -> Option<SharedNamespace> {
    STACK.with(|stack| stack.borrow().last().map(|entry| Rc::clone(&entry.namespace)))
}

/// Returns the module registry of the current context, if any.
#[must_use]
pub fn current_modules() -> Option<Rc<ModuleRegistry>> {
    STACK.with(|stack| stack.borrow().last().map(|entry| Rc::clone(&entry.modules)))
}

/// Returns how many contexts are active.
#[must_use]
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}
