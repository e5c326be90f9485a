//! Integration tests for macro expansion
//!
//! Tests local, qualified and auto-qualified macros, the compile context
//! macros observe, and expansion determinism.

use std::cell::RefCell;
use std::rc::Rc;

use formcast_foundation::{Error, ErrorKind, Form};
use formcast_language::{
    CompileError, Compiler, ExecError, ModuleRegistry, Namespace, SharedNamespace, context,
    readerless,
};

use crate::{compound, sym};

fn shared(ns: Namespace) -> SharedNamespace {
    Rc::new(RefCell::new(ns))
}

/// `(when test body)` expands to `(lambda : body)` called when test holds.
fn define_when(ns: &mut Namespace) {
    ns.define_macro("when", |args| match args {
        [test, body] => Ok(Form::compound([
            Form::symbol("__import__('operator').and_"),
            test.clone(),
            Form::compound([Form::symbol("lambda"), Form::compound([]), body.clone()]),
        ])),
        _ => Err(Error::new(ErrorKind::Macro("when takes 2 arguments".to_string()))),
    });
}

#[test]
fn local_macro_expansion_is_commented() {
    let mut ns = Namespace::new("app");
    define_when(&mut ns);
    let mut compiler = Compiler::new(ns);
    let out = compiler
        .compile(&[compound([sym("when"), sym("ok"), compound([sym("go")])])])
        .unwrap();
    assert_eq!(
        out,
        "# when\n__import__('operator').and_(\n  ok,\n  (lambda :go()))"
    );
}

#[test]
fn expansion_is_deterministic() {
    let mut ns = Namespace::new("app");
    define_when(&mut ns);
    let mut compiler = Compiler::new(ns);
    let form = compound([sym("when"), sym("ok"), Form::from(1)]);
    let first = compiler.compile(&[form.clone()]).unwrap();
    let second = compiler.compile(&[form]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn macro_errors_name_the_macro() {
    let mut ns = Namespace::new("app");
    define_when(&mut ns);
    let mut compiler = Compiler::new(ns);
    let err = compiler.compile(&[compound([sym("when")])]).unwrap_err();
    let CompileError::Form { source, .. } = err else {
        panic!("expected a form error");
    };
    assert!(matches!(source.kind, ErrorKind::MacroFailed { ref name, .. } if name == "when"));
    assert!(source.to_string().contains("when takes 2 arguments"));
}

#[test]
fn foreign_macros_resolve_through_the_registry() {
    let modules = Rc::new(ModuleRegistry::new());
    let mut lib = Namespace::new("lib.tools");
    define_when(&mut lib);
    modules.register(shared(lib));

    let mut compiler = Compiler::new(Namespace::new("app")).with_modules(Rc::clone(&modules));
    let out = compiler
        .compile(&[compound([sym("lib.tools.._macro_.when"), sym("ok"), Form::from(1)])])
        .unwrap();
    assert!(out.starts_with("# lib.tools.._macro_.when\n__import__('operator').and_("));
}

#[test]
fn auto_qualified_heads_fall_back_to_calls() {
    let modules = Rc::new(ModuleRegistry::new());
    modules.register(shared(Namespace::new("lib")));
    let mut compiler = Compiler::new(Namespace::new("app")).with_modules(modules);
    let out = compiler
        .compile(&[compound([sym("lib..xAUTO_.run"), Form::from(1)])])
        .unwrap();
    assert_eq!(out, "__import__('lib').run(\n  (1))");
}

#[test]
fn auto_qualified_heads_still_need_the_module() {
    let mut compiler = Compiler::new(Namespace::new("app"));
    let err = compiler
        .compile(&[compound([sym("missing..xAUTO_.run")])])
        .unwrap_err();
    let CompileError::Form { source, .. } = err else {
        panic!("expected a form error");
    };
    assert!(matches!(source.kind, ErrorKind::ModuleNotFound(_)));
}

#[test]
fn explicit_macro_marker_requires_the_macro() {
    let mut compiler = Compiler::new(Namespace::new("app"));
    let err = compiler
        .compile(&[compound([sym("app.._macro_.nothing")])])
        .unwrap_err();
    let CompileError::Form { source, .. } = err else {
        panic!("expected a form error");
    };
    assert!(source.is_attribute_error());
}

#[test]
fn macros_compile_fragments_in_the_callers_module() {
    let mut ns = Namespace::new("app.core");
    ns.define_macro("show", |args| {
        let text = readerless(&args[0], None).map_err(|e| Error::new(ErrorKind::Macro(e.to_string())))?;
        Ok(Form::compound([Form::symbol("print"), Form::string(text)]))
    });
    let mut compiler = Compiler::new(ns);
    let out = compiler
        .compile(&[compound([sym("show"), sym("app.core..x")])])
        .unwrap();
    assert_eq!(
        out,
        "# show\nprint(\n  \"__import__('builtins').globals()['x']\")"
    );
    assert!(context::current().is_none());
}

#[test]
fn executed_forms_can_define_macros_for_later_forms() {
    let define = |code: &str, ns: &SharedNamespace| {
        if code == "defmacro" {
            ns.borrow_mut()
                .define_macro("hi", |_| Ok(Form::string("hello")));
        }
        Ok::<(), ExecError>(())
    };
    let mut compiler = Compiler::default().with_executor(define);
    let out = compiler
        .compile(&[compound([sym("hi")]), sym("defmacro"), compound([sym("hi")])])
        .unwrap();
    assert_eq!(out, "hi()\n\ndefmacro\n\n# hi\n'hello'");
}
