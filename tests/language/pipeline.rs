//! Integration tests for the compile pipeline
//!
//! Tests incremental execution, entry-point aborts, and library warnings.

use std::cell::RefCell;
use std::rc::Rc;

use formcast_foundation::Form;
use formcast_language::{
    AbortPolicy, CompileError, Compiler, CompilerConfig, ExecError, Namespace, SharedNamespace,
};

use crate::{compound, sym};

/// Executor that records every form and fails on `raise_`.
fn recording(log: &Rc<RefCell<Vec<String>>>) -> impl FnMut(&str, &SharedNamespace) -> Result<(), ExecError> + 'static {
    let log = Rc::clone(log);
    move |code: &str, _: &SharedNamespace| {
        log.borrow_mut().push(code.to_string());
        if code.starts_with("raise_") {
            Err(ExecError::new(
                "ZeroDivisionError: division by zero",
                "Traceback (most recent call last):\n  File \"<string>\", line 1\nZeroDivisionError: division by zero",
            ))
        } else {
            Ok(())
        }
    }
}

fn forms() -> Vec<Form> {
    vec![compound([sym("raise_")]), compound([sym("print"), Form::from(2)])]
}

#[test]
fn entry_point_failure_stops_the_sequence() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut compiler = Compiler::new(Namespace::new("__main__"))
        .with_config(CompilerConfig::default().with_abort_policy(AbortPolicy::Return))
        .with_executor(recording(&log));

    let err = compiler.compile(&forms()).unwrap_err();
    let CompileError::Aborted { output, message } = err else {
        panic!("expected an abort");
    };
    assert!(output.starts_with("raise_()\n\n# Traceback (most recent call last):\n#   File"));
    assert!(!output.contains("print"));
    assert_eq!(message, "ZeroDivisionError: division by zero");
    assert_eq!(log.borrow().len(), 1);
    assert!(compiler.warnings().is_empty());
}

#[test]
fn library_failure_is_a_warning() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut compiler = Compiler::new(Namespace::new("lib")).with_executor(recording(&log));

    let out = compiler.compile(&forms()).unwrap();
    assert_eq!(
        out,
        "raise_()\n\n# Traceback (most recent call last):\n#   File \"<string>\", line 1\n# ZeroDivisionError: division by zero\n\nprint(\n  (2))"
    );
    assert_eq!(log.borrow().len(), 2);
    let warnings = compiler.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].module, "lib");
    assert_eq!(warnings[0].code, "raise_()");
    assert!(warnings[0].traceback.ends_with("division by zero"));
    assert!(warnings[0].to_string().contains("lib"));
}

#[test]
fn without_an_executor_nothing_runs() {
    let mut compiler = Compiler::default();
    assert!(!compiler.evaluates());
    let out = compiler.compile(&forms()).unwrap();
    assert_eq!(out, "raise_()\n\nprint(\n  (2))");
}

#[test]
fn compile_errors_report_prior_output() {
    let mut compiler = Compiler::default();
    let err = compiler
        .compile(&[sym("ok"), compound([sym("quote")])])
        .unwrap_err();
    let CompileError::Form { output, .. } = &err else {
        panic!("expected a form error");
    };
    assert_eq!(output, "ok");
    assert!(err.to_string().starts_with("cannot compile ('quote',): quote expects"));
}

#[test]
fn qualname_override_changes_self_references() {
    let config = CompilerConfig::default().with_qualname("pkg.main");
    let mut compiler = Compiler::default().with_config(config);
    assert_eq!(compiler.qualname(), "pkg.main");
    let out = compiler.compile(&[sym("pkg.main..answer")]).unwrap();
    assert_eq!(out, "__import__('builtins').globals()['answer']");
}

#[test]
fn narrow_width_breaks_literals() {
    let config = CompilerConfig::default().with_width(10);
    let mut compiler = Compiler::default().with_config(config);
    let value = Form::compound([
        Form::symbol("quote"),
        Form::compound([Form::symbol("alpha"), Form::symbol("beta")]),
    ]);
    assert_eq!(compiler.compile(&[value]).unwrap(), "('alpha',\n 'beta')");
}
