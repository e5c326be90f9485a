//! Integration tests for form compilation
//!
//! Tests emitted text for calls, lambdas, symbols and special forms.

use formcast_foundation::{ErrorKind, Form, Value};
use formcast_language::{CompileError, Compiler, Namespace};

use crate::{compound, ctl, sym};

fn compile(form: Form) -> String {
    Compiler::default().compile(&[form]).unwrap()
}

fn compile_err(form: Form) -> ErrorKind {
    match Compiler::default().compile(&[form]) {
        Err(CompileError::Form { source, .. }) => source.kind,
        other => panic!("expected a form error, got {other:?}"),
    }
}

// =============================================================================
// Parameters
// =============================================================================

#[test]
fn parameter_kinds_keep_their_order() {
    let form = compound([
        sym("lambda"),
        compound([
            sym("a"),
            ctl(":/"),
            sym("b"),
            ctl(":"),
            sym("e"),
            Form::from(1),
            sym("f"),
            Form::from(2),
            ctl(":*"),
            sym("args"),
            sym("h"),
            Form::from(4),
            sym("i"),
            ctl(":?"),
            sym("j"),
            Form::from(1),
            ctl(":**"),
            sym("kwargs"),
        ]),
        Form::from(42),
    ]);
    assert_eq!(
        compile(form),
        "(lambda a,/,b,e=(1),f=(2),*args,h=(4),i,j=(1),**kwargs:(42))"
    );
}

#[test]
fn keyword_only_after_bare_star() {
    let form = compound([
        sym("lambda"),
        compound([
            ctl(":"),
            sym("a"),
            Form::from(1),
            ctl(":/"),
            ctl(":?"),
            ctl(":*"),
            ctl(":?"),
            sym("b"),
            ctl(":?"),
            sym("c"),
            Form::from(2),
        ]),
    ]);
    assert_eq!(compile(form), "(lambda a=(1),/,*,b,c=(2):())");
}

#[test]
fn empty_paired_segment_is_the_same_as_none() {
    let without = compound([sym("lambda"), compound([sym("a"), sym("b")]), sym("a")]);
    let with = compound([sym("lambda"), compound([sym("a"), sym("b"), ctl(":")]), sym("a")]);
    assert_eq!(compile(without.clone()), compile(with));
    assert_eq!(compile(without), "(lambda a,b:a)");
}

#[test]
fn lambda_with_multiline_body() {
    let form = compound([
        sym("lambda"),
        compound([sym("x")]),
        compound([sym("print"), sym("x")]),
        compound([sym("len"), sym("x")]),
    ]);
    assert_eq!(
        compile(form),
        "(lambda x:(\n  print(\n    x),\n  len(\n    x))[-1])"
    );
}

#[test]
fn odd_parameter_pairs_are_rejected() {
    let form = compound([sym("lambda"), compound([ctl(":"), sym("a"), Form::from(1), sym("b")])]);
    assert!(matches!(compile_err(form), ErrorKind::IncompletePair(_)));
}

// =============================================================================
// Calls
// =============================================================================

#[test]
fn unpacking_follows_positionals_in_source_order() {
    let form = compound([
        sym("f"),
        sym("a"),
        sym("b"),
        ctl(":"),
        ctl(":*"),
        sym("xs"),
        ctl(":**"),
        sym("kw"),
    ]);
    assert_eq!(compile(form), "f(\n  a,\n  b,\n  *xs,\n  **kw)");
}

#[test]
fn iterable_unpacking_after_mapping_unpacking_is_rejected() {
    let form = compound([
        sym("f"),
        ctl(":"),
        ctl(":**"),
        sym("kw"),
        ctl(":*"),
        sym("xs"),
    ]);
    assert!(matches!(compile_err(form), ErrorKind::UnpackOrder));
}

#[test]
fn method_call_on_a_number() {
    let form = compound([sym(".conjugate"), Form::literal(Value::complex(0.0, 1.0))]);
    assert_eq!(compile(form), "(1j).conjugate()");
}

#[test]
fn method_call_without_receiver_is_rejected() {
    assert!(matches!(
        compile_err(compound([sym(".upper")])),
        ErrorKind::MissingReceiver(_)
    ));
}

#[test]
fn nested_calls_indent() {
    let form = compound([
        sym("print"),
        compound([sym("sum"), compound([sym("range"), Form::from(3)])]),
        ctl(":"),
        sym("sep"),
        Form::string("-"),
    ]);
    assert_eq!(
        compile(form),
        "print(\n  sum(\n    range(\n      (3))),\n  sep='-')"
    );
}

// =============================================================================
// Symbols and special forms
// =============================================================================

#[test]
fn qualified_self_reference_ignores_locals() {
    let mut compiler = Compiler::new(Namespace::new("app.core"));
    let form = compound([sym("lambda"), compound([sym("x")]), sym("app.core..x")]);
    assert_eq!(
        compiler.compile(&[form]).unwrap(),
        "(lambda x:__import__('builtins').globals()['x'])"
    );
}

#[test]
fn foreign_references_import() {
    let form = compound([sym("os.path..join"), Form::string("a"), Form::string("b")]);
    assert_eq!(
        compile(form),
        "__import__('os.path',fromlist='?').join(\n  'a',\n  'b')"
    );
    assert_eq!(compile(sym("math.")), "__import__('math')");
}

#[test]
fn raw_text_passes_through() {
    assert_eq!(compile(sym("(lambda: 1)")), "(lambda: 1)");
    let form = compound([sym("..print"), Form::from(1)]);
    assert_eq!(compile(form), "..print(\n  (1))");
}

#[test]
fn quote_produces_data() {
    let form = compound([
        sym("quote"),
        compound([sym("lambda"), compound([]), ctl(":*")]),
    ]);
    assert_eq!(compile(form), "('lambda', (), ':*')");
}

#[test]
fn quote_arity_is_checked() {
    assert!(matches!(
        compile_err(compound([sym("quote")])),
        ErrorKind::ArityMismatch { actual: 0, .. }
    ));
}

#[test]
fn errors_carry_breadcrumbs() {
    let inner = compound([sym(".upper")]);
    let form = compound([sym("print"), inner]);
    let Err(CompileError::Form { source, form: text, .. }) = Compiler::default().compile(&[form]) else {
        panic!("expected a form error");
    };
    assert_eq!(text, "('print', ('.upper',))");
    let steps: Vec<&str> = source.context.stack.iter().map(|f| f.step.as_str()).collect();
    assert_eq!(steps, vec!["call", "form", "call", "form"]);
}
