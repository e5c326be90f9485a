//! Lambda compilation.
//!
//! ```text
//! (lambda (single... : name default ...) body...)
//! ```
//!
//! Parameters before the `:` separator are bare names, with `:/` and `:*`
//! marking the positional-only and keyword-only boundaries. After it they
//! come in pairs: a name with a default (or `:?` for none), `:*` with a
//! rest-parameter name (or `:?` for a bare `*`), `:**` with a keyword-rest
//! name, or `:/` with anything.

use formcast_foundation::{Error, Form, Result, Value};

use crate::call::{join_args, pairs, split_pairs};
use crate::compiler::Compiler;

fn parameter_name(form: &Form) -> Result<&str> {
    form.as_symbol()
        .ok_or_else(|| Error::invalid_parameter(form.to_string(), "expected a parameter name"))
}

impl Compiler {
    /// Compiles a `lambda` special form.
    pub(crate) fn function(&self, items: &[Form]) -> Result<String> {
        self.function_inner(items)
            .map_err(|e| e.within("function", Form::Compound(items.to_vec())))
    }

    fn function_inner(&self, items: &[Form]) -> Result<String> {
        let (parameters, body) = match items {
            [_, parameters, body @ ..] => (parameters, body),
            _ => return Err(Error::arity("lambda", "at least 1", 0)),
        };
        let parameters = self.parameters(parameters)?;
        let body = self.body(body)?;
        Ok(format!("(lambda {}:{body})", parameters.join(",")))
    }

    /// Compiles a parameter list into its parameter texts.
    pub(crate) fn parameters(&self, form: &Form) -> Result<Vec<String>> {
        let items: &[Form] = match form {
            Form::Compound(items) => items,
            Form::Literal(Value::Tuple(values)) if values.is_empty() => &[],
            _ => {
                return Err(Error::invalid_parameter(
                    form.to_string(),
                    "parameters must be a compound form",
                ));
            }
        };
        self.parameter_list(items)
            .map_err(|e| e.within("parameters", form))
    }

    fn parameter_list(&self, items: &[Form]) -> Result<Vec<String>> {
        let (single, paired) = split_pairs(items);
        let mut parameters = Vec::with_capacity(single.len() + paired.len() / 2);
        for item in single {
            let parameter = match item {
                Form::Control(word) if word == ":/" => "/".to_string(),
                Form::Control(word) if word == ":*" => "*".to_string(),
                other => parameter_name(other)?.to_string(),
            };
            parameters.push(parameter);
        }
        for (key, value) in pairs(paired)? {
            let parameter = match key {
                Form::Control(word) if word == ":*" => {
                    if value.is_control(":?") {
                        "*".to_string()
                    } else {
                        format!("*{}", parameter_name(value)?)
                    }
                }
                Form::Control(word) if word == ":/" => "/".to_string(),
                Form::Control(word) if word == ":**" => format!("**{}", parameter_name(value)?),
                Form::Symbol(name) if value.is_control(":?") => name.clone(),
                Form::Symbol(name) => format!("{name}={}", self.form(value)?),
                other => {
                    return Err(Error::invalid_parameter(
                        other.to_string(),
                        "expected a parameter name, :*, :** or :/",
                    ));
                }
            };
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    /// Compiles a lambda body.
    ///
    /// Several expressions evaluate in order and yield the last; none yields
    /// the empty tuple.
    pub(crate) fn body(&self, body: &[Form]) -> Result<String> {
        match body {
            [] => Ok("()".to_string()),
            [only] => {
                let compiled = self.form(only)?;
                if compiled.contains('\n') {
                    Ok(format!("\n{compiled}").replace('\n', "\n  "))
                } else {
                    Ok(compiled)
                }
            }
            many => {
                let compiled = many
                    .iter()
                    .map(|form| self.form(form))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})[-1]", join_args(&compiled)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use formcast_foundation::ErrorKind;

    use super::*;

    fn sym(s: &str) -> Form {
        Form::symbol(s)
    }

    fn ctl(s: &str) -> Form {
        Form::control(s)
    }

    fn lambda(parameters: Form, body: Vec<Form>) -> Result<String> {
        let mut items = vec![sym("lambda"), parameters];
        items.extend(body);
        Compiler::default().function(&items)
    }

    #[test]
    fn empty_lambda() {
        assert_eq!(lambda(Form::compound([]), vec![]).unwrap(), "(lambda :())");
        assert_eq!(
            lambda(Form::literal(Value::Tuple(vec![])), vec![Form::from(1)]).unwrap(),
            "(lambda :(1))"
        );
    }

    #[test]
    fn single_parameters() {
        let params = Form::compound([sym("a"), ctl(":/"), sym("b"), ctl(":*"), sym("c")]);
        assert_eq!(lambda(params, vec![sym("b")]).unwrap(), "(lambda a,/,b,*,c:b)");
    }

    #[test]
    fn paired_parameters_keep_order() {
        let params = Form::compound([
            sym("a"),
            ctl(":"),
            ctl(":/"),
            ctl(":?"),
            sym("b"),
            ctl(":?"),
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
        ]);
        assert_eq!(
            lambda(params, vec![Form::from(42)]).unwrap(),
            "(lambda a,/,b,e=(1),f=(2),*args,h=(4),i,j=(1),**kwargs:(42))"
        );
    }

    #[test]
    fn bare_star_in_pairs() {
        let params = Form::compound([
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
        ]);
        assert_eq!(
            lambda(params, vec![]).unwrap(),
            "(lambda a=(1),/,*,b,c=(2):())"
        );
    }

    #[test]
    fn bodies() {
        let params = Form::compound([sym("x")]);
        assert_eq!(
            lambda(params.clone(), vec![sym("x"), sym("y")]).unwrap(),
            "(lambda x:(\n  x,\n  y)[-1])"
        );
        let call = Form::compound([sym("print"), sym("x")]);
        assert_eq!(
            lambda(params, vec![call]).unwrap(),
            "(lambda x:\n  print(\n    x))"
        );
    }

    #[test]
    fn missing_parameter_list() {
        let err = Compiler::default().function(&[sym("lambda")]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ArityMismatch { .. }));
    }

    #[test]
    fn odd_pairs_are_incomplete() {
        let params = Form::compound([ctl(":"), sym("a")]);
        let err = lambda(params, vec![]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompletePair(_)));
        assert_eq!(err.context.innermost().unwrap().step, "parameters");
    }

    #[test]
    fn non_names_are_invalid() {
        let err = lambda(Form::compound([Form::from(1)]), vec![]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidParameter { .. }));
        let err = lambda(sym("x"), vec![]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidParameter { .. }));
    }
}
