//! Literal encoding.
//!
//! A value is written as pretty-printed literal text when that text reads
//! back as an equal value. Anything else is serialized and emitted as a call
//! to the serializer's loader, with the value's repr as a comment.

use formcast_foundation::repr::bytes_repr;
use formcast_foundation::{Form, Result, Value, repr};

use crate::compiler::Compiler;
use crate::parser::literal_eval;

impl Compiler {
    /// Compiles a form as data.
    pub(crate) fn quoted(&self, form: &Form) -> Result<String> {
        self.literal(&form.to_value()).map_err(|e| e.within("quoted", form))
    }

    /// Encodes a value.
    pub(crate) fn literal(&self, value: &Value) -> Result<String> {
        let text = match value {
            Value::Ellipsis => return Ok("...".to_string()),
            Value::Int(_) | Value::Float(_) | Value::Complex(_) => format!("({})", repr(value)),
            Value::Tuple(_)
            | Value::List(_)
            | Value::Set(_)
            | Value::Dict(_)
            | Value::Str(_)
            | Value::Bytes(_) => self.printer.pformat(value),
            _ => repr(value),
        };
        match literal_eval(&text) {
            Ok(read_back) if read_back == *value => Ok(text),
            _ => self.serialized(value),
        }
    }

    fn serialized(&self, value: &Value) -> Result<String> {
        let serialized = self.serializer.serialize(value)?;
        tracing::debug!(
            type_name = value.type_name(),
            protocol = serialized.protocol,
            "value has no literal form; serializing"
        );
        let comment = repr(value).replace('\n', "\\n");
        Ok(format!(
            "{}(  # {comment}\n    {}\n)",
            self.serializer.loader(),
            bytes_repr(&serialized.data)
        ))
    }
}
