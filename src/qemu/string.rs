use super::arg::{Arg, ArgAcceptedValue, ArgError};
use super::validate::{validate_arg_key, validate_arg_str_value};

/// Option with a single value, e.g. `-m 512` or `-serial stdio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringArg {
    key: String,
    value: String,
}

impl StringArg {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ArgError> {
        let key = key.into();
        let value = value.into();

        validate_arg_key(&key, ArgAcceptedValue::String)
            .map_err(|e| e.context("validate arg key"))?;

        if value.is_empty() {
            return Err(ArgError::EmptyValue { key });
        }

        validate_arg_str_value(&value)
            .map_err(|e| e.context(format!("validate value '{value}'")))?;

        Ok(Self { key, value })
    }

    /// Like [`StringArg::new`], but panics on invalid input.
    ///
    /// Only for keys and values that are compile-time constants.
    pub fn must_new(key: &'static str, value: &'static str) -> Self {
        Self::new(key, value)
            .unwrap_or_else(|e| panic!("invalid static string arg '{key}': {e}"))
    }
}

impl Arg for StringArg {
    fn string_key(&self) -> &str {
        &self.key
    }

    fn string_value(&self) -> String {
        self.value.clone()
    }

    fn value_type(&self) -> ArgAcceptedValue {
        ArgAcceptedValue::String
    }
}
