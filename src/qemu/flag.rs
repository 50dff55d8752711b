use super::arg::{Arg, ArgAcceptedValue, ArgError};
use super::validate::validate_arg_key;

/// Bare option without a value, e.g. `-nographic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagArg {
    key: String,
}

impl FlagArg {
    pub fn new(key: impl Into<String>) -> Result<Self, ArgError> {
        let key = key.into();

        validate_arg_key(&key, ArgAcceptedValue::None)
            .map_err(|e| e.context("validate arg key"))?;

        Ok(Self { key })
    }

    /// Like [`FlagArg::new`], but panics on invalid input.
    ///
    /// Only for keys that are compile-time constants.
    pub fn must_new(key: &'static str) -> Self {
        Self::new(key).unwrap_or_else(|e| panic!("invalid static flag arg '{key}': {e}"))
    }
}

impl Arg for FlagArg {
    fn string_key(&self) -> &str {
        &self.key
    }

    fn string_value(&self) -> String {
        // Flags have no value.
        String::new()
    }

    fn value_type(&self) -> ArgAcceptedValue {
        ArgAcceptedValue::None
    }
}
