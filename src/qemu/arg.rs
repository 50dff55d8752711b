use std::fmt;

/// Kind of value a QEMU option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgAcceptedValue {
    /// Bare flag, e.g. `-nographic`.
    None,
    /// Single opaque value, e.g. `-m 512`.
    String,
    /// Comma-joined `k` / `k=v` list, e.g. `-netdev user,id=net0`.
    KeyValue,
}

impl fmt::Display for ArgAcceptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgAcceptedValue::None => "none",
            ArgAcceptedValue::String => "string",
            ArgAcceptedValue::KeyValue => "key-value",
        };
        f.write_str(s)
    }
}

/// A single QEMU command-line argument.
///
/// Implementors are immutable once constructed and must only be obtainable
/// through a validating constructor.
pub trait Arg: fmt::Debug + Send + Sync {
    /// Option name without the leading dash.
    fn string_key(&self) -> &str;

    /// Rendered value. Empty for flags.
    fn string_value(&self) -> String;

    fn value_type(&self) -> ArgAcceptedValue;
}

/// Argument validation failure. Always raised at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ArgError {
    #[error("empty key not allowed")]
    EmptyKey,

    #[error("empty value for key '{key}' is not allowed")]
    EmptyValue { key: String },

    #[error("disallowed character {ch:?} in '{value}'")]
    DisallowedChar { value: String, ch: char },

    #[error("unknown or unsafe arg key '{key}'")]
    UnknownKey { key: String },

    #[error("arg key '{key}' accepts {expected} values, not {have}")]
    WrongValueType {
        key: String,
        expected: ArgAcceptedValue,
        have: ArgAcceptedValue,
    },

    #[error("{what}: {inner}")]
    Context { what: String, inner: Box<ArgError> },
}

impl ArgError {
    pub(crate) fn context(self, what: impl Into<String>) -> Self {
        ArgError::Context {
            what: what.into(),
            inner: Box::new(self),
        }
    }

    /// Innermost error, with all `Context` layers peeled off.
    pub fn root(&self) -> &ArgError {
        match self {
            ArgError::Context { inner, .. } => inner.root(),
            other => other,
        }
    }
}
