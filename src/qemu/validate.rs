//! The one validation policy shared by every argument kind.
//!
//! Rendered arguments go to QEMU verbatim, so both keys and values are held to
//! a conservative allowlist: ASCII alphanumerics plus `_ - . : / @ +`. That
//! rules out `,` and `=` (QEMU's own option syntax), whitespace, quotes,
//! backslashes and anything a shell wrapper could interpret.

use super::arg::{ArgAcceptedValue, ArgError};

/// QEMU options we are willing to emit, with the value kind each one takes.
const SAFE_ARGS: &[(&str, ArgAcceptedValue)] = &[
    ("accel", ArgAcceptedValue::String),
    ("bios", ArgAcceptedValue::String),
    ("boot", ArgAcceptedValue::KeyValue),
    ("chardev", ArgAcceptedValue::KeyValue),
    ("cpu", ArgAcceptedValue::String),
    ("device", ArgAcceptedValue::KeyValue),
    ("display", ArgAcceptedValue::String),
    ("drive", ArgAcceptedValue::KeyValue),
    ("enable-kvm", ArgAcceptedValue::None),
    ("m", ArgAcceptedValue::String),
    ("machine", ArgAcceptedValue::KeyValue),
    ("monitor", ArgAcceptedValue::String),
    ("netdev", ArgAcceptedValue::KeyValue),
    ("no-reboot", ArgAcceptedValue::None),
    ("nodefaults", ArgAcceptedValue::None),
    ("nographic", ArgAcceptedValue::None),
    ("serial", ArgAcceptedValue::String),
    ("smp", ArgAcceptedValue::String),
    ("snapshot", ArgAcceptedValue::None),
];

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/' | '@' | '+')
}

/// Check a candidate string against the character allowlist.
///
/// Empty strings pass here; callers decide whether emptiness is acceptable.
pub fn validate_arg_str_value(s: &str) -> Result<(), ArgError> {
    match s.chars().find(|c| !is_allowed_char(*c)) {
        Some(ch) => Err(ArgError::DisallowedChar {
            value: s.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

/// Accepted value kind for a known option key.
pub fn accepted_value(key: &str) -> Option<ArgAcceptedValue> {
    SAFE_ARGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, value_type)| *value_type)
}

/// Validate an option key for an argument of kind `value_type`.
pub fn validate_arg_key(key: &str, value_type: ArgAcceptedValue) -> Result<(), ArgError> {
    if key.is_empty() {
        return Err(ArgError::EmptyKey);
    }

    validate_arg_str_value(key)?;

    let expected = accepted_value(key).ok_or_else(|| ArgError::UnknownKey {
        key: key.to_string(),
    })?;

    if expected != value_type {
        return Err(ArgError::WrongValueType {
            key: key.to_string(),
            expected,
            have: value_type,
        });
    }

    Ok(())
}
