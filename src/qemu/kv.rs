use super::arg::{Arg, ArgAcceptedValue, ArgError};
use super::validate::{validate_arg_key, validate_arg_str_value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueArgItem {
    pub key: String,
    pub value: String,
}

impl KeyValueArgItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Option whose value is a comma-joined `k=v` list, e.g.
/// `-drive file=/img.qcow2,format=qcow2,if=virtio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueArg {
    key: String,
    items: Vec<KeyValueArgItem>,
}

impl KeyValueArg {
    /// Validate `key` and every item, keeping a private copy of `items`.
    ///
    /// The copy is taken item by item as each one passes validation, so the
    /// caller's slice cannot influence the argument afterwards.
    pub fn new(key: impl Into<String>, items: &[KeyValueArgItem]) -> Result<Self, ArgError> {
        let key = key.into();

        validate_arg_key(&key, ArgAcceptedValue::KeyValue)
            .map_err(|e| e.context("validate arg key"))?;

        // `-machine ""` is not a valid QEMU argument.
        if items.is_empty() {
            return Err(ArgError::EmptyValue { key });
        }

        let mut owned = Vec::with_capacity(items.len());
        for item in items {
            let item = item.clone();

            if item.key.is_empty() {
                return Err(ArgError::EmptyKey);
            }

            // QEMU accepts bare keys, but we require a value for consistency.
            if item.value.is_empty() {
                return Err(ArgError::EmptyValue { key: item.key });
            }

            validate_arg_str_value(&item.key)
                .map_err(|e| e.context(format!("validate key '{}'", item.key)))?;
            validate_arg_str_value(&item.value)
                .map_err(|e| e.context(format!("validate map value '{}'", item.value)))?;

            owned.push(item);
        }

        Ok(Self { key, items: owned })
    }

    /// Like [`KeyValueArg::new`], but panics on invalid input.
    ///
    /// Only for keys and items that are compile-time constants.
    pub fn must_new(key: &'static str, items: &[KeyValueArgItem]) -> Self {
        Self::new(key, items)
            .unwrap_or_else(|e| panic!("invalid static key-value arg '{key}': {e}"))
    }

    pub fn items(&self) -> &[KeyValueArgItem] {
        &self.items
    }
}

impl Arg for KeyValueArg {
    fn string_key(&self) -> &str {
        &self.key
    }

    fn string_value(&self) -> String {
        self.items
            .iter()
            // Cannot happen after construction, but a blank key would be bad syntax.
            .filter(|item| !item.key.is_empty())
            .map(|item| {
                if item.value.is_empty() {
                    item.key.clone()
                } else {
                    format!("{}={}", item.key, item.value)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn value_type(&self) -> ArgAcceptedValue {
        ArgAcceptedValue::KeyValue
    }
}
