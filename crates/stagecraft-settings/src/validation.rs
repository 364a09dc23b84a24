//! Validation of settings trees against defaults

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::{SettingsError, SettingsResult};
use crate::parse::join_path;

/// Kind of a settings value, as compared by validation
///
/// Integers and doubles share the [`ValueKind::Number`] class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Integer or double
    Number,
    /// String
    String,
    /// Array of values
    Array,
    /// Nested settings node
    Object,
}

impl ValueKind {
    /// Classify a JSON value
    #[inline]
    #[must_use]
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(_) => Self::Bool,
            JsonValue::Number(_) => Self::Number,
            JsonValue::String(_) => Self::String,
            JsonValue::Array(_) => Self::Array,
            JsonValue::Object(_) => Self::Object,
        }
    }

    /// Lowercase name used in error messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge `defaults` into `value`, recursing through objects
///
/// A `null` default accepts any value. With `strict`, keys of `value`
/// missing from `defaults` are rejected.
pub(crate) fn assign_defaults(
    value: &mut JsonValue,
    defaults: &JsonValue,
    path: &str,
    strict: bool,
) -> SettingsResult<()> {
    if !(value.is_object() && defaults.is_object()) {
        return check_kind(value, defaults, path);
    }
    let (Some(target), Some(source)) = (value.as_object_mut(), defaults.as_object()) else {
        return Ok(());
    };

    if strict {
        if let Some(unexpected) = target.keys().find(|key| !source.contains_key(*key)) {
            return Err(SettingsError::UnexpectedKey {
                path: join_path(path, unexpected),
            });
        }
    }

    for (key, default) in source {
        let key_path = join_path(path, key);
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default.clone());
            }
            Some(existing) => {
                check_kind(existing, default, &key_path)?;
                if existing.is_object() && default.is_object() {
                    assign_defaults(existing, default, &key_path, strict)?;
                }
            }
        }
    }

    Ok(())
}

fn check_kind(value: &JsonValue, default: &JsonValue, path: &str) -> SettingsResult<()> {
    let expected = ValueKind::of(default);
    let found = ValueKind::of(value);
    if expected == ValueKind::Null || expected == found {
        Ok(())
    } else {
        Err(SettingsError::Schema {
            path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
            expected,
            found,
        })
    }
}
