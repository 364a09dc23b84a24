//! Settings node
//!
//! A settings node wraps a JSON tree. Nodes are mutated only by validation
//! (default injection), key migration, or explicit `add_*`/`remove` calls;
//! everything downstream treats the post-validation node as the source of
//! truth.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::{SettingsError, SettingsResult};
use crate::parse;
use crate::validation::{assign_defaults, ValueKind};

/// Hierarchical settings node
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    value: JsonValue,
}

impl Settings {
    /// Create an empty settings object
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: JsonValue::Object(Map::new()),
        }
    }

    /// Parse from a JSON string
    ///
    /// # Errors
    /// Returns error if the JSON is invalid or repeats a key
    pub fn from_json_str(json: &str) -> SettingsResult<Self> {
        parse::json(json).map(Self::from)
    }

    /// Parse from a YAML string
    ///
    /// # Errors
    /// Returns error if the YAML is invalid or repeats a key
    pub fn from_yaml_str(yaml: &str) -> SettingsResult<Self> {
        parse::yaml(yaml).map(Self::from)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match extension.as_str() {
            "json" => Self::from_json_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            other => Err(SettingsError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Raw JSON value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Consume into the raw JSON value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> JsonValue {
        self.value
    }

    /// Check whether this node is an object
    #[inline]
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    /// Check whether `key` is present
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.value.get(key).is_some()
    }

    /// Keys in declaration order (empty for non-object nodes)
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.value
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of entries (object keys or array items)
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.value {
            JsonValue::Object(map) => map.len(),
            JsonValue::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// True when [`Settings::len`] is zero
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the raw value stored under `key`
    ///
    /// # Errors
    /// Returns [`SettingsError::MissingKey`] if `key` is absent
    pub fn get_value(&self, key: &str) -> SettingsResult<&JsonValue> {
        self.value
            .get(key)
            .ok_or_else(|| SettingsError::MissingKey(key.to_string()))
    }

    /// Get the sub-node stored under `key`
    ///
    /// The returned node is a copy; edits do not reach this tree.
    ///
    /// # Errors
    /// Returns [`SettingsError::MissingKey`] if `key` is absent
    pub fn get(&self, key: &str) -> SettingsResult<Settings> {
        self.get_value(key).cloned().map(Self::from)
    }

    /// Get a value by JSON pointer (e.g. `/stages/fluid/analysis_stage`)
    #[inline]
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&JsonValue> {
        self.value.pointer(pointer)
    }

    /// Get a string value
    ///
    /// # Errors
    /// Returns error if absent or not a string
    pub fn get_string(&self, key: &str) -> SettingsResult<&str> {
        let value = self.get_value(key)?;
        value.as_str().ok_or_else(|| mismatch(key, ValueKind::String, value))
    }

    /// Get a boolean value
    ///
    /// # Errors
    /// Returns error if absent or not a bool
    pub fn get_bool(&self, key: &str) -> SettingsResult<bool> {
        let value = self.get_value(key)?;
        value.as_bool().ok_or_else(|| mismatch(key, ValueKind::Bool, value))
    }

    /// Get an integer value
    ///
    /// # Errors
    /// Returns error if absent or not an integer
    pub fn get_int(&self, key: &str) -> SettingsResult<i64> {
        let value = self.get_value(key)?;
        value.as_i64().ok_or_else(|| mismatch(key, ValueKind::Number, value))
    }

    /// Get a double value (integers are widened)
    ///
    /// # Errors
    /// Returns error if absent or not a number
    pub fn get_double(&self, key: &str) -> SettingsResult<f64> {
        let value = self.get_value(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, ValueKind::Number, value))
    }

    /// Get an array as a list of settings nodes
    ///
    /// # Errors
    /// Returns error if absent or not an array
    pub fn get_array(&self, key: &str) -> SettingsResult<Vec<Settings>> {
        let value = self.get_value(key)?;
        value
            .as_array()
            .map(|items| items.iter().cloned().map(Self::from).collect())
            .ok_or_else(|| mismatch(key, ValueKind::Array, value))
    }

    /// Deserialize the whole node into a typed struct
    ///
    /// # Errors
    /// Returns error if the node does not match `T`
    pub fn to_typed<T: DeserializeOwned>(&self) -> SettingsResult<T> {
        serde_json::from_value(self.value.clone()).map_err(SettingsError::InvalidJson)
    }

    /// Insert or overwrite `key`
    ///
    /// Non-object nodes are replaced by an object first.
    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        match &mut self.value {
            JsonValue::Object(map) => {
                map.insert(key.into(), value.into());
            }
            other => {
                let mut map = Map::new();
                map.insert(key.into(), value.into());
                *other = JsonValue::Object(map);
            }
        }
    }

    /// Insert or overwrite a string entry
    #[inline]
    pub fn add_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.add_value(key, JsonValue::String(value.into()));
    }

    /// Remove `key`, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.value.as_object_mut().and_then(|map| map.shift_remove(key))
    }

    /// Recursively add every missing key of `defaults`
    ///
    /// Keys already present keep their value, but must hold a value of the
    /// same [`ValueKind`] as the default (any kind if the default is `null`).
    /// Running it again on the result changes nothing. On error the node is
    /// left untouched.
    ///
    /// # Errors
    /// Returns [`SettingsError::Schema`] on a kind mismatch
    pub fn validate_and_assign_defaults(&mut self, defaults: &Settings) -> SettingsResult<()> {
        self.merge_defaults(defaults, false)
    }

    /// Like [`Settings::validate_and_assign_defaults`], also rejecting keys
    /// the defaults do not declare
    ///
    /// # Errors
    /// Returns [`SettingsError::Schema`] or [`SettingsError::UnexpectedKey`]
    pub fn validate_strict(&mut self, defaults: &Settings) -> SettingsResult<()> {
        self.merge_defaults(defaults, true)
    }

    fn merge_defaults(&mut self, defaults: &Settings, strict: bool) -> SettingsResult<()> {
        let mut merged = self.value.clone();
        assign_defaults(&mut merged, &defaults.value, "", strict)?;
        self.value = merged;
        Ok(())
    }

    /// Rename a deprecated key
    ///
    /// Returns `true` if `old` was present. When both keys exist the
    /// replacement wins and `old` is dropped.
    pub fn migrate_key(&mut self, old: &str, new: &str) -> bool {
        let Some(previous) = self.remove(old) else {
            return false;
        };

        if self.has(new) {
            tracing::warn!(old, new, "dropping deprecated key, replacement already present");
        } else {
            tracing::warn!(old, new, "migrating deprecated key");
            self.add_value(new, previous);
        }
        true
    }
}

fn mismatch(key: &str, expected: ValueKind, value: &JsonValue) -> SettingsError {
    SettingsError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: ValueKind::of(value),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl From<JsonValue> for Settings {
    fn from(value: JsonValue) -> Self {
        Self { value }
    }
}

impl From<Settings> for JsonValue {
    fn from(settings: Settings) -> Self {
        settings.value
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_report_missing_and_mismatch() {
        let settings = Settings::from(json!({"name": "fluid", "steps": 3}));

        assert_eq!(settings.get_string("name").unwrap(), "fluid");
        assert!(matches!(
            settings.get_string("absent"),
            Err(SettingsError::MissingKey(key)) if key == "absent"
        ));
        assert!(matches!(
            settings.get_bool("steps"),
            Err(SettingsError::TypeMismatch { expected: ValueKind::Bool, found: ValueKind::Number, .. })
        ));
    }

    #[test]
    fn get_double_widens_integers() {
        let settings = Settings::from(json!({"end_time": 2}));
        assert!((settings.get_double("end_time").unwrap() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn get_returns_detached_copy() {
        let settings = Settings::from(json!({"solver": {"echo_level": 0}}));
        let mut solver = settings.get("solver").unwrap();
        solver.add_value("echo_level", 3);

        assert_eq!(settings.pointer("/solver/echo_level"), Some(&json!(0)));
        assert_eq!(solver.get_int("echo_level").unwrap(), 3);
    }

    #[test]
    fn keys_follow_declaration_order() {
        let settings = Settings::from_json_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        assert_eq!(settings.keys(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut settings = Settings::from_json_str(r#"{"a": 1, "b": 2, "c": 3}"#).unwrap();
        assert_eq!(settings.remove("b"), Some(json!(2)));
        assert_eq!(settings.keys(), vec!["a", "c"]);
    }

    #[test]
    fn migrate_key_moves_value() {
        let mut settings = Settings::from(json!({"Parameters": {"x": 1}}));
        assert!(settings.migrate_key("Parameters", "parameters"));
        assert!(!settings.has("Parameters"));
        assert_eq!(settings.pointer("/parameters/x"), Some(&json!(1)));
    }

    #[test]
    fn migrate_key_prefers_replacement() {
        let mut settings = Settings::from(json!({"Parameters": {"x": 1}, "parameters": {"x": 2}}));
        assert!(settings.migrate_key("Parameters", "parameters"));
        assert_eq!(settings.pointer("/parameters/x"), Some(&json!(2)));
    }

    #[test]
    fn failed_validation_leaves_node_untouched() {
        let mut settings = Settings::from(json!({"b": "x"}));
        let defaults = Settings::from(json!({"a": 1, "b": 2}));
        assert!(settings.validate_and_assign_defaults(&defaults).is_err());
        assert_eq!(settings.value(), &json!({"b": "x"}));

        let mut strict = Settings::from(json!({"b": "x"}));
        assert!(strict.validate_strict(&defaults).is_err());
        assert!(!strict.has("a"));
    }

    #[test]
    fn migrate_key_absent_is_noop() {
        let mut settings = Settings::from(json!({"parameters": {}}));
        let before = settings.clone();
        assert!(!settings.migrate_key("Parameters", "parameters"));
        assert_eq!(settings, before);
    }

    #[test]
    fn add_string_overwrites() {
        let mut settings = Settings::new();
        settings.add_string("engine_version", "0.1.0-Debug");
        settings.add_string("engine_version", "0.1.0-Release");
        assert_eq!(settings.get_string("engine_version").unwrap(), "0.1.0-Release");
    }

    #[test]
    fn to_typed_reads_struct() {
        #[derive(serde::Deserialize)]
        struct ProblemData {
            start_time: f64,
            end_time: f64,
        }

        let settings = Settings::from(json!({"start_time": 0.0, "end_time": 1.5}));
        let data: ProblemData = settings.to_typed().unwrap();
        assert!((data.end_time - data.start_time - 1.5).abs() < f64::EPSILON);
    }
}
