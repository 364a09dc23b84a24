//! Duplicate-rejecting document parsing
//!
//! `serde_json::Value` silently keeps the last of two equal keys. Settings
//! documents must not, since stage names are object keys.

use std::cell::RefCell;
use std::fmt;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{SettingsError, SettingsResult};

/// Parse a JSON document, rejecting repeated keys
pub(crate) fn json(text: &str) -> SettingsResult<JsonValue> {
    let duplicate = RefCell::new(None);
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let parsed = StrictSeed::root(&duplicate).deserialize(&mut deserializer);
    let value = parsed.map_err(|e| duplicate_or(&duplicate, SettingsError::InvalidJson(e)))?;
    deserializer.end()?;
    Ok(value)
}

/// Parse a YAML document, rejecting repeated keys
pub(crate) fn yaml(text: &str) -> SettingsResult<JsonValue> {
    let duplicate = RefCell::new(None);
    StrictSeed::root(&duplicate)
        .deserialize(serde_yaml::Deserializer::from_str(text))
        .map_err(|e| duplicate_or(&duplicate, SettingsError::InvalidYaml(e)))
}

fn duplicate_or(duplicate: &RefCell<Option<String>>, fallback: SettingsError) -> SettingsError {
    match duplicate.borrow_mut().take() {
        Some(path) => SettingsError::DuplicateKey { path },
        None => fallback,
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

struct StrictSeed<'a> {
    path: String,
    duplicate: &'a RefCell<Option<String>>,
}

impl<'a> StrictSeed<'a> {
    fn root(duplicate: &'a RefCell<Option<String>>) -> Self {
        Self {
            path: String::new(),
            duplicate,
        }
    }

    fn child(&self, path: String) -> Self {
        Self {
            path,
            duplicate: self.duplicate,
        }
    }
}

impl<'de> DeserializeSeed<'de> for StrictSeed<'_> {
    type Value = JsonValue;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for StrictSeed<'_> {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a settings value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<JsonValue, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<JsonValue, E> {
        Ok(JsonValue::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<JsonValue, E> {
        Ok(JsonValue::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JsonValue, E> {
        Number::from_f64(v)
            .map(JsonValue::Number)
            .ok_or_else(|| E::custom(format!("non-finite number at '{}'", self.path)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<JsonValue, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        self.deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<JsonValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(self.child(format!("{}[{}]", self.path, items.len())))? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<JsonValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            let path = join_path(&self.path, &key);
            if object.contains_key(&key) {
                *self.duplicate.borrow_mut() = Some(path.clone());
                return Err(de::Error::custom(format!("duplicate key '{path}'")));
            }
            let value = map.next_value_seed(self.child(path))?;
            object.insert(key, value);
        }
        Ok(JsonValue::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_keeps_declaration_order() {
        let value = json(r#"{"b": 1, "a": {"z": true, "y": null}}"#).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(value["a"]["y"], JsonValue::Null);
    }

    #[test]
    fn json_duplicate_nested_key_reports_path() {
        let err = json(r#"{"stages": {"one": {}, "one": {}}}"#).unwrap_err();
        match err {
            SettingsError::DuplicateKey { path } => assert_eq!(path, "stages.one"),
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn json_trailing_garbage_rejected() {
        assert!(matches!(json("{} {}"), Err(SettingsError::InvalidJson(_))));
    }

    #[test]
    fn yaml_matches_json() {
        let from_yaml = yaml("name: fluid\nsteps: [1, 2.5]\nnested:\n  flag: true\n").unwrap();
        assert_eq!(from_yaml, json!({"name": "fluid", "steps": [1, 2.5], "nested": {"flag": true}}));
    }

    #[test]
    fn yaml_duplicate_key_rejected() {
        let err = yaml("a: 1\na: 2\n").unwrap_err();
        assert!(err.is_schema_error() || matches!(err, SettingsError::InvalidYaml(_)));
    }
}
