//! Shared model
//!
//! Model parts are addressed by dotted names (`Structure.Interface`); the
//! first segment names a root part, the rest walk its sub model parts.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::error::{ModelError, ModelResult};

/// Named model part with sub model parts and process data
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPart {
    full_name: String,
    sub_model_parts: IndexMap<String, ModelPart>,
    data: Map<String, JsonValue>,
}

impl ModelPart {
    fn new(full_name: String) -> Self {
        Self {
            full_name,
            sub_model_parts: IndexMap::new(),
            data: Map::new(),
        }
    }

    /// Last segment of the dotted name
    #[must_use]
    pub fn name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }

    /// Full dotted name
    #[inline]
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Process data entries
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Map<String, JsonValue> {
        &self.data
    }

    /// Check for a data entry
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Read a data entry
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    /// Write a data entry, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.data.insert(key.into(), value.into())
    }

    /// Push onto an array entry, creating it if absent
    ///
    /// # Errors
    /// Returns [`ModelError::NotAnArray`] if the entry holds another kind
    pub fn append(&mut self, key: &str, value: impl Into<JsonValue>) -> ModelResult<()> {
        let entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()));

        match entry {
            JsonValue::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(ModelError::NotAnArray {
                model_part: self.full_name.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Check for a direct sub model part
    #[inline]
    #[must_use]
    pub fn has_sub_model_part(&self, name: &str) -> bool {
        self.sub_model_parts.contains_key(name)
    }

    /// Direct sub model part names in creation order
    pub fn sub_model_part_names(&self) -> impl Iterator<Item = &str> {
        self.sub_model_parts.keys().map(String::as_str)
    }
}

/// Collection of root model parts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    parts: IndexMap<String, ModelPart>,
}

impl Model {
    /// Create an empty model
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model part, creating its root on demand
    ///
    /// # Errors
    /// Returns error if the name is invalid, the full path already exists, or
    /// an intermediate sub model part is missing
    pub fn create_model_part(&mut self, name: &str) -> ModelResult<&mut ModelPart> {
        let segments = split_name(name)?;
        let (root, rest) = segments
            .split_first()
            .ok_or_else(|| ModelError::InvalidName(name.to_string()))?;

        if rest.is_empty() && self.parts.contains_key(*root) {
            return Err(ModelError::DuplicateModelPart(name.to_string()));
        }
        // only the root is created on demand, never below a missing parent
        if rest.len() > 1 && !self.parts.contains_key(*root) {
            return Err(ModelError::MissingModelPart(name.to_string()));
        }

        let mut current = self
            .parts
            .entry((*root).to_string())
            .or_insert_with(|| ModelPart::new((*root).to_string()));

        let Some((leaf, middle)) = rest.split_last() else {
            return Ok(current);
        };

        for segment in middle {
            current = current
                .sub_model_parts
                .get_mut(*segment)
                .ok_or_else(|| ModelError::MissingModelPart(name.to_string()))?;
        }

        if current.sub_model_parts.contains_key(*leaf) {
            return Err(ModelError::DuplicateModelPart(name.to_string()));
        }

        let full_name = format!("{}.{}", current.full_name, leaf);
        Ok(current
            .sub_model_parts
            .entry((*leaf).to_string())
            .or_insert_with(|| ModelPart::new(full_name)))
    }

    /// Get a model part, creating it if absent
    ///
    /// # Errors
    /// Returns error if the name is invalid or an intermediate part is missing
    pub fn get_or_create_model_part(&mut self, name: &str) -> ModelResult<&mut ModelPart> {
        if self.has_model_part(name) {
            self.model_part_mut(name)
        } else {
            self.create_model_part(name)
        }
    }

    /// Check whether a model part exists
    #[must_use]
    pub fn has_model_part(&self, name: &str) -> bool {
        self.model_part(name).is_ok()
    }

    /// Get a model part by dotted name
    ///
    /// # Errors
    /// Returns [`ModelError::MissingModelPart`] if absent
    pub fn model_part(&self, name: &str) -> ModelResult<&ModelPart> {
        let missing = || ModelError::MissingModelPart(name.to_string());
        let segments = split_name(name)?;
        let (root, rest) = segments.split_first().ok_or_else(missing)?;

        let mut current = self.parts.get(*root).ok_or_else(missing)?;
        for segment in rest {
            current = current.sub_model_parts.get(*segment).ok_or_else(missing)?;
        }
        Ok(current)
    }

    /// Get a model part mutably by dotted name
    ///
    /// # Errors
    /// Returns [`ModelError::MissingModelPart`] if absent
    pub fn model_part_mut(&mut self, name: &str) -> ModelResult<&mut ModelPart> {
        let missing = || ModelError::MissingModelPart(name.to_string());
        let segments = split_name(name)?;
        let (root, rest) = segments.split_first().ok_or_else(missing)?;

        let mut current = self.parts.get_mut(*root).ok_or_else(missing)?;
        for segment in rest {
            current = current.sub_model_parts.get_mut(*segment).ok_or_else(missing)?;
        }
        Ok(current)
    }

    /// Delete a root model part or sub model part
    ///
    /// # Errors
    /// Returns [`ModelError::MissingModelPart`] if absent
    pub fn delete_model_part(&mut self, name: &str) -> ModelResult<ModelPart> {
        let missing = || ModelError::MissingModelPart(name.to_string());
        match name.rsplit_once('.') {
            None => self.parts.shift_remove(name).ok_or_else(missing),
            Some((parent, leaf)) => self
                .model_part_mut(parent)?
                .sub_model_parts
                .shift_remove(leaf)
                .ok_or_else(missing),
        }
    }

    /// Root model part names in creation order
    pub fn model_part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Number of root model parts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True when no model part exists
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

fn split_name(name: &str) -> ModelResult<Vec<&str>> {
    let segments: Vec<&str> = name.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ModelError::InvalidName(name.to_string()));
    }
    Ok(segments)
}

/// Handle to the one model shared by every stage of a run
///
/// Clones point at the same model. Stages execute strictly one after another
/// on one thread, so the model is shared without locking.
#[derive(Debug, Clone, Default)]
pub struct SharedModel {
    inner: Rc<RefCell<Model>>,
}

impl SharedModel {
    /// Wrap a model
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self {
            inner: Rc::new(RefCell::new(model)),
        }
    }

    /// Borrow the model
    ///
    /// # Panics
    /// Panics if the model is currently borrowed mutably
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Model> {
        self.inner.borrow()
    }

    /// Borrow the model mutably
    ///
    /// # Panics
    /// Panics if the model is currently borrowed
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Model> {
        self.inner.borrow_mut()
    }

    /// True when both handles refer to the same model
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &SharedModel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
