//! Module definitions
//!
//! A [`ModuleDef`] replaces dynamic import. It names a set of classes, may
//! carry a module-level `create` fallback, and may declare registrations
//! applied to the registry the first time the module is loaded.

use indexmap::IndexMap;

use crate::prototype::Prototype;
use crate::registry::RegistryEntry;

/// Explicitly registered module
#[derive(Debug, Clone)]
pub struct ModuleDef {
    name: String,
    classes: IndexMap<String, Prototype>,
    create: Option<Prototype>,
    registrations: Vec<(String, RegistryEntry)>,
}

impl ModuleDef {
    /// Empty module named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: IndexMap::new(),
            create: None,
            registrations: Vec::new(),
        }
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>, prototype: Prototype) -> Self {
        self.classes.insert(class_name.into(), prototype);
        self
    }

    /// Set the module-level `create` fallback
    #[must_use]
    pub fn with_create(mut self, prototype: Prototype) -> Self {
        self.create = Some(prototype);
        self
    }

    /// Declare a registry entry applied on first load
    #[must_use]
    pub fn registers(mut self, id: impl Into<String>, entry: RegistryEntry) -> Self {
        self.registrations.push((id.into(), entry));
        self
    }

    /// Add a class to an existing definition
    pub fn insert_class(&mut self, class_name: impl Into<String>, prototype: Prototype) {
        self.classes.insert(class_name.into(), prototype);
    }

    /// Module name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a class
    #[inline]
    #[must_use]
    pub fn class(&self, class_name: &str) -> Option<&Prototype> {
        self.classes.get(class_name)
    }

    /// Class names in definition order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Module-level `create` fallback
    #[inline]
    #[must_use]
    pub fn create(&self) -> Option<&Prototype> {
        self.create.as_ref()
    }

    pub(crate) fn registrations(&self) -> &[(String, RegistryEntry)] {
        &self.registrations
    }
}
