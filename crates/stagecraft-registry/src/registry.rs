//! Construction registry
//!
//! Provides [`Registry`], the single lookup point for stage, modeler and
//! operation prototypes.
//!
//! # Resolution
//!
//! 1. Exact entry holding a [`Prototype`] or a factory
//! 2. Exact entry naming a module (and optionally a class)
//! 3. Convention: `<module path>.<Class>` against a registered module
//!
//! Stage locators follow their own rules, see [`Registry::resolve_stage`].

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{RegistryError, RegistryResult};
use crate::locator::{camel_case_class_name, last_segment, stage_locator_module, STAGE_PREFIX};
use crate::module::ModuleDef;
use crate::prototype::{
    FactoryFn, ModelerConstructor, OperationConstructor, Prototype, StageConstructor,
};

/// Value stored under a registry identifier
#[derive(Clone)]
pub enum RegistryEntry {
    /// Ready prototype, resolved as-is
    Prototype(Prototype),
    /// Class inside a registered module
    Module {
        /// Module name; the main module when absent
        module: Option<String>,
        /// Explicit class name
        class_name: Option<String>,
    },
    /// Function producing the prototype on each resolution
    Factory(FactoryFn),
}

impl RegistryEntry {
    /// Entry pointing at `class_name` inside `module`
    #[must_use]
    pub fn module(module: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::Module {
            module: Some(module.into()),
            class_name: Some(class_name.into()),
        }
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prototype(prototype) => f.debug_tuple("Prototype").field(prototype).finish(),
            Self::Module { module, class_name } => f
                .debug_struct("Module")
                .field("module", module)
                .field("class_name", class_name)
                .finish(),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Registry of constructible items
#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, RegistryEntry>,
    modules: IndexMap<String, ModuleDef>,
    loaded: HashSet<String>,
}

impl Registry {
    /// Name of the module holding application-level classes
    pub const MAIN_MODULE: &'static str = "__main__";

    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry
    ///
    /// # Errors
    /// Returns [`RegistryError::Duplicate`] if `id` is already registered
    pub fn register(&mut self, id: impl Into<String>, entry: RegistryEntry) -> RegistryResult<()> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        tracing::debug!(id = %id, entry = ?entry, "registered");
        self.entries.insert(id, entry);
        Ok(())
    }

    /// Register a ready prototype
    ///
    /// # Errors
    /// Returns [`RegistryError::Duplicate`] if `id` is already registered
    pub fn register_prototype(
        &mut self,
        id: impl Into<String>,
        prototype: Prototype,
    ) -> RegistryResult<()> {
        self.register(id, RegistryEntry::Prototype(prototype))
    }

    /// Register a module/class locator
    ///
    /// # Errors
    /// Returns [`RegistryError::Duplicate`] if `id` is already registered
    pub fn register_module_entry(
        &mut self,
        id: impl Into<String>,
        module: Option<&str>,
        class_name: Option<&str>,
    ) -> RegistryResult<()> {
        self.register(
            id,
            RegistryEntry::Module {
                module: module.map(str::to_string),
                class_name: class_name.map(str::to_string),
            },
        )
    }

    /// Register a prototype factory
    ///
    /// # Errors
    /// Returns [`RegistryError::Duplicate`] if `id` is already registered
    pub fn register_factory<F>(&mut self, id: impl Into<String>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Prototype + 'static,
    {
        self.register(id, RegistryEntry::Factory(std::rc::Rc::new(factory)))
    }

    /// Add a module definition, replacing any previous one of the same name
    pub fn add_module(&mut self, module: ModuleDef) {
        let name = module.name().to_string();
        tracing::debug!(module = %name, "module added");
        self.loaded.remove(&name);
        self.modules.insert(name, module);
    }

    /// Add a class to the main module, creating the module on demand
    pub fn register_main_class(&mut self, class_name: impl Into<String>, prototype: Prototype) {
        self.modules
            .entry(Self::MAIN_MODULE.to_string())
            .or_insert_with(|| ModuleDef::new(Self::MAIN_MODULE))
            .insert_class(class_name, prototype);
    }

    /// Check whether `id` has an exact entry
    #[inline]
    #[must_use]
    pub fn has_item(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Check whether a module of that name was added
    #[inline]
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entry stored under `id`
    #[inline]
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// Get number of registered entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a module, applying its declared registrations the first time
    ///
    /// Registrations are all-or-nothing: on a collision nothing is
    /// registered and the module stays unloaded.
    ///
    /// # Errors
    /// - [`RegistryError::ModuleNotFound`] if the module was never added
    /// - [`RegistryError::Duplicate`] if a declared registration collides
    pub fn load_module(&mut self, name: &str) -> RegistryResult<&ModuleDef> {
        let registrations = self
            .modules
            .get(name)
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?
            .registrations()
            .to_vec();

        if !self.loaded.contains(name) {
            let mut seen = HashSet::new();
            if let Some((id, _)) = registrations
                .iter()
                .find(|(id, _)| self.entries.contains_key(id) || !seen.insert(id.as_str()))
            {
                return Err(RegistryError::Duplicate(id.clone()));
            }
            tracing::debug!(module = %name, count = registrations.len(), "module loaded");
            for (id, entry) in registrations {
                self.register(id, entry)?;
            }
            self.loaded.insert(name.to_string());
        }

        self.modules
            .get(name)
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))
    }

    /// Resolve an identifier to a prototype
    ///
    /// Pre-registered prototypes resolve to the same allocation every time.
    ///
    /// # Errors
    /// Fails when neither an entry nor the naming convention yields a class
    pub fn resolve(&mut self, id: &str) -> RegistryResult<Prototype> {
        match self.entries.get(id).cloned() {
            Some(RegistryEntry::Prototype(prototype)) => Ok(prototype),
            Some(RegistryEntry::Factory(factory)) => Ok(factory()),
            Some(RegistryEntry::Module { module, class_name }) => {
                let module = module.as_deref().unwrap_or(Self::MAIN_MODULE);
                let class = last_segment(id);
                let loaded = self.load_module(module)?;
                if let Some(prototype) = loaded.class(class) {
                    return Ok(prototype.clone());
                }
                match class_name {
                    Some(class_name) => {
                        tracing::warn!(
                            id,
                            module,
                            class = %class_name,
                            "class not named by identifier, using registered class name"
                        );
                        loaded
                            .class(&class_name)
                            .cloned()
                            .ok_or_else(|| RegistryError::ClassNotFound {
                                module: module.to_string(),
                                class: class_name,
                            })
                    }
                    None => Err(RegistryError::ClassNotFound {
                        module: module.to_string(),
                        class: class.to_string(),
                    }),
                }
            }
            None => self.resolve_by_convention(id),
        }
    }

    fn resolve_by_convention(&mut self, id: &str) -> RegistryResult<Prototype> {
        let Some((module, class)) = id.rsplit_once('.') else {
            return Err(RegistryError::Unregistered(id.to_string()));
        };
        if !self.has_module(module) {
            return Err(RegistryError::Unregistered(id.to_string()));
        }
        self.load_module(module)?
            .class(class)
            .cloned()
            .ok_or_else(|| RegistryError::ClassNotFound {
                module: module.to_string(),
                class: class.to_string(),
            })
    }

    /// Resolve an identifier expected to construct an operation
    ///
    /// # Errors
    /// Resolution failures and [`RegistryError::KindMismatch`]
    pub fn resolve_operation(&mut self, id: &str) -> RegistryResult<OperationConstructor> {
        self.resolve(id)?.into_operation(id)
    }

    /// Resolve an identifier expected to construct a modeler
    ///
    /// # Errors
    /// Resolution failures and [`RegistryError::KindMismatch`]
    pub fn resolve_modeler(&mut self, id: &str) -> RegistryResult<ModelerConstructor> {
        self.resolve(id)?.into_modeler(id)
    }

    /// Resolve a stage locator
    ///
    /// - `Stages.<module>.<Class>`: the module is loaded first (if added) so
    ///   its registrations exist, then the locator must have an entry. A
    ///   module entry resolves its class name, falling back to the module's
    ///   `create`.
    /// - any other string is a module path; the class name is derived with
    ///   [`camel_case_class_name`], again with the `create` fallback.
    ///
    /// # Errors
    /// - [`RegistryError::InvalidLocator`] for `Stages.All.*` or a missing
    ///   module segment
    /// - resolution failures and [`RegistryError::KindMismatch`]
    pub fn resolve_stage(&mut self, locator: &str) -> RegistryResult<StageConstructor> {
        if !locator.starts_with(STAGE_PREFIX) {
            tracing::warn!(
                locator,
                "analysis stage is not registered, assuming module path and class name"
            );
            let class = camel_case_class_name(locator);
            return self.class_or_create(locator, &class)?.into_stage(locator);
        }

        let module = stage_locator_module(locator)?;
        if self.has_module(&module) {
            self.load_module(&module)?;
        } else {
            tracing::debug!(module = %module, "stage module not added, relying on registry entry");
        }

        let prototype = match self.entries.get(locator).cloned() {
            None => return Err(RegistryError::Unregistered(locator.to_string())),
            Some(RegistryEntry::Prototype(prototype)) => prototype,
            Some(RegistryEntry::Factory(factory)) => factory(),
            Some(RegistryEntry::Module { module, class_name }) => {
                let module = module.unwrap_or_else(|| Self::MAIN_MODULE.to_string());
                let class = class_name.unwrap_or_else(|| last_segment(locator).to_string());
                self.class_or_create(&module, &class)?
            }
        };
        prototype.into_stage(locator)
    }

    fn class_or_create(&mut self, module: &str, class: &str) -> RegistryResult<Prototype> {
        let loaded = self.load_module(module)?;
        if let Some(prototype) = loaded.class(class) {
            return Ok(prototype.clone());
        }
        if let Some(create) = loaded.create() {
            tracing::debug!(module, class, "class not found, using module create");
            return Ok(create.clone());
        }
        Err(RegistryError::ClassNotFound {
            module: module.to_string(),
            class: class.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecraft_model::{Operation, SharedModel};

    struct Noop;

    impl Operation for Noop {
        fn execute(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn noop() -> Prototype {
        Prototype::operation(|_, _| Ok(Box::new(Noop)))
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry.register_prototype("Operations.a.Noop", noop()).unwrap();
        let err = registry.register_prototype("Operations.a.Noop", noop()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(id) if id == "Operations.a.Noop"));
    }

    #[test]
    fn prototype_is_identity_stable() {
        let mut registry = Registry::new();
        let original = noop();
        registry.register_prototype("Operations.a.Noop", original.clone()).unwrap();

        let first = registry.resolve("Operations.a.Noop").unwrap();
        let second = registry.resolve("Operations.a.Noop").unwrap();
        assert!(first.ptr_eq(&original));
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn unregistered_without_convention_fails() {
        let mut registry = Registry::new();
        let err = registry.resolve("Nothing").unwrap_err();
        assert!(matches!(err, RegistryError::Unregistered(_)));
        let err = registry.resolve("missing.module.Class").unwrap_err();
        assert!(err.is_unresolved());
    }

    #[test]
    fn convention_uses_module_path_and_class() {
        let mut registry = Registry::new();
        registry.add_module(ModuleDef::new("app.ops").with_class("Noop", noop()));
        let prototype = registry.resolve("app.ops.Noop").unwrap();
        let op = prototype
            .into_operation("app.ops.Noop")
            .unwrap()(&SharedModel::default(), Default::default());
        assert!(op.is_ok());
    }

    #[test]
    fn module_entry_falls_back_to_class_name() {
        let mut registry = Registry::new();
        registry.add_module(ModuleDef::new("app.ops").with_class("Noop", noop()));
        registry
            .register_module_entry("Operations.app.ops.Renamed", Some("app.ops"), Some("Noop"))
            .unwrap();
        assert!(registry.resolve("Operations.app.ops.Renamed").is_ok());

        registry
            .register_module_entry("Operations.app.ops.Gone", Some("app.ops"), None)
            .unwrap();
        let err = registry.resolve("Operations.app.ops.Gone").unwrap_err();
        assert!(matches!(err, RegistryError::ClassNotFound { class, .. } if class == "Gone"));
    }

    #[test]
    fn load_module_registers_once() {
        let mut registry = Registry::new();
        registry.add_module(
            ModuleDef::new("app")
                .registers("Operations.app.Noop", RegistryEntry::Prototype(noop())),
        );
        assert!(!registry.has_item("Operations.app.Noop"));
        registry.load_module("app").unwrap();
        registry.load_module("app").unwrap();
        assert!(registry.has_item("Operations.app.Noop"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut registry = Registry::new();
        registry.register_prototype("Operations.a.Noop", noop()).unwrap();
        let err = registry.resolve_modeler("Operations.a.Noop").err().unwrap();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));
    }
}
