//! Item factory
//!
//! Builds operation and modeler lists from settings items shaped as
//! `{ "name": <id>, "parameters": { ... } }`.

use stagecraft_model::{Modeler, Operation, SharedModel};
use stagecraft_settings::Settings;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::Registry;

const NAME: &str = "name";
const PARAMETERS: &str = "parameters";
const LEGACY_PARAMETERS: &str = "Parameters";

/// Check an item's shape without constructing it
///
/// # Errors
/// Returns [`RegistryError::IncompleteItem`] when `parameters` (or the legacy
/// `Parameters`) or a string `name` is missing
pub fn check_item(item: &Settings) -> RegistryResult<()> {
    if !(item.has(PARAMETERS) || item.has(LEGACY_PARAMETERS)) {
        return Err(incomplete(item, PARAMETERS));
    }
    if item.get_string(NAME).is_err() {
        return Err(incomplete(item, NAME));
    }
    Ok(())
}

fn incomplete(item: &Settings, missing: &'static str) -> RegistryError {
    RegistryError::IncompleteItem {
        item: item.to_string(),
        missing,
    }
}

/// Split an item into its identifier and parameters
fn item_parts(item: &Settings) -> RegistryResult<(String, Settings)> {
    let mut item = item.clone();
    item.migrate_key(LEGACY_PARAMETERS, PARAMETERS);
    let parameters = item
        .get(PARAMETERS)
        .map_err(|_| incomplete(&item, PARAMETERS))?;
    let name = item
        .get_string(NAME)
        .map_err(|_| incomplete(&item, NAME))?
        .to_string();
    Ok((name, parameters))
}

/// Constructs items through a registry against one shared model
pub struct ItemFactory<'r> {
    registry: &'r mut Registry,
    model: SharedModel,
}

impl<'r> ItemFactory<'r> {
    /// Factory bound to `registry` and `model`
    #[must_use]
    pub fn new(registry: &'r mut Registry, model: SharedModel) -> Self {
        Self { registry, model }
    }

    /// Construct one operation per item, in order
    ///
    /// # Errors
    /// Shape, resolution, kind and constructor failures
    pub fn construct_operations(
        &mut self,
        items: &[Settings],
    ) -> RegistryResult<Vec<Box<dyn Operation>>> {
        let mut operations = Vec::with_capacity(items.len());
        for item in items {
            let (name, parameters) = item_parts(item)?;
            let constructor = self.registry.resolve_operation(&name)?;
            let operation = constructor(&self.model, parameters)
                .map_err(|source| RegistryError::Construction { id: name.clone(), source })?;
            tracing::debug!(name = %name, "operation constructed");
            operations.push(operation);
        }
        Ok(operations)
    }

    /// Construct one modeler per item, in order
    ///
    /// # Errors
    /// Shape, resolution, kind and constructor failures
    pub fn construct_modelers(&mut self, items: &[Settings]) -> RegistryResult<Vec<Box<dyn Modeler>>> {
        let mut modelers = Vec::with_capacity(items.len());
        for item in items {
            let (name, parameters) = item_parts(item)?;
            let constructor = self.registry.resolve_modeler(&name)?;
            let modeler = constructor(&self.model, parameters)
                .map_err(|source| RegistryError::Construction { id: name.clone(), source })?;
            tracing::debug!(name = %name, "modeler constructed");
            modelers.push(modeler);
        }
        Ok(modelers)
    }
}
