//! Built-in operations, modelers and stages
//!
//! Registered under the `stagecraft` module. Operations and modelers are
//! available immediately after [`register_builtins`]; stage entries are
//! registered lazily, the first time a `Stages.stagecraft.*` locator is
//! resolved.

use serde_json::{json, Map, Value as JsonValue};
use stagecraft_model::{Modeler, Operation, SharedModel};
use stagecraft_registry::{ModuleDef, Prototype, Registry, RegistryEntry, RegistryResult};
use stagecraft_settings::Settings;

use crate::kernel_stage::{kernel_stage_prototype, DryRunKernel};

/// Name of the built-in module
pub const MODULE: &str = "stagecraft";
/// Logs a message
pub const LOG_MESSAGE: &str = "Operations.stagecraft.LogMessage";
/// Writes values into a model part's data
pub const SET_MODEL_PART_DATA: &str = "Operations.stagecraft.SetModelPartData";
/// Creates model parts
pub const CREATE_MODEL_PARTS: &str = "Modelers.stagecraft.CreateModelParts";
/// Kernel stage over [`DryRunKernel`]
pub const DRY_RUN_STAGE: &str = "Stages.stagecraft.DryRunStage";

/// Register the built-ins
///
/// # Errors
/// Returns [`stagecraft_registry::RegistryError::Duplicate`] if any
/// identifier is already taken
pub fn register_builtins(registry: &mut Registry) -> RegistryResult<()> {
    registry.register_prototype(LOG_MESSAGE, log_message())?;
    registry.register_prototype(SET_MODEL_PART_DATA, set_model_part_data())?;
    registry.register_prototype(CREATE_MODEL_PARTS, create_model_parts())?;

    registry.add_module(
        ModuleDef::new(MODULE)
            .with_class("LogMessage", log_message())
            .with_class("SetModelPartData", set_model_part_data())
            .with_class("CreateModelParts", create_model_parts())
            .with_class("DryRunStage", dry_run_stage())
            .registers(DRY_RUN_STAGE, RegistryEntry::module(MODULE, "DryRunStage")),
    );
    Ok(())
}

/// Prototype of the dry-run stage
#[must_use]
pub fn dry_run_stage() -> Prototype {
    kernel_stage_prototype(|settings| Ok(Box::new(DryRunKernel::from_settings(settings))))
}

fn validated(mut settings: Settings, defaults: JsonValue) -> anyhow::Result<Settings> {
    settings.validate_strict(&Settings::from(defaults))?;
    Ok(settings)
}

fn log_message() -> Prototype {
    Prototype::operation(|_, settings| {
        let settings = validated(settings, json!({ "message": "" }))?;
        Ok(Box::new(LogMessage {
            message: settings.get_string("message")?.to_string(),
        }))
    })
}

fn set_model_part_data() -> Prototype {
    Prototype::operation(|model, settings| {
        let settings = validated(settings, json!({ "model_part_name": "", "values": null }))?;
        let model_part_name = settings.get_string("model_part_name")?.to_string();
        if model_part_name.is_empty() {
            anyhow::bail!("'model_part_name' must not be empty");
        }
        let values = match settings.get_value("values")? {
            JsonValue::Object(values) => values.clone(),
            JsonValue::Null => Map::new(),
            other => anyhow::bail!("'values' must be an object, got {other}"),
        };
        Ok(Box::new(SetModelPartData {
            model: model.clone(),
            model_part_name,
            values,
        }))
    })
}

fn create_model_parts() -> Prototype {
    Prototype::modeler(|model, settings| {
        let settings = validated(settings, json!({ "model_part_names": [] }))?;
        let names = settings
            .get_array("model_part_names")?
            .into_iter()
            .map(|name| match name.value() {
                JsonValue::String(name) => Ok(name.clone()),
                other => Err(anyhow::anyhow!("model part names must be strings, got {other}")),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Box::new(CreateModelParts {
            model: model.clone(),
            names,
        }))
    })
}

struct LogMessage {
    message: String,
}

impl Operation for LogMessage {
    fn execute(&mut self) -> anyhow::Result<()> {
        tracing::info!(message = %self.message, "log message");
        Ok(())
    }
}

struct SetModelPartData {
    model: SharedModel,
    model_part_name: String,
    values: Map<String, JsonValue>,
}

impl Operation for SetModelPartData {
    fn execute(&mut self) -> anyhow::Result<()> {
        let mut model = self.model.borrow_mut();
        let part = model.get_or_create_model_part(&self.model_part_name)?;
        for (key, value) in &self.values {
            part.set(key.clone(), value.clone());
        }
        tracing::debug!(model_part = %self.model_part_name, count = self.values.len(), "model part data set");
        Ok(())
    }
}

struct CreateModelParts {
    model: SharedModel,
    names: Vec<String>,
}

impl Modeler for CreateModelParts {
    fn setup_geometry_model(&mut self) -> anyhow::Result<()> {
        for (index, name) in self.names.iter().enumerate() {
            if name.is_empty() || name.split('.').any(str::is_empty) {
                anyhow::bail!("invalid model part name '{name}'");
            }
            if self.names[..index].contains(name) {
                anyhow::bail!("model part '{name}' listed twice");
            }
        }
        Ok(())
    }

    fn setup_model_part(&mut self) -> anyhow::Result<()> {
        let mut model = self.model.borrow_mut();
        for name in &self.names {
            model.get_or_create_model_part(name)?;
        }
        Ok(())
    }
}
