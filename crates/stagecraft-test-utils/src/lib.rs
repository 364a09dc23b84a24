//! Testing utilities for the stagecraft workspace
//!
//! Recording fakes for stages, modelers and operations, a shared event
//! journal, and a registry fixture wiring them under `*.test.*` identifiers.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use stagecraft_model::{AnalysisStage, Modeler, Operation, SharedModel};
use stagecraft_registry::{ModuleDef, Prototype, Registry, RegistryEntry};
use stagecraft_settings::Settings;

pub const RECORD_OPERATION: &str = "Operations.test.Record";
pub const MODEL_LOG_OPERATION: &str = "Operations.test.AppendToModelLog";
pub const FAILING_OPERATION: &str = "Operations.test.Fail";
pub const RECORD_MODELER: &str = "Modelers.test.Record";
pub const RECORDING_STAGE: &str = "Stages.test.RecordingStage";

/// Model part holding the log written by [`MODEL_LOG_OPERATION`]
pub const LOG_PART: &str = "Log";
const LOG_KEY: &str = "entries";

/// Ordered record of events, shared by every fake of one test
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Index of the first occurrence of `event`
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.borrow().iter().position(|e| e == event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

fn label(settings: &Settings) -> String {
    settings.get_string("label").unwrap_or("unnamed").to_string()
}

pub struct RecordingOperation {
    journal: Journal,
    label: String,
}

impl Operation for RecordingOperation {
    fn execute(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:execute", self.label));
        Ok(())
    }
}

/// Appends `label` to the `entries` array of the [`LOG_PART`] model part
pub struct ModelLogOperation {
    model: SharedModel,
    label: String,
}

impl Operation for ModelLogOperation {
    fn execute(&mut self) -> anyhow::Result<()> {
        let mut model = self.model.borrow_mut();
        model
            .get_or_create_model_part(LOG_PART)?
            .append(LOG_KEY, self.label.clone())?;
        Ok(())
    }
}

pub struct FailingOperation {
    journal: Journal,
    label: String,
}

impl Operation for FailingOperation {
    fn execute(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:fail", self.label));
        anyhow::bail!("operation '{}' failed", self.label)
    }
}

pub struct RecordingModeler {
    journal: Journal,
    label: String,
}

impl Modeler for RecordingModeler {
    fn setup_geometry_model(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:setup_geometry_model", self.label));
        Ok(())
    }

    fn prepare_geometry_model(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:prepare_geometry_model", self.label));
        Ok(())
    }

    fn setup_model_part(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:setup_model_part", self.label));
        Ok(())
    }
}

/// Stage recording each lifecycle call as `<stage name>:<call>`
///
/// The stage name is the `label` key of its settings. Setting `fail_in` to
/// `"initialize"`, `"run_solution_loop"` or `"finalize"` makes that call fail.
pub struct RecordingStage {
    journal: Journal,
    name: String,
    fail_in: Option<String>,
}

impl RecordingStage {
    fn call(&self, call: &str) -> anyhow::Result<()> {
        self.journal.record(format!("{}:{call}", self.name));
        if self.fail_in.as_deref() == Some(call) {
            anyhow::bail!("stage '{}' failed in {call}", self.name);
        }
        Ok(())
    }
}

impl AnalysisStage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.check()?;
        self.call("initialize")
    }

    fn check(&self) -> anyhow::Result<()> {
        self.journal.record(format!("{}:check", self.name));
        Ok(())
    }

    fn run_solution_loop(&mut self) -> anyhow::Result<()> {
        self.call("run_solution_loop")
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.call("finalize")
    }
}

pub fn recording_operation(journal: &Journal) -> Prototype {
    let journal = journal.clone();
    Prototype::operation(move |_, settings| {
        Ok(Box::new(RecordingOperation {
            journal: journal.clone(),
            label: label(&settings),
        }))
    })
}

pub fn model_log_operation() -> Prototype {
    Prototype::operation(|model, settings| {
        Ok(Box::new(ModelLogOperation {
            model: model.clone(),
            label: label(&settings),
        }))
    })
}

pub fn failing_operation(journal: &Journal) -> Prototype {
    let journal = journal.clone();
    Prototype::operation(move |_, settings| {
        Ok(Box::new(FailingOperation {
            journal: journal.clone(),
            label: label(&settings),
        }))
    })
}

pub fn recording_modeler(journal: &Journal) -> Prototype {
    let journal = journal.clone();
    Prototype::modeler(move |_, settings| {
        Ok(Box::new(RecordingModeler {
            journal: journal.clone(),
            label: label(&settings),
        }))
    })
}

pub fn recording_stage(journal: &Journal) -> Prototype {
    let journal = journal.clone();
    Prototype::stage(move |_, settings| {
        journal.record(format!("{}:construct", label(&settings)));
        Ok(Box::new(RecordingStage {
            journal: journal.clone(),
            name: label(&settings),
            fail_in: settings.get_string("fail_in").ok().map(str::to_string),
        }))
    })
}

/// Registry with every fake registered
///
/// The recording stage lives in module `test` and is registered lazily, the
/// first time a `Stages.test.*` locator is resolved.
pub fn fixture_registry(journal: &Journal) -> Registry {
    let mut registry = Registry::new();
    registry
        .register_prototype(RECORD_OPERATION, recording_operation(journal))
        .unwrap();
    registry
        .register_prototype(MODEL_LOG_OPERATION, model_log_operation())
        .unwrap();
    registry
        .register_prototype(FAILING_OPERATION, failing_operation(journal))
        .unwrap();
    registry
        .register_prototype(RECORD_MODELER, recording_modeler(journal))
        .unwrap();
    registry.add_module(
        ModuleDef::new("test")
            .with_class("RecordingStage", recording_stage(journal))
            .registers(RECORDING_STAGE, RegistryEntry::module("test", "RecordingStage")),
    );
    registry
}

/// Entries written by [`MODEL_LOG_OPERATION`]
pub fn model_log(model: &SharedModel) -> Vec<String> {
    let model = model.borrow();
    let Ok(part) = model.model_part(LOG_PART) else {
        return Vec::new();
    };
    match part.get(LOG_KEY) {
        Some(JsonValue::Array(entries)) => entries
            .iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse settings from JSON, panicking on malformed input
pub fn settings(json: &str) -> Settings {
    Settings::from_json_str(json).unwrap()
}
