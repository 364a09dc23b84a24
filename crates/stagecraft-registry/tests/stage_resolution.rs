//! Stage locator resolution tests

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use stagecraft_model::{AnalysisStage, Modeler, Operation, SharedModel};
use stagecraft_registry::{
    ItemFactory, ModuleDef, Prototype, Registry, RegistryEntry, RegistryError,
};
use stagecraft_settings::Settings;

struct NamedStage(&'static str);

impl AnalysisStage for NamedStage {
    fn name(&self) -> &str {
        self.0
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn run_solution_loop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn named(name: &'static str) -> Prototype {
    Prototype::stage(move |_, _| Ok(Box::new(NamedStage(name))))
}

fn build(registry: &mut Registry, locator: &str) -> Result<String, RegistryError> {
    let constructor = registry.resolve_stage(locator)?;
    let stage = constructor(&SharedModel::default(), Settings::new()).unwrap();
    Ok(stage.name().to_string())
}

#[test]
fn registered_locator_resolves_module_class() {
    let mut registry = Registry::new();
    registry.add_module(ModuleDef::new("app.fluid").with_class("FluidStage", named("fluid")));
    registry
        .register_module_entry("Stages.app.fluid.FluidStage", Some("app.fluid"), Some("FluidStage"))
        .unwrap();

    assert_eq!(build(&mut registry, "Stages.app.fluid.FluidStage").unwrap(), "fluid");
}

#[test]
fn module_registrations_apply_on_first_stage_lookup() {
    let mut registry = Registry::new();
    registry.add_module(
        ModuleDef::new("app")
            .with_class("Main", named("main"))
            .registers("Stages.app.Main", RegistryEntry::module("app", "Main")),
    );

    assert!(!registry.has_item("Stages.app.Main"));
    assert_eq!(build(&mut registry, "Stages.app.Main").unwrap(), "main");
    assert!(registry.has_item("Stages.app.Main"));
}

#[test]
fn colliding_module_registrations_leave_registry_unchanged() {
    let mut registry = Registry::new();
    registry
        .register_prototype("Stages.app.Second", named("taken"))
        .unwrap();
    registry.add_module(
        ModuleDef::new("app")
            .with_class("First", named("first"))
            .with_class("Second", named("second"))
            .registers("Stages.app.First", RegistryEntry::module("app", "First"))
            .registers("Stages.app.Second", RegistryEntry::module("app", "Second")),
    );

    for _ in 0..2 {
        let err = registry.load_module("app").err().unwrap();
        assert!(matches!(err, RegistryError::Duplicate(id) if id == "Stages.app.Second"));
        assert!(!registry.has_item("Stages.app.First"));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn stages_all_is_rejected() {
    let mut registry = Registry::new();
    let err = build(&mut registry, "Stages.All.Anything").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidLocator { .. }));
}

#[test]
fn stages_locator_without_module_is_rejected() {
    let mut registry = Registry::new();
    let err = build(&mut registry, "Stages.Lonely").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidLocator { .. }));
}

#[test]
fn unregistered_stages_locator_fails() {
    let mut registry = Registry::new();
    let err = build(&mut registry, "Stages.app.Missing").unwrap_err();
    assert!(matches!(err, RegistryError::Unregistered(id) if id == "Stages.app.Missing"));
}

#[test]
fn entry_without_module_uses_main_module() {
    let mut registry = Registry::new();
    registry.register_main_class("CustomStage", named("custom"));
    registry
        .register_module_entry("Stages.app.CustomStage", None, Some("CustomStage"))
        .unwrap();

    assert_eq!(build(&mut registry, "Stages.app.CustomStage").unwrap(), "custom");
}

#[test]
fn module_path_derives_camel_case_class() {
    let mut registry = Registry::new();
    registry.add_module(
        ModuleDef::new("app.heat_transfer_analysis")
            .with_class("HeatTransferAnalysis", named("heat")),
    );

    assert_eq!(build(&mut registry, "app.heat_transfer_analysis").unwrap(), "heat");
}

#[test]
fn module_create_is_the_fallback() {
    let mut registry = Registry::new();
    registry.add_module(ModuleDef::new("app.legacy").with_create(named("created")));

    assert_eq!(build(&mut registry, "app.legacy").unwrap(), "created");
}

#[test]
fn module_without_class_or_create_fails() {
    let mut registry = Registry::new();
    registry.add_module(ModuleDef::new("app.empty"));
    let err = build(&mut registry, "app.empty").unwrap_err();
    assert!(matches!(err, RegistryError::ClassNotFound { class, .. } if class == "Empty"));

    let err = build(&mut registry, "app.absent").unwrap_err();
    assert!(matches!(err, RegistryError::ModuleNotFound(_)));
}

#[test]
fn factory_entries_are_called_per_resolution() {
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    let mut registry = Registry::new();
    registry
        .register_factory("Stages.app.Built", move || {
            *counter.borrow_mut() += 1;
            named("built")
        })
        .unwrap();

    build(&mut registry, "Stages.app.Built").unwrap();
    build(&mut registry, "Stages.app.Built").unwrap();
    assert_eq!(*calls.borrow(), 2);
}

struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
    label: String,
}

impl Operation for Recorder {
    fn execute(&mut self) -> anyhow::Result<()> {
        self.log.borrow_mut().push(self.label.clone());
        Ok(())
    }
}

impl Modeler for Recorder {
    fn setup_model_part(&mut self) -> anyhow::Result<()> {
        self.log.borrow_mut().push(self.label.clone());
        Ok(())
    }
}

#[test]
fn item_factory_preserves_order_and_passes_parameters() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let mut registry = Registry::new();
    registry
        .register_prototype(
            "Operations.app.Record",
            Prototype::operation(move |_, settings| {
                Ok(Box::new(Recorder {
                    log: Rc::clone(&sink),
                    label: settings.get_string("label")?.to_string(),
                }))
            }),
        )
        .unwrap();

    let items: Vec<Settings> = [
        json!({"name": "Operations.app.Record", "parameters": {"label": "first"}}),
        json!({"name": "Operations.app.Record", "Parameters": {"label": "second"}}),
    ]
    .into_iter()
    .map(Settings::from)
    .collect();

    let mut factory = ItemFactory::new(&mut registry, SharedModel::default());
    let mut operations = factory.construct_operations(&items).unwrap();
    for operation in &mut operations {
        operation.execute().unwrap();
    }
    assert_eq!(*log.borrow(), vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn item_factory_reports_kind_mismatch_and_constructor_failure() {
    let mut registry = Registry::new();
    registry
        .register_prototype(
            "Operations.app.Broken",
            Prototype::operation(|_, _| Err(anyhow::anyhow!("bad parameters"))),
        )
        .unwrap();

    let items = vec![Settings::from(json!({"name": "Operations.app.Broken", "parameters": {}}))];
    let mut factory = ItemFactory::new(&mut registry, SharedModel::default());

    let err = factory.construct_modelers(&items).err().unwrap();
    assert!(matches!(err, RegistryError::KindMismatch { .. }));

    let err = factory.construct_operations(&items).err().unwrap();
    assert!(matches!(err, RegistryError::Construction { ref id, .. } if id == "Operations.app.Broken"));
    assert!(err.to_string().contains("bad parameters"));
}
