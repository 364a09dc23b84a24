//! Stagecraft Construction Registry
//!
//! Maps string identifiers to constructible prototypes of analysis stages,
//! modelers and operations.
//!
//! # Core Concepts
//!
//! - [`Prototype`]: typed constructor taking the shared model and settings
//! - [`RegistryEntry`]: a prototype, a module locator, or a factory function
//! - [`ModuleDef`]: explicitly registered stand-in for an importable module,
//!   which may populate the registry when first loaded
//! - [`Registry`]: three-tier resolution (exact hit, module entry, convention)
//! - [`ItemFactory`]: builds operation/modeler lists from settings
//!
//! # Example
//!
//! ```rust,ignore
//! use stagecraft_registry::{Prototype, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register_prototype("Operations.app.Cleanup", Prototype::operation(|model, settings| {
//!     Ok(Box::new(Cleanup::new(model.clone(), settings)))
//! }))?;
//!
//! let prototype = registry.resolve("Operations.app.Cleanup")?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod factory;
mod locator;
mod module;
mod prototype;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use factory::{check_item, ItemFactory};
pub use locator::{camel_case_class_name, check_stage_locator, STAGE_PREFIX};
pub use module::ModuleDef;
pub use prototype::{
    FactoryFn, ModelerConstructor, OperationConstructor, Prototype, PrototypeKind,
    StageConstructor,
};
pub use registry::{Registry, RegistryEntry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
