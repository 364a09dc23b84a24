//! Stagecraft Orchestration Kernel
//!
//! Runs an ordered list of named analysis stages over one shared project
//! model, with modeler/operation preprocessing and operation-only
//! postprocessing.
//!
//! # Core Concepts
//!
//! - [`Orchestrator`]: validates settings, checks every stage up front, then
//!   runs stages strictly in declaration order
//! - [`StageController`]: one stage through
//!   `Created → Preprocessed → Initialized → Running → Finalized → Postprocessed`
//! - [`ControlPolicy`]: optional skip/repeat/stop decisions around each stage
//! - [`KernelAnalysisStage`]: generic stage driving an opaque
//!   [`stagecraft_model::SolverKernel`]
//! - [`OrchestratorError`]: the error taxonomy; no layer recovers locally
//!
//! # Example
//!
//! ```rust
//! use stagecraft_kernel::{builtin, Orchestrator};
//! use stagecraft_registry::Registry;
//! use stagecraft_settings::Settings;
//!
//! let settings = Settings::from_json_str(r#"{
//!     "stages": {
//!         "rehearsal": { "analysis_stage": "Stages.stagecraft.DryRunStage" }
//!     }
//! }"#).unwrap();
//!
//! let mut registry = Registry::new();
//! builtin::register_builtins(&mut registry).unwrap();
//!
//! let mut orchestrator = Orchestrator::new(settings, registry).unwrap();
//! let summary = orchestrator.run().unwrap();
//! assert_eq!(summary.stages.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builtin;
pub mod logging;
pub mod state_machine;

mod controller;
mod descriptor;
mod error;
mod kernel_stage;
mod orchestrator;
mod policy;

pub use controller::{StageController, StageReport, StageRun};
pub use descriptor::StageDescriptor;
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult, Phase};
pub use kernel_stage::{kernel_stage_prototype, DryRunKernel, KernelAnalysisStage, PROBLEM_DATA_PART};
pub use orchestrator::{engine_version, Orchestrator, RunSummary, ENGINE_VERSION};
pub use policy::{Conditional, ControlPolicy, RepeatUntil, Sequential, StageDecision, StageOutcome};
pub use state_machine::{StageState, StageStateError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
