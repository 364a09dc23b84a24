//! Stagecraft Model
//!
//! The run-scoped state every stage observes, and the interfaces external
//! collaborators implement.
//!
//! # Core Concepts
//!
//! - [`Model`] / [`ModelPart`]: named model parts carrying process data
//! - [`SharedModel`]: the single handle threaded through all stages
//! - [`ProjectContext`]: owns the shared model for one orchestrator run
//! - [`AnalysisStage`], [`Operation`], [`Modeler`]: what the orchestrator drives
//! - [`SolverKernel`]: opaque numerical kernel consumed by analysis stages

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod interfaces;
mod model;
mod project;

pub use error::{ModelError, ModelResult};
pub use interfaces::{AnalysisStage, Modeler, Operation, PhysicsDomain, SolverKernel};
pub use model::{Model, ModelPart, SharedModel};
pub use project::{ProjectContext, RunId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
