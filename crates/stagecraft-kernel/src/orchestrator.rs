//! Multistage orchestrator
//!
//! Owns the validated settings, the registry and the single
//! [`ProjectContext`] of a run, and drives stages strictly in declaration
//! order.
//!
//! # Example
//!
//! ```rust,ignore
//! let settings = Settings::from_path("project.json")?;
//! let mut registry = Registry::new();
//! builtin::register_builtins(&mut registry)?;
//!
//! let mut orchestrator = Orchestrator::new(settings, registry)?;
//! let summary = orchestrator.run()?;
//! ```

use std::path::Path;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use stagecraft_model::{AnalysisStage, ProjectContext};
use stagecraft_registry::Registry;
use stagecraft_settings::Settings;

use crate::controller::{StageController, StageReport, StageRun};
use crate::descriptor::StageDescriptor;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::policy::{ControlPolicy, Sequential, StageDecision, StageOutcome};

/// Key of the stage mapping
pub const STAGES: &str = "stages";
/// Key of the injected version tag
pub const ENGINE_VERSION: &str = "engine_version";

/// Version tag injected into the settings: `<version>-<build type>`
#[must_use]
pub fn engine_version() -> String {
    let build = if cfg!(debug_assertions) { "Debug" } else { "Release" };
    format!("{}-{build}", crate::VERSION)
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: String,
    /// One report per executed stage (repetitions included)
    pub stages: Vec<StageReport>,
    /// Stages the control policy skipped
    pub skipped: Vec<String>,
    /// True when the policy stopped the run early
    pub stopped: bool,
    /// Wall time of the run
    pub elapsed_ms: u64,
}

/// Sequencing controller over named stages
pub struct Orchestrator {
    settings: Settings,
    registry: Registry,
    project: ProjectContext,
    descriptors: Vec<StageDescriptor>,
    policy: Box<dyn ControlPolicy>,
    retain: bool,
    retained: IndexMap<String, Box<dyn AnalysisStage>>,
}

impl Orchestrator {
    /// Validate top-level settings and declare stages
    ///
    /// # Errors
    /// - [`OrchestratorError::Schema`] if `stages` is not an object
    pub fn new(mut settings: Settings, registry: Registry) -> OrchestratorResult<Self> {
        let defaults = Settings::from(json!({ "stages": {} }));
        settings.validate_and_assign_defaults(&defaults)?;
        settings.add_string(ENGINE_VERSION, engine_version());

        let stages = settings.get(STAGES)?;
        let descriptors = stages
            .keys()
            .into_iter()
            .map(|name| Ok(StageDescriptor::new(name, stages.get(name)?)))
            .collect::<OrchestratorResult<Vec<_>>>()?;

        let project = ProjectContext::new();
        tracing::debug!(
            run_id = %project.run_id(),
            stages = descriptors.len(),
            "orchestrator created"
        );

        Ok(Self {
            settings,
            registry,
            project,
            descriptors,
            policy: Box::new(Sequential),
            retain: false,
            retained: IndexMap::new(),
        })
    }

    /// Load settings from a JSON or YAML file
    ///
    /// # Errors
    /// Loading and top-level validation failures
    pub fn from_path(path: impl AsRef<Path>, registry: Registry) -> OrchestratorResult<Self> {
        Self::new(Settings::from_path(path)?, registry)
    }

    /// Replace the control policy
    #[must_use]
    pub fn with_policy(mut self, policy: impl ControlPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Keep finished stage instances for inspection
    pub fn retain_stages(&mut self, retain: bool) {
        self.retain = retain;
    }

    /// Retained instance of the last execution of `name`
    #[must_use]
    pub fn retained_stage(&self, name: &str) -> Option<&dyn AnalysisStage> {
        self.retained.get(name).map(|stage| &**stage)
    }

    /// Names of the retained stages with the name each instance reports
    pub fn retained_stages(&self) -> impl Iterator<Item = (&str, &dyn AnalysisStage)> {
        self.retained
            .iter()
            .map(|(name, stage)| (name.as_str(), &**stage))
    }

    /// Validated settings, including the version tag
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The run's project context
    #[inline]
    #[must_use]
    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    /// Registry used for construction
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stage names in declaration order
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(StageDescriptor::name)
    }

    /// Structural validation of one stage
    ///
    /// # Errors
    /// - [`OrchestratorError::MissingKey`] for an undeclared stage
    /// - see [`StageDescriptor::check`]
    pub fn check_stage_settings(&self, name: &str) -> OrchestratorResult<()> {
        self.descriptor(name)?.check()
    }

    /// Structural validation of every stage, in declaration order
    ///
    /// # Errors
    /// The first failing stage's error
    pub fn check_all(&self) -> OrchestratorResult<()> {
        for descriptor in &self.descriptors {
            descriptor.check()?;
        }
        Ok(())
    }

    fn descriptor(&self, name: &str) -> OrchestratorResult<&StageDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.name() == name)
            .ok_or_else(|| OrchestratorError::MissingKey(format!("{STAGES}.{name}")))
    }

    /// Run every stage
    ///
    /// All stages are checked before the first one starts. The first failure
    /// aborts the run; no stage is retried unless the policy asks for it.
    ///
    /// # Errors
    /// Any structural, resolution, delegate or policy failure
    pub fn run(&mut self) -> OrchestratorResult<RunSummary> {
        let run_id = self.project.run_id();
        let span = tracing::info_span!("run", %run_id);
        let _guard = span.enter();

        self.check_all()?;
        tracing::info!(stages = self.descriptors.len(), "run started");

        let started = Instant::now();
        let mut reports = Vec::new();
        let mut skipped = Vec::new();
        let mut stopped = false;
        let mut index = 0;

        while index < self.descriptors.len() {
            let name = self.descriptors[index].name().to_string();
            if self.policy.before_stage(&name, &self.project) == StageDecision::Skip {
                tracing::info!(stage = %name, "stage skipped");
                skipped.push(name);
                index += 1;
                continue;
            }

            let StageRun { report, stage } = self.run_stage(index)?;
            let outcome = self.policy.after_stage(&report, &self.project)?;
            reports.push(report);
            if self.retain {
                self.retained.insert(name.clone(), stage);
            }

            match outcome {
                StageOutcome::Continue => index += 1,
                StageOutcome::Repeat => tracing::info!(stage = %name, "repeating stage"),
                StageOutcome::Stop => {
                    tracing::info!(stage = %name, "run stopped by policy");
                    stopped = true;
                    break;
                }
            }
        }

        let summary = RunSummary {
            run_id: run_id.to_string(),
            stages: reports,
            skipped,
            stopped,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(executed = summary.stages.len(), elapsed_ms = summary.elapsed_ms, "run finished");
        Ok(summary)
    }

    fn run_stage(&mut self, index: usize) -> OrchestratorResult<StageRun> {
        let descriptor = &self.descriptors[index];
        let span = tracing::info_span!("stage", name = %descriptor.name());
        let _guard = span.enter();
        StageController::new(descriptor).execute(&mut self.registry, &self.project)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("run_id", &self.project.run_id())
            .field("stages", &self.descriptors)
            .field("retain", &self.retain)
            .finish_non_exhaustive()
    }
}
