//! Stage lifecycle controller
//!
//! Drives one [`StageDescriptor`] through
//! `Created → Preprocessed → Initialized → Running → Finalized → Postprocessed`,
//! validating every transition. Any failure moves the stage to `Failed` and
//! is returned unchanged.

use std::time::Instant;

use serde::Serialize;
use stagecraft_model::{AnalysisStage, Modeler, ProjectContext};
use stagecraft_registry::{ItemFactory, Registry};
use stagecraft_settings::Settings;

use crate::descriptor::StageDescriptor;
use crate::error::{OrchestratorError, OrchestratorResult, Phase};
use crate::state_machine::{validate_transition, StageState};

/// Outcome of one stage execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Stage name
    pub name: String,
    /// Last state reached
    pub state: StageState,
    /// Every state entered, starting with `Created`
    pub transitions: Vec<StageState>,
    /// Wall time of the whole lifecycle
    pub elapsed_ms: u64,
    /// Modelers run during preprocess
    pub modelers: usize,
    /// Operations executed during pre- and postprocess
    pub operations: usize,
}

/// Finished stage together with its report
pub struct StageRun {
    /// Lifecycle report
    pub report: StageReport,
    /// The stage instance, discarded unless retained
    pub stage: Box<dyn AnalysisStage>,
}

/// Single-use driver of one stage lifecycle
#[derive(Debug)]
pub struct StageController<'a> {
    descriptor: &'a StageDescriptor,
    state: StageState,
    transitions: Vec<StageState>,
    modelers: usize,
    operations: usize,
}

impl<'a> StageController<'a> {
    /// Controller in the `Created` state
    #[must_use]
    pub fn new(descriptor: &'a StageDescriptor) -> Self {
        Self {
            descriptor,
            state: StageState::Created,
            transitions: vec![StageState::Created],
            modelers: 0,
            operations: 0,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Run the full lifecycle
    ///
    /// # Errors
    /// The first failure of any phase; the run is not resumed
    pub fn execute(
        mut self,
        registry: &mut Registry,
        project: &ProjectContext,
    ) -> OrchestratorResult<StageRun> {
        let started = Instant::now();
        tracing::info!("stage started");

        match self.drive(registry, project) {
            Ok(stage) => {
                let report = self.report(started);
                tracing::info!(elapsed_ms = report.elapsed_ms, "stage finished");
                Ok(StageRun { report, stage })
            }
            Err(err) => {
                let at = self.state;
                if validate_transition(self.state, StageState::Failed).is_ok() {
                    self.enter(StageState::Failed);
                }
                tracing::error!(state = %at, error = %err, "stage failed");
                Err(err)
            }
        }
    }

    fn drive(
        &mut self,
        registry: &mut Registry,
        project: &ProjectContext,
    ) -> OrchestratorResult<Box<dyn AnalysisStage>> {
        let descriptor = self.descriptor;
        let name = descriptor.name();

        self.preprocess(registry, project)?;
        self.advance(StageState::Preprocessed)?;

        let locator = descriptor.analysis_stage()?;
        let constructor = registry
            .resolve_stage(locator)
            .map_err(|err| OrchestratorError::from_registry(name, Phase::Construct, err))?;
        let mut stage = constructor(&project.model(), descriptor.settings().clone())
            .map_err(|source| delegate(name, Phase::Construct, source))?;
        self.advance(StageState::Initialized)?;

        self.advance(StageState::Running)?;
        stage.run().map_err(|source| delegate(name, Phase::Run, source))?;
        self.advance(StageState::Finalized)?;

        self.postprocess(registry, project)?;
        self.advance(StageState::Postprocessed)?;
        Ok(stage)
    }

    /// Modelers through the three-phase barrier, then operations
    fn preprocess(&mut self, registry: &mut Registry, project: &ProjectContext) -> OrchestratorResult<()> {
        let descriptor = self.descriptor;
        let name = descriptor.name();
        let modeler_items = descriptor.preprocess_modelers()?;
        if !modeler_items.is_empty() {
            let mut modelers = ItemFactory::new(registry, project.model())
                .construct_modelers(&modeler_items)
                .map_err(|err| OrchestratorError::from_registry(name, Phase::Preprocess, err))?;
            run_modelers(name, &mut modelers)?;
            self.modelers += modelers.len();
        }

        let operation_items = descriptor.preprocess_operations()?;
        self.run_operations(registry, project, &operation_items, Phase::Preprocess)
    }

    fn postprocess(&mut self, registry: &mut Registry, project: &ProjectContext) -> OrchestratorResult<()> {
        let operation_items = self.descriptor.postprocess_operations()?;
        self.run_operations(registry, project, &operation_items, Phase::Postprocess)
    }

    fn run_operations(
        &mut self,
        registry: &mut Registry,
        project: &ProjectContext,
        items: &[Settings],
        phase: Phase,
    ) -> OrchestratorResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let name = self.descriptor.name().to_string();
        let operations = ItemFactory::new(registry, project.model())
            .construct_operations(items)
            .map_err(|err| OrchestratorError::from_registry(&name, phase, err))?;
        for mut operation in operations {
            operation
                .execute()
                .map_err(|source| delegate(&name, phase, source))?;
            self.operations += 1;
        }
        tracing::debug!(%phase, count = items.len(), "operations executed");
        Ok(())
    }

    fn advance(&mut self, to: StageState) -> OrchestratorResult<()> {
        validate_transition(self.state, to).map_err(|source| OrchestratorError::IllegalTransition {
            stage: self.descriptor.name().to_string(),
            source,
        })?;
        self.enter(to);
        Ok(())
    }

    fn enter(&mut self, to: StageState) {
        tracing::debug!(from = %self.state, to = %to, "stage transition");
        self.state = to;
        self.transitions.push(to);
    }

    fn report(&self, started: Instant) -> StageReport {
        StageReport {
            name: self.descriptor.name().to_string(),
            state: self.state,
            transitions: self.transitions.clone(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            modelers: self.modelers,
            operations: self.operations,
        }
    }
}

/// Every modeler finishes a phase before any modeler starts the next
fn run_modelers(stage: &str, modelers: &mut [Box<dyn Modeler>]) -> OrchestratorResult<()> {
    for modeler in modelers.iter_mut() {
        modeler
            .setup_geometry_model()
            .map_err(|source| delegate(stage, Phase::Preprocess, source))?;
    }
    for modeler in modelers.iter_mut() {
        modeler
            .prepare_geometry_model()
            .map_err(|source| delegate(stage, Phase::Preprocess, source))?;
    }
    for modeler in modelers.iter_mut() {
        modeler
            .setup_model_part()
            .map_err(|source| delegate(stage, Phase::Preprocess, source))?;
    }
    tracing::debug!(count = modelers.len(), "modelers executed");
    Ok(())
}

fn delegate(stage: &str, phase: Phase, source: anyhow::Error) -> OrchestratorError {
    OrchestratorError::DelegateFailure {
        stage: stage.to_string(),
        phase,
        source,
    }
}
