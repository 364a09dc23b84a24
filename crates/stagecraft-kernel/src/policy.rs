//! Control policies
//!
//! The base orchestrator runs every stage once, in declaration order. A
//! [`ControlPolicy`] can skip stages before they start and repeat or stop
//! after they finish; it never reorders them.

use stagecraft_model::ProjectContext;

use crate::controller::StageReport;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Decision taken before a stage starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDecision {
    /// Run the stage
    Run,
    /// Skip it and move to the next one
    Skip,
}

/// Decision taken after a stage finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Move to the next stage
    Continue,
    /// Run the same stage again
    Repeat,
    /// End the run without executing further stages
    Stop,
}

/// Control flow applied around each stage
pub trait ControlPolicy {
    /// Called before `stage` starts
    fn before_stage(&mut self, _stage: &str, _project: &ProjectContext) -> StageDecision {
        StageDecision::Run
    }

    /// Called after a stage finishes
    ///
    /// # Errors
    /// Errors abort the run
    fn after_stage(
        &mut self,
        _report: &StageReport,
        _project: &ProjectContext,
    ) -> OrchestratorResult<StageOutcome> {
        Ok(StageOutcome::Continue)
    }
}

/// Once-through execution of every stage
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ControlPolicy for Sequential {}

/// Runs only the stages a predicate selects
pub struct Conditional<F> {
    predicate: F,
}

impl<F> Conditional<F>
where
    F: FnMut(&str, &ProjectContext) -> bool,
{
    /// Policy running a stage when `predicate(name, project)` holds
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> ControlPolicy for Conditional<F>
where
    F: FnMut(&str, &ProjectContext) -> bool,
{
    fn before_stage(&mut self, stage: &str, project: &ProjectContext) -> StageDecision {
        if (self.predicate)(stage, project) {
            StageDecision::Run
        } else {
            StageDecision::Skip
        }
    }
}

/// Re-runs one stage until an external convergence signal holds
pub struct RepeatUntil<F> {
    stage: String,
    max_repetitions: usize,
    repetitions: usize,
    converged: F,
}

impl<F> RepeatUntil<F>
where
    F: FnMut(&ProjectContext) -> bool,
{
    /// Repeat `stage` at most `max_repetitions` extra times
    pub fn new(stage: impl Into<String>, max_repetitions: usize, converged: F) -> Self {
        Self {
            stage: stage.into(),
            max_repetitions,
            repetitions: 0,
            converged,
        }
    }

    /// Repetitions performed so far for the current convergence loop
    #[inline]
    #[must_use]
    pub fn repetitions(&self) -> usize {
        self.repetitions
    }
}

impl<F> ControlPolicy for RepeatUntil<F>
where
    F: FnMut(&ProjectContext) -> bool,
{
    fn after_stage(
        &mut self,
        report: &StageReport,
        project: &ProjectContext,
    ) -> OrchestratorResult<StageOutcome> {
        if report.name != self.stage {
            return Ok(StageOutcome::Continue);
        }
        if (self.converged)(project) {
            tracing::info!(stage = %self.stage, repetitions = self.repetitions, "stage converged");
            self.repetitions = 0;
            return Ok(StageOutcome::Continue);
        }
        if self.repetitions >= self.max_repetitions {
            return Err(OrchestratorError::RepetitionLimit {
                stage: self.stage.clone(),
                limit: self.max_repetitions,
            });
        }
        self.repetitions += 1;
        Ok(StageOutcome::Repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StageState;

    fn report(name: &str) -> StageReport {
        StageReport {
            name: name.to_string(),
            state: StageState::Postprocessed,
            transitions: Vec::new(),
            elapsed_ms: 0,
            modelers: 0,
            operations: 0,
        }
    }

    #[test]
    fn repeat_until_ignores_other_stages() {
        let project = ProjectContext::new();
        let mut policy = RepeatUntil::new("loop", 1, |_: &ProjectContext| false);
        assert_eq!(
            policy.after_stage(&report("other"), &project).unwrap(),
            StageOutcome::Continue
        );
    }

    #[test]
    fn repeat_until_is_bounded() {
        let project = ProjectContext::new();
        let mut policy = RepeatUntil::new("loop", 2, |_: &ProjectContext| false);
        assert_eq!(policy.after_stage(&report("loop"), &project).unwrap(), StageOutcome::Repeat);
        assert_eq!(policy.after_stage(&report("loop"), &project).unwrap(), StageOutcome::Repeat);
        let err = policy.after_stage(&report("loop"), &project).unwrap_err();
        assert!(matches!(err, OrchestratorError::RepetitionLimit { limit: 2, .. }));
    }

    #[test]
    fn conditional_skips_unselected() {
        let project = ProjectContext::new();
        let mut policy = Conditional::new(|name: &str, _: &ProjectContext| name != "optional");
        assert_eq!(policy.before_stage("main", &project), StageDecision::Run);
        assert_eq!(policy.before_stage("optional", &project), StageDecision::Skip);
    }
}
