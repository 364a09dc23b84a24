//! Kernel-driven analysis stage
//!
//! [`KernelAnalysisStage`] is the generic stage behind most registered stage
//! entries: it validates `problem_data` and `solver_settings`, then advances
//! time and delegates each step to an opaque [`SolverKernel`].

use serde_json::json;
use stagecraft_model::{AnalysisStage, PhysicsDomain, SharedModel, SolverKernel};
use stagecraft_registry::Prototype;
use stagecraft_settings::Settings;

/// Model part receiving run information
pub const PROBLEM_DATA_PART: &str = "ProblemData";

const TIME_TOLERANCE: f64 = 1e-9;

fn stage_defaults() -> Settings {
    Settings::from(json!({
        "problem_data": {
            "problem_name": "kernel_stage",
            "start_time": 0.0,
            "end_time": 1.0,
            "time_step": 1.0
        },
        "solver_settings": {
            "physics_domain": null,
            "echo_level": 0,
            "require_convergence": true
        }
    }))
}

/// Analysis stage advancing a [`SolverKernel`] through a time loop
pub struct KernelAnalysisStage {
    name: String,
    model: SharedModel,
    settings: Settings,
    kernel: Box<dyn SolverKernel>,
    start_time: f64,
    end_time: f64,
    time_step: f64,
    require_convergence: bool,
    echo_level: i64,
    step: u64,
    time: f64,
}

impl KernelAnalysisStage {
    /// Build the stage, validating `settings` against the stage defaults
    ///
    /// Keys other than `problem_data` and `solver_settings` are ignored.
    ///
    /// # Errors
    /// Returns the validation error if a known key has the wrong kind
    pub fn new(
        model: SharedModel,
        mut settings: Settings,
        kernel: Box<dyn SolverKernel>,
    ) -> anyhow::Result<Self> {
        settings.validate_and_assign_defaults(&stage_defaults())?;
        let problem = settings.get("problem_data")?;
        let solver = settings.get("solver_settings")?;
        let start_time = problem.get_double("start_time")?;

        Ok(Self {
            name: problem.get_string("problem_name")?.to_string(),
            model,
            kernel,
            start_time,
            end_time: problem.get_double("end_time")?,
            time_step: problem.get_double("time_step")?,
            require_convergence: solver.get_bool("require_convergence")?,
            echo_level: solver.get_int("echo_level")?,
            step: 0,
            time: start_time,
            settings,
        })
    }

    /// Validated settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Solution steps performed so far
    #[inline]
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Current time
    #[inline]
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    fn keep_advancing(&self) -> bool {
        self.time + TIME_TOLERANCE * self.time_step < self.end_time
    }

    fn advance_time(&mut self) -> f64 {
        self.step += 1;
        #[allow(clippy::cast_precision_loss)]
        let elapsed = self.step as f64 * self.time_step;
        self.time = self.start_time + elapsed;
        self.time
    }
}

impl AnalysisStage for KernelAnalysisStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.check()?;
        self.kernel.initialize()?;
        self.step = 0;
        self.time = self.start_time;
        tracing::debug!(stage = %self.name, domain = %self.kernel.domain(), "kernel initialized");
        Ok(())
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.time_step <= 0.0 {
            anyhow::bail!("'time_step' must be positive, got {}", self.time_step);
        }
        if self.end_time < self.start_time {
            anyhow::bail!(
                "'end_time' ({}) precedes 'start_time' ({})",
                self.end_time,
                self.start_time
            );
        }
        if let Some(domain) = self.settings.pointer("/solver_settings/physics_domain").and_then(|v| v.as_str()) {
            let expected: PhysicsDomain = domain.parse()?;
            let actual = self.kernel.domain();
            if expected != actual {
                anyhow::bail!("stage expects a {expected} kernel, got {actual}");
            }
        }
        Ok(())
    }

    fn run_solution_loop(&mut self) -> anyhow::Result<()> {
        while self.keep_advancing() {
            let time = self.advance_time();
            let converged = self.kernel.solve_solution_step(time)?;
            if self.echo_level > 0 {
                tracing::info!(stage = %self.name, step = self.step, time, converged, "solution step");
            }
            if !converged {
                if self.require_convergence {
                    anyhow::bail!("solution step {} at time {time} did not converge", self.step);
                }
                tracing::warn!(stage = %self.name, step = self.step, time, "solution step not converged");
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        let mut model = self.model.borrow_mut();
        let part = model.get_or_create_model_part(PROBLEM_DATA_PART)?;
        part.set("steps", self.step);
        part.set("final_time", self.time);
        part.set("physics_domain", self.kernel.domain().to_string());
        part.append("completed_stages", self.name.clone())?;
        tracing::debug!(stage = %self.name, steps = self.step, "kernel stage finalized");
        Ok(())
    }
}

/// Stage prototype building the kernel from the stage settings
pub fn kernel_stage_prototype<F>(kernel_factory: F) -> Prototype
where
    F: Fn(&Settings) -> anyhow::Result<Box<dyn SolverKernel>> + 'static,
{
    Prototype::stage(move |model, settings| {
        let kernel = kernel_factory(&settings)?;
        Ok(Box::new(KernelAnalysisStage::new(model.clone(), settings, kernel)?))
    })
}

/// Kernel that converges every step without computing anything
#[derive(Debug, Clone)]
pub struct DryRunKernel {
    domain: PhysicsDomain,
    steps: u64,
}

impl DryRunKernel {
    /// Dry-run kernel reporting `domain`
    #[must_use]
    pub fn new(domain: PhysicsDomain) -> Self {
        Self { domain, steps: 0 }
    }

    /// Dry-run kernel for the domain named in `solver_settings.physics_domain`
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let domain = settings
            .pointer("/solver_settings/physics_domain")
            .and_then(|v| v.as_str())
            .map_or_else(
                || PhysicsDomain::Custom("dry_run".to_string()),
                |name| match name.parse() {
                    Ok(domain) => domain,
                    Err(never) => match never {},
                },
            );
        Self::new(domain)
    }

    /// Steps solved so far
    #[inline]
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl SolverKernel for DryRunKernel {
    fn domain(&self) -> PhysicsDomain {
        self.domain.clone()
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.steps = 0;
        Ok(())
    }

    fn solve_solution_step(&mut self, _time: f64) -> anyhow::Result<bool> {
        self.steps += 1;
        Ok(true)
    }

    fn calculate_value(&mut self) -> anyhow::Result<f64> {
        Ok(0.0)
    }

    fn calculate_gradient(&mut self) -> anyhow::Result<Vec<f64>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(json: serde_json::Value) -> KernelAnalysisStage {
        let settings = Settings::from(json);
        let kernel = Box::new(DryRunKernel::from_settings(&settings));
        KernelAnalysisStage::new(SharedModel::default(), settings, kernel).unwrap()
    }

    #[test]
    fn loop_covers_the_time_interval() {
        let mut stage = stage(json!({
            "problem_data": {"start_time": 0.0, "end_time": 1.0, "time_step": 0.1}
        }));
        stage.run().unwrap();
        assert_eq!(stage.step(), 10);
        assert!((stage.time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn defaults_give_a_single_step() {
        let mut stage = stage(json!({}));
        stage.run().unwrap();
        assert_eq!(stage.step(), 1);
    }

    #[test]
    fn negative_time_step_fails_check() {
        let stage = stage(json!({"problem_data": {"time_step": -1.0}}));
        assert!(stage.check().is_err());
    }

    #[test]
    fn wrong_kind_is_a_construction_error() {
        let settings = Settings::from(json!({"problem_data": {"end_time": "late"}}));
        let kernel = Box::new(DryRunKernel::new(PhysicsDomain::Fluid));
        assert!(KernelAnalysisStage::new(SharedModel::default(), settings, kernel).is_err());
    }

    #[test]
    fn domain_mismatch_fails_check() {
        let settings = Settings::from(json!({"solver_settings": {"physics_domain": "thermal"}}));
        let kernel = Box::new(DryRunKernel::new(PhysicsDomain::Fluid));
        let stage = KernelAnalysisStage::new(SharedModel::default(), settings, kernel).unwrap();
        assert!(stage.check().is_err());
    }

    #[test]
    fn finalize_records_problem_data() {
        let model = SharedModel::default();
        let settings = Settings::from(json!({"problem_data": {"problem_name": "thermal"}}));
        let kernel = Box::new(DryRunKernel::new(PhysicsDomain::Thermal));
        let mut stage = KernelAnalysisStage::new(model.clone(), settings, kernel).unwrap();
        stage.run().unwrap();

        let model = model.borrow();
        let part = model.model_part(PROBLEM_DATA_PART).unwrap();
        assert_eq!(part.get("steps"), Some(&json!(1)));
        assert_eq!(part.get("completed_stages"), Some(&json!(["thermal"])));
        assert_eq!(part.get("physics_domain"), Some(&json!("thermal")));
    }
}
