//! Collaborator interfaces
//!
//! The orchestrator depends only on these traits. Implementations live in
//! applications and report failures as [`anyhow::Error`].

use std::fmt;
use std::str::FromStr;

/// One analysis stage of a multistage run
///
/// Instances are constructed from the shared model and the stage's own
/// validated settings. `check` is expected to be called by the stage itself
/// during `initialize`.
pub trait AnalysisStage {
    /// Name used in logs
    fn name(&self) -> &str {
        "analysis_stage"
    }

    /// Prepare the stage (including its own `check`)
    fn initialize(&mut self) -> anyhow::Result<()>;

    /// Verify the stage is consistently configured
    fn check(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Advance the stage's solution loop to completion
    fn run_solution_loop(&mut self) -> anyhow::Result<()>;

    /// Release resources and write final results
    fn finalize(&mut self) -> anyhow::Result<()>;

    /// Full stage run: initialize, solution loop, finalize
    fn run(&mut self) -> anyhow::Result<()> {
        self.initialize()?;
        self.run_solution_loop()?;
        self.finalize()
    }
}

/// Action executed once at a stage preprocess or postprocess point
pub trait Operation {
    /// Perform the operation
    fn execute(&mut self) -> anyhow::Result<()>;
}

/// Builds or modifies model topology before a stage runs
///
/// Every modeler of a preprocess section finishes one phase before any
/// modeler starts the next.
pub trait Modeler {
    /// Phase 1: create or import geometry
    fn setup_geometry_model(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Phase 2: operate on the geometry
    fn prepare_geometry_model(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Phase 3: populate model parts
    fn setup_model_part(&mut self) -> anyhow::Result<()>;
}

/// Physics domain served by a solver kernel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicsDomain {
    /// Fluid dynamics
    Fluid,
    /// Structural mechanics
    Structural,
    /// Heat transfer
    Thermal,
    /// Geomechanics
    Geomechanics,
    /// Shape optimization
    ShapeOptimization,
    /// Any other application-defined domain
    Custom(String),
}

impl PhysicsDomain {
    /// Settings spelling of the domain
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fluid => "fluid",
            Self::Structural => "structural",
            Self::Thermal => "thermal",
            Self::Geomechanics => "geomechanics",
            Self::ShapeOptimization => "shape_optimization",
            Self::Custom(name) => name,
        }
    }
}

impl FromStr for PhysicsDomain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "fluid" => Self::Fluid,
            "structural" => Self::Structural,
            "thermal" => Self::Thermal,
            "geomechanics" => Self::Geomechanics,
            "shape_optimization" => Self::ShapeOptimization,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl fmt::Display for PhysicsDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque numerical kernel
///
/// Linear solves, assembly, filtering and response evaluation happen behind
/// this interface.
pub trait SolverKernel {
    /// Domain this kernel solves
    fn domain(&self) -> PhysicsDomain;

    /// Prepare internal data structures
    fn initialize(&mut self) -> anyhow::Result<()>;

    /// Solve one solution step at `time`; `Ok(false)` when not converged
    fn solve_solution_step(&mut self, time: f64) -> anyhow::Result<bool>;

    /// Evaluate a scalar response
    fn calculate_value(&mut self) -> anyhow::Result<f64>;

    /// Evaluate the response gradient
    fn calculate_gradient(&mut self) -> anyhow::Result<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_domain_round_trips_known_names() {
        for name in ["fluid", "structural", "thermal", "geomechanics", "shape_optimization"] {
            let domain: PhysicsDomain = name.parse().unwrap();
            assert_eq!(domain.as_str(), name);
            assert!(!matches!(domain, PhysicsDomain::Custom(_)));
        }
    }

    #[test]
    fn physics_domain_unknown_is_custom() {
        let domain: PhysicsDomain = "electromagnetics".parse().unwrap();
        assert_eq!(domain, PhysicsDomain::Custom("electromagnetics".into()));
        assert_eq!(domain.to_string(), "electromagnetics");
    }

    struct Counting {
        calls: Vec<&'static str>,
    }

    impl AnalysisStage for Counting {
        fn initialize(&mut self) -> anyhow::Result<()> {
            self.calls.push("initialize");
            Ok(())
        }

        fn run_solution_loop(&mut self) -> anyhow::Result<()> {
            self.calls.push("loop");
            Ok(())
        }

        fn finalize(&mut self) -> anyhow::Result<()> {
            self.calls.push("finalize");
            Ok(())
        }
    }

    #[test]
    fn default_run_orders_phases() {
        let mut stage = Counting { calls: Vec::new() };
        stage.run().unwrap();
        assert_eq!(stage.calls, vec!["initialize", "loop", "finalize"]);
    }
}
