use std::io::Write;

use mockall::{mock, predicate::*, Sequence};
use serde_json::json;
use stagecraft_kernel::{
    builtin, kernel_stage_prototype, ErrorKind, KernelAnalysisStage, Orchestrator,
    PROBLEM_DATA_PART,
};
use stagecraft_model::{AnalysisStage, PhysicsDomain, SharedModel, SolverKernel};
use stagecraft_registry::Registry;
use stagecraft_settings::Settings;

mock! {
    Kernel {}

    impl SolverKernel for Kernel {
        fn domain(&self) -> PhysicsDomain;
        fn initialize(&mut self) -> anyhow::Result<()>;
        fn solve_solution_step(&mut self, time: f64) -> anyhow::Result<bool>;
        fn calculate_value(&mut self) -> anyhow::Result<f64>;
        fn calculate_gradient(&mut self) -> anyhow::Result<Vec<f64>>;
    }
}

fn structural_kernel() -> MockKernel {
    let mut kernel = MockKernel::new();
    kernel.expect_domain().return_const(PhysicsDomain::Structural);
    kernel
}

fn stage(settings: serde_json::Value, kernel: MockKernel) -> KernelAnalysisStage {
    KernelAnalysisStage::new(SharedModel::default(), Settings::from(settings), Box::new(kernel))
        .unwrap()
}

#[test]
fn test_kernel_is_initialized_once_and_stepped_in_order() {
    let mut kernel = structural_kernel();
    let mut seq = Sequence::new();
    kernel
        .expect_initialize()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    for time in [0.5, 1.0] {
        kernel
            .expect_solve_solution_step()
            .with(function(move |t: &f64| (t - time).abs() < 1e-12))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
    }

    let mut stage = stage(
        json!({
            "problem_data": {"end_time": 1.0, "time_step": 0.5},
            "solver_settings": {"physics_domain": "structural"}
        }),
        kernel,
    );
    stage.run().unwrap();

    assert_eq!(stage.step(), 2);
}

#[test]
fn test_non_convergence_fails_when_required() {
    let mut kernel = structural_kernel();
    kernel.expect_initialize().returning(|| Ok(()));
    kernel.expect_solve_solution_step().times(1).returning(|_| Ok(false));

    let mut stage = stage(json!({"problem_data": {"end_time": 3.0}}), kernel);

    let err = stage.run().unwrap_err();
    assert!(err.to_string().contains("did not converge"), "{err}");
}

#[test]
fn test_non_convergence_continues_when_tolerated() {
    let mut kernel = structural_kernel();
    kernel.expect_initialize().returning(|| Ok(()));
    kernel.expect_solve_solution_step().times(3).returning(|_| Ok(false));

    let mut stage = stage(
        json!({
            "problem_data": {"end_time": 3.0},
            "solver_settings": {"require_convergence": false}
        }),
        kernel,
    );

    stage.run().unwrap();
    assert_eq!(stage.step(), 3);
}

#[test]
fn test_kernel_errors_propagate() {
    let mut kernel = structural_kernel();
    kernel
        .expect_initialize()
        .returning(|| Err(anyhow::anyhow!("mesh not found")));
    kernel.expect_solve_solution_step().never();

    let mut stage = stage(json!({}), kernel);

    assert_eq!(stage.run().unwrap_err().to_string(), "mesh not found");
}

#[test]
fn test_domain_mismatch_stops_before_initialize() {
    let mut kernel = structural_kernel();
    kernel.expect_initialize().never();

    let mut stage = stage(json!({"solver_settings": {"physics_domain": "fluid"}}), kernel);

    assert!(stage.initialize().is_err());
}

#[test]
fn test_prototype_builds_kernel_from_stage_settings() {
    let mut registry = Registry::new();
    registry
        .register_prototype(
            "Stages.mock.MockStage",
            kernel_stage_prototype(|settings| {
                let name = settings.pointer("/problem_data/problem_name").cloned();
                assert_eq!(name, Some(json!("beam")));
                let mut kernel = structural_kernel();
                kernel.expect_initialize().returning(|| Ok(()));
                kernel.expect_solve_solution_step().returning(|_| Ok(true));
                Ok(Box::new(kernel) as Box<dyn SolverKernel>)
            }),
        )
        .unwrap();
    let settings = Settings::from(json!({
        "stages": {
            "beam": {
                "analysis_stage": "Stages.mock.MockStage",
                "problem_data": {"problem_name": "beam", "end_time": 2.0}
            }
        }
    }));
    let mut orchestrator = Orchestrator::new(settings, registry).unwrap();

    orchestrator.run().unwrap();

    let model = orchestrator.project().model();
    let model = model.borrow();
    let part = model.model_part(PROBLEM_DATA_PART).unwrap();
    assert_eq!(part.get("steps"), Some(&json!(2)));
    assert_eq!(part.get("physics_domain"), Some(&json!("structural")));
}

#[test]
fn test_invalid_stage_settings_fail_construction() {
    let mut registry = Registry::new();
    builtin::register_builtins(&mut registry).unwrap();
    let settings = Settings::from(json!({
        "stages": {
            "broken": {
                "analysis_stage": "Stages.stagecraft.DryRunStage",
                "problem_data": {"time_step": "small"}
            }
        }
    }));
    let mut orchestrator = Orchestrator::new(settings, registry).unwrap();

    assert_eq!(orchestrator.run().unwrap_err().kind(), ErrorKind::DelegateFailure);
}

const YAML_PROJECT: &str = r"
stages:
  warmup:
    analysis_stage: Stages.stagecraft.DryRunStage
    problem_data:
      problem_name: warmup
      end_time: 2.0
    stage_postprocess:
      operations:
        - name: Operations.stagecraft.LogMessage
          parameters:
            message: warmup done
";

#[test]
fn test_yaml_project_runs_from_path() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(YAML_PROJECT.as_bytes()).unwrap();
    let mut registry = Registry::new();
    builtin::register_builtins(&mut registry).unwrap();

    let mut orchestrator = Orchestrator::from_path(file.path(), registry).unwrap();
    let summary = orchestrator.run().unwrap();

    assert_eq!(summary.stages.len(), 1);
    assert_eq!(summary.stages[0].operations, 1);
    let model = orchestrator.project().model();
    assert_eq!(
        model.borrow().model_part(PROBLEM_DATA_PART).unwrap().get("steps"),
        Some(&json!(2))
    );
}
