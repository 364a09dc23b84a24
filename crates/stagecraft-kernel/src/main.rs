use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use stagecraft_kernel::logging::{self, LogFormat};
use stagecraft_kernel::{builtin, Orchestrator, RunSummary};
use stagecraft_registry::Registry;

fn main() {
    logging::init(LogFormat::from_env());

    let file = Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Project settings (.json, .yaml or .yml)");

    let cli = Command::new("stagecraft")
        .version(stagecraft_kernel::VERSION)
        .about("Multistage simulation orchestrator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("check")
                .about("Validate settings and the structure of every stage")
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Run every stage in declaration order")
                .arg(file)
                .arg(
                    Arg::new("retain")
                        .long("retain")
                        .action(ArgAction::SetTrue)
                        .help("Keep finished stage instances and list them after the summary"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run summary as JSON"),
                ),
        )
        .subcommand(Command::new("list").about("List registered identifiers"));

    if let Err(err) = execute(&cli.get_matches()) {
        tracing::error!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn registry() -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    builtin::register_builtins(&mut registry)?;
    Ok(registry)
}

fn settings_path(args: &ArgMatches) -> anyhow::Result<&PathBuf> {
    args.get_one::<PathBuf>("file").context("missing settings file")
}

fn execute(matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("check", args)) => {
            let path = settings_path(args)?;
            let orchestrator = Orchestrator::from_path(path, registry()?)?;
            orchestrator.check_all()?;
            println!(
                "{}: {} stage(s) OK",
                path.display(),
                orchestrator.stage_names().count()
            );
            Ok(())
        }
        Some(("run", args)) => {
            let path = settings_path(args)?;
            let mut orchestrator = Orchestrator::from_path(path, registry()?)?;
            orchestrator.retain_stages(args.get_flag("retain"));
            let summary = orchestrator.run()?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
                print_retained(&orchestrator);
            }
            Ok(())
        }
        Some(("list", _)) => {
            let mut registry = registry()?;
            registry.load_module(builtin::MODULE)?;
            for id in registry.ids() {
                println!("{id}");
            }
            Ok(())
        }
        _ => anyhow::bail!("a subcommand is required"),
    }
}

fn print_retained(orchestrator: &Orchestrator) {
    let mut retained = orchestrator.retained_stages().peekable();
    if retained.peek().is_none() {
        return;
    }
    println!("retained stages");
    for (name, stage) in retained {
        println!("  {name:<24} {}", stage.name());
    }
}

fn print_summary(summary: &RunSummary) {
    println!("run {}", summary.run_id);
    for report in &summary.stages {
        println!(
            "  {:<24} {:<14} {:>6} ms  modelers={} operations={}",
            report.name, report.state, report.elapsed_ms, report.modelers, report.operations
        );
    }
    for name in &summary.skipped {
        println!("  {name:<24} skipped");
    }
    if summary.stopped {
        println!("  stopped early");
    }
    println!("total {} ms", summary.elapsed_ms);
}
