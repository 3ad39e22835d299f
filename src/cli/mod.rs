//! Command-line interface: argument parsing and subcommand dispatch.
//!
//! The launching subcommands (`run`, `exec`, `batch`) share one pipeline:
//! gather requirements (extract + merge), build the execution request, and
//! hand it to the launcher. `bootstrap` is the hidden child-side entry;
//! `inspect` reports what a script declares without launching anything.

pub mod args;

pub use args::{BatchArgs, BootstrapArgs, Cli, Commands, ExecArgs, InspectArgs, LaunchArgs, RunArgs};

use crate::bootstrap;
use crate::error::Result;
use crate::launcher;
use crate::request::{ExecutionRequest, RequestBuilder};
use crate::requirements::extract::extract_from_path;
use crate::requirements::merge::{merge, parse_override};
use crate::requirements::Requirement;
use crate::sequence;
use std::collections::BTreeMap;
use std::path::Path;

/// Dispatch a parsed CLI invocation, returning the process exit code.
pub fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Run(args) => run_script(args),
        Commands::Exec(args) => exec_command(args),
        Commands::Batch(args) => run_batch(args),
        Commands::Inspect(args) => inspect(args, cli.quiet),
        Commands::Bootstrap(args) => bootstrap::run(&args.token),
    }
}

fn run_script(args: &RunArgs) -> Result<i32> {
    let requirements = gather_requirements(Some(&args.script), &args.launch)?;
    let request = builder_for(&args.launch)
        .requirements(requirements)
        .script(&args.script, args.args.clone())?;
    launch(&args.launch, &request)
}

fn exec_command(args: &ExecArgs) -> Result<i32> {
    let requirements = gather_requirements(None, &args.launch)?;
    let request = builder_for(&args.launch)
        .requirements(requirements)
        .preload(args.preload.clone())
        .command(&args.name, args.args.clone(), parse_named_args(&args.named)?);
    launch(&args.launch, &request)
}

fn run_batch(args: &BatchArgs) -> Result<i32> {
    // A sequence is a thin wrapper over the script pipeline: flatten to a
    // single-use script, then launch it like any other. The flattened file
    // must outlive the child, so the guard is held across the launch.
    let flattened = sequence::flatten(&args.statements)?;
    let requirements = gather_requirements(Some(flattened.path()), &args.launch)?;
    let request = builder_for(&args.launch)
        .requirements(requirements)
        .preload(args.preload.clone())
        .script(flattened.path(), Vec::new())?;
    launch(&args.launch, &request)
}

fn inspect(args: &InspectArgs, quiet: bool) -> Result<i32> {
    let requirements = extract_from_path(&args.script)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&requirements).map_err(anyhow::Error::from)?);
        return Ok(0);
    }

    if requirements.is_empty() {
        if !quiet {
            println!("No library requirements declared.");
        }
        return Ok(0);
    }
    for requirement in &requirements {
        println!("{}  {}", requirement.name, requirement.constraint_display());
    }
    Ok(0)
}

/// Extract script-declared requirements (unless suppressed) and merge in
/// caller overrides under the selected policy.
fn gather_requirements(script: Option<&Path>, launch: &LaunchArgs) -> Result<Vec<Requirement>> {
    let extracted = match script {
        Some(path) if !launch.ignore_script_requirements => extract_from_path(path)?,
        _ => Vec::new(),
    };

    let overrides = launch
        .require
        .iter()
        .map(|spec| parse_override(spec))
        .collect::<Result<Vec<_>>>()?;

    Ok(merge(extracted, &overrides, launch.policy))
}

fn builder_for(launch: &LaunchArgs) -> RequestBuilder {
    RequestBuilder::new()
        .vendored_path(launch.vendored_path.clone())
        .install_missing(launch.install_missing)
        .autoload(launch.autoload)
        .working_dir(launch.workdir.clone())
        .registry(launch.registry.clone())
}

fn launch(launch: &LaunchArgs, request: &ExecutionRequest) -> Result<i32> {
    let runner = launcher::select_runner(launch.runner.as_deref());
    launcher::launch(&runner, request)
}

/// Parse repeated `--arg KEY=VALUE` pairs into the named-argument map.
fn parse_named_args(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut named = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(anyhow::anyhow!("Invalid --arg '{}': expected KEY=VALUE", pair).into());
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!("Invalid --arg '{}': empty key", pair).into());
        }
        named.insert(key.to_string(), value.to_string());
    }
    Ok(named)
}
