//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use crate::requirements::merge::MergePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Airlock - isolated script and command launches with verified library versions.
#[derive(Debug, Parser)]
#[command(name = "airlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a script in a fresh isolated runner
    Run(RunArgs),

    /// Invoke a single command in a fresh isolated runner
    Exec(ExecArgs),

    /// Run a sequence of statements in one fresh isolated runner
    Batch(BatchArgs),

    /// Show the requirements a script declares
    Inspect(InspectArgs),

    /// Child-side bootstrap entry (internal)
    #[command(hide = true)]
    Bootstrap(BootstrapArgs),
}

/// Launch settings shared by all launching subcommands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LaunchArgs {
    /// Override or add a requirement: NAME, NAME=VERSION, or a {...} record
    #[arg(long = "require", value_name = "SPEC")]
    pub require: Vec<String>,

    /// How overrides combine with script-declared requirements
    #[arg(long, value_enum, default_value_t = MergePolicy::ScriptWins)]
    pub policy: MergePolicy,

    /// Ignore requirements declared in the script itself
    #[arg(long)]
    pub ignore_script_requirements: bool,

    /// Directory of vendored libraries, preferred over installed ones
    #[arg(long, value_name = "DIR")]
    pub vendored_path: Option<PathBuf>,

    /// Install unsatisfiable requirements from the registry first
    #[arg(long)]
    pub install_missing: bool,

    /// Allow implicit discovery of ambient libraries
    #[arg(long)]
    pub autoload: bool,

    /// Working directory for the target
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Runner binary to launch (default: probe PATH, then this executable)
    #[arg(long, env = "AIRLOCK_RUNNER", value_name = "BIN")]
    pub runner: Option<PathBuf>,

    /// Registry base URL for installs
    #[arg(long, env = "AIRLOCK_REGISTRY", value_name = "URL")]
    pub registry: Option<String>,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Script to run
    pub script: PathBuf,

    /// Arguments passed to the script (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,

    #[command(flatten)]
    pub launch: LaunchArgs,
}

/// Arguments for the `exec` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ExecArgs {
    /// Command to invoke (resolved inside the child)
    pub name: String,

    /// Positional arguments passed to the command (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Named argument KEY=VALUE; entries with empty values are dropped
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    pub named: Vec<String>,

    /// Auxiliary library to load before dispatch (best-effort)
    #[arg(long = "preload", value_name = "NAME")]
    pub preload: Vec<String>,

    #[command(flatten)]
    pub launch: LaunchArgs,
}

/// Arguments for the `batch` command.
#[derive(Debug, Clone, clap::Args)]
pub struct BatchArgs {
    /// Statement to execute, in order (repeatable)
    #[arg(short = 'c', long = "command", value_name = "STATEMENT", required = true)]
    pub statements: Vec<String>,

    /// Auxiliary library to load before dispatch (best-effort)
    #[arg(long = "preload", value_name = "NAME")]
    pub preload: Vec<String>,

    #[command(flatten)]
    pub launch: LaunchArgs,
}

/// Arguments for the `inspect` command.
#[derive(Debug, Clone, clap::Args)]
pub struct InspectArgs {
    /// Script to inspect
    pub script: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the hidden `bootstrap` command.
#[derive(Debug, Clone, clap::Args)]
pub struct BootstrapArgs {
    /// Encoded execution request token
    pub token: String,
}
