//! Isolated child launches.
//!
//! The launcher starts a brand-new runner process, hands it the encoded
//! execution request as one opaque argument, and blocks until it exits. The
//! child reads no configuration files and no ambient settings beyond what
//! the request carries, so nothing from the parent's session bleeds in.
//! Standard streams are inherited, which keeps the child's interactive
//! output (device-code prompts and the like) visible.
//!
//! There is no retry: the engine is deterministic, so re-running a failed
//! launch with the same inputs is expected to fail identically.

use crate::error::Result;
use crate::request::{codec, ExecutionRequest};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Binary name probed on PATH when no runner is specified.
pub const RUNNER_BINARY: &str = "airlock";

/// Hidden subcommand the child is started with.
pub const BOOTSTRAP_COMMAND: &str = "bootstrap";

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// On Windows, executability is determined by file extension, not permission bits.
#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    true
}

/// Parse the system PATH environment variable into a list of directories.
pub fn parse_system_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default()
}

/// Resolve a binary by iterating over PATH entries.
///
/// Returns the first match that exists and is executable. Does NOT use
/// the `which` command — `which` behavior varies across systems and
/// is sometimes a shell builtin with inconsistent error handling.
pub fn resolve_on_path(binary: &str, path_entries: &[PathBuf]) -> Option<PathBuf> {
    for dir in path_entries {
        let candidate = dir.join(binary);
        if candidate.is_file() && is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Select the runner binary for the child process.
///
/// Caller-specified runners are used as given. Otherwise the installed
/// runner is probed on PATH first, with the current executable as fallback
/// for builds that are not on PATH yet.
pub fn select_runner(explicit: Option<&Path>) -> PathBuf {
    if let Some(runner) = explicit {
        return runner.to_path_buf();
    }
    if let Some(found) = resolve_on_path(RUNNER_BINARY, &parse_system_path()) {
        return found;
    }
    std::env::current_exe().unwrap_or_else(|_| PathBuf::from(RUNNER_BINARY))
}

/// Launch the child runner and block until it exits.
///
/// Returns the child's exit code, which is this operation's result code.
/// A child killed by a signal reports failure (code 1).
pub fn launch(runner: &Path, request: &ExecutionRequest) -> Result<i32> {
    let token = codec::encode(request)?;

    tracing::debug!(
        "Launching {} for {} with {} requirement(s)",
        runner.display(),
        request.target.describe(),
        request.requirements.len()
    );

    let status = Command::new(runner)
        .arg(BOOTSTRAP_COMMAND)
        .arg(&token)
        .status()?;

    Ok(status.code().unwrap_or(1))
}
