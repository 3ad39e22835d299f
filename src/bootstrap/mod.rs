//! Child-side bootstrap.
//!
//! Runs inside the freshly spawned runner process. The sequence is linear
//! with no backward transitions:
//!
//! 1. decode the transport token (fatal on failure)
//! 2. configure the environment (working directory and foundation preloads
//!    are best-effort; everything here is scoped to this process)
//! 3. install unsatisfiable requirements when requested (failures abort)
//! 4. resolve and verify every requirement (failures abort, before dispatch)
//! 5. preload auxiliary convenience libraries (best-effort)
//! 6. dispatch the target and relay its exit code
//!
//! Steps 2 and 5 are the only declared non-fatal steps; they cover
//! conveniences, not requirements.

use crate::error::{AirlockError, Result};
use crate::launcher::is_executable;
use crate::request::{codec, ExecutionRequest, Target};
use crate::requirements::Requirement;
use crate::store::installer::{ensure_installed, RegistryClient, DEFAULT_REGISTRY};
use crate::store::{verify, LibraryStore, ResolvedLibrary, LIB_PATH_ENV};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Foundational utility libraries the dispatch step conventionally relies
/// on. Loaded best-effort: their absence is never fatal.
pub const FOUNDATION_LIBRARIES: &[&str] = &["airlock-core"];

/// Everything the bootstrap accumulates before dispatch.
struct Session {
    store: LibraryStore,
    loaded: Vec<ResolvedLibrary>,
}

/// Decode and execute one request, returning the target's exit code.
pub fn run(token: &str) -> Result<i32> {
    let request = codec::decode(token)?;
    let mut session = configure(&request);

    if request.install_missing && !request.requirements.is_empty() {
        install_missing(&session.store, &request)?;
    }

    for requirement in &request.requirements {
        let resolved = session.store.resolve(requirement)?;
        verify(requirement, &resolved)?;
        tracing::debug!(
            "Loaded {} {} from {}",
            resolved.name,
            resolved.version,
            resolved.location.display()
        );
        session.loaded.push(resolved);
    }

    preload_auxiliary(&mut session, &request);

    dispatch(&request, &session)
}

/// Build the store and apply the request's environment settings.
///
/// Autoload disabled (the default) means ambient roots are ignored: every
/// dependency must be loaded explicitly, which is the determinism guarantee.
fn configure(request: &ExecutionRequest) -> Session {
    if let Some(dir) = &request.working_dir {
        if let Err(err) = std::env::set_current_dir(dir) {
            tracing::warn!(
                "Could not change working directory to {}: {}",
                dir.display(),
                err
            );
        }
    }

    let mut roots = Vec::new();
    if let Some(vendored) = &request.vendored_path {
        if vendored.is_dir() {
            roots.push(vendored.clone());
        } else {
            tracing::warn!(
                "Vendored path {} does not exist, ignoring",
                vendored.display()
            );
        }
    }
    roots.push(LibraryStore::user_root());
    if request.autoload {
        roots.extend(LibraryStore::ambient_roots());
    }

    let store = LibraryStore::new(roots);
    let mut session = Session {
        store,
        loaded: Vec::new(),
    };

    for name in FOUNDATION_LIBRARIES {
        match session.store.resolve(&Requirement::unconstrained(name)) {
            Ok(resolved) => session.loaded.push(resolved),
            Err(err) => tracing::debug!("Foundation library '{}' not loaded: {}", name, err),
        }
    }

    session
}

/// Install every requirement the store cannot already satisfy.
fn install_missing(store: &LibraryStore, request: &ExecutionRequest) -> Result<()> {
    let base = request.registry.as_deref().unwrap_or(DEFAULT_REGISTRY);
    let client = RegistryClient::new(base);
    let dest = LibraryStore::user_root();

    for requirement in &request.requirements {
        ensure_installed(store, requirement, &client, &dest)?;
    }
    Ok(())
}

/// Load auxiliary convenience libraries by name, best-effort.
///
/// Only command and sequence invocations carry preloads; these typically
/// exist to enable discovery of further commands, not as hard requirements.
fn preload_auxiliary(session: &mut Session, request: &ExecutionRequest) {
    for name in &request.preload {
        match session.store.resolve(&Requirement::unconstrained(name)) {
            Ok(resolved) => session.loaded.push(resolved),
            Err(err) => tracing::warn!("Auxiliary library '{}' not loaded: {}", name, err),
        }
    }
}

/// Execute the target with the curated environment and relay its exit code.
fn dispatch(request: &ExecutionRequest, session: &Session) -> Result<i32> {
    let mut command = target_command(&request.target);
    command.env(LIB_PATH_ENV, lib_path_value(request, session)?);
    if let Some(path) = augmented_path(session) {
        command.env("PATH", path);
    }

    let status = command.status().map_err(|err| AirlockError::Dispatch {
        target: request.target.describe(),
        message: err.to_string(),
    })?;

    Ok(status.code().unwrap_or(1))
}

/// Build the process invocation for a target.
///
/// Scripts with the exec bit run directly; others go through `sh`, so a
/// plain-text script never aborts the run for permission reasons. Command
/// names resolve at spawn time against the child's PATH. Named arguments
/// are rendered as `--key value` pairs, stripped of empty values.
fn target_command(target: &Target) -> Command {
    match target {
        Target::Script { path, args } => {
            let mut command = if is_executable(path) {
                Command::new(path)
            } else {
                let mut sh = Command::new("sh");
                sh.arg(path);
                sh
            };
            command.args(args);
            command
        }
        Target::Command {
            name,
            args,
            named_args,
        } => {
            let mut command = Command::new(name);
            for (key, value) in named_args {
                if value.trim().is_empty() {
                    continue;
                }
                command.arg(format!("--{}", key));
                command.arg(value);
            }
            command.args(args);
            command
        }
    }
}

/// The library path exported to the target: every loaded location, plus the
/// store roots themselves when autoload is enabled.
fn lib_path_value(request: &ExecutionRequest, session: &Session) -> Result<OsString> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for resolved in &session.loaded {
        if !entries.contains(&resolved.location) {
            entries.push(resolved.location.clone());
        }
    }
    if request.autoload {
        for root in session.store.roots() {
            if !entries.contains(root) {
                entries.push(root.clone());
            }
        }
    }

    std::env::join_paths(&entries).map_err(|err| AirlockError::Dispatch {
        target: request.target.describe(),
        message: format!("unusable library path entry: {}", err),
    })
}

/// PATH with each loaded bundle's `bin/` directory prepended, if any exist.
fn augmented_path(session: &Session) -> Option<OsString> {
    let bins: Vec<PathBuf> = session
        .loaded
        .iter()
        .map(|resolved| resolved.location.join("bin"))
        .filter(|bin| bin.is_dir())
        .collect();
    if bins.is_empty() {
        return None;
    }

    let mut entries = bins;
    entries.extend(crate::launcher::parse_system_path());
    std::env::join_paths(&entries).ok()
}
