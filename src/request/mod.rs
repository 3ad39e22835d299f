//! The execution request: what to run, with which libraries, under which
//! flags.
//!
//! A request is built once per invocation by the parent, serialized to a
//! single transport token (see [`codec`]), and decoded inside the child.
//! Builder and bootstrap share these types, so the two sides cannot drift
//! apart structurally.

pub mod codec;

use crate::error::{AirlockError, Result};
use crate::requirements::Requirement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What the child should execute.
///
/// Sequence inputs never reach the wire: the parent flattens them into a
/// temporary script before request building, so a sequence arrives here as an
/// ordinary `Script` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A script file, run with positional arguments.
    Script { path: PathBuf, args: Vec<String> },

    /// A named command, resolved at dispatch time inside the child.
    Command {
        name: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        named_args: BTreeMap<String, String>,
    },
}

impl Target {
    /// Short description for errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Target::Script { path, .. } => format!("script '{}'", path.display()),
            Target::Command { name, .. } => format!("command '{}'", name),
        }
    }
}

/// A complete, transportable description of one isolated launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// What to run.
    pub target: Target,

    /// Canonical requirement set (already merged).
    #[serde(default)]
    pub requirements: Vec<Requirement>,

    /// Vendored library root, preferred over installed libraries.
    #[serde(default)]
    pub vendored_path: Option<PathBuf>,

    /// Install unsatisfiable requirements from the registry before resolving.
    #[serde(default)]
    pub install_missing: bool,

    /// Allow implicit discovery of ambient libraries.
    #[serde(default)]
    pub autoload: bool,

    /// Working directory for the child (best-effort).
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Auxiliary convenience libraries, loaded best-effort before dispatch.
    #[serde(default)]
    pub preload: Vec<String>,

    /// Registry base URL override for installs.
    #[serde(default)]
    pub registry: Option<String>,
}

/// Builds an [`ExecutionRequest`] from caller inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    requirements: Vec<Requirement>,
    vendored_path: Option<PathBuf>,
    install_missing: bool,
    autoload: bool,
    working_dir: Option<PathBuf>,
    preload: Vec<String>,
    registry: Option<String>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requirements(mut self, requirements: Vec<Requirement>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn vendored_path(mut self, path: Option<PathBuf>) -> Self {
        self.vendored_path = path;
        self
    }

    pub fn install_missing(mut self, install: bool) -> Self {
        self.install_missing = install;
        self
    }

    pub fn autoload(mut self, autoload: bool) -> Self {
        self.autoload = autoload;
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn preload(mut self, names: Vec<String>) -> Self {
        self.preload = names;
        self
    }

    pub fn registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    /// Build a request for a script target.
    ///
    /// The path is resolved to an absolute, existence-verified location;
    /// missing scripts fail here, before any child process is spawned.
    pub fn script(self, path: &Path, args: Vec<String>) -> Result<ExecutionRequest> {
        let path = fs::canonicalize(path).map_err(|_| AirlockError::ScriptNotFound {
            path: path.to_path_buf(),
        })?;
        Ok(self.finish(Target::Script { path, args }))
    }

    /// Build a request for a command target.
    ///
    /// Command names are deliberately not checked here: they resolve at
    /// dispatch time, inside the child's configured environment.
    pub fn command(
        self,
        name: &str,
        args: Vec<String>,
        named_args: BTreeMap<String, String>,
    ) -> ExecutionRequest {
        self.finish(Target::Command {
            name: name.to_string(),
            args,
            named_args,
        })
    }

    fn finish(self, target: Target) -> ExecutionRequest {
        ExecutionRequest {
            target,
            requirements: self.requirements,
            vendored_path: self.vendored_path,
            install_missing: self.install_missing,
            autoload: self.autoload,
            working_dir: self.working_dir,
            preload: self.preload,
            registry: self.registry,
        }
    }
}
