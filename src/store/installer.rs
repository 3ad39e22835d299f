//! Remote registry installs for unsatisfiable requirements.
//!
//! The registry is a plain HTTP file layout:
//!
//! ```text
//! <base>/<name>/index.json                      {"versions": ["2.30.0", ...]}
//! <base>/<name>/<version>/manifest.json         {"name", "version", "files": [...]}
//! <base>/<name>/<version>/files/<file>          payload files
//! ```
//!
//! Installs land in the user-scoped store root. There is no locking:
//! concurrent invocations installing the same library race at the
//! filesystem level, an accepted limitation.

use crate::error::{AirlockError, Result};
use crate::requirements::Requirement;
use crate::store::{write_manifest, LibraryStore};
use crate::version::Version;
use anyhow::{bail, Context};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Default registry base URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.airlock.run/v1";

/// Version inventory for one library.
#[derive(Debug, Deserialize)]
struct RegistryIndex {
    versions: Vec<String>,
}

/// Install manifest for one library version.
#[derive(Debug, Deserialize)]
struct RegistryManifest {
    name: String,
    version: String,
    #[serde(default)]
    files: Vec<String>,
}

/// Client for the library registry.
pub struct RegistryClient {
    base: String,
    client: Client,
}

impl RegistryClient {
    /// Create a client with the default 30-second request timeout.
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            client: Client::builder()
                .user_agent("airlock")
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// The registry base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Published versions of a library, newest first.
    pub fn available_versions(&self, name: &str) -> Result<Vec<Version>> {
        let index: RegistryIndex = self
            .get_json(&format!("{}/{}/index.json", self.base, name))
            .map_err(|err| install_error(name, err))?;
        let mut versions: Vec<Version> = index
            .versions
            .iter()
            .filter_map(|raw| Version::parse(raw))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    /// Install the best published version satisfying `requirement` into
    /// `dest_root`, returning the bundle location.
    pub fn install(&self, requirement: &Requirement, dest_root: &Path) -> Result<PathBuf> {
        let name = &requirement.name;
        let versions = self.available_versions(name)?;
        let Some(selected) = versions.into_iter().find(|v| requirement.accepts(v)) else {
            return Err(AirlockError::Install {
                name: name.clone(),
                message: format!("registry has no version satisfying {}", requirement.constraint_display()),
            });
        };

        let manifest: RegistryManifest = self
            .get_json(&format!("{}/{}/{}/manifest.json", self.base, name, selected))
            .map_err(|err| install_error(name, err))?;
        if manifest.name != *name {
            return Err(AirlockError::Install {
                name: name.clone(),
                message: format!("registry manifest names '{}'", manifest.name),
            });
        }

        let location = dest_root.join(name).join(selected.to_string());
        write_manifest(&location, &manifest.name, &manifest.version)?;

        for file in &manifest.files {
            let relative = sanitize_relative(file).map_err(|err| install_error(name, err))?;
            let bytes = self
                .get_bytes(&format!(
                    "{}/{}/{}/files/{}",
                    self.base, name, selected, file
                ))
                .map_err(|err| install_error(name, err))?;
            let dest = location.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, bytes)?;
        }

        tracing::info!("Installed {} {} to {}", name, selected, location.display());
        Ok(location)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            bail!("HTTP {} fetching {}", response.status(), url);
        }
        response
            .json()
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            bail!("HTTP {} fetching {}", response.status(), url);
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Install a requirement only when the store cannot already satisfy it.
///
/// Satisfiability uses the same matching logic as resolution, evaluated
/// against the installed inventory without loading anything. Returns whether
/// an install happened. Install failures propagate: a missing mandatory
/// dependency makes the eventual dispatch meaningless.
pub fn ensure_installed(
    store: &LibraryStore,
    requirement: &Requirement,
    client: &RegistryClient,
    dest_root: &Path,
) -> Result<bool> {
    if store.find_match(requirement).is_some() {
        tracing::debug!("'{}' already satisfiable, skipping install", requirement.name);
        return Ok(false);
    }
    client.install(requirement, dest_root)?;
    Ok(true)
}

fn install_error(name: &str, err: anyhow::Error) -> AirlockError {
    AirlockError::Install {
        name: name.to_string(),
        message: format!("{:#}", err),
    }
}

/// Reject registry file names that would escape the bundle directory.
fn sanitize_relative(file: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(file);
    if path.is_absolute() {
        bail!("registry file name '{}' is absolute", file);
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => bail!("registry file name '{}' escapes the bundle", file),
        }
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn mock_library(server: &MockServer, name: &str, versions: &[&str], files: &[(&str, &str)]) {
        server.mock(|when, then| {
            when.method(GET).path(format!("/{}/index.json", name));
            then.status(200)
                .json_body(serde_json::json!({ "versions": versions }));
        });
        for version in versions {
            let file_names: Vec<&str> = files.iter().map(|(f, _)| *f).collect();
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/{}/{}/manifest.json", name, version));
                then.status(200).json_body(serde_json::json!({
                    "name": name,
                    "version": version,
                    "files": file_names,
                }));
            });
            for (file, content) in files {
                server.mock(|when, then| {
                    when.method(GET)
                        .path(format!("/{}/{}/files/{}", name, version, file));
                    then.status(200).body(*content);
                });
            }
        }
    }

    #[test]
    fn install_exact_pin_fetches_that_version() {
        let server = MockServer::start();
        mock_library(
            &server,
            "authkit",
            &["2.31.0", "2.30.0"],
            &[("auth.sh", "echo auth\n")],
        );
        let temp = TempDir::new().unwrap();

        let client = RegistryClient::new(&server.base_url());
        let location = client
            .install(&Requirement::exact("authkit", "2.30.0"), temp.path())
            .unwrap();

        assert!(location.ends_with("authkit/2.30.0"));
        assert!(location.join(crate::store::MANIFEST_FILE).exists());
        assert_eq!(
            fs::read_to_string(location.join("auth.sh")).unwrap(),
            "echo auth\n"
        );
    }

    #[test]
    fn install_unconstrained_takes_newest() {
        let server = MockServer::start();
        mock_library(&server, "authkit", &["2.31.0", "2.30.0"], &[]);
        let temp = TempDir::new().unwrap();

        let client = RegistryClient::new(&server.base_url());
        let location = client
            .install(&Requirement::unconstrained("authkit"), temp.path())
            .unwrap();
        assert!(location.ends_with("authkit/2.31.0"));
    }

    #[test]
    fn install_fails_when_no_published_version_satisfies() {
        let server = MockServer::start();
        mock_library(&server, "authkit", &["2.31.0"], &[]);
        let temp = TempDir::new().unwrap();

        let client = RegistryClient::new(&server.base_url());
        let err = client
            .install(&Requirement::exact("authkit", "9.9.9"), temp.path())
            .unwrap_err();
        assert!(matches!(err, AirlockError::Install { .. }));
    }

    #[test]
    fn install_fails_on_missing_library() {
        let server = MockServer::start();
        let temp = TempDir::new().unwrap();

        let client = RegistryClient::new(&server.base_url());
        let err = client
            .install(&Requirement::unconstrained("ghostlib"), temp.path())
            .unwrap_err();
        assert!(matches!(err, AirlockError::Install { .. }));
    }

    #[test]
    fn ensure_installed_skips_satisfiable_requirements() {
        let server = MockServer::start();
        let store_dir = TempDir::new().unwrap();
        crate::store::write_manifest(
            &store_dir.path().join("authkit").join("2.30.0"),
            "authkit",
            "2.30.0",
        )
        .unwrap();

        let store = LibraryStore::new(vec![store_dir.path().to_path_buf()]);
        let client = RegistryClient::new(&server.base_url());
        // No mocks registered: any request would fail, proving none is made.
        let installed = ensure_installed(
            &store,
            &Requirement::exact("authkit", "2.30.0"),
            &client,
            store_dir.path(),
        )
        .unwrap();
        assert!(!installed);
    }

    #[test]
    fn ensure_installed_installs_when_unsatisfiable() {
        let server = MockServer::start();
        mock_library(&server, "authkit", &["2.30.0"], &[]);
        let store_dir = TempDir::new().unwrap();

        let store = LibraryStore::new(vec![store_dir.path().to_path_buf()]);
        let client = RegistryClient::new(&server.base_url());
        let installed = ensure_installed(
            &store,
            &Requirement::exact("authkit", "2.30.0"),
            &client,
            store_dir.path(),
        )
        .unwrap();
        assert!(installed);

        // The fresh bundle is immediately visible to resolution.
        assert!(store.find_match(&Requirement::exact("authkit", "2.30.0")).is_some());
    }

    #[test]
    fn sanitize_rejects_escaping_file_names() {
        assert!(sanitize_relative("../evil.sh").is_err());
        assert!(sanitize_relative("/etc/passwd").is_err());
        assert!(sanitize_relative("bin/tool").is_ok());
        assert!(sanitize_relative("auth.sh").is_ok());
    }

    #[test]
    fn available_versions_sorted_newest_first() {
        let server = MockServer::start();
        mock_library(&server, "authkit", &["1.0.0", "2.0.0", "1.5.0"], &[]);

        let client = RegistryClient::new(&server.base_url());
        let versions = client.available_versions("authkit").unwrap();
        assert_eq!(versions[0], Version::parse("2.0.0").unwrap());
        assert_eq!(versions[2], Version::parse("1.0.0").unwrap());
    }
}
