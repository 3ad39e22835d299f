//! The on-disk library store.
//!
//! Libraries live in versioned bundles, one directory per version:
//!
//! ```text
//! <root>/<name>/<version>/lib.json      manifest: {"name": ..., "version": ...}
//! <root>/<name>/<version>/...           payload files, optionally bin/
//! ```
//!
//! A store is an ordered list of root directories. Earlier roots are
//! preferred, which is how a vendored path shadows the user-scoped store.
//! Inventory is enumerated fresh for every child process; nothing is cached
//! across invocations.

pub mod installer;

use crate::error::{AirlockError, Result};
use crate::requirements::Requirement;
use crate::version::Version;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name inside each version bundle.
pub const MANIFEST_FILE: &str = "lib.json";

/// Environment variable carrying ambient store roots (honored only when
/// autoload is enabled) and, on the way out, the dispatched target's
/// resolved library locations.
pub const LIB_PATH_ENV: &str = "AIRLOCK_LIB_PATH";

/// A library bundle's manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LibraryManifest {
    pub name: String,
    pub version: String,
}

/// One installed version of a library, discovered during enumeration.
#[derive(Debug, Clone)]
pub struct InstalledLibrary {
    pub name: String,
    pub version: Version,
    pub location: PathBuf,
}

/// A requirement matched to a concrete on-disk version.
///
/// Computed fresh inside each child process; never cached across processes.
#[derive(Debug, Clone)]
pub struct ResolvedLibrary {
    pub name: String,
    pub version: Version,
    pub location: PathBuf,
}

/// An ordered set of store roots.
#[derive(Debug, Clone)]
pub struct LibraryStore {
    roots: Vec<PathBuf>,
}

impl LibraryStore {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The user-scoped store root, where remote installs land.
    pub fn user_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("airlock")
            .join("lib")
    }

    /// Ambient store roots from [`LIB_PATH_ENV`].
    pub fn ambient_roots() -> Vec<PathBuf> {
        std::env::var_os(LIB_PATH_ENV)
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default()
    }

    /// Enumerate every installed version of `name`, newest first.
    ///
    /// Bundles with unreadable manifests, mismatched names, or unparsable
    /// versions are skipped. For equal versions, earlier roots win.
    pub fn installed_versions(&self, name: &str) -> Vec<InstalledLibrary> {
        let mut found = Vec::new();

        for root in &self.roots {
            let library_dir = root.join(name);
            let Ok(entries) = fs::read_dir(&library_dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let location = entry.path();
                if !location.is_dir() {
                    continue;
                }
                let manifest = match Self::manifest_at(&location) {
                    Ok(manifest) => manifest,
                    Err(err) => {
                        tracing::debug!(
                            "Skipping {}: unreadable manifest ({})",
                            location.display(),
                            err
                        );
                        continue;
                    }
                };
                if manifest.name != name {
                    tracing::debug!(
                        "Skipping {}: manifest names '{}'",
                        location.display(),
                        manifest.name
                    );
                    continue;
                }
                let Some(version) = Version::parse(&manifest.version) else {
                    tracing::debug!(
                        "Skipping {}: unparsable version '{}'",
                        location.display(),
                        manifest.version
                    );
                    continue;
                };
                found.push(InstalledLibrary {
                    name: name.to_string(),
                    version,
                    location,
                });
            }
        }

        // Stable sort: ties keep root order, so vendored copies shadow
        // user-store copies of the same version.
        found.sort_by(|a, b| b.version.cmp(&a.version));
        found
    }

    /// Select the installed version a requirement would resolve to, without
    /// loading it. Shared by resolution and install satisfiability checks.
    pub fn find_match(&self, requirement: &Requirement) -> Option<InstalledLibrary> {
        self.installed_versions(&requirement.name)
            .into_iter()
            .find(|installed| requirement.accepts(&installed.version))
    }

    /// Resolve a requirement to a concrete on-disk library.
    ///
    /// Exact pins select among the full installed inventory and load by
    /// location, never by name, so the search path cannot substitute a
    /// different version. Ranged and unconstrained requirements take the
    /// highest acceptable version as a first pass; [`verify`] re-checks the
    /// loaded result afterwards.
    pub fn resolve(&self, requirement: &Requirement) -> Result<ResolvedLibrary> {
        let Some(matched) = self.find_match(requirement) else {
            return Err(AirlockError::VersionNotFound {
                name: requirement.name.clone(),
                constraint: requirement.constraint_display(),
            });
        };
        self.load_at(&requirement.name, &matched.location)
    }

    /// Load a library from a concrete location.
    pub fn load_at(&self, name: &str, location: &Path) -> Result<ResolvedLibrary> {
        let manifest = Self::manifest_at(location)?;
        if manifest.name != name {
            return Err(AirlockError::Other(anyhow::anyhow!(
                "Manifest at {} names '{}', expected '{}'",
                location.display(),
                manifest.name,
                name
            )));
        }
        let version = Version::parse(&manifest.version).ok_or_else(|| {
            AirlockError::Other(anyhow::anyhow!(
                "Manifest at {} has unparsable version '{}'",
                location.display(),
                manifest.version
            ))
        })?;
        Ok(ResolvedLibrary {
            name: name.to_string(),
            version,
            location: location.to_path_buf(),
        })
    }

    /// Read the manifest inside a version bundle.
    pub fn manifest_at(location: &Path) -> Result<LibraryManifest> {
        let path = location.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read library manifest at {}", path.display()))?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse library manifest at {}", path.display()))?;
        Ok(manifest)
    }
}

/// Re-verify a loaded library against its requirement.
///
/// The version is re-queried from the loaded location rather than trusted
/// from resolution, which catches name-only and ranged loads that picked an
/// unacceptable version.
pub fn verify(requirement: &Requirement, resolved: &ResolvedLibrary) -> Result<()> {
    let manifest = LibraryStore::manifest_at(&resolved.location)?;
    let loaded = Version::parse(&manifest.version).ok_or_else(|| {
        AirlockError::VersionMismatch {
            name: requirement.name.clone(),
            loaded: manifest.version.clone(),
            constraint: requirement.constraint_display(),
        }
    })?;

    if let Some(violated) = requirement.violation(&loaded) {
        return Err(AirlockError::VersionMismatch {
            name: requirement.name.clone(),
            loaded: manifest.version,
            constraint: violated,
        });
    }
    Ok(())
}

/// Write a version bundle's manifest (used by installs and test fixtures).
pub fn write_manifest(location: &Path, name: &str, version: &str) -> Result<()> {
    fs::create_dir_all(location)?;
    let manifest = LibraryManifest {
        name: name.to_string(),
        version: version.to_string(),
    };
    let text = serde_json::to_string_pretty(&manifest)
        .map_err(|err| AirlockError::Other(err.into()))?;
    fs::write(location.join(MANIFEST_FILE), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_library(root: &Path, name: &str, version: &str) -> PathBuf {
        let location = root.join(name).join(version);
        write_manifest(&location, name, version).unwrap();
        location
    }

    #[test]
    fn installed_versions_are_sorted_newest_first() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "2.30.0");
        add_library(temp.path(), "authkit", "2.31.0");
        add_library(temp.path(), "authkit", "1.9.9");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let installed = store.installed_versions("authkit");

        assert_eq!(installed.len(), 3);
        assert_eq!(installed[0].version, Version::parse("2.31.0").unwrap());
        assert_eq!(installed[2].version, Version::parse("1.9.9").unwrap());
    }

    #[test]
    fn enumeration_skips_broken_bundles() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "1.0.0");

        // Unreadable manifest
        let broken = temp.path().join("authkit").join("2.0.0");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(MANIFEST_FILE), "not json").unwrap();

        // Manifest naming a different library
        let imposter = temp.path().join("authkit").join("3.0.0");
        write_manifest(&imposter, "other", "3.0.0").unwrap();

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let installed = store.installed_versions("authkit");
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].version, Version::parse("1.0.0").unwrap());
    }

    #[test]
    fn earlier_roots_shadow_later_ones_for_equal_versions() {
        let vendored = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let vendored_loc = add_library(vendored.path(), "authkit", "2.30.0");
        add_library(user.path(), "authkit", "2.30.0");

        let store = LibraryStore::new(vec![
            vendored.path().to_path_buf(),
            user.path().to_path_buf(),
        ]);
        let resolved = store
            .resolve(&Requirement::exact("authkit", "2.30.0"))
            .unwrap();
        assert_eq!(resolved.location, vendored_loc);
    }

    #[test]
    fn exact_pin_resolves_that_version_only() {
        let temp = TempDir::new().unwrap();
        let pinned = add_library(temp.path(), "authkit", "2.30.0");
        add_library(temp.path(), "authkit", "2.31.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let resolved = store
            .resolve(&Requirement::exact("authkit", "2.30.0"))
            .unwrap();

        // Never silently substitutes the newer install.
        assert_eq!(resolved.version, Version::parse("2.30.0").unwrap());
        assert_eq!(resolved.location, pinned);
    }

    #[test]
    fn exact_pin_with_no_match_fails_version_not_found() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "2.31.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let err = store
            .resolve(&Requirement::exact("authkit", "2.30.0"))
            .unwrap_err();
        assert!(matches!(err, AirlockError::VersionNotFound { .. }));
    }

    #[test]
    fn ranged_requirement_takes_highest_acceptable() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "1.9.0");
        add_library(temp.path(), "authkit", "2.4.0");
        add_library(temp.path(), "authkit", "3.1.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let requirement = Requirement {
            name: "authkit".into(),
            required: None,
            minimum: Some("2.0.0".into()),
            maximum: Some("3.0.0".into()),
        };
        let resolved = store.resolve(&requirement).unwrap();
        assert_eq!(resolved.version, Version::parse("2.4.0").unwrap());
    }

    #[test]
    fn unconstrained_requirement_takes_newest() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "1.0.0");
        add_library(temp.path(), "authkit", "2.0.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let resolved = store.resolve(&Requirement::unconstrained("authkit")).unwrap();
        assert_eq!(resolved.version, Version::parse("2.0.0").unwrap());
    }

    #[test]
    fn unknown_library_fails_version_not_found() {
        let temp = TempDir::new().unwrap();
        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let err = store
            .resolve(&Requirement::unconstrained("ghostlib"))
            .unwrap_err();
        assert!(matches!(err, AirlockError::VersionNotFound { .. }));
    }

    #[test]
    fn verify_passes_for_satisfied_constraints() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "2.30.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let requirement = Requirement::exact("authkit", "2.30.0");
        let resolved = store.resolve(&requirement).unwrap();
        verify(&requirement, &resolved).unwrap();
    }

    #[test]
    fn verify_catches_on_disk_version_drift() {
        let temp = TempDir::new().unwrap();
        let location = add_library(temp.path(), "authkit", "2.30.0");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let requirement = Requirement::exact("authkit", "2.30.0");
        let resolved = store.resolve(&requirement).unwrap();

        // The bundle changes between load and verification.
        write_manifest(&location, "authkit", "2.31.0").unwrap();

        let err = verify(&requirement, &resolved).unwrap_err();
        match err {
            AirlockError::VersionMismatch { loaded, .. } => assert_eq!(loaded, "2.31.0"),
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn equal_bounds_reject_neighbors_post_load() {
        let temp = TempDir::new().unwrap();
        add_library(temp.path(), "authkit", "2.0.1");

        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        let requirement = Requirement {
            name: "authkit".into(),
            required: None,
            minimum: Some("2.0.0".into()),
            maximum: Some("2.0.0".into()),
        };

        // Selection already rejects 2.0.1, so resolution reports no match.
        let err = store.resolve(&requirement).unwrap_err();
        assert!(matches!(err, AirlockError::VersionNotFound { .. }));

        // A drifted bundle is still caught by post-load verification.
        add_library(temp.path(), "authkit", "2.0.0");
        let resolved = store.resolve(&requirement).unwrap();
        write_manifest(&resolved.location, "authkit", "1.9.9").unwrap();
        let err = verify(&requirement, &resolved).unwrap_err();
        assert!(matches!(err, AirlockError::VersionMismatch { .. }));
    }

    #[test]
    fn load_at_rejects_name_mismatch() {
        let temp = TempDir::new().unwrap();
        let location = add_library(temp.path(), "other", "1.0.0");
        let store = LibraryStore::new(vec![temp.path().to_path_buf()]);
        assert!(store.load_at("authkit", &location).is_err());
    }

    #[test]
    fn ambient_roots_parse_env_var() {
        // Only shape is asserted here; the variable itself is exercised in
        // the integration tests to avoid mutating this process's env.
        let roots = LibraryStore::ambient_roots();
        let _ = roots.len();
    }
}
