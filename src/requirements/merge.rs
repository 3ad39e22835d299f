//! Merging script-declared requirements with caller-supplied overrides.
//!
//! Name collisions between the two sources resolve under a named policy:
//! `ScriptWins` (default) keeps the script's entry, `ExternalWins` replaces
//! it with the override. Names unique to either source are always included.

use crate::error::{AirlockError, Result};
use crate::requirements::extract::scan_record;
use crate::requirements::Requirement;

/// Conflict policy for a name present in both the script and the overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MergePolicy {
    /// The script's own declaration is kept; overrides only add new names.
    #[default]
    ScriptWins,
    /// Every override replaces any script entry of the same name.
    ExternalWins,
}

/// Merge caller overrides into the extracted set under `policy`.
///
/// The result is keyed by name. Iteration order downstream is irrelevant
/// (each name resolves independently), but the returned order is kept
/// deterministic: extracted entries in first-appearance order, then new
/// override names in caller order.
pub fn merge(
    extracted: Vec<Requirement>,
    overrides: &[Requirement],
    policy: MergePolicy,
) -> Vec<Requirement> {
    let mut merged = extracted;

    for incoming in overrides {
        match merged.iter_mut().find(|r| r.name == incoming.name) {
            Some(existing) => {
                if policy == MergePolicy::ExternalWins {
                    *existing = incoming.clone();
                }
            }
            None => merged.push(incoming.clone()),
        }
    }

    merged
}

/// Parse one caller-supplied override into a [`Requirement`].
///
/// Accepted forms:
/// - `name` for an unconstrained requirement
/// - `name=1.2.3` as exact pin shorthand
/// - `{name: ..., version|exact: ..., min: ..., max: ...}` for a full record,
///   where the name field also accepts the legacy `library` alias
///
/// Fails with [`AirlockError::MissingName`] when no name can be found.
pub fn parse_override(text: &str) -> Result<Requirement> {
    let trimmed = text.trim();

    if trimmed.contains('{') {
        let fields = scan_record(trimmed, &["name", "library"]);
        let Some(name) = fields.name else {
            return Err(AirlockError::MissingName {
                record: trimmed.to_string(),
            });
        };
        return Ok(Requirement {
            name,
            required: fields.required,
            minimum: fields.minimum,
            maximum: fields.maximum,
        });
    }

    if let Some((name, version)) = trimmed.split_once('=') {
        let name = name.trim();
        let version = version.trim_start_matches('=').trim();
        if name.is_empty() || version.is_empty() {
            return Err(AirlockError::MissingName {
                record: trimmed.to_string(),
            });
        }
        return Ok(Requirement::exact(name, version));
    }

    if trimmed.is_empty() {
        return Err(AirlockError::MissingName {
            record: text.to_string(),
        });
    }
    Ok(Requirement::unconstrained(trimmed))
}
