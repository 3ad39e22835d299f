//! Requirement extraction from target-script directives.
//!
//! Scripts declare their library dependencies in comment directives:
//!
//! ```text
//! # requires libraries: authkit, reportgen
//! # requires libraries: {name: authkit, version: 2.30.0}, {name: reportgen, min: 1.4}
//! ```
//!
//! The marker is case-insensitive. The bare form lists names with no
//! constraints; the structured form carries `{...}` records whose fields are
//! found by the first occurrence of each recognized key (`name`, the exact
//! version spellings `version` and `exact`, `min`, `max`). Records without a
//! name are silently skipped. Every directive line in the file is honored,
//! and later lines overwrite earlier entries of the same name.

use crate::error::{AirlockError, Result};
use crate::requirements::Requirement;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Directive marker line: `# requires libraries: <rest>`.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*#\s*requires\s+libraries\s*:?\s*(\S.*)$").unwrap()
});

/// One structured record within a directive.
static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").unwrap());

/// Field matchers for the closed set of recognized record keys.
static KEY_RES: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["name", "library", "version", "exact", "min", "max"]
        .into_iter()
        .map(|key| {
            let pattern = format!(
                r#"(?i)\b{}\s*[:=]\s*['"]?([A-Za-z0-9_][A-Za-z0-9_.+-]*)"#,
                key
            );
            (key, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Fields found in one structured record.
#[derive(Debug, Default)]
pub(crate) struct RecordFields {
    pub name: Option<String>,
    pub required: Option<String>,
    pub minimum: Option<String>,
    pub maximum: Option<String>,
}

/// Scan a record for the recognized keys.
///
/// `name_keys` differs by caller: directives accept only `name`, while
/// caller-supplied overrides also accept the legacy `library` alias.
pub(crate) fn scan_record(record: &str, name_keys: &[&str]) -> RecordFields {
    RecordFields {
        name: first_key_value(record, name_keys),
        required: first_key_value(record, &["version", "exact"]),
        minimum: first_key_value(record, &["min"]),
        maximum: first_key_value(record, &["max"]),
    }
}

/// Find the earliest occurrence of any of the given key spellings.
fn first_key_value(record: &str, keys: &[&str]) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for key in keys {
        let re = &KEY_RES[key];
        if let Some(caps) = re.captures(record) {
            let start = caps.get(0).unwrap().start();
            if best.as_ref().is_none_or(|(pos, _)| start < *pos) {
                best = Some((start, caps[1].to_string()));
            }
        }
    }
    best.map(|(_, value)| value)
}

/// Extract the requirement set declared by a script file.
///
/// Fails with [`AirlockError::ScriptNotFound`] before any parsing when the
/// file does not exist.
pub fn extract_from_path(path: &Path) -> Result<Vec<Requirement>> {
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => AirlockError::ScriptNotFound {
            path: path.to_path_buf(),
        },
        _ => AirlockError::Io(err),
    })?;
    Ok(extract_from_str(&text))
}

/// Extract the requirement set declared in script text.
///
/// Output is ordered by first appearance and de-duplicated by name
/// (last directive wins for a repeated name).
pub fn extract_from_str(text: &str) -> Vec<Requirement> {
    let mut requirements: Vec<Requirement> = Vec::new();

    for line in text.lines() {
        let Some(caps) = DIRECTIVE_RE.captures(line) else {
            continue;
        };
        let rest = caps[1].trim();

        if rest.contains('{') {
            for record in RECORD_RE.find_iter(rest) {
                let fields = scan_record(record.as_str(), &["name"]);
                let Some(name) = fields.name else {
                    // Records with no name are skipped, not errors.
                    continue;
                };
                upsert(
                    &mut requirements,
                    Requirement {
                        name,
                        required: fields.required,
                        minimum: fields.minimum,
                        maximum: fields.maximum,
                    },
                );
            }
        } else {
            for name in rest.split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                upsert(&mut requirements, Requirement::unconstrained(name));
            }
        }
    }

    requirements
}

/// Replace an existing entry of the same name in place, or append.
fn upsert(requirements: &mut Vec<Requirement>, incoming: Requirement) {
    if let Some(existing) = requirements.iter_mut().find(|r| r.name == incoming.name) {
        *existing = incoming;
    } else {
        requirements.push(incoming);
    }
}
