//! Library requirements: named, optionally version-constrained dependencies.
//!
//! A [`Requirement`] is either unconstrained (load whatever resolves first),
//! exactly pinned, or bounded by inclusive minimum/maximum versions. When an
//! exact pin and bounds are both present, the pin wins and the bounds are
//! advisory only.

pub mod extract;
pub mod merge;

use crate::version::Version;
use serde::{Deserialize, Serialize};

/// A named library plus an optional exact or ranged version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Library name (unique key within one invocation).
    pub name: String,

    /// Exact version pin. Takes precedence over the bounds below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,

    /// Inclusive minimum version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<String>,

    /// Inclusive maximum version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<String>,
}

impl Requirement {
    /// A requirement with no version constraint.
    pub fn unconstrained(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: None,
            minimum: None,
            maximum: None,
        }
    }

    /// A requirement pinned to one exact version.
    pub fn exact(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            required: Some(version.to_string()),
            minimum: None,
            maximum: None,
        }
    }

    /// Whether any version constraint is present.
    pub fn has_constraints(&self) -> bool {
        self.required.is_some() || self.minimum.is_some() || self.maximum.is_some()
    }

    /// Human-readable rendering of the constraint, for errors and logs.
    pub fn constraint_display(&self) -> String {
        if let Some(required) = &self.required {
            return format!("version {}", required);
        }
        match (&self.minimum, &self.maximum) {
            (Some(min), Some(max)) => format!("versions {} through {}", min, max),
            (Some(min), None) => format!("minimum version {}", min),
            (None, Some(max)) => format!("maximum version {}", max),
            (None, None) => "any version".to_string(),
        }
    }

    /// Whether `candidate` satisfies every stated constraint.
    pub fn accepts(&self, candidate: &Version) -> bool {
        self.violation(candidate).is_none()
    }

    /// The first violated constraint for `candidate`, if any.
    ///
    /// The exact pin is checked alone when present; bounds are only consulted
    /// for unpinned requirements. Bounds that fail to parse can never be
    /// proven satisfied and are reported as violated.
    pub fn violation(&self, candidate: &Version) -> Option<String> {
        if let Some(required) = &self.required {
            return match Version::parse(required) {
                Some(pin) if *candidate == pin => None,
                _ => Some(format!("exact version {}", required)),
            };
        }

        if let Some(min) = &self.minimum {
            match Version::parse(min) {
                Some(bound) if *candidate >= bound => {}
                _ => return Some(format!("minimum version {}", min)),
            }
        }
        if let Some(max) = &self.maximum {
            match Version::parse(max) {
                Some(bound) if *candidate <= bound => {}
                _ => return Some(format!("maximum version {}", max)),
            }
        }
        None
    }
}
