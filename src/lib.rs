//! Airlock - isolated script and command launches with verified library
//! versions.
//!
//! Airlock runs a script, a single command, or a statement sequence inside a
//! freshly started runner process with an explicit, verified set of versioned
//! library dependencies, so runs that need conflicting versions of the same
//! library never bleed into each other.
//!
//! # Modules
//!
//! - [`bootstrap`] - Child-side decode, resolution, verification, dispatch
//! - [`cli`] - Command-line interface and argument parsing
//! - [`error`] - Error types and result aliases
//! - [`launcher`] - Runner selection and isolated child launches
//! - [`request`] - Execution requests and their transport encoding
//! - [`requirements`] - Requirement records, extraction, and merging
//! - [`sequence`] - Statement sequences flattened to single-use scripts
//! - [`store`] - The on-disk library store and registry installs
//! - [`version`] - Dotted numeric version parsing and comparison
//!
//! # Example
//!
//! ```
//! use airlock::requirements::extract::extract_from_str;
//!
//! let reqs = extract_from_str("# requires libraries: {name: authkit, version: 2.30.0}\n");
//! assert_eq!(reqs[0].name, "authkit");
//! assert_eq!(reqs[0].required.as_deref(), Some("2.30.0"));
//! ```

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod launcher;
pub mod request;
pub mod requirements;
pub mod sequence;
pub mod store;
pub mod version;

pub use error::{AirlockError, Result};
