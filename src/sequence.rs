//! Flattening statement sequences into single-use scripts.
//!
//! A sequence target is a convenience wrapper over the script launcher: the
//! statements are written to a temporary script, which is then dispatched as
//! an ordinary script target. The parent holds the temp file alive until the
//! child exits, then it is removed with the guard.

use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempPath;

/// A statement sequence flattened to a temporary script.
///
/// Dropping this removes the script, so the caller must keep it alive for
/// the child's lifetime.
#[derive(Debug)]
pub struct FlattenedSequence {
    path: PathBuf,
    _guard: TempPath,
}

impl FlattenedSequence {
    /// The flattened script's location.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Write `statements` to a single-use script, one per line, in order.
pub fn flatten(statements: &[String]) -> Result<FlattenedSequence> {
    let mut file = tempfile::Builder::new()
        .prefix("airlock-seq-")
        .suffix(".sh")
        .tempfile()?;

    writeln!(file, "#!/bin/sh")?;
    for statement in statements {
        writeln!(file, "{}", statement)?;
    }
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    let guard = file.into_temp_path();
    Ok(FlattenedSequence {
        path: guard.to_path_buf(),
        _guard: guard,
    })
}
