//! Helpers for working with the system `ninja` binary in integration tests.

use std::path::Path;
use std::process::{Command, ExitStatus, Output};
use thiserror::Error;

/// Errors that can occur when driving a real Ninja in tests.
#[derive(Error, Debug)]
pub enum NinjaProbeError {
    /// `ninja` failed to spawn, most likely because it is not in `PATH`.
    #[error("failed to spawn `ninja`: {0}")]
    Spawn(#[source] std::io::Error),
    /// `ninja --version` executed but returned a non-success status.
    #[error("`ninja --version` returned non-success status: {0}")]
    ProbeFailed(ExitStatus),
}

/// Check that a usable `ninja` is on `PATH`. Callers should skip their
/// scenario when this returns `Err`.
pub fn probe_ninja() -> Result<(), NinjaProbeError> {
    let output = Command::new("ninja")
        .arg("--version")
        .output()
        .map_err(NinjaProbeError::Spawn)?;
    if !output.status.success() {
        return Err(NinjaProbeError::ProbeFailed(output.status));
    }
    Ok(())
}

/// Run `ninja -n` on `build_file` for `target` from `dir`, executing nothing.
pub fn dry_run(dir: &Path, build_file: &Path, target: &str) -> Result<Output, NinjaProbeError> {
    Command::new("ninja")
        .current_dir(dir)
        .arg("-n")
        .arg("-f")
        .arg(build_file)
        .arg(target)
        .output()
        .map_err(NinjaProbeError::Spawn)
}
