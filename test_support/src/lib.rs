//! Test utilities for process management and sandbox projects.
//!
//! This crate provides fake Ninja executables that record how they were
//! invoked, temporary FPGA projects, and a probe for a real Ninja binary.

pub mod ninja;
pub mod project;

pub use ninja_env::NINJA_ENV;
pub use project::ProjectFixture;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Mark `path` executable on Unix platforms.
fn make_script_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).expect("script metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("script permissions");
    }
    #[cfg(not(unix))]
    let _ = path;
}

fn write_script(body: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("ninja");
    let mut file = File::create(&path).expect("script");
    write!(file, "#!/bin/sh\n{body}").expect("write script");
    drop(file);
    make_script_executable(&path);
    (dir, path)
}

/// Create a fake Ninja executable that exits with `exit_code`.
///
/// Returns the temporary directory and the path to the executable.
pub fn fake_ninja(exit_code: i32) -> (TempDir, PathBuf) {
    write_script(&format!("exit {exit_code}\n"))
}

/// Create a fake Ninja that records its invocation and succeeds.
///
/// The log holds the physical working directory on the first line and one
/// argument per following line. Returns the temporary directory, the
/// executable and the log path.
pub fn recording_ninja() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let log = dir.path().join("ninja.log");
    let path = dir.path().join("ninja");
    let body = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$(pwd -P)\" \"$@\" > '{}'\nexit 0\n",
        log.display()
    );
    fs::write(&path, body).expect("script");
    make_script_executable(&path);
    (dir, path, log)
}
