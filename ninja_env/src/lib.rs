#![forbid(unsafe_code)]

//! Shared environment constants used across fpgaforge crates (library, tests, and
//! helpers).

/// Environment variable override for the Ninja executable.
///
/// # Examples
///
/// ```
/// use ninja_env::NINJA_ENV;
/// let program = std::env::var_os(NINJA_ENV).unwrap_or_else(|| "ninja".into());
/// assert!(!program.is_empty());
/// ```
pub const NINJA_ENV: &str = "FPGAFORGE_NINJA";

/// Name of the Ninja build file written inside the build directory.
pub const BUILD_FILE_NAME: &str = "build.ninja";
