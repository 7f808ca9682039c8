//! Physical-constraints file resolution.
//!
//! Each architecture reads exactly one constraints file, identified by its
//! extension (`.pcf`, `.lpf`, `.cst`). With no candidate the top module name
//! is assumed so the failure, if any, surfaces from the place-and-route step.
//! With several candidates resolution stops: picking one would silently
//! build a different pinout than the user intended.

use std::io;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;
use tracing::info;

use crate::project::ProjectDir;

/// Errors raised while resolving the constraints file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConstraintError {
    /// More than one file carries the constraints extension.
    #[error("found multiple '*{extension}' files: {}", .files.join(", "))]
    #[diagnostic(
        code(fpgaforge::constraints::ambiguous),
        help("keep a single constraints file in the project directory")
    )]
    Ambiguous {
        /// Extension searched for, including the dot.
        extension: String,
        /// Every matching file, sorted.
        files: Vec<String>,
    },
    /// The project directory could not be listed.
    #[error("failed to list project directory")]
    #[diagnostic(code(fpgaforge::constraints::io))]
    Io(#[from] io::Error),
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintFile {
    /// Project-relative path of the constraints file.
    pub path: Utf8PathBuf,
    /// Whether the name was derived from the top module rather than found.
    pub assumed: bool,
}

/// Locate the constraints file with `extension` for `top_module`.
///
/// # Errors
///
/// Returns [`ConstraintError::Ambiguous`] when more than one file matches,
/// or [`ConstraintError::Io`] if the project cannot be listed.
pub fn resolve(
    project: &ProjectDir,
    extension: &str,
    top_module: &str,
) -> Result<ConstraintFile, ConstraintError> {
    let mut files: Vec<String> = project
        .file_names()?
        .into_iter()
        .filter(|name| name.ends_with(extension) && name.len() > extension.len())
        .collect();
    match files.len() {
        0 => {
            let path = Utf8PathBuf::from(format!("{top_module}{extension}"));
            info!("no '*{extension}' constraints file found, assuming '{path}'");
            Ok(ConstraintFile {
                path,
                assumed: true,
            })
        }
        1 => Ok(ConstraintFile {
            path: files.pop().map(Utf8PathBuf::from).unwrap_or_default(),
            assumed: false,
        }),
        _ => Err(ConstraintError::Ambiguous {
            extension: extension.to_owned(),
            files,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn project(tmp: &TempDir) -> ProjectDir {
        ProjectDir::open(Utf8Path::from_path(tmp.path()).expect("utf8")).expect("open")
    }

    #[rstest]
    fn missing_file_assumes_top_module_name() {
        let tmp = TempDir::new().expect("temp dir");
        let found = resolve(&project(&tmp), ".pcf", "my_main").expect("resolve");
        assert_eq!(found.path, Utf8PathBuf::from("my_main.pcf"));
        assert!(found.assumed);
    }

    #[rstest]
    fn single_file_is_returned() {
        let tmp = TempDir::new().expect("temp dir");
        fs::write(tmp.path().join("pinout.pcf"), "").expect("write");
        fs::write(tmp.path().join("pinout.lpf"), "").expect("write");
        let found = resolve(&project(&tmp), ".pcf", "my_main").expect("resolve");
        assert_eq!(found.path, Utf8PathBuf::from("pinout.pcf"));
        assert!(!found.assumed);
    }

    #[rstest]
    fn several_files_are_ambiguous() {
        let tmp = TempDir::new().expect("temp dir");
        fs::write(tmp.path().join("pinout.pcf"), "").expect("write");
        fs::write(tmp.path().join("other.pcf"), "").expect("write");
        let err = resolve(&project(&tmp), ".pcf", "my_main").expect_err("ambiguous");
        match &err {
            ConstraintError::Ambiguous { files, .. } => {
                assert_eq!(files, &vec!["other.pcf".to_owned(), "pinout.pcf".to_owned()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("found multiple '*.pcf' files"));
    }
}
