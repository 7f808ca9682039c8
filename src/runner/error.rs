//! Error types for the runner module.

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The project directory could not be opened.
    #[error("cannot open project directory '{}'", .path.display())]
    #[diagnostic(
        code(fpgaforge::runner::project_not_found),
        help("run from the project directory or pass -C <DIR>")
    )]
    ProjectNotFound {
        /// Directory that was attempted.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A path given on the command line is not valid UTF-8.
    #[error("path '{}' is not valid UTF-8", .path.display())]
    #[diagnostic(code(fpgaforge::runner::non_utf8_path))]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },
}
