//! Cleanup planning.
//!
//! In clean mode no pipeline is composed. The planner inventories the build
//! directory and a short list of stray files older tool versions left in
//! the project root, and returns them as one pseudo-target whose entries
//! are deleted in order. Directory contents are listed before the
//! directory itself, so the plan can be executed front to back.

use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::project::{BUILD_DIR, ProjectDir};

/// Name of the pseudo-target holding every entry to delete.
pub const CLEANUP_TARGET: &str = "cleanup-target";

/// Files in the project root written by earlier tool versions.
pub const STRAY_FILES: [&str; 6] = [
    "zadig.ini",
    "hardware.asc",
    "hardware.bin",
    "hardware.json",
    "hardware.out",
    "hardware.vcd",
];

/// Errors raised while planning or executing a cleanup.
#[derive(Debug, Error, Diagnostic)]
pub enum CleanupError {
    /// The build directory could not be listed.
    #[error("failed to list build artefacts")]
    #[diagnostic(code(fpgaforge::cleanup::list))]
    List(#[source] io::Error),

    /// An entry could not be deleted.
    #[error("failed to remove '{path}'")]
    #[diagnostic(code(fpgaforge::cleanup::remove))]
    Remove {
        /// Project-relative path of the entry.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// One path scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupEntry {
    /// Project-relative path.
    pub path: Utf8PathBuf,
    /// Whether the entry is a directory, removed once emptied.
    pub is_dir: bool,
}

/// Pseudo-target whose dependencies are the artefacts to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    /// Name of the pseudo-target.
    pub target: String,
    /// Entries in deletion order.
    pub entries: Vec<CleanupEntry>,
}

impl CleanupPlan {
    /// Paths of every entry, in deletion order.
    #[must_use]
    pub fn paths(&self) -> Vec<&Utf8Path> {
        self.entries.iter().map(|entry| entry.path.as_path()).collect()
    }

    /// Whether there is nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete every entry in order.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Remove`] for the first entry that cannot be
    /// deleted; later entries are left in place.
    pub fn execute(&self, project: &ProjectDir) -> Result<(), CleanupError> {
        for entry in &self.entries {
            let removed = if entry.is_dir {
                project.remove_dir(&entry.path)
            } else {
                project.remove_file(&entry.path)
            };
            removed.map_err(|source| CleanupError::Remove {
                path: entry.path.clone(),
                source,
            })?;
            info!("Removed {}", entry.path);
        }
        Ok(())
    }
}

/// Inventory the generated artefacts of `project`.
///
/// The build directory is walked depth first with entries sorted by name,
/// children before their parent. Stray root files follow, then the build
/// directory itself.
///
/// # Errors
///
/// Returns [`CleanupError::List`] when the build directory cannot be walked
/// or holds a path that is not valid UTF-8.
pub fn plan(project: &ProjectDir) -> Result<CleanupPlan, CleanupError> {
    let mut entries = Vec::new();
    let has_build_dir = project.is_dir(BUILD_DIR);
    if has_build_dir {
        let walker = WalkDir::new(project.join(BUILD_DIR))
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name();
        for walk_entry in walker {
            let entry = walk_entry.map_err(|err| CleanupError::List(err.into()))?;
            entries.push(CleanupEntry {
                path: relative(project, entry.path()).map_err(CleanupError::List)?,
                is_dir: entry.file_type().is_dir(),
            });
        }
    }
    entries.extend(
        STRAY_FILES
            .iter()
            .filter(|name| project.is_file(name))
            .map(|name| CleanupEntry {
                path: Utf8PathBuf::from(*name),
                is_dir: false,
            }),
    );
    if has_build_dir {
        entries.push(CleanupEntry {
            path: Utf8PathBuf::from(BUILD_DIR),
            is_dir: true,
        });
    }
    debug!(count = entries.len(), "planned cleanup of {}", project.root());
    Ok(CleanupPlan {
        target: CLEANUP_TARGET.to_owned(),
        entries,
    })
}

fn relative(project: &ProjectDir, path: &Path) -> io::Result<Utf8PathBuf> {
    let utf8 = Utf8Path::from_path(path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is not valid UTF-8: {}", path.display()),
        )
    })?;
    utf8.strip_prefix(project.root())
        .map(Utf8Path::to_path_buf)
        .map_err(|_| io::Error::other(format!("{utf8} is outside {}", project.root())))
}
