//! Capability-scoped access to the project directory.
//!
//! Every component that inspects the source tree goes through
//! [`ProjectDir`]. The handle is opened once per invocation on the project
//! root, so relative references found in source files can never escape it:
//! an absolute path or a `..` walk simply fails to resolve.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use std::io;

/// Directory holding every generated artefact.
pub const BUILD_DIR: &str = "_build";

/// Base name shared by the pipeline artefacts inside [`BUILD_DIR`].
pub const TARGET_BASE: &str = "_build/hardware";

/// Handle on the root of an FPGA project.
#[derive(Debug)]
pub struct ProjectDir {
    root: Utf8PathBuf,
    dir: Dir,
}

impl ProjectDir {
    /// Open `root` as the project directory.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the directory cannot be opened.
    pub fn open(root: impl AsRef<Utf8Path>) -> io::Result<Self> {
        let path = root.as_ref().to_path_buf();
        let dir = Dir::open_ambient_dir(&path, ambient_authority())?;
        Ok(Self { root: path, dir })
    }

    /// Path the directory was opened from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Names of the regular files directly inside the project root, sorted.
    ///
    /// Subdirectories are not descended into.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the directory listing fails.
    pub fn file_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.dir.entries()? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name()?);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether `path` names a regular file inside the project.
    #[must_use]
    pub fn is_file(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.dir.is_file(path.as_ref())
    }

    /// Whether `path` names a directory inside the project.
    #[must_use]
    pub fn is_dir(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.dir.is_dir(path.as_ref())
    }

    /// Read a project file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the file is missing, unreadable, or not
    /// valid UTF-8.
    pub fn read_to_string(&self, path: impl AsRef<Utf8Path>) -> io::Result<String> {
        self.dir.read_to_string(path.as_ref())
    }

    /// Write `contents` to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when a directory or the file cannot be
    /// written.
    pub fn write(&self, path: impl AsRef<Utf8Path>, contents: &str) -> io::Result<()> {
        let target = path.as_ref();
        if let Some(parent) = target.parent().filter(|p| !p.as_str().is_empty()) {
            self.dir.create_dir_all(parent)?;
        }
        self.dir.write(target, contents)
    }

    /// Delete the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the file cannot be removed.
    pub fn remove_file(&self, path: impl AsRef<Utf8Path>) -> io::Result<()> {
        self.dir.remove_file(path.as_ref())
    }

    /// Delete the empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the directory is missing or not empty.
    pub fn remove_dir(&self, path: impl AsRef<Utf8Path>) -> io::Result<()> {
        self.dir.remove_dir(path.as_ref())
    }

    /// Absolute-or-relative path of `rel` as seen from the process working
    /// directory.
    #[must_use]
    pub fn join(&self, rel: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.root.join(rel)
    }
}
