//! Hardware-description source classification and discovery.
//!
//! A file is a source when its extension is `.v` (or `.sv` when
//! SystemVerilog support is enabled). Sources whose base name ends in `_tb`
//! or `__tb`, in any letter case, are testbenches. Everything else is
//! ignored by the pipeline.

use std::io;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, error};

use crate::project::ProjectDir;

static TESTBENCH_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(TESTBENCH_PATTERN));

const TESTBENCH_PATTERN: &str = r"(?i)^.*_{1,2}tb$";

/// Role a file plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Compiled into logic by synthesis.
    Synthesizable,
    /// Simulation-only verification source.
    Testbench,
    /// Not a hardware-description source.
    Other,
}

/// Whether `name` has a hardware-description extension.
///
/// Directory components are ignored; both `/` and `\` separate them.
///
/// # Examples
///
/// ```
/// use fpgaforge::sources::is_hdl_source;
/// assert!(is_hdl_source("rtl/main.v", false));
/// assert!(is_hdl_source("main.sv", true));
/// assert!(!is_hdl_source("main.sv", false));
/// assert!(!is_hdl_source("defs.vh", true));
/// ```
#[must_use]
pub fn is_hdl_source(name: &str, include_sv: bool) -> bool {
    match extension(file_name(name)) {
        Some("v") => true,
        Some("sv") => include_sv,
        _ => false,
    }
}

/// Whether the base name of `name`, minus its extension, ends in `_tb`.
///
/// # Examples
///
/// ```
/// use fpgaforge::sources::has_testbench_name;
/// assert!(has_testbench_name("main_tb.v"));
/// assert!(has_testbench_name("rtl\\Main__TB.v"));
/// assert!(!has_testbench_name("maintb.v"));
/// ```
#[must_use]
pub fn has_testbench_name(name: &str) -> bool {
    let stem = file_stem(file_name(name));
    match &*TESTBENCH_RE {
        Ok(re) => re.is_match(stem),
        Err(err) => {
            error!(%err, "testbench name pattern failed to compile");
            false
        }
    }
}

/// Classify a file name.
#[must_use]
pub fn classify(name: &str, include_sv: bool) -> SourceKind {
    if !is_hdl_source(name, include_sv) {
        SourceKind::Other
    } else if has_testbench_name(name) {
        SourceKind::Testbench
    } else {
        SourceKind::Synthesizable
    }
}

/// Base name of `name` without its final extension.
#[must_use]
pub fn file_stem(name: &str) -> &str {
    let base = file_name(name);
    base.rsplit_once('.').map_or(base, |(stem, _)| stem)
}

fn file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// The two disjoint source sequences of a project, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    /// Synthesizable, non-testbench sources.
    pub synth: Vec<Utf8PathBuf>,
    /// Testbench sources.
    pub testbenches: Vec<Utf8PathBuf>,
}

impl SourceSet {
    /// Partition a directory listing.
    ///
    /// The listing order does not matter; both sequences come back sorted.
    #[must_use]
    pub fn from_names<I, S>(names: I, include_sv: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for entry in names {
            let name = entry.as_ref();
            match classify(name, include_sv) {
                SourceKind::Synthesizable => set.synth.push(Utf8PathBuf::from(name)),
                SourceKind::Testbench => set.testbenches.push(Utf8PathBuf::from(name)),
                SourceKind::Other => {}
            }
        }
        set.synth.sort();
        set.testbenches.sort();
        set
    }

    /// List the top level of `project` and partition its sources.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the project directory cannot be listed.
    pub fn discover(project: &ProjectDir, include_sv: bool) -> io::Result<Self> {
        let set = Self::from_names(project.file_names()?, include_sv);
        debug!(
            synth = set.synth.len(),
            testbenches = set.testbenches.len(),
            "discovered sources in {}",
            project.root()
        );
        Ok(set)
    }

    /// Look up a testbench by file name or by stem.
    #[must_use]
    pub fn find_testbench(&self, name: &str) -> Option<&Utf8Path> {
        let wanted = Utf8Path::new(name);
        self.testbenches
            .iter()
            .find(|tb| tb.as_path() == wanted || file_stem(tb.as_str()) == name)
            .map(Utf8PathBuf::as_path)
    }
}
