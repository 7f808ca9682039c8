//! Implicit dependency discovery for HDL sources.
//!
//! Ninja only knows about the files named on a build edge. Verilog sources
//! pull in further files through preprocessor includes, memory
//! initialisation calls and tool-generated `.list` parameters, so each
//! source is scanned and the references that resolve to an existing project
//! file become implicit dependencies of the edge that reads it.
//!
//! References that do not resolve are dropped without error. Optional data
//! files are routinely absent and must not block unrelated builds.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, error, warn};

use crate::project::ProjectDir;

/// Files every HDL-reading edge depends on when they are present.
pub const CORE_RESOURCE_FILES: [&str; 4] = [
    "fpgaforge.toml",
    "boards.json",
    "fpgas.json",
    "programmers.json",
];

struct Patterns {
    system_include: Regex,
    include: Regex,
    list_parameter: Regex,
    memory_init: Regex,
    dumpfile: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            system_include: Regex::new(r"`\s*include\s+<([^>\s]+)>")?,
            include: Regex::new(r#"`\s*include\s+"([^"\s]+)""#)?,
            list_parameter: Regex::new(r#"parameter\s+\w+\s*=\s*"([^"\s]+\.list)""#)?,
            memory_init: Regex::new(r#"\$readmem[hb]\s*\(\s*"([^"]+)""#)?,
            dumpfile: Regex::new(r#"\$dumpfile\s*\(\s*"([^"]*)""#)?,
        })
    }

    fn candidates<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        [
            &self.system_include,
            &self.include,
            &self.list_parameter,
            &self.memory_init,
        ]
        .into_iter()
        .flat_map(move |re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
    }
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(Patterns::compile);

/// The compiled patterns, or `None` after logging why they failed to build.
fn patterns() -> Option<&'static Patterns> {
    match &*PATTERNS {
        Ok(patterns) => Some(patterns),
        Err(err) => {
            error!(%err, "dependency scanner patterns failed to compile; scanning disabled");
            None
        }
    }
}

/// Extract the raw reference candidates from HDL text, in match order.
///
/// The same name may appear more than once.
#[must_use]
pub fn reference_candidates(text: &str) -> Vec<String> {
    patterns().map_or_else(Vec::new, |patterns| {
        patterns.candidates(text).map(str::to_owned).collect()
    })
}

/// Resolve the references found in `text` against `project`.
///
/// The result always includes the [`CORE_RESOURCE_FILES`] that exist. It is
/// deduplicated and sorted.
#[must_use]
pub fn scan_text(text: &str, project: &ProjectDir) -> Vec<Utf8PathBuf> {
    let candidates = reference_candidates(text);
    candidates
        .iter()
        .map(String::as_str)
        .chain(CORE_RESOURCE_FILES)
        .filter(|name| project.is_file(name))
        .map(Utf8PathBuf::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Scan a project source file for the files it references.
///
/// A source that cannot be read contributes only the core resource files;
/// the tool that reads it will report the problem when it runs.
#[must_use]
pub fn scan(source: &Utf8Path, project: &ProjectDir) -> Vec<Utf8PathBuf> {
    let text = match project.read_to_string(source) {
        Ok(text) => text,
        Err(err) => {
            debug!(source = %source, error = %err, "source not readable; skipping reference scan");
            String::new()
        }
    };
    let deps = scan_text(&text, project);
    debug!(source = %source, deps = ?deps, "scanned source references");
    deps
}

/// Union of [`scan`] over several sources, sorted and deduplicated.
#[must_use]
pub fn scan_all<'a, I>(sources: I, project: &ProjectDir) -> Vec<Utf8PathBuf>
where
    I: IntoIterator<Item = &'a Utf8PathBuf>,
{
    sources
        .into_iter()
        .flat_map(|src| scan(src, project))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Warn about testbenches that pick their own waveform file.
///
/// The simulation builders pass the waveform path, without its `.vcd`
/// extension, in through the `VCD_OUTPUT` macro. A literal
/// `$dumpfile("name.vcd")` overrides it and the waveform ends up somewhere
/// the viewer will not look.
pub fn check_testbench(testbench: &Utf8Path, project: &ProjectDir) {
    let Ok(text) = project.read_to_string(testbench) else {
        return;
    };
    let Some(patterns) = patterns() else {
        return;
    };
    for caps in patterns.dumpfile.captures_iter(&text) {
        if let Some(name) = caps.get(1) {
            warn!(
                "{testbench} calls $dumpfile(\"{}\"); use $dumpfile({{`VCD_OUTPUT, \".vcd\"}}) \
                 so the waveform lands in the build directory",
                name.as_str()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    fn scanner_patterns_compile() {
        assert!(Patterns::compile().is_ok());
    }

    const REFERENCING_SOURCE: &str = r#"
        // Dummy file for testing.

        // Tool generated list reference.
        parameter v771499 = "v771499.list"

        // Include reference.
        `include "apio_testing.vh"

        // Duplicate list reference.
        parameter v771499 = "v771499.list"

        // Unterminated include, never matched.
        `include "apio_testing.v

        // Memory initialisation reference.
        $readmemh("my_data.hex", State_buff);
        "#;

    struct Sandbox {
        dir: TempDir,
        project: ProjectDir,
    }

    impl Sandbox {
        fn touch(&self, name: &str) {
            fs::write(self.dir.path().join(name), "dummy-file").expect("write file");
        }
    }

    #[fixture]
    fn sandbox() -> Sandbox {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8Path::from_path(dir.path()).expect("utf8 temp dir");
        let project = ProjectDir::open(root).expect("open project");
        Sandbox { dir, project }
    }

    #[rstest]
    fn candidates_cover_every_pattern() {
        let text = concat!(
            "`include <vendor_cells.vh>\n",
            "` include \"defs.vh\"\n",
            "parameter p = \"rom.list\"\n",
            "$readmemb ( \"bits.bin\", mem);\n",
        );
        assert_eq!(
            reference_candidates(text),
            vec!["vendor_cells.vh", "defs.vh", "rom.list", "bits.bin"]
        );
    }

    #[rstest]
    fn unresolved_references_are_dropped(sandbox: Sandbox) {
        sandbox.touch("test_file.v");
        let deps = scan(Utf8Path::new("test_file.v"), &sandbox.project);
        assert!(deps.is_empty());

        let deps = scan_text(REFERENCING_SOURCE, &sandbox.project);
        assert!(deps.is_empty());
    }

    #[rstest]
    fn present_references_and_core_files_are_sorted(sandbox: Sandbox) {
        let core = ["fpgaforge.toml", "boards.json", "programmers.json", "fpgas.json"];
        let referenced = ["apio_testing.vh", "my_data.hex", "v771499.list"];
        for name in core.iter().chain(&referenced).chain(&["non-related.txt"]) {
            sandbox.touch(name);
        }
        fs::write(sandbox.dir.path().join("test_file.v"), REFERENCING_SOURCE).expect("write");

        let deps = scan(Utf8Path::new("test_file.v"), &sandbox.project);

        let mut expected: Vec<Utf8PathBuf> =
            core.iter().chain(&referenced).map(Utf8PathBuf::from).collect();
        expected.sort();
        assert_eq!(deps, expected);
    }

    #[rstest]
    fn references_escaping_the_project_are_ignored(sandbox: Sandbox) {
        let deps = scan_text("`include \"../../etc/passwd\"\n", &sandbox.project);
        assert!(deps.is_empty());
    }

    #[rstest]
    fn scan_all_merges_sources(sandbox: Sandbox) {
        sandbox.touch("a.hex");
        sandbox.touch("b.vh");
        fs::write(sandbox.dir.path().join("a.v"), "$readmemh(\"a.hex\", m);").expect("write");
        fs::write(sandbox.dir.path().join("b.v"), "`include \"b.vh\"\n$readmemh(\"a.hex\", m);")
            .expect("write");
        let sources = [Utf8PathBuf::from("a.v"), Utf8PathBuf::from("b.v")];
        assert_eq!(
            scan_all(&sources, &sandbox.project),
            vec![Utf8PathBuf::from("a.hex"), Utf8PathBuf::from("b.vh")]
        );
    }
}
