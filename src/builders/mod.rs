//! Builder registry.
//!
//! A [`Builder`] describes one kind of build step: the Ninja command it
//! runs, the suffix of the file it produces, the inputs it accepts and any
//! secondary outputs the same command writes. Commands are rendered from
//! templates when the builder is registered, so a bad template fails before
//! any edge is emitted.

pub mod arch;
pub mod tools;

use std::collections::HashMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::ir::{Action, BuildEdge};
use crate::project::ProjectDir;
use crate::scanner;

/// Symbolic identifier of a builder. Doubles as the Ninja rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuilderId {
    /// HDL sources to netlist.
    Synth,
    /// Netlist to placed-and-routed design.
    Pnr,
    /// Placed-and-routed design to bitstream.
    Pack,
    /// Testbench to simulation executable.
    TestbenchCompile,
    /// Simulation executable to waveform.
    TestbenchVcd,
    /// HDL sources to a Graphviz description.
    DotGraph,
    /// Graphviz description to an image.
    GraphRender,
    /// Verilator waiver file.
    LintConfig,
    /// Verilator lint run.
    Lint,
}

impl BuilderId {
    /// Rule name used in the Ninja file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synth => "synth",
            Self::Pnr => "pnr",
            Self::Pack => "pack",
            Self::TestbenchCompile => "testbench_compile",
            Self::TestbenchVcd => "testbench_vcd",
            Self::DotGraph => "dot_graph",
            Self::GraphRender => "graph_render",
            Self::LintConfig => "lint_config",
            Self::Lint => "lint",
        }
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while registering or applying builders.
#[derive(Debug, Error, Diagnostic)]
pub enum BuilderError {
    /// An identifier was registered twice.
    #[error("builder '{id}' is already registered")]
    #[diagnostic(code(fpgaforge::builders::duplicate))]
    Duplicate {
        /// Identifier registered twice.
        id: BuilderId,
    },

    /// A node asked for a builder that was never registered.
    #[error("builder '{id}' is not registered")]
    #[diagnostic(code(fpgaforge::builders::unregistered))]
    Unregistered {
        /// Identifier that is missing.
        id: BuilderId,
    },

    /// A command template names a variable with no value.
    #[error("template '{template}' uses unknown variable '{name}'")]
    #[diagnostic(code(fpgaforge::builders::unknown_variable))]
    UnknownVariable {
        /// Variable name as written.
        name: String,
        /// Offending template.
        template: String,
    },

    /// A builder was handed an input it cannot read.
    #[error("builder '{id}' does not accept '{input}'")]
    #[diagnostic(code(fpgaforge::builders::unexpected_input))]
    UnexpectedInput {
        /// Builder receiving the input.
        id: BuilderId,
        /// Rejected input.
        input: Utf8PathBuf,
    },

    /// A tool data directory is not configured.
    #[error("{tool} data directory is not configured")]
    #[diagnostic(
        code(fpgaforge::builders::missing_tool_path),
        help("set {env} or the matching key in the [tools] table")
    )]
    MissingToolPath {
        /// Tool needing the directory.
        tool: &'static str,
        /// Environment variable that provides it.
        env: &'static str,
    },
}

/// Declares the secondary outputs written next to a primary output.
///
/// Receives the target base, such as `_build/hardware`.
pub type Emitter = fn(&Utf8Path) -> Vec<Utf8PathBuf>;

/// Files one node produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutputs {
    /// File named by `$out`.
    pub primary: Utf8PathBuf,
    /// Further files written by the same command.
    pub secondary: Vec<Utf8PathBuf>,
}

/// One registered build step template.
#[derive(Debug, Clone)]
pub struct Builder {
    command: String,
    description: String,
    suffix: String,
    src_suffixes: Vec<&'static str>,
    emitter: Option<Emitter>,
    scan_sources: bool,
}

impl Builder {
    /// Builder running `command` and producing `<base><suffix>`.
    #[must_use]
    pub fn new(command: impl Into<String>, suffix: impl Into<String>) -> Self {
        let rendered = command.into();
        let description = rendered
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        Self {
            command: rendered,
            description,
            suffix: suffix.into(),
            src_suffixes: Vec::new(),
            emitter: None,
            scan_sources: false,
        }
    }

    /// Label Ninja prints in place of the command.
    #[must_use]
    pub fn with_description(mut self, label: impl Into<String>) -> Self {
        self.description = label.into();
        self
    }

    /// Accept only inputs ending in one of `suffixes`.
    #[must_use]
    pub fn with_src_suffixes(mut self, suffixes: &[&'static str]) -> Self {
        self.src_suffixes = suffixes.to_vec();
        self
    }

    /// Declare secondary outputs.
    #[must_use]
    pub const fn with_emitter(mut self, emitter: Emitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Scan inputs for referenced files and depend on them.
    #[must_use]
    pub const fn with_scanner(mut self) -> Self {
        self.scan_sources = true;
        self
    }

    /// Rendered Ninja command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Suffix appended to the target base.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether this builder scans its inputs.
    #[must_use]
    pub const fn scans_sources(&self) -> bool {
        self.scan_sources
    }

    /// Ninja rule for this builder.
    #[must_use]
    pub fn action(&self) -> Action {
        Action {
            command: self.command.clone(),
            description: Some(format!("{} $out", self.description)),
            pool: None,
        }
    }

    /// Outputs produced for `base`.
    #[must_use]
    pub fn outputs(&self, base: &Utf8Path) -> BuildOutputs {
        BuildOutputs {
            primary: Utf8PathBuf::from(format!("{base}{}", self.suffix)),
            secondary: self.emitter.map(|emit| emit(base)).unwrap_or_default(),
        }
    }

    /// Whether `input` passes the source filter.
    #[must_use]
    pub fn accepts(&self, input: &Utf8Path) -> bool {
        self.src_suffixes.is_empty()
            || self
                .src_suffixes
                .iter()
                .any(|suffix| input.as_str().ends_with(suffix))
    }

    /// Build edge producing `base` from `sources`.
    ///
    /// Referenced files found by the scanner become implicit dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::UnexpectedInput`] when a source fails the
    /// filter.
    pub fn edge(
        &self,
        id: BuilderId,
        base: &Utf8Path,
        sources: Vec<Utf8PathBuf>,
        project: &ProjectDir,
    ) -> Result<(BuildEdge, BuildOutputs), BuilderError> {
        if let Some(input) = sources.iter().find(|src| !self.accepts(src)) {
            return Err(BuilderError::UnexpectedInput {
                id,
                input: input.clone(),
            });
        }
        let implicit_deps = if self.scan_sources {
            scanner::scan_all(&sources, project)
        } else {
            Vec::new()
        };
        let outputs = self.outputs(base);
        let edge = BuildEdge {
            action_id: id.as_str().to_owned(),
            inputs: sources,
            implicit_deps,
            explicit_outputs: vec![outputs.primary.clone()],
            implicit_outputs: outputs.secondary.clone(),
            ..BuildEdge::default()
        };
        Ok((edge, outputs))
    }
}

/// Builders available to one invocation.
#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    builders: HashMap<BuilderId, Builder>,
}

impl BuilderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Duplicate`] if `id` is taken.
    pub fn register(&mut self, id: BuilderId, builder: Builder) -> Result<(), BuilderError> {
        if self.builders.contains_key(&id) {
            return Err(BuilderError::Duplicate { id });
        }
        self.builders.insert(id, builder);
        Ok(())
    }

    /// Builder registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Unregistered`] when `id` is unknown.
    pub fn get(&self, id: BuilderId) -> Result<&Builder, BuilderError> {
        self.builders
            .get(&id)
            .ok_or(BuilderError::Unregistered { id })
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: BuilderId) -> bool {
        self.builders.contains_key(&id)
    }

    /// Registered identifiers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<BuilderId> {
        self.builders.keys().copied().sorted().collect()
    }
}

/// Substitute `{name}` variables in `template` and collapse whitespace.
///
/// Values are inserted verbatim; callers escape them for Ninja.
///
/// # Errors
///
/// Returns [`BuilderError::UnknownVariable`] for a name missing from `vars`
/// or an unterminated `{`.
///
/// # Examples
///
/// ```
/// use fpgaforge::builders::render_template;
/// let cmd = render_template("icepack {quiet} $in $out", &[("quiet", "")]).unwrap();
/// assert_eq!(cmd, "icepack $in $out");
/// ```
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> Result<String, BuilderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((head, tail)) = rest.split_once('{') {
        out.push_str(head);
        let Some((name, after)) = tail.split_once('}') else {
            return Err(BuilderError::UnknownVariable {
                name: tail.to_owned(),
                template: template.to_owned(),
            });
        };
        let value = vars
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| BuilderError::UnknownVariable {
                name: name.to_owned(),
                template: template.to_owned(),
            })?;
        out.push_str(value);
        rest = after;
    }
    out.push_str(rest);
    Ok(out.split_whitespace().join(" "))
}

/// Lowercase `.v`, plus `.sv` when SystemVerilog is enabled.
#[must_use]
pub const fn hdl_suffixes(include_sv: bool) -> &'static [&'static str] {
    if include_sv { &[".v", ".sv"] } else { &[".v"] }
}
