//! Target graph composition.
//!
//! Every invocation composes a fresh [`BuildGraph`] for exactly one goal.
//! The core goals (`build`, `report`, `upload`) share the fixed
//! synth → pnr → pack chain; the auxiliary goals attach their own subgraph
//! and nothing else, so asking for `lint` never pays for place-and-route.
//! Clean mode skips composition and returns a [`CleanupPlan`] instead.
//!
//! Configuration errors surface here, before a Ninja file is written: an
//! ambiguous constraints file, a programmer command without its source
//! placeholder, or a testbench choice that cannot be made unambiguously.

mod auxiliary;

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::builders::arch::{self, register_core};
use crate::builders::{BuildOutputs, BuilderError, BuilderId, BuilderRegistry};
use crate::cleanup::{self, CleanupError, CleanupPlan};
use crate::cli::ManifestGoal;
use crate::config::BuildParams;
use crate::constraints::{self, ConstraintError};
use crate::ir::cmd_interpolate::{bind_source, quote_arg};
use crate::ir::{Alias, BuildGraph, IrGenError};
use crate::project::{ProjectDir, TARGET_BASE};
use crate::sources::SourceSet;

/// User-facing goal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Goal {
    /// Synthesise, place and route, and pack.
    Build,
    /// Print the place-and-route report.
    Report,
    /// Program the device.
    Upload,
    /// Render the design graph.
    Graph,
    /// Simulate one testbench interactively.
    Sim,
    /// Run every testbench.
    Test,
    /// Lint sources and testbenches.
    Lint,
}

impl Goal {
    /// Every goal, in the order they are documented.
    pub const ALL: [Self; 7] = [
        Self::Build,
        Self::Report,
        Self::Upload,
        Self::Graph,
        Self::Sim,
        Self::Test,
        Self::Lint,
    ];

    /// Goal name, which is also the name of its alias.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Report => "report",
            Self::Upload => "upload",
            Self::Graph => "graph",
            Self::Sim => "sim",
            Self::Test => "test",
            Self::Lint => "lint",
        }
    }

    /// Goal called `name`, if any.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|goal| goal.name() == name)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ManifestGoal> for Goal {
    fn from(goal: ManifestGoal) -> Self {
        match goal {
            ManifestGoal::Build => Self::Build,
            ManifestGoal::Report => Self::Report,
            ManifestGoal::Upload => Self::Upload,
            ManifestGoal::Graph => Self::Graph,
            ManifestGoal::Sim => Self::Sim,
            ManifestGoal::Test => Self::Test,
            ManifestGoal::Lint => Self::Lint,
        }
    }
}

/// What one invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Realise a goal's alias.
    Goal(Goal),
    /// Delete generated artefacts.
    Clean,
}

/// Outcome of composition.
#[derive(Debug)]
pub enum Plan {
    /// Graph to hand to Ninja, and the alias to request.
    Graph {
        /// Composed graph.
        graph: BuildGraph,
        /// Alias realising the goal.
        target: Utf8PathBuf,
    },
    /// Artefacts to delete.
    Cleanup(CleanupPlan),
    /// Unknown goal name; nothing to do.
    Nothing,
}

/// Errors raised while composing a plan.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    /// The project directory could not be listed.
    #[error("failed to discover project sources")]
    #[diagnostic(code(fpgaforge::pipeline::discovery))]
    Discovery(#[source] io::Error),

    /// No synthesizable sources were found.
    #[error("no HDL sources found in the project directory")]
    #[diagnostic(
        code(fpgaforge::pipeline::no_sources),
        help("add a .v file (or a .sv file with system_verilog enabled)")
    )]
    NoSources,

    /// A source name cannot be passed through `$in` unquoted.
    #[error("source file name '{name}' contains whitespace")]
    #[diagnostic(
        code(fpgaforge::pipeline::whitespace_in_source),
        help("rename the file; tool commands split their inputs on whitespace")
    )]
    WhitespaceInSource {
        /// Offending file name.
        name: String,
    },

    /// Several testbenches exist and none was chosen.
    #[error("several testbenches found: {}", .testbenches.join(", "))]
    #[diagnostic(
        code(fpgaforge::pipeline::ambiguous_testbench),
        help("name the testbench to simulate, e.g. `fpgaforge sim main_tb.v`")
    )]
    AmbiguousTestbench {
        /// Every candidate, sorted.
        testbenches: Vec<String>,
    },

    /// The project has no testbench.
    #[error("no testbench found")]
    #[diagnostic(
        code(fpgaforge::pipeline::no_testbench),
        help("testbench file names end in _tb, e.g. main_tb.v")
    )]
    NoTestbench,

    /// The requested testbench does not exist.
    #[error("testbench '{name}' not found")]
    #[diagnostic(code(fpgaforge::pipeline::unknown_testbench))]
    UnknownTestbench {
        /// Name as requested.
        name: String,
    },

    /// Upload was requested without a programmer command.
    #[error("no programmer command configured")]
    #[diagnostic(
        code(fpgaforge::pipeline::missing_programmer),
        help("set `programmer` in fpgaforge.toml or pass --programmer")
    )]
    MissingProgrammer,

    /// Constraints file resolution failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(#[from] ConstraintError),

    /// A builder could not be registered or applied.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Builder(#[from] BuilderError),

    /// The composed graph is inconsistent.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] IrGenError),

    /// Cleanup planning failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cleanup(#[from] CleanupError),
}

/// Compose the plan for `mode`.
///
/// # Errors
///
/// Returns a [`PipelineError`] describing the first configuration problem
/// found. No partial graph is ever returned.
pub fn compose(
    mode: Mode,
    params: &BuildParams,
    project: &ProjectDir,
) -> Result<Plan, PipelineError> {
    match mode {
        Mode::Clean => Ok(Plan::Cleanup(cleanup::plan(project)?)),
        Mode::Goal(goal) => {
            let (graph, target) = compose_goal(goal, params, project)?;
            Ok(Plan::Graph { graph, target })
        }
    }
}

/// Compose the plan for a goal given by name.
///
/// `clean` selects clean mode. Unknown names yield [`Plan::Nothing`].
///
/// # Errors
///
/// See [`compose`].
pub fn compose_named(
    name: &str,
    params: &BuildParams,
    project: &ProjectDir,
) -> Result<Plan, PipelineError> {
    if name == "clean" {
        return compose(Mode::Clean, params, project);
    }
    match Goal::from_name(name) {
        Some(goal) => compose(Mode::Goal(goal), params, project),
        None => {
            debug!("ignoring unknown goal '{name}'");
            Ok(Plan::Nothing)
        }
    }
}

/// Compose and validate the graph for `goal`.
///
/// The returned graph's only default target is the goal's alias.
///
/// # Errors
///
/// See [`compose`].
pub fn compose_goal(
    goal: Goal,
    params: &BuildParams,
    project: &ProjectDir,
) -> Result<(BuildGraph, Utf8PathBuf), PipelineError> {
    let sources =
        SourceSet::discover(project, params.include_sv).map_err(PipelineError::Discovery)?;
    if let Some(name) = sources
        .synth
        .iter()
        .chain(&sources.testbenches)
        .find(|name| name.as_str().contains(char::is_whitespace))
    {
        return Err(PipelineError::WhitespaceInSource {
            name: name.to_string(),
        });
    }
    let mut composer = Composer::new(params, project);
    let target = match goal {
        Goal::Build | Goal::Report | Goal::Upload => core(&mut composer, &sources, goal)?,
        Goal::Graph => auxiliary::graph(&mut composer, &sources)?,
        Goal::Sim => auxiliary::sim(&mut composer, &sources)?,
        Goal::Test => auxiliary::test(&mut composer, &sources)?,
        Goal::Lint => auxiliary::lint(&mut composer, &sources)?,
    };
    composer.finish(target)
}

/// The synth → pnr → pack chain and the alias `goal` asks for.
fn core(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
    goal: Goal,
) -> Result<Utf8PathBuf, PipelineError> {
    if sources.synth.is_empty() {
        return Err(PipelineError::NoSources);
    }
    let params = composer.params;
    let profile = arch::profile(params.arch);
    let constraints = constraints::resolve(
        composer.project,
        profile.constraint_extension,
        &params.top_module,
    )?;
    register_core(&mut composer.registry, params, &constraints)?;

    let base = Utf8Path::new(TARGET_BASE);
    let netlist = composer.add(
        Node::new(BuilderId::Synth, base)
            .sources(sources.synth.clone())
            .always(params.verbosity.synth_verbose()),
    )?;
    let placed = composer.add(
        Node::new(BuilderId::Pnr, base)
            .sources(vec![netlist.primary])
            .implicit_dep(constraints.path)
            .always(params.verbosity.pnr_verbose()),
    )?;
    let bitstream = composer.add(Node::new(BuilderId::Pack, base).sources(vec![placed.primary]))?;
    let build = composer.alias(
        Alias::new(Goal::Build.name(), vec![bitstream.primary.clone()])
            .always(params.verbosity.any()),
    )?;

    match goal {
        Goal::Report => {
            let verbose = if params.verbosity.pnr_verbose() {
                " --verbose"
            } else {
                ""
            };
            let command = format!(
                "{} format-report{verbose} $in",
                quote_arg(&params.self_program)
            );
            composer.alias(
                Alias::new(Goal::Report.name(), vec![arch::report_path(base)])
                    .with_action(command)
                    .always(true),
            )
        }
        Goal::Upload => {
            let programmer = params
                .programmer
                .as_deref()
                .ok_or(PipelineError::MissingProgrammer)?;
            let command = bind_source(programmer)?;
            composer.alias(
                Alias::new(Goal::Upload.name(), vec![bitstream.primary])
                    .with_action(command)
                    .always(true),
            )
        }
        _ => Ok(build),
    }
}

/// One build step waiting to be added to the graph.
#[derive(Debug, Clone)]
struct Node {
    builder: BuilderId,
    base: Utf8PathBuf,
    sources: Vec<Utf8PathBuf>,
    implicit_deps: Vec<Utf8PathBuf>,
    vars: BTreeMap<String, String>,
    always: bool,
}

impl Node {
    fn new(builder: BuilderId, base: impl Into<Utf8PathBuf>) -> Self {
        Self {
            builder,
            base: base.into(),
            sources: Vec::new(),
            implicit_deps: Vec::new(),
            vars: BTreeMap::new(),
            always: false,
        }
    }

    fn sources(mut self, sources: Vec<Utf8PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    fn implicit_dep(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.implicit_deps.push(path.into());
        self
    }

    fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_owned(), value.into());
        self
    }

    const fn always(mut self, always: bool) -> Self {
        self.always = always;
        self
    }
}

/// Graph under construction for one invocation.
struct Composer<'a> {
    params: &'a BuildParams,
    project: &'a ProjectDir,
    registry: BuilderRegistry,
    graph: BuildGraph,
}

impl<'a> Composer<'a> {
    fn new(params: &'a BuildParams, project: &'a ProjectDir) -> Self {
        Self {
            params,
            project,
            registry: BuilderRegistry::new(),
            graph: BuildGraph::default(),
        }
    }

    /// Apply the node's builder and insert the resulting edge.
    fn add(&mut self, node: Node) -> Result<BuildOutputs, PipelineError> {
        let builder = self.registry.get(node.builder)?;
        let (mut edge, outputs) =
            builder.edge(node.builder, &node.base, node.sources, self.project)?;
        for dep in node.implicit_deps {
            if !edge.implicit_deps.contains(&dep) {
                edge.implicit_deps.push(dep);
            }
        }
        edge.vars = node.vars;
        edge.always = node.always;
        self.graph
            .add_action(node.builder.as_str(), builder.action())?;
        self.graph.add_edge(edge)?;
        Ok(outputs)
    }

    fn alias(&mut self, alias: Alias) -> Result<Utf8PathBuf, PipelineError> {
        Ok(self.graph.add_alias(alias)?)
    }

    fn finish(mut self, target: Utf8PathBuf) -> Result<(BuildGraph, Utf8PathBuf), PipelineError> {
        self.graph.default_targets = vec![target.clone()];
        self.graph.validate(self.project)?;
        debug!(
            edges = self.graph.targets.len(),
            rules = self.graph.actions.len(),
            "composed graph for {target}"
        );
        Ok((self.graph, target))
    }
}

#[cfg(test)]
mod tests;
