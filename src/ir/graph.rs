//! Core build graph types.

use std::collections::{BTreeMap, HashMap};

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;

use super::cycle;
use crate::project::ProjectDir;

/// A Ninja rule: the command shared by every edge built with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Command line with `$in`, `$out` and per-edge variables left for Ninja.
    pub command: String,
    /// Short label Ninja prints instead of the command.
    pub description: Option<String>,
    /// Ninja pool; `console` hands the terminal to interactive tools.
    pub pool: Option<String>,
}

impl Action {
    /// Action running `command` with no description or pool.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: None,
            pool: None,
        }
    }
}

/// One node of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildEdge {
    /// Identifier of the [`Action`] producing the outputs.
    pub action_id: String,
    /// Files the action reads and passes on its command line.
    pub inputs: Vec<Utf8PathBuf>,
    /// Files the action reads without naming them on its command line.
    pub implicit_deps: Vec<Utf8PathBuf>,
    /// Files that must exist first but do not trigger rebuilds.
    pub order_only_deps: Vec<Utf8PathBuf>,
    /// Files named by `$out`.
    pub explicit_outputs: Vec<Utf8PathBuf>,
    /// Secondary files written by the same action.
    pub implicit_outputs: Vec<Utf8PathBuf>,
    /// Variables bound for this edge only.
    pub vars: BTreeMap<String, String>,
    /// The edge is an alias with no action.
    pub phony: bool,
    /// Run the action on every invocation regardless of staleness.
    pub always: bool,
}

impl BuildEdge {
    /// Every path this edge waits on, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.inputs
            .iter()
            .chain(&self.implicit_deps)
            .chain(&self.order_only_deps)
    }

    /// Every path this edge produces.
    pub fn outputs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.explicit_outputs.iter().chain(&self.implicit_outputs)
    }
}

/// A named entry point grouping the nodes that realise one goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Name given to Ninja on the command line.
    pub name: String,
    /// Outputs the alias depends on.
    pub sources: Vec<Utf8PathBuf>,
    /// Command run once the sources are current. `$in` names the sources.
    pub action: Option<String>,
    /// Evaluate the alias on every invocation.
    pub always: bool,
}

impl Alias {
    /// Alias over `sources` with no action.
    #[must_use]
    pub fn new(name: impl Into<String>, sources: Vec<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            sources,
            action: None,
            always: false,
        }
    }

    /// Attach a command to the alias.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Mark the alias as always evaluated.
    #[must_use]
    pub const fn always(mut self, always: bool) -> Self {
        self.always = always;
        self
    }
}

/// The complete graph handed to the execution driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    /// Actions keyed by identifier.
    pub actions: HashMap<String, Action>,
    /// Edges keyed by each of their outputs.
    pub targets: HashMap<Utf8PathBuf, BuildEdge>,
    /// Targets Ninja builds when invoked without arguments.
    pub default_targets: Vec<Utf8PathBuf>,
}

/// Errors raised while composing or validating a [`BuildGraph`].
#[derive(Debug, Error, Diagnostic)]
pub enum IrGenError {
    /// Two edges claim the same output.
    #[error("multiple edges produce {}", .outputs.join(", "))]
    #[diagnostic(code(fpgaforge::ir::duplicate_output))]
    DuplicateOutput {
        /// Conflicting outputs, sorted.
        outputs: Vec<String>,
    },

    /// An identifier was registered twice with different commands.
    #[error("action '{action_id}' is already registered with a different command")]
    #[diagnostic(code(fpgaforge::ir::conflicting_action))]
    ConflictingAction {
        /// Identifier registered twice.
        action_id: String,
    },

    /// An edge names an action that was never registered.
    #[error("target '{target_name}' uses unregistered action '{action_id}'")]
    #[diagnostic(code(fpgaforge::ir::unknown_action))]
    UnknownAction {
        /// First output of the offending edge.
        target_name: String,
        /// Identifier that is missing.
        action_id: String,
    },

    /// An explicit input is neither built nor present in the project.
    #[error("target '{target_name}' reads '{source_path}', which is neither built nor present")]
    #[diagnostic(code(fpgaforge::ir::missing_source))]
    MissingSource {
        /// First output of the offending edge.
        target_name: String,
        /// Input that cannot be satisfied.
        source_path: Utf8PathBuf,
    },

    /// The edges form a cycle.
    #[error("circular dependency detected: {}", format_cycle(.cycle))]
    #[diagnostic(code(fpgaforge::ir::circular_dependency))]
    CircularDependency {
        /// Cycle rotated to start at its smallest node.
        cycle: Vec<Utf8PathBuf>,
        /// Dependencies skipped because no edge produces them.
        missing_dependencies: Vec<(Utf8PathBuf, Utf8PathBuf)>,
    },

    /// A command line is not valid shell syntax.
    #[error("invalid command: {snippet}")]
    #[diagnostic(code(fpgaforge::ir::invalid_command))]
    InvalidCommand {
        /// Full offending command.
        command: String,
        /// Leading portion shown to the user.
        snippet: String,
    },

    /// A command template lacks a required placeholder.
    #[error("command '{command}' does not contain the '{placeholder}' placeholder")]
    #[diagnostic(
        code(fpgaforge::ir::missing_placeholder),
        help("the placeholder marks where the file path is inserted")
    )]
    MissingPlaceholder {
        /// Placeholder that must appear.
        placeholder: String,
        /// Template as supplied.
        command: String,
    },
}

fn format_cycle(cycle: &[Utf8PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl BuildGraph {
    /// Register an action under `id`.
    ///
    /// Registering an identical action twice is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`IrGenError::ConflictingAction`] when `id` is taken by a
    /// different action.
    pub fn add_action(&mut self, id: impl Into<String>, action: Action) -> Result<(), IrGenError> {
        let action_id = id.into();
        match self.actions.get(&action_id) {
            Some(existing) if *existing != action => {
                Err(IrGenError::ConflictingAction { action_id })
            }
            Some(_) => Ok(()),
            None => {
                self.actions.insert(action_id, action);
                Ok(())
            }
        }
    }

    /// Insert `edge`, indexing it under each of its outputs.
    ///
    /// # Errors
    ///
    /// Returns [`IrGenError::UnknownAction`] if a non-phony edge names an
    /// unregistered action and [`IrGenError::DuplicateOutput`] when an output
    /// is already produced by another edge.
    pub fn add_edge(&mut self, edge: BuildEdge) -> Result<(), IrGenError> {
        let target_name = edge
            .explicit_outputs
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        if !edge.phony && !self.actions.contains_key(&edge.action_id) {
            return Err(IrGenError::UnknownAction {
                target_name,
                action_id: edge.action_id,
            });
        }
        let mut dups: Vec<String> = edge
            .outputs()
            .filter(|out| self.targets.contains_key(*out))
            .map(ToString::to_string)
            .collect();
        if !dups.is_empty() {
            dups.sort();
            return Err(IrGenError::DuplicateOutput { outputs: dups });
        }
        let outputs: Vec<Utf8PathBuf> = edge.outputs().cloned().collect();
        for out in outputs {
            self.targets.insert(out, edge.clone());
        }
        Ok(())
    }

    /// Lower an [`Alias`] into the graph and return its target path.
    ///
    /// Aliases without an action become phony edges. Aliases with an action
    /// get a dedicated action named `alias_<name>` running in the console
    /// pool, so interactive tools keep the terminal.
    ///
    /// # Errors
    ///
    /// Propagates [`BuildGraph::add_action`] and [`BuildGraph::add_edge`]
    /// failures.
    pub fn add_alias(&mut self, alias: Alias) -> Result<Utf8PathBuf, IrGenError> {
        let target = Utf8PathBuf::from(&alias.name);
        let mut edge = BuildEdge {
            inputs: alias.sources,
            explicit_outputs: vec![target.clone()],
            always: alias.always,
            ..BuildEdge::default()
        };
        if let Some(command) = alias.action {
            let action_id = alias_action_id(&alias.name);
            self.add_action(
                action_id.clone(),
                Action {
                    command,
                    description: Some(alias.name.clone()),
                    pool: Some("console".to_owned()),
                },
            )?;
            edge.action_id = action_id;
        } else {
            edge.phony = true;
        }
        self.add_edge(edge)?;
        Ok(target)
    }

    /// Edge producing `output`, if any.
    #[must_use]
    pub fn edge(&self, output: impl AsRef<Utf8Path>) -> Option<&BuildEdge> {
        self.targets.get(output.as_ref())
    }

    /// Check the graph is executable against `project`.
    ///
    /// Implicit and order-only dependencies may be absent: an assumed
    /// constraints file is reported by the tool that reads it.
    ///
    /// # Errors
    ///
    /// Returns [`IrGenError::CircularDependency`] when edges form a cycle and
    /// [`IrGenError::MissingSource`] when an explicit input is neither built
    /// nor present in the project.
    pub fn validate(&self, project: &ProjectDir) -> Result<(), IrGenError> {
        let report = cycle::analyse(&self.targets);
        if let Some(cycle) = report.cycle {
            let mut missing_dependencies = report.missing_dependencies;
            missing_dependencies.sort();
            missing_dependencies.dedup();
            return Err(IrGenError::CircularDependency {
                cycle,
                missing_dependencies,
            });
        }

        let mut keys: Vec<&Utf8PathBuf> = self.targets.keys().collect();
        keys.sort();
        for key in keys {
            let Some(edge) = self.targets.get(key) else {
                continue;
            };
            if let Some(input) = edge
                .inputs
                .iter()
                .find(|input| !self.targets.contains_key(*input) && !project.is_file(input))
            {
                return Err(IrGenError::MissingSource {
                    target_name: key.to_string(),
                    source_path: input.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Ninja rule names allow only identifier characters and dots.
fn alias_action_id(name: &str) -> String {
    let sanitised: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("alias_{sanitised}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn edge(action: &str, inputs: &[&str], outputs: &[&str]) -> BuildEdge {
        BuildEdge {
            action_id: action.into(),
            inputs: inputs.iter().map(Utf8PathBuf::from).collect(),
            explicit_outputs: outputs.iter().map(Utf8PathBuf::from).collect(),
            ..BuildEdge::default()
        }
    }

    #[rstest]
    fn identical_actions_may_be_registered_twice() {
        let mut graph = BuildGraph::default();
        graph.add_action("cc", Action::new("cc $in")).expect("first");
        graph.add_action("cc", Action::new("cc $in")).expect("second");
        let err = graph
            .add_action("cc", Action::new("gcc $in"))
            .expect_err("conflict");
        assert!(matches!(err, IrGenError::ConflictingAction { .. }));
    }

    #[rstest]
    fn edges_are_indexed_by_every_output() {
        let mut graph = BuildGraph::default();
        graph.add_action("pnr", Action::new("pnr")).expect("action");
        let mut pnr = edge("pnr", &["a.json"], &["a.asc"]);
        pnr.implicit_outputs.push("a.pnr".into());
        graph.add_edge(pnr).expect("edge");
        assert!(graph.edge("a.asc").is_some());
        assert_eq!(graph.edge("a.pnr"), graph.edge("a.asc"));
    }

    #[rstest]
    fn duplicate_outputs_are_rejected() {
        let mut graph = BuildGraph::default();
        graph.add_action("x", Action::new("x")).expect("action");
        graph.add_edge(edge("x", &[], &["out", "b"])).expect("first");
        let err = graph
            .add_edge(edge("x", &[], &["b", "out"]))
            .expect_err("duplicate");
        match err {
            IrGenError::DuplicateOutput { outputs } => assert_eq!(outputs, vec!["b", "out"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn unregistered_actions_are_rejected() {
        let mut graph = BuildGraph::default();
        let err = graph
            .add_edge(edge("nope", &[], &["out"]))
            .expect_err("unknown");
        assert!(matches!(err, IrGenError::UnknownAction { .. }));
    }

    #[rstest]
    fn aliases_with_actions_use_the_console_pool() {
        let mut graph = BuildGraph::default();
        let target = graph
            .add_alias(
                Alias::new("upload", vec!["_build/hardware.bin".into()])
                    .with_action("iceprog $in")
                    .always(true),
            )
            .expect("alias");
        let edge = graph.edge(&target).expect("edge");
        assert_eq!(edge.action_id, "alias_upload");
        assert!(edge.always && !edge.phony);
        let action = graph.actions.get("alias_upload").expect("action");
        assert_eq!(action.pool.as_deref(), Some("console"));
    }

    #[rstest]
    fn validation_rejects_unsatisfied_inputs() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(tmp.path().join("main.v"), "").expect("write");
        let project =
            ProjectDir::open(Utf8Path::from_path(tmp.path()).expect("utf8")).expect("open");

        let mut graph = BuildGraph::default();
        graph.add_action("synth", Action::new("yosys $in")).expect("action");
        let mut synth = edge("synth", &["main.v"], &["_build/hardware.json"]);
        synth.implicit_deps.push("main.pcf".into());
        graph.add_edge(synth).expect("edge");
        graph.validate(&project).expect("valid graph");

        graph.add_edge(edge("synth", &["gone.v"], &["_build/other.json"])).expect("edge");
        let err = graph.validate(&project).expect_err("missing source");
        match err {
            IrGenError::MissingSource { source_path, .. } => assert_eq!(source_path, "gone.v"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn validation_rejects_cycles() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let project =
            ProjectDir::open(Utf8Path::from_path(tmp.path()).expect("utf8")).expect("open");
        let mut graph = BuildGraph::default();
        graph.add_action("x", Action::new("x")).expect("action");
        graph.add_edge(edge("x", &["b"], &["a"])).expect("edge");
        graph.add_edge(edge("x", &["a"], &["b"])).expect("edge");
        let err = graph.validate(&project).expect_err("cycle");
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> a");
    }

    #[rstest]
    fn aliases_without_actions_are_phony() {
        let mut graph = BuildGraph::default();
        graph
            .add_alias(Alias::new("build", vec!["_build/hardware.bin".into()]))
            .expect("alias");
        assert!(graph.edge("build").is_some_and(|e| e.phony));
        assert!(graph.actions.is_empty());
    }
}
