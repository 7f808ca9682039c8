//! Ninja file generator.
//!
//! This module converts a [`crate::ir::BuildGraph`] into the textual
//! representation expected by the Ninja build system. The generator sorts
//! actions and edges to ensure deterministic output, so composing the same
//! project twice yields byte-identical files.
//!
//! Edges marked `always` gain an implicit dependency on a phony target with
//! no inputs. Ninja never finds such a target up to date, so every
//! dependent edge is re-run on each invocation.

use crate::ir::{Action, BuildEdge, BuildGraph};
use crate::project::BUILD_DIR;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter, Write};

/// Phony target that is never up to date.
pub const ALWAYS_TARGET: &str = "_build/.always";

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

/// Generate a Ninja build file as a string.
///
/// # Errors
///
/// Returns [`fmt::Error`] if writing to the output buffer fails, which does
/// not happen for in-memory strings.
pub fn generate(graph: &BuildGraph) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "builddir = {BUILD_DIR}")?;
    writeln!(out)?;

    let mut actions: Vec<_> = graph.actions.iter().collect();
    actions.sort_by_key(|(id, _)| *id);
    for (id, action) in actions {
        write!(out, "{}", NamedAction { id, action })?;
    }

    let mut edges: Vec<_> = graph.targets.values().collect();
    edges.sort_by(|a, b| path_key(&a.explicit_outputs).cmp(&path_key(&b.explicit_outputs)));
    let mut seen = HashSet::new();
    let mut needs_sentinel = false;
    for edge in edges {
        let key = path_key(&edge.explicit_outputs);
        if !seen.insert(key) {
            continue;
        }
        needs_sentinel |= edge.always;
        write!(out, "{}", DisplayEdge { edge })?;
    }

    if needs_sentinel {
        writeln!(out, "build {}: phony", escape_path(Utf8Path::new(ALWAYS_TARGET)))?;
        writeln!(out)?;
    }

    if !graph.default_targets.is_empty() {
        let mut defs = graph.default_targets.clone();
        defs.sort();
        writeln!(out, "default {}", join(&defs))?;
    }

    Ok(out)
}

/// Escape the characters Ninja treats specially inside a path.
fn escape_path(path: &Utf8Path) -> String {
    path.as_str()
        .replace('$', "$$")
        .replace(' ', "$ ")
        .replace(':', "$:")
}

/// Convert a slice of paths into a space-separated string.
fn join(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(|p| escape_path(p)).join(" ")
}

/// Generate a stable key for a list of paths.
fn path_key(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(|p| p.as_str()).sorted().join("\u{0}")
}

/// Wrapper struct to display a rule with its identifier.
struct NamedAction<'a> {
    id: &'a str,
    action: &'a Action,
}

impl Display for NamedAction<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule {}", self.id)?;
        writeln!(f, "  command = {}", self.action.command)?;
        write_kv!(f, "description", &self.action.description);
        write_kv!(f, "pool", &self.action.pool);
        writeln!(f)
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a> {
    edge: &'a BuildEdge,
}

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edge = self.edge;
        write!(f, "build {}", join(&edge.explicit_outputs))?;
        if !edge.implicit_outputs.is_empty() {
            write!(f, " | {}", join(&edge.implicit_outputs))?;
        }
        let rule = if edge.phony { "phony" } else { &edge.action_id };
        write!(f, ": {rule}")?;
        if !edge.inputs.is_empty() {
            write!(f, " {}", join(&edge.inputs))?;
        }
        let mut implicit = edge.implicit_deps.clone();
        if edge.always {
            implicit.push(Utf8PathBuf::from(ALWAYS_TARGET));
        }
        if !implicit.is_empty() {
            write!(f, " | {}", join(&implicit))?;
        }
        if !edge.order_only_deps.is_empty() {
            write!(f, " || {}", join(&edge.order_only_deps))?;
        }
        writeln!(f)?;
        for (key, value) in &edge.vars {
            writeln!(f, "  {key} = {value}")?;
        }
        writeln!(f)
    }
}
