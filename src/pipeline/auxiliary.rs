//! Goals outside the bitstream chain: graph, sim, test and lint.
//!
//! Each function registers only the builders its goal needs, so a missing
//! tool path for one goal never blocks another.

use camino::{Utf8Path, Utf8PathBuf};

use super::{Composer, Goal, Node, PipelineError};
use crate::builders::BuilderId;
use crate::builders::tools::{self, VCD_OUTPUT_VAR};
use crate::ir::Alias;
use crate::ir::cmd_interpolate::quote_arg;
use crate::project::{BUILD_DIR, TARGET_BASE};
use crate::scanner;
use crate::sources::{SourceSet, file_stem};

/// Design graph rendered from the synthesizable sources.
pub(super) fn graph(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
) -> Result<Utf8PathBuf, PipelineError> {
    if sources.synth.is_empty() {
        return Err(PipelineError::NoSources);
    }
    tools::register_graph(&mut composer.registry, composer.params)?;
    let base = Utf8Path::new(TARGET_BASE);
    let dot = composer.add(
        Node::new(BuilderId::DotGraph, base)
            .sources(sources.synth.clone())
            .always(true),
    )?;
    let image = composer.add(
        Node::new(BuilderId::GraphRender, base)
            .sources(vec![dot.primary])
            .always(true),
    )?;
    composer.alias(Alias::new(Goal::Graph.name(), vec![image.primary]).always(true))
}

/// One testbench simulated and opened in the waveform viewer.
pub(super) fn sim(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
) -> Result<Utf8PathBuf, PipelineError> {
    let testbench = select_testbench(sources, composer.params.testbench.as_deref())?;
    scanner::check_testbench(&testbench, composer.project);
    tools::register_simulation(&mut composer.registry, composer.params, true)?;
    let force = composer.params.force_sim;
    let waveform = simulate(composer, sources, &testbench, force)?;

    let stem = file_stem(testbench.as_str());
    let command = format!(
        "gtkwave --rcvar {} --rcvar {} $in {}",
        quote_arg("splash_disable on"),
        quote_arg("do_initial_zoom_fit 1"),
        quote_arg(&format!("{stem}.gtkw")),
    );
    composer.alias(
        Alias::new(Goal::Sim.name(), vec![waveform])
            .with_action(command)
            .always(true),
    )
}

/// Every testbench, or the one requested, run in batch mode.
///
/// Each testbench gets its own alias under the build directory; `test`
/// aggregates them.
pub(super) fn test(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
) -> Result<Utf8PathBuf, PipelineError> {
    let selected = match composer.params.testbench.as_deref() {
        Some(name) => vec![find_testbench(sources, name)?],
        None => sources.testbenches.clone(),
    };
    if selected.is_empty() {
        return Err(PipelineError::NoTestbench);
    }
    tools::register_simulation(&mut composer.registry, composer.params, false)?;

    let mut runs = Vec::with_capacity(selected.len());
    for testbench in &selected {
        scanner::check_testbench(testbench, composer.project);
        let waveform = simulate(composer, sources, testbench, true)?;
        let name = format!("{BUILD_DIR}/{}", file_stem(testbench.as_str()));
        runs.push(composer.alias(Alias::new(name, vec![waveform]).always(true))?);
    }
    composer.alias(Alias::new(Goal::Test.name(), runs).always(true))
}

/// Verilator over sources and testbenches, after its waiver file.
pub(super) fn lint(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
) -> Result<Utf8PathBuf, PipelineError> {
    let inputs: Vec<Utf8PathBuf> = sources
        .synth
        .iter()
        .chain(&sources.testbenches)
        .cloned()
        .collect();
    if inputs.is_empty() {
        return Err(PipelineError::NoSources);
    }
    tools::register_lint(&mut composer.registry, composer.params)?;
    let base = Utf8Path::new(TARGET_BASE);
    let config = composer.add(Node::new(BuilderId::LintConfig, base))?;
    let report = composer.add(
        Node::new(BuilderId::Lint, base)
            .sources(inputs)
            .implicit_dep(config.primary)
            .always(true),
    )?;
    composer.alias(Alias::new(Goal::Lint.name(), vec![report.primary]).always(true))
}

/// Compile `testbench` with the design and run it; returns the waveform.
fn simulate(
    composer: &mut Composer<'_>,
    sources: &SourceSet,
    testbench: &Utf8Path,
    always: bool,
) -> Result<Utf8PathBuf, PipelineError> {
    let base = Utf8PathBuf::from(format!("{BUILD_DIR}/{}", file_stem(testbench.as_str())));
    let mut inputs = sources.synth.clone();
    inputs.push(testbench.to_path_buf());
    let compiled = composer.add(
        Node::new(BuilderId::TestbenchCompile, &base)
            .sources(inputs)
            .var(VCD_OUTPUT_VAR, quote_arg(base.as_str()))
            .always(always),
    )?;
    let run = composer.add(
        Node::new(BuilderId::TestbenchVcd, &base)
            .sources(vec![compiled.primary])
            .always(always),
    )?;
    Ok(run.primary)
}

/// Testbench `sim` should run.
///
/// An explicit choice must exist. Without one the sole testbench is used;
/// several are ambiguous.
fn select_testbench(
    sources: &SourceSet,
    requested: Option<&str>,
) -> Result<Utf8PathBuf, PipelineError> {
    if let Some(name) = requested {
        return find_testbench(sources, name);
    }
    match sources.testbenches.as_slice() {
        [] => Err(PipelineError::NoTestbench),
        [only] => Ok(only.clone()),
        many => Err(PipelineError::AmbiguousTestbench {
            testbenches: many.iter().map(ToString::to_string).collect(),
        }),
    }
}

fn find_testbench(sources: &SourceSet, name: &str) -> Result<Utf8PathBuf, PipelineError> {
    sources
        .find_testbench(name)
        .map(Utf8Path::to_path_buf)
        .ok_or_else(|| PipelineError::UnknownTestbench {
            name: name.to_owned(),
        })
}
