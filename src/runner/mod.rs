//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! handles command execution. Goals are composed into a build graph, written
//! to `_build/build.ninja`, and handed to the Ninja subprocess whose output
//! is streamed back to the user.

mod error;
mod process;

pub use error::RunnerError;
pub use process::{CommandArg, redact_argument, redact_sensitive_args};
pub use process::{resolve_ninja_program, run_ninja};

use crate::cleanup;
use crate::cli::{Cli, Commands};
use crate::config::{BuildParams, ConfigFile, LintOptions, ProjectOverrides, Verbosity};
use crate::pipeline::{self, Goal};
use crate::project::{BUILD_DIR, ProjectDir};
use crate::{ninja_gen, report};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default Ninja executable to invoke.
pub const NINJA_PROGRAM: &str = "ninja";
/// Environment variable override for the Ninja executable.
pub use ninja_env::NINJA_ENV;

/// Project-relative path of the generated Ninja file.
#[must_use]
pub fn ninja_file() -> Utf8PathBuf {
    Utf8Path::new(BUILD_DIR).join(ninja_env::BUILD_FILE_NAME)
}

/// Wrapper around generated Ninja manifest text.
#[derive(Debug, Clone)]
pub struct NinjaContent(String);
impl NinjaContent {
    /// Store the provided Ninja manifest string.
    #[must_use]
    pub const fn new(content: String) -> Self {
        Self(content)
    }
    /// Borrow the underlying manifest text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// Consume the wrapper returning the owned manifest string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Target list passed through to Ninja.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTargets<'a>(&'a [String]);
impl<'a> BuildTargets<'a> {
    /// Wrap a borrowed list of target names.
    #[must_use]
    pub const fn new(targets: &'a [String]) -> Self {
        Self(targets)
    }
    /// Return the underlying slice of target names.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [String] {
        self.0
    }
}

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded, composition fails, or
/// the Ninja process fails.
pub fn run(cli: &Cli) -> Result<()> {
    let command = cli.command.clone().unwrap_or(Commands::Build);
    match &command {
        Commands::FormatReport { file, verbose } => handle_format_report(file, *verbose),
        Commands::Clean => handle_clean(&open_project(cli)?),
        Commands::Manifest { file, goal } => {
            let project = open_project(cli)?;
            let params = load_params(cli, &command, &project)?;
            let (ninja, _) = generate_ninja(Goal::from(*goal), &params, &project)?;
            if file.as_os_str() == "-" {
                write_ninja_stdout(&ninja)
            } else {
                let path = resolve_output_path(cli, file);
                write_ninja_file(&path, &ninja)
            }
        }
        Commands::Build
        | Commands::Report
        | Commands::Upload { .. }
        | Commands::Graph { .. }
        | Commands::Sim { .. }
        | Commands::Test { .. }
        | Commands::Lint(_) => {
            let project = open_project(cli)?;
            let params = load_params(cli, &command, &project)?;
            handle_goal(cli, goal_of(&command), &params, &project)
        }
    }
}

/// Goal a build-type command asks for.
const fn goal_of(command: &Commands) -> Goal {
    match command {
        Commands::Report => Goal::Report,
        Commands::Upload { .. } => Goal::Upload,
        Commands::Graph { .. } => Goal::Graph,
        Commands::Sim { .. } => Goal::Sim,
        Commands::Test { .. } => Goal::Test,
        Commands::Lint(_) => Goal::Lint,
        Commands::Build
        | Commands::Clean
        | Commands::Manifest { .. }
        | Commands::FormatReport { .. } => Goal::Build,
    }
}

fn open_project(cli: &Cli) -> Result<ProjectDir> {
    let dir = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let root = Utf8PathBuf::from_path_buf(dir)
        .map_err(|path| RunnerError::NonUtf8Path { path })?;
    let project = ProjectDir::open(&root).map_err(|source| RunnerError::ProjectNotFound {
        path: root.clone().into_std_path_buf(),
        source,
    })?;
    Ok(project)
}

/// Merge the project file, environment and CLI flags into [`BuildParams`].
fn load_params(cli: &Cli, command: &Commands, project: &ProjectDir) -> Result<BuildParams> {
    let overrides = ProjectOverrides {
        top_module: cli.top_module.clone(),
        programmer: match command {
            Commands::Upload { programmer } => programmer.clone(),
            _ => None,
        },
    };
    let config = ConfigFile::load(project)?.layered(ConfigFile::tool_env(), &overrides)?;
    let mut params = BuildParams::from_config(&config);
    params.verbosity = Verbosity {
        all: cli.verbose_all,
        synth: cli.verbose_synth,
        pnr: cli.verbose_pnr,
    };
    params.self_program = self_program();
    match command {
        Commands::Graph { format } => params.graph_format = *format,
        Commands::Sim { testbench, force } => {
            params.testbench.clone_from(testbench);
            params.force_sim = *force;
        }
        Commands::Test { testbench } => params.testbench.clone_from(testbench),
        Commands::Lint(args) => {
            params.lint = LintOptions {
                all: args.all,
                no_style: args.nostyle,
                no_warns: args.nowarn.clone(),
                warns: args.warn.clone(),
            };
        }
        _ => {}
    }
    debug!(arch = %params.arch, top = %params.top_module, "resolved build parameters");
    Ok(params)
}

/// Program Ninja runs for self-hosted actions such as `format-report`.
fn self_program() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .map_or_else(
            || env!("CARGO_PKG_NAME").to_owned(),
            Utf8PathBuf::into_string,
        )
}

/// Compose the graph for `goal` and render it as Ninja text.
///
/// # Errors
///
/// Returns an error if composition or rendering fails.
fn generate_ninja(
    goal: Goal,
    params: &BuildParams,
    project: &ProjectDir,
) -> Result<(NinjaContent, Utf8PathBuf)> {
    let (graph, target) = pipeline::compose_goal(goal, params, project)?;
    let ninja = ninja_gen::generate(&graph).context("failed to render Ninja file")?;
    debug!("Ninja file for {goal}:\n{ninja}");
    Ok((NinjaContent::new(ninja), target))
}

/// Write the Ninja file for `goal` and run Ninja on its alias.
fn handle_goal(cli: &Cli, goal: Goal, params: &BuildParams, project: &ProjectDir) -> Result<()> {
    let (ninja, target) = generate_ninja(goal, params, project)?;
    let rel = ninja_file();
    project
        .write(&rel, ninja.as_str())
        .with_context(|| format!("failed to write Ninja file to {}", project.join(&rel)))?;
    let build_path = project.join(&rel);
    info!("Generated Ninja file at {build_path}");

    let targets = [target.into_string()];
    let program = process::resolve_ninja_program();
    run_ninja(
        program.as_path(),
        cli,
        build_path.as_std_path(),
        &BuildTargets::new(&targets),
    )
    .with_context(|| {
        format!(
            "running {} with build file {build_path}",
            program.display()
        )
    })
}

fn handle_clean(project: &ProjectDir) -> Result<()> {
    let plan = cleanup::plan(project)?;
    if plan.is_empty() {
        info!("Nothing to clean in {}", project.root());
        return Ok(());
    }
    plan.execute(project)?;
    Ok(())
}

fn handle_format_report(file: &Path, verbose: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read report {}", file.display()))?;
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    report::format_report(&text, verbose, &mut lock)
        .with_context(|| format!("failed to format report {}", file.display()))?;
    Ok(())
}

/// Resolve an output path relative to the CLI working directory.
fn resolve_output_path(cli: &Cli, path: &Path) -> PathBuf {
    match &cli.directory {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Write `content` to `path` and log the file's location.
fn write_ninja_file(path: &Path, content: &NinjaContent) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    }
    fs::write(path, content.as_str())
        .with_context(|| format!("failed to write Ninja file to {}", path.display()))?;
    info!("Generated Ninja file at {}", path.display());
    Ok(())
}

fn write_ninja_stdout(content: &NinjaContent) -> Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(content.as_str().as_bytes())
        .and_then(|()| lock.flush())
        .context("failed to write Ninja file to stdout")
}
