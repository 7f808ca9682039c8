//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. It only
//! depends on `clap` and the standard library because the build script
//! includes it to render the manual page.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Maximum number of jobs accepted by the CLI.
const MAX_JOBS: usize = 64;

fn parse_jobs(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("{s} is not a valid number"))?;
    if (1..=MAX_JOBS).contains(&value) {
        Ok(value)
    } else {
        Err(format!("jobs must be between 1 and {MAX_JOBS}"))
    }
}

/// Build FPGA bitstreams, simulations and lint reports from an HDL project.
#[derive(Debug, Parser)]
#[command(name = "fpgaforge", author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Set the number of parallel build jobs.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show the full output of every tool.
    #[arg(long, global = true)]
    pub verbose_all: bool,

    /// Show the full synthesis log.
    #[arg(long, global = true)]
    pub verbose_synth: bool,

    /// Show the full place-and-route log.
    #[arg(long, global = true)]
    pub verbose_pnr: bool,

    /// Override the top module named in the project file.
    #[arg(long, value_name = "MODULE", global = true)]
    pub top_module: Option<String>,

    /// Optional subcommand to execute; defaults to `build` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Parse command-line arguments, providing `build` as the default command.
    #[must_use]
    pub fn parse_with_default() -> Self {
        Self::parse().with_default_command()
    }

    /// Parse the provided arguments, applying the default command when needed.
    ///
    /// # Errors
    ///
    /// Returns the clap error when the arguments are invalid.
    pub fn try_parse_from_with_default<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args).map(Self::with_default_command)
    }

    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Build);
        }
        self
    }
}

/// Output format of the rendered design graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum GraphFormat {
    /// Scalable vector graphics.
    #[default]
    Svg,
    /// Portable document format.
    Pdf,
    /// Portable network graphics.
    Png,
}

impl GraphFormat {
    /// File extension and `dot -T` argument for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

/// Goal whose Ninja file `manifest` writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ManifestGoal {
    /// Synthesis, place-and-route and packing.
    #[default]
    Build,
    /// Place-and-route report.
    Report,
    /// Device programming.
    Upload,
    /// Design graph rendering.
    Graph,
    /// Interactive simulation.
    Sim,
    /// Every testbench.
    Test,
    /// Verilator lint.
    Lint,
}

/// Options accepted by the `lint` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct LintArgs {
    /// Enable every Verilator warning.
    #[arg(long)]
    pub all: bool,

    /// Disable style warnings.
    #[arg(long)]
    pub nostyle: bool,

    /// Comma separated warnings to disable.
    #[arg(long, value_name = "WARNINGS", value_delimiter = ',')]
    pub nowarn: Vec<String>,

    /// Comma separated warnings to enable.
    #[arg(long, value_name = "WARNINGS", value_delimiter = ',')]
    pub warn: Vec<String>,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Synthesise, place and route, and pack the bitstream `default`.
    Build,

    /// Print the resource utilisation and timing report.
    Report,

    /// Program the bitstream onto the board.
    Upload {
        /// Programmer command; `$SOURCE` is replaced by the bitstream path.
        #[arg(long, value_name = "COMMAND")]
        programmer: Option<String>,
    },

    /// Render the synthesised design as a graph.
    Graph {
        /// Output format.
        #[arg(long, value_enum, default_value_t = GraphFormat::Svg)]
        format: GraphFormat,
    },

    /// Simulate a testbench and open the waveform viewer.
    Sim {
        /// Testbench file or name; required when there are several.
        #[arg(value_name = "TESTBENCH")]
        testbench: Option<String>,

        /// Rebuild the simulation even when it is current.
        #[arg(long)]
        force: bool,
    },

    /// Run every testbench, or only the one named.
    Test {
        /// Testbench file or name.
        #[arg(value_name = "TESTBENCH")]
        testbench: Option<String>,
    },

    /// Lint the sources with Verilator.
    Lint(LintArgs),

    /// Remove build artefacts and intermediate files.
    Clean,

    /// Write the Ninja manifest to the specified file without invoking Ninja.
    Manifest {
        /// Output path for the generated Ninja file; `-` writes to stdout.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Goal to generate the manifest for.
        #[arg(long, value_enum, default_value_t = ManifestGoal::Build)]
        goal: ManifestGoal,
    },

    /// Format a place-and-route report.
    #[command(hide = true)]
    FormatReport {
        /// Report written by nextpnr.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// List unused cells as well.
        #[arg(long)]
        verbose: bool,
    },
}
