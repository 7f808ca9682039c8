//! Project configuration and the parameters threaded through the pipeline.
//!
//! The project file `fpgaforge.toml` names the architecture and device.
//! Configuration is layered with Figment, lowest precedence first: the tool
//! library locations from the environment (`YOSYS_LIB`, `TRELLIS`), the
//! project file, then command-line overrides. The result is a single
//! [`BuildParams`] value passed explicitly to every component.

use std::fmt;
use std::io;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use ortho_config::figment::providers::{Env, Serialized};
use ortho_config::figment::{self, Figment, Provider};
use ortho_config::uncased::Uncased;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::cli::GraphFormat;
use crate::project::ProjectDir;

/// Name of the project file, relative to the project root.
pub const CONFIG_FILE: &str = "fpgaforge.toml";

/// Environment variable naming the Yosys share directory.
pub const YOSYS_LIB_ENV: &str = "YOSYS_LIB";

/// Environment variable naming the Project Trellis installation.
pub const TRELLIS_ENV: &str = "TRELLIS";

/// Top module assumed when the project file names none.
pub const DEFAULT_TOP_MODULE: &str = "main";

/// FPGA architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// Lattice iCE40.
    Ice40,
    /// Lattice ECP5.
    Ecp5,
    /// Gowin LittleBee and Arora.
    Gowin,
}

impl Arch {
    /// Identifier used in configuration and tool names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ice40 => "ice40",
            Self::Ecp5 => "ecp5",
            Self::Gowin => "gowin",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Architecture family.
    pub arch: Arch,
    /// Top-level module of the design.
    #[serde(default = "default_top_module")]
    pub top_module: String,
    /// Full part number, as used by the Gowin tools.
    #[serde(default)]
    pub fpga_part: String,
    /// Device type, such as `hx8k` or `25k`.
    #[serde(default)]
    pub fpga_type: String,
    /// Device size, such as `8k`.
    #[serde(default)]
    pub fpga_size: String,
    /// Package, such as `ct256`.
    #[serde(default)]
    pub fpga_pack: String,
    /// JTAG id code to embed in the bitstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fpga_idcode: Option<String>,
    /// Programmer command template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programmer: Option<String>,
    /// Treat `.sv` files as sources.
    #[serde(default)]
    pub system_verilog: bool,
}

fn default_top_module() -> String {
    DEFAULT_TOP_MODULE.to_owned()
}

/// The optional `[tools]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Yosys share directory holding per-family cell libraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yosys_lib: Option<Utf8PathBuf>,
    /// Project Trellis installation holding the ECP5 database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trellis: Option<Utf8PathBuf>,
}

/// Command-line values that replace `[project]` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectOverrides {
    /// Top-level module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_module: Option<String>,
    /// Programmer command template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub programmer: Option<String>,
}

/// Parsed contents of [`CONFIG_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Device and design settings.
    pub project: ProjectConfig,
    /// Tool locations.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Errors raised while loading [`CONFIG_FILE`].
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The project has no configuration file.
    #[error("no fpgaforge.toml found in {root}")]
    #[diagnostic(
        code(fpgaforge::config::missing),
        help("create fpgaforge.toml with a [project] table naming the arch")
    )]
    Missing {
        /// Project directory searched.
        root: Utf8PathBuf,
    },
    /// The file exists but could not be read.
    #[error("failed to read fpgaforge.toml")]
    #[diagnostic(code(fpgaforge::config::read))]
    Read(#[source] io::Error),
    /// The file is not valid configuration.
    #[error("invalid fpgaforge.toml: {0}")]
    #[diagnostic(code(fpgaforge::config::parse))]
    Parse(#[from] Box<toml::de::Error>),
    /// The layered configuration does not describe a valid project.
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(fpgaforge::config::merge))]
    Merge(#[from] Box<figment::Error>),
}

impl ConfigFile {
    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys, or an
    /// unsupported architecture.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text).map_err(Box::new)?)
    }

    /// Load [`CONFIG_FILE`] from the project root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the file does not exist, and the
    /// read or parse error otherwise.
    pub fn load(project: &ProjectDir) -> Result<Self, ConfigError> {
        if !project.is_file(CONFIG_FILE) {
            return Err(ConfigError::Missing {
                root: project.root().to_path_buf(),
            });
        }
        let text = project
            .read_to_string(CONFIG_FILE)
            .map_err(ConfigError::Read)?;
        Self::parse(&text)
    }

    /// Environment layer: `YOSYS_LIB` and `TRELLIS` mapped into `[tools]`.
    #[must_use]
    pub fn tool_env() -> Env {
        Env::raw()
            .only(&[YOSYS_LIB_ENV, TRELLIS_ENV])
            .map(|key| Uncased::new(format!("tools.{}", key.as_str().to_ascii_lowercase())))
    }

    /// Layer this file over `env` and `overrides` over the result.
    ///
    /// Keys set in the file beat the environment; overrides beat both.
    /// Empty tool paths count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Merge`] when the layers cannot be extracted into
    /// a configuration, for example when the environment holds a value of the
    /// wrong type.
    pub fn layered(
        &self,
        env: impl Provider,
        overrides: &ProjectOverrides,
    ) -> Result<Self, ConfigError> {
        let mut merged: Self = Figment::from(env)
            .merge(Serialized::defaults(self))
            .merge(Serialized::default("project", overrides))
            .extract()
            .map_err(Box::new)?;
        merged.tools.yosys_lib = merged.tools.yosys_lib.filter(|p| !p.as_str().is_empty());
        merged.tools.trellis = merged.tools.trellis.filter(|p| !p.as_str().is_empty());
        Ok(merged)
    }
}

/// Device identification strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FpgaSpec {
    /// Full part number.
    pub part: String,
    /// Device type.
    pub kind: String,
    /// Device size.
    pub size: String,
    /// Package.
    pub pack: String,
    /// JTAG id code.
    pub idcode: Option<String>,
}

/// Which tools print their full log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    /// Every tool.
    pub all: bool,
    /// Synthesis only.
    pub synth: bool,
    /// Place-and-route only.
    pub pnr: bool,
}

impl Verbosity {
    /// Whether synthesis runs verbosely.
    #[must_use]
    pub const fn synth_verbose(self) -> bool {
        self.all || self.synth
    }

    /// Whether place-and-route runs verbosely.
    #[must_use]
    pub const fn pnr_verbose(self) -> bool {
        self.all || self.pnr
    }

    /// Whether any verbose flag is set.
    #[must_use]
    pub const fn any(self) -> bool {
        self.all || self.synth || self.pnr
    }
}

/// Verilator warning filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintOptions {
    /// Enable every warning.
    pub all: bool,
    /// Disable style warnings.
    pub no_style: bool,
    /// Warnings to disable.
    pub no_warns: Vec<String>,
    /// Warnings to enable.
    pub warns: Vec<String>,
}

/// Host platform, used only to choose path separators in tool arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    id: String,
}

impl Platform {
    /// Platform with the given identifier, such as `linux_x86_64` or `windows_amd64`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Platform the process is running on.
    #[must_use]
    pub fn current() -> Self {
        Self::new(format!(
            "{}_{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    }

    /// Identifier as given.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the identifier names Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.id.to_ascii_lowercase().starts_with("windows")
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Locations of the tool data directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    /// Yosys share directory.
    pub yosys_lib: Option<Utf8PathBuf>,
    /// Project Trellis installation.
    pub trellis: Option<Utf8PathBuf>,
}

impl From<&ToolsConfig> for ToolPaths {
    fn from(tools: &ToolsConfig) -> Self {
        Self {
            yosys_lib: tools.yosys_lib.clone(),
            trellis: tools.trellis.clone(),
        }
    }
}

/// Every value the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParams {
    /// Architecture family.
    pub arch: Arch,
    /// Device identification.
    pub fpga: FpgaSpec,
    /// Top-level module.
    pub top_module: String,
    /// Tool verbosity.
    pub verbosity: Verbosity,
    /// Lint filters.
    pub lint: LintOptions,
    /// Programmer command template.
    pub programmer: Option<String>,
    /// Graph output format.
    pub graph_format: GraphFormat,
    /// Testbench selected for `sim` or `test`.
    pub testbench: Option<String>,
    /// Rebuild the simulation even when current.
    pub force_sim: bool,
    /// Host platform.
    pub platform: Platform,
    /// Treat `.sv` files as sources.
    pub include_sv: bool,
    /// Tool data directories.
    pub tools: ToolPaths,
    /// Program invoked for self-hosted actions such as report formatting.
    pub self_program: String,
}

impl BuildParams {
    /// Defaults for `arch` with no device details.
    #[must_use]
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            fpga: FpgaSpec::default(),
            top_module: DEFAULT_TOP_MODULE.to_owned(),
            verbosity: Verbosity::default(),
            lint: LintOptions::default(),
            programmer: None,
            graph_format: GraphFormat::default(),
            testbench: None,
            force_sim: false,
            platform: Platform::current(),
            include_sv: false,
            tools: ToolPaths::default(),
            self_program: env!("CARGO_PKG_NAME").to_owned(),
        }
    }

    /// Parameters described by a project file.
    #[must_use]
    pub fn from_config(config: &ConfigFile) -> Self {
        let project = &config.project;
        Self {
            fpga: FpgaSpec {
                part: project.fpga_part.clone(),
                kind: project.fpga_type.clone(),
                size: project.fpga_size.clone(),
                pack: project.fpga_pack.clone(),
                idcode: project.fpga_idcode.clone(),
            },
            top_module: project.top_module.clone(),
            programmer: project.programmer.clone(),
            include_sv: project.system_verilog,
            tools: ToolPaths::from(&config.tools),
            ..Self::new(project.arch)
        }
    }
}
