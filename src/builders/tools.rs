//! Builders shared by every architecture: simulation, graphing and lint.

use camino::Utf8PathBuf;
use itertools::Itertools;

use super::arch::{lib_dir, profile};
use super::{Builder, BuilderError, BuilderId, BuilderRegistry, hdl_suffixes, render_template};
use crate::config::BuildParams;
use crate::ir::cmd_interpolate::{escape_dollars, quote_arg};
use crate::project::TARGET_BASE;

/// Per-edge Ninja variable naming the waveform a testbench writes.
pub const VCD_OUTPUT_VAR: &str = "vcd_output";

/// Verilator rules waived for the vendor cell library.
pub const LINT_WAIVERS: [&str; 6] = [
    "COMBDLY",
    "WIDTHEXPAND",
    "PINMISSING",
    "ASSIGNIN",
    "WIDTHTRUNC",
    "INITIALDLY",
];

const IVERILOG_TEMPLATE: &str = "iverilog {std} {verbose} -o $out -DVCD_OUTPUT=$vcd_output \
                                 {interactive} {defines} -I{lib} {lib_files} $in";

const DOT_TEMPLATE: &str = "yosys -f verilog -p \"show -format dot -colors 1 \
                            -wireshape plaintext -prefix {prefix} {top}\" {quiet} $in";

const LINT_TEMPLATE: &str = "verilator --lint-only --bbox-unsup --timing -Wno-TIMESCALEMOD \
                             -Wno-MULTITOP {all} {nostyle} {nowarn} {warn} {top} \
                             -I{lib} {config} $in";

/// Waiver file the lint builder reads.
#[must_use]
pub fn lint_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{TARGET_BASE}.vlt"))
}

/// Contents of the waiver file for the library at `lib`.
#[must_use]
pub fn lint_config_text(lib: &str) -> String {
    let mut text = String::from("`verilator_config\n");
    for rule in LINT_WAIVERS {
        text.push_str(&format!("lint_off -rule {rule} -file \"{lib}/*\"\n"));
    }
    text
}

/// Register the testbench compile and waveform builders.
///
/// `interactive` defines `INTERACTIVE_SIM`, which testbenches use to skip
/// self-checks meant for batch runs.
///
/// # Errors
///
/// Returns [`BuilderError::MissingToolPath`] when `YOSYS_LIB` is unset.
pub fn register_simulation(
    registry: &mut BuilderRegistry,
    params: &BuildParams,
    interactive: bool,
) -> Result<(), BuilderError> {
    let lib = lib_dir(params)?;
    let family = profile(params.arch);
    let defines = family
        .sim_defines
        .iter()
        .map(|name| format!("-D{}", escape_dollars(name)))
        .join(" ");
    let lib_files = family
        .lib_files
        .iter()
        .map(|file| quote_arg(&format!("{lib}/{file}")))
        .join(" ");
    let lib_arg = quote_arg(&lib);
    let compile = render_template(
        IVERILOG_TEMPLATE,
        &[
            ("std", if params.include_sv { "-g2012" } else { "" }),
            ("verbose", if params.verbosity.all { "-v" } else { "" }),
            ("interactive", if interactive { "-DINTERACTIVE_SIM" } else { "" }),
            ("defines", defines.as_str()),
            ("lib", lib_arg.as_str()),
            ("lib_files", lib_files.as_str()),
        ],
    )?;
    registry.register(
        BuilderId::TestbenchCompile,
        Builder::new(compile, ".out")
            .with_description("IVERILOG")
            .with_src_suffixes(hdl_suffixes(params.include_sv))
            .with_scanner(),
    )?;
    registry.register(
        BuilderId::TestbenchVcd,
        Builder::new("vvp $in -dumpfile=$out", ".vcd")
            .with_description("VVP")
            .with_src_suffixes(&[".out"]),
    )
}

/// Register the design graph builders.
///
/// # Errors
///
/// Returns [`BuilderError::Duplicate`] when they are already registered.
pub fn register_graph(
    registry: &mut BuilderRegistry,
    params: &BuildParams,
) -> Result<(), BuilderError> {
    let top = escape_dollars(&params.top_module);
    let dot = render_template(
        DOT_TEMPLATE,
        &[
            ("prefix", TARGET_BASE),
            ("top", top.as_str()),
            ("quiet", if params.verbosity.all { "" } else { "-q" }),
        ],
    )?;
    registry.register(
        BuilderId::DotGraph,
        Builder::new(dot, ".dot")
            .with_description("DOT")
            .with_src_suffixes(hdl_suffixes(params.include_sv))
            .with_scanner(),
    )?;
    let format = params.graph_format.extension();
    registry.register(
        BuilderId::GraphRender,
        Builder::new(format!("dot -T{format} $in -o $out"), format!(".{format}"))
            .with_description("GRAPHVIZ")
            .with_src_suffixes(&[".dot"]),
    )
}

/// Register the Verilator waiver file and lint builders.
///
/// # Errors
///
/// Returns [`BuilderError::MissingToolPath`] when `YOSYS_LIB` is unset.
pub fn register_lint(
    registry: &mut BuilderRegistry,
    params: &BuildParams,
) -> Result<(), BuilderError> {
    let lib = lib_dir(params)?;
    let lines = lint_config_text(&lib).lines().map(quote_arg).join(" ");
    registry.register(
        BuilderId::LintConfig,
        Builder::new(format!("printf '%s\\n' {lines} > $out"), ".vlt")
            .with_description("LINT_CONFIG"),
    )?;

    let lint = &params.lint;
    let flags = |prefix: &str, names: &[String]| {
        names
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| format!("{prefix}{}", escape_dollars(name)))
            .join(" ")
    };
    let nowarn = flags("-Wno-", &lint.no_warns);
    let warn = flags("-Wwarn-", &lint.warns);
    let top = if params.top_module.is_empty() {
        String::new()
    } else {
        format!("--top-module {}", escape_dollars(&params.top_module))
    };
    let lib_arg = quote_arg(&lib);
    let config = quote_arg(lint_config_path().as_str());
    let command = render_template(
        LINT_TEMPLATE,
        &[
            ("all", if lint.all { "-Wall" } else { "" }),
            ("nostyle", if lint.no_style { "-Wno-style" } else { "" }),
            ("nowarn", nowarn.as_str()),
            ("warn", warn.as_str()),
            ("top", top.as_str()),
            ("lib", lib_arg.as_str()),
            ("config", config.as_str()),
        ],
    )?;
    registry.register(
        BuilderId::Lint,
        Builder::new(command, ".lint")
            .with_description("VERILATOR")
            .with_src_suffixes(hdl_suffixes(params.include_sv))
            .with_scanner(),
    )
}
