//! Per-architecture tool chains.
//!
//! Every family runs the same synth → pnr → pack shape. The differences are
//! data: the constraints extension, the nextpnr flavour and its output, and
//! the packer. [`register_core`] renders the three templates for one family.

use camino::{Utf8Path, Utf8PathBuf};

use super::{Builder, BuilderError, BuilderId, BuilderRegistry, hdl_suffixes, render_template};
use crate::config::{Arch, BuildParams, TRELLIS_ENV, YOSYS_LIB_ENV};
use crate::constraints::ConstraintFile;
use crate::ir::cmd_interpolate::{escape_dollars, quote_arg};

/// Tool chain description for one architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchProfile {
    /// Family described.
    pub arch: Arch,
    /// Extension of the physical constraints file.
    pub constraint_extension: &'static str,
    /// Yosys `synth_<family>` pass name.
    pub yosys_family: &'static str,
    /// Place-and-route command template.
    pub pnr_template: &'static str,
    /// Suffix of the place-and-route output.
    pub pnr_suffix: &'static str,
    /// Packer command template.
    pub pack_template: &'static str,
    /// Suffix of the bitstream.
    pub pack_suffix: &'static str,
    /// Macros defined when compiling testbenches.
    pub sim_defines: &'static [&'static str],
    /// Simulation models in the family's Yosys library directory.
    pub lib_files: &'static [&'static str],
}

const SYNTH_TEMPLATE: &str = r#"yosys -p "synth_{family}{top} -json $out" {quiet} $in"#;

const ICE40: ArchProfile = ArchProfile {
    arch: Arch::Ice40,
    constraint_extension: ".pcf",
    yosys_family: "ice40",
    pnr_template: "nextpnr-ice40 --{type}{size} --package {pack} --json $in --asc $out \
                   --report {report} --pcf {constraints} {quiet}",
    pnr_suffix: ".asc",
    pack_template: "icepack $in $out",
    pack_suffix: ".bin",
    sim_defines: &["NO_ICE40_DEFAULT_ASSIGNMENTS"],
    lib_files: &["cells_sim.v"],
};

const ECP5: ArchProfile = ArchProfile {
    arch: Arch::Ecp5,
    constraint_extension: ".lpf",
    yosys_family: "ecp5",
    pnr_template: "nextpnr-ecp5 --{type} --package {pack} --json $in --textcfg $out \
                   --report {report} --lpf {constraints} {quiet} --timing-allow-fail --force",
    pnr_suffix: ".config",
    pack_template: "ecppack --compress --db {db} {idcode} $in $out",
    pack_suffix: ".bit",
    sim_defines: &[],
    lib_files: &["cells_sim.v", "cells_bb.v"],
};

const GOWIN: ArchProfile = ArchProfile {
    arch: Arch::Gowin,
    constraint_extension: ".cst",
    yosys_family: "gowin",
    pnr_template: "nextpnr-himbaechel --device {part} --json $in --write $out \
                   --report {report} --vopt family={type} --vopt cst={constraints} {quiet}",
    pnr_suffix: ".pnr.json",
    pack_template: "gowin_pack -d {type_upper} -o $out $in",
    pack_suffix: ".fs",
    sim_defines: &[],
    lib_files: &["cells_sim.v", "cells_xtra.v"],
};

/// Profile for `arch`.
#[must_use]
pub fn profile(arch: Arch) -> &'static ArchProfile {
    match arch {
        Arch::Ice40 => &ICE40,
        Arch::Ecp5 => &ECP5,
        Arch::Gowin => &GOWIN,
    }
}

/// Emitter for the place-and-route report written beside the primary output.
#[must_use]
pub fn pnr_report(base: &Utf8Path) -> Vec<Utf8PathBuf> {
    vec![report_path(base)]
}

/// Report path for `base`.
#[must_use]
pub fn report_path(base: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{base}.pnr"))
}

/// Family library directory inside the Yosys share directory.
///
/// Forward slashes are used throughout when the platform is Windows.
///
/// # Errors
///
/// Returns [`BuilderError::MissingToolPath`] when `YOSYS_LIB` is unset.
pub fn lib_dir(params: &BuildParams) -> Result<String, BuilderError> {
    let root = params
        .tools
        .yosys_lib
        .as_ref()
        .ok_or(BuilderError::MissingToolPath {
            tool: "yosys",
            env: YOSYS_LIB_ENV,
        })?;
    let dir = root.join(params.arch.name());
    Ok(if params.platform.is_windows() {
        dir.as_str().replace('\\', "/")
    } else {
        dir.into_string()
    })
}

/// ECP5 12k parts are programmed as 25k devices.
fn device_type(params: &BuildParams) -> &str {
    let kind = params.fpga.kind.as_str();
    if params.arch == Arch::Ecp5 && kind == "12k" {
        "25k"
    } else {
        kind
    }
}

fn trellis_db(params: &BuildParams) -> Result<String, BuilderError> {
    params
        .tools
        .trellis
        .as_ref()
        .map(|root| quote_arg(root.join("database").as_str()))
        .ok_or(BuilderError::MissingToolPath {
            tool: "trellis",
            env: TRELLIS_ENV,
        })
}

const fn quiet(verbose: bool) -> &'static str {
    if verbose { "" } else { "-q" }
}

/// Register the synth, pnr and pack builders for `params.arch`.
///
/// # Errors
///
/// Returns [`BuilderError::MissingToolPath`] for ECP5 without a Trellis
/// database, [`BuilderError::UnknownVariable`] for a malformed template, and
/// [`BuilderError::Duplicate`] when the builders are already registered.
pub fn register_core(
    registry: &mut BuilderRegistry,
    params: &BuildParams,
    constraints: &ConstraintFile,
) -> Result<(), BuilderError> {
    let profile = profile(params.arch);
    let base = Utf8Path::new(crate::project::TARGET_BASE);

    // An empty top module leaves the choice to yosys.
    let top = if params.top_module.is_empty() {
        String::new()
    } else {
        format!(" -top {}", escape_dollars(&params.top_module))
    };
    let synth = render_template(
        SYNTH_TEMPLATE,
        &[
            ("family", profile.yosys_family),
            ("top", top.as_str()),
            ("quiet", quiet(params.verbosity.synth_verbose())),
        ],
    )?;

    let kind = escape_dollars(device_type(params));
    let type_upper = kind.to_uppercase();
    let size = escape_dollars(&params.fpga.size);
    let pack = escape_dollars(&params.fpga.pack);
    let part = escape_dollars(&params.fpga.part);
    let report = quote_arg(report_path(base).as_str());
    let constraint_path = quote_arg(constraints.path.as_str());
    let db = if profile.pack_template.contains("{db}") {
        trellis_db(params)?
    } else {
        String::new()
    };
    let idcode = params
        .fpga
        .idcode
        .as_deref()
        .map(|code| format!("--idcode {}", escape_dollars(code)))
        .unwrap_or_default();
    let vars = [
        ("type", kind.as_str()),
        ("type_upper", type_upper.as_str()),
        ("size", size.as_str()),
        ("pack", pack.as_str()),
        ("part", part.as_str()),
        ("report", report.as_str()),
        ("constraints", constraint_path.as_str()),
        ("quiet", quiet(params.verbosity.pnr_verbose())),
        ("db", db.as_str()),
        ("idcode", idcode.as_str()),
    ];
    let pnr = render_template(profile.pnr_template, &vars)?;
    let pack_cmd = render_template(profile.pack_template, &vars)?;

    registry.register(
        BuilderId::Synth,
        Builder::new(synth, ".json")
            .with_description("SYNTH")
            .with_src_suffixes(hdl_suffixes(params.include_sv))
            .with_scanner(),
    )?;
    registry.register(
        BuilderId::Pnr,
        Builder::new(pnr, profile.pnr_suffix)
            .with_description("PNR")
            .with_src_suffixes(&[".json"])
            .with_emitter(pnr_report),
    )?;
    registry.register(
        BuilderId::Pack,
        Builder::new(pack_cmd, profile.pack_suffix)
            .with_description("PACK")
            .with_src_suffixes(&[profile.pnr_suffix]),
    )?;
    Ok(())
}
