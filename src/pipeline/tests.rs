//! Tests for target graph composition.

use super::*;
use crate::config::Arch;
use crate::constraints::ConstraintError;
use crate::ninja_gen;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

struct Project {
    tmp: TempDir,
}

impl Project {
    fn with(files: &[(&str, &str)]) -> Self {
        let tmp = TempDir::new().expect("temp dir");
        for (name, text) in files {
            fs::write(tmp.path().join(name), text).expect("write source");
        }
        Self { tmp }
    }

    fn dir(&self) -> ProjectDir {
        let root = Utf8Path::from_path(self.tmp.path()).expect("utf8 temp dir");
        ProjectDir::open(root).expect("open project")
    }
}

#[fixture]
fn blinky() -> Project {
    Project::with(&[
        ("main.v", "module main(output led); assign led = 1; endmodule\n"),
        ("main.pcf", "set_io led 99\n"),
        ("main_tb.v", "module main_tb; main uut(); endmodule\n"),
    ])
}

#[fixture]
fn params() -> BuildParams {
    let mut params = BuildParams::new(Arch::Ice40);
    params.tools.yosys_lib = Some("/yosys".into());
    params.self_program = "fpgaforge".into();
    params
}

fn compose_ok(goal: Goal, params: &BuildParams, project: &Project) -> (BuildGraph, Utf8PathBuf) {
    compose_goal(goal, params, &project.dir()).expect("compose")
}

fn paths(items: &[&str]) -> Vec<Utf8PathBuf> {
    items.iter().map(Utf8PathBuf::from).collect()
}

fn words(command: &str) -> Vec<String> {
    shlex::split(&command.replace("$$", "$")).expect("shell words")
}

#[rstest]
fn build_chains_synth_pnr_and_pack(blinky: Project, params: BuildParams) {
    let (graph, target) = compose_ok(Goal::Build, &params, &blinky);
    assert_eq!(target, "build");
    assert_eq!(graph.default_targets, paths(&["build"]));

    let synth = graph.edge("_build/hardware.json").expect("synth edge");
    assert_eq!(synth.action_id, "synth");
    assert_eq!(synth.inputs, paths(&["main.v"]));
    assert!(!synth.always);

    let pnr = graph.edge("_build/hardware.asc").expect("pnr edge");
    assert_eq!(pnr.inputs, paths(&["_build/hardware.json"]));
    assert_eq!(pnr.implicit_outputs, paths(&["_build/hardware.pnr"]));
    assert!(pnr.implicit_deps.contains(&Utf8PathBuf::from("main.pcf")));

    let pack = graph.edge("_build/hardware.bin").expect("pack edge");
    assert_eq!(pack.inputs, paths(&["_build/hardware.asc"]));

    let build = graph.edge("build").expect("build alias");
    assert!(build.phony);
    assert_eq!(build.inputs, paths(&["_build/hardware.bin"]));
    assert!(!build.always);
    assert!(graph.edge("report").is_none());
}

#[rstest]
#[case(Arch::Ecp5, "_build/hardware.config", "_build/hardware.bit", "main.lpf")]
#[case(Arch::Gowin, "_build/hardware.pnr.json", "_build/hardware.fs", "main.cst")]
fn every_family_uses_its_own_suffixes(
    mut params: BuildParams,
    #[case] arch: Arch,
    #[case] placed: &str,
    #[case] bitstream: &str,
    #[case] constraints: &str,
) {
    params.arch = arch;
    params.tools.trellis = Some("/trellis".into());
    let project = Project::with(&[("main.v", "module main; endmodule\n")]);
    let (graph, _) = compose_ok(Goal::Build, &params, &project);
    let pnr = graph.edge(placed).expect("pnr edge");
    assert_eq!(pnr.implicit_deps, paths(&[constraints]));
    assert!(graph.edge(bitstream).is_some());
}

#[rstest]
fn missing_constraints_file_is_assumed(params: BuildParams) {
    let project = Project::with(&[("main.v", "module main; endmodule\n")]);
    let (graph, _) = compose_ok(Goal::Build, &params, &project);
    let pnr = graph.edge("_build/hardware.asc").expect("pnr edge");
    assert_eq!(pnr.implicit_deps, paths(&["main.pcf"]));
}

#[rstest]
fn ambiguous_constraints_abort_composition(params: BuildParams) {
    let project = Project::with(&[
        ("main.v", "module main; endmodule\n"),
        ("a.pcf", ""),
        ("b.pcf", ""),
    ]);
    let err = compose_goal(Goal::Build, &params, &project.dir()).expect_err("ambiguous");
    match err {
        PipelineError::Constraint(ConstraintError::Ambiguous { files, .. }) => {
            assert_eq!(files, vec!["a.pcf", "b.pcf"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn build_without_sources_fails(params: BuildParams) {
    let project = Project::with(&[("notes.txt", "")]);
    let err = compose_goal(Goal::Build, &params, &project.dir()).expect_err("no sources");
    assert!(matches!(err, PipelineError::NoSources));
}

#[rstest]
#[case("my design.v")]
#[case("bench\tone_tb.v")]
fn whitespace_in_source_names_is_rejected(params: BuildParams, #[case] name: &str) {
    let project = Project::with(&[("main.v", "module main; endmodule\n"), (name, "")]);
    let err = compose_goal(Goal::Build, &params, &project.dir()).expect_err("should fail");
    assert!(
        matches!(&err, PipelineError::WhitespaceInSource { name: found } if found == name),
        "unexpected {err:?}"
    );
}

#[rstest]
fn verbose_flags_force_steps_and_alias(blinky: Project, mut params: BuildParams) {
    params.verbosity.synth = true;
    let (graph, _) = compose_ok(Goal::Build, &params, &blinky);
    assert!(graph.edge("_build/hardware.json").expect("synth").always);
    assert!(!graph.edge("_build/hardware.asc").expect("pnr").always);
    assert!(graph.edge("build").expect("build").always);
}

#[rstest]
fn scanned_references_become_implicit_deps(params: BuildParams) {
    let project = Project::with(&[
        ("main.v", "`include \"defs.vh\"\n$readmemh(\"rom.hex\", mem);\nmodule main; endmodule\n"),
        ("defs.vh", ""),
    ]);
    let (graph, _) = compose_ok(Goal::Build, &params, &project);
    let synth = graph.edge("_build/hardware.json").expect("synth edge");
    assert_eq!(synth.implicit_deps, paths(&["defs.vh"]));
}

#[rstest]
fn report_formats_the_pnr_report(blinky: Project, params: BuildParams) {
    let (graph, target) = compose_ok(Goal::Report, &params, &blinky);
    assert_eq!(target, "report");
    let report = graph.edge("report").expect("report alias");
    assert_eq!(report.inputs, paths(&["_build/hardware.pnr"]));
    assert!(report.always);
    let action = graph.actions.get(&report.action_id).expect("report action");
    assert_eq!(words(&action.command), ["fpgaforge", "format-report", "$in"]);
    assert_eq!(action.pool.as_deref(), Some("console"));
}

#[rstest]
fn upload_binds_the_bitstream(blinky: Project, mut params: BuildParams) {
    params.programmer = Some("iceprog -d i:0x0403:0x6010 $SOURCE".into());
    let (graph, _) = compose_ok(Goal::Upload, &params, &blinky);
    let upload = graph.edge("upload").expect("upload alias");
    assert_eq!(upload.inputs, paths(&["_build/hardware.bin"]));
    let action = graph.actions.get(&upload.action_id).expect("upload action");
    assert_eq!(action.command, "iceprog -d i:0x0403:0x6010 $in");
}

#[rstest]
fn upload_without_placeholder_is_rejected(blinky: Project, mut params: BuildParams) {
    params.programmer = Some("iceprog hardware.bin".into());
    let err = compose_goal(Goal::Upload, &params, &blinky.dir()).expect_err("placeholder");
    assert!(matches!(
        err,
        PipelineError::Graph(IrGenError::MissingPlaceholder { .. })
    ));
}

#[rstest]
fn upload_without_programmer_is_rejected(blinky: Project, params: BuildParams) {
    let err = compose_goal(Goal::Upload, &params, &blinky.dir()).expect_err("programmer");
    assert!(matches!(err, PipelineError::MissingProgrammer));
}

#[rstest]
fn graph_renders_the_requested_format(blinky: Project, mut params: BuildParams) {
    params.graph_format = crate::config::GraphFormat::Pdf;
    let (graph, target) = compose_ok(Goal::Graph, &params, &blinky);
    assert_eq!(target, "graph");
    let render = graph.edge("_build/hardware.pdf").expect("render edge");
    assert_eq!(render.inputs, paths(&["_build/hardware.dot"]));
    assert!(render.always);
    assert!(graph.edge("_build/hardware.asc").is_none());
}

#[rstest]
fn sim_runs_the_sole_testbench(blinky: Project, params: BuildParams) {
    let (graph, target) = compose_ok(Goal::Sim, &params, &blinky);
    assert_eq!(target, "sim");
    let compile = graph.edge("_build/main_tb.out").expect("compile edge");
    assert_eq!(compile.inputs, paths(&["main.v", "main_tb.v"]));
    let vcd = compile.vars.get(VCD_OUTPUT).expect("vcd var");
    assert_eq!(words(vcd), ["_build/main_tb"], "macro carries no extension");
    assert!(!compile.always);
    let sim = graph.edge("sim").expect("sim alias");
    assert_eq!(sim.inputs, paths(&["_build/main_tb.vcd"]));
    let action = graph.actions.get(&sim.action_id).expect("sim action");
    let viewer = words(&action.command);
    assert_eq!(viewer.first().map(String::as_str), Some("gtkwave"));
    assert!(viewer.ends_with(&["$in".to_owned(), "main_tb.gtkw".to_owned()]));
    assert!(viewer.contains(&"splash_disable on".to_owned()));
}

const VCD_OUTPUT: &str = crate::builders::tools::VCD_OUTPUT_VAR;

#[rstest]
fn sim_force_rebuilds(blinky: Project, mut params: BuildParams) {
    params.force_sim = true;
    let (graph, _) = compose_ok(Goal::Sim, &params, &blinky);
    assert!(graph.edge("_build/main_tb.out").expect("compile").always);
    assert!(graph.edge("_build/main_tb.vcd").expect("vcd").always);
}

#[rstest]
fn sim_with_several_testbenches_needs_a_choice(mut params: BuildParams) {
    let project = Project::with(&[
        ("main.v", "module main; endmodule\n"),
        ("b_tb.v", ""),
        ("a_tb.v", ""),
    ]);
    let err = compose_goal(Goal::Sim, &params, &project.dir()).expect_err("ambiguous");
    match err {
        PipelineError::AmbiguousTestbench { testbenches } => {
            assert_eq!(testbenches, vec!["a_tb.v", "b_tb.v"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    params.testbench = Some("b_tb".into());
    let (graph, _) = compose_goal(Goal::Sim, &params, &project.dir()).expect("compose");
    assert!(graph.edge("_build/b_tb.vcd").is_some());
    assert!(graph.edge("_build/a_tb.vcd").is_none());
}

#[rstest]
#[case(Goal::Sim)]
#[case(Goal::Test)]
fn missing_testbench_is_reported(params: BuildParams, #[case] goal: Goal) {
    let project = Project::with(&[("main.v", "module main; endmodule\n")]);
    let err = compose_goal(goal, &params, &project.dir()).expect_err("no testbench");
    assert!(matches!(err, PipelineError::NoTestbench));
}

#[rstest]
fn unknown_testbench_is_reported(blinky: Project, mut params: BuildParams) {
    params.testbench = Some("nope_tb.v".into());
    let err = compose_goal(Goal::Test, &params, &blinky.dir()).expect_err("unknown");
    assert!(matches!(err, PipelineError::UnknownTestbench { name } if name == "nope_tb.v"));
}

#[rstest]
fn test_aggregates_one_alias_per_testbench(params: BuildParams) {
    let project = Project::with(&[
        ("main.v", "module main; endmodule\n"),
        ("a_tb.v", ""),
        ("b_tb.v", ""),
    ]);
    let (graph, target) = compose_ok(Goal::Test, &params, &project);
    assert_eq!(target, "test");
    let test = graph.edge("test").expect("test alias");
    assert_eq!(test.inputs, paths(&["_build/a_tb", "_build/b_tb"]));
    assert!(test.always);
    for name in ["a_tb", "b_tb"] {
        let run = graph.edge(format!("_build/{name}")).expect("testbench alias");
        assert_eq!(run.inputs, paths(&[format!("_build/{name}.vcd").as_str()]));
        assert!(graph.edge(format!("_build/{name}.out")).expect("compile").always);
    }
}

#[rstest]
fn lint_waits_for_its_waiver_file(blinky: Project, params: BuildParams) {
    let (graph, target) = compose_ok(Goal::Lint, &params, &blinky);
    assert_eq!(target, "lint");
    let config = graph.edge("_build/hardware.vlt").expect("config edge");
    assert!(config.inputs.is_empty());
    let lint = graph.edge("_build/hardware.lint").expect("lint edge");
    assert_eq!(lint.inputs, paths(&["main.v", "main_tb.v"]));
    assert!(lint.implicit_deps.contains(&Utf8PathBuf::from("_build/hardware.vlt")));
    assert!(lint.always);
}

#[rstest]
fn auxiliary_goals_need_the_yosys_library(blinky: Project) {
    let params = BuildParams::new(Arch::Ice40);
    let err = compose_goal(Goal::Lint, &params, &blinky.dir()).expect_err("yosys lib");
    assert!(matches!(
        err,
        PipelineError::Builder(BuilderError::MissingToolPath { .. })
    ));
}

#[rstest]
fn named_goals_select_the_mode(blinky: Project, params: BuildParams) {
    let project = blinky.dir();
    assert!(matches!(
        compose_named("clean", &params, &project).expect("clean"),
        Plan::Cleanup(_)
    ));
    assert!(matches!(
        compose_named("deploy", &params, &project).expect("unknown"),
        Plan::Nothing
    ));
    assert!(matches!(
        compose_named("lint", &params, &project).expect("lint"),
        Plan::Graph { target, .. } if target == "lint"
    ));
}

#[rstest]
fn composition_is_deterministic(blinky: Project, params: BuildParams) {
    for goal in Goal::ALL {
        if goal == Goal::Upload {
            continue;
        }
        let (first, _) = compose_ok(goal, &params, &blinky);
        let (second, _) = compose_ok(goal, &params, &blinky);
        assert_eq!(
            ninja_gen::generate(&first).expect("first"),
            ninja_gen::generate(&second).expect("second"),
            "{goal} differs between runs"
        );
    }
}

#[rstest]
#[case("build", Some(Goal::Build))]
#[case("test", Some(Goal::Test))]
#[case("clean", None)]
#[case("Build", None)]
fn goal_names_round_trip(#[case] name: &str, #[case] expected: Option<Goal>) {
    assert_eq!(Goal::from_name(name), expected);
    if let Some(goal) = expected {
        assert_eq!(goal.name(), name);
    }
}
