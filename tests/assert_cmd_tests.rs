//! Integration tests for CLI execution using `assert_cmd`.
//!
//! These tests invoke the compiled binary against sandbox projects, with a
//! fake Ninja standing in for the real executable.

use anyhow::{Context, Result, ensure};
use assert_cmd::Command;
use predicates::prelude::*;
use rstest::{fixture, rstest};
use std::fs;
use test_support::{NINJA_ENV, ProjectFixture, fake_ninja, recording_ninja};

#[fixture]
fn blinky() -> ProjectFixture {
    ProjectFixture::blinky()
}

fn fpgaforge(project: &ProjectFixture) -> Result<Command> {
    let mut cmd = Command::cargo_bin("fpgaforge").context("locate fpgaforge binary")?;
    cmd.arg("-C")
        .arg(project.root())
        .env("YOSYS_LIB", "/usr/share/yosys")
        .env_remove("TRELLIS")
        .env_remove(NINJA_ENV);
    Ok(cmd)
}

#[cfg(unix)]
#[rstest]
fn build_writes_ninja_file_and_runs_build_alias(blinky: ProjectFixture) -> Result<()> {
    let (_bin, ninja, log) = recording_ninja();
    fpgaforge(&blinky)?
        .env(NINJA_ENV, &ninja)
        .arg("build")
        .assert()
        .success();

    let generated = fs::read_to_string(blinky.path("_build/build.ninja"))
        .context("read generated build file")?;
    ensure!(generated.contains("rule synth\n"), "missing synth rule");
    ensure!(generated.contains("default build\n"), "missing default");

    let recorded = fs::read_to_string(log).context("read ninja log")?;
    let args: Vec<&str> = recorded.lines().skip(1).collect();
    ensure!(args.first() == Some(&"-f"), "unexpected args {args:?}");
    ensure!(args.last() == Some(&"build"), "unexpected args {args:?}");
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn no_subcommand_defaults_to_build(blinky: ProjectFixture) -> Result<()> {
    let (_bin, ninja, log) = recording_ninja();
    fpgaforge(&blinky)?.env(NINJA_ENV, &ninja).assert().success();
    let recorded = fs::read_to_string(log).context("read ninja log")?;
    ensure!(recorded.ends_with("build\n"), "unexpected log {recorded}");
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn test_goal_runs_the_test_alias(blinky: ProjectFixture) -> Result<()> {
    let (_bin, ninja, log) = recording_ninja();
    fpgaforge(&blinky)?
        .env(NINJA_ENV, &ninja)
        .arg("test")
        .assert()
        .success();
    let recorded = fs::read_to_string(log).context("read ninja log")?;
    ensure!(recorded.ends_with("test\n"), "unexpected log {recorded}");
    let generated = fs::read_to_string(blinky.path("_build/build.ninja"))
        .context("read generated build file")?;
    ensure!(generated.contains("rule testbench_compile\n"), "missing iverilog rule");
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn ninja_failure_is_reported(blinky: ProjectFixture) -> Result<()> {
    let (_bin, ninja) = fake_ninja(1);
    fpgaforge(&blinky)?
        .env(NINJA_ENV, &ninja)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ninja exited with"));
    Ok(())
}

#[rstest]
fn manifest_dash_streams_to_stdout(blinky: ProjectFixture) -> Result<()> {
    fpgaforge(&blinky)?
        .args(["manifest", "-"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("builddir = _build\n"))
        .stdout(predicate::str::contains("rule pnr\n"))
        .stdout(predicate::str::contains("build build: phony _build/hardware.bin\n"));
    ensure!(
        !blinky.path("_build").exists(),
        "manifest - must not write into the project"
    );
    Ok(())
}

#[rstest]
fn manifest_writes_requested_goal_to_file(blinky: ProjectFixture) -> Result<()> {
    fpgaforge(&blinky)?
        .args(["manifest", "out/lint.ninja", "--goal", "lint"])
        .assert()
        .success();
    let text = fs::read_to_string(blinky.path("out/lint.ninja")).context("read manifest")?;
    ensure!(text.contains("rule lint\n"), "missing lint rule");
    ensure!(text.contains("_build/hardware.vlt"), "missing waiver file");
    Ok(())
}

#[rstest]
fn ambiguous_constraints_fail(blinky: ProjectFixture) -> Result<()> {
    blinky.write("other.pcf", "set_io led 1\n");
    fpgaforge(&blinky)?
        .args(["manifest", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "found multiple '*.pcf' files: main.pcf, other.pcf",
        ));
    Ok(())
}

#[rstest]
fn upload_without_programmer_fails(blinky: ProjectFixture) -> Result<()> {
    fpgaforge(&blinky)?
        .args(["manifest", "-", "--goal", "upload"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no programmer command configured"));
    Ok(())
}

#[rstest]
fn missing_config_fails() -> Result<()> {
    let project = ProjectFixture::with_files(&[("main.v", "module main; endmodule\n")]);
    fpgaforge(&project)?
        .args(["manifest", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no fpgaforge.toml found"));
    Ok(())
}

#[rstest]
fn missing_project_directory_fails() -> Result<()> {
    let project = ProjectFixture::empty();
    let mut cmd = Command::cargo_bin("fpgaforge").context("locate fpgaforge binary")?;
    cmd.arg("-C")
        .arg(project.path("absent"))
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open project directory"));
    Ok(())
}

#[rstest]
fn clean_removes_artefacts_without_config() -> Result<()> {
    let project = ProjectFixture::with_files(&[
        ("main.v", "module main; endmodule\n"),
        ("_build/hardware.json", "{}"),
        ("_build/sim/main_tb.out", ""),
        ("zadig.ini", ""),
    ]);
    fpgaforge(&project)?.arg("clean").assert().success();
    ensure!(!project.path("_build").exists(), "_build should be removed");
    ensure!(!project.path("zadig.ini").exists(), "zadig.ini should be removed");
    ensure!(project.path("main.v").exists(), "sources must survive");
    Ok(())
}

#[rstest]
fn clean_on_a_clean_project_succeeds(blinky: ProjectFixture) -> Result<()> {
    fpgaforge(&blinky)?.arg("clean").assert().success();
    Ok(())
}

#[rstest]
fn format_report_prints_utilisation() -> Result<()> {
    let project = ProjectFixture::with_files(&[(
        "hardware.pnr",
        r#"{"utilization": {"ICESTORM_LC": {"used": 96, "available": 1280}}, "fmax": {}}"#,
    )]);
    let mut cmd = Command::cargo_bin("fpgaforge").context("locate fpgaforge binary")?;
    cmd.arg("format-report")
        .arg(project.path("hardware.pnr"))
        .assert()
        .success()
        .stdout(predicate::str::contains("FPGA Resource Utilization"))
        .stdout(predicate::str::contains("ICESTORM_LC"))
        .stdout(predicate::str::contains("No clocks were found in the design."));
    Ok(())
}

#[rstest]
fn format_report_rejects_malformed_input() -> Result<()> {
    let project = ProjectFixture::with_files(&[("hardware.pnr", "not json")]);
    let mut cmd = Command::cargo_bin("fpgaforge").context("locate fpgaforge binary")?;
    cmd.arg("format-report")
        .arg(project.path("hardware.pnr"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed place-and-route report"));
    Ok(())
}

#[rstest]
fn invalid_jobs_are_rejected() -> Result<()> {
    let mut cmd = Command::cargo_bin("fpgaforge").context("locate fpgaforge binary")?;
    cmd.args(["-j", "0", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("jobs must be between 1 and"));
    Ok(())
}
