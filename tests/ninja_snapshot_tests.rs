//! Snapshots of the Ninja structure composed for every goal.
//!
//! The blinky fixture is composed for each goal and the rule, build and
//! default lines of the generated file are compared with `insta`
//! snapshots. Commands are left out so tool flag changes do not churn the
//! graph shape recorded here.

use anyhow::{Context, Result};
use fpgaforge::config::{BuildParams, ConfigFile, ProjectOverrides};
use fpgaforge::ninja_gen;
use fpgaforge::pipeline::{self, Goal};
use fpgaforge::project::ProjectDir;
use insta::{Settings, assert_snapshot};
use ortho_config::figment::Figment;
use ortho_config::figment::providers::Serialized;
use rstest::rstest;
use test_support::ProjectFixture;

fn blinky_params(project: &ProjectFixture) -> Result<(ProjectDir, BuildParams)> {
    let dir = ProjectDir::open(project.root()).context("open project")?;
    let env = Figment::new().merge(Serialized::default("tools.yosys_lib", "/usr/share/yosys"));
    let overrides = ProjectOverrides {
        top_module: None,
        programmer: Some("iceprog $SOURCE".to_owned()),
    };
    let config = ConfigFile::load(&dir)
        .context("load config")?
        .layered(env, &overrides)
        .context("layer config")?;
    let mut params = BuildParams::from_config(&config);
    params.self_program = "fpgaforge".to_owned();
    Ok((dir, params))
}

fn structure(ninja: &str) -> String {
    ninja
        .lines()
        .filter(|line| {
            ["builddir ", "rule ", "build ", "default "]
                .iter()
                .any(|prefix| line.starts_with(prefix))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[rstest]
#[case(Goal::Build)]
#[case(Goal::Report)]
#[case(Goal::Upload)]
#[case(Goal::Graph)]
#[case(Goal::Sim)]
#[case(Goal::Test)]
#[case(Goal::Lint)]
fn goal_graph_structure(#[case] goal: Goal) -> Result<()> {
    let project = ProjectFixture::blinky();
    let (dir, params) = blinky_params(&project)?;
    let (graph, _) = pipeline::compose_goal(goal, &params, &dir)?;
    let ninja = ninja_gen::generate(&graph)?;

    let mut settings = Settings::new();
    settings.set_snapshot_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/snapshots/ninja"));
    settings.set_prepend_module_to_snapshot(false);
    settings.bind(|| {
        assert_snapshot!(format!("goal_{}", goal.name()), structure(&ninja));
    });
    Ok(())
}
