//! Build script generating manual pages from the CLI definition.
//!
//! Writes `fpgaforge.1` plus one `fpgaforge-<command>.1` page per visible
//! subcommand into `target/generated-man`.

use clap::{Command, CommandFactory};
use clap_mangen::Man;
use std::{env, fs, path::Path, path::PathBuf};

#[path = "src/cli.rs"]
#[expect(
    dead_code,
    reason = "Only type definitions are needed for man page generation"
)]
mod cli;

fn render_page(
    cmd: Command,
    out_dir: &Path,
    file_stem: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    Man::new(cmd).title(file_stem.to_uppercase()).render(&mut buf)?;
    fs::write(out_dir.join(format!("{file_stem}.1")), buf)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_NAME");
    println!("cargo:rerun-if-env-changed=CARGO_BIN_NAME");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_DESCRIPTION");

    let out_dir = PathBuf::from("target/generated-man");
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir)?;
    }
    fs::create_dir_all(&out_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_owned();
    let cargo_bin = env::var("CARGO_BIN_NAME")
        .or_else(|_| env::var("CARGO_PKG_NAME"))
        .unwrap_or_else(|_| name.clone());
    if name != cargo_bin {
        return Err(format!(
            "CLI name '{name}' differs from Cargo bin/package name '{cargo_bin}'; packaging expects {cargo_bin}.1"
        )
        .into());
    }

    // Hidden commands such as `format-report` are internal to the build file.
    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        let page = format!("{cargo_bin}-{}", sub.get_name());
        render_page(sub.clone(), &out_dir, &page)?;
    }
    render_page(cmd, &out_dir, &cargo_bin)
}
