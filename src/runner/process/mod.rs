//! Process helpers for argument redaction and Ninja subprocess I/O.
//! Internal to `runner`; public API is re-exported from `runner/mod.rs`.

use super::{BuildTargets, NINJA_PROGRAM};
use crate::cli::Cli;
use camino::Utf8PathBuf;
use ninja_env::NINJA_ENV;
use std::{
    env,
    ffi::OsString,
    fs,
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
};
use tracing::{debug, info, warn};

mod redaction;

pub use redaction::{CommandArg, redact_argument, redact_sensitive_args};

pub(super) fn resolve_ninja_program_with<F>(mut read_env: F) -> PathBuf
where
    F: FnMut(&str) -> Option<OsString>,
{
    read_env(NINJA_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(NINJA_PROGRAM), PathBuf::from)
}

/// Determine which Ninja executable to invoke.
///
/// `FPGAFORGE_NINJA` overrides the default `ninja` from `PATH`.
#[must_use]
pub fn resolve_ninja_program() -> PathBuf {
    resolve_ninja_program_with(|key| env::var_os(key))
}

/// Configure the Ninja command with working directory, job count, build file
/// and targets.
fn configure_ninja(
    cmd: &mut Command,
    cli: &Cli,
    build_file: &Path,
    targets: &BuildTargets<'_>,
) -> io::Result<()> {
    if let Some(dir) = &cli.directory {
        cmd.current_dir(fs::canonicalize(dir)?);
    }
    if let Some(jobs) = cli.jobs {
        cmd.arg("-j").arg(jobs.to_string());
    }
    let build_file_path = build_file
        .canonicalize()
        .unwrap_or_else(|_| build_file.to_path_buf());
    cmd.arg("-f").arg(build_file_path);
    cmd.args(targets.as_slice());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    Ok(())
}

fn log_command_execution(cmd: &Command) {
    let program_path = PathBuf::from(cmd.get_program());
    let program_display = Utf8PathBuf::from_path_buf(program_path.clone()).map_or_else(
        |_| program_path.to_string_lossy().into_owned(),
        Utf8PathBuf::into_string,
    );
    let args: Vec<CommandArg> = cmd
        .get_args()
        .map(|a| CommandArg::new(a.to_string_lossy().into_owned()))
        .collect();
    let redacted_args = redact_sensitive_args(&args);
    let arg_strings: Vec<&str> = redacted_args.iter().map(CommandArg::as_str).collect();
    info!(
        "Running command: {} {}",
        program_display,
        arg_strings.join(" ")
    );
}

/// Invoke the Ninja executable with the provided CLI settings.
///
/// The function forwards the job count and working directory to Ninja,
/// names the generated build file, and streams its standard output and
/// error back to the user.
///
/// # Errors
///
/// Returns an [`io::Error`] if the Ninja process fails to spawn, the standard
/// streams are unavailable, or when Ninja reports a non-zero exit status.
pub fn run_ninja(
    program: &Path,
    cli: &Cli,
    build_file: &Path,
    targets: &BuildTargets<'_>,
) -> io::Result<()> {
    let mut cmd = Command::new(program);
    configure_ninja(&mut cmd, cli, build_file, targets)?;
    log_command_execution(&cmd);
    let child = cmd.spawn()?;
    let status = spawn_and_stream_output(child)?;
    check_exit_status(status)
}

fn check_exit_status(status: ExitStatus) -> io::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("ninja exited with {status}")))
    }
}

fn handle_forwarding_thread_result(result: thread::Result<bool>, stream_name: &str) {
    match result {
        Ok(true) => debug!("{stream_name} forwarding encountered closed pipe; output truncated"),
        Ok(false) => {}
        Err(err) => warn!("{stream_name} forwarding thread panicked: {err:?}"),
    }
}

fn spawn_and_stream_output(mut child: Child) -> io::Result<ExitStatus> {
    let Some(stdout) = child.stdout.take() else {
        terminate_child(&mut child, "stdout pipe unavailable");
        return Err(io::Error::other("child process missing stdout pipe"));
    };
    let Some(stderr) = child.stderr.take() else {
        terminate_child(&mut child, "stderr pipe unavailable");
        return Err(io::Error::other("child process missing stderr pipe"));
    };

    let out_handle = thread::spawn(move || {
        let mut lock = io::stdout().lock();
        forward_child_output(BufReader::new(stdout), &mut lock, "stdout")
    });
    let err_handle = thread::spawn(move || {
        let mut lock = io::stderr().lock();
        forward_child_output(BufReader::new(stderr), &mut lock, "stderr")
    });

    let status = child.wait()?;
    handle_forwarding_thread_result(out_handle.join(), "stdout");
    handle_forwarding_thread_result(err_handle.join(), "stderr");
    Ok(status)
}

fn terminate_child(child: &mut Child, context: &str) {
    if let Err(err) = child.kill() {
        debug!("failed to kill child after {context}: {err}");
    }
    if let Err(err) = child.wait() {
        debug!("failed to reap child after {context}: {err}");
    }
}

/// Copy `reader` to `writer`; returns whether writing failed.
///
/// After a write failure the rest of the stream is drained so the child
/// never blocks on a full pipe.
pub(super) fn forward_child_output<R, W>(
    mut reader: R,
    mut writer: W,
    stream_name: &'static str,
) -> bool
where
    R: Read,
    W: Write,
{
    match io::copy(&mut reader, &mut writer) {
        Ok(_) => false,
        Err(err) => {
            debug!(
                "Failed to write child {stream_name} output to parent: {err}; discarding remaining bytes"
            );
            if let Err(drain_err) = io::copy(&mut reader, &mut io::sink()) {
                debug!("Failed to drain child {stream_name} output after writer closed: {drain_err}");
            }
            true
        }
    }
}
