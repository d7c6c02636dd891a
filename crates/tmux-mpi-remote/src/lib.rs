//! Per-host session bootstrap for tmux-attached MPI ranks.
//!
//! Each rank's remote process is wrapped by one invocation of
//! `tmux-mpi-remote`, which:
//!
//! 1. creates `<work_dir>/<hostname>/` ([`workdir`]),
//! 2. records the host key into `<host_dir>/fingerprint` once per host
//!    ([`fingerprint`]),
//! 3. starts `dtach -N <host_dir>/dtach.socket.<pid> <command...>` and prints
//!    the parent and child pids ([`session`]).
//!
//! The lines written to stdout are consumed by the tmux side of `tmux-mpi`;
//! logs go to stderr.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod session;
pub mod workdir;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

pub use config::{ConfigOverrides, RemoteConfig};
pub use error::{RemoteError, RemoteResult};
pub use fingerprint::{FingerprintOutcome, FingerprintSource, Keyscan};
pub use session::{LaunchReport, SessionCommand};

/// One invocation's inputs besides the configuration.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Full argv as received, printed for the orchestrator.
    pub argv: Vec<String>,
    /// The rank's command, passed to the backend verbatim.
    pub payload: Vec<OsString>,
    /// Pid the socket is named after; normally `std::process::id()`.
    pub pid: u32,
    /// Print the backend command instead of starting it.
    pub dry_run: bool,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub host_dir: PathBuf,
    pub fingerprint: FingerprintOutcome,
    pub command: SessionCommand,
    /// `None` for dry runs.
    pub launch: Option<LaunchReport>,
}

/// Run the full bootstrap with the `ssh-keyscan` style tool from `config`.
pub fn run<W: Write>(
    config: &RemoteConfig,
    invocation: &Invocation,
    out: &mut W,
) -> Result<RunSummary> {
    let keyscan = Keyscan::new(config.fingerprint_tool.clone());
    run_with(config, invocation, &keyscan, out)
}

/// Run the bootstrap with an explicit fingerprint source.
pub fn run_with<W: Write>(
    config: &RemoteConfig,
    invocation: &Invocation,
    scanner: &dyn FingerprintSource,
    out: &mut W,
) -> Result<RunSummary> {
    let hostname = host::resolve(config.hostname.as_deref())?;
    let host_dir = workdir::setup_work_dirs(&config.work_dir, &hostname)?;
    let fingerprint = fingerprint::record_fingerprint(&host_dir, &hostname, scanner)?;

    let socket = session::socket_path(&host_dir, invocation.pid);
    writeln!(out, "{}", invocation.pid)?;
    writeln!(out, "{:?}", invocation.argv)?;
    writeln!(out, "{}", socket.display())?;

    let command =
        SessionCommand::new(config.session_backend.clone(), &socket, &invocation.payload);

    let launch = if invocation.dry_run {
        info!("dry-run: not starting session backend");
        writeln!(out, "{command}")?;
        None
    } else {
        let report = session::launch(&command)?;
        writeln!(out, "{report}")?;
        Some(report)
    };
    out.flush().context("flushing output")?;

    Ok(RunSummary {
        host_dir,
        fingerprint,
        command,
        launch,
    })
}
