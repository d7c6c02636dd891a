//! tmux-mpi-remote - start one MPI rank inside a detachable dtach session.
//!
//! Run on the remote host in place of the rank's command:
//!
//! ```bash
//! mpirun -n 4 tmux-mpi-remote ./a.out --steps 100
//! ```
//!
//! Everything from the first positional argument on is the rank's command and
//! is handed to `dtach -N <socket>` untouched. Options are only recognised
//! before it.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::debug;

use tmux_mpi_remote::{ConfigOverrides, Invocation, RemoteConfig};

#[derive(Parser, Debug)]
#[command(
    name = "tmux-mpi-remote",
    version,
    about = "Start an MPI rank inside a per-host dtach session",
    after_help = "Examples:\n  \
        tmux-mpi-remote ./a.out --steps 100\n  \
        tmux-mpi-remote --work-dir /scratch/sessions -- python solver.py\n  \
        tmux-mpi-remote --dry-run echo hello"
)]
struct Cli {
    /// Path to config file (TOML).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Root of the per-host work directories.
    #[arg(long, value_name = "PATH")]
    work_dir: Option<PathBuf>,

    /// Use this hostname instead of the detected one.
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,

    /// Detachable session program.
    #[arg(long, value_name = "PROG")]
    session_backend: Option<String>,

    /// Host key scanner program.
    #[arg(long, value_name = "PROG")]
    fingerprint_tool: Option<String>,

    /// Print the session command without starting it.
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// Increase logging verbosity (stackable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors that abort the run.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// The rank's command and its arguments.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            work_dir: self.work_dir.clone(),
            hostname: self.hostname.clone(),
            session_backend: self.session_backend.clone(),
            fingerprint_tool: self.fingerprint_tool.clone(),
        }
    }

    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn try_main() -> Result<()> {
    let argv: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let config = RemoteConfig::load(cli.config.as_deref(), &cli.overrides())?;
    debug!("effective config: {:?}", config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let invocation = Invocation {
        argv,
        payload: cli.command,
        pid: std::process::id(),
        dry_run: cli.dry_run,
    };
    tmux_mpi_remote::run(&config, &invocation, &mut io::stdout().lock())?;
    Ok(())
}
