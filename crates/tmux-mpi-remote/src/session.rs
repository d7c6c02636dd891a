//! Detachable session launch.
//!
//! The rank's payload is started as `dtach -N <socket> <payload...>` in a
//! child process. The parent only reports the pid pair; it never waits on or
//! reaps the child, which is left to the outer tmux/MPI launcher.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use log::{debug, info, warn};

use crate::error::{RemoteError, RemoteResult};

/// Socket file name prefix; the parent pid is appended.
pub const SOCKET_PREFIX: &str = "dtach.socket.";

/// Backend flag for "create a new session without attaching".
pub const NEW_SESSION_FLAG: &str = "-N";

/// Socket path for the invocation with process id `pid`.
pub fn socket_path(host_dir: &Path, pid: u32) -> PathBuf {
    host_dir.join(format!("{SOCKET_PREFIX}{pid}"))
}

/// A fully built backend invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    backend: String,
    socket: PathBuf,
    args: Vec<OsString>,
}

impl SessionCommand {
    /// Build `<backend> -N <socket> <payload...>`, keeping the payload verbatim.
    pub fn new(backend: impl Into<String>, socket: &Path, payload: &[OsString]) -> Self {
        let mut args = Vec::with_capacity(payload.len() + 2);
        args.push(OsString::from(NEW_SESSION_FLAG));
        args.push(socket.as_os_str().to_os_string());
        args.extend(payload.iter().cloned());

        Self {
            backend: backend.into(),
            socket: socket.to_path_buf(),
            args,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Arguments passed to the backend, excluding argv[0].
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The part of the arguments that belongs to the user's command.
    pub fn payload(&self) -> &[OsString] {
        &self.args[2..]
    }
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backend)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Process ids reported after a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchReport {
    pub parent_pid: u32,
    pub child_pid: u32,
}

impl fmt::Display for LaunchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.parent_pid, self.child_pid)
    }
}

/// Start the session backend and return without waiting for it.
///
/// A backend that cannot be found or exec'd is reported here as an error.
/// Once the exec succeeded the child runs unsupervised; dropping the
/// `Child` handle neither kills nor reaps it.
pub fn launch(command: &SessionCommand) -> RemoteResult<LaunchReport> {
    let program = which::which(&command.backend).map_err(|_| RemoteError::ToolNotFound {
        tool: command.backend.clone(),
    })?;

    if command.payload().is_empty() {
        warn!("no command given; {} will start without a payload", command.backend);
    }

    let mut cmd = Command::new(&program);
    cmd.args(&command.args);
    #[cfg(unix)]
    cmd.arg0(&command.backend);

    debug!("spawning {:?} {:?}", program, command.args);
    let child = cmd.spawn().map_err(|source| RemoteError::SessionLaunch {
        backend: command.backend.clone(),
        source,
    })?;

    let report = LaunchReport {
        parent_pid: std::process::id(),
        child_pid: child.id(),
    };
    info!(
        "session backend started (pid {}) on {}",
        report.child_pid,
        command.socket.display()
    );
    Ok(report)
}
