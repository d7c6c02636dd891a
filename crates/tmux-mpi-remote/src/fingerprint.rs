//! Host key fingerprint recording.
//!
//! Every rank on a host calls [`record_fingerprint`], but only the first one
//! to exclusively create `<host_dir>/fingerprint` runs the scan and writes it.
//! The others see the file and return [`FingerprintOutcome::AlreadyPresent`].
//! The exclusive create (`O_CREAT | O_EXCL`) is the only synchronisation.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::{RemoteError, RemoteResult};

/// File name of the fingerprint inside the host directory.
pub const FINGERPRINT_FILE: &str = "fingerprint";

/// Something that can produce host key material for a hostname.
pub trait FingerprintSource {
    /// Return the raw key material for `hostname`.
    fn scan(&self, hostname: &str) -> RemoteResult<Vec<u8>>;
}

/// Runs `ssh-keyscan <hostname>` (or a configured replacement) and captures stdout.
#[derive(Debug, Clone)]
pub struct Keyscan {
    tool: String,
}

impl Keyscan {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

impl FingerprintSource for Keyscan {
    fn scan(&self, hostname: &str) -> RemoteResult<Vec<u8>> {
        let program = which::which(&self.tool).map_err(|_| RemoteError::ToolNotFound {
            tool: self.tool.clone(),
        })?;

        debug!("running {} {}", program.display(), hostname);
        let output = Command::new(&program)
            .arg(hostname)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| RemoteError::FingerprintTool {
                tool: self.tool.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RemoteError::FingerprintTool {
                tool: self.tool.clone(),
                reason: output.status.to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// What [`record_fingerprint`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintOutcome {
    /// This call created the file and wrote `bytes` bytes into it.
    Recorded { bytes: usize },
    /// Another invocation already created the file; nothing was written.
    AlreadyPresent,
}

/// Path of the fingerprint file for a host directory.
pub fn fingerprint_path(host_dir: &Path) -> PathBuf {
    host_dir.join(FINGERPRINT_FILE)
}

/// Record the host fingerprint in `host_dir`, at most once per directory.
///
/// If the scan fails after the file was created, the (empty) file is left in
/// place and the error is returned.
pub fn record_fingerprint(
    host_dir: &Path,
    hostname: &str,
    scanner: &dyn FingerprintSource,
) -> RemoteResult<FingerprintOutcome> {
    let path = fingerprint_path(host_dir);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("fingerprint already recorded at {}", path.display());
            return Ok(FingerprintOutcome::AlreadyPresent);
        }
        Err(source) => return Err(RemoteError::FingerprintFile { path, source }),
    };

    let key_material = scanner.scan(hostname)?;
    file.write_all(&key_material)
        .and_then(|()| file.sync_all())
        .map_err(|source| RemoteError::FingerprintFile {
            path: path.clone(),
            source,
        })?;

    info!(
        "recorded {} bytes of host key material for {} in {}",
        key_material.len(),
        hostname,
        path.display()
    );
    Ok(FingerprintOutcome::Recorded {
        bytes: key_material.len(),
    })
}
