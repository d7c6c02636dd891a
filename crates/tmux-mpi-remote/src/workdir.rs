//! Work directory layout: `<root>/<hostname>/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::host;

/// Ensure `root` and `root/<hostname>` exist and return the host directory.
///
/// Existing directories are accepted, so concurrent ranks on the same host
/// can race here safely. Nothing is ever removed.
pub fn setup_work_dirs(root: &Path, hostname: &str) -> RemoteResult<PathBuf> {
    host::validate(hostname)?;

    ensure_dir(root)?;
    let host_dir = root.join(hostname);
    ensure_dir(&host_dir)?;

    debug!("host work directory ready at {}", host_dir.display());
    Ok(host_dir)
}

fn ensure_dir(path: &Path) -> RemoteResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        // Lost a race with another rank; fine as long as it is a directory.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(RemoteError::WorkDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_root_and_host_dir() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("tmux_mpi_remote");

        let host_dir = setup_work_dirs(&root, "node01").unwrap();

        assert_eq!(host_dir, root.join("node01"));
        assert!(root.is_dir());
        assert!(host_dir.is_dir());
    }

    #[test]
    fn test_second_call_is_idempotent() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("tmux_mpi_remote");

        let first = setup_work_dirs(&root, "node01").unwrap();
        fs::write(first.join("fingerprint"), b"keep me").unwrap();
        let second = setup_work_dirs(&root, "node01").unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(second.join("fingerprint")).unwrap(), b"keep me");
    }

    #[test]
    fn test_hosts_get_separate_dirs() {
        let tmp = tempdir().unwrap();
        let a = setup_work_dirs(tmp.path(), "node01").unwrap();
        let b = setup_work_dirs(tmp.path(), "node02").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.parent(), b.parent());
    }

    #[test]
    fn test_root_blocked_by_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let err = setup_work_dirs(&blocker.join("root"), "node01").unwrap_err();
        match err {
            RemoteError::WorkDir { path, .. } => assert_eq!(path, blocker.join("root")),
            other => panic!("unexpected error: {other:?}"),
        }

        // A file squatting on the root path itself is not "already exists".
        let err = setup_work_dirs(&blocker, "node01").unwrap_err();
        assert!(
            err.to_string()
                .starts_with("could not create work directory")
        );
    }

    #[test]
    fn test_rejects_escaping_hostname() {
        let tmp = tempdir().unwrap();
        let err = setup_work_dirs(tmp.path(), "..").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidHostname(_)));
    }
}
