//! Hostname resolution for the per-host work directory.

use std::io;

use log::debug;

use crate::error::{RemoteError, RemoteResult};

/// Resolve the hostname to key the work directory on.
///
/// An explicit override wins; otherwise the kernel's node name is used.
pub fn resolve(override_name: Option<&str>) -> RemoteResult<String> {
    let name = match override_name {
        Some(name) => name.to_string(),
        None => local_hostname()?,
    };
    validate(&name)?;
    debug!("using hostname {:?}", name);
    Ok(name)
}

/// Read the local hostname via uname(2).
pub fn local_hostname() -> RemoteResult<String> {
    let uname = rustix::system::uname();
    let name = uname
        .nodename()
        .to_str()
        .map_err(|e| RemoteError::Hostname(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    if name.is_empty() {
        return Err(RemoteError::Hostname(io::Error::new(
            io::ErrorKind::NotFound,
            "empty node name",
        )));
    }
    Ok(name.to_string())
}

/// Reject names that would not stay a single child of the work directory.
pub fn validate(name: &str) -> RemoteResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0');
    if bad {
        return Err(RemoteError::InvalidHostname(name.to_string()));
    }
    Ok(())
}
