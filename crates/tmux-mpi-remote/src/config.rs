//! Explicit configuration for a remote invocation.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config <PATH>`, or `~/.config/tmux-mpi/remote.toml` if present)
//! 3. Environment variables, e.g. `TMUX_MPI_REMOTE__SESSION_BACKEND=/opt/bin/dtach`
//! 4. Command-line overrides
//!
//! ```toml
//! work_dir = "~/scratch/tmux_mpi_remote"
//! session_backend = "dtach"
//! fingerprint_tool = "ssh-keyscan"
//! # hostname = "node017"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use log::debug;
use serde::{Deserialize, Serialize};

/// Directory name used under the user's config dir.
pub const APP_NAME: &str = "tmux-mpi";

/// Prefix for environment overrides (`TMUX_MPI_REMOTE__<KEY>`).
pub const ENV_PREFIX: &str = "TMUX_MPI_REMOTE";

pub const DEFAULT_WORK_DIR: &str = "tmux_mpi_remote";
pub const DEFAULT_SESSION_BACKEND: &str = "dtach";
pub const DEFAULT_FINGERPRINT_TOOL: &str = "ssh-keyscan";

/// Everything one invocation needs to know, passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root of the per-host work directories. Relative paths are resolved
    /// against the current directory at load time.
    pub work_dir: PathBuf,
    /// Overrides the detected hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Detachable session program.
    pub session_backend: String,
    /// Host key scanner.
    pub fingerprint_tool: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            hostname: None,
            session_backend: DEFAULT_SESSION_BACKEND.to_string(),
            fingerprint_tool: DEFAULT_FINGERPRINT_TOOL.to_string(),
        }
    }
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub work_dir: Option<PathBuf>,
    pub hostname: Option<String>,
    pub session_backend: Option<String>,
    pub fingerprint_tool: Option<String>,
}

impl RemoteConfig {
    /// `~/.config/tmux-mpi/remote.toml` (or the platform equivalent).
    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("remote.toml"))
    }

    /// Load from all sources and resolve paths against the current directory.
    ///
    /// An explicit `file` must exist; the default location is optional.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        let config = match file {
            Some(path) => Self::build(Some(path), true, overrides, None)?,
            None => {
                let default_file = Self::default_config_file();
                Self::build(default_file.as_deref(), false, overrides, None)?
            }
        };
        config.resolve_paths(&cwd)
    }

    fn build(
        file: Option<&Path>,
        required: bool,
        overrides: &ConfigOverrides,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("work_dir", defaults.work_dir.to_string_lossy().to_string())?
            .set_default("session_backend", defaults.session_backend)?
            .set_default("fingerprint_tool", defaults.fingerprint_tool)?;

        if let Some(path) = file {
            debug!("config file {} (required: {})", path.display(), required);
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(env),
            )
            .set_override_option(
                "work_dir",
                overrides
                    .work_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
            )?
            .set_override_option("hostname", overrides.hostname.clone())?
            .set_override_option("session_backend", overrides.session_backend.clone())?
            .set_override_option("fingerprint_tool", overrides.fingerprint_tool.clone())?;

        let built = builder.build().context("building configuration")?;
        built
            .try_deserialize()
            .context("invalid tmux-mpi-remote configuration")
    }

    /// Expand `~`/`$VAR` and anchor a relative work directory at `cwd`.
    pub fn resolve_paths(mut self, cwd: &Path) -> Result<Self> {
        let work_dir = expand_path(&self.work_dir)?;
        self.work_dir = if work_dir.is_absolute() {
            work_dir
        } else {
            cwd.join(work_dir)
        };
        self.session_backend = shellexpand::tilde(&self.session_backend).into_owned();
        self.fingerprint_tool = shellexpand::tilde(&self.fingerprint_tool).into_owned();
        Ok(self)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing configuration to TOML")
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => {
            let expanded = shellexpand::full(text)
                .with_context(|| format!("expanding path {text}"))?;
            Ok(PathBuf::from(expanded.as_ref()))
        }
        None => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config =
            RemoteConfig::build(None, false, &ConfigOverrides::default(), env(&[])).unwrap();
        assert_eq!(config, RemoteConfig::default());
        assert_eq!(config.session_backend, "dtach");
        assert_eq!(config.fingerprint_tool, "ssh-keyscan");
        assert!(config.hostname.is_none());
    }

    #[test]
    fn test_relative_work_dir_is_anchored_at_cwd() {
        let config = RemoteConfig::default()
            .resolve_paths(Path::new("/home/rank"))
            .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/home/rank/tmux_mpi_remote"));
    }

    #[test]
    fn test_absolute_work_dir_is_kept() {
        let config = RemoteConfig {
            work_dir: PathBuf::from("/scratch/sessions"),
            ..RemoteConfig::default()
        }
        .resolve_paths(Path::new("/home/rank"))
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/scratch/sessions"));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = RemoteConfig {
            work_dir: PathBuf::from("~/sessions"),
            ..RemoteConfig::default()
        }
        .resolve_paths(Path::new("/unused"))
        .unwrap();
        assert!(!config.work_dir.to_string_lossy().starts_with('~'));
        assert!(config.work_dir.ends_with("sessions"));
    }

    #[test]
    fn test_file_env_and_overrides_layer() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("remote.toml");
        fs::write(
            &path,
            r#"
work_dir = "/scratch/from-file"
session_backend = "/opt/dtach/bin/dtach"
fingerprint_tool = "/usr/bin/ssh-keyscan"
hostname = "file-host"
"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            hostname: Some("cli-host".to_string()),
            ..ConfigOverrides::default()
        };
        let config = RemoteConfig::build(
            Some(&path),
            true,
            &overrides,
            env(&[
                ("TMUX_MPI_REMOTE__FINGERPRINT_TOOL", "env-keyscan"),
                ("TMUX_MPI_REMOTE__HOSTNAME", "env-host"),
            ]),
        )
        .unwrap();

        assert_eq!(config.work_dir, PathBuf::from("/scratch/from-file"));
        assert_eq!(config.session_backend, "/opt/dtach/bin/dtach");
        assert_eq!(config.fingerprint_tool, "env-keyscan");
        assert_eq!(config.hostname.as_deref(), Some("cli-host"));
    }

    #[test]
    fn test_override_work_dir() {
        let overrides = ConfigOverrides {
            work_dir: Some(PathBuf::from("/tmp/override")),
            session_backend: Some("my-dtach".to_string()),
            ..ConfigOverrides::default()
        };
        let config = RemoteConfig::build(
            None,
            false,
            &overrides,
            env(&[("TMUX_MPI_REMOTE__WORK_DIR", "/tmp/from-env")]),
        )
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/override"));
        assert_eq!(config.session_backend, "my-dtach");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(
            RemoteConfig::build(Some(&missing), true, &ConfigOverrides::default(), env(&[]))
                .is_err()
        );
        assert!(
            RemoteConfig::build(Some(&missing), false, &ConfigOverrides::default(), env(&[]))
                .is_ok()
        );
    }

    #[test]
    fn test_to_toml_lists_effective_values() {
        let config = RemoteConfig {
            work_dir: PathBuf::from("/scratch/tmux_mpi_remote"),
            hostname: Some("node03".to_string()),
            ..RemoteConfig::default()
        };
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("work_dir = \"/scratch/tmux_mpi_remote\""));
        assert!(rendered.contains("hostname = \"node03\""));
        assert!(rendered.contains("session_backend = \"dtach\""));

        let parsed: RemoteConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
