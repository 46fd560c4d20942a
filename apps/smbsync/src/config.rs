//! Run configuration.
//!
//! Read from an optional TOML file, then overridden by command-line flags.
//! The result is validated once and converted into the settings the
//! pipeline and the share session consume.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use smbsync_file_ops::compile_pattern;
use smbsync_share::ShareConfig;
use smbsync_transfer::{BatchConfig, DEFAULT_BUFFER_SIZE};

use crate::cli::Cli;

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SMB host, used for logging.
    #[serde(default)]
    pub host: String,

    /// Account the share was mounted with, used for logging.
    #[serde(default)]
    pub user: String,

    /// Share name on the host.
    #[serde(default)]
    pub shared: String,

    /// Where the share is mounted locally.
    #[serde(default)]
    pub mount: PathBuf,

    /// File name pattern. Empty selects every file.
    #[serde(default)]
    pub regex: String,

    /// Local source directory.
    #[serde(default = "default_dir")]
    pub path: PathBuf,

    /// Destination directory relative to the share root.
    #[serde(default = "default_dir")]
    pub shared_path: PathBuf,

    #[serde(default)]
    pub delete: bool,

    #[serde(default)]
    pub zip: bool,

    /// JSON log file.
    #[serde(default = "default_log")]
    pub log: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log() -> PathBuf {
    PathBuf::from("smbsync.log")
}

fn default_log_level() -> String {
    "info".into()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            shared: String::new(),
            mount: PathBuf::new(),
            regex: String::new(),
            path: default_dir(),
            shared_path: default_dir(),
            delete: false,
            zip: false,
            log: default_log(),
            log_level: default_log_level(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Config {
    /// Loads `path` if given, defaults otherwise. A named file that is
    /// missing is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolves the configuration for a command line: file first, flags on top.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields with the flags present on the command line.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(v) = &cli.host {
            self.host = v.clone();
        }
        if let Some(v) = &cli.user {
            self.user = v.clone();
        }
        if let Some(v) = &cli.shared {
            self.shared = v.clone();
        }
        if let Some(v) = &cli.mount {
            self.mount = v.clone();
        }
        if let Some(v) = &cli.regex {
            self.regex = v.clone();
        }
        if let Some(v) = &cli.path {
            self.path = v.clone();
        }
        if let Some(v) = &cli.shared_path {
            self.shared_path = v.clone();
        }
        if let Some(v) = &cli.log {
            self.log = v.clone();
        }
        if let Some(v) = &cli.log_level {
            self.log_level = v.clone();
        }
        if let Some(v) = cli.buffer_size {
            self.buffer_size = v;
        }
        // Switches can only turn a behavior on.
        self.delete |= cli.delete;
        self.zip |= cli.zip;
    }

    /// Checks the settings a run cannot start without.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shared.is_empty() {
            bail!("shared is required");
        }
        if self.mount.as_os_str().is_empty() {
            bail!("mount is required");
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!(
                "log level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            );
        }
        if self.buffer_size == 0 {
            bail!("buffer size must be greater than zero");
        }
        compile_pattern(&self.regex)?;
        Ok(())
    }

    pub fn batch(&self) -> BatchConfig {
        BatchConfig {
            source_dir: self.path.clone(),
            remote_dir: self.shared_path.clone(),
            compress: self.zip,
            delete_after: self.delete,
            buffer_size: self.buffer_size,
        }
    }

    pub fn share(&self) -> ShareConfig {
        ShareConfig {
            host: self.host.clone(),
            share: self.shared.clone(),
            user: self.user.clone(),
            mount_point: self.mount.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn valid() -> Config {
        Config {
            shared: "backups".into(),
            mount: "/mnt/backups".into(),
            ..Config::default()
        }
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.path, PathBuf::from("."));
        assert_eq!(config.shared_path, PathBuf::from("."));
        assert_eq!(config.log, PathBuf::from("smbsync.log"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(!config.delete);
        assert!(!config.zip);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            shared = "backups"
            mount = "/mnt/backups"
            delete = true
            "#,
        )
        .unwrap();
        assert_eq!(config.shared, "backups");
        assert!(config.delete);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.path, PathBuf::from("."));
    }

    #[test]
    fn load_without_file_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn load_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn load_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("smbsync.toml");
        let config = Config {
            regex: r"\.bak$".into(),
            zip: true,
            ..valid()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn flags_override_file() {
        let mut config = Config {
            regex: "old".into(),
            user: "alice".into(),
            ..valid()
        };
        let cli = Cli::try_parse_from(["smbsync", "-r", "new", "--shared-path", "nightly", "-d"])
            .unwrap();
        config.apply(&cli);

        assert_eq!(config.regex, "new");
        assert_eq!(config.shared_path, PathBuf::from("nightly"));
        assert_eq!(config.user, "alice");
        assert!(config.delete);
        assert!(!config.zip);
    }

    #[test]
    fn validate_requires_share_and_mount() {
        assert!(valid().validate().is_ok());
        let no_share = Config {
            shared: String::new(),
            ..valid()
        };
        assert!(no_share.validate().is_err());
        let no_mount = Config {
            mount: PathBuf::new(),
            ..valid()
        };
        assert!(no_mount.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_regex = Config {
            regex: "(".into(),
            ..valid()
        };
        assert!(bad_regex.validate().is_err());
        let bad_level = Config {
            log_level: "verbose".into(),
            ..valid()
        };
        assert!(bad_level.validate().is_err());
        let zero_buffer = Config {
            buffer_size: 0,
            ..valid()
        };
        assert!(zero_buffer.validate().is_err());
    }

    #[test]
    fn converts_to_pipeline_settings() {
        let config = Config {
            host: "nas".into(),
            user: "backup".into(),
            path: "/var/backups".into(),
            shared_path: "db".into(),
            zip: true,
            delete: true,
            buffer_size: 4096,
            ..valid()
        };

        let batch = config.batch();
        assert_eq!(batch.source_dir, PathBuf::from("/var/backups"));
        assert_eq!(batch.remote_dir, PathBuf::from("db"));
        assert!(batch.compress);
        assert!(batch.delete_after);
        assert_eq!(batch.buffer_size, 4096);

        let share = config.share();
        assert_eq!(share.host, "nas");
        assert_eq!(share.share, "backups");
        assert_eq!(share.user, "backup");
        assert_eq!(share.mount_point, PathBuf::from("/mnt/backups"));
    }
}
