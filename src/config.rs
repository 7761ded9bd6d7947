//! Configuration
//!
//! Settings for the linker and the HTTP adapter, read from a TOML file.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`DOCLINK_BIND`)
//! 3. Config file (`--config FILE` or `$DOCLINK_CONFIG`)
//! 4. Defaults
//!
//! ```toml
//! [link]
//! recursive = false
//! relative_to = "document"   # or "cwd"
//! max_depth = 64
//! format = "json"            # or "yaml"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! exit_codes = "ignore"      # or "success-codes"
//! outdir = "."
//! tmpdir = "/tmp"
//! resources = { cpu = 1, mem = 1024 }
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::OutputFormat;
use crate::error::{DoclinkError, Result};
use crate::job::{ExecutionContext, Resources};
use crate::linker::{ImportBase, LinkOptions, DEFAULT_MAX_DEPTH};
use crate::server::ExitCodePolicy;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "DOCLINK_CONFIG";
/// Environment variable overriding `server.bind`
pub const BIND_ENV: &str = "DOCLINK_BIND";

const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DoclinkConfig {
    pub link: LinkSettings,
    pub server: ServerSettings,
}

/// `[link]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkSettings {
    pub recursive: bool,
    pub relative_to: ImportBase,
    pub max_depth: usize,
    pub format: OutputFormat,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            recursive: false,
            relative_to: ImportBase::Document,
            max_depth: DEFAULT_MAX_DEPTH,
            format: OutputFormat::Json,
        }
    }
}

impl LinkSettings {
    pub fn options(&self) -> LinkOptions {
        LinkOptions {
            recursive: self.recursive,
            relative_to: self.relative_to,
            max_depth: self.max_depth,
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address, `host:port`
    pub bind: String,
    pub exit_codes: ExitCodePolicy,
    /// Reported as `$(runtime.outdir)` when computing command lines
    pub outdir: PathBuf,
    pub tmpdir: PathBuf,
    /// Resources attached to every job
    pub resources: Resources,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let execution = ExecutionContext::default();
        Self {
            bind: DEFAULT_BIND.to_string(),
            exit_codes: ExitCodePolicy::Ignore,
            outdir: execution.outdir,
            tmpdir: execution.tmpdir,
            resources: Resources::default(),
        }
    }
}

impl ServerSettings {
    /// Parse the bind address
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.bind.parse().map_err(|e| DoclinkError::Config {
            reason: format!("invalid bind address '{}': {}", self.bind, e),
        })
    }

    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            outdir: self.outdir.clone(),
            tmpdir: self.tmpdir.clone(),
        }
    }
}

impl DoclinkConfig {
    /// Load configuration.
    ///
    /// Uses `path` when given, else `$DOCLINK_CONFIG`, else defaults. A named
    /// file that is missing or malformed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Read configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| DoclinkError::Config {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            DoclinkError::Config { reason } => DoclinkError::Config {
                reason: format!("{} ({})", reason, path.display()),
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DoclinkError::Config {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Merge with environment variables
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(bind) = lookup(BIND_ENV) {
            if !bind.is_empty() {
                self.server.bind = bind;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = DoclinkConfig::default();
        assert!(!config.link.recursive);
        assert_eq!(config.link.relative_to, ImportBase::Document);
        assert_eq!(config.link.max_depth, 64);
        assert_eq!(config.link.format, OutputFormat::Json);
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.server.exit_codes, ExitCodePolicy::Ignore);
        assert_eq!(config.server.resources, Resources { cpu: 1, mem: 1024 });
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = DoclinkConfig::from_toml_str(
            r#"
            [link]
            recursive = true
            format = "yaml"

            [server]
            exit_codes = "success-codes"
            resources = { cpu = 4, mem = 8192 }
            "#,
        )
        .unwrap();

        assert!(config.link.recursive);
        assert_eq!(config.link.format, OutputFormat::Yaml);
        assert_eq!(config.link.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.server.exit_codes, ExitCodePolicy::SuccessCodes);
        assert_eq!(config.server.resources.cpu, 4);
        assert_eq!(config.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doclink.toml");

        let mut config = DoclinkConfig::default();
        config.link.relative_to = ImportBase::WorkingDir;
        config.server.bind = "0.0.0.0:8080".into();
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(DoclinkConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let err = DoclinkConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, DoclinkError::Config { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = DoclinkConfig::from_toml_str("[link]\nmax_depth = \"deep\"").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn env_overrides_bind() {
        let config = DoclinkConfig::default()
            .with_env_from(|key| (key == BIND_ENV).then(|| "127.0.0.1:7777".to_string()));
        assert_eq!(config.server.bind, "127.0.0.1:7777");
    }

    #[test]
    fn empty_env_does_not_override() {
        let config = DoclinkConfig::default().with_env_from(|_| Some(String::new()));
        assert_eq!(config.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn bind_address_is_validated() {
        let mut settings = ServerSettings::default();
        assert_eq!(settings.bind_address().unwrap().port(), 5000);

        settings.bind = "not-an-address".into();
        assert!(matches!(
            settings.bind_address(),
            Err(DoclinkError::Config { .. })
        ));
    }
}
