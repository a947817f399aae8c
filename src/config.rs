//! Kernel configuration, loaded from TOML.
//!
//! Every section and field has a default, so an empty file (or no file) is a
//! valid configuration. Unknown keys are reported with a warning instead of
//! failing the load.
//!
//! ```toml
//! [sandbox]
//! root_dir = "~/.local/share/toolkernel/sandboxes"
//!
//! [read]
//! max_lines = 2000
//!
//! [validation]
//! working_dir = "/home/user/project"
//! stage_timeout_secs = 300
//! ```

use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.toml";
const SANDBOX_DIRNAME: &str = "sandboxes";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct KernelConfig {
    pub sandbox: SandboxConfig,
    pub read: ReadConfig,
    pub search: SearchConfig,
    pub find: FindConfig,
    pub limits: LimitsConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

/// Where [`crate::sandbox::local::LocalSandbox`] keeps sandbox namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SandboxConfig {
    /// Host directory; `~` and `$VARS` are expanded. Defaults to the
    /// platform data directory.
    pub root_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReadConfig {
    /// Files longer than this are truncated unless a window is requested.
    pub max_lines: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self { max_lines: 2000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    /// Larger files are skipped by `search_files`.
    pub max_file_size_bytes: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 200,
            max_file_size_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FindConfig {
    pub max_results: usize,
    /// Files modified within this many hours are listed first.
    pub recent_window_hours: u64,
}

impl Default for FindConfig {
    fn default() -> Self {
        Self {
            max_results: 1000,
            recent_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LimitsConfig {
    /// Ceiling for any single tool call except `validate_project`.
    pub tool_timeout_secs: u64,
    /// Budget for one recursive directory walk.
    pub scan_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            scan_timeout_secs: 30,
        }
    }
}

impl LimitsConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ValidationConfig {
    pub typecheck_command: String,
    pub typecheck_args: Vec<String>,
    pub build_command: String,
    pub build_args: Vec<String>,
    /// Used when the tool call names no working directory.
    pub working_dir: String,
    pub stage_timeout_secs: u64,
    /// Raw stage output kept for diagnostics, in characters.
    pub max_output_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            typecheck_command: "npx".into(),
            typecheck_args: vec![
                "tsc".into(),
                "--noEmit".into(),
                "--pretty".into(),
                "false".into(),
            ],
            build_command: "npm".into(),
            build_args: vec!["run".into(), "build".into()],
            working_dir: "/home/user/project".into(),
            stage_timeout_secs: 300,
            max_output_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            ansi: true,
        }
    }
}

impl KernelConfig {
    /// Parse and validate TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(raw).context("Invalid TOML")?;
        let mut ignored = Vec::new();
        let config: Self = serde_ignored::deserialize(toml::Value::Table(table), |path| {
            ignored.push(path.to_string());
        })
        .context("Invalid kernel configuration")?;

        for key in ignored {
            tracing::warn!("Ignoring unknown config key: {key}");
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Load from `path` or the default location; a missing file yields the
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.read.max_lines == 0 {
            bail!("read.max_lines must be greater than 0");
        }
        if self.search.max_results == 0 {
            bail!("search.max_results must be greater than 0");
        }
        if self.find.max_results == 0 {
            bail!("find.max_results must be greater than 0");
        }
        if self.limits.tool_timeout_secs == 0 || self.limits.scan_timeout_secs == 0 {
            bail!("limits timeouts must be greater than 0");
        }
        if self.validation.stage_timeout_secs == 0 {
            bail!("validation.stage_timeout_secs must be greater than 0");
        }
        if self.validation.typecheck_command.trim().is_empty()
            || self.validation.build_command.trim().is_empty()
        {
            bail!("validation commands must not be empty");
        }
        if !self.validation.working_dir.starts_with('/') {
            bail!(
                "validation.working_dir must be absolute: {}",
                self.validation.working_dir
            );
        }
        Ok(())
    }

    /// Host directory for local sandboxes, with `~` and env vars expanded.
    pub fn sandbox_root(&self) -> PathBuf {
        match &self.sandbox.root_dir {
            Some(dir) => match shellexpand::full(dir) {
                Ok(expanded) => PathBuf::from(expanded.as_ref()),
                Err(e) => {
                    tracing::warn!("Could not expand sandbox.root_dir {dir}: {e}");
                    PathBuf::from(shellexpand::tilde(dir).as_ref())
                }
            },
            None => directories::ProjectDirs::from("dev", "toolkernel", "toolkernel").map_or_else(
                || std::env::temp_dir().join("toolkernel").join(SANDBOX_DIRNAME),
                |dirs| dirs.data_dir().join(SANDBOX_DIRNAME),
            ),
        }
    }

    /// JSON Schema of the configuration file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(KernelConfig)).unwrap_or_default()
    }
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "toolkernel", "toolkernel")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}
