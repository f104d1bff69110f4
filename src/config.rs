//! Configuration for taskbridge.
//!
//! Settings are layered file → environment → CLI. The file lives at
//! `.taskbridge/config.toml` in the working directory when present, otherwise
//! at `<config_dir>/taskbridge/config.toml`.
//!
//! ```toml
//! [relay]
//! base_url = "http://localhost:3000"
//!
//! [session]
//! store_path = "/home/me/.local/share/taskbridge/credentials.json"
//! tenant = "acme"
//!
//! [timers]
//! deploy_reset_secs = 5
//! send_clear_secs = 3
//! ```
//!
//! | Variable              | Overrides              |
//! |-----------------------|------------------------|
//! | `TASKBRIDGE_BASE_URL` | `relay.base_url`       |
//! | `TASKBRIDGE_STORE`    | `session.store_path`   |
//! | `TASKBRIDGE_TENANT`   | `session.tenant`       |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::DEFAULT_BASE_URL;
use crate::storage::FileStore;

pub const ENV_BASE_URL: &str = "TASKBRIDGE_BASE_URL";
pub const ENV_STORE: &str = "TASKBRIDGE_STORE";
pub const ENV_TENANT: &str = "TASKBRIDGE_TENANT";

const LOCAL_DIR: &str = ".taskbridge";
const FILE_NAME: &str = "config.toml";

/// `[relay]`: where the OAuth relay server lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaySection {
    /// Relay base URL; defaults to `http://localhost:3000`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// `[session]`: credential storage and site selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Credential file; defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Preferred Jira site (id, name, or URL fragment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// `[timers]`: how long transient states stay visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimersSection {
    /// Seconds a successful deployment stays in `success` before going idle.
    #[serde(default = "default_deploy_reset_secs")]
    pub deploy_reset_secs: u64,
    /// Seconds a task stays `sent` before its action state clears.
    #[serde(default = "default_send_clear_secs")]
    pub send_clear_secs: u64,
}

fn default_deploy_reset_secs() -> u64 {
    5
}

fn default_send_clear_secs() -> u64 {
    3
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            deploy_reset_secs: default_deploy_reset_secs(),
            send_clear_secs: default_send_clear_secs(),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskbridgeToml {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub timers: TimersSection,
}

impl TaskbridgeToml {
    /// Read and parse `path`. Fails if the file is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write this config as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Non-fatal problems worth telling the user about.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(url) = &self.relay.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                warnings.push(format!(
                    "relay.base_url '{}' is not an http(s) URL",
                    url
                ));
            }
        }
        if self.timers.deploy_reset_secs == 0 {
            warnings.push(
                "timers.deploy_reset_secs is 0; deployment success will clear immediately"
                    .to_string(),
            );
        }
        if self.timers.send_clear_secs == 0 {
            warnings
                .push("timers.send_clear_secs is 0; sent state will clear immediately".to_string());
        }
        if self.session.tenant.as_deref() == Some("") {
            warnings.push("session.tenant is empty and will be ignored".to_string());
        }

        warnings
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub store_path: Option<PathBuf>,
    pub tenant: Option<String>,
}

/// Effective configuration after layering.
#[derive(Debug, Clone)]
pub struct Config {
    /// File the settings were read from (it may not exist).
    pub config_path: PathBuf,
    /// File contents, or defaults when there was no file.
    pub toml: TaskbridgeToml,
    /// Relay base URL after env and CLI overrides.
    pub base_url: String,
    /// Credential file after env and CLI overrides.
    pub store_path: PathBuf,
    /// Preferred Jira site after env and CLI overrides.
    pub tenant: Option<String>,
}

impl Config {
    /// `.taskbridge/config.toml` under `cwd` if it exists, else the user
    /// config directory.
    pub fn default_path(cwd: &Path) -> PathBuf {
        let local = cwd.join(LOCAL_DIR).join(FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("taskbridge").join(FILE_NAME))
            .unwrap_or(local)
    }

    /// Layer file, process environment, and CLI overrides.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
        Self::resolve_with(cli, &cwd, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::resolve`] with an explicit working directory and
    /// environment lookup.
    pub fn resolve_with(
        cli: &CliOverrides,
        cwd: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = cli
            .config_path
            .clone()
            .unwrap_or_else(|| Self::default_path(cwd));

        // An explicitly named file must exist.
        let toml = if cli.config_path.is_some() {
            TaskbridgeToml::load(&config_path)?
        } else {
            TaskbridgeToml::load_or_default(&config_path)?
        };

        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| lookup(ENV_BASE_URL))
            .or_else(|| toml.relay.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let store_path = cli
            .store_path
            .clone()
            .or_else(|| lookup(ENV_STORE).map(PathBuf::from))
            .or_else(|| toml.session.store_path.clone())
            .unwrap_or_else(FileStore::default_path);

        let tenant = cli
            .tenant
            .clone()
            .or_else(|| lookup(ENV_TENANT))
            .or_else(|| toml.session.tenant.clone())
            .filter(|t| !t.is_empty());

        Ok(Self {
            config_path,
            toml,
            base_url,
            store_path,
            tenant,
        })
    }

    /// Delay before a successful deployment resets to idle.
    pub fn deploy_reset_after(&self) -> Duration {
        Duration::from_secs(self.toml.timers.deploy_reset_secs)
    }

    /// Delay before a sent task clears back to idle.
    pub fn send_clear_after(&self) -> Duration {
        Duration::from_secs(self.toml.timers.send_clear_secs)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    /// The effective settings as a TOML document.
    pub fn effective_toml(&self) -> TaskbridgeToml {
        TaskbridgeToml {
            relay: RelaySection {
                base_url: Some(self.base_url.clone()),
            },
            session: SessionSection {
                store_path: Some(self.store_path.clone()),
                tenant: self.tenant.clone(),
            },
            timers: self.toml.timers.clone(),
        }
    }
}
