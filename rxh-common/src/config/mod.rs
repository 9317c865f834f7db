//! Configuration for RXH helpers.
//!
//! Settings come from a TOML file (by default
//! `<config dir>/rxh/config.toml`) and are then overridden by `RXH_`
//! environment variables:
//!
//! ```toml
//! debug = false
//! timeout = "5m"
//! log_level = "info"
//!
//! [target]
//! host = "node1.example.com"
//! username = "root"
//! os = "Linux"
//!
//! [helm]
//! kubeconfig = "~/.kube/config"
//! repo_path = "https://charts.bitnami.com/bitnami"
//!
//! [failover]
//! install_dir = "/opt/commvault"
//! ```

pub mod env;

pub use env::{EnvError, EnvParser};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::{HelperError, Result};
use crate::logging::LogSettings;
use crate::types::{DEFAULT_SSH_PORT, OsFlavor, RemoteHost, Target};

const CONFIG_DIR_NAME: &str = "rxh";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Chart repository used when none is configured.
pub const DEFAULT_REPO_PATH: &str = "https://charts.bitnami.com/bitnami";

const DEFAULT_UNIX_INSTALL_DIR: &str = "/opt/commvault";
const DEFAULT_WINDOWS_INSTALL_DIR: &str = r"C:\Program Files\Commvault\ContentStore";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RxhConfig {
    pub target: TargetConfig,
    /// Turns on debug output of every helper.
    pub debug: bool,
    /// Default per-command timeout.
    #[serde(with = "humantime_opt")]
    pub timeout: Option<Duration>,
    pub log_level: String,
    pub log_json: bool,
    pub helm: HelmConfig,
    pub failover: FailoverConfig,
}

impl Default for RxhConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            debug: false,
            timeout: None,
            log_level: "info".to_string(),
            log_json: false,
            helm: HelmConfig::default(),
            failover: FailoverConfig::default(),
        }
    }
}

/// Where commands run. No `host` means the local machine.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub port: u16,
    /// Free-form OS descriptor, e.g. `"Linux"` or `"Windows Server 2019"`.
    pub os: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            identity_file: None,
            port: DEFAULT_SSH_PORT,
            os: None,
        }
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("identity_file", &self.identity_file)
            .field("port", &self.port)
            .field("os", &self.os)
            .finish()
    }
}

/// Settings for the Helm helper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HelmConfig {
    /// Helm executable name or path.
    pub binary: String,
    pub kubeconfig: Option<PathBuf>,
    /// Repository alias; derived from `repo_path` when unset.
    pub repo_name: Option<String>,
    /// Chart repository URL.
    pub repo_path: String,
    pub debug: bool,
    #[serde(with = "humantime_opt")]
    pub timeout: Option<Duration>,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: "helm".to_string(),
            kubeconfig: None,
            repo_name: None,
            repo_path: DEFAULT_REPO_PATH.to_string(),
            debug: false,
            timeout: None,
        }
    }
}

impl HelmConfig {
    /// Repository alias: the configured name, else the last path segment
    /// of `repo_path` (`.../bitnami` gives `bitnami`).
    pub fn repo_name(&self) -> String {
        match &self.repo_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self
                .repo_path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Settings for the failover helper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Software installation directory; a per-OS default applies when unset.
    pub install_dir: Option<String>,
    pub debug: bool,
    #[serde(with = "humantime_opt")]
    pub timeout: Option<Duration>,
}

impl FailoverConfig {
    pub fn install_dir(&self, flavor: OsFlavor) -> &str {
        match (&self.install_dir, flavor) {
            (Some(dir), _) => dir,
            (None, OsFlavor::Unix) => DEFAULT_UNIX_INSTALL_DIR,
            (None, OsFlavor::Windows) => DEFAULT_WINDOWS_INSTALL_DIR,
        }
    }
}

impl RxhConfig {
    /// Default configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HelperError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!("Loading config from {}", path.display());
        toml::from_str(&contents)
            .map_err(|e| HelperError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| HelperError::Config(e.to_string()))
    }

    /// Apply `RXH_` environment overrides. Every invalid variable is
    /// reported in a single error.
    pub fn apply_env(&mut self) -> Result<()> {
        let mut parser = EnvParser::new();

        if let Some(host) = parser.get_string("HOST") {
            self.target.host = Some(host);
        }
        if let Some(username) = parser.get_string("USERNAME") {
            self.target.username = Some(username);
        }
        if let Some(password) = parser.get_string("PASSWORD") {
            self.target.password = Some(password);
        }
        if let Some(port) = parser.get_u16_range("PORT", 1, u16::MAX) {
            self.target.port = port;
        }
        if let Some(os) = parser.get_string("OS") {
            self.target.os = Some(os);
        }
        if let Some(debug) = parser.get_bool("DEBUG") {
            self.debug = debug;
        }
        if let Some(timeout) = parser.get_duration("TIMEOUT") {
            self.timeout = Some(timeout);
        }
        if let Some(level) = parser.get_log_level("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(json) = parser.get_bool("LOG_JSON") {
            self.log_json = json;
        }
        if let Some(kubeconfig) = parser.get_path("KUBECONFIG") {
            self.helm.kubeconfig = Some(kubeconfig);
        }
        if let Some(binary) = parser.get_string("HELM_BINARY") {
            self.helm.binary = binary;
        }

        if parser.has_errors() {
            let messages: Vec<String> = parser
                .take_errors()
                .iter()
                .map(ToString::to_string)
                .collect();
            return Err(HelperError::Config(messages.join("; ")));
        }
        Ok(())
    }

    /// Resolve the configured target. No host means [`Target::Local`].
    pub fn target(&self) -> Result<Target> {
        let Some(hostname) = self.target.host.as_deref().filter(|h| !h.trim().is_empty()) else {
            return Ok(Target::Local);
        };
        let username = self
            .target
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                HelperError::Config(format!("target host '{hostname}' has no username"))
            })?;

        let mut host = RemoteHost::new(hostname.trim(), username.trim()).with_port(self.target.port);
        if let Some(password) = &self.target.password {
            host = host.with_password(password.clone());
        }
        if let Some(identity) = &self.target.identity_file {
            host = host.with_identity_file(env::expand_home(&identity.to_string_lossy()));
        }
        Ok(Target::Remote(host))
    }

    /// OS flavor from the `os` descriptor, if one is configured.
    pub fn os_flavor(&self) -> Result<Option<OsFlavor>> {
        self.target
            .os
            .as_deref()
            .map(|os| OsFlavor::detect(os).ok_or_else(|| HelperError::UnknownOs(os.to_string())))
            .transpose()
    }

    /// Helm settings with the top-level `debug` and `timeout` folded in.
    pub fn helm_settings(&self) -> HelmConfig {
        let mut helm = self.helm.clone();
        helm.debug |= self.debug;
        helm.timeout = helm.timeout.or(self.timeout);
        helm
    }

    /// Failover settings with the top-level `debug` and `timeout` folded in.
    pub fn failover_settings(&self) -> FailoverConfig {
        let mut failover = self.failover.clone();
        failover.debug |= self.debug;
        failover.timeout = failover.timeout.or(self.timeout);
        failover
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.log_level.clone()).json(self.log_json)
    }
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                humantime::parse_duration(raw.trim()).map_err(<D::Error as serde::de::Error>::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
