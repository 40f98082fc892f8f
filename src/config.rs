use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default configuration file path used when none is supplied on the command line
pub const CONFIG_FILE: &str = "dhcp_sync.json5";

/// Default number of seconds between polls of the inventory
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default timeout for the inventory request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default name of the export template rendered by the inventory
pub const DEFAULT_EXPORT_TEMPLATE: &str = "dhcp_v1";

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "DHCP_SYNC_";

/// Application configuration structure
///
/// Loaded once at startup from a JSON5 file and the environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the inventory, e.g. `https://netbox.example.com`
    #[serde(default)]
    pub inventory_url: String,
    /// API token sent in the `Authorization` header
    #[serde(default)]
    pub api_token: String,
    /// Directory holding the generated include file
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Name (or path) of the generated include file
    #[serde(default)]
    pub output_file: PathBuf,
    /// Seconds to sleep between cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds before an inventory request is abandoned
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound of the random delay added to each sleep
    #[serde(default)]
    pub jitter_secs: u64,
    /// Export template requested from the inventory
    #[serde(default = "default_export_template")]
    pub export_template: String,
    /// Syntax check run before reloading; empty disables the check
    #[serde(default = "default_check_command")]
    pub check_command: Vec<String>,
    /// Command that makes the DHCP daemon pick up the new file
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_export_template() -> String {
    DEFAULT_EXPORT_TEMPLATE.to_string()
}

fn default_check_command() -> Vec<String> {
    ["dhcpd", "-t", "-user", "dhcpd", "-group", "dhcpd"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_reload_command() -> Vec<String> {
    ["systemctl", "restart", "dhcpd.service"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory_url: String::new(),
            api_token: String::new(),
            output_dir: PathBuf::new(),
            output_file: PathBuf::new(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            jitter_secs: 0,
            export_template: default_export_template(),
            check_command: default_check_command(),
            reload_command: default_reload_command(),
        }
    }
}

impl Config {
    /// Load the configuration from an optional JSON5 file and the process environment.
    ///
    /// When `path` is `None` the configuration is built from defaults and the
    /// environment alone. The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation fails
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                let config_str = fs::read_to_string(path).map_err(SyncError::ConfigRead)?;
                Self::from_json5(&config_str)?
            }
            None => {
                tracing::debug!("No configuration file given, using environment only");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        tracing::info!(
            inventory = %config.inventory_url,
            target = %config.target_path().display(),
            poll_interval_secs = config.poll_interval_secs,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Parse a configuration from JSON5 text without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON5 or not an object
    pub fn from_json5(text: &str) -> Result<Self> {
        let value: serde_json::Value = json5::from_str(text)?;
        if !value.is_object() {
            return Err(SyncError::ConfigInvalid(
                "Config is not an object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| SyncError::ConfigInvalid(e.to_string()))
    }

    /// Apply `DHCP_SYNC_*` overrides obtained through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(url) = var("INVENTORY_URL") {
            self.inventory_url = url;
        }
        if let Some(token) = var("API_TOKEN") {
            self.api_token = token;
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = var("OUTPUT_FILE") {
            self.output_file = PathBuf::from(file);
        }
        if let Some(secs) = var("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = secs.trim().parse().map_err(|_| {
                SyncError::ConfigInvalid(format!(
                    "{ENV_PREFIX}POLL_INTERVAL_SECS is not a number: {secs}"
                ))
            })?;
        }
        Ok(())
    }

    /// Check that every required value is present and usable.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigMissing`] for absent values and
    /// [`SyncError::ConfigInvalid`] for unusable ones
    pub fn validate(&self) -> Result<()> {
        if self.inventory_url.trim().is_empty() {
            return Err(SyncError::ConfigMissing("inventory_url"));
        }
        if self.api_token.trim().is_empty() {
            return Err(SyncError::ConfigMissing("api_token"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SyncError::ConfigMissing("output_dir"));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(SyncError::ConfigMissing("output_file"));
        }

        let url = Url::parse(&self.inventory_url).map_err(|e| {
            SyncError::ConfigInvalid(format!(
                "Invalid inventory URL {}: {e}",
                self.inventory_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::ConfigInvalid(format!(
                "Inventory URL must use http or https: {}",
                self.inventory_url
            )));
        }

        if !self.output_dir.is_dir() {
            return Err(SyncError::ConfigInvalid(format!(
                "output_dir is not a directory: {}",
                self.output_dir.display()
            )));
        }

        // temporary files are created in output_dir and renamed onto the target
        let target = self.target_path();
        let directly_inside = target.file_name().is_some()
            && target.parent().is_some_and(|parent| parent == self.output_dir);
        if !directly_inside {
            return Err(SyncError::ConfigInvalid(format!(
                "output_file must name a file directly inside output_dir ({}): {}",
                self.output_dir.display(),
                self.output_file.display()
            )));
        }

        if self.poll_interval_secs == 0 {
            return Err(SyncError::ConfigInvalid(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::ConfigInvalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.reload_command.is_empty() {
            return Err(SyncError::ConfigMissing("reload_command"));
        }
        Ok(())
    }

    /// Full path of the generated include file.
    ///
    /// `output_file` is used as is when it already lives under `output_dir`,
    /// otherwise it is joined onto `output_dir`.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        if self.output_file.starts_with(&self.output_dir) {
            self.output_file.clone()
        } else {
            self.output_dir.join(&self.output_file)
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}
