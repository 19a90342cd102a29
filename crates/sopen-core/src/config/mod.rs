//! Configuration parsing and management.
//!
//! The service reads a TOML configuration file (`sopen.toml` by default) with
//! per-subsystem sections. Every field carries a serde default so an absent
//! file or an empty section yields a runnable development configuration; CLI
//! arguments override file values in the binary crate.
//!
//! The only validation beyond parsing is the advisory sanity check
//! ([`ServiceConfig::sanity_warnings`]): it reports suspicious combinations
//! (production environment against a local datastore address) as warnings and
//! never blocks boot.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the auth provider credential blob (JSON).
pub const AUTH_CREDENTIALS_ENV: &str = "SOPEN_AUTH_CREDENTIALS";

/// Environment variable selecting the environment designation.
pub const ENVIRONMENT_ENV: &str = "SOPEN_ENV";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Primary datastore (fatal dependency).
    #[serde(default)]
    pub datastore: DatastoreConfig,

    /// Cache (advisory dependency).
    #[serde(default)]
    pub cache: CacheConfig,

    /// Message queue (advisory dependency, disabled by default).
    #[serde(default)]
    pub queue: QueueConfig,

    /// Auth provider credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Website content locations and watcher cadence.
    #[serde(default)]
    pub site: SiteConfig,

    /// Background scheduler cadence.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Environment designation.
    #[serde(default)]
    pub environment: Environment,
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid for this schema.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Fill fields that may be supplied through the environment instead of
    /// the file: the auth credential blob and the environment designation.
    /// File values win; the environment only fills gaps.
    pub fn apply_env(&mut self) {
        if self.auth.credentials_json.is_none() {
            if let Ok(blob) = std::env::var(AUTH_CREDENTIALS_ENV) {
                if !blob.is_empty() {
                    self.auth.credentials_json = Some(blob);
                }
            }
        }
        if let Ok(designation) = std::env::var(ENVIRONMENT_ENV) {
            if designation.eq_ignore_ascii_case("production") {
                self.environment = Environment::Production;
            }
        }
    }

    /// Advisory configuration sanity check.
    ///
    /// Returns human-readable warnings for suspicious combinations. Warnings
    /// are logged by the boot sequencer and never block startup.
    #[must_use]
    pub fn sanity_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.environment == Environment::Production
            && (self.datastore.uri.contains("localhost")
                || self.datastore.uri.contains("127.0.0.1"))
        {
            warnings.push(format!(
                "production environment is pointing at a local datastore address ({}); \
                 check the deployment configuration",
                self.datastore.uri
            ));
        }
        if self.queue.enabled && self.queue.uri.is_none() {
            warnings.push(
                "queue subsystem enabled without a broker URI; \
                 publishing will fall back to direct mode"
                    .to_string(),
            );
        }
        warnings
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the listener binds on. Port 0 asks the OS for an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public hostname, used in operator-facing log lines only.
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl ServerConfig {
    /// The address the listener binds.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Primary datastore configuration. The datastore is the sole fatal
/// dependency: boot suspends on its connection and aborts on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Connection URI.
    #[serde(default = "default_datastore_uri")]
    pub uri: String,

    /// Bound on the fatal connection attempt. Boot fails fast after this
    /// rather than hanging indefinitely.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            uri: default_datastore_uri(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_datastore_uri() -> String {
    "mongodb://localhost:27017/sopen".to_string()
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Cache configuration. Advisory: connect failure degrades to cache-less
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Connection URI.
    #[serde(default = "default_cache_uri")]
    pub uri: String,

    /// Whether the cache subsystem is enabled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            uri: default_cache_uri(),
            enabled: true,
        }
    }
}

fn default_cache_uri() -> String {
    "redis://localhost:6379".to_string()
}

const fn default_true() -> bool {
    true
}

/// Message queue configuration.
///
/// The queue ships disabled: a configured URI with `enabled = false` is the
/// administratively-disabled state, in which boot never attempts a broker
/// connection and publishing runs in direct mode. Unknown keys are rejected
/// so a typo cannot silently re-enable the broker.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Broker URI. May be present while the subsystem is disabled.
    #[serde(default)]
    pub uri: Option<String>,

    /// Whether the queue subsystem is enabled.
    #[serde(default)]
    pub enabled: bool,
}

impl QueueConfig {
    /// Whether queued publishing is actually usable: enabled and configured.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.uri.is_some()
    }

    /// Whether the broker is configured but administratively disabled. This
    /// state must short-circuit without a connection attempt and emit an
    /// operator-visible notice.
    #[must_use]
    pub fn is_administratively_disabled(&self) -> bool {
        !self.enabled && self.uri.is_some()
    }
}

/// Auth provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// JSON credential blob for the auth provider. Usually supplied via the
    /// `SOPEN_AUTH_CREDENTIALS` environment variable rather than the file.
    /// Absent: auth features are disabled (advisory).
    #[serde(default)]
    pub credentials_json: Option<String>,
}

/// Website content locations and watcher cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Directory holding generated and static pages.
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,

    /// Directory holding static assets.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Poll interval for the pages watcher.
    #[serde(default = "default_watch_interval")]
    #[serde(with = "humantime_serde")]
    pub watch_interval: Duration,
}

impl SiteConfig {
    /// Path of the homepage artifact inside the pages directory.
    #[must_use]
    pub fn homepage_path(&self) -> PathBuf {
        self.pages_dir.join("index.html")
    }

    /// Path of the dashboard page inside the pages directory.
    #[must_use]
    pub fn dashboard_path(&self) -> PathBuf {
        self.pages_dir.join("dashboard.html")
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            pages_dir: default_pages_dir(),
            assets_dir: default_assets_dir(),
            watch_interval: default_watch_interval(),
        }
    }
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("website/pages")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("website/assets")
}

const fn default_watch_interval() -> Duration {
    Duration::from_secs(2)
}

/// Background scheduler cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between homepage refresh runs.
    #[serde(default = "default_refresh_interval")]
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
        }
    }
}

const fn default_refresh_interval() -> Duration {
    Duration::from_secs(300)
}

/// Environment designation. Affects the advisory sanity check only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development (default).
    #[default]
    Development,

    /// Production deployment.
    Production,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_development_defaults() {
        let config = ServiceConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.datastore.connect_timeout, Duration::from_secs(10));
        assert!(config.cache.enabled);
        assert!(!config.queue.enabled);
        assert!(config.queue.uri.is_none());
        assert!(config.sanity_warnings().is_empty());
    }

    #[test]
    fn durations_parse_as_humantime() {
        let config = ServiceConfig::from_toml(
            "[datastore]\n\
             connect_timeout = \"3s\"\n\
             \n\
             [site]\n\
             watch_interval = \"500ms\"\n",
        )
        .expect("config should parse");
        assert_eq!(config.datastore.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.site.watch_interval, Duration::from_millis(500));
    }

    #[test]
    fn production_with_local_datastore_warns() {
        let config = ServiceConfig::from_toml(
            "environment = \"production\"\n\
             \n\
             [datastore]\n\
             uri = \"mongodb://localhost:27017/sopen\"\n",
        )
        .expect("config should parse");
        let warnings = config.sanity_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("local datastore address"));
    }

    #[test]
    fn production_with_remote_datastore_is_clean() {
        let config = ServiceConfig::from_toml(
            "environment = \"production\"\n\
             \n\
             [datastore]\n\
             uri = \"mongodb://db.internal:27017/sopen\"\n",
        )
        .expect("config should parse");
        assert!(config.sanity_warnings().is_empty());
    }

    #[test]
    fn queue_with_uri_but_disabled_is_administratively_disabled() {
        let config = ServiceConfig::from_toml(
            "[queue]\n\
             uri = \"amqp://localhost:5672\"\n",
        )
        .expect("config should parse");
        assert!(config.queue.is_administratively_disabled());
        assert!(!config.queue.is_active());
    }

    #[test]
    fn queue_enabled_with_uri_is_active() {
        let config = ServiceConfig::from_toml(
            "[queue]\n\
             uri = \"amqp://localhost:5672\"\n\
             enabled = true\n",
        )
        .expect("config should parse");
        assert!(config.queue.is_active());
        assert!(!config.queue.is_administratively_disabled());
    }

    #[test]
    fn queue_enabled_without_uri_warns_and_is_inactive() {
        let config = ServiceConfig::from_toml(
            "[queue]\n\
             enabled = true\n",
        )
        .expect("config should parse");
        assert!(!config.queue.is_active());
        let warnings = config.sanity_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("without a broker URI"));
    }

    #[test]
    fn unknown_queue_key_is_rejected() {
        let result = ServiceConfig::from_toml(
            "[queue]\n\
             enabld = true\n",
        );
        assert!(result.is_err(), "typo in [queue] must not parse");
    }

    #[test]
    fn from_file_loads_homepage_paths() {
        let temp = tempfile::TempDir::new().expect("create temp dir");
        let path = temp.path().join("sopen.toml");
        std::fs::write(
            &path,
            "[site]\n\
             pages_dir = \"/srv/sopen/pages\"\n",
        )
        .expect("write config");

        let config = ServiceConfig::from_file(&path).expect("config should load");
        assert_eq!(
            config.site.homepage_path(),
            PathBuf::from("/srv/sopen/pages/index.html")
        );
        assert_eq!(
            config.site.dashboard_path(),
            PathBuf::from("/srv/sopen/pages/dashboard.html")
        );
    }
}
