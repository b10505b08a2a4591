//! Application configuration management.
//!
//! Configuration is layered with the `config` crate: an optional TOML file
//! first, then `ROLLCALL__SECTION__KEY` environment overrides, e.g.
//! `ROLLCALL__SCAN__COOLDOWN_SECS=60`.
//!
//! ```toml
//! [service]
//! base_url = "https://attendance.example.com"
//! request_timeout_secs = 15
//!
//! [scan]
//! cooldown_secs = 300
//! cooldown_policy = "optimistic"   # or "on_success"
//! test_marker = "TEST_BEACON"      # "" disables marker matching
//! auto_start = true
//!
//! [identity]
//! email = "singer@example.com"
//!
//! [logging]
//! level = "info,rollcall_core=debug"
//! directory = "/var/log/rollcall"  # production file logs
//! rotation = "daily"                # "hourly", "daily" or "never"
//!
//! [[beacons]]
//! identifier = "TEST_BEACON_UUID"
//! label = "Choir Room A"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cooldown::{CooldownPolicy, DEFAULT_COOLDOWN};
use crate::matcher::{Matcher, DEFAULT_TEST_MARKER};
use crate::registry::BeaconRegistry;
use crate::session::{SessionOptions, DEFAULT_EVENT_BUFFER};
use crate::types::{Beacon, UserIdentity};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ROLLCALL";

/// Separator between prefix, section and key in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Check whether a string looks like an email address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// A single field failed validation.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Remote attendance service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the attendance service.
    pub base_url: String,
    /// Bound on one check-in round-trip, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Scanning and matching settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum seconds between accepted detections of one beacon.
    pub cooldown_secs: u64,
    /// When admissions are recorded in the cooldown ledger.
    pub cooldown_policy: CooldownPolicy,
    /// Name token that marks simulated/bench beacons. Empty disables it.
    pub test_marker: String,
    /// Start scanning as soon as the agent is up.
    pub auto_start: bool,
    /// Capacity of the discovery event channel.
    pub event_buffer: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN.as_secs(),
            cooldown_policy: CooldownPolicy::default(),
            test_marker: DEFAULT_TEST_MARKER.to_string(),
            auto_start: true,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// The signed-in user, as provided by the surrounding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Email address to report check-ins for.
    pub email: Option<String>,
}

/// Local REST surface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the agent API listens on.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// How often production log files roll over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    #[default]
    Daily,
    /// One file, never rotated.
    Never,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for production log files. Platform default when unset.
    pub directory: Option<PathBuf>,
    /// Rotation of production log files.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            rotation: LogRotation::default(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    /// Attendance service.
    pub service: ServiceConfig,
    /// Scanning behaviour.
    pub scan: ScanConfig,
    /// Signed-in user.
    pub identity: IdentityConfig,
    /// Known beacons, highest priority first.
    pub beacons: Vec<Beacon>,
    /// Agent API.
    pub server: ServerConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Default for RollcallConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            scan: ScanConfig::default(),
            identity: IdentityConfig::default(),
            beacons: vec![Beacon::new("TEST_BEACON_UUID", "Choir Room A (Test)")],
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RollcallConfig {
    /// Load from `path` plus environment overrides. The file must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or invalid.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_layered(path)
    }

    /// Load from `path` if it exists, otherwise defaults, then environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file is unreadable or the result is
    /// invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_layered(path.as_ref())
    }

    /// Parse a TOML document without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or is invalid.
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn load_layered(path: &Path) -> ConfigResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory can be determined.
    pub fn default_path() -> ConfigResult<PathBuf> {
        // On Linux: /etc/rollcall/config.toml
        // Elsewhere: the platform config dir, e.g. ~/Library/Application Support/rollcall
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/rollcall/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "rollcall").ok_or_else(|| {
                ConfigError::NotFound("cannot determine config directory".to_string())
            })?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a single `ValidationError` or `MultipleValidationErrors`.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.base_url() {
            errors.push(e);
        }
        if self.service.request_timeout_secs == 0 {
            errors.push(ConfigError::invalid(
                "service.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.scan.event_buffer == 0 {
            errors.push(ConfigError::invalid(
                "scan.event_buffer",
                "must be greater than zero",
            ));
        }
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::invalid(
                "server.bind_address",
                format!("'{}' is not a socket address", self.server.bind_address),
            ));
        }
        if self.logging.level.trim().is_empty() {
            errors.push(ConfigError::invalid("logging.level", "must not be empty"));
        }
        if let Some(email) = &self.identity.email {
            if !is_valid_email(email) {
                errors.push(ConfigError::invalid(
                    "identity.email",
                    format!("'{email}' is not a valid email address"),
                ));
            }
        }

        for (i, beacon) in self.beacons.iter().enumerate() {
            if beacon.identifier.trim().is_empty() {
                errors.push(ConfigError::invalid(
                    format!("beacons[{i}].identifier"),
                    "must not be empty",
                ));
            }
            if beacon.label.trim().is_empty() {
                errors.push(ConfigError::invalid(
                    format!("beacons[{i}].label"),
                    "must not be empty",
                ));
            }
        }
        for dupe in self.registry().duplicate_identifiers() {
            errors.push(ConfigError::invalid(
                "beacons",
                format!("identifier '{dupe}' is listed more than once"),
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Parsed attendance service base URL.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the URL parses with an http(s)
    /// scheme.
    pub fn base_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(&self.service.base_url).map_err(|e| {
            ConfigError::invalid("service.base_url", format!("{e}: '{}'", self.service.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::invalid(
                "service.base_url",
                format!("unsupported scheme '{other}'"),
            )),
        }
    }

    /// Bound on one check-in round-trip.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs)
    }

    /// The beacon registry in configured order.
    pub fn registry(&self) -> BeaconRegistry {
        BeaconRegistry::new(self.beacons.clone())
    }

    /// The configured identity, if any.
    pub fn identity(&self) -> Option<UserIdentity> {
        self.identity.email.clone().map(UserIdentity::new)
    }

    /// Scan session tunables.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            matcher: Matcher::new(Some(self.scan.test_marker.clone())),
            cooldown: Duration::from_secs(self.scan.cooldown_secs),
            cooldown_policy: self.scan.cooldown_policy,
            event_buffer: self.scan.event_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
[service]
base_url = "https://attendance.example.com/api"
request_timeout_secs = 5

[scan]
cooldown_secs = 120
cooldown_policy = "on_success"
test_marker = ""

[identity]
email = "singer@example.com"

[[beacons]]
identifier = "HALL_A"
label = "Hall A"

[[beacons]]
identifier = "HALL_B"
label = "Hall B"
"#;

    #[test]
    fn test_defaults_are_valid() {
        let config = RollcallConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan.cooldown_secs, 300);
        assert_eq!(config.scan.cooldown_policy, CooldownPolicy::Optimistic);
        assert_eq!(config.beacons[0].identifier, "TEST_BEACON_UUID");
        assert!(config.identity().is_none());
    }

    #[test]
    fn test_parse_sample() {
        let config = RollcallConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.scan.cooldown_policy, CooldownPolicy::OnSuccess);
        assert!(config.scan.auto_start);

        let ids: Vec<_> = config.registry().iter().map(|b| b.identifier.clone()).collect();
        assert_eq!(ids, ["HALL_A", "HALL_B"]);

        let options = config.session_options();
        assert_eq!(options.cooldown, Duration::from_secs(120));
        assert!(options.matcher.test_marker().is_none());
        assert_eq!(
            config.identity(),
            Some(UserIdentity::new("singer@example.com"))
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = RollcallConfig::from_toml_str("[scan]\ncooldown_secs = 10\n").unwrap();
        assert_eq!(config.scan.cooldown_secs, 10);
        assert_eq!(config.service, ServiceConfig::default());
        assert_eq!(config.scan.test_marker, DEFAULT_TEST_MARKER);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let config = RollcallConfig {
            service: ServiceConfig {
                base_url: "ftp://example.com".into(),
                request_timeout_secs: 0,
            },
            identity: IdentityConfig {
                email: Some("not-an-email".into()),
            },
            beacons: vec![
                Beacon::new("A", "One"),
                Beacon::new("A", "Two"),
                Beacon::new(" ", ""),
            ],
            ..RollcallConfig::default()
        };

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => {
                let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
                assert!(text.iter().any(|e| e.contains("service.base_url")));
                assert!(text.iter().any(|e| e.contains("request_timeout_secs")));
                assert!(text.iter().any(|e| e.contains("identity.email")));
                assert!(text.iter().any(|e| e.contains("beacons[2].identifier")));
                assert!(text.iter().any(|e| e.contains("beacons[2].label")));
                assert!(text.iter().any(|e| e.contains("'A' is listed more than once")));
            }
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_single_validation_error() {
        let mut config = RollcallConfig::default();
        config.server.bind_address = "nowhere".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { field, .. }) if field == "server.bind_address"
        ));
    }

    #[test]
    fn test_logging_section() {
        let config = RollcallConfig::from_toml_str(
            "[logging]\nlevel = \"debug\"\ndirectory = \"/tmp/rollcall-logs\"\nrotation = \"hourly\"\n",
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.directory.as_deref(),
            Some(Path::new("/tmp/rollcall-logs"))
        );
        assert_eq!(config.logging.rotation, LogRotation::Hourly);

        let defaults = RollcallConfig::default().logging;
        assert_eq!(defaults.level, "info");
        assert!(defaults.directory.is_none());
        assert_eq!(defaults.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_empty_log_level_is_rejected() {
        let mut config = RollcallConfig::default();
        config.logging.level = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_load_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RollcallConfig::load(&missing),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = RollcallConfig::load(file.path()).unwrap();
        assert_eq!(config.beacons.len(), 2);
        assert_eq!(config.service.base_url, "https://attendance.example.com/api");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RollcallConfig::load_or_default(dir.path().join("none.toml")).unwrap();
        assert_eq!(config.beacons.len(), 1);
    }

    #[test]
    fn test_default_path_is_valid() {
        let path = RollcallConfig::default_path().unwrap();
        assert!(path.ends_with("config.toml"));
    }
}
