use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::referrals::{AssignmentPolicy, Locale};

const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_CAPACITY_REFRESH_SECS: u64 = 300;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub referrals: ReferralConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let locale = match env::var("APP_LOCALE") {
            Ok(raw) => Locale::parse(&raw).ok_or(ConfigError::InvalidLocale { value: raw })?,
            Err(_) => Locale::default(),
        };

        let assignment_policy = match env::var("APP_ASSIGNMENT_POLICY") {
            Ok(raw) => AssignmentPolicy::parse(&raw)
                .ok_or(ConfigError::InvalidAssignmentPolicy { value: raw })?,
            Err(_) => AssignmentPolicy::default(),
        };

        let advisory_timeout = Duration::from_millis(read_u64(
            "APP_ADVISORY_TIMEOUT_MS",
            DEFAULT_ADVISORY_TIMEOUT_MS,
        )?);
        let capacity_refresh_interval = Duration::from_secs(read_u64(
            "APP_CAPACITY_REFRESH_SECS",
            DEFAULT_CAPACITY_REFRESH_SECS,
        )?);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            referrals: ReferralConfig {
                locale,
                advisory_timeout,
                capacity_refresh_interval,
                assignment_policy,
            },
        })
    }
}

fn read_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidDuration { name }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the referral engine: message language, advisory wait bound, dashboard refresh
/// cadence and how assignment interacts with bed capacity.
#[derive(Debug, Clone)]
pub struct ReferralConfig {
    pub locale: Locale,
    pub advisory_timeout: Duration,
    pub capacity_refresh_interval: Duration,
    pub assignment_policy: AssignmentPolicy,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            advisory_timeout: Duration::from_millis(DEFAULT_ADVISORY_TIMEOUT_MS),
            capacity_refresh_interval: Duration::from_secs(DEFAULT_CAPACITY_REFRESH_SECS),
            assignment_policy: AssignmentPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLocale { value: String },
    InvalidAssignmentPolicy { value: String },
    InvalidDuration { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLocale { value } => {
                write!(f, "APP_LOCALE must be 'ar' or 'en' (found '{value}')")
            }
            ConfigError::InvalidAssignmentPolicy { value } => write!(
                f,
                "APP_ASSIGNMENT_POLICY must be 'record-only' or 'reserve-bed' (found '{value}')"
            ),
            ConfigError::InvalidDuration { name } => {
                write!(f, "{name} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLocale { .. }
            | ConfigError::InvalidAssignmentPolicy { .. }
            | ConfigError::InvalidDuration { .. } => None,
        }
    }
}
