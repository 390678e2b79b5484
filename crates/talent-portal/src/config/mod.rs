use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;

use crate::workflows::candidates::GeoPoint;

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

pub const DEFAULT_INVITE_EXPIRY_DAYS: u32 = 4;
pub const DEFAULT_OFFICE_LATITUDE: f64 = 40.7128;
pub const DEFAULT_OFFICE_LONGITUDE: f64 = -74.0060;
pub const DEFAULT_RADIUS_METERS: f64 = 500.0;
pub const DEFAULT_TOLERANCE_METERS: f64 = 100.0;
pub const DEFAULT_WINDOW_MINUTES: i64 = 10;

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub invites: InviteConfig,
    pub checkin: CheckinConfig,
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

        let invites = InviteConfig {
            default_expiry_days: read_number("INVITE_EXPIRY_DAYS", DEFAULT_INVITE_EXPIRY_DAYS)?,
            public_base_url: env::var("APP_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
        };
        if invites.default_expiry_days == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "INVITE_EXPIRY_DAYS",
                value: invites.default_expiry_days.to_string(),
            });
        }

        let office = GeoPoint::new(
            read_number("CHECKIN_OFFICE_LAT", DEFAULT_OFFICE_LATITUDE)?,
            read_number("CHECKIN_OFFICE_LNG", DEFAULT_OFFICE_LONGITUDE)?,
        );
        if !office.is_valid() {
            return Err(ConfigError::InvalidCoordinates {
                latitude: office.latitude,
                longitude: office.longitude,
            });
        }

        let checkin = CheckinConfig {
            office,
            radius_meters: read_non_negative("CHECKIN_RADIUS_METERS", DEFAULT_RADIUS_METERS)?,
            tolerance_meters: read_non_negative(
                "CHECKIN_TOLERANCE_METERS",
                DEFAULT_TOLERANCE_METERS,
            )?,
            window_minutes: read_number("CHECKIN_WINDOW_MINUTES", DEFAULT_WINDOW_MINUTES)?,
        };
        if checkin.window_minutes < 0 || Duration::try_minutes(checkin.window_minutes).is_none() {
            return Err(ConfigError::InvalidNumber {
                key: "CHECKIN_WINDOW_MINUTES",
                value: checkin.window_minutes.to_string(),
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: false,
            },
            invites,
            checkin,
        })
    }
}

impl Default for AppConfig {
    /// Documented defaults without consulting the environment.
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            invites: InviteConfig::default(),
            checkin: CheckinConfig::default(),
        }
    }
}

fn read_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn read_non_negative(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = read_number(key, default)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
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

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            include_targets: false,
        }
    }
}

/// Invite issuance defaults and the base URL used for candidate-facing links.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteConfig {
    pub default_expiry_days: u32,
    pub public_base_url: String,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            default_expiry_days: DEFAULT_INVITE_EXPIRY_DAYS,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Office geofence and arrival window used when confirming interview check-ins.
///
/// `tolerance_meters` is kept apart from `radius_meters` so the nominal fence and the
/// positioning slack can be tuned independently.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinConfig {
    pub office: GeoPoint,
    pub radius_meters: f64,
    pub tolerance_meters: f64,
    pub window_minutes: i64,
}

impl CheckinConfig {
    pub fn allowed_meters(&self) -> f64 {
        self.radius_meters + self.tolerance_meters
    }
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            office: GeoPoint::new(DEFAULT_OFFICE_LATITUDE, DEFAULT_OFFICE_LONGITUDE),
            radius_meters: DEFAULT_RADIUS_METERS,
            tolerance_meters: DEFAULT_TOLERANCE_METERS,
            window_minutes: DEFAULT_WINDOW_MINUTES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} is out of range or not a number (found '{value}')")
            }
            ConfigError::InvalidCoordinates {
                latitude,
                longitude,
            } => write!(
                f,
                "office coordinates ({latitude}, {longitude}) are outside valid \
                 latitude/longitude ranges"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidCoordinates { .. } => None,
        }
    }
}
