use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::interview::{
    FacultyRouting, Scope, ServiceSettings, DEFAULT_AUTOSAVE_DEBOUNCE, DEFAULT_DESTINATION,
};

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
    pub console: ConsoleConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            console: ConsoleConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Department scope, autosave window and forwarding routes for the scoring console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub scope: Scope,
    pub autosave_debounce: Duration,
    pub routing: FacultyRouting,
}

impl ConsoleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let faculty = env::var("APP_FACULTY").unwrap_or_else(|_| "general".to_string());
        let department = env::var("APP_DEPARTMENT").unwrap_or_else(|_| "general".to_string());

        let autosave_debounce = match env::var("APP_AUTOSAVE_DEBOUNCE_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDebounce)?,
            Err(_) => DEFAULT_AUTOSAVE_DEBOUNCE,
        };

        let fallback =
            env::var("APP_DEFAULT_DESTINATION").unwrap_or_else(|_| DEFAULT_DESTINATION.to_string());
        let routes = env::var("APP_FACULTY_ROUTES").unwrap_or_default();
        let routing = FacultyRouting::parse_routes(&routes, fallback)
            .map_err(|reason| ConfigError::InvalidRoutes { reason })?;

        Ok(Self {
            scope: Scope::new(faculty, department),
            autosave_debounce,
            routing,
        })
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            scope: self.scope.clone(),
            autosave_debounce: self.autosave_debounce,
            routing: self.routing.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDebounce,
    InvalidRoutes { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDebounce => {
                write!(f, "APP_AUTOSAVE_DEBOUNCE_MS must be a whole number of milliseconds")
            }
            ConfigError::InvalidRoutes { reason } => {
                write!(f, "APP_FACULTY_ROUTES is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDebounce
            | ConfigError::InvalidRoutes { .. } => None,
        }
    }
}
