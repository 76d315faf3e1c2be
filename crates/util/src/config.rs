use std::{env, fmt, net::SocketAddr};

use super::server_bind_address;

pub const DEFAULT_DATABASE_URL: &str = "mongodb://0.0.0.0:27017/referralDB";
pub const DEFAULT_MAIL_RELAY_HOST: &str = "smtp.gmail.com";
pub const PRODUCTION_BASE_URL: &str = "https://referral-backend-9rej.onrender.com";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Unrecognised values behave as development; the flag only selects the
    /// logged base URL and log format.
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Returns `true` when the current environment should behave as production.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Mail relay settings. Credentials are optional so the service can start
/// without them; sends fail until they are provided.
#[derive(Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub relay_host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

impl MailSettings {
    /// Returns the username/password pair when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("relay_host", &self.relay_host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub base_url: String,
    pub database_url: String,
    pub mail: MailSettings,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = non_empty_var("APP_ENV")
            .or_else(|| non_empty_var("NODE_ENV"))
            .map(|value| Environment::parse(&value))
            .unwrap_or(Environment::Development);
        let bind_addr = server_bind_address().map_err(ConfigError::Port)?;

        let base_url = non_empty_var("APP_BASE_URL").unwrap_or_else(|| {
            if environment.is_production() {
                PRODUCTION_BASE_URL.to_string()
            } else {
                format!("http://localhost:{}", bind_addr.port())
            }
        });

        let database_url =
            non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if !is_supported_database_url(&database_url) {
            return Err(ConfigError::DatabaseUrl(database_url));
        }

        let username = non_empty_var("GMAIL_USER");
        let mail = MailSettings {
            relay_host: non_empty_var("MAIL_RELAY_HOST")
                .unwrap_or_else(|| DEFAULT_MAIL_RELAY_HOST.to_string()),
            from: non_empty_var("MAIL_FROM").or_else(|| username.clone()),
            password: non_empty_var("GMAIL_PASS"),
            username,
        };

        Ok(Self {
            bind_addr,
            environment,
            base_url,
            database_url,
            mail,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_supported_database_url(url: &str) -> bool {
    ["mongodb://", "mongodb+srv://", "sqlite:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Port(std::num::ParseIntError),
    DatabaseUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(err) => write!(f, "invalid PORT value: {err}"),
            Self::DatabaseUrl(value) => write!(
                f,
                "DATABASE_URL must start with mongodb://, mongodb+srv:// or sqlite: (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
