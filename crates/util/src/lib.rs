pub mod config;

use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
};

pub use config::{AppConfig, ConfigError, Environment, MailSettings};

pub const DEFAULT_PORT: u16 = 3000;

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Returns the address the HTTP server should bind to.
///
/// The port is resolved from the `PORT` environment variable and falls back to
/// [`DEFAULT_PORT`]. The server always listens on every interface.
pub fn server_bind_address() -> Result<SocketAddr, std::num::ParseIntError> {
    let port = match env::var("PORT").ok().filter(|value| !value.trim().is_empty()) {
        Some(value) => value.trim().parse::<u16>()?,
        None => DEFAULT_PORT,
    };
    Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn returns_default_port_when_env_missing() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::remove_var("PORT");
        let addr = server_bind_address().expect("default address is valid");
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn parses_custom_port_from_env() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("PORT", "9000");
        let addr = server_bind_address().expect("custom port should parse");
        assert_eq!(addr.to_string(), "0.0.0.0:9000");
        env::remove_var("PORT");
    }

    #[test]
    fn blank_port_falls_back_to_default() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("PORT", "  ");
        let addr = server_bind_address().expect("blank port uses default");
        assert_eq!(addr.port(), DEFAULT_PORT);
        env::remove_var("PORT");
    }

    #[test]
    fn rejects_non_numeric_port() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("PORT", "eighty");
        assert!(server_bind_address().is_err());
        env::remove_var("PORT");
    }
}
