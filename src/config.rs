use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub session_days: i64,
    pub secure_cookies: bool,
    pub client_origin: String,
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub blob_remote_url: Option<String>,
    pub blob_remote_key: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_owned(),
            database_url: "sqlite://flock.db?mode=rwc".to_owned(),
            db_max_connections: 16,
            session_days: 15,
            secure_cookies: false,
            client_origin: "http://localhost:3000".to_owned(),
            public_url: "http://localhost:5000".to_owned(),
            upload_dir: PathBuf::from("uploads"),
            blob_remote_url: None,
            blob_remote_key: None,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the process environment over the defaults.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            info!("no .env loaded: {e}");
        }

        let defaults = Config::default();
        Ok(Self {
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr)?,
            database_url: try_load("DATABASE_URL", defaults.database_url)?,
            db_max_connections: try_load("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            session_days: try_load("SESSION_DAYS", defaults.session_days)?,
            secure_cookies: try_load("SECURE_COOKIES", defaults.secure_cookies)?,
            client_origin: try_load("CLIENT_ORIGIN", defaults.client_origin)?,
            public_url: try_load("PUBLIC_URL", defaults.public_url)?,
            upload_dir: try_load("UPLOAD_DIR", defaults.upload_dir.display().to_string())?.into(),
            blob_remote_url: optional("BLOB_REMOTE_URL"),
            blob_remote_key: optional("BLOB_REMOTE_KEY"),
            max_body_bytes: try_load("MAX_BODY_BYTES", defaults.max_body_bytes)?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse(key, &raw),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {key} value: {raw}");
        anyhow!("environment variable {key} is malformed: {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        let port: u32 = try_load("FLOCK_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(port, 42);
        assert!(optional("FLOCK_TEST_SURELY_UNSET_KEY").is_none());
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = parse::<u32>("DB_MAX_CONNECTIONS", "lots").unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));

        let err = parse::<bool>("SECURE_COOKIES", "yes please").unwrap_err();
        assert!(err.to_string().contains("SECURE_COOKIES"));

        assert_eq!(parse::<usize>("MAX_BODY_BYTES", " 1024 ").unwrap(), 1024);
    }

    #[test]
    fn defaults_point_at_a_local_store() {
        let config = Config::default();
        assert!(config.database_url.starts_with("sqlite:"));
        assert!(config.blob_remote_url.is_none());
        assert_eq!(config.session_days, 15);
    }
}
