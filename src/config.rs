use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::constants::{MAX_UPLOAD_BYTES, TOKEN_TTL_HOURS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Failed to read secret file {path}: {source}")]
    Secret {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").ok();
        if database_url.is_none() {
            log::info!("DATABASE_URL not set, recipes will only be kept in memory");
        }

        Ok(Self {
            port: try_load("RUST_PORT", "8000")?,
            database_url,
            jwt_secret: load_secret("JWT_SECRET")?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", &TOKEN_TTL_HOURS.to_string())?,
            media_root: try_load("MEDIA_ROOT", "./media")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", &MAX_UPLOAD_BYTES.to_string())?,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            log::info!("{key} not set, using default: {default}");
            default.to_owned()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

/// Reads `key` directly, or from the file named by `<key>_FILE`.
fn load_secret(key: &'static str) -> Result<String, ConfigError> {
    if let Ok(secret) = env::var(key) {
        return non_empty(key, secret);
    }

    let path = env::var(format!("{key}_FILE")).map_err(|_| ConfigError::Missing(key))?;
    let secret = read_to_string(&path).map_err(|source| ConfigError::Secret {
        path: path.to_owned(),
        source,
    })?;
    non_empty(key, secret.trim().to_owned())
}

fn non_empty(key: &'static str, secret: String) -> Result<String, ConfigError> {
    if secret.is_empty() {
        return Err(ConfigError::Invalid {
            key,
            reason: "empty".to_owned(),
        });
    }
    Ok(secret)
}
