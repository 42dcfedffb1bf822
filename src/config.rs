use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};
use thiserror::Error;

use crate::cryptography::generate_secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },

    #[error("{0} is required when AUTO_SUPERUSER is enabled")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperuserConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub secret_key: Vec<u8>,
    pub token_lifetime_hours: i64,
    pub media_root: String,
    pub public_url: String,
    pub db_max_connections: u32,
    pub superuser: Option<SuperuserConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, `Config::load` uses the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let user = or_default(&lookup, "POSTGRES_USER", "postgres");
                let password = or_default(&lookup, "POSTGRES_PASSWORD", "postgres");
                let host = or_default(&lookup, "DB_HOST", "db");
                let port = or_default(&lookup, "DB_PORT", "5432");
                let db = or_default(&lookup, "POSTGRES_DB", "postgres");
                format!("postgres://{user}:{password}@{host}:{port}/{db}")
            }
        };

        let secret_key = match lookup("SECRET_KEY") {
            Some(key) if !key.is_empty() => key.into_bytes(),
            _ => {
                warn!("SECRET_KEY not set, sessions will not survive a restart");
                generate_secret()
            }
        };

        let superuser = match lookup("AUTO_SUPERUSER").as_deref() {
            Some("true") | Some("1") => Some(SuperuserConfig {
                email: lookup("SUPERUSER_EMAIL").ok_or(ConfigError::Missing("SUPERUSER_EMAIL"))?,
                password: lookup("SUPERUSER_PASSWORD")
                    .ok_or(ConfigError::Missing("SUPERUSER_PASSWORD"))?,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port: parse(&lookup, "PORT", "8000")?,
            secret_key,
            token_lifetime_hours: parse(&lookup, "TOKEN_LIFETIME_HOURS", "24")?,
            media_root: or_default(&lookup, "MEDIA_ROOT", "media"),
            public_url: or_default(&lookup, "PUBLIC_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_owned(),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", "10")?,
            superuser,
        })
    }

    pub fn media_url(&self, path: &str) -> String {
        format!("{}/media/{}", self.public_url, path)
    }
}

fn or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    })
}

fn parse<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    or_default(lookup, key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}
