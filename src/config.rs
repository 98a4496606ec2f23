use crate::error::ConfigError;
use log::LevelFilter;
use std::env;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Scylla,
    Memory,
}

/// Service configuration read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub backend: BackendKind,
    pub scylla_nodes: Vec<String>,
    pub keyspace: String,
    pub log_level: LevelFilter,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name).ok().map(|s| s.trim().to_string()) {
        Some(value) if !value.is_empty() => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

fn valid_keyspace(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env_str("JWT_SECRET", "");
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }

        let backend = match env_str("STORE_BACKEND", "scylla").to_lowercase().as_str() {
            "scylla" => BackendKind::Scylla,
            "memory" => BackendKind::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let keyspace = env_str("SCYLLA_KEYSPACE", "asset_collections");
        if !valid_keyspace(&keyspace) {
            return Err(ConfigError::Invalid {
                name: "SCYLLA_KEYSPACE",
                value: keyspace,
            });
        }

        let scylla_nodes: Vec<String> = env_str("SCYLLA_NODES", "127.0.0.1:9042")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let token_ttl_hours = env_parse("TOKEN_TTL_HOURS", 168i64)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        Ok(AppConfig {
            bind: env_parse("BIND", IpAddr::from([127, 0, 0, 1]))?,
            port: env_parse("PORT", 5000u16)?,
            jwt_secret,
            token_ttl_hours,
            backend,
            scylla_nodes,
            keyspace,
            log_level: env_parse("LOG_LEVEL", LevelFilter::Info)?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
