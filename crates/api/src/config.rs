//! Process configuration, read from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REALTIME_CAPACITY: usize = 256;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} must be a positive integer: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Buffer of the realtime (SSE) broadcast channel.
    pub realtime_capacity: usize,
}

impl ApiConfig {
    /// Read `SOCIETY_BIND_ADDR`, `JWT_SECRET` and `SOCIETY_REALTIME_CAPACITY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match lookup("SOCIETY_BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidAddr {
                var: "SOCIETY_BIND_ADDR",
                value,
            })?,
            None => DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError::InvalidAddr {
                var: "SOCIETY_BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })?,
        };

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let realtime_capacity = match lookup("SOCIETY_REALTIME_CAPACITY") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "SOCIETY_REALTIME_CAPACITY",
                        value,
                    });
                }
            },
            None => DEFAULT_REALTIME_CAPACITY,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            realtime_capacity,
        })
    }

    /// Defaults plus an explicit signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let jwt_secret = jwt_secret.into();
        Self::from_lookup(|var| (var == "JWT_SECRET").then(|| jwt_secret.clone()))
    }
}
