//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use checkout::{BraintreeConfig, BraintreeEnvironment};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required when PAYMENT_GATEWAY=braintree")]
    MissingVariable { name: &'static str },

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which payment gateway the server talks to.
#[derive(Debug, Clone, Default)]
pub enum GatewaySettings {
    /// In-process gateway that approves every sale.
    #[default]
    Sandbox,
    /// Braintree GraphQL API.
    Braintree(BraintreeConfig),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: Postgres connection string; in-memory stores when unset
/// - `PAYMENT_GATEWAY`: `sandbox` or `braintree` (default: `sandbox`)
/// - `BRAINTREE_ENVIRONMENT`, `BRAINTREE_MERCHANT_ID`,
///   `BRAINTREE_PUBLIC_KEY`, `BRAINTREE_PRIVATE_KEY`
/// - `GATEWAY_TIMEOUT_SECS`: per-sale timeout (default: `30`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub gateway: GatewaySettings,
    pub gateway_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::InvalidValue {
                name: "PORT",
                message: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(format) if format == "text" => LogFormat::Text,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "LOG_FORMAT",
                    message: format!("expected text or json, got {other}"),
                });
            }
        };

        let gateway_timeout = match var("GATEWAY_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "GATEWAY_TIMEOUT_SECS",
                    message: format!("{e}"),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.gateway_timeout,
        };

        let gateway = match var("PAYMENT_GATEWAY").as_deref().map(str::to_ascii_lowercase) {
            None => GatewaySettings::Sandbox,
            Some(kind) if kind == "sandbox" => GatewaySettings::Sandbox,
            Some(kind) if kind == "braintree" => {
                let required = |name: &'static str| {
                    var(name).ok_or(ConfigError::MissingVariable { name })
                };
                let environment = match var("BRAINTREE_ENVIRONMENT") {
                    Some(env) => BraintreeEnvironment::from_str(&env).map_err(|message| {
                        ConfigError::InvalidValue {
                            name: "BRAINTREE_ENVIRONMENT",
                            message,
                        }
                    })?,
                    None => BraintreeEnvironment::Sandbox,
                };
                GatewaySettings::Braintree(BraintreeConfig {
                    environment,
                    merchant_id: required("BRAINTREE_MERCHANT_ID")?,
                    public_key: required("BRAINTREE_PUBLIC_KEY")?,
                    private_key: required("BRAINTREE_PRIVATE_KEY")?,
                    request_timeout: gateway_timeout,
                })
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "PAYMENT_GATEWAY",
                    message: format!("expected sandbox or braintree, got {other}"),
                });
            }
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            gateway,
            gateway_timeout,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            gateway: GatewaySettings::Sandbox,
            gateway_timeout: Duration::from_secs(30),
        }
    }
}
