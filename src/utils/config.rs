use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use thiserror::Error;

const DEFAULT_CARTODB_ENDPOINT: &str = "http://wri-01.cartodb.com/api/v1/sql";
const DEFAULT_EE_URL: &str = "https://earthengine.googleapis.com";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credentials and service URL for the imagery platform.
#[derive(Debug, Clone)]
pub struct EarthEngineConfig {
    pub url: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cartodb_endpoint: String,
    pub earth_engine: EarthEngineConfig,
    pub bind_addr: SocketAddr,
    pub log_level: String,
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();

        let cartodb_endpoint =
            env::var("CARTODB_ENDPOINT").unwrap_or_else(|_| DEFAULT_CARTODB_ENDPOINT.to_string());
        let ee_url = env::var("EE_URL").unwrap_or_else(|_| DEFAULT_EE_URL.to_string());
        let access_token = env::var("EE_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());

        let bind = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::Invalid { key: "BIND_ADDR", value: bind.clone() })?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            cartodb_endpoint,
            earth_engine: EarthEngineConfig {
                url: ee_url.trim_end_matches('/').to_string(),
                access_token,
            },
            bind_addr,
            log_level,
        })
    }
}
