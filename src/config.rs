use std::{env, net::SocketAddr, str::FromStr};

use thiserror::Error;

use crate::engine::DEFAULT_MAX_CONCURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Stdio,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            _ => Err(ConfigError::InvalidTransport),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub bind_addr: String,
    pub bind_port: u16,
    pub max_concurrency: usize,
    pub server_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be either `http` or `stdio`")]
    InvalidTransport,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_MAX_CONCURRENCY must be a positive integer")]
    InvalidConcurrency,
    #[error("MCP_SERVER_NAME must not be empty")]
    EmptyServerName,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = non_empty_var("MCP_TRANSPORT")
            .map(|value| value.parse::<Transport>())
            .transpose()?
            .unwrap_or(Transport::Http);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let max_concurrency = non_empty_var("MCP_MAX_CONCURRENCY")
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or(ConfigError::InvalidConcurrency)
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);
        let server_name = match env::var("MCP_SERVER_NAME") {
            Ok(value) if value.trim().is_empty() => return Err(ConfigError::EmptyServerName),
            Ok(value) => value.trim().to_string(),
            Err(_) => env!("CARGO_PKG_NAME").to_string(),
        };

        let config = Self {
            transport,
            bind_addr,
            bind_port,
            max_concurrency,
            server_name,
        };

        if config.transport == Transport::Http {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
