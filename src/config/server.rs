use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Upper bound on the grant lookup for one request, in seconds.
    #[serde(default = "default_grant_timeout")]
    pub grant_timeout_secs: u64,

    /// Permissive CORS on the session endpoint (it is called from browsers).
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            grant_timeout_secs: default_grant_timeout(),
            cors: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grant_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.grant_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn grant_timeout(&self) -> Duration {
        Duration::from_secs(self.grant_timeout_secs)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    64 * 1024 // 64 KiB
}

fn default_grant_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
