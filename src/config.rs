//! Command-line and environment configuration.

use clap::Args;
use std::net::SocketAddr;

/// Warehouse connection settings shared by every binary that talks to Postgres.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection string for the warehouse
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Upper bound on pooled connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// Seconds to wait for a free connection before failing the request
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value = "30")]
    pub acquire_timeout_secs: u64,
}

/// HTTP listener settings.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,
}

impl ServerArgs {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
