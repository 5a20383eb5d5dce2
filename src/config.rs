//! Configuration for Manna
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

use crate::display::DEFAULT_UTC_OFFSET_MINUTES;

/// Store backend selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// MongoDB with a native TTL index
    Mongo,
    /// Process memory with a periodic sweep (development only)
    Memory,
}

/// Manna - ephemeral image drop
///
/// "Let no man leave of it till the morning" - Exodus 16:19
#[derive(Parser, Debug, Clone)]
#[command(name = "manna")]
#[command(about = "Ephemeral image store: base64 in, short-lived URL out")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Port override for hosting platforms that only hand out PORT
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Store backend
    #[arg(long = "store", env = "STORE_BACKEND", value_enum, default_value = "mongo")]
    pub store: StoreBackend,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "manna")]
    pub mongodb_db: String,

    /// Enable development mode (diagnostic details in error responses)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Public base URL for retrieval links (e.g., "https://img.example.com")
    /// Derived from X-Forwarded-Proto and Host when unset
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Offset from UTC, in minutes, for human-readable timestamps
    #[arg(
        long,
        env = "DISPLAY_UTC_OFFSET_MINUTES",
        default_value_t = DEFAULT_UTC_OFFSET_MINUTES,
        allow_negative_numbers = true
    )]
    pub display_utc_offset_minutes: i32,

    /// Apply strict data URL validation to POST /upload as well
    #[arg(long, env = "STRICT_BODY_VALIDATION", default_value = "false")]
    pub strict_body_validation: bool,

    /// Maximum accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "52428800")]
    pub max_body_bytes: usize,

    /// Reclamation interval for the memory store, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,
}

impl Args {
    /// Effective bind address (PORT wins over the LISTEN port)
    pub fn bind_addr(&self) -> SocketAddr {
        match self.port {
            Some(port) => SocketAddr::new(self.listen.ip(), port),
            None => self.listen,
        }
    }

    /// Public base URL without a trailing slash
    pub fn public_base(&self) -> Option<&str> {
        self.public_url.as_deref().map(|u| u.trim_end_matches('/'))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.display_utc_offset_minutes.abs() >= 24 * 60 {
            return Err("DISPLAY_UTC_OFFSET_MINUTES must be within +/- 1439".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        if self.store == StoreBackend::Memory && self.sweep_interval_secs == 0 {
            return Err("SWEEP_INTERVAL_SECS must be greater than zero".to_string());
        }

        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err("PUBLIC_URL must start with http:// or https://".to_string());
            }
        }

        Ok(())
    }
}
