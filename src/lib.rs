//! Manna - ephemeral image drop
//!
//! "Let no man leave of it till the morning" - Exodus 16:19
//!
//! Clients hand Manna a base64 data URL and receive a short-lived link.
//! Every stored blob disappears five hours after it was gathered.
//!
//! ## Components
//!
//! - **Encoding**: data URL validation, content-type extraction, decoding
//! - **Record**: blob identity and expiry arithmetic
//! - **Store**: MongoDB (native TTL index) or in-memory backend
//! - **Service**: submit and retrieve orchestration
//! - **Server**: hyper HTTP transport

pub mod blob;
pub mod config;
pub mod db;
pub mod display;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use blob::{BlobService, ValidationPolicy};
pub use config::Args;
pub use server::{run, AppState};
pub use types::{MannaError, Result};
