//! Server module for Manna

pub mod http;

pub use http::{route, run, AppState};
