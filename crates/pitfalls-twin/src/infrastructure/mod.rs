//! Infrastructure Layer
//!
//! Bridges the harness to the outside world:
//!
//! - **config**: JSON configuration files (serde / serde_json)

pub mod config;

pub use config::HarnessConfig;
