//! # NFSe Telemetry
//!
//! Structured logging setup for processes embedding the NFSe client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nfse_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("Failed to init logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NFSE_SERVICE_NAME` | `nfse-publica` | Service name in the start-up event |
//! | `NFSE_LOG_LEVEL` | `info` | Log filter, falls back to `RUST_LOG` |
//! | `NFSE_JSON_LOGS` | `false` | JSON output instead of human-readable |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Logging initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
