//! # Adapters Layer
//!
//! Concrete implementations of the configuration port.

pub mod config;

pub use config::{ConfigError, StaticConfigProvider, TomlConfigProvider};
