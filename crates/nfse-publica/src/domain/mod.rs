//! # Domain Layer
//!
//! Pure envelope composition logic with no I/O dependencies.
//! This is the inner layer of the hexagonal architecture.

pub mod batch;
pub mod config;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod identifiers;
pub mod operations;
pub mod payload;
pub mod xml;
