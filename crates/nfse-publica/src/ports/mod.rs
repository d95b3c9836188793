//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that callers use
//! - **Outbound (Driven)**: Collaborators this client needs

pub mod inbound;
pub mod outbound;
