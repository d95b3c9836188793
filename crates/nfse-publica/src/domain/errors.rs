//! # Pipeline Errors
//!
//! Error taxonomy for the signed envelope composition pipeline.
//!
//! Every variant is fatal to the call that produced it: the pipeline aborts at
//! the step where the failure occurs and nothing is dispatched.

use thiserror::Error;

use super::entities::BatchMode;

/// Errors that can occur while composing, signing, validating or sending a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NfseError {
    /// More RPS fragments were supplied than the lot mode accepts.
    #[error("Lot limit exceeded: {mode} lots accept at most {limit} RPS, got {actual}")]
    BatchLimitExceeded {
        mode: BatchMode,
        limit: usize,
        actual: usize,
    },

    /// The finalized document does not conform to the declared schema.
    #[error("Schema validation failed against {schema}: {reason}")]
    SchemaValidationFailed { schema: String, reason: String },

    /// The signer collaborator could not sign the target element.
    #[error("Signing of <{target}> failed: {reason}")]
    SigningFailed { target: String, reason: String },

    /// The transport collaborator failed to deliver the request.
    #[error("Transport failure for {operation}: {reason}")]
    TransportFailure { operation: String, reason: String },

    /// A numeric identifier does not fit its fixed-width field.
    #[error("{field} out of range: {value} exceeds {max}")]
    IdentifierOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A fragment or signed document could not be parsed for a structural edit.
    #[error("Malformed XML document: {0}")]
    MalformedDocument(String),
}
