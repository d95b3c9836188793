//! # NFSe Públic@ Client
//!
//! Builds, signs, validates and sends requests to the Públic@ municipal
//! electronic service invoice (NFSe) web service.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Envelope composition, no I/O
//! - **Ports Layer** (`ports/`): Inbound API and outbound collaborator traits
//! - **Service Layer** (`service.rs`): Wires the pipeline to the ports
//! - **Adapters Layer** (`adapters/`): TOML configuration loading
//!
//! ## Pipeline
//!
//! Every operation runs the same fixed sequence, driven by a static
//! operation table:
//!
//! 1. Payload builder (or batch assembler for lots)
//! 2. Signature plan, innermost element first
//! 3. Post-signing blocks (`Protocolo`, `Faixa`)
//! 4. Prolog stripping and schema validation
//! 5. Transport
//!
//! Any failure aborts the call; nothing partial is ever sent.
//!
//! ## Collaborators
//!
//! XML signing, XSD validation, transport and RPS rendering are supplied by
//! the caller through the traits in [`ports::outbound`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::{ConfigError, StaticConfigProvider, TomlConfigProvider};
pub use domain::config::ClientConfig;
pub use domain::entities::{
    BatchMode, CancelRequest, CancellationReason, CorrectionLetter, CorrectionTaker, DateRange,
    NumberRange, PartyIdentity, ProviderIdentity, QueryFilter, RpsFragment, RpsIdentification,
    TaxId,
};
pub use domain::errors::NfseError;
pub use domain::identifiers::{composite_number, substitution_number, LotNumber};
pub use domain::operations::{Operation, SignaturePlan, SignatureStep, OPERATIONS};
pub use ports::inbound::NfseApi;
pub use ports::outbound::{
    CanonicalizationFlags, Certificate, ConfigProvider, DigestAlgorithm, RpsDocument,
    SchemaValidator, SignatureRequest, Signer, SignerError, Transport, TransportError,
    ValidationError,
};
pub use service::{apply_signature_plan, NfseService};
