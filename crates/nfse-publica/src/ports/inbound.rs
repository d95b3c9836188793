//! # Inbound Ports (Driving Ports / API)
//!
//! The public operations of the NFSe client.

use crate::domain::entities::{
    CancelRequest, CancellationReason, CorrectionLetter, NumberRange, QueryFilter,
    RpsIdentification,
};
use crate::domain::errors::NfseError;
use crate::domain::identifiers::LotNumber;
use crate::ports::outbound::RpsDocument;

/// Primary NFSe client API.
///
/// Every call runs build, sign, finalize and send to completion and returns
/// the raw, uninterpreted transport response. Implementations must be
/// thread-safe (`Send + Sync`).
pub trait NfseApi: Send + Sync {
    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel an issued invoice.
    ///
    /// The invoice number is encoded as year + sequence; the year defaults to
    /// the current calendar year.
    fn cancel_nfse(&self, request: &CancelRequest) -> Result<String, NfseError>;

    /// Cancel invoice `number` and replace it with `replacement` in one call.
    fn substitute_nfse(
        &self,
        number: u64,
        replacement: &mut dyn RpsDocument,
        reason: CancellationReason,
    ) -> Result<String, NfseError>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Result of an asynchronous lot, by protocol.
    fn query_lot(&self, protocol: &str) -> Result<String, NfseError>;

    /// Processing status of an asynchronous lot, by protocol.
    fn query_lot_status(&self, protocol: &str) -> Result<String, NfseError>;

    /// Invoices issued by the configured provider.
    fn query_services_provided(&self, filter: &QueryFilter) -> Result<String, NfseError>;

    /// Invoices in which the configured provider is the service taker.
    fn query_services_taken(&self, filter: &QueryFilter) -> Result<String, NfseError>;

    /// Invoices in a number interval of one year.
    fn query_range(&self, range: &NumberRange) -> Result<String, NfseError>;

    /// Invoice generated from a given RPS.
    fn query_by_rps(&self, rps: &RpsIdentification) -> Result<String, NfseError>;

    // =========================================================================
    // Lots
    // =========================================================================

    /// Send up to two RPS for synchronous processing.
    ///
    /// # Errors
    /// * `NfseError::BatchLimitExceeded` - more than two documents; nothing is
    ///   rendered or signed
    fn send_lot_sync(
        &self,
        lot: &LotNumber,
        documents: &mut [Box<dyn RpsDocument>],
    ) -> Result<String, NfseError>;

    /// Send a lot for asynchronous processing. Answered with a protocol.
    ///
    /// # Errors
    /// * `NfseError::BatchLimitExceeded` - more documents than the configured
    ///   ceiling; nothing is rendered or signed
    fn send_lot_async(
        &self,
        lot: &LotNumber,
        documents: &mut [Box<dyn RpsDocument>],
    ) -> Result<String, NfseError>;

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Build and sign a `GerarNfse` request without sending it.
    ///
    /// The returned document carries no prolog and has not been validated.
    fn sign_generate_request(&self, document: &mut dyn RpsDocument) -> Result<String, NfseError>;

    /// Validate and send a previously signed `GerarNfse` request.
    fn generate_from_signed(&self, signed: &str) -> Result<String, NfseError>;

    /// Issue one invoice synchronously.
    fn generate_nfse(&self, document: &mut dyn RpsDocument) -> Result<String, NfseError>;

    /// Send a correction letter for an issued invoice.
    fn send_correction_letter(&self, letter: &CorrectionLetter) -> Result<String, NfseError>;
}
