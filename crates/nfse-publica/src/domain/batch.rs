//! # Batch Assembler
//!
//! Groups pre-rendered RPS fragments into a `LoteRps` envelope.
//!
//! The size ceiling depends on the submission mode and must be checked with
//! [`check_lot_size`] before any fragment is rendered or signed.

use super::config::ClientConfig;
use super::entities::{BatchMode, RpsFragment};
use super::errors::NfseError;
use super::identifiers::LotNumber;
use super::operations::{Operation, PreparedRequest};
use super::payload::{cpf_cnpj, tax_id_element};
use super::xml::XmlElement;

/// Namespace bound to the `xsi` prefix on asynchronous envelopes.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Maximum number of RPS accepted in one lot of the given mode.
pub fn lot_limit(config: &ClientConfig, mode: BatchMode) -> usize {
    match mode {
        BatchMode::Synchronous => ClientConfig::SYNC_LOT_LIMIT,
        BatchMode::Asynchronous => config.async_lot_limit,
    }
}

/// Operation that carries a lot of the given mode.
pub fn lot_operation(mode: BatchMode) -> Operation {
    match mode {
        BatchMode::Synchronous => Operation::RecepcionarLoteRpsSincrono,
        BatchMode::Asynchronous => Operation::RecepcionarLoteRps,
    }
}

/// Reject lots larger than the mode ceiling.
///
/// # Errors
/// * `NfseError::BatchLimitExceeded` - `count` exceeds the ceiling
pub fn check_lot_size(config: &ClientConfig, mode: BatchMode, count: usize) -> Result<(), NfseError> {
    let limit = lot_limit(config, mode);
    if count > limit {
        return Err(NfseError::BatchLimitExceeded {
            mode,
            limit,
            actual: count,
        });
    }
    Ok(())
}

/// Wrap `fragments` into the lot envelope of `mode`.
///
/// `QuantidadeRps` always equals `fragments.len()`.
///
/// # Errors
/// * `NfseError::BatchLimitExceeded` - too many fragments for `mode`
pub fn assemble_lot(
    config: &ClientConfig,
    mode: BatchMode,
    lot: &LotNumber,
    fragments: &[RpsFragment],
) -> Result<PreparedRequest, NfseError> {
    check_lot_size(config, mode, fragments.len())?;

    let provider = &config.provider;
    let tax_id = match mode {
        BatchMode::Synchronous => cpf_cnpj(&provider.tax_id),
        BatchMode::Asynchronous => tax_id_element(&provider.tax_id),
    };

    let list = fragments
        .iter()
        .fold(XmlElement::new("ListaRps"), |list, fragment| {
            list.raw(fragment.as_str())
        });

    let lot_element = match mode {
        BatchMode::Synchronous => XmlElement::new("LoteRps").attr("Id", lot.element_id()),
        BatchMode::Asynchronous => XmlElement::new("LoteRps"),
    };
    let lot_element = lot_element
        .attr("versao", config.layout_version.as_str())
        .text_child("NumeroLote", lot.as_str())
        .child(tax_id)
        .text_child("InscricaoMunicipal", provider.municipal_registration.as_str())
        .text_child("QuantidadeRps", fragments.len().to_string())
        .child(list);

    let root = match mode {
        BatchMode::Synchronous => XmlElement::new("EnviarLoteRpsSincronoEnvio")
            .attr("xmlns", config.message_namespace.as_str()),
        BatchMode::Asynchronous => XmlElement::new("EnviarLoteRpsEnvio")
            .attr("xmlns", config.message_namespace.as_str())
            .attr("xmlns:xsi", XSI_NAMESPACE)
            .attr("xsi:schemaLocation", config.schema_location()),
    };

    Ok(PreparedRequest::new(lot_operation(mode), root.child(lot_element)))
}
