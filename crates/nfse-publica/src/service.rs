//! # NFSe Client Service
//!
//! Application service layer that implements the `NfseApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`NfseApi`)
//! - Drives the outbound ports (`Signer`, `SchemaValidator`, `Transport`)
//! - Delegates envelope composition to the domain layer
//!
//! Every operation follows the same pipeline, driven by the operation table:
//!
//! ```text
//! payload builder -> signature plan -> appended blocks -> finalizer -> transport
//! ```

use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, error, info, info_span, warn};

use crate::domain::batch::{assemble_lot, check_lot_size, lot_operation};
use crate::domain::config::ClientConfig;
use crate::domain::entities::{
    BatchMode, CancelRequest, CancellationReason, CorrectionLetter, NumberRange, QueryFilter,
    RpsFragment, RpsIdentification,
};
use crate::domain::envelope::{append_unsigned_blocks, strip_prologs};
use crate::domain::errors::NfseError;
use crate::domain::identifiers::LotNumber;
use crate::domain::operations::{Operation, OperationEntry, PreparedRequest, SignaturePlan};
use crate::domain::payload;
use crate::ports::inbound::NfseApi;
use crate::ports::outbound::{
    CanonicalizationFlags, Certificate, DigestAlgorithm, RpsDocument, SchemaValidator,
    SignatureRequest, Signer, Transport,
};

/// Apply every step of `plan` to `document`, innermost first.
///
/// The output of each signer call is fed unchanged into the next one.
///
/// # Errors
/// * `NfseError::SigningFailed` - the signer rejected a step; later steps are
///   not attempted
pub fn apply_signature_plan<S: Signer + ?Sized>(
    signer: &S,
    certificate: &Certificate,
    plan: SignaturePlan<'_>,
    document: String,
) -> Result<String, NfseError> {
    plan.steps().iter().try_fold(document, |document, step| {
        debug!(
            target_element = step.target,
            id_attribute = step.id_attribute,
            wrapper = step.wrapper.unwrap_or("<root>"),
            "Applying signature"
        );
        let request = SignatureRequest {
            target: step.target,
            id_attribute: step.id_attribute,
            algorithm: DigestAlgorithm::Sha1,
            canonicalization: CanonicalizationFlags::LEGACY,
            wrapper: step.wrapper,
        };
        signer
            .sign(certificate, &document, &request)
            .map_err(|e| NfseError::SigningFailed {
                target: step.target.to_string(),
                reason: e.to_string(),
            })
    })
}

/// NFSe client service.
///
/// Configuration and certificate are immutable and shared; the service holds
/// no other state, so concurrent calls are independent.
pub struct NfseService<S: Signer, V: SchemaValidator, T: Transport> {
    config: Arc<ClientConfig>,
    certificate: Arc<Certificate>,
    signer: S,
    validator: V,
    transport: T,
}

impl<S: Signer, V: SchemaValidator, T: Transport> NfseService<S, V, T> {
    /// Create a new NFSe client service.
    ///
    /// # Arguments
    /// * `config` - Provider identity and schema settings
    /// * `certificate` - Key material handed to every signer call
    /// * `signer` - Enveloped XML signature collaborator
    /// * `validator` - XSD validation collaborator
    /// * `transport` - Delivery collaborator
    pub fn new(
        config: Arc<ClientConfig>,
        certificate: Arc<Certificate>,
        signer: S,
        validator: V,
        transport: T,
    ) -> Self {
        Self {
            config,
            certificate,
            signer,
            validator,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run `body` inside the per-call span and log its outcome.
    fn traced<F>(&self, operation: Operation, body: F) -> Result<String, NfseError>
    where
        F: FnOnce() -> Result<String, NfseError>,
    {
        let span = info_span!("nfse_operation", operation = operation.name());
        let _guard = span.enter();

        let result = body();
        match &result {
            Ok(response) => info!(response_len = response.len(), "Operation completed"),
            Err(e) => warn!(error = %e, "Operation aborted"),
        }
        result
    }

    fn render(&self, document: &mut dyn RpsDocument) -> RpsFragment {
        document.configure(&self.config.provider);
        RpsFragment::new(document.render())
    }

    /// Signature plan followed by the post-signing blocks. Prologs are removed.
    fn sign_request(&self, prepared: &PreparedRequest) -> Result<String, NfseError> {
        let entry = prepared.entry();
        let signed = apply_signature_plan(
            &self.signer,
            &self.certificate,
            entry.plan,
            prepared.body.to_xml(),
        )?;
        append_unsigned_blocks(prepared, strip_prologs(&signed))
    }

    /// Strip prologs and run the schema gate. Every dispatched document passes it.
    fn finalize(&self, document: &str) -> Result<String, NfseError> {
        let document = strip_prologs(document);
        let schema = self.config.schema_path();
        self.validator.validate(&document, &schema).map_err(|e| {
            error!(schema = %schema.display(), error = %e, "Schema validation failed");
            NfseError::SchemaValidationFailed {
                schema: schema.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(document)
    }

    fn send(&self, document: &str, entry: &OperationEntry) -> Result<String, NfseError> {
        debug!(bytes = document.len(), "Dispatching request");
        self.transport
            .send(document, entry.name)
            .map_err(|e| NfseError::TransportFailure {
                operation: entry.name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Full pipeline for a prepared request.
    fn dispatch(&self, prepared: PreparedRequest) -> Result<String, NfseError> {
        let entry = prepared.entry();
        let signed = self.sign_request(&prepared)?;
        let document = self.finalize(&signed)?;
        self.send(&document, entry)
    }

    fn send_lot(
        &self,
        mode: BatchMode,
        lot: &LotNumber,
        documents: &mut [Box<dyn RpsDocument>],
    ) -> Result<String, NfseError> {
        self.traced(lot_operation(mode), || {
            check_lot_size(&self.config, mode, documents.len()).inspect_err(|e| {
                warn!(lot = %lot, error = %e, "Lot rejected before signing");
            })?;

            let fragments: Vec<RpsFragment> = documents
                .iter_mut()
                .map(|document| self.render(&mut **document))
                .collect();
            debug!(lot = %lot, rps = fragments.len(), %mode, "Lot assembled");

            self.dispatch(assemble_lot(&self.config, mode, lot, &fragments)?)
        })
    }

    fn current_year() -> u32 {
        chrono::Local::now().year().unsigned_abs()
    }
}

impl<S: Signer, V: SchemaValidator, T: Transport> NfseApi for NfseService<S, V, T> {
    fn cancel_nfse(&self, request: &CancelRequest) -> Result<String, NfseError> {
        self.traced(Operation::CancelarNfse, || {
            let year = request.year.unwrap_or_else(Self::current_year);
            self.dispatch(payload::cancel(&self.config, request, year)?)
        })
    }

    fn substitute_nfse(
        &self,
        number: u64,
        replacement: &mut dyn RpsDocument,
        reason: CancellationReason,
    ) -> Result<String, NfseError> {
        self.traced(Operation::SubstituirNfse, || {
            let fragment = self.render(replacement);
            self.dispatch(payload::substitute(&self.config, number, reason, &fragment)?)
        })
    }

    fn query_lot(&self, protocol: &str) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarLoteRps, || {
            self.dispatch(payload::query_lot(&self.config, protocol))
        })
    }

    fn query_lot_status(&self, protocol: &str) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarSituacaoLoteRps, || {
            self.dispatch(payload::query_lot_status(&self.config, protocol))
        })
    }

    fn query_services_provided(&self, filter: &QueryFilter) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarNfseServicoPrestado, || {
            self.dispatch(payload::query_services_provided(&self.config, filter))
        })
    }

    fn query_services_taken(&self, filter: &QueryFilter) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarNfseServicoTomado, || {
            self.dispatch(payload::query_services_taken(&self.config, filter))
        })
    }

    fn query_range(&self, range: &NumberRange) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarNfseFaixa, || {
            self.dispatch(payload::query_range(&self.config, range)?)
        })
    }

    fn query_by_rps(&self, rps: &RpsIdentification) -> Result<String, NfseError> {
        self.traced(Operation::ConsultarNfsePorRps, || {
            self.dispatch(payload::query_by_rps(&self.config, rps))
        })
    }

    fn send_lot_sync(
        &self,
        lot: &LotNumber,
        documents: &mut [Box<dyn RpsDocument>],
    ) -> Result<String, NfseError> {
        self.send_lot(BatchMode::Synchronous, lot, documents)
    }

    fn send_lot_async(
        &self,
        lot: &LotNumber,
        documents: &mut [Box<dyn RpsDocument>],
    ) -> Result<String, NfseError> {
        self.send_lot(BatchMode::Asynchronous, lot, documents)
    }

    fn sign_generate_request(&self, document: &mut dyn RpsDocument) -> Result<String, NfseError> {
        self.traced(Operation::GerarNfse, || {
            let fragment = self.render(document);
            let prepared = payload::generate(&self.config, &fragment)?;
            self.sign_request(&prepared)
        })
    }

    fn generate_from_signed(&self, signed: &str) -> Result<String, NfseError> {
        self.traced(Operation::GerarNfse, || {
            let entry = Operation::GerarNfse.entry();
            let document = self.finalize(signed)?;
            self.send(&document, entry)
        })
    }

    fn generate_nfse(&self, document: &mut dyn RpsDocument) -> Result<String, NfseError> {
        let signed = self.sign_generate_request(document)?;
        self.generate_from_signed(&signed)
    }

    fn send_correction_letter(&self, letter: &CorrectionLetter) -> Result<String, NfseError> {
        self.traced(Operation::CartaCorrecaoNfse, || {
            self.dispatch(payload::correction_letter(&self.config, letter))
        })
    }
}
