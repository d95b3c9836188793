//! # End-to-End Pipeline Tests
//!
//! Drives `NfseService` through the public API with recording collaborators.
//!
//! ## Test Categories
//!
//! 1. **Lots** - Size ceilings enforced before any rendering or signing
//! 2. **Signature Plans** - Call order as observed by the signer
//! 3. **Schema Gate** - Nothing reaches the transport on validation failure
//! 4. **Envelope Layout** - Post-signing blocks, prologs, identifiers

use std::path::Path;
use std::sync::{Arc, Mutex};

use nfse_publica::domain::xml::insert_before_root_end;
use nfse_publica::{
    apply_signature_plan, CancelRequest, CancellationReason, Certificate, ClientConfig,
    CorrectionLetter, CorrectionTaker, DateRange, LotNumber, NfseApi, NfseError, NfseService,
    NumberRange, Operation, ProviderIdentity, QueryFilter, RpsDocument, RpsIdentification,
    SchemaValidator, SignatureRequest, SignatureStep, SignaturePlan, Signer, SignerError, TaxId,
    Transport, TransportError, ValidationError,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

type Log<T> = Arc<Mutex<Vec<T>>>;

/// Records (target, id attribute, wrapper) and appends a marker signature.
#[derive(Clone, Default)]
struct RecordingSigner {
    calls: Log<(String, String, Option<String>)>,
}

impl Signer for RecordingSigner {
    fn sign(
        &self,
        certificate: &Certificate,
        document: &str,
        request: &SignatureRequest<'_>,
    ) -> Result<String, SignerError> {
        if certificate.is_empty() {
            return Err(SignerError::InvalidCertificate("empty".to_string()));
        }
        self.calls.lock().unwrap().push((
            request.target.to_string(),
            request.id_attribute.to_string(),
            request.wrapper.map(str::to_string),
        ));
        let body = document.replace("<?xml version=\"1.0\" encoding=\"UTF-8\"?>", "");
        let marker = format!("<Signature ref=\"{}\"></Signature>", request.target);
        let signed = insert_before_root_end(&body, &marker)
            .map_err(|e| SignerError::Other(e.to_string()))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{signed}"))
    }
}

#[derive(Clone, Default)]
struct RecordingValidator {
    documents: Log<String>,
    reject: bool,
}

impl SchemaValidator for RecordingValidator {
    fn validate(&self, document: &str, _schema_path: &Path) -> Result<(), ValidationError> {
        self.documents.lock().unwrap().push(document.to_string());
        if self.reject {
            Err(ValidationError::Invalid("cvc-complex-type.2.4.a".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Log<(String, String)>,
    fail: bool,
}

impl Transport for RecordingTransport {
    fn send(&self, document: &str, operation: &str) -> Result<String, TransportError> {
        if self.fail {
            return Err(TransportError::Connection("timed out".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((document.to_string(), operation.to_string()));
        Ok(format!("<{operation}Resposta/>"))
    }
}

/// RPS that renders with whatever provider it was configured with.
struct TestRps {
    id: String,
    provider: Option<ProviderIdentity>,
    renders: Arc<Mutex<usize>>,
}

impl TestRps {
    fn boxed(id: &str, renders: &Arc<Mutex<usize>>) -> Box<dyn RpsDocument> {
        Box::new(Self {
            id: id.to_string(),
            provider: None,
            renders: Arc::clone(renders),
        })
    }
}

impl RpsDocument for TestRps {
    fn configure(&mut self, provider: &ProviderIdentity) {
        self.provider = Some(provider.clone());
    }

    fn render(&self) -> String {
        *self.renders.lock().unwrap() += 1;
        let tax_id = self
            .provider
            .as_ref()
            .map(|p| p.tax_id.value().to_string())
            .unwrap_or_default();
        format!(
            "<Rps><InfRps id=\"{}\"><Prestador><Cnpj>{}</Cnpj></Prestador></InfRps></Rps>",
            self.id, tax_id
        )
    }
}

struct Harness {
    service: NfseService<RecordingSigner, RecordingValidator, RecordingTransport>,
    signer: RecordingSigner,
    validator: RecordingValidator,
    transport: RecordingTransport,
}

fn provider() -> ProviderIdentity {
    ProviderIdentity {
        tax_id: TaxId::Cnpj("11222333000181".to_string()),
        municipal_registration: "98765".to_string(),
        municipality_code: "4205407".to_string(),
    }
}

fn harness_with(validator: RecordingValidator, transport: RecordingTransport) -> Harness {
    let signer = RecordingSigner::default();
    let service = NfseService::new(
        Arc::new(ClientConfig::new(provider())),
        Arc::new(Certificate::new(vec![0x30, 0x82, 0x01])),
        signer.clone(),
        validator.clone(),
        transport.clone(),
    );
    Harness {
        service,
        signer,
        validator,
        transport,
    }
}

fn harness() -> Harness {
    harness_with(RecordingValidator::default(), RecordingTransport::default())
}

impl Harness {
    fn signed_targets(&self) -> Vec<String> {
        self.signer
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _, _)| target.clone())
            .collect()
    }

    fn last_sent(&self) -> (String, String) {
        self.transport
            .sent
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing was sent")
    }
}

// =============================================================================
// LOTS
// =============================================================================

#[test]
fn test_sync_lot_of_three_fails_before_signing() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut lot: Vec<_> = (0..3).map(|i| TestRps::boxed(&format!("r{i}"), &renders)).collect();

    let result = h.service.send_lot_sync(&LotNumber::from(1_u64), &mut lot);

    assert!(matches!(
        result,
        Err(NfseError::BatchLimitExceeded {
            limit: 2,
            actual: 3,
            ..
        })
    ));
    assert_eq!(*renders.lock().unwrap(), 0);
    assert!(h.signer.calls.lock().unwrap().is_empty());
    assert!(h.transport.sent.lock().unwrap().is_empty());
}

#[test]
fn test_sync_lot_within_limit() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut lot = vec![TestRps::boxed("r1", &renders), TestRps::boxed("r2", &renders)];

    let response = h
        .service
        .send_lot_sync(&LotNumber::from(15_u64), &mut lot)
        .unwrap();

    assert_eq!(response, "<RecepcionarLoteRpsSincronoResposta/>");
    let (document, operation) = h.last_sent();
    assert_eq!(operation, "RecepcionarLoteRpsSincrono");
    assert!(document.contains("<QuantidadeRps>2</QuantidadeRps>"));
    assert!(document.contains("<LoteRps Id=\"lote15\" versao=\"3\">"));
    // documents were configured with the provider before rendering
    assert!(document.contains("<Prestador><Cnpj>11222333000181</Cnpj></Prestador>"));
    assert!(!document.contains("<?xml"));
    assert_eq!(
        *h.signer.calls.lock().unwrap(),
        [(
            "InfDeclaracaoPrestacaoServico".to_string(),
            "Id".to_string(),
            Some("Rps".to_string())
        )]
    );
}

#[test]
fn test_async_lot_signs_rps_then_lot() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut lot: Vec<_> = (0..5).map(|i| TestRps::boxed(&format!("r{i}"), &renders)).collect();

    h.service
        .send_lot_async(&LotNumber::from("900"), &mut lot)
        .unwrap();

    assert_eq!(h.signed_targets(), ["InfRps", "LoteRps"]);
    let (document, operation) = h.last_sent();
    assert_eq!(operation, "RecepcionarLoteRps");
    assert!(document.contains("<QuantidadeRps>5</QuantidadeRps>"));
    assert!(document.contains("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""));
    // only the synchronous lot carries an Id
    assert!(document.contains("<LoteRps versao=\"3\">"));
    assert!(!document.contains("lote900"));
    assert_eq!(*renders.lock().unwrap(), 5);
}

#[test]
fn test_async_lot_over_ceiling() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut lot: Vec<_> = (0..51).map(|i| TestRps::boxed(&format!("r{i}"), &renders)).collect();

    let result = h.service.send_lot_async(&LotNumber::from(2_u64), &mut lot);

    assert!(matches!(
        result,
        Err(NfseError::BatchLimitExceeded {
            limit: 50,
            actual: 51,
            ..
        })
    ));
    assert_eq!(*renders.lock().unwrap(), 0);
}

// =============================================================================
// SIGNATURE PLANS
// =============================================================================

#[test]
fn test_substitution_signs_three_levels_in_order() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut replacement = TestRps::boxed("novo", &renders);

    h.service
        .substitute_nfse(77, &mut *replacement, CancellationReason::DuplicateIssuance)
        .unwrap();

    let calls = h.signer.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        [
            ("InfRps".to_string(), "id".to_string(), Some("Rps".to_string())),
            (
                "InfPedidoCancelamento".to_string(),
                "Id".to_string(),
                Some("Pedido".to_string())
            ),
            (
                "SubstituicaoNfse".to_string(),
                "Id".to_string(),
                Some("SubstituirNfseEnvio".to_string())
            ),
        ]
    );
    let (document, _) = h.last_sent();
    assert!(document.contains("<Numero>000000000000077</Numero>"));
    assert!(document.contains("<CodigoCancelamento>4</CodigoCancelamento>"));
}

#[test]
fn test_swapped_plan_is_observably_different() {
    const FORWARD: &[SignatureStep] = &[
        SignatureStep::new("InfRps", "id", Some("Rps")),
        SignatureStep::new("InfPedidoCancelamento", "id", Some("Pedido")),
        SignatureStep::new("SubstituicaoNfse", "id", Some("SubstituirNfseEnvio")),
    ];
    const SWAPPED: &[SignatureStep] = &[
        SignatureStep::new("InfPedidoCancelamento", "id", Some("Pedido")),
        SignatureStep::new("InfRps", "id", Some("Rps")),
        SignatureStep::new("SubstituicaoNfse", "id", Some("SubstituirNfseEnvio")),
    ];
    let document = "<SubstituirNfseEnvio><SubstituicaoNfse><Pedido><InfPedidoCancelamento/></Pedido><Rps><InfRps/></Rps></SubstituicaoNfse></SubstituirNfseEnvio>";
    let certificate = Certificate::new(vec![1]);

    let forward = RecordingSigner::default();
    apply_signature_plan(
        &forward,
        &certificate,
        SignaturePlan::new(FORWARD),
        document.to_string(),
    )
    .unwrap();
    let swapped = RecordingSigner::default();
    apply_signature_plan(
        &swapped,
        &certificate,
        SignaturePlan::new(SWAPPED),
        document.to_string(),
    )
    .unwrap();

    let forward_calls = forward.calls.lock().unwrap().clone();
    let swapped_calls = swapped.calls.lock().unwrap().clone();
    assert_eq!(forward_calls.len(), 3);
    assert_eq!(swapped_calls.len(), 3);
    assert_ne!(forward_calls, swapped_calls);
}

#[test]
fn test_signing_failure_aborts_pipeline() {
    let signer = RecordingSigner::default();
    let transport = RecordingTransport::default();
    let service = NfseService::new(
        Arc::new(ClientConfig::new(provider())),
        Arc::new(Certificate::new(Vec::new())),
        signer,
        RecordingValidator::default(),
        transport.clone(),
    );

    let result = service.query_lot("123");

    assert!(matches!(
        result,
        Err(NfseError::SigningFailed { ref target, .. }) if target == "Prestador"
    ));
    assert!(transport.sent.lock().unwrap().is_empty());
}

// =============================================================================
// SCHEMA GATE
// =============================================================================

#[test]
fn test_validation_failure_means_no_transport_call() {
    let h = harness_with(
        RecordingValidator {
            reject: true,
            ..Default::default()
        },
        RecordingTransport::default(),
    );

    let result = h
        .service
        .cancel_nfse(&CancelRequest::new(1, CancellationReason::IssuanceError, "x"));

    match result {
        Err(NfseError::SchemaValidationFailed { schema, reason }) => {
            assert!(schema.ends_with("schema_nfse_v03.xsd"));
            assert!(reason.contains("cvc-complex-type"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(h.validator.documents.lock().unwrap().len(), 1);
    assert!(h.transport.sent.lock().unwrap().is_empty());
}

#[test]
fn test_validator_never_sees_prologs() {
    let h = harness();

    h.service
        .query_range(&NumberRange {
            year: 2024,
            first: 10,
            last: 12,
        })
        .unwrap();

    let documents = h.validator.documents.lock().unwrap();
    assert!(!documents[0].contains("<?xml"));
}

#[test]
fn test_transport_failure_is_reported() {
    let h = harness_with(
        RecordingValidator::default(),
        RecordingTransport {
            fail: true,
            ..Default::default()
        },
    );

    let result = h.service.query_lot_status("55");

    assert!(matches!(
        result,
        Err(NfseError::TransportFailure { ref operation, .. }) if operation == "ConsultarSituacaoLoteRps"
    ));
}

// =============================================================================
// ENVELOPE LAYOUT
// =============================================================================

#[test]
fn test_cancel_identifier_scenario() {
    let h = harness();

    h.service
        .cancel_nfse(
            &CancelRequest::new(123, CancellationReason::IssuanceError, "Erro na emissao")
                .with_year(2024),
        )
        .unwrap();

    let (document, operation) = h.last_sent();
    assert_eq!(operation, "CancelarNfse");
    assert!(document.contains("<Numero>202400000000123</Numero>"));
    assert!(document.contains("<CodigoCancelamento>1</CodigoCancelamento>"));
}

#[test]
fn test_cancel_defaults_to_current_year() {
    use chrono::Datelike;

    let h = harness();
    h.service
        .cancel_nfse(&CancelRequest::new(5, CancellationReason::IssuanceError, "x"))
        .unwrap();

    let year = chrono::Local::now().year();
    let (document, _) = h.last_sent();
    assert!(document.contains(&format!("<Numero>{year:04}00000000005</Numero>")));
}

#[test]
fn test_protocol_lands_after_provider_signature() {
    let h = harness();

    h.service.query_lot("2024-0001").unwrap();

    let (document, operation) = h.last_sent();
    assert_eq!(operation, "ConsultarLoteRps");
    let signature = document.find("<Signature ref=\"Prestador\">").unwrap();
    let protocol = document.find("<Protocolo>2024-0001</Protocolo>").unwrap();
    let root_end = document.find("</ConsultarLoteRpsEnvio>").unwrap();
    assert!(signature < protocol);
    assert!(protocol < root_end);
}

#[test]
fn test_range_query_appends_faixa() {
    let h = harness();

    h.service
        .query_range(&NumberRange {
            year: 2023,
            first: 1,
            last: 99,
        })
        .unwrap();

    let (document, _) = h.last_sent();
    assert!(document.ends_with(
        "<Faixa><NumeroNfseInicial>202300000000001</NumeroNfseInicial><NumeroNfseFinal>202300000000099</NumeroNfseFinal></Faixa></ConsultarNfseFaixaEnvio>"
    ));
}

#[test]
fn test_provided_services_emission_wins() {
    let h = harness();
    let filter = QueryFilter {
        emission: Some(DateRange::new("2024-03-01", "2024-03-31")),
        competence: Some(DateRange::new("2024-02-01", "2024-02-29")),
        ..Default::default()
    };

    h.service.query_services_provided(&filter).unwrap();

    let (document, operation) = h.last_sent();
    assert_eq!(operation, "ConsultarNfseServicoPrestado");
    assert!(document.contains("<PeriodoEmissao><DataInicial>2024-03-01</DataInicial>"));
    assert!(!document.contains("PeriodoCompetencia"));
    assert!(document.contains("<Pagina>1</Pagina>"));
    assert!(h.signer.calls.lock().unwrap().is_empty());
}

#[test]
fn test_query_by_rps_signs_provider() {
    let h = harness();

    h.service
        .query_by_rps(&RpsIdentification {
            number: "31".to_string(),
            series: "NF".to_string(),
            rps_type: 1,
        })
        .unwrap();

    assert_eq!(h.signed_targets(), ["Prestador"]);
    assert_eq!(h.last_sent().1, Operation::ConsultarNfsePorRps.name());
}

#[test]
fn test_correction_letter_uses_envio_name() {
    let h = harness();
    let letter = CorrectionLetter {
        number: "202400000000010".to_string(),
        taker: CorrectionTaker {
            cnpj: "99888777000166".to_string(),
            corporate_name: "Cliente Ltda".to_string(),
            email: "fiscal@cliente.com.br".to_string(),
            ..Default::default()
        },
        description: "Descricao corrigida".to_string(),
    };

    h.service.send_correction_letter(&letter).unwrap();

    let (document, operation) = h.last_sent();
    assert_eq!(operation, "CartaCorrecaoNfseEnvio");
    assert!(document.contains("<Email>fiscal@cliente.com.br</Email>"));
    assert_eq!(h.signed_targets(), ["InfPedidoCartaCorrecao"]);
}

#[test]
fn test_generate_nfse_round_trip() {
    let h = harness();
    let renders = Arc::new(Mutex::new(0));
    let mut rps = TestRps::boxed("g1", &renders);

    let response = h.service.generate_nfse(&mut *rps).unwrap();

    assert_eq!(response, "<GerarNfseResposta/>");
    assert_eq!(h.signed_targets(), ["InfRps"]);
    let (document, _) = h.last_sent();
    assert!(document.starts_with("<GerarNfseEnvio xmlns=\"http://www.publica.inf.br\"><Rps>"));
}
