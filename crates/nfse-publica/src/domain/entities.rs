//! # Domain Entities
//!
//! Parameter objects for every operation. All of them are built fresh per
//! call; none outlive the request they describe.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Parties
// =============================================================================

/// Tax identifier of a party. CNPJ and CPF are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxId {
    /// Company registry number (14 digits)
    Cnpj(String),
    /// Individual taxpayer number (11 digits)
    Cpf(String),
}

impl TaxId {
    /// Schema element that carries this identifier.
    pub fn element_name(&self) -> &'static str {
        match self {
            TaxId::Cnpj(_) => "Cnpj",
            TaxId::Cpf(_) => "Cpf",
        }
    }

    /// The raw identifier digits.
    pub fn value(&self) -> &str {
        match self {
            TaxId::Cnpj(v) | TaxId::Cpf(v) => v,
        }
    }
}

/// Identity of the service provider issuing requests.
///
/// Loaded once from configuration and shared by every operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// CNPJ or CPF of the provider
    pub tax_id: TaxId,
    /// Municipal registration (`InscricaoMunicipal`)
    pub municipal_registration: String,
    /// IBGE municipality code (`CodigoMunicipio`)
    pub municipality_code: String,
}

/// A third party referenced by a query filter (taker, provider or intermediary).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartyIdentity {
    pub tax_id: TaxId,
    pub municipal_registration: Option<String>,
}

impl PartyIdentity {
    pub fn new(tax_id: TaxId) -> Self {
        Self {
            tax_id,
            municipal_registration: None,
        }
    }

    pub fn with_municipal_registration(mut self, registration: impl Into<String>) -> Self {
        self.municipal_registration = Some(registration.into());
        self
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Reason code accepted by the cancellation and substitution operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CancellationReason {
    /// Error in the issuance (code 1)
    #[default]
    IssuanceError,
    /// Service was not completed (code 2)
    ServiceNotCompleted,
    /// Invoice issued twice (code 4)
    DuplicateIssuance,
}

impl CancellationReason {
    /// Numeric code placed in `CodigoCancelamento`.
    pub fn code(self) -> u8 {
        match self {
            CancellationReason::IssuanceError => 1,
            CancellationReason::ServiceNotCompleted => 2,
            CancellationReason::DuplicateIssuance => 4,
        }
    }

    /// Parse a numeric code. Codes outside {1, 2, 4} are rejected.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CancellationReason::IssuanceError),
            2 => Some(CancellationReason::ServiceNotCompleted),
            4 => Some(CancellationReason::DuplicateIssuance),
            _ => None,
        }
    }
}

/// Parameters of the `CancelarNfse` operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelRequest {
    /// Sequence part of the invoice number
    pub number: u64,
    pub reason: CancellationReason,
    /// Value of the `id` attribute on `InfPedidoCancelamento`; defaults to `number`
    pub id: Option<String>,
    /// Free-text motive (`MotivoCancelamento`)
    pub motive: String,
    /// Year part of the invoice number; defaults to the current year
    pub year: Option<u32>,
}

impl CancelRequest {
    pub fn new(number: u64, reason: CancellationReason, motive: impl Into<String>) -> Self {
        Self {
            number,
            reason,
            id: None,
            motive: motive.into(),
            year: None,
        }
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Inclusive date interval. Dates are passed through verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// A range only counts when both ends are filled in.
    pub fn is_complete(&self) -> bool {
        !self.start.is_empty() && !self.end.is_empty()
    }
}

/// The single period block a query may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period<'a> {
    Emission(&'a DateRange),
    Competence(&'a DateRange),
}

/// Filter shared by the provided-services and taken-services queries.
///
/// `counterparty` is rendered as `Tomador` in the provided-services query and
/// as `Prestador` in the taken-services query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub number: Option<String>,
    pub emission: Option<DateRange>,
    pub competence: Option<DateRange>,
    pub counterparty: Option<PartyIdentity>,
    pub intermediary: Option<PartyIdentity>,
    /// Result page; 1 when unset
    pub page: Option<u32>,
}

impl QueryFilter {
    pub const DEFAULT_PAGE: u32 = 1;

    /// Resolve the period block to emit.
    ///
    /// An emission range wins over a competence range; the competence range is
    /// then dropped entirely.
    pub fn period(&self) -> Option<Period<'_>> {
        match (&self.emission, &self.competence) {
            (Some(emission), _) if emission.is_complete() => Some(Period::Emission(emission)),
            (_, Some(competence)) if competence.is_complete() => {
                Some(Period::Competence(competence))
            }
            _ => None,
        }
    }

    pub fn page(&self) -> u32 {
        match self.page {
            Some(page) if page > 0 => page,
            _ => Self::DEFAULT_PAGE,
        }
    }
}

/// Invoice number interval of the `ConsultarNfseFaixa` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumberRange {
    pub year: u32,
    pub first: u64,
    pub last: u64,
}

/// Key of the `ConsultarNfsePorRps` operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpsIdentification {
    pub number: String,
    pub series: String,
    pub rps_type: u8,
}

// =============================================================================
// Correction letter
// =============================================================================

/// Taker data restated by a correction letter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrectionTaker {
    pub cnpj: String,
    pub corporate_name: String,
    pub street: String,
    pub number: String,
    pub district: String,
    pub postal_code: String,
    pub email: String,
}

/// Parameters of the `CartaCorrecaoNfseEnvio` operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrectionLetter {
    /// Invoice number, passed through verbatim
    pub number: String,
    pub taker: CorrectionTaker,
    /// Corrected service description (`Discriminacao`)
    pub description: String,
}

// =============================================================================
// Lots
// =============================================================================

/// How a lot is submitted. Each mode has its own size ceiling and envelope shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchMode {
    /// `RecepcionarLoteRpsSincrono`, at most two RPS
    Synchronous,
    /// `RecepcionarLoteRps`, configurable ceiling
    Asynchronous,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::Synchronous => f.write_str("synchronous"),
            BatchMode::Asynchronous => f.write_str("asynchronous"),
        }
    }
}

/// One pre-rendered RPS declaration. The pipeline never looks inside it
/// except for the `GerarNfse` relocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpsFragment(String);

impl RpsFragment {
    pub fn new(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
