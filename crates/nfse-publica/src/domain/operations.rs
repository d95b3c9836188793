//! # Operation Table
//!
//! Static description of every remote operation: its public name and the
//! ordered signature plan.
//!
//! The dispatcher only looks entries up here. Every behavioral difference
//! between operations lives in these entries and in the payload builders,
//! never in dispatch code.

use std::fmt;

use super::xml::XmlElement;

// =============================================================================
// Signature plans
// =============================================================================

/// One enveloped signature to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureStep {
    /// Element whose content is signed
    pub target: &'static str,
    /// Attribute carrying the reference id on `target`
    pub id_attribute: &'static str,
    /// Element that receives the `Signature` node; `None` means the document root
    pub wrapper: Option<&'static str>,
}

impl SignatureStep {
    pub const fn new(
        target: &'static str,
        id_attribute: &'static str,
        wrapper: Option<&'static str>,
    ) -> Self {
        Self {
            target,
            id_attribute,
            wrapper,
        }
    }
}

/// Ordered list of signatures, innermost element first.
///
/// Each later step signs content that already embeds the earlier
/// signatures, so the order is part of the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignaturePlan<'a> {
    steps: &'a [SignatureStep],
}

impl<'a> SignaturePlan<'a> {
    pub const EMPTY: SignaturePlan<'static> = SignaturePlan { steps: &[] };

    pub const fn new(steps: &'a [SignatureStep]) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &'a [SignatureStep] {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

const PRESTADOR: &[SignatureStep] = &[SignatureStep::new("Prestador", "id", None)];
const INF_RPS: SignatureStep = SignatureStep::new("InfRps", "id", Some("Rps"));
const GERAR: &[SignatureStep] = &[INF_RPS];
const CANCELAR: &[SignatureStep] = &[SignatureStep::new(
    "InfPedidoCancelamento",
    "id",
    Some("Pedido"),
)];
const SUBSTITUIR: &[SignatureStep] = &[
    INF_RPS,
    SignatureStep::new("InfPedidoCancelamento", "Id", Some("Pedido")),
    SignatureStep::new("SubstituicaoNfse", "Id", Some("SubstituirNfseEnvio")),
];
const LOTE_SINCRONO: &[SignatureStep] = &[SignatureStep::new(
    "InfDeclaracaoPrestacaoServico",
    "Id",
    Some("Rps"),
)];
const LOTE: &[SignatureStep] = &[
    INF_RPS,
    SignatureStep::new("LoteRps", "Id", Some("EnviarLoteRpsEnvio")),
];
const CARTA_CORRECAO: &[SignatureStep] = &[SignatureStep::new(
    "InfPedidoCartaCorrecao",
    "id",
    Some("Pedido"),
)];

// =============================================================================
// Operations
// =============================================================================

/// Remote operations offered by the web service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CancelarNfse,
    SubstituirNfse,
    ConsultarLoteRps,
    ConsultarNfseServicoPrestado,
    ConsultarNfseServicoTomado,
    ConsultarNfseFaixa,
    ConsultarNfsePorRps,
    RecepcionarLoteRpsSincrono,
    RecepcionarLoteRps,
    GerarNfse,
    CartaCorrecaoNfse,
    ConsultarSituacaoLoteRps,
}

/// Table entry for one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationEntry {
    pub operation: Operation,
    /// Name passed to the transport
    pub name: &'static str,
    pub plan: SignaturePlan<'static>,
}

/// Every operation, in declaration order.
pub static OPERATIONS: [OperationEntry; 12] = [
    OperationEntry {
        operation: Operation::CancelarNfse,
        name: "CancelarNfse",
        plan: SignaturePlan::new(CANCELAR),
    },
    OperationEntry {
        operation: Operation::SubstituirNfse,
        name: "SubstituirNfse",
        plan: SignaturePlan::new(SUBSTITUIR),
    },
    OperationEntry {
        operation: Operation::ConsultarLoteRps,
        name: "ConsultarLoteRps",
        plan: SignaturePlan::new(PRESTADOR),
    },
    OperationEntry {
        operation: Operation::ConsultarNfseServicoPrestado,
        name: "ConsultarNfseServicoPrestado",
        plan: SignaturePlan::EMPTY,
    },
    OperationEntry {
        operation: Operation::ConsultarNfseServicoTomado,
        name: "ConsultarNfseServicoTomado",
        plan: SignaturePlan::EMPTY,
    },
    OperationEntry {
        operation: Operation::ConsultarNfseFaixa,
        name: "ConsultarNfseFaixa",
        plan: SignaturePlan::new(PRESTADOR),
    },
    OperationEntry {
        operation: Operation::ConsultarNfsePorRps,
        name: "ConsultarNfsePorRps",
        plan: SignaturePlan::new(PRESTADOR),
    },
    OperationEntry {
        operation: Operation::RecepcionarLoteRpsSincrono,
        name: "RecepcionarLoteRpsSincrono",
        plan: SignaturePlan::new(LOTE_SINCRONO),
    },
    OperationEntry {
        operation: Operation::RecepcionarLoteRps,
        name: "RecepcionarLoteRps",
        plan: SignaturePlan::new(LOTE),
    },
    OperationEntry {
        operation: Operation::GerarNfse,
        name: "GerarNfse",
        plan: SignaturePlan::new(GERAR),
    },
    OperationEntry {
        operation: Operation::CartaCorrecaoNfse,
        name: "CartaCorrecaoNfseEnvio",
        plan: SignaturePlan::new(CARTA_CORRECAO),
    },
    OperationEntry {
        operation: Operation::ConsultarSituacaoLoteRps,
        name: "ConsultarSituacaoLoteRps",
        plan: SignaturePlan::new(PRESTADOR),
    },
];

impl Operation {
    /// Table entry of this operation.
    pub fn entry(self) -> &'static OperationEntry {
        &OPERATIONS[self.index()]
    }

    /// Transport-level operation name.
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Look an operation up by its transport name.
    pub fn from_name(name: &str) -> Option<Operation> {
        OPERATIONS
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.operation)
    }

    fn index(self) -> usize {
        match self {
            Operation::CancelarNfse => 0,
            Operation::SubstituirNfse => 1,
            Operation::ConsultarLoteRps => 2,
            Operation::ConsultarNfseServicoPrestado => 3,
            Operation::ConsultarNfseServicoTomado => 4,
            Operation::ConsultarNfseFaixa => 5,
            Operation::ConsultarNfsePorRps => 6,
            Operation::RecepcionarLoteRpsSincrono => 7,
            Operation::RecepcionarLoteRps => 8,
            Operation::GerarNfse => 9,
            Operation::CartaCorrecaoNfse => 10,
            Operation::ConsultarSituacaoLoteRps => 11,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Prepared requests
// =============================================================================

/// Output of a payload builder, ready for the signing stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
    pub operation: Operation,
    /// Document handed to the first signature step
    pub body: XmlElement,
    /// Blocks inserted before the root end tag once every signature is applied
    pub appended: Vec<XmlElement>,
}

impl PreparedRequest {
    pub fn new(operation: Operation, body: XmlElement) -> Self {
        Self {
            operation,
            body,
            appended: Vec::new(),
        }
    }

    pub fn append_after_signing(mut self, element: XmlElement) -> Self {
        self.appended.push(element);
        self
    }

    pub fn entry(&self) -> &'static OperationEntry {
        self.operation.entry()
    }
}
