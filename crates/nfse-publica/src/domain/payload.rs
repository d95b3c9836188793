//! # Payload Builder
//!
//! Builds the element tree of every operation in the exact child order the
//! schema sequence requires.
//!
//! Builders are best-effort: they do not check that mandatory content is
//! present. Compliance is decided later by the schema gate.

use super::config::ClientConfig;
use super::entities::{
    CancelRequest, CancellationReason, CorrectionLetter, NumberRange, PartyIdentity, Period,
    ProviderIdentity, QueryFilter, RpsFragment, RpsIdentification, TaxId,
};
use super::errors::NfseError;
use super::identifiers::{composite_number, substitution_number};
use super::operations::{Operation, PreparedRequest};
use super::xml::{XmlElement, XmlNode};

/// `id` of signed blocks that carry no caller-chosen id.
pub const SIGNED_BLOCK_ID: &str = "assinar";

/// `id` of the cancellation request nested in a substitution.
pub const SUBSTITUTION_CANCEL_ID: &str = "cancel";

/// `id` of the `SubstituicaoNfse` element.
pub const SUBSTITUTION_ID: &str = "subst";

// =============================================================================
// Shared blocks
// =============================================================================

/// `<Cnpj>` or `<Cpf>` depending on the identifier kind.
pub fn tax_id_element(tax_id: &TaxId) -> XmlElement {
    XmlElement::with_text(tax_id.element_name(), tax_id.value())
}

/// Tax identifier wrapped in `<CpfCnpj>`.
pub fn cpf_cnpj(tax_id: &TaxId) -> XmlElement {
    XmlElement::new("CpfCnpj").child(tax_id_element(tax_id))
}

/// How a `Prestador` block is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderBlock<'a> {
    /// Nest the tax id under `<CpfCnpj>`
    pub wrapped: bool,
    /// `id` attribute, set when the block is a signature target
    pub id: Option<&'a str>,
}

impl ProviderBlock<'static> {
    /// Unsigned, wrapped block used by the provided-services query.
    pub const PLAIN: ProviderBlock<'static> = ProviderBlock {
        wrapped: true,
        id: None,
    };

    /// Signed, wrapped block.
    pub const SIGNED: ProviderBlock<'static> = ProviderBlock {
        wrapped: true,
        id: Some(SIGNED_BLOCK_ID),
    };

    /// Signed block with the tax id placed directly under `Prestador`.
    pub const SIGNED_BARE: ProviderBlock<'static> = ProviderBlock {
        wrapped: false,
        id: Some(SIGNED_BLOCK_ID),
    };
}

/// The configured provider as a `Prestador` element.
pub fn provider_element(provider: &ProviderIdentity, block: ProviderBlock<'_>) -> XmlElement {
    let mut element = XmlElement::new("Prestador");
    if let Some(id) = block.id {
        element = element.attr("id", id);
    }
    let tax_id = if block.wrapped {
        cpf_cnpj(&provider.tax_id)
    } else {
        tax_id_element(&provider.tax_id)
    };
    element
        .child(tax_id)
        .text_child("InscricaoMunicipal", provider.municipal_registration.as_str())
}

/// A filter party (`Tomador`, `Prestador`, `Intermediario`, `Consulente`).
fn party_element(name: &str, party: &PartyIdentity) -> XmlElement {
    let registration = party
        .municipal_registration
        .as_deref()
        .filter(|im| !im.is_empty())
        .map(|im| XmlElement::with_text("InscricaoMunicipal", im));
    XmlElement::new(name)
        .child(cpf_cnpj(&party.tax_id))
        .optional_child(registration)
}

fn period_element(period: Period<'_>) -> XmlElement {
    let (name, range) = match period {
        Period::Emission(range) => ("PeriodoEmissao", range),
        Period::Competence(range) => ("PeriodoCompetencia", range),
    };
    XmlElement::new(name)
        .text_child("DataInicial", range.start.as_str())
        .text_child("DataFinal", range.end.as_str())
}

fn root(name: &str, config: &ClientConfig) -> XmlElement {
    XmlElement::new(name).attr("xmlns", config.message_namespace.as_str())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// =============================================================================
// Cancellation and substitution
// =============================================================================

/// `CancelarNfse` request.
///
/// `year` is the resolved year segment; callers default it to the current year.
pub fn cancel(
    config: &ClientConfig,
    request: &CancelRequest,
    year: u32,
) -> Result<PreparedRequest, NfseError> {
    let id = request
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| request.number.to_string());
    let provider = &config.provider;

    let identification = XmlElement::new("IdentificacaoNfse")
        .text_child("Numero", composite_number(year, request.number)?)
        .child(tax_id_element(&provider.tax_id))
        .text_child("InscricaoMunicipal", provider.municipal_registration.as_str())
        .text_child("CodigoMunicipio", provider.municipality_code.as_str());

    let info = XmlElement::new("InfPedidoCancelamento")
        .attr("id", id)
        .child(identification)
        .text_child("CodigoCancelamento", request.reason.code().to_string())
        .text_child("MotivoCancelamento", request.motive.as_str());

    let body = root("CancelarNfseEnvio", config).child(XmlElement::new("Pedido").child(info));
    Ok(PreparedRequest::new(Operation::CancelarNfse, body))
}

/// `SubstituirNfse` request: cancellation of `number` plus the replacement RPS.
///
/// The invoice number uses the 15-digit encoding without a year segment.
pub fn substitute(
    config: &ClientConfig,
    number: u64,
    reason: CancellationReason,
    replacement: &RpsFragment,
) -> Result<PreparedRequest, NfseError> {
    let provider = &config.provider;

    let identification = XmlElement::new("IdentificacaoNfse")
        .text_child("Numero", substitution_number(number)?)
        .child(tax_id_element(&provider.tax_id))
        .text_child("InscricaoMunicipal", provider.municipal_registration.as_str())
        .text_child("CodigoMunicipio", provider.municipality_code.as_str());

    let request = XmlElement::new("Pedido").child(
        XmlElement::new("InfPedidoCancelamento")
            .attr("id", SUBSTITUTION_CANCEL_ID)
            .child(identification)
            .text_child("CodigoCancelamento", reason.code().to_string()),
    );

    let substitution = XmlElement::new("SubstituicaoNfse")
        .attr("id", SUBSTITUTION_ID)
        .child(request)
        .raw(replacement.as_str());

    let body = root("SubstituirNfseEnvio", config).child(substitution);
    Ok(PreparedRequest::new(Operation::SubstituirNfse, body))
}

// =============================================================================
// Queries
// =============================================================================

/// `ConsultarLoteRps`: signed provider block, protocol appended after signing.
pub fn query_lot(config: &ClientConfig, protocol: &str) -> PreparedRequest {
    let body = root("ConsultarLoteRpsEnvio", config)
        .child(provider_element(&config.provider, ProviderBlock::SIGNED_BARE));
    PreparedRequest::new(Operation::ConsultarLoteRps, body)
        .append_after_signing(XmlElement::with_text("Protocolo", protocol))
}

/// `ConsultarSituacaoLoteRps`: same shape as [`query_lot`].
pub fn query_lot_status(config: &ClientConfig, protocol: &str) -> PreparedRequest {
    let body = root("ConsultarSituacaoLoteRpsEnvio", config)
        .child(provider_element(&config.provider, ProviderBlock::SIGNED_BARE));
    PreparedRequest::new(Operation::ConsultarSituacaoLoteRps, body)
        .append_after_signing(XmlElement::with_text("Protocolo", protocol))
}

/// Optional blocks shared by both service queries, in schema order, from
/// `NumeroNfse` up to (excluding) the counterparty.
fn filter_head(filter: &QueryFilter) -> Vec<XmlElement> {
    let mut head = Vec::new();
    if let Some(number) = non_empty(&filter.number) {
        head.push(XmlElement::with_text("NumeroNfse", number));
    }
    if let Some(period) = filter.period() {
        head.push(period_element(period));
    }
    head
}

fn filter_tail(filter: &QueryFilter, counterparty_name: &str) -> Vec<XmlElement> {
    let mut tail = Vec::new();
    if let Some(party) = &filter.counterparty {
        tail.push(party_element(counterparty_name, party));
    }
    if let Some(party) = &filter.intermediary {
        tail.push(party_element("Intermediario", party));
    }
    tail.push(XmlElement::with_text("Pagina", filter.page().to_string()));
    tail
}

fn with_children(mut element: XmlElement, children: Vec<XmlElement>) -> XmlElement {
    for child in children {
        element.push(XmlNode::Element(child));
    }
    element
}

/// `ConsultarNfseServicoPrestado`: invoices issued by the configured provider.
pub fn query_services_provided(config: &ClientConfig, filter: &QueryFilter) -> PreparedRequest {
    let body = root("ConsultarNfseServicoPrestadoEnvio", config)
        .child(provider_element(&config.provider, ProviderBlock::PLAIN));
    let body = with_children(body, filter_head(filter));
    let body = with_children(body, filter_tail(filter, "Tomador"));
    PreparedRequest::new(Operation::ConsultarNfseServicoPrestado, body)
}

/// `ConsultarNfseServicoTomado`: invoices where the configured provider is the taker.
pub fn query_services_taken(config: &ClientConfig, filter: &QueryFilter) -> PreparedRequest {
    let consulting = party_element(
        "Consulente",
        &PartyIdentity::new(config.provider.tax_id.clone())
            .with_municipal_registration(config.provider.municipal_registration.as_str()),
    );
    let body = root("ConsultarNfseServicoTomadoEnvio", config).child(consulting);
    let body = with_children(body, filter_head(filter));
    let body = with_children(body, filter_tail(filter, "Prestador"));
    PreparedRequest::new(Operation::ConsultarNfseServicoTomado, body)
}

/// `ConsultarNfseFaixa`: range block appended after the provider is signed.
pub fn query_range(config: &ClientConfig, range: &NumberRange) -> Result<PreparedRequest, NfseError> {
    let interval = XmlElement::new("Faixa")
        .text_child("NumeroNfseInicial", composite_number(range.year, range.first)?)
        .text_child("NumeroNfseFinal", composite_number(range.year, range.last)?);

    let body = root("ConsultarNfseFaixaEnvio", config)
        .child(provider_element(&config.provider, ProviderBlock::SIGNED));
    Ok(PreparedRequest::new(Operation::ConsultarNfseFaixa, body).append_after_signing(interval))
}

/// `ConsultarNfsePorRps`.
pub fn query_by_rps(config: &ClientConfig, rps: &RpsIdentification) -> PreparedRequest {
    let identification = XmlElement::new("IdentificacaoRps")
        .text_child("Numero", rps.number.as_str())
        .text_child("Serie", rps.series.as_str())
        .text_child("Tipo", rps.rps_type.to_string());

    let body = root("ConsultarNfseRpsEnvio", config)
        .child(identification)
        .child(provider_element(&config.provider, ProviderBlock::SIGNED));
    PreparedRequest::new(Operation::ConsultarNfsePorRps, body)
}

// =============================================================================
// Issuance
// =============================================================================

/// `GerarNfse` request wrapping a single RPS.
///
/// Inside the invoice declaration the `<Rps>` identification node must
/// immediately precede `<Competencia>`; renderers emit it elsewhere, so it is
/// moved here on the parsed tree.
pub fn generate(config: &ClientConfig, rps: &RpsFragment) -> Result<PreparedRequest, NfseError> {
    let declaration = relocate_rps_identification(rps)?;
    let mut body = root("GerarNfseEnvio", config);
    body.push(declaration);
    Ok(PreparedRequest::new(Operation::GerarNfse, body))
}

/// Move the `Rps` identification child in front of its `Competencia` sibling.
///
/// Fragments without such a pair are returned untouched as raw markup.
pub fn relocate_rps_identification(rps: &RpsFragment) -> Result<XmlNode, NfseError> {
    let mut tree = XmlElement::parse(rps.as_str())?;
    let holds_both = |e: &XmlElement| {
        e.child_position("Rps").is_some() && e.child_position("Competencia").is_some()
    };
    let relocated = tree
        .find_descendant_mut(&holds_both)
        .is_some_and(|declaration| declaration.move_child_before("Rps", "Competencia"));
    if relocated {
        Ok(XmlNode::Element(tree))
    } else {
        Ok(XmlNode::Raw(rps.as_str().to_string()))
    }
}

/// `CartaCorrecaoNfseEnvio` request.
pub fn correction_letter(config: &ClientConfig, letter: &CorrectionLetter) -> PreparedRequest {
    let provider = &config.provider;
    let taker = &letter.taker;

    let identification = XmlElement::new("IdentificacaoNfse")
        .text_child("Numero", letter.number.as_str())
        .child(tax_id_element(&provider.tax_id))
        .text_child("CodigoMunicipio", provider.municipality_code.as_str());

    let taker_block = XmlElement::new("TomadorServico")
        .child(
            XmlElement::new("IdentificacaoTomador")
                .child(cpf_cnpj(&TaxId::Cnpj(taker.cnpj.clone()))),
        )
        .text_child("RazaoSocial", taker.corporate_name.as_str())
        .child(
            XmlElement::new("Endereco")
                .text_child("Endereco", taker.street.as_str())
                .text_child("Numero", taker.number.as_str())
                .text_child("Bairro", taker.district.as_str())
                .text_child("Cep", taker.postal_code.as_str()),
        )
        .child(XmlElement::new("Contato").text_child("Email", taker.email.as_str()));

    let info = XmlElement::new("InfPedidoCartaCorrecao")
        .attr("id", SIGNED_BLOCK_ID)
        .child(identification)
        .child(taker_block)
        .text_child("Discriminacao", letter.description.as_str());

    let body = root("CartaCorrecaoNfseEnvio", config).child(XmlElement::new("Pedido").child(info));
    PreparedRequest::new(Operation::CartaCorrecaoNfse, body)
}
