//! # Identifier Formatter
//!
//! Fixed-width textual forms the schema requires for invoice numbers.
//!
//! Two encodings coexist and are chosen per operation:
//! - composite: 4-digit year followed by an 11-digit sequence (15 chars)
//! - substitution: plain 15-digit sequence, no year segment
//!
//! Lot numbers are rendered verbatim.

use std::fmt;

use super::errors::NfseError;

/// Largest year that fits the 4-digit segment.
pub const MAX_YEAR: u32 = 9_999;

/// Largest sequence that fits the 11-digit segment.
pub const MAX_SEQUENCE: u64 = 99_999_999_999;

/// Largest number that fits the 15-digit substitution field.
pub const MAX_SUBSTITUTION_NUMBER: u64 = 999_999_999_999_999;

/// Width of every encoded invoice number.
pub const INVOICE_NUMBER_WIDTH: usize = 15;

/// Encode `(year, sequence)` as `%04d%011d`.
///
/// # Errors
/// * `NfseError::IdentifierOutOfRange` - either segment overflows its width
pub fn composite_number(year: u32, sequence: u64) -> Result<String, NfseError> {
    if year > MAX_YEAR {
        return Err(NfseError::IdentifierOutOfRange {
            field: "year",
            value: u64::from(year),
            max: u64::from(MAX_YEAR),
        });
    }
    if sequence > MAX_SEQUENCE {
        return Err(NfseError::IdentifierOutOfRange {
            field: "sequence",
            value: sequence,
            max: MAX_SEQUENCE,
        });
    }
    Ok(format!("{year:04}{sequence:011}"))
}

/// Encode a number as `%015d`. Used only by the substitution request.
///
/// # Errors
/// * `NfseError::IdentifierOutOfRange` - the number needs more than 15 digits
pub fn substitution_number(number: u64) -> Result<String, NfseError> {
    if number > MAX_SUBSTITUTION_NUMBER {
        return Err(NfseError::IdentifierOutOfRange {
            field: "invoice number",
            value: number,
            max: MAX_SUBSTITUTION_NUMBER,
        });
    }
    Ok(format!("{number:015}"))
}

/// Lot number as chosen by the caller. Rendered without padding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LotNumber(String);

impl LotNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `Id` attribute on `LoteRps`.
    pub fn element_id(&self) -> String {
        format!("lote{}", self.0)
    }
}

impl fmt::Display for LotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for LotNumber {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for LotNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
