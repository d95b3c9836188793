//! # Envelope Finalizer
//!
//! Last textual edits applied to a signed document before the schema gate.

use super::errors::NfseError;
use super::operations::PreparedRequest;
use super::xml::insert_before_root_end;

/// XML declarations the signer may leave in the document.
pub const PROLOGS: [&str; 2] = [
    "<?xml version=\"1.0\"?>",
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
];

/// Remove every occurrence of the two prolog literals. Nothing else changes.
///
/// Runs to a fixed point so a prolog formed by joining the text around a
/// removed one is removed as well.
pub fn strip_prologs(document: &str) -> String {
    let mut current = document.to_string();
    loop {
        let next = PROLOGS
            .iter()
            .fold(current.clone(), |doc, prolog| doc.replace(prolog, ""));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Insert the blocks the request appends after signing, in order, right
/// before the root end tag of `signed`.
///
/// # Errors
/// * `NfseError::MalformedDocument` - the signed document has no closed root
pub fn append_unsigned_blocks(
    request: &PreparedRequest,
    signed: String,
) -> Result<String, NfseError> {
    request.appended.iter().try_fold(signed, |doc, block| {
        insert_before_root_end(&doc, &block.to_xml())
    })
}
