//! Decoding of certificates from the encodings found in FIDO material: PEM files such as
//! bundled trust anchors, and standard base64 DER as used by `x5c` headers and
//! `attestationRootCertificates`.

use crate::error::{PkiError, PkiResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::x509;

const PEM_CERT_TAG: &str = "CERTIFICATE";

/// Decode the first PEM certificate block in `data` and parse it as an X.509 certificate.
///
/// Any text before the block, and any other blocks, are ignored. Fails with
/// [`PkiError::MissingPemBlock`] when there is no certificate block, with
/// [`PkiError::Decode`] when the block body is not valid base64, and with
/// [`PkiError::Parse`] when the decoded bytes are not a well formed certificate.
pub fn parse_pem_certificate(data: &[u8]) -> PkiResult<x509::X509> {
    let blocks = pem::parse_many(data).map_err(|e| match e {
        pem::PemError::MissingData
        | pem::PemError::MalformedFraming
        | pem::PemError::MissingBeginTag
        | pem::PemError::MissingEndTag => PkiError::MissingPemBlock,
        e => PkiError::Decode(e.to_string()),
    })?;

    let block = blocks
        .iter()
        .find(|p| p.tag() == PEM_CERT_TAG)
        .ok_or(PkiError::MissingPemBlock)?;

    parse_der_certificate(block.contents())
}

/// Parse a DER encoded certificate.
pub fn parse_der_certificate(der: &[u8]) -> PkiResult<x509::X509> {
    x509::X509::from_der(der).map_err(PkiError::Parse)
}

/// Parse a certificate that is carried as standard (not url-safe) base64 DER.
pub fn parse_base64_der_certificate(b64: &str) -> PkiResult<x509::X509> {
    let der = STANDARD.decode(b64.trim())?;
    parse_der_certificate(&der)
}
