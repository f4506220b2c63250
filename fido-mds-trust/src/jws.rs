//! Verification of the metadata BLOB, a compact JWS whose protected header carries the
//! certificate chain of its own signing key.
//!
//! The embedded chain is validated against the caller's roots *before* the leaf key is
//! used for anything. Only after the chain is anchored is the signature checked, and only
//! after the signature is checked is the payload decoded.

use crate::error::{MdsError, MdsResult};
use crate::mds::MetadataBlobPayload;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use fido_pki::{parse_der_certificate, ChainVerifier, TrustedRoots, X509Ref, X509};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::sign::Verifier;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The signature algorithms permitted for the metadata BLOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SignatureAlgorithm {
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
}

impl SignatureAlgorithm {
    fn digest(self) -> MessageDigest {
        match self {
            SignatureAlgorithm::ES256 | SignatureAlgorithm::RS256 => MessageDigest::sha256(),
            SignatureAlgorithm::ES384 | SignatureAlgorithm::RS384 => MessageDigest::sha384(),
            SignatureAlgorithm::ES512 | SignatureAlgorithm::RS512 => MessageDigest::sha512(),
        }
    }

    /// The curve and the width in bytes of each of `r` and `s` for ECDSA algorithms.
    fn curve(self) -> Option<(Nid, usize)> {
        match self {
            SignatureAlgorithm::ES256 => Some((Nid::X9_62_PRIME256V1, 32)),
            SignatureAlgorithm::ES384 => Some((Nid::SECP384R1, 48)),
            SignatureAlgorithm::ES512 => Some((Nid::SECP521R1, 66)),
            _ => None,
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = MdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(SignatureAlgorithm::ES256),
            "ES384" => Ok(SignatureAlgorithm::ES384),
            "ES512" => Ok(SignatureAlgorithm::ES512),
            "RS256" => Ok(SignatureAlgorithm::RS256),
            "RS384" => Ok(SignatureAlgorithm::RS384),
            "RS512" => Ok(SignatureAlgorithm::RS512),
            other => Err(MdsError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Deserialize)]
struct ProtectedHeader {
    alg: String,
    #[serde(default)]
    x5c: Option<serde_json::Value>,
}

/// The three segments of a compact JWS, not yet trusted in any way.
struct CompactJws<'a> {
    header: ProtectedHeader,
    signing_input: &'a str,
    payload_b64: &'a str,
    signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    fn parse(input: &'a str) -> MdsResult<Self> {
        let mut parts = input.split('.');
        let (hdr_b64, payload_b64, sig_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => {
                    return Err(MdsError::Decode(
                        "expected three dot separated segments".to_string(),
                    ))
                }
            };

        let header: ProtectedHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(hdr_b64)?)?;
        let signature = URL_SAFE_NO_PAD.decode(sig_b64)?;

        // The signature covers the header and payload exactly as transmitted.
        let signing_input = &input[..hdr_b64.len() + 1 + payload_b64.len()];

        Ok(CompactJws {
            header,
            signing_input,
            payload_b64,
            signature,
        })
    }
}

/// Decode the `x5c` header member: a non-empty array of standard (not url-safe) base64 DER
/// certificates, leaf first.
fn x5c_chain(x5c: Option<&serde_json::Value>) -> MdsResult<Vec<X509>> {
    let entries = x5c
        .and_then(|v| v.as_array())
        .filter(|a| !a.is_empty())
        .ok_or(MdsError::MissingChain)?;

    entries
        .iter()
        .map(|v| {
            let b64 = v.as_str().ok_or(MdsError::MissingChain)?;
            let der = STANDARD.decode(b64).map_err(|e| {
                debug!(?e, "x5c member is not standard base64");
                MdsError::MissingChain
            })?;
            parse_der_certificate(&der).map_err(|e| {
                debug!(?e, "x5c member is not a certificate");
                MdsError::MissingChain
            })
        })
        .collect()
}

fn verify_signature(
    alg: SignatureAlgorithm,
    leaf: &X509Ref,
    signing_input: &[u8],
    signature: &[u8],
) -> MdsResult<()> {
    let pkey = leaf.public_key()?;

    let der_sig = match alg.curve() {
        Some((curve, width)) => {
            let ec_key = pkey.ec_key().map_err(|_| {
                debug!(%alg, "signing key is not an EC key");
                MdsError::InvalidSignature
            })?;
            if ec_key.group().curve_name() != Some(curve) {
                debug!(%alg, "signing key curve does not match the algorithm");
                return Err(MdsError::InvalidSignature);
            }
            if signature.len() != width * 2 {
                debug!(%alg, len = signature.len(), "ECDSA signature has the wrong length");
                return Err(MdsError::InvalidSignature);
            }
            let (r, s) = signature.split_at(width);
            EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?
                .to_der()?
        }
        None => {
            if pkey.rsa().is_err() {
                debug!(%alg, "signing key is not an RSA key");
                return Err(MdsError::InvalidSignature);
            }
            signature.to_vec()
        }
    };

    let mut verifier = Verifier::new(alg.digest(), &pkey)?;
    verifier.update(signing_input)?;
    match verifier.verify(&der_sig) {
        Ok(true) => Ok(()),
        Ok(false) => Err(MdsError::InvalidSignature),
        Err(e) => {
            debug!(?e, "signature verification errored");
            Err(MdsError::InvalidSignature)
        }
    }
}

/// Verifies metadata BLOBs against a set of trusted roots.
#[derive(Debug, Default, Clone)]
pub struct MetadataBlobVerifier {
    chain_verifier: ChainVerifier,
}

impl MetadataBlobVerifier {
    /// A verifier that enforces certificate validity windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// ⚠️  Skip validity window checks of the signing chain. Only useful for inspecting an
    /// archived BLOB whose signing certificate has since expired.
    pub fn danger_disable_time_checks(mut self, disable: bool) -> Self {
        self.chain_verifier = self.chain_verifier.danger_disable_time_checks(disable);
        self
    }

    /// Verify `blob` and return its claims. Any failure aborts the whole operation, no
    /// partially verified claims are ever returned.
    pub fn verify(&self, blob: &str, roots: &TrustedRoots) -> MdsResult<MetadataBlobPayload> {
        let jws = CompactJws::parse(blob.trim())?;

        let alg = SignatureAlgorithm::from_str(&jws.header.alg)?;
        trace!(%alg, "signature algorithm permitted");

        let chain = x5c_chain(jws.header.x5c.as_ref())?;

        let anchor = self
            .chain_verifier
            .verify(&chain, roots)
            .map_err(MdsError::ChainVerification)?;
        debug!(anchor = ?anchor.subject_name(), "metadata signing chain is trusted");

        // chain is non-empty, x5c_chain refuses an empty array.
        let leaf = chain.first().ok_or(MdsError::MissingChain)?;
        verify_signature(alg, leaf, jws.signing_input.as_bytes(), &jws.signature)?;

        let payload_bytes = URL_SAFE_NO_PAD.decode(jws.payload_b64)?;
        let payload: MetadataBlobPayload = serde_json::from_slice(&payload_bytes)?;
        payload.validate()?;

        debug!(no = payload.no, entries = payload.entries.len(), "metadata BLOB verified");
        Ok(payload)
    }
}

/// Verify `blob` against `roots`, enforcing certificate validity windows.
pub fn verify_metadata_blob(blob: &str, roots: &TrustedRoots) -> MdsResult<MetadataBlobPayload> {
    MetadataBlobVerifier::new().verify(blob, roots)
}

impl FromStr for MetadataBlobPayload {
    type Err = MdsError;

    /// Verify a BLOB published by the FIDO Alliance, anchored in the embedded GlobalSign
    /// root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roots = TrustedRoots::fido_default().map_err(MdsError::Parse)?;
        verify_metadata_blob(s, &roots)
    }
}
