//! Possible errors that may occur while obtaining and verifying FIDO metadata.

use fido_pki::PkiError;

/// A fido-mds-trust result type.
pub type MdsResult<T> = core::result::Result<T, MdsError>;

/// Errors from parsing, verifying or refreshing the metadata BLOB.
///
/// Verification errors (`UnsupportedAlgorithm`, `MissingChain`, `ChainVerification`,
/// `InvalidSignature`) are always returned to the caller and never swallowed.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum MdsError {
    #[error("The metadata BLOB is not a valid compact JWS: {0}")]
    Decode(String),

    #[error("The metadata BLOB header or payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Signing algorithm {0} is not permitted for the metadata BLOB")]
    UnsupportedAlgorithm(String),

    #[error("The metadata BLOB header does not carry a usable x5c certificate chain")]
    MissingChain,

    #[error("A certificate could not be parsed: {0}")]
    Parse(#[source] PkiError),

    #[error("The metadata BLOB signing chain is not trusted: {0}")]
    ChainVerification(#[source] PkiError),

    #[error("The metadata BLOB signature is invalid")]
    InvalidSignature,

    #[error("Unable to fetch the metadata BLOB: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("The metadata authority URL is invalid: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("The metadata authority responded with HTTP {0}")]
    HttpStatus(u16),

    #[error("The metadata BLOB payload is structurally invalid: {0}")]
    StructuralInvalidity(&'static str),

    #[error("The metadata BLOB sequence number {offered} is older than the installed {current}")]
    SequenceRollback { current: u32, offered: u32 },

    #[error("A metadata refresh is already in progress")]
    RefreshInProgress,

    #[error("Unable to schedule the metadata refresh: {0}")]
    Scheduler(String),

    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] openssl::error::ErrorStack),
}

impl From<base64::DecodeError> for MdsError {
    fn from(e: base64::DecodeError) -> Self {
        MdsError::Decode(e.to_string())
    }
}
