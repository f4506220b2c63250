//! Error types for certificate handling.

use openssl::error::ErrorStack as OpenSSLErrorStack;

/// A fido-pki result type.
pub type PkiResult<T> = core::result::Result<T, PkiError>;

/// Possible errors that may occur while decoding or verifying certificates.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum PkiError {
    #[error("No PEM certificate block was found in the input")]
    MissingPemBlock,

    #[error("The certificate encoding could not be decoded: {0}")]
    Decode(String),

    #[error("The certificate is not a well formed X.509 certificate")]
    Parse(#[source] OpenSSLErrorStack),

    #[error("The certificate chain does not contain a leaf certificate")]
    EmptyChain,

    #[error("No trusted root certificates were supplied")]
    NoTrustedRoots,

    #[error("The certificate chain is not trusted at depth {depth}: {reason}")]
    ChainVerification { depth: u32, reason: String },

    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] OpenSSLErrorStack),

    #[error("Unable to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<base64::DecodeError> for PkiError {
    fn from(e: base64::DecodeError) -> Self {
        PkiError::Decode(e.to_string())
    }
}

/// Reasons a certificate revocation list could not be obtained. These never escape the
/// revocation verifier, which fails closed on any of them.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RevocationError {
    #[error("could not fetch CRL from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("CRL distribution point {url} responded with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("could not parse CRL from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: OpenSSLErrorStack,
    },
}
