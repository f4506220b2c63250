//! Revocation checking against the CRL distribution points named by a certificate.

use crate::error::{PkiResult, RevocationError};
use openssl::x509::{X509Crl, X509CrlRef, X509Ref};
use std::time::Duration;

/// The default bound on fetching a single CRL.
pub const DEFAULT_CRL_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Determines whether a certificate is known to be revoked by fetching every CRL listed in
/// its CRL distribution points extension.
///
/// The check fails closed: a CRL that can not be fetched or parsed makes the certificate
/// unusable, since nothing could clear it. A certificate without distribution points has
/// nothing to be checked against and is accepted without any network access.
///
/// CRLs are fetched on every call and never cached. Every fetch is bounded by the
/// verifier's timeout, whichever client it was given.
#[derive(Debug, Clone)]
pub struct RevocationVerifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl RevocationVerifier {
    /// A verifier with its own HTTP client bounded by [`DEFAULT_CRL_FETCH_TIMEOUT`].
    pub fn new() -> PkiResult<Self> {
        Self::with_timeout(DEFAULT_CRL_FETCH_TIMEOUT)
    }

    /// A verifier with its own HTTP client bounded by `timeout` per request.
    pub fn with_timeout(timeout: Duration) -> PkiResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RevocationVerifier { client, timeout })
    }

    /// A verifier that shares an existing HTTP client. Requests are still bounded by
    /// [`DEFAULT_CRL_FETCH_TIMEOUT`], see [`RevocationVerifier::timeout`].
    pub fn with_client(client: reqwest::Client) -> Self {
        RevocationVerifier {
            client,
            timeout: DEFAULT_CRL_FETCH_TIMEOUT,
        }
    }

    /// Bound each CRL fetch by `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` if the certificate is not known to be revoked and may be used.
    pub async fn verify(&self, certificate: &X509Ref) -> bool {
        let points = crl_distribution_point_urls(certificate);

        if points.is_empty() {
            debug!(subject = ?certificate.subject_name(), "no crl distribution points");
            return true;
        }

        for url in points.iter() {
            let crl = match self.fetch_crl(url).await {
                Ok(crl) => crl,
                Err(err) => {
                    error!(%err, "unable to obtain crl, treating certificate as revoked");
                    return false;
                }
            };

            match is_revoked(certificate, &crl) {
                Ok(false) => {
                    trace!(%url, "certificate not present in crl");
                }
                Ok(true) => {
                    warn!(subject = ?certificate.subject_name(), %url, "certificate has been revoked");
                    return false;
                }
                Err(err) => {
                    error!(?err, "unable to compare serial numbers, treating certificate as revoked");
                    return false;
                }
            }
        }

        true
    }

    async fn fetch_crl(&self, url: &str) -> Result<X509Crl, RevocationError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| RevocationError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RevocationError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| RevocationError::Fetch {
                url: url.to_string(),
                source,
            })?;

        // Distribution points serve DER, but PEM is tolerated.
        X509Crl::from_der(&body)
            .or_else(|_| X509Crl::from_pem(&body))
            .map_err(|source| RevocationError::Parse {
                url: url.to_string(),
                source,
            })
    }
}

/// The URIs of every full-name CRL distribution point in `certificate`.
pub fn crl_distribution_point_urls(certificate: &X509Ref) -> Vec<String> {
    certificate
        .crl_distribution_points()
        .map(|points| {
            points
                .iter()
                .filter_map(|point| point.distpoint())
                .filter_map(|name| name.fullname())
                .flat_map(|names| names.iter())
                .filter_map(|general_name| general_name.uri())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Returns `true` if the serial number of `certificate` is listed in `crl`.
///
/// Only the serial number is compared. The CRL's issuer, signature and validity window
/// are not examined.
pub fn is_revoked(certificate: &X509Ref, crl: &X509CrlRef) -> PkiResult<bool> {
    let serial = certificate.serial_number().to_bn()?;

    if let Some(revoked) = crl.get_revoked() {
        for entry in revoked.iter() {
            if entry.serial_number().to_bn()? == serial {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
