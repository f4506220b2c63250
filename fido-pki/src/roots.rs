use crate::certificate::{parse_der_certificate, parse_pem_certificate};
use crate::error::PkiResult;
use openssl::{hash, x509};
use std::collections::BTreeMap;

/// The GlobalSign Root CA - R3 certificate, which anchors the chain that signs the FIDO
/// Alliance metadata BLOB published at <https://mds.fidoalliance.org/>.
pub static GLOBAL_SIGN_ROOT_CA_R3: &str = r#"
-----BEGIN CERTIFICATE-----
MIIDXzCCAkegAwIBAgILBAAAAAABIVhTCKIwDQYJKoZIhvcNAQELBQAwTDEgMB4G
A1UECxMXR2xvYmFsU2lnbiBSb290IENBIC0gUjMxEzARBgNVBAoTCkdsb2JhbFNp
Z24xEzARBgNVBAMTCkdsb2JhbFNpZ24wHhcNMDkwMzE4MTAwMDAwWhcNMjkwMzE4
MTAwMDAwWjBMMSAwHgYDVQQLExdHbG9iYWxTaWduIFJvb3QgQ0EgLSBSMzETMBEG
A1UEChMKR2xvYmFsU2lnbjETMBEGA1UEAxMKR2xvYmFsU2lnbjCCASIwDQYJKoZI
hvcNAQEBBQADggEPADCCAQoCggEBAMwldpB5BngiFvXAg7aEyiie/QV2EcWtiHL8
RgJDx7KKnQRfJMsuS+FggkbhUqsMgUdwbN1k0ev1LKMPgj0MK66X17YUhhB5uzsT
gHeMCOFJ0mpiLx9e+pZo34knlTifBtc+ycsmWQ1z3rDI6SYOgxXG71uL0gRgykmm
KPZpO/bLyCiR5Z2KYVc3rHQU3HTgOu5yLy6c+9C7v/U9AOEGM+iCK65TpjoWc4zd
QQ4gOsC0p6Hpsk+QLjJg6VfLuQSSaGjlOCZgdbKfd/+RFO+uIEn8rUAVSNECMWEZ
XriX7613t2Saer9fwRPvm2L7DWzgVGkWqQPabumDk3F2xmmFghcCAwEAAaNCMEAw
DgYDVR0PAQH/BAQDAgEGMA8GA1UdEwEB/wQFMAMBAf8wHQYDVR0OBBYEFI/wS3+o
LkUkrk1Q+mOai97i3Ru8MA0GCSqGSIb3DQEBCwUAA4IBAQBLQNvAUKr+yAzv95ZU
RUm7lgAJQayzE4aGKAczymvmdLm6AC2upArT9fHxD4q/c2dKg8dEe3jgr25sbwMp
jjM5RcOO5LlXbKr8EpbsU8Yt5CRsuZRj+9xTaGdWPoO4zzUhw8lo/s7awlOqzJCK
6fBdRoyV3XpYKBovHd7NADdBj+1EbddTKJd+82cEHhXXipa0095MJ6RMG3NzdvQX
mcIfeg7jLQitChws/zyrVQ4PkX4268NXSb7hLi18YIvDQVETI53O9zJrlAGomecs
Mx86OyXShkDOOyyGeMlhLxS67ttVb9+E7gUJTb0o2HLO02JQZR7rkpeDMdmztcpH
WD9f
-----END CERTIFICATE-----
"#;

/// A set of root certificates that chain verification is anchored to.
///
/// Roots are keyed by the SHA-256 digest of their DER encoding, so inserting the same
/// certificate twice has no effect. The set is only built up front; verification never
/// mutates it.
#[derive(Debug, Default, Clone)]
pub struct TrustedRoots {
    pub(crate) roots: BTreeMap<Vec<u8>, x509::X509>,
}

impl TrustedRoots {
    /// The trust anchors for the FIDO Alliance metadata service.
    pub fn fido_default() -> PkiResult<Self> {
        Self::from_pem(GLOBAL_SIGN_ROOT_CA_R3.as_bytes())
    }

    /// Create a root set holding the first certificate of a PEM document.
    pub fn from_pem(data: &[u8]) -> PkiResult<Self> {
        let mut new = Self::default();
        new.insert(parse_pem_certificate(data)?)?;
        Ok(new)
    }

    /// Create a root set from DER encoded certificates.
    pub fn from_der_iter<'a, I: IntoIterator<Item = &'a [u8]>>(iter: I) -> PkiResult<Self> {
        let mut new = Self::default();
        for der in iter {
            new.insert(parse_der_certificate(der)?)?;
        }
        Ok(new)
    }

    /// Create a root set from already parsed certificates.
    pub fn from_certs<I: IntoIterator<Item = x509::X509>>(iter: I) -> PkiResult<Self> {
        let mut new = Self::default();
        for ca in iter {
            new.insert(ca)?;
        }
        Ok(new)
    }

    /// Add a root. Returns the previous certificate if this exact root was already present.
    pub fn insert(&mut self, ca: x509::X509) -> PkiResult<Option<x509::X509>> {
        let kid = ca.digest(hash::MessageDigest::sha256())?;
        Ok(self.roots.insert(kid.to_vec(), ca))
    }

    /// Determine if this root set contains any members.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The number of distinct roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Iterate over the root certificates.
    pub fn iter(&self) -> impl Iterator<Item = &x509::X509> {
        self.roots.values()
    }

    /// Find the root whose SHA-256 DER digest is `kid`.
    pub fn get(&self, kid: &[u8]) -> Option<&x509::X509> {
        self.roots.get(kid)
    }
}
