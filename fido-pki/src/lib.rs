//! Certificate trust primitives for FIDO relying parties.
//!
//! This crate decodes certificates, validates certificate chains against a set of
//! [`TrustedRoots`], and checks revocation through CRL distribution points. It is used to
//! establish trust in the chain that signs the FIDO metadata BLOB, and in attestation
//! chains against the roots listed in metadata statements.

// #![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

mod certificate;
mod chain;
pub mod error;
mod revocation;
mod roots;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::certificate::{
    parse_base64_der_certificate, parse_der_certificate, parse_pem_certificate,
};
pub use crate::chain::ChainVerifier;
pub use crate::error::{PkiError, PkiResult};
pub use crate::revocation::{
    crl_distribution_point_urls, is_revoked, RevocationVerifier, DEFAULT_CRL_FETCH_TIMEOUT,
};
pub use crate::roots::{TrustedRoots, GLOBAL_SIGN_ROOT_CA_R3};

pub use openssl::x509::{X509Crl, X509Ref, X509};
