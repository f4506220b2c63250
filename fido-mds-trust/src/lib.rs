//! Verified, self refreshing access to the FIDO Alliance Metadata Service.
//!
//! The metadata service publishes a signed BLOB describing every certified authenticator
//! model: its identifiers, the roots its attestation chains terminate in, and its
//! certification and security status. This crate
//!
//! * verifies the BLOB ([`verify_metadata_blob`]), validating the signing chain carried in
//!   the JWS header against [`TrustedRoots`] before the signing key is trusted,
//! * indexes a verified BLOB for lookup by AAGUID or attestation key identifier
//!   ([`MetadataService`]),
//! * keeps an index current by fetching the BLOB daily, swapping in new snapshots without
//!   disturbing readers ([`SelfUpdatingMds`]).
//!
//! ```no_run
//! use fido_mds_trust::SelfUpdatingMds;
//!
//! # async fn example() -> fido_mds_trust::MdsResult<()> {
//! let mds = SelfUpdatingMds::fido_default().await?;
//! if let Some(stmt) = mds.lookup_by_aaguid("cb69481e-8ff7-4039-93ec-0a2729a154a8") {
//!     println!("{}", stmt.description);
//! }
//! # Ok(())
//! # }
//! ```

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

pub mod constants;
pub mod error;
mod jws;
pub mod mds;
pub mod scheduler;
mod service;
mod updating;

#[cfg(test)]
mod test_support;

pub use crate::error::{MdsError, MdsResult};
pub use crate::jws::{verify_metadata_blob, MetadataBlobVerifier, SignatureAlgorithm};
pub use crate::mds::{
    AuthenticatorStatus, MetadataBlobPayload, MetadataBlobPayloadEntry, MetadataStatement,
};
pub use crate::scheduler::{DailyScheduler, ManualScheduler, ScheduledTask, Scheduler};
pub use crate::service::MetadataService;
pub use crate::updating::{SelfUpdatingMds, SelfUpdatingMdsBuilder};

pub use fido_pki::TrustedRoots;
pub use url::Url;
