//! Path validation from a leaf certificate to a set of trusted roots.

use crate::error::{PkiError, PkiResult};
use crate::roots::TrustedRoots;
use openssl::{stack, x509, x509::store, x509::verify};

/// Validates that a leaf certificate chains to a trusted root through zero or more
/// intermediates, with standard X.509 path validation (signatures, validity windows and
/// basic constraints of the intermediates).
///
/// Verification is a pure function of the chain, the roots and the clock. No network
/// access is performed and no revocation status is consulted, see
/// [`RevocationVerifier`](crate::RevocationVerifier) for that.
#[derive(Debug, Default, Clone)]
pub struct ChainVerifier {
    disable_time_checks: bool,
}

impl ChainVerifier {
    /// A verifier that enforces certificate validity windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// ⚠️  Skip certificate validity window checks. This exists so that historical
    /// material, such as an archived metadata BLOB, can still be inspected. Do not use this
    /// when deciding whether to trust anything.
    pub fn danger_disable_time_checks(mut self, disable: bool) -> Self {
        self.disable_time_checks = disable;
        self
    }

    /// Verify `chain`, ordered `[leaf, intermediate_1, .., intermediate_n]`, against `roots`.
    ///
    /// On success the root the chain terminated in is returned.
    pub fn verify(&self, chain: &[x509::X509], roots: &TrustedRoots) -> PkiResult<x509::X509> {
        if roots.is_empty() {
            return Err(PkiError::NoTrustedRoots);
        }

        let (leaf, intermediates) = chain.split_first().ok_or(PkiError::EmptyChain)?;

        for crt in chain {
            trace!(subject = ?crt.subject_name(), issuer = ?crt.issuer_name());
        }

        // Convert the intermediates to a stack so that openssl can use them.
        let mut chain_stack = stack::Stack::new()?;
        for crt in intermediates.iter() {
            chain_stack.push(crt.clone())?;
        }

        let mut ca_store = store::X509StoreBuilder::new()?;

        if self.disable_time_checks {
            ca_store.set_flags(verify::X509VerifyFlags::NO_CHECK_TIME)?;
        }

        for ca_crt in roots.iter() {
            ca_store.add_cert(ca_crt.clone())?;
        }

        let ca_store = ca_store.build();

        let mut ca_ctx = x509::X509StoreContext::new()?;

        // The outer result carries openssl failures, the inner one the verification outcome.
        let res: PkiResult<x509::X509> = ca_ctx.init(&ca_store, leaf, &chain_stack, |ca_ctx_ref| {
            ca_ctx_ref.verify_cert().map(|_| {
                // The boolean is ignored in favour of the richer error from the context.
                let res = ca_ctx_ref.error();
                if res == x509::X509VerifyResult::OK {
                    ca_ctx_ref
                        .chain()
                        .and_then(|chain| chain.iter().last())
                        .map(|anchor| anchor.to_owned())
                        .ok_or_else(|| PkiError::ChainVerification {
                            depth: 0,
                            reason: "verified chain has no anchor".to_string(),
                        })
                } else {
                    let depth = ca_ctx_ref.error_depth();
                    debug!(
                        "chain verification failed - error depth={}, sn={:?}",
                        depth,
                        ca_ctx_ref.current_cert().map(|crt| crt.subject_name())
                    );
                    Err(PkiError::ChainVerification {
                        depth,
                        reason: res.error_string().to_string(),
                    })
                }
            })
        })?;

        res
    }
}
