//! Shared fixtures for the unit tests of this crate.

#![allow(clippy::expect_used)]

use fido_pki::testing::{jws_header, sign_compact_jws, KeyKind, LeafOptions, TestCert};
use fido_pki::TrustedRoots;

pub(crate) const GOTRUST_AAGUID: &str = "3b1adb99-0dfe-46fd-90b8-7f7614a4de2a";
pub(crate) const YUBIKEY_AAGUID: &str = "cb69481e-8ff7-4039-93ec-0a2729a154a8";
pub(crate) const U2F_KEY_ID: &str = "bf7bcaa0d0c6187a8c6abbdd16a15640e7c7bde2";

/// A metadata authority: root, intermediate and a signing leaf.
pub(crate) struct Authority {
    pub root: TestCert,
    pub intermediate: TestCert,
    pub signer: TestCert,
}

impl Authority {
    pub fn new(key: KeyKind) -> Self {
        Self::with_options(LeafOptions {
            key,
            ..Default::default()
        })
    }

    pub fn with_options(opts: LeafOptions) -> Self {
        let root = TestCert::root("Test MDS Root");
        let intermediate = TestCert::intermediate("Test MDS CA-1", &root);
        let signer = TestCert::leaf_with("Test MDS Signer", &intermediate, opts);
        Authority {
            root,
            intermediate,
            signer,
        }
    }

    pub fn roots(&self) -> TrustedRoots {
        TrustedRoots::from_certs([self.root.cert.clone()]).expect("roots")
    }

    pub fn header(&self, alg: &str) -> serde_json::Value {
        jws_header(alg, &[&self.signer.cert, &self.intermediate.cert])
    }

    pub fn sign(&self, alg: &str, payload: &serde_json::Value) -> String {
        let payload = serde_json::to_vec(payload).expect("payload json");
        sign_compact_jws(&self.header(alg), &payload, &self.signer.key)
    }
}

pub(crate) fn payload(no: u32) -> serde_json::Value {
    serde_json::json!({
        "legalHeader": "Retrieval and use of this BLOB indicates acceptance of the appropriate agreement.",
        "no": no,
        "nextUpdate": "2024-05-01",
        "entries": [
            {
                "aaguid": GOTRUST_AAGUID,
                "metadataStatement": {
                    "aaguid": GOTRUST_AAGUID,
                    "description": "GoTrust Idem Key FIDO2 Authenticator",
                    "authenticatorVersion": 1,
                    "protocolFamily": "fido2",
                    "schema": 3,
                    "attestationTypes": ["basic_full"],
                    "attestationRootCertificates": [],
                    "keyProtection": ["hardware", "secure_element"]
                },
                "statusReports": [
                    { "status": "FIDO_CERTIFIED_L1", "effectiveDate": "2022-03-01" }
                ],
                "timeOfLastStatusChange": "2022-03-01"
            },
            {
                "attestationCertificateKeyIdentifiers": [
                    "fd36573d24be3f7f32ad5040271ab61035a1fcad",
                    U2F_KEY_ID
                ],
                "metadataStatement": {
                    "attestationCertificateKeyIdentifiers": [
                        "fd36573d24be3f7f32ad5040271ab61035a1fcad",
                        U2F_KEY_ID
                    ],
                    "description": "Security Key by Yubico",
                    "protocolFamily": "u2f",
                    "schema": 3,
                    "attestationTypes": ["basic_full"]
                },
                "statusReports": [
                    { "status": "FIDO_CERTIFIED", "effectiveDate": "2017-11-28" }
                ]
            },
            {
                "aaguid": GOTRUST_AAGUID,
                "metadataStatement": {
                    "aaguid": GOTRUST_AAGUID,
                    "description": "Shadowed duplicate entry",
                    "protocolFamily": "fido2"
                }
            },
            {
                "aaguid": YUBIKEY_AAGUID,
                "metadataStatement": {
                    "aaguid": YUBIKEY_AAGUID,
                    "description": "YubiKey Bio Series",
                    "protocolFamily": "fido2"
                },
                "statusReports": [
                    { "status": "FIDO_CERTIFIED_L1", "effectiveDate": "2021-06-01" },
                    { "status": "USER_VERIFICATION_BYPASS", "effectiveDate": "2023-02-14" }
                ]
            }
        ]
    })
}
