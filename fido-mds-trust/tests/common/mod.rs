#![allow(dead_code)]

use fido_mds_trust::TrustedRoots;
use fido_pki::testing::{jws_header, sign_compact_jws, TestCert};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const AAGUID: &str = "3b1adb99-0dfe-46fd-90b8-7f7614a4de2a";
pub const KEY_ID: &str = "923881fe2f214ee465484371aeb72e97f5a58e0a";

pub struct Authority {
    pub root: TestCert,
    pub intermediate: TestCert,
    pub signer: TestCert,
}

impl Authority {
    pub fn new() -> Self {
        let root = TestCert::root("Integration MDS Root");
        let intermediate = TestCert::intermediate("Integration MDS CA", &root);
        let signer = TestCert::leaf("Integration MDS Signer", &intermediate);
        Authority {
            root,
            intermediate,
            signer,
        }
    }

    pub fn roots(&self) -> TrustedRoots {
        TrustedRoots::from_certs([self.root.cert.clone()]).unwrap()
    }

    pub fn blob(&self, no: u32) -> String {
        let header = jws_header("ES256", &[&self.signer.cert, &self.intermediate.cert]);
        let payload = serde_json::json!({
            "legalHeader": "legal",
            "no": no,
            "nextUpdate": format!("2024-06-{:02}", no % 28 + 1),
            "entries": [
                {
                    "aaguid": AAGUID,
                    "metadataStatement": {
                        "aaguid": AAGUID,
                        "description": format!("Authenticator as of BLOB {no}"),
                        "protocolFamily": "fido2"
                    }
                },
                {
                    "attestationCertificateKeyIdentifiers": [KEY_ID],
                    "metadataStatement": {
                        "attestationCertificateKeyIdentifiers": [KEY_ID],
                        "description": "U2F authenticator",
                        "protocolFamily": "u2f"
                    }
                }
            ]
        });
        sign_compact_jws(&header, &serde_json::to_vec(&payload).unwrap(), &self.signer.key)
    }
}

/// Replace whatever the server answers with `response`.
pub async fn answer(server: &MockServer, response: ResponseTemplate) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn serve_blob(server: &MockServer, blob: String) {
    answer(server, ResponseTemplate::new(200).set_body_string(blob)).await;
}
