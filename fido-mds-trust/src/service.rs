//! A read-only index over one verified metadata BLOB.

use crate::error::MdsResult;
use crate::jws::verify_metadata_blob;
use crate::mds::{MetadataBlobPayload, MetadataBlobPayloadEntry, MetadataStatement};
use fido_pki::TrustedRoots;
use std::fmt;
use uuid::Uuid;

/// Lookups of authenticator metadata by model identifier.
///
/// A `MetadataService` wraps exactly one verified payload and is never mutated. Lookups are
/// linear scans in the order the entries were published, the first match wins.
#[derive(Debug, Clone)]
pub struct MetadataService {
    payload: MetadataBlobPayload,
}

impl MetadataService {
    /// Verify `blob` against `roots` and index the resulting payload.
    pub fn from_blob(blob: &str, roots: &TrustedRoots) -> MdsResult<Self> {
        verify_metadata_blob(blob, roots).map(Self::from_payload)
    }

    /// Index an already verified payload.
    pub fn from_payload(payload: MetadataBlobPayload) -> Self {
        MetadataService { payload }
    }

    /// The entry for the authenticator model with this AAGUID. `aaguid` is compared as a
    /// UUID, so any case and hyphenation that parses is accepted. Strings that are not a
    /// UUID are never found.
    pub fn lookup_entry_by_aaguid(&self, aaguid: &str) -> Option<&MetadataBlobPayloadEntry> {
        let aaguid = Uuid::parse_str(aaguid).ok()?;
        self.payload
            .entries
            .iter()
            .find(|entry| entry.aaguid == Some(aaguid))
    }

    /// The statement for the authenticator model with this AAGUID. As with
    /// [`lookup_entry_by_aaguid`](Self::lookup_entry_by_aaguid), the comparison is between
    /// parsed UUIDs, not strings.
    pub fn lookup_by_aaguid(&self, aaguid: &str) -> Option<&MetadataStatement> {
        self.lookup_entry_by_aaguid(aaguid)
            .map(|entry| &entry.metadata_statement)
    }

    /// The entry listing this attestation certificate key identifier.
    pub fn lookup_entry_by_key_identifier(
        &self,
        key_id: &str,
    ) -> Option<&MetadataBlobPayloadEntry> {
        self.payload
            .entries
            .iter()
            .find(|entry| entry.has_key_identifier(key_id))
    }

    /// The statement for the U2F authenticator model listing this attestation certificate
    /// key identifier. Identifiers are compared exactly.
    pub fn lookup_by_key_identifier(&self, key_id: &str) -> Option<&MetadataStatement> {
        self.lookup_entry_by_key_identifier(key_id)
            .map(|entry| &entry.metadata_statement)
    }

    /// Every entry, in published order.
    pub fn entries(&self) -> &[MetadataBlobPayloadEntry] {
        &self.payload.entries
    }

    /// The date by which the next BLOB will be published.
    pub fn next_update(&self) -> &str {
        &self.payload.next_update
    }

    /// The serial number of the indexed BLOB.
    pub fn sequence_number(&self) -> u32 {
        self.payload.no
    }

    /// The legal header of the indexed BLOB.
    pub fn legal_header(&self) -> &str {
        &self.payload.legal_header
    }

    /// The indexed payload.
    pub fn payload(&self) -> &MetadataBlobPayload {
        &self.payload
    }
}

impl fmt::Display for MetadataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MetadataService {{ no: {}, next_update: {}, entries: {} }}",
            self.payload.no,
            self.payload.next_update,
            self.payload.entries.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MdsError;
    use crate::test_support::{payload, Authority, GOTRUST_AAGUID, U2F_KEY_ID, YUBIKEY_AAGUID};
    use fido_pki::testing::KeyKind;

    fn service() -> MetadataService {
        let authority = Authority::new(KeyKind::EcP256);
        let blob = authority.sign("ES256", &payload(9));
        MetadataService::from_blob(&blob, &authority.roots()).expect("service")
    }

    #[test]
    fn lookup_by_aaguid() {
        let svc = service();

        let stmt = svc.lookup_by_aaguid(GOTRUST_AAGUID).expect("known aaguid");
        // The first of the two entries sharing this aaguid wins.
        assert_eq!(stmt.description, "GoTrust Idem Key FIDO2 Authenticator");

        assert!(svc
            .lookup_by_aaguid("00000000-0000-0000-0000-000000000000")
            .is_none());
        assert!(svc.lookup_by_aaguid("not-a-uuid").is_none());
        assert!(svc.lookup_by_aaguid("").is_none());

        // Uppercase and unhyphenated forms name the same model.
        assert!(svc
            .lookup_by_aaguid("3B1ADB99-0DFE-46FD-90B8-7F7614A4DE2A")
            .is_some());
        assert!(svc
            .lookup_by_aaguid("3b1adb990dfe46fd90b87f7614a4de2a")
            .is_some());
    }

    #[test]
    fn malformed_entries_do_not_reject_the_feed() {
        let authority = Authority::new(KeyKind::EcP256);
        let mut doc = payload(10);
        let entries = doc["entries"].as_array_mut().expect("entries");
        entries.insert(
            0,
            serde_json::json!({
                "aaguid": "",
                "metadataStatement": { "aaguid": "", "description": "Empty aaguid" }
            }),
        );
        entries.push(serde_json::json!({
            "aaguid": "00000000-0000-0000-0000-00000000000a",
            "metadataStatement": { "protocolFamily": "fido2" }
        }));

        let blob = authority.sign("ES256", &doc);
        let svc = MetadataService::from_blob(&blob, &authority.roots()).expect("service");

        assert_eq!(svc.entries().len(), 6);
        assert_eq!(
            svc.lookup_by_aaguid(GOTRUST_AAGUID).expect("good entry").description,
            "GoTrust Idem Key FIDO2 Authenticator"
        );
        assert!(svc.lookup_by_aaguid(YUBIKEY_AAGUID).is_some());
        assert!(svc.lookup_by_key_identifier(U2F_KEY_ID).is_some());
        assert!(svc.lookup_by_aaguid("").is_none());

        let undescribed = svc
            .lookup_by_aaguid("00000000-0000-0000-0000-00000000000a")
            .expect("entry without description");
        assert!(undescribed.description.is_empty());
    }

    #[test]
    fn lookup_by_key_identifier() {
        let svc = service();

        let stmt = svc.lookup_by_key_identifier(U2F_KEY_ID).expect("known key id");
        assert_eq!(stmt.description, "Security Key by Yubico");
        assert!(svc
            .lookup_by_key_identifier("fd36573d24be3f7f32ad5040271ab61035a1fcad")
            .is_some());

        assert!(svc
            .lookup_by_key_identifier("0000000000000000000000000000000000000000")
            .is_none());
        // An aaguid is not a key identifier.
        assert!(svc.lookup_by_key_identifier(GOTRUST_AAGUID).is_none());
    }

    #[test]
    fn entry_lookup_exposes_status() {
        let svc = service();
        let entry = svc.lookup_entry_by_aaguid(YUBIKEY_AAGUID).expect("entry");
        assert!(entry
            .latest_status()
            .map(|r| r.status.is_undesired())
            .unwrap_or(false));

        let entry = svc
            .lookup_entry_by_key_identifier(U2F_KEY_ID)
            .expect("entry");
        assert_eq!(entry.status_reports.len(), 1);
    }

    #[test]
    fn accessors() {
        let svc = service();
        assert_eq!(svc.sequence_number(), 9);
        assert_eq!(svc.next_update(), "2024-05-01");
        assert_eq!(svc.entries().len(), 4);
        assert!(svc.legal_header().starts_with("Retrieval"));
        assert_eq!(
            svc.to_string(),
            "MetadataService { no: 9, next_update: 2024-05-01, entries: 4 }"
        );
    }

    #[test]
    fn construction_requires_a_valid_blob() {
        let authority = Authority::new(KeyKind::EcP256);
        let blob = authority.sign("ES256", &payload(1));
        let stranger = Authority::new(KeyKind::EcP256);

        assert!(matches!(
            MetadataService::from_blob(&blob, &stranger.roots()),
            Err(MdsError::ChainVerification(_))
        ));
    }
}
