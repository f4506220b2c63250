//! The payload of the FIDO metadata BLOB, as defined by
//! <https://fidoalliance.org/specs/mds/fido-metadata-service-v3.0-ps-20210518.html#metadata-blob-format>
//!
//! Only the fields needed to index entries and to anchor attestation chains are typed. The
//! remaining descriptors of a metadata statement (user verification details, display PNG
//! characteristics, extension descriptors and so on) are carried through as opaque JSON.

use crate::error::{MdsError, MdsResult};
use fido_pki::{parse_base64_der_certificate, TrustedRoots};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The FIDO protocol family of an authenticator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolFamily {
    /// Universal Authentication Framework
    #[serde(rename = "uaf")]
    Uaf,
    /// Universal 2nd Factor
    #[serde(rename = "u2f")]
    U2f,
    /// FIDO 2 / Webauthn
    #[serde(rename = "fido2")]
    Fido2,
    /// The family was not listed, or is not one this library knows of.
    #[default]
    #[serde(other)]
    Unknown,
}

/// The attestation types an authenticator may produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttestationType {
    /// The attestation key is shared by a batch of authenticators of the same model.
    #[serde(rename = "basic_full")]
    BasicFull,
    /// The credential key signs its own attestation (self attestation).
    #[serde(rename = "basic_surrogate")]
    BasicSurrogate,
    /// Elliptic curve direct anonymous attestation.
    #[serde(rename = "ecdaa")]
    Ecdaa,
    /// The attestation chain is issued by an attestation CA.
    #[serde(rename = "attca")]
    AttCa,
    /// An anonymising CA issues a per credential attestation certificate.
    #[serde(rename = "anonca")]
    AnonCa,
    /// No attestation is provided.
    #[serde(rename = "none")]
    None,
    /// An attestation type not known to this library.
    #[serde(other)]
    Unknown,
}

/// The status of an authenticator model as reported by the metadata authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthenticatorStatus {
    /// This authenticator is not FIDO certified.
    #[serde(rename = "NOT_FIDO_CERTIFIED")]
    NotFidoCertified,
    /// This authenticator has passed FIDO functional certification.
    #[serde(rename = "FIDO_CERTIFIED")]
    FidoCertified,
    /// Malware is able to bypass the user verification.
    #[serde(rename = "USER_VERIFICATION_BYPASS")]
    UserVerificationBypass,
    /// An attestation key for this authenticator is known to be compromised.
    #[serde(rename = "ATTESTATION_KEY_COMPROMISE")]
    AttestationKeyCompromise,
    /// This authenticator has identified weaknesses that allow registered keys to be
    /// compromised remotely.
    #[serde(rename = "USER_KEY_REMOTE_COMPROMISE")]
    UserKeyRemoteCompromise,
    /// This authenticator has known weaknesses in its ability to protect registered keys
    /// from an attacker with physical possession.
    #[serde(rename = "USER_KEY_PHYSICAL_COMPROMISE")]
    UserKeyPhysicalCompromise,
    /// A software or firmware update is available for the device.
    #[serde(rename = "UPDATE_AVAILABLE")]
    UpdateAvailable,
    /// The FIDO Alliance has determined that this authenticator should not be trusted.
    #[serde(rename = "REVOKED")]
    Revoked,
    /// The vendor completed and submitted the self certification checklist.
    #[serde(rename = "SELF_ASSERTION_SUBMITTED")]
    SelfAssertionSubmitted,
    /// Certified at authenticator certification level 1.
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    /// Certified at authenticator certification level 1+.
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    /// Certified at authenticator certification level 2.
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    /// Certified at authenticator certification level 2+.
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    /// Certified at authenticator certification level 3.
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    /// Certified at authenticator certification level 3+.
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    /// A status not known to this library.
    #[serde(other)]
    Unknown,
}

impl AuthenticatorStatus {
    /// Statuses that indicate the authenticator should not be relied upon.
    pub fn is_undesired(&self) -> bool {
        matches!(
            self,
            AuthenticatorStatus::AttestationKeyCompromise
                | AuthenticatorStatus::UserVerificationBypass
                | AuthenticatorStatus::UserKeyRemoteCompromise
                | AuthenticatorStatus::UserKeyPhysicalCompromise
                | AuthenticatorStatus::Revoked
        )
    }
}

impl FromStr for AuthenticatorStatus {
    type Err = MdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(MdsError::Json)
    }
}

/// A report of a change to the certification or security status of an authenticator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// The status of the authenticator.
    pub status: AuthenticatorStatus,
    /// ISO-8601 formatted date since when the status code was set.
    pub effective_date: Option<String>,
    /// The authenticatorVersion that this status report relates to.
    pub authenticator_version: Option<u32>,
    /// Base64 DER encoded certificate related to this status.
    pub certificate: Option<String>,
    /// HTTPS URL where additional information may be found.
    pub url: Option<String>,
    /// Describes the externally visible aspects of the authenticator certification evaluation.
    pub certification_descriptor: Option<String>,
    /// The unique identifier for the issued certification.
    pub certificate_number: Option<String>,
    /// The version of the authenticator certification policy.
    pub certification_policy_version: Option<String>,
    /// The version of the authenticator security requirements.
    pub certification_requirements_version: Option<String>,
}

/// ⚠️  WARNING - no biometric status reports have been seen in a published BLOB, so this
/// type is lenient in what it accepts.
///
/// The status of the FIDO biometric certification of a biometric component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BiometricStatusReport {
    /// Achieved level of the biometric certification of this biometric component.
    pub cert_level: u16,
    /// The modality of the biometric component.
    pub modality: Option<serde_json::Value>,
    /// ISO-8601 formatted date since when the cert level achieved.
    pub effective_date: Option<String>,
    /// Describes the externally visible aspects of the biometric certification evaluation.
    pub certification_descriptor: Option<String>,
    /// The unique identifier for the issued biometric certification.
    pub certificate_number: Option<String>,
    /// The version of the biometric certification policy.
    pub certification_policy_version: Option<String>,
    /// The version of the biometric requirements.
    pub certification_requirements_version: Option<String>,
}

/// Authorities occasionally publish an empty or malformed AAGUID. Such an entry is kept,
/// just not indexed by AAGUID, rather than failing the whole payload.
fn lenient_aaguid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => {
            warn!("ignoring empty aaguid");
            None
        }
        Some(serde_json::Value::String(s)) => match Uuid::parse_str(&s) {
            Ok(u) => Some(u),
            Err(e) => {
                warn!(?e, aaguid = %s, "ignoring unparsable aaguid");
                None
            }
        },
        Some(other) => {
            warn!(aaguid = %other, "ignoring aaguid that is not a string");
            None
        }
    })
}

/// A statement describing an authenticator model and its associated properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    /// Legal Header
    pub legal_header: Option<String>,
    /// The Authenticator Attestation ID, set for FIDO UAF authenticators.
    pub aaid: Option<String>,
    /// The Authenticator Attestation GUID, set for FIDO 2 authenticators.
    #[serde(default, deserialize_with = "lenient_aaguid")]
    pub aaguid: Option<Uuid>,
    /// Lower case hex attestation certificate public key identifiers, set for authenticators
    /// identified by neither aaid nor aaguid (U2F).
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    /// A human-readable, short description of the authenticator, in English.
    #[serde(default)]
    pub description: String,
    /// A list of human-readable short descriptions of the authenticator in different languages.
    #[serde(default)]
    pub alternative_descriptions: BTreeMap<String, String>,
    /// Earliest trustworthy authenticatorVersion meeting the requirements of this statement.
    #[serde(default)]
    pub authenticator_version: u32,
    /// The FIDO protocol family. If this field is missing, the assumed family is "uaf".
    #[serde(default)]
    pub protocol_family: ProtocolFamily,
    /// Version of this structure.
    #[serde(default)]
    pub schema: u16,
    /// The attestation types supported by the authenticator.
    #[serde(default)]
    pub attestation_types: Vec<AttestationType>,
    /// Base64 (not url-safe) DER trust anchors for attestation certificate chains of this
    /// model. See [`MetadataStatement::attestation_roots`].
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
    /// Every other descriptor of the statement, untouched.
    #[serde(flatten)]
    pub descriptors: BTreeMap<String, serde_json::Value>,
}

impl MetadataStatement {
    /// Decode `attestation_root_certificates` into a set of roots for verifying
    /// attestation chains produced by this authenticator model.
    pub fn attestation_roots(&self) -> MdsResult<TrustedRoots> {
        let certs = self
            .attestation_root_certificates
            .iter()
            .map(|b64| parse_base64_der_certificate(b64))
            .collect::<Result<Vec<_>, _>>()
            .map_err(MdsError::Parse)?;
        TrustedRoots::from_certs(certs).map_err(MdsError::Parse)
    }
}

/// An entry of the metadata BLOB, describing one authenticator model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayloadEntry {
    /// If this model is identified by an aaid, it will be listed here.
    pub aaid: Option<String>,
    /// Alternately, if the model is identified by an AAGUID it will be set here. Generally all
    /// FIDO2 devices will use aaguid.
    #[serde(default, deserialize_with = "lenient_aaguid")]
    pub aaguid: Option<Uuid>,
    /// The attestation certificate public key identifiers of U2F models, as lower case hex.
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    /// The statement pertaining to this model.
    pub metadata_statement: MetadataStatement,
    /// Status of the FIDO biometric certification of the model's biometric components.
    #[serde(default)]
    pub biometric_status_reports: Vec<BiometricStatusReport>,
    /// An array of status reports applicable to this authenticator.
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    /// ISO-8601 formatted date since when the status report array was set to the current value.
    pub time_of_last_status_change: Option<String>,
    /// URL of a list of rogue (i.e. untrusted) individual authenticators.
    #[serde(rename = "rogueListURL")]
    pub rogue_list_url: Option<String>,
    /// The hash of the rogue list available at `rogue_list_url`.
    pub rogue_list_hash: Option<String>,
}

impl MetadataBlobPayloadEntry {
    /// Does this entry list `key_id` as one of its attestation certificate key identifiers.
    pub fn has_key_identifier(&self, key_id: &str) -> bool {
        self.attestation_certificate_key_identifiers
            .as_ref()
            .map(|ids| ids.iter().any(|id| id == key_id))
            .unwrap_or(false)
    }

    /// The most recent status report, by effective date. Reports sharing the latest date
    /// resolve to the one listed last.
    pub fn latest_status(&self) -> Option<&StatusReport> {
        self.status_reports
            .iter()
            .max_by(|a, b| a.effective_date.cmp(&b.effective_date))
    }
}

impl fmt::Display for MetadataBlobPayloadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "MetadataBlobPayloadEntry {s}")
    }
}

/// The verified claims of the metadata BLOB.
///
/// Values of this type are only produced by [`verify_metadata_blob`](crate::verify_metadata_blob),
/// which guarantees the payload was signed by a chain anchored in a trusted root, and that
/// it passed [`MetadataBlobPayload::validate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayload {
    /// The legal header.
    #[serde(default)]
    pub legal_header: String,
    /// The serial number of this BLOB. Serial numbers are consecutive and strictly monotonic.
    pub no: u32,
    /// ISO-8601 formatted date when the next update will be provided at latest.
    pub next_update: String,
    /// The set of authenticator entries, in the order published.
    pub entries: Vec<MetadataBlobPayloadEntry>,
}

impl MetadataBlobPayload {
    /// Structural checks that the signature can not express.
    pub fn validate(&self) -> MdsResult<()> {
        if self.entries.is_empty() {
            return Err(MdsError::StructuralInvalidity(
                "entries must not be empty",
            ));
        }
        Ok(())
    }

    /// `next_update` as a calendar date, if it is a well formed ISO-8601 date.
    pub fn next_update_date(&self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(&self.next_update, "%Y-%m-%d").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_json() -> serde_json::Value {
        serde_json::json!({
            "aaguid": "3b1adb99-0dfe-46fd-90b8-7f7614a4de2a",
            "metadataStatement": {
                "legalHeader": "https://fidoalliance.org/metadata/metadata-statement-legal-header/",
                "aaguid": "3b1adb99-0dfe-46fd-90b8-7f7614a4de2a",
                "description": "GoTrust Idem Key FIDO2 Authenticator",
                "authenticatorVersion": 1,
                "protocolFamily": "fido2",
                "schema": 3,
                "upv": [{ "major": 1, "minor": 0 }],
                "attestationTypes": ["basic_full"],
                "attestationRootCertificates": [],
                "keyProtection": ["hardware", "secure_element"],
                "tcDisplayPNGCharacteristics": [{ "width": 200, "height": 400 }]
            },
            "statusReports": [
                { "status": "FIDO_CERTIFIED_L1", "effectiveDate": "2022-03-01" },
                { "status": "REVOKED", "effectiveDate": "2023-01-01" },
                { "status": "NOT_FIDO_CERTIFIED", "effectiveDate": "2021-12-01" }
            ],
            "timeOfLastStatusChange": "2023-01-01"
        })
    }

    #[test]
    fn entry_parses_with_opaque_descriptors() {
        let entry: MetadataBlobPayloadEntry =
            serde_json::from_value(entry_json()).expect("entry must parse");

        assert_eq!(
            entry.aaguid,
            Some(uuid::uuid!("3b1adb99-0dfe-46fd-90b8-7f7614a4de2a"))
        );
        let stmt = &entry.metadata_statement;
        assert_eq!(stmt.protocol_family, ProtocolFamily::Fido2);
        assert_eq!(stmt.attestation_types, vec![AttestationType::BasicFull]);
        assert!(stmt.descriptors.contains_key("keyProtection"));
        assert!(stmt.descriptors.contains_key("tcDisplayPNGCharacteristics"));
        assert!(stmt.descriptors.contains_key("upv"));

        // Nothing is lost when the entry is written back out.
        let again: MetadataBlobPayloadEntry =
            serde_json::from_str(&serde_json::to_string(&entry).expect("ser")).expect("de");
        assert_eq!(entry, again);
    }

    #[test]
    fn odd_aaguids_are_dropped_not_fatal() {
        for aaguid in [
            serde_json::json!(""),
            serde_json::json!("not-a-uuid"),
            serde_json::json!(42),
            serde_json::Value::Null,
        ] {
            let entry: MetadataBlobPayloadEntry = serde_json::from_value(serde_json::json!({
                "aaguid": aaguid,
                "metadataStatement": { "aaguid": aaguid, "description": "odd" }
            }))
            .expect("entry must parse");
            assert_eq!(entry.aaguid, None);
            assert_eq!(entry.metadata_statement.aaguid, None);
        }

        // Unhyphenated and upper case forms are still UUIDs.
        let entry: MetadataBlobPayloadEntry = serde_json::from_value(serde_json::json!({
            "aaguid": "3B1ADB990DFE46FD90B87F7614A4DE2A",
            "metadataStatement": {}
        }))
        .expect("entry must parse");
        assert_eq!(
            entry.aaguid,
            Some(uuid::uuid!("3b1adb99-0dfe-46fd-90b8-7f7614a4de2a"))
        );
        assert_eq!(entry.metadata_statement.description, "");
    }

    #[test]
    fn latest_status_is_by_effective_date() {
        let entry: MetadataBlobPayloadEntry =
            serde_json::from_value(entry_json()).expect("entry must parse");
        let latest = entry.latest_status().expect("has reports");
        assert_eq!(latest.status, AuthenticatorStatus::Revoked);
        assert!(latest.status.is_undesired());
    }

    #[test]
    fn unknown_enum_values_are_tolerated() {
        let status: AuthenticatorStatus =
            serde_json::from_str("\"SOMETHING_NEW\"").expect("status");
        assert_eq!(status, AuthenticatorStatus::Unknown);
        assert!(!status.is_undesired());

        let family: ProtocolFamily = serde_json::from_str("\"fido3\"").expect("family");
        assert_eq!(family, ProtocolFamily::Unknown);
    }

    #[test]
    fn status_from_str() {
        assert_eq!(
            AuthenticatorStatus::from_str("USER_VERIFICATION_BYPASS").expect("status"),
            AuthenticatorStatus::UserVerificationBypass
        );
        assert!(AuthenticatorStatus::from_str("FIDO_CERTIFIED_L2plus")
            .map(|s| !s.is_undesired())
            .unwrap_or(false));
    }

    #[test]
    fn key_identifiers_match_exactly() {
        let entry: MetadataBlobPayloadEntry = serde_json::from_value(serde_json::json!({
            "attestationCertificateKeyIdentifiers": [
                "fd36573d24be3f7f32ad5040271ab61035a1fcad",
                "bf7bcaa0d0c6187a8c6abbdd16a15640e7c7bde2"
            ],
            "metadataStatement": { "description": "U2F key", "protocolFamily": "u2f" }
        }))
        .expect("entry must parse");

        assert!(entry.has_key_identifier("bf7bcaa0d0c6187a8c6abbdd16a15640e7c7bde2"));
        assert!(!entry.has_key_identifier("BF7BCAA0D0C6187A8C6ABBDD16A15640E7C7BDE2"));
        assert!(!entry.has_key_identifier("bf7bcaa0"));
    }

    #[test]
    fn empty_entries_are_invalid() {
        let payload = MetadataBlobPayload {
            legal_header: "legal".to_string(),
            no: 1,
            next_update: "2024-05-01".to_string(),
            entries: vec![],
        };
        assert!(matches!(
            payload.validate(),
            Err(MdsError::StructuralInvalidity(_))
        ));
        assert_eq!(
            payload.next_update_date(),
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        );
    }

    #[test]
    fn attestation_roots_decode() {
        let root = fido_pki::testing::TestCert::root("Attestation Root");
        let b64 = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(root.cert.to_der().expect("der"))
        };
        let stmt: MetadataStatement = serde_json::from_value(serde_json::json!({
            "description": "key",
            "attestationRootCertificates": [b64],
        }))
        .expect("statement");

        let roots = stmt.attestation_roots().expect("roots");
        assert_eq!(roots.len(), 1);

        let bad: MetadataStatement = serde_json::from_value(serde_json::json!({
            "description": "key",
            "attestationRootCertificates": ["bm90IGEgY2VydA=="],
        }))
        .expect("statement");
        assert!(matches!(bad.attestation_roots(), Err(MdsError::Parse(_))));
    }
}
