//! Helpers that mint certificates, chains and signed JWS containers on the fly, so that
//! tests never depend on material whose validity window lapses.
//!
//! Enabled by the `testing` feature. Everything here panics on failure.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Extension, X509NameBuilder, X509Ref, X509};
use std::time::{SystemTime, UNIX_EPOCH};

/// Key types a test certificate can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyKind {
    /// ECDSA over P-256.
    #[default]
    EcP256,
    /// ECDSA over P-384.
    EcP384,
    /// ECDSA over P-521.
    EcP521,
    /// RSA 2048.
    Rsa2048,
}

/// Generate a fresh private key.
pub fn generate_key(kind: KeyKind) -> PKey<Private> {
    let curve = match kind {
        KeyKind::EcP256 => Nid::X9_62_PRIME256V1,
        KeyKind::EcP384 => Nid::SECP384R1,
        KeyKind::EcP521 => Nid::SECP521R1,
        KeyKind::Rsa2048 => {
            let rsa = Rsa::generate(2048).expect("rsa keygen");
            return PKey::from_rsa(rsa).expect("rsa pkey");
        }
    };
    let group = EcGroup::from_curve_name(curve).expect("ec group");
    let eckey = EcKey::generate(&group).expect("ec keygen");
    PKey::from_ec_key(eckey).expect("ec pkey")
}

/// Options for minting leaf certificates.
#[derive(Debug, Clone, Default)]
pub struct LeafOptions {
    /// The key type of the leaf.
    pub key: KeyKind,
    /// A hex serial number. A random serial is used when unset.
    pub serial_hex: Option<String>,
    /// URIs placed in the CRL distribution points extension.
    pub crl_distribution_points: Vec<String>,
    /// Produce a certificate whose validity window has already ended.
    pub expired: bool,
}

/// A certificate together with its private key.
pub struct TestCert {
    /// The certificate.
    pub cert: X509,
    /// The certificate's private key.
    pub key: PKey<Private>,
}

impl TestCert {
    /// A self signed root CA.
    pub fn root(cn: &str) -> Self {
        let key = generate_key(KeyKind::EcP256);
        let cert = mint(cn, &key, None, true, &LeafOptions::default());
        TestCert { cert, key }
    }

    /// An intermediate CA issued by `issuer`.
    pub fn intermediate(cn: &str, issuer: &TestCert) -> Self {
        let key = generate_key(KeyKind::EcP256);
        let cert = mint(cn, &key, Some(issuer), true, &LeafOptions::default());
        TestCert { cert, key }
    }

    /// An end entity certificate issued by `issuer`.
    pub fn leaf(cn: &str, issuer: &TestCert) -> Self {
        Self::leaf_with(cn, issuer, LeafOptions::default())
    }

    /// An end entity certificate issued by `issuer` with the supplied options.
    pub fn leaf_with(cn: &str, issuer: &TestCert, opts: LeafOptions) -> Self {
        let key = generate_key(opts.key);
        let cert = mint(cn, &key, Some(issuer), false, &opts);
        TestCert { cert, key }
    }

    /// The certificate as PEM.
    pub fn pem(&self) -> Vec<u8> {
        self.cert.to_pem().expect("pem")
    }
}

fn mint(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<&TestCert>,
    ca: bool,
    opts: &LeafOptions,
) -> X509 {
    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "fido-pki tests")
        .expect("o");
    name.append_entry_by_nid(Nid::COMMONNAME, cn).expect("cn");
    let name = name.build();

    let serial = match &opts.serial_hex {
        Some(hex) => BigNum::from_hex_str(hex).expect("serial hex"),
        None => {
            let mut serial = BigNum::new().expect("bignum");
            serial.rand(64, MsbOption::MAYBE_ZERO, false).expect("rand");
            serial
        }
    };

    let mut builder = X509::builder().expect("x509 builder");
    builder.set_version(2).expect("version");
    builder
        .set_serial_number(&serial.to_asn1_integer().expect("asn1 serial"))
        .expect("serial");
    builder.set_subject_name(&name).expect("subject");
    match issuer {
        Some(issuer) => builder
            .set_issuer_name(issuer.cert.subject_name())
            .expect("issuer"),
        None => builder.set_issuer_name(&name).expect("issuer"),
    }
    builder.set_pubkey(key).expect("pubkey");

    if opts.expired {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_secs() as i64;
        builder
            .set_not_before(&Asn1Time::from_unix((now - 10 * 86400) as _).expect("time"))
            .expect("not before");
        builder
            .set_not_after(&Asn1Time::from_unix((now - 86400) as _).expect("time"))
            .expect("not after");
    } else {
        builder
            .set_not_before(&Asn1Time::days_from_now(0).expect("time"))
            .expect("not before");
        builder
            .set_not_after(&Asn1Time::days_from_now(2).expect("time"))
            .expect("not after");
    }

    if ca {
        let basic_constraints = BasicConstraints::new().critical().ca().build().expect("bc");
        builder.append_extension(basic_constraints).expect("bc");
        let key_usage = KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()
            .expect("ku");
        builder.append_extension(key_usage).expect("ku");
    } else {
        let basic_constraints = BasicConstraints::new().critical().build().expect("bc");
        builder.append_extension(basic_constraints).expect("bc");
        let key_usage = KeyUsage::new()
            .critical()
            .digital_signature()
            .build()
            .expect("ku");
        builder.append_extension(key_usage).expect("ku");
    }

    if !opts.crl_distribution_points.is_empty() {
        let value = opts
            .crl_distribution_points
            .iter()
            .map(|uri| format!("URI:{uri}"))
            .collect::<Vec<_>>()
            .join(",");
        #[allow(deprecated)]
        let cdp = {
            let ctx = builder.x509v3_context(issuer.map(|i| &*i.cert), None);
            X509Extension::new_nid(None, Some(&ctx), Nid::CRL_DISTRIBUTION_POINTS, &value)
                .expect("cdp")
        };
        builder.append_extension(cdp).expect("cdp");
    }

    let signing_key = issuer.map(|i| &i.key).unwrap_or(key);
    builder
        .sign(signing_key, MessageDigest::sha256())
        .expect("sign");
    builder.build()
}

/// A JWS protected header carrying `alg` and the chain as standard base64 `x5c`.
pub fn jws_header(alg: &str, chain: &[&X509Ref]) -> serde_json::Value {
    let x5c: Vec<String> = chain
        .iter()
        .map(|crt| STANDARD.encode(crt.to_der().expect("der")))
        .collect();
    serde_json::json!({
        "alg": alg,
        "typ": "JWT",
        "x5c": x5c,
    })
}

/// Produce a compact JWS over `payload` with the given protected header.
///
/// The digest and signature encoding follow the header's `alg`: ECDSA signatures are
/// emitted as raw `r || s` as JWS requires. Unknown algorithms are signed with SHA-256
/// so that tests can exercise algorithm rejection.
pub fn sign_compact_jws(header: &serde_json::Value, payload: &[u8], key: &PKey<Private>) -> String {
    let alg = header
        .get("alg")
        .and_then(|a| a.as_str())
        .unwrap_or_default();

    let digest = match alg {
        "ES384" | "RS384" => MessageDigest::sha384(),
        "ES512" | "RS512" => MessageDigest::sha512(),
        _ => MessageDigest::sha256(),
    };

    let hdr_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).expect("header json"));
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{hdr_b64}.{payload_b64}");

    let mut signer = Signer::new(digest, key).expect("signer");
    signer
        .update(signing_input.as_bytes())
        .expect("signer update");
    let der_sig = signer.sign_to_vec().expect("sign");

    let sig = match key.ec_key() {
        Ok(eckey) => {
            let width = match eckey.group().curve_name() {
                Some(Nid::SECP384R1) => 48,
                Some(Nid::SECP521R1) => 66,
                _ => 32,
            };
            let ecdsa = EcdsaSig::from_der(&der_sig).expect("ecdsa der");
            let mut raw = ecdsa.r().to_vec_padded(width).expect("r");
            raw.extend(ecdsa.s().to_vec_padded(width).expect("s"));
            raw
        }
        Err(_) => der_sig,
    };

    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig))
}
