use openssl::version::{number, version};

fn main() {
    // CRL parsing and CRL distribution point access need OpenSSL 3. LibreSSL reports
    // as OpenSSL v2 (which was skipped), so it is refused here too.
    #[allow(clippy::unusual_byte_groupings)]
    if number() < 0x3_00_00_00_0 {
        println!(
            r#"
The installed OpenSSL is too old for fido-pki.

Please upgrade to OpenSSL v3.0.0 or later.

OpenSSL version string: {}
"#,
            version(),
        );
        panic!("The installed version of OpenSSL is unusable.");
    }
}
