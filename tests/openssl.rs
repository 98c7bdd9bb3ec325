mod util;

use cfca_keytools::algorithm::{ContainerFormat, KeyAlgorithm};
use cfca_keytools::bundle::{CertificateChain, alias_for, build_pkcs12};
use cfca_keytools::cert::Certificate;
use cfca_keytools::csr::build_csr_der;
use cfca_keytools::key::{PrivateKey, decode_private};
use cfca_keytools::pem_utils::der_to_pem;
use openssl::pkcs12::Pkcs12;
use openssl::x509::X509Req;
use regex::Regex;
use std::process::Command;
use util::{PASSWORD, TestCa, key_pair};

fn private_key(algorithm: KeyAlgorithm) -> PrivateKey {
    let pair = key_pair(algorithm, ContainerFormat::Pkcs8);
    decode_private(&pair.private_b64, algorithm).unwrap()
}

#[test]
fn test_openssl_validate_csr() {
    let key = private_key(KeyAlgorithm::RsaClass);
    let csr_pem = der_to_pem(&build_csr_der(&key).unwrap(), "CERTIFICATE REQUEST");

    let dir = tempfile::tempdir().unwrap();
    let csr_path = dir.path().join("request.pem");
    std::fs::write(&csr_path, csr_pem).expect("Failed to write request");

    // Use OpenSSL CLI to check the request signature and dump its fields
    let output = Command::new("openssl")
        .arg("req")
        .arg("-in")
        .arg(&csr_path)
        .arg("-noout")
        .arg("-verify")
        .arg("-text")
        .output()
        .expect("Failed to execute OpenSSL command");

    assert!(
        output.status.success(),
        "OpenSSL command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output_text = String::from_utf8_lossy(&output.stdout);
    let key_size = Regex::new(r"Public-Key: \(2048 bit\)").unwrap();
    assert!(key_size.is_match(&output_text), "Key size is incorrect");
    assert!(
        output_text.contains("sha256WithRSAEncryption"),
        "Signature Algorithm field is incorrect"
    );
}

#[test]
fn test_openssl_crate_validate_csr() {
    for algorithm in [KeyAlgorithm::RsaClass, KeyAlgorithm::EcNationalClass] {
        let key = private_key(algorithm);
        let request = X509Req::from_der(&build_csr_der(&key).unwrap()).expect("Failed to parse DER");

        let public_key = request.public_key().unwrap();
        assert!(request.verify(&public_key).unwrap(), "Request signature mismatch");
        assert_eq!(request.version(), 0, "PKCS#10 version should be 1 (0-based)");
        assert_eq!(
            request.subject_name().entries().count(),
            0,
            "Subject should be empty"
        );
        assert_eq!(
            public_key.public_key_to_der().unwrap(),
            key.public_key().to_spki_der().unwrap(),
            "Public key mismatch"
        );
    }
}

#[test]
fn test_openssl_crate_reads_pkcs12() {
    let ca = TestCa::new();
    let dir = tempfile::tempdir().unwrap();
    ca.install_chain(dir.path());
    let chain = CertificateChain::load_from_dir(&dir.path().join("chain/prod/rsa")).unwrap();

    let key = private_key(KeyAlgorithm::RsaClass);
    let csr = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        build_csr_der(&key).unwrap(),
    );
    let leaf = Certificate::from_pem(&ca.issue_pem(&csr)).unwrap();

    let archive = build_pkcs12(&key, &leaf, &chain, PASSWORD, &alias_for("4923287028")).unwrap();
    let parsed = Pkcs12::from_der(&archive)
        .expect("Failed to parse PKCS#12")
        .parse2(PASSWORD)
        .expect("Failed to decrypt PKCS#12");

    let pkey = parsed.pkey.expect("Missing private key");
    assert_eq!(
        pkey.public_key_to_der().unwrap(),
        key.public_key().to_spki_der().unwrap(),
        "Private key mismatch"
    );

    let cert = parsed.cert.expect("Missing leaf certificate");
    assert_eq!(cert.to_der().unwrap(), leaf.to_der().unwrap(), "Leaf mismatch");

    let ca_certs = parsed.ca.expect("Missing CA chain");
    let mut ca_ders: Vec<Vec<u8>> = ca_certs.iter().map(|c| c.to_der().unwrap()).collect();
    ca_ders.sort();
    let mut expected = vec![ca.intermediate.to_der().unwrap(), ca.root.to_der().unwrap()];
    expected.sort();
    assert_eq!(ca_ders, expected, "Chain mismatch");

    assert!(
        Pkcs12::from_der(&archive).unwrap().parse2("wrong-password").is_err(),
        "Wrong password accepted"
    );
}
