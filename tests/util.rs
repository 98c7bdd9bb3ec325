#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cfca_keytools::algorithm::{ContainerFormat, KeyAlgorithm};
use cfca_keytools::ca_client::{CertificateAuthority, IssuedCertificate};
use cfca_keytools::config::KeyToolsConfig;
use cfca_keytools::error::{KeyToolsError, Result};
use cfca_keytools::issuance::CertificateIssuer;
use cfca_keytools::key::{GenerateOptions, GeneratedKeyPair, generate};
use cfca_keytools::pem_utils::wrap_certificate;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509, X509Name, X509NameRef, X509Req};
use tempfile::TempDir;

pub const PASSWORD: &str = "qwertyuiop[]";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key_pair(algorithm: KeyAlgorithm, container_format: ContainerFormat) -> GeneratedKeyPair {
    generate(&GenerateOptions {
        algorithm,
        container_format,
        persist: false,
    })
    .unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509Name::builder().unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

fn build_cert(
    subject: &X509NameRef,
    issuer: &X509NameRef,
    public_key: &PKeyRef<Public>,
    signer: &PKeyRef<Private>,
    is_ca: bool,
) -> X509 {
    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(subject).unwrap();
    builder.set_issuer_name(issuer).unwrap();
    builder.set_pubkey(public_key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn public_half(key: &PKey<Private>) -> PKey<Public> {
    PKey::public_key_from_der(&key.public_key_to_der().unwrap()).unwrap()
}

/// A two-level CA standing in for CFCA: signs leaf certificates from our
/// certification requests and provides the chain files.
pub struct TestCa {
    pub root: X509,
    pub intermediate: X509,
    intermediate_key: PKey<Private>,
}

impl TestCa {
    pub fn new() -> Self {
        let root_key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let root_name = name("Test CFCA Root");
        let root = build_cert(&root_name, &root_name, &public_half(&root_key), &root_key, true);

        let intermediate_key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let intermediate = build_cert(
            &name("Test CFCA OCA"),
            &root_name,
            &public_half(&intermediate_key),
            &root_key,
            true,
        );

        Self {
            root,
            intermediate,
            intermediate_key,
        }
    }

    /// Writes the chain for both algorithms and environments under
    /// `config_dir`; the intermediate as PEM, the root as DER.
    pub fn install_chain(&self, config_dir: &Path) {
        for environment in ["prod", "qa"] {
            for algorithm in ["rsa", "sm2"] {
                let dir = config_dir.join("chain").join(environment).join(algorithm);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("intermediate.cer"), self.intermediate.to_pem().unwrap())
                    .unwrap();
                std::fs::write(dir.join("root.cer"), self.root.to_der().unwrap()).unwrap();
            }
        }
    }

    /// Issues a leaf certificate for the public key in a base64 DER request.
    pub fn sign_csr(&self, csr_b64: &str) -> X509 {
        let request = X509Req::from_der(&STANDARD.decode(csr_b64).unwrap()).unwrap();
        let public_key = request.public_key().unwrap();
        assert!(request.verify(&public_key).unwrap(), "request signature");
        build_cert(
            &name("merchant"),
            self.intermediate.subject_name(),
            &public_key,
            &self.intermediate_key,
            false,
        )
    }

    /// The certificate text the gateway returns: one unwrapped base64 line.
    pub fn issue_pem(&self, csr_b64: &str) -> String {
        wrap_certificate(&STANDARD.encode(self.sign_csr(csr_b64).to_der().unwrap()))
    }
}

/// In-process authority that counts submissions.
pub struct FakeAuthority {
    pub ca: TestCa,
    calls: AtomicUsize,
    rejection: Option<KeyToolsError>,
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self {
            ca: TestCa::new(),
            calls: AtomicUsize::new(0),
            rejection: None,
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            rejection: Some(KeyToolsError::Ca(message.to_string())),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CertificateAuthority for FakeAuthority {
    fn submit(&self, serial_no: &str, _auth_code: &str, csr_b64: &str) -> Result<IssuedCertificate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.rejection {
            return Err(err.clone());
        }
        Ok(IssuedCertificate {
            pem_text: self.ca.issue_pem(csr_b64),
            serial_no: serial_no.to_string(),
        })
    }
}

/// Temporary cert/key/config roots with the test chain installed.
pub struct Fixture {
    pub dir: TempDir,
    pub config: KeyToolsConfig,
    pub authority: Arc<FakeAuthority>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_authority(FakeAuthority::new())
    }

    pub fn with_authority(authority: FakeAuthority) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = KeyToolsConfig::builder()
            .cert_dir(dir.path().join("certs"))
            .key_dir(dir.path().join("keys"))
            .config_dir(dir.path().join("config"))
            .build();
        authority.ca.install_chain(&config.config_dir);
        Self {
            dir,
            config,
            authority: Arc::new(authority),
        }
    }

    pub fn issuer(&self) -> CertificateIssuer {
        CertificateIssuer::new(self.config.clone(), self.authority.clone())
    }
}
