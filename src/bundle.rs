//! Public certificate files and password-protected PKCS#12 archives.

use std::path::{Path, PathBuf};

use p12_keystore::{
    Certificate as P12Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain,
};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::algorithm::KeyAlgorithm;
use crate::cert::Certificate;
use crate::config::KeyToolsConfig;
use crate::error::{KeyToolsError, Result};
use crate::key::PrivateKey;

pub const MIN_PASSWORD_LEN: usize = 12;
pub const MAX_PASSWORD_LEN: usize = 16;

pub const INTERMEDIATE_FILE: &str = "intermediate.cer";
pub const ROOT_FILE: &str = "root.cer";

/// The two CA certificates above a leaf, intermediate first.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    pub intermediate: Certificate,
    pub root: Certificate,
}

impl CertificateChain {
    /// Loads the chain configured for `algorithm` in the configured environment.
    pub fn load(config: &KeyToolsConfig, algorithm: KeyAlgorithm) -> Result<Self> {
        let environment = config.ca_environment();
        debug!(algorithm = %algorithm, environment = ?environment, "loading CA chain");
        Self::load_from_dir(&config.chain_dir_for(algorithm, environment))
    }

    /// Loads `intermediate.cer` and `root.cer` (PEM or DER) from `dir`.
    ///
    /// # Errors
    /// `Bundle` when a file is missing or unparseable.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Ok(Self {
            intermediate: load_chain_file(&dir.join(INTERMEDIATE_FILE))?,
            root: load_chain_file(&dir.join(ROOT_FILE))?,
        })
    }

    /// The chain in PKCS#12 embedding order.
    pub fn certificates(&self) -> [&Certificate; 2] {
        [&self.intermediate, &self.root]
    }
}

fn load_chain_file(path: &Path) -> Result<Certificate> {
    let bytes = std::fs::read(path).map_err(|e| {
        KeyToolsError::Bundle(format!("CA chain file {} unavailable: {e}", path.display()))
    })?;
    Certificate::from_bytes(&bytes).map_err(|e| {
        KeyToolsError::Bundle(format!("CA chain file {} invalid: {e}", path.display()))
    })
}

/// Rejects archive passwords outside 12..=16 characters.
pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        Ok(())
    } else {
        Err(KeyToolsError::Validation("密码长度应为12-16位".to_string()))
    }
}

/// PKCS#12 friendly name for a serial number.
pub fn alias_for(serial_no: &str) -> String {
    format!("{{{serial_no}}}")
}

/// Writes the PEM text verbatim to `{dir}/{serial_no}.cer`, creating `dir`.
pub fn write_public_cert(cert_pem: &str, serial_no: &str, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{serial_no}.cer"));
    std::fs::write(&path, cert_pem)?;
    debug!(path = %path.display(), "public certificate written");
    Ok(path)
}

/// Writes `{dir}/{serial_no}.pfx` holding the private key, the leaf
/// certificate and the chain from `chain_dir`, encrypted with `password`.
///
/// An existing archive is returned untouched; the chain is only read when a
/// new archive is written.
///
/// # Errors
/// `Validation` for a bad password, `Bundle` for chain or serialization
/// failures, `Decode` for an unparseable certificate.
pub fn write_pkcs12(
    private_key: &PrivateKey,
    cert_pem: &str,
    chain_dir: &Path,
    password: &str,
    serial_no: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let path = dir.join(format!("{serial_no}.pfx"));
    if path.exists() {
        debug!(path = %path.display(), "PKCS#12 archive already present");
        return Ok(path);
    }
    validate_password(password)?;

    let leaf = Certificate::from_pem(cert_pem)?;
    let chain = CertificateChain::load_from_dir(chain_dir)?;
    let archive = build_pkcs12(private_key, &leaf, &chain, password, &alias_for(serial_no))?;

    std::fs::create_dir_all(dir)?;
    let partial = dir.join(format!("{serial_no}.pfx.partial"));
    std::fs::write(&partial, &archive)?;
    std::fs::rename(&partial, &path)?;
    info!(path = %path.display(), "PKCS#12 archive written");
    Ok(path)
}

/// Serializes the archive bytes; leaf first, then intermediate, then root.
pub fn build_pkcs12(
    private_key: &PrivateKey,
    leaf: &Certificate,
    chain: &CertificateChain,
    password: &str,
    alias: &str,
) -> Result<Vec<u8>> {
    let key_der = private_key.to_pkcs8_der()?;
    let leaf_der = leaf.to_der()?;
    let local_key_id = Sha1::digest(&leaf_der).to_vec();

    let mut certificates = vec![to_p12_certificate(&leaf_der)?];
    for certificate in chain.certificates() {
        certificates.push(to_p12_certificate(&certificate.to_der()?)?);
    }

    let mut store = KeyStore::new();
    store.add_entry(
        alias,
        KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(&key_der, &local_key_id, certificates)),
    );
    store
        .writer(password)
        .write()
        .map_err(|e| KeyToolsError::Bundle(format!("PKCS#12 serialization failed: {e}")))
}

fn to_p12_certificate(der: &[u8]) -> Result<P12Certificate> {
    P12Certificate::from_der(der)
        .map_err(|e| KeyToolsError::Bundle(format!("certificate rejected by PKCS#12 writer: {e}")))
}
