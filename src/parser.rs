//! Key extraction from existing certificate files.
//!
//! `.pfx`/`.p12` archives yield the private key (re-exported as PKCS#8) and
//! the leaf certificate's public key; `.cer`/`.pem` files, PEM or DER, yield
//! the public key only.

use std::path::Path;

use p12_keystore::{KeyStore, KeyStoreEntry};
use tracing::{debug, info};

use crate::algorithm::{DetectedAlgorithm, KeyAlgorithm};
use crate::cert::Certificate;
use crate::error::{KeyToolsError, Result};
use crate::pem_utils::encode_b64;
use crate::validate::{detect_certificate, detect_private_key};

pub const MSG_PARSED: &str = "解析成功";
pub const MSG_NO_FILE: &str = "请至少提供一个证书文件（pfx_cert 或 pub_cert）";
pub const MSG_NO_KEYS: &str = "未能从证书中解析出任何密钥";

/// Keys found in one certificate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    pub detected: DetectedAlgorithm,
    pub private_b64: Option<String>,
    pub public_b64: Option<String>,
}

/// Merged result of [`extract_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedKeys {
    /// `解析成功`, or the warnings and per-file notes collected on the way.
    pub message: String,
    pub private_key_b64: Option<String>,
    pub public_key_b64: Option<String>,
}

/// Parses one certificate file, choosing the format by extension.
///
/// # Errors
/// `Decode` for unsupported extensions, a wrong password or corrupt content;
/// `Io` when the file cannot be read.
pub fn parse_certificate_file(path: &Path, password: Option<&str>) -> Result<ParsedCertificate> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let data = std::fs::read(path)?;

    match extension.as_str() {
        "pfx" | "p12" => parse_pkcs12(&data, password.unwrap_or_default()),
        "cer" | "pem" => parse_public_cert(&data),
        _ => Err(KeyToolsError::Decode(format!("不支持的证书格式: .{extension}"))),
    }
}

fn parse_pkcs12(data: &[u8], password: &str) -> Result<ParsedCertificate> {
    let store = KeyStore::from_pkcs12(data, password)
        .map_err(|e| KeyToolsError::Decode(format!("PKCS#12: {e}")))?;

    let Some((alias, chain)) = store.private_key_chain() else {
        return certificate_only(&store);
    };
    debug!(alias, certificates = chain.chain().len(), "PKCS#12 key entry found");

    // The key bag already holds a PKCS#8 PrivateKeyInfo.
    let private_der = chain.key().to_vec();
    pkcs8::PrivateKeyInfo::try_from(private_der.as_slice())
        .map_err(|e| KeyToolsError::Decode(format!("PKCS#12 private key: {e}")))?;
    let detected = detect_private_key(&private_der);

    let public_b64 = match chain.chain().first() {
        Some(leaf) => Some(encode_b64(
            &Certificate::from_der(leaf.as_der())?.spki_der()?,
        )),
        None => None,
    };

    Ok(ParsedCertificate {
        detected,
        private_b64: Some(encode_b64(&private_der)),
        public_b64,
    })
}

/// An archive without a key entry still yields its first certificate's public key.
fn certificate_only(store: &KeyStore) -> Result<ParsedCertificate> {
    let first = store.entries().find_map(|(_, entry)| match entry {
        KeyStoreEntry::Certificate(certificate) => Some(certificate),
        _ => None,
    });
    let Some(first) = first else {
        debug!("PKCS#12 archive holds neither keys nor certificates");
        return Ok(ParsedCertificate {
            detected: DetectedAlgorithm::Unknown,
            private_b64: None,
            public_b64: None,
        });
    };

    let certificate = Certificate::from_der(first.as_der())?;
    debug!("PKCS#12 archive has no key entry, using its certificate");
    Ok(ParsedCertificate {
        detected: detect_certificate(&certificate),
        private_b64: None,
        public_b64: Some(encode_b64(&certificate.spki_der()?)),
    })
}

fn parse_public_cert(data: &[u8]) -> Result<ParsedCertificate> {
    let certificate = Certificate::from_bytes(data)?;
    let spki = certificate.spki_der()?;
    Ok(ParsedCertificate {
        detected: detect_certificate(&certificate),
        private_b64: None,
        public_b64: Some(encode_b64(&spki)),
    })
}

/// Extracts keys from a PKCS#12 archive, a public certificate, or both.
///
/// A public key from `cer_path` takes precedence over the archive's leaf
/// certificate. An algorithm that differs from `algorithm` and a missing file
/// next to a readable one are reported in `message`, not as errors.
///
/// # Errors
/// `Validation` when no file is given or every given file is missing;
/// the parse error of the first unreadable file otherwise.
pub fn extract_keys(
    algorithm: KeyAlgorithm,
    pfx_path: Option<&Path>,
    cer_path: Option<&Path>,
    password: Option<&str>,
) -> Result<ExtractedKeys> {
    if pfx_path.is_none() && cer_path.is_none() {
        return Err(KeyToolsError::Validation(MSG_NO_FILE.to_string()));
    }

    let pfx = pfx_path.filter(|path| path.exists());
    let cer = cer_path.filter(|path| path.exists());
    let mut missing = Vec::new();
    if let (Some(path), None) = (pfx_path, pfx) {
        missing.push(format!("私钥证书文件不存在: {}", path.display()));
    }
    if let (Some(path), None) = (cer_path, cer) {
        missing.push(format!("公钥证书文件不存在: {}", path.display()));
    }
    if pfx.is_none() && cer.is_none() {
        return Err(KeyToolsError::Validation(missing.join("，")));
    }

    let mut warning: Option<String> = None;
    let mut private_key_b64 = None;
    let mut public_key_b64 = None;

    if let Some(path) = pfx {
        let parsed = parse_certificate_file(path, password)?;
        if !algorithm.matches(parsed.detected) {
            warning = Some(format!(
                "警告：PFX证书中检测到的算法类型({})与指定的算法类型({algorithm})不匹配",
                parsed.detected
            ));
        }
        private_key_b64 = parsed.private_b64;
        public_key_b64 = parsed.public_b64;
    }

    if let Some(path) = cer {
        let parsed = parse_certificate_file(path, None)?;
        if !algorithm.matches(parsed.detected) {
            let note = format!(
                "CER证书中检测到的算法类型({})与指定的算法类型({algorithm})不匹配",
                parsed.detected
            );
            warning = Some(match warning {
                Some(existing) => format!("{existing}，{note}"),
                None => format!("警告：{note}"),
            });
        }
        if parsed.public_b64.is_some() {
            public_key_b64 = parsed.public_b64;
        }
    }

    let message = if private_key_b64.is_none() && public_key_b64.is_none() {
        MSG_NO_KEYS.to_string()
    } else {
        let notes: Vec<String> = warning.into_iter().chain(missing).collect();
        if notes.is_empty() {
            MSG_PARSED.to_string()
        } else {
            notes.join("，")
        }
    };
    info!(
        algorithm = %algorithm,
        private = private_key_b64.is_some(),
        public = public_key_b64.is_some(),
        "keys extracted"
    );

    Ok(ExtractedKeys {
        message,
        private_key_b64,
        public_key_b64,
    })
}
