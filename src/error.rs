//! use cfca_keytools::error::KeyToolsError;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, KeyToolsError>;

/// Represents errors that can occur while generating keys, requesting,
/// bundling or parsing certificates.
///
/// Each variant is one failure category; the `api` layer turns them into the
/// human-readable `message` field and never lets them escape as a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyToolsError {
    /// Missing or malformed caller input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unsupported algorithm, container format or configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The supplied private and public keys are not one key pair.
    #[error("Key pair mismatch: {0}")]
    KeyMismatch(String),

    /// A downloaded or cached certificate does not belong to the private key.
    #[error("Certificate mismatch: {0}")]
    CertMismatch(String),

    /// The certificate authority rejected the request or was unreachable.
    #[error("{0}")]
    Ca(String),

    /// CA chain missing or PKCS#12 serialization failure.
    #[error("Bundle error: {0}")]
    Bundle(String),

    /// Key or certificate bytes could not be parsed.
    #[error("Failed to decode data: {0}")]
    Decode(String),

    /// Key or certificate could not be serialized.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Signing the certification request failed.
    #[error("CSR build error: {0}")]
    CsrBuild(String),

    /// Key generation failed.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl KeyToolsError {
    /// Renders the error the way the `api` layer reports it to callers.
    pub fn user_message(&self) -> String {
        match self {
            KeyToolsError::Validation(msg)
            | KeyToolsError::Configuration(msg)
            | KeyToolsError::KeyMismatch(msg)
            | KeyToolsError::CertMismatch(msg)
            | KeyToolsError::Ca(msg) => msg.clone(),
            KeyToolsError::CsrBuild(msg) => format!("生成证书请求失败: {msg}"),
            KeyToolsError::Decode(msg) => format!("密钥解析异常: {msg}"),
            other => format!("系统异常，请稍后重试: {other}"),
        }
    }
}

impl From<der::Error> for KeyToolsError {
    fn from(err: der::Error) -> Self {
        KeyToolsError::Decode(err.to_string())
    }
}

impl From<rsa::Error> for KeyToolsError {
    fn from(err: rsa::Error) -> Self {
        KeyToolsError::KeyGeneration(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for KeyToolsError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        KeyToolsError::Decode(err.to_string())
    }
}

impl From<pkcs8::Error> for KeyToolsError {
    fn from(err: pkcs8::Error) -> Self {
        KeyToolsError::Decode(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for KeyToolsError {
    fn from(err: pkcs8::spki::Error) -> Self {
        KeyToolsError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for KeyToolsError {
    fn from(err: base64::DecodeError) -> Self {
        KeyToolsError::Decode(format!("invalid base64: {err}"))
    }
}

impl From<std::io::Error> for KeyToolsError {
    fn from(err: std::io::Error) -> Self {
        KeyToolsError::Io(err.to_string())
    }
}
