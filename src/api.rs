//! Caller-facing operations. Every call returns a response carrying a
//! `message`; errors and panics never cross this boundary.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use crate::algorithm::{ContainerFormat, KeyAlgorithm};
use crate::ca_client::CertificateAuthority;
use crate::config::KeyToolsConfig;
use crate::error::{KeyToolsError, Result};
use crate::issuance::{CertificateIssuer, IssueRequest};
use crate::key::{GenerateOptions, generate_into};
use crate::parser;

pub const SYSTEM_ERROR_PREFIX: &str = "系统异常，请稍后重试: ";

/// Result of [`KeyTools::generate_key_pair`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairResponse {
    pub message: String,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    /// Path of the persisted private key file.
    pub private_cert: Option<String>,
    /// Path of the persisted public key file.
    pub public_cert: Option<String>,
}

/// Result of [`KeyTools::issue_certificate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub message: String,
    pub pfx_cert: Option<String>,
    pub pub_cert: Option<String>,
}

/// Result of [`KeyTools::extract_keys`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub message: String,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
}

trait Failure {
    fn failure(message: String) -> Self;
}

impl Failure for KeyPairResponse {
    fn failure(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }
}

impl Failure for IssueResponse {
    fn failure(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }
}

impl Failure for ExtractResponse {
    fn failure(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }
}

/// Entry point bundling configuration and the certificate issuer.
pub struct KeyTools {
    config: KeyToolsConfig,
    issuer: CertificateIssuer,
}

impl KeyTools {
    /// Facade that talks to the configured HTTP CA.
    pub fn new(config: KeyToolsConfig) -> Result<Self> {
        let issuer = CertificateIssuer::with_http(config.clone())?;
        Ok(Self { config, issuer })
    }

    /// Facade with a caller-provided certificate authority.
    pub fn with_authority(config: KeyToolsConfig, authority: Arc<dyn CertificateAuthority>) -> Self {
        let issuer = CertificateIssuer::new(config.clone(), authority);
        Self { config, issuer }
    }

    pub fn config(&self) -> &KeyToolsConfig {
        &self.config
    }

    /// Generates a key pair. `algorithm` is `RSA` or `SM2`, `container_format`
    /// is `pkcs8` or `pkcs1`; with `persist` both halves are written under
    /// `key_dir`.
    pub fn generate_key_pair(
        &self,
        algorithm: &str,
        container_format: &str,
        persist: bool,
    ) -> KeyPairResponse {
        shielded("generate_key_pair", || {
            let generated = algorithm.parse::<KeyAlgorithm>().and_then(|algorithm| {
                let options = GenerateOptions {
                    algorithm,
                    container_format: container_format.parse::<ContainerFormat>()?,
                    persist,
                };
                generate_into(&options, &self.config.key_dir)
            });

            match generated {
                Ok(pair) => KeyPairResponse {
                    message: if persist {
                        "密钥对生成成功，并已保存到文件".to_string()
                    } else {
                        "密钥对生成成功".to_string()
                    },
                    private_key: Some(pair.private_b64),
                    public_key: Some(pair.public_b64),
                    private_cert: pair.private_path.as_deref().map(display),
                    public_cert: pair.public_path.as_deref().map(display),
                },
                Err(KeyToolsError::Configuration(message)) => KeyPairResponse::failure(message),
                Err(e) => KeyPairResponse::failure(format!("生成密钥对失败: {e}")),
            }
        })
    }

    /// Activates and downloads the certificate for `serial_no`, bundling it
    /// with the private key under `password`.
    pub fn issue_certificate(
        &self,
        algorithm: &str,
        serial_no: &str,
        auth_code: &str,
        private_key_b64: &str,
        public_key_b64: &str,
        password: &str,
    ) -> IssueResponse {
        shielded("issue_certificate", || {
            let algorithm = match algorithm.parse::<KeyAlgorithm>() {
                Ok(algorithm) => algorithm,
                Err(e) => return IssueResponse::failure(e.user_message()),
            };
            let request = IssueRequest::builder()
                .algorithm(algorithm)
                .serial_no(serial_no)
                .auth_code(auth_code)
                .private_key_b64(private_key_b64)
                .public_key_b64(public_key_b64)
                .password(password)
                .build();

            match self.issuer.issue(&request) {
                Ok(issued) => IssueResponse {
                    message: issued.message,
                    pfx_cert: Some(display(&issued.pfx_path)),
                    pub_cert: Some(display(&issued.cer_path)),
                },
                Err(e) => IssueResponse::failure(e.user_message()),
            }
        })
    }

    /// Extracts base64 keys from a `.pfx`/`.p12` archive and/or a
    /// `.cer`/`.pem` certificate.
    pub fn extract_keys(
        &self,
        algorithm: &str,
        pfx_path: Option<&str>,
        cer_path: Option<&str>,
        password: Option<&str>,
    ) -> ExtractResponse {
        shielded("extract_keys", || {
            let algorithm = match algorithm.parse::<KeyAlgorithm>() {
                Ok(algorithm) => algorithm,
                Err(e) => return ExtractResponse::failure(e.user_message()),
            };
            let extracted = parser::extract_keys(
                algorithm,
                non_empty(pfx_path).map(Path::new),
                non_empty(cer_path).map(Path::new),
                non_empty(password),
            );

            match extracted {
                Ok(keys) => ExtractResponse {
                    message: keys.message,
                    private_key: keys.private_key_b64,
                    public_key: keys.public_key_b64,
                },
                Err(KeyToolsError::Validation(message)) => ExtractResponse::failure(message),
                Err(KeyToolsError::Decode(detail)) => {
                    ExtractResponse::failure(format!("解析证书失败: {detail}"))
                }
                Err(e) => ExtractResponse::failure(format!("解析证书失败: {e}")),
            }
        })
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Runs `operation`, turning a panic into the generic system-error response.
fn shielded<R: Failure>(operation: &'static str, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(response) => response,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected internal failure".to_string());
            error!(operation, detail = %detail, "operation panicked");
            R::failure(format!("{SYSTEM_ERROR_PREFIX}{detail}"))
        }
    }
}
