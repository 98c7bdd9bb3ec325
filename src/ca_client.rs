//! Submission of certification requests to the external CA gateway.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::KeyToolsConfig;
use crate::error::{KeyToolsError, Result};
use crate::pem_utils::wrap_certificate;

/// Response code the gateway uses for success.
pub const SUCCESS_CODE: &str = "000000";

/// A leaf certificate issued by the CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// PEM text with standard certificate markers.
    pub pem_text: String,
    pub serial_no: String,
}

/// An authority able to turn a certification request into a certificate.
///
/// Implementations never retry; retry policy belongs to the caller.
pub trait CertificateAuthority: Send + Sync {
    /// Submits `csr_b64` (base64 DER PKCS#10) for the CA-assigned serial number.
    ///
    /// # Errors
    /// `KeyToolsError::Ca` with the CA's message on rejection, or with a
    /// description of the transport failure.
    fn submit(&self, serial_no: &str, auth_code: &str, csr_b64: &str) -> Result<IssuedCertificate>;
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<DownloadData>,
}

#[derive(Debug, Deserialize)]
struct DownloadData {
    #[serde(default)]
    cert: Option<String>,
}

/// Parses the gateway's JSON body into an issued certificate or a CA error.
pub fn parse_download_response(serial_no: &str, body: &str) -> Result<IssuedCertificate> {
    let response: DownloadResponse = serde_json::from_str(body)
        .map_err(|e| KeyToolsError::Ca(format!("下载证书失败: 无法解析响应: {e}")))?;

    if response.code != SUCCESS_CODE {
        return Err(KeyToolsError::Ca(response.message.unwrap_or_else(|| {
            format!("下载证书失败: code {}", response.code)
        })));
    }

    let cert = response
        .data
        .and_then(|data| data.cert)
        .filter(|cert| !cert.trim().is_empty())
        .ok_or_else(|| KeyToolsError::Ca("下载证书失败: 响应中缺少证书".to_string()))?;

    Ok(IssuedCertificate {
        pem_text: wrap_certificate(&cert),
        serial_no: serial_no.to_string(),
    })
}

/// HTTP client for the CA certificate download endpoint.
pub struct HttpCertificateAuthority {
    endpoint: String,
    authorization: String,
    tools_version: String,
    http_client: Client,
}

impl HttpCertificateAuthority {
    /// Creates a client from the injected configuration.
    pub fn new(config: &KeyToolsConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KeyToolsError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.ca_endpoint.clone(),
            authorization: format!("Basic {}", STANDARD.encode(config.basic_auth.as_bytes())),
            tools_version: config.tools_version.clone(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CertificateAuthority for HttpCertificateAuthority {
    fn submit(&self, serial_no: &str, auth_code: &str, csr_b64: &str) -> Result<IssuedCertificate> {
        info!(serial_no, endpoint = %self.endpoint, "requesting certificate from CA");

        let response = self
            .http_client
            .get(&self.endpoint)
            .header(AUTHORIZATION, &self.authorization)
            .query(&[
                ("serialNo", serial_no),
                ("authCode", auth_code),
                ("certReq", csr_b64),
                ("toolsVersion", self.tools_version.as_str()),
            ])
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                warn!(serial_no, error = %e, "CA request failed");
                KeyToolsError::Ca(format!("下载证书失败: {e}"))
            })?;

        let body = response
            .text()
            .map_err(|e| KeyToolsError::Ca(format!("下载证书失败: {e}")))?;
        debug!(serial_no, len = body.len(), "CA responded");

        let issued = parse_download_response(serial_no, &body);
        if let Err(e) = &issued {
            warn!(serial_no, error = %e, "CA rejected request");
        }
        issued
    }
}
