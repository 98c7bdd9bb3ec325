use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{KeyToolsError, Result};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Convert a PEM‑encoded string to DER‑encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str).map_err(|e| KeyToolsError::Decode(e.to_string()))?;
    Ok(pem.contents().to_vec())
}

/// Strip PEM armor (headers, footers and line breaks) and return the bare base64 body.
///
/// Input without armor is returned with whitespace removed.
pub fn strip_armor(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>()
        .split_whitespace()
        .collect()
}

/// Wraps a bare base64 certificate body in standard PEM certificate markers.
pub fn wrap_certificate(body: &str) -> String {
    format!(
        "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----",
        body.trim()
    )
}

/// Base64 text of DER bytes, without armor.
pub fn encode_b64(der: &[u8]) -> String {
    STANDARD.encode(der)
}

/// Decodes base64 key text, tolerating PEM armor around it.
pub fn decode_b64(text: &str) -> Result<Vec<u8>> {
    let body = strip_armor(text);
    if body.is_empty() {
        return Err(KeyToolsError::Decode("empty base64 input".to_string()));
    }
    Ok(STANDARD.decode(body)?)
}
