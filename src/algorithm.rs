use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyToolsError;

/// The two key families the CA accepts.
///
/// Every branch point (generation, CSR signing, chain selection, validation
/// digest) matches on this type exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// 2048-bit RSA, public exponent 65537.
    RsaClass,
    /// Elliptic-curve national algorithm (SM2). Key material currently lives
    /// on the secp256k1 placeholder curve.
    EcNationalClass,
}

impl KeyAlgorithm {
    /// Name used by callers and in detection reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaClass => "RSA",
            KeyAlgorithm::EcNationalClass => "SM2",
        }
    }

    /// Name embedded in generated key file names.
    pub fn file_label(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaClass => "RSA2048",
            KeyAlgorithm::EcNationalClass => "SM2",
        }
    }

    /// Directory name under the certificate and chain roots.
    pub fn dir_name(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaClass => "rsa",
            KeyAlgorithm::EcNationalClass => "sm2",
        }
    }

    /// Whether the detected family of a key or certificate counts as this algorithm.
    pub fn matches(&self, detected: DetectedAlgorithm) -> bool {
        matches!(
            (self, detected),
            (KeyAlgorithm::RsaClass, DetectedAlgorithm::Rsa)
                | (KeyAlgorithm::EcNationalClass, DetectedAlgorithm::Sm2)
        )
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeyToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA" | "RSA2048" => Ok(KeyAlgorithm::RsaClass),
            "SM2" => Ok(KeyAlgorithm::EcNationalClass),
            _ => Err(KeyToolsError::Configuration(format!("不支持的密钥算法: {s}"))),
        }
    }
}

/// Container format of the private half of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    #[default]
    Pkcs8,
    Pkcs1,
}

impl FromStr for ContainerFormat {
    type Err = KeyToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pkcs8" => Ok(ContainerFormat::Pkcs8),
            "pkcs1" => Ok(ContainerFormat::Pkcs1),
            _ => Err(KeyToolsError::Configuration(format!("不支持的密钥格式: {s}"))),
        }
    }
}

/// Algorithm family found by inspecting a key or certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedAlgorithm {
    Rsa,
    /// Elliptic curve on the national SM2 curve.
    Sm2,
    /// Any other named elliptic curve.
    Ec,
    Unknown,
}

impl fmt::Display for DetectedAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectedAlgorithm::Rsa => "RSA",
            DetectedAlgorithm::Sm2 => "SM2",
            DetectedAlgorithm::Ec => "EC",
            DetectedAlgorithm::Unknown => "UNKNOWN",
        })
    }
}

/// Which CA deployment issued the certificate; selects the chain files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaEnvironment {
    Production,
    Qa,
}

impl CaEnvironment {
    pub fn dir_name(&self) -> &'static str {
        match self {
            CaEnvironment::Production => "prod",
            CaEnvironment::Qa => "qa",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_caller_algorithm_names() {
        assert_eq!("rsa".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::RsaClass);
        assert_eq!("SM2".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::EcNationalClass);
        let err = "DSA".parse::<KeyAlgorithm>().unwrap_err();
        assert_eq!(err, KeyToolsError::Configuration("不支持的密钥算法: DSA".to_string()));
    }

    #[test]
    fn parses_container_formats() {
        assert_eq!("PKCS1".parse::<ContainerFormat>().unwrap(), ContainerFormat::Pkcs1);
        assert_eq!("pkcs8".parse::<ContainerFormat>().unwrap(), ContainerFormat::Pkcs8);
        assert!("pem".parse::<ContainerFormat>().is_err());
    }

    #[test]
    fn detected_family_matching() {
        assert!(KeyAlgorithm::RsaClass.matches(DetectedAlgorithm::Rsa));
        assert!(KeyAlgorithm::EcNationalClass.matches(DetectedAlgorithm::Sm2));
        assert!(!KeyAlgorithm::EcNationalClass.matches(DetectedAlgorithm::Ec));
        assert_eq!(DetectedAlgorithm::Unknown.to_string(), "UNKNOWN");
    }
}
