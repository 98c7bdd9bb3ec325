//! Conversion between key objects and their transport forms: DER bytes and
//! bare base64 text (PEM armor stripped).

use k256::ecdsa::{SigningKey as EcSigningKey, VerifyingKey as EcVerifyingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::{PrivateKey, PublicKey};
use crate::algorithm::{ContainerFormat, KeyAlgorithm};
use crate::error::{KeyToolsError, Result};
use crate::pem_utils::{decode_b64, encode_b64};

/// Base64 DER of the private key in the requested container.
///
/// PKCS#1 exists only for RSA keys.
pub fn encode_private(key: &PrivateKey, container_format: ContainerFormat) -> Result<String> {
    let der = match (key, container_format) {
        (_, ContainerFormat::Pkcs8) => key.to_pkcs8_der()?,
        (PrivateKey::Rsa(private), ContainerFormat::Pkcs1) => private
            .to_pkcs1_der()
            .map_err(|e| KeyToolsError::Encoding(e.to_string()))?
            .as_bytes()
            .to_vec(),
        (PrivateKey::EcNational(_), ContainerFormat::Pkcs1) => {
            return Err(KeyToolsError::Configuration(
                "SM2密钥只支持生成PKCS8格式".to_string(),
            ));
        }
    };
    Ok(encode_b64(&der))
}

/// Base64 DER `SubjectPublicKeyInfo` of the public key.
pub fn encode_public(key: &PublicKey) -> Result<String> {
    Ok(encode_b64(&key.to_spki_der()?))
}

/// Decodes a base64 private key of the given algorithm.
pub fn decode_private(b64: &str, algorithm: KeyAlgorithm) -> Result<PrivateKey> {
    private_from_der(&decode_b64(b64)?, algorithm)
}

/// Decodes a base64 `SubjectPublicKeyInfo` of the given algorithm.
pub fn decode_public(b64: &str, algorithm: KeyAlgorithm) -> Result<PublicKey> {
    public_from_der(&decode_b64(b64)?, algorithm)
}

pub(crate) fn private_from_der(der: &[u8], algorithm: KeyAlgorithm) -> Result<PrivateKey> {
    match algorithm {
        KeyAlgorithm::RsaClass => {
            let private = RsaPrivateKey::from_pkcs8_der(der)
                .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
                .map_err(|e| KeyToolsError::Decode(format!("not an RSA private key: {e}")))?;
            Ok(PrivateKey::Rsa(Box::new(private)))
        }
        KeyAlgorithm::EcNationalClass => {
            let signing_key = EcSigningKey::from_pkcs8_der(der)
                .map_err(|e| KeyToolsError::Decode(format!("not an SM2 private key: {e}")))?;
            Ok(PrivateKey::EcNational(signing_key))
        }
    }
}

pub(crate) fn public_from_der(der: &[u8], algorithm: KeyAlgorithm) -> Result<PublicKey> {
    match algorithm {
        KeyAlgorithm::RsaClass => RsaPublicKey::from_public_key_der(der)
            .map(PublicKey::Rsa)
            .map_err(|e| KeyToolsError::Decode(format!("not an RSA public key: {e}"))),
        KeyAlgorithm::EcNationalClass => EcVerifyingKey::from_public_key_der(der)
            .map(PublicKey::EcNational)
            .map_err(|e| KeyToolsError::Decode(format!("not an SM2 public key: {e}"))),
    }
}

/// Whether `der` is a bare PKCS#1 `RSAPrivateKey` rather than PKCS#8.
pub(crate) fn is_pkcs1_rsa(der: &[u8]) -> bool {
    RsaPrivateKey::from_pkcs8_der(der).is_err() && RsaPrivateKey::from_pkcs1_der(der).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{GenerateOptions, generate};
    use rsa::traits::PublicKeyParts;

    fn rsa_pair(container_format: ContainerFormat) -> (String, String) {
        let pair = generate(&GenerateOptions {
            algorithm: KeyAlgorithm::RsaClass,
            container_format,
            persist: false,
        })
        .unwrap();
        (pair.private_b64, pair.public_b64)
    }

    #[test]
    fn decodes_both_rsa_containers() {
        for format in [ContainerFormat::Pkcs8, ContainerFormat::Pkcs1] {
            let (private_b64, public_b64) = rsa_pair(format);
            let private = decode_private(&private_b64, KeyAlgorithm::RsaClass).unwrap();
            let public = decode_public(&public_b64, KeyAlgorithm::RsaClass).unwrap();
            assert_eq!(private.public_key(), public);
            match private {
                PrivateKey::Rsa(key) => assert_eq!(key.size() * 8, 2048),
                other => panic!("unexpected key {other:?}"),
            }
        }
    }

    #[test]
    fn encoded_keys_carry_no_armor() {
        let (private_b64, public_b64) = rsa_pair(ContainerFormat::Pkcs8);
        for text in [&private_b64, &public_b64] {
            assert!(!text.contains("-----"));
            assert!(!text.contains('\n'));
        }
    }

    #[test]
    fn pkcs1_is_rejected_for_ec_national() {
        let key = PrivateKey::EcNational(EcSigningKey::random(&mut rand_core::OsRng));
        let err = encode_private(&key, ContainerFormat::Pkcs1).unwrap_err();
        assert!(matches!(err, KeyToolsError::Configuration(_)));
    }

    #[test]
    fn malformed_input_is_a_decode_error() {
        assert!(matches!(
            decode_private("!!!", KeyAlgorithm::RsaClass),
            Err(KeyToolsError::Decode(_))
        ));
        assert!(matches!(
            decode_public(&encode_b64(b"not der"), KeyAlgorithm::EcNationalClass),
            Err(KeyToolsError::Decode(_))
        ));
    }

    #[test]
    fn wrong_family_is_a_decode_error() {
        let (private_b64, public_b64) = rsa_pair(ContainerFormat::Pkcs8);
        assert!(decode_private(&private_b64, KeyAlgorithm::EcNationalClass).is_err());
        assert!(decode_public(&public_b64, KeyAlgorithm::EcNationalClass).is_err());
    }
}
