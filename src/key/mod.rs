//! Asymmetric key material: decoded key objects, their DER forms, and the
//! sign/verify primitives the validator and CSR builder rely on.

pub mod codec;
pub mod generate;

pub use codec::{decode_private, decode_public, encode_private, encode_public};
pub use generate::{GenerateOptions, GeneratedKeyPair, generate, generate_into};

use k256::ecdsa::{
    DerSignature as EcDerSignature, SigningKey as EcSigningKey, VerifyingKey as EcVerifyingKey,
};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::algorithm::{ContainerFormat, KeyAlgorithm};
use crate::error::{KeyToolsError, Result};

/// A decoded private key of one of the supported families.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    /// Placeholder for the national curve: a secp256k1 ECDSA key.
    EcNational(EcSigningKey),
}

/// A decoded public key of one of the supported families.
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcNational(EcVerifyingKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.algorithm())
    }
}

impl PrivateKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Rsa(_) => KeyAlgorithm::RsaClass,
            PrivateKey::EcNational(_) => KeyAlgorithm::EcNationalClass,
        }
    }

    /// The public half derived from this private key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(private) => PublicKey::Rsa(RsaPublicKey::from(private.as_ref())),
            PrivateKey::EcNational(signing_key) => {
                PublicKey::EcNational(*signing_key.verifying_key())
            }
        }
    }

    /// Signs `data` with the algorithm's digest: RSASSA-PKCS1-v1_5 over SHA-256,
    /// or ECDSA over SHA-256 (DER-encoded signature) for the EC family.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            PrivateKey::Rsa(private) => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;
                Ok(signature.to_vec())
            }
            PrivateKey::EcNational(signing_key) => {
                let signature: EcDerSignature = signing_key
                    .try_sign(data)
                    .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;
                Ok(signature.to_vec())
            }
        }
    }

    /// PKCS#8 `PrivateKeyInfo` DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PrivateKey::Rsa(private) => private.to_pkcs8_der(),
            PrivateKey::EcNational(signing_key) => signing_key.to_pkcs8_der(),
        }
        .map_err(|e| KeyToolsError::Encoding(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::RsaClass,
            PublicKey::EcNational(_) => KeyAlgorithm::EcNationalClass,
        }
    }

    /// X.509 `SubjectPublicKeyInfo` DER.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(public) => public.to_public_key_der(),
            PublicKey::EcNational(verifying_key) => verifying_key.to_public_key_der(),
        }
        .map_err(|e| KeyToolsError::Encoding(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        use der::Decode;
        Ok(SubjectPublicKeyInfoOwned::from_der(&self.to_spki_der()?)?)
    }

    /// Verifies a signature produced by [`PrivateKey::sign`].
    ///
    /// A bad or unparseable signature yields `false`, never an error.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Rsa(public) => {
                let verifying_key = RsaVerifyingKey::<Sha256>::new(public.clone());
                RsaSignature::try_from(signature)
                    .map(|sig| verifying_key.verify(data, &sig).is_ok())
                    .unwrap_or(false)
            }
            PublicKey::EcNational(verifying_key) => EcDerSignature::try_from(signature)
                .map(|sig| verifying_key.verify(data, &sig).is_ok())
                .unwrap_or(false),
        }
    }
}

/// Key material exchanged with callers as DER, before it is decoded into key
/// objects. Both halves, when present, belong to `algorithm`.
#[derive(Clone, Debug)]
pub struct KeyMaterial {
    pub algorithm: KeyAlgorithm,
    pub private_der: Option<Vec<u8>>,
    pub public_der: Option<Vec<u8>>,
    pub container_format: ContainerFormat,
}

impl KeyMaterial {
    /// Decodes caller-supplied base64 halves; either may be absent.
    pub fn from_b64(
        algorithm: KeyAlgorithm,
        private_b64: Option<&str>,
        public_b64: Option<&str>,
    ) -> Result<Self> {
        let private_der = private_b64.map(crate::pem_utils::decode_b64).transpose()?;
        let public_der = public_b64.map(crate::pem_utils::decode_b64).transpose()?;
        let container_format = match (&private_der, algorithm) {
            (Some(der), KeyAlgorithm::RsaClass) if codec::is_pkcs1_rsa(der) => ContainerFormat::Pkcs1,
            _ => ContainerFormat::Pkcs8,
        };
        Ok(Self {
            algorithm,
            private_der,
            public_der,
            container_format,
        })
    }

    pub fn private_key(&self) -> Result<PrivateKey> {
        let der = self
            .private_der
            .as_deref()
            .ok_or_else(|| KeyToolsError::Validation("私钥不能为空".to_string()))?;
        codec::private_from_der(der, self.algorithm)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        let der = self
            .public_der
            .as_deref()
            .ok_or_else(|| KeyToolsError::Validation("公钥不能为空".to_string()))?;
        codec::public_from_der(der, self.algorithm)
    }
}
