use std::path::{Path, PathBuf};

use k256::ecdsa::SigningKey as EcSigningKey;
use rsa::RsaPrivateKey;
use tracing::{info, warn};

use super::{PrivateKey, encode_private, encode_public};
use crate::algorithm::{ContainerFormat, KeyAlgorithm};
use crate::error::{KeyToolsError, Result};

/// RSA modulus size; the public exponent is the `rsa` crate default of 65537.
pub const RSA_KEY_BITS: usize = 2048;

/// Human label prefixed to persisted private key files.
pub const PRIVATE_KEY_LABEL: &str = "应用私钥";
/// Human label prefixed to persisted public key files.
pub const PUBLIC_KEY_LABEL: &str = "应用公钥";

/// Parameters for one key generation request.
#[derive(Clone, Debug)]
pub struct GenerateOptions {
    pub algorithm: KeyAlgorithm,
    pub container_format: ContainerFormat,
    pub persist: bool,
}

/// A freshly generated key pair in transport form.
#[derive(Clone, Debug)]
pub struct GeneratedKeyPair {
    pub algorithm: KeyAlgorithm,
    pub private_b64: String,
    pub public_b64: String,
    pub private_path: Option<PathBuf>,
    pub public_path: Option<PathBuf>,
}

/// Generates a key pair without touching the filesystem.
///
/// `persist` in the options is ignored here; see [`generate_into`].
pub fn generate(options: &GenerateOptions) -> Result<GeneratedKeyPair> {
    if options.algorithm == KeyAlgorithm::EcNationalClass
        && options.container_format != ContainerFormat::Pkcs8
    {
        return Err(KeyToolsError::Configuration(
            "SM2密钥只支持生成PKCS8格式".to_string(),
        ));
    }

    let mut rng = rand_core::OsRng;
    let private = match options.algorithm {
        KeyAlgorithm::RsaClass => {
            PrivateKey::Rsa(Box::new(RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)?))
        }
        KeyAlgorithm::EcNationalClass => {
            warn!("generating SM2 key pair on the secp256k1 placeholder curve");
            PrivateKey::EcNational(EcSigningKey::random(&mut rng))
        }
    };

    Ok(GeneratedKeyPair {
        algorithm: options.algorithm,
        private_b64: encode_private(&private, options.container_format)?,
        public_b64: encode_public(&private.public_key())?,
        private_path: None,
        public_path: None,
    })
}

/// Generates a key pair and, when `persist` is set, writes both halves as
/// base64 text files under `key_dir`.
pub fn generate_into(options: &GenerateOptions, key_dir: &Path) -> Result<GeneratedKeyPair> {
    let mut pair = generate(options)?;
    if options.persist {
        std::fs::create_dir_all(key_dir)?;
        let label = options.algorithm.file_label();
        let private_path = key_dir.join(format!("{PRIVATE_KEY_LABEL}{label}.txt"));
        let public_path = key_dir.join(format!("{PUBLIC_KEY_LABEL}{label}.txt"));
        std::fs::write(&private_path, &pair.private_b64)?;
        std::fs::write(&public_path, &pair.public_b64)?;
        info!(algorithm = %options.algorithm, dir = %key_dir.display(), "key pair persisted");
        pair.private_path = Some(private_path);
        pair.public_path = Some(public_path);
    }
    Ok(pair)
}
