//! # cfca-keytools - Merchant Key and CFCA Certificate Tooling in Pure Rust
//!
//! cfca-keytools generates merchant key pairs, activates CFCA certificates
//! through the YOP gateway and packs the result into password-protected
//! PKCS#12 archives. It is built on the RustCrypto crates; OpenSSL is only used
//! by the test suite.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048-bit keys, private half in PKCS#8 or PKCS#1
//! - **SM2**: national-algorithm slot, PKCS#8 only. Keys are generated on
//!   secp256k1 as a placeholder and signature checks for the family are not
//!   performed; see [`validate::signature_check_supported`].
//!
//! ## Certificate Lifecycle
//!
//! 1. [`key::generate`] produces a key pair as base64 DER.
//! 2. [`issuance::CertificateIssuer`] checks the pair, builds a PKCS#10
//!    request ([`csr`]), submits it to the CA ([`ca_client`]), verifies the
//!    returned certificate against the private key and writes
//!    `{serial_no}.cer` and `{serial_no}.pfx` ([`bundle`]).
//! 3. [`parser::extract_keys`] reads keys back out of those files.
//!
//! Bundles are cached per serial number ([`store`]): a second issuance for a
//! serial number that already has both files returns them without a CA call.
//!
//! ## Quick Start
//!
//! ### Generating a Key Pair
//!
//! ```rust
//! use cfca_keytools::{
//!     algorithm::{ContainerFormat, KeyAlgorithm},
//!     key::{GenerateOptions, generate},
//!     validate::keys_match,
//! };
//!
//! # fn main() -> Result<(), cfca_keytools::error::KeyToolsError> {
//! let pair = generate(&GenerateOptions {
//!     algorithm: KeyAlgorithm::RsaClass,
//!     container_format: ContainerFormat::Pkcs8,
//!     persist: false,
//! })?;
//!
//! assert!(keys_match(&pair.private_b64, &pair.public_b64, KeyAlgorithm::RsaClass)?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing a Certificate
//!
//! ```rust,no_run
//! use cfca_keytools::{api::KeyTools, config::KeyToolsConfig};
//!
//! # fn main() -> Result<(), cfca_keytools::error::KeyToolsError> {
//! let config = KeyToolsConfig::builder()
//!     .cert_dir("./certs")
//!     .config_dir("./config")
//!     .build();
//! let tools = KeyTools::new(config)?;
//!
//! let keys = tools.generate_key_pair("RSA", "pkcs8", true);
//! let issued = tools.issue_certificate(
//!     "RSA",
//!     "4923287028",
//!     "XYPAPJJHYL",
//!     keys.private_key.as_deref().unwrap_or_default(),
//!     keys.public_key.as_deref().unwrap_or_default(),
//!     "qwertyuiop[]",
//! );
//! println!("{}: {:?}", issued.message, issued.pfx_cert);
//! # Ok(())
//! # }
//! ```
//!
//! ### Extracting Keys from an Archive
//!
//! ```rust,no_run
//! use cfca_keytools::{algorithm::KeyAlgorithm, parser::extract_keys};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), cfca_keytools::error::KeyToolsError> {
//! let keys = extract_keys(
//!     KeyAlgorithm::RsaClass,
//!     Some(Path::new("./certs/rsa/4923287028.pfx")),
//!     None,
//!     Some("qwertyuiop[]"),
//! )?;
//! println!("{}", keys.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`error::Result`]; the [`api`] layer flattens
//! errors into the `message` of its responses:
//!
//! ```rust
//! use cfca_keytools::{algorithm::KeyAlgorithm, error::KeyToolsError, key::decode_private};
//!
//! match decode_private("invalid key data", KeyAlgorithm::RsaClass) {
//!     Ok(_) => println!("Key decoded"),
//!     Err(KeyToolsError::Decode(msg)) => println!("Failed to decode key: {}", msg),
//!     Err(e) => println!("Other error: {}", e.user_message()),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`algorithm`]: Key algorithm, container format and CA environment tags
//! - [`key`]: Key generation, encoding and signing
//! - [`csr`]: PKCS#10 certification requests
//! - [`validate`]: Key pair and certificate match checks, algorithm detection
//! - [`ca_client`]: CA gateway client
//! - [`bundle`]: Public certificate files and PKCS#12 archives
//! - [`store`]: Per-serial certificate cache and locks
//! - [`issuance`]: The issuance state machine
//! - [`parser`]: Key extraction from certificate files
//! - [`api`]: Message-carrying facade over all of the above
//! - [`config`], [`error`]: Configuration and error types

pub mod algorithm;
pub mod api;
pub mod bundle;
pub mod ca_client;
pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuance;
pub mod key;
pub mod parser;
pub mod pem_utils;
pub mod store;
pub mod validate;
