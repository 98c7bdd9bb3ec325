//! Certificate issuance: input checks, key-pair check, the local cache, the CA
//! round trip, certificate verification and bundling, in that order.

use std::path::PathBuf;
use std::sync::Arc;

use bon::Builder;
use tracing::{debug, info, warn};

use crate::algorithm::KeyAlgorithm;
use crate::bundle::{validate_password, write_pkcs12, write_public_cert};
use crate::ca_client::{CertificateAuthority, HttpCertificateAuthority};
use crate::config::KeyToolsConfig;
use crate::csr::build_csr;
use crate::error::{KeyToolsError, Result};
use crate::key::KeyMaterial;
use crate::store::{CacheStatus, CertificateStore};
use crate::validate::{cert_matches_key, keys_match};

pub const MSG_CACHED: &str = "本地证书已存在";
pub const MSG_ISSUED: &str = "CFCA证书激活并下载成功";
pub const MSG_KEY_MISMATCH: &str = "商户公私钥不匹配，请重新输入";
pub const MSG_CERT_MISMATCH: &str = "证书已下载过，且证书与输入的私钥不匹配，请核对";
pub const MSG_BAD_SERIAL: &str = "证书序列号格式不正确，只能包含字母、数字、下划线和短横线";

/// Steps of one issuance. `Cached` and `Done` are successful exits; `Failed`
/// is reachable from every other step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Validating,
    KeyCheck,
    Cached,
    BuildingCsr,
    Requesting,
    VerifyingCert,
    Bundling,
    Done,
    Failed,
}

/// Caller input for one issuance.
#[derive(Clone, Builder)]
pub struct IssueRequest {
    pub algorithm: KeyAlgorithm,
    #[builder(into)]
    pub serial_no: String,
    #[builder(into)]
    pub auth_code: String,
    #[builder(into)]
    pub private_key_b64: String,
    #[builder(into)]
    pub public_key_b64: String,
    #[builder(into)]
    pub password: String,
}

impl std::fmt::Debug for IssueRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueRequest")
            .field("algorithm", &self.algorithm)
            .field("serial_no", &self.serial_no)
            .finish_non_exhaustive()
    }
}

/// Successful outcome of [`CertificateIssuer::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub message: String,
    pub pfx_path: PathBuf,
    pub cer_path: PathBuf,
    /// `Cached` when nothing was requested or written, otherwise `Done`.
    pub state: IssuanceState,
}

/// Drives issuance against an injected certificate authority.
pub struct CertificateIssuer {
    config: KeyToolsConfig,
    authority: Arc<dyn CertificateAuthority>,
    store: CertificateStore,
}

impl CertificateIssuer {
    pub fn new(config: KeyToolsConfig, authority: Arc<dyn CertificateAuthority>) -> Self {
        let store = CertificateStore::new(config.cert_dir.clone());
        Self {
            config,
            authority,
            store,
        }
    }

    /// Issuer talking to the configured HTTP CA endpoint.
    pub fn with_http(config: KeyToolsConfig) -> Result<Self> {
        let authority = HttpCertificateAuthority::new(&config)?;
        Ok(Self::new(config, Arc::new(authority)))
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Runs the issuance to completion.
    ///
    /// Repeated calls for a serial number whose bundle already exists return
    /// the stored paths without contacting the CA. Calls for the same serial
    /// number are serialized from the cache check through bundling.
    pub fn issue(&self, request: &IssueRequest) -> Result<Issued> {
        let mut state = IssuanceState::Validating;
        let result = self.run(request, &mut state);
        match &result {
            Ok(issued) => {
                info!(serial_no = %request.serial_no, state = ?issued.state, "issuance finished")
            }
            Err(e) => warn!(
                serial_no = %request.serial_no,
                failed_in = ?state,
                state = ?IssuanceState::Failed,
                error = %e,
                "issuance failed"
            ),
        }
        result
    }

    fn run(&self, request: &IssueRequest, state: &mut IssuanceState) -> Result<Issued> {
        let algorithm = request.algorithm;
        let serial_no = request.serial_no.as_str();

        let material = validate_request(request)?;

        enter(state, IssuanceState::KeyCheck, serial_no);
        if !keys_match(&request.private_key_b64, &request.public_key_b64, algorithm)? {
            return Err(KeyToolsError::KeyMismatch(MSG_KEY_MISMATCH.to_string()));
        }

        let _guard = self.store.lock(algorithm, serial_no);
        let pfx_path = self.store.pfx_path(algorithm, serial_no);
        let cer_path = self.store.cer_path(algorithm, serial_no);

        let cache = self.store.status(algorithm, serial_no);
        if cache == CacheStatus::Complete {
            enter(state, IssuanceState::Cached, serial_no);
            info!(serial_no, "certificate already issued, serving local copy");
            return Ok(Issued {
                message: MSG_CACHED.to_string(),
                pfx_path,
                cer_path,
                state: IssuanceState::Cached,
            });
        }

        enter(state, IssuanceState::BuildingCsr, serial_no);
        debug!(serial_no, format = ?material.container_format, "private key container");
        let private_key = material.private_key()?;
        let csr_b64 = build_csr(&private_key)?;

        enter(state, IssuanceState::Requesting, serial_no);
        let cert_pem = if cache == CacheStatus::CertificateOnly {
            info!(serial_no, "certificate downloaded earlier, skipping CA request");
            self.store.read_cached_cert(algorithm, serial_no)?
        } else {
            self.authority
                .submit(serial_no, &request.auth_code, &csr_b64)?
                .pem_text
        };

        enter(state, IssuanceState::VerifyingCert, serial_no);
        if !cert_matches_key(&request.private_key_b64, &cert_pem, algorithm)? {
            return Err(KeyToolsError::CertMismatch(MSG_CERT_MISMATCH.to_string()));
        }

        enter(state, IssuanceState::Bundling, serial_no);
        let dir = self.store.dir_for(algorithm);
        if cache == CacheStatus::Miss {
            write_public_cert(&cert_pem, serial_no, &dir)?;
        }
        let chain_dir = self
            .config
            .chain_dir_for(algorithm, self.config.ca_environment());
        write_pkcs12(
            &private_key,
            &cert_pem,
            &chain_dir,
            &request.password,
            serial_no,
            &dir,
        )?;

        enter(state, IssuanceState::Done, serial_no);
        Ok(Issued {
            message: MSG_ISSUED.to_string(),
            pfx_path,
            cer_path,
            state: IssuanceState::Done,
        })
    }
}

/// Serial numbers name files under `cert_dir`, so only `[A-Za-z0-9_-]` is allowed.
fn is_plain_serial(serial_no: &str) -> bool {
    !serial_no.is_empty()
        && serial_no
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn enter(state: &mut IssuanceState, next: IssuanceState, serial_no: &str) {
    debug!(serial_no, from = ?*state, to = ?next, "issuance transition");
    *state = next;
}

/// Input checks, run before any cryptographic or network work.
fn validate_request(request: &IssueRequest) -> Result<KeyMaterial> {
    let required = [
        (&request.serial_no, "证书序列号不能为空"),
        (&request.auth_code, "授权码不能为空"),
        (&request.private_key_b64, "私钥不能为空"),
        (&request.public_key_b64, "公钥不能为空"),
    ];
    for (value, message) in required {
        if value.trim().is_empty() {
            return Err(KeyToolsError::Validation(message.to_string()));
        }
    }
    if !is_plain_serial(&request.serial_no) {
        return Err(KeyToolsError::Validation(MSG_BAD_SERIAL.to_string()));
    }
    validate_password(&request.password)?;

    KeyMaterial::from_b64(
        request.algorithm,
        Some(request.private_key_b64.as_str()),
        Some(request.public_key_b64.as_str()),
    )
    .map_err(|_| KeyToolsError::Validation("密钥格式不正确，应为Base64编码".to_string()))
}
