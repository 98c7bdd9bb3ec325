use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Deserialize;

use crate::algorithm::{CaEnvironment, KeyAlgorithm};
use crate::error::{KeyToolsError, Result};

/// Certificate download endpoint of the production CA gateway.
pub const DEFAULT_CA_ENDPOINT: &str =
    "https://mp.yeepay.com/yop-developer-center/apis/cfca/cert/download";

/// Shared Basic-auth credential the gateway expects from key tools.
pub const DEFAULT_BASIC_AUTH: &str = "keytools:keytools";

pub const DEFAULT_TOOLS_VERSION: &str = "mcp";

/// Name of the marker file under `config_dir` that selects the QA CA.
pub const QA_MARKER_FILE: &str = "qa";

/// Settings injected into the issuer and the API facade.
///
/// # Fields
/// * `ca_endpoint` - URL of the CA certificate download endpoint.
/// * `basic_auth` - `user:password` sent as HTTP Basic authorization.
/// * `tools_version` - value of the `toolsVersion` request parameter.
/// * `request_timeout_secs` - timeout of one CA call.
/// * `cert_dir` - root of the per-algorithm certificate cache.
/// * `key_dir` - directory for persisted key pairs.
/// * `config_dir` - root of the CA chain files and the QA marker.
/// * `environment` - forces the CA environment instead of probing the marker file.
#[derive(Clone, Debug, Builder, Deserialize)]
#[serde(default)]
pub struct KeyToolsConfig {
    #[builder(default = DEFAULT_CA_ENDPOINT.to_string(), into)]
    pub ca_endpoint: String,
    #[builder(default = DEFAULT_BASIC_AUTH.to_string(), into)]
    pub basic_auth: String,
    #[builder(default = DEFAULT_TOOLS_VERSION.to_string(), into)]
    pub tools_version: String,
    #[builder(default = 30)]
    pub request_timeout_secs: u64,
    #[builder(default = PathBuf::from("./certs"), into)]
    pub cert_dir: PathBuf,
    #[builder(default = PathBuf::from("./keys"), into)]
    pub key_dir: PathBuf,
    #[builder(default = PathBuf::from("./config"), into)]
    pub config_dir: PathBuf,
    pub environment: Option<CaEnvironment>,
}

impl Default for KeyToolsConfig {
    fn default() -> Self {
        KeyToolsConfig::builder().build()
    }
}

impl KeyToolsConfig {
    /// Loads a configuration from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| {
            KeyToolsError::Configuration(format!(
                "invalid configuration {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Directory holding `{serial_no}.pfx` / `{serial_no}.cer` for one algorithm.
    pub fn cert_dir_for(&self, algorithm: KeyAlgorithm) -> PathBuf {
        self.cert_dir.join(algorithm.dir_name())
    }

    /// The configured environment, or QA when the marker file exists.
    pub fn ca_environment(&self) -> CaEnvironment {
        match self.environment {
            Some(env) => env,
            None if self.config_dir.join(QA_MARKER_FILE).is_file() => CaEnvironment::Qa,
            None => CaEnvironment::Production,
        }
    }

    /// Directory holding `intermediate.cer` and `root.cer` for the algorithm.
    pub fn chain_dir_for(&self, algorithm: KeyAlgorithm, environment: CaEnvironment) -> PathBuf {
        self.config_dir
            .join("chain")
            .join(environment.dir_name())
            .join(algorithm.dir_name())
    }
}
