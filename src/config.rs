//! Operator configuration, read once at startup from the environment.
//!
//! | Variable            | Default                         |
//! |---------------------|---------------------------------|
//! | `SYSTEM_NAMESPACE`  | `hmc-system`                    |
//! | `WEBHOOK_PORT`      | `9443`                          |
//! | `WEBHOOK_CERT_PATH` | `/etc/webhook/certs/tls.crt`    |
//! | `WEBHOOK_KEY_PATH`  | `/etc/webhook/certs/tls.key`    |
//! | `HEALTH_PORT`       | `8080`                          |

use thiserror::Error;

/// Default namespace holding platform-owned templates and chains
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "hmc-system";
/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: expected a port number")]
    InvalidPort { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub system_namespace: String,
    pub webhook_port: u16,
    pub cert_path: String,
    pub key_path: String,
    pub health_port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            system_namespace: DEFAULT_SYSTEM_NAMESPACE.to_string(),
            webhook_port: WEBHOOK_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            health_port: HEALTH_PORT,
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset and empty variables
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            system_namespace: get("SYSTEM_NAMESPACE").unwrap_or(defaults.system_namespace),
            webhook_port: port(&get, "WEBHOOK_PORT", defaults.webhook_port)?,
            cert_path: get("WEBHOOK_CERT_PATH").unwrap_or(defaults.cert_path),
            key_path: get("WEBHOOK_KEY_PATH").unwrap_or(defaults.key_path),
            health_port: port(&get, "HEALTH_PORT", defaults.health_port)?,
        })
    }
}

fn port(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort { var, value }),
    }
}
