//! Account configuration loaded from `auth.yml`.
//!
//! ```yaml
//! icloud:
//!   server: imap.mail.me.com
//!   username: your-user
//!   password: your-password
//!   filters:
//!     family:
//!       - mom@gmail.com
//!       - brother@gmail.com
//! work:
//!   server: imap.gmail.com
//!   username: me@yourwork.com
//!   password: work-email-password
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "auth.yml";

/// Implicit-TLS IMAP port.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// All configured accounts, keyed by account name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AuthConfig {
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// Connection details and sender filter groups for one mailbox.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Named groups of sender-address suffixes.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
}

fn default_port() -> u16 {
    DEFAULT_IMAP_PORT
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw))
}

impl AuthConfig {
    /// Read and parse a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml_bw::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration directly from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, serde_yaml_bw::Error> {
        serde_yaml_bw::from_str(contents)
    }

    /// Look up an account by name.
    pub fn account(&self, name: &str) -> Result<&AccountConfig, ConfigError> {
        self.accounts
            .get(name)
            .ok_or_else(|| ConfigError::UnknownAccount(name.to_string()))
    }
}

impl AccountConfig {
    /// Resolve a named filter group into its suffix list.
    pub fn filter(&self, account: &str, name: &str) -> Result<&[String], ConfigError> {
        self.filters
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownFilter {
                account: account.to_string(),
                filter: name.to_string(),
            })
    }
}
