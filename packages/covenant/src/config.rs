use std::path::{Path, PathBuf};
use std::time::Duration;

use babylon_bitcoin::chain_params::Network;
use serde::{Deserialize, Serialize};

use crate::error::{CovenantError, Result};
use crate::keyring::KeyringBackend;

pub const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_secs(15);

pub const DEFAULT_DELEGATION_LIMIT: u64 = 100;

/// Config of the covenant emulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between two polls of the pending delegations
    pub query_interval: Duration,

    /// Maximum number of delegations signed per poll
    pub delegation_limit: u64,

    /// Bitcoin network the delegations are staked on
    pub btc_network: Network,

    pub babylon: BabylonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            query_interval: DEFAULT_QUERY_INTERVAL,
            delegation_limit: DEFAULT_DELEGATION_LIMIT,
            btc_network: Network::default(),
            babylon: BabylonConfig::default(),
        }
    }
}

/// BabylonConfig locates the Babylon chain and the covenant key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BabylonConfig {
    pub key_directory: PathBuf,
    pub chain_id: String,
    /// Name of the covenant key in the keyring
    pub key: String,
    pub keyring_backend: KeyringBackend,
}

impl Default for BabylonConfig {
    fn default() -> Self {
        BabylonConfig {
            key_directory: PathBuf::from(".covd"),
            chain_id: "chain-test".to_string(),
            key: "covenant-key".to_string(),
            keyring_backend: KeyringBackend::Test,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.query_interval.is_zero() {
            return Err(CovenantError::Config("query_interval must be positive".into()));
        }
        if self.delegation_limit == 0 {
            return Err(CovenantError::Config("delegation_limit must be positive".into()));
        }
        if self.babylon.key.is_empty() {
            return Err(CovenantError::Config("babylon.key must not be empty".into()));
        }
        Ok(())
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        babylon_bitcoin::chain_params::get_bitcoin_network(self.btc_network)
    }
}
